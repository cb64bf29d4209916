use serde_json::{Map, Number, Value};
use std::fmt;

/// JSON-safe projection of a [`RawTagValue`].
///
/// Objects keep insertion order (`serde_json` is built with `preserve_order`),
/// so nested tag blocks serialize in the order the image stored them.
pub type SanitizedValue = Value;

/// A fraction as stored in EXIF `RATIONAL` / `SRATIONAL` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub numerator: i64,
    pub denominator: i64,
}

impl Rational {
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// `numerator / denominator`, or `None` for a zero denominator.
    pub fn to_f64(self) -> Option<f64> {
        if self.denominator == 0 {
            return None;
        }
        Some(self.numerator as f64 / self.denominator as f64)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Key of a nested tag mapping (e.g. the GPS block).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagKey {
    Id(u16),
    Name(String),
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagKey::Id(id) => write!(f, "{id}"),
            TagKey::Name(name) => f.write_str(name),
        }
    }
}

/// A tag value as handed over by the decoding layer.
///
/// Vendor-specific representations are converted into this closed set at the
/// boundary (see [`crate::exif::read_image`]); nothing downstream inspects
/// values for shape at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTagValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Rational(Rational),
    Sequence(Vec<RawTagValue>),
    Mapping(Vec<(TagKey, RawTagValue)>),
    /// Display text of a value the decoding layer could not classify.
    Unknown(String),
}

impl From<&str> for RawTagValue {
    fn from(s: &str) -> Self {
        RawTagValue::Text(s.to_string())
    }
}

impl From<i64> for RawTagValue {
    fn from(v: i64) -> Self {
        RawTagValue::Int(v)
    }
}

impl From<Rational> for RawTagValue {
    fn from(r: Rational) -> Self {
        RawTagValue::Rational(r)
    }
}

impl From<&Value> for RawTagValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => RawTagValue::Null,
            Value::Bool(b) => RawTagValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => RawTagValue::Int(i),
                None => match n.as_f64() {
                    Some(f) => RawTagValue::Float(f),
                    None => RawTagValue::Unknown(n.to_string()),
                },
            },
            Value::String(s) => RawTagValue::Text(s.clone()),
            Value::Array(items) => RawTagValue::Sequence(items.iter().map(Into::into).collect()),
            Value::Object(map) => RawTagValue::Mapping(
                map.iter()
                    .map(|(k, v)| (TagKey::Name(k.clone()), v.into()))
                    .collect(),
            ),
        }
    }
}

/// Convert any raw tag value into a JSON-safe value. Never fails.
///
/// Resolution order:
///
/// 1. `Null` stays null.
/// 2. Booleans, integers, finite floats and text pass through unchanged.
/// 3. Bytes are decoded as UTF-8, dropping invalid sequences.
/// 4. Mappings become objects with stringified keys, values sanitized.
/// 5. Sequences become arrays, elements sanitized.
/// 6. `Unknown` text that parses as a number is coerced to a number.
/// 7. Rationals become `numerator / denominator`.
/// 8. Everything else falls back to its string form.
///
/// Numbers produced by steps 6 and 7 collapse to integers when they have no
/// fractional part.
pub fn sanitize(value: &RawTagValue) -> SanitizedValue {
    match value {
        RawTagValue::Null => Value::Null,
        RawTagValue::Bool(b) => Value::Bool(*b),
        RawTagValue::Int(i) => Value::from(*i),
        RawTagValue::Float(f) => match Number::from_f64(*f) {
            Some(n) => Value::Number(n),
            None => Value::String(f.to_string()),
        },
        RawTagValue::Text(s) => Value::String(s.clone()),
        RawTagValue::Bytes(bytes) => Value::String(decode_bytes(bytes)),
        RawTagValue::Mapping(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, v) in entries {
                map.insert(key.to_string(), sanitize(v));
            }
            Value::Object(map)
        }
        RawTagValue::Sequence(items) => Value::Array(items.iter().map(sanitize).collect()),
        RawTagValue::Unknown(text) => match text.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => collapse_number(f),
            _ => Value::String(text.clone()),
        },
        RawTagValue::Rational(r) => match r.to_f64() {
            Some(f) => collapse_number(f),
            None => Value::String(r.to_string()),
        },
    }
}

/// Decode bytes as UTF-8, silently dropping invalid sequences.
pub fn decode_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

/// Integral values become JSON integers, the rest stay floats.
fn collapse_number(f: f64) -> Value {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        return Value::from(f as i64);
    }
    match Number::from_f64(f) {
        Some(n) => Value::Number(n),
        None => Value::String(f.to_string()),
    }
}

/// Interpret a single value as a number.
///
/// Accepts plain numbers, rationals, a `[numerator, denominator]` pair, and
/// numeric text. Zero denominators and anything non-numeric yield `None`.
pub fn rational_to_f64(value: &RawTagValue) -> Option<f64> {
    let f = match value {
        RawTagValue::Int(i) => *i as f64,
        RawTagValue::Float(f) => *f,
        RawTagValue::Rational(r) => r.to_f64()?,
        RawTagValue::Text(s) | RawTagValue::Unknown(s) => s.trim().parse::<f64>().ok()?,
        RawTagValue::Sequence(items) if items.len() == 2 => {
            let num = scalar_to_f64(&items[0])?;
            let den = scalar_to_f64(&items[1])?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        _ => return None,
    };
    f.is_finite().then_some(f)
}

fn scalar_to_f64(value: &RawTagValue) -> Option<f64> {
    match value {
        RawTagValue::Sequence(_) => None,
        other => rational_to_f64(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── sanitize: scalars ────────────────────────────────────────────

    #[test]
    fn scalars_pass_through() {
        assert_eq!(sanitize(&RawTagValue::Null), Value::Null);
        assert_eq!(sanitize(&RawTagValue::Bool(true)), json!(true));
        assert_eq!(sanitize(&RawTagValue::Int(-7)), json!(-7));
        assert_eq!(sanitize(&RawTagValue::Float(2.5)), json!(2.5));
        assert_eq!(sanitize(&"Canon".into()), json!("Canon"));
    }

    #[test]
    fn plain_float_is_not_collapsed() {
        assert_eq!(sanitize(&RawTagValue::Float(3.0)), json!(3.0));
    }

    #[test]
    fn non_finite_float_becomes_string() {
        assert_eq!(sanitize(&RawTagValue::Float(f64::NAN)), json!("NaN"));
        assert_eq!(sanitize(&RawTagValue::Float(f64::INFINITY)), json!("inf"));
    }

    // ── sanitize: bytes ──────────────────────────────────────────────

    #[test]
    fn bytes_decode_as_text() {
        assert_eq!(sanitize(&RawTagValue::Bytes(b"0230".to_vec())), json!("0230"));
    }

    #[test]
    fn invalid_utf8_is_dropped() {
        let bytes = vec![b'A', 0xFF, 0xFE, b'B', 0xC3];
        assert_eq!(sanitize(&RawTagValue::Bytes(bytes)), json!("AB"));
    }

    // ── sanitize: rationals ──────────────────────────────────────────

    #[test]
    fn integral_rational_collapses_to_int() {
        assert_eq!(sanitize(&Rational::new(72, 1).into()), json!(72));
        assert_eq!(sanitize(&Rational::new(300, 10).into()), json!(30));
    }

    #[test]
    fn fractional_rational_is_float() {
        assert_eq!(sanitize(&Rational::new(1, 4).into()), json!(0.25));
        assert_eq!(sanitize(&Rational::new(-3, 2).into()), json!(-1.5));
    }

    #[test]
    fn zero_denominator_falls_back_to_string() {
        assert_eq!(sanitize(&Rational::new(5, 0).into()), json!("5/0"));
    }

    // ── sanitize: containers ─────────────────────────────────────────

    #[test]
    fn sequences_are_sanitized_elementwise() {
        let triple = RawTagValue::Sequence(vec![
            Rational::new(10, 1).into(),
            Rational::new(30, 1).into(),
            Rational::new(15, 2).into(),
        ]);
        assert_eq!(sanitize(&triple), json!([10, 30, 7.5]));
    }

    #[test]
    fn mapping_keys_are_stringified_in_order() {
        let block = RawTagValue::Mapping(vec![
            (TagKey::Id(2), RawTagValue::Int(1)),
            (TagKey::Id(1), RawTagValue::Bytes(b"N".to_vec())),
            (TagKey::Name("Extra".into()), RawTagValue::Null),
        ]);
        let out = sanitize(&block);
        let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["2", "1", "Extra"]);
        assert_eq!(out["1"], json!("N"));
    }

    // ── sanitize: unknown ────────────────────────────────────────────

    #[test]
    fn unknown_numeric_text_is_coerced() {
        assert_eq!(sanitize(&RawTagValue::Unknown("42".into())), json!(42));
        assert_eq!(sanitize(&RawTagValue::Unknown("0.5".into())), json!(0.5));
    }

    #[test]
    fn unknown_other_text_is_kept() {
        assert_eq!(
            sanitize(&RawTagValue::Unknown("Undefined[0x30]".into())),
            json!("Undefined[0x30]")
        );
    }

    // ── totality / idempotence ───────────────────────────────────────

    #[test]
    fn deeply_nested_malformed_input_never_panics() {
        let nasty = RawTagValue::Mapping(vec![(
            TagKey::Id(0),
            RawTagValue::Sequence(vec![
                Rational::new(0, 0).into(),
                Rational::new(i64::MIN, -1).into(),
                RawTagValue::Bytes(vec![0xFF; 4]),
                RawTagValue::Float(f64::NEG_INFINITY),
                RawTagValue::Sequence(vec![RawTagValue::Mapping(Vec::new())]),
                RawTagValue::Unknown(String::new()),
            ]),
        )]);
        let out = sanitize(&nasty);
        assert_eq!(out["0"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn sanitizing_twice_is_identity() {
        let raw = RawTagValue::Mapping(vec![
            (TagKey::Id(1), "N".into()),
            (
                TagKey::Id(2),
                RawTagValue::Sequence(vec![
                    Rational::new(10, 1).into(),
                    Rational::new(1, 3).into(),
                    RawTagValue::Bytes(b"x".to_vec()),
                ]),
            ),
            (TagKey::Id(6), Rational::new(7, 0).into()),
            (TagKey::Id(7), RawTagValue::Bool(false)),
        ]);
        let once = sanitize(&raw);
        let twice = sanitize(&RawTagValue::from(&once));
        assert_eq!(once, twice);
    }

    // ── rational_to_f64 ──────────────────────────────────────────────

    #[test]
    fn rational_to_f64_shapes() {
        assert_eq!(rational_to_f64(&RawTagValue::Int(3)), Some(3.0));
        assert_eq!(rational_to_f64(&Rational::new(1, 2).into()), Some(0.5));
        assert_eq!(
            rational_to_f64(&RawTagValue::Sequence(vec![
                RawTagValue::Int(3),
                RawTagValue::Int(4)
            ])),
            Some(0.75)
        );
        assert_eq!(rational_to_f64(&"12.5".into()), Some(12.5));
    }

    #[test]
    fn rational_to_f64_rejects_garbage() {
        assert_eq!(rational_to_f64(&Rational::new(1, 0).into()), None);
        assert_eq!(rational_to_f64(&"north".into()), None);
        assert_eq!(rational_to_f64(&RawTagValue::Null), None);
        assert_eq!(
            rational_to_f64(&RawTagValue::Sequence(vec![
                RawTagValue::Int(1),
                RawTagValue::Int(0)
            ])),
            None
        );
        assert_eq!(rational_to_f64(&RawTagValue::Sequence(vec![RawTagValue::Int(1)])), None);
    }
}
