use serde::Serialize;
use serde_json::Map;

use super::tags::gps_tag_name;
use super::value::{RawTagValue, SanitizedValue, TagKey, decode_bytes, rational_to_f64, sanitize};

/// Decoded GPS block of one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpsReport {
    /// Every GPS sub-tag by name, sanitized.
    pub raw: Map<String, SanitizedValue>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GpsReport {
    /// Both coordinates resolved.
    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Decode the GPS sub-tags of an image into a [`GpsReport`].
///
/// Coordinates that cannot be decoded come back as `None`; the sanitized
/// sub-tags are reported either way.
pub fn decode_gps(subtags: &[(TagKey, RawTagValue)]) -> GpsReport {
    let named: Vec<(String, &RawTagValue)> = subtags
        .iter()
        .map(|(key, value)| (resolve_key(key), value))
        .collect();

    let find = |name: &str| {
        named
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| *value)
    };

    let lat_ref = find("GPSLatitudeRef").and_then(ref_text);
    let lon_ref = find("GPSLongitudeRef").and_then(ref_text);

    let latitude = find("GPSLatitude")
        .and_then(to_decimal_degrees)
        .map(|lat| apply_hemisphere(lat, lat_ref.as_deref(), 'S', "latitude"));
    let longitude = find("GPSLongitude")
        .and_then(to_decimal_degrees)
        .map(|lon| apply_hemisphere(lon, lon_ref.as_deref(), 'W', "longitude"));

    let mut raw = Map::with_capacity(named.len());
    for (name, value) in &named {
        raw.insert(name.clone(), sanitize(value));
    }

    log::debug!(
        "Decoded GPS block: {} sub-tags, latitude {latitude:?}, longitude {longitude:?}",
        raw.len()
    );

    GpsReport {
        raw,
        latitude,
        longitude,
    }
}

/// Convert a degrees/minutes/seconds triple to decimal degrees.
///
/// Anything that is not a three-element sequence is interpreted as a single
/// number of degrees. Returns `None` when any part is not numeric.
pub fn to_decimal_degrees(value: &RawTagValue) -> Option<f64> {
    let degrees = match value {
        RawTagValue::Sequence(parts) if parts.len() == 3 => {
            let d = rational_to_f64(&parts[0])?;
            let m = rational_to_f64(&parts[1])?;
            let s = rational_to_f64(&parts[2])?;
            d + m / 60.0 + s / 3600.0
        }
        other => rational_to_f64(other)?,
    };
    degrees.is_finite().then_some(degrees)
}

fn resolve_key(key: &TagKey) -> String {
    match key {
        TagKey::Id(id) => gps_tag_name(*id).into_owned(),
        TagKey::Name(name) => name.clone(),
    }
}

/// Hemisphere reference as text; `None` when absent or empty.
fn ref_text(value: &RawTagValue) -> Option<String> {
    let text = match value {
        RawTagValue::Null => return None,
        RawTagValue::Text(s) => s.clone(),
        RawTagValue::Bytes(bytes) => decode_bytes(bytes),
        other => match sanitize(other) {
            SanitizedValue::String(s) => s,
            v => v.to_string(),
        },
    };
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_string();
    (!text.is_empty()).then_some(text)
}

/// Negate `value` when the reference starts with `negative` (case-insensitive).
///
/// Unrecognized references are treated as the positive hemisphere.
fn apply_hemisphere(value: f64, reference: Option<&str>, negative: char, axis: &str) -> f64 {
    let Some(reference) = reference else {
        return value;
    };
    let first = reference.chars().next().map(|c| c.to_ascii_uppercase());
    if !matches!(first, Some('N' | 'S' | 'E' | 'W')) {
        log::warn!("Unrecognized GPS {axis} reference {reference:?}, assuming positive hemisphere");
    }
    if first == Some(negative) { -value } else { value }
}
