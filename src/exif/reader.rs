use ::exif::{Context, Field, In, Reader, Value};
use anyhow::{Context as _, Result};
use image::{ColorType, ImageDecoder, ImageFormat, ImageReader};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::tags::TAG_GPS_INFO;
use super::value::{Rational, RawTagValue, TagKey, decode_bytes};

/// Decoded image properties the report is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageProperties {
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    /// Upper-case container name, e.g. `JPEG`, `PNG`.
    pub format: String,
    /// Short colour mode name, e.g. `RGB`, `L`, `RGBA;16`.
    pub color_mode: String,
}

/// Everything the decoding layer yields for one image.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub properties: ImageProperties,
    /// Main-IFD tags in file order. GPS sub-tags sit inside the `GPSInfo` entry.
    pub tags: Vec<(u16, RawTagValue)>,
}

/// Decode image properties and EXIF tags from a file.
///
/// Fails only when the image itself cannot be decoded. A missing or
/// unparseable EXIF block yields an empty tag list.
pub fn read_image(path: &Path) -> Result<DecodedImage> {
    let properties = read_properties(path)?;
    let tags = read_tags(path);
    Ok(DecodedImage { properties, tags })
}

fn read_properties(path: &Path) -> Result<ImageProperties> {
    let reader = ImageReader::open(path)
        .context("Failed to open image file")?
        .with_guessed_format()
        .context("Failed to read image header")?;

    let format = reader
        .format()
        .map(format_name)
        .context("Unrecognized image format")?;

    let decoder = reader.into_decoder().context("Failed to decode image")?;
    let (width, height) = decoder.dimensions();
    let color_mode = color_mode_name(decoder.color_type());

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(ImageProperties {
        file_name,
        width,
        height,
        format,
        color_mode,
    })
}

fn read_tags(path: &Path) -> Vec<(u16, RawTagValue)> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            log::debug!("Cannot open {} for EXIF: {e}", path.display());
            return Vec::new();
        }
    };

    let exif = match Reader::new()
        .continue_on_error(true)
        .read_from_container(&mut BufReader::new(file))
        .or_else(|e| {
            e.distill_partial_result(|errors| {
                for err in errors {
                    log::debug!("Skipped damaged EXIF entry in {}: {err}", path.display());
                }
            })
        }) {
        Ok(exif) => exif,
        Err(e) => {
            log::debug!("No EXIF data found in {}: {e}", path.display());
            return Vec::new();
        }
    };

    let tags = collect_tags(exif.fields());
    log::debug!("Read {} EXIF tags from {}", tags.len(), path.display());
    tags
}

/// Flatten the primary image's fields into main-IFD tags.
///
/// TIFF and Exif sub-IFD fields share one tag namespace and keep file order;
/// the first occurrence of a tag wins. GPS sub-IFD fields are gathered into a
/// single `GPSInfo` mapping, keyed by sub-tag ID, that sits where the GPS
/// directory was linked from.
fn collect_tags<'a>(fields: impl IntoIterator<Item = &'a Field>) -> Vec<(u16, RawTagValue)> {
    let mut tags = Vec::new();
    let mut seen = HashSet::new();
    let mut gps = Vec::new();
    let mut seen_gps = HashSet::new();
    let mut gps_slot = None;

    for field in fields {
        // IFD1 describes the embedded thumbnail, not the photo
        if field.ifd_num != In::PRIMARY {
            continue;
        }
        let code = field.tag.number();
        match field.tag.context() {
            Context::Tiff | Context::Exif => {
                if seen.insert(code) {
                    tags.push((code, field_to_raw(field)));
                }
            }
            Context::Gps => {
                if gps_slot.is_none() && seen.insert(TAG_GPS_INFO) {
                    gps_slot = Some(tags.len());
                    tags.push((TAG_GPS_INFO, RawTagValue::Null));
                }
                if seen_gps.insert(code) {
                    gps.push((TagKey::Id(code), field_to_raw(field)));
                }
            }
            // Interoperability IFD
            _ => {}
        }
    }

    if let Some(slot) = gps_slot {
        tags[slot].1 = RawTagValue::Mapping(gps);
    }
    tags
}

/// Convert one EXIF field into the crate's closed value type.
fn field_to_raw(field: &Field) -> RawTagValue {
    match &field.value {
        Value::Ascii(strings) => match strings.as_slice() {
            [] => RawTagValue::Text(String::new()),
            [single] => RawTagValue::Text(decode_bytes(single)),
            many => RawTagValue::Sequence(
                many.iter()
                    .map(|s| RawTagValue::Text(decode_bytes(s)))
                    .collect(),
            ),
        },
        Value::Byte(v) => components(v, |n| RawTagValue::Int(i64::from(*n))),
        Value::Short(v) => components(v, |n| RawTagValue::Int(i64::from(*n))),
        Value::Long(v) => components(v, |n| RawTagValue::Int(i64::from(*n))),
        Value::SByte(v) => components(v, |n| RawTagValue::Int(i64::from(*n))),
        Value::SShort(v) => components(v, |n| RawTagValue::Int(i64::from(*n))),
        Value::SLong(v) => components(v, |n| RawTagValue::Int(i64::from(*n))),
        Value::Rational(v) => components(v, |r| {
            RawTagValue::Rational(Rational::new(i64::from(r.num), i64::from(r.denom)))
        }),
        Value::SRational(v) => components(v, |r| {
            RawTagValue::Rational(Rational::new(i64::from(r.num), i64::from(r.denom)))
        }),
        Value::Float(v) => components(v, |f| RawTagValue::Float(f64::from(*f))),
        Value::Double(v) => components(v, |f| RawTagValue::Float(*f)),
        Value::Undefined(bytes, _) => RawTagValue::Bytes(bytes.clone()),
        Value::Unknown(..) => RawTagValue::Unknown(field.display_value().to_string()),
    }
}

/// A single component stands alone; any other count becomes a sequence.
fn components<T>(items: &[T], convert: impl Fn(&T) -> RawTagValue) -> RawTagValue {
    match items {
        [single] => convert(single),
        _ => RawTagValue::Sequence(items.iter().map(convert).collect()),
    }
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "JPEG".to_string(),
        ImageFormat::Png => "PNG".to_string(),
        ImageFormat::Tiff => "TIFF".to_string(),
        ImageFormat::WebP => "WEBP".to_string(),
        ImageFormat::Gif => "GIF".to_string(),
        ImageFormat::Bmp => "BMP".to_string(),
        other => format!("{other:?}").to_uppercase(),
    }
}

fn color_mode_name(color: ColorType) -> String {
    let name = match color {
        ColorType::L8 => "L",
        ColorType::La8 => "LA",
        ColorType::Rgb8 => "RGB",
        ColorType::Rgba8 => "RGBA",
        ColorType::L16 => "I;16",
        ColorType::La16 => "LA;16",
        ColorType::Rgb16 => "RGB;16",
        ColorType::Rgba16 => "RGBA;16",
        ColorType::Rgb32F => "RGB;32F",
        ColorType::Rgba32F => "RGBA;32F",
        other => return format!("{other:?}"),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::exif::Tag;
    use ::exif::experimental::Writer;
    use image::{GrayImage, RgbImage, RgbaImage};
    use std::io::Cursor;
    use std::path::PathBuf;
    use tempfile::TempDir;

    use crate::exif::{sanitize, tag_name};
    use crate::report::assemble;

    fn field(tag: Tag, value: Value) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value,
        }
    }

    fn ascii(text: &str) -> Value {
        Value::Ascii(vec![text.as_bytes().to_vec()])
    }

    fn dms(degrees: u32, minutes: u32, seconds: u32) -> Value {
        Value::Rational(vec![
            (degrees, 1).into(),
            (minutes, 1).into(),
            (seconds, 1).into(),
        ])
    }

    /// Write an 8x8 JPEG carrying `fields` in an APP1 Exif segment.
    fn jpeg_with_exif(dir: &TempDir, name: &str, fields: &[Field]) -> PathBuf {
        let mut writer = Writer::new();
        for f in fields {
            writer.push_field(f);
        }
        let mut tiff = Cursor::new(Vec::new());
        writer.write(&mut tiff, false).unwrap();
        let tiff = tiff.into_inner();

        let mut jpeg = Vec::new();
        RgbImage::new(8, 8)
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();

        let segment_len = u16::try_from(2 + 6 + tiff.len()).unwrap();
        let mut bytes = jpeg[..2].to_vec();
        bytes.extend_from_slice(&[0xFF, 0xE1]);
        bytes.extend_from_slice(&segment_len.to_be_bytes());
        bytes.extend_from_slice(b"Exif\0\0");
        bytes.extend_from_slice(&tiff);
        bytes.extend_from_slice(&jpeg[2..]);

        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn names(tags: &[(u16, RawTagValue)]) -> Vec<String> {
        tags.iter().map(|(id, _)| tag_name(*id).into_owned()).collect()
    }

    fn gps_block(tags: &[(u16, RawTagValue)]) -> &RawTagValue {
        &tags
            .iter()
            .find(|(id, _)| *id == TAG_GPS_INFO)
            .expect("GPSInfo tag")
            .1
    }

    // ── read_image ───────────────────────────────────────────────────

    #[test]
    fn png_without_exif() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pixel.png");
        RgbImage::new(4, 3).save(&path).unwrap();

        let decoded = read_image(&path).unwrap();
        assert_eq!(decoded.properties.file_name, "pixel.png");
        assert_eq!(decoded.properties.format, "PNG");
        assert_eq!(decoded.properties.color_mode, "RGB");
        assert_eq!((decoded.properties.width, decoded.properties.height), (4, 3));
        assert!(decoded.tags.is_empty());
    }

    #[test]
    fn grayscale_and_alpha_modes() {
        let dir = TempDir::new().unwrap();
        let gray = dir.path().join("gray.png");
        GrayImage::new(2, 2).save(&gray).unwrap();
        assert_eq!(read_image(&gray).unwrap().properties.color_mode, "L");

        let rgba = dir.path().join("rgba.png");
        RgbaImage::new(2, 2).save(&rgba).unwrap();
        assert_eq!(read_image(&rgba).unwrap().properties.color_mode, "RGBA");
    }

    #[test]
    fn format_sniffed_from_content_not_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("really_a_png.jpg");
        RgbImage::new(1, 1)
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        assert_eq!(read_image(&path).unwrap().properties.format, "PNG");
    }

    #[test]
    fn garbage_fails_to_decode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not an image").unwrap();
        assert!(read_image(&path).is_err());
    }

    #[test]
    fn missing_file_fails() {
        assert!(read_image(Path::new("/nonexistent/photo.jpg")).is_err());
    }

    // ── EXIF extraction ──────────────────────────────────────────────

    #[test]
    fn main_ifd_tags_in_file_order() {
        let dir = TempDir::new().unwrap();
        let fields = [
            field(Tag(::exif::Context::Tiff, 0x000B), ascii("Tool")),
            field(Tag::Make, ascii("Canon")),
            field(Tag::DateTime, ascii("2020:01:01 12:00:00")),
            field(Tag::DateTimeOriginal, ascii("2019:12:31 23:59:59")),
            field(Tag::FNumber, Value::Rational(vec![(28, 10).into()])),
            field(Tag::ExifVersion, Value::Undefined(b"0231".to_vec(), 0)),
        ];
        let path = jpeg_with_exif(&dir, "camera.jpg", &fields);

        let decoded = read_image(&path).unwrap();
        assert_eq!(decoded.properties.format, "JPEG");
        assert_eq!(
            names(&decoded.tags),
            [
                "ProcessingSoftware",
                "Make",
                "DateTime",
                "FNumber",
                "ExifVersion",
                "DateTimeOriginal"
            ]
        );
    }

    #[test]
    fn values_keep_their_exif_form() {
        let dir = TempDir::new().unwrap();
        let fields = [
            field(Tag::DateTime, ascii("2020:01:01 12:00:00")),
            field(Tag::FNumber, Value::Rational(vec![(28, 10).into()])),
            field(Tag::ExifVersion, Value::Undefined(b"0231".to_vec(), 0)),
            field(Tag::Orientation, Value::Short(vec![1])),
        ];
        let path = jpeg_with_exif(&dir, "values.jpg", &fields);
        let tags = read_image(&path).unwrap().tags;

        let value_of = |id: u16| {
            let (_, raw) = tags.iter().find(|(code, _)| *code == id).unwrap();
            sanitize(raw)
        };
        assert_eq!(value_of(0x0132), "2020:01:01 12:00:00");
        assert_eq!(value_of(0x829D), 2.8);
        assert_eq!(value_of(0x9000), "0231");
        assert_eq!(value_of(0x0112), 1);
    }

    #[test]
    fn gps_block_holds_exactly_the_file_subtags() {
        let dir = TempDir::new().unwrap();
        let fields = [
            field(Tag::Make, ascii("Canon")),
            field(Tag::GPSVersionID, Value::Byte(vec![2, 3, 0, 0])),
            field(Tag::GPSLatitudeRef, ascii("N")),
            field(Tag::GPSLatitude, dms(10, 30, 0)),
            field(Tag::GPSLongitudeRef, ascii("W")),
            field(Tag::GPSLongitude, dms(20, 15, 0)),
            field(Tag::GPSDateStamp, ascii("2020:01:01")),
        ];
        let path = jpeg_with_exif(&dir, "geotagged.jpg", &fields);
        let tags = read_image(&path).unwrap().tags;

        assert_eq!(names(&tags), ["Make", "GPSInfo"]);
        let RawTagValue::Mapping(entries) = gps_block(&tags) else {
            panic!("GPSInfo is not a mapping");
        };
        let keys: Vec<String> = entries.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, ["0", "1", "2", "3", "4", "29"]);

        let gps = crate::exif::decode_gps(entries);
        assert_eq!(gps.latitude, Some(10.5));
        assert_eq!(gps.longitude, Some(-20.25));
        assert_eq!(gps.raw["GPSVersionID"], serde_json::json!([2, 3, 0, 0]));
        assert_eq!(gps.raw["GPSDateStamp"], "2020:01:01");
        assert!(!gps.raw.contains_key("GPSAltitude"));
        assert!(!gps.raw.contains_key("GPSAltitudeRef"));
    }

    #[test]
    fn geotagged_photo_reports_position() {
        let dir = TempDir::new().unwrap();
        let fields = [
            field(Tag::Make, ascii("Canon")),
            field(Tag::GPSVersionID, Value::Byte(vec![2, 3, 0, 0])),
            field(Tag::GPSLatitudeRef, ascii("S")),
            field(Tag::GPSLatitude, dms(33, 51, 36)),
            field(Tag::GPSLongitudeRef, ascii("E")),
            field(Tag::GPSLongitude, dms(151, 12, 36)),
        ];
        let path = jpeg_with_exif(&dir, "sydney.jpg", &fields);
        let decoded = read_image(&path).unwrap();
        let report = assemble(&decoded.properties, &decoded.tags, 1024);

        assert!(report.privacy_flags.has_gps);
        assert!(report.privacy_flags.has_camera_model);
        let gps = report.gps.unwrap();
        assert!((gps.latitude.unwrap() + 33.86).abs() < 1e-9);
        assert!((gps.longitude.unwrap() - 151.21).abs() < 1e-9);
    }

    #[test]
    fn gps_only_date_stamp_is_not_padded() {
        let dir = TempDir::new().unwrap();
        let fields = [
            field(Tag::Make, ascii("Canon")),
            field(Tag::GPSDateStamp, ascii("2020:01:01")),
        ];
        let path = jpeg_with_exif(&dir, "datestamp.jpg", &fields);
        let tags = read_image(&path).unwrap().tags;

        let RawTagValue::Mapping(entries) = gps_block(&tags) else {
            panic!("GPSInfo is not a mapping");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(
            sanitize(gps_block(&tags)),
            serde_json::json!({ "29": "2020:01:01" })
        );
    }

    #[test]
    fn gps_info_sits_at_its_directory_position() {
        let dir = TempDir::new().unwrap();
        let fields = [
            field(Tag::Make, ascii("Canon")),
            field(Tag::GPSLatitudeRef, ascii("N")),
            field(Tag::GPSLatitude, dms(1, 0, 0)),
            field(
                Tag(::exif::Context::Tiff, 0xC4A5),
                Value::Undefined(b"PrintIM".to_vec(), 0),
            ),
        ];
        let path = jpeg_with_exif(&dir, "ordered.jpg", &fields);
        let tags = read_image(&path).unwrap().tags;
        assert_eq!(names(&tags), ["Make", "GPSInfo", "PrintImageMatching"]);
    }

    #[test]
    fn thumbnail_ifd_is_ignored() {
        let dir = TempDir::new().unwrap();
        let fields = [
            field(Tag::Make, ascii("Canon")),
            Field {
                tag: Tag::Software,
                ifd_num: In::THUMBNAIL,
                value: ascii("thumbnailer"),
            },
        ];
        let path = jpeg_with_exif(&dir, "thumb.jpg", &fields);
        let tags = read_image(&path).unwrap().tags;
        assert_eq!(names(&tags), ["Make"]);
    }

    #[test]
    fn jpeg_without_exif_has_no_tags() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.jpg");
        RgbImage::new(4, 4).save(&path).unwrap();
        assert!(read_image(&path).unwrap().tags.is_empty());
    }

    // ── value conversion ─────────────────────────────────────────────

    #[test]
    fn single_components_stand_alone() {
        let one = field(Tag::Orientation, Value::Short(vec![6]));
        assert_eq!(field_to_raw(&one), RawTagValue::Int(6));

        let many = field(Tag::BitsPerSample, Value::Short(vec![8, 8, 8]));
        assert_eq!(
            sanitize(&field_to_raw(&many)),
            serde_json::json!([8, 8, 8])
        );
    }

    #[test]
    fn signed_rationals_keep_sign() {
        let bias = field(
            Tag::ExposureBiasValue,
            Value::SRational(vec![(-1, 3).into()]),
        );
        assert_eq!(
            field_to_raw(&bias),
            RawTagValue::Rational(Rational::new(-1, 3))
        );
    }

    #[test]
    fn ascii_is_decoded_permissively() {
        let odd = field(Tag::Artist, Value::Ascii(vec![b"Ann\xFF".to_vec()]));
        assert_eq!(field_to_raw(&odd), RawTagValue::Text("Ann".into()));
    }

    #[test]
    fn format_names() {
        assert_eq!(format_name(ImageFormat::Jpeg), "JPEG");
        assert_eq!(format_name(ImageFormat::WebP), "WEBP");
    }
}
