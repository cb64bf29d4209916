use serde::Serialize;

use crate::exif::{
    self, GpsReport, ImageProperties, RawTagValue, SanitizedValue, TAG_GPS_INFO, sanitize,
};

/// Longest display value (in characters) before truncation.
pub const MAX_DISPLAY_CHARS: usize = 200;
const TRUNCATION_MARKER: &str = "... (truncated)";

pub const MESSAGE_NO_METADATA: &str = "No EXIF metadata found in this image.";
pub const MESSAGE_ANALYZED: &str = "Metadata analyzed successfully.";

/// Tags flagged as privacy-relevant.
const SENSITIVE_TAGS: &[&str] = &[
    "GPSInfo",
    "GPSLatitude",
    "GPSLongitude",
    "GPSLatitudeRef",
    "GPSLongitudeRef",
    "DateTime",
    "DateTimeOriginal",
    "DateTimeDigitized",
    "Model",
    "Make",
    "OwnerName",
    "Software",
];

const DATETIME_TAGS: &[&str] = &["DateTime", "DateTimeOriginal", "DateTimeDigitized"];
const CAMERA_TAGS: &[&str] = &["Make", "Model"];

/// File-level facts shown above the tag list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasicInfo {
    pub file_name: String,
    pub format: String,
    pub mode: String,
    pub resolution: String,
    pub width: u32,
    pub height: u32,
    pub file_size: String,
}

/// One row of the tag list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExifTagEntry {
    pub tag: String,
    pub value: String,
    pub is_sensitive: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrivacyFlags {
    pub has_gps: bool,
    pub has_datetime: bool,
    pub has_camera_model: bool,
}

/// The full analysis of one image, serialized as the success response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub success: bool,
    pub basic_info: BasicInfo,
    pub exif: Vec<ExifTagEntry>,
    pub gps: Option<GpsReport>,
    pub privacy_flags: PrivacyFlags,
    pub message: String,
}

/// Build the report for one image from its decoded properties and raw tags.
///
/// Tags are reported in input order. A `GPSInfo` tag holding a non-empty
/// mapping is decoded into the `gps` block; `has_gps` is only set when both
/// coordinates resolved.
pub fn assemble(
    properties: &ImageProperties,
    tags: &[(u16, RawTagValue)],
    file_size: u64,
) -> AnalysisReport {
    let basic_info = basic_info(properties, file_size);

    if tags.is_empty() {
        return AnalysisReport {
            success: true,
            basic_info,
            exif: Vec::new(),
            gps: None,
            privacy_flags: PrivacyFlags::default(),
            message: MESSAGE_NO_METADATA.to_string(),
        };
    }

    let mut entries = Vec::with_capacity(tags.len());
    let mut flags = PrivacyFlags::default();
    let mut gps = None;

    for (id, value) in tags {
        let name = exif::tag_name(*id).into_owned();

        if *id == TAG_GPS_INFO {
            gps = gps_block(value);
        }
        if DATETIME_TAGS.contains(&name.as_str()) {
            flags.has_datetime = true;
        }
        if CAMERA_TAGS.contains(&name.as_str()) {
            flags.has_camera_model = true;
        }

        entries.push(ExifTagEntry {
            is_sensitive: is_sensitive(&name),
            value: truncate_display(&display_value(&sanitize(value))),
            tag: name,
        });
    }

    flags.has_gps = gps.as_ref().is_some_and(GpsReport::has_position);

    log::debug!(
        "Assembled report for {}: {} tags, gps: {}",
        properties.file_name,
        entries.len(),
        gps.is_some()
    );

    AnalysisReport {
        success: true,
        basic_info,
        exif: entries,
        gps,
        privacy_flags: flags,
        message: MESSAGE_ANALYZED.to_string(),
    }
}

fn basic_info(properties: &ImageProperties, file_size: u64) -> BasicInfo {
    BasicInfo {
        file_name: properties.file_name.clone(),
        format: properties.format.clone(),
        mode: properties.color_mode.clone(),
        resolution: format!("{} x {} px", properties.width, properties.height),
        width: properties.width,
        height: properties.height,
        file_size: format_size(file_size),
    }
}

fn gps_block(value: &RawTagValue) -> Option<GpsReport> {
    match value {
        RawTagValue::Mapping(subtags) if !subtags.is_empty() => Some(exif::decode_gps(subtags)),
        RawTagValue::Mapping(_) => None,
        other => {
            log::warn!("GPSInfo tag is not a sub-tag block: {other:?}");
            None
        }
    }
}

/// Human-readable size: binary steps from B up to PB, two decimals.
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} PB")
}

/// Whether a tag name is privacy-relevant.
pub fn is_sensitive(tag: &str) -> bool {
    SENSITIVE_TAGS.contains(&tag)
}

/// Text shown for a sanitized value.
///
/// Strings are shown verbatim. Everything else is written as a literal:
/// `True`/`False`/`None`, `[10, 30, 0]`, `{'GPSLatitudeRef': 'N'}`.
pub fn display_value(value: &SanitizedValue) -> String {
    match value {
        SanitizedValue::String(s) => s.clone(),
        other => literal(other),
    }
}

fn literal(value: &SanitizedValue) -> String {
    match value {
        SanitizedValue::Null => "None".to_string(),
        SanitizedValue::Bool(true) => "True".to_string(),
        SanitizedValue::Bool(false) => "False".to_string(),
        SanitizedValue::Number(n) => n.to_string(),
        SanitizedValue::String(s) => quoted(s),
        SanitizedValue::Array(items) => {
            let items: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", items.join(", "))
        }
        SanitizedValue::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(key, v)| format!("{}: {}", quoted(key), literal(v)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

/// Single-quoted unless the text itself holds a single quote and no double.
fn quoted(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Cut a display string to [`MAX_DISPLAY_CHARS`] characters, appending a
/// marker when anything was dropped.
pub fn truncate_display(value: &str) -> String {
    match value.char_indices().nth(MAX_DISPLAY_CHARS) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &value[..cut]),
        None => value.to_string(),
    }
}
