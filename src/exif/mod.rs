//! EXIF reading and normalization.
//!
//! - [`read_image`] — decode image properties and raw EXIF tags from a file
//! - [`sanitize`] — turn any raw tag value into a JSON-safe value
//! - [`decode_gps`] — compute signed decimal-degree coordinates from the GPS block
//! - [`tag_name`] / [`gps_tag_name`] — numeric tag IDs to names
//!
//! Values coming out of the decoding library are converted into the closed
//! [`RawTagValue`] type at the boundary; everything downstream is total and
//! never fails on malformed metadata.

mod gps;
mod reader;
mod tags;
mod value;

pub use gps::{GpsReport, decode_gps, to_decimal_degrees};
pub use reader::{DecodedImage, ImageProperties, read_image};
pub use tags::{TAG_GPS_INFO, gps_tag_id, gps_tag_name, tag_id, tag_name};
pub use value::{
    Rational, RawTagValue, SanitizedValue, TagKey, decode_bytes, rational_to_f64, sanitize,
};
