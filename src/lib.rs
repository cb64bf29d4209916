//! # exif-privacy
//!
//! Privacy-focused EXIF inspector — extract basic file info, every EXIF tag,
//! and decoded GPS coordinates from an image, flag the privacy-relevant parts,
//! and return it all as a JSON-safe report.
//!
//! ## Quick Start
//!
//! The simplest way to use the library is through the pipeline module, which
//! handles the full validate → stage → analyze → clean up cycle for one upload:
//!
//! ```rust,no_run
//! use exif_privacy::config::Config;
//! use exif_privacy::pipeline::{analyze_upload, AnalysisResponse};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!
//!     let bytes = std::fs::read("holiday.jpg")?;
//!     let result = analyze_upload("holiday.jpg", &bytes, &config);
//!
//!     if let Ok(ref report) = result {
//!         if report.privacy_flags.has_gps {
//!             println!("This photo reveals where it was taken!");
//!         }
//!     }
//!
//!     let response: AnalysisResponse = result.into();
//!     println!("{}", serde_json::to_string_pretty(&response)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! The decoding layer, sanitizer and GPS decoder can be used on their own:
//!
//! ```rust,no_run
//! use exif_privacy::exif::{read_image, sanitize, tag_name};
//! use exif_privacy::report::assemble;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let path = Path::new("holiday.jpg");
//!     let decoded = read_image(path)?;
//!
//!     for (id, value) in &decoded.tags {
//!         println!("{} = {}", tag_name(*id), sanitize(value));
//!     }
//!
//!     let size = std::fs::metadata(path)?.len();
//!     let report = assemble(&decoded.properties, &decoded.tags, size);
//!     println!("GPS: {:?}", report.gps);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`] — Configuration types and loading/saving
//! - [`exif`] — Image decoding, tag names, value sanitization, GPS decoding
//! - [`report`] — Report assembly, size formatting, sensitivity flags
//! - [`pipeline`] — Upload validation, staging, error classification, file collection

pub mod config;
pub mod exif;
pub mod pipeline;
pub mod report;
