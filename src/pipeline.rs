use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{Config, UploadConfig};
use crate::exif;
use crate::report::{self, AnalysisReport};

/// Why an analysis request was rejected or failed.
///
/// Validation errors are caused by the request itself (bad name, wrong file
/// type); everything else means the image could not be processed.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("No file selected")]
    EmptyFileName,
    #[error("Invalid file name")]
    InvalidFileName,
    #[error("File type not allowed. Use {allowed}.")]
    DisallowedType { allowed: String },
    #[error("Failed to stage upload: {0}")]
    Staging(#[source] std::io::Error),
    #[error("Failed to analyze image: {0}")]
    Processing(String),
}

impl AnalyzeError {
    /// `true` for errors caused by the request rather than the image.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyFileName | Self::InvalidFileName | Self::DisallowedType { .. }
        )
    }
}

/// The JSON envelope returned for one analysis request.
///
/// Serializes either as the full [`AnalysisReport`] or as
/// `{ "success": false, "error": "..." }`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AnalysisResponse {
    Report(AnalysisReport),
    Failure { success: bool, error: String },
}

impl From<Result<AnalysisReport, AnalyzeError>> for AnalysisResponse {
    fn from(result: Result<AnalysisReport, AnalyzeError>) -> Self {
        match result {
            Ok(report) => Self::Report(report),
            Err(e) => Self::Failure {
                success: false,
                error: e.to_string(),
            },
        }
    }
}

/// Collect files with accepted extensions from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks).
pub fn collect_images(paths: &[PathBuf], upload: &UploadConfig) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_accepted(path, upload) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_accepted(p, upload) {
                    images.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

fn is_accepted(path: &Path, upload: &UploadConfig) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| upload.is_allowed(name))
}

/// Reduce an uploaded file name to a safe, flat ASCII name.
///
/// Path separators become word breaks, whitespace runs become `_`, and
/// anything outside `[A-Za-z0-9_.-]` is dropped. Leading and trailing dots
/// and underscores are stripped, so `../../etc/passwd` becomes `etc_passwd`.
/// The result may be empty.
pub fn secure_filename(name: &str) -> String {
    let flattened: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    flattened
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|&c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c: char| c == '.' || c == '_')
        .to_string()
}

/// Analyze an image already on disk.
pub fn analyze_path(path: &Path) -> Result<AnalysisReport, AnalyzeError> {
    let file_size = std::fs::metadata(path)
        .map_err(|e| AnalyzeError::Processing(e.to_string()))?
        .len();

    let decoded =
        exif::read_image(path).map_err(|e| AnalyzeError::Processing(format!("{e:#}")))?;

    Ok(report::assemble(&decoded.properties, &decoded.tags, file_size))
}

/// Run one upload through the full request cycle.
///
/// 1. **Validate** — reject empty names and disallowed extensions
/// 2. **Stage** — write the bytes under a sanitized name into a fresh
///    directory inside the configured scratch location
/// 3. **Analyze** — decode and assemble the report
///
/// The staging directory is removed before returning, whatever the outcome;
/// on unwinding the guard's destructor removes it.
///
/// # Example
///
/// ```rust,no_run
/// use exif_privacy::config::Config;
/// use exif_privacy::pipeline::{analyze_upload, AnalysisResponse};
///
/// let config = Config::default();
/// let bytes = std::fs::read("holiday.jpg").unwrap();
/// let response: AnalysisResponse = analyze_upload("holiday.jpg", &bytes, &config).into();
/// println!("{}", serde_json::to_string_pretty(&response).unwrap());
/// ```
pub fn analyze_upload(
    file_name: &str,
    bytes: &[u8],
    config: &Config,
) -> Result<AnalysisReport, AnalyzeError> {
    if file_name.trim().is_empty() {
        return Err(AnalyzeError::EmptyFileName);
    }
    if !config.upload.is_allowed(file_name) {
        return Err(AnalyzeError::DisallowedType {
            allowed: describe_extensions(&config.upload.allowed_extensions),
        });
    }
    let safe_name = secure_filename(file_name);
    if safe_name.is_empty() {
        return Err(AnalyzeError::InvalidFileName);
    }

    let scratch = config.upload.scratch_path();
    std::fs::create_dir_all(&scratch).map_err(AnalyzeError::Staging)?;
    let staging = tempfile::Builder::new()
        .prefix("exif-privacy-")
        .tempdir_in(&scratch)
        .map_err(AnalyzeError::Staging)?;

    let staged_path = staging.path().join(&safe_name);
    log::debug!("Staging {file_name} as {}", staged_path.display());

    let result = match std::fs::write(&staged_path, bytes) {
        Ok(()) => analyze_path(&staged_path),
        Err(e) => Err(AnalyzeError::Staging(e)),
    };

    if let Err(e) = staging.close() {
        log::warn!("Failed to remove staged upload {}: {e}", staged_path.display());
    }

    match &result {
        Ok(report) => log::debug!("Analyzed {safe_name}: {} tags", report.exif.len()),
        Err(e) => log::debug!("Analysis of {safe_name} failed: {e}"),
    }

    result
}

/// `["jpg", "png", "webp"]` → `"jpg, png, or webp"`.
fn describe_extensions(extensions: &[String]) -> String {
    match extensions {
        [] => "no file types".to_string(),
        [only] => only.clone(),
        [head @ .., last] => format!("{}, or {last}", head.join(", ")),
    }
}
