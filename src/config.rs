use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.json";

/// Top-level configuration for the exif-privacy library.
///
/// Controls which uploads are accepted, where they are staged while being
/// analyzed, and how results are printed.
///
/// # Loading
///
/// ```rust,no_run
/// use exif_privacy::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.upload.allowed_extensions.push("tif".into());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upload validation and staging.
    pub upload: UploadConfig,
    /// Output behavior.
    pub output: OutputConfig,
}

/// Which files are accepted and where they are staged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Lower-case file extensions accepted for analysis.
    pub allowed_extensions: Vec<String>,
    /// Directory uploads are staged in. `None` uses the system temp directory.
    pub scratch_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Print JSON responses instead of the human-readable table.
    pub json: bool,
    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: ["jpg", "jpeg", "png", "tiff", "webp"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            scratch_dir: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json: false,
            pretty: true,
        }
    }
}

impl UploadConfig {
    /// Case-insensitive extension check on a file name.
    pub fn is_allowed(&self, file_name: &str) -> bool {
        match file_name.rsplit_once('.') {
            Some((_, ext)) => self
                .allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    /// Lower-case, strip leading dots, drop blanks.
    fn normalize(&mut self) {
        self.allowed_extensions = self
            .allowed_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
    }

    /// Resolve the staging directory.
    pub fn scratch_path(&self) -> PathBuf {
        match &self.scratch_dir {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => std::env::temp_dir(),
        }
    }
}

impl Config {
    /// Default location: `config.json` beside the running executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe = std::env::current_exe().context("Cannot locate the running executable")?;
        exe.parent()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .context("Executable has no parent directory")
    }

    fn resolve(path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(p.to_path_buf()),
            None => Self::config_path(),
        }
    }

    /// Load from `path`, or from [`Config::config_path`] when `None`.
    ///
    /// A missing file yields the defaults. Extensions are normalized on the
    /// way in, so `".JPG"` in the file accepts `photo.jpg`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve(path)?;
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let mut config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        config.upload.normalize();
        log::debug!(
            "Loaded config from {} ({} allowed extensions)",
            path.display(),
            config.upload.allowed_extensions.len()
        );
        Ok(config)
    }

    /// Write as pretty JSON and return the path written to.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = Self::resolve(path)?;
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Config saved to {}", path.display());
        Ok(path)
    }
}
