use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Collection code joined to decoded barcodes for lookup and filenames.
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,

    /// Reference table; defaults to `taxonomy.csv` inside the input directory.
    #[serde(default)]
    pub taxonomy_path: Option<PathBuf>,

    /// Run ledger; defaults to `PhotosRecord.csv` inside the input directory.
    #[serde(default)]
    pub records_path: Option<PathBuf>,

    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// Decode photos on a thread pool before filing them in order.
    #[serde(default)]
    pub parallel_decode: bool,

    #[serde(default)]
    pub preprocess: PreprocessConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub decoder: DecoderConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    #[serde(default)]
    pub brightness: i32,

    #[serde(default)]
    pub contrast: i32,

    /// Binarisation cut-off on a 0-255 scale.
    #[serde(default = "default_threshold")]
    pub threshold: u8,

    #[serde(default = "default_sharpen_amount")]
    pub sharpen_amount: f32,

    /// Gaussian kernel width; made odd and capped at [`MAX_KERNEL_SIZE`] on load.
    #[serde(default = "default_kernel_size")]
    pub kernel_size: u32,

    #[serde(default = "default_sigma")]
    pub sigma: f32,

    /// Pixels whose difference from the blur is below this are not sharpened.
    #[serde(default)]
    pub mask_threshold: u8,
}

fn default_threshold() -> u8 {
    127
}

fn default_sharpen_amount() -> f32 {
    2.0
}

/// Widest Gaussian kernel accepted from a config file.
pub const MAX_KERNEL_SIZE: u32 = 31;

fn default_kernel_size() -> u32 {
    5
}

fn default_sigma() -> f32 {
    1.0
}

impl PreprocessConfig {
    /// Bring `kernel_size` to an odd width in `1..=MAX_KERNEL_SIZE`.
    pub fn clamp_kernel(&mut self) {
        let clamped = (self.kernel_size.max(1) | 1).min(MAX_KERNEL_SIZE);
        if clamped != self.kernel_size {
            tracing::warn!(
                "kernel_size {} is out of range, using {}",
                self.kernel_size,
                clamped
            );
            self.kernel_size = clamped;
        }
    }
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            brightness: 0,
            contrast: 0,
            threshold: default_threshold(),
            sharpen_amount: default_sharpen_amount(),
            kernel_size: default_kernel_size(),
            sigma: default_sigma(),
            mask_threshold: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    #[default]
    Month,
    Day,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArchivePolicy {
    /// Move processed originals into the dated `originals` directory.
    #[default]
    Move,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Parent of the successes/failures/originals trees; defaults to the input directory.
    #[serde(default)]
    pub root: Option<PathBuf>,

    #[serde(default)]
    pub partition: Partition,

    #[serde(default)]
    pub archive: ArchivePolicy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SuffixOverflow {
    /// Continue past `z` with `aa`, `ab`, ...
    #[default]
    Extend,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LedgerConfig {
    #[serde(default)]
    pub overflow: SuffixOverflow,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecoderBackend {
    /// 1-D label symbologies plus QR and Data Matrix, via `rxing`.
    #[default]
    Multi,
    /// QR only, via `rqrr`.
    Qr,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DecoderConfig {
    #[serde(default)]
    pub backend: DecoderBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Echo records to stderr as well as the journal or log file.
    #[serde(default = "default_console")]
    pub console: bool,

    /// Lowest level echoed to stderr.
    #[serde(default = "default_console_level")]
    pub console_level: String,
}

fn default_console() -> bool {
    true
}

fn default_console_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console: default_console(),
            console_level: default_console_level(),
        }
    }
}

fn default_input_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_collection_prefix() -> String {
    "LACMIP".to_string()
}

fn default_image_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "jpeg".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            collection_prefix: default_collection_prefix(),
            taxonomy_path: None,
            records_path: None,
            image_extensions: default_image_extensions(),
            parallel_decode: false,
            preprocess: PreprocessConfig::default(),
            output: OutputConfig::default(),
            ledger: LedgerConfig::default(),
            decoder: DecoderConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, writing a default file if none exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.preprocess.clamp_kernel();
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("HERBARIUM_CONFIG") {
            return PathBuf::from(path);
        }

        Self::config_dir().join("config.toml")
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("herbarium-barcoder")
    }

    pub fn taxonomy_path(&self) -> PathBuf {
        self.taxonomy_path
            .clone()
            .unwrap_or_else(|| self.input_dir.join("taxonomy.csv"))
    }

    pub fn records_path(&self) -> PathBuf {
        self.records_path
            .clone()
            .unwrap_or_else(|| self.input_dir.join("PhotosRecord.csv"))
    }

    pub fn output_root(&self) -> PathBuf {
        self.output
            .root
            .clone()
            .unwrap_or_else(|| self.input_dir.clone())
    }
}
