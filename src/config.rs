use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:5000/classify_waste";
pub const ENDPOINT_ENV_VAR: &str = "WASTE_CLASSIFIER_ENDPOINT";
const DEFAULT_CONFIG_FILE: &str = "waste_classifier.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub classifier: ClassifierConfig,
    pub camera: CameraConfig,
    pub display: DisplayConfig,
    pub paths: PathConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub endpoint_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraBackend {
    /// Use rpicam when it is installed, synthetic frames otherwise
    Auto,
    Rpicam,
    TestPattern,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub backend: CameraBackend,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub jpeg_quality: u8,
    pub preview_interval_ms: u64,
    pub startup_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    pub config_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig {
                endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
                timeout_secs: 30,
            },
            camera: CameraConfig {
                backend: CameraBackend::Auto,
                width: 640,
                height: 480,
                framerate: 30,
                jpeg_quality: 92,
                preview_interval_ms: 33,
                startup_timeout_ms: 3000,
            },
            display: DisplayConfig {
                width: 1024,
                height: 768,
                fullscreen: false,
            },
            paths: PathConfig {
                config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from(DEFAULT_CONFIG_FILE);

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            log::info!("Config file not found, creating default configuration");
            let default_config = Self::default();
            default_config.save()?;
            default_config
        };

        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV_VAR) {
            config.apply_endpoint_override(endpoint);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| "Failed to parse configuration file")?;

        log::info!("Configuration loaded from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to_file(&self.paths.config_file)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }

        std::fs::write(path.as_ref(), contents)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        log::info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Replaces the endpoint with a value from the environment; blank values are ignored.
    pub fn apply_endpoint_override(&mut self, endpoint: String) {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return;
        }
        log::info!("Classification endpoint overridden by {}: {}", ENDPOINT_ENV_VAR, endpoint);
        self.classifier.endpoint_url = endpoint.to_string();
    }

    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.classifier.endpoint_url).with_context(|| {
            format!("Invalid classification endpoint: {}", self.classifier.endpoint_url)
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow::anyhow!(
                "Classification endpoint must use http or https, got {}",
                url.scheme()
            ));
        }

        if self.classifier.timeout_secs == 0 {
            return Err(anyhow::anyhow!("Classification timeout must be positive"));
        }

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow::anyhow!("Invalid camera resolution"));
        }

        if self.camera.framerate == 0 {
            return Err(anyhow::anyhow!("Invalid camera framerate"));
        }

        if !(1..=100).contains(&self.camera.jpeg_quality) {
            return Err(anyhow::anyhow!(
                "JPEG quality must be between 1 and 100, got {}",
                self.camera.jpeg_quality
            ));
        }

        if self.display.width == 0 || self.display.height == 0 {
            return Err(anyhow::anyhow!("Invalid display dimensions"));
        }

        Ok(())
    }
}

// Configuration builder for easier setup
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.classifier.endpoint_url = url.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.classifier.timeout_secs = secs;
        self
    }

    pub fn camera_backend(mut self, backend: CameraBackend) -> Self {
        self.config.camera.backend = backend;
        self
    }

    pub fn camera_resolution(mut self, width: u32, height: u32) -> Self {
        self.config.camera.width = width;
        self.config.camera.height = height;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.camera.jpeg_quality = quality;
        self
    }

    pub fn fullscreen(mut self, enabled: bool) -> Self {
        self.config.display.fullscreen = enabled;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// Environment-specific configuration presets
impl Config {
    pub fn desktop() -> Self {
        Self::default()
    }

    pub fn kiosk() -> Self {
        Config {
            display: DisplayConfig {
                width: 800,
                height: 480,
                fullscreen: true,
            },
            camera: CameraConfig {
                backend: CameraBackend::Rpicam,
                ..Config::default().camera
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.classifier.endpoint_url, DEFAULT_ENDPOINT_URL);
        assert_eq!(config.camera.backend, CameraBackend::Auto);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .endpoint_url("https://classifier.example.org/classify_waste")
            .camera_backend(CameraBackend::TestPattern)
            .camera_resolution(1280, 720)
            .jpeg_quality(80)
            .fullscreen(true)
            .build()
            .unwrap();

        assert_eq!(
            config.classifier.endpoint_url,
            "https://classifier.example.org/classify_waste"
        );
        assert_eq!(config.camera.backend, CameraBackend::TestPattern);
        assert_eq!(config.camera.width, 1280);
        assert_eq!(config.camera.height, 720);
        assert_eq!(config.camera.jpeg_quality, 80);
        assert!(config.display.fullscreen);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.classifier.endpoint_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.classifier.endpoint_url = "ftp://localhost/classify".to_string();
        assert!(config.validate().is_err());

        config.classifier.endpoint_url = DEFAULT_ENDPOINT_URL.to_string();
        config.camera.jpeg_quality = 0;
        assert!(config.validate().is_err());

        config.camera.jpeg_quality = 92;
        config.classifier.timeout_secs = 0;
        assert!(config.validate().is_err());

        config.classifier.timeout_secs = 30;
        config.camera.width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_override() {
        let mut config = Config::default();

        config.apply_endpoint_override("   ".to_string());
        assert_eq!(config.classifier.endpoint_url, DEFAULT_ENDPOINT_URL);

        config.apply_endpoint_override(" http://10.0.0.5:5000/classify_waste ".to_string());
        assert_eq!(config.classifier.endpoint_url, "http://10.0.0.5:5000/classify_waste");
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");

        let original_config = Config::kiosk();
        original_config.save_to_file(&config_path).unwrap();

        let loaded_config = Config::load_from_file(&config_path).unwrap();

        assert_eq!(original_config.display.width, loaded_config.display.width);
        assert_eq!(original_config.camera.backend, loaded_config.camera.backend);
        assert_eq!(
            original_config.classifier.endpoint_url,
            loaded_config.classifier.endpoint_url
        );
    }

    #[test]
    fn test_backend_serializes_snake_case() {
        let contents = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(contents.contains("backend = \"auto\""));

        let mut config = Config::default();
        config.camera.backend = CameraBackend::TestPattern;
        let contents = toml::to_string_pretty(&config).unwrap();
        assert!(contents.contains("backend = \"test_pattern\""));
    }

    #[test]
    fn test_preset_configs() {
        assert!(Config::desktop().validate().is_ok());
        assert!(Config::kiosk().validate().is_ok());
    }
}
