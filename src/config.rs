use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "ruler_config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub display: DisplayConfig,
    pub camera: CameraConfig,
    pub inference: InferenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Program that writes an MJPEG stream to stdout.
    pub program: String,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    /// JPEG quality of the snapshot sent for analysis (1-100).
    pub jpeg_quality: u8,
    /// Camera index used for the environment-facing (rear) camera.
    pub rear_camera_index: u32,
    /// Camera index used for the user-facing (front) camera.
    pub front_camera_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub thinking_budget: u32,
    /// No timeout beyond the transport default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display: DisplayConfig {
                width: 1280,
                height: 800,
                fullscreen: false,
            },
            camera: CameraConfig {
                program: "rpicam-vid".to_string(),
                width: 1920,
                height: 1080,
                framerate: 15,
                jpeg_quality: 80,
                rear_camera_index: 0,
                front_camera_index: 1,
            },
            inference: InferenceConfig {
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                model: "gemini-3-pro-preview".to_string(),
                api_key_env: "API_KEY".to_string(),
                thinking_budget: 4000,
                request_timeout_secs: None,
            },
        }
    }
}

impl Config {
    /// Load `ruler_config.toml` from the working directory, or fall back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from(DEFAULT_CONFIG_FILE);

        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            log::info!("Config file not found, using default configuration");
            Self::default()
        };

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

    pub fn validate(&self) -> Result<()> {
        if self.display.width == 0 || self.display.height == 0 {
            return Err(anyhow::anyhow!("Invalid display dimensions"));
        }

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow::anyhow!(
                "Invalid camera resolution: {}x{}",
                self.camera.width,
                self.camera.height
            ));
        }

        if self.camera.framerate == 0 {
            return Err(anyhow::anyhow!("Invalid camera framerate"));
        }

        if self.camera.jpeg_quality == 0 || self.camera.jpeg_quality > 100 {
            return Err(anyhow::anyhow!("Invalid JPEG quality: {}", self.camera.jpeg_quality));
        }

        if self.camera.program.trim().is_empty() {
            return Err(anyhow::anyhow!("Camera program must not be empty"));
        }

        if self.inference.model.trim().is_empty() {
            return Err(anyhow::anyhow!("Inference model must not be empty"));
        }

        if self.inference.api_key_env.trim().is_empty() {
            return Err(anyhow::anyhow!("API key variable name must not be empty"));
        }

        if !self.inference.base_url.starts_with("http://")
            && !self.inference.base_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!("Invalid inference base URL: {}", self.inference.base_url));
        }

        if self.inference.request_timeout_secs == Some(0) {
            return Err(anyhow::anyhow!("Request timeout must be positive when set"));
        }

        Ok(())
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
        assert_eq!((config.camera.width, config.camera.height), (1920, 1080));
        assert_eq!(config.camera.jpeg_quality, 80);
        assert_eq!(config.inference.request_timeout_secs, None);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.camera.jpeg_quality = 0;
        assert!(config.validate().is_err());

        config.camera.jpeg_quality = 80;
        config.inference.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        config.inference.base_url = "https://example.com".to_string();
        config.inference.request_timeout_secs = Some(0);
        assert!(config.validate().is_err());

        config.inference.request_timeout_secs = Some(30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");

        let mut original = Config::default();
        original.display = DisplayConfig {
            width: 800,
            height: 480,
            fullscreen: true,
        };
        std::fs::write(&config_path, toml::to_string_pretty(&original).unwrap()).unwrap();

        let loaded = Config::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.display.width, 800);
        assert!(loaded.display.fullscreen);
        assert_eq!(loaded.camera.program, original.camera.program);
        assert_eq!(loaded.inference.thinking_budget, 4000);
    }

    #[test]
    fn test_timeout_is_optional_in_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("no_timeout.toml");
        let mut original = Config::default();
        original.inference.request_timeout_secs = None;
        std::fs::write(&config_path, toml::to_string_pretty(&original).unwrap()).unwrap();

        let loaded = Config::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.inference.request_timeout_secs, None);
    }
}
