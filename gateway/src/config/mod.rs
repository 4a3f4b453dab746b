//! Configuration module for the speak gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable reading
//! - `merge`: Merging YAML and environment configurations
//!
//! # Environment Variables
//! - `HOST` (default `0.0.0.0`)
//! - `PORT` or `port` (default `3000`)
//! - `DEEPGRAM_API_KEY`
//! - `DEEPGRAM_SPEAK_URL` (default `wss://api.deepgram.com/v1/speak`)
//! - `DEFAULT_SPEAK_MODEL` (default `aura-asteria-en`)
//! - `SPEAK_SAMPLE_RATE` (default `48000`)
//!
//! # Example
//! ```rust,no_run
//! use speak_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;

use crate::core::speak::{DeepgramSpeakConfig, SpeakError};
use crate::core::wav::MAX_SAMPLE_RATE;

mod env;
mod merge;
mod yaml;

pub use yaml::{ProvidersYaml, ServerYaml, SpeakYaml, YamlConfig};

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port
pub const DEFAULT_PORT: u16 = 3000;

/// Voice used when a client does not ask for one
pub const DEFAULT_SPEAK_MODEL: &str = "aura-asteria-en";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Provider API keys
    pub deepgram_api_key: Option<String>,

    // Speech synthesis
    /// Base URL of the streaming Speak endpoint
    pub speak_url: String,
    /// Model used when the client's `model` query parameter is absent or empty
    pub default_speak_model: String,
    /// Sample rate requested from the service
    pub speak_sample_rate: u32,
}

/// Implement Drop to zeroize secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.deepgram_api_key {
            key.zeroize();
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "deepgram_api_key",
                &self.deepgram_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("speak_url", &self.speak_url)
            .field("default_speak_model", &self.default_speak_model)
            .field("speak_sample_rate", &self.speak_sample_rate)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// The .env file is loaded into the environment by `main` before this is called.
    ///
    /// # Errors
    /// Returns an error if a numeric variable does not parse or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings for the Deepgram Speak backend.
    ///
    /// # Errors
    /// [`SpeakError::InvalidConfiguration`] if no Deepgram API key is configured.
    pub fn deepgram_speak_config(&self) -> Result<DeepgramSpeakConfig, SpeakError> {
        let api_key = self.deepgram_api_key.clone().ok_or_else(|| {
            SpeakError::InvalidConfiguration(
                "DEEPGRAM_API_KEY (or providers.deepgram_api_key) is not set".to_string(),
            )
        })?;

        let mut config = DeepgramSpeakConfig::new(api_key);
        config.url = self.speak_url.clone();
        config.sample_rate = self.speak_sample_rate;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("host must not be empty".to_string());
        }
        if self.speak_sample_rate == 0 || self.speak_sample_rate > MAX_SAMPLE_RATE {
            return Err(format!(
                "speak sample_rate must be between 1 and {MAX_SAMPLE_RATE}, got {}",
                self.speak_sample_rate
            ));
        }
        if self.default_speak_model.trim().is_empty() {
            return Err("default speak model must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            env::remove_var("HOST");
            env::remove_var("PORT");
            env::remove_var("port");
            env::remove_var("DEEPGRAM_API_KEY");
            env::remove_var("DEEPGRAM_SPEAK_URL");
            env::remove_var("DEFAULT_SPEAK_MODEL");
            env::remove_var("SPEAK_SAMPLE_RATE");
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.address(), "0.0.0.0:3000");
        assert!(config.deepgram_api_key.is_none());
        assert_eq!(config.speak_url, "wss://api.deepgram.com/v1/speak");
        assert_eq!(config.default_speak_model, "aura-asteria-en");
        assert_eq!(config.speak_sample_rate, 48000);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_values() {
        cleanup_env_vars();

        unsafe {
            env::set_var("HOST", "127.0.0.1");
            env::set_var("PORT", "8081");
            env::set_var("DEEPGRAM_API_KEY", "env-key");
            env::set_var("DEEPGRAM_SPEAK_URL", "ws://localhost:9000/v1/speak");
            env::set_var("DEFAULT_SPEAK_MODEL", "aura-luna-en");
            env::set_var("SPEAK_SAMPLE_RATE", "24000");
        }

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.address(), "127.0.0.1:8081");
        assert_eq!(config.deepgram_api_key, Some("env-key".to_string()));
        assert_eq!(config.speak_url, "ws://localhost:9000/v1/speak");
        assert_eq!(config.default_speak_model, "aura-luna-en");
        assert_eq!(config.speak_sample_rate, 24000);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_lowercase_port() {
        cleanup_env_vars();

        unsafe {
            env::set_var("port", "4000");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 4000);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        cleanup_env_vars();

        unsafe {
            env::set_var("PORT", "not-a-number");
        }

        let result = ServerConfig::from_env();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid value for PORT"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_zero_sample_rate_rejected() {
        cleanup_env_vars();

        unsafe {
            env::set_var("SPEAK_SAMPLE_RATE", "0");
        }

        assert!(ServerConfig::from_env().is_err());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_oversized_sample_rate_rejected() {
        cleanup_env_vars();

        unsafe {
            env::set_var("SPEAK_SAMPLE_RATE", "3000000000");
        }

        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("sample_rate must be between 1 and 384000"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080

providers:
  deepgram_api_key: "yaml-key"

speak:
  default_model: "aura-orion-en"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("DEEPGRAM_API_KEY", "env-key");
            env::set_var("SPEAK_SAMPLE_RATE", "16000");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.deepgram_api_key, Some("yaml-key".to_string()));
        assert_eq!(config.default_speak_model, "aura-orion-en");
        // ENV value kept where YAML is silent
        assert_eq!(config.speak_sample_rate, 16000);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_deepgram_speak_config() {
        cleanup_env_vars();

        unsafe {
            env::set_var("DEEPGRAM_API_KEY", "dg-key");
            env::set_var("DEEPGRAM_SPEAK_URL", "ws://127.0.0.1:9000/v1/speak");
        }

        let config = ServerConfig::from_env().unwrap();
        let speak = config.deepgram_speak_config().unwrap();
        assert_eq!(speak.api_key, "dg-key");
        assert_eq!(speak.url, "ws://127.0.0.1:9000/v1/speak");
        assert_eq!(speak.sample_rate, 48000);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_deepgram_speak_config_requires_key() {
        cleanup_env_vars();

        let config = ServerConfig::from_env().unwrap();
        assert!(matches!(
            config.deepgram_speak_config(),
            Err(SpeakError::InvalidConfiguration(_))
        ));

        cleanup_env_vars();
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ServerConfig {
            host: "localhost".to_string(),
            port: 3000,
            deepgram_api_key: Some("secret-key".to_string()),
            speak_url: "wss://api.deepgram.com/v1/speak".to_string(),
            default_speak_model: "aura-asteria-en".to_string(),
            speak_sample_rate: 48000,
        };

        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("<redacted>"));
    }
}
