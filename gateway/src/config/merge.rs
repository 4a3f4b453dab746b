//! Merge environment variables and YAML into a [`ServerConfig`].

use super::ServerConfig;
use super::env::{env_var, parse_env_var};
use super::yaml::YamlConfig;
use super::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SPEAK_MODEL};
use crate::core::speak::deepgram::DEEPGRAM_SPEAK_URL;
use crate::core::wav::STREAM_SAMPLE_RATE;

/// Build the configuration from environment variables, then apply YAML overrides.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    // Environment (and .env, already loaded into the environment) over defaults
    let mut config = ServerConfig {
        host: env_var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: parse_env_var::<u16>(&["PORT", "port"])?.unwrap_or(DEFAULT_PORT),
        deepgram_api_key: env_var("DEEPGRAM_API_KEY"),
        speak_url: env_var("DEEPGRAM_SPEAK_URL").unwrap_or_else(|| DEEPGRAM_SPEAK_URL.to_string()),
        default_speak_model: env_var("DEFAULT_SPEAK_MODEL")
            .unwrap_or_else(|| DEFAULT_SPEAK_MODEL.to_string()),
        speak_sample_rate: parse_env_var::<u32>(&["SPEAK_SAMPLE_RATE"])?
            .unwrap_or(STREAM_SAMPLE_RATE),
    };

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
    }

    if let Some(providers) = yaml.providers {
        if providers.deepgram_api_key.is_some() {
            config.deepgram_api_key = providers.deepgram_api_key;
        }
    }

    if let Some(speak) = yaml.speak {
        if let Some(url) = speak.url {
            config.speak_url = url;
        }
        if let Some(model) = speak.default_model {
            config.default_speak_model = model;
        }
        if let Some(sample_rate) = speak.sample_rate {
            config.speak_sample_rate = sample_rate;
        }
    }

    Ok(config)
}
