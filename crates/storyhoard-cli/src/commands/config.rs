//! Config command handlers

use anyhow::{bail, Context, Result};

use storyhoard_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "server_url": config.server_url,
                    "server_index": config.server_index,
                    "device_id": config.device_id,
                    "request_timeout_secs": config.request_timeout_secs,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:             {}", config.data_dir.display());
            println!(
                "  server_url:           {}",
                config.server_url.as_deref().unwrap_or("(not set)")
            );
            println!("  server_index:         {}", config.server_index);
            println!(
                "  device_id:            {}",
                config.device_id.as_deref().unwrap_or("(generated)")
            );
            println!("  request_timeout_secs: {}", config.request_timeout_secs);
            println!(
                "  log_file:             {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    apply(&mut config, &key, &value)?;
    config.save().context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let optional = |v: &str| {
        if v.is_empty() || v == "none" {
            None
        } else {
            Some(v.to_string())
        }
    };

    match key {
        "data_dir" => config.data_dir = value.into(),
        "server_url" => config.server_url = optional(value),
        "server_index" => {
            if value.is_empty() {
                bail!("server_index cannot be empty");
            }
            config.server_index = value.to_string();
        }
        "device_id" => config.device_id = optional(value),
        "request_timeout_secs" => {
            config.request_timeout_secs = value
                .parse()
                .context("Invalid value for request_timeout_secs. Use a number of seconds.")?;
        }
        "log_file" => config.log_file = optional(value).map(Into::into),
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, server_url, server_index, device_id, \
                 request_timeout_secs, log_file",
                key
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_sets_and_clears_server_url() {
        let mut config = Config::default();
        apply(&mut config, "server_url", "http://localhost:9200").unwrap();
        assert_eq!(config.server_url.as_deref(), Some("http://localhost:9200"));
        assert!(config.publishing_enabled());

        apply(&mut config, "server_url", "none").unwrap();
        assert!(config.server_url.is_none());
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut config = Config::default();
        assert!(apply(&mut config, "request_timeout_secs", "soon").is_err());
        assert!(apply(&mut config, "server_index", "").is_err());
        assert!(apply(&mut config, "favorite_color", "blue").is_err());

        apply(&mut config, "request_timeout_secs", "30").unwrap();
        assert_eq!(config.request_timeout_secs, 30);
    }
}
