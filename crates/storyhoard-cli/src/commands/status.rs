//! Status command handler

use anyhow::Result;

use storyhoard_core::Hoard;

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(hoard: &Hoard, output: &Output) -> Result<()> {
    let status = hoard.status()?;
    let config = hoard.config();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "status": status,
                    "data_dir": config.data_dir,
                    "server_url": config.server_url
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", status.device_id);
        }
        OutputFormat::Human => {
            println!("StoryHoard Status");
            println!("=================");
            println!();
            println!("Device: {}", status.device_id);
            println!();
            println!("Publishing:");
            println!(
                "  Status: {}",
                if status.publishing_enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            if let Some(ref url) = config.server_url {
                println!("  Server: {} (index {})", url, config.server_index);
            }
            println!();
            println!("Storage:");
            println!("  Location: {}", config.data_dir.display());
            println!();
            println!("Contents:");
            println!("  Own stories:    {}", status.own_stories);
            println!("  Cached stories: {}", status.cached_stories);
            println!("  Chapters:       {}", status.chapters);
            println!("  Choices:        {}", status.choices);
            println!("  Media:          {}", status.media);
        }
    }

    Ok(())
}
