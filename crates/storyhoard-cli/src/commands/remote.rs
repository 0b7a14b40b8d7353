//! Publishing server command handlers

use anyhow::{bail, Context, Result};

use storyhoard_core::Hoard;

use crate::commands::resolve_id;
use crate::output::Output;

/// Publish one of this device's stories
pub async fn publish(hoard: &Hoard, id: &str, output: &Output) -> Result<()> {
    require_server(hoard)?;

    let own = hoard.stories().own_stories()?;
    let story_id = resolve_id(id, "story", own.iter().map(|s| (s.id, s.title.as_str())))?;

    output.message("Publishing...");
    let report = hoard
        .stories()
        .publish(story_id)
        .await
        .with_context(|| format!("Failed to publish story {}", id))?;

    output.print_report(&report);
    Ok(())
}

/// Remove a published story from the server
pub async fn unpublish(hoard: &Hoard, id: &str, output: &Output) -> Result<()> {
    require_server(hoard)?;

    let own = hoard.stories().own_stories()?;
    let story_id = resolve_id(id, "story", own.iter().map(|s| (s.id, s.title.as_str())))?;

    hoard
        .stories()
        .unpublish(story_id)
        .await
        .with_context(|| format!("Failed to unpublish story {}", id))?;

    output.success(&format!("Unpublished story: {}", story_id));
    Ok(())
}

/// Search published stories by title
pub async fn browse(hoard: &Hoard, query: Option<String>, output: &Output) -> Result<()> {
    require_server(hoard)?;

    let stories = match query {
        Some(ref title) => hoard.stories().search_published(title).await,
        None => hoard.stories().get_all_published().await,
    };

    output.print_stories(&stories);
    Ok(())
}

/// Download a published story into the local cache
pub async fn download(hoard: &Hoard, id: &str, output: &Output) -> Result<()> {
    require_server(hoard)?;

    let published = hoard.stories().get_all_published().await;
    let story_id = resolve_id(
        id,
        "published story",
        published.iter().map(|s| (s.id, s.title.as_str())),
    )?;

    output.message("Downloading...");
    let report = hoard
        .stories()
        .cache(story_id)
        .await
        .with_context(|| format!("Failed to download story {}", id))?;

    output.print_report(&report);
    Ok(())
}

fn require_server(hoard: &Hoard) -> Result<()> {
    if !hoard.remote().is_enabled() {
        bail!(
            "Publishing server not configured. Set it with:\n  \
             storyhoard config set server_url http://your-server:9200"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use storyhoard_core::{Chapter, DeviceId, Story};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_publish_then_browse() {
        let temp_dir = TempDir::new().unwrap();
        let hoard = Hoard::in_memory(DeviceId::new("cli"), temp_dir.path()).unwrap();
        let story = Story::new("Seven Bugs", "Shamalan", "scary story", hoard.device());
        hoard.stories().insert(&story).unwrap();
        hoard
            .chapters()
            .insert(&Chapter::new(story.id, "intro"))
            .unwrap();

        let output = Output::new(OutputFormat::Quiet);
        publish(&hoard, &story.id.to_string()[..8], &output)
            .await
            .unwrap();

        let found = hoard.stories().search_published("bugs").await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, story.id);

        unpublish(&hoard, &story.id.to_string(), &output)
            .await
            .unwrap();
        assert!(hoard.stories().get_all_published().await.is_empty());
    }

    #[tokio::test]
    async fn test_server_commands_need_a_server() {
        let temp_dir = TempDir::new().unwrap();
        let config = storyhoard_core::Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..storyhoard_core::Config::default()
        };
        let hoard = Hoard::open_with_config(config).unwrap();

        let err = browse(&hoard, None, &Output::new(OutputFormat::Quiet))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("server_url"));
    }
}
