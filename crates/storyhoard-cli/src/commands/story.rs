//! Story command handlers

use anyhow::{Context, Result};
use uuid::Uuid;

use storyhoard_core::{Hoard, Story, StoryQuery};

use crate::commands::resolve_id;
use crate::output::Output;

/// List local stories, optionally narrowed to own or cached ones
pub fn list(
    hoard: &Hoard,
    own: bool,
    cached: bool,
    search: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut query = match search {
        Some(title) => StoryQuery::titled(title),
        None => StoryQuery::all(),
    };
    if own {
        query = query.own();
    } else if cached {
        query = query.cached();
    }

    let stories = hoard.stories().retrieve(&query)?;
    output.print_stories(&stories);
    Ok(())
}

/// Show a story with its chapters
pub fn show(hoard: &Hoard, id: &str, output: &Output) -> Result<()> {
    let uuid = parse_story_id(id, hoard)?;

    let story = hoard
        .stories()
        .get_full_story(uuid)?
        .ok_or_else(|| anyhow::anyhow!("Story not found: {}", id))?;

    output.print_story(&story);
    Ok(())
}

/// Start a new story on this device
pub fn create(
    hoard: &Hoard,
    title: String,
    author: String,
    description: String,
    output: &Output,
) -> Result<()> {
    let story = Story::new(title, author, description, hoard.device());
    hoard
        .stories()
        .insert(&story)
        .context("Failed to create story")?;

    output.success(&format!("Created story: {}", story.id));
    output.print_story(&story);
    Ok(())
}

/// Delete a story and everything in it
pub fn remove(hoard: &Hoard, id: &str, output: &Output) -> Result<()> {
    let uuid = parse_story_id(id, hoard)?;
    hoard
        .stories()
        .remove(uuid)
        .with_context(|| format!("Failed to remove story {}", id))?;

    output.success(&format!("Removed story: {}", uuid));
    Ok(())
}

/// Resolve a full or prefix id against every local story
pub(crate) fn parse_story_id(id: &str, hoard: &Hoard) -> Result<Uuid> {
    let stories = hoard.stories().get_all()?;
    resolve_id(
        id,
        "story",
        stories.iter().map(|s| (s.id, s.title.as_str())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyhoard_core::DeviceId;
    use tempfile::TempDir;

    #[test]
    fn test_parse_story_id_by_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let hoard = Hoard::in_memory(DeviceId::new("cli"), temp_dir.path()).unwrap();
        let story = Story::new("Seven Bugs", "Shamalan", "scary story", hoard.device());
        hoard.stories().insert(&story).unwrap();

        let prefix = &story.id.to_string()[..6];
        assert_eq!(parse_story_id(prefix, &hoard).unwrap(), story.id);
        assert!(parse_story_id("zzzz", &hoard).is_err());
    }

    #[test]
    fn test_create_then_remove() {
        let temp_dir = TempDir::new().unwrap();
        let hoard = Hoard::in_memory(DeviceId::new("cli"), temp_dir.path()).unwrap();
        let output = Output::new(crate::output::OutputFormat::Quiet);

        create(
            &hoard,
            "Seven Bugs".into(),
            "Shamalan".into(),
            String::new(),
            &output,
        )
        .unwrap();
        let stories = hoard.stories().own_stories().unwrap();
        assert_eq!(stories.len(), 1);

        remove(&hoard, &stories[0].id.to_string(), &output).unwrap();
        assert!(hoard.stories().get_all().unwrap().is_empty());
    }
}
