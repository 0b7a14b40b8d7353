//! Chapter command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use storyhoard_core::{Chapter, Hoard, Media, MediaKind};

use crate::commands::story::parse_story_id;
use crate::output::{short_id, Output};

/// Add a chapter, with any attached images, to a story
pub fn add(
    hoard: &Hoard,
    story_id: &str,
    text: String,
    random: bool,
    photos: &[PathBuf],
    illustrations: &[PathBuf],
    output: &Output,
) -> Result<()> {
    let story_id = parse_story_id(story_id, hoard)?;

    let mut chapter = Chapter::new(story_id, text);
    chapter.random_choice = random;
    hoard
        .chapters()
        .insert(&chapter)
        .context("Failed to add chapter")?;

    let attachments = photos
        .iter()
        .map(|p| (MediaKind::Photo, p))
        .chain(illustrations.iter().map(|p| (MediaKind::Illustration, p)));
    for (kind, path) in attachments {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        hoard
            .media()
            .insert(&Media::from_image(chapter.id, kind, &bytes))
            .with_context(|| format!("Failed to attach {}", path.display()))?;
    }

    output.success(&format!(
        "Added chapter {} to story {}",
        chapter.id,
        short_id(&story_id)
    ));
    Ok(())
}
