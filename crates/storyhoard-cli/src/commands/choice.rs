//! Choice command handlers

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use storyhoard_core::{Choice, Hoard};

use crate::commands::resolve_id;
use crate::output::Output;

/// Add a choice leading out of a chapter
///
/// Without `to` the choice is a dead end until the target chapter is written.
pub fn add(
    hoard: &Hoard,
    from: &str,
    text: String,
    to: Option<&str>,
    output: &Output,
) -> Result<()> {
    let chapters = hoard.chapters().get_all()?;
    let labelled = || chapters.iter().map(|c| (c.id, c.text.as_str()));

    let from_id = resolve_id(from, "chapter", labelled())?;
    let from_chapter = chapters
        .iter()
        .find(|c| c.id == from_id)
        .ok_or_else(|| anyhow::anyhow!("Chapter not found: {}", from))?;

    let choice = match to {
        Some(to) => {
            let to_id: Uuid = resolve_id(to, "chapter", labelled())?;
            let same_story = chapters
                .iter()
                .any(|c| c.id == to_id && c.story_id() == from_chapter.story_id());
            if !same_story {
                bail!("Chapter {} is not part of the same story", to);
            }
            Choice::new(from_id, to_id, text)
        }
        None => Choice::dead_end(from_id, text),
    };

    hoard
        .choices()
        .insert(&choice)
        .context("Failed to add choice")?;

    output.success(&format!("Added choice: {}", choice.id));
    Ok(())
}
