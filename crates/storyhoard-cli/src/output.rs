//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde_json::{json, Value};

use storyhoard_core::{Chapter, Media, Story, SyncReport};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a story with every loaded chapter
    pub fn print_story(&self, story: &Story) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", story.id);
                println!("Title:       {}", story.title);
                if !story.author.is_empty() {
                    println!("Author:      {}", story.author);
                }
                if !story.description.is_empty() {
                    println!("Description: {}", story.description);
                }
                println!("Device:      {}", story.device_id);

                for chapter in story.chapters().values() {
                    let marker = if story.first_chapter_id() == Some(chapter.id) {
                        " (first)"
                    } else {
                        ""
                    };
                    println!();
                    println!("── Chapter {}{} ──", short_id(&chapter.id), marker);
                    println!("{}", truncate_line(&chapter.text, 70));
                    let media = chapter.media().count();
                    if media > 0 {
                        println!("  [{} image(s)]", media);
                    }
                    for choice in chapter.choices() {
                        let target = choice
                            .to_chapter
                            .map(|id| short_id(&id))
                            .unwrap_or_else(|| "(unwritten)".to_string());
                        println!("  → {} [{}]", truncate(&choice.text, 50), target);
                    }
                    if chapter.random_choice && !chapter.choices().is_empty() {
                        println!("  (one choice picked at random)");
                    }
                }
            }
            OutputFormat::Json => {
                println!("{}", pretty(&story_json(story)));
            }
            OutputFormat::Quiet => {
                println!("{}", story.id);
            }
        }
    }

    /// Print a list of stories
    pub fn print_stories(&self, stories: &[Story]) {
        match self.format {
            OutputFormat::Human => {
                if stories.is_empty() {
                    println!("No stories found.");
                    return;
                }
                for story in stories {
                    println!(
                        "{} | {} | {}",
                        short_id(&story.id),
                        truncate(&story.title, 35),
                        truncate(&story.author, 25)
                    );
                }
                println!("\n{} story(ies)", stories.len());
            }
            OutputFormat::Json => {
                let rows: Vec<Value> = stories.iter().map(story_json).collect();
                println!("{}", pretty(&Value::Array(rows)));
            }
            OutputFormat::Quiet => {
                for story in stories {
                    println!("{}", story.id);
                }
            }
        }
    }

    /// Print the outcome of a sync
    pub fn print_report(&self, report: &SyncReport) {
        match self.format {
            OutputFormat::Human => {
                if report.is_complete() {
                    println!("✓ {}", report);
                } else {
                    println!("! {}", report);
                    for failure in &report.failures {
                        println!("  {}: {}", short_id(&failure.chapter_id), failure.error);
                    }
                }
            }
            OutputFormat::Json => {
                println!("{}", pretty(&json!(report)));
            }
            OutputFormat::Quiet => {
                println!("{}", report.story_id);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!("{}", json!({"status": "success", "message": message}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn story_json(story: &Story) -> Value {
    json!({
        "id": story.id,
        "title": story.title,
        "author": story.author,
        "description": story.description,
        "device_id": story.device_id,
        "first_chapter": story.first_chapter_id(),
        "chapters": story.chapters().values().map(chapter_json).collect::<Vec<_>>(),
    })
}

fn chapter_json(chapter: &Chapter) -> Value {
    json!({
        "id": chapter.id,
        "text": chapter.text,
        "random_choice": chapter.random_choice,
        "choices": chapter.choices().iter().map(|c| json!({
            "id": c.id,
            "text": c.text,
            "to_chapter": c.to_chapter,
        })).collect::<Vec<_>>(),
        "media": chapter.media().map(media_json).collect::<Vec<_>>(),
    })
}

fn media_json(media: &Media) -> Value {
    json!({
        "id": media.id,
        "kind": media.kind,
        "path": media.path().map(|p| p.display().to_string()),
    })
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// First eight characters of an id, for tables
pub fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Truncate a string to max chars, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
