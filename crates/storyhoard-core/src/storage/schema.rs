//! SQLite schema for the local store
//!
//! One table per entity type, plus a second story table for stories cached
//! from the server. Parent ids are plain TEXT columns: referential integrity
//! is kept by the managers, not by SQLite.

use rusqlite::{Connection, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Stories authored on this device
pub const STORIES: &str = "stories";
/// Stories cached from the server
pub const CACHED_STORIES: &str = "cached_stories";
pub const CHAPTERS: &str = "chapters";
pub const CHOICES: &str = "choices";
pub const MEDIA: &str = "media";

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Own stories
        CREATE TABLE IF NOT EXISTS stories (
            story_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            description TEXT NOT NULL,
            first_chapter TEXT,
            device_id TEXT NOT NULL
        );

        -- Stories cached from the server (same shape)
        CREATE TABLE IF NOT EXISTS cached_stories (
            story_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            description TEXT NOT NULL,
            first_chapter TEXT,
            device_id TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chapters (
            chapter_id TEXT PRIMARY KEY,
            story_id TEXT NOT NULL,
            text TEXT NOT NULL,
            random_choice TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS choices (
            choice_id TEXT PRIMARY KEY,
            curr_chapter TEXT NOT NULL,
            next_chapter TEXT,
            text TEXT NOT NULL
        );

        -- Media rows only ever hold a file path, never image data
        CREATE TABLE IF NOT EXISTS media (
            media_id TEXT PRIMARY KEY,
            chapter_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            path TEXT NOT NULL
        );

        -- Child lookups by parent id
        CREATE INDEX IF NOT EXISTS idx_chapters_story_id ON chapters(story_id);
        CREATE INDEX IF NOT EXISTS idx_choices_curr_chapter ON choices(curr_chapter);
        CREATE INDEX IF NOT EXISTS idx_media_chapter_id ON media(chapter_id);

        -- Ownership lookups
        CREATE INDEX IF NOT EXISTS idx_stories_device_id ON stories(device_id);
        CREATE INDEX IF NOT EXISTS idx_cached_stories_device_id ON cached_stories(device_id);
        "#,
    )?;

    // Set schema version
    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
pub fn needs_init(conn: &Connection) -> bool {
    let table_exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !table_exists {
        return true;
    }

    match get_schema_version(conn) {
        Ok(Some(v)) => v < SCHEMA_VERSION,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        for table in [STORIES, CACHED_STORIES, CHAPTERS, CHOICES, MEDIA] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_schema_version() {
        let conn = Connection::open_in_memory().unwrap();

        assert!(needs_init(&conn));

        init_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
        assert!(!needs_init(&conn));
    }

    #[test]
    fn test_init_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_indexes_exist() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(indexes.contains(&"idx_chapters_story_id".to_string()));
        assert!(indexes.contains(&"idx_choices_curr_chapter".to_string()));
        assert!(indexes.contains(&"idx_media_chapter_id".to_string()));
    }
}
