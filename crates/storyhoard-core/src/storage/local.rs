//! Local SQLite store
//!
//! `LocalStore` owns the single connection. `LocalAdapter<R>` does flat CRUD
//! for one entity type against one table; assembling aggregates is left to
//! the managers.
//!
//! Filters come from `SearchCriteria`: exact terms become `col = ?`, keyword
//! terms become `col LIKE ?` with the keyword escaped, all AND-joined.

use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, Row};
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::criteria::{Match, SearchCriteria};
use crate::models::{fields, Chapter, Choice, EntityKind, Media, MediaData, MediaKind, Story};
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::schema::{self, init_schema, needs_init};

/// The local embedded database
pub struct LocalStore {
    conn: Mutex<Connection>,
}

impl LocalStore {
    /// Open or create the SQLite database
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let path = config.sqlite_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open SQLite database at {:?}", path))?;

        if needs_init(&conn) {
            init_schema(&conn).context("Failed to initialize SQLite schema")?;
        }

        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Lock the connection
    ///
    /// A panic while holding the lock cannot leave a half-applied statement,
    /// so a poisoned lock is still usable.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of rows in a table
    pub fn count(&self, table: &str) -> StoreResult<usize> {
        let conn = self.conn();
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
        Ok(count as usize)
    }
}

/// An entity that maps to one row of a table
pub trait Record: Sized {
    const KIND: EntityKind;
    /// Column names; the id column comes first
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> Uuid;

    /// Column values in `COLUMNS` order
    fn to_values(&self) -> StoreResult<Vec<Value>>;

    /// Read a row selected with `COLUMNS`
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Flat CRUD for one entity type against one table
pub struct LocalAdapter<R> {
    store: Arc<LocalStore>,
    table: &'static str,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for LocalAdapter<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            table: self.table,
            _record: PhantomData,
        }
    }
}

impl<R: Record> LocalAdapter<R> {
    pub fn new(store: Arc<LocalStore>, table: &'static str) -> Self {
        Self {
            store,
            table,
            _record: PhantomData,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    fn id_column() -> &'static str {
        R::COLUMNS[0]
    }

    fn column_list() -> String {
        R::COLUMNS.join(", ")
    }

    /// Whether a row with this id exists
    pub fn exists(&self, id: Uuid) -> StoreResult<bool> {
        let conn = self.store.conn();
        Ok(exists_in(&conn, self.table, Self::id_column(), id)?)
    }

    /// Insert a new row; fails with `DuplicateKey` if the id is taken
    pub fn insert(&self, record: &R) -> StoreResult<()> {
        let values = record.to_values()?;
        let conn = self.store.conn();

        if exists_in(&conn, self.table, Self::id_column(), record.id())? {
            return Err(StoreError::DuplicateKey {
                kind: R::KIND,
                id: record.id(),
            });
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            Self::column_list(),
            placeholders(R::COLUMNS.len())
        );
        conn.execute(&sql, params_from_iter(values))?;
        debug!("Inserted {} {} into {}", R::KIND, record.id(), self.table);
        Ok(())
    }

    /// Replace an existing row; fails with `NotFound` if the id is missing
    pub fn update(&self, record: &R) -> StoreResult<()> {
        let mut values = record.to_values()?;
        // Id moves from the first column to the WHERE clause
        let id = values.remove(0);
        values.push(id);

        let assignments = R::COLUMNS[1..]
            .iter()
            .map(|col| format!("{} = ?", col))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table,
            assignments,
            Self::id_column()
        );

        let conn = self.store.conn();
        let changed = conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: R::KIND,
                id: record.id(),
            });
        }
        debug!("Updated {} {} in {}", R::KIND, record.id(), self.table);
        Ok(())
    }

    /// Insert or replace a row
    pub fn upsert(&self, record: &R) -> StoreResult<()> {
        let values = record.to_values()?;
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            self.table,
            Self::column_list(),
            placeholders(R::COLUMNS.len())
        );

        let conn = self.store.conn();
        conn.execute(&sql, params_from_iter(values))?;
        debug!("Upserted {} {} into {}", R::KIND, record.id(), self.table);
        Ok(())
    }

    /// All rows matching the criteria, in insertion order
    pub fn retrieve(&self, criteria: &SearchCriteria) -> StoreResult<Vec<R>> {
        let (where_sql, params) = where_clause::<R>(self.table, criteria)?;
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY rowid",
            Self::column_list(),
            self.table,
            where_sql
        );

        let conn = self.store.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), |row| R::from_row(row))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn get(&self, id: Uuid) -> StoreResult<Option<R>> {
        let mut criteria = SearchCriteria::new();
        criteria.exact(Self::id_column(), id.to_string());
        Ok(self.retrieve(&criteria)?.into_iter().next())
    }

    /// Delete a row; fails with `NotFound` if the id is missing
    pub fn remove(&self, id: Uuid) -> StoreResult<()> {
        let sql = format!("DELETE FROM {} WHERE {} = ?", self.table, Self::id_column());

        let conn = self.store.conn();
        let changed = conn.execute(&sql, [id.to_string()])?;
        if changed == 0 {
            return Err(StoreError::NotFound { kind: R::KIND, id });
        }
        debug!("Removed {} {} from {}", R::KIND, id, self.table);
        Ok(())
    }

    /// Delete every row matching the criteria, returning how many went
    pub fn remove_matching(&self, criteria: &SearchCriteria) -> StoreResult<usize> {
        let (where_sql, params) = where_clause::<R>(self.table, criteria)?;
        let sql = format!("DELETE FROM {}{}", self.table, where_sql);

        let conn = self.store.conn();
        let removed = conn.execute(&sql, params_from_iter(params))?;
        Ok(removed)
    }
}

fn exists_in(conn: &Connection, table: &str, id_column: &str, id: Uuid) -> rusqlite::Result<bool> {
    conn.prepare(&format!("SELECT 1 FROM {} WHERE {} = ?", table, id_column))?
        .exists([id.to_string()])
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Build ` WHERE ...` and its parameters from criteria
///
/// Empty criteria give an empty clause, matching every row.
fn where_clause<R: Record>(
    table: &'static str,
    criteria: &SearchCriteria,
) -> StoreResult<(String, Vec<String>)> {
    if criteria.is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    let mut clauses = Vec::with_capacity(criteria.len());
    let mut params = Vec::with_capacity(criteria.len());

    for term in criteria.terms() {
        // Column names are interpolated, so only known ones get through
        if !R::COLUMNS.contains(&term.field) {
            return Err(StoreError::UnknownField {
                table,
                field: term.field,
            });
        }
        match term.matching {
            Match::Exact => {
                clauses.push(format!("{} = ?", term.field));
                params.push(term.value.clone());
            }
            Match::Keyword => {
                clauses.push(format!("{} LIKE ? ESCAPE '\\'", term.field));
                params.push(format!("%{}%", escape_like(&term.value)));
            }
        }
    }

    Ok((format!(" WHERE {}", clauses.join(" AND ")), params))
}

/// Escape LIKE metacharacters so a keyword matches literally
fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// ==================== Row mapping ====================

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        Uuid::parse_str(&t)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn text(value: impl ToString) -> Value {
    Value::Text(value.to_string())
}

fn opt_text(value: Option<impl ToString>) -> Value {
    value.map(text).unwrap_or(Value::Null)
}

impl Record for Story {
    const KIND: EntityKind = EntityKind::Story;
    const COLUMNS: &'static [&'static str] = &[
        fields::STORY_ID,
        fields::TITLE,
        fields::AUTHOR,
        fields::DESCRIPTION,
        fields::FIRST_CHAPTER,
        fields::DEVICE_ID,
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_values(&self) -> StoreResult<Vec<Value>> {
        Ok(vec![
            text(self.id),
            text(&self.title),
            text(&self.author),
            text(&self.description),
            opt_text(self.first_chapter_id),
            text(&self.device_id),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Story {
            id: uuid_at(row, 0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            description: row.get(3)?,
            first_chapter_id: opt_uuid_at(row, 4)?,
            device_id: row.get(5)?,
            chapters: Default::default(),
        })
    }
}

impl Record for Chapter {
    const KIND: EntityKind = EntityKind::Chapter;
    const COLUMNS: &'static [&'static str] = &[
        fields::CHAPTER_ID,
        fields::STORY_ID,
        fields::TEXT,
        fields::RANDOM_CHOICE,
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_values(&self) -> StoreResult<Vec<Value>> {
        Ok(vec![
            text(self.id),
            text(self.story_id()),
            text(&self.text),
            text(self.random_choice),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let mut chapter = Chapter::with_id(uuid_at(row, 0)?, uuid_at(row, 1)?, row.get::<_, String>(2)?);
        let random: String = row.get(3)?;
        chapter.random_choice = random == "true";
        Ok(chapter)
    }
}

impl Record for Choice {
    const KIND: EntityKind = EntityKind::Choice;
    const COLUMNS: &'static [&'static str] = &[
        fields::CHOICE_ID,
        fields::CURR_CHAPTER,
        fields::NEXT_CHAPTER,
        fields::TEXT,
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_values(&self) -> StoreResult<Vec<Value>> {
        Ok(vec![
            text(self.id),
            text(self.from_chapter),
            opt_text(self.to_chapter),
            text(&self.text),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Choice {
            id: uuid_at(row, 0)?,
            from_chapter: uuid_at(row, 1)?,
            to_chapter: opt_uuid_at(row, 2)?,
            text: row.get(3)?,
        })
    }
}

impl Record for Media {
    const KIND: EntityKind = EntityKind::Media;
    const COLUMNS: &'static [&'static str] = &[
        fields::MEDIA_ID,
        fields::CHAPTER_ID,
        fields::KIND,
        fields::PATH,
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    /// Only local media can be stored; base64 data never reaches the table
    fn to_values(&self) -> StoreResult<Vec<Value>> {
        let path = self.path().ok_or_else(|| StoreError::Conversion {
            id: self.id,
            details: "media must be written to a local file before it is stored".to_string(),
        })?;

        Ok(vec![
            text(self.id),
            text(self.chapter_id),
            text(self.kind),
            text(path.to_string_lossy()),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind: String = row.get(2)?;
        let kind = MediaKind::parse(&kind).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Text,
                format!("unknown media kind '{}'", kind).into(),
            )
        })?;
        let path: String = row.get(3)?;

        Ok(Media {
            id: uuid_at(row, 0)?,
            chapter_id: uuid_at(row, 1)?,
            kind,
            data: MediaData::Local(PathBuf::from(path)),
        })
    }
}

/// Local adapters for every table, sharing one store
#[derive(Clone)]
pub struct LocalTables {
    pub stories: LocalAdapter<Story>,
    pub cached_stories: LocalAdapter<Story>,
    pub chapters: LocalAdapter<Chapter>,
    pub choices: LocalAdapter<Choice>,
    pub media: LocalAdapter<Media>,
}

impl LocalTables {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self {
            stories: LocalAdapter::new(Arc::clone(&store), schema::STORIES),
            cached_stories: LocalAdapter::new(Arc::clone(&store), schema::CACHED_STORIES),
            chapters: LocalAdapter::new(Arc::clone(&store), schema::CHAPTERS),
            choices: LocalAdapter::new(Arc::clone(&store), schema::CHOICES),
            media: LocalAdapter::new(store, schema::MEDIA),
        }
    }
}
