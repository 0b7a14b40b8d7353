//! HTTP document store
//!
//! Talks to an Elasticsearch-style REST server. Each collection is the index
//! `{index}-{collection}`:
//!
//! - `PUT/GET/DELETE {base}/{index}-{collection}/_doc/{id}`
//! - `POST {base}/{index}-{collection}/_search` with a `query_string` query
//!
//! A 404 means the document (or the whole index) does not exist yet. Any
//! other non-2xx status is a transport error.

use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::criteria::{Match, SearchCriteria};
use crate::models::fields;
use crate::storage::{StoreError, StoreResult};

/// Maximum hits returned by one search
const SEARCH_SIZE: usize = 1000;

/// Characters with meaning in the query_string syntax
const RESERVED: &[char] = &[
    '+', '-', '=', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':',
    '\\', '/',
];

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    total: Option<Total>,
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: Value,
}

/// `hits.total` is an object on newer servers and a bare count on older ones
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Total {
    Count(u64),
    Object { value: u64 },
}

impl Total {
    fn value(&self) -> u64 {
        match self {
            Total::Count(n) | Total::Object { value: n } => *n,
        }
    }
}

impl SearchResponse {
    fn truncated(&self) -> bool {
        self.hits
            .total
            .as_ref()
            .is_some_and(|total| total.value() > self.hits.hits.len() as u64)
    }

    /// Document sources, warning when the server matched more than it sent
    fn into_sources(self, collection: &str) -> Vec<Value> {
        if self.truncated() {
            warn!(
                "Search in {} matched {} documents but only {} were returned",
                collection,
                self.hits.total.as_ref().map_or(0, Total::value),
                self.hits.hits.len()
            );
        }
        self.hits.hits.into_iter().map(|hit| hit.source).collect()
    }
}

/// Remote document store over HTTP
#[derive(Debug, Clone)]
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
    index: String,
}

impl HttpDocumentStore {
    pub fn new(base_url: &str, index: &str, timeout: Duration) -> StoreResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}-{}", self.base_url, self.index, collection)
    }

    fn doc_url(&self, collection: &str, id: Uuid) -> String {
        format!("{}/_doc/{}", self.collection_url(collection), id)
    }

    pub async fn put(&self, collection: &str, id: Uuid, document: &Value) -> StoreResult<()> {
        let response = self
            .client
            .put(self.doc_url(collection, id))
            .query(&[("refresh", "wait_for")])
            .json(document)
            .send()
            .await?;
        check_status(response).await?;
        debug!("PUT {}/{}", collection, id);
        Ok(())
    }

    pub async fn get(&self, collection: &str, id: Uuid) -> StoreResult<Option<Value>> {
        let response = self.client.get(self.doc_url(collection, id)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: GetResponse = check_status(response).await?.json().await?;
        Ok(if body.found { body.source } else { None })
    }

    /// Returns `false` if there was no such document
    pub async fn delete(&self, collection: &str, id: Uuid) -> StoreResult<bool> {
        let response = self
            .client
            .delete(self.doc_url(collection, id))
            .query(&[("refresh", "wait_for")])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        check_status(response).await?;
        debug!("DELETE {}/{}", collection, id);
        Ok(true)
    }

    pub async fn search(
        &self,
        collection: &str,
        criteria: &SearchCriteria,
    ) -> StoreResult<Vec<Value>> {
        let body = json!({
            "size": SEARCH_SIZE,
            "query": query_body(criteria),
        });

        let response = self
            .client
            .post(format!("{}/_search", self.collection_url(collection)))
            .json(&body)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let result: SearchResponse = check_status(response).await?.json().await?;
        Ok(result.into_sources(collection))
    }
}

async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Transport(format!(
        "server returned {}: {}",
        status,
        body.trim()
    )))
}

/// Search body for criteria; empty criteria match everything
pub fn query_body(criteria: &SearchCriteria) -> Value {
    match render_query(criteria) {
        Some(query) => json!({
            "query_string": {
                "query": query,
                "default_field": fields::TITLE,
                "default_operator": "AND",
            }
        }),
        None => json!({ "match_all": {} }),
    }
}

/// Render criteria as an AND-joined query string
///
/// Title keywords go bare against the default field, so the title
/// "love story" becomes `love AND story`. Keywords left empty after
/// escaping are skipped; `None` when nothing is left to match on.
pub fn render_query(criteria: &SearchCriteria) -> Option<String> {
    let parts: Vec<String> = criteria
        .terms()
        .iter()
        .filter_map(|term| match term.matching {
            Match::Keyword => {
                let keyword = escape_term(&term.value);
                if keyword.is_empty() {
                    None
                } else if term.field == fields::TITLE {
                    Some(keyword)
                } else {
                    Some(format!("{}:*{}*", term.field, keyword))
                }
            }
            Match::Exact => Some(format!(
                "{}:\"{}\"",
                term.field,
                escape_phrase(&term.value)
            )),
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" AND "))
    }
}

/// Escape a bare term; `<` and `>` cannot be escaped and are dropped
fn escape_term(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        match c {
            '<' | '>' => {}
            c if RESERVED.contains(&c) => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}

fn escape_phrase(phrase: &str) -> String {
    phrase.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChapterQuery, Criteria, StoryQuery};

    #[test]
    fn test_title_keywords_render_as_and() {
        let criteria = StoryQuery::titled("love story").search_criteria();
        assert_eq!(render_query(&criteria).as_deref(), Some("love AND story"));
    }

    #[test]
    fn test_exact_terms_are_quoted() {
        let story_id = Uuid::new_v4();
        let criteria = ChapterQuery::in_story(story_id).search_criteria();
        assert_eq!(
            render_query(&criteria),
            Some(format!("story_id:\"{}\"", story_id))
        );
    }

    #[test]
    fn test_mixed_terms_keep_order() {
        let criteria = StoryQuery::titled("Bugs").from_device("d1").search_criteria();
        assert_eq!(
            render_query(&criteria).as_deref(),
            Some("Bugs AND device_id:\"d1\"")
        );
    }

    #[test]
    fn test_non_title_keywords_use_wildcards() {
        let mut criteria = SearchCriteria::new();
        criteria.keywords(fields::AUTHOR, "Sham");
        assert_eq!(render_query(&criteria).as_deref(), Some("author:*Sham*"));
    }

    #[test]
    fn test_reserved_characters_escaped() {
        let criteria = StoryQuery::titled("what? (really) <b>").search_criteria();
        assert_eq!(
            render_query(&criteria).as_deref(),
            Some("what\\? AND \\(really\\) AND b")
        );

        let mut criteria = SearchCriteria::new();
        criteria.exact(fields::DEVICE_ID, "a\"b");
        assert_eq!(
            render_query(&criteria).as_deref(),
            Some("device_id:\"a\\\"b\"")
        );
    }

    #[test]
    fn test_unsearchable_keywords_skipped() {
        let criteria = StoryQuery::titled("love <>").search_criteria();
        assert_eq!(render_query(&criteria).as_deref(), Some("love"));

        let criteria = StoryQuery::titled("<> love >").from_device("d1").search_criteria();
        assert_eq!(
            render_query(&criteria).as_deref(),
            Some("love AND device_id:\"d1\"")
        );

        let mut criteria = SearchCriteria::new();
        criteria.keywords(fields::AUTHOR, "<<");
        assert_eq!(render_query(&criteria), None);
        assert!(query_body(&criteria).get("match_all").is_some());
    }

    #[test]
    fn test_search_response_total_forms() {
        let sent = json!([{ "_source": { "id": 1 } }, { "_source": { "id": 2 } }]);

        let capped: SearchResponse = serde_json::from_value(json!({
            "hits": { "total": { "value": 5000, "relation": "eq" }, "hits": sent }
        }))
        .unwrap();
        assert!(capped.truncated());
        assert_eq!(capped.into_sources("stories").len(), 2);

        let legacy: SearchResponse =
            serde_json::from_value(json!({ "hits": { "total": 2, "hits": sent } })).unwrap();
        assert!(!legacy.truncated());

        let bare: SearchResponse =
            serde_json::from_value(json!({ "hits": { "hits": sent } })).unwrap();
        assert!(!bare.truncated());
        assert_eq!(
            bare.into_sources("stories"),
            vec![json!({ "id": 1 }), json!({ "id": 2 })]
        );
    }

    #[test]
    fn test_empty_criteria_match_all() {
        let body = query_body(&SearchCriteria::new());
        assert!(body.get("match_all").is_some());

        let body = query_body(&StoryQuery::titled("love story").search_criteria());
        assert_eq!(body["query_string"]["query"], "love AND story");
        assert_eq!(body["query_string"]["default_operator"], "AND");
        assert_eq!(body["query_string"]["default_field"], "title");
    }

    #[test]
    fn test_urls() {
        let store =
            HttpDocumentStore::new("http://localhost:9200/", "hoard", Duration::from_secs(1))
                .unwrap();
        let id = Uuid::nil();
        assert_eq!(store.base_url(), "http://localhost:9200");
        assert_eq!(
            store.doc_url("stories", id),
            format!("http://localhost:9200/hoard-stories/_doc/{}", id)
        );
    }
}
