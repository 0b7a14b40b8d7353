//! Search criteria shared by the local and remote stores
//!
//! Every criteria type (`StoryQuery`, `ChapterQuery`, ...) flattens into a
//! `SearchCriteria`: an ordered list of field-name → value terms. Both store
//! adapters build their filters from it, so the field names double as local
//! column names and remote document field names.
//!
//! An empty `SearchCriteria` matches everything.

/// How a term compares against the stored field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// Field equals the value
    Exact,
    /// Field contains the value as a keyword
    Keyword,
}

/// A single field filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub field: &'static str,
    pub value: String,
    pub matching: Match,
}

/// Conjunction of field filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    terms: Vec<Term>,
}

impl SearchCriteria {
    /// Criteria that match everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an exact-match term
    pub fn exact(&mut self, field: &'static str, value: impl Into<String>) {
        self.terms.push(Term {
            field,
            value: value.into(),
            matching: Match::Exact,
        });
    }

    /// Add an exact-match term if the value is set
    pub fn exact_opt<T: ToString>(&mut self, field: &'static str, value: Option<&T>) {
        if let Some(value) = value {
            self.exact(field, value.to_string());
        }
    }

    /// Split `text` on whitespace and add one keyword term per token
    ///
    /// Tokens keep their case. Blank text adds nothing.
    pub fn keywords(&mut self, field: &'static str, text: &str) {
        for word in text.split_whitespace() {
            self.terms.push(Term {
                field,
                value: word.to_string(),
                matching: Match::Keyword,
            });
        }
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// First value recorded for a field
    pub fn get(&self, field: &str) -> Option<&str> {
        self.terms
            .iter()
            .find(|t| t.field == field)
            .map(|t| t.value.as_str())
    }

    /// All values recorded for a field, in order
    pub fn values<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.terms
            .iter()
            .filter(move |t| t.field == field)
            .map(|t| t.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_criteria_matches_everything() {
        let criteria = SearchCriteria::new();
        assert!(criteria.is_empty());
        assert_eq!(criteria.len(), 0);
        assert_eq!(criteria.get("title"), None);
    }

    #[test]
    fn test_keywords_split_on_whitespace() {
        let mut criteria = SearchCriteria::new();
        criteria.keywords("title", "  love   Story\tagain ");

        let words: Vec<&str> = criteria.values("title").collect();
        assert_eq!(words, vec!["love", "Story", "again"]);
        assert!(criteria
            .terms()
            .iter()
            .all(|t| t.matching == Match::Keyword));
    }

    #[test]
    fn test_blank_keywords_add_nothing() {
        let mut criteria = SearchCriteria::new();
        criteria.keywords("title", "   ");
        assert!(criteria.is_empty());
    }

    #[test]
    fn test_exact_opt_skips_unset() {
        let mut criteria = SearchCriteria::new();
        criteria.exact_opt::<String>("device_id", None);
        criteria.exact_opt("random_choice", Some(&true));

        assert_eq!(criteria.len(), 1);
        assert_eq!(criteria.get("random_choice"), Some("true"));
    }
}
