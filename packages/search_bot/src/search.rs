//! Keyword search over a user's own records.
//!
//! Matching is a case-insensitive, unanchored substring test. There is no
//! tokenization, stemming or ranking: hits come back in insertion order and
//! the list is cut at `max_results`.

use std::sync::Arc;

use crate::config::SearchConfig;
use crate::error::{BotError, BotResult};
use crate::repository::ContentRepository;

/// A validated search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    requester_id: i64,
    keyword: String,
}

impl SearchQuery {
    /// Rejects empty and whitespace-only keywords.
    pub fn new(requester_id: i64, keyword: &str) -> BotResult<Self> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(BotError::MalformedInput(
                "search keyword must not be empty".to_string(),
            ));
        }
        Ok(Self {
            requester_id,
            keyword: keyword.to_string(),
        })
    }

    pub fn requester_id(&self) -> i64 {
        self.requester_id
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub record_id: i64,
    /// Body cut to the preview length
    pub preview: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    /// More records matched than `max_results`
    pub truncated: bool,
}

#[derive(Clone)]
pub struct SearchEngine {
    repository: Arc<ContentRepository>,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(repository: Arc<ContentRepository>, config: SearchConfig) -> Self {
        Self { repository, config }
    }

    pub fn max_results(&self) -> usize {
        self.config.max_results
    }

    pub fn preview_chars(&self) -> usize {
        self.config.preview_chars
    }

    pub async fn search(&self, query: &SearchQuery) -> BotResult<SearchResults> {
        // One extra row tells a full page apart from a cut one
        let mut records = self
            .repository
            .search_by_owner(
                query.requester_id,
                &query.keyword,
                self.config.max_results.saturating_add(1),
            )
            .await?;
        let truncated = records.len() > self.config.max_results;
        records.truncate(self.config.max_results);

        let hits = records
            .into_iter()
            .map(|r| SearchHit {
                record_id: r.id,
                preview: preview(&r.body, self.config.preview_chars),
                link: r.source.and_then(|s| s.link()),
            })
            .collect();
        Ok(SearchResults { hits, truncated })
    }
}

/// First `max_chars` characters of `body`, cut on a char boundary.
pub fn preview(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageRef, NewContentRecord};
    use crate::repository::test_helpers;

    async fn engine() -> SearchEngine {
        let repo = Arc::new(test_helpers::test_repository().await);
        SearchEngine::new(repo, SearchConfig::default())
    }

    #[test]
    fn empty_keyword_is_rejected() {
        assert!(matches!(
            SearchQuery::new(1, ""),
            Err(BotError::MalformedInput(_))
        ));
        assert!(matches!(
            SearchQuery::new(1, " \t\n "),
            Err(BotError::MalformedInput(_))
        ));
    }

    #[test]
    fn keyword_is_trimmed() {
        let q = SearchQuery::new(7, "  matrix ").unwrap();
        assert_eq!(q.keyword(), "matrix");
        assert_eq!(q.requester_id(), 7);
    }

    #[test]
    fn preview_counts_characters_not_bytes() {
        assert_eq!(preview("ñandú sabroso", 5), "ñandú");
        assert_eq!(preview("short", 100), "short");
    }

    #[tokio::test]
    async fn results_are_capped() {
        let engine = engine().await;
        for i in 0..15 {
            engine
                .repository
                .insert(1, &format!("matching item {}", i))
                .await
                .unwrap();
        }

        let results = engine
            .search(&SearchQuery::new(1, "MATCHING").unwrap())
            .await
            .unwrap();
        assert!(results.truncated);
        assert_eq!(results.hits.len(), 10);
        assert_eq!(results.hits[0].preview, "matching item 0");
        assert_eq!(results.hits[9].preview, "matching item 9");
    }

    #[tokio::test]
    async fn exactly_max_results_is_not_truncated() {
        let engine = engine().await;
        for i in 0..10 {
            engine
                .repository
                .insert(1, &format!("matching item {}", i))
                .await
                .unwrap();
        }

        let results = engine
            .search(&SearchQuery::new(1, "matching").unwrap())
            .await
            .unwrap();
        assert_eq!(results.hits.len(), 10);
        assert!(!results.truncated);
    }

    #[tokio::test]
    async fn preview_does_not_alter_stored_body() {
        let engine = engine().await;
        let long = "x".repeat(250);
        let id = engine.repository.insert(1, &long).await.unwrap();

        let hits = engine
            .search(&SearchQuery::new(1, "x").unwrap())
            .await
            .unwrap()
            .hits;
        assert_eq!(hits[0].preview.chars().count(), 100);

        let stored = engine.repository.get_by_owner(1, id).await.unwrap().unwrap();
        assert_eq!(stored.body.len(), 250);
    }

    #[tokio::test]
    async fn hits_carry_links_for_supergroup_sources() {
        let engine = engine().await;
        engine
            .repository
            .insert_record(
                &NewContentRecord::new(1, "linked matrix")
                    .with_source(MessageRef::new(-1001918569531, 77)),
            )
            .await
            .unwrap();
        engine.repository.insert(1, "plain matrix").await.unwrap();

        let hits = engine
            .search(&SearchQuery::new(1, "matrix").unwrap())
            .await
            .unwrap()
            .hits;
        assert_eq!(
            hits[0].link.as_deref(),
            Some("https://t.me/c/1918569531/77")
        );
        assert!(hits[1].link.is_none());
    }

    #[tokio::test]
    async fn search_is_scoped_to_requester() {
        let engine = engine().await;
        engine.repository.insert(2, "Inception").await.unwrap();
        let results = engine
            .search(&SearchQuery::new(1, "inception").unwrap())
            .await
            .unwrap();
        assert!(results.hits.is_empty());
        assert!(!results.truncated);
    }
}
