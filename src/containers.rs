//! Value containers wrapping raw client results.

use crate::client::{ChatId, GeoPoint, InlineBotResults, InlineQuery, InlineResult};

/// Results of an inline query, together with the query that produced them.
#[derive(Debug, Clone)]
pub struct InlineResultContainer {
    pub bot: ChatId,
    pub query: InlineQuery,
    pub query_id: i64,
    pub results: Vec<InlineResult>,
    pub next_offset: Option<String>,
    pub gallery: bool,
}

impl InlineResultContainer {
    pub fn new(bot: ChatId, query: InlineQuery, raw: InlineBotResults) -> Self {
        Self {
            bot,
            query,
            query_id: raw.query_id,
            results: raw.results,
            next_offset: raw.next_offset.filter(|o| !o.is_empty()),
            gallery: raw.gallery,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn geo_point(&self) -> Option<GeoPoint> {
        self.query.geo_point
    }

    /// Whether the bot announced another page of results.
    pub fn has_more(&self) -> bool {
        self.next_offset.is_some()
    }

    /// Results whose title contains `pattern`, case-insensitively.
    pub fn find_results(&self, pattern: &str) -> Vec<&InlineResult> {
        let pattern = pattern.to_lowercase();
        self.results
            .iter()
            .filter(|r| {
                r.title
                    .as_deref()
                    .is_some_and(|t| t.to_lowercase().contains(&pattern))
            })
            .collect()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&InlineResult> {
        self.results.iter().find(|r| r.id == id)
    }
}
