//! Read-only queries over a snapshot of server entries.
//!
//! The free functions are pure over a slice; [`QueryEngine`] pulls the
//! current snapshot out of the cache and applies them.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::document::{ServerEntry, OFFICIAL_PREFIX};
use crate::error::{RegistryError, Result};
use crate::storage::SnapshotCache;

pub const DEFAULT_LIMIT: usize = 20;

const CATEGORY_DESCRIPTIONS: &[(&str, &str)] = &[
    ("official", "Reference servers maintained by the Model Context Protocol project"),
    ("community", "Servers built and maintained by the community"),
    ("database", "Servers that query or manage databases"),
    ("filesystem", "Servers for reading and writing files"),
    ("git", "Servers for working with Git repositories and hosting platforms"),
    ("search", "Servers that search the web or indexed content"),
    ("browser", "Servers that drive browsers or fetch web content"),
    ("cloud", "Servers for cloud platforms and infrastructure"),
    ("communication", "Servers for chat, email and messaging"),
    ("ai", "Servers for models, embeddings and memory"),
    ("devtools", "Servers for developer tooling"),
    ("productivity", "Servers for notes, calendars and task tracking"),
    ("monitoring", "Servers for logs, metrics and alerting"),
    ("finance", "Servers for payments and financial data"),
];

/// Filters for a search; every filter that is set must match
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub category: Option<String>,
    /// `None` means [`DEFAULT_LIMIT`], `Some(0)` means no limit
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Matches before the limit was applied
    pub total: usize,
    pub servers: Vec<ServerEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub name: String,
    pub count: usize,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct CategoryListing {
    pub total: usize,
    pub categories: Vec<CategorySummary>,
}

#[derive(Debug, Clone)]
pub struct RefreshSummary {
    pub count: usize,
    pub source: String,
}

fn matches_text(entry: &ServerEntry, needle: &str) -> bool {
    entry.name.to_lowercase().contains(needle)
        || entry.description.to_lowercase().contains(needle)
        || entry.tags.iter().any(|t| t.to_lowercase().contains(needle))
}

/// Entries matching the query, in snapshot order, plus the untruncated match count
pub fn search<'a>(entries: &'a [ServerEntry], query: &SearchQuery) -> (usize, Vec<&'a ServerEntry>) {
    let needle = query
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let matches: Vec<&ServerEntry> = entries
        .iter()
        .filter(|e| needle.as_deref().is_none_or(|n| matches_text(e, n)))
        .filter(|e| category.is_none_or(|c| e.category.eq_ignore_ascii_case(c)))
        .collect();

    let total = matches.len();
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let matches = if limit > 0 {
        matches.into_iter().take(limit).collect()
    } else {
        matches
    };
    (total, matches)
}

/// Look an entry up by id or name, tolerating a missing namespace prefix
pub fn find_entry<'a>(entries: &'a [ServerEntry], server_id: &str) -> Option<&'a ServerEntry> {
    let wanted = server_id.trim();
    let prefixed = format!("{}{}", OFFICIAL_PREFIX, wanted);

    entries.iter().find(|e| {
        [wanted, prefixed.as_str()]
            .iter()
            .any(|candidate| e.id.eq_ignore_ascii_case(candidate) || e.name.eq_ignore_ascii_case(candidate))
    })
}

pub fn category_description(name: &str) -> String {
    CATEGORY_DESCRIPTIONS
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, description)| description.to_string())
        .unwrap_or_else(|| format!("Servers in the {} category", name))
}

/// Per-category counts, largest first
pub fn categories(entries: &[ServerEntry]) -> Vec<CategorySummary> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.category.as_str()).or_default() += 1;
    }

    let mut summaries: Vec<CategorySummary> = counts
        .into_iter()
        .map(|(name, count)| CategorySummary {
            name: name.to_string(),
            count,
            description: category_description(name),
        })
        .collect();
    // BTreeMap already ordered names, the stable sort keeps that for ties
    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

/// Answers queries against whatever snapshot the cache currently serves
#[derive(Clone)]
pub struct QueryEngine {
    cache: Arc<SnapshotCache>,
}

impl QueryEngine {
    pub fn new(cache: Arc<SnapshotCache>) -> Self {
        Self { cache }
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome> {
        let snapshot = self.cache.get().await?;
        let (total, servers) = search(snapshot.entries(), query);
        Ok(SearchOutcome {
            total,
            servers: servers.into_iter().cloned().collect(),
        })
    }

    /// `Ok(None)` when nothing matches; a missing or blank id is an invalid argument
    pub async fn get_details(&self, server_id: Option<&str>) -> Result<Option<ServerEntry>> {
        let Some(server_id) = server_id.filter(|id| !id.trim().is_empty()) else {
            return Err(RegistryError::InvalidArgument("serverId is required".to_string()));
        };

        let snapshot = self.cache.get().await?;
        Ok(find_entry(snapshot.entries(), server_id).cloned())
    }

    pub async fn list_categories(&self) -> Result<CategoryListing> {
        let snapshot = self.cache.get().await?;
        Ok(CategoryListing {
            total: snapshot.len(),
            categories: categories(snapshot.entries()),
        })
    }

    pub async fn refresh(&self) -> Result<RefreshSummary> {
        let snapshot = self.cache.refresh().await?;
        Ok(RefreshSummary {
            count: snapshot.len(),
            source: snapshot.source().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, name: &str, category: &str, tags: &[&str]) -> ServerEntry {
        ServerEntry {
            id: id.to_string(),
            name: name.to_string(),
            description: format!("{} description", name),
            category: category.to_string(),
            author: "Community".to_string(),
            repository_url: format!("https://github.com/acme/{}", id),
            version: "latest".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            downloads: 0,
            stars: 0,
        }
    }

    fn sample() -> Vec<ServerEntry> {
        vec![
            entry("mcp-filesystem", "Filesystem", "official", &["official", "filesystem"]),
            entry("mcp-git", "Git", "official", &["official", "git"]),
            entry("slack-bot", "Slack Bot", "community", &["community", "communication"]),
            entry("postgres", "Postgres", "community", &["community", "database"]),
            entry("weather", "Weather", "Weather", &["weather"]),
        ]
    }

    #[test]
    fn test_search_without_filters_keeps_order() {
        let entries = sample();
        let (total, found) = search(&entries, &SearchQuery { limit: Some(3), ..Default::default() });

        assert_eq!(total, 5);
        let ids: Vec<_> = found.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["mcp-filesystem", "mcp-git", "slack-bot"]);
    }

    #[test]
    fn test_search_default_limit() {
        let entries: Vec<_> = (0..30)
            .map(|i| entry(&format!("s{}", i), &format!("S{}", i), "community", &[]))
            .collect();
        let (total, found) = search(&entries, &SearchQuery::default());

        assert_eq!(total, 30);
        assert_eq!(found.len(), DEFAULT_LIMIT);

        let (_, all) = search(&entries, &SearchQuery { limit: Some(0), ..Default::default() });
        assert_eq!(all.len(), 30);
    }

    #[test]
    fn test_search_matches_name_description_and_tags() {
        let entries = sample();

        let by_name = SearchQuery { query: Some("SLACK".to_string()), ..Default::default() };
        assert_eq!(search(&entries, &by_name).1[0].id, "slack-bot");

        let by_description = SearchQuery { query: Some("git description".to_string()), ..Default::default() };
        assert_eq!(search(&entries, &by_description).1[0].id, "mcp-git");

        let by_tag = SearchQuery { query: Some("database".to_string()), ..Default::default() };
        let (total, found) = search(&entries, &by_tag);
        assert_eq!(total, 1);
        assert_eq!(found[0].id, "postgres");
    }

    #[test]
    fn test_search_category_and_query_compose() {
        let entries = sample();

        let official = SearchQuery { category: Some("OFFICIAL".to_string()), ..Default::default() };
        let (_, found) = search(&entries, &official);
        assert!(found.iter().all(|e| e.category == "official"));
        assert_eq!(found.len(), 2);

        let both = SearchQuery {
            query: Some("git".to_string()),
            category: Some("official".to_string()),
            limit: None,
        };
        let (_, found) = search(&entries, &both);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "mcp-git");

        let none = SearchQuery {
            query: Some("slack".to_string()),
            category: Some("official".to_string()),
            limit: None,
        };
        assert!(search(&entries, &none).1.is_empty());
    }

    #[test]
    fn test_find_entry_is_prefix_tolerant() {
        let entries = sample();

        assert_eq!(find_entry(&entries, "filesystem").unwrap().id, "mcp-filesystem");
        assert_eq!(find_entry(&entries, "mcp-git").unwrap().id, "mcp-git");
        assert_eq!(find_entry(&entries, "Slack Bot").unwrap().id, "slack-bot");
        assert!(find_entry(&entries, "nonexistent-xyz").is_none());
    }

    #[test]
    fn test_categories_cover_snapshot() {
        let entries = sample();
        let summaries = categories(&entries);

        let total: usize = summaries.iter().map(|c| c.count).sum();
        assert_eq!(total, entries.len());
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].name, "community");
        assert_eq!(summaries[1].name, "official");
        assert_eq!(summaries[2].name, "Weather");
        assert_eq!(summaries[2].description, "Servers in the Weather category");
        assert!(summaries[1].description.contains("Reference servers"));
    }
}
