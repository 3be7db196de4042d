use pulldown_cmark::{Event, Parser, Tag};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::github::RepoLocation;

/// Upper bound on entries kept from one document
pub const MAX_ENTRIES: usize = 50;
/// Namespace prefix carried by reference server ids
pub const OFFICIAL_PREFIX: &str = "mcp-";
pub const REFERENCE_AUTHOR: &str = "Model Context Protocol";
pub const COMMUNITY_AUTHOR: &str = "Community";
pub const DEFAULT_VERSION: &str = "latest";

pub const OFFICIAL: &str = "official";
pub const COMMUNITY: &str = "community";

// `- **Name** - description`, tolerating leading inline html such as logos
static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*+]\s+(?:<[^>]+>\s*)*\*\*(?P<name>.+?)\*\*\s*[-–—]\s*(?P<desc>.*\S)\s*$")
        .expect("bullet pattern is valid")
});

// `**Name** - description` anywhere on a line
static BOLD_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*(?P<name>[^*]+?)\*\*\s*[-–—]\s*(?P<desc>.*\S)")
        .expect("bold pair pattern is valid")
});

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}#{1,6}(\s|$)").expect("heading pattern is valid"));

/// Domain tags and the keywords that earn them.
/// Keywords up to `WHOLE_WORD_MAX` chars must match a whole word, longer ones a word prefix.
const TAG_KEYWORDS: &[(&str, &[&str])] = &[
    ("database", &["database", "sql", "postgres", "mysql", "sqlite", "mongo", "redis"]),
    ("filesystem", &["file", "filesystem", "directory", "storage"]),
    ("git", &["git", "github", "gitlab", "repository"]),
    ("search", &["search", "index", "query"]),
    ("browser", &["browser", "web", "scrap", "puppeteer", "playwright", "fetch"]),
    ("cloud", &["aws", "azure", "gcp", "cloud", "kubernetes", "docker"]),
    ("communication", &["slack", "chat", "email", "discord", "message", "telegram"]),
    ("ai", &["llm", "model", "embedding", "vector", "memory", "ai"]),
    ("devtools", &["debug", "code", "developer", "terminal", "shell", "sentry"]),
    ("productivity", &["calendar", "notion", "todo", "task", "drive", "docs"]),
    ("monitoring", &["monitor", "log", "logs", "logging", "metric", "observability", "alert"]),
    ("finance", &["payment", "stripe", "finance", "crypto", "bank", "stock"]),
];

/// One server discovered in the registry document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEntry {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub author: String,
    pub repository_url: String,
    pub version: String,
    pub tags: Vec<String>,
    pub downloads: u64,
    pub stars: u64,
}

impl ServerEntry {
    /// The id without the official namespace prefix
    pub fn slug(&self) -> &str {
        self.id.strip_prefix(OFFICIAL_PREFIX).unwrap_or(&self.id)
    }

    /// How a user would get this server running
    pub fn install_hint(&self) -> String {
        if self.category == OFFICIAL {
            format!("npx -y @modelcontextprotocol/server-{}", self.slug())
        } else {
            format!("See the repository for installation instructions: {}", self.repository_url)
        }
    }
}

/// Lowercase a name and collapse every run of non-alphanumerics into one hyphen
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Reference,
    Community,
    Fallback,
}

/// Raw name and description markup matched on one line
struct Candidate<'a> {
    name: &'a str,
    description: &'a str,
}

/// Turns the registry README into server entries
pub struct EntryExtractor {
    location: RepoLocation,
    max_entries: usize,
}

impl EntryExtractor {
    pub fn new(location: RepoLocation) -> Self {
        Self {
            location,
            max_entries: MAX_ENTRIES,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Run the reference, community and fallback passes in that order.
    ///
    /// An entry is dropped when its id or its normalized name was already seen.
    pub fn extract(&self, text: &str) -> Vec<ServerEntry> {
        let mut entries = Vec::new();
        let mut seen_names = HashSet::new();
        let mut seen_ids = HashSet::new();

        let reference = section_lines(text, "reference servers");
        let community = section_lines(text, "community servers");
        let passes = [
            (Pass::Reference, reference.iter().copied().filter_map(match_bullet).collect::<Vec<_>>()),
            (Pass::Community, community.iter().copied().filter_map(match_bullet).collect()),
            (Pass::Fallback, text.lines().filter_map(match_bold_pair).collect()),
        ];

        for (pass, candidates) in passes {
            let before = entries.len();
            for candidate in candidates {
                if entries.len() >= self.max_entries {
                    break;
                }
                let Some(entry) = self.build_entry(&candidate, pass) else {
                    continue;
                };
                // A name seen in an earlier pass keeps its first entry even when
                // the later pass would give it a different id
                let name_key = slugify(&entry.name);
                if seen_names.contains(&name_key) || seen_ids.contains(&entry.id) {
                    continue;
                }
                seen_names.insert(name_key);
                seen_ids.insert(entry.id.clone());
                entries.push(entry);
            }
            tracing::debug!("{:?} pass added {} entries", pass, entries.len() - before);
        }

        entries
    }

    fn build_entry(&self, candidate: &Candidate<'_>, pass: Pass) -> Option<ServerEntry> {
        let (name, link) = flatten_inline(candidate.name);
        let (description, _) = flatten_inline(candidate.description);
        if name.is_empty() || description.is_empty() {
            return None;
        }

        let slug = slugify(&name);
        if slug.is_empty() {
            return None;
        }

        let official = match pass {
            Pass::Reference => true,
            Pass::Community => false,
            Pass::Fallback => name.contains("MCP") || name.to_lowercase().contains("server"),
        };
        let (category, author) = if official {
            (OFFICIAL, REFERENCE_AUTHOR)
        } else {
            (COMMUNITY, COMMUNITY_AUTHOR)
        };
        let id = if official && !slug.starts_with(OFFICIAL_PREFIX) {
            format!("{}{}", OFFICIAL_PREFIX, slug)
        } else {
            slug
        };

        let repository_url = match link {
            Some(target) => self.location.resolve_link(&target),
            None => self.location.web_url(),
        };
        let tags = derive_tags(category, &name, &description);

        Some(ServerEntry {
            id,
            name,
            description,
            category: category.to_string(),
            author: author.to_string(),
            repository_url,
            version: DEFAULT_VERSION.to_string(),
            tags,
            downloads: 0,
            stars: 0,
        })
    }
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Lines after the first heading mentioning `marker`, up to the next heading.
///
/// Fenced code blocks neither open nor close a section and are left out of it.
fn section_lines<'a>(text: &'a str, marker: &str) -> Vec<&'a str> {
    let mut in_fence = false;
    let mut inside = false;
    let mut lines = Vec::new();

    for line in text.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if HEADING.is_match(line) {
            if inside {
                break;
            }
            inside = line.to_lowercase().contains(marker);
            continue;
        }
        if inside {
            lines.push(line);
        }
    }
    lines
}

fn match_bullet(line: &str) -> Option<Candidate<'_>> {
    let caps = BULLET.captures(line)?;
    Some(Candidate {
        name: caps.name("name")?.as_str(),
        description: caps.name("desc")?.as_str(),
    })
}

fn match_bold_pair(line: &str) -> Option<Candidate<'_>> {
    let caps = BOLD_PAIR.captures(line)?;
    Some(Candidate {
        name: caps.name("name")?.as_str(),
        description: caps.name("desc")?.as_str(),
    })
}

/// Render inline markdown as plain text, also returning the first link target
fn flatten_inline(markup: &str) -> (String, Option<String>) {
    let mut text = String::new();
    let mut link = None;

    for event in Parser::new(markup) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            Event::Start(Tag::Link { dest_url, .. }) if link.is_none() => {
                link = Some(dest_url.to_string());
            }
            _ => {}
        }
    }

    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (text, link)
}

const WHOLE_WORD_MAX: usize = 3;

fn keyword_matches(word: &str, keyword: &str) -> bool {
    if keyword.len() <= WHOLE_WORD_MAX {
        word == keyword
    } else {
        word.starts_with(keyword)
    }
}

fn derive_tags(category: &str, name: &str, description: &str) -> Vec<String> {
    let haystack = format!("{} {}", name, description).to_lowercase();
    let words: Vec<&str> = haystack
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut tags = vec![category.to_string()];
    for (tag, keywords) in TAG_KEYWORDS {
        let hit = keywords
            .iter()
            .any(|kw| words.iter().any(|w| keyword_matches(w, kw)));
        if hit {
            tags.push(tag.to_string());
        }
    }
    tags
}
