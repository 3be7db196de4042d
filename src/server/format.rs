//! Human-readable rendering of query results.

use std::fmt::Write as _;

use crate::document::ServerEntry;
use crate::error::RegistryError;
use crate::query::{CategoryListing, RefreshSummary, SearchOutcome, SearchQuery};

fn describe_filters(query: &SearchQuery) -> String {
    let mut filters = Vec::new();
    if let Some(q) = query.query.as_deref().filter(|q| !q.trim().is_empty()) {
        filters.push(format!("query \"{}\"", q.trim()));
    }
    if let Some(c) = query.category.as_deref().filter(|c| !c.trim().is_empty()) {
        filters.push(format!("category \"{}\"", c.trim()));
    }
    if filters.is_empty() {
        String::new()
    } else {
        format!(" matching {}", filters.join(" and "))
    }
}

pub fn search_results(outcome: &SearchOutcome, query: &SearchQuery) -> String {
    let filters = describe_filters(query);
    if outcome.servers.is_empty() {
        return format!("🔍 No MCP servers found{}.", filters);
    }

    let mut out = format!(
        "🔍 Found {} MCP server(s){} (showing {}):\n",
        outcome.total,
        filters,
        outcome.servers.len()
    );
    for server in &outcome.servers {
        let _ = write!(
            out,
            "\n• **{}** (`{}`) [{}]\n  {}\n  🔗 {}\n",
            server.name, server.id, server.category, server.description, server.repository_url
        );
    }
    out.push_str("\nUse get_server_details with a server id for installation instructions.");
    out
}

pub fn server_details(entry: &ServerEntry) -> String {
    let mut out = format!("📦 **{}**\n\n{}\n\n", entry.name, entry.description);
    let _ = writeln!(out, "• ID: {}", entry.id);
    let _ = writeln!(out, "• Category: {}", entry.category);
    let _ = writeln!(out, "• Author: {}", entry.author);
    let _ = writeln!(out, "• Version: {}", entry.version);
    let _ = writeln!(out, "• Tags: {}", entry.tags.join(", "));
    let _ = writeln!(
        out,
        "• Stats: ⬇️ {} downloads, ⭐ {} stars",
        entry.downloads, entry.stars
    );
    let _ = writeln!(out, "• Repository: {}", entry.repository_url);
    let _ = write!(out, "\n🛠️ Install:\n  {}", entry.install_hint());
    out
}

pub fn not_found(server_id: &str) -> String {
    format!(
        "❓ No MCP server found with id \"{}\". Try search_servers to find available ids.",
        server_id.trim()
    )
}

pub fn category_listing(listing: &CategoryListing) -> String {
    let mut out = format!(
        "📂 {} categories across {} MCP servers:\n",
        listing.categories.len(),
        listing.total
    );
    for category in &listing.categories {
        let _ = write!(
            out,
            "\n• **{}** ({} server{})\n  {}\n",
            category.name,
            category.count,
            if category.count == 1 { "" } else { "s" },
            category.description
        );
    }
    out
}

pub fn refresh_summary(summary: &RefreshSummary) -> String {
    format!(
        "🔄 Refreshed server data: {} servers loaded from {}.",
        summary.count, summary.source
    )
}

pub fn error(err: &RegistryError) -> String {
    if err.is_upstream() {
        format!("❌ Unable to fetch server data from upstream: {}", err)
    } else {
        format!("❌ {}", err)
    }
}
