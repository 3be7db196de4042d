//! # MCP Registry Server
//!
//! A Model Context Protocol (MCP) server that helps discover other MCP servers.
//! The list of servers is scraped from the README of the
//! `modelcontextprotocol/servers` GitHub repository and cached in memory.
//!
//! ## Features
//!
//! - Fetch the registry README through the GitHub contents API
//! - Extract server entries from the reference and community sections
//! - Serve search, detail lookup, category listing and refresh tools over stdio
//!
//! ## Modules
//!
//! - `github`: GitHub API integration for fetching the README
//! - `document`: README parsing into server entries
//! - `storage`: Snapshot cache with a freshness window
//! - `query`: Search, lookup and aggregation over a snapshot
//! - `server`: MCP server implementation and tools

/// Error types shared by every module
pub mod error;
/// GitHub API integration
pub mod github;
/// README parsing
pub mod document;
/// Snapshot cache
pub mod storage;
/// Registry queries
pub mod query;
/// Server implementation and MCP tools
pub mod server;
