use rmcp::model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::{Error as McpError, ServerHandler, schemars, tool};
use serde::Deserialize;
use serde_json::json;

use crate::error::RegistryError;
use crate::query::{DEFAULT_LIMIT, QueryEngine, SearchQuery};
use crate::server::format as render;

/// MCP tool surface over the server registry
#[derive(Clone)]
pub struct Registry {
    pub engine: QueryEngine,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchServersRequest {
    #[schemars(description = "text to look for in server names, descriptions and tags (case-insensitive)")]
    #[serde(default)]
    pub query: Option<String>,

    #[schemars(description = "only return servers in this category, e.g. official or community")]
    #[serde(default)]
    pub category: Option<String>,

    #[schemars(description = "the maximum number of servers to return, 0 for no limit")]
    #[serde(default = "default_limit")]
    pub limit: usize,

    #[schemars(description = "output format: text (default) or json")]
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetServerDetailsRequest {
    // Required in the schema; a missing value still reaches the handler so the
    // caller gets an in-band error result
    #[schemars(required, description = "the id or name of the server, the mcp- prefix may be omitted")]
    #[serde(rename = "serverId")]
    pub server_id: Option<String>,

    #[schemars(description = "output format: text (default) or json")]
    #[serde(default)]
    pub format: OutputFormat,
}

fn error_result(err: &RegistryError) -> CallToolResult {
    tracing::error!("Tool call failed: {}", err);
    CallToolResult::error(vec![Content::text(render::error(err))])
}

#[tool(tool_box)]
impl Registry {
    pub fn new(engine: QueryEngine) -> Self {
        Self { engine }
    }

    #[tool(description = "Search MCP servers by free text and/or category")]
    async fn search_servers(
        &self,
        #[tool(aggr)] SearchServersRequest { query, category, limit, format }: SearchServersRequest,
    ) -> Result<CallToolResult, McpError> {
        let query = SearchQuery {
            query,
            category,
            limit: Some(limit),
        };
        let outcome = match self.engine.search(&query).await {
            Ok(outcome) => outcome,
            Err(e) => return Ok(error_result(&e)),
        };

        let text = match format {
            OutputFormat::Text => render::search_results(&outcome, &query),
            OutputFormat::Json => json!({
                "total": outcome.total,
                "returned": outcome.servers.len(),
                "servers": outcome.servers,
            })
            .to_string(),
        };
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(description = "Get detailed information and install instructions for one MCP server")]
    async fn get_server_details(
        &self,
        #[tool(aggr)] GetServerDetailsRequest { server_id, format }: GetServerDetailsRequest,
    ) -> Result<CallToolResult, McpError> {
        let entry = match self.engine.get_details(server_id.as_deref()).await {
            Ok(entry) => entry,
            Err(e) => return Ok(error_result(&e)),
        };

        // An unknown id is an answer, not a failure
        let server_id = server_id.unwrap_or_default();
        let text = match (entry, format) {
            (Some(entry), OutputFormat::Text) => render::server_details(&entry),
            (Some(entry), OutputFormat::Json) => {
                let install = entry.install_hint();
                json!({ "server": entry, "install": install }).to_string()
            }
            (None, OutputFormat::Text) => render::not_found(&server_id),
            (None, OutputFormat::Json) => json!({
                "server": null,
                "message": render::not_found(&server_id),
            })
            .to_string(),
        };
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(description = "List MCP server categories with the number of servers in each")]
    async fn list_categories(&self) -> Result<CallToolResult, McpError> {
        match self.engine.list_categories().await {
            Ok(listing) => Ok(CallToolResult::success(vec![Content::text(
                render::category_listing(&listing),
            )])),
            Err(e) => Ok(error_result(&e)),
        }
    }

    #[tool(description = "Discard cached server data and fetch it again from GitHub")]
    async fn refresh_data(&self) -> Result<CallToolResult, McpError> {
        match self.engine.refresh().await {
            Ok(summary) => Ok(CallToolResult::success(vec![Content::text(
                render::refresh_summary(&summary),
            )])),
            Err(e) => Ok(error_result(&e)),
        }
    }
}

#[tool(tool_box)]
impl ServerHandler for Registry {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some("This server helps discover Model Context Protocol servers listed in the modelcontextprotocol/servers README. Use 'search_servers' to find servers by text or category, 'get_server_details' for one server's details and install command, 'list_categories' for an overview, and 'refresh_data' to reload the list. Data is cached for five minutes.".to_string()),
        }
    }
}
