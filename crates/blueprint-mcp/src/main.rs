use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use std::collections::HashMap;

use blueprint_iac::{validate::validate_with_cli, IacFormat};

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetDiagramRequest {
    /// Name of the diagram to retrieve
    name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct SetDiagramRequest {
    /// Name of the diagram to create or overwrite
    name: String,
    /// The complete diagram as a JSON string: an object with "nodes" and "edges" arrays. Nodes: {id, type?, parentNode?, data: {label?, groupType?, metadata?, tags?}}. Use type "azure.group" with data.groupType for governance containers. See get_rules for the container semantics.
    data: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct DeleteDiagramRequest {
    /// Name of the diagram to delete
    name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct PreflightRequest {
    /// Name of the diagram to check
    name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct EnrichDiagramRequest {
    /// Name of the diagram to enrich
    name: String,
    /// Persist the enriched copy back to storage (default: false, enrich in memory only)
    save: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GenerateIacRequest {
    /// Name of the diagram to generate from
    name: String,
    /// Target format: "bicep" or "terraform"
    format: String,
    /// Also run CLI validation (bicep build / terraform fmt -check) on the result when the binary is installed (default: false)
    validate: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ValidateIacRequest {
    /// Format of the content: "bicep" or "terraform"
    format: String,
    /// The template content to validate
    content: String,
    /// Additional files to place next to main.tf (terraform only), e.g. {"backend.tf": "...", "variables.tf": "..."}
    extra_files: Option<HashMap<String, String>>,
}

// --- Server ---

#[derive(Clone)]
pub struct BlueprintServer {
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl BlueprintServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List all available architecture diagrams")]
    fn list_diagrams(&self) -> Result<CallToolResult, McpError> {
        match blueprint_core::list_diagrams() {
            Ok(names) => {
                let text = if names.is_empty() {
                    "No diagrams found. Use set_diagram to create one.".to_string()
                } else {
                    names.join("\n")
                };
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e)])),
        }
    }

    #[tool(
        description = "Get the full JSON content of a diagram: {nodes: [{id, type?, parentNode?, data}], edges: [...], metadata?}. If the diagram has been enriched, metadata carries governance_summary and resource_scopes."
    )]
    fn get_diagram(
        &self,
        Parameters(req): Parameters<GetDiagramRequest>,
    ) -> Result<CallToolResult, McpError> {
        match blueprint_core::read_diagram_raw(&req.name) {
            Ok(raw) => Ok(CallToolResult::success(vec![Content::text(raw)])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Failed to read diagram '{}': {}",
                req.name, e
            ))])),
        }
    }

    #[tool(
        description = "Create or overwrite a diagram with complete data in one call. The response includes the governance preflight warnings for the stored diagram, so structural gaps (missing management group, subscription, landing zone, or virtual network containers) surface immediately."
    )]
    fn set_diagram(
        &self,
        Parameters(req): Parameters<SetDiagramRequest>,
    ) -> Result<CallToolResult, McpError> {
        let diagram: serde_json::Value = match serde_json::from_str(&req.data) {
            Ok(v) => v,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Invalid JSON: {}",
                    e
                ))]));
            }
        };
        if !diagram.is_object() {
            return Ok(CallToolResult::error(vec![Content::text(
                "Diagram must be a JSON object with \"nodes\" and \"edges\" arrays",
            )]));
        }

        if let Err(e) = blueprint_core::write_diagram(&req.name, &diagram) {
            return Ok(CallToolResult::error(vec![Content::text(format!(
                "Failed to write diagram '{}': {}",
                req.name, e
            ))]));
        }

        let (_, preflight) = blueprint_core::enrich_diagram(Some(&diagram));
        let mut text = format!("Saved diagram '{}'.", req.name);
        if !preflight.warnings.is_empty() {
            text.push_str("\n\nPreflight warnings:\n");
            for w in &preflight.warnings {
                text.push_str("- ");
                text.push_str(w);
                text.push('\n');
            }
        }
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }

    #[tool(description = "Delete a diagram by name")]
    fn delete_diagram(
        &self,
        Parameters(req): Parameters<DeleteDiagramRequest>,
    ) -> Result<CallToolResult, McpError> {
        match blueprint_core::delete_diagram(&req.name) {
            Ok(()) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Deleted diagram '{}'",
                req.name
            ))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e)])),
        }
    }

    #[tool(
        description = "Run the governance preflight on a diagram without modifying it. Returns {warnings, governance_summary, resource_scopes}: the warnings list structural gaps, governance_summary lists every container with its members, and resource_scopes maps each resource node to its inferred management groups, subscriptions, and policy/role assignments."
    )]
    fn preflight_diagram(
        &self,
        Parameters(req): Parameters<PreflightRequest>,
    ) -> Result<CallToolResult, McpError> {
        let diagram = match blueprint_core::read_diagram(&req.name) {
            Ok(d) => d,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Failed to read diagram '{}': {}",
                    req.name, e
                ))]));
            }
        };

        let (_, preflight) = blueprint_core::enrich_diagram(Some(&diagram));
        let json = serde_json::to_string_pretty(&preflight)
            .unwrap_or_else(|e| format!("Serialization error: {}", e));
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        description = "Enrich a diagram with inferred governance scopes: fills each resource node's data.metadata with managementGroupId/subscriptionId and policy/role assignment lists derived from its container chain and tags, and attaches governance_summary/resource_scopes to the diagram metadata. Set save=true to persist the enriched copy. Enrichment is idempotent and never overwrites identifiers the diagram already carries."
    )]
    fn enrich_diagram(
        &self,
        Parameters(req): Parameters<EnrichDiagramRequest>,
    ) -> Result<CallToolResult, McpError> {
        let diagram = match blueprint_core::read_diagram(&req.name) {
            Ok(d) => d,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Failed to read diagram '{}': {}",
                    req.name, e
                ))]));
            }
        };

        let (enriched, preflight) = blueprint_core::enrich_diagram(Some(&diagram));

        if req.save.unwrap_or(false) {
            if let Err(e) = blueprint_core::write_diagram(&req.name, &enriched) {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Enriched, but failed to save diagram '{}': {}",
                    req.name, e
                ))]));
            }
        }

        let result = serde_json::json!({
            "saved": req.save.unwrap_or(false),
            "warnings": preflight.warnings,
            "governance_summary": preflight.governance_summary,
            "resource_scopes": preflight.resource_scopes,
        });
        let json = serde_json::to_string_pretty(&result)
            .unwrap_or_else(|e| format!("Serialization error: {}", e));
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        description = "Generate Infrastructure-as-Code (Bicep or Terraform) from a diagram. The diagram is governance-enriched first so the generated template deploys every resource into its inferred scope. Requires AI settings (~/.blueprint/settings.json with provider, apiKey, model). Response: {format, content, parameters, preflight_warnings, validation?}."
    )]
    async fn generate_iac(
        &self,
        Parameters(req): Parameters<GenerateIacRequest>,
    ) -> Result<CallToolResult, McpError> {
        let format = match IacFormat::parse(&req.format) {
            Ok(f) => f,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e)])),
        };

        let settings = blueprint_core::read_settings();
        if !blueprint_core::ai_configured(&settings) {
            return Ok(CallToolResult::error(vec![Content::text(
                "AI is not configured. Write provider, apiKey, and model to ~/.blueprint/settings.json first.",
            )]));
        }

        let diagram = match blueprint_core::read_diagram(&req.name) {
            Ok(d) => d,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Failed to read diagram '{}': {}",
                    req.name, e
                ))]));
            }
        };

        let (enriched, preflight) = blueprint_core::enrich_diagram(Some(&diagram));

        let generated = match blueprint_iac::generate(&settings, &enriched, format).await {
            Ok(g) => g,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Generation failed: {}",
                    e
                ))]));
            }
        };

        let mut result = serde_json::json!({
            "format": format.as_str(),
            "content": generated.code,
            "parameters": generated.parameters,
            "preflight_warnings": preflight.warnings,
        });

        if req.validate.unwrap_or(false) {
            let outcome = validate_with_cli(format, &generated.code, &[]);
            result["validation"] = serde_json::to_value(&outcome)
                .unwrap_or(serde_json::Value::Null);
        }

        let json = serde_json::to_string_pretty(&result)
            .unwrap_or_else(|e| format!("Serialization error: {}", e));
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        description = "Validate IaC content with the local CLI (bicep build or terraform fmt -check). Returns {cli_present, errors, warnings}; cli_present is false when the binary is not installed, which is not an error."
    )]
    fn validate_iac(
        &self,
        Parameters(req): Parameters<ValidateIacRequest>,
    ) -> Result<CallToolResult, McpError> {
        let format = match IacFormat::parse(&req.format) {
            Ok(f) => f,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e)])),
        };

        let extra: Vec<(String, String)> = req
            .extra_files
            .unwrap_or_default()
            .into_iter()
            .collect();
        let outcome = validate_with_cli(format, &req.content, &extra);
        let json = serde_json::to_string_pretty(&outcome)
            .unwrap_or_else(|e| format!("Serialization error: {}", e));
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        description = "Get the governance modeling rules that govern how diagrams should be structured"
    )]
    fn get_rules(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            blueprint_core::rules::RULES,
        )]))
    }
}

const INSTRUCTIONS: &str = r#"blueprint is a cloud-architecture diagramming and IaC tool. Diagrams are stored as .bpd files (JSON) and describe Azure architectures as node/edge graphs.

## Diagram format
- **nodes**: array of {id, type?, parentNode?, data}. `id` must be unique and non-empty. `parentNode` nests a node inside a container.
- **edges**: array of {id, source, target, label?}. Edges describe data/control flow; they never carry governance.
- **data**: {label?, title?, groupType?, metadata?, tags?}. `metadata` holds domain identifiers, `tags` flat string key/values.

## Containers
A node with type "azure.group" is a governance container; data.groupType selects its role:
- **managementGroup**: metadata.managementGroupId (fallbacks: name, displayName, id)
- **subscription**: metadata.subscriptionId (fallbacks: id, name)
- **landingZone**: groups the resources of one workload
- **policyAssignment**: metadata.policyDefinitionId + metadata.scope; label becomes the assignment displayName
- **roleAssignment**: metadata.roleDefinitionId + principalId + principalType
- **virtualNetwork**: hub/spoke networking inside a landing zone

Any other node is a resource. Resources inherit scope from every container on their parentNode chain; data.tags.subscriptionId / data.tags.managementGroupId are honored as fallbacks when the chain provides nothing.

## Workflow
1. `get_rules` before creating or editing a diagram.
2. `set_diagram` with the full node/edge JSON; fix any preflight warnings it reports by adding the missing containers.
3. `preflight_diagram` to inspect inferred scopes without modifying anything; `enrich_diagram` with save=true to persist the inferred scopes into the diagram.
4. `generate_iac` to produce Bicep or Terraform from the enriched diagram; pass validate=true to also run the local CLI check, or use `validate_iac` on edited content."#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle `blueprint-mcp init` subcommand
    if std::env::args().nth(1).as_deref() == Some("init") {
        return init_project();
    }

    let service = BlueprintServer::new()
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| eprintln!("MCP server error: {}", e))?;
    service.waiting().await?;
    Ok(())
}

#[tool_handler]
impl ServerHandler for BlueprintServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = format!(
            "{}\n\n## Diagram Rules\n{}",
            INSTRUCTIONS,
            blueprint_core::rules::RULES
        );
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Register blueprint-mcp in project-scoped agent config, for every agent CLI
/// actually installed. Existing config files are merged, never replaced; an
/// unparseable config file aborts rather than clobbering the user's entries.
fn init_project() -> Result<(), Box<dyn std::error::Error>> {
    let binary_path = std::env::current_exe()?
        .canonicalize()?
        .to_string_lossy()
        .to_string();

    let cwd = std::env::current_dir()?;

    let mut registered: Vec<&str> = Vec::new();

    if which::which("claude").is_ok() {
        register_claude_code(&cwd, &binary_path)?;
        registered.push("Claude Code");
    }
    if which::which("codex").is_ok() {
        register_codex(&cwd, &binary_path)?;
        registered.push("Codex");
    }

    if registered.is_empty() {
        return Err(
            "neither `claude` nor `codex` found in PATH; install one, then re-run `blueprint-mcp init`"
                .into(),
        );
    }

    eprintln!(
        "\nDone. {} will use blueprint in this project.",
        registered.join(" and ")
    );
    Ok(())
}

/// Add a blueprint entry to .mcp.json (Claude Code), keeping other servers.
fn register_claude_code(
    cwd: &std::path::Path,
    binary_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = cwd.join(".mcp.json");
    let mut root: serde_json::Value = match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents)
            .map_err(|e| format!("existing {} is not valid JSON: {e}", path.display()))?,
        Err(_) => serde_json::json!({}),
    };

    if !root.get("mcpServers").is_some_and(|v| v.is_object()) {
        root["mcpServers"] = serde_json::json!({});
    }
    root["mcpServers"]["blueprint"] = serde_json::json!({
        "type": "stdio",
        "command": binary_path,
        "args": [],
    });

    std::fs::write(&path, serde_json::to_string_pretty(&root)?)?;
    eprintln!("Registered blueprint in {}", path.display());
    Ok(())
}

/// Add a blueprint entry to .codex/config.toml (Codex), keeping other servers.
fn register_codex(
    cwd: &std::path::Path,
    binary_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let codex_dir = cwd.join(".codex");
    let path = codex_dir.join("config.toml");

    let mut doc: toml_edit::DocumentMut = match std::fs::read_to_string(&path) {
        Ok(contents) => contents
            .parse()
            .map_err(|e| format!("existing {} is not valid TOML: {e}", path.display()))?,
        Err(_) => toml_edit::DocumentMut::new(),
    };

    if !doc.contains_table("mcp_servers") {
        doc["mcp_servers"] = toml_edit::Item::Table(toml_edit::Table::new());
    }

    let mut server = toml_edit::Table::new();
    server.insert("command", toml_edit::value(binary_path));
    server.insert("args", toml_edit::value(toml_edit::Array::new()));
    doc["mcp_servers"]["blueprint"] = toml_edit::Item::Table(server);

    std::fs::create_dir_all(&codex_dir)?;
    std::fs::write(&path, doc.to_string())?;
    eprintln!("Registered blueprint in {}", path.display());
    Ok(())
}
