mod engine;
mod parse;
mod prompt;
pub mod validate;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Supported IaC output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IacFormat {
    Bicep,
    Terraform,
}

impl IacFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "bicep" => Ok(IacFormat::Bicep),
            "terraform" | "tf" | "hcl" => Ok(IacFormat::Terraform),
            other => Err(format!("unsupported IaC format: {other}")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IacFormat::Bicep => "bicep",
            IacFormat::Terraform => "terraform",
        }
    }

    /// JSON key the model is asked to put the code under.
    pub fn code_key(&self) -> &'static str {
        match self {
            IacFormat::Bicep => "bicep_code",
            IacFormat::Terraform => "terraform_code",
        }
    }
}

/// Result of one generation call: the template text plus whatever parameter
/// metadata the model emitted alongside it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratedIac {
    pub code: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// Generate IaC from an enriched diagram via the configured LLM.
///
/// AI-only: there is no deterministic template fallback. The diagram should
/// already carry `metadata.governance_summary` / `metadata.resource_scopes`
/// from `blueprint_core::enrich_diagram` so the prompt can ground resource
/// scoping; a non-enriched diagram still works, just with less context.
pub async fn generate(
    settings: &blueprint_core::AiSettings,
    diagram: &Value,
    format: IacFormat,
) -> Result<GeneratedIac, String> {
    let system = prompt::system_prompt(format);
    let user_msg = prompt::user_message(diagram);

    eprintln!(
        "[blueprint-iac] generating {} via {} ({})",
        format.as_str(),
        settings.provider,
        settings.model
    );

    let raw = engine::generate(settings, format, &system, &user_msg).await?;
    let result = parse::parse_llm_output(&raw, format);
    if result.code.trim().is_empty() {
        return Err(format!("model returned no {} code", format.as_str()));
    }
    eprintln!(
        "[blueprint-iac] parsed {} chars of {} ({} parameters)",
        result.code.len(),
        format.as_str(),
        result.parameters.len()
    );
    Ok(result)
}
