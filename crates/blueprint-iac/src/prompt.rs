use serde_json::Value;

use crate::IacFormat;

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

fn label_of(node: &Value) -> &str {
    let data = node.get("data").unwrap_or(&Value::Null);
    let label = str_field(data, "label");
    if !label.is_empty() {
        return label;
    }
    let title = str_field(data, "title");
    if !title.is_empty() {
        return title;
    }
    str_field(node, "id")
}

/// Convert an enriched diagram to a compact text representation for LLM
/// consumption: resources with their inferred scopes, governance containers,
/// then edges.
pub fn serialize_diagram(diagram: &Value) -> String {
    let mut out = String::with_capacity(2048);
    let empty = Vec::new();
    let nodes = diagram
        .get("nodes")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    out.push_str("RESOURCES:\n");
    for node in nodes {
        if node.get("type").and_then(Value::as_str) == Some(blueprint_core::GROUP_NODE_TYPE) {
            continue;
        }
        let id = str_field(node, "id");
        if id.is_empty() {
            continue;
        }
        out.push_str("- ");
        out.push_str(id);
        out.push_str(" \"");
        out.push_str(label_of(node));
        out.push('"');
        let kind = str_field(node, "type");
        if !kind.is_empty() {
            out.push_str(" (");
            out.push_str(kind);
            out.push(')');
        }
        let meta = node.pointer("/data/metadata").unwrap_or(&Value::Null);
        for key in ["subscriptionId", "managementGroupId"] {
            let v = str_field(meta, key);
            if !v.is_empty() {
                out.push(' ');
                out.push_str(key);
                out.push('=');
                out.push_str(v);
            }
        }
        if let Some(policies) = meta.get("policyAssignments").and_then(Value::as_array) {
            if !policies.is_empty() {
                out.push_str(" policies=[");
                for (i, p) in policies.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let pid = str_field(p, "policyDefinitionId");
                    out.push_str(if pid.is_empty() {
                        str_field(p, "displayName")
                    } else {
                        pid
                    });
                }
                out.push(']');
            }
        }
        out.push('\n');
    }

    if let Some(summary) = diagram
        .pointer("/metadata/governance_summary")
        .and_then(Value::as_object)
    {
        out.push_str("GOVERNANCE:\n");
        for category in [
            "managementGroups",
            "subscriptions",
            "landingZones",
            "policyAssignments",
            "roleAssignments",
            "virtualNetworks",
        ] {
            let Some(entries) = summary.get(category).and_then(Value::as_array) else {
                continue;
            };
            for entry in entries {
                out.push_str("- ");
                out.push_str(category);
                out.push(' ');
                out.push_str(str_field(entry, "id"));
                out.push_str(" \"");
                out.push_str(str_field(entry, "label"));
                out.push('"');
                if let Some(parent) = entry.get("parentId").and_then(Value::as_str) {
                    out.push_str(" parent=");
                    out.push_str(parent);
                }
                if let Some(services) = entry.get("memberServices").and_then(Value::as_array) {
                    if !services.is_empty() {
                        out.push_str(" members=[");
                        for (i, s) in services.iter().enumerate() {
                            if i > 0 {
                                out.push(',');
                            }
                            out.push_str(s.as_str().unwrap_or(""));
                        }
                        out.push(']');
                    }
                }
                out.push('\n');
            }
        }
    }

    let edges = diagram
        .get("edges")
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    if !edges.is_empty() {
        out.push_str("EDGES:\n");
        for edge in edges {
            let source = str_field(edge, "source");
            let target = str_field(edge, "target");
            if source.is_empty() || target.is_empty() {
                continue;
            }
            out.push_str(source);
            out.push_str(" -> ");
            out.push_str(target);
            let label = str_field(edge, "label");
            if !label.is_empty() {
                out.push_str(" \"");
                out.push_str(label);
                out.push('"');
            }
            out.push('\n');
        }
    }

    out
}

pub fn system_prompt(format: IacFormat) -> String {
    let (language, guidance) = match format {
        IacFormat::Bicep => (
            "Bicep",
            "Target scope follows the governance containers: emit subscription- or \
management-group-scoped deployments when the diagram defines them, module-per-landing-zone \
otherwise. Use symbolic names derived from node ids.",
        ),
        IacFormat::Terraform => (
            "Terraform (HCL, azurerm provider)",
            "Emit a provider block pinned to azurerm, one resource per diagram resource, and \
azurerm_management_group / azurerm_subscription / azurerm_policy_assignment / \
azurerm_role_assignment resources for the governance containers.",
        ),
    };
    format!(
        "You are an Azure infrastructure engineer. Translate the architecture diagram \
below into deployable {language}.\n\n\
{guidance}\n\n\
Honor the inferred scopes: every resource lists the subscriptionId and managementGroupId \
it must deploy into, and the policy/role assignments that apply to it. Do not invent \
resources that are not in the diagram; do not drop any that are.\n\n\
Output ONLY a JSON object: {{\"{code_key}\": \"<complete template as one string>\", \
\"parameters\": {{<parameter name -> default or description>}}}}. \
No prose, no markdown fences around the JSON.\n\n\
## Diagram Rules\n{rules}",
        code_key = format.code_key(),
        rules = blueprint_core::rules::RULES,
    )
}

pub fn user_message(diagram: &Value) -> String {
    serialize_diagram(diagram)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_resources_scopes_and_edges() {
        let (diagram, _) = blueprint_core::enrich_diagram(Some(&json!({
            "nodes": [
                {
                    "id": "sub",
                    "type": "azure.group",
                    "data": { "groupType": "subscription", "label": "Prod",
                              "metadata": { "subscriptionId": "sub-1" } },
                },
                { "id": "web", "type": "azure.appservice", "parentNode": "sub",
                  "data": { "label": "Web" } },
            ],
            "edges": [ { "id": "e1", "source": "web", "target": "sub", "label": "in" } ],
        })));

        let text = serialize_diagram(&diagram);

        assert!(text.contains("RESOURCES:"));
        assert!(text.contains("- web \"Web\" (azure.appservice) subscriptionId=sub-1"));
        assert!(text.contains("GOVERNANCE:"));
        assert!(text.contains("- subscriptions sub \"Prod\""));
        assert!(text.contains("members=[web]"));
        assert!(text.contains("web -> sub \"in\""));
    }

    #[test]
    fn system_prompt_names_the_code_key() {
        assert!(system_prompt(IacFormat::Bicep).contains("\"bicep_code\""));
        assert!(system_prompt(IacFormat::Terraform).contains("\"terraform_code\""));
    }
}
