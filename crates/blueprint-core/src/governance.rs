use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Node type marking a container node (management group, subscription,
/// landing zone, policy/role assignment, virtual network).
pub const GROUP_NODE_TYPE: &str = "azure.group";

// --- Derived types ---

/// A policy assignment discovered on a resource node's ancestor chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAssignmentRef {
    #[serde(default)]
    pub policy_definition_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub scope: String,
}

impl PolicyAssignmentRef {
    pub fn is_empty(&self) -> bool {
        self.policy_definition_id.is_empty() && self.display_name.is_empty() && self.scope.is_empty()
    }

    fn as_value(&self) -> Value {
        serde_json::json!({
            "policyDefinitionId": self.policy_definition_id,
            "displayName": self.display_name,
            "scope": self.scope,
        })
    }
}

/// A role assignment discovered on a resource node's ancestor chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignmentRef {
    #[serde(default)]
    pub role_definition_id: String,
    #[serde(default)]
    pub principal_id: String,
    #[serde(default)]
    pub principal_type: String,
    #[serde(default)]
    pub display_name: String,
}

impl RoleAssignmentRef {
    pub fn is_empty(&self) -> bool {
        self.role_definition_id.is_empty()
            && self.principal_id.is_empty()
            && self.principal_type.is_empty()
            && self.display_name.is_empty()
    }

    fn as_value(&self) -> Value {
        serde_json::json!({
            "roleDefinitionId": self.role_definition_id,
            "principalId": self.principal_id,
            "principalType": self.principal_type,
            "displayName": self.display_name,
        })
    }
}

/// Effective governance scope of a single resource node. Lists are
/// deduplicated by structural equality, first-seen order preserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScopeRecord {
    pub management_groups: Vec<String>,
    pub subscriptions: Vec<String>,
    pub policy_assignments: Vec<PolicyAssignmentRef>,
    pub role_assignments: Vec<RoleAssignmentRef>,
}

/// One group node as it appears in the governance summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupEntry {
    pub id: String,
    pub label: String,
    pub metadata: Map<String, Value>,
    pub parent_id: Option<String>,
    pub child_groups: Vec<String>,
    pub member_services: Vec<String>,
}

/// Diagram-level governance summary, one list per recognized group type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceSummary {
    pub management_groups: Vec<GroupEntry>,
    pub subscriptions: Vec<GroupEntry>,
    pub landing_zones: Vec<GroupEntry>,
    pub policy_assignments: Vec<GroupEntry>,
    pub role_assignments: Vec<GroupEntry>,
    pub virtual_networks: Vec<GroupEntry>,
}

/// Preflight report returned alongside the enriched diagram. Warnings are
/// advisory; enrichment itself never fails.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreflightReport {
    pub warnings: Vec<String>,
    pub governance_summary: GovernanceSummary,
    pub resource_scopes: BTreeMap<String, ScopeRecord>,
}

// --- Helpers ---

/// First metadata value under `keys` that is a non-blank string, trimmed.
fn extract_identifier(metadata: &Map<String, Value>, keys: &[&str]) -> String {
    for key in keys {
        if let Some(value) = metadata.get(*key).and_then(Value::as_str) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    String::new()
}

/// JSON truthiness: null, false, 0, "", [], {} are all "unset".
fn is_set(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

/// Get `map[key]` as a mutable list, replacing any non-list value.
fn ensure_list<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Vec<Value> {
    let slot = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(list) => list,
        _ => unreachable!(),
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

fn node_id(node: &Value) -> Option<&str> {
    node.get("id").and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn is_group(node: &Value) -> bool {
    node.get("type").and_then(Value::as_str) == Some(GROUP_NODE_TYPE)
}

fn parent_id(node: &Value) -> Option<&str> {
    node.get("parentNode")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Snapshot of a group node's governance-relevant fields, cloned out of the
/// diagram so resource nodes can be mutated while ancestors are inspected.
struct GroupInfo {
    id: String,
    group_type: String,
    metadata: Map<String, Value>,
    /// data.label, falling back to data.title, else empty.
    display: String,
    parent: Option<String>,
}

fn group_info(node: &Value) -> GroupInfo {
    let data = node
        .get("data")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let group_type = ["groupType", "type"]
        .iter()
        .find_map(|k| data.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()))
        .unwrap_or("")
        .to_string();
    let metadata = data
        .get("metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let display = ["label", "title"]
        .iter()
        .find_map(|k| data.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()))
        .unwrap_or("")
        .to_string();
    GroupInfo {
        id: node_id(node).unwrap_or("").to_string(),
        group_type,
        metadata,
        display,
        parent: parent_id(node).map(str::to_string),
    }
}

/// Walk the parent chain from `start`, returning ancestor indices in
/// nearest-first order. Stops on a missing parent reference, an unknown
/// parent id, or an id already visited in this walk (cycle guard).
fn parent_chain(start: usize, nodes: &[Value], lookup: &HashMap<String, usize>) -> Vec<usize> {
    let mut chain = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut current = start;
    loop {
        let Some(pid) = parent_id(&nodes[current]) else {
            break;
        };
        if visited.contains(pid) {
            break;
        }
        let Some(&parent_idx) = lookup.get(pid) else {
            break;
        };
        chain.push(parent_idx);
        visited.insert(pid);
        current = parent_idx;
    }
    chain
}

#[derive(Default)]
struct Membership {
    services: BTreeSet<String>,
    groups: BTreeSet<String>,
}

// --- Engine ---

/// Augment a diagram with governance summaries and inferred scopes.
///
/// Works on a deep copy of the input; the caller's value is never touched.
/// A missing or non-object diagram is treated as empty. The function cannot
/// fail: malformed fields degrade to empty defaults and the only signal of a
/// poorly structured diagram is the preflight warnings list.
pub fn enrich_diagram(diagram: Option<&Value>) -> (Value, PreflightReport) {
    let mut root: Map<String, Value> = match diagram {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    let mut nodes: Vec<Value> = match root.remove("nodes") {
        Some(Value::Array(list)) => list,
        _ => Vec::new(),
    };
    if !root.contains_key("edges") {
        root.insert("edges".to_string(), Value::Array(Vec::new()));
    }

    // id -> node index; duplicate ids resolve to the last occurrence, but the
    // first occurrence fixes the processing position.
    let mut lookup: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for (idx, node) in nodes.iter().enumerate() {
        let Some(id) = node_id(node) else { continue };
        if !lookup.contains_key(id) {
            order.push(id.to_string());
        }
        lookup.insert(id.to_string(), idx);
    }

    let group_ids: Vec<String> = order
        .iter()
        .filter(|id| is_group(&nodes[lookup[id.as_str()]]))
        .cloned()
        .collect();

    let mut members: HashMap<String, Membership> = group_ids
        .iter()
        .map(|id| (id.clone(), Membership::default()))
        .collect();

    let mut resource_scopes: BTreeMap<String, ScopeRecord> = BTreeMap::new();

    // Assign scopes to service nodes based on parent groups and tags.
    for id in &order {
        let idx = lookup[id.as_str()];
        if is_group(&nodes[idx]) {
            continue;
        }

        let chain_groups: Vec<GroupInfo> = parent_chain(idx, &nodes, &lookup)
            .into_iter()
            .filter(|&i| is_group(&nodes[i]))
            .map(|i| group_info(&nodes[i]))
            .collect();

        let mut scope = ScopeRecord::default();

        let Some(node) = nodes[idx].as_object_mut() else {
            continue;
        };
        if !node.get("data").map(Value::is_object).unwrap_or(false) {
            node.insert("data".to_string(), Value::Object(Map::new()));
        }
        let Some(data) = node.get_mut("data").and_then(Value::as_object_mut) else {
            continue;
        };
        let tags: Map<String, Value> = data
            .get("tags")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        if !data.get("metadata").map(Value::is_object).unwrap_or(false) {
            data.insert("metadata".to_string(), Value::Object(Map::new()));
        }
        let Some(metadata) = data.get_mut("metadata").and_then(Value::as_object_mut) else {
            continue;
        };

        for group in &chain_groups {
            if let Some(m) = members.get_mut(&group.id) {
                m.services.insert(id.clone());
            }

            match group.group_type.as_str() {
                "managementGroup" => {
                    let mg_id = extract_identifier(
                        &group.metadata,
                        &["managementGroupId", "name", "displayName", "id"],
                    );
                    if !mg_id.is_empty() {
                        push_unique(&mut scope.management_groups, &mg_id);
                        if !is_set(metadata.get("managementGroupId")) {
                            metadata.insert("managementGroupId".to_string(), Value::String(mg_id));
                        }
                    }
                }
                "subscription" => {
                    let sub_id =
                        extract_identifier(&group.metadata, &["subscriptionId", "id", "name"]);
                    if !sub_id.is_empty() {
                        push_unique(&mut scope.subscriptions, &sub_id);
                        if !is_set(metadata.get("subscriptionId")) {
                            metadata.insert("subscriptionId".to_string(), Value::String(sub_id));
                        }
                    }
                }
                "policyAssignment" => {
                    let assignment = PolicyAssignmentRef {
                        policy_definition_id: extract_identifier(
                            &group.metadata,
                            &["policyDefinitionId", "policyAssignmentId", "id"],
                        ),
                        display_name: group.display.clone(),
                        scope: group
                            .metadata
                            .get("scope")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                    };
                    if assignment.is_empty() {
                        continue;
                    }
                    let entry = assignment.as_value();
                    if !scope.policy_assignments.contains(&assignment) {
                        scope.policy_assignments.push(assignment);
                    }
                    let list = ensure_list(metadata, "policyAssignments");
                    if !list.contains(&entry) {
                        list.push(entry);
                    }
                }
                "roleAssignment" => {
                    let assignment = RoleAssignmentRef {
                        role_definition_id: extract_identifier(
                            &group.metadata,
                            &["roleDefinitionId", "roleId", "id", "name"],
                        ),
                        principal_id: group
                            .metadata
                            .get("principalId")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                        principal_type: group
                            .metadata
                            .get("principalType")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                        display_name: group.display.clone(),
                    };
                    if assignment.is_empty() {
                        continue;
                    }
                    let entry = assignment.as_value();
                    if !scope.role_assignments.contains(&assignment) {
                        scope.role_assignments.push(assignment);
                    }
                    let list = ensure_list(metadata, "roleAssignments");
                    if !list.contains(&entry) {
                        list.push(entry);
                    }
                }
                _ => {}
            }
        }

        // Tag heuristics: fall back to the node's own tags for identifiers
        // the chain did not provide.
        if !is_set(metadata.get("subscriptionId")) {
            if let Some(tag) = tags.get("subscriptionId").and_then(Value::as_str) {
                let tag = tag.trim();
                if !tag.is_empty() {
                    metadata
                        .insert("subscriptionId".to_string(), Value::String(tag.to_string()));
                    push_unique(&mut scope.subscriptions, tag);
                }
            }
        }
        if !is_set(metadata.get("managementGroupId")) {
            if let Some(tag) = tags.get("managementGroupId").and_then(Value::as_str) {
                let tag = tag.trim();
                if !tag.is_empty() {
                    metadata.insert(
                        "managementGroupId".to_string(),
                        Value::String(tag.to_string()),
                    );
                    push_unique(&mut scope.management_groups, tag);
                }
            }
        }

        if !scope.management_groups.is_empty() {
            let list = ensure_list(metadata, "managementGroups");
            for mg in &scope.management_groups {
                let v = Value::String(mg.clone());
                if !mg.is_empty() && !list.contains(&v) {
                    list.push(v);
                }
            }
        }
        if !scope.subscriptions.is_empty() {
            let list = ensure_list(metadata, "subscriptions");
            for sub in &scope.subscriptions {
                let v = Value::String(sub.clone());
                if !sub.is_empty() && !list.contains(&v) {
                    list.push(v);
                }
            }
        }

        resource_scopes.insert(id.clone(), scope);
    }

    // Group-to-group containment.
    for gid in &group_ids {
        if let Some(pid) = parent_id(&nodes[lookup[gid.as_str()]]) {
            if group_ids.iter().any(|g| g.as_str() == pid) {
                if let Some(m) = members.get_mut(pid) {
                    m.groups.insert(gid.clone());
                }
            }
        }
    }

    // Build the summary. Unrecognized group types still tracked memberships
    // above but do not appear in any summary category.
    let mut summary = GovernanceSummary::default();
    for gid in &group_ids {
        let info = group_info(&nodes[lookup[gid.as_str()]]);
        let membership = members.get(gid);
        let entry = GroupEntry {
            id: gid.clone(),
            label: if info.display.is_empty() {
                gid.clone()
            } else {
                info.display.clone()
            },
            metadata: info.metadata.clone(),
            parent_id: info.parent.clone(),
            child_groups: membership
                .map(|m| m.groups.iter().cloned().collect())
                .unwrap_or_default(),
            member_services: membership
                .map(|m| m.services.iter().cloned().collect())
                .unwrap_or_default(),
        };
        match info.group_type.as_str() {
            "managementGroup" => summary.management_groups.push(entry),
            "subscription" => summary.subscriptions.push(entry),
            "landingZone" => summary.landing_zones.push(entry),
            "policyAssignment" => summary.policy_assignments.push(entry),
            "roleAssignment" => summary.role_assignments.push(entry),
            "virtualNetwork" => summary.virtual_networks.push(entry),
            _ => {}
        }
    }

    let mut warnings: Vec<String> = Vec::new();
    if summary.management_groups.is_empty() {
        warnings.push(
            "No management group defined: deployments will lack a governance root scope."
                .to_string(),
        );
    }
    if summary.subscriptions.is_empty() {
        warnings.push(
            "No subscription defined: resources may not have an explicit deployment scope."
                .to_string(),
        );
    }
    if summary.landing_zones.is_empty() {
        warnings.push(
            "No landing zone container detected: consider grouping workload resources into landing zones."
                .to_string(),
        );
    }
    if summary.virtual_networks.is_empty() {
        warnings.push(
            "No virtual network defined: landing zones typically include hub/spoke networking."
                .to_string(),
        );
    }

    root.insert("nodes".to_string(), Value::Array(nodes));
    if !root.get("metadata").map(Value::is_object).unwrap_or(false) {
        root.insert("metadata".to_string(), Value::Object(Map::new()));
    }
    if let Some(meta) = root.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.insert(
            "governance_summary".to_string(),
            serde_json::to_value(&summary).unwrap_or(Value::Null),
        );
        meta.insert(
            "resource_scopes".to_string(),
            serde_json::to_value(&resource_scopes).unwrap_or(Value::Null),
        );
    }

    let report = PreflightReport {
        warnings,
        governance_summary: summary,
        resource_scopes,
    };

    (Value::Object(root), report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const ALL_WARNINGS: [&str; 4] = [
        "No management group defined: deployments will lack a governance root scope.",
        "No subscription defined: resources may not have an explicit deployment scope.",
        "No landing zone container detected: consider grouping workload resources into landing zones.",
        "No virtual network defined: landing zones typically include hub/spoke networking.",
    ];

    fn group(id: &str, group_type: &str, metadata: Value) -> Value {
        json!({
            "id": id,
            "type": GROUP_NODE_TYPE,
            "data": { "groupType": group_type, "metadata": metadata },
        })
    }

    #[test]
    fn empty_input_yields_empty_structures_and_all_warnings() {
        let (diagram, report) = enrich_diagram(None);

        assert_eq!(diagram["nodes"], json!([]));
        assert_eq!(diagram["edges"], json!([]));
        let summary = &diagram["metadata"]["governance_summary"];
        for category in [
            "managementGroups",
            "subscriptions",
            "landingZones",
            "policyAssignments",
            "roleAssignments",
            "virtualNetworks",
        ] {
            assert_eq!(summary[category], json!([]), "category {}", category);
        }
        assert_eq!(diagram["metadata"]["resource_scopes"], json!({}));
        assert_eq!(report.warnings, ALL_WARNINGS);
    }

    #[test]
    fn malformed_input_treated_as_empty() {
        let (diagram, report) = enrich_diagram(Some(&json!("not a diagram")));
        assert_eq!(diagram["nodes"], json!([]));
        assert_eq!(report.warnings.len(), 4);

        let (diagram, _) = enrich_diagram(Some(&json!({ "nodes": "garbage" })));
        assert_eq!(diagram["nodes"], json!([]));
    }

    #[test]
    fn management_group_chain_assigns_scope() {
        let input = json!({
            "nodes": [
                group("g1", "managementGroup", json!({ "managementGroupId": "mg-root" })),
                { "id": "r1", "type": "azure.service", "parentNode": "g1", "data": {} },
            ],
            "edges": [],
        });

        let (diagram, report) = enrich_diagram(Some(&input));

        let scope = &report.resource_scopes["r1"];
        assert_eq!(scope.management_groups, vec!["mg-root"]);
        assert_eq!(
            diagram["nodes"][1]["data"]["metadata"]["managementGroupId"],
            json!("mg-root")
        );
        assert_eq!(
            diagram["nodes"][1]["data"]["metadata"]["managementGroups"],
            json!(["mg-root"])
        );

        let mgs = &report.governance_summary.management_groups;
        assert_eq!(mgs.len(), 1);
        assert_eq!(mgs[0].id, "g1");
        assert_eq!(mgs[0].member_services, vec!["r1"]);

        // Management group present, so warning 1 is gone but 2-4 remain.
        assert_eq!(report.warnings, &ALL_WARNINGS[1..]);
    }

    #[test]
    fn tag_fallback_sets_subscription() {
        let input = json!({
            "nodes": [
                { "id": "r1", "data": { "tags": { "subscriptionId": " sub-123 " } } },
            ],
        });

        let (diagram, report) = enrich_diagram(Some(&input));

        assert_eq!(
            diagram["nodes"][0]["data"]["metadata"]["subscriptionId"],
            json!("sub-123")
        );
        assert_eq!(report.resource_scopes["r1"].subscriptions, vec!["sub-123"]);
    }

    #[test]
    fn tag_fallback_does_not_override_chain_value() {
        let input = json!({
            "nodes": [
                group("sub", "subscription", json!({ "subscriptionId": "sub-chain" })),
                {
                    "id": "r1",
                    "parentNode": "sub",
                    "data": { "tags": { "subscriptionId": "sub-tag" } },
                },
            ],
        });

        let (diagram, report) = enrich_diagram(Some(&input));

        assert_eq!(
            diagram["nodes"][1]["data"]["metadata"]["subscriptionId"],
            json!("sub-chain")
        );
        assert_eq!(report.resource_scopes["r1"].subscriptions, vec!["sub-chain"]);
    }

    #[test]
    fn duplicate_policy_ancestors_dedupe() {
        let policy_meta = json!({ "policyDefinitionId": "pol-1", "scope": "/mg/root" });
        let input = json!({
            "nodes": [
                group("p1", "policyAssignment", policy_meta.clone()),
                {
                    "id": "p2",
                    "type": GROUP_NODE_TYPE,
                    "parentNode": "p1",
                    "data": { "groupType": "policyAssignment", "metadata": policy_meta },
                },
                { "id": "r1", "parentNode": "p2", "data": {} },
            ],
        });

        let (diagram, report) = enrich_diagram(Some(&input));

        let scope = &report.resource_scopes["r1"];
        assert_eq!(scope.policy_assignments.len(), 1);
        assert_eq!(scope.policy_assignments[0].policy_definition_id, "pol-1");
        assert_eq!(scope.policy_assignments[0].scope, "/mg/root");
        assert_eq!(
            diagram["nodes"][2]["data"]["metadata"]["policyAssignments"]
                .as_array()
                .map(Vec::len),
            Some(1)
        );
    }

    #[test]
    fn all_empty_policy_descriptor_is_skipped() {
        let input = json!({
            "nodes": [
                group("p1", "policyAssignment", json!({})),
                { "id": "r1", "parentNode": "p1", "data": {} },
            ],
        });

        let (diagram, report) = enrich_diagram(Some(&input));

        assert!(report.resource_scopes["r1"].policy_assignments.is_empty());
        assert!(diagram["nodes"][1]["data"]["metadata"]
            .get("policyAssignments")
            .is_none());
    }

    #[test]
    fn role_assignment_descriptor_reads_principal_fields() {
        let input = json!({
            "nodes": [
                {
                    "id": "role1",
                    "type": GROUP_NODE_TYPE,
                    "data": {
                        "groupType": "roleAssignment",
                        "label": "Contributor for Ops",
                        "metadata": {
                            "roleDefinitionId": "role-contributor",
                            "principalId": "group-ops",
                            "principalType": "Group",
                        },
                    },
                },
                { "id": "r1", "parentNode": "role1", "data": {} },
            ],
        });

        let (_, report) = enrich_diagram(Some(&input));

        let roles = &report.resource_scopes["r1"].role_assignments;
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].role_definition_id, "role-contributor");
        assert_eq!(roles[0].principal_id, "group-ops");
        assert_eq!(roles[0].principal_type, "Group");
        assert_eq!(roles[0].display_name, "Contributor for Ops");
    }

    #[test]
    fn cycle_in_parent_chain_terminates() {
        let input = json!({
            "nodes": [
                {
                    "id": "a",
                    "type": GROUP_NODE_TYPE,
                    "parentNode": "b",
                    "data": { "groupType": "managementGroup", "metadata": { "managementGroupId": "mg-a" } },
                },
                {
                    "id": "b",
                    "type": GROUP_NODE_TYPE,
                    "parentNode": "a",
                    "data": { "groupType": "subscription", "metadata": { "subscriptionId": "sub-b" } },
                },
                { "id": "r1", "parentNode": "a", "data": {} },
            ],
        });

        let (_, report) = enrich_diagram(Some(&input));

        let scope = &report.resource_scopes["r1"];
        assert_eq!(scope.management_groups, vec!["mg-a"]);
        assert_eq!(scope.subscriptions, vec!["sub-b"]);
    }

    #[test]
    fn missing_parent_truncates_chain() {
        let input = json!({
            "nodes": [
                {
                    "id": "sub",
                    "type": GROUP_NODE_TYPE,
                    "parentNode": "ghost",
                    "data": { "groupType": "subscription", "metadata": { "subscriptionId": "sub-1" } },
                },
                { "id": "r1", "parentNode": "sub", "data": {} },
            ],
        });

        let (_, report) = enrich_diagram(Some(&input));
        assert_eq!(report.resource_scopes["r1"].subscriptions, vec!["sub-1"]);
    }

    #[test]
    fn identifier_key_precedence() {
        let input = json!({
            "nodes": [
                group("g1", "managementGroup", json!({
                    "id": "mg-by-id",
                    "displayName": "mg-by-display",
                    "name": "mg-by-name",
                    "managementGroupId": "mg-canonical",
                })),
                group("g2", "subscription", json!({ "name": "sub-by-name", "id": "sub-by-id" })),
                { "id": "r1", "parentNode": "g2", "data": {} },
            ],
        });
        // Chain r1 -> g2 only; g1 exercises key order via a second resource.
        let mut input = input;
        input["nodes"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "id": "r2", "parentNode": "g1", "data": {} }));

        let (_, report) = enrich_diagram(Some(&input));

        assert_eq!(report.resource_scopes["r1"].subscriptions, vec!["sub-by-id"]);
        assert_eq!(
            report.resource_scopes["r2"].management_groups,
            vec!["mg-canonical"]
        );
    }

    #[test]
    fn preset_identifiers_are_not_overwritten() {
        let input = json!({
            "nodes": [
                group("g1", "managementGroup", json!({ "managementGroupId": "mg-chain" })),
                {
                    "id": "r1",
                    "parentNode": "g1",
                    "data": { "metadata": { "managementGroupId": "mg-mine" } },
                },
            ],
        });

        let (diagram, report) = enrich_diagram(Some(&input));

        assert_eq!(
            diagram["nodes"][1]["data"]["metadata"]["managementGroupId"],
            json!("mg-mine")
        );
        // The chain value still lands in the scope record and merged list.
        assert_eq!(report.resource_scopes["r1"].management_groups, vec!["mg-chain"]);
        assert_eq!(
            diagram["nodes"][1]["data"]["metadata"]["managementGroups"],
            json!(["mg-chain"])
        );
    }

    #[test]
    fn nested_groups_track_child_groups_sorted() {
        let input = json!({
            "nodes": [
                group("mg", "managementGroup", json!({ "managementGroupId": "mg-root" })),
                {
                    "id": "sub-b",
                    "type": GROUP_NODE_TYPE,
                    "parentNode": "mg",
                    "data": { "groupType": "subscription", "metadata": { "subscriptionId": "s-b" } },
                },
                {
                    "id": "sub-a",
                    "type": GROUP_NODE_TYPE,
                    "parentNode": "mg",
                    "data": { "groupType": "subscription", "metadata": { "subscriptionId": "s-a" } },
                },
                { "id": "r2", "parentNode": "sub-a", "data": {} },
                { "id": "r1", "parentNode": "sub-a", "data": {} },
            ],
        });

        let (_, report) = enrich_diagram(Some(&input));

        let mg = &report.governance_summary.management_groups[0];
        assert_eq!(mg.child_groups, vec!["sub-a", "sub-b"]);
        assert_eq!(mg.member_services, vec!["r1", "r2"]);

        // Both resources inherit the management group through the subscription.
        assert_eq!(report.resource_scopes["r1"].management_groups, vec!["mg-root"]);
        assert_eq!(report.resource_scopes["r1"].subscriptions, vec!["s-a"]);
    }

    #[test]
    fn unrecognized_group_type_tracks_membership_but_not_summary() {
        let input = json!({
            "nodes": [
                group("zone", "availabilityZone", json!({})),
                { "id": "r1", "parentNode": "zone", "data": {} },
            ],
        });

        let (_, report) = enrich_diagram(Some(&input));

        let s = &report.governance_summary;
        assert!(s.management_groups.is_empty());
        assert!(s.subscriptions.is_empty());
        assert!(s.landing_zones.is_empty());
        assert!(s.policy_assignments.is_empty());
        assert!(s.role_assignments.is_empty());
        assert!(s.virtual_networks.is_empty());
        // The resource still gets a (fully empty) scope record.
        assert_eq!(report.resource_scopes["r1"], ScopeRecord::default());
    }

    #[test]
    fn group_type_falls_back_to_data_type_key() {
        let input = json!({
            "nodes": [
                {
                    "id": "lz",
                    "type": GROUP_NODE_TYPE,
                    "data": { "type": "landingZone", "label": "Corp LZ" },
                },
            ],
        });

        let (_, report) = enrich_diagram(Some(&input));

        let lz = &report.governance_summary.landing_zones;
        assert_eq!(lz.len(), 1);
        assert_eq!(lz[0].label, "Corp LZ");
        // Landing zone warning no longer fires.
        assert!(!report.warnings.iter().any(|w| w.contains("landing zone")));
    }

    #[test]
    fn group_nodes_and_idless_nodes_excluded_from_scopes() {
        let input = json!({
            "nodes": [
                group("g1", "subscription", json!({ "subscriptionId": "s-1" })),
                { "data": { "label": "no id" } },
                { "id": "", "data": {} },
                { "id": "r1", "parentNode": "g1", "data": {} },
            ],
        });

        let (_, report) = enrich_diagram(Some(&input));

        assert_eq!(report.resource_scopes.len(), 1);
        assert!(report.resource_scopes.contains_key("r1"));
    }

    #[test]
    fn edges_and_unknown_fields_pass_through() {
        let input = json!({
            "nodes": [],
            "edges": [ { "id": "e1", "source": "a", "target": "b", "weird": { "x": 1 } } ],
            "viewport": { "zoom": 1.5 },
            "metadata": { "author": "someone" },
        });

        let (diagram, _) = enrich_diagram(Some(&input));

        assert_eq!(diagram["edges"], input["edges"]);
        assert_eq!(diagram["viewport"], input["viewport"]);
        assert_eq!(diagram["metadata"]["author"], json!("someone"));
        assert!(diagram["metadata"]["governance_summary"].is_object());
    }

    #[test]
    fn input_is_not_mutated() {
        let input = json!({
            "nodes": [
                group("g1", "managementGroup", json!({ "managementGroupId": "mg-root" })),
                { "id": "r1", "parentNode": "g1", "data": { "metadata": {} } },
            ],
        });
        let before = input.clone();

        let _ = enrich_diagram(Some(&input));

        assert_eq!(input, before);
    }

    #[test]
    fn re_enrichment_is_idempotent() {
        let input = json!({
            "nodes": [
                group("mg", "managementGroup", json!({ "managementGroupId": "mg-root" })),
                {
                    "id": "pol",
                    "type": GROUP_NODE_TYPE,
                    "parentNode": "mg",
                    "data": {
                        "groupType": "policyAssignment",
                        "label": "Deny public IPs",
                        "metadata": { "policyDefinitionId": "pol-1" },
                    },
                },
                {
                    "id": "r1",
                    "parentNode": "pol",
                    "data": { "tags": { "subscriptionId": "sub-9" } },
                },
            ],
        });

        let (first, first_report) = enrich_diagram(Some(&input));
        let (second, second_report) = enrich_diagram(Some(&first));

        assert_eq!(first, second);
        assert_eq!(first_report.resource_scopes, second_report.resource_scopes);
        assert_eq!(
            first_report.governance_summary,
            second_report.governance_summary
        );
    }

    #[test]
    fn non_list_metadata_slot_is_replaced() {
        let input = json!({
            "nodes": [
                group("g1", "managementGroup", json!({ "managementGroupId": "mg-root" })),
                {
                    "id": "r1",
                    "parentNode": "g1",
                    "data": { "metadata": { "managementGroups": "corrupt" } },
                },
            ],
        });

        let (diagram, _) = enrich_diagram(Some(&input));

        assert_eq!(
            diagram["nodes"][1]["data"]["metadata"]["managementGroups"],
            json!(["mg-root"])
        );
    }
}
