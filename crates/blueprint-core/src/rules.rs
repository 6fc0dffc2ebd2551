/// Governance modeling rules — single source of truth for IaC generation
/// prompts and MCP instructions.
pub const RULES: &str = "\
1. Group nodes carry governance, resource nodes carry workloads. A node with type \
\"azure.group\" is a container (management group, subscription, landing zone, policy \
assignment, role assignment, or virtual network, per data.groupType). Every other node \
is a deployable resource.\n\
2. Nesting IS scope. A resource placed inside a subscription container deploys into \
that subscription; a subscription inside a management group inherits that management \
group. Do not duplicate scope information on edges — containment already expresses it.\n\
3. Identifiers live in data.metadata. Management groups are identified by \
managementGroupId (falling back to name, displayName, id); subscriptions by \
subscriptionId (falling back to id, name). Put the canonical identifier first — the \
fallbacks exist for hand-drawn diagrams, not as a recommended style.\n\
4. Policy and role assignments are containers too. Wrap the resources they govern in a \
policyAssignment or roleAssignment group. Policy containers should set \
policyDefinitionId and scope in metadata; role containers should set roleDefinitionId, \
principalId, and principalType. A display label on the group becomes the assignment's \
displayName.\n\
5. Tags are a fallback, not the primary channel. data.tags.subscriptionId and \
data.tags.managementGroupId are honored only when the parent chain provides no value. \
Prefer explicit group containers.\n\
6. Enrichment is additive and idempotent. It never removes or rewrites identifiers the \
diagram already carries; it only fills gaps and merges deduplicated lists. Running it \
twice produces the same result.\n\
7. The preflight warnings are advisory. A missing management group, subscription, \
landing zone, or virtual network does not block generation, but production \
architectures should resolve all four before deploying.\n\
8. Every resource node needs a stable, unique id. Nodes without an id are passed \
through untouched and get no scope record.\n\
9. Landing zones group workloads, not governance. Use landingZone containers to bundle \
the resources of one workload; use management groups and subscriptions for the \
hierarchy above them. Landing zones typically contain a virtualNetwork container for \
hub/spoke networking.\n\
10. Edges describe data and control flow only. The enrichment engine ignores edges; \
generators may use them to infer dependencies between resources, so keep them \
source->target in the direction of the dependency.";
