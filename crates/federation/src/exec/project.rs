//! Identifier projection over upstream instances.
//!
//! A dependent hop's filter values come from walking a projection path over
//! the upstream result set and collecting business identifier tokens. The
//! path's trailing bare `identifier` segment (duplicated by convention in
//! dependency paths) is trimmed before walking; what remains selects either
//! the instances themselves or reference elements on them. References
//! without an inline identifier are dereferenced through the route table to
//! the backend that holds them; a reference that cannot be resolved is
//! logged and dropped, never fatal.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::eval::walk;
use crate::registry::{ClientRegistry, Route, RouteRegistry};
use crate::types::{resource_type, Identifier};

/// Dereferences `Type/id` and absolute references across the federation.
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    clients: Arc<ClientRegistry>,
    routes: Arc<RouteRegistry>,
    http: reqwest::Client,
}

impl ReferenceResolver {
    /// Creates a resolver over the registries and a shared HTTP pool.
    pub fn new(
        clients: Arc<ClientRegistry>,
        routes: Arc<RouteRegistry>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            clients,
            routes,
            http,
        }
    }

    /// Resolves a reference value to the instance it points at.
    ///
    /// Relative references try the target type's route locations in order;
    /// absolute references are fetched directly. `None` when nothing
    /// resolves.
    pub async fn resolve(&self, reference: &str) -> Option<Value> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return match self.http.get(reference).send().await {
                Ok(response) if response.status().is_success() => {
                    response.json().await.ok()
                }
                Ok(response) => {
                    debug!(reference, status = %response.status(), "absolute reference fetch failed");
                    None
                }
                Err(error) => {
                    warn!(reference, error = %error, "absolute reference fetch failed");
                    None
                }
            };
        }

        let (target_type, id) = reference.split_once('/')?;
        if target_type.is_empty() || id.is_empty() {
            return None;
        }
        let route = self.routes.route(target_type);
        for location in route.locations() {
            let Some(client) = self.clients.client(location.member()) else {
                continue;
            };
            match client.read(target_type, id).await {
                Ok(Some(resource)) => return Some(resource),
                Ok(None) => continue,
                Err(error) => {
                    warn!(
                        reference,
                        member = location.member(),
                        error = %error,
                        "reference resolution failed at backend"
                    );
                }
            }
        }
        None
    }
}

/// The union of identifier systems named by a route's allow-list groups, or
/// `None` when the route has no allow-list.
pub fn allowed_systems(route: &Route) -> Option<HashSet<String>> {
    if route.identifier_groups().is_empty() {
        return None;
    }
    Some(
        route
            .identifier_groups()
            .iter()
            .flatten()
            .cloned()
            .collect(),
    )
}

/// Projects identifier search tokens out of `instances` along `path`.
///
/// Tokens are deduplicated preserving first-seen order. With an allow-list,
/// identifiers whose system is not listed (including system-less ones) are
/// dropped.
pub async fn project_identifiers(
    resolver: &ReferenceResolver,
    instances: &[Value],
    path: &str,
    allowed: Option<&HashSet<String>>,
) -> Vec<String> {
    let segments = projection_segments(path);
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    for instance in instances {
        for node in select_nodes(instance, &segments) {
            for identifier in identifiers_of_node(resolver, node).await {
                if !system_allowed(&identifier, allowed) {
                    continue;
                }
                let token = identifier.token();
                if seen.insert(token.clone()) {
                    tokens.push(token);
                }
            }
        }
    }
    tokens
}

/// Discovers concrete target types for an untyped include hop.
///
/// Walks the projection path, reads each reference's target type (from the
/// reference value itself, or by resolving it), and groups identifier tokens
/// per discovered type. References whose type cannot be learned are logged
/// and skipped.
pub async fn discover_targets(
    resolver: &ReferenceResolver,
    instances: &[Value],
    path: &str,
    allowed: Option<&HashSet<String>>,
) -> BTreeMap<String, Vec<String>> {
    let segments = projection_segments(path);
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut by_type: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for instance in instances {
        for node in select_nodes(instance, &segments) {
            let Some((target_type, identifiers)) = reference_target(resolver, node).await else {
                debug!("reference target type could not be discovered, skipping");
                continue;
            };
            for identifier in identifiers {
                if !system_allowed(&identifier, allowed) {
                    continue;
                }
                let token = identifier.token();
                if seen.insert((target_type.clone(), token.clone())) {
                    by_type.entry(target_type.clone()).or_default().push(token);
                }
            }
        }
    }
    by_type
}

/// Splits a projection path and trims the conventional trailing
/// `identifier` segment.
fn projection_segments(path: &str) -> Vec<String> {
    let mut segments: Vec<String> = path
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if segments.last().map(String::as_str) == Some("identifier") {
        segments.pop();
    }
    segments
}

fn select_nodes<'a>(instance: &'a Value, segments: &[String]) -> Vec<&'a Value> {
    if segments.is_empty() {
        vec![instance]
    } else {
        walk(instance, segments)
    }
}

fn system_allowed(identifier: &Identifier, allowed: Option<&HashSet<String>>) -> bool {
    match allowed {
        Some(systems) => identifier
            .system
            .as_ref()
            .is_some_and(|system| systems.contains(system)),
        None => true,
    }
}

fn is_reference_shaped(node: &Value) -> bool {
    node.is_object() && (node.get("reference").is_some() || node.get("display").is_some())
}

/// Collects the identifiers one projected node stands for.
async fn identifiers_of_node(resolver: &ReferenceResolver, node: &Value) -> Vec<Identifier> {
    match node {
        Value::String(reference) => match resolver.resolve(reference).await {
            Some(resource) => Identifier::all_of(&resource),
            None => Vec::new(),
        },
        Value::Object(_) if is_reference_shaped(node) => {
            if let Some(inline) = node.get("identifier").and_then(Identifier::from_json) {
                return vec![inline];
            }
            match node.get("reference").and_then(Value::as_str) {
                Some(reference) => match resolver.resolve(reference).await {
                    Some(resource) => Identifier::all_of(&resource),
                    None => Vec::new(),
                },
                None => Vec::new(),
            }
        }
        Value::Object(_) => {
            let identifiers = Identifier::all_of(node);
            if !identifiers.is_empty() {
                return identifiers;
            }
            Identifier::from_json(node).into_iter().collect()
        }
        _ => Vec::new(),
    }
}

/// Learns the concrete type a projected reference node points at, together
/// with the identifiers to query it by.
async fn reference_target(
    resolver: &ReferenceResolver,
    node: &Value,
) -> Option<(String, Vec<Identifier>)> {
    let reference = node.get("reference").and_then(Value::as_str);
    let inline = node.get("identifier").and_then(Identifier::from_json);

    if let Some(reference) = reference {
        if let Some(target_type) = relative_reference_type(reference) {
            if let Some(inline) = inline {
                return Some((target_type.to_string(), vec![inline]));
            }
            let resource = resolver.resolve(reference).await?;
            return Some((target_type.to_string(), Identifier::all_of(&resource)));
        }
        // Absolute reference: the type comes from the fetched body.
        let resource = resolver.resolve(reference).await?;
        let target_type = resource_type(&resource)?.to_string();
        return Some((target_type, Identifier::all_of(&resource)));
    }
    None
}

fn relative_reference_type(reference: &str) -> Option<&str> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return None;
    }
    let (target_type, id) = reference.split_once('/')?;
    if target_type.is_empty() || id.is_empty() {
        return None;
    }
    Some(target_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FederationConfig, ResourcesConfig};
    use serde_json::json;

    fn offline_resolver() -> ReferenceResolver {
        // No members and no routes: every resolution misses.
        let config = FederationConfig {
            members: Vec::new(),
            resources: ResourcesConfig::default(),
            setup: None,
        };
        let http = reqwest::Client::new();
        let clients = Arc::new(ClientRegistry::from_members(&config.members, http.clone()).unwrap());
        let routes = Arc::new(RouteRegistry::from_config(&config));
        ReferenceResolver::new(clients, routes, http)
    }

    fn patients() -> Vec<Value> {
        vec![
            json!({
                "resourceType": "Patient",
                "id": "p1",
                "identifier": [
                    {"system": "http://hospital.example/mrn", "value": "111"},
                    {"system": "http://hospital.example/ssn", "value": "900-1"}
                ]
            }),
            json!({
                "resourceType": "Patient",
                "id": "p2",
                "identifier": [{"system": "http://hospital.example/mrn", "value": "222"}]
            }),
            json!({
                "resourceType": "Patient",
                "id": "p3",
                "identifier": [{"system": "http://hospital.example/mrn", "value": "111"}]
            }),
        ]
    }

    #[tokio::test]
    async fn test_trailing_identifier_projects_instance_identifiers() {
        let resolver = offline_resolver();
        let tokens = project_identifiers(&resolver, &patients(), "identifier", None).await;
        assert_eq!(
            tokens,
            vec![
                "http://hospital.example/mrn|111",
                "http://hospital.example/ssn|900-1",
                "http://hospital.example/mrn|222",
            ]
        );
    }

    #[tokio::test]
    async fn test_allow_list_filters_systems() {
        let resolver = offline_resolver();
        let allowed: HashSet<String> = ["http://hospital.example/ssn".to_string()].into();
        let tokens =
            project_identifiers(&resolver, &patients(), "identifier", Some(&allowed)).await;
        assert_eq!(tokens, vec!["http://hospital.example/ssn|900-1"]);
    }

    #[tokio::test]
    async fn test_reference_path_uses_inline_identifier() {
        let resolver = offline_resolver();
        let encounters = vec![json!({
            "resourceType": "Encounter",
            "id": "e1",
            "subject": {
                "reference": "Patient/p1",
                "identifier": {"system": "http://hospital.example/mrn", "value": "111"}
            }
        })];
        let tokens =
            project_identifiers(&resolver, &encounters, "subject.identifier", None).await;
        assert_eq!(tokens, vec!["http://hospital.example/mrn|111"]);
    }

    #[tokio::test]
    async fn test_unresolvable_reference_is_dropped() {
        let resolver = offline_resolver();
        let encounters = vec![json!({
            "resourceType": "Encounter",
            "id": "e1",
            "subject": {"reference": "Patient/missing"}
        })];
        let tokens =
            project_identifiers(&resolver, &encounters, "subject.identifier", None).await;
        assert!(tokens.is_empty());
    }

    #[tokio::test]
    async fn test_discover_targets_from_typed_references() {
        let resolver = offline_resolver();
        let encounters = vec![
            json!({
                "resourceType": "Encounter",
                "subject": {
                    "reference": "Patient/p1",
                    "identifier": {"system": "http://s", "value": "1"}
                }
            }),
            json!({
                "resourceType": "Encounter",
                "subject": {
                    "reference": "Group/g1",
                    "identifier": {"system": "http://s", "value": "g"}
                }
            }),
            json!({
                "resourceType": "Encounter",
                "subject": {"identifier": {"system": "http://s", "value": "logical-only"}}
            }),
        ];
        let discovered =
            discover_targets(&resolver, &encounters, "subject.identifier", None).await;
        let types: Vec<&str> = discovered.keys().map(String::as_str).collect();
        assert_eq!(types, vec!["Group", "Patient"]);
        assert_eq!(discovered["Patient"], vec!["http://s|1"]);
        assert_eq!(discovered["Group"], vec!["http://s|g"]);
    }

    #[test]
    fn test_projection_segments_trim() {
        assert_eq!(projection_segments("identifier"), Vec::<String>::new());
        assert_eq!(projection_segments("subject.identifier"), vec!["subject"]);
        assert_eq!(
            projection_segments("participant.individual.identifier"),
            vec!["participant", "individual"]
        );
    }
}
