//! The federation engine facade.
//!
//! One engine instance serves the whole process: registries are built once
//! from the topology and shared read-only across requests. Searches build a
//! plan per request and execute it; instance-level operations route through
//! the per-action eligibility rules and proxy the chosen backend's outcome.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{FhirClient, WriteOutcome};
use crate::config::{ConfigWarning, FederationConfig, SetupConfig};
use crate::error::{FederationError, FederationResult};
use crate::exec::ChainExecutor;
use crate::plan::QueryPlanBuilder;
use crate::registry::{ClientRegistry, Location, RouteRegistry, SearchPathRegistry};
use crate::routing::{eligible_location, eligible_locations, Action, RoutingError};
use crate::types::{resource_id, resource_type, SearchExpression};

/// Deadline applied to each backend request; pagination follow-ups are
/// separate requests with their own deadline.
const BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

/// The federation engine.
#[derive(Debug, Clone)]
pub struct FederationEngine {
    clients: Arc<ClientRegistry>,
    routes: Arc<RouteRegistry>,
    search_paths: Arc<SearchPathRegistry>,
    executor: ChainExecutor,
}

impl FederationEngine {
    /// Builds an engine from a topology, validating it first.
    ///
    /// Returns the engine together with any non-fatal topology warnings.
    /// When a search-parameter bootstrap source is configured, its
    /// definitions are paged in here; a bootstrap failure logs and falls
    /// back to the built-in defaults.
    pub async fn from_config(
        config: &FederationConfig,
    ) -> Result<(Self, Vec<ConfigWarning>), FederationError> {
        let warnings = config.validate()?;
        for warning in &warnings {
            warn!(warning = %warning, "federation topology warning");
        }

        let http = reqwest::Client::builder().timeout(BACKEND_TIMEOUT).build()?;
        let clients = Arc::new(ClientRegistry::from_members(&config.members, http.clone())?);
        let routes = Arc::new(RouteRegistry::from_config(config));

        let mut search_paths = SearchPathRegistry::with_defaults();
        if let Some(setup) = &config.setup {
            match bootstrap_search_paths(&mut search_paths, setup, http.clone()).await {
                Ok(count) => {
                    info!(source = %setup.url, definitions = count, "loaded search parameter definitions")
                }
                Err(error) => warn!(
                    source = %setup.url,
                    error = %error,
                    "search parameter bootstrap failed, continuing with built-in defaults"
                ),
            }
        }
        let search_paths = Arc::new(search_paths);

        let executor = ChainExecutor::new(Arc::clone(&clients), Arc::clone(&routes), http);
        info!(
            members = clients.len(),
            parameter_types = search_paths.type_count(),
            "federation engine ready"
        );
        Ok((
            Self {
                clients,
                routes,
                search_paths,
                executor,
            },
            warnings,
        ))
    }

    /// The route table.
    pub fn routes(&self) -> &Arc<RouteRegistry> {
        &self.routes
    }

    /// The number of member backends.
    pub fn member_count(&self) -> usize {
        self.clients.len()
    }

    /// The search-parameter definitions.
    pub fn search_paths(&self) -> &Arc<SearchPathRegistry> {
        &self.search_paths
    }

    /// Executes a federated search and returns the merged result list.
    ///
    /// Under strict handling, unknown search parameter keys fail the
    /// request; under lenient handling they degrade to unfiltered fetches.
    pub async fn search(
        &self,
        expression: &SearchExpression,
        strict: bool,
    ) -> FederationResult<Vec<Value>> {
        let plan = QueryPlanBuilder::new(Arc::clone(&self.search_paths))
            .strict(strict)
            .build(expression)?;
        plan.execute(&self.executor).await
    }

    /// Reads one instance by id, trying eligible locations in route order.
    ///
    /// Instance rules cannot be evaluated before the instance exists, so
    /// only locations whose read rule is absent or a literal participate.
    pub async fn read(&self, resource_type: &str, id: &str) -> FederationResult<Option<Value>> {
        let route = self.routes.route(resource_type);
        let locations = eligible_locations(&route, Action::Read, None);
        if locations.is_empty() {
            return Err(RoutingError::NoEligibleBackend {
                resource_type: resource_type.to_string(),
                action: Action::Read,
            }
            .into());
        }
        let mut first_error = None;
        for location in locations {
            let Some(client) = self.clients.client(location.member()) else {
                warn!(member = location.member(), "no client registered for route member");
                continue;
            };
            match client.read(resource_type, id).await {
                Ok(Some(resource)) => return Ok(Some(resource)),
                Ok(None) => continue,
                Err(error) => {
                    warn!(
                        member = location.member(),
                        resource_type,
                        id,
                        error = %error,
                        "read failed at backend"
                    );
                    first_error.get_or_insert(error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(None),
        }
    }

    /// Creates a resource at the first eligible location.
    pub async fn create(
        &self,
        resource_type: &str,
        resource: &Value,
    ) -> FederationResult<WriteOutcome> {
        let route = self.routes.route(resource_type);
        let location = eligible_location(&route, Action::Create, Some(resource))?;
        let client = self.client_for(resource_type, location)?;
        debug!(member = location.member(), resource_type, "routing create");
        client.create(resource_type, resource).await
    }

    /// Updates one instance at the first eligible location.
    ///
    /// The body's `id` is forced to the target id before rule evaluation,
    /// so update rules see the resource exactly as it will be written.
    pub async fn update(
        &self,
        resource_type: &str,
        id: &str,
        resource: &Value,
    ) -> FederationResult<WriteOutcome> {
        let outgoing = with_id(resource, id);
        let route = self.routes.route(resource_type);
        let location = eligible_location(&route, Action::Update, Some(&outgoing))?;
        let client = self.client_for(resource_type, location)?;
        debug!(member = location.member(), resource_type, id, "routing update");
        client.update(resource_type, id, &outgoing).await
    }

    /// Deletes one instance at the first eligible location.
    pub async fn delete(&self, resource_type: &str, id: &str) -> FederationResult<WriteOutcome> {
        let route = self.routes.route(resource_type);
        let location = eligible_location(&route, Action::Delete, None)?;
        let client = self.client_for(resource_type, location)?;
        debug!(member = location.member(), resource_type, id, "routing delete");
        client.delete(resource_type, id).await
    }

    /// Conditional update: searches for matches, then updates each one.
    ///
    /// Sibling writes proceed even when one fails. The overall outcome is
    /// the first success, else the first captured failure; no match at all
    /// is a [`FederationError::NoMatch`].
    pub async fn conditional_update(
        &self,
        resource_type: &str,
        expression: &SearchExpression,
        resource: &Value,
        strict: bool,
    ) -> FederationResult<WriteOutcome> {
        let matches = self.search(expression, strict).await?;
        let targets = match_targets(resource_type, &matches);
        if targets.is_empty() {
            return Err(FederationError::NoMatch {
                resource_type: resource_type.to_string(),
            });
        }
        debug!(resource_type, targets = targets.len(), "conditional update matched");

        let route = self.routes.route(resource_type);
        let mut first_success = None;
        let mut first_failure = None;
        for id in &targets {
            let outgoing = with_id(resource, id);
            let outcome = match eligible_location(&route, Action::Update, Some(&outgoing)) {
                Ok(location) => match self.client_for(resource_type, location) {
                    Ok(client) => {
                        capture(client.update(resource_type, id, &outgoing).await, 502)
                    }
                    Err(_) => unroutable_outcome(resource_type, id, "update"),
                },
                Err(_) => unroutable_outcome(resource_type, id, "update"),
            };
            if outcome.is_success() {
                first_success.get_or_insert(outcome);
            } else {
                first_failure.get_or_insert(outcome);
            }
        }
        finish_conditional(resource_type, first_success, first_failure)
    }

    /// Conditional delete: searches for matches, then deletes each one.
    pub async fn conditional_delete(
        &self,
        resource_type: &str,
        expression: &SearchExpression,
        strict: bool,
    ) -> FederationResult<WriteOutcome> {
        let matches = self.search(expression, strict).await?;
        let targets = match_targets(resource_type, &matches);
        if targets.is_empty() {
            return Err(FederationError::NoMatch {
                resource_type: resource_type.to_string(),
            });
        }
        debug!(resource_type, targets = targets.len(), "conditional delete matched");

        let route = self.routes.route(resource_type);
        let mut first_success = None;
        let mut first_failure = None;
        for id in &targets {
            let outcome = match eligible_location(&route, Action::Delete, None) {
                Ok(location) => match self.client_for(resource_type, location) {
                    Ok(client) => capture(client.delete(resource_type, id).await, 502),
                    Err(_) => unroutable_outcome(resource_type, id, "delete"),
                },
                Err(_) => unroutable_outcome(resource_type, id, "delete"),
            };
            if outcome.is_success() {
                first_success.get_or_insert(outcome);
            } else {
                first_failure.get_or_insert(outcome);
            }
        }
        finish_conditional(resource_type, first_success, first_failure)
    }

    fn client_for(
        &self,
        resource_type: &str,
        location: &Location,
    ) -> FederationResult<Arc<FhirClient>> {
        self.clients.client(location.member()).ok_or_else(|| {
            RoutingError::UnknownMember {
                resource_type: resource_type.to_string(),
                member: location.member().to_string(),
            }
            .into()
        })
    }
}

async fn bootstrap_search_paths(
    registry: &mut SearchPathRegistry,
    setup: &SetupConfig,
    http: reqwest::Client,
) -> FederationResult<usize> {
    let base = url::Url::parse(&setup.url)?;
    let client = FhirClient::new("setup", base, http);
    let resources = client
        .search_all("SearchParameter", Some("_count=200"))
        .await?;
    let mut count = 0;
    for resource in &resources {
        count += registry.apply_search_parameter(resource);
    }
    Ok(count)
}

/// Collects the distinct logical ids of matches of the subject type.
fn match_targets(target_type: &str, matches: &[Value]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for instance in matches {
        if resource_type(instance) != Some(target_type) {
            continue;
        }
        let Some(id) = resource_id(instance) else {
            continue;
        };
        if seen.insert(id.to_string()) {
            ids.push(id.to_string());
        }
    }
    ids
}

fn with_id(resource: &Value, id: &str) -> Value {
    let mut outgoing = resource.clone();
    if let Some(object) = outgoing.as_object_mut() {
        object.insert("id".to_string(), Value::String(id.to_string()));
    }
    outgoing
}

/// Flattens a write result into an outcome, giving transport failures a
/// gateway status.
fn capture(result: FederationResult<WriteOutcome>, transport_status: u16) -> WriteOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(error) => {
            warn!(error = %error, "write failed in transit");
            WriteOutcome {
                status: error.backend_status().unwrap_or(transport_status),
                body: None,
                location: None,
            }
        }
    }
}

fn unroutable_outcome(resource_type: &str, id: &str, action: &str) -> WriteOutcome {
    warn!(resource_type, id, action, "no eligible backend for conditional write target");
    WriteOutcome {
        status: 422,
        body: None,
        location: None,
    }
}

fn finish_conditional(
    resource_type: &str,
    first_success: Option<WriteOutcome>,
    first_failure: Option<WriteOutcome>,
) -> FederationResult<WriteOutcome> {
    if let Some(success) = first_success {
        return Ok(success);
    }
    if let Some(failure) = first_failure {
        return Ok(failure);
    }
    Err(FederationError::NoMatch {
        resource_type: resource_type.to_string(),
    })
}
