//! Tail-first chain execution with parallel backend fan-out.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::{urlencoding, FhirClient};
use crate::correlate::IdentityPredicate;
use crate::error::FederationResult;
use crate::plan::{Chain, PartialQuery};
use crate::registry::{ClientRegistry, RouteRegistry};

use super::cache::TypeCache;
use super::project::{allowed_systems, discover_targets, project_identifiers, ReferenceResolver};

/// Executes hop chains against the registered backends.
///
/// Hops run strictly in reverse-declared order; within one hop, every
/// (query, location) pair is fetched concurrently. A backend failure during
/// fan-out is logged and contributes zero results; the chain itself never
/// fails because one backend is down.
#[derive(Debug, Clone)]
pub struct ChainExecutor {
    clients: Arc<ClientRegistry>,
    routes: Arc<RouteRegistry>,
    resolver: ReferenceResolver,
    predicate: IdentityPredicate,
}

impl ChainExecutor {
    /// Creates an executor over the registries and a shared HTTP pool.
    pub fn new(
        clients: Arc<ClientRegistry>,
        routes: Arc<RouteRegistry>,
        http: reqwest::Client,
    ) -> Self {
        let resolver = ReferenceResolver::new(Arc::clone(&clients), Arc::clone(&routes), http);
        let predicate = IdentityPredicate::new(Arc::clone(&routes));
        Self {
            clients,
            routes,
            resolver,
            predicate,
        }
    }

    /// The correlation predicate sharing this executor's route table.
    pub fn predicate(&self) -> &IdentityPredicate {
        &self.predicate
    }

    /// Runs one chain against the cache, returning the lead type's
    /// accumulated cache entry (or, for untyped include chains, the
    /// instances the leading hop fetched across all discovered types).
    pub async fn run(&self, chain: &Chain, cache: &mut TypeCache) -> FederationResult<Vec<Value>> {
        let mut untyped_lead = Vec::new();
        for (index, hop) in chain.hops().iter().enumerate().rev() {
            let produced = self.execute_hop(hop, cache).await?;
            if index == 0 && hop.resource_type().is_none() {
                untyped_lead = produced;
            }
        }
        match chain.lead_type() {
            Some(lead) => Ok(cache.get(lead).map(<[Value]>::to_vec).unwrap_or_default()),
            None => Ok(untyped_lead),
        }
    }

    async fn execute_hop(
        &self,
        hop: &PartialQuery,
        cache: &mut TypeCache,
    ) -> FederationResult<Vec<Value>> {
        if let Some(dependency) = hop.dependency() {
            let upstream: Vec<Value> = match cache.get(&dependency.upstream_type) {
                Some(instances) => instances.to_vec(),
                None => {
                    warn!(
                        hop = %hop,
                        upstream = %dependency.upstream_type,
                        "dependency has no cached upstream instances"
                    );
                    Vec::new()
                }
            };
            if upstream.is_empty() {
                debug!(hop = %hop, "empty upstream set, hop yields nothing");
                return Ok(Vec::new());
            }
            let upstream_route = self.routes.route(&dependency.upstream_type);
            let allowed = allowed_systems(&upstream_route);

            return match hop.resource_type() {
                Some(target) => {
                    let tokens = project_identifiers(
                        &self.resolver,
                        &upstream,
                        &dependency.path,
                        allowed.as_ref(),
                    )
                    .await;
                    debug!(hop = %hop, tokens = tokens.len(), "projected identifier tokens");
                    if tokens.is_empty() {
                        return Ok(Vec::new());
                    }
                    let produced = self
                        .fetch_batches(target, &hop.filter_key_joined(), &tokens)
                        .await;
                    cache.append(target, produced.clone());
                    Ok(produced)
                }
                None => {
                    let discovered = discover_targets(
                        &self.resolver,
                        &upstream,
                        &dependency.path,
                        allowed.as_ref(),
                    )
                    .await;
                    debug!(hop = %hop, types = discovered.len(), "discovered include target types");
                    let mut produced_all = Vec::new();
                    for (target, tokens) in discovered {
                        let produced = self
                            .fetch_batches(&target, &hop.filter_key_joined(), &tokens)
                            .await;
                        cache.append(&target, produced.clone());
                        produced_all.extend(produced);
                    }
                    Ok(produced_all)
                }
            };
        }

        let Some(resource_type) = hop.resource_type() else {
            debug!(hop = %hop, "hop has no resource type and no dependency, yielding nothing");
            return Ok(Vec::new());
        };
        if !hop.is_executable() {
            debug!(hop = %hop, "hop is not executable, yielding nothing");
            return Ok(Vec::new());
        }
        let query = hop
            .literal_value()
            .map(|value| encode_filter(&hop.filter_key_joined(), value));
        let produced = self.fan_out(resource_type, &[query]).await;
        cache.append(resource_type, produced.clone());
        Ok(produced)
    }

    /// Partitions tokens into `max_batch`-sized OR groups and fetches every
    /// batch from every location.
    async fn fetch_batches(
        &self,
        resource_type: &str,
        filter_key: &str,
        tokens: &[String],
    ) -> Vec<Value> {
        let max_batch = self.routes.route(resource_type).max_batch().max(1);
        let queries: Vec<Option<String>> = batch_queries(filter_key, tokens, max_batch)
            .into_iter()
            .map(Some)
            .collect();
        self.fan_out(resource_type, &queries).await
    }

    /// Fetches every query from every location of the type's route, in
    /// parallel, and merges the results.
    async fn fan_out(&self, resource_type: &str, queries: &[Option<String>]) -> Vec<Value> {
        let route = self.routes.route(resource_type);
        let mut fetches = Vec::with_capacity(queries.len() * route.locations().len());
        for query in queries {
            for location in route.locations() {
                match self.clients.client(location.member()) {
                    Some(client) => {
                        fetches.push(fetch_quiet(client, resource_type.to_string(), query.clone()))
                    }
                    None => warn!(
                        member = location.member(),
                        resource_type, "no client registered for route member"
                    ),
                }
            }
        }
        join_all(fetches).await.into_iter().flatten().collect()
    }
}

/// One backend fetch that degrades errors to an empty contribution.
async fn fetch_quiet(
    client: Arc<FhirClient>,
    resource_type: String,
    query: Option<String>,
) -> Vec<Value> {
    match client.search_all(&resource_type, query.as_deref()).await {
        Ok(resources) => resources,
        Err(error) => {
            warn!(
                member = client.member(),
                resource_type = %resource_type,
                error = %error,
                "backend search failed, contributing no results"
            );
            Vec::new()
        }
    }
}

/// Builds one OR-joined query string per token batch.
fn batch_queries(filter_key: &str, tokens: &[String], max_batch: usize) -> Vec<String> {
    tokens
        .chunks(max_batch)
        .map(|batch| {
            let joined = batch
                .iter()
                .map(|token| urlencoding::encode(token))
                .collect::<Vec<_>>()
                .join(",");
            format!("{}={}", filter_key, joined)
        })
        .collect()
}

/// Encodes a literal filter, escaping each OR value but preserving the
/// comma separators verbatim.
fn encode_filter(filter_key: &str, value: &str) -> String {
    let encoded = value
        .split(',')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join(",");
    format!("{}={}", filter_key, encoded)
}
