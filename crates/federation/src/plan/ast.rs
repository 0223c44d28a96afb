//! The execution plan tree.
//!
//! A plan composes chains: `And` intersects its children through the
//! identity predicate, `Include` extends an anchor's results with dependent
//! fetches (optionally iterated to a fixpoint), `Parameter` runs one chain,
//! and `Noop` stands in for a fixed result list. Nodes are executed once
//! and discarded with the request.

use std::collections::HashSet;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::debug;

use crate::error::FederationResult;
use crate::exec::{ChainExecutor, TypeCache};
use crate::types::instance_key;

use super::hop::Chain;

/// One node of the execution plan.
#[derive(Debug, Clone)]
pub enum PlanNode {
    /// Intersects child results left-to-right, short-circuiting on the
    /// first empty child.
    And(Vec<PlanNode>),
    /// Executes the anchor, then each dependent seeded with the anchor's
    /// results; iterated dependents repeat until a round adds nothing new.
    Include {
        /// The anchor node whose matches seed the dependents.
        anchor: Box<PlanNode>,
        /// Dependent nodes, executed in order.
        dependents: Vec<PlanNode>,
    },
    /// Runs one hop chain.
    Parameter(Chain),
    /// Yields a fixed result list without touching any backend.
    Noop(Vec<Value>),
}

impl PlanNode {
    /// Executes the node with an empty cache.
    pub fn execute<'a>(
        &'a self,
        executor: &'a ChainExecutor,
    ) -> BoxFuture<'a, FederationResult<Vec<Value>>> {
        async move {
            match self {
                PlanNode::Noop(fixed) => Ok(fixed.clone()),
                PlanNode::Parameter(chain) => {
                    let mut cache = TypeCache::new();
                    executor.run(chain, &mut cache).await
                }
                PlanNode::And(children) => execute_and(children, executor).await,
                PlanNode::Include { anchor, dependents } => {
                    execute_include(anchor, dependents, executor).await
                }
            }
        }
        .boxed()
    }

    /// Executes the node with the cache seeded from `seed`, grouped by
    /// resource type. Only `Parameter` nodes consume the seed.
    pub fn execute_with_reference<'a>(
        &'a self,
        executor: &'a ChainExecutor,
        seed: &'a [Value],
    ) -> BoxFuture<'a, FederationResult<Vec<Value>>> {
        async move {
            match self {
                PlanNode::Parameter(chain) => {
                    let mut cache = TypeCache::seeded(seed);
                    executor.run(chain, &mut cache).await
                }
                other => other.execute(executor).await,
            }
        }
        .boxed()
    }

    /// Whether this node requests repeated include application.
    pub fn iterate(&self) -> bool {
        match self {
            PlanNode::Parameter(chain) => chain.iterate(),
            _ => false,
        }
    }
}

async fn execute_and(
    children: &[PlanNode],
    executor: &ChainExecutor,
) -> FederationResult<Vec<Value>> {
    let Some((first, rest)) = children.split_first() else {
        return Ok(Vec::new());
    };
    let mut matches = first.execute(executor).await?;
    for child in rest {
        if matches.is_empty() {
            break;
        }
        let next = child.execute(executor).await?;
        if next.is_empty() {
            debug!("AND branch returned no results, short-circuiting to empty");
            return Ok(Vec::new());
        }
        matches.retain(|candidate| {
            next.iter()
                .any(|other| executor.predicate().matches(candidate, other))
        });
    }
    Ok(matches)
}

async fn execute_include(
    anchor: &PlanNode,
    dependents: &[PlanNode],
    executor: &ChainExecutor,
) -> FederationResult<Vec<Value>> {
    let anchor_results = anchor.execute(executor).await?;
    if anchor_results.is_empty() {
        debug!("include anchor returned no results, skipping dependents");
        return Ok(Vec::new());
    }

    let mut combined = anchor_results.clone();
    for dependent in dependents {
        let iterate = dependent.iterate();
        // Instances already used as a seed never seed again; this bounds
        // iterate rounds by the longest reference path even on cycles.
        let mut visited: HashSet<String> =
            anchor_results.iter().map(instance_key).collect();
        let mut seed = anchor_results.clone();
        loop {
            let produced = dependent.execute_with_reference(executor, &seed).await?;
            if produced.is_empty() {
                break;
            }
            combined.extend(produced.iter().cloned());
            if !iterate {
                break;
            }
            seed = produced
                .into_iter()
                .filter(|resource| visited.insert(instance_key(resource)))
                .collect();
            if seed.is_empty() {
                break;
            }
        }
    }
    Ok(combined)
}
