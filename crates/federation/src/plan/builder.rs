//! Builds hop chains and the plan tree from a parsed search expression.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{FederationError, FederationResult};
use crate::registry::SearchPathRegistry;
use crate::types::{
    AndGroup, HopKind, IncludeDirection, IncludeDirective, ParsedHop, SearchExpression,
};

use super::ast::PlanNode;
use super::hop::{Chain, Dependency, PartialQuery};

/// Converts a [`SearchExpression`] into an executable [`PlanNode`] tree.
///
/// Each AND-group becomes one chain; each include directive becomes one
/// dependent chain hanging off the anchor. Filter keys are screened against
/// the search-parameter registry: unknown keys are a hard error under strict
/// handling and degrade the affected hop to an unfiltered fetch under
/// lenient handling. Hops with shapes the builder cannot express are
/// dropped, leaving a gap the executor resolves to an empty result.
#[derive(Debug, Clone)]
pub struct QueryPlanBuilder {
    search_paths: Arc<SearchPathRegistry>,
    strict: bool,
}

impl QueryPlanBuilder {
    /// Creates a builder in lenient handling mode.
    pub fn new(search_paths: Arc<SearchPathRegistry>) -> Self {
        Self {
            search_paths,
            strict: false,
        }
    }

    /// Sets strict parameter handling.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Builds the plan tree for an expression.
    pub fn build(&self, expression: &SearchExpression) -> FederationResult<PlanNode> {
        let mut children = Vec::with_capacity(expression.groups.len().max(1));
        for group in &expression.groups {
            match self.build_group_chain(group)? {
                Some(chain) => {
                    debug!(group = %group.raw, chain = %chain, "planned AND-group chain");
                    children.push(PlanNode::Parameter(chain));
                }
                None => {
                    warn!(group = %group.raw, "group produced no hops, planning empty result");
                    children.push(PlanNode::Noop(Vec::new()));
                }
            }
        }
        if children.is_empty() {
            // No filters at all: the anchor is still fetched in full.
            children.push(PlanNode::Parameter(Chain::single(PartialQuery::unfiltered(
                &expression.subject_type,
            ))));
        }

        let mut root = PlanNode::And(children);

        let mut dependents = Vec::new();
        for directive in &expression.includes {
            if let Some(chain) = self.build_include_chain(&expression.subject_type, directive)? {
                debug!(directive = %directive.raw, chain = %chain, "planned include chain");
                dependents.push(PlanNode::Parameter(chain));
            }
        }
        if !dependents.is_empty() {
            root = PlanNode::Include {
                anchor: Box::new(root),
                dependents,
            };
        }
        Ok(root)
    }

    /// Builds the chain for one AND-group, root-first.
    ///
    /// Returns `Ok(None)` when every hop was dropped.
    fn build_group_chain(&self, group: &AndGroup) -> FederationResult<Option<Chain>> {
        let mut hops: Vec<PartialQuery> = Vec::with_capacity(group.hops.len() + 1);
        // Untyped chains leave later hops without a resource type; the
        // resolved chain target carries forward to fill them.
        let mut carried_type: Option<String> = None;

        for parsed in &group.hops {
            let hop_type = match effective_type(parsed, carried_type.take()) {
                Some(t) => t,
                None => {
                    warn!(group = %group.raw, "hop has no resolvable resource type, dropping");
                    continue;
                }
            };
            match &parsed.kind {
                HopKind::Literal { key, value } => {
                    match self.screen(&hop_type, key)? {
                        Screen::Known => {
                            hops.push(PartialQuery::literal(&hop_type, vec![key.clone()], value))
                        }
                        Screen::Degraded => hops.push(PartialQuery::unfiltered(&hop_type)),
                    }
                }
                HopKind::IdRef {
                    reference_param,
                    target_type,
                    id,
                } => match self.screen(&hop_type, reference_param)? {
                    Screen::Known => {
                        hops.push(PartialQuery::dependent(
                            Some(hop_type),
                            vec![reference_param.clone(), "identifier".to_string()],
                            Dependency::new(target_type, "identifier"),
                        ));
                        hops.push(PartialQuery::literal(
                            target_type,
                            vec!["_id".to_string()],
                            id,
                        ));
                    }
                    Screen::Degraded => hops.push(PartialQuery::unfiltered(&hop_type)),
                },
                HopKind::ChainedRef {
                    reference_param,
                    target_type,
                } => match self.screen(&hop_type, reference_param)? {
                    Screen::Known => {
                        let target = target_type.clone().or_else(|| {
                            self.search_paths
                                .targets(&hop_type, reference_param)
                                .first()
                                .cloned()
                        });
                        let Some(target) = target else {
                            warn!(
                                group = %group.raw,
                                parameter = %reference_param,
                                "chain target type is unknown, dropping hop"
                            );
                            continue;
                        };
                        hops.push(PartialQuery::dependent(
                            Some(hop_type),
                            vec![reference_param.clone(), "identifier".to_string()],
                            Dependency::new(&target, "identifier"),
                        ));
                        carried_type = Some(target);
                    }
                    Screen::Degraded => hops.push(PartialQuery::unfiltered(&hop_type)),
                },
                HopKind::ReverseRef {
                    target_type,
                    reference_param,
                } => match self.screen(target_type, reference_param)? {
                    Screen::Known => {
                        let element = self
                            .search_paths
                            .element_path(target_type, reference_param);
                        hops.push(PartialQuery::dependent(
                            Some(hop_type),
                            vec!["identifier".to_string()],
                            Dependency::new(target_type, format!("{}.identifier", element)),
                        ));
                        carried_type = Some(target_type.clone());
                    }
                    Screen::Degraded => hops.push(PartialQuery::unfiltered(&hop_type)),
                },
                HopKind::Unfiltered => hops.push(PartialQuery::unfiltered(&hop_type)),
            }
        }

        if hops.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Chain::new(hops)))
        }
    }

    /// Builds the dependent chain for one include directive.
    fn build_include_chain(
        &self,
        anchor_type: &str,
        directive: &IncludeDirective,
    ) -> FederationResult<Option<Chain>> {
        let screen = self.screen(&directive.source_type, &directive.reference_param)?;
        if screen == Screen::Degraded {
            warn!(directive = %directive.raw, "include parameter is unknown, skipping directive");
            return Ok(None);
        }
        let hop = match directive.direction {
            IncludeDirection::Forward => {
                let element = self
                    .search_paths
                    .element_path(&directive.source_type, &directive.reference_param);
                PartialQuery::dependent(
                    directive.target_type.clone(),
                    vec!["identifier".to_string()],
                    Dependency::new(
                        &directive.source_type,
                        format!("{}.identifier", element),
                    ),
                )
            }
            IncludeDirection::Reverse => {
                let upstream = directive
                    .target_type
                    .clone()
                    .unwrap_or_else(|| anchor_type.to_string());
                PartialQuery::dependent(
                    Some(directive.source_type.clone()),
                    vec![
                        directive.reference_param.clone(),
                        "identifier".to_string(),
                    ],
                    Dependency::new(upstream, "identifier"),
                )
            }
        };
        Ok(Some(Chain::single(hop.with_iterate(directive.iterate))))
    }

    /// Screens one filter key against the registry.
    fn screen(&self, resource_type: &str, key: &str) -> FederationResult<Screen> {
        let code = key.split(':').next().unwrap_or(key);
        if self.search_paths.is_known(resource_type, code) {
            return Ok(Screen::Known);
        }
        if self.strict {
            return Err(FederationError::InvalidParameter {
                resource_type: resource_type.to_string(),
                name: key.to_string(),
            });
        }
        warn!(
            resource_type = %resource_type,
            parameter = %key,
            "unknown search parameter, degrading hop to unfiltered fetch"
        );
        Ok(Screen::Degraded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Known,
    Degraded,
}

fn effective_type(parsed: &ParsedHop, carried: Option<String>) -> Option<String> {
    if parsed.resource_type.is_empty() {
        carried
    } else {
        Some(parsed.resource_type.clone())
    }
}
