//! The parsed search expression model.
//!
//! The query-string parser (in the REST crate) decomposes an incoming search
//! into this structure; the query plan builder consumes it. Each filter
//! parameter becomes one [`AndGroup`], an ordered hop chain rooted at the
//! subject resource type, and each `_include`/`_revinclude` directive
//! becomes an [`IncludeDirective`]. Every hop carries an explicit
//! [`HopKind`], decided exactly once at parse time; downstream components
//! dispatch on the kind and never re-inspect raw query syntax.
//!
//! Multi-valued literal filters (comma-separated OR values) are carried as
//! one verbatim string. They are only ever split by the executor, and then
//! only for *projected* identifier batches exceeding a route's `max_batch`.

/// One hop of a parsed filter chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHop {
    /// The resource type this hop filters.
    pub resource_type: String,
    /// The syntactic shape of the hop.
    pub kind: HopKind,
}

impl ParsedHop {
    /// Creates a hop.
    pub fn new(resource_type: impl Into<String>, kind: HopKind) -> Self {
        Self {
            resource_type: resource_type.into(),
            kind,
        }
    }
}

/// The syntactic shape of a parsed hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HopKind {
    /// A terminal literal filter: `key=value`.
    Literal {
        /// The search parameter key.
        key: String,
        /// The verbatim value, possibly comma-separated OR values.
        value: String,
    },
    /// A direct id reference: `param=Type/id`.
    IdRef {
        /// The reference search parameter on this hop's resource type.
        reference_param: String,
        /// The referenced resource type.
        target_type: String,
        /// The referenced logical id.
        id: String,
    },
    /// A chained filter step: `param:Type.` continuing onto the target type.
    ChainedRef {
        /// The reference search parameter on this hop's resource type.
        reference_param: String,
        /// The resource type the chain continues on. Untyped chains
        /// (`param.field=...`) leave this unset; the plan builder resolves
        /// it from the parameter's registered targets.
        target_type: Option<String>,
    },
    /// A reverse-chained step (`_has:Type:param:`): this hop's resource type
    /// is *referenced by* the target type through `reference_param`.
    ReverseRef {
        /// The resource type holding the reference.
        target_type: String,
        /// The reference search parameter on the target type.
        reference_param: String,
    },
    /// An unfiltered fetch of this hop's resource type.
    Unfiltered,
}

/// One AND-group: an ordered hop chain rooted at the subject resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndGroup {
    /// The hops, declared root-first.
    pub hops: Vec<ParsedHop>,
    /// The raw `key=value` parameter this group was parsed from.
    pub raw: String,
}

impl AndGroup {
    /// Creates a group from its hops and originating raw parameter.
    pub fn new(hops: Vec<ParsedHop>, raw: impl Into<String>) -> Self {
        Self {
            hops,
            raw: raw.into(),
        }
    }
}

/// Direction of an include directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeDirection {
    /// `_include` - fetch resources the matches reference.
    Forward,
    /// `_revinclude` - fetch resources referencing the matches.
    Reverse,
}

/// A parsed `_include` / `_revinclude` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    /// Forward or reverse.
    pub direction: IncludeDirection,
    /// The resource type declaring the reference (`Source:param`).
    pub source_type: String,
    /// The reference search parameter code on the source type.
    pub reference_param: String,
    /// The declared target type, when the directive names one. Forward
    /// directives without one are resolved at execution time from the
    /// actual reference values.
    pub target_type: Option<String>,
    /// Whether the directive requested repeated application (`:iterate`).
    pub iterate: bool,
    /// The raw directive value, for logging.
    pub raw: String,
}

impl IncludeDirective {
    /// Creates a forward include directive.
    pub fn include(
        source_type: impl Into<String>,
        reference_param: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            direction: IncludeDirection::Forward,
            source_type: source_type.into(),
            reference_param: reference_param.into(),
            target_type: None,
            iterate: false,
            raw: raw.into(),
        }
    }

    /// Creates a reverse include directive.
    pub fn revinclude(
        source_type: impl Into<String>,
        reference_param: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            direction: IncludeDirection::Reverse,
            source_type: source_type.into(),
            reference_param: reference_param.into(),
            target_type: None,
            iterate: false,
            raw: raw.into(),
        }
    }

    /// Sets the declared target type.
    pub fn with_target(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self
    }

    /// Marks the directive for repeated application.
    pub fn with_iterate(mut self, iterate: bool) -> Self {
        self.iterate = iterate;
        self
    }
}

/// A fully parsed search expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchExpression {
    /// The subject resource type the search was addressed to.
    pub subject_type: String,
    /// The AND-groups; intersecting them all yields the matches.
    pub groups: Vec<AndGroup>,
    /// Include directives applied to the matches.
    pub includes: Vec<IncludeDirective>,
}

impl SearchExpression {
    /// Creates an expression with no filters and no includes.
    pub fn new(subject_type: impl Into<String>) -> Self {
        Self {
            subject_type: subject_type.into(),
            groups: Vec::new(),
            includes: Vec::new(),
        }
    }

    /// Adds an AND-group.
    pub fn with_group(mut self, group: AndGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Adds an include directive.
    pub fn with_include(mut self, directive: IncludeDirective) -> Self {
        self.includes.push(directive);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_builders() {
        let expr = SearchExpression::new("Encounter")
            .with_group(AndGroup::new(
                vec![
                    ParsedHop::new(
                        "Encounter",
                        HopKind::ChainedRef {
                            reference_param: "subject".to_string(),
                            target_type: Some("Patient".to_string()),
                        },
                    ),
                    ParsedHop::new(
                        "Patient",
                        HopKind::Literal {
                            key: "name".to_string(),
                            value: "Smith".to_string(),
                        },
                    ),
                ],
                "subject:Patient.name=Smith",
            ))
            .with_include(
                IncludeDirective::revinclude("Observation", "subject", "Observation:subject")
                    .with_iterate(true),
            );

        assert_eq!(expr.subject_type, "Encounter");
        assert_eq!(expr.groups.len(), 1);
        assert_eq!(expr.groups[0].hops.len(), 2);
        assert!(expr.includes[0].iterate);
        assert_eq!(expr.includes[0].direction, IncludeDirection::Reverse);
    }
}
