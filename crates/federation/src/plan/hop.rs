//! One hop of a chain: the partial query.

use std::fmt;

/// A dependency on an earlier-computed result set.
///
/// `path` projects identifier values out of the upstream instances; it is
/// relative to the upstream resource root, so a dependency on
/// `Patient` with path `identifier` renders as `{Patient.identifier}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// The upstream resource type whose cache entry feeds this hop.
    pub upstream_type: String,
    /// Projection path over each upstream instance.
    pub path: String,
}

impl Dependency {
    /// Creates a dependency.
    pub fn new(upstream_type: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            upstream_type: upstream_type.into(),
            path: path.into(),
        }
    }
}

/// One hop of a chain: a query against a single resource type, either
/// concrete (a literal filter, or no filter at all) or dependent on an
/// upstream hop's projected identifiers.
///
/// The resource type is unset only for untyped include targets, which are
/// resolved at execution time from the actual reference values.
///
/// A hop is *executable* when its resource type is known and its filter is
/// coherent: filter key and value (literal or dependency) must be both
/// present or both absent. A dangling key without a value is never executed
/// and yields an empty result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialQuery {
    resource_type: Option<String>,
    filter_key: Vec<String>,
    literal_value: Option<String>,
    dependency: Option<Dependency>,
    iterate: bool,
}

impl PartialQuery {
    /// A hop with a literal filter: `Type?key=value`.
    pub fn literal(
        resource_type: impl Into<String>,
        filter_key: Vec<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: Some(resource_type.into()),
            filter_key,
            literal_value: Some(value.into()),
            dependency: None,
            iterate: false,
        }
    }

    /// A hop whose filter values come from an upstream projection.
    pub fn dependent(
        resource_type: Option<String>,
        filter_key: Vec<String>,
        dependency: Dependency,
    ) -> Self {
        Self {
            resource_type,
            filter_key,
            literal_value: None,
            dependency: Some(dependency),
            iterate: false,
        }
    }

    /// An unfiltered fetch of a resource type: bare `Type`.
    pub fn unfiltered(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: Some(resource_type.into()),
            filter_key: Vec::new(),
            literal_value: None,
            dependency: None,
            iterate: false,
        }
    }

    /// Marks the hop for repeated include application.
    pub fn with_iterate(mut self, iterate: bool) -> Self {
        self.iterate = iterate;
        self
    }

    /// The resource type, when resolved.
    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    /// The filter key path segments.
    pub fn filter_key(&self) -> &[String] {
        &self.filter_key
    }

    /// The filter key joined into wire form, e.g. `subject.identifier`.
    pub fn filter_key_joined(&self) -> String {
        self.filter_key.join(".")
    }

    /// The literal filter value, for concrete hops.
    pub fn literal_value(&self) -> Option<&str> {
        self.literal_value.as_deref()
    }

    /// The upstream dependency, for dependent hops.
    pub fn dependency(&self) -> Option<&Dependency> {
        self.dependency.as_ref()
    }

    /// Whether the hop is marked for repeated include application.
    pub fn iterate(&self) -> bool {
        self.iterate
    }

    /// Whether the hop carries no filter at all.
    pub fn is_unfiltered(&self) -> bool {
        self.filter_key.is_empty() && self.literal_value.is_none() && self.dependency.is_none()
    }

    /// Whether the hop can be executed (or resolved then executed).
    pub fn is_executable(&self) -> bool {
        let typed = self
            .resource_type
            .as_deref()
            .is_some_and(|t| !t.is_empty());
        let has_key = !self.filter_key.is_empty();
        let has_value = self.literal_value.is_some() || self.dependency.is_some();
        typed && has_key == has_value
    }
}

impl fmt::Display for PartialQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resource_type = self.resource_type.as_deref().unwrap_or("*");
        if self.is_unfiltered() {
            return f.write_str(resource_type);
        }
        write!(f, "{}?{}=", resource_type, self.filter_key_joined())?;
        if let Some(value) = &self.literal_value {
            f.write_str(value)
        } else if let Some(dep) = &self.dependency {
            write!(f, "{{{}.{}}}", dep.upstream_type, dep.path)
        } else {
            Ok(())
        }
    }
}

/// An ordered list of hops, declared root-first and evaluated tail-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    hops: Vec<PartialQuery>,
}

impl Chain {
    /// Creates a chain from root-first hops.
    pub fn new(hops: Vec<PartialQuery>) -> Self {
        Self { hops }
    }

    /// Creates a single-hop chain.
    pub fn single(hop: PartialQuery) -> Self {
        Self { hops: vec![hop] }
    }

    /// The hops in declared (root-first) order.
    pub fn hops(&self) -> &[PartialQuery] {
        &self.hops
    }

    /// Whether the chain has no hops.
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// The leading hop's resource type; the chain's result is this type's
    /// cache entry. Unset for untyped include chains.
    pub fn lead_type(&self) -> Option<&str> {
        self.hops.first().and_then(PartialQuery::resource_type)
    }

    /// Whether any hop requests repeated include application.
    pub fn iterate(&self) -> bool {
        self.hops.iter().any(PartialQuery::iterate)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, hop) in self.hops.iter().enumerate() {
            if index > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", hop)?;
        }
        Ok(())
    }
}
