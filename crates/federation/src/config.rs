//! Federation topology configuration.
//!
//! The topology is a YAML document describing:
//!
//! - Member backends (id + base URL)
//! - Per-resource-type routes: candidate locations with per-action
//!   eligibility rules, an identifier batch limit, and identifier-system
//!   correlation groups
//! - A default route for resource types without their own entry
//! - An optional bootstrap source for search-parameter definitions
//!
//! # Example
//!
//! ```yaml
//! members:
//!   - id: alpha
//!     url: http://backend-a.example/fhir
//!   - id: beta
//!     url: http://backend-b.example/fhir
//! resources:
//!   default:
//!     locations:
//!       - member: alpha
//!       - member: beta
//!   Patient:
//!     max_batch: 50
//!     identifier_systems:
//!       - all_of: ["http://hospital.example/mrn"]
//!     locations:
//!       - member: alpha
//!         create: "Patient.managingOrganization.exists()"
//!         delete: "false"
//!       - member: beta
//! setup:
//!   url: http://directory.example/fhir
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// One member backend of the federation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberConfig {
    /// Unique member id, referenced from route locations.
    pub id: String,
    /// Base URL of the member's FHIR endpoint.
    pub url: String,
}

/// One candidate location within a route.
///
/// Each action rule is optional. An absent rule means the location is always
/// eligible for that action; `"true"`/`"false"` are literal decisions; any
/// other string is a path-expression rule evaluated against the candidate
/// instance. Delete never has an instance available, so only literal rules
/// are honored there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationConfig {
    /// The member id this location points at.
    pub member: String,
    /// Eligibility rule for read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<String>,
    /// Eligibility rule for create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<String>,
    /// Eligibility rule for update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<String>,
    /// Eligibility rule for delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,
}

impl LocationConfig {
    /// Creates a location pointing at a member, with no rules.
    pub fn new(member: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            ..Default::default()
        }
    }

    /// Sets the read rule.
    pub fn with_read(mut self, rule: impl Into<String>) -> Self {
        self.read = Some(rule.into());
        self
    }

    /// Sets the create rule.
    pub fn with_create(mut self, rule: impl Into<String>) -> Self {
        self.create = Some(rule.into());
        self
    }

    /// Sets the update rule.
    pub fn with_update(mut self, rule: impl Into<String>) -> Self {
        self.update = Some(rule.into());
        self
    }

    /// Sets the delete rule.
    pub fn with_delete(mut self, rule: impl Into<String>) -> Self {
        self.delete = Some(rule.into());
        self
    }
}

/// One AND-group of identifier systems for the correlation allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierGroupConfig {
    /// Every system in the group must be present, with equal values, on both
    /// sides of a correlation for the group to satisfy the predicate.
    pub all_of: Vec<String>,
}

/// Route configuration for one resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Upper bound on OR-ed identifier values per query; engine default 10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_batch: Option<usize>,
    /// OR-of-AND identifier-system groups for the correlation predicate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier_systems: Vec<IdentifierGroupConfig>,
    /// Candidate locations, in preference order.
    #[serde(default)]
    pub locations: Vec<LocationConfig>,
}

impl RouteConfig {
    /// Creates a route over the given locations.
    pub fn new(locations: Vec<LocationConfig>) -> Self {
        Self {
            locations,
            ..Default::default()
        }
    }

    /// Sets the identifier batch limit.
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = Some(max_batch);
        self
    }

    /// Adds one identifier-system AND-group.
    pub fn with_identifier_group<I, S>(mut self, systems: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identifier_systems.push(IdentifierGroupConfig {
            all_of: systems.into_iter().map(Into::into).collect(),
        });
        self
    }
}

/// The `resources` section: a default route plus per-type routes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// The fallback route for resource types without their own entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<RouteConfig>,
    /// Per-resource-type routes, keyed by type name.
    #[serde(flatten)]
    pub types: BTreeMap<String, RouteConfig>,
}

/// Optional bootstrap source for search-parameter definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupConfig {
    /// Base URL of a server whose `SearchParameter` resources are paged in
    /// at startup.
    pub url: String,
}

/// Complete federation topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationConfig {
    /// The member backends.
    pub members: Vec<MemberConfig>,
    /// Route configuration per resource type.
    #[serde(default)]
    pub resources: ResourcesConfig,
    /// Optional search-parameter bootstrap source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<SetupConfig>,
}

impl FederationConfig {
    /// Parses a topology from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Loads a topology from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Returns the member entry with the given id.
    pub fn member(&self, id: &str) -> Option<&MemberConfig> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Returns the route configured for a resource type, without the
    /// default fallback.
    pub fn route(&self, resource_type: &str) -> Option<&RouteConfig> {
        self.resources.types.get(resource_type)
    }

    /// Validates the topology and returns non-fatal warnings.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        let mut warnings = Vec::new();

        if self.members.is_empty() {
            return Err(ConfigError::NoMembers);
        }

        let mut seen_ids = HashSet::new();
        for member in &self.members {
            if !seen_ids.insert(member.id.as_str()) {
                return Err(ConfigError::DuplicateMemberId(member.id.clone()));
            }
            url::Url::parse(&member.url).map_err(|_| ConfigError::InvalidMemberUrl {
                member: member.id.clone(),
                url: member.url.clone(),
            })?;
        }

        if self.resources.default.is_none() {
            return Err(ConfigError::MissingDefaultRoute);
        }

        let mut referenced = HashSet::new();
        let default_route = self.resources.default.iter().map(|r| ("default", r));
        let typed_routes = self
            .resources
            .types
            .iter()
            .map(|(name, r)| (name.as_str(), r));
        for (name, route) in default_route.chain(typed_routes) {
            if route.locations.is_empty() {
                return Err(ConfigError::EmptyRoute(name.to_string()));
            }
            for location in &route.locations {
                if self.member(&location.member).is_none() {
                    return Err(ConfigError::UnknownMember {
                        route: name.to_string(),
                        member: location.member.clone(),
                    });
                }
                referenced.insert(location.member.clone());
                if let Some(rule) = &location.delete {
                    if rule != "true" && rule != "false" {
                        warnings.push(ConfigWarning::NonLiteralDeleteRule {
                            route: name.to_string(),
                            member: location.member.clone(),
                        });
                    }
                }
            }
            for group in &route.identifier_systems {
                if group.all_of.is_empty() {
                    warnings.push(ConfigWarning::EmptyIdentifierGroup(name.to_string()));
                }
            }
        }

        for member in &self.members {
            if !referenced.contains(&member.id) {
                warnings.push(ConfigWarning::UnreferencedMember(member.id.clone()));
            }
        }

        Ok(warnings)
    }
}

/// Topology configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The members list is empty.
    #[error("no federation members configured - at least one member is required")]
    NoMembers,

    /// Two members share an id.
    #[error("duplicate member id: {0}")]
    DuplicateMemberId(String),

    /// A member's base URL does not parse.
    #[error("member '{member}' has an invalid base url '{url}'")]
    InvalidMemberUrl {
        /// The member id.
        member: String,
        /// The offending URL.
        url: String,
    },

    /// No default route is configured.
    #[error("no default route configured - resources.default is required")]
    MissingDefaultRoute,

    /// A route declares no locations.
    #[error("route '{0}' has no locations")]
    EmptyRoute(String),

    /// A route location references an unknown member.
    #[error("route '{route}' references unknown member '{member}'")]
    UnknownMember {
        /// The route name (resource type or "default").
        route: String,
        /// The unknown member id.
        member: String,
    },

    /// The YAML document failed to parse.
    #[error("topology parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The topology file could not be read.
    #[error("topology file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-fatal topology issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A delete rule is not a literal boolean and will always evaluate false.
    NonLiteralDeleteRule {
        /// The route name.
        route: String,
        /// The member id.
        member: String,
    },
    /// An identifier-system group is empty and can never match.
    EmptyIdentifierGroup(String),
    /// A member is configured but referenced by no route.
    UnreferencedMember(String),
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::NonLiteralDeleteRule { route, member } => write!(
                f,
                "route '{}' member '{}': delete rules accept only literal true/false; \
                 this rule will always evaluate to false",
                route, member
            ),
            ConfigWarning::EmptyIdentifierGroup(route) => {
                write!(f, "route '{}' declares an empty identifier-system group", route)
            }
            ConfigWarning::UnreferencedMember(id) => {
                write!(f, "member '{}' is not referenced by any route", id)
            }
        }
    }
}
