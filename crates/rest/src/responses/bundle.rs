//! Searchset Bundle building.
//!
//! The gateway only ever returns `searchset` Bundles: federated search
//! results with paging links. Transaction and batch bundles are not part
//! of its surface.

use serde_json::Value;

/// Search mode for bundle entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Primary search result.
    Match,
    /// Included via _include or _revinclude.
    Include,
}

impl SearchMode {
    /// Returns the FHIR code string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Match => "match",
            SearchMode::Include => "include",
        }
    }
}

/// A link in a Bundle.
#[derive(Debug, Clone)]
pub struct BundleLink {
    /// The relation type (self, next, previous).
    pub relation: String,
    /// The URL.
    pub url: String,
}

impl BundleLink {
    /// Creates a new link.
    pub fn new(relation: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            url: url.into(),
        }
    }

    /// Creates a self link.
    pub fn self_link(url: impl Into<String>) -> Self {
        Self::new("self", url)
    }

    /// Creates a next link.
    pub fn next(url: impl Into<String>) -> Self {
        Self::new("next", url)
    }

    /// Converts to FHIR JSON.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "relation": self.relation,
            "url": self.url
        })
    }
}

/// An entry in a searchset Bundle.
#[derive(Debug, Clone)]
pub struct BundleEntry {
    /// Full URL of the resource, when its id is known.
    pub full_url: Option<String>,
    /// The resource itself.
    pub resource: Value,
    /// Whether the entry is a match or an inclusion.
    pub search_mode: SearchMode,
}

impl BundleEntry {
    /// Creates a primary search result entry.
    pub fn search_result(resource: Value) -> Self {
        Self {
            full_url: None,
            resource,
            search_mode: SearchMode::Match,
        }
    }

    /// Creates an included resource entry.
    pub fn included(resource: Value) -> Self {
        Self {
            full_url: None,
            resource,
            search_mode: SearchMode::Include,
        }
    }

    /// Sets the entry's full URL.
    pub fn with_full_url(mut self, url: impl Into<String>) -> Self {
        self.full_url = Some(url.into());
        self
    }

    /// Converts to FHIR JSON.
    pub fn to_json(&self) -> Value {
        let mut entry = serde_json::json!({
            "resource": self.resource,
            "search": {
                "mode": self.search_mode.as_str()
            }
        });

        if let Some(url) = &self.full_url {
            entry["fullUrl"] = serde_json::json!(url);
        }

        entry
    }
}

/// Builder for searchset Bundle resources.
#[derive(Debug, Default)]
pub struct BundleBuilder {
    total: Option<usize>,
    links: Vec<BundleLink>,
    entries: Vec<BundleEntry>,
    timestamp: Option<String>,
}

impl BundleBuilder {
    /// Creates a searchset bundle builder.
    pub fn searchset() -> Self {
        Self::default()
    }

    /// Sets the total count of matches across the federation.
    pub fn total(mut self, count: usize) -> Self {
        self.total = Some(count);
        self
    }

    /// Adds a link.
    pub fn add_link(mut self, link: BundleLink) -> Self {
        self.links.push(link);
        self
    }

    /// Adds a self link.
    pub fn self_link(self, url: impl Into<String>) -> Self {
        self.add_link(BundleLink::self_link(url))
    }

    /// Adds a next link.
    pub fn next_link(self, url: impl Into<String>) -> Self {
        self.add_link(BundleLink::next(url))
    }

    /// Adds an entry.
    pub fn add_entry(mut self, entry: BundleEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Sets the timestamp.
    pub fn timestamp(mut self, ts: impl Into<String>) -> Self {
        self.timestamp = Some(ts.into());
        self
    }

    /// Builds the Bundle resource.
    pub fn build(self) -> Value {
        let mut bundle = serde_json::json!({
            "resourceType": "Bundle",
            "type": "searchset"
        });

        if let Some(total) = self.total {
            bundle["total"] = serde_json::json!(total);
        }

        if !self.links.is_empty() {
            bundle["link"] =
                serde_json::json!(self.links.iter().map(|l| l.to_json()).collect::<Vec<_>>());
        }

        if !self.entries.is_empty() {
            bundle["entry"] =
                serde_json::json!(self.entries.iter().map(|e| e.to_json()).collect::<Vec<_>>());
        }

        if let Some(ts) = self.timestamp {
            bundle["timestamp"] = serde_json::json!(ts);
        }

        bundle
    }
}
