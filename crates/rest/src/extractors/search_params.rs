//! Query-string parsing for federated searches.
//!
//! Decomposes the raw `key=value` pairs of a search request into the
//! federation's [`SearchExpression`] model plus the paging controls the
//! gateway itself consumes. Filter keys are classified here exactly once:
//! chains (`subject:Patient.name`), reverse chains (`_has:...`), direct id
//! references (`subject=Patient/123`) and plain literals each produce their
//! hop shape, and the plan builder downstream never re-inspects raw syntax.
//!
//! Parsing is deliberately infallible. Malformed filter syntax fails closed
//! (the group plans to an empty result), malformed include directives are
//! dropped, and unknown-parameter rejection under strict handling is the
//! plan builder's job.

use meridian_federation::types::{
    AndGroup, HopKind, IncludeDirective, ParsedHop, SearchExpression,
};
use tracing::{debug, warn};

/// Result parameters the gateway recognizes but does not apply.
const IGNORED_PARAMS: &[&str] = &[
    "_total",
    "_sort",
    "_summary",
    "_elements",
    "_format",
    "_pretty",
    "_maxresults",
    "_contained",
    "_containedType",
];

/// Paging controls extracted from a search request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageParams {
    /// Requested page size (`_count`).
    pub count: Option<usize>,
    /// Continuation cursor (`_getpages`).
    pub cursor: Option<String>,
    /// Offset into the continuation snapshot (`_getpagesoffset`).
    pub offset: usize,
}

/// A fully classified search request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// The filters and includes, as the federation consumes them.
    pub expression: SearchExpression,
    /// The paging controls, as the gateway consumes them.
    pub page: PageParams,
}

impl SearchRequest {
    /// Whether this request continues a previously stored result snapshot.
    pub fn is_continuation(&self) -> bool {
        self.page.cursor.is_some()
    }
}

/// Decodes a raw query string into ordered key/value pairs.
pub fn decode_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Classifies the decoded pairs of a search addressed to `resource_type`.
pub fn parse_search(resource_type: &str, pairs: &[(String, String)]) -> SearchRequest {
    let mut expression = SearchExpression::new(resource_type);
    let mut page = PageParams::default();

    for (key, value) in pairs {
        match key.as_str() {
            "_count" => page.count = parse_usize(key, value),
            "_getpages" => page.cursor = Some(value.clone()),
            "_getpagesoffset" => page.offset = parse_usize(key, value).unwrap_or(0),
            "_include" | "_include:iterate" => {
                if let Some(directive) = parse_include(key, value, false) {
                    expression.includes.push(directive);
                }
            }
            "_revinclude" | "_revinclude:iterate" => {
                if let Some(directive) = parse_include(key, value, true) {
                    expression.includes.push(directive);
                }
            }
            _ => {
                let code = key.split(':').next().unwrap_or(key);
                if IGNORED_PARAMS.contains(&code) {
                    debug!(parameter = %key, "ignoring unsupported result parameter");
                    continue;
                }
                if value.is_empty() {
                    warn!(parameter = %key, "ignoring search parameter with empty value");
                    continue;
                }
                let hops = rooted(resource_type, parse_filter_hops(key, value));
                expression
                    .groups
                    .push(AndGroup::new(hops, format!("{}={}", key, value)));
            }
        }
    }

    SearchRequest { expression, page }
}

/// Parses one filter into its hop chain. The first hop's resource type is
/// left empty for the caller (or an enclosing `_has`) to supply.
fn parse_filter_hops(key: &str, value: &str) -> Vec<ParsedHop> {
    if let Some(rest) = key.strip_prefix("_has:") {
        return parse_has_hops(rest, value);
    }
    if key == "_has" {
        warn!(parameter = %key, "reverse chain is missing its type and parameter");
        return Vec::new();
    }

    let mut segments: Vec<&str> = key.split('.').collect();
    let terminal = match segments.pop() {
        Some(t) if !t.is_empty() => t,
        _ => {
            warn!(parameter = %key, "filter key has an empty segment");
            return Vec::new();
        }
    };

    let mut hops = Vec::with_capacity(segments.len() + 1);
    for step in segments {
        let (reference_param, target_type) = match step.split_once(':') {
            Some((param, target)) if !param.is_empty() && !target.is_empty() => {
                (param.to_string(), Some(target.to_string()))
            }
            Some(_) => {
                warn!(parameter = %key, "chain step has an empty name, dropping filter");
                return Vec::new();
            }
            None => (step.to_string(), None),
        };
        hops.push(ParsedHop::new(
            "",
            HopKind::ChainedRef {
                reference_param,
                target_type,
            },
        ));
    }

    hops.push(ParsedHop::new("", parse_terminal(terminal, value)));
    hops
}

/// Parses the `Type:param:rest` remainder of a `_has:` key. The continuation
/// after the reverse step is parsed recursively, so chains and further
/// reverse chains compose.
fn parse_has_hops(rest: &str, value: &str) -> Vec<ParsedHop> {
    let mut segments = rest.splitn(3, ':');
    let (target_type, reference_param, continuation) =
        match (segments.next(), segments.next(), segments.next()) {
            (Some(t), Some(p), Some(c)) if !t.is_empty() && !p.is_empty() && !c.is_empty() => {
                (t, p, c)
            }
            _ => {
                warn!(parameter = %rest, "reverse chain needs a type, parameter and filter");
                return Vec::new();
            }
        };

    let tail = parse_filter_hops(continuation, value);
    if tail.is_empty() {
        return Vec::new();
    }

    let mut hops = vec![ParsedHop::new(
        "",
        HopKind::ReverseRef {
            target_type: target_type.to_string(),
            reference_param: reference_param.to_string(),
        },
    )];
    hops.extend(tail);
    hops
}

/// Classifies a terminal `key=value` filter.
///
/// A bare reference parameter with a `Type/id` value becomes an id
/// reference; everything else, including keys carrying modifiers, passes
/// through as a literal for the backends to interpret.
fn parse_terminal(key: &str, value: &str) -> HopKind {
    if !key.contains(':') {
        if let Some((target_type, id)) = split_type_id(value) {
            return HopKind::IdRef {
                reference_param: key.to_string(),
                target_type: target_type.to_string(),
                id: id.to_string(),
            };
        }
    }
    HopKind::Literal {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Splits a `Type/id` reference value. Returns `None` unless the value has
/// exactly one slash, an uppercase alphanumeric type, and a plausible id.
fn split_type_id(value: &str) -> Option<(&str, &str)> {
    let (head, tail) = value.split_once('/')?;
    if tail.is_empty() || tail.contains('/') {
        return None;
    }
    if !head.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }
    if !head.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    if !tail
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return None;
    }
    Some((head, tail))
}

/// Parses a `Source:param[:Target]` include directive value.
fn parse_include(key: &str, value: &str, reverse: bool) -> Option<IncludeDirective> {
    let mut segments = value.splitn(3, ':');
    let source = segments.next().filter(|s| !s.is_empty());
    let param = segments.next().filter(|s| !s.is_empty());
    let target = segments.next().filter(|s| !s.is_empty());

    let (Some(source), Some(param)) = (source, param) else {
        warn!(directive = %value, "include directive needs a source type and parameter");
        return None;
    };

    let raw = format!("{}={}", key, value);
    let mut directive = if reverse {
        IncludeDirective::revinclude(source, param, raw)
    } else {
        IncludeDirective::include(source, param, raw)
    };
    if let Some(target) = target {
        directive = directive.with_target(target);
    }
    Some(directive.with_iterate(key.ends_with(":iterate")))
}

/// Roots a hop chain at the subject resource type.
fn rooted(subject_type: &str, mut hops: Vec<ParsedHop>) -> Vec<ParsedHop> {
    if let Some(first) = hops.first_mut() {
        if first.resource_type.is_empty() {
            first.resource_type = subject_type.to_string();
        }
    }
    hops
}

fn parse_usize(key: &str, value: &str) -> Option<usize> {
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(parameter = %key, value = %value, "ignoring non-numeric paging control");
            None
        }
    }
}
