//! Federated search handlers.
//!
//! A fresh search fans out through the federation engine, snapshots the
//! complete merged result list, and returns the first page. Continuation
//! requests (`_getpages`) are served from the stored snapshot and never
//! touch a backend.

use std::collections::HashSet;

use axum::{
    Json,
    extract::{Form, Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::debug;

use meridian_federation::types::{instance_key, resource_id, resource_type};

use crate::error::{RestError, RestResult};
use crate::extractors::{PreferHeader, SearchRequest, decode_query, parse_search};
use crate::responses::bundle::{BundleBuilder, BundleEntry};
use crate::state::AppState;

/// Handles GET /:resource_type search requests.
pub async fn search_get_handler(
    State(state): State<AppState>,
    Path(resource_type): Path<String>,
    RawQuery(query): RawQuery,
    prefer: PreferHeader,
) -> RestResult<Response> {
    let query = query.unwrap_or_default();
    let request = parse_search(&resource_type, &decode_query(&query));
    run_search(state, resource_type, request, query, prefer).await
}

/// Handles POST /:resource_type/_search requests.
///
/// Parameters may arrive in the query string, the form body, or both; the
/// two sets are combined in that order.
pub async fn search_post_handler(
    State(state): State<AppState>,
    Path(resource_type): Path<String>,
    RawQuery(query): RawQuery,
    prefer: PreferHeader,
    Form(form): Form<Vec<(String, String)>>,
) -> RestResult<Response> {
    let mut pairs = decode_query(query.as_deref().unwrap_or(""));
    pairs.extend(form);
    let canonical = encode_pairs(&pairs);
    let request = parse_search(&resource_type, &pairs);
    run_search(state, resource_type, request, canonical, prefer).await
}

async fn run_search(
    state: AppState,
    resource_type: String,
    request: SearchRequest,
    query: String,
    prefer: PreferHeader,
) -> RestResult<Response> {
    if request.is_continuation() {
        return continue_page(&state, &resource_type, &request).await;
    }

    debug!(
        resource_type = %resource_type,
        groups = request.expression.groups.len(),
        includes = request.expression.includes.len(),
        strict = prefer.is_strict(),
        "running federated search"
    );

    let results = state
        .engine()
        .search(&request.expression, prefer.is_strict())
        .await?;
    let results = dedup(results);
    let total = results.len();
    let page_size = effective_count(&state, request.page.count);

    let mut bundle = BundleBuilder::searchset()
        .total(total)
        .timestamp(chrono::Utc::now().to_rfc3339())
        .self_link(search_url(&state, &resource_type, &query));

    for resource in results.iter().take(page_size) {
        bundle = bundle.add_entry(entry(state.base_url(), &resource_type, resource.clone()));
    }

    if page_size > 0 && total > page_size {
        let cursor = state.pages().store(results).await;
        bundle = bundle.next_link(continuation_url(
            &state,
            &resource_type,
            &cursor,
            page_size,
            page_size,
        ));
    }

    Ok((StatusCode::OK, Json(bundle.build())).into_response())
}

/// Serves one page out of a stored result snapshot.
async fn continue_page(
    state: &AppState,
    resource_type: &str,
    request: &SearchRequest,
) -> RestResult<Response> {
    let cursor = request.page.cursor.as_deref().unwrap_or_default();
    let snapshot = state
        .pages()
        .retrieve(cursor)
        .await
        .ok_or_else(|| RestError::Gone {
            message: format!("Search continuation {} is no longer available", cursor),
        })?;

    let total = snapshot.len();
    let offset = request.page.offset.min(total);
    let page_size = effective_count(state, request.page.count);
    let end = (offset + page_size).min(total);

    let mut bundle = BundleBuilder::searchset()
        .total(total)
        .timestamp(chrono::Utc::now().to_rfc3339())
        .self_link(continuation_url(
            state,
            resource_type,
            cursor,
            offset,
            page_size,
        ));

    for resource in &snapshot[offset..end] {
        bundle = bundle.add_entry(entry(state.base_url(), resource_type, resource.clone()));
    }

    if end < total {
        bundle = bundle.next_link(continuation_url(state, resource_type, cursor, end, page_size));
    }

    Ok((StatusCode::OK, Json(bundle.build())).into_response())
}

/// Drops repeated instances, keeping the first occurrence. Matches precede
/// includes in the engine's output, so a resource that is both stays a
/// match.
fn dedup(results: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|resource| seen.insert(instance_key(resource)))
        .collect()
}

/// Resolves the page size. `_count=0` is honored as a total-only request.
fn effective_count(state: &AppState, requested: Option<usize>) -> usize {
    requested
        .unwrap_or_else(|| state.default_page_size())
        .min(state.max_page_size())
}

fn entry(base_url: &str, subject_type: &str, resource: Value) -> BundleEntry {
    let full_url = match (resource_type(&resource), resource_id(&resource)) {
        (Some(rt), Some(id)) => Some(format!("{}/{}/{}", base_url, rt, id)),
        _ => None,
    };
    let entry = if resource_type(&resource) == Some(subject_type) {
        BundleEntry::search_result(resource)
    } else {
        BundleEntry::included(resource)
    };
    match full_url {
        Some(url) => entry.with_full_url(url),
        None => entry,
    }
}

fn search_url(state: &AppState, resource_type: &str, query: &str) -> String {
    if query.is_empty() {
        format!("{}/{}", state.base_url(), resource_type)
    } else {
        format!("{}/{}?{}", state.base_url(), resource_type, query)
    }
}

fn continuation_url(
    state: &AppState,
    resource_type: &str,
    cursor: &str,
    offset: usize,
    count: usize,
) -> String {
    format!(
        "{}/{}?_getpages={}&_getpagesoffset={}&_count={}",
        state.base_url(),
        resource_type,
        cursor,
        offset,
        count
    )
}

fn encode_pairs(pairs: &[(String, String)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}
