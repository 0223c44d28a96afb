//! In-process FHIR backend doubles.
//!
//! [`MockBackend`] serves just enough of the FHIR REST surface for the
//! gateway to federate against: type-level search with AND/OR parameter
//! matching, instance read, create with server-assigned ids, update, and
//! delete. Every request is recorded in decoded `METHOD /path?query` form
//! so tests can assert on the exact traffic a scenario generates.

use std::sync::{Arc, RwLock};

use axum::extract::{Path, RawQuery, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// One member backend, listening on an ephemeral local port.
pub struct MockBackend {
    base_url: String,
    store: Arc<RwLock<Vec<Value>>>,
    requests: Arc<RwLock<Vec<String>>>,
}

#[derive(Clone)]
struct BackendState {
    base_url: String,
    store: Arc<RwLock<Vec<Value>>>,
    requests: Arc<RwLock<Vec<String>>>,
    fail_writes: bool,
    page_size: Option<usize>,
}

impl MockBackend {
    /// Spawns a healthy backend.
    pub async fn spawn() -> Self {
        Self::start(false, None).await
    }

    /// Spawns a backend whose writes all fail with 500.
    pub async fn spawn_failing() -> Self {
        Self::start(true, None).await
    }

    /// Spawns a backend that pages its search responses, `page_size`
    /// entries at a time, with `next` links between pages.
    pub async fn spawn_paged(page_size: usize) -> Self {
        Self::start(false, Some(page_size)).await
    }

    async fn start(fail_writes: bool, page_size: Option<usize>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind backend listener");
        let addr = listener.local_addr().expect("Failed to read local address");
        let base_url = format!("http://{}/fhir", addr);

        let store = Arc::new(RwLock::new(Vec::new()));
        let requests = Arc::new(RwLock::new(Vec::new()));
        let state = BackendState {
            base_url: base_url.clone(),
            store: Arc::clone(&store),
            requests: Arc::clone(&requests),
            fail_writes,
            page_size,
        };

        let routes = Router::new()
            .route("/{resource_type}", get(search).post(create))
            .route("/{resource_type}/{id}", get(read).put(upsert).delete(remove))
            .with_state(state);
        let app = Router::new().nest("/fhir", routes);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Backend server failed");
        });

        Self {
            base_url,
            store,
            requests,
        }
    }

    /// The backend's base URL, as it appears in a topology file.
    pub fn url(&self) -> String {
        self.base_url.clone()
    }

    /// Adds a resource to the backend's store.
    pub fn seed(&self, resource: Value) {
        self.store.write().unwrap().push(resource);
    }

    /// Every request served so far, in decoded `METHOD /path?query` form.
    pub fn requests(&self) -> Vec<String> {
        self.requests.read().unwrap().clone()
    }

    /// Number of requests served so far.
    pub fn request_count(&self) -> usize {
        self.requests.read().unwrap().len()
    }

    /// Looks up a stored instance by type and id.
    pub fn stored(&self, resource_type: &str, id: &str) -> Option<Value> {
        self.store
            .read()
            .unwrap()
            .iter()
            .find(|resource| is_instance(resource, resource_type, id))
            .cloned()
    }
}

/// A base URL with nothing listening behind it.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind probe listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    drop(listener);
    format!("http://{}/fhir", addr)
}

// =============================================================================
// Handlers
// =============================================================================

async fn search(
    State(state): State<BackendState>,
    Path(resource_type): Path<String>,
    RawQuery(query): RawQuery,
) -> Json<Value> {
    let query = query.unwrap_or_default();
    record(&state, "GET", &format!("/{}", resource_type), Some(&query));

    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    let matched: Vec<Value> = state
        .store
        .read()
        .unwrap()
        .iter()
        .filter(|resource| matches(resource, &resource_type, &pairs))
        .cloned()
        .collect();

    Json(page_of(&state, &resource_type, &query, matched))
}

async fn create(
    State(state): State<BackendState>,
    Path(resource_type): Path<String>,
    Json(mut resource): Json<Value>,
) -> Response {
    record(&state, "POST", &format!("/{}", resource_type), None);
    if state.fail_writes {
        return write_failure();
    }

    let id = match resource.get("id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => format!("srv-{}", state.store.read().unwrap().len() + 1),
    };
    if let Some(object) = resource.as_object_mut() {
        object.insert("id".to_string(), json!(id));
    }
    state.store.write().unwrap().push(resource.clone());

    let location = format!("{}/{}/{}", state.base_url, resource_type, id);
    (
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(resource),
    )
        .into_response()
}

async fn read(
    State(state): State<BackendState>,
    Path((resource_type, id)): Path<(String, String)>,
) -> Response {
    record(&state, "GET", &format!("/{}/{}", resource_type, id), None);
    let found = state
        .store
        .read()
        .unwrap()
        .iter()
        .find(|resource| is_instance(resource, &resource_type, &id))
        .cloned();
    match found {
        Some(resource) => (StatusCode::OK, Json(resource)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn upsert(
    State(state): State<BackendState>,
    Path((resource_type, id)): Path<(String, String)>,
    Json(mut resource): Json<Value>,
) -> Response {
    record(&state, "PUT", &format!("/{}/{}", resource_type, id), None);
    if state.fail_writes {
        return write_failure();
    }

    if let Some(object) = resource.as_object_mut() {
        object.insert("id".to_string(), json!(id));
    }
    {
        let mut store = state.store.write().unwrap();
        match store
            .iter_mut()
            .find(|slot| is_instance(slot, &resource_type, &id))
        {
            Some(slot) => *slot = resource.clone(),
            None => store.push(resource.clone()),
        }
    }
    (StatusCode::OK, Json(resource)).into_response()
}

async fn remove(
    State(state): State<BackendState>,
    Path((resource_type, id)): Path<(String, String)>,
) -> Response {
    record(&state, "DELETE", &format!("/{}/{}", resource_type, id), None);
    if state.fail_writes {
        return write_failure();
    }

    let mut store = state.store.write().unwrap();
    let before = store.len();
    store.retain(|resource| !is_instance(resource, &resource_type, &id));
    if store.len() < before {
        StatusCode::NO_CONTENT.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

fn write_failure() -> Response {
    let outcome = json!({
        "resourceType": "OperationOutcome",
        "issue": [{
            "severity": "error",
            "code": "exception",
            "diagnostics": "simulated backend failure"
        }]
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(outcome)).into_response()
}

fn record(state: &BackendState, method: &str, path: &str, query: Option<&str>) {
    let line = match query {
        Some(query) if !query.is_empty() => {
            let decoded: Vec<String> = url::form_urlencoded::parse(query.as_bytes())
                .map(|(key, value)| format!("{}={}", key, value))
                .collect();
            format!("{} {}?{}", method, path, decoded.join("&"))
        }
        _ => format!("{} {}", method, path),
    };
    state.requests.write().unwrap().push(line);
}

// =============================================================================
// Search response paging
// =============================================================================

/// Cuts the matched set into one response bundle. With a configured page
/// size the bundle covers one slice and links to the next via `_mockpage`.
fn page_of(state: &BackendState, resource_type: &str, query: &str, matched: Vec<Value>) -> Value {
    let total = matched.len();
    let Some(size) = state.page_size else {
        return bundle(total, &matched, None);
    };

    let page: usize = url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "_mockpage")
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(0);
    let offset = (page * size).min(total);
    let end = (offset + size).min(total);

    let next = (end < total).then(|| {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key != "_mockpage" {
                serializer.append_pair(&key, &value);
            }
        }
        serializer.append_pair("_mockpage", &(page + 1).to_string());
        format!(
            "{}/{}?{}",
            state.base_url,
            resource_type,
            serializer.finish()
        )
    });
    bundle(total, &matched[offset..end], next)
}

fn bundle(total: usize, resources: &[Value], next: Option<String>) -> Value {
    let entries: Vec<Value> = resources
        .iter()
        .map(|resource| json!({"resource": resource}))
        .collect();
    let mut bundle = json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "total": total,
        "entry": entries,
    });
    if let Some(url) = next {
        bundle["link"] = json!([{"relation": "next", "url": url}]);
    }
    bundle
}

// =============================================================================
// Parameter matching
// =============================================================================

fn is_instance(resource: &Value, resource_type: &str, id: &str) -> bool {
    resource["resourceType"] == resource_type && resource["id"] == id
}

/// Applies the query's filter parameters to one stored resource.
///
/// Every non-underscore parameter must match, `_id` being the one
/// underscore parameter with filter semantics here. Dotted keys walk the
/// resource with arrays flattened at each step; comma-separated values are
/// alternatives; `system|value` tokens match identifier-shaped elements.
fn matches(resource: &Value, resource_type: &str, pairs: &[(String, String)]) -> bool {
    if resource["resourceType"] != resource_type {
        return false;
    }
    pairs.iter().all(|(key, value)| match key.as_str() {
        "_id" => {
            let id = resource["id"].as_str().unwrap_or_default();
            value.split(',').any(|wanted| wanted == id)
        }
        _ if key.starts_with('_') => true,
        _ => param_matches(resource, key, value),
    })
}

fn param_matches(resource: &Value, key: &str, value: &str) -> bool {
    let mut nodes = vec![resource];
    for segment in key.split('.') {
        let mut next = Vec::new();
        for node in flatten(&nodes) {
            if let Some(child) = node.get(segment) {
                next.push(child);
            }
        }
        nodes = next;
    }
    let leaves = flatten(&nodes);
    value
        .split(',')
        .any(|wanted| leaves.iter().any(|leaf| node_matches(leaf, wanted)))
}

fn flatten<'a>(nodes: &[&'a Value]) -> Vec<&'a Value> {
    let mut out = Vec::new();
    for &node in nodes {
        match node {
            Value::Array(items) => out.extend(items.iter()),
            other => out.push(other),
        }
    }
    out
}

fn node_matches(node: &Value, wanted: &str) -> bool {
    match node {
        Value::String(text) => text == wanted,
        Value::Number(number) => number.to_string() == wanted,
        Value::Bool(boolean) => boolean.to_string() == wanted,
        Value::Object(_) if node.get("value").is_some() || node.get("system").is_some() => {
            token_matches(node, wanted)
        }
        Value::Object(object) => object
            .values()
            .flat_map(|member| match member {
                Value::Array(items) => items.iter().collect::<Vec<_>>(),
                other => vec![other],
            })
            .any(|member| member.as_str() == Some(wanted)),
        _ => false,
    }
}

/// Token matching against an identifier-shaped object.
fn token_matches(identifier: &Value, wanted: &str) -> bool {
    let system = identifier["system"].as_str().unwrap_or_default();
    let value = identifier["value"].as_str().unwrap_or_default();
    match wanted.split_once('|') {
        Some((wanted_system, wanted_value)) => {
            system == wanted_system && (wanted_value.is_empty() || value == wanted_value)
        }
        None => value == wanted,
    }
}
