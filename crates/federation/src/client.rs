//! HTTP access to a single member backend.
//!
//! Searches return the flattened resource list across *all* pages: each
//! page's `next` link is followed until the backend stops producing one.
//! There is no page cap; a backend that keeps emitting next links holds its
//! fetch open until the HTTP client's own timeout intervenes.
//!
//! Writes never raise on a backend error status. The status, body and
//! `Location` header are captured in a [`WriteOutcome`] so the caller can
//! re-raise the backend's own result.

use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{FederationError, FederationResult};
use crate::types::{bundle_resources, next_link};

/// Captured result of a routed write.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// The HTTP status the backend returned.
    pub status: u16,
    /// Response body, when one was returned and parsed.
    pub body: Option<Value>,
    /// The `Location` header, when the backend set one.
    pub location: Option<String>,
}

impl WriteOutcome {
    /// Whether the backend reported success.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Client handle for one member backend.
#[derive(Debug, Clone)]
pub struct FhirClient {
    member: String,
    base_url: Url,
    http: reqwest::Client,
}

impl FhirClient {
    /// Creates a client for a member endpoint over a shared HTTP pool.
    pub fn new(member: impl Into<String>, base_url: Url, http: reqwest::Client) -> Self {
        Self {
            member: member.into(),
            base_url,
            http,
        }
    }

    /// The member id this client talks to.
    pub fn member(&self) -> &str {
        &self.member
    }

    /// The member's base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resource_url(&self, resource_type: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            resource_type
        )
    }

    fn instance_url(&self, resource_type: &str, id: &str) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(resource_type).push(id);
        }
        url.to_string()
    }

    /// Runs a type-level search and flattens every page into one list.
    ///
    /// `query` is a pre-encoded query string without the leading `?`.
    pub async fn search_all(
        &self,
        resource_type: &str,
        query: Option<&str>,
    ) -> FederationResult<Vec<Value>> {
        let mut url = match query {
            Some(q) if !q.is_empty() => format!("{}?{}", self.resource_url(resource_type), q),
            _ => self.resource_url(resource_type),
        };
        let mut resources = Vec::new();
        let mut pages = 0usize;
        loop {
            debug!(member = %self.member, url = %url, "fetching search page");
            let bundle: Value = self
                .http
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            resources.extend(bundle_resources(&bundle));
            pages += 1;
            match next_link(&bundle) {
                Some(next) => url = next.to_string(),
                None => break,
            }
        }
        debug!(
            member = %self.member,
            resource_type = %resource_type,
            pages,
            matches = resources.len(),
            "search fetch complete"
        );
        Ok(resources)
    }

    /// Reads one instance by id. `Ok(None)` on 404/410.
    pub async fn read(&self, resource_type: &str, id: &str) -> FederationResult<Option<Value>> {
        let response = self.http.get(self.instance_url(resource_type, id)).send().await?;
        match response.status() {
            status if status.is_success() => Ok(Some(response.json().await?)),
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(None),
            status => Err(FederationError::Backend {
                location: self.base_url.to_string(),
                status: status.as_u16(),
                message: response.text().await.ok().filter(|t| !t.is_empty()),
            }),
        }
    }

    /// Fetches an absolute URL, expecting a resource body. `Ok(None)` on 404.
    pub async fn fetch(&self, url: &str) -> FederationResult<Option<Value>> {
        let response = self.http.get(url).send().await?;
        match response.status() {
            status if status.is_success() => Ok(Some(response.json().await?)),
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(None),
            status => Err(FederationError::Backend {
                location: url.to_string(),
                status: status.as_u16(),
                message: None,
            }),
        }
    }

    /// Creates a resource at this backend.
    pub async fn create(&self, resource_type: &str, resource: &Value) -> FederationResult<WriteOutcome> {
        let response = self
            .http
            .post(self.resource_url(resource_type))
            .json(resource)
            .send()
            .await?;
        Ok(capture_outcome(response).await)
    }

    /// Updates (or creates) an instance at this backend.
    pub async fn update(
        &self,
        resource_type: &str,
        id: &str,
        resource: &Value,
    ) -> FederationResult<WriteOutcome> {
        let response = self
            .http
            .put(self.instance_url(resource_type, id))
            .json(resource)
            .send()
            .await?;
        Ok(capture_outcome(response).await)
    }

    /// Deletes an instance at this backend.
    pub async fn delete(&self, resource_type: &str, id: &str) -> FederationResult<WriteOutcome> {
        let response = self
            .http
            .delete(self.instance_url(resource_type, id))
            .send()
            .await?;
        Ok(capture_outcome(response).await)
    }
}

async fn capture_outcome(response: reqwest::Response) -> WriteOutcome {
    let status = response.status().as_u16();
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    let body = response.json().await.ok();
    WriteOutcome {
        status,
        body,
        location,
    }
}

/// Query-string escaping for values embedded in backend search URLs.
pub(crate) mod urlencoding {
    /// Percent-encodes a single query value component.
    pub fn encode(input: &str) -> String {
        url::form_urlencoded::byte_serialize(input.as_bytes()).collect()
    }
}
