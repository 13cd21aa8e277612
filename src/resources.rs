//! Resource endpoints used by the agent dashboard and the client portal
//!
//! Thin wrappers over [`ApiClient`]; payloads stay as JSON values because
//! the screens consume them directly. Caller-supplied ids are
//! percent-encoded as single path segments.

use crate::error::{ClientError, Result};
use crate::http_client::{ApiClient, ApiRequest};
use serde_json::Value;
use url::Url;

/// Join `segments` into an absolute path, encoding each one so `/`, `?` or
/// `#` inside an id stays part of that segment.
fn resource_path<'a>(segments: impl IntoIterator<Item = &'a str>) -> Result<String> {
    let mut url = Url::parse("http://localhost/")
        .map_err(|e| ClientError::Configuration(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| ClientError::Configuration("URL cannot carry a path".to_string()))?
        .clear()
        .extend(segments);
    Ok(url.path().to_string())
}

#[derive(Clone)]
pub struct ResourceClient {
    api: ApiClient,
}

impl ResourceClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn list_clients(&self) -> Result<Value> {
        self.api.get_json("/clients").await
    }

    pub async fn get_client(&self, client_id: &str) -> Result<Value> {
        self.api.get_json(&resource_path(["clients", client_id])?).await
    }

    pub async fn create_client(&self, client: &Value) -> Result<Value> {
        self.api.post_json("/clients", client).await
    }

    /// Deals, optionally filtered by status (e.g. `open`, `closed`)
    pub async fn list_deals(&self, status: Option<&str>) -> Result<Value> {
        let mut request = ApiRequest::get("/deals");
        if let Some(status) = status {
            request = request.query("status", status);
        }
        self.api.send_json(request).await
    }

    pub async fn get_deal(&self, deal_id: &str) -> Result<Value> {
        self.api.get_json(&resource_path(["deals", deal_id])?).await
    }

    pub async fn deal_timeline(&self, deal_id: &str) -> Result<Value> {
        self.api.get_json(&resource_path(["timeline", deal_id])?).await
    }

    pub async fn update_timeline_task(&self, deal_id: &str, task_id: &str, task: &Value) -> Result<Value> {
        let path = resource_path(["timeline", deal_id, "tasks", task_id])?;
        self.api.put_json(&path, task).await
    }

    /// Any client-portal endpoint under `/client/`. `path` may be nested
    /// (`deals/12/documents`); each of its segments is encoded on its own.
    pub async fn client_portal(&self, path: &str) -> Result<Value> {
        let segments = path.split('/').filter(|segment| !segment.is_empty());
        let path = resource_path(std::iter::once("client").chain(segments))?;
        self.api.get_json(&path).await
    }
}
