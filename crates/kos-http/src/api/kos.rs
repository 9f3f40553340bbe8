//! Listing endpoints: list, detail and likes

use serde_json::Value;

use super::truthy;
use crate::http::{HttpClient, NormalizedResponse, RequestSpec, Result};
use crate::pagination::{Page, Pagination};

/// Client-side liked flag of one listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LikeState {
    liked: bool,
}

impl LikeState {
    pub fn new(liked: bool) -> Self {
        Self { liked }
    }

    pub fn liked(&self) -> bool {
        self.liked
    }
}

/// Listing endpoints
#[derive(Debug, Clone)]
pub struct KosApi {
    http: HttpClient,
}

impl KosApi {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// `GET /kos?page=&limit=`
    pub async fn list(&self, page: u32, limit: u32) -> Result<Page<Value>> {
        let response = self
            .http
            .get(
                RequestSpec::new("/kos")
                    .with_param("page", page)
                    .with_param("limit", limit),
            )
            .await?;
        Ok(page_from_body(&response.body))
    }

    /// `GET /kos/{id}`; the listing under `data`, if any
    pub async fn detail(&self, id: u64) -> Result<Option<Value>> {
        let response = self
            .http
            .get(RequestSpec::new(format!("/kos/{}", id)).with_success_notification(false))
            .await?;
        Ok(response.body.get("data").filter(|data| !data.is_null()).cloned())
    }

    /// `GET /kos/like?kos_id=`; failures have no user-facing side effects
    pub async fn like_status(&self, id: u64) -> Result<bool> {
        let response = self
            .http
            .get(
                RequestSpec::new("/kos/like")
                    .with_param("kos_id", id)
                    .with_success_notification(false)
                    .with_error_status_handling(false),
            )
            .await?;

        let body = &response.body;
        let success = body.get("success").map(truthy).unwrap_or(false);
        let data = body.get("data").map(truthy).unwrap_or(false);
        let liked = body.get("liked").map(truthy).unwrap_or(false);
        Ok((success || data) && (liked || data))
    }

    /// `POST /kos/like?kos_id=`, flipping `state` first and restoring it on failure
    pub async fn toggle_like(&self, id: u64, state: &mut LikeState) -> Result<NormalizedResponse> {
        let previous = state.liked;
        state.liked = !previous;

        let result = self
            .http
            .post(
                RequestSpec::new("/kos/like")
                    .with_param("kos_id", id)
                    .with_success_notification(false),
            )
            .await;

        if result.is_err() {
            state.liked = previous;
        }
        result
    }
}

/// Lenient page parse: `data` defaults to empty, a malformed `pagination` is ignored
fn page_from_body(body: &Value) -> Page<Value> {
    let data = body
        .get("data")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let pagination = body
        .get("pagination")
        .filter(|p| !p.is_null())
        .and_then(|p| serde_json::from_value::<Pagination>(p.clone()).ok());
    Page { data, pagination }
}
