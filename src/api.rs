use crate::{
    config::ClientConfig,
    error::ApiError,
    models::{CreateLinkRequest, Identity, LinkRecord, LoginRequest, RegisterRequest},
};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;

// ── Error payload shape ────────────────────────────────────────────────────

/// Error bodies carry the human-readable text in `message`, or in `error`
/// for the framework's default error page.
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

// ── Client ─────────────────────────────────────────────────────────────────

/// The one configured HTTP transport every component talks through.
///
/// Wraps a single `reqwest::Client` (connection pool, default timeout) and
/// the backend's base URL. Cloning is cheap and shares the pool.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    health_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {e}", config.api_base_url)))?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            health_timeout: config.health_timeout,
        })
    }

    // ── Auth ───────────────────────────────────────────────────────────────

    /// POST /api/auth/login. A credential check only; nothing comes back
    /// that the client keeps.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "auth", "login"])?;
        self.send(self.http.post(url).json(&LoginRequest { username, password }))
            .await?;
        Ok(())
    }

    /// GET /api/users/username/{username}
    pub async fn user_by_username(&self, username: &str) -> Result<Identity, ApiError> {
        let url = self.endpoint(&["api", "users", "username", username])?;
        let resp = self.send(self.http.get(url)).await?;
        decode(resp).await
    }

    /// POST /api/auth/register
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "auth", "register"])?;
        let body = RegisterRequest {
            username,
            email,
            password,
        };
        self.send(self.http.post(url).json(&body)).await?;
        Ok(())
    }

    // ── Links ──────────────────────────────────────────────────────────────

    /// GET /api/urls/stats/popular
    pub async fn popular_links(&self) -> Result<Vec<LinkRecord>, ApiError> {
        let url = self.endpoint(&["api", "urls", "stats", "popular"])?;
        let resp = self.send(self.http.get(url)).await?;
        decode(resp).await
    }

    /// GET /api/users/{user_id}/urls
    pub async fn user_links(&self, user_id: i64) -> Result<Vec<LinkRecord>, ApiError> {
        let id = user_id.to_string();
        let url = self.endpoint(&["api", "users", &id, "urls"])?;
        let resp = self.send(self.http.get(url)).await?;
        decode(resp).await
    }

    /// POST /api/urls, or POST /api/urls/custom when the request names its
    /// own short code.
    pub async fn create_link(&self, body: &CreateLinkRequest) -> Result<LinkRecord, ApiError> {
        let url = match body.custom_short_code {
            Some(_) => self.endpoint(&["api", "urls", "custom"])?,
            None => self.endpoint(&["api", "urls"])?,
        };
        let resp = self.send(self.http.post(url).json(body)).await?;
        decode(resp).await
    }

    /// GET /api/urls/{short_code}
    pub async fn get_link(&self, short_code: &str) -> Result<LinkRecord, ApiError> {
        let url = self.endpoint(&["api", "urls", short_code])?;
        let resp = self.send(self.http.get(url)).await?;
        decode(resp).await
    }

    /// DELETE /api/urls/{id}
    pub async fn delete_link(&self, id: i64) -> Result<(), ApiError> {
        let id = id.to_string();
        let url = self.endpoint(&["api", "urls", &id])?;
        self.send(self.http.delete(url)).await?;
        Ok(())
    }

    // ── Liveness ───────────────────────────────────────────────────────────

    /// GET /actuator/health with the (shorter) probe timeout. Any non-success
    /// outcome is an error; callers only care whether it succeeded.
    pub async fn probe_health(&self) -> Result<(), ApiError> {
        let url = self.endpoint(&["actuator", "health"])?;
        self.send(self.http.get(url).timeout(self.health_timeout))
            .await?;
        Ok(())
    }

    // ── Internal helpers ───────────────────────────────────────────────────

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and turn non-success statuses into `ApiError`s,
    /// pulling the server's message out of the body when there is one.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let resp = request.send().await.map_err(|e| {
            tracing::warn!("Request failed before a response arrived: {}", e);
            ApiError::Network(e)
        })?;

        let status = resp.status();
        tracing::debug!("{} {}", status.as_u16(), resp.url().path());

        if status.is_success() {
            return Ok(resp);
        }

        let path = resp.url().path().to_owned();
        let message = resp
            .bytes()
            .await
            .ok()
            .and_then(|body| serde_json::from_slice::<ErrorBody>(&body).ok())
            .and_then(|body| body.message.or(body.error))
            .filter(|m| !m.trim().is_empty());

        tracing::warn!("{} returned {}: {:?}", path, status, message);

        if status == StatusCode::NOT_FOUND {
            Err(ApiError::NotFound { message })
        } else {
            Err(ApiError::Server { status, message })
        }
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let body = resp.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| {
        tracing::error!("Could not decode response body: {}", e);
        ApiError::Decode(e.to_string())
    })
}
