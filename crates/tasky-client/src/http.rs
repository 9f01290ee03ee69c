use std::fmt;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use tasky_types::api::{CreateOfferRequest, CreateReviewRequest, ErrorBody, SendMessageRequest};
use tasky_types::{Deal, Message, Offer, Review, Task};

use crate::backend::Backend;
use crate::config::{ClientConfig, normalize_base_url};
use crate::error::{ClientError, truncate_preview};

/// [`Backend`] over JSON/HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tasky-client/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ClientError::Config(format!("failed to initialize HTTP client: {err}")))?;

        Ok(Self {
            base_url: normalize_base_url(&config.base_url),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<RawResponse, ClientError> {
        let url = self.url(path);
        let request = self.client.get(&url);
        RawResponse::read(request, url).await
    }

    async fn post<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<RawResponse, ClientError> {
        let url = self.url(path);
        let request = self.client.post(&url).json(body);
        RawResponse::read(request, url).await
    }
}

/// A fully-read response, before any interpretation of status or body.
struct RawResponse {
    url: String,
    status: StatusCode,
    is_json: bool,
    body: String,
}

impl RawResponse {
    async fn read(request: reqwest::RequestBuilder, url: String) -> Result<Self, ClientError> {
        debug!("{} dispatched", url);
        let response = request.send().await?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        let body = response.text().await?;
        Ok(Self {
            url,
            status,
            is_json,
            body,
        })
    }

    fn non_json(&self) -> ClientError {
        ClientError::NonJson {
            status: self.status.as_u16(),
            url: self.url.clone(),
            preview: truncate_preview(&self.body),
        }
    }

    /// JSON body of a successful response. Non-JSON bodies and error statuses
    /// become errors.
    fn into_json(self) -> Result<Value, ClientError> {
        if !self.is_json {
            return Err(self.non_json());
        }
        let value: Value = serde_json::from_str(&self.body)
            .map_err(|err| ClientError::Decode(format!("{err} (from {})", self.url)))?;
        if !self.status.is_success() {
            return Err(ClientError::Http {
                status: self.status.as_u16(),
                message: error_message(&value, self.status),
            });
        }
        Ok(value)
    }

    fn decode<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        let url = self.url.clone();
        let value = self.into_json()?;
        serde_json::from_value(value)
            .map_err(|err| ClientError::Decode(format!("{err} (from {url})")))
    }

    /// Like [`RawResponse::decode`] for collections, except that a JSON body
    /// that is not an array counts as an empty list.
    fn decode_list<T: DeserializeOwned>(self) -> Result<Vec<T>, ClientError> {
        let url = self.url.clone();
        match self.into_json()? {
            value @ Value::Array(_) => serde_json::from_value(value)
                .map_err(|err| ClientError::Decode(format!("{err} (from {url})"))),
            other => {
                warn!("expected a JSON array from {}, got {}; treating as empty", url, kind(&other));
                Ok(Vec::new())
            }
        }
    }
}

/// Error text from a JSON error payload: `message`, then `detail`, then the
/// bare status.
fn error_message(value: &Value, status: StatusCode) -> String {
    serde_json::from_value::<ErrorBody>(value.clone())
        .ok()
        .and_then(|body| body.text().map(str::to_owned))
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl Backend for HttpBackend {
    async fn get_task(&self, task_id: i64) -> Result<Task, ClientError> {
        let response = self.get(&format!("/api/tasks/{task_id}")).await?;
        if response.status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(format!("task {task_id}")));
        }
        response.decode()
    }

    async fn get_deal(&self, task_id: i64) -> Result<Option<Deal>, ClientError> {
        let response = self.get(&format!("/api/tasks/{task_id}/deal")).await?;
        if response.status == StatusCode::NOT_FOUND {
            debug!("task {} has no deal yet", task_id);
            return Ok(None);
        }
        response.decode().map(Some)
    }

    async fn list_offers(&self, task_id: i64) -> Result<Vec<Offer>, ClientError> {
        self.get(&format!("/api/tasks/{task_id}/offers"))
            .await?
            .decode_list()
    }

    async fn create_offer(
        &self,
        task_id: i64,
        request: &CreateOfferRequest,
    ) -> Result<Offer, ClientError> {
        self.post(&format!("/api/tasks/{task_id}/offers"), request)
            .await?
            .decode()
    }

    async fn list_messages(&self, task_id: i64) -> Result<Vec<Message>, ClientError> {
        self.get(&format!("/api/tasks/{task_id}/messages"))
            .await?
            .decode_list()
    }

    async fn send_message(
        &self,
        task_id: i64,
        request: &SendMessageRequest,
    ) -> Result<Option<Message>, ClientError> {
        let response = self
            .post(&format!("/api/tasks/{task_id}/messages"), request)
            .await?;

        // A 2xx that is not JSON carries no usable id; the caller refetches.
        if !response.is_json && response.status.is_success() {
            debug!("message accepted without a JSON echo ({})", response.status);
            return Ok(None);
        }

        let value = response.into_json()?;
        if value.get("id").and_then(Value::as_i64).is_none() {
            return Ok(None);
        }
        match serde_json::from_value::<Message>(value) {
            Ok(message) => Ok(Some(message)),
            Err(err) => {
                debug!("created message echo did not decode: {}", err);
                Ok(None)
            }
        }
    }

    async fn create_review(
        &self,
        task_id: i64,
        request: &CreateReviewRequest,
    ) -> Result<Review, ClientError> {
        self.post(&format!("/api/tasks/{task_id}/reviews"), request)
            .await?
            .decode()
    }
}
