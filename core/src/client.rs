//! Request builder, response parser and timed executor for the webhook
//! backend.
//!
//! # Design
//! `ApiClient` holds only its configuration, a transport and a notification
//! sink; it keeps no state between calls and caches nothing. Each call is
//! split the same way as before the network gets involved:
//! `build_request` turns a logical endpoint plus a `RequestDescriptor` into
//! an `HttpRequest`, and `parse_response` turns an `HttpResponse` into JSON
//! or a classified `ApiError`. `call` glues the two around the transport with
//! `tokio::time::timeout`, which drops (and so cancels) the in-flight request
//! when the timer fires first.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::notify::{NotificationKind, NotificationSink, DEFAULT_DURATION};
use crate::transport::Transport;

/// Everything that varies per call. Created per call, dropped afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    /// Resource id appended as the last path segment.
    pub id: Option<String>,
    pub query: BTreeMap<String, String>,
    /// Only attached for non-GET methods.
    pub body: Option<Value>,
    /// Applied after the standard headers, replacing same-named ones.
    pub headers: Vec<(String, String)>,
}

impl RequestDescriptor {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn put(body: Value) -> Self {
        Self {
            method: HttpMethod::Put,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn delete() -> Self {
        Self {
            method: HttpMethod::Delete,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Stateless client for the webhook backend.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    config: ApiConfig,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn NotificationSink>,
    notification: Duration,
}

impl ApiClient {
    pub fn new(
        config: ApiConfig,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config,
            transport,
            notifier,
            notification: DEFAULT_DURATION,
        }
    }

    /// How long error notifications raised by this client stay on screen.
    pub fn with_notification_duration(mut self, duration: Duration) -> Self {
        self.notification = duration;
        self
    }

    pub fn notification_duration(&self) -> Duration {
        self.notification
    }

    pub fn notifier(&self) -> &Arc<dyn NotificationSink> {
        &self.notifier
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    /// Resolve a logical endpoint name to its path segment.
    pub fn resolve(&self, endpoint: &str) -> Result<&str, ApiError> {
        self.config
            .endpoints
            .get(endpoint)
            .map(|p| p.trim_matches('/'))
            .ok_or_else(|| ApiError::UnknownEndpoint(endpoint.to_string()))
    }

    pub fn build_request(
        &self,
        endpoint: &str,
        descriptor: &RequestDescriptor,
    ) -> Result<HttpRequest, ApiError> {
        let mut url = format!("{}/{}", self.base_url, self.resolve(endpoint)?);
        if let Some(id) = &descriptor.id {
            url.push('/');
            url.push_str(&urlencoding::encode(id));
        }
        if !descriptor.query.is_empty() {
            let query: Vec<String> = descriptor
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.push('?');
            url.push_str(&query.join("&"));
        }

        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        if let Some(key) = &self.config.api_key {
            headers.push(("X-API-KEY".to_string(), key.clone()));
        }
        for (name, value) in &descriptor.headers {
            match headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
                Some(existing) => existing.1 = value.clone(),
                None => headers.push((name.clone(), value.clone())),
            }
        }

        let body = match (&descriptor.method, &descriptor.body) {
            (HttpMethod::Get, Some(_)) => {
                tracing::debug!(endpoint, "dropping body on GET request");
                None
            }
            (_, Some(body)) => Some(
                serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?,
            ),
            (_, None) => None,
        };

        Ok(HttpRequest {
            method: descriptor.method,
            url,
            headers,
            body,
        })
    }

    /// Classify a response: non-2xx keeps the raw body, an empty 2xx body is
    /// `null`, anything else must be JSON.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Value, ApiError> {
        if !response.is_success() {
            return Err(ApiError::HttpStatus {
                status: response.status,
                body: response.body,
            });
        }
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&response.body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Perform one call. Any failure is reported to the notification sink
    /// before being returned.
    pub async fn call(
        &self,
        endpoint: &str,
        descriptor: RequestDescriptor,
    ) -> Result<Value, ApiError> {
        let result = self.execute(endpoint, &descriptor).await;
        if let Err(err) = &result {
            tracing::warn!(
                endpoint,
                method = descriptor.method.as_str(),
                error = %err,
                "backend call failed"
            );
            self.notifier
                .notify(&err.user_message(), NotificationKind::Error, self.notification);
        }
        result
    }

    /// Perform one call without notifying the sink. Used for health checks whose
    /// failure the caller reports in its own words.
    pub async fn call_unreported(
        &self,
        endpoint: &str,
        descriptor: RequestDescriptor,
    ) -> Result<Value, ApiError> {
        let result = self.execute(endpoint, &descriptor).await;
        if let Err(err) = &result {
            tracing::debug!(endpoint, error = %err, "unreported call failed");
        }
        result
    }

    async fn execute(
        &self,
        endpoint: &str,
        descriptor: &RequestDescriptor,
    ) -> Result<Value, ApiError> {
        let request = self.build_request(endpoint, descriptor)?;
        tracing::debug!(method = request.method.as_str(), url = %request.url, "sending request");

        let response = tokio::time::timeout(self.timeout(), self.transport.execute(request))
            .await
            .map_err(|_| ApiError::Timeout)??;

        tracing::debug!(endpoint, status = response.status, "response received");
        self.parse_response(response)
    }
}
