use crate::config::UpstreamsConfig;
use async_trait::async_trait;
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

use crate::metrics_defs;

const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// One of the three backing services a request can target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Service {
    Content,
    Users,
    Interactions,
}

impl Service {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Service::Content => "content",
            Service::Users => "users",
            Service::Interactions => "interactions",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fully resolved upstream call. Immutable once constructed; any
/// placeholders in the path must be substituted before building it.
#[derive(Clone, Debug)]
pub struct UpstreamRequest {
    pub service: Service,
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl UpstreamRequest {
    pub fn get(service: Service, path: impl Into<String>) -> Self {
        Self {
            service,
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(service: Service, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            service,
            method: Method::POST,
            path: path.into(),
            body,
        }
    }

    pub fn put(service: Service, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            service,
            method: Method::PUT,
            path: path.into(),
            body,
        }
    }

    pub fn delete(service: Service, path: impl Into<String>) -> Self {
        Self {
            service,
            method: Method::DELETE,
            path: path.into(),
            body: None,
        }
    }
}

/// Errors observed while talking to one upstream service
#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    #[error("{service} service returned {status}: {body}")]
    Status {
        service: Service,
        status: StatusCode,
        body: String,
    },

    #[error("{service} service unreachable: {reason}")]
    Unreachable { service: Service, reason: String },

    #[error("could not decode {service} service response: {reason}")]
    Decode { service: Service, reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl UpstreamError {
    /// Status code observed on the wire, if the upstream answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Seam between the aggregation executor and the network. Production code
/// goes through `UpstreamClient`; tests substitute scripted callers.
#[async_trait]
pub trait UpstreamCaller: Send + Sync {
    async fn call(&self, request: &UpstreamRequest) -> Result<Value, UpstreamError>;
}

/// Pooled HTTP client for the three upstream services.
///
/// Holds one `reqwest::Client` (safe for concurrent use) plus the base URLs
/// and call policy from configuration. Lifecycle is scoped to the process,
/// not to any single page request.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    content_url: Url,
    users_url: Url,
    interactions_url: Url,
    get_retries: u32,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamsConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| UpstreamError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            content_url: config.content_url.clone(),
            users_url: config.users_url.clone(),
            interactions_url: config.interactions_url.clone(),
            get_retries: config.get_retries,
        })
    }

    fn base_url(&self, service: Service) -> &Url {
        match service {
            Service::Content => &self.content_url,
            Service::Users => &self.users_url,
            Service::Interactions => &self.interactions_url,
        }
    }

    /// Build the full URL by combining the service base URL with the
    /// request path and optional query string.
    fn resolve_url(&self, request: &UpstreamRequest) -> Url {
        let mut url = self.base_url(request.service).clone();
        match request.path.split_once('?') {
            Some((path, query)) => {
                url.set_path(path);
                url.set_query(Some(query));
            }
            None => url.set_path(&request.path),
        }
        url
    }

    async fn send_once(&self, request: &UpstreamRequest) -> Result<Value, UpstreamError> {
        let service = request.service;
        let url = self.resolve_url(request);

        let mut builder = self.http.request(request.method.clone(), url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            };
            UpstreamError::Unreachable { service, reason }
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Unreachable {
                service,
                reason: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                service,
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        if bytes.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode {
            service,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl UpstreamCaller for UpstreamClient {
    /// Issue one upstream call and decode its JSON payload.
    ///
    /// GET requests are re-attempted on transport failure up to the
    /// configured retry count; other verbs are attempted exactly once.
    /// Status errors are returned as-is, they describe upstream state.
    async fn call(&self, request: &UpstreamRequest) -> Result<Value, UpstreamError> {
        shared::counter!(metrics_defs::UPSTREAM_CALLS).increment(1);

        let attempts = if request.method == Method::GET {
            self.get_retries + 1
        } else {
            1
        };

        let mut attempt = 0;
        loop {
            match self.send_once(request).await {
                Ok(payload) => return Ok(payload),
                Err(e @ UpstreamError::Unreachable { .. }) if attempt + 1 < attempts => {
                    tracing::debug!(
                        service = %request.service,
                        path = %request.path,
                        attempt,
                        error = %e,
                        "retrying upstream call"
                    );
                    shared::counter!(metrics_defs::UPSTREAM_RETRIES).increment(1);
                    attempt += 1;
                    sleep(RETRY_BACKOFF).await;
                }
                Err(e) => {
                    tracing::debug!(
                        service = %request.service,
                        path = %request.path,
                        error = %e,
                        "upstream call failed"
                    );
                    shared::counter!(metrics_defs::UPSTREAM_FAILURES).increment(1);
                    return Err(e);
                }
            }
        }
    }
}

/// Decode a raw payload into a typed model.
pub fn decode<T: DeserializeOwned>(service: Service, value: Value) -> Result<T, UpstreamError> {
    serde_json::from_value(value).map_err(|e| UpstreamError::Decode {
        service,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::service::service_fn;
    use hyper::{Request, Response};
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    fn test_config(port: u16, get_retries: u32) -> UpstreamsConfig {
        let url = Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();
        UpstreamsConfig {
            content_url: url.clone(),
            users_url: url.clone(),
            interactions_url: url,
            http_timeout_secs: 2,
            get_retries,
        }
    }

    /// Start a mock server responding to every request with a fixed status
    /// and body.
    async fn start_mock_server(status: StatusCode, body: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = hyper_util::rt::TokioIo::new(stream);

                tokio::spawn(async move {
                    let service = service_fn(move |_req: Request<hyper::body::Incoming>| async move {
                        let mut response = Response::new(Full::new(Bytes::from_static(
                            body.as_bytes(),
                        )));
                        *response.status_mut() = status;
                        Ok::<_, Infallible>(response)
                    });

                    let _ = hyper_util::server::conn::auto::Builder::new(
                        hyper_util::rt::TokioExecutor::new(),
                    )
                    .serve_connection(io, service)
                    .await;
                });
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        port
    }

    /// Start a listener that accepts and immediately drops every
    /// connection, counting accepts. Every attempt fails at the transport
    /// level.
    async fn start_dropping_server() -> (u16, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepts = Arc::new(AtomicUsize::new(0));
        let counter = accepts.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        (port, accepts)
    }

    #[tokio::test]
    async fn test_success_decodes_json() {
        let port = start_mock_server(StatusCode::OK, r#"[{"id": "g1", "nombre": "Drama"}]"#).await;
        let client = UpstreamClient::new(&test_config(port, 0)).unwrap();

        let payload = client
            .call(&UpstreamRequest::get(Service::Content, "/generos"))
            .await
            .unwrap();

        assert_eq!(payload[0]["nombre"], "Drama");
    }

    #[tokio::test]
    async fn test_status_error_carries_body() {
        let port = start_mock_server(StatusCode::NOT_FOUND, "no such content").await;
        let client = UpstreamClient::new(&test_config(port, 0)).unwrap();

        let err = client
            .call(&UpstreamRequest::get(Service::Content, "/contenidos/x"))
            .await
            .unwrap_err();

        match err {
            UpstreamError::Status { service, status, body } => {
                assert_eq!(service, Service::Content);
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(body, "no such content");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_retried_on_transport_failure() {
        let (port, accepts) = start_dropping_server().await;
        let client = UpstreamClient::new(&test_config(port, 2)).unwrap();

        let err = client
            .call(&UpstreamRequest::get(Service::Interactions, "/contenido/tendencias"))
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::Unreachable { .. }));
        assert_eq!(accepts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_post_never_retried() {
        let (port, accepts) = start_dropping_server().await;
        let client = UpstreamClient::new(&test_config(port, 2)).unwrap();

        let err = client
            .call(&UpstreamRequest::post(
                Service::Interactions,
                "/usuarios/u1/historial/c1",
                None,
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::Unreachable { .. }));
        assert_eq!(accepts.load(Ordering::SeqCst), 1);
    }

    /// Start a listener that accepts connections and never answers.
    async fn start_stalling_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    let _stream = stream;
                    tokio::time::sleep(Duration::from_secs(30)).await;
                });
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        port
    }

    #[tokio::test]
    async fn test_timeout_maps_to_transport_failure() {
        let port = start_stalling_server().await;
        let mut config = test_config(port, 0);
        config.http_timeout_secs = 1;
        let client = UpstreamClient::new(&config).unwrap();

        let err = client
            .call(&UpstreamRequest::get(Service::Content, "/generos"))
            .await
            .unwrap_err();

        match err {
            UpstreamError::Unreachable { reason, .. } => {
                assert!(reason.contains("timed out"), "unexpected reason: {reason}");
            }
            other => panic!("expected unreachable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_body_decodes_to_null() {
        let port = start_mock_server(StatusCode::OK, "").await;
        let client = UpstreamClient::new(&test_config(port, 0)).unwrap();

        let payload = client
            .call(&UpstreamRequest::delete(Service::Interactions, "/usuarios/u1/me-gusta/c1"))
            .await
            .unwrap();

        assert_eq!(payload, Value::Null);
    }

    #[tokio::test]
    async fn test_undecodable_success_body() {
        let port = start_mock_server(StatusCode::OK, "not json at all").await;
        let client = UpstreamClient::new(&test_config(port, 0)).unwrap();

        let err = client
            .call(&UpstreamRequest::get(Service::Users, "/usuarios/u1"))
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::Decode { .. }));
    }

    #[test]
    fn test_resolve_url_with_query() {
        let config = test_config(8002, 0);
        let client = UpstreamClient::new(&config).unwrap();
        let request = UpstreamRequest::post(
            Service::Interactions,
            "/usuarios/u1/valoraciones/c1?valoracion=4",
            None,
        );

        let url = client.resolve_url(&request);
        assert_eq!(url.path(), "/usuarios/u1/valoraciones/c1");
        assert_eq!(url.query(), Some("valoracion=4"));
    }
}
