//! Scripted mock upstream servers for page-level tests.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use url::Url;

pub struct MockResponse {
    status: StatusCode,
    body: String,
}

pub fn ok(body: Value) -> MockResponse {
    status(200, body)
}

pub fn status(status: u16, body: Value) -> MockResponse {
    MockResponse {
        status: StatusCode::from_u16(status).unwrap(),
        body: body.to_string(),
    }
}

/// One mock upstream service answering from a fixed `"METHOD /path"` route
/// table and recording every request it receives. Unmatched routes answer
/// 404.
pub struct MockUpstream {
    port: u16,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockUpstream {
    pub async fn start(routes: Vec<(&str, MockResponse)>) -> Self {
        let table: Arc<HashMap<String, (StatusCode, String)>> = Arc::new(
            routes
                .into_iter()
                .map(|(route, response)| (route.to_string(), (response.status, response.body)))
                .collect(),
        );
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = hyper_util::rt::TokioIo::new(stream);
                let table = table.clone();
                let seen = seen.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                        let table = table.clone();
                        let seen = seen.clone();
                        async move {
                            let route = format!("{} {}", req.method(), req.uri().path());
                            seen.lock().unwrap().push(route.clone());

                            let (status, body) = table
                                .get(&route)
                                .cloned()
                                .unwrap_or((StatusCode::NOT_FOUND, "\"no route\"".to_string()));

                            let mut response = Response::new(Full::new(Bytes::from(body)));
                            *response.status_mut() = status;
                            Ok::<_, Infallible>(response)
                        }
                    });

                    let _ = hyper_util::server::conn::auto::Builder::new(
                        hyper_util::rt::TokioExecutor::new(),
                    )
                    .serve_connection(io, service)
                    .await;
                });
            }
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        Self { port, requests }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://127.0.0.1:{}", self.port)).unwrap()
    }

    /// Every request seen so far, as `"METHOD /path"` lines.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}
