//! Thin JSON routing layer over the aggregation library and the typed
//! upstream APIs. Every handler is single-call glue; the interesting
//! control flow lives in the `aggregator` crate.

use crate::config::Config;
use aggregator::error::AggregationError;
use aggregator::pages::Pages;
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode, Uri};
use serde_json::{Value, json};
use shared::http::{json_response, make_error_response, run_http_service};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use upstream::client::{UpstreamClient, UpstreamError};
use upstream::content::ContentApi;
use upstream::interactions::InteractionApi;
use upstream::types::{Credentials, PaymentMethod, ProfileUpdate, Registration};
use upstream::users::UserApi;

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upstream client error: {0}")]
    Upstream(#[from] UpstreamError),
}

type GatewayBody = BoxBody<Bytes, GatewayError>;

pub async fn run(config: Config) -> Result<(), GatewayError> {
    let client = Arc::new(UpstreamClient::new(&config.upstreams)?);

    let gateway = Arc::new(Gateway {
        pages: Pages::new(client.clone(), config.aggregation.max_in_flight),
        users: UserApi::new(client.clone()),
        interactions: InteractionApi::new(client.clone()),
        content: ContentApi::new(client),
    });

    run_http_service(
        &config.listener.host,
        config.listener.port,
        GatewayService { gateway },
    )
    .await
}

struct GatewayService {
    gateway: Arc<Gateway>,
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = Response<GatewayBody>;
    type Error = GatewayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let gateway = self.gateway.clone();
        Box::pin(async move { Ok(gateway.handle(req).await) })
    }
}

struct Gateway {
    pages: Pages,
    users: UserApi,
    interactions: InteractionApi,
    content: ContentApi,
}

impl Gateway {
    async fn handle(&self, req: Request<Incoming>) -> Response<GatewayBody> {
        let (parts, body) = req.into_parts();
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read request body");
                return make_error_response(StatusCode::BAD_REQUEST);
            }
        };

        let path = parts.uri.path().to_string();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        tracing::debug!(method = %parts.method, path = %path, "handling request");

        match (&parts.method, segments.as_slice()) {
            (&Method::GET, ["health"]) => json_response(StatusCode::OK, &json!({"status": "ok"})),

            (&Method::GET, ["home"]) => match required_param(&parts.uri, "user_id") {
                Ok(user_id) => self.home(&user_id).await,
                Err(response) => response,
            },
            (&Method::GET, ["contents", content_id]) => {
                match required_param(&parts.uri, "user_id") {
                    Ok(user_id) => self.content_detail(&user_id, content_id).await,
                    Err(response) => response,
                }
            }

            (&Method::POST, ["login"]) => self.login(&bytes).await,
            (&Method::POST, ["register"]) => self.register(&bytes).await,
            (&Method::GET, ["plans"]) => {
                respond(self.users.subscription_plans().await)
            }

            (&Method::GET, ["users", user_id, "profile"]) => {
                respond(self.users.profile(user_id).await)
            }
            (&Method::PUT, ["users", user_id, "profile"]) => {
                self.update_profile(user_id, &bytes).await
            }
            (&Method::GET, ["users", user_id, "payment-methods"]) => {
                respond(self.users.payment_methods(user_id).await)
            }
            (&Method::POST, ["users", user_id, "payment-methods"]) => {
                self.add_payment_method(user_id, &bytes).await
            }

            (&Method::GET, ["users", user_id, "likes"]) => {
                respond(self.interactions.likes(user_id).await)
            }
            (&Method::POST, ["users", user_id, "likes", content_id]) => {
                respond(self.interactions.like(user_id, content_id).await)
            }
            (&Method::DELETE, ["users", user_id, "likes", content_id]) => {
                respond(self.interactions.unlike(user_id, content_id).await)
            }
            (&Method::GET, ["users", user_id, "history"]) => {
                respond(self.interactions.history(user_id).await)
            }
            (&Method::POST, ["users", user_id, "list", content_id]) => {
                respond(self.interactions.add_to_personal_list(user_id, content_id).await)
            }
            (&Method::DELETE, ["users", user_id, "list", content_id]) => {
                respond(
                    self.interactions
                        .remove_from_personal_list(user_id, content_id)
                        .await,
                )
            }
            (&Method::POST, ["users", user_id, "ratings", content_id]) => {
                self.rate(user_id, content_id, &bytes).await
            }

            (&Method::GET, ["search"]) => self.search(&parts.uri).await,

            (&Method::GET, ["catalog", "contents"]) => respond(self.content.all_contents().await),
            (&Method::GET, ["catalog", "movies"]) => respond(self.content.all_movies().await),
            (&Method::GET, ["catalog", "series"]) => respond(self.content.all_series().await),
            (&Method::GET, ["catalog", "actors"]) => respond(self.content.actors().await),
            (&Method::GET, ["catalog", "directors"]) => respond(self.content.directors().await),
            (&Method::POST, ["catalog", "movies"]) => {
                self.forward_create(&bytes, |body| self.content.create_movie(body)).await
            }
            (&Method::POST, ["catalog", "series"]) => {
                self.forward_create(&bytes, |body| self.content.create_series(body)).await
            }
            (&Method::POST, ["catalog", "genres"]) => {
                self.forward_create(&bytes, |body| self.content.create_genre(body)).await
            }
            (&Method::POST, ["catalog", "series", series_id, "seasons"]) => {
                self.forward_create(&bytes, |body| self.content.create_season(series_id, body))
                    .await
            }
            (&Method::POST, ["catalog", "series", series_id, "seasons", season_id, "episodes"]) => {
                self.forward_create(&bytes, |body| {
                    self.content.create_episode(series_id, season_id, body)
                })
                .await
            }
            (&Method::POST, ["catalog", "contents", content_id, "cast", actor_id]) => {
                respond(self.content.add_cast_member(content_id, actor_id).await)
            }

            _ => {
                tracing::warn!(method = %parts.method, path = %path, "no route matched");
                make_error_response(StatusCode::NOT_FOUND)
            }
        }
    }

    async fn home(&self, user_id: &str) -> Response<GatewayBody> {
        match self.pages.home_screen(user_id).await {
            Ok(home) => json_response(StatusCode::OK, &home),
            Err(e) => aggregation_error_response(e),
        }
    }

    async fn content_detail(&self, user_id: &str, content_id: &str) -> Response<GatewayBody> {
        match self.pages.content_detail(user_id, content_id).await {
            Ok(detail) => json_response(StatusCode::OK, &detail),
            Err(e) => aggregation_error_response(e),
        }
    }

    async fn login(&self, bytes: &Bytes) -> Response<GatewayBody> {
        let credentials: Credentials = match parse_body(bytes) {
            Ok(credentials) => credentials,
            Err(response) => return response,
        };
        respond(self.users.login(&credentials).await)
    }

    async fn register(&self, bytes: &Bytes) -> Response<GatewayBody> {
        let registration: Registration = match parse_body(bytes) {
            Ok(registration) => registration,
            Err(response) => return response,
        };
        respond(self.users.register(&registration).await)
    }

    async fn update_profile(&self, user_id: &str, bytes: &Bytes) -> Response<GatewayBody> {
        let update: ProfileUpdate = match parse_body(bytes) {
            Ok(update) => update,
            Err(response) => return response,
        };
        respond(self.users.update_profile(user_id, &update).await)
    }

    async fn add_payment_method(&self, user_id: &str, bytes: &Bytes) -> Response<GatewayBody> {
        let method: PaymentMethod = match parse_body(bytes) {
            Ok(method) => method,
            Err(response) => return response,
        };
        respond(self.users.add_payment_method(user_id, &method).await)
    }

    async fn rate(&self, user_id: &str, content_id: &str, bytes: &Bytes) -> Response<GatewayBody> {
        let body: Value = match parse_body(bytes) {
            Ok(body) => body,
            Err(response) => return response,
        };
        let Some(rating) = body.get("valoracion").and_then(Value::as_u64) else {
            return bad_request("missing 'valoracion' field");
        };
        let Ok(rating) = u8::try_from(rating) else {
            return bad_request("'valoracion' out of range");
        };
        respond(self.interactions.rate(user_id, content_id, rating).await)
    }

    /// Combined search over contents and actors. Both lookups run
    /// concurrently for `kind=all`; a failed side degrades to empty.
    async fn search(&self, uri: &Uri) -> Response<GatewayBody> {
        let query = match required_param(uri, "query") {
            Ok(query) => query,
            Err(response) => return response,
        };
        let kind = query_param(uri, "kind").unwrap_or_else(|| "all".to_string());

        let (contents, actors) = match kind.as_str() {
            "contents" => (self.content.search_contents(&query).await.ok(), None),
            "actors" => (None, self.content.search_actors(&query).await.ok()),
            "all" => {
                let (contents, actors) = tokio::join!(
                    self.content.search_contents(&query),
                    self.content.search_actors(&query),
                );
                (contents.ok(), actors.ok())
            }
            _ => return bad_request("unknown search kind"),
        };

        let results = |side: Option<Value>| {
            side.and_then(|mut payload| payload.get_mut("resultados").map(Value::take))
                .unwrap_or(Value::Array(Vec::new()))
        };

        json_response(
            StatusCode::OK,
            &json!({
                "contents": results(contents),
                "actors": results(actors),
            }),
        )
    }

    async fn forward_create<F, Fut>(&self, bytes: &Bytes, call: F) -> Response<GatewayBody>
    where
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<Value, UpstreamError>>,
    {
        let body: Value = match parse_body(bytes) {
            Ok(body) => body,
            Err(response) => return response,
        };
        respond(call(body).await)
    }
}

fn respond<T: serde::Serialize>(result: Result<T, UpstreamError>) -> Response<GatewayBody> {
    match result {
        Ok(payload) => json_response(StatusCode::OK, &payload),
        Err(e) => upstream_error_response(e),
    }
}

/// User-initiated calls surface the upstream error verbatim: the observed
/// status and body for status errors, 502 for anything the upstream never
/// answered.
fn upstream_error_response(error: UpstreamError) -> Response<GatewayBody> {
    match error {
        UpstreamError::Status { status, body, .. } => {
            json_response(status, &json!({"error": body}))
        }
        UpstreamError::Unreachable { .. } | UpstreamError::Decode { .. } => {
            tracing::warn!(error = %error, "upstream unavailable");
            make_error_response(StatusCode::BAD_GATEWAY)
        }
        UpstreamError::Internal(_) => make_error_response(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

fn aggregation_error_response(error: AggregationError) -> Response<GatewayBody> {
    match error {
        AggregationError::BadRequest(reason) => bad_request(&reason),
        AggregationError::RequiredNodeFailed { node, source } => {
            tracing::warn!(node, error = %source, "page aggregation failed");
            let status = source.status().unwrap_or(StatusCode::BAD_GATEWAY);
            json_response(status, &json!({"error": "could not load the page"}))
        }
        AggregationError::InvalidGraph(e) => {
            tracing::error!(error = %e, "page graph failed to build");
            make_error_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn bad_request(reason: &str) -> Response<GatewayBody> {
    json_response(StatusCode::BAD_REQUEST, &json!({"error": reason}))
}

fn parse_body<T: serde::de::DeserializeOwned>(bytes: &Bytes) -> Result<T, Response<GatewayBody>> {
    serde_json::from_slice(bytes).map_err(|e| bad_request(&format!("invalid request body: {e}")))
}

fn query_param(uri: &Uri, name: &str) -> Option<String> {
    uri.query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

fn required_param(uri: &Uri, name: &str) -> Result<String, Response<GatewayBody>> {
    query_param(uri, name).ok_or_else(|| bad_request(&format!("missing '{name}' parameter")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param() {
        let uri: Uri = "http://localhost/home?user_id=u1&kind=all".parse().unwrap();
        assert_eq!(query_param(&uri, "user_id").as_deref(), Some("u1"));
        assert_eq!(query_param(&uri, "kind").as_deref(), Some("all"));
        assert_eq!(query_param(&uri, "missing"), None);

        let uri: Uri = "http://localhost/home?user_id=".parse().unwrap();
        assert_eq!(query_param(&uri, "user_id"), None);

        let uri: Uri = "http://localhost/home".parse().unwrap();
        assert!(required_param(&uri, "user_id").is_err());
    }

    #[test]
    fn test_upstream_status_errors_forward_verbatim() {
        let response = upstream_error_response(UpstreamError::Status {
            service: upstream::client::Service::Interactions,
            status: StatusCode::CONFLICT,
            body: "already rated".to_string(),
        });
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = upstream_error_response(UpstreamError::Unreachable {
            service: upstream::client::Service::Users,
            reason: "connection refused".to_string(),
        });
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_required_failure_maps_to_observed_status() {
        let response = aggregation_error_response(AggregationError::RequiredNodeFailed {
            node: "content",
            source: UpstreamError::Status {
                service: upstream::client::Service::Content,
                status: StatusCode::NOT_FOUND,
                body: "missing".to_string(),
            },
        });
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = aggregation_error_response(AggregationError::BadRequest(
            "missing user id".to_string(),
        ));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
