//! Interaction/recommendation tracking service: request constructors used
//! by the page graphs, plus a typed API for forwarded user actions.
//!
//! Write actions here follow the surfaced-error policy: the upstream error
//! is returned verbatim to the caller. The one fire-and-forget write (the
//! history append baked into the content-detail page) is driven by the
//! aggregation graph, not this API.

use crate::client::{self, Service, UpstreamCaller, UpstreamError, UpstreamRequest};
use crate::types::ContentSummary;
use serde_json::Value;
use std::sync::Arc;

pub fn recommendations(user_id: &str) -> UpstreamRequest {
    UpstreamRequest::get(
        Service::Interactions,
        format!("/usuarios/{user_id}/recomendaciones"),
    )
}

pub fn trending() -> UpstreamRequest {
    UpstreamRequest::get(Service::Interactions, "/contenido/tendencias")
}

pub fn history(user_id: &str) -> UpstreamRequest {
    UpstreamRequest::get(Service::Interactions, format!("/usuarios/{user_id}/historial"))
}

pub fn record_view(user_id: &str, content_id: &str) -> UpstreamRequest {
    UpstreamRequest::post(
        Service::Interactions,
        format!("/usuarios/{user_id}/historial/{content_id}"),
        None,
    )
}

pub fn personal_list(user_id: &str) -> UpstreamRequest {
    UpstreamRequest::get(
        Service::Interactions,
        format!("/usuarios/{user_id}/listaPersonalizada"),
    )
}

pub fn add_to_personal_list(user_id: &str, content_id: &str) -> UpstreamRequest {
    UpstreamRequest::post(
        Service::Interactions,
        format!("/usuarios/{user_id}/listaPersonalizada/{content_id}"),
        None,
    )
}

pub fn remove_from_personal_list(user_id: &str, content_id: &str) -> UpstreamRequest {
    UpstreamRequest::delete(
        Service::Interactions,
        format!("/usuarios/{user_id}/listaPersonalizada/{content_id}"),
    )
}

pub fn likes(user_id: &str) -> UpstreamRequest {
    UpstreamRequest::get(Service::Interactions, format!("/usuarios/{user_id}/me-gusta"))
}

pub fn like(user_id: &str, content_id: &str) -> UpstreamRequest {
    UpstreamRequest::post(
        Service::Interactions,
        format!("/usuarios/{user_id}/me-gusta/{content_id}"),
        None,
    )
}

pub fn unlike(user_id: &str, content_id: &str) -> UpstreamRequest {
    UpstreamRequest::delete(
        Service::Interactions,
        format!("/usuarios/{user_id}/me-gusta/{content_id}"),
    )
}

pub fn rate(user_id: &str, content_id: &str, rating: u8) -> UpstreamRequest {
    UpstreamRequest::post(
        Service::Interactions,
        format!("/usuarios/{user_id}/valoraciones/{content_id}?valoracion={rating}"),
        None,
    )
}

#[derive(Clone)]
pub struct InteractionApi {
    caller: Arc<dyn UpstreamCaller>,
}

impl InteractionApi {
    pub fn new(caller: Arc<dyn UpstreamCaller>) -> Self {
        Self { caller }
    }

    pub async fn likes(&self, user_id: &str) -> Result<Vec<ContentSummary>, UpstreamError> {
        let payload = self.caller.call(&likes(user_id)).await?;
        client::decode(Service::Interactions, payload)
    }

    pub async fn like(&self, user_id: &str, content_id: &str) -> Result<Value, UpstreamError> {
        self.caller.call(&like(user_id, content_id)).await
    }

    pub async fn unlike(&self, user_id: &str, content_id: &str) -> Result<Value, UpstreamError> {
        self.caller.call(&unlike(user_id, content_id)).await
    }

    pub async fn history(&self, user_id: &str) -> Result<Vec<ContentSummary>, UpstreamError> {
        let payload = self.caller.call(&history(user_id)).await?;
        client::decode(Service::Interactions, payload)
    }

    pub async fn add_to_personal_list(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> Result<Value, UpstreamError> {
        self.caller.call(&add_to_personal_list(user_id, content_id)).await
    }

    pub async fn remove_from_personal_list(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> Result<Value, UpstreamError> {
        self.caller
            .call(&remove_from_personal_list(user_id, content_id))
            .await
    }

    /// Submit an explicit rating. Upstream errors surface verbatim.
    pub async fn rate(
        &self,
        user_id: &str,
        content_id: &str,
        rating: u8,
    ) -> Result<Value, UpstreamError> {
        self.caller.call(&rate(user_id, content_id, rating)).await
    }
}
