//! User/subscription account service.

use crate::client::{self, Service, UpstreamCaller, UpstreamError, UpstreamRequest};
use crate::types::{Credentials, PaymentMethod, ProfileUpdate, Registration, UserProfile};
use serde_json::Value;
use std::sync::Arc;

pub fn login(credentials: &Credentials) -> UpstreamRequest {
    UpstreamRequest::post(
        Service::Users,
        "/usuarios/login",
        serde_json::to_value(credentials).ok(),
    )
}

pub fn register(registration: &Registration) -> UpstreamRequest {
    UpstreamRequest::post(
        Service::Users,
        "/usuarios/registro",
        serde_json::to_value(registration).ok(),
    )
}

pub fn profile(user_id: &str) -> UpstreamRequest {
    UpstreamRequest::get(Service::Users, format!("/usuarios/{user_id}"))
}

pub fn update_profile(user_id: &str, update: &ProfileUpdate) -> UpstreamRequest {
    UpstreamRequest::put(
        Service::Users,
        format!("/usuarios/{user_id}/perfil"),
        serde_json::to_value(update).ok(),
    )
}

pub fn payment_methods(user_id: &str) -> UpstreamRequest {
    UpstreamRequest::get(Service::Users, format!("/usuarios/{user_id}/metodos-pago"))
}

pub fn add_payment_method(user_id: &str, method: &PaymentMethod) -> UpstreamRequest {
    UpstreamRequest::post(
        Service::Users,
        format!("/usuarios/{user_id}/metodos-pago"),
        serde_json::to_value(method).ok(),
    )
}

pub fn subscription_plans() -> UpstreamRequest {
    UpstreamRequest::get(Service::Users, "/planes-suscripcion")
}

#[derive(Clone)]
pub struct UserApi {
    caller: Arc<dyn UpstreamCaller>,
}

impl UserApi {
    pub fn new(caller: Arc<dyn UpstreamCaller>) -> Self {
        Self { caller }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<UserProfile, UpstreamError> {
        let payload = self.caller.call(&login(credentials)).await?;
        client::decode(Service::Users, payload)
    }

    pub async fn register(&self, registration: &Registration) -> Result<UserProfile, UpstreamError> {
        let payload = self.caller.call(&register(registration)).await?;
        client::decode(Service::Users, payload)
    }

    pub async fn profile(&self, user_id: &str) -> Result<UserProfile, UpstreamError> {
        let payload = self.caller.call(&profile(user_id)).await?;
        client::decode(Service::Users, payload)
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Value, UpstreamError> {
        self.caller.call(&update_profile(user_id, update)).await
    }

    pub async fn payment_methods(
        &self,
        user_id: &str,
    ) -> Result<Vec<PaymentMethod>, UpstreamError> {
        let payload = self.caller.call(&payment_methods(user_id)).await?;
        client::decode(Service::Users, payload)
    }

    pub async fn add_payment_method(
        &self,
        user_id: &str,
        method: &PaymentMethod,
    ) -> Result<Value, UpstreamError> {
        self.caller.call(&add_payment_method(user_id, method)).await
    }

    pub async fn subscription_plans(&self) -> Result<Value, UpstreamError> {
        self.caller.call(&subscription_plans()).await
    }
}
