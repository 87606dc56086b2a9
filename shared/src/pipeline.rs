//! Generic request pipeline shared by every user lambda.
//!
//! `FunctionHandler<Req, Res>` authorizes the caller, decodes and validates the body,
//! runs the operation and shapes its result. Panics below it become 500s.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use lambda_http::http::{Method, StatusCode};
use lambda_http::{Body, Error, Request, RequestExt, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use validator::{Validate, ValidationErrors};

use crate::config::Config;
use crate::errors::ApiError;
use crate::permissions::{Permission, PERMISSIONS_CLAIM};
use crate::validation::validate_request;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParameters(HashMap<String, String>);

impl PathParameters {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|v| v.as_str())
    }

    /// A missing parameter is a validation failure.
    pub fn require(&self, name: &str) -> Result<&str, ApiError> {
        self.get(name)
            .ok_or_else(|| ApiError::validation(format!("missing path parameter {}", name)))
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Request body as delivered by API Gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    Empty,
    Text(String),
    /// Binary payload that is not UTF-8.
    NotUtf8,
}

impl RequestBody {
    /// Text for decoding and logs; empty unless the body is UTF-8 text.
    pub fn as_str(&self) -> &str {
        match self {
            RequestBody::Text(text) => text,
            RequestBody::Empty | RequestBody::NotUtf8 => "",
        }
    }
}

impl From<&Body> for RequestBody {
    fn from(body: &Body) -> Self {
        match body {
            Body::Empty => RequestBody::Empty,
            Body::Text(text) => RequestBody::Text(text.clone()),
            Body::Binary(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => RequestBody::Text(text.to_string()),
                Err(_) => RequestBody::NotUtf8,
            },
        }
    }
}

/// The parts of an API Gateway request the pipeline acts on.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path_parameters: PathParameters,
    pub body: RequestBody,
    pub permissions: Option<String>,
    pub request_id: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            path_parameters: PathParameters::default(),
            body: RequestBody::Empty,
            permissions: None,
            request_id: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = RequestBody::Text(body.into());
        self
    }

    pub fn with_permissions(mut self, permissions: impl Into<String>) -> Self {
        self.permissions = Some(permissions.into());
        self
    }

    pub fn with_path_parameter(mut self, name: &str, value: impl Into<String>) -> Self {
        self.path_parameters.insert(name, value);
        self
    }

    pub fn from_lambda(event: &Request) -> Self {
        let body = RequestBody::from(event.body());

        let path_parameters = event
            .path_parameters_ref()
            .map(|params| params.iter().collect())
            .unwrap_or_default();

        // Custom authorizers put their context in `fields`; JWT authorizers in claims.
        let permissions = event
            .request_context_ref()
            .and_then(|ctx| ctx.authorizer())
            .and_then(|auth| {
                auth.fields
                    .get(PERMISSIONS_CLAIM)
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .or_else(|| {
                        auth.jwt
                            .as_ref()
                            .and_then(|jwt| jwt.claims.get(PERMISSIONS_CLAIM))
                            .cloned()
                    })
            });

        Self {
            method: event.method().clone(),
            path_parameters,
            body,
            permissions,
            request_id: event.lambda_context_ref().map(|ctx| ctx.request_id.clone()),
        }
    }

    /// Only fetches and deletes arrive without a body.
    pub fn is_mutating(&self) -> bool {
        !(self.method == Method::GET || self.method == Method::DELETE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Option<String>,
}

impl ApiResponse {
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: None,
        }
    }

    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self {
                status: StatusCode::OK,
                body: Some(body),
            },
            Err(e) => {
                tracing::error!("Failed to serialize response: {}", e);
                Self::from_error(&ApiError::Unhandled(
                    "Unable to serialize response payload.".to_string(),
                ))
            }
        }
    }

    pub fn from_error(err: &ApiError) -> Self {
        let body = serde_json::to_string(&err.body()).unwrap_or_else(|_| {
            format!(
                r#"{{"errorMessage":"Unhandled Exception","errorCode":"{}","errors":[]}}"#,
                err.code()
            )
        });
        Self {
            status: err.status(),
            body: Some(body),
        }
    }

    pub fn into_response(self) -> Result<Response<Body>, Error> {
        let builder = Response::builder()
            .status(self.status)
            .header("Access-Control-Allow-Origin", "*");

        let resp = match self.body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(body.into())
                .map_err(Box::new)?,
            None => builder.body(Body::Empty).map_err(Box::new)?,
        };
        Ok(resp)
    }
}

/// How an operation's result becomes a response.
pub trait IntoApiResponse {
    fn into_api_response(self) -> ApiResponse;
}

/// `true` is 204 with no body; `false` is a failed request.
impl IntoApiResponse for bool {
    fn into_api_response(self) -> ApiResponse {
        if self {
            ApiResponse::no_content()
        } else {
            ApiResponse::from_error(&ApiError::Unhandled("Request failed.".to_string()))
        }
    }
}

/// Serialized into a 200 body.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoApiResponse for Json<T> {
    fn into_api_response(self) -> ApiResponse {
        ApiResponse::json(&self.0)
    }
}

/// Request type for operations that take no body.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NoBody {}

impl Validate for NoBody {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

pub struct FunctionHandler<Req, Res> {
    permission: Permission,
    config: Arc<Config>,
    cold_start: AtomicBool,
    _types: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res> FunctionHandler<Req, Res>
where
    Req: DeserializeOwned + Validate + Default,
    Res: IntoApiResponse,
{
    pub fn new(permission: Permission, config: Arc<Config>) -> Self {
        Self {
            permission,
            config,
            cold_start: AtomicBool::new(true),
            _types: PhantomData,
        }
    }

    /// Runs one invocation. Never fails: every error and panic is a response.
    pub async fn handle<F, Fut>(&self, request: ApiRequest, callback: F) -> ApiResponse
    where
        F: FnOnce(Req, PathParameters) -> Fut,
        Fut: Future<Output = Result<Res, ApiError>>,
    {
        let cold_start = self.cold_start.swap(false, Ordering::Relaxed);
        let span = tracing::info_span!(
            "request",
            function = %self.config.function_name,
            request_id = request.request_id.as_deref().unwrap_or("-"),
            cold_start,
            service = %self.config.service,
            stage = %self.config.stage,
        );

        let outcome = AssertUnwindSafe(self.process(request, callback))
            .catch_unwind()
            .instrument(span)
            .await;

        match outcome {
            Ok(response) => response,
            Err(panic) => {
                let message = panic_message(&*panic);
                tracing::error!(panic = %message, "Request panicked");
                ApiResponse::from_error(&ApiError::Unhandled(message))
            }
        }
    }

    async fn process<F, Fut>(&self, request: ApiRequest, callback: F) -> ApiResponse
    where
        F: FnOnce(Req, PathParameters) -> Fut,
        Fut: Future<Output = Result<Res, ApiError>>,
    {
        tracing::info!(
            method = %request.method,
            body = request.body.as_str(),
            "Request received"
        );

        if let Err(e) = self.permission.authorize(request.permissions.as_deref()) {
            tracing::warn!(required = %self.permission, "Permission missing from caller");
            return ApiResponse::from_error(&e);
        }

        let payload = match self.decode(&request) {
            Ok(payload) => payload,
            Err(e) => return ApiResponse::from_error(&e),
        };

        match callback(payload, request.path_parameters).await {
            Ok(result) => result.into_api_response(),
            Err(e) => {
                tracing::warn!(code = e.code(), "Request failed: {}", e);
                ApiResponse::from_error(&e)
            }
        }
    }

    fn decode(&self, request: &ApiRequest) -> Result<Req, ApiError> {
        if !request.is_mutating() {
            return Ok(Req::default());
        }

        if request.body == RequestBody::NotUtf8 {
            tracing::warn!("Request body is not UTF-8");
            return Err(ApiError::validation("Body contains invalid payload."));
        }

        let body = request.body.as_str().trim();
        if body.is_empty() {
            return Err(ApiError::validation("Body was null or empty."));
        }

        let payload: Req = serde_json::from_str(body).map_err(|e| {
            tracing::warn!("Failed to parse request body: {}", e);
            ApiError::validation("Body contains invalid payload.")
        })?;

        validate_request(&payload)?;
        Ok(payload)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
