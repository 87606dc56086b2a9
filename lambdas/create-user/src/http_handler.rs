use lambda_http::{Body, Error, Request, Response};
use std::sync::Arc;
use user_shared::config::Config;
use user_shared::permissions::Permission;
use user_shared::pipeline::{ApiRequest, ApiResponse, FunctionHandler, Json};
use user_shared::types::{CreateUserRequest, CreateUserResponse};
use user_shared::{users, AppState};

pub(crate) type Handler = FunctionHandler<CreateUserRequest, Json<CreateUserResponse>>;

pub(crate) fn handler(config: Arc<Config>) -> Handler {
    FunctionHandler::new(Permission::CreateUser, config)
}

/// POST /users
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
    handler: Arc<Handler>,
) -> Result<Response<Body>, Error> {
    handle(ApiRequest::from_lambda(&event), &state, &handler)
        .await
        .into_response()
}

async fn handle(request: ApiRequest, state: &AppState, handler: &Handler) -> ApiResponse {
    let store = state.store.as_ref();
    handler
        .handle(request, |payload, _| users::create_user(store, payload))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::http::Method;
    use user_shared::store::{MemoryStore, UserStore};
    use user_shared::types::AccountType;

    fn setup() -> (Arc<AppState>, Arc<MemoryStore>, Arc<Handler>) {
        let config = Arc::new(Config::default());
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(config.clone(), store.clone());
        (state, store, Arc::new(handler(config)))
    }

    fn post(body: &str) -> ApiRequest {
        ApiRequest::new(Method::POST)
            .with_permissions("create:user")
            .with_body(body)
    }

    fn body_json(response: &ApiResponse) -> serde_json::Value {
        serde_json::from_str(response.body.as_deref().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_minimal_create() {
        let (state, store, handler) = setup();

        let response = handle(post(r#"{"emailAddress":"a@b.com"}"#), &state, &handler).await;
        assert_eq!(response.status, 200);

        let body = body_json(&response);
        let user_id = body["userId"].as_str().unwrap();
        assert_eq!(user_id.len(), 26);
        assert_eq!(body.as_object().unwrap().len(), 1);

        let user = store.get_user(user_id).await.unwrap();
        assert_eq!(user.username, "a");
        assert_eq!(user.account_type, AccountType::Personal);
        assert_eq!(user.phone_number, None);
        assert_eq!(user.created_date, user.updated_date);
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let (state, store, handler) = setup();
        let body = r#"{"emailAddress":"jdoe@example.com","username":"jdoe"}"#;

        assert_eq!(handle(post(body), &state, &handler).await.status, 200);

        let second = handle(
            post(r#"{"emailAddress":"jdoe@example.com","username":"other"}"#),
            &state,
            &handler,
        )
        .await;
        assert_eq!(second.status, 400);
        assert_eq!(
            body_json(&second)["errorMessage"],
            "Validation Failed: User already exists with given email address: jdoe@example.com"
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_address_is_reported() {
        let (state, store, handler) = setup();
        let body = serde_json::json!({
            "emailAddress": "a@b.com",
            "primaryAddress": { "state": "Utah", "postalCode": "123" },
            "billingAddress": {},
        });

        let response = handle(post(&body.to_string()), &state, &handler).await;
        assert_eq!(response.status, 400);

        let errors: Vec<String> =
            serde_json::from_value(body_json(&response)["errors"].clone()).unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("primaryAddress.postalCode: length"));
        assert!(errors[1].starts_with("primaryAddress.state: length"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_bad_email_and_account_type() {
        let (state, _, handler) = setup();
        let body = r#"{"emailAddress":"not-an-email","accountType":"Enterprise"}"#;

        let response = handle(post(body), &state, &handler).await;
        assert_eq!(response.status, 400);
        let errors: Vec<String> =
            serde_json::from_value(body_json(&response)["errors"].clone()).unwrap();
        assert_eq!(
            errors,
            vec!["accountType: account_type", "emailAddress: email"]
        );
    }

    #[tokio::test]
    async fn test_missing_permission() {
        let (state, store, handler) = setup();
        let request = ApiRequest::new(Method::POST)
            .with_permissions("read:user")
            .with_body(r#"{"emailAddress":"a@b.com"}"#);

        let response = handle(request, &state, &handler).await;
        assert_eq!(response.status, 403);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_lambda_request_without_authorizer() {
        let (state, _, handler) = setup();

        let response = function_handler(Request::default(), state, handler)
            .await
            .unwrap();
        assert_eq!(response.status(), 403);
        assert_eq!(response.headers()["Content-Type"], "application/json");
        assert_eq!(response.headers()["Access-Control-Allow-Origin"], "*");

        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["errorCode"], "ACCESS_DENIED");
    }
}
