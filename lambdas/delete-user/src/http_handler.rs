use lambda_http::{Body, Error, Request, Response};
use std::sync::Arc;
use user_shared::config::Config;
use user_shared::permissions::Permission;
use user_shared::pipeline::{ApiRequest, ApiResponse, FunctionHandler, NoBody};
use user_shared::{users, AppState};

pub(crate) type Handler = FunctionHandler<NoBody, bool>;

pub(crate) fn handler(config: Arc<Config>) -> Handler {
    FunctionHandler::new(Permission::DeleteUser, config)
}

/// DELETE /users/{userId}
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
        .handle(request, |_, params| users::delete_user(store, params))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::http::Method;
    use lambda_http::RequestExt;
    use std::collections::HashMap;
    use user_shared::keys::AlternateKey;
    use user_shared::store::{MemoryStore, UserStore};
    use user_shared::types::NewUser;

    fn setup() -> (Arc<AppState>, Arc<MemoryStore>, Arc<Handler>) {
        let config = Arc::new(Config::default());
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(config.clone(), store.clone());
        (state, store, Arc::new(handler(config)))
    }

    fn delete(user_id: &str) -> ApiRequest {
        ApiRequest::new(Method::DELETE)
            .with_permissions("read:user,delete:user")
            .with_path_parameter("userId", user_id)
    }

    #[tokio::test]
    async fn test_delete_removes_every_key() {
        let (state, store, handler) = setup();
        let user_id = store
            .create_user(NewUser {
                username: "jdoe".to_string(),
                email_address: "jdoe@example.com".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let response = handle(delete(&user_id), &state, &handler).await;
        assert_eq!(response.status, 204);
        assert_eq!(response.body, None);

        assert!(store.get_user(&user_id).await.is_err());
        assert!(store
            .get_user_by(AlternateKey::Username, "jdoe")
            .await
            .is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_user_succeeds() {
        let (state, _, handler) = setup();
        let response = handle(delete("01HZY3K8X9J2N4P6Q8R0S2T4V6"), &state, &handler).await;
        assert_eq!(response.status, 204);
    }

    #[tokio::test]
    async fn test_delete_ignores_body() {
        let (state, _, handler) = setup();
        let request = delete("01HZY3K8X9J2N4P6Q8R0S2T4V6").with_body("{ not json");
        assert_eq!(handle(request, &state, &handler).await.status, 204);
    }

    #[tokio::test]
    async fn test_lambda_request_without_authorizer() {
        let (state, _, handler) = setup();
        let mut path_parameters: HashMap<String, String> = HashMap::new();
        path_parameters.insert("userId".into(), "01HZY3K8X9J2N4P6Q8R0S2T4V6".into());

        let request = Request::default().with_path_parameters(path_parameters);

        let response = function_handler(request, state, handler).await.unwrap();
        assert_eq!(response.status(), 403);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["errorCode"], "ACCESS_DENIED");
        assert_eq!(body["errors"], serde_json::json!([]));
    }
}
