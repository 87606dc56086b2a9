use lambda_http::{Body, Error, Request, Response};
use std::sync::Arc;
use user_shared::config::Config;
use user_shared::permissions::Permission;
use user_shared::pipeline::{ApiRequest, ApiResponse, FunctionHandler, Json, NoBody};
use user_shared::types::User;
use user_shared::{users, AppState};

pub(crate) type Handler = FunctionHandler<NoBody, Json<User>>;

pub(crate) fn handler(config: Arc<Config>) -> Handler {
    FunctionHandler::new(Permission::ReadUser, config)
}

/// GET /users/{userId}, where userId may also be an email address or username
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
        .handle(request, |_, params| users::get_user(store, params))
        .await
}
