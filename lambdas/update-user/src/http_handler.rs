use lambda_http::{Body, Error, Request, Response};
use std::sync::Arc;
use user_shared::config::Config;
use user_shared::permissions::Permission;
use user_shared::pipeline::{ApiRequest, ApiResponse, FunctionHandler};
use user_shared::types::UpdateUserRequest;
use user_shared::{users, AppState};

pub(crate) type Handler = FunctionHandler<UpdateUserRequest, bool>;

pub(crate) fn handler(config: Arc<Config>) -> Handler {
    FunctionHandler::new(Permission::UpdateUser, config)
}

/// PUT /users/{userId}
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
        .handle(request, |payload, params| {
            users::update_user(store, payload, params)
        })
        .await
}
