//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    AppState, Error,
    auth::{auth_guard, post_log_in, post_log_out, register_user},
    endpoints,
    logging::logging_middleware,
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        list_transactions_endpoint, patch_transaction_endpoint, put_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::REGISTER, post(register_user))
        .route(endpoints::LOG_IN, post(post_log_in))
        .route(endpoints::LOG_OUT, post(post_log_out));

    let protected_routes = Router::new()
        .route(
            endpoints::EXPENSES,
            get(list_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::EXPENSE,
            get(get_transaction_endpoint)
                .put(put_transaction_endpoint)
                .patch(patch_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

async fn get_404_not_found() -> Response {
    Error::NotFound.into_response()
}
