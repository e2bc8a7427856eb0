use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};

use splitfund_infra::command_dispatcher::DispatchError;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub mod expense;
pub mod group;
pub mod system;
pub mod wallet;

/// Router for the ledger endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/group/create", post(group::create_group))
        .route("/group/summary/:group_id", get(group::summary))
        .route("/group/summary/detailed/:group_id", get(group::detailed_summary))
        .route("/group/:group_id", get(group::get_group))
        .route("/wallet/add", post(wallet::add_money))
        .route("/expense/split", post(expense::split_expense))
}

/// Run a ledger write on the blocking pool.
///
/// Dispatch holds a per-group mutex and may fsync the journal.
pub(crate) async fn run_blocking<T, F>(services: Arc<AppServices>, write: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppServices) -> Result<T, DispatchError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || write(&services))
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "ledger write task failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "ledger write task failed")
        })?
        .map_err(ApiError::from)
}
