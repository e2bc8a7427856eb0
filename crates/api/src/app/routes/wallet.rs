use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    Json,
};

use crate::app::dto::{self, DepositResponse, MessageResponse};
use crate::app::errors::ApiError;
use crate::app::routes::run_blocking;
use crate::app::services::AppServices;

pub async fn add_money(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::DepositRequest>, JsonRejection>,
) -> Result<Json<MessageResponse<DepositResponse>>, ApiError> {
    let Json(body) = body?;
    let target = body.target()?;

    let amount = body.amount;
    let deposited = run_blocking(services, move |s| s.deposit(target, amount)).await?;
    tracing::info!(
        group_id = %deposited.group_id,
        wallet_id = %deposited.wallet_id,
        amount = %deposited.amount,
        "funds deposited"
    );

    Ok(Json(MessageResponse {
        message: "Balance added successfully!",
        data: DepositResponse {
            wallet_id: deposited.wallet_id,
            name: deposited.member,
            group_id: deposited.group_id,
            amount: deposited.amount,
            balance: deposited.balance_after,
        },
    }))
}
