use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    Json,
};

use splitfund_ledger::ExpenseRecorded;

use crate::app::dto::{self, MessageResponse};
use crate::app::errors::ApiError;
use crate::app::routes::run_blocking;
use crate::app::services::{AppServices, NewExpense};

#[derive(Debug, serde::Serialize)]
pub struct SplitExpenseResponse {
    pub expense: ExpenseRecorded,
}

pub async fn split_expense(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::SplitExpenseRequest>, JsonRejection>,
) -> Result<Json<MessageResponse<SplitExpenseResponse>>, ApiError> {
    let Json(mut body) = body?;
    let strategy = body.strategy()?;

    let request = NewExpense {
        group_id: body.group_id,
        payer: body.payer,
        participants: body.participants.into_names(),
        amount: body.amount,
        strategy,
        category: body.category,
    };
    let expense = run_blocking(services, move |s| s.record_expense(request)).await?;
    tracing::info!(
        group_id = %expense.group_id,
        expense_id = %expense.expense_id,
        split_type = %expense.split_type,
        amount = %expense.amount,
        "expense recorded"
    );

    Ok(Json(MessageResponse {
        message: "Expense split successfully!",
        data: SplitExpenseResponse { expense },
    }))
}
