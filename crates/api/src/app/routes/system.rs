use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Service banner with the endpoint list.
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "SplitFund API is running!",
        "endpoints": {
            "create_group": "POST /group/create",
            "add_money": "POST /wallet/add",
            "split_expense": "POST /expense/split",
            "group_summary": "GET /group/summary/{group_id}",
            "group_summary_detailed": "GET /group/summary/detailed/{group_id}",
            "group_state": "GET /group/{group_id}",
            "health": "GET /health",
        }
    }))
}
