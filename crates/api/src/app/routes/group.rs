use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    Json,
};

use splitfund_core::{DomainResult, GroupId};
use splitfund_ledger::{BalanceSheet, DetailedSummary, GroupSnapshot, MemberSpec, balances, summarize};

use crate::app::dto::{self, MessageResponse};
use crate::app::errors::ApiError;
use crate::app::routes::run_blocking;
use crate::app::services::AppServices;

#[derive(Debug, serde::Serialize)]
pub struct CreatedGroup {
    pub group: GroupSnapshot,
}

pub async fn create_group(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateGroupRequest>, JsonRejection>,
) -> Result<Json<MessageResponse<CreatedGroup>>, ApiError> {
    let Json(body) = body?;
    let members = body
        .members
        .into_iter()
        .map(dto::MemberEntry::into_spec)
        .collect::<DomainResult<Vec<MemberSpec>>>()?;

    let group_id = body.group_id;
    let group = run_blocking(services, move |s| s.create_group(group_id, members)).await?;
    tracing::info!(group_id = %group.group_id, members = group.members.len(), "group created");

    Ok(Json(MessageResponse {
        message: "Group created successfully!",
        data: CreatedGroup { group },
    }))
}

pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Path(group_id): Path<String>,
) -> Result<Json<BalanceSheet>, ApiError> {
    let group_id: GroupId = group_id.parse()?;
    let group = services.group(&group_id)?;
    Ok(Json(balances(&group)?))
}

pub async fn detailed_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Path(group_id): Path<String>,
) -> Result<Json<DetailedSummary>, ApiError> {
    let group_id: GroupId = group_id.parse()?;
    let group = services.group(&group_id)?;
    Ok(Json(summarize(&group)?))
}

pub async fn get_group(
    Extension(services): Extension<Arc<AppServices>>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupSnapshot>, ApiError> {
    let group_id: GroupId = group_id.parse()?;
    let group = services.group(&group_id)?;
    Ok(Json(group.snapshot()?))
}
