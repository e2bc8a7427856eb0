use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use splitfund_core::DomainError;
use splitfund_infra::command_dispatcher::DispatchError;

/// Error body shared by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_members_in_group: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: code,
                message: message.into(),
                hint: None,
                existing_members_in_group: None,
            },
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_input", message)
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.body.hint = Some(hint.into());
        self
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let status = match &err {
            DomainError::InvalidInput(_) | DomainError::UnsupportedSplitType(_) => StatusCode::BAD_REQUEST,
            DomainError::DuplicateGroup(_) | DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::GroupNotFound(_)
            | DomainError::MemberNotFound { .. }
            | DomainError::WalletNotFound(_) => StatusCode::NOT_FOUND,
            DomainError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let api = ApiError::new(status, err.code(), err.to_string());

        match err {
            DomainError::MemberNotFound {
                group_id,
                member,
                existing_members,
            } => {
                let mut api = api.with_hint(format!("No wallet found for user '{member}' in group {group_id}"));
                api.body.existing_members_in_group = Some(existing_members);
                api
            }
            DomainError::UnsupportedSplitType(_) => api.with_hint("split_type must be one of: equal, ratio"),
            DomainError::GroupNotFound(_) => api.with_hint("create the group first with POST /group/create"),
            _ => api,
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Domain(e) => e.into(),
            other => {
                tracing::error!(error = %other, "infrastructure failure");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "store_error", other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_input(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, axum::Json(self.body)).into_response()
    }
}
