//! Domain error model.

use thiserror::Error;

use crate::id::{GroupId, WalletId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is a deterministic business failure that the API surfaces as a
/// 4xx response. Infrastructure failures (storage, serialization) live in the
/// infra crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed, missing or out-of-range input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A group with this id already exists.
    #[error("group '{0}' already exists")]
    DuplicateGroup(GroupId),

    /// No group with this id.
    #[error("group '{0}' not found")]
    GroupNotFound(GroupId),

    /// A member (or wallet) reference did not resolve inside the group.
    #[error("member '{member}' not found in group '{group_id}'")]
    MemberNotFound {
        group_id: GroupId,
        member: String,
        /// Display names of the members that do exist, for client hints.
        existing_members: Vec<String>,
    },

    /// No group owns a wallet with this id.
    #[error("wallet {0} not found")]
    WalletNotFound(WalletId),

    /// The split strategy tag is not one the engine knows.
    #[error("unsupported split type '{0}'")]
    UnsupportedSplitType(String),

    /// The group stream moved underneath a command (optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Replayed balances did not reconcile with the recorded ledger.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn member_not_found(
        group_id: GroupId,
        member: impl Into<String>,
        existing_members: Vec<String>,
    ) -> Self {
        Self::MemberNotFound {
            group_id,
            member: member.into(),
            existing_members,
        }
    }

    /// Stable machine-readable code, used as the `error` field of API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::DuplicateGroup(_) => "duplicate_group",
            Self::GroupNotFound(_) => "group_not_found",
            Self::MemberNotFound { .. } => "member_not_found",
            Self::WalletNotFound(_) => "wallet_not_found",
            Self::UnsupportedSplitType(_) => "unsupported_split_type",
            Self::Conflict(_) => "conflict",
            Self::InvariantViolation(_) => "invariant_violation",
        }
    }
}
