use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use splitfund_core::{DomainError, DomainResult, GroupId, Money, WalletId};
use splitfund_ledger::{MemberKind, MemberName, MemberSpec, RatioWeights, SplitStrategy};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub group_id: GroupId,
    pub members: Vec<MemberEntry>,
}

/// A member as a plain name, or with its household kind.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MemberEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(rename = "type", default)]
        kind: Option<String>,
        #[serde(default)]
        head_count: Option<LooseInt>,
    },
}

/// Integer sent either as a JSON number or as a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LooseInt {
    Int(i64),
    Str(String),
}

impl LooseInt {
    fn value(&self) -> Option<i64> {
        match self {
            LooseInt::Int(n) => Some(*n),
            LooseInt::Str(s) => s.trim().parse().ok(),
        }
    }
}

impl MemberEntry {
    pub fn into_spec(self) -> DomainResult<MemberSpec> {
        match self {
            MemberEntry::Name(name) => MemberSpec::single(&name),
            MemberEntry::Detailed {
                name,
                kind,
                head_count,
            } => {
                let name = MemberName::parse(&name)?;
                let kind = MemberKind::from_parts(
                    kind.as_deref(),
                    head_count.as_ref().and_then(LooseInt::value),
                    name.as_str(),
                )?;
                Ok(MemberSpec { name, kind })
            }
        }
    }
}

/// Deposit by `wallet_id`, or by member name within a group.
///
/// When both are present the wallet id wins.
#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    #[serde(default)]
    pub wallet_id: Option<WalletId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositTarget {
    Wallet(WalletId),
    Member { group_id: GroupId, name: String },
}

impl DepositRequest {
    pub fn target(&self) -> DomainResult<DepositTarget> {
        if let Some(wallet_id) = self.wallet_id {
            return Ok(DepositTarget::Wallet(wallet_id));
        }
        match (&self.group_id, self.name.as_deref().map(str::trim)) {
            (Some(group_id), Some(name)) if !name.is_empty() => Ok(DepositTarget::Member {
                group_id: group_id.clone(),
                name: name.to_string(),
            }),
            _ => Err(DomainError::invalid_input(
                "name and group_id required when wallet_id not provided",
            )),
        }
    }
}

/// Participants as a list or a comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Participants {
    List(Vec<String>),
    Csv(String),
}

impl Participants {
    pub fn into_names(self) -> Vec<String> {
        let raw = match self {
            Participants::List(names) => names,
            Participants::Csv(text) => text.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect()
    }
}

/// Ratio weights as a name → weight object, a list aligned with the
/// participants, or a JSON string holding either.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RatioInput {
    ByName(BTreeMap<String, Decimal>),
    Positional(Vec<Decimal>),
    Encoded(String),
}

impl RatioInput {
    pub fn into_weights(self) -> DomainResult<RatioWeights> {
        match self {
            RatioInput::ByName(map) => RatioWeights::by_member(map.iter().map(|(k, v)| (k.as_str(), *v))),
            RatioInput::Positional(list) => Ok(RatioWeights::Positional(list)),
            RatioInput::Encoded(text) => serde_json::from_str::<RatioInput>(&text)
                .ok()
                .filter(|inner| !matches!(inner, RatioInput::Encoded(_)))
                .ok_or_else(|| DomainError::invalid_input("Invalid ratio format"))?
                .into_weights(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SplitExpenseRequest {
    pub group_id: GroupId,
    pub payer: String,
    pub participants: Participants,
    pub amount: Money,
    pub split_type: String,
    #[serde(default)]
    pub ratio: Option<RatioInput>,
    #[serde(default)]
    pub category: Option<String>,
}

impl SplitExpenseRequest {
    /// Ratio parameters are only parsed for a ratio split.
    pub fn strategy(&mut self) -> DomainResult<SplitStrategy> {
        let ratio = if self.split_type.trim().eq_ignore_ascii_case("ratio") {
            self.ratio.take().map(RatioInput::into_weights).transpose()?
        } else {
            None
        };
        SplitStrategy::from_parts(&self.split_type, ratio)
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct MessageResponse<T: Serialize> {
    pub message: &'static str,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct DepositResponse {
    pub wallet_id: WalletId,
    pub name: MemberName,
    pub group_id: GroupId,
    pub amount: Money,
    pub balance: Money,
}
