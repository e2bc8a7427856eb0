use serde::{Deserialize, Deserializer, Serialize, Serializer};

use splitfund_core::{DomainError, DomainResult, ValueObject, WalletId};

/// Longest accepted member name, in characters.
pub const MAX_NAME_LEN: usize = 64;

/// Member name, unique within a group.
///
/// Keeps the caller's spelling for display but compares, hashes and orders by
/// the trimmed, lower-cased form, so "Ann" and " ann " are the same member.
#[derive(Debug, Clone)]
pub struct MemberName {
    display: String,
    key: String,
}

impl ValueObject for MemberName {}

impl MemberName {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let display = raw.trim();
        if display.is_empty() {
            return Err(DomainError::invalid_input("member name must not be empty"));
        }
        if display.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::invalid_input(format!(
                "member name '{display}' is longer than {MAX_NAME_LEN} characters"
            )));
        }
        Ok(Self {
            display: display.to_string(),
            key: display.to_lowercase(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Case-folded lookup key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for MemberName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for MemberName {}

impl core::hash::Hash for MemberName {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for MemberName {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MemberName {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl core::fmt::Display for MemberName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.display)
    }
}

impl Serialize for MemberName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.display)
    }
}

impl<'de> Deserialize<'de> for MemberName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        MemberName::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Household kind of a member. Only affects the reported head count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MemberKind {
    Single,
    Couple,
    Family { head_count: u32 },
}

impl MemberKind {
    /// Build from the wire form (`type` tag plus optional `head_count`).
    pub fn from_parts(kind: Option<&str>, head_count: Option<i64>, name: &str) -> DomainResult<Self> {
        let tag = kind.map(|k| k.trim().to_lowercase());
        match tag.as_deref() {
            None | Some("") | Some("single") => Ok(MemberKind::Single),
            Some("couple") => Ok(MemberKind::Couple),
            Some("family") => match head_count {
                Some(n) if n >= 1 && n <= u32::MAX as i64 => Ok(MemberKind::Family {
                    head_count: n as u32,
                }),
                _ => Err(DomainError::invalid_input(format!(
                    "family member '{name}' requires a head_count of at least 1"
                ))),
            },
            Some(other) => Err(DomainError::invalid_input(format!(
                "invalid member type '{other}' for member '{name}' (expected single, couple or family)"
            ))),
        }
    }

    pub fn head_count(self) -> u32 {
        match self {
            MemberKind::Single => 1,
            MemberKind::Couple => 2,
            MemberKind::Family { head_count } => head_count,
        }
    }
}

/// Requested member of a group that is about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSpec {
    pub name: MemberName,
    pub kind: MemberKind,
}

impl MemberSpec {
    pub fn single(name: &str) -> DomainResult<Self> {
        Ok(Self {
            name: MemberName::parse(name)?,
            kind: MemberKind::Single,
        })
    }
}

/// A group member and the wallet it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: MemberName,
    pub wallet_id: WalletId,
    #[serde(flatten)]
    pub kind: MemberKind,
}
