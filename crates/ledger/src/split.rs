//! Split engine: turns an expense amount into per-participant deductions.
//!
//! Pure and deterministic. Every successful split returns deductions that sum
//! to the input amount exactly. Shares are computed in minor units with floor
//! division; the leftover units are handed out one at a time to participants
//! in case-folded name order, which is also the order of the returned list.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use splitfund_core::{DomainError, DomainResult, Money};

use crate::member::MemberName;

/// Split strategy tag, as sent by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitType {
    Equal,
    Ratio,
}

impl SplitType {
    pub fn as_str(self) -> &'static str {
        match self {
            SplitType::Equal => "equal",
            SplitType::Ratio => "ratio",
        }
    }
}

impl core::fmt::Display for SplitType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for SplitType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "equal" => Ok(SplitType::Equal),
            "ratio" => Ok(SplitType::Ratio),
            _ => Err(DomainError::UnsupportedSplitType(s.trim().to_string())),
        }
    }
}

/// Ratio weights in either of the accepted shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum RatioWeights {
    /// One weight per participant name.
    ByMember(Vec<(MemberName, Decimal)>),
    /// Weights aligned with the participant list as the caller gave it.
    Positional(Vec<Decimal>),
}

impl RatioWeights {
    /// Build from a name → weight mapping.
    pub fn by_member<'a>(
        pairs: impl IntoIterator<Item = (&'a str, Decimal)>,
    ) -> DomainResult<Self> {
        let pairs = pairs
            .into_iter()
            .map(|(name, weight)| MemberName::parse(name).map(|n| (n, weight)))
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(RatioWeights::ByMember(pairs))
    }
}

/// A split strategy with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitStrategy {
    Equal,
    Ratio(RatioWeights),
}

impl SplitStrategy {
    /// Build a strategy from its tag and optional ratio parameters.
    ///
    /// Weights passed alongside `equal` are ignored.
    pub fn from_parts(tag: &str, ratio: Option<RatioWeights>) -> DomainResult<Self> {
        match tag.parse::<SplitType>()? {
            SplitType::Equal => Ok(SplitStrategy::Equal),
            SplitType::Ratio => ratio.map(SplitStrategy::Ratio).ok_or_else(|| {
                DomainError::invalid_input("ratio split requires a weight for every participant")
            }),
        }
    }

    pub fn split_type(&self) -> SplitType {
        match self {
            SplitStrategy::Equal => SplitType::Equal,
            SplitStrategy::Ratio(_) => SplitType::Ratio,
        }
    }
}

/// One participant's share of an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    pub member: MemberName,
    pub amount: Money,
}

/// A ratio weight resolved against a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weight {
    pub member: MemberName,
    pub weight: Decimal,
}

/// Split `amount` among `participants`.
pub fn split(
    amount: Money,
    participants: &[MemberName],
    strategy: &SplitStrategy,
) -> DomainResult<Vec<Deduction>> {
    validate(amount, participants)?;

    match strategy {
        SplitStrategy::Equal => Ok(split_equal(amount, participants)),
        SplitStrategy::Ratio(weights) => {
            let resolved = resolve_weights(participants, weights)?;
            split_ratio(amount, &resolved)
        }
    }
}

/// Pair every participant with its weight, in participant order.
pub fn resolve_weights(
    participants: &[MemberName],
    weights: &RatioWeights,
) -> DomainResult<Vec<Weight>> {
    let resolved: Vec<Weight> = match weights {
        RatioWeights::Positional(values) => {
            if values.len() != participants.len() {
                return Err(DomainError::invalid_input(format!(
                    "ratio has {} weights for {} participants",
                    values.len(),
                    participants.len()
                )));
            }
            participants
                .iter()
                .zip(values)
                .map(|(member, weight)| Weight {
                    member: member.clone(),
                    weight: *weight,
                })
                .collect()
        }
        RatioWeights::ByMember(pairs) => {
            let mut seen = HashSet::new();
            for (name, _) in pairs {
                if !seen.insert(name) {
                    return Err(DomainError::invalid_input(format!(
                        "ratio lists '{name}' more than once"
                    )));
                }
                if !participants.contains(name) {
                    return Err(DomainError::invalid_input(format!(
                        "ratio names '{name}' who is not a participant"
                    )));
                }
            }
            participants
                .iter()
                .map(|member| {
                    pairs
                        .iter()
                        .find(|(name, _)| name == member)
                        .map(|(_, weight)| Weight {
                            member: member.clone(),
                            weight: *weight,
                        })
                        .ok_or_else(|| {
                            DomainError::invalid_input(format!("ratio has no weight for '{member}'"))
                        })
                })
                .collect::<DomainResult<_>>()?
        }
    };

    if let Some(bad) = resolved.iter().find(|w| w.weight <= Decimal::ZERO) {
        return Err(DomainError::invalid_input(format!(
            "ratio weight for '{}' must be greater than zero (got {})",
            bad.member, bad.weight
        )));
    }

    Ok(resolved)
}

fn validate(amount: Money, participants: &[MemberName]) -> DomainResult<()> {
    if !amount.is_positive() {
        return Err(DomainError::invalid_input("amount must be greater than zero"));
    }
    if participants.is_empty() {
        return Err(DomainError::invalid_input("at least one participant is required"));
    }
    let mut seen = HashSet::with_capacity(participants.len());
    for p in participants {
        if !seen.insert(p) {
            return Err(DomainError::invalid_input(format!(
                "participant '{p}' is listed more than once"
            )));
        }
    }
    Ok(())
}

fn split_equal(amount: Money, participants: &[MemberName]) -> Vec<Deduction> {
    let units = i128::from(amount.minor_units());
    let count = participants.len() as i128;
    let shares = vec![units / count; participants.len()];
    finish(units, participants.iter().cloned().zip(shares).collect())
}

fn split_ratio(amount: Money, weights: &[Weight]) -> DomainResult<Vec<Deduction>> {
    let scaled = scale_weights(weights)?;
    let total = scaled
        .iter()
        .try_fold(0_i128, |acc, w| acc.checked_add(*w))
        .ok_or_else(too_precise)?;

    let units = i128::from(amount.minor_units());
    let mut shares = Vec::with_capacity(weights.len());
    for (w, scaled_weight) in weights.iter().zip(&scaled) {
        let share = units.checked_mul(*scaled_weight).ok_or_else(too_precise)? / total;
        shares.push((w.member.clone(), share));
    }

    Ok(finish(units, shares))
}

/// Bring every weight to a common integer scale, so shares divide exactly.
fn scale_weights(weights: &[Weight]) -> DomainResult<Vec<i128>> {
    let normalized: Vec<Decimal> = weights.iter().map(|w| w.weight.normalize()).collect();
    let scale = normalized.iter().map(|d| d.scale()).max().unwrap_or(0);

    normalized
        .iter()
        .map(|d| {
            10_i128
                .checked_pow(scale - d.scale())
                .and_then(|factor| d.mantissa().checked_mul(factor))
                .ok_or_else(too_precise)
        })
        .collect()
}

fn too_precise() -> DomainError {
    DomainError::invalid_input("ratio weights are too large or too precise")
}

/// Sort into the deterministic order and hand out the leftover units.
fn finish(total_units: i128, mut shares: Vec<(MemberName, i128)>) -> Vec<Deduction> {
    shares.sort_by(|a, b| a.0.cmp(&b.0));

    let assigned: i128 = shares.iter().map(|(_, s)| *s).sum();
    let mut leftover = total_units - assigned;
    debug_assert!(leftover >= 0 && leftover < shares.len() as i128);

    for (_, share) in shares.iter_mut() {
        if leftover == 0 {
            break;
        }
        *share += 1;
        leftover -= 1;
    }

    // Each share is bounded by the (i64) amount, so the narrowing cannot fail.
    shares
        .into_iter()
        .map(|(member, share)| Deduction {
            member,
            amount: Money::from_minor(share as i64),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;
    use proptest::prelude::*;

    fn names(raw: &[&str]) -> Vec<MemberName> {
        raw.iter().map(|n| MemberName::parse(n).unwrap()).collect()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn shares(deductions: &[Deduction]) -> Vec<(String, i64)> {
        deductions
            .iter()
            .map(|d| (d.member.to_string(), d.amount.minor_units()))
            .collect()
    }

    #[test]
    fn equal_split_of_ten_over_three_hands_the_extra_cent_to_the_first_name() {
        let out = split(
            Money::from_minor(1000),
            &names(&["Cid", "Ann", "Bo"]),
            &SplitStrategy::Equal,
        )
        .unwrap();
        assert_eq!(
            shares(&out),
            vec![("Ann".into(), 334), ("Bo".into(), 333), ("Cid".into(), 333)]
        );
        assert_eq!(out.iter().map(|d| d.amount).sum::<Money>(), Money::from_minor(1000));
    }

    #[test]
    fn ratio_one_one_two_over_one_hundred() {
        let strategy = SplitStrategy::Ratio(RatioWeights::Positional(vec![dec("1"), dec("1"), dec("2")]));
        let out = split(Money::from_minor(10_000), &names(&["A", "B", "C"]), &strategy).unwrap();
        assert_eq!(
            shares(&out),
            vec![("A".into(), 2500), ("B".into(), 2500), ("C".into(), 5000)]
        );
    }

    #[test]
    fn ratio_by_member_matches_names_case_insensitively() {
        let strategy = SplitStrategy::Ratio(RatioWeights::ByMember(vec![
            (MemberName::parse("bo").unwrap(), dec("1.5")),
            (MemberName::parse("ANN").unwrap(), dec("0.5")),
        ]));
        let out = split(Money::from_minor(1001), &names(&["Ann", "Bo"]), &strategy).unwrap();
        // 1001 * 0.5 / 2 = 250.25 -> 250 (+1 leftover to Ann), 1001 * 1.5 / 2 = 750.75 -> 750
        assert_eq!(shares(&out), vec![("Ann".into(), 251), ("Bo".into(), 750)]);
    }

    #[test]
    fn ratio_weight_must_be_positive() {
        let strategy = SplitStrategy::Ratio(RatioWeights::Positional(vec![dec("1"), dec("0")]));
        let err = split(Money::from_minor(100), &names(&["A", "B"]), &strategy).unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(msg) if msg.contains("greater than zero")));
    }

    #[test]
    fn ratio_must_cover_exactly_the_participants() {
        let short = SplitStrategy::Ratio(RatioWeights::Positional(vec![dec("1")]));
        assert!(split(Money::from_minor(100), &names(&["A", "B"]), &short).is_err());

        let stranger = SplitStrategy::Ratio(RatioWeights::ByMember(vec![
            (MemberName::parse("A").unwrap(), dec("1")),
            (MemberName::parse("Z").unwrap(), dec("1")),
        ]));
        assert!(split(Money::from_minor(100), &names(&["A", "B"]), &stranger).is_err());

        let missing = SplitStrategy::Ratio(RatioWeights::ByMember(vec![(
            MemberName::parse("A").unwrap(),
            dec("1"),
        )]));
        assert!(split(Money::from_minor(100), &names(&["A", "B"]), &missing).is_err());
    }

    #[test]
    fn unknown_split_type_is_unsupported() {
        let err = SplitStrategy::from_parts("percentage", None).unwrap_err();
        assert_eq!(err, DomainError::UnsupportedSplitType("percentage".into()));
        assert_eq!(SplitStrategy::from_parts(" Equal ", None).unwrap(), SplitStrategy::Equal);
    }

    #[test]
    fn ratio_without_weights_is_invalid_input() {
        assert!(matches!(
            SplitStrategy::from_parts("ratio", None),
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_non_positive_amount_empty_and_repeated_participants() {
        let p = names(&["A"]);
        assert!(split(Money::ZERO, &p, &SplitStrategy::Equal).is_err());
        assert!(split(Money::from_minor(-5), &p, &SplitStrategy::Equal).is_err());
        assert!(split(Money::from_minor(5), &[], &SplitStrategy::Equal).is_err());
        assert!(split(Money::from_minor(5), &names(&["A", "a"]), &SplitStrategy::Equal).is_err());
    }

    #[test]
    fn single_participant_takes_everything() {
        let out = split(Money::from_minor(777), &names(&["Solo"]), &SplitStrategy::Equal).unwrap();
        assert_eq!(shares(&out), vec![("Solo".into(), 777)]);
    }

    fn participant_names(n: usize) -> Vec<MemberName> {
        (0..n).map(|i| MemberName::parse(&format!("m{i:02}")).unwrap()).collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: equal shares always sum to the amount and differ by at most one unit.
        #[test]
        fn equal_split_is_exact(amount in 1i64..1_000_000_000_000i64, n in 1usize..16) {
            let out = split(Money::from_minor(amount), &participant_names(n), &SplitStrategy::Equal).unwrap();
            prop_assert_eq!(out.len(), n);
            prop_assert_eq!(out.iter().map(|d| d.amount.minor_units()).sum::<i64>(), amount);
            let max = out.iter().map(|d| d.amount.minor_units()).max().unwrap();
            let min = out.iter().map(|d| d.amount.minor_units()).min().unwrap();
            prop_assert!(max - min <= 1);
        }

        /// Property: ratio shares always sum to the amount and stay within one unit of the exact share.
        #[test]
        fn ratio_split_is_exact(
            amount in 1i64..1_000_000_000_000i64,
            raw_weights in prop::collection::vec(1u32..10_000u32, 1..12),
            scale in 0u32..4,
        ) {
            let weights: Vec<Decimal> = raw_weights.iter().map(|w| Decimal::new(i64::from(*w), scale)).collect();
            let participants = participant_names(weights.len());
            let strategy = SplitStrategy::Ratio(RatioWeights::Positional(weights.clone()));
            let out = split(Money::from_minor(amount), &participants, &strategy).unwrap();

            prop_assert_eq!(out.iter().map(|d| d.amount.minor_units()).sum::<i64>(), amount);

            let total: i128 = raw_weights.iter().map(|w| i128::from(*w)).sum();
            for (d, w) in out.iter().zip(&raw_weights) {
                let floor = i128::from(amount) * i128::from(*w) / total;
                let got = i128::from(d.amount.minor_units());
                prop_assert!(got == floor || got == floor + 1);
            }
        }
    }
}
