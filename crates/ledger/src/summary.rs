//! Balance reconciler: read-only projections of a group ledger.
//!
//! Everything here is recomputed from the ledger entries (deposits and
//! expense deductions), never from the running wallet balances, so
//! `reconcile` can compare the two.

use std::collections::BTreeMap;

use serde::Serialize;

use splitfund_core::{DomainError, DomainResult, ExpenseId, Money, WalletId};

use crate::group::{ExpenseRecorded, Group, LedgerEntry};
use crate::member::MemberName;
use crate::split::SplitType;

/// An expense in which the member was charged a share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpentItem {
    pub expense_id: ExpenseId,
    pub payer: MemberName,
    pub category: Option<String>,
    pub split_type: SplitType,
    pub deduction: Money,
    pub total_amount: Money,
    pub participants: Vec<MemberName>,
}

/// An expense the member paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaidItem {
    pub expense_id: ExpenseId,
    pub category: Option<String>,
    pub split_type: SplitType,
    pub total_amount: Money,
    pub participants: Vec<MemberName>,
}

/// Per-member detailed summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSummary {
    pub wallet_id: WalletId,
    pub head_count: u32,
    /// Deposits recorded before the group's first expense.
    pub initial_balance_estimate: Money,
    pub total_deposited: Money,
    pub total_spent: Money,
    pub present_balance: Money,
    pub spent_where: Vec<SpentItem>,
    pub paid_for: Vec<PaidItem>,
}

/// Detailed summary keyed by member display name.
pub type DetailedSummary = BTreeMap<String, MemberSummary>;

/// One line of the short balance sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberBalance {
    pub wallet_id: WalletId,
    pub name: MemberName,
    pub balance: Money,
    pub head_count: u32,
}

/// Short summary: wallet balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSheet {
    pub members: Vec<MemberBalance>,
    pub summary: BTreeMap<String, Money>,
}

/// Project the ledger into a per-member summary.
pub fn summarize(group: &Group) -> DomainResult<DetailedSummary> {
    group.ensure_created()?;

    let mut by_key: BTreeMap<String, MemberSummary> = group
        .accounts()
        .iter()
        .map(|a| {
            (
                a.member.name.key().to_string(),
                MemberSummary {
                    wallet_id: a.member.wallet_id,
                    head_count: a.member.kind.head_count(),
                    initial_balance_estimate: Money::ZERO,
                    total_deposited: Money::ZERO,
                    total_spent: Money::ZERO,
                    present_balance: Money::ZERO,
                    spent_where: Vec::new(),
                    paid_for: Vec::new(),
                },
            )
        })
        .collect();

    let mut seen_expense = false;
    for entry in group.ledger() {
        match entry {
            LedgerEntry::Deposit(d) => {
                if let Some(s) = by_key.get_mut(d.member.key()) {
                    s.total_deposited += d.amount;
                    if !seen_expense {
                        s.initial_balance_estimate += d.amount;
                    }
                }
            }
            LedgerEntry::Expense(e) => {
                seen_expense = true;
                apply_expense(&mut by_key, e);
            }
        }
    }

    let mut out = DetailedSummary::new();
    for account in group.accounts() {
        if let Some(mut s) = by_key.remove(account.member.name.key()) {
            s.present_balance = s.total_deposited - s.total_spent;
            out.insert(account.member.name.to_string(), s);
        }
    }
    Ok(out)
}

fn apply_expense(by_key: &mut BTreeMap<String, MemberSummary>, e: &ExpenseRecorded) {
    for d in &e.deductions {
        if let Some(s) = by_key.get_mut(d.member.key()) {
            s.total_spent += d.amount;
            s.spent_where.push(SpentItem {
                expense_id: e.expense_id,
                payer: e.payer.clone(),
                category: e.category.clone(),
                split_type: e.split_type,
                deduction: d.amount,
                total_amount: e.amount,
                participants: e.participants.clone(),
            });
        }
    }

    if let Some(s) = by_key.get_mut(e.payer.key()) {
        s.paid_for.push(PaidItem {
            expense_id: e.expense_id,
            category: e.category.clone(),
            split_type: e.split_type,
            total_amount: e.amount,
            participants: e.participants.clone(),
        });
    }
}

/// Current wallet balances.
pub fn balances(group: &Group) -> DomainResult<BalanceSheet> {
    group.ensure_created()?;

    let members: Vec<MemberBalance> = group
        .accounts()
        .iter()
        .map(|a| MemberBalance {
            wallet_id: a.member.wallet_id,
            name: a.member.name.clone(),
            balance: a.balance,
            head_count: a.member.kind.head_count(),
        })
        .collect();
    let summary = members
        .iter()
        .map(|m| (m.name.to_string(), m.balance))
        .collect();

    Ok(BalanceSheet { members, summary })
}

/// Check that every expense's deductions sum to its amount and that every
/// wallet balance equals its deposits minus its deductions.
pub fn reconcile(group: &Group) -> DomainResult<()> {
    for e in group.expenses() {
        let charged: Money = e.deductions.iter().map(|d| d.amount).sum();
        if charged != e.amount {
            return Err(DomainError::invariant(format!(
                "expense {} charges {charged} for an amount of {}",
                e.expense_id, e.amount
            )));
        }
    }

    let summary = summarize(group)?;
    let mismatched: Vec<String> = group
        .accounts()
        .iter()
        .filter(|a| {
            summary
                .get(a.member.name.as_str())
                .is_none_or(|s| s.present_balance != a.balance)
        })
        .map(|a| a.member.name.to_string())
        .collect();

    if mismatched.is_empty() {
        Ok(())
    } else {
        Err(DomainError::invariant(format!(
            "wallet balances do not reconcile for: {}",
            mismatched.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use splitfund_core::{Aggregate, GroupId};

    use crate::group::{CreateGroup, Deposit, GroupCommand, RecordExpense, WalletRef};
    use crate::member::{MemberKind, MemberSpec};
    use crate::split::SplitStrategy;

    fn gid() -> GroupId {
        "flat-7".parse().unwrap()
    }

    fn exec(group: &mut Group, cmd: GroupCommand) {
        let events = group.handle(&cmd).unwrap();
        for e in &events {
            group.apply(e);
        }
    }

    fn group_with(names: &[&str]) -> Group {
        let mut group = Group::empty(gid());
        let specs = names.iter().map(|n| MemberSpec::single(n).unwrap()).collect();
        exec(&mut group, GroupCommand::CreateGroup(CreateGroup::new(gid(), specs, Utc::now())));
        group
    }

    fn deposit(group: &mut Group, name: &str, cents: i64) {
        exec(
            group,
            GroupCommand::Deposit(Deposit {
                group_id: gid(),
                target: WalletRef::Member(name.into()),
                amount: Money::from_minor(cents),
                occurred_at: Utc::now(),
            }),
        );
    }

    fn spend(group: &mut Group, payer: &str, participants: &[&str], cents: i64, category: Option<&str>) {
        exec(
            group,
            GroupCommand::RecordExpense(RecordExpense {
                group_id: gid(),
                expense_id: ExpenseId::new(),
                payer: payer.into(),
                participants: participants.iter().map(|p| p.to_string()).collect(),
                amount: Money::from_minor(cents),
                strategy: SplitStrategy::Equal,
                category: category.map(str::to_string),
                occurred_at: Utc::now(),
            }),
        );
    }

    #[test]
    fn no_expenses_means_nothing_spent_and_balance_equals_deposits() {
        let mut group = group_with(&["Ann", "Bo"]);
        deposit(&mut group, "Ann", 2000);
        deposit(&mut group, "Ann", 500);

        let summary = summarize(&group).unwrap();
        let ann = &summary["Ann"];
        assert_eq!(ann.total_spent, Money::ZERO);
        assert_eq!(ann.present_balance, Money::from_minor(2500));
        assert_eq!(ann.initial_balance_estimate, Money::from_minor(2500));
        assert_eq!(summary["Bo"].present_balance, Money::ZERO);
    }

    #[test]
    fn itemizes_spending_and_payments() {
        let mut group = group_with(&["Ann", "Bo", "Cid"]);
        deposit(&mut group, "Ann", 3000);
        deposit(&mut group, "Bo", 3000);
        spend(&mut group, "Ann", &["Ann", "Bo", "Cid"], 1000, Some("Groceries"));
        deposit(&mut group, "Bo", 700);
        spend(&mut group, "Bo", &["Bo", "Cid"], 401, None);

        let summary = summarize(&group).unwrap();

        let ann = &summary["Ann"];
        assert_eq!(ann.total_spent, Money::from_minor(334));
        assert_eq!(ann.present_balance, Money::from_minor(3000 - 334));
        assert_eq!(ann.paid_for.len(), 1);
        assert_eq!(ann.paid_for[0].category.as_deref(), Some("Groceries"));

        let bo = &summary["Bo"];
        // 401 over Bo and Cid: Bo gets the odd cent.
        assert_eq!(bo.total_spent, Money::from_minor(333 + 201));
        assert_eq!(bo.initial_balance_estimate, Money::from_minor(3000));
        assert_eq!(bo.total_deposited, Money::from_minor(3700));
        assert_eq!(bo.present_balance, Money::from_minor(3700 - 534));
        assert_eq!(bo.spent_where.len(), 2);
        assert_eq!(bo.spent_where[0].payer.as_str(), "Ann");
        assert_eq!(bo.spent_where[0].total_amount, Money::from_minor(1000));

        let cid = &summary["Cid"];
        assert_eq!(cid.present_balance, Money::from_minor(-(333 + 200)));
        assert!(cid.paid_for.is_empty());

        reconcile(&group).unwrap();
    }

    #[test]
    fn balance_sheet_lists_every_wallet() {
        let mut group = Group::empty(gid());
        exec(
            &mut group,
            GroupCommand::CreateGroup(CreateGroup::new(
                gid(),
                vec![
                    MemberSpec::single("Ann").unwrap(),
                    MemberSpec {
                        name: MemberName::parse("Bo").unwrap(),
                        kind: MemberKind::Couple,
                    },
                ],
                Utc::now(),
            )),
        );
        deposit(&mut group, "bo", 1234);

        let sheet = balances(&group).unwrap();
        assert_eq!(sheet.members.len(), 2);
        assert_eq!(sheet.members[1].head_count, 2);
        assert_eq!(sheet.summary["Bo"], Money::from_minor(1234));
        assert_eq!(sheet.summary["Ann"], Money::ZERO);
    }

    #[test]
    fn projections_of_a_missing_group_fail() {
        let group = Group::empty(gid());
        assert_eq!(summarize(&group), Err(DomainError::GroupNotFound(gid())));
        assert_eq!(balances(&group), Err(DomainError::GroupNotFound(gid())));
    }
}
