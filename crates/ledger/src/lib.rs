//! Group ledger domain module (event-sourced).
//!
//! Members and wallets, the split engine, and the balance reconciler,
//! implemented as deterministic domain logic (no IO, no HTTP, no storage).

pub mod group;
pub mod member;
pub mod split;
pub mod summary;

pub use group::{
    Account, CreateGroup, Deposit, ExpenseRecorded, FundsDeposited, Group, GroupCommand,
    GroupCreated, GroupEvent, GroupSnapshot, LedgerEntry, RecordExpense, WalletRef,
};
pub use member::{Member, MemberKind, MemberName, MemberSpec};
pub use split::{Deduction, RatioWeights, SplitStrategy, SplitType, Weight, split};
pub use summary::{
    BalanceSheet, DetailedSummary, MemberBalance, MemberSummary, PaidItem, SpentItem, balances,
    reconcile, summarize,
};
