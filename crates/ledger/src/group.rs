use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use splitfund_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, Event, ExpenseId, GroupId, Money, WalletId,
};

use crate::member::{Member, MemberName, MemberSpec};
use crate::split::{self, Deduction, SplitStrategy, SplitType, Weight};

/// Longest accepted expense category label, in characters.
pub const MAX_CATEGORY_LEN: usize = 64;

/// Which wallet a deposit goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletRef {
    /// The wallet of the named member.
    Member(String),
    /// A wallet by id.
    Wallet(WalletId),
}

/// Command: CreateGroup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGroup {
    pub group_id: GroupId,
    pub members: Vec<Member>,
    pub occurred_at: DateTime<Utc>,
}

impl CreateGroup {
    /// Assigns a fresh wallet to every requested member.
    pub fn new(group_id: GroupId, specs: Vec<MemberSpec>, occurred_at: DateTime<Utc>) -> Self {
        let members = specs
            .into_iter()
            .map(|spec| Member {
                name: spec.name,
                wallet_id: WalletId::new(),
                kind: spec.kind,
            })
            .collect();
        Self {
            group_id,
            members,
            occurred_at,
        }
    }
}

/// Command: Deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    pub group_id: GroupId,
    pub target: WalletRef,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordExpense.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordExpense {
    pub group_id: GroupId,
    pub expense_id: ExpenseId,
    pub payer: String,
    pub participants: Vec<String>,
    pub amount: Money,
    pub strategy: SplitStrategy,
    pub category: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupCommand {
    CreateGroup(CreateGroup),
    Deposit(Deposit),
    RecordExpense(RecordExpense),
}

/// Event: GroupCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCreated {
    pub group_id: GroupId,
    pub members: Vec<Member>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FundsDeposited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsDeposited {
    pub group_id: GroupId,
    pub wallet_id: WalletId,
    pub member: MemberName,
    pub amount: Money,
    pub balance_after: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ExpenseRecorded.
///
/// Carries the computed deductions, so an expense and its deductions are
/// persisted (and replayed) as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecorded {
    pub group_id: GroupId,
    pub expense_id: ExpenseId,
    pub payer: MemberName,
    pub participants: Vec<MemberName>,
    pub amount: Money,
    pub split_type: SplitType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<Weight>>,
    pub category: Option<String>,
    pub deductions: Vec<Deduction>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupEvent {
    GroupCreated(GroupCreated),
    FundsDeposited(FundsDeposited),
    ExpenseRecorded(ExpenseRecorded),
}

impl Event for GroupEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GroupEvent::GroupCreated(_) => "ledger.group.created",
            GroupEvent::FundsDeposited(_) => "ledger.group.funds_deposited",
            GroupEvent::ExpenseRecorded(_) => "ledger.group.expense_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GroupEvent::GroupCreated(e) => e.occurred_at,
            GroupEvent::FundsDeposited(e) => e.occurred_at,
            GroupEvent::ExpenseRecorded(e) => e.occurred_at,
        }
    }
}

/// A financial entry of the group ledger, in stream order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEntry {
    Deposit(FundsDeposited),
    Expense(ExpenseRecorded),
}

/// Member wallet with its running balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    #[serde(flatten)]
    pub member: Member,
    pub balance: Money,
}

/// Aggregate root: Group (members, wallets and the append-only ledger).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    id: GroupId,
    version: u64,
    created_at: Option<DateTime<Utc>>,
    accounts: Vec<Account>,
    ledger: Vec<LedgerEntry>,
}

/// Point-in-time view of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSnapshot {
    pub group_id: GroupId,
    pub version: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub members: Vec<Account>,
    pub ledger: Vec<LedgerEntry>,
}

impl Group {
    /// Empty aggregate for rehydration.
    pub fn empty(id: GroupId) -> Self {
        Self {
            id,
            version: 0,
            created_at: None,
            accounts: Vec::new(),
            ledger: Vec::new(),
        }
    }

    pub fn is_created(&self) -> bool {
        self.created_at.is_some()
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn ledger(&self) -> &[LedgerEntry] {
        &self.ledger
    }

    pub fn deposits(&self) -> impl Iterator<Item = &FundsDeposited> {
        self.ledger.iter().filter_map(|e| match e {
            LedgerEntry::Deposit(d) => Some(d),
            LedgerEntry::Expense(_) => None,
        })
    }

    pub fn expenses(&self) -> impl Iterator<Item = &ExpenseRecorded> {
        self.ledger.iter().filter_map(|e| match e {
            LedgerEntry::Expense(x) => Some(x),
            LedgerEntry::Deposit(_) => None,
        })
    }

    pub fn account(&self, name: &MemberName) -> Option<&Account> {
        self.accounts.iter().find(|a| &a.member.name == name)
    }

    pub fn account_by_wallet(&self, wallet_id: WalletId) -> Option<&Account> {
        self.accounts.iter().find(|a| a.member.wallet_id == wallet_id)
    }

    pub fn member_names(&self) -> Vec<String> {
        self.accounts
            .iter()
            .map(|a| a.member.name.to_string())
            .collect()
    }

    /// Fails with `GroupNotFound` until the group has been created.
    pub fn ensure_created(&self) -> DomainResult<()> {
        if self.is_created() {
            Ok(())
        } else {
            Err(DomainError::GroupNotFound(self.id.clone()))
        }
    }

    pub fn snapshot(&self) -> DomainResult<GroupSnapshot> {
        self.ensure_created()?;
        Ok(GroupSnapshot {
            group_id: self.id.clone(),
            version: self.version,
            created_at: self.created_at,
            members: self.accounts.clone(),
            ledger: self.ledger.clone(),
        })
    }

    fn resolve_member(&self, raw: &str) -> DomainResult<&Account> {
        let not_found = || DomainError::member_not_found(self.id.clone(), raw.trim(), self.member_names());
        let name = MemberName::parse(raw).map_err(|_| not_found())?;
        self.account(&name).ok_or_else(not_found)
    }

    fn resolve_wallet(&self, target: &WalletRef) -> DomainResult<&Account> {
        match target {
            WalletRef::Member(raw) => self.resolve_member(raw),
            WalletRef::Wallet(wallet_id) => self
                .account_by_wallet(*wallet_id)
                .ok_or(DomainError::WalletNotFound(*wallet_id)),
        }
    }

    fn account_mut(&mut self, wallet_id: WalletId) -> Option<&mut Account> {
        self.accounts
            .iter_mut()
            .find(|a| a.member.wallet_id == wallet_id)
    }

    fn ensure_group(&self, group_id: &GroupId) -> DomainResult<()> {
        if group_id != &self.id {
            return Err(DomainError::invariant(format!(
                "command for group '{group_id}' routed to group '{}'",
                self.id
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateGroup) -> DomainResult<Vec<GroupEvent>> {
        self.ensure_group(&cmd.group_id)?;
        if self.is_created() {
            return Err(DomainError::DuplicateGroup(self.id.clone()));
        }
        if cmd.members.is_empty() {
            return Err(DomainError::invalid_input("a group needs at least one member"));
        }
        for (idx, member) in cmd.members.iter().enumerate() {
            if cmd.members[..idx].iter().any(|m| m.name == member.name) {
                return Err(DomainError::invalid_input(format!(
                    "member '{}' is listed more than once",
                    member.name
                )));
            }
        }

        Ok(vec![GroupEvent::GroupCreated(GroupCreated {
            group_id: self.id.clone(),
            members: cmd.members.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deposit(&self, cmd: &Deposit) -> DomainResult<Vec<GroupEvent>> {
        self.ensure_group(&cmd.group_id)?;
        self.ensure_created()?;
        if cmd.amount.is_negative() {
            return Err(DomainError::invalid_input("deposit amount must not be negative"));
        }

        let account = self.resolve_wallet(&cmd.target)?;
        let balance_after = account
            .balance
            .checked_add(cmd.amount)
            .ok_or_else(|| DomainError::invalid_input("wallet balance would overflow"))?;

        Ok(vec![GroupEvent::FundsDeposited(FundsDeposited {
            group_id: self.id.clone(),
            wallet_id: account.member.wallet_id,
            member: account.member.name.clone(),
            amount: cmd.amount,
            balance_after,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_expense(&self, cmd: &RecordExpense) -> DomainResult<Vec<GroupEvent>> {
        self.ensure_group(&cmd.group_id)?;
        self.ensure_created()?;
        if !cmd.amount.is_positive() {
            return Err(DomainError::invalid_input("amount must be greater than zero"));
        }
        if cmd.participants.is_empty() {
            return Err(DomainError::invalid_input("at least one participant is required"));
        }

        let payer = self.resolve_member(&cmd.payer)?.member.name.clone();
        let participants = cmd
            .participants
            .iter()
            .map(|raw| self.resolve_member(raw).map(|a| a.member.name.clone()))
            .collect::<DomainResult<Vec<_>>>()?;

        let deductions = split::split(cmd.amount, &participants, &cmd.strategy)?;
        let weights = match &cmd.strategy {
            SplitStrategy::Equal => None,
            SplitStrategy::Ratio(w) => Some(split::resolve_weights(&participants, w)?),
        };

        for d in &deductions {
            let account = self
                .account(&d.member)
                .ok_or_else(|| DomainError::invariant(format!("no wallet for '{}'", d.member)))?;
            account
                .balance
                .checked_sub(d.amount)
                .ok_or_else(|| DomainError::invalid_input("wallet balance would overflow"))?;
        }

        Ok(vec![GroupEvent::ExpenseRecorded(ExpenseRecorded {
            group_id: self.id.clone(),
            expense_id: cmd.expense_id,
            payer,
            participants,
            amount: cmd.amount,
            split_type: cmd.strategy.split_type(),
            weights,
            category: normalize_category(cmd.category.as_deref())?,
            deductions,
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn normalize_category(raw: Option<&str>) -> DomainResult<Option<String>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(c) if c.chars().count() > MAX_CATEGORY_LEN => Err(DomainError::invalid_input(format!(
            "category must be at most {MAX_CATEGORY_LEN} characters"
        ))),
        Some(c) => Ok(Some(c.to_string())),
    }
}

impl AggregateRoot for Group {
    type Id = GroupId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for Group {
    type Command = GroupCommand;
    type Event = GroupEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            GroupEvent::GroupCreated(e) => {
                self.created_at = Some(e.occurred_at);
                self.accounts = e
                    .members
                    .iter()
                    .cloned()
                    .map(|member| Account {
                        member,
                        balance: Money::ZERO,
                    })
                    .collect();
            }
            GroupEvent::FundsDeposited(e) => {
                if let Some(account) = self.account_mut(e.wallet_id) {
                    account.balance += e.amount;
                }
                self.ledger.push(LedgerEntry::Deposit(e.clone()));
            }
            GroupEvent::ExpenseRecorded(e) => {
                for d in &e.deductions {
                    if let Some(account) = self.accounts.iter_mut().find(|a| a.member.name == d.member) {
                        account.balance -= d.amount;
                    }
                }
                self.ledger.push(LedgerEntry::Expense(e.clone()));
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GroupCommand::CreateGroup(cmd) => self.handle_create(cmd),
            GroupCommand::Deposit(cmd) => self.handle_deposit(cmd),
            GroupCommand::RecordExpense(cmd) => self.handle_expense(cmd),
        }
    }
}
