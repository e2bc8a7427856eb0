use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use splitfund_core::{DomainError, ExpenseId, GroupId, Money};
use splitfund_infra::command_dispatcher::{CommandDispatcher, DispatchError};
use splitfund_infra::config::AppConfig;
use splitfund_infra::event_store::{EventStore, EventStoreError, FileEventStore, InMemoryEventStore};
use splitfund_infra::read_model::{WalletDirectory, WalletDirectoryError};
use splitfund_ledger::{
    CreateGroup, Deposit, ExpenseRecorded, FundsDeposited, Group, GroupCommand, GroupEvent, GroupSnapshot,
    MemberSpec, RecordExpense, SplitStrategy, WalletRef, reconcile,
};

use crate::app::dto::DepositTarget;

/// Aggregate type recorded on every group stream.
pub const GROUP_AGGREGATE: &str = "ledger.group";

type Dispatcher = CommandDispatcher<Arc<dyn EventStore>, Arc<WalletDirectory>>;

#[derive(Debug, Error)]
pub enum ServiceInitError {
    #[error("failed to open event journal: {0}")]
    Journal(#[from] EventStoreError),

    #[error("failed to rebuild wallet directory: {0}")]
    Directory(#[from] WalletDirectoryError),
}

/// Expense as requested by a client, before the ledger resolves names.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub group_id: GroupId,
    pub payer: String,
    pub participants: Vec<String>,
    pub amount: Money,
    pub strategy: SplitStrategy,
    pub category: Option<String>,
}

/// Ledger services shared by all handlers.
pub struct AppServices {
    dispatcher: Dispatcher,
    wallets: Arc<WalletDirectory>,
}

impl AppServices {
    /// Volatile services (tests/dev).
    pub fn in_memory() -> Self {
        let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
        let wallets = Arc::new(WalletDirectory::new());
        Self {
            dispatcher: CommandDispatcher::new(store, wallets.clone()),
            wallets,
        }
    }

    /// Services for the configured backend; a journal is replayed before
    /// the wallet directory is rebuilt from it.
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceInitError> {
        let store: Arc<dyn EventStore> = match &config.journal_path {
            Some(path) => Arc::new(FileEventStore::open(path)?),
            None => {
                tracing::warn!("no journal configured; ledger data lives in memory only");
                Arc::new(InMemoryEventStore::new())
            }
        };

        let wallets = Arc::new(WalletDirectory::new());
        wallets.rebuild(&store)?;

        Ok(Self {
            dispatcher: CommandDispatcher::new(store, wallets.clone()),
            wallets,
        })
    }

    fn dispatch(&self, group_id: &GroupId, command: GroupCommand) -> Result<(Group, Vec<GroupEvent>), DispatchError> {
        let done = self
            .dispatcher
            .dispatch(group_id, GROUP_AGGREGATE, command, Group::empty)?;
        Ok((done.aggregate, done.events))
    }

    pub fn create_group(&self, group_id: GroupId, members: Vec<MemberSpec>) -> Result<GroupSnapshot, DispatchError> {
        let cmd = GroupCommand::CreateGroup(CreateGroup::new(group_id.clone(), members, Utc::now()));
        let (group, _) = self.dispatch(&group_id, cmd)?;
        Ok(group.snapshot()?)
    }

    pub fn deposit(&self, target: DepositTarget, amount: Money) -> Result<FundsDeposited, DispatchError> {
        let (group_id, target) = match target {
            DepositTarget::Member { group_id, name } => (group_id, WalletRef::Member(name)),
            DepositTarget::Wallet(wallet_id) => {
                let group_id = self
                    .wallets
                    .group_of(wallet_id)
                    .ok_or(DomainError::WalletNotFound(wallet_id))?;
                (group_id, WalletRef::Wallet(wallet_id))
            }
        };

        let cmd = GroupCommand::Deposit(Deposit {
            group_id: group_id.clone(),
            target,
            amount,
            occurred_at: Utc::now(),
        });
        let (_, events) = self.dispatch(&group_id, cmd)?;
        events
            .into_iter()
            .find_map(|e| match e {
                GroupEvent::FundsDeposited(d) => Some(d),
                _ => None,
            })
            .ok_or_else(|| DomainError::invariant("deposit produced no FundsDeposited event").into())
    }

    pub fn record_expense(&self, expense: NewExpense) -> Result<ExpenseRecorded, DispatchError> {
        let group_id = expense.group_id.clone();
        let cmd = GroupCommand::RecordExpense(RecordExpense {
            group_id: expense.group_id,
            expense_id: ExpenseId::new(),
            payer: expense.payer,
            participants: expense.participants,
            amount: expense.amount,
            strategy: expense.strategy,
            category: expense.category,
            occurred_at: Utc::now(),
        });
        let (_, events) = self.dispatch(&group_id, cmd)?;
        events
            .into_iter()
            .find_map(|e| match e {
                GroupEvent::ExpenseRecorded(x) => Some(x),
                _ => None,
            })
            .ok_or_else(|| DomainError::invariant("expense produced no ExpenseRecorded event").into())
    }

    /// Rehydrated group; `GroupNotFound` when it was never created.
    ///
    /// Balances are reconciled against the ledger before the group is handed
    /// out, so a read never reports balances its history does not support.
    pub fn group(&self, group_id: &GroupId) -> Result<Group, DispatchError> {
        let group = self.dispatcher.load(group_id, Group::empty)?;
        group.ensure_created()?;
        if let Err(err) = reconcile(&group) {
            tracing::error!(group_id = %group_id, error = %err, "ledger does not reconcile");
            return Err(err.into());
        }
        Ok(group)
    }
}
