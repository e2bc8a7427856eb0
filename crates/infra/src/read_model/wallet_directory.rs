use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use splitfund_core::{GroupId, WalletId};
use splitfund_ledger::GroupEvent;

use crate::command_dispatcher::EventSink;
use crate::event_store::{EventStore, EventStoreError, StoredEvent};

#[derive(Debug, Error)]
pub enum WalletDirectoryError {
    #[error("failed to deserialize group event: {0}")]
    Deserialize(String),

    #[error("wallet {wallet_id} is already registered to group '{group_id}'")]
    DuplicateWallet { wallet_id: WalletId, group_id: GroupId },

    #[error(transparent)]
    Store(#[from] EventStoreError),
}

/// Which group owns each wallet, so a deposit can name just a `wallet_id`.
///
/// Fed from committed `GroupCreated` events; other events are ignored.
#[derive(Debug, Default)]
pub struct WalletDirectory {
    wallets: RwLock<HashMap<WalletId, GroupId>>,
}

impl WalletDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group_of(&self, wallet_id: WalletId) -> Option<GroupId> {
        let map = self.wallets.read().ok()?;
        map.get(&wallet_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.wallets.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index one committed event.
    pub fn apply(&self, event: &StoredEvent) -> Result<(), WalletDirectoryError> {
        let decoded: GroupEvent = serde_json::from_value(event.payload.clone())
            .map_err(|e| WalletDirectoryError::Deserialize(e.to_string()))?;

        let GroupEvent::GroupCreated(created) = decoded else {
            return Ok(());
        };

        let mut map = self
            .wallets
            .write()
            .map_err(|_| WalletDirectoryError::Deserialize("lock poisoned".to_string()))?;
        for member in &created.members {
            match map.get(&member.wallet_id) {
                Some(owner) if owner != &created.group_id => {
                    return Err(WalletDirectoryError::DuplicateWallet {
                        wallet_id: member.wallet_id,
                        group_id: owner.clone(),
                    });
                }
                _ => {
                    map.insert(member.wallet_id, created.group_id.clone());
                }
            }
        }
        Ok(())
    }

    /// Drop everything and re-index every stream in `store`.
    pub fn rebuild<S: EventStore>(&self, store: &S) -> Result<(), WalletDirectoryError> {
        if let Ok(mut map) = self.wallets.write() {
            map.clear();
        }
        for group_id in store.stream_ids()? {
            for event in store.load_stream(&group_id)? {
                self.apply(&event)?;
            }
        }
        tracing::debug!(wallets = self.len(), "wallet directory rebuilt");
        Ok(())
    }
}

impl EventSink for WalletDirectory {
    type Error = WalletDirectoryError;

    fn publish(&self, event: &StoredEvent) -> Result<(), Self::Error> {
        self.apply(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use splitfund_core::{Aggregate, ExpectedVersion};
    use splitfund_ledger::{CreateGroup, Group, GroupCommand, MemberSpec};
    use uuid::Uuid;

    use crate::event_store::{InMemoryEventStore, UncommittedEvent};

    fn created_events(group: &str, names: &[&str]) -> Vec<GroupEvent> {
        let group_id: GroupId = group.parse().unwrap();
        let specs = names.iter().map(|n| MemberSpec::single(n).unwrap()).collect();
        Group::empty(group_id.clone())
            .handle(&GroupCommand::CreateGroup(CreateGroup::new(group_id, specs, Utc::now())))
            .unwrap()
    }

    fn store_with(groups: &[(&str, &[&str])]) -> InMemoryEventStore {
        let store = InMemoryEventStore::new();
        for (group, names) in groups {
            let events = created_events(group, names)
                .iter()
                .map(|e| UncommittedEvent::from_typed(group.parse().unwrap(), "ledger.group", Uuid::now_v7(), e).unwrap())
                .collect();
            store.append(events, ExpectedVersion::Exact(0)).unwrap();
        }
        store
    }

    #[test]
    fn rebuild_indexes_every_wallet() {
        let store = store_with(&[("trip", &["Ann", "Bo"][..]), ("flat", &["Cid"][..])]);
        let directory = WalletDirectory::new();
        directory.rebuild(&store).unwrap();
        assert_eq!(directory.len(), 3);

        let flat: GroupId = "flat".parse().unwrap();
        let events = store.load_stream(&flat).unwrap();
        let GroupEvent::GroupCreated(created) = serde_json::from_value::<GroupEvent>(events[0].payload.clone()).unwrap() else {
            panic!("expected GroupCreated");
        };
        assert_eq!(directory.group_of(created.members[0].wallet_id), Some(flat));
    }

    #[test]
    fn unknown_wallet_is_absent() {
        let directory = WalletDirectory::new();
        assert!(directory.is_empty());
        assert_eq!(directory.group_of(WalletId::new()), None);
    }
}
