//! Progression service: the single owned entry point for callers.
//!
//! One instance owns the in-memory aggregate and funnels every mutation
//! through the same sequence: clone, apply the engine operation, persist,
//! then swap the clone in. Validation or save failures leave both the
//! shared state and the read cache exactly as they were. Rewards are
//! dispatched only after the toggle is durably saved, and a ledger refusal
//! is reported as a warning rather than unwinding the toggle.

use crate::error::Result;
use crate::model::{Breakthrough, NodeTransition, ProgressionState, SkillSlot, ToggleOutcome};
use crate::rewards::RewardDispatcher;
use crate::store::ProgressionStore;
use std::sync::Mutex;
use tracing::info;

/// Result of a toggle as seen by callers
#[derive(Debug, Clone)]
pub struct ToggleReport {
    pub transition: NodeTransition,
    pub breakthrough: Option<Breakthrough>,
    /// Set when the reward ledger rejected the dispatch; the toggle stands
    pub ledger_warning: Option<String>,
}

pub struct ProgressionService {
    state: Mutex<ProgressionState>,
    store: ProgressionStore,
    rewards: RewardDispatcher,
}

impl ProgressionService {
    /// Build the service over an opened store, loading the persisted state
    /// or falling back to a seeded ladder
    pub fn new(store: ProgressionStore, rewards: RewardDispatcher) -> Self {
        let state = store.load_or_default();
        Self {
            state: Mutex::new(state),
            store,
            rewards,
        }
    }

    /// Clone of the current aggregate
    pub fn snapshot(&self) -> ProgressionState {
        self.state.lock().unwrap().clone()
    }

    pub fn current_realm_name(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .current_realm_name()
            .map(|n| n.to_string())
    }

    pub fn add_realm(&self, name: &str) -> Result<()> {
        self.mutate(|state| state.add_realm(name))
    }

    pub fn rename_realm(&self, index: usize, new_name: &str) -> Result<()> {
        self.mutate(|state| state.rename_realm(index, new_name))
    }

    pub fn remove_realm(&self, index: usize) -> Result<()> {
        self.mutate(|state| state.remove_realm(index))
    }

    pub fn add_skill(&self, realm_index: usize, name: &str, nodes: Vec<String>) -> Result<()> {
        self.mutate(|state| state.add_skill(realm_index, name, nodes))
    }

    pub fn remove_skill(&self, realm_index: usize, name: &str) -> Result<()> {
        self.mutate(|state| state.remove_skill(realm_index, name))
    }

    pub fn add_secret_art(&self, name: &str, nodes: Vec<String>) -> Result<()> {
        self.mutate(|state| state.add_secret_art(name, nodes))
    }

    pub fn remove_secret_art(&self, name: &str) -> Result<()> {
        self.mutate(|state| state.remove_secret_art(name))
    }

    pub fn add_challenge(&self, name: &str, nodes: Vec<String>) -> Result<()> {
        self.mutate(|state| state.add_challenge(name, nodes))
    }

    pub fn remove_challenge(&self, name: &str) -> Result<()> {
        self.mutate(|state| state.remove_challenge(name))
    }

    pub fn add_node(&self, slot: SkillSlot, skill: &str, label: &str) -> Result<()> {
        self.mutate(|state| state.add_node(slot, skill, label))
    }

    /// Toggle a node and, on a completion, dispatch its reward once the new
    /// state is saved
    pub fn toggle_node(&self, slot: SkillSlot, skill: &str, node: &str) -> Result<ToggleReport> {
        let (outcome, realm_name): (ToggleOutcome, Option<String>) = self.mutate(|state| {
            let outcome = state.toggle_node(slot, skill, node)?;
            let realm_name = match slot {
                SkillSlot::Realm(index) => Some(state.realms[index].name.clone()),
                _ => None,
            };
            Ok((outcome, realm_name))
        })?;

        if let Some(breakthrough) = &outcome.breakthrough {
            match &breakthrough.next_realm {
                Some(next) => info!("breakthrough: {} -> {}", breakthrough.realm, next),
                None => info!("reached the top of the ladder: {}", breakthrough.realm),
            }
        }

        let ledger_warning = if outcome.transition == NodeTransition::Completed {
            self.rewards
                .dispatch(slot.category(), realm_name.as_deref(), skill, node)
                .err()
                .map(|err| err.to_string())
        } else {
            None
        };

        Ok(ToggleReport {
            transition: outcome.transition,
            breakthrough: outcome.breakthrough,
            ledger_warning,
        })
    }

    /// Apply one engine operation to a draft, persist it, then swap it in.
    /// Any error on the way leaves the shared state untouched.
    fn mutate<T>(&self, op: impl FnOnce(&mut ProgressionState) -> Result<T>) -> Result<T> {
        let mut guard = self.state.lock().unwrap();
        let mut draft = guard.clone();
        let out = op(&mut draft)?;
        self.store.save(&draft)?;
        *guard = draft;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::rewards::CharacterLedger;
    use std::sync::Arc;
    use tempfile::tempdir;

    struct NullLedger;

    impl CharacterLedger for NullLedger {
        fn apply_delta(&self, _spirit: i64, _vitality: i64) -> anyhow::Result<()> {
            Ok(())
        }

        fn record_activity(
            &self,
            _name: &str,
            _category: &str,
            _spirit: i64,
            _vitality: i64,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn test_service(dir: &tempfile::TempDir) -> ProgressionService {
        let config = CoreConfig::default();
        let store =
            ProgressionStore::open(&dir.path().join("test_progression.db"), &config).unwrap();
        ProgressionService::new(store, RewardDispatcher::new(Arc::new(NullLedger)))
    }

    #[test]
    fn test_starts_from_seeded_ladder() {
        let dir = tempdir().unwrap();
        let service = test_service(&dir);
        assert_eq!(service.current_realm_name().as_deref(), Some("Qi Refining"));
        assert_eq!(service.snapshot().realms.len(), 1);
    }

    #[test]
    fn test_rejected_operation_leaves_state_untouched() {
        let dir = tempdir().unwrap();
        let service = test_service(&dir);
        service.add_realm("Foundation").unwrap();
        let before = service.snapshot();

        assert!(service.add_realm("Foundation").is_err());
        assert!(service.add_skill(1, "Early", vec!["x".to_string()]).is_err());
        assert_eq!(service.snapshot(), before);
    }

    #[test]
    fn test_toggle_report_carries_breakthrough() {
        let dir = tempdir().unwrap();
        let service = test_service(&dir);
        service.rename_realm(0, "QiRefining").unwrap();
        service
            .add_skill(0, "Meditation", vec!["Basic".to_string()])
            .unwrap();

        let report = service
            .toggle_node(SkillSlot::Realm(0), "Meditation", "Basic")
            .unwrap();
        assert_eq!(report.transition, NodeTransition::Completed);
        assert!(report.ledger_warning.is_none());
        let breakthrough = report.breakthrough.expect("single-skill realm completes");
        assert_eq!(breakthrough.realm, "QiRefining");
        assert_eq!(breakthrough.next_realm, None);
    }
}
