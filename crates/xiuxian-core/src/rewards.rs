//! Reward dispatch for completed nodes.
//!
//! Every completion transition pays a fixed spirit/vitality delta into the
//! character ledger through a single `record_activity` call. Reversions pay
//! nothing back; an award that has been banked stays banked.

use crate::error::{ProgressionError, Result};
use crate::model::SkillCategory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Activity category stamped on every reward entry
pub const POSITIVE_CATEGORY: &str = "positive";

/// Write side of the character sheet this core rewards into. The ledger
/// lives outside the progression core and serializes its own writers.
pub trait CharacterLedger: Send + Sync {
    /// Apply a raw spirit/vitality delta
    fn apply_delta(&self, spirit: i64, vitality: i64) -> anyhow::Result<()>;

    /// Record a named activity and apply its delta in one step
    fn record_activity(
        &self,
        name: &str,
        category: &str,
        spirit: i64,
        vitality: i64,
    ) -> anyhow::Result<()>;
}

/// Fixed spirit/vitality award for one completed node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDelta {
    pub spirit: i64,
    pub vitality: i64,
}

impl RewardDelta {
    /// Award table by skill category
    pub fn for_category(category: SkillCategory) -> Self {
        match category {
            SkillCategory::Gongfa => RewardDelta {
                spirit: 1,
                vitality: 1,
            },
            SkillCategory::SecretArt => RewardDelta {
                spirit: 2,
                vitality: 0,
            },
            SkillCategory::Challenge => RewardDelta {
                spirit: 3,
                vitality: 2,
            },
        }
    }
}

/// Sends completion rewards to the character ledger
pub struct RewardDispatcher {
    ledger: Arc<dyn CharacterLedger>,
}

impl RewardDispatcher {
    pub fn new(ledger: Arc<dyn CharacterLedger>) -> Self {
        Self { ledger }
    }

    /// Dispatch the reward for one completed node. `realm` names the realm a
    /// gongfa node belongs to and is unused for the independent pools.
    ///
    /// A ledger refusal is logged and surfaced as [`ProgressionError::Ledger`];
    /// callers treat it as a warning, never as a failed toggle.
    pub fn dispatch(
        &self,
        category: SkillCategory,
        realm: Option<&str>,
        skill: &str,
        node: &str,
    ) -> Result<()> {
        let delta = RewardDelta::for_category(category);
        let name = match category {
            SkillCategory::Gongfa => {
                let realm = realm.ok_or_else(|| {
                    ProgressionError::Invariant(
                        "gongfa reward dispatched without a realm name".to_string(),
                    )
                })?;
                format!("{}-{}-{}", realm, skill, node)
            }
            SkillCategory::SecretArt => format!("SecretArt-{}-{}", skill, node),
            SkillCategory::Challenge => format!("Challenge-{}-{}", skill, node),
        };

        debug!(
            "dispatching reward '{}' (spirit {:+}, vitality {:+})",
            name, delta.spirit, delta.vitality
        );

        self.ledger
            .record_activity(&name, POSITIVE_CATEGORY, delta.spirit, delta.vitality)
            .map_err(|err| {
                warn!("reward dispatch for '{}' failed: {}", name, err);
                ProgressionError::Ledger(err.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct RecordedActivity {
        name: String,
        category: String,
        spirit: i64,
        vitality: i64,
    }

    #[derive(Default)]
    struct RecordingLedger {
        activities: Mutex<Vec<RecordedActivity>>,
        deltas: Mutex<Vec<(i64, i64)>>,
    }

    impl CharacterLedger for RecordingLedger {
        fn apply_delta(&self, spirit: i64, vitality: i64) -> anyhow::Result<()> {
            self.deltas.lock().unwrap().push((spirit, vitality));
            Ok(())
        }

        fn record_activity(
            &self,
            name: &str,
            category: &str,
            spirit: i64,
            vitality: i64,
        ) -> anyhow::Result<()> {
            self.activities.lock().unwrap().push(RecordedActivity {
                name: name.to_string(),
                category: category.to_string(),
                spirit,
                vitality,
            });
            Ok(())
        }
    }

    struct FailingLedger;

    impl CharacterLedger for FailingLedger {
        fn apply_delta(&self, _spirit: i64, _vitality: i64) -> anyhow::Result<()> {
            anyhow::bail!("ledger offline")
        }

        fn record_activity(
            &self,
            _name: &str,
            _category: &str,
            _spirit: i64,
            _vitality: i64,
        ) -> anyhow::Result<()> {
            anyhow::bail!("ledger offline")
        }
    }

    #[test]
    fn test_reward_table() {
        assert_eq!(
            RewardDelta::for_category(SkillCategory::Gongfa),
            RewardDelta {
                spirit: 1,
                vitality: 1
            }
        );
        assert_eq!(
            RewardDelta::for_category(SkillCategory::SecretArt),
            RewardDelta {
                spirit: 2,
                vitality: 0
            }
        );
        assert_eq!(
            RewardDelta::for_category(SkillCategory::Challenge),
            RewardDelta {
                spirit: 3,
                vitality: 2
            }
        );
    }

    #[test]
    fn test_gongfa_dispatch_names_the_realm() {
        let ledger = Arc::new(RecordingLedger::default());
        let dispatcher = RewardDispatcher::new(ledger.clone());

        dispatcher
            .dispatch(
                SkillCategory::Gongfa,
                Some("QiRefining"),
                "Meditation",
                "Basic",
            )
            .unwrap();

        let activities = ledger.activities.lock().unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(
            activities[0],
            RecordedActivity {
                name: "QiRefining-Meditation-Basic".to_string(),
                category: "positive".to_string(),
                spirit: 1,
                vitality: 1,
            }
        );
    }

    #[test]
    fn test_pool_dispatch_uses_fixed_prefixes() {
        let ledger = Arc::new(RecordingLedger::default());
        let dispatcher = RewardDispatcher::new(ledger.clone());

        dispatcher
            .dispatch(SkillCategory::SecretArt, None, "Sword Intent", "Draw")
            .unwrap();
        dispatcher
            .dispatch(SkillCategory::Challenge, None, "Spirit Cave", "Depths")
            .unwrap();

        let activities = ledger.activities.lock().unwrap();
        assert_eq!(activities.len(), 2);
        assert_eq!(activities[0].name, "SecretArt-Sword Intent-Draw");
        assert_eq!(activities[0].spirit, 2);
        assert_eq!(activities[0].vitality, 0);
        assert_eq!(activities[1].name, "Challenge-Spirit Cave-Depths");
        assert_eq!(activities[1].spirit, 3);
        assert_eq!(activities[1].vitality, 2);
    }

    #[test]
    fn test_gongfa_dispatch_requires_realm_name() {
        let dispatcher = RewardDispatcher::new(Arc::new(RecordingLedger::default()));
        assert!(matches!(
            dispatcher.dispatch(SkillCategory::Gongfa, None, "Meditation", "Basic"),
            Err(ProgressionError::Invariant(_))
        ));
    }

    #[test]
    fn test_ledger_failure_becomes_ledger_error() {
        let dispatcher = RewardDispatcher::new(Arc::new(FailingLedger));
        let err = dispatcher
            .dispatch(SkillCategory::Gongfa, Some("QiRefining"), "Meditation", "Basic")
            .unwrap_err();
        assert!(matches!(err, ProgressionError::Ledger(_)));
        assert!(err.to_string().contains("ledger offline"));
    }
}
