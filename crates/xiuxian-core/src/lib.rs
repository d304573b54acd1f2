//! Cultivation progression core: the realm ladder, its skills and nodes,
//! completion rewards, and cached SQLite persistence.
//!
//! v0.3.0: single-transaction saves, node membership validation.
//! v0.4.0: skill adds gated to the active realm, configurable ledger bounds.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod rewards;
pub mod service;
pub mod store;

pub use error::{ProgressionError, Result};
pub use model::{
    Breakthrough, NodeTransition, ProgressionState, Realm, RealmPhase, Skill, SkillCategory,
    SkillSlot, ToggleOutcome,
};
pub use rewards::{CharacterLedger, RewardDelta, RewardDispatcher};
pub use service::{ProgressionService, ToggleReport};
pub use store::{ActivityRecord, CharacterTotals, ProgressionStore, SnapshotCache, SqliteLedger};
