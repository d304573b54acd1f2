//! Progression data model: the realm ladder, skills and their nodes.
//!
//! The aggregate is a plain serde-friendly value; all rules live in the
//! engine and all storage mapping lives in the store.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Category of a trackable skill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    /// Realm-bound; completing all of a realm's gongfa drives advancement
    Gongfa,
    /// Independent pool, never gates the ladder
    SecretArt,
    /// Independent pool, never gates the ladder
    Challenge,
}

impl SkillCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillCategory::Gongfa => "gongfa",
            SkillCategory::SecretArt => "secret_art",
            SkillCategory::Challenge => "challenge",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "gongfa" => Some(SkillCategory::Gongfa),
            "secret_art" => Some(SkillCategory::SecretArt),
            "challenge" => Some(SkillCategory::Challenge),
            _ => None,
        }
    }
}

/// Addressing target for skill and node operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillSlot {
    /// Gongfa bound to the realm at this ladder index
    Realm(usize),
    SecretArt,
    Challenge,
}

impl SkillSlot {
    pub fn category(&self) -> SkillCategory {
        match self {
            SkillSlot::Realm(_) => SkillCategory::Gongfa,
            SkillSlot::SecretArt => SkillCategory::SecretArt,
            SkillSlot::Challenge => SkillCategory::Challenge,
        }
    }
}

/// Where a realm sits relative to the player's current position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealmPhase {
    /// Above the current rung; not yet reachable
    Locked,
    /// The rung being worked on
    Active,
    /// Broken through, or below the current rung
    Completed,
}

impl RealmPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RealmPhase::Locked => "locked",
            RealmPhase::Active => "active",
            RealmPhase::Completed => "completed",
        }
    }
}

/// Direction of a node toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeTransition {
    Completed,
    Reverted,
}

/// One firing of the realm advancement rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakthrough {
    /// Realm that was marked completed
    pub realm: String,
    /// Next rung entered, or None when the ladder is exhausted
    pub next_realm: Option<String>,
}

/// What a single toggle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub transition: NodeTransition,
    pub breakthrough: Option<Breakthrough>,
}

/// A trackable body of work: an ordered node list plus completion membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    /// Ordered node labels; fixed at creation apart from explicit appends
    pub nodes: Vec<String>,

    /// Labels currently checked off; always a subset of `nodes`
    #[serde(default)]
    pub completed: BTreeSet<String>,
}

impl Skill {
    pub fn new(nodes: Vec<String>) -> Self {
        Self {
            nodes,
            completed: BTreeSet::new(),
        }
    }

    /// Completion ratio in [0, 1]; 0 for an empty node list
    pub fn progress(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        self.completed.len() as f64 / self.nodes.len() as f64
    }

    /// A skill with no nodes never counts as complete
    pub fn is_complete(&self) -> bool {
        !self.nodes.is_empty() && self.completed.len() == self.nodes.len()
    }

    pub fn declares(&self, node: &str) -> bool {
        self.nodes.iter().any(|n| n == node)
    }
}

/// A rank in the main progression ladder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Realm {
    /// Unique across the ladder
    pub name: String,

    /// Once true this never reverts, regardless of later node toggles
    #[serde(default)]
    pub completed: bool,

    /// Realm-bound gongfa, keyed by name
    #[serde(default)]
    pub skills: BTreeMap<String, Skill>,
}

impl Realm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            completed: false,
            skills: BTreeMap::new(),
        }
    }

    /// Aggregate node completion ratio across all skills; 0 with no nodes
    pub fn progress(&self) -> f64 {
        let total: usize = self.skills.values().map(|s| s.nodes.len()).sum();
        if total == 0 {
            return 0.0;
        }
        let done: usize = self.skills.values().map(|s| s.completed.len()).sum();
        done as f64 / total as f64
    }

    /// True when the realm has at least one skill and every skill is complete
    pub fn all_skills_complete(&self) -> bool {
        !self.skills.is_empty() && self.skills.values().all(|s| s.is_complete())
    }
}

/// The whole progression aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionState {
    /// Ladder order; position is the realm's order index
    pub realms: Vec<Realm>,

    /// Index of the rung being worked on
    pub current_realm_index: usize,

    #[serde(default)]
    pub secret_arts: BTreeMap<String, Skill>,

    #[serde(default)]
    pub challenges: BTreeMap<String, Skill>,
}

impl ProgressionState {
    /// Fresh state with a single empty realm at the bottom of the ladder
    pub fn seeded(default_realm: &str) -> Self {
        Self {
            realms: vec![Realm::new(default_realm)],
            current_realm_index: 0,
            secret_arts: BTreeMap::new(),
            challenges: BTreeMap::new(),
        }
    }

    pub fn current_realm(&self) -> Option<&Realm> {
        self.realms.get(self.current_realm_index)
    }

    pub fn current_realm_name(&self) -> Option<&str> {
        self.current_realm().map(|r| r.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_progress() {
        let mut skill = Skill::new(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(skill.progress(), 0.0);
        assert!(!skill.is_complete());

        skill.completed.insert("a".to_string());
        assert_eq!(skill.progress(), 0.5);

        skill.completed.insert("b".to_string());
        assert_eq!(skill.progress(), 1.0);
        assert!(skill.is_complete());
    }

    #[test]
    fn test_empty_skill_never_complete() {
        let skill = Skill::new(Vec::new());
        assert_eq!(skill.progress(), 0.0);
        assert!(!skill.is_complete());
    }

    #[test]
    fn test_realm_progress_aggregates_skills() {
        let mut realm = Realm::new("Foundation");
        assert_eq!(realm.progress(), 0.0);
        assert!(!realm.all_skills_complete());

        let mut breathing = Skill::new(vec!["in".to_string(), "out".to_string()]);
        breathing.completed.insert("in".to_string());
        realm.skills.insert("Breathing".to_string(), breathing);

        let mut stance = Skill::new(vec!["root".to_string()]);
        stance.completed.insert("root".to_string());
        realm.skills.insert("Stance".to_string(), stance);

        // 2 of 3 nodes done across both skills
        assert!((realm.progress() - 2.0 / 3.0).abs() < 1e-9);
        assert!(!realm.all_skills_complete());
    }

    #[test]
    fn test_seeded_state() {
        let state = ProgressionState::seeded("Qi Refining");
        assert_eq!(state.realms.len(), 1);
        assert_eq!(state.current_realm_index, 0);
        assert_eq!(state.current_realm_name(), Some("Qi Refining"));
        assert!(state.secret_arts.is_empty());
        assert!(state.challenges.is_empty());
    }

    #[test]
    fn test_category_wire_names() {
        assert_eq!(SkillCategory::Gongfa.as_str(), "gongfa");
        assert_eq!(SkillCategory::SecretArt.as_str(), "secret_art");
        assert_eq!(SkillCategory::Challenge.as_str(), "challenge");

        assert_eq!(
            SkillCategory::from_str("secret_art"),
            Some(SkillCategory::SecretArt)
        );
        assert_eq!(SkillCategory::from_str("unknown"), None);
    }

    #[test]
    fn test_state_json_round_trip() {
        let mut state = ProgressionState::seeded("Qi Refining");
        state.realms[0]
            .skills
            .insert("Meditation".to_string(), Skill::new(vec!["Basic".to_string()]));
        state
            .secret_arts
            .insert("Sword Intent".to_string(), Skill::new(vec!["Draw".to_string()]));

        let json = serde_json::to_string(&state).unwrap();
        let parsed: ProgressionState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
