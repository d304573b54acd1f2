//! Progression engine: validated operations on [`ProgressionState`].
//!
//! Every operation validates first and mutates only on success; an error
//! return means the state is unchanged. Advancement happens exclusively
//! through the breakthrough check after a completion toggle on a realm
//! slot, and moves the ladder by at most one rung per call.

use crate::error::{ProgressionError, Result};
use crate::model::{
    Breakthrough, NodeTransition, ProgressionState, Realm, RealmPhase, Skill, SkillSlot,
    ToggleOutcome,
};
use std::collections::BTreeMap;

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ProgressionError::Validation(
            "name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn realm_not_found(index: usize) -> ProgressionError {
    ProgressionError::NotFound(format!("no realm at index {}", index))
}

fn skill_not_found(kind: &str, name: &str) -> ProgressionError {
    ProgressionError::NotFound(format!("no {} named '{}'", kind, name))
}

fn add_pool_skill(
    pool: &mut BTreeMap<String, Skill>,
    kind: &str,
    name: &str,
    nodes: Vec<String>,
) -> Result<()> {
    validate_name(name)?;
    if nodes.is_empty() {
        return Err(ProgressionError::Validation(format!(
            "{} '{}' needs at least one node",
            kind, name
        )));
    }
    if pool.contains_key(name) {
        return Err(ProgressionError::DuplicateName(name.to_string()));
    }
    pool.insert(name.to_string(), Skill::new(nodes));
    Ok(())
}

fn remove_pool_skill(pool: &mut BTreeMap<String, Skill>, kind: &str, name: &str) -> Result<()> {
    if pool.remove(name).is_none() {
        return Err(skill_not_found(kind, name));
    }
    Ok(())
}

impl ProgressionState {
    /// Append a new realm to the top of the ladder
    pub fn add_realm(&mut self, name: &str) -> Result<()> {
        validate_name(name)?;
        if self.realms.iter().any(|r| r.name == name) {
            return Err(ProgressionError::DuplicateName(name.to_string()));
        }
        self.realms.push(Realm::new(name));
        Ok(())
    }

    /// Rename a realm in place; renaming to the same name is a no-op
    pub fn rename_realm(&mut self, index: usize, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        let old_name = &self
            .realms
            .get(index)
            .ok_or_else(|| realm_not_found(index))?
            .name;
        if old_name == new_name {
            return Ok(());
        }
        if self.realms.iter().any(|r| r.name == new_name) {
            return Err(ProgressionError::DuplicateName(new_name.to_string()));
        }
        self.realms[index].name = new_name.to_string();
        Ok(())
    }

    /// Remove a realm and all its skills. The ladder never shrinks to zero;
    /// removing at or below the current rung shifts the player down one.
    pub fn remove_realm(&mut self, index: usize) -> Result<()> {
        if index >= self.realms.len() {
            return Err(realm_not_found(index));
        }
        if self.realms.len() == 1 {
            return Err(ProgressionError::Invariant(
                "cannot remove the last realm".to_string(),
            ));
        }
        self.realms.remove(index);
        if index <= self.current_realm_index {
            self.current_realm_index = self.current_realm_index.saturating_sub(1);
        }
        Ok(())
    }

    /// Add a gongfa skill. Only the active rung accepts new skills.
    pub fn add_skill(&mut self, realm_index: usize, name: &str, nodes: Vec<String>) -> Result<()> {
        validate_name(name)?;
        if nodes.is_empty() {
            return Err(ProgressionError::Validation(format!(
                "skill '{}' needs at least one node",
                name
            )));
        }
        let phase = self.realm_phase(realm_index)?;
        if phase != RealmPhase::Active {
            return Err(ProgressionError::Invariant(format!(
                "skills can only be added to the active realm ('{}' is {})",
                self.realms[realm_index].name,
                phase.as_str()
            )));
        }
        let realm = &mut self.realms[realm_index];
        if realm.skills.contains_key(name) {
            return Err(ProgressionError::DuplicateName(name.to_string()));
        }
        realm.skills.insert(name.to_string(), Skill::new(nodes));
        Ok(())
    }

    /// Remove a gongfa skill from any realm
    pub fn remove_skill(&mut self, realm_index: usize, name: &str) -> Result<()> {
        let realm = self
            .realms
            .get_mut(realm_index)
            .ok_or_else(|| realm_not_found(realm_index))?;
        if realm.skills.remove(name).is_none() {
            return Err(skill_not_found("skill", name));
        }
        Ok(())
    }

    pub fn add_secret_art(&mut self, name: &str, nodes: Vec<String>) -> Result<()> {
        add_pool_skill(&mut self.secret_arts, "secret art", name, nodes)
    }

    pub fn remove_secret_art(&mut self, name: &str) -> Result<()> {
        remove_pool_skill(&mut self.secret_arts, "secret art", name)
    }

    pub fn add_challenge(&mut self, name: &str, nodes: Vec<String>) -> Result<()> {
        add_pool_skill(&mut self.challenges, "challenge", name, nodes)
    }

    pub fn remove_challenge(&mut self, name: &str) -> Result<()> {
        remove_pool_skill(&mut self.challenges, "challenge", name)
    }

    /// Append a node to an existing skill. Labels are not deduplicated.
    pub fn add_node(&mut self, slot: SkillSlot, skill: &str, label: &str) -> Result<()> {
        if label.trim().is_empty() {
            return Err(ProgressionError::Validation(
                "node label must not be empty".to_string(),
            ));
        }
        let entry = self.skill_mut(slot, skill)?;
        entry.nodes.push(label.to_string());
        Ok(())
    }

    /// Flip a node between completed and not. Only nodes the skill declares
    /// can be toggled. A completion toggled through a realm slot is followed
    /// by the breakthrough check on the current rung.
    pub fn toggle_node(
        &mut self,
        slot: SkillSlot,
        skill: &str,
        node: &str,
    ) -> Result<ToggleOutcome> {
        let entry = self.skill_mut(slot, skill)?;
        if !entry.declares(node) {
            return Err(ProgressionError::NotFound(format!(
                "skill '{}' has no node '{}'",
                skill, node
            )));
        }

        let transition = if entry.completed.remove(node) {
            NodeTransition::Reverted
        } else {
            entry.completed.insert(node.to_string());
            NodeTransition::Completed
        };

        let breakthrough = match (slot, transition) {
            (SkillSlot::Realm(_), NodeTransition::Completed) => self.try_breakthrough(),
            _ => None,
        };

        Ok(ToggleOutcome {
            transition,
            breakthrough,
        })
    }

    /// Phase of the realm at `index` relative to the current rung
    pub fn realm_phase(&self, index: usize) -> Result<RealmPhase> {
        let realm = self.realms.get(index).ok_or_else(|| realm_not_found(index))?;
        let phase = if index < self.current_realm_index || realm.completed {
            RealmPhase::Completed
        } else if index == self.current_realm_index {
            RealmPhase::Active
        } else {
            RealmPhase::Locked
        };
        Ok(phase)
    }

    /// Mark the current rung completed and climb one step if every one of
    /// its skills is fully done. A realm without skills never completes.
    fn try_breakthrough(&mut self) -> Option<Breakthrough> {
        let index = self.current_realm_index;
        let ready = self
            .realms
            .get(index)
            .map(|r| r.all_skills_complete())
            .unwrap_or(false);
        if !ready {
            return None;
        }

        self.realms[index].completed = true;
        let realm = self.realms[index].name.clone();
        let next_realm = if index + 1 < self.realms.len() {
            self.current_realm_index = index + 1;
            Some(self.realms[index + 1].name.clone())
        } else {
            // Top of the ladder; the player stays here
            None
        };

        Some(Breakthrough { realm, next_realm })
    }

    fn skill_mut(&mut self, slot: SkillSlot, name: &str) -> Result<&mut Skill> {
        match slot {
            SkillSlot::Realm(index) => {
                let realm = self
                    .realms
                    .get_mut(index)
                    .ok_or_else(|| realm_not_found(index))?;
                realm
                    .skills
                    .get_mut(name)
                    .ok_or_else(|| skill_not_found("skill", name))
            }
            SkillSlot::SecretArt => self
                .secret_arts
                .get_mut(name)
                .ok_or_else(|| skill_not_found("secret art", name)),
            SkillSlot::Challenge => self
                .challenges
                .get_mut(name)
                .ok_or_else(|| skill_not_found("challenge", name)),
        }
    }
}
