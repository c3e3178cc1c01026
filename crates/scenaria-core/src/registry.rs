//! Name registry: uniqueness of scenario identifiers.
//!
//! Entity and trajectory names are unique within their own kind. The six
//! storyboard element kinds share a single namespace: a story and an act
//! may not both be called "Main".
//!
//! The registry is owned by a [`Scenario`](crate::scenario::Scenario), never
//! global, so independent scenarios can coexist in one process. Insertion
//! goes through [`NameRegistry::add`] (single name) or
//! [`NameRegistry::add_all`] (atomic batch used when a whole story subtree
//! is inserted at once).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{ScenarioError, ScenarioResult};
use crate::id::NameKind;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRegistry {
    names: BTreeMap<NameKind, BTreeSet<String>>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `name` is registered for `kind`.
    pub fn has(&self, kind: NameKind, name: &str) -> bool {
        self.names
            .get(&kind)
            .map(|set| set.contains(name))
            .unwrap_or(false)
    }

    /// Returns true if `name` is registered for any storyboard element kind
    /// (story, act, sequence, maneuver, event, action).
    pub fn has_element(&self, name: &str) -> bool {
        [
            NameKind::Story,
            NameKind::Act,
            NameKind::Sequence,
            NameKind::Maneuver,
            NameKind::Event,
            NameKind::Action,
        ]
        .into_iter()
        .any(|kind| self.has(kind, name))
    }

    /// Returns true if registering `name` as `kind` would collide.
    pub fn is_taken(&self, kind: NameKind, name: &str) -> bool {
        if kind.is_storyboard_element() {
            self.has_element(name)
        } else {
            self.has(kind, name)
        }
    }

    /// Register a name. Fails with `NameCollision` if it is already taken.
    pub fn add(&mut self, kind: NameKind, name: &str) -> ScenarioResult<()> {
        if self.is_taken(kind, name) {
            return Err(ScenarioError::NameCollision {
                kind,
                name: name.to_string(),
            });
        }
        self.names.entry(kind).or_default().insert(name.to_string());
        Ok(())
    }

    /// Register a batch of names atomically. Either every name is added or,
    /// on the first collision (with the registry or within the batch),
    /// none is.
    pub fn add_all(&mut self, entries: &[(NameKind, String)]) -> ScenarioResult<()> {
        let mut seen: BTreeSet<(Option<NameKind>, &str)> = BTreeSet::new();
        for (kind, name) in entries {
            // Element kinds collapse to one namespace key.
            let namespace = (!kind.is_storyboard_element()).then_some(*kind);
            if self.is_taken(*kind, name) || !seen.insert((namespace, name.as_str())) {
                return Err(ScenarioError::NameCollision {
                    kind: *kind,
                    name: name.clone(),
                });
            }
        }
        for (kind, name) in entries {
            self.names.entry(*kind).or_default().insert(name.clone());
        }
        Ok(())
    }

    /// Remove a name. Returns true if it was present.
    pub fn remove(&mut self, kind: NameKind, name: &str) -> bool {
        self.names
            .get_mut(&kind)
            .map(|set| set.remove(name))
            .unwrap_or(false)
    }

    /// Number of names registered for `kind`.
    pub fn count(&self, kind: NameKind) -> usize {
        self.names.get(&kind).map(|set| set.len()).unwrap_or(0)
    }

    /// Iterate the names registered for `kind`, sorted.
    pub fn names(&self, kind: NameKind) -> impl Iterator<Item = &str> {
        self.names
            .get(&kind)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.names.values().all(|set| set.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_registration_succeeds() {
        let mut reg = NameRegistry::new();
        reg.add(NameKind::Entity, "Ego").unwrap();
        assert!(reg.has(NameKind::Entity, "Ego"));
        assert!(!reg.has(NameKind::Story, "Ego"));
    }

    #[test]
    fn duplicate_registration_fails_and_keeps_one() {
        let mut reg = NameRegistry::new();
        reg.add(NameKind::Entity, "Ego").unwrap();
        let err = reg.add(NameKind::Entity, "Ego").unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::NameCollision {
                kind: NameKind::Entity,
                ..
            }
        ));
        assert_eq!(reg.count(NameKind::Entity), 1);
    }

    #[test]
    fn entity_and_trajectory_kinds_are_independent() {
        let mut reg = NameRegistry::new();
        reg.add(NameKind::Entity, "Loop").unwrap();
        reg.add(NameKind::Trajectory, "Loop").unwrap();
        reg.add(NameKind::Story, "Loop").unwrap();
        assert_eq!(reg.count(NameKind::Entity), 1);
        assert_eq!(reg.count(NameKind::Trajectory), 1);
        assert_eq!(reg.count(NameKind::Story), 1);
    }

    #[test]
    fn storyboard_elements_share_a_namespace() {
        let mut reg = NameRegistry::new();
        reg.add(NameKind::Story, "Main").unwrap();
        let err = reg.add(NameKind::Act, "Main").unwrap_err();
        assert_eq!(
            err,
            ScenarioError::NameCollision {
                kind: NameKind::Act,
                name: "Main".into(),
            }
        );
        assert_eq!(reg.count(NameKind::Act), 0);
    }

    #[test]
    fn batch_rejects_element_name_reused_across_kinds() {
        let mut reg = NameRegistry::new();
        let batch = vec![
            (NameKind::Story, "Main".to_string()),
            (NameKind::Act, "Main".to_string()),
        ];
        assert!(reg.add_all(&batch).is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn batch_is_atomic_on_registry_collision() {
        let mut reg = NameRegistry::new();
        reg.add(NameKind::Event, "Brake").unwrap();
        let batch = vec![
            (NameKind::Story, "S".to_string()),
            (NameKind::Event, "Brake".to_string()),
        ];
        assert!(reg.add_all(&batch).is_err());
        assert!(!reg.has(NameKind::Story, "S"));
    }

    #[test]
    fn batch_is_atomic_on_internal_collision() {
        let mut reg = NameRegistry::new();
        let batch = vec![
            (NameKind::Action, "Go".to_string()),
            (NameKind::Action, "Go".to_string()),
        ];
        assert!(reg.add_all(&batch).is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn element_lookup_spans_storyboard_kinds() {
        let mut reg = NameRegistry::new();
        reg.add(NameKind::Maneuver, "Overtake").unwrap();
        reg.add(NameKind::Entity, "Ego").unwrap();
        assert!(reg.has_element("Overtake"));
        assert!(!reg.has_element("Ego"));
    }

    #[test]
    fn remove_and_clear() {
        let mut reg = NameRegistry::new();
        reg.add(NameKind::Trajectory, "Loop").unwrap();
        assert!(reg.remove(NameKind::Trajectory, "Loop"));
        assert!(!reg.remove(NameKind::Trajectory, "Loop"));
        reg.add(NameKind::Entity, "A").unwrap();
        reg.clear();
        assert!(reg.is_empty());
    }
}
