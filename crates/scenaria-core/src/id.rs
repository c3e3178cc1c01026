use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies an entity in the scenario's entity store.
    pub struct EntityId;
}

/// The kinds of names the registry keeps unique. Uniqueness is per kind:
/// an entity and a story may share a name, two stories may not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NameKind {
    Entity,
    Story,
    Act,
    Sequence,
    Maneuver,
    Event,
    Action,
    Trajectory,
}

impl NameKind {
    /// All kinds, in hierarchy order.
    pub const ALL: [NameKind; 8] = [
        NameKind::Entity,
        NameKind::Story,
        NameKind::Act,
        NameKind::Sequence,
        NameKind::Maneuver,
        NameKind::Event,
        NameKind::Action,
        NameKind::Trajectory,
    ];

    /// Storyboard elements (story down to action) share one namespace,
    /// since conditions refer to them by bare name.
    pub fn is_storyboard_element(self) -> bool {
        !matches!(self, NameKind::Entity | NameKind::Trajectory)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NameKind::Entity => "entity",
            NameKind::Story => "story",
            NameKind::Act => "act",
            NameKind::Sequence => "sequence",
            NameKind::Maneuver => "maneuver",
            NameKind::Event => "event",
            NameKind::Action => "action",
            NameKind::Trajectory => "trajectory",
        }
    }
}

impl std::fmt::Display for NameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical form of a textual kind tag: lowercase with `_`, `-` and
/// spaces removed, so `greaterThan`, `greater_than` and `GREATER-THAN`
/// all compare equal.
pub(crate) fn normalize_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_are_hashable() {
        use slotmap::SlotMap;
        use std::collections::HashMap;
        let mut sm: SlotMap<EntityId, ()> = SlotMap::with_key();
        let a = sm.insert(());
        let mut map = HashMap::new();
        map.insert(a, "Ego");
        assert_eq!(map[&a], "Ego");
    }

    #[test]
    fn kind_display_is_lowercase() {
        assert_eq!(NameKind::Maneuver.to_string(), "maneuver");
        assert_eq!(NameKind::ALL.len(), 8);
    }

    #[test]
    fn tags_normalize_across_spellings() {
        assert_eq!(normalize_tag("greaterThan"), "greaterthan");
        assert_eq!(normalize_tag("greater_than"), "greaterthan");
        assert_eq!(normalize_tag("RISING-OR-FALLING"), "risingorfalling");
    }
}
