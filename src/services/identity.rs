//! Character directory used to resolve free-text names to principals.

use crate::models::principal::{CharacterRecord, Principal, PrincipalKind};
use crate::services::gate::RoleOverride;
use std::collections::HashMap;

/// Resolves a name to at most one principal.
///
/// Unknown names and entries that are not characters both resolve to `None`.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Principal>;
}

/// In-memory snapshot of the `characters` table.
#[derive(Clone, Debug, Default)]
pub struct CharacterDirectory {
    records: HashMap<String, CharacterRecord>,
}

impl CharacterDirectory {
    pub fn new(records: impl IntoIterator<Item = CharacterRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.name.to_lowercase(), r))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Build the override policy from the roles recorded for each character.
    pub fn role_override(&self, override_roles: &[String]) -> RoleOverride {
        let mut policy = RoleOverride::new(override_roles);
        for record in self.records.values() {
            if record.kind() == Some(PrincipalKind::Character) {
                policy.assign(Principal::new(record.name.clone()), record.role_list());
            }
        }
        policy
    }
}

impl IdentityResolver for CharacterDirectory {
    fn resolve(&self, name: &str) -> Option<Principal> {
        let record = self.records.get(&name.trim().to_lowercase())?;
        match record.kind() {
            Some(PrincipalKind::Character) => Some(Principal::new(record.name.clone())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gate::OverridePolicy;

    fn record(name: &str, kind: &str, roles: &str) -> CharacterRecord {
        CharacterRecord {
            name: name.into(),
            kind: kind.into(),
            roles: roles.into(),
        }
    }

    #[test]
    fn resolves_characters_only() {
        let dir = CharacterDirectory::new([
            record("Alice", "character", ""),
            record("Lobby", "object", ""),
        ]);
        assert_eq!(dir.resolve("alice"), Some(Principal::new("Alice")));
        assert_eq!(dir.resolve("Lobby"), None);
        assert_eq!(dir.resolve("Nobody"), None);
    }

    #[test]
    fn override_roles_come_from_records() {
        let dir = CharacterDirectory::new([
            record("Wiz", "character", "Builder, Admin"),
            record("Alice", "character", "Player"),
            record("Root", "account", "Admin"),
        ]);
        let policy = dir.role_override(&["Admin".to_string(), "BucketCreator".to_string()]);
        assert!(policy.has_override(&Principal::new("Wiz")));
        assert!(!policy.has_override(&Principal::new("Alice")));
        assert!(!policy.has_override(&Principal::new("Root")));
    }
}
