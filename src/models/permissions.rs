//! Per-bucket permission store: principal → granted actions.
//!
//! Grants are toggles. Asking for an action a principal already holds
//! removes it, except for `all`, which always grants the full vocabulary.

use crate::models::action::{ActionRequest, ActionVocabulary, BucketAction};
use crate::models::principal::Principal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Outcome of a toggle request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToggleEffect {
    /// The listed actions were granted.
    Granted(Vec<BucketAction>),
    /// The action was held and has been removed.
    Revoked(BucketAction),
    /// Nothing changed; the requested name is not an action.
    Rejected(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Permissions {
    grants: BTreeMap<Principal, BTreeSet<BucketAction>>,
}

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_access(&self, action: BucketAction, principal: &Principal) -> bool {
        self.grants
            .get(principal)
            .is_some_and(|actions| actions.contains(&action))
    }

    /// True if the principal holds at least one action on this bucket.
    pub fn has_any(&self, principal: &Principal) -> bool {
        self.grants
            .get(principal)
            .is_some_and(|actions| !actions.is_empty())
    }

    pub fn grant(&mut self, principal: &Principal, actions: &[BucketAction]) {
        if actions.is_empty() {
            return;
        }
        self.grants
            .entry(principal.clone())
            .or_default()
            .extend(actions.iter().copied());
    }

    /// Grant a parsed request; `All` expands to the whole vocabulary.
    pub fn grant_request(
        &mut self,
        vocab: &ActionVocabulary,
        principal: &Principal,
        request: ActionRequest,
    ) -> Vec<BucketAction> {
        let actions = match request {
            ActionRequest::All => vocab.actions().to_vec(),
            ActionRequest::One(action) => vec![action],
        };
        self.grant(principal, &actions);
        actions
    }

    /// Remove one action. Returns whether it was held.
    pub fn revoke(&mut self, principal: &Principal, action: BucketAction) -> bool {
        let Some(actions) = self.grants.get_mut(principal) else {
            return false;
        };
        let removed = actions.remove(&action);
        if actions.is_empty() {
            self.grants.remove(principal);
        }
        removed
    }

    pub fn toggle(
        &mut self,
        vocab: &ActionVocabulary,
        principal: &Principal,
        requested: &str,
    ) -> ToggleEffect {
        match vocab.parse_request(requested) {
            Some(ActionRequest::One(action)) if self.has_access(action, principal) => {
                self.revoke(principal, action);
                ToggleEffect::Revoked(action)
            }
            Some(request) => ToggleEffect::Granted(self.grant_request(vocab, principal, request)),
            None => ToggleEffect::Rejected(format!(
                "`{}` is not a valid bucket action",
                requested.trim()
            )),
        }
    }

    /// Actions held by `principal`, in vocabulary order.
    pub fn actions_for(&self, principal: &Principal) -> Vec<BucketAction> {
        self.grants
            .get(principal)
            .map(|actions| actions.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn principals(&self) -> impl Iterator<Item = &Principal> {
        self.grants.keys()
    }

    /// Flattened (principal, action) pairs, used by the store.
    pub fn entries(&self) -> impl Iterator<Item = (&Principal, BucketAction)> {
        self.grants
            .iter()
            .flat_map(|(principal, actions)| actions.iter().map(move |a| (principal, *a)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn alice() -> Principal {
        Principal::new("Alice")
    }

    #[test]
    fn toggle_twice_restores_empty_state() {
        let vocab = ActionVocabulary::standard();
        let mut perms = Permissions::new();

        let first = perms.toggle(&vocab, &alice(), "bucket_info");
        assert_eq!(first, ToggleEffect::Granted(vec![BucketAction::BucketInfo]));
        assert!(perms.has_access(BucketAction::BucketInfo, &alice()));

        let second = perms.toggle(&vocab, &alice(), "bucket_info");
        assert_eq!(second, ToggleEffect::Revoked(BucketAction::BucketInfo));
        assert_eq!(perms, Permissions::new());
    }

    #[test]
    fn all_grants_full_set_and_never_toggles_off() {
        let vocab = ActionVocabulary::standard();
        let mut perms = Permissions::new();
        perms.grant(&alice(), &[BucketAction::JobMail]);

        for _ in 0..2 {
            let effect = perms.toggle(&vocab, &alice(), "all");
            assert_eq!(effect, ToggleEffect::Granted(BucketAction::ALL.to_vec()));
            assert_eq!(perms.actions_for(&alice()), BucketAction::ALL.to_vec());
        }
    }

    #[test]
    fn unknown_action_is_rejected_without_mutation() {
        let vocab = ActionVocabulary::standard();
        let mut perms = Permissions::new();
        perms.grant(&alice(), &[BucketAction::BucketInfo]);
        let before = perms.clone();

        let effect = perms.toggle(&vocab, &alice(), "bucket_explode");
        assert!(matches!(effect, ToggleEffect::Rejected(_)));
        assert_eq!(perms, before);
    }

    #[test]
    fn actions_are_listed_in_vocabulary_order() {
        let mut perms = Permissions::new();
        perms.grant(
            &alice(),
            &[BucketAction::JobLog, BucketAction::BucketAccess, BucketAction::BucketInfo],
        );
        assert_eq!(
            perms.actions_for(&alice()),
            vec![
                BucketAction::BucketAccess,
                BucketAction::BucketInfo,
                BucketAction::JobLog
            ]
        );
        assert!(perms.actions_for(&Principal::new("Bob")).is_empty());
    }

    #[test]
    fn revoking_last_action_forgets_principal() {
        let mut perms = Permissions::new();
        perms.grant(&alice(), &[BucketAction::BucketRename]);
        assert!(perms.has_any(&alice()));
        assert!(perms.revoke(&alice(), BucketAction::BucketRename));
        assert!(!perms.has_any(&alice()));
        assert_eq!(perms.principals().count(), 0);
        assert!(!perms.revoke(&alice(), BucketAction::BucketRename));
    }

    proptest! {
        #[test]
        fn double_toggle_is_identity(start in proptest::collection::vec(0usize..16, 0..8), pick in 0usize..16) {
            let vocab = ActionVocabulary::standard();
            let mut perms = Permissions::new();
            let initial: Vec<BucketAction> = start.iter().map(|i| BucketAction::ALL[*i]).collect();
            perms.grant(&alice(), &initial);
            let before = perms.clone();

            let name = BucketAction::ALL[pick].as_str();
            perms.toggle(&vocab, &alice(), name);
            perms.toggle(&vocab, &alice(), name);
            prop_assert_eq!(perms, before);
        }
    }
}
