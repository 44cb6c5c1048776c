//! Access-control gate.
//!
//! Every bucket operation asks [`AccessGate::authorize`] first. A principal
//! passes when it holds an override role, or when the target bucket exists
//! and grants it the requested action. Everything else is denied.

use crate::models::action::BucketAction;
use crate::models::bucket::Bucket;
use crate::models::principal::Principal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Decides whether a principal holds an administrative override.
pub trait OverridePolicy: Send + Sync {
    fn has_override(&self, principal: &Principal) -> bool;
}

/// Override granted to principals holding any of a fixed set of roles.
#[derive(Clone, Debug, Default)]
pub struct RoleOverride {
    override_roles: HashSet<String>,
    roles: HashMap<Principal, HashSet<String>>,
}

impl RoleOverride {
    pub fn new<I, S>(override_roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            override_roles: override_roles
                .into_iter()
                .map(|r| r.as_ref().to_ascii_lowercase())
                .collect(),
            roles: HashMap::new(),
        }
    }

    /// Record the roles a principal holds, replacing any previous set.
    pub fn assign<I, S>(&mut self, principal: Principal, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.roles.insert(
            principal,
            roles
                .into_iter()
                .map(|r| r.as_ref().to_ascii_lowercase())
                .collect(),
        );
    }
}

impl OverridePolicy for RoleOverride {
    fn has_override(&self, principal: &Principal) -> bool {
        self.roles
            .get(principal)
            .is_some_and(|held| held.iter().any(|r| self.override_roles.contains(r)))
    }
}

#[derive(Clone)]
pub struct AccessGate {
    policy: Arc<dyn OverridePolicy>,
}

impl AccessGate {
    pub fn new(policy: Arc<dyn OverridePolicy>) -> Self {
        Self { policy }
    }

    pub fn has_override(&self, principal: &Principal) -> bool {
        self.policy.has_override(principal)
    }

    /// Pure predicate over the override policy and the bucket's grants.
    pub fn authorize(
        &self,
        principal: &Principal,
        bucket: Option<&Bucket>,
        action: BucketAction,
    ) -> bool {
        if self.policy.has_override(principal) {
            return true;
        }
        bucket.is_some_and(|b| b.permissions.has_access(action, principal))
    }

    /// Whether a bucket shows up in `principal`'s listing.
    pub fn can_see(&self, principal: &Principal, bucket: &Bucket) -> bool {
        self.policy.has_override(principal) || bucket.permissions.has_any(principal)
    }
}
