//! BucketService: the authorized bucket operations.
//!
//! Every operation follows the same path: look the bucket up, ask the
//! [`AccessGate`], validate into a draft copy, persist the draft, and only
//! then commit it to the in-memory registry. The registry lock is held for
//! the whole sequence, so concurrent requests against the same bucket are
//! serialized and a failed step leaves no trace.

use crate::errors::{BucketError, BucketResult};
use crate::models::action::{ActionVocabulary, BucketAction};
use crate::models::bucket::{Bucket, BucketAccess, BucketSummary, JobId};
use crate::models::permissions::ToggleEffect;
use crate::models::principal::Principal;
use crate::services::bucket_store::BucketStore;
use crate::services::gate::AccessGate;
use crate::services::identity::IdentityResolver;
use crate::services::registry::BucketRegistry;
use crate::services::settings::SettingsValidator;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of an `/access` toggle.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AccessChange {
    pub bucket: String,
    pub character: Principal,
    pub granted: Vec<BucketAction>,
    pub revoked: Vec<BucketAction>,
}

/// Result of a `/set` call.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SettingOutcome {
    pub bucket: String,
    pub setting: &'static str,
    /// Bucket field the setting writes to.
    pub field: &'static str,
    pub value: String,
}

#[derive(Clone)]
pub struct BucketService {
    registry: Arc<Mutex<BucketRegistry>>,
    store: BucketStore,
    gate: AccessGate,
    identity: Arc<dyn IdentityResolver>,
    actions: Arc<ActionVocabulary>,
    settings: Arc<SettingsValidator>,
}

impl BucketService {
    /// Build the service, rebuilding the registry from the store.
    pub async fn load(
        store: BucketStore,
        gate: AccessGate,
        identity: Arc<dyn IdentityResolver>,
        actions: Arc<ActionVocabulary>,
        settings: Arc<SettingsValidator>,
    ) -> BucketResult<Self> {
        let buckets = store.load_buckets(&actions).await?;
        let registry = BucketRegistry::from_buckets(buckets)?;
        info!("bucket registry loaded with {} buckets", registry.len());
        Ok(Self {
            registry: Arc::new(Mutex::new(registry)),
            store,
            gate,
            identity,
            actions,
            settings,
        })
    }

    pub fn store(&self) -> &BucketStore {
        &self.store
    }

    /// Resolve a caller or target name to a principal.
    pub fn resolve(&self, name: &str) -> Option<Principal> {
        self.identity.resolve(name)
    }

    /// Gate check for an operation on `name`.
    ///
    /// A missing bucket only surfaces as `NotFound` for override holders;
    /// everyone else gets the generic `Unauthorized`.
    fn authorized<'a>(
        &self,
        registry: &'a BucketRegistry,
        caller: &Principal,
        name: &str,
        action: BucketAction,
    ) -> BucketResult<&'a Bucket> {
        let bucket = registry.get(name);
        if !self.gate.authorize(caller, bucket, action) {
            warn!(caller = %caller, bucket = name, action = %action, "authorization rejected");
            return Err(BucketError::Unauthorized);
        }
        bucket.ok_or_else(|| BucketError::NotFound(name.trim().to_string()))
    }

    /// Authorize, build a draft with `edit`, persist it, then commit it.
    async fn mutate<T, F>(
        &self,
        caller: &Principal,
        name: &str,
        action: BucketAction,
        edit: F,
    ) -> BucketResult<(Bucket, T)>
    where
        F: FnOnce(&BucketRegistry, &Bucket) -> BucketResult<(Bucket, T)>,
    {
        let mut registry = self.registry.lock().await;
        let (draft, out) = {
            let bucket = self.authorized(&registry, caller, name, action)?;
            edit(&*registry, bucket)?
        };
        self.store.save_bucket(&draft).await?;
        registry.replace(draft.clone())?;
        Ok((draft, out))
    }

    /// Buckets the caller holds any grant on, or all of them for overrides.
    pub async fn list_visible(&self, caller: &Principal) -> Vec<BucketSummary> {
        let registry = self.registry.lock().await;
        registry
            .list()
            .iter()
            .filter(|b| self.gate.can_see(caller, b))
            .map(Bucket::summary)
            .collect()
    }

    pub async fn info(&self, caller: &Principal, name: &str) -> BucketResult<BucketSummary> {
        let registry = self.registry.lock().await;
        let bucket = self.authorized(&registry, caller, name, BucketAction::BucketInfo)?;
        debug!("info for bucket {}", bucket.name);
        Ok(bucket.summary())
    }

    pub async fn create(
        &self,
        caller: &Principal,
        name: &str,
        description: &str,
    ) -> BucketResult<BucketSummary> {
        let mut registry = self.registry.lock().await;
        if !self.gate.authorize(caller, None, BucketAction::BucketCreate) {
            warn!(caller = %caller, bucket = name, "bucket create rejected");
            return Err(BucketError::Unauthorized);
        }
        let bucket = registry.prepare_create(name, description, caller)?;
        self.store.save_bucket(&bucket).await?;
        let summary = bucket.summary();
        registry.insert(bucket)?;
        info!("bucket {} created by {}", summary.name, caller);
        Ok(summary)
    }

    pub async fn rename(
        &self,
        caller: &Principal,
        name: &str,
        new_name: &str,
    ) -> BucketResult<BucketSummary> {
        let (bucket, old_name) = self
            .mutate(caller, name, BucketAction::BucketRename, |registry, bucket| {
                Ok((registry.draft_rename(&bucket.name, new_name)?, bucket.name.clone()))
            })
            .await?;
        info!("bucket {} renamed to {} by {}", old_name, bucket.name, caller);
        Ok(bucket.summary())
    }

    pub async fn delete(&self, caller: &Principal, name: &str) -> BucketResult<()> {
        let mut registry = self.registry.lock().await;
        let bucket = self.authorized(&registry, caller, name, BucketAction::BucketDelete)?;
        let bucket = registry.check_delete(&bucket.name)?;
        let (id, bucket_name) = (bucket.id, bucket.name.clone());
        self.store.delete_bucket(id).await?;
        registry.delete(&bucket_name)?;
        info!("bucket {} deleted by {}", bucket_name, caller);
        Ok(())
    }

    /// Toggle `action` (or `all`) for `character` on the bucket.
    pub async fn toggle_access(
        &self,
        caller: &Principal,
        name: &str,
        action: &str,
        character: &str,
    ) -> BucketResult<AccessChange> {
        let target = self.resolve(character);
        let actions = Arc::clone(&self.actions);
        let (bucket, change) = self
            .mutate(caller, name, BucketAction::BucketAccess, |_, bucket| {
                let target =
                    target.ok_or_else(|| BucketError::PrincipalNotFound(character.to_string()))?;
                let mut draft = bucket.clone();
                let (granted, revoked) =
                    match draft.permissions.toggle(&actions, &target, action) {
                        ToggleEffect::Granted(granted) => (granted, Vec::new()),
                        ToggleEffect::Revoked(revoked) => (Vec::new(), vec![revoked]),
                        ToggleEffect::Rejected(reason) => {
                            debug!("toggle rejected: {}", reason);
                            return Err(BucketError::InvalidAction(action.trim().to_string()));
                        }
                    };
                Ok((draft, (target, granted, revoked)))
            })
            .await?;
        let (character, granted, revoked) = change;
        info!(
            "access on {} for {} changed by {}: +{:?} -{:?}",
            bucket.name, character, caller, granted, revoked
        );
        Ok(AccessChange {
            bucket: bucket.name,
            character,
            granted,
            revoked,
        })
    }

    /// Validate and store one setting. Only override holders may change
    /// settings; no per-bucket grant unlocks it.
    pub async fn set_setting(
        &self,
        caller: &Principal,
        name: &str,
        key: &str,
        value: &str,
    ) -> BucketResult<SettingOutcome> {
        if !self.gate.has_override(caller) {
            warn!(caller = %caller, bucket = name, setting = key, "setting change rejected");
            return Err(BucketError::Unauthorized);
        }
        let settings = Arc::clone(&self.settings);
        let (bucket, (setting, described)) = self
            .mutate(caller, name, BucketAction::BucketAccess, |_, bucket| {
                let setting = settings.key(key)?;
                let change = settings.validate(key, value)?;
                let described = change.describe();
                let mut draft = bucket.clone();
                change.apply(&mut draft);
                Ok((draft, (setting, described)))
            })
            .await?;
        info!(
            "bucket {}: {} set to {} by {}",
            bucket.name,
            setting.as_str(),
            described,
            caller
        );
        Ok(SettingOutcome {
            bucket: bucket.name,
            setting: setting.as_str(),
            field: setting.field(),
            value: described,
        })
    }

    /// Toggle the caller's monitor on the bucket. Returns the new state.
    pub async fn toggle_monitor(&self, caller: &Principal, name: &str) -> BucketResult<bool> {
        let (bucket, monitoring) = self
            .mutate(caller, name, BucketAction::BucketMonitor, |_, bucket| {
                let mut draft = bucket.clone();
                let monitoring = draft.toggle_monitor(caller);
                Ok((draft, monitoring))
            })
            .await?;
        debug!("{} monitoring {}: {}", caller, bucket.name, monitoring);
        Ok(monitoring)
    }

    /// Per-bucket actions held by `character`.
    ///
    /// Anyone may check themselves; checking someone else needs the override.
    pub async fn check(&self, caller: &Principal, character: &str) -> BucketResult<Vec<BucketAccess>> {
        let is_self = caller.name().eq_ignore_ascii_case(character.trim());
        if !is_self && !self.gate.authorize(caller, None, BucketAction::BucketCheck) {
            warn!(caller = %caller, target = character, "access check rejected");
            return Err(BucketError::Unauthorized);
        }
        let target = if is_self {
            caller.clone()
        } else {
            self.resolve(character)
                .ok_or_else(|| BucketError::PrincipalNotFound(character.trim().to_string()))?
        };

        let registry = self.registry.lock().await;
        Ok(registry
            .list()
            .iter()
            .filter_map(|bucket| {
                let actions = bucket.permissions.actions_for(&target);
                (!actions.is_empty()).then(|| BucketAccess {
                    bucket: bucket.name.clone(),
                    actions,
                })
            })
            .collect())
    }

    pub async fn tag_job(&self, caller: &Principal, name: &str, job: JobId) -> BucketResult<()> {
        let (bucket, ()) = self
            .mutate(caller, name, BucketAction::JobCreate, |registry, bucket| {
                Ok((registry.draft_tag(&bucket.name, job, Utc::now())?, ()))
            })
            .await?;
        info!("job {} tagged to {} by {}", job, bucket.name, caller);
        Ok(())
    }

    pub async fn untag_job(&self, caller: &Principal, name: &str, job: JobId) -> BucketResult<()> {
        let (bucket, ()) = self
            .mutate(caller, name, BucketAction::JobEdit, |registry, bucket| {
                Ok((registry.draft_untag(&bucket.name, job)?, ()))
            })
            .await?;
        info!("job {} untagged from {} by {}", job, bucket.name, caller);
        Ok(())
    }

    pub async fn resolve_job(&self, caller: &Principal, name: &str, job: JobId) -> BucketResult<()> {
        let (bucket, ()) = self
            .mutate(caller, name, BucketAction::JobComplete, |registry, bucket| {
                Ok((registry.draft_resolve(&bucket.name, job, Utc::now())?, ()))
            })
            .await?;
        info!("job {} in {} resolved by {}", job, bucket.name, caller);
        Ok(())
    }
}
