//! Bucket registry: the set of live buckets, indexed by name.
//!
//! Names are unique and compared case-insensitively. Buckets keep insertion
//! order for display. The registry also keeps a job → bucket index so a job
//! is never tagged to two buckets at once.

use crate::errors::{BucketError, BucketResult};
use crate::models::bucket::{Bucket, JobId, JobRecord};
use crate::models::principal::Principal;
use crate::services::settings::validate_description;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct BucketRegistry {
    buckets: Vec<Bucket>,
    index: HashMap<String, Uuid>,
    job_index: HashMap<JobId, Uuid>,
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl BucketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from stored buckets, kept in the given order.
    pub fn from_buckets(buckets: Vec<Bucket>) -> BucketResult<Self> {
        let mut registry = Self::new();
        for bucket in buckets {
            registry.insert(bucket)?;
        }
        Ok(registry)
    }

    /// Validate a new bucket without inserting it.
    pub fn prepare_create(
        &self,
        name: &str,
        description: &str,
        creator: &Principal,
    ) -> BucketResult<Bucket> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BucketError::invalid_value("name", "a bucket name must not be empty"));
        }
        if self.index.contains_key(&name_key(name)) {
            return Err(BucketError::AlreadyExists(name.to_string()));
        }
        if description.trim().is_empty() {
            return Err(BucketError::MissingDescription);
        }
        let description = validate_description(description)?;
        Ok(Bucket::new(name, description, creator.clone()))
    }

    /// Insert a fully built bucket. Fails if its name or any of its jobs clash.
    pub fn insert(&mut self, bucket: Bucket) -> BucketResult<()> {
        let key = name_key(&bucket.name);
        if self.index.contains_key(&key) {
            return Err(BucketError::AlreadyExists(bucket.name.clone()));
        }
        if let Some(job) = bucket.jobs.keys().find(|j| self.job_index.contains_key(*j)) {
            return Err(BucketError::JobAlreadyTagged {
                job: *job,
                bucket: self.owner_name(*job).unwrap_or_default(),
            });
        }
        for job in bucket.jobs.keys() {
            self.job_index.insert(*job, bucket.id);
        }
        self.index.insert(key, bucket.id);
        self.buckets.push(bucket);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Bucket> {
        let id = self.index.get(&name_key(name))?;
        self.by_id(*id)
    }

    pub fn lookup(&self, name: &str) -> BucketResult<&Bucket> {
        self.get(name)
            .ok_or_else(|| BucketError::NotFound(name.trim().to_string()))
    }

    fn by_id(&self, id: Uuid) -> Option<&Bucket> {
        self.buckets.iter().find(|b| b.id == id)
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.buckets.iter().position(|b| b.id == id)
    }

    fn owner_name(&self, job: JobId) -> Option<String> {
        let id = self.job_index.get(&job)?;
        self.by_id(*id).map(|b| b.name.clone())
    }

    /// All buckets in insertion order.
    pub fn list(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn has_jobs(&self, name: &str) -> BucketResult<bool> {
        self.lookup(name).map(Bucket::has_jobs)
    }

    /// Copy of `name` renamed to `new_name`. A case change of the bucket's
    /// own name is allowed. Nothing is committed.
    pub fn draft_rename(&self, name: &str, new_name: &str) -> BucketResult<Bucket> {
        let bucket = self.lookup(name)?;
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(BucketError::invalid_value("name", "a bucket name must not be empty"));
        }
        if let Some(other) = self.index.get(&name_key(new_name)) {
            if *other != bucket.id {
                return Err(BucketError::NameCollision(new_name.to_string()));
            }
        }
        let mut draft = bucket.clone();
        draft.name = new_name.to_string();
        Ok(draft)
    }

    /// Commit a modified copy of an existing bucket, matched by id.
    ///
    /// Re-keys the name index when the name changed and keeps the job index
    /// in step with the bucket's job set.
    pub fn replace(&mut self, bucket: Bucket) -> BucketResult<()> {
        let pos = self
            .position(bucket.id)
            .ok_or_else(|| BucketError::NotFound(bucket.name.clone()))?;
        let new_key = name_key(&bucket.name);
        if let Some(other) = self.index.get(&new_key) {
            if *other != bucket.id {
                return Err(BucketError::NameCollision(bucket.name.clone()));
            }
        }
        if let Some(job) = bucket.jobs.keys().find(|j| {
            self.job_index
                .get(*j)
                .is_some_and(|owner| *owner != bucket.id)
        }) {
            return Err(BucketError::JobAlreadyTagged {
                job: *job,
                bucket: self.owner_name(*job).unwrap_or_default(),
            });
        }

        let old = &self.buckets[pos];
        let old_key = name_key(&old.name);
        let stale_jobs: Vec<JobId> = old
            .jobs
            .keys()
            .filter(|j| !bucket.jobs.contains_key(*j))
            .copied()
            .collect();

        for job in stale_jobs {
            self.job_index.remove(&job);
        }
        for job in bucket.jobs.keys() {
            self.job_index.insert(*job, bucket.id);
        }
        if old_key != new_key {
            self.index.remove(&old_key);
            self.index.insert(new_key, bucket.id);
        }
        self.buckets[pos] = bucket;
        Ok(())
    }

    /// Check that the bucket exists and holds no jobs.
    pub fn check_delete(&self, name: &str) -> BucketResult<&Bucket> {
        let bucket = self.lookup(name)?;
        if bucket.has_jobs() {
            return Err(BucketError::NotEmpty(bucket.name.clone()));
        }
        Ok(bucket)
    }

    pub fn delete(&mut self, name: &str) -> BucketResult<Bucket> {
        let id = self.check_delete(name)?.id;
        let pos = self
            .position(id)
            .ok_or_else(|| BucketError::NotFound(name.to_string()))?;
        let bucket = self.buckets.remove(pos);
        self.index.remove(&name_key(&bucket.name));
        Ok(bucket)
    }

    /// Bucket a job is currently tagged to, if any.
    pub fn bucket_of(&self, job: JobId) -> Option<&Bucket> {
        let id = self.job_index.get(&job)?;
        self.by_id(*id)
    }

    /// Copy of `name` with `job` tagged to it. Nothing is committed.
    pub fn draft_tag(&self, name: &str, job: JobId, at: DateTime<Utc>) -> BucketResult<Bucket> {
        let bucket = self.lookup(name)?;
        if let Some(owner) = self.bucket_of(job) {
            return Err(BucketError::JobAlreadyTagged {
                job,
                bucket: owner.name.clone(),
            });
        }
        let mut draft = bucket.clone();
        draft.jobs.insert(
            job,
            JobRecord {
                tagged_at: at,
                resolved_at: None,
            },
        );
        Ok(draft)
    }

    /// Copy of `name` with `job` removed. Nothing is committed.
    pub fn draft_untag(&self, name: &str, job: JobId) -> BucketResult<Bucket> {
        let bucket = self.lookup(name)?;
        let mut draft = bucket.clone();
        if draft.jobs.remove(&job).is_none() {
            return Err(BucketError::JobNotFound {
                job,
                bucket: bucket.name.clone(),
            });
        }
        Ok(draft)
    }

    /// Copy of `name` with `job` marked resolved. Nothing is committed.
    pub fn draft_resolve(&self, name: &str, job: JobId, at: DateTime<Utc>) -> BucketResult<Bucket> {
        let bucket = self.lookup(name)?;
        let mut draft = bucket.clone();
        let record = draft.jobs.get_mut(&job).ok_or_else(|| BucketError::JobNotFound {
            job,
            bucket: bucket.name.clone(),
        })?;
        record.resolved_at.get_or_insert(at);
        Ok(draft)
    }
}
