//! src/services/bucket_store.rs
//!
//! BucketStore: durable SQLite persistence for buckets and the character
//! directory. A bucket is written as one aggregate (row, grants, monitors,
//! jobs) inside a single transaction, so a failed write leaves the previous
//! version intact.

use crate::errors::{BucketError, BucketResult};
use crate::models::action::ActionVocabulary;
use crate::models::bucket::{Bucket, BucketSettings, DueTimeout, JobRecord, TimeoutUnit};
use crate::models::permissions::Permissions;
use crate::models::principal::{CharacterRecord, Principal};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const INIT_MIGRATION: &str = include_str!("../../migrations/0001_init.sql");

/// Stored amount for a "never expires" timeout.
const NEVER_AMOUNT: i64 = -1;

#[derive(FromRow, Debug)]
struct BucketRow {
    id: Uuid,
    name: String,
    description: String,
    created_by: String,
    created_at: DateTime<Utc>,
    completion_board: Option<i64>,
    approval_board: Option<i64>,
    denial_board: Option<i64>,
    timeout_amount: Option<i64>,
    timeout_unit: Option<String>,
}

#[derive(FromRow, Debug)]
struct GrantRow {
    bucket_id: Uuid,
    principal: String,
    action: String,
}

#[derive(FromRow, Debug)]
struct MonitorRow {
    bucket_id: Uuid,
    principal: String,
}

#[derive(FromRow, Debug)]
struct JobRow {
    job_id: i64,
    bucket_id: Uuid,
    tagged_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct BucketStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl BucketStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Apply the embedded schema. Every statement is idempotent.
    pub async fn migrate(&self) -> BucketResult<()> {
        let statements = INIT_MIGRATION
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        debug!("running {} migration statements", statements.len());
        for stmt in statements {
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Insert or overwrite a bucket and all of its child rows.
    pub async fn save_bucket(&self, bucket: &Bucket) -> BucketResult<()> {
        let mut tx = self.db.begin().await?;

        let (timeout_amount, timeout_unit) = match bucket.settings.due_timeout {
            None => (None, None),
            Some(DueTimeout::Never) => (Some(NEVER_AMOUNT), None),
            Some(DueTimeout::After { amount, unit }) => {
                (Some(i64::from(amount)), Some(unit.as_str()))
            }
        };

        let upsert = sqlx::query(
            r#"
            INSERT INTO buckets (
                id, name, description, created_by, created_at,
                completion_board, approval_board, denial_board,
                timeout_amount, timeout_unit
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                completion_board = excluded.completion_board,
                approval_board = excluded.approval_board,
                denial_board = excluded.denial_board,
                timeout_amount = excluded.timeout_amount,
                timeout_unit = excluded.timeout_unit
            "#,
        )
        .bind(bucket.id)
        .bind(&bucket.name)
        .bind(&bucket.description)
        .bind(bucket.created_by.name())
        .bind(bucket.created_at)
        .bind(bucket.settings.completion_board.map(i64::from))
        .bind(bucket.settings.approval_board.map(i64::from))
        .bind(bucket.settings.denial_board.map(i64::from))
        .bind(timeout_amount)
        .bind(timeout_unit)
        .execute(&mut *tx)
        .await;

        match upsert {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(BucketError::AlreadyExists(bucket.name.clone()));
            }
            Err(err) => return Err(BucketError::Store(err)),
        }

        sqlx::query("DELETE FROM bucket_grants WHERE bucket_id = ?")
            .bind(bucket.id)
            .execute(&mut *tx)
            .await?;
        for (principal, action) in bucket.permissions.entries() {
            sqlx::query("INSERT INTO bucket_grants (bucket_id, principal, action) VALUES (?, ?, ?)")
                .bind(bucket.id)
                .bind(principal.name())
                .bind(action.as_str())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM bucket_monitors WHERE bucket_id = ?")
            .bind(bucket.id)
            .execute(&mut *tx)
            .await?;
        for principal in &bucket.monitors {
            sqlx::query("INSERT INTO bucket_monitors (bucket_id, principal) VALUES (?, ?)")
                .bind(bucket.id)
                .bind(principal.name())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM bucket_jobs WHERE bucket_id = ?")
            .bind(bucket.id)
            .execute(&mut *tx)
            .await?;
        for (job_id, record) in &bucket.jobs {
            sqlx::query(
                "INSERT INTO bucket_jobs (job_id, bucket_id, tagged_at, resolved_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(*job_id)
            .bind(bucket.id)
            .bind(record.tagged_at)
            .bind(record.resolved_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("saved bucket {} ({})", bucket.name, bucket.id);
        Ok(())
    }

    /// Remove a bucket and its child rows.
    pub async fn delete_bucket(&self, id: Uuid) -> BucketResult<()> {
        let mut tx = self.db.begin().await?;
        for table in ["bucket_grants", "bucket_monitors", "bucket_jobs"] {
            sqlx::query(&format!("DELETE FROM {} WHERE bucket_id = ?", table))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM buckets WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!("deleted bucket {}", id);
        Ok(())
    }

    /// Load every bucket in creation order.
    pub async fn load_buckets(&self, vocabulary: &ActionVocabulary) -> BucketResult<Vec<Bucket>> {
        let rows = sqlx::query_as::<_, BucketRow>(
            "SELECT id, name, description, created_by, created_at,
                    completion_board, approval_board, denial_board,
                    timeout_amount, timeout_unit
             FROM buckets ORDER BY rowid ASC",
        )
        .fetch_all(&*self.db)
        .await?;

        let grants = sqlx::query_as::<_, GrantRow>(
            "SELECT bucket_id, principal, action FROM bucket_grants",
        )
        .fetch_all(&*self.db)
        .await?;
        let monitors =
            sqlx::query_as::<_, MonitorRow>("SELECT bucket_id, principal FROM bucket_monitors")
                .fetch_all(&*self.db)
                .await?;
        let jobs = sqlx::query_as::<_, JobRow>(
            "SELECT job_id, bucket_id, tagged_at, resolved_at FROM bucket_jobs",
        )
        .fetch_all(&*self.db)
        .await?;

        let mut permissions: HashMap<Uuid, Permissions> = HashMap::new();
        for grant in grants {
            match vocabulary.resolve(&grant.action) {
                Some(action) => permissions
                    .entry(grant.bucket_id)
                    .or_default()
                    .grant(&Principal::new(grant.principal), &[action]),
                None => warn!(
                    "skipping unknown stored action `{}` on bucket {}",
                    grant.action, grant.bucket_id
                ),
            }
        }

        let mut monitor_sets: HashMap<Uuid, BTreeSet<Principal>> = HashMap::new();
        for monitor in monitors {
            monitor_sets
                .entry(monitor.bucket_id)
                .or_default()
                .insert(Principal::new(monitor.principal));
        }

        let mut job_sets: HashMap<Uuid, BTreeMap<i64, JobRecord>> = HashMap::new();
        for job in jobs {
            job_sets.entry(job.bucket_id).or_default().insert(
                job.job_id,
                JobRecord {
                    tagged_at: job.tagged_at,
                    resolved_at: job.resolved_at,
                },
            );
        }

        let buckets = rows
            .into_iter()
            .map(|row| Bucket {
                id: row.id,
                settings: settings_from_row(&row),
                permissions: permissions.remove(&row.id).unwrap_or_default(),
                monitors: monitor_sets.remove(&row.id).unwrap_or_default(),
                jobs: job_sets.remove(&row.id).unwrap_or_default(),
                created_by: Principal::new(row.created_by),
                created_at: row.created_at,
                name: row.name,
                description: row.description,
            })
            .collect::<Vec<_>>();

        debug!("loaded {} buckets", buckets.len());
        Ok(buckets)
    }

    pub async fn load_characters(&self) -> BucketResult<Vec<CharacterRecord>> {
        let rows = sqlx::query_as::<_, CharacterRecord>(
            "SELECT name, kind, roles FROM characters ORDER BY name ASC",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    /// Insert a character unless one with the same name already exists.
    pub async fn ensure_character(&self, record: &CharacterRecord) -> BucketResult<bool> {
        let result = sqlx::query(
            "INSERT INTO characters (name, kind, roles) VALUES (?, ?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(&record.name)
        .bind(&record.kind)
        .bind(&record.roles)
        .execute(&*self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn settings_from_row(row: &BucketRow) -> BucketSettings {
    let board = |value: Option<i64>| value.and_then(|v| u32::try_from(v).ok());
    let due_timeout = match (row.timeout_amount, row.timeout_unit.as_deref()) {
        (Some(NEVER_AMOUNT), _) => Some(DueTimeout::Never),
        (Some(amount), Some(unit)) => {
            match (u32::try_from(amount).ok(), TimeoutUnit::parse(unit)) {
                (Some(amount), Some(unit)) => Some(DueTimeout::After { amount, unit }),
                _ => {
                    warn!("ignoring malformed stored timeout on bucket {}", row.name);
                    None
                }
            }
        }
        _ => None,
    };
    BucketSettings {
        completion_board: board(row.completion_board),
        approval_board: board(row.approval_board),
        denial_board: board(row.denial_board),
        due_timeout,
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::action::BucketAction;
    use sqlx::sqlite::SqlitePoolOptions;

    /// Single-connection in-memory database with the schema applied.
    pub(crate) async fn memory_store() -> BucketStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        let store = BucketStore::new(Arc::new(pool));
        store.migrate().await.expect("migrate");
        store
    }

    fn sample() -> Bucket {
        let mut bucket = Bucket::new("Plots", "Plot development", Principal::new("Wiz"));
        bucket
            .permissions
            .grant(&Principal::new("Alice"), &[BucketAction::BucketInfo, BucketAction::JobLog]);
        bucket.monitors.insert(Principal::new("Alice"));
        bucket.settings.completion_board = Some(4);
        bucket.settings.due_timeout = Some(DueTimeout::After {
            amount: 3,
            unit: TimeoutUnit::Days,
        });
        bucket.jobs.insert(
            11,
            JobRecord {
                tagged_at: Utc::now(),
                resolved_at: None,
            },
        );
        bucket
    }

    #[tokio::test]
    async fn saved_bucket_loads_back_whole() {
        let store = memory_store().await;
        let bucket = sample();
        store.save_bucket(&bucket).await.unwrap();

        let loaded = store
            .load_buckets(&ActionVocabulary::standard())
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
        let got = &loaded[0];
        assert_eq!(got.id, bucket.id);
        assert_eq!(got.name, "Plots");
        assert_eq!(got.permissions, bucket.permissions);
        assert_eq!(got.monitors, bucket.monitors);
        assert_eq!(got.settings, bucket.settings);
        assert_eq!(got.jobs.keys().collect::<Vec<_>>(), vec![&11]);
        assert_eq!(got.created_by, Principal::new("Wiz"));
    }

    #[tokio::test]
    async fn resave_replaces_children_and_keeps_order() {
        let store = memory_store().await;
        let mut first = sample();
        let second = Bucket::new("Code", "Code requests", Principal::new("Wiz"));
        store.save_bucket(&first).await.unwrap();
        store.save_bucket(&second).await.unwrap();

        first.name = "Stories".into();
        first.jobs.clear();
        first.permissions = Permissions::new();
        first.settings.due_timeout = Some(DueTimeout::Never);
        store.save_bucket(&first).await.unwrap();

        let loaded = store
            .load_buckets(&ActionVocabulary::standard())
            .await
            .unwrap();
        let names: Vec<&str> = loaded.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Stories", "Code"]);
        assert!(loaded[0].jobs.is_empty());
        assert_eq!(loaded[0].permissions, Permissions::new());
        assert_eq!(loaded[0].settings.due_timeout, Some(DueTimeout::Never));
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected_by_store() {
        let store = memory_store().await;
        store.save_bucket(&sample()).await.unwrap();
        let clash = Bucket::new("plots", "Other", Principal::new("Wiz"));
        assert!(matches!(
            store.save_bucket(&clash).await,
            Err(BucketError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_everything() {
        let store = memory_store().await;
        let bucket = sample();
        store.save_bucket(&bucket).await.unwrap();
        store.delete_bucket(bucket.id).await.unwrap();
        assert!(
            store
                .load_buckets(&ActionVocabulary::standard())
                .await
                .unwrap()
                .is_empty()
        );
        let leftover: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bucket_jobs")
            .fetch_one(&*store.db)
            .await
            .unwrap();
        assert_eq!(leftover, 0);
    }

    #[tokio::test]
    async fn characters_are_inserted_once() {
        let store = memory_store().await;
        let wiz = CharacterRecord {
            name: "Wiz".into(),
            kind: "character".into(),
            roles: "Admin".into(),
        };
        assert!(store.ensure_character(&wiz).await.unwrap());
        assert!(!store.ensure_character(&wiz).await.unwrap());
        let all = store.load_characters().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].roles, "Admin");
    }
}
