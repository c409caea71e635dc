//! Hydration coordinator
//!
//! Pulls remote truth into the local caches. A batch fetches every key of
//! one scope concurrently, waits for all of them to settle, and then emits
//! exactly one broadcast.
//!
//! ## Batch rules
//!
//! - A job that gets a value writes it through both caches and notifies
//!   that key's subscribers as soon as its own fetch completes.
//! - A job that gets nothing, or fails, leaves local state untouched.
//! - The batch never short-circuits: one unreachable key does not delay or
//!   block the others.
//! - Running a batch again with the same remote state yields the same
//!   local state.

use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::bus::{HydrationScope, Topic};
use crate::context::SyncContext;
use crate::registry::{PrivateResource, ResolvedKey, ResourceId, SharedResource};
use crate::remote::RemoteError;

/// One resource to fetch
#[derive(Debug, Clone)]
pub struct HydrationJob {
    pub resource: ResourceId,
    pub key: ResolvedKey,
    pub fallback: Value,
}

/// How a single job settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Remote value written to the local caches
    Applied,
    /// Remote has no value; local state untouched
    Absent,
    /// Remote call failed; local state untouched
    Failed(RemoteError),
}

/// Result of one job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub resource: ResourceId,
    pub outcome: JobOutcome,
    /// What a read of the resource returns after the job settled
    pub value: Value,
}

/// Per-job outcomes of one batch
#[derive(Debug, Clone)]
pub struct HydrationReport {
    pub scope: HydrationScope,
    pub jobs: Vec<JobReport>,
}

impl HydrationReport {
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Applied))
    }

    pub fn absent(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Absent))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Failed(_)))
    }

    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }

    pub fn outcome(&self, resource: &ResourceId) -> Option<&JobOutcome> {
        self.jobs
            .iter()
            .find(|job| &job.resource == resource)
            .map(|job| &job.outcome)
    }

    fn count(&self, pred: impl Fn(&JobOutcome) -> bool) -> usize {
        self.jobs.iter().filter(|job| pred(&job.outcome)).count()
    }
}

/// Broadcast emitted once per settled batch
#[derive(Debug, Clone)]
pub enum HydrationEvent {
    SharedHydrated(HydrationReport),
    UserHydrated(HydrationReport),
}

impl HydrationEvent {
    pub fn scope(&self) -> HydrationScope {
        match self {
            HydrationEvent::SharedHydrated(_) => HydrationScope::Shared,
            HydrationEvent::UserHydrated(_) => HydrationScope::User,
        }
    }

    pub fn report(&self) -> &HydrationReport {
        match self {
            HydrationEvent::SharedHydrated(report) | HydrationEvent::UserHydrated(report) => report,
        }
    }
}

/// Runs hydration batches against a [`SyncContext`]
#[derive(Clone)]
pub struct HydrationCoordinator {
    ctx: Arc<SyncContext>,
}

impl HydrationCoordinator {
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        Self { ctx }
    }

    /// Jobs for every shared resource
    pub fn shared_jobs(&self) -> Vec<HydrationJob> {
        SharedResource::ALL
            .iter()
            .filter_map(|shared| self.job(ResourceId::Shared(*shared)))
            .collect()
    }

    /// Jobs for every private resource of the current user; empty when
    /// nobody is logged in
    pub fn user_jobs(&self) -> Vec<HydrationJob> {
        let Some(user) = self.ctx.current_user() else {
            return Vec::new();
        };

        PrivateResource::ALL
            .iter()
            .filter_map(|resource| {
                self.job(ResourceId::PrivateFor {
                    user: user.clone(),
                    resource: *resource,
                })
            })
            .collect()
    }

    pub async fn hydrate_shared(&self) -> HydrationReport {
        self.run(HydrationScope::Shared, self.shared_jobs()).await
    }

    pub async fn hydrate_user(&self) -> HydrationReport {
        let jobs = self.user_jobs();
        if jobs.is_empty() {
            debug!("No user logged in, user batch is empty");
        }
        self.run(HydrationScope::User, jobs).await
    }

    /// Shared batch, then the user batch
    pub async fn hydrate_all(&self) -> (HydrationReport, HydrationReport) {
        let shared = self.hydrate_shared().await;
        let user = self.hydrate_user().await;
        (shared, user)
    }

    /// Run a batch of jobs and emit its broadcast
    pub async fn run(&self, scope: HydrationScope, jobs: Vec<HydrationJob>) -> HydrationReport {
        debug!(?scope, jobs = jobs.len(), "Hydration batch started");

        let jobs = join_all(jobs.into_iter().map(|job| self.run_job(job))).await;
        let report = HydrationReport { scope, jobs };

        info!(
            ?scope,
            applied = report.applied(),
            absent = report.absent(),
            failed = report.failed(),
            "Hydration batch settled"
        );

        self.ctx.bus().notify_topic(Topic::Hydrated(scope));
        self.ctx.broadcast(match scope {
            HydrationScope::Shared => HydrationEvent::SharedHydrated(report.clone()),
            HydrationScope::User => HydrationEvent::UserHydrated(report.clone()),
        });

        report
    }

    async fn run_job(&self, job: HydrationJob) -> JobReport {
        let remote = self.ctx.remote();
        let outcome = match remote.get(job.key.remote_key, &job.key.partition).await {
            // A stored null counts as absent
            Ok(None) | Ok(Some(Value::Null)) => JobOutcome::Absent,
            Ok(Some(value)) => {
                self.ctx.commit(&job.key, value);
                JobOutcome::Applied
            }
            Err(e) => {
                warn!(resource = %job.resource, "Hydration fetch failed: {}", e);
                JobOutcome::Failed(e)
            }
        };

        let value = self.ctx.local().read(&job.key.storage, job.fallback);
        JobReport {
            resource: job.resource,
            outcome,
            value,
        }
    }

    fn job(&self, resource: ResourceId) -> Option<HydrationJob> {
        let key = self.ctx.resolve(&resource)?;
        let fallback = resource.fallback();
        Some(HydrationJob {
            resource,
            key,
            fallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Partition;
    use crate::remote::MemoryRemote;
    use crate::storage::{LocalCache, PersistentStore};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context_with(remote: &MemoryRemote) -> Arc<SyncContext> {
        SyncContext::create(
            LocalCache::new(PersistentStore::in_memory()),
            Arc::new(remote.clone()),
        )
    }

    fn seed_all_shared(remote: &MemoryRemote) {
        for shared in SharedResource::ALL {
            remote.insert(
                shared.remote_key(),
                &Partition::Shared,
                json!([shared.logical_key()]),
            );
        }
    }

    fn count_notifications(ctx: &SyncContext, key: &'static str) -> (Arc<AtomicUsize>, crate::bus::Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = ctx.bus().subscribe(
            key,
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (count, sub)
    }

    #[tokio::test]
    async fn test_shared_batch_populates_caches() {
        let remote = MemoryRemote::new();
        seed_all_shared(&remote);
        let ctx = context_with(&remote);

        let report = ctx.hydrator().hydrate_shared().await;

        assert_eq!(report.applied(), SharedResource::ALL.len());
        assert!(report.is_complete());
        let binding = ctx.binding();
        assert_eq!(
            binding.read(&SharedResource::Handouts.into()),
            json!(["handouts"])
        );
        // Written through to the persistent level too
        assert!(ctx
            .storage_status()
            .persistent_keys
            .contains(&"portal-handouts".to_string()));
    }

    #[tokio::test]
    async fn test_failed_job_does_not_block_the_others() {
        let remote = MemoryRemote::new();
        seed_all_shared(&remote);
        remote.fail_key("drugs", &Partition::Shared);
        let ctx = context_with(&remote);

        let (classes_count, _s1) = count_notifications(&ctx, "classes");
        let (drugs_count, _s2) = count_notifications(&ctx, "drugs");
        let mut events = ctx.hydration_events();

        let report = ctx.hydrator().hydrate_shared().await;

        assert_eq!(report.failed(), 1);
        assert_eq!(report.applied(), SharedResource::ALL.len() - 1);
        assert!(matches!(
            report.outcome(&SharedResource::Drugs.into()),
            Some(JobOutcome::Failed(_))
        ));
        assert_eq!(classes_count.load(Ordering::SeqCst), 1);
        assert_eq!(drugs_count.load(Ordering::SeqCst), 0);

        // Exactly one broadcast for the batch
        let event = events.try_recv().unwrap();
        assert_eq!(event.scope(), HydrationScope::Shared);
        assert_eq!(event.report().failed(), 1);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_hung_job_does_not_hold_back_the_others() {
        let remote = MemoryRemote::new();
        seed_all_shared(&remote);
        remote.hold_key("drugs", &Partition::Shared);
        let ctx = context_with(&remote);

        let (classes_count, _s1) = count_notifications(&ctx, "classes");
        let (drugs_count, _s2) = count_notifications(&ctx, "drugs");
        let mut events = ctx.hydration_events();

        let batch = {
            let hydrator = ctx.hydrator();
            tokio::spawn(async move { hydrator.hydrate_shared().await })
        };

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while classes_count.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("classes applied while drugs is held");

        // Everything but drugs has landed; the batch has not settled
        assert_eq!(
            ctx.binding().read(&SharedResource::Classes.into()),
            json!(["classes"])
        );
        assert_eq!(drugs_count.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.binding().read(&SharedResource::Drugs.into()), json!([]));
        assert!(!batch.is_finished());
        assert!(events.try_recv().is_err());

        remote.release_key("drugs", &Partition::Shared);
        let report = batch.await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.applied(), SharedResource::ALL.len());
        assert_eq!(drugs_count.load(Ordering::SeqCst), 1);
        assert_eq!(events.try_recv().unwrap().report().applied(), report.applied());
    }

    #[tokio::test]
    async fn test_absent_remote_keeps_local_value() {
        let ctx = context_with(&MemoryRemote::new());
        let key = ctx.resolve(&SharedResource::Classes.into()).unwrap();
        ctx.commit(&key, json!([{"id": "local"}]));

        let report = ctx.hydrator().hydrate_shared().await;

        assert_eq!(
            report.outcome(&SharedResource::Classes.into()),
            Some(&JobOutcome::Absent)
        );
        assert_eq!(report.absent(), SharedResource::ALL.len());
        assert_eq!(
            ctx.binding().read(&SharedResource::Classes.into()),
            json!([{"id": "local"}])
        );
    }

    #[tokio::test]
    async fn test_remote_null_is_absent() {
        let remote = MemoryRemote::new();
        remote.insert("drugs", &Partition::Shared, Value::Null);
        let ctx = context_with(&remote);
        let key = ctx.resolve(&SharedResource::Drugs.into()).unwrap();
        ctx.commit(&key, json!(["aspirin"]));

        let report = ctx.hydrator().hydrate_shared().await;

        assert_eq!(
            report.outcome(&SharedResource::Drugs.into()),
            Some(&JobOutcome::Absent)
        );
        assert_eq!(
            ctx.binding().read(&SharedResource::Drugs.into()),
            json!(["aspirin"])
        );
    }

    #[tokio::test]
    async fn test_failed_remote_keeps_local_value() {
        let remote = MemoryRemote::new();
        remote.set_offline(true);
        let ctx = context_with(&remote);
        ctx.binding()
            .write(&SharedResource::Classes.into(), json!([{"id": "before"}]));

        let report = ctx.hydrator().hydrate_shared().await;

        assert_eq!(report.failed(), SharedResource::ALL.len());
        assert_eq!(
            ctx.binding().read(&SharedResource::Classes.into()),
            json!([{"id": "before"}])
        );
        // Never-written resources still read as their fallback, uncached
        assert_eq!(
            ctx.binding().read(&SharedResource::LabValues.into()),
            json!({})
        );
    }

    #[tokio::test]
    async fn test_hydration_is_idempotent() {
        let remote = MemoryRemote::new();
        seed_all_shared(&remote);
        let ctx = context_with(&remote);
        let (count, _sub) = count_notifications(&ctx, "flashcards");

        let first = ctx.hydrator().hydrate_shared().await;
        let keys_after_first = ctx.storage_status().persistent_keys;
        let second = ctx.hydrator().hydrate_shared().await;

        assert_eq!(first.applied(), second.applied());
        assert_eq!(ctx.storage_status().persistent_keys, keys_after_first);
        for (a, b) in first.jobs.iter().zip(second.jobs.iter()) {
            assert_eq!(a.value, b.value);
        }
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_user_batch_without_login_still_broadcasts() {
        let ctx = context_with(&MemoryRemote::new());
        let mut events = ctx.hydration_events();

        let report = ctx.hydrator().hydrate_user().await;

        assert!(report.jobs.is_empty());
        let event = events.try_recv().unwrap();
        assert_eq!(event.scope(), HydrationScope::User);
    }

    #[tokio::test]
    async fn test_user_batch_uses_private_partition() {
        let remote = MemoryRemote::new();
        let u1 = Partition::Private("u1".to_string());
        remote.insert("timetable", &u1, json!({"mon": ["pharm"]}));
        remote.insert("timetable", &Partition::Private("u2".to_string()), json!({"tue": []}));
        let ctx = context_with(&remote);

        ctx.login("u1").await.unwrap();

        let binding = ctx.binding();
        assert_eq!(
            binding.read(&PrivateResource::Timetable.into()),
            json!({"mon": ["pharm"]})
        );
        assert!(ctx
            .storage_status()
            .persistent_keys
            .contains(&"timetable-for-u1".to_string()));
    }

    #[tokio::test]
    async fn test_hydrated_topic_fires_once_per_batch() {
        let remote = MemoryRemote::new();
        seed_all_shared(&remote);
        let ctx = context_with(&remote);

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _sub = ctx.bus().subscribe_topic(
            Topic::Hydrated(HydrationScope::Shared),
            Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        ctx.hydrator().hydrate_all().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
