//! Run coordination: startup checks, then the source and worker pool.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, mpsc};

use super::context::{RunContext, WorkerSettings};
use super::source::RecordSource;
use super::stats::{RunSummary, WorkerReport};
use super::worker::Worker;
use crate::audit::FailureLog;
use crate::config::ImportConfig;
use crate::credentials::CredentialPolicy;
use crate::error::ImportResult;
use crate::okta::{UserApi, preflight};
use crate::payload::PayloadBuilder;

/// Owns the lifetime of one import run.
pub struct ImportRun<A> {
    config: ImportConfig,
    api: Arc<A>,
}

/// Everything resolved before any record is submitted.
struct Prepared {
    source: RecordSource,
    policy: CredentialPolicy,
}

impl<A: UserApi> ImportRun<A> {
    pub fn new(config: ImportConfig, api: A) -> Self {
        Self {
            config,
            api: Arc::new(api),
        }
    }

    /// Startup phase: read the header, resolve credentials, verify the remote schema.
    /// Any failure here aborts before the failure log is touched.
    async fn prepare(&self) -> ImportResult<Prepared> {
        self.config.validate()?;
        let source = RecordSource::open(&self.config.csv_file)?;
        let policy = CredentialPolicy::resolve(&self.config.password, source.schema())?;
        preflight(self.api.as_ref(), source.schema()).await?;
        Ok(Prepared { source, policy })
    }

    /// Run only the startup checks.
    pub async fn check(&self) -> ImportResult<()> {
        self.prepare().await.map(|_| ())
    }

    pub async fn run(self) -> ImportResult<RunSummary> {
        let started = Instant::now();
        let Prepared { source, policy } = self.prepare().await?;

        let builder = PayloadBuilder::new(source.schema().clone(), policy, &self.config.group_id);
        let failures = FailureLog::open(&self.config.log_file)?;
        let ctx = Arc::new(RunContext::new(
            builder,
            WorkerSettings::from_config(&self.config),
            failures,
        ));

        let concurrency = self.config.concurrency;
        let (sender, receiver) = mpsc::channel(concurrency);
        let receiver = Arc::new(Mutex::new(receiver));

        log::info!("all set, beginning import with {} workers", concurrency);
        let source_task = tokio::task::spawn_blocking(move || source.stream(sender));
        let workers: Vec<_> = (0..concurrency)
            .map(|id| {
                let worker = Worker::new(
                    id,
                    Arc::clone(&ctx),
                    Arc::clone(&self.api),
                    Arc::clone(&receiver),
                );
                tokio::spawn(worker.run())
            })
            .collect();
        // Workers hold the only receivers; if they all exit the source stops too.
        drop(receiver);

        let mut report = WorkerReport::default();
        let mut worker_failure = None;
        for worker in workers {
            match worker.await {
                Ok(worker_report) => report.merge(worker_report),
                Err(err) => {
                    log::error!("worker task failed: {}", err);
                    if worker_failure.is_none() {
                        worker_failure = Some(err);
                    }
                }
            }
        }
        let streamed = source_task.await;
        if let Some(err) = worker_failure {
            return Err(err.into());
        }
        let streamed = streamed??;

        let elapsed = started.elapsed();
        ctx.failures.record_summary(elapsed)?;

        let summary = RunSummary {
            streamed,
            imported: ctx.imported.get(),
            report,
            elapsed,
        };
        log::info!("{}", summary);
        Ok(summary)
    }
}
