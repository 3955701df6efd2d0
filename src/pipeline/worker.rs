use reqwest::StatusCode;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::time::sleep;

use super::context::RunContext;
use super::retry::with_retry;
use super::stats::{WorkerReport, progress_due};
use crate::audit::TIMEOUT_REASON;
use crate::error::ApiError;
use crate::okta::rate_limit::{self, RateLimit};
use crate::okta::{CreateUserResponse, UserApi};
use crate::payload::Payload;
use crate::schema::Record;

/// Receiving end of the record channel, shared by every worker.
pub type SharedReceiver = Arc<Mutex<mpsc::Receiver<Record>>>;

/// Terminal state of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
    TimedOut,
}

/// What handling one record produced, and whether a 429 forced a resubmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handled {
    pub outcome: Outcome,
    pub rate_limited: bool,
}

pub struct Worker<A> {
    id: usize,
    ctx: Arc<RunContext>,
    api: Arc<A>,
    records: SharedReceiver,
}

impl<A: UserApi> Worker<A> {
    pub fn new(id: usize, ctx: Arc<RunContext>, api: Arc<A>, records: SharedReceiver) -> Self {
        Self {
            id,
            ctx,
            api,
            records,
        }
    }

    /// Consume records until the channel is closed and drained.
    pub async fn run(self) -> WorkerReport {
        log::debug!("worker {}: started", self.id);
        let mut report = WorkerReport::default();
        let retry = self.ctx.settings.retry;

        while let Some(record) = self.next_record().await {
            let result = with_retry(retry.max_attempts, retry.delay, || self.handle(&record)).await;

            match result {
                Ok(handled) => {
                    if handled.rate_limited {
                        report.rate_limited += 1;
                    }
                    match handled.outcome {
                        Outcome::Succeeded => report.succeeded += 1,
                        Outcome::Failed => report.failed += 1,
                        Outcome::TimedOut => report.timed_out += 1,
                    }
                }
                Err(err) => {
                    let login = record.login(self.ctx.schema());
                    log::error!(
                        "worker {}: giving up on {} after {} attempts: {}",
                        self.id,
                        login,
                        retry.max_attempts,
                        err
                    );
                    self.ctx
                        .failures
                        .record_failure(login, &format!("ERROR: {err}"), None);
                    report.exhausted += 1;
                }
            }
        }

        log::info!("worker {}: closing", self.id);
        report
    }

    async fn next_record(&self) -> Option<Record> {
        let mut records = self.records.lock().await;
        records.recv().await
    }

    /// One attempt at a record: submit, resubmit once after a 429, classify.
    pub async fn handle(&self, record: &Record) -> Result<Handled, ApiError> {
        let payload = self.ctx.builder.build(record);
        let login = record.login(self.ctx.schema());

        let Some(response) = self.submit(&payload, login).await? else {
            return Ok(Handled {
                outcome: Outcome::TimedOut,
                rate_limited: false,
            });
        };
        if response.status != StatusCode::TOO_MANY_REQUESTS {
            return Ok(Handled {
                outcome: self.classify(login, response).await,
                rate_limited: false,
            });
        }

        self.wait_out_rate_limit(login, &response.rate_limit).await?;

        let outcome = match self.submit(&payload, login).await? {
            None => Outcome::TimedOut,
            Some(retried) if retried.status == StatusCode::TOO_MANY_REQUESTS => {
                return Err(ApiError::RateLimited);
            }
            Some(retried) => self.classify(login, retried).await,
        };
        Ok(Handled {
            outcome,
            rate_limited: true,
        })
    }

    /// Submit once. A timeout is logged as a failure and yields `None`.
    async fn submit(
        &self,
        payload: &Payload<'_>,
        login: &str,
    ) -> Result<Option<CreateUserResponse>, ApiError> {
        match self.api.create_user(payload).await {
            Ok(response) => Ok(Some(response)),
            Err(ApiError::Timeout) => {
                log::warn!("worker {}: request for {} timed out", self.id, login);
                self.ctx.failures.record_failure(login, TIMEOUT_REASON, None);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn classify(&self, login: &str, response: CreateUserResponse) -> Outcome {
        if response.status == StatusCode::OK {
            let total = self.ctx.imported.increment();
            if progress_due(total, self.ctx.settings.notify_every) {
                log::info!("imported {} (total {})", login, total);
            }
            self.throttle(&response.rate_limit).await;
            return Outcome::Succeeded;
        }

        let reason = response.error_summary.unwrap_or_default();
        log::warn!(
            "worker {}: creating {} failed with {}: {}",
            self.id,
            login,
            response.status,
            reason
        );
        self.ctx
            .failures
            .record_failure(login, &reason, Some(response.status.as_u16()));
        Outcome::Failed
    }

    async fn wait_out_rate_limit(&self, login: &str, limits: &RateLimit) -> Result<(), ApiError> {
        let cooldown = self.ctx.settings.rate_limit_cooldown;
        let wait = if cooldown.is_zero() {
            rate_limit::retry_after_reset(limits.reset_epoch()?, rate_limit::now_epoch())
        } else {
            cooldown
        };

        log::warn!(
            "worker {}: rate limited creating {}, resubmitting in {:?}",
            self.id,
            login,
            wait
        );
        sleep(wait).await;
        Ok(())
    }

    /// Pause until the window resets once remaining quota falls to the configured share.
    async fn throttle(&self, limits: &RateLimit) {
        let percent = self.ctx.settings.throttle_percent;
        let reset = match limits.below_threshold(percent) {
            Ok(false) => return,
            Ok(true) => limits.reset_epoch(),
            Err(err) => Err(err),
        };

        match reset {
            Ok(reset) => {
                let wait = rate_limit::until_reset(reset, rate_limit::now_epoch());
                log::info!(
                    "worker {}: {} of {} requests left, pausing {:?} for the window to reset",
                    self.id,
                    limits.remaining.unwrap_or_default(),
                    limits.limit.unwrap_or_default(),
                    wait
                );
                sleep(wait).await;
            }
            Err(err) => log::warn!("worker {}: cannot self-throttle: {}", self.id, err),
        }
    }
}
