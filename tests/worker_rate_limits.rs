use okta_user_import::audit::FailureLog;
use okta_user_import::credentials::CredentialPolicy;
use okta_user_import::okta::RateLimit;
use okta_user_import::okta::rate_limit::now_epoch;
use okta_user_import::payload::PayloadBuilder;
use okta_user_import::pipeline::{RetryPolicy, RunContext, Worker, WorkerReport, WorkerSettings};
use okta_user_import::schema::{FieldSchema, Record};
use okta_user_import::test_support::{Reply, ScriptedApi};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;

struct Harness {
    _dir: TempDir,
    log: PathBuf,
    ctx: Arc<RunContext>,
    api: Arc<ScriptedApi>,
}

impl Harness {
    fn new(api: ScriptedApi, settings: WorkerSettings) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let log = dir.path().join("log.csv");
        let schema = FieldSchema::from_header(["login", "email"]).expect("schema");
        let builder = PayloadBuilder::new(schema, CredentialPolicy::Empty, "00g-test");
        let failures = FailureLog::open(&log).expect("failure log");
        Self {
            _dir: dir,
            log,
            ctx: Arc::new(RunContext::new(builder, settings, failures)),
            api: Arc::new(api),
        }
    }

    fn worker(&self, id: usize, records: mpsc::Receiver<Record>) -> Worker<ScriptedApi> {
        self.worker_shared(id, Arc::new(Mutex::new(records)))
    }

    fn worker_shared(
        &self,
        id: usize,
        records: Arc<Mutex<mpsc::Receiver<Record>>>,
    ) -> Worker<ScriptedApi> {
        Worker::new(id, Arc::clone(&self.ctx), Arc::clone(&self.api), records)
    }

    async fn run(&self, logins: &[&str]) -> WorkerReport {
        let (sender, receiver) = mpsc::channel(logins.len().max(1));
        for login in logins {
            sender.send(record(login)).await.expect("queue record");
        }
        drop(sender);
        self.worker(0, receiver).run().await
    }

    fn log_rows(&self) -> Vec<Vec<String>> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.log)
            .expect("log file")
            .records()
            .map(|row| row.expect("row").iter().map(str::to_string).collect())
            .collect()
    }

    fn gaps(&self, login: &str) -> Vec<Duration> {
        self.api
            .calls_for(login)
            .windows(2)
            .map(|pair| pair[1].at - pair[0].at)
            .collect()
    }
}

fn api() -> ScriptedApi {
    ScriptedApi::new(["login", "email"])
}

fn settings(throttle_percent: u8, cooldown: Duration) -> WorkerSettings {
    WorkerSettings {
        notify_every: 1,
        throttle_percent,
        rate_limit_cooldown: cooldown,
        retry: RetryPolicy::default(),
    }
}

fn record(login: &str) -> Record {
    Record::new(vec![login.to_string(), format!("{login}@example.com")])
}

fn quota(remaining: u64, reset_in: i64) -> RateLimit {
    RateLimit {
        limit: Some(100),
        remaining: Some(remaining),
        reset: Some(now_epoch() + reset_in),
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limited_record_waits_for_reset_plus_margin() {
    let reset = now_epoch() + 10;
    let harness = Harness::new(
        api().script("ann", [Reply::too_many_requests(Some(reset)), Reply::ok()]),
        settings(100, Duration::ZERO),
    );

    let report = harness.run(&["ann"]).await;

    let gaps = harness.gaps("ann");
    assert_eq!(gaps.len(), 1, "resubmitted exactly once");
    assert!(
        gaps[0] >= Duration::from_secs(14) && gaps[0] <= Duration::from_secs(15),
        "waited {:?}",
        gaps[0]
    );
    assert_eq!(report.rate_limited, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(harness.ctx.imported.get(), 1);
    assert!(harness.log_rows().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cooldown_override_replaces_advertised_reset() {
    let harness = Harness::new(
        api().script("ann", [Reply::too_many_requests(None), Reply::ok()]),
        settings(100, Duration::from_secs(30)),
    );

    harness.run(&["ann"]).await;

    assert_eq!(harness.gaps("ann"), [Duration::from_secs(30)]);
}

#[tokio::test(start_paused = true)]
async fn reset_in_the_past_still_waits_the_margin() {
    let harness = Harness::new(
        api().script(
            "ann",
            [Reply::too_many_requests(Some(now_epoch() - 3600)), Reply::ok()],
        ),
        settings(100, Duration::ZERO),
    );

    harness.run(&["ann"]).await;

    assert_eq!(harness.gaps("ann"), [Duration::ZERO]);
}

#[tokio::test(start_paused = true)]
async fn second_rate_limit_falls_through_to_outer_retry() {
    let harness = Harness::new(
        api().script(
            "ann",
            [
                Reply::too_many_requests(None),
                Reply::too_many_requests(None),
                Reply::ok(),
            ],
        ),
        settings(100, Duration::from_secs(1)),
    );

    let report = harness.run(&["ann"]).await;

    assert_eq!(
        harness.gaps("ann"),
        [Duration::from_secs(1), Duration::from_secs(2)]
    );
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.exhausted, 0);
    assert_eq!(harness.ctx.imported.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limited_retry_that_fails_is_logged() {
    let harness = Harness::new(
        api().script(
            "ann",
            [
                Reply::too_many_requests(None),
                Reply::error(400, "login already exists"),
            ],
        ),
        settings(100, Duration::from_secs(1)),
    );

    let report = harness.run(&["ann"]).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.rate_limited, 1);
    assert_eq!(
        harness.log_rows(),
        [["Failure", "ann", "login already exists", "400"]]
    );
}

#[tokio::test(start_paused = true)]
async fn low_quota_pauses_before_next_record() {
    let harness = Harness::new(
        api().script("ann", [Reply::ok_with(quota(50, 20))]),
        settings(50, Duration::ZERO),
    );
    let started = Instant::now();

    let report = harness.run(&["ann", "bob"]).await;

    let ann = harness.api.calls_for("ann");
    let bob = harness.api.calls_for("bob");
    let gap = bob[0].at - ann[0].at;
    assert!(
        gap >= Duration::from_secs(19) && gap <= Duration::from_secs(20),
        "paused {:?}",
        gap
    );
    assert_eq!(report.succeeded, 2);
    assert!(started.elapsed() >= gap);
}

#[tokio::test(start_paused = true)]
async fn quota_above_threshold_does_not_pause() {
    let harness = Harness::new(
        api().script("ann", [Reply::ok_with(quota(51, 20))]),
        settings(50, Duration::ZERO),
    );

    harness.run(&["ann", "bob"]).await;

    let gap = harness.api.calls_for("bob")[0].at - harness.api.calls_for("ann")[0].at;
    assert_eq!(gap, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn full_speed_never_self_throttles() {
    let harness = Harness::new(
        api().script("ann", [Reply::ok_with(quota(0, 60))]),
        settings(100, Duration::ZERO),
    );

    harness.run(&["ann", "bob"]).await;

    let gap = harness.api.calls_for("bob")[0].at - harness.api.calls_for("ann")[0].at;
    assert_eq!(gap, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn missing_quota_headers_do_not_resubmit_a_success() {
    let harness = Harness::new(
        api().script("ann", [Reply::ok_with(RateLimit::default())]),
        settings(50, Duration::ZERO),
    );

    let report = harness.run(&["ann"]).await;

    assert_eq!(harness.api.calls_for("ann").len(), 1);
    assert_eq!(report.succeeded, 1);
    assert!(harness.log_rows().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failure_status_is_logged_with_summary_and_code() {
    let harness = Harness::new(
        api().script("ann", [Reply::error(403, "You do not have permission")]),
        settings(100, Duration::ZERO),
    );

    let report = harness.run(&["ann", "bob"]).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(harness.api.calls_for("ann").len(), 1, "terminal failures are not retried");
    assert_eq!(
        harness.log_rows(),
        [["Failure", "ann", "You do not have permission", "403"]]
    );
}

#[tokio::test(start_paused = true)]
async fn timeout_is_logged_once() {
    let harness = Harness::new(
        api().script("ann", [Reply::Timeout]),
        settings(100, Duration::ZERO),
    );

    let report = harness.run(&["ann"]).await;

    assert_eq!(report.timed_out, 1);
    assert_eq!(harness.api.calls_for("ann").len(), 1);
    assert_eq!(harness.log_rows(), [["Failure", "ann", "TIMEOUT"]]);
    assert_eq!(harness.ctx.imported.get(), 0);
}

#[tokio::test(start_paused = true)]
async fn transport_faults_retry_then_log_when_exhausted() {
    let harness = Harness::new(
        api().script("ann", [Reply::Transport, Reply::Transport, Reply::Transport]),
        settings(100, Duration::ZERO),
    );

    let report = harness.run(&["ann", "bob"]).await;

    assert_eq!(
        harness.gaps("ann"),
        [Duration::from_secs(2), Duration::from_secs(2)]
    );
    assert_eq!(report.exhausted, 1);
    assert_eq!(report.succeeded, 1);

    let rows = harness.log_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][..2], ["Failure", "ann"]);
    assert!(rows[0][2].starts_with("ERROR: "), "{}", rows[0][2]);
}

#[tokio::test(start_paused = true)]
async fn transient_fault_recovers_on_next_attempt() {
    let harness = Harness::new(
        api().script("ann", [Reply::Transport]),
        settings(100, Duration::ZERO),
    );

    let report = harness.run(&["ann"]).await;

    assert_eq!(harness.api.calls_for("ann").len(), 2);
    assert_eq!(report.succeeded, 1);
    assert!(harness.log_rows().is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_reset_header_is_retried_by_outer_policy() {
    let harness = Harness::new(
        api().script("ann", [Reply::too_many_requests(None)]),
        settings(100, Duration::ZERO),
    );

    let report = harness.run(&["ann"]).await;

    assert_eq!(harness.gaps("ann"), [Duration::from_secs(2)]);
    assert_eq!(report.succeeded, 1);
}

#[tokio::test(start_paused = true)]
async fn worker_waits_on_open_empty_channel() {
    let harness = Harness::new(api(), settings(100, Duration::ZERO));
    let (sender, receiver) = mpsc::channel(1);
    let handle = tokio::spawn(harness.worker(0, receiver).run());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!handle.is_finished());

    sender.send(record("ann")).await.expect("queue record");
    drop(sender);

    let report = handle.await.expect("worker task");
    assert_eq!(report.succeeded, 1);
}

#[tokio::test(start_paused = true)]
async fn workers_share_channel_and_counter() {
    let harness = Harness::new(
        api().with_latency(Duration::from_secs(1)),
        settings(100, Duration::ZERO),
    );
    let (sender, receiver) = mpsc::channel(2);
    let receiver = Arc::new(Mutex::new(receiver));
    let started = Instant::now();

    let workers: Vec<_> = (0..2)
        .map(|id| tokio::spawn(harness.worker_shared(id, Arc::clone(&receiver)).run()))
        .collect();
    drop(receiver);

    for i in 0..6 {
        sender.send(record(&format!("user{i}"))).await.expect("queue record");
    }
    drop(sender);

    let mut total = WorkerReport::default();
    for worker in workers {
        let report = worker.await.expect("worker task");
        assert!(report.succeeded > 0, "both workers take records");
        total.merge(report);
    }

    assert_eq!(total.succeeded, 6);
    assert_eq!(harness.ctx.imported.get(), 6);
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}
