//! Integration tests for the poll loop: gate behavior, cursor handling and
//! failure containment, driven by a scripted source and a recording notifier.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use review_relay::channel::{Notifier, OutboundMessage};
use review_relay::gate::{GateOutcome, GateState};
use review_relay::relay::{Relay, RelaySettings, WAITING_TEXT};
use review_relay::status::verdict::StatusCode;
use review_relay::status::{PollCursor, StatusSource};
use review_relay::{Error, Result};
use serde_json::{Value, json};
use tokio::time::Instant;

// ---- Fakes ----

/// Replays queued responses and records the cursor of every fetch.
struct ScriptedSource {
    script: Mutex<VecDeque<Result<Value>>>,
    seen: Arc<Mutex<Vec<i64>>>,
}

impl ScriptedSource {
    fn new(script: Vec<Result<Value>>) -> (Self, Arc<Mutex<Vec<i64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let source = Self {
            script: Mutex::new(script.into()),
            seen: Arc::clone(&seen),
        };
        (source, seen)
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, cursor: PollCursor) -> Result<Value> {
        self.seen.lock().unwrap().push(cursor.epoch_secs());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("script ran out of responses")
    }
}

/// Records every attempt; fails while `failing` is set.
#[derive(Clone, Default)]
struct RecordingNotifier {
    attempts: Arc<Mutex<Vec<OutboundMessage>>>,
    failing: Arc<AtomicBool>,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    fn attempts(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.text.clone())
            .collect()
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<()> {
        self.attempts.lock().unwrap().push(msg.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::notifier("chat unavailable"));
        }
        Ok(())
    }
}

/// Always fails with HTTP 500; records when each fetch happened.
#[derive(Clone, Default)]
struct DownSource {
    fetched_at: Arc<Mutex<Vec<Instant>>>,
}

#[async_trait]
impl StatusSource for DownSource {
    fn name(&self) -> &str {
        "down"
    }

    async fn fetch(&self, _cursor: PollCursor) -> Result<Value> {
        self.fetched_at.lock().unwrap().push(Instant::now());
        Err(Error::UnexpectedStatusCode(500))
    }
}

/// Shared buffer the fmt subscriber writes log lines into.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

fn settings() -> RelaySettings {
    RelaySettings {
        chat_id: "42".into(),
        poll_interval: Duration::from_secs(600),
        send_timeout: Duration::from_secs(5),
        stamp_messages: false,
    }
}

fn relay_with(
    script: Vec<Result<Value>>,
    notifier: &RecordingNotifier,
    start: i64,
) -> (Relay, Arc<Mutex<Vec<i64>>>) {
    let (source, seen) = ScriptedSource::new(script);
    let relay = Relay::new(
        Box::new(source),
        Box::new(notifier.clone()),
        settings(),
        PollCursor::new(start),
    );
    (relay, seen)
}

fn homework(name: &str, status: &str, current_date: i64) -> Value {
    json!({
        "homeworks": [{"homework_name": name, "status": status}],
        "current_date": current_date,
    })
}

fn empty(current_date: i64) -> Value {
    json!({"homeworks": [], "current_date": current_date})
}

// ---- Scenarios ----

#[tokio::test]
async fn approved_status_is_delivered_and_cursor_advances() {
    let notifier = RecordingNotifier::default();
    let (mut relay, _) = relay_with(vec![Ok(homework("X", "approved", 1000))], &notifier, 1);

    let report = relay.tick().await;

    assert!(report.outcome.is_delivered());
    assert!(!report.candidate.is_error());
    let text = report.candidate.text();
    assert!(text.contains("\"X\""));
    assert!(text.contains(StatusCode::Approved.human_text()));
    assert_eq!(relay.history().last_sent_text(), text);
    assert!(!relay.history().last_sent_was_error());
    assert_eq!(relay.cursor(), PollCursor::new(1000));
    assert_eq!(notifier.attempts(), vec![text.to_string()]);
}

#[tokio::test]
async fn empty_list_sends_waiting_text_once() {
    let notifier = RecordingNotifier::default();
    let (mut relay, _) = relay_with(vec![Ok(empty(1000)), Ok(empty(1100))], &notifier, 1);

    let first = relay.tick().await;
    assert!(first.outcome.is_delivered());
    assert_eq!(first.candidate.text(), WAITING_TEXT);
    assert!(!first.candidate.is_error());

    let second = relay.tick().await;
    assert!(second.outcome.is_suppressed());
    assert_eq!(notifier.attempts(), vec![WAITING_TEXT.to_string()]);
    assert_eq!(relay.cursor(), PollCursor::new(1100));
}

#[tokio::test]
async fn unrecognized_status_is_reported_and_cursor_kept() {
    let notifier = RecordingNotifier::default();
    let (mut relay, _) = relay_with(
        vec![Ok(homework("X", "unknown_code", 1000))],
        &notifier,
        500,
    );

    let report = relay.tick().await;

    assert!(report.candidate.is_error());
    assert!(report.candidate.text().starts_with("Failure: "));
    assert!(report.candidate.text().contains("unknown_code"));
    assert!(report.outcome.is_delivered());
    assert_eq!(relay.history().state(), GateState::LastWasError);
    assert_eq!(relay.cursor(), PollCursor::new(500));
}

#[tokio::test]
async fn failed_delivery_keeps_history_and_is_retried() {
    let notifier = RecordingNotifier::default();
    let (mut relay, _) = relay_with(
        vec![
            Ok(empty(1000)),
            Ok(homework("X", "rejected", 1100)),
            Ok(homework("X", "rejected", 1200)),
        ],
        &notifier,
        1,
    );

    assert!(relay.tick().await.outcome.is_delivered());

    notifier.set_failing(true);
    let failed = relay.tick().await;
    assert!(matches!(failed.outcome, GateOutcome::Failed(Error::NotifierFailure(_))));
    assert_eq!(relay.history().last_sent_text(), WAITING_TEXT);

    notifier.set_failing(false);
    let retried = relay.tick().await;
    assert!(retried.outcome.is_delivered());
    assert_eq!(retried.candidate.text(), failed.candidate.text());
    assert_eq!(relay.history().last_sent_text(), retried.candidate.text());
    assert_eq!(notifier.attempts().len(), 3);
}

// ---- Properties ----

#[tokio::test]
async fn same_response_twice_is_one_attempt() {
    let notifier = RecordingNotifier::default();
    let response = homework("hw", "reviewing", 1000);
    let (mut relay, _) = relay_with(vec![Ok(response.clone()), Ok(response)], &notifier, 1);

    relay.tick().await;
    let second = relay.tick().await;

    assert!(second.outcome.is_suppressed());
    assert_eq!(notifier.attempts().len(), 1);
}

#[tokio::test]
async fn distinct_failures_are_each_announced() {
    let notifier = RecordingNotifier::default();
    let (mut relay, _) = relay_with(
        vec![
            Err(Error::UnexpectedStatusCode(500)),
            Ok(json!({"homeworks": "nope", "current_date": 1})),
        ],
        &notifier,
        1,
    );

    assert!(relay.tick().await.outcome.is_delivered());
    assert!(relay.tick().await.outcome.is_delivered());

    let attempts = notifier.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0], "Failure: status endpoint returned HTTP 500");
    assert!(attempts[1].starts_with("Failure: unexpected response shape"));
}

#[tokio::test]
async fn identical_failures_are_announced_once() {
    let notifier = RecordingNotifier::default();
    let (mut relay, _) = relay_with(
        vec![
            Err(Error::UnexpectedStatusCode(502)),
            Err(Error::UnexpectedStatusCode(502)),
            Err(Error::UnexpectedStatusCode(502)),
        ],
        &notifier,
        1,
    );

    for _ in 0..3 {
        relay.tick().await;
    }

    assert_eq!(notifier.attempts().len(), 1);
    assert!(relay.history().last_sent_was_error());
}

#[tokio::test]
async fn recovery_after_outage_is_announced() {
    let notifier = RecordingNotifier::default();
    let (mut relay, _) = relay_with(
        vec![
            Ok(empty(1000)),
            Err(Error::MalformedPayload("eof".into())),
            Ok(empty(1100)),
        ],
        &notifier,
        1,
    );

    for _ in 0..3 {
        relay.tick().await;
    }

    let attempts = notifier.attempts();
    assert_eq!(attempts.len(), 3);
    assert_eq!(attempts[2], WAITING_TEXT);
}

#[tokio::test]
async fn cursor_never_decreases_and_holds_on_failure() {
    let notifier = RecordingNotifier::default();
    let (mut relay, seen) = relay_with(
        vec![
            Ok(empty(1000)),
            Err(Error::UnexpectedStatusCode(500)),
            Ok(empty(900)),
            Ok(empty(2000)),
        ],
        &notifier,
        10,
    );

    let mut cursors = Vec::new();
    for _ in 0..4 {
        cursors.push(relay.tick().await.cursor.epoch_secs());
    }

    assert_eq!(cursors, vec![1000, 1000, 1000, 2000]);
    assert_eq!(*seen.lock().unwrap(), vec![10, 1000, 1000, 1000]);
}

#[tokio::test]
async fn missing_watermark_falls_back_to_wall_clock() {
    let notifier = RecordingNotifier::default();
    let before = chrono::Utc::now().timestamp();
    let (mut relay, _) = relay_with(
        vec![Ok(json!({"homeworks": [], "current_date": null}))],
        &notifier,
        1,
    );

    relay.tick().await;

    assert!(relay.cursor().epoch_secs() >= before);
}

#[tokio::test]
async fn only_first_entry_is_reported() {
    let notifier = RecordingNotifier::default();
    let payload = json!({
        "homeworks": [
            {"homework_name": "first", "status": "approved"},
            {"homework_name": "second", "status": "rejected"},
        ],
        "current_date": 1000,
    });
    let (mut relay, _) = relay_with(vec![Ok(payload)], &notifier, 1);

    let report = relay.tick().await;

    assert!(report.candidate.text().contains("\"first\""));
    assert!(!report.candidate.text().contains("second"));
}

#[tokio::test]
async fn stamped_messages_still_dedup_on_verdict() {
    let notifier = RecordingNotifier::default();
    let (source, _) = ScriptedSource::new(vec![
        Ok(homework("X", "approved", 1000)),
        Ok(homework("X", "approved", 2000)),
    ]);
    let mut relay = Relay::new(
        Box::new(source),
        Box::new(notifier.clone()),
        RelaySettings {
            stamp_messages: true,
            ..settings()
        },
        PollCursor::new(1),
    );

    let first = relay.tick().await;
    assert!(first.outcome.is_delivered());
    assert!(
        first
            .candidate
            .message()
            .starts_with("[1970-01-01 00:16:40] Changed status for \"X\".")
    );
    assert_eq!(relay.history().last_sent_text(), first.candidate.text());

    let second = relay.tick().await;
    assert!(second.outcome.is_suppressed());
    assert_eq!(notifier.attempts().len(), 1);
}

#[tokio::test]
async fn slow_delivery_times_out_as_failure() {
    let notifier = RecordingNotifier {
        delay: Some(Duration::from_secs(5)),
        ..RecordingNotifier::default()
    };
    let (source, _) = ScriptedSource::new(vec![Ok(empty(1000))]);
    let mut relay = Relay::new(
        Box::new(source),
        Box::new(notifier.clone()),
        RelaySettings {
            send_timeout: Duration::from_millis(50),
            ..settings()
        },
        PollCursor::new(1),
    );

    let report = relay.tick().await;

    match report.outcome {
        GateOutcome::Failed(Error::NotifierFailure(msg)) => assert!(msg.contains("timed out")),
        other => panic!("expected a delivery timeout, got {other:?}"),
    }
    assert_eq!(relay.history().state(), GateState::Idle);
}

#[tokio::test]
async fn destination_comes_from_settings() {
    let notifier = RecordingNotifier::default();
    let (mut relay, _) = relay_with(vec![Ok(empty(1000))], &notifier, 1);

    relay.tick().await;

    let attempts = notifier.attempts.lock().unwrap();
    assert_eq!(attempts[0].chat_id, "42");
}

#[tokio::test]
async fn delivery_log_names_the_sent_text() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let notifier = RecordingNotifier::default();
    let (mut relay, _) = relay_with(vec![Ok(empty(1000))], &notifier, 1);
    relay.tick().await;

    let logs = logs.contents();
    let line = logs
        .lines()
        .find(|l| l.contains("notification sent"))
        .expect("no delivery log line");
    assert!(line.contains("text="), "field name missing: {line}");
    assert!(line.contains(WAITING_TEXT));
}

// ---- Run loop ----

#[tokio::test(start_paused = true)]
async fn run_keeps_polling_through_failures() {
    let interval = Duration::from_millis(100);
    let source = DownSource::default();
    let notifier = RecordingNotifier::default();
    let relay = Relay::new(
        Box::new(source.clone()),
        Box::new(notifier.clone()),
        RelaySettings {
            poll_interval: interval,
            ..settings()
        },
        PollCursor::new(1),
    );

    let handle = tokio::spawn(relay.run());
    tokio::time::sleep(Duration::from_millis(350)).await;
    handle.abort();

    let fetched_at = source.fetched_at.lock().unwrap().clone();
    assert!(
        fetched_at.len() >= 3,
        "expected repeated polls, got {}",
        fetched_at.len()
    );
    for pair in fetched_at.windows(2) {
        assert!(pair[1] - pair[0] >= interval, "polled before the interval elapsed");
    }
    assert_eq!(
        notifier.attempts(),
        vec!["Failure: status endpoint returned HTTP 500".to_string()]
    );
}
