use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use nageyell_camera::ScriptedCamera;
use nageyell_events::{EventSink, LocalBus};
use nageyell_generator::{generation_error, CannedGenerator, MessageGenerator};
use nageyell_nfc::{ScriptedTag, TagMonitor};
use nageyell_session::{Session, SessionSettings};
use nageyell_types::{
    events::EventPayload,
    frame::{DecodedCode, Facing},
    record::{ScoreRecord, ValidationReason},
    status::{CommitOutcome, Status},
    Result,
};
use nageyell_vision::{fixtures::qr_frame, QrDetector};
use tokio::time::sleep;

const CLEAR: Duration = Duration::from_millis(3000);

/// Generator that always fails with the same detail.
struct RefusingGenerator;

#[async_trait]
impl MessageGenerator for RefusingGenerator {
    async fn generate(&self, _credential: &str, _point: i64) -> Result<String> {
        Err(generation_error("quota exceeded"))
    }
}

/// Generator that takes a while to answer.
struct SlowGenerator(Duration);

#[async_trait]
impl MessageGenerator for SlowGenerator {
    async fn generate(&self, _credential: &str, point: i64) -> Result<String> {
        sleep(self.0).await;
        Ok(CannedGenerator::message_for(point).to_string())
    }
}

type TestSession<G> = Session<ScriptedCamera, QrDetector, ScriptedTag, G>;

fn session_with<G: MessageGenerator>(
    camera: ScriptedCamera,
    tag: ScriptedTag,
    generator: G,
) -> (TestSession<G>, TagMonitor, LocalBus) {
    let bus = LocalBus::new(256);
    let sink: Arc<dyn EventSink> = Arc::new(bus.clone());
    let monitor = tag.monitor();
    let session = Session::new(
        SessionSettings::default(),
        camera,
        QrDetector::new(),
        tag,
        generator,
        sink,
    );
    (session, monitor, bus)
}

fn written_records(monitor: &TagMonitor) -> Vec<ScoreRecord> {
    monitor
        .writes()
        .iter()
        .map(|message| {
            let text = message.first_text().expect("text record");
            ScoreRecord::from_payload(&text.text).expect("score payload")
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn scanned_credential_generates_message_and_writes_tag() {
    let camera =
        ScriptedCamera::new().with_frames(Facing::Environment, vec![qr_frame("sk-live-abc")]);
    let (session, monitor, _bus) = session_with(camera, ScriptedTag::new(), CannedGenerator::new());

    assert!(session.start().await);
    let outcome = session.next_detection().await.expect("detection");
    assert_eq!(outcome, CommitOutcome::Written);

    let state = session.snapshot();
    assert_eq!(state.credential.as_deref(), Some("sk-live-abc"));
    assert_eq!(state.message, CannedGenerator::message_for(1));
    assert!(!state.generating);
    assert_eq!(state.status, Some(Status::WriteSucceeded));
    assert_eq!(state.scan_status, Some(Status::CodeDetected));

    let records = written_records(&monitor);
    assert_eq!(
        records,
        vec![ScoreRecord {
            point: 1,
            message: CannedGenerator::message_for(1).to_string(),
        }]
    );

    sleep(CLEAR - Duration::from_millis(1)).await;
    assert_eq!(session.snapshot().status, Some(Status::WriteSucceeded));
    sleep(Duration::from_millis(2)).await;
    assert_eq!(session.snapshot().status, None);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn valid_message_is_written_as_pretty_json() {
    let (session, monitor, _bus) =
        session_with(ScriptedCamera::new(), ScriptedTag::new(), CannedGenerator::new());

    let outcome = session.on_message_committed("great job").await;
    assert!(outcome.is_written());

    let writes = monitor.writes();
    assert_eq!(writes.len(), 1);
    let text = writes[0].first_text().expect("text record");
    assert_eq!(text.language, "ja");
    assert!(text.text.contains("\"point\": 1"));
    assert!(text.text.contains("\"message\": \"great job\""));
    assert_eq!(session.snapshot().status, Some(Status::WriteSucceeded));

    sleep(CLEAR + Duration::from_millis(1)).await;
    assert_eq!(session.snapshot().status, None);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_score_never_reaches_the_tag() {
    let (session, monitor, _bus) =
        session_with(ScriptedCamera::new(), ScriptedTag::new(), CannedGenerator::new());

    // No credential yet, so asking for a message reports that instead.
    let outcome = session.on_score_committed(1500).await;
    assert!(matches!(outcome, CommitOutcome::Rejected(_)));
    assert_eq!(session.snapshot().status, Some(Status::CredentialMissing));

    let before = session.snapshot().status;
    let outcome = session.on_message_committed("hi").await;
    match outcome {
        CommitOutcome::Rejected(report) => {
            assert!(report.contains(ValidationReason::PointOutOfRange));
            assert!(!report.contains(ValidationReason::MissingMessage));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(session.snapshot().status, before);
    assert_eq!(monitor.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn repeated_writes_each_get_their_own_timer() {
    let (session, monitor, bus) =
        session_with(ScriptedCamera::new(), ScriptedTag::new(), CannedGenerator::new());
    let mut events = bus.subscribe();

    assert!(session.on_message_committed("great job").await.is_written());
    sleep(Duration::from_millis(1000)).await;
    assert!(session.on_message_committed("great job").await.is_written());
    assert_eq!(monitor.write_count(), 2);

    // The first timer fires at 3000 ms but the second success is still current.
    sleep(Duration::from_millis(2500)).await;
    assert_eq!(session.snapshot().status, Some(Status::WriteSucceeded));
    sleep(Duration::from_millis(600)).await;
    assert_eq!(session.snapshot().status, None);

    let mut shown = 0;
    let mut cleared = 0;
    while let Some(Some(event)) = events.next().now_or_never() {
        match event.payload {
            EventPayload::Status(Some(Status::WriteSucceeded)) => shown += 1,
            EventPayload::Status(None) => cleared += 1,
            _ => {}
        }
    }
    assert_eq!(shown, 2);
    assert_eq!(cleared, 1);
}

#[tokio::test(start_paused = true)]
async fn unsupported_platform_is_reported_only_for_valid_input() {
    let (session, monitor, _bus) = session_with(
        ScriptedCamera::new(),
        ScriptedTag::unsupported(),
        CannedGenerator::new(),
    );

    // A blank message asks for a generated one, which needs a credential.
    let outcome = session.on_message_committed("   ").await;
    assert!(matches!(outcome, CommitOutcome::Rejected(_)));
    assert_eq!(session.snapshot().status, Some(Status::CredentialMissing));

    let outcome = session.on_message_committed("great job").await;
    assert_eq!(outcome, CommitOutcome::Unsupported);
    assert_eq!(session.snapshot().status, Some(Status::UnsupportedPlatform));
    assert_eq!(monitor.write_count(), 0);

    sleep(CLEAR * 2).await;
    assert_eq!(session.snapshot().status, Some(Status::UnsupportedPlatform));
}

#[tokio::test(start_paused = true)]
async fn failed_write_shows_platform_detail() {
    let tag = ScriptedTag::new().fail_next("tag moved away");
    let (session, monitor, _bus) = session_with(ScriptedCamera::new(), tag, CannedGenerator::new());

    let outcome = session.on_message_committed("great job").await;
    assert_eq!(outcome, CommitOutcome::Failed("tag moved away".into()));
    assert_eq!(
        session.snapshot().status,
        Some(Status::WriteFailed("tag moved away".into()))
    );
    assert_eq!(monitor.write_count(), 1);

    // The next attempt is independent of the failed one.
    assert!(session.on_score_committed(42).await.is_written());
    assert_eq!(written_records(&monitor)[1].point, 42);
}

#[tokio::test(start_paused = true)]
async fn generation_failure_leaves_message_empty() {
    let (session, monitor, _bus) =
        session_with(ScriptedCamera::new(), ScriptedTag::new(), RefusingGenerator);

    let outcome = session
        .on_credential_acquired(DecodedCode::new("sk-expired"))
        .await;
    match outcome {
        CommitOutcome::Rejected(report) => {
            assert!(report.contains(ValidationReason::MissingMessage))
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    let state = session.snapshot();
    assert!(state.message.is_empty());
    assert!(!state.generating);
    assert_eq!(
        state.status,
        Some(Status::GenerationFailed("quota exceeded".into()))
    );
    assert_eq!(monitor.write_count(), 0);

    sleep(CLEAR + Duration::from_millis(1)).await;
    assert_eq!(session.snapshot().status, None);
}

#[tokio::test(start_paused = true)]
async fn typed_message_wins_over_late_generation() {
    let (session, monitor, _bus) = session_with(
        ScriptedCamera::new(),
        ScriptedTag::new(),
        SlowGenerator(Duration::from_millis(1000)),
    );

    let (generated, typed) = tokio::join!(
        session.on_credential_acquired(DecodedCode::new("sk-live")),
        async {
            sleep(Duration::from_millis(100)).await;
            session.on_message_committed("mine").await
        }
    );
    assert!(generated.is_written());
    assert!(typed.is_written());

    let records = written_records(&monitor);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.message == "mine"));
    assert_eq!(session.snapshot().message, "mine");
}

#[tokio::test(start_paused = true)]
async fn reset_message_asks_for_a_fresh_one() {
    let (session, monitor, _bus) =
        session_with(ScriptedCamera::new(), ScriptedTag::new(), CannedGenerator::new());

    assert!(session.on_message_committed("old words").await.is_written());
    // Without a credential the reset leaves the form empty.
    assert!(matches!(
        session.reset_message().await,
        CommitOutcome::Rejected(_)
    ));
    assert_eq!(session.snapshot().status, Some(Status::CredentialMissing));

    assert!(session.handle().snapshot().message.is_empty());
    assert!(session
        .on_credential_acquired(DecodedCode::new("sk-live"))
        .await
        .is_written());
    assert!(session.on_score_committed(900).await.is_written());
    assert!(session.reset_message().await.is_written());

    let records = written_records(&monitor);
    let last = records.last().expect("written");
    assert_eq!(last.point, 900);
    assert_eq!(last.message, CannedGenerator::message_for(900));
}

#[tokio::test(start_paused = true)]
async fn cancelled_composition_does_not_block_later_triggers() {
    let camera = ScriptedCamera::new().with_frames(Facing::Environment, vec![qr_frame("sk")]);
    let (session, monitor, _bus) = session_with(
        camera,
        ScriptedTag::new(),
        SlowGenerator(Duration::from_millis(5000)),
    );

    assert!(session.start().await);
    let waited =
        tokio::time::timeout(Duration::from_millis(1000), session.next_detection()).await;
    assert!(waited.is_err());

    let state = session.snapshot();
    assert_eq!(state.credential.as_deref(), Some("sk"));
    assert!(!state.generating);
    assert!(state.message.is_empty());

    let outcome = session.on_score_committed(500).await;
    assert!(outcome.is_written());
    let records = written_records(&monitor);
    assert_eq!(
        records,
        vec![ScoreRecord {
            point: 500,
            message: CannedGenerator::message_for(500).to_string(),
        }]
    );
    assert!(!session.snapshot().generating);
}

#[tokio::test(start_paused = true)]
async fn overlapping_writes_are_not_serialized() {
    let tag = ScriptedTag::new()
        .with_delay(Duration::from_millis(500))
        .fail_next("tag moved away");
    let (session, monitor, bus) = session_with(ScriptedCamera::new(), tag, CannedGenerator::new());
    let mut events = bus.subscribe();

    let (first, second) = tokio::join!(session.on_message_committed("first"), async {
        sleep(Duration::from_millis(100)).await;
        session.on_message_committed("second").await
    });

    // Both attempts reached the tag; the first was still in flight when the second began.
    assert_eq!(first, CommitOutcome::Failed("tag moved away".into()));
    assert_eq!(second, CommitOutcome::Written);
    let records = written_records(&monitor);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].message, "first");
    assert_eq!(records[1].message, "second");

    // The attempt that resolved last owns the status.
    assert_eq!(session.snapshot().status, Some(Status::WriteSucceeded));
    let mut shown = Vec::new();
    while let Some(Some(event)) = events.next().now_or_never() {
        if let EventPayload::Status(Some(status)) = event.payload {
            shown.push(status);
        }
    }
    assert_eq!(
        shown,
        vec![
            Status::WriteFailed("tag moved away".into()),
            Status::WriteSucceeded
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn blank_message_commit_generates_a_new_one() {
    let (session, monitor, _bus) =
        session_with(ScriptedCamera::new(), ScriptedTag::new(), CannedGenerator::new());

    assert!(session
        .on_credential_acquired(DecodedCode::new("sk-live"))
        .await
        .is_written());
    assert!(session.on_score_committed(700).await.is_written());

    let outcome = session.on_message_committed("  ").await;
    assert!(outcome.is_written());
    assert_eq!(session.snapshot().message, CannedGenerator::message_for(700));
    let last = written_records(&monitor).pop().expect("written");
    assert_eq!(last.point, 700);
    assert_eq!(last.message, CannedGenerator::message_for(700));
}
