//! 통합 테스트 -- 라인 처리부터 이력 조회, 실제 파일 tail까지 전체 흐름 검증

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use postwatch_core::pipeline::Pipeline;
use postwatch_tracker::{
    CompletedRecord, CompletionSink, DeliveryPipelineBuilder, LocalFs, TailState, Tailer, Tracker,
    TrackerConfig, TrackerConfigBuilder,
};

const TO_RULE: &str = r"id=(?P<id>\w+).*to=(?P<to>\S+)";
const STATUS_RULE: &str =
    r"id=(?P<id>\w+).*status=(?P<status>\w+) from=(?P<from>\S+) reason=(?P<reason>.+)";

#[derive(Clone, Default)]
struct CollectingSink {
    completed: Arc<Mutex<Vec<(CompletedRecord, bool)>>>,
    lines: Arc<Mutex<Vec<String>>>,
}

impl CompletionSink for CollectingSink {
    fn on_completed(&mut self, record: &CompletedRecord, notify: bool) {
        self.completed.lock().unwrap().push((record.clone(), notify));
    }

    fn emit_log_line(&mut self, line: &str) {
        self.lines.lock().unwrap().push(line.to_owned());
    }
}

fn scenario_config(log_file: &Path) -> TrackerConfig {
    TrackerConfigBuilder::new()
        .log_file(log_file)
        .poll_interval_ms(20)
        .patterns([TO_RULE, STATUS_RULE])
        .froms(["mta1"])
        .build()
        .unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..250 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within 5s");
}

fn append(path: &Path, text: &str) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
}

/// 두 라인에 걸친 전달 이벤트가 하나의 레코드로 완성되고 조회되는 흐름
#[test]
fn test_two_line_delivery_scenario() {
    let config = scenario_config(Path::new("/unused"));
    let mut tracker = Tracker::new(&config).unwrap();
    let mut sink = CollectingSink::default();

    assert!(tracker
        .process_line_at("id=abc to=a@example.com", at(100), &mut sink)
        .is_none());
    let done = tracker
        .process_line_at(
            "id=abc status=bounced from=mta1 reason=mailbox full",
            at(101),
            &mut sink,
        )
        .unwrap();

    assert!(done.notify);
    assert_eq!(done.record.to, "a@example.com");
    assert_eq!(done.record.status, "bounced");
    assert_eq!(done.record.reason, "mailbox full");

    let completed = sink.completed.lock().unwrap().clone();
    assert_eq!(completed.len(), 1);
    assert!(completed[0].1);

    let now = at(100 + 2 * 3600 + 5 * 60);
    let lower = tracker.email_state("a@example.com", now);
    assert_eq!(
        lower,
        vec!["1970-01-01T00:01:40 (2h5m ago) a@example.com is bounced: mailbox full"]
    );
    // 대소문자를 무시하고 같은 항목을 반환
    assert_eq!(tracker.email_state("A@Example.com", now), lower);

    assert_eq!(
        tracker.email_state("nobody@x.com", now),
        vec!["I don't have nobody@x.com in my history"]
    );
    assert!(tracker.history("nobody@x.com").is_empty());
}

/// 신뢰하지 않는 발신자의 레코드는 이력에 남지 않음
#[test]
fn test_untrusted_sender_never_reaches_history() {
    let config = scenario_config(Path::new("/unused"));
    let mut tracker = Tracker::new(&config).unwrap();
    let mut sink = CollectingSink::default();

    tracker.process_line_at("id=x1 to=b@example.com", at(0), &mut sink);
    tracker.process_line_at(
        "id=x1 status=sent from=relay9 reason=queued as 12345",
        at(1),
        &mut sink,
    );

    assert!(sink.completed.lock().unwrap().is_empty());
    assert!(tracker.history("b@example.com").is_empty());
    assert_eq!(tracker.accumulator().incomplete_len(), 0);
}

/// 같은 상태의 반복 완성은 알림 한 번, 상태 변화는 새 알림
#[test]
fn test_dedup_across_repeated_completions() {
    let config = scenario_config(Path::new("/unused"));
    let mut tracker = Tracker::new(&config).unwrap();
    let mut sink = CollectingSink::default();

    for status in ["deferred", "deferred", "sent"] {
        tracker.process_line_at("id=q1 to=c@example.com", at(0), &mut sink);
        tracker.process_line_at(
            &format!("id=q1 status={status} from=mta1 reason=r"),
            at(0),
            &mut sink,
        );
    }

    let notifies: Vec<bool> = sink
        .completed
        .lock()
        .unwrap()
        .iter()
        .map(|(_, n)| *n)
        .collect();
    assert_eq!(notifies, vec![true, false, true]);
    assert_eq!(sink.lines.lock().unwrap().len(), 2);
    assert_eq!(tracker.history("c@example.com").len(), 3);
}

/// 실제 파일: 시작 전 내용은 건너뛰고, 로테이션 후 새 파일은 처음부터 읽음
#[tokio::test]
async fn test_real_file_startup_and_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mainlog");
    append(&path, "before start 1\nbefore start 2\n");

    let tailer = Tailer::new(LocalFs, &path, Duration::from_millis(20), None);
    let mut status = tailer.subscribe();
    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(tailer.run(tx, cancel.clone()));

    status
        .wait_for(|s| *s == TailState::Following)
        .await
        .unwrap();

    append(&path, "after start\n");
    let line = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(line, "after start");

    // logrotate 방식: rename 후 새 파일 생성
    std::fs::rename(&path, dir.path().join("mainlog.1")).unwrap();
    append(&path, "new epoch 1\nnew epoch 2\n");

    for expected in ["new epoch 1", "new epoch 2"] {
        let line = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line, expected);
    }

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

/// 실제 파일: copytruncate 방식 로테이션
#[tokio::test]
async fn test_real_file_truncation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mainlog");
    append(&path, "");

    let tailer = Tailer::new(LocalFs, &path, Duration::from_millis(20), None);
    let mut status = tailer.subscribe();
    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(tailer.run(tx, cancel.clone()));
    status
        .wait_for(|s| *s == TailState::Following)
        .await
        .unwrap();

    append(&path, "a line long enough to be truncated away\n");
    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, "a line long enough to be truncated away");

    std::fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(&path)
        .unwrap();
    append(&path, "short\n");

    let line = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(line, "short");

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

/// 파이프라인 전체: 실제 파일 tail -> 완성 -> 싱크 -> 조회
#[tokio::test]
async fn test_pipeline_end_to_end_on_real_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mainlog");
    append(&path, "id=old to=old@example.com\nid=old status=sent from=mta1 reason=ok\n");

    let sink = CollectingSink::default();
    let mut pipeline = DeliveryPipelineBuilder::new()
        .config(scenario_config(&path))
        .build(sink.clone())
        .unwrap();
    let queries = pipeline.query_handle();
    pipeline.start().await.unwrap();

    let mut status = pipeline.tail_status().unwrap();
    status
        .wait_for(|s| *s == TailState::Following)
        .await
        .unwrap();

    append(
        &path,
        "id=abc to=a@example.com\nnoise line\nid=abc status=bounced from=mta1 reason=mailbox full\n",
    );
    eventually(|| !sink.lines.lock().unwrap().is_empty()).await;
    assert_eq!(
        sink.lines.lock().unwrap().clone(),
        vec!["a@example.com is bounced: mailbox full"]
    );

    let replies = queries.email_state("A@EXAMPLE.COM").await.unwrap();
    assert_eq!(replies.len(), 1);
    assert!(replies[0].ends_with("a@example.com is bounced: mailbox full"));

    let old = queries.history("old@example.com").await.unwrap();
    assert!(old.is_empty());

    assert!(pipeline.health_check().await.is_healthy());
    pipeline.stop().await.unwrap();
}
