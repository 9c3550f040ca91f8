// tests/decrypt_tests.rs
//! Single and batch decryption through the orchestrator

mod common;
mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use submission_vault::decrypt::DecryptionOrchestrator;
use submission_vault::error::{ErrorKind, VaultError};
use submission_vault::keys::KeyProvider;
use submission_vault::store::SubmissionStore;
use submission_vault::submission::SubmissionFilter;
use support::{
    ada_payload, flip_bit, local_keys, sealed_submission, sqlite_store, student_payload,
    SlowKeyProvider,
};
use tempfile::{tempdir, TempDir};

struct Fixture {
    _dir: TempDir,
    store: Arc<dyn SubmissionStore>,
    keys: Arc<dyn KeyProvider>,
}

async fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let store = sqlite_store(&dir).await;
    Fixture {
        _dir: dir,
        store,
        keys: local_keys(),
    }
}

impl Fixture {
    async fn add(&self, name: &str, gpa: f64) -> String {
        let new = sealed_submission(self.keys.as_ref(), &student_payload(name, "Eng", gpa)).await;
        self.store.create(new).await.unwrap().id
    }

    /// Stored with one ciphertext bit flipped
    async fn add_tampered(&self) -> String {
        let mut new = sealed_submission(self.keys.as_ref(), &ada_payload()).await;
        flip_bit(&mut new.ciphertext, 3);
        self.store.create(new).await.unwrap().id
    }

    fn orchestrator(&self) -> DecryptionOrchestrator {
        DecryptionOrchestrator::new(self.store.clone(), self.keys.clone())
    }
}

#[tokio::test]
async fn decrypted_view_has_payload_and_no_ciphertext() {
    common::setup();
    let fx = fixture().await;
    let new = sealed_submission(fx.keys.as_ref(), &ada_payload()).await;
    let id = fx.store.create(new).await.unwrap().id;

    let view = fx.orchestrator().decrypt_submission(&id).await.unwrap();
    assert_eq!(view.id, id);
    assert_eq!(view.payload.field_str("name"), Some("Ada"));
    assert_eq!(view.payload.gpa(), Some(3.9));

    let json = serde_json::to_value(&view).unwrap();
    let obj = json.as_object().unwrap();
    assert!(!obj.contains_key("ciphertext"));
    assert!(!obj.contains_key("nonce"));
    assert_eq!(obj["name"], "Ada");
    assert!(obj.contains_key("submittedAt"));
}

#[tokio::test]
async fn payload_cannot_shadow_record_metadata() {
    let fx = fixture().await;
    let honest = fx.add("Grace", 3.7).await;
    for (field, value) in [("id", honest.as_str()), ("submittedAt", "1999-01-01T00:00:00Z")] {
        let payload = ada_payload().with_field(field, value);
        let new = sealed_submission(fx.keys.as_ref(), &payload).await;
        let id = fx.store.create(new).await.unwrap().id;

        let err = fx.orchestrator().decrypt_submission(&id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedPayload, "{field}");

        let report = fx.orchestrator().batch_decrypt(&[id.clone(), honest.clone()]).await;
        assert_eq!(report.successes.len(), 1);
        assert_eq!(report.failures[0].id, id);
        let json = serde_json::to_value(&report.successes[0]).unwrap();
        assert_eq!(json["id"], honest.as_str());
    }
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let fx = fixture().await;
    assert!(matches!(
        fx.orchestrator().decrypt_submission("deadbeef").await,
        Err(VaultError::NotFound(_))
    ));
}

#[tokio::test]
async fn tampered_record_is_authentication_failure() {
    let fx = fixture().await;
    let id = fx.add_tampered().await;
    assert!(matches!(
        fx.orchestrator().decrypt_submission(&id).await,
        Err(VaultError::AuthenticationFailure)
    ));
}

#[tokio::test]
async fn batch_partitions_successes_and_failures() {
    let fx = fixture().await;
    let mut ids = Vec::new();
    for (name, gpa) in [("Ada", 3.9), ("Grace", 3.7), ("Alan", 3.2)] {
        ids.push(fx.add(name, gpa).await);
    }
    let bad = fx.add_tampered().await;
    ids.insert(2, bad.clone());
    ids.push(fx.add("Edsger", 3.4).await);

    let report = fx.orchestrator().batch_decrypt(&ids).await;
    assert_eq!(report.total, 5);
    assert_eq!(report.success_count, 4);
    assert_eq!(report.failure_count, 1);
    assert_eq!(report.successes.len() + report.failures.len(), ids.len());
    assert_eq!(report.failures[0].id, bad);
    assert_eq!(report.failures[0].reason, ErrorKind::AuthenticationFailure);

    // Input order survives within the success list
    let names: Vec<_> = report
        .successes
        .iter()
        .map(|v| v.payload.field_str("name").unwrap().to_string())
        .collect();
    assert_eq!(names, ["Ada", "Grace", "Alan", "Edsger"]);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["successCount"], 4);
    assert_eq!(json["failures"][0]["reason"], "authentication_failure");
}

#[tokio::test]
async fn batch_reports_unknown_ids_and_keeps_duplicates() {
    let fx = fixture().await;
    let id = fx.add("Ada", 3.9).await;
    let ids = vec![id.clone(), "nope".to_string(), id.clone()];

    let report = fx.orchestrator().batch_decrypt(&ids).await;
    assert_eq!(report.total, 3);
    assert_eq!(report.success_count, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, "nope");
    assert_eq!(report.failures[0].reason, ErrorKind::NotFound);
}

#[tokio::test]
async fn empty_batch_is_an_empty_report() {
    let fx = fixture().await;
    let report = fx.orchestrator().batch_decrypt(&[]).await;
    assert_eq!(report.total, 0);
    assert!(report.successes.is_empty() && report.failures.is_empty());
}

#[tokio::test]
async fn slow_item_times_out_without_stalling_the_rest() {
    let fx = fixture().await;
    let slow_keys = Arc::new(SlowKeyProvider::new(fx.keys.clone(), Duration::from_secs(5)));

    let fast = fx.add("Fast", 3.0).await;
    let slow = fx.add("Slow", 3.1).await;
    slow_keys.slow_on(Some(fx.store.get(&slow).await.unwrap().nonce));

    let orchestrator = DecryptionOrchestrator::new(fx.store.clone(), slow_keys.clone())
        .with_limits(4, Duration::from_millis(150));
    let started = Instant::now();
    let report = orchestrator
        .batch_decrypt(&[slow.clone(), fast.clone()])
        .await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(report.success_count, 1);
    assert_eq!(report.successes[0].id, fast);
    assert_eq!(report.failures[0].id, slow);
    assert_eq!(report.failures[0].reason, ErrorKind::UpstreamService);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn batch_respects_concurrency_limit() {
    let fx = fixture().await;
    let slow_keys = Arc::new(SlowKeyProvider::new(fx.keys.clone(), Duration::from_millis(30)));
    slow_keys.slow_on(None);

    let mut ids = Vec::new();
    for i in 0..12 {
        ids.push(fx.add(&format!("S{i}"), 3.0).await);
    }
    let orchestrator = DecryptionOrchestrator::new(fx.store.clone(), slow_keys.clone())
        .with_limits(3, Duration::from_secs(5));
    let report = orchestrator.batch_decrypt(&ids).await;

    assert_eq!(report.success_count, 12);
    let peak = slow_keys.peak_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak {peak}");
    assert!(peak >= 2, "no parallelism observed");
}

#[tokio::test]
async fn decrypt_all_honours_filter() {
    let fx = fixture().await;
    fx.add("Ada", 3.9).await;
    fx.add("Grace", 2.9).await;
    fx.add_tampered().await;

    let all = fx
        .orchestrator()
        .decrypt_all(&SubmissionFilter::all())
        .await
        .unwrap();
    assert_eq!(all.total, 3);
    assert_eq!(all.failure_count, 1);

    let top = SubmissionFilter {
        min_gpa: Some(3.5),
        ..SubmissionFilter::default()
    };
    let report = fx.orchestrator().decrypt_all(&top).await.unwrap();
    // Ada plus the tampered copy of Ada's record
    assert_eq!(report.total, 2);
    assert_eq!(report.success_count, 1);
}
