use std::sync::Arc;

use placeholder_rust::config::{PlaceholderConfig, SenderFallback};
use placeholder_rust::placeholder::matcher::{InsertReason, ReplacementOutcome};
use placeholder_rust::placeholder::policy::GracePeriod;
use placeholder_rust::store::traits::ReadTransaction;
use placeholder_rust::types::{
    Aci, FailedEnvelope, RecoveredContent, RecoveredEnvelope, ServiceAddress, Timestamp,
};
use placeholder_rust::{ManualClock, MemoryMessageStore, MessageProcessor};

const T: u64 = 1_700_000_000_000;

fn processor_with_store() -> (Arc<MessageProcessor>, MemoryMessageStore) {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = MemoryMessageStore::new();
    let config = PlaceholderConfig::new(
        GracePeriod::from_secs(48 * 3600).expect("grace period"),
        SenderFallback::StableIdentityOnly,
    );
    let processor = Arc::new(MessageProcessor::new(
        Arc::new(store.clone()),
        config,
        Arc::new(ManualClock::new(Timestamp::from_millis(T))),
    ));
    (processor, store)
}

fn sender(n: usize) -> ServiceAddress {
    ServiceAddress::from_aci(
        Aci::parse(&format!("00000000-0000-4000-8000-{n:012}")).expect("aci"),
    )
}

fn recovered(sender: ServiceAddress, ts: u64, body: String) -> RecoveredEnvelope {
    RecoveredEnvelope {
        sender,
        timestamp: Timestamp::from_millis(ts),
        untrusted_group_id: None,
        content: RecoveredContent::text(body),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_receipts_replace_at_most_once() {
    const RECEIPTS: usize = 8;
    let (processor, _store) = processor_with_store();
    let placeholder = processor
        .handle_decryption_failure(&FailedEnvelope {
            timestamp: Timestamp::from_millis(T - 10),
            sender: sender(1),
            untrusted_group_id: None,
        })
        .await
        .expect("ok")
        .expect("created");

    let mut handles = Vec::with_capacity(RECEIPTS);
    for i in 0..RECEIPTS {
        let processor = Arc::clone(&processor);
        handles.push(tokio::spawn(async move {
            processor
                .handle_decrypted_envelope(recovered(sender(1), T - 10, format!("copy {i}")))
                .await
        }));
    }

    let mut replaced = 0;
    let mut superseded = 0;
    for handle in handles {
        match handle.await.expect("task").expect("ok") {
            ReplacementOutcome::Replaced { row_id } => {
                assert_eq!(row_id, placeholder.row_id());
                replaced += 1;
            }
            ReplacementOutcome::InsertedAsNew {
                reason: InsertReason::AlreadySuperseded,
                ..
            } => superseded += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(replaced, 1);
    assert_eq!(superseded, RECEIPTS - 1);

    let history = processor
        .thread_history(placeholder.thread_id())
        .await
        .expect("history");
    assert_eq!(history.len(), RECEIPTS);
    let row = history[0].as_placeholder().expect("placeholder kept its position");
    assert!(row.is_superseded());
    assert!(row.recovered_content().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_pipelines_keep_one_row_per_message() {
    const SENDERS: usize = 16;
    let (processor, store) = processor_with_store();

    let mut handles = Vec::new();
    for n in 0..SENDERS {
        let failures = Arc::clone(&processor);
        handles.push(tokio::spawn(async move {
            failures
                .handle_decryption_failure(&FailedEnvelope {
                    timestamp: Timestamp::from_millis(T - 100),
                    sender: sender(n),
                    untrusted_group_id: None,
                })
                .await
                .map(|_| ())
                .map_err(|e| e.to_string())
        }));
        let receipts = Arc::clone(&processor);
        handles.push(tokio::spawn(async move {
            receipts
                .handle_decrypted_envelope(recovered(sender(n), T - 100, format!("from {n}")))
                .await
                .map(|_| ())
                .map_err(|e| e.to_string())
        }));
    }
    for handle in handles {
        handle.await.expect("task").expect("ok");
    }

    // Whichever pipeline ran first, each conversation ends with the recovered
    // content visible exactly once.
    for n in 0..SENDERS {
        let aci = sender(n).aci.expect("aci");
        let thread = store
            .begin_read()
            .await
            .contact_thread(&aci)
            .expect("read")
            .expect("thread exists");
        let history = processor.thread_history(&thread).await.expect("history");
        let with_content = history
            .iter()
            .filter(|row| row.content().is_some())
            .count();
        assert_eq!(with_content, 1, "sender {n}: {history:?}");
    }
}
