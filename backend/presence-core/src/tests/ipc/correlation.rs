use super::sent_message;
use crate::error::ipc::IpcError;
use crate::ipc::correlation::{Correlator, run_sweeper};
use crate::ipc::message::{Message, ResponseOutcome, SetActivityRequest, SetActivityResponse};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_secs(5);

fn attached() -> (Correlator, mpsc::UnboundedReceiver<Vec<u8>>) {
    let correlator = Correlator::new(TIMEOUT);
    let (sender, receiver) = mpsc::unbounded_channel();
    correlator.attach(sender);
    (correlator, receiver)
}

fn response(nonce: &str) -> Message {
    Message::SetActivityResponse(SetActivityResponse {
        nonce: Some(nonce.to_string()),
        outcome: ResponseOutcome::Success(Value::Null),
    })
}

/// Records every outcome a continuation receives.
fn recorder() -> (
    Arc<Mutex<Vec<Result<Message, IpcError>>>>,
    Box<dyn FnOnce(Result<Message, IpcError>) + Send>,
) {
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = outcomes.clone();
    (
        outcomes,
        Box::new(move |result| sink.lock().unwrap().push(result)),
    )
}

/// **VALUE**: Verifies that a request without a nonce gets a fresh one and is queued with it.
///
/// **WHY THIS MATTERS**: The response is matched by nonce. A request queued without the
/// nonce it was registered under can never be resolved.
///
/// **BUG THIS CATCHES**: Would catch if the nonce is generated after encoding.
#[tokio::test]
async fn given_request_without_nonce_when_sent_then_assigns_and_queues_nonce() {
    // GIVEN: An attached correlator and a nonce-less request
    let (correlator, mut queue) = attached();
    let (_outcomes, continuation) = recorder();

    // WHEN: Sending
    let id = correlator
        .send_request(SetActivityRequest::new(1, None).into(), continuation)
        .unwrap();

    // THEN: One pending entry and the queued frame carries the same nonce
    assert!(!id.is_empty());
    assert_eq!(correlator.pending_count(), 1);
    let sent = sent_message(&queue.recv().await.unwrap());
    assert_eq!(sent.correlation_id(), Some(id.as_str()));
}

/// **VALUE**: Verifies exactly-once resolution and the either/or routing rule.
///
/// **WHY THIS MATTERS**: A duplicated response must not invoke the continuation twice, and a
/// resolved response must not also be broadcast.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Entries are read instead of removed
/// - `resolve` returns the message after invoking the continuation
#[tokio::test]
async fn given_pending_request_when_response_arrives_twice_then_continuation_runs_once() {
    // GIVEN: A pending request
    let (correlator, _queue) = attached();
    let (outcomes, continuation) = recorder();
    let id = correlator
        .send_request(SetActivityRequest::new(1, None).into(), continuation)
        .unwrap();

    // WHEN: The same response arrives twice
    let first = correlator.resolve(response(&id));
    let second = correlator.resolve(response(&id));

    // THEN: First consumed by the continuation, second handed back as a notification
    assert!(first.is_none());
    assert_eq!(second, Some(response(&id)));
    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].as_ref().unwrap(), &response(&id));
    assert_eq!(correlator.pending_count(), 0);
}

/// **VALUE**: Verifies that unknown or absent nonces go to listeners.
///
/// **WHY THIS MATTERS**: Responses to requests sent by a previous connection (or by another
/// client) are notifications here.
///
/// **BUG THIS CATCHES**: Would catch if unmatched messages are dropped.
#[tokio::test]
async fn given_unmatched_nonce_when_resolving_then_returns_message() {
    // GIVEN: A correlator with nothing pending
    let (correlator, _queue) = attached();
    let unmatched = response("never-sent");
    let anonymous = Message::SetActivityResponse(SetActivityResponse {
        nonce: None,
        outcome: ResponseOutcome::Success(Value::Null),
    });

    // WHEN/THEN: Both are handed back
    assert_eq!(correlator.resolve(unmatched.clone()), Some(unmatched));
    assert_eq!(correlator.resolve(anonymous.clone()), Some(anonymous));
}

/// **VALUE**: Verifies that sending without a connection leaves nothing registered.
///
/// **WHY THIS MATTERS**: An entry registered for a frame that was never queued would sit
/// there until it times out, then report a misleading timeout.
///
/// **BUG THIS CATCHES**: Would catch if the rollback after a failed push is removed.
#[tokio::test]
async fn given_no_connection_when_sending_request_then_fails_without_registering() {
    // GIVEN: A detached correlator
    let correlator = Correlator::new(TIMEOUT);
    let (outcomes, continuation) = recorder();

    // WHEN: Sending
    let result = correlator.send_request(SetActivityRequest::new(1, None).into(), continuation);

    // THEN: NotConnected, nothing pending, continuation never called
    assert!(matches!(result, Err(IpcError::NotConnected { .. })));
    assert_eq!(correlator.pending_count(), 0);
    assert!(outcomes.lock().unwrap().is_empty());
}

/// **VALUE**: Verifies that a nonce already in flight cannot be reused.
///
/// **WHY THIS MATTERS**: Two continuations under one key means one of them is silently lost.
///
/// **BUG THIS CATCHES**: Would catch if `insert` overwrites existing entries.
#[tokio::test]
async fn given_duplicate_nonce_when_sending_then_returns_validation_error() {
    // GIVEN: A pending request with nonce "fixed"
    let (correlator, _queue) = attached();
    let mut message: Message = SetActivityRequest::new(1, None).into();
    message.set_correlation_id("fixed");
    let (_first, continuation) = recorder();
    correlator.send_request(message.clone(), continuation).unwrap();

    // WHEN: Sending again with the same nonce
    let (_second, continuation) = recorder();
    let result = correlator.send_request(message, continuation);

    // THEN: Rejected, original still pending
    assert!(matches!(result, Err(IpcError::Validation { .. })));
    assert_eq!(correlator.pending_count(), 1);
}

/// **VALUE**: Verifies that fire-and-forget messages cannot carry a nonce.
///
/// **WHY THIS MATTERS**: A nonce-bearing message without a pending entry would have its
/// response broadcast, confusing listeners.
///
/// **BUG THIS CATCHES**: Would catch if the nonce check is removed.
#[tokio::test]
async fn given_nonce_when_sending_fire_and_forget_then_rejects() {
    // GIVEN: A message with a nonce
    let (correlator, mut queue) = attached();
    let mut message: Message = SetActivityRequest::new(1, None).into();
    message.set_correlation_id("n");

    // WHEN: Sending it fire-and-forget
    let result = correlator.send_fire_and_forget(message);

    // THEN: Rejected, nothing queued
    assert!(matches!(result, Err(IpcError::Validation { .. })));
    assert!(queue.try_recv().is_err());
}

/// **VALUE**: Verifies timeout eviction.
///
/// **WHY THIS MATTERS**: Without eviction, a companion that never answers leaks one
/// continuation per request for the life of the process.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Entries before their deadline are evicted
/// - Expired continuations are dropped without being told
#[tokio::test]
async fn given_expired_request_when_evicting_then_continuation_receives_timeout() {
    // GIVEN: A pending request
    let (correlator, _queue) = attached();
    let (outcomes, continuation) = recorder();
    correlator
        .send_request(SetActivityRequest::new(1, None).into(), continuation)
        .unwrap();

    // WHEN: Sweeping before and after the deadline
    let early = correlator.evict_expired(Instant::now());
    let late = correlator.evict_expired(Instant::now() + TIMEOUT + Duration::from_millis(1));

    // THEN: Only the late sweep evicts, with RequestTimeout
    assert_eq!(early, 0);
    assert_eq!(late, 1);
    assert_eq!(correlator.pending_count(), 0);
    let outcomes = outcomes.lock().unwrap();
    assert!(matches!(outcomes[0], Err(IpcError::RequestTimeout { .. })));
}

/// **VALUE**: Verifies that disconnect fails every pending request exactly once.
///
/// **WHY THIS MATTERS**: After a disconnect no response can arrive. Callers awaiting
/// `request()` must be released.
///
/// **BUG THIS CATCHES**: Would catch if `fail_all` forgets entries or calls twice.
#[tokio::test]
async fn given_pending_requests_when_failing_all_then_each_receives_disconnected() {
    // GIVEN: Three pending requests counted by one counter
    let (correlator, _queue) = attached();
    let calls = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let calls = calls.clone();
        correlator
            .send_request(
                SetActivityRequest::new(1, None).into(),
                Box::new(move |result| {
                    assert!(matches!(result, Err(IpcError::Disconnected { .. })));
                    calls.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
    }

    // WHEN: Failing all, twice
    correlator.fail_all("test");
    correlator.fail_all("test");

    // THEN: Exactly three invocations
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(correlator.pending_count(), 0);
}

/// **VALUE**: Verifies that a panicking continuation does not escape `resolve`.
///
/// **WHY THIS MATTERS**: `resolve` runs on the read loop. A panic there would kill it.
///
/// **BUG THIS CATCHES**: Would catch if `catch_unwind` is removed around continuations.
#[tokio::test]
async fn given_panicking_continuation_when_resolving_then_panic_is_contained() {
    // GIVEN: A continuation that panics
    let (correlator, _queue) = attached();
    let id = correlator
        .send_request(
            SetActivityRequest::new(1, None).into(),
            Box::new(|_| panic!("continuation failure")),
        )
        .unwrap();

    // WHEN: Resolving
    let routed = correlator.resolve(response(&id));

    // THEN: Treated as handled, entry removed
    assert!(routed.is_none());
    assert_eq!(correlator.pending_count(), 0);
}

/// **VALUE**: Verifies the pending map under concurrent senders, a resolver and an evictor.
///
/// **WHY THIS MATTERS**: Requests are sent from any task while the read loop resolves and
/// the sweeper evicts. Each continuation must see exactly one outcome no matter who wins.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - An entry is taken by both `resolve` and `evict_expired`
/// - An insert racing with a removal is lost and never completes
/// - `pending_count` drifts from the real number of entries
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn given_concurrent_senders_when_resolving_and_evicting_then_each_continuation_runs_once() {
    const SENDERS: usize = 64;

    // GIVEN: An attached correlator shared by every task
    let (correlator, mut queue) = attached();
    let correlator = Arc::new(correlator);
    let calls: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));

    // WHEN: 64 tasks send while one task resolves and another evicts
    let senders: Vec<_> = (0..SENDERS)
        .map(|index| {
            let correlator = correlator.clone();
            let sink = calls.clone();
            tokio::spawn(async move {
                let id = format!("request-{index}");
                let mut request = SetActivityRequest::new(index as u32, None);
                request.nonce = Some(id.clone());
                correlator
                    .send_request(
                        request.into(),
                        Box::new(move |_| *sink.lock().unwrap().entry(id).or_default() += 1),
                    )
                    .unwrap();
            })
        })
        .collect();

    let resolver = tokio::spawn({
        let correlator = correlator.clone();
        async move {
            let mut matched = 0;
            for _ in 0..SENDERS {
                let bytes = queue.recv().await.unwrap();
                let id = sent_message(&bytes).correlation_id().unwrap().to_string();
                if correlator.resolve(response(&id)).is_none() {
                    matched += 1;
                }
            }
            matched
        }
    });

    let evictor = tokio::spawn({
        let correlator = correlator.clone();
        async move {
            let mut evicted = 0;
            for _ in 0..SENDERS {
                evicted += correlator.evict_expired(Instant::now() + TIMEOUT * 2);
                tokio::task::yield_now().await;
            }
            evicted
        }
    });

    for sender in senders {
        sender.await.unwrap();
    }
    let matched = resolver.await.unwrap();
    let evicted = evictor.await.unwrap() + correlator.evict_expired(Instant::now() + TIMEOUT * 2);

    // THEN: Every request completed once, by exactly one path, and nothing is left
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), SENDERS);
    assert!(calls.values().all(|count| *count == 1), "{calls:?}");
    assert_eq!(matched + evicted, SENDERS);
    assert_eq!(correlator.pending_count(), 0);
}

/// **VALUE**: Verifies that the sweeper stops once its connection is gone.
///
/// **WHY THIS MATTERS**: After end-of-stream nothing can be pending, but the sweeper would
/// otherwise keep ticking on the dead connection until the next connect.
///
/// **BUG THIS CATCHES**: Would catch if the sweeper only honours the cancel signal.
#[tokio::test]
async fn given_running_sweeper_when_correlator_detaches_then_sweeper_exits() {
    // GIVEN: A sweeper over an attached correlator, with cancel never signalled
    let (correlator, _queue) = attached();
    let correlator = Arc::new(correlator);
    let (_cancel, cancel_rx) = watch::channel(false);
    let sweeper = tokio::spawn(run_sweeper(correlator.clone(), cancel_rx));
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!sweeper.is_finished());

    // WHEN: The connection goes away
    correlator.detach();

    // THEN: The sweeper finishes on its next tick
    let finished = tokio::time::timeout(Duration::from_secs(2), sweeper).await;
    assert!(matches!(finished, Ok(Ok(()))));
}
