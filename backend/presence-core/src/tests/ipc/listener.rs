use crate::error::listener::ListenerError;
use crate::ipc::listener::{EventListener, ListenerRegistry, Notification, listener_fn};
use crate::ipc::message::{
    Dispatch, DispatchEvent, ErrorPayload, Message, ReadyEvent, ResponseOutcome,
    SetActivityResponse,
};
use crate::ipc::packet::CloseFrame;

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

fn ready() -> Notification {
    Notification::Message(Message::Dispatch(Dispatch {
        nonce: None,
        event: DispatchEvent::Ready(ReadyEvent::default()),
    }))
}

/// Appends its name to a shared log for every notification.
struct Recording {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl EventListener for Recording {
    fn on_notification(&self, _notification: &Notification) {
        self.log.lock().unwrap().push(self.name);
    }
}

/// Records which typed hook was invoked.
#[derive(Default)]
struct Hooks {
    calls: Mutex<Vec<String>>,
}

impl EventListener for Hooks {
    fn on_ready(&self, _event: &ReadyEvent) {
        self.calls.lock().unwrap().push("ready".into());
    }

    fn on_error(&self, error: &ErrorPayload) {
        self.calls.lock().unwrap().push(format!("error:{}", error.code));
    }

    fn on_unknown_event(&self, name: &str, _data: &Value) {
        self.calls.lock().unwrap().push(format!("event:{name}"));
    }

    fn on_message(&self, message: &Message) {
        let command = message.command().unwrap_or("none");
        self.calls.lock().unwrap().push(format!("message:{command}"));
    }

    fn on_close(&self, close: &CloseFrame) {
        self.calls.lock().unwrap().push(format!("close:{}", close.code));
    }
}

/// **VALUE**: Verifies registration-order dispatch, even when the first listener panics.
///
/// **WHY THIS MATTERS**: The readiness listener is first so later listeners see READY state.
/// A faulty listener must not starve those after it or kill the read loop.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Dispatch order changes (e.g. a HashMap-backed registry)
/// - A panic aborts the remaining fan-out
/// - The panic is not reported with the listener's index
#[test]
fn given_three_listeners_and_first_panics_when_dispatching_then_all_run_in_order() {
    // GIVEN: L1 panics, L2 and L3 record
    let log = Arc::new(Mutex::new(Vec::new()));
    let registry = ListenerRegistry::new();
    let l1_log = log.clone();
    registry.register(listener_fn(move |_| {
        l1_log.lock().unwrap().push("L1");
        panic!("L1 failed");
    }));
    registry.register(Arc::new(Recording {
        name: "L2",
        log: log.clone(),
    }));
    registry.register(Arc::new(Recording {
        name: "L3",
        log: log.clone(),
    }));

    // WHEN: Dispatching one notification
    let failures = registry.dispatch(&ready());

    // THEN: All three ran in order and one failure was reported for index 0
    assert_eq!(*log.lock().unwrap(), vec!["L1", "L2", "L3"]);
    assert_eq!(failures.len(), 1);
    let ListenerError::Panicked { index, message, .. } = &failures[0];
    assert_eq!(*index, 0);
    assert_eq!(message, "L1 failed");
}

/// **VALUE**: Verifies the default routing from `on_notification` to the typed hooks.
///
/// **WHY THIS MATTERS**: Most listeners only implement one hook and rely on this routing.
///
/// **BUG THIS CATCHES**: Would catch if a notification kind is routed to the wrong hook or
/// not routed at all.
#[test]
fn given_each_notification_kind_when_dispatching_then_matching_hook_runs() {
    // GIVEN: A hook-recording listener
    let hooks = Arc::new(Hooks::default());
    let registry = ListenerRegistry::new();
    registry.register(hooks.clone());

    let notifications = [
        ready(),
        Notification::Message(Message::Dispatch(Dispatch {
            nonce: None,
            event: DispatchEvent::Error(ErrorPayload {
                code: 4000,
                message: "bad".into(),
            }),
        })),
        Notification::Message(Message::Dispatch(Dispatch {
            nonce: None,
            event: DispatchEvent::Unknown {
                name: "ACTIVITY_JOIN".into(),
                data: json!({}),
            },
        })),
        Notification::Message(Message::SetActivityResponse(SetActivityResponse {
            nonce: Some("stale".into()),
            outcome: ResponseOutcome::Success(Value::Null),
        })),
        Notification::Closed(CloseFrame {
            code: 1000,
            message: "bye".into(),
        }),
    ];

    // WHEN: Dispatching each
    for notification in &notifications {
        assert!(registry.dispatch(notification).is_empty());
    }

    // THEN: One hook call per notification, in order
    assert_eq!(
        *hooks.calls.lock().unwrap(),
        vec![
            "ready",
            "error:4000",
            "event:ACTIVITY_JOIN",
            "message:SET_ACTIVITY",
            "close:1000"
        ]
    );
}

/// **VALUE**: Verifies that a listener may register another listener while being dispatched.
///
/// **WHY THIS MATTERS**: Dispatch holds a snapshot; registering from a hook must not
/// deadlock the read loop.
///
/// **BUG THIS CATCHES**: Would catch if dispatch holds the registry lock while calling hooks.
#[test]
fn given_listener_registering_another_when_dispatching_then_no_deadlock() {
    // GIVEN: A listener that registers a second one
    let registry = Arc::new(ListenerRegistry::new());
    let inner = registry.clone();
    registry.register(listener_fn(move |_| inner.register(listener_fn(|_| {}))));

    // WHEN: Dispatching
    registry.dispatch(&ready());

    // THEN: The new listener was appended for later dispatches
    assert_eq!(registry.len(), 2);
}
