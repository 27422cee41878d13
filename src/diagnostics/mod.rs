//! Process-wide diagnostics channel.
//!
//! Parse outcomes and contained runtime failures are published as events to
//! independent subscribers. Publishing never blocks on subscriber state and
//! is a no-op when nobody is listening; subscribers run synchronously on
//! the publishing thread and must not panic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::evaluator::EvalError;
use crate::values::Value;

/// Everything the channel can report.
#[derive(Debug, Clone)]
pub enum Event {
    /// An expression parsed; carries the debug dump of the full tree.
    TokenizeSuccess { expression: String, tree: String },
    /// An expression failed to parse.
    TokenizeFailure { expression: String },
    /// A compiled tree failed during an invocation. Contained: the
    /// invocation itself yielded the unset sentinel.
    RuntimeError {
        expression: String,
        debug_view: String,
        backward: bool,
        value: Value,
        side: Vec<Value>,
        error: EvalError,
    },
    /// A chained converter failed before or after the compiled tree ran.
    ChainedConverterError {
        expression: String,
        backward: bool,
        value: Value,
        error: EvalError,
    },
    /// A host adapter failed outside the engine proper; published by the
    /// external collaborator, carried here so one subscription sees all.
    HostAdapterError {
        expression: String,
        host_object: String,
        error: String,
    },
}

type Subscriber = Arc<dyn Fn(&Event) + Send + Sync>;

static SUBSCRIBERS: Lazy<RwLock<Vec<(u64, Subscriber)>>> = Lazy::new(|| RwLock::new(Vec::new()));
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A live subscription. Dropping it unsubscribes.
#[must_use = "dropping the subscription immediately unsubscribes"]
pub struct Subscription {
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        SUBSCRIBERS.write().retain(|(id, _)| *id != self.id);
    }
}

/// Registers an observer for all diagnostics events.
pub fn subscribe(observer: impl Fn(&Event) + Send + Sync + 'static) -> Subscription {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    SUBSCRIBERS.write().push((id, Arc::new(observer)));
    Subscription { id }
}

/// Publishes an event to every subscriber. No-op with zero subscribers.
pub fn publish(event: &Event) {
    let subscribers: Vec<Subscriber> = {
        let guard = SUBSCRIBERS.read();
        if guard.is_empty() {
            return;
        }
        guard.iter().map(|(_, s)| s.clone()).collect()
    };
    for subscriber in subscribers {
        subscriber(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn publish_with_no_subscribers_is_a_noop() {
        publish(&Event::TokenizeFailure {
            expression: "diag-noop".into(),
        });
    }

    #[test]
    fn subscribers_see_events_until_dropped() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let sub = subscribe(move |event| {
            if let Event::TokenizeFailure { expression } = event {
                if expression.starts_with("diag-sub-") {
                    seen2.lock().unwrap().push(expression.clone());
                }
            }
        });

        publish(&Event::TokenizeFailure {
            expression: "diag-sub-1".into(),
        });
        drop(sub);
        publish(&Event::TokenizeFailure {
            expression: "diag-sub-2".into(),
        });

        assert_eq!(seen.lock().unwrap().as_slice(), &["diag-sub-1".to_string()]);
    }

    #[test]
    fn subscribers_are_independent() {
        let a = Arc::new(Mutex::new(0usize));
        let b = Arc::new(Mutex::new(0usize));
        let (a2, b2) = (a.clone(), b.clone());
        let sub_a = subscribe(move |event| {
            if matches!(event, Event::TokenizeFailure { expression } if expression == "diag-ind") {
                *a2.lock().unwrap() += 1;
            }
        });
        let sub_b = subscribe(move |event| {
            if matches!(event, Event::TokenizeFailure { expression } if expression == "diag-ind") {
                *b2.lock().unwrap() += 1;
            }
        });

        publish(&Event::TokenizeFailure {
            expression: "diag-ind".into(),
        });
        drop(sub_a);
        publish(&Event::TokenizeFailure {
            expression: "diag-ind".into(),
        });
        drop(sub_b);

        assert_eq!(*a.lock().unwrap(), 1);
        assert_eq!(*b.lock().unwrap(), 2);
    }
}
