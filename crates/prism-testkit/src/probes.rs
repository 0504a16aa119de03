//! Invocation counters, update recorders, and async wait helpers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use prism_core::Selector;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Shared invocation counter, cloneable into selector closures.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    /// A counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one invocation.
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    /// Invocations recorded so far.
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Wrap a selector so every `select` invocation bumps the counter.
///
/// The change detector is passed through untouched.
pub fn counted<S: 'static, T: 'static>(
    counter: &CallCounter,
    selector: Selector<S, T>,
) -> Selector<S, T> {
    let counter = counter.clone();
    let project = selector.clone();
    let detect = selector;
    Selector::new(
        move |state: &S| {
            counter.bump();
            project.select(state)
        },
        move |old: &T, new: &T| detect.did_change(old, new),
    )
}

/// Records every value published on a broadcast stream.
///
/// Backed by a collector task; dropping the log aborts it.
pub struct UpdateLog<O> {
    entries: Arc<Mutex<Vec<O>>>,
    task: JoinHandle<()>,
}

impl<O: Clone + Send + 'static> UpdateLog<O> {
    /// Start recording from a receiver.
    pub fn attach(mut updates: broadcast::Receiver<O>) -> Self {
        let entries = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&entries);
        let task = tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(output) => sink.lock().push(output),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        });
        Self { entries, task }
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<O> {
        self.entries.lock().clone()
    }

    /// Number of recorded values.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<O> Drop for UpdateLog<O> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Poll `probe` until it holds, panicking after two seconds.
///
/// Background subscription tasks process stream elements asynchronously;
/// tests use this to wait for a side effect without racing them.
pub async fn eventually(description: &str, probe: impl Fn() -> bool) {
    let deadline = Duration::from_secs(2);
    let result = tokio::time::timeout(deadline, async {
        while !probe() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(
        result.is_ok(),
        "condition not reached within {deadline:?}: {description}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counted_wrapper_counts_only_select() {
        let counter = CallCounter::new();
        let selector = counted(&counter, Selector::on_change(|state: &u64| *state));

        assert_eq!(selector.select(&1), 1);
        assert_eq!(selector.select(&2), 2);
        let _ = selector.did_change(&1, &2);

        assert_eq!(counter.count(), 2);
    }

    #[tokio::test]
    async fn update_log_records_in_order() {
        let (tx, rx) = broadcast::channel(8);
        let log = UpdateLog::attach(rx);

        for value in [1u64, 2, 3] {
            tx.send(value).unwrap();
        }

        eventually("log drained the stream", || log.len() == 3).await;
        assert_eq!(log.snapshot(), vec![1, 2, 3]);
    }
}
