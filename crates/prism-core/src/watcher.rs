//! # Watcher
//!
//! The stable subscription handle a consumer holds onto. A [`Watcher`] owns
//! its configuration (identity token, filter, dependency selectors, output
//! selector) and manages exactly one live background task at a time:
//!
//! ```text
//! store.transitions() --> [filter] --> projection.evaluate(current state)
//!                                            |
//!                        output cell  <------+----> update broadcast
//! ```
//!
//! The handle survives rebinds and reconfigurations; the projection engine
//! and its memos do not. Whenever the bound store's identity or the
//! configuration's identity changes, the engine is rebuilt from scratch and
//! the previous task is cancelled before the new one starts.
//!
//! ## Cancellation
//!
//! Cooperative: each subscription carries a watch-channel shutdown flag that
//! the task checks between suspension points, combined with a hard
//! `JoinHandle::abort`. A cancelled task's engine is unreachable through
//! [`Watcher::output`], so stale in-flight deliveries are inert.

use std::sync::{Arc, Weak};

use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::projection::Projection;
use crate::selector::{Dependency, Selector};
use crate::store::{Store, StoreId, StoreInner, Transition};

type TransitionFilter<S, A> = Arc<dyn Fn(&S, &A) -> bool + Send + Sync>;

/// Configuration owned by a [`Watcher`].
///
/// The optional `id` is the configuration's identity token: two
/// configurations are the same logical subscription only when both carry a
/// token and the tokens are equal. Selector closures are not comparable, so
/// the token is the configuration's proxy: an id-less configuration never
/// equals anything and always forces a reset on
/// [`reconfigure`](Watcher::reconfigure).
pub struct WatchConfig<S, A, O> {
    id: Option<String>,
    label: Option<String>,
    filter: Option<TransitionFilter<S, A>>,
    dependencies: Vec<Dependency<S>>,
    output: Selector<S, O>,
}

impl<S: 'static, A, O> WatchConfig<S, A, O> {
    /// Start a configuration from its output selector.
    pub fn new(output: Selector<S, O>) -> Self {
        Self {
            id: None,
            label: None,
            filter: None,
            dependencies: Vec::new(),
            output,
        }
    }

    /// Attach an identity token.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach a diagnostic label. No behavioral effect.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attach a transition filter over `(previous state, action)`.
    ///
    /// A rejected element is skipped entirely: no selector of any kind runs
    /// for it.
    pub fn with_filter(mut self, filter: impl Fn(&S, &A) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Append a dependency selector. Order is preserved.
    pub fn with_dependency<D: Send + 'static>(mut self, dependency: Selector<S, D>) -> Self {
        self.dependencies.push(Dependency::new(dependency));
        self
    }
}

/// Construction-time settings, injected rather than read from process-wide
/// state.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    /// Emit `tracing::debug!` diagnostics for binds, resets, and publishes.
    pub debug: bool,
    /// Capacity of the published-output broadcast channel.
    pub update_capacity: usize,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debug: false,
            update_capacity: 256,
        }
    }
}

/// Errors surfaced by the subscription lifecycle.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The background subscription task panicked.
    #[error("subscription task panicked")]
    TaskPanicked,
}

struct Subscription<O> {
    output_rx: watch::Receiver<O>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Stable, reusable subscription handle over a [`Store`].
///
/// Construct once, [`bind`](Self::bind) to a store, read
/// [`output`](Self::output) or consume [`updates`](Self::updates). Rebinding
/// to the same store is a no-op; rebinding to a different store, or after a
/// [`reconfigure`](Self::reconfigure) with a new identity, rebuilds the
/// projection engine and replaces the subscription task.
pub struct Watcher<S, A, O> {
    config: WatchConfig<S, A, O>,
    settings: WatchSettings,
    updates_tx: broadcast::Sender<O>,
    bound_store: Option<StoreId>,
    subscription: Option<Subscription<O>>,
}

impl<S, A, O> Watcher<S, A, O>
where
    S: Clone + Send + Sync + 'static,
    A: Clone + Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    /// Create an unbound watcher with default settings.
    pub fn new(config: WatchConfig<S, A, O>) -> Self {
        Self::with_settings(config, WatchSettings::default())
    }

    /// Create an unbound watcher with explicit settings.
    pub fn with_settings(config: WatchConfig<S, A, O>, settings: WatchSettings) -> Self {
        let (updates_tx, _) = broadcast::channel(settings.update_capacity);
        Self {
            config,
            settings,
            updates_tx,
            bound_store: None,
            subscription: None,
        }
    }

    /// Replace the configuration.
    ///
    /// When the new configuration carries the same identity token as the
    /// current one, this is a no-op. Otherwise the configuration is replaced
    /// and the remembered store identity is cleared, the sole mechanism
    /// forcing the next [`bind`](Self::bind), even against the same store,
    /// down the fresh-engine path. The running task keeps the old
    /// configuration until that bind happens.
    pub fn reconfigure(&mut self, config: WatchConfig<S, A, O>) {
        let same = matches!(
            (&self.config.id, &config.id),
            (Some(current), Some(next)) if current == next
        );
        if same {
            return;
        }
        if self.settings.debug {
            tracing::debug!(
                label = self.config.label.as_deref().unwrap_or(""),
                "watcher reconfigured; next bind will rebuild"
            );
        }
        self.config = config;
        self.bound_store = None;
    }

    /// Bind to a store, seeding an initial output synchronously.
    ///
    /// Binding the store this watcher is already bound to preserves the
    /// running task and its memos. Binding anything else constructs a fresh
    /// projection engine, evaluates it once against current state (so
    /// [`output`](Self::output) is valid the moment this returns), cancels
    /// the previous task, and spawns the replacement.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(&mut self, store: &Store<S, A>) {
        if self.bound_store == Some(store.id()) {
            return;
        }

        let mut projection =
            Projection::new(self.config.dependencies.clone(), self.config.output.clone());

        // Subscribe before seeding so a transition applied mid-bind is
        // re-evaluated rather than lost.
        let transitions = store.transitions();
        store.select(|state| projection.evaluate(state));
        let seed = projection.output().clone();

        if self.settings.debug {
            tracing::debug!(
                label = self.config.label.as_deref().unwrap_or(""),
                store = ?store.id(),
                "watcher bound; output seeded"
            );
        }

        let (output_tx, output_rx) = watch::channel(seed.clone());
        let _ = self.updates_tx.send(seed);

        self.bound_store = Some(store.id());

        // Cancel-then-replace: at most one live task per watcher.
        if let Some(previous) = self.subscription.take() {
            let _ = previous.shutdown_tx.send(true);
            previous.task.abort();
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(drive(
            projection,
            transitions,
            store.downgrade(),
            self.config.filter.clone(),
            output_tx,
            self.updates_tx.clone(),
            shutdown_rx,
            self.settings.debug,
            self.config.label.clone(),
        ));

        self.subscription = Some(Subscription {
            output_rx,
            shutdown_tx,
            task,
        });
    }

    /// The last published output.
    ///
    /// # Panics
    ///
    /// Panics if [`bind`](Self::bind) was never called (or the watcher was
    /// unbound). Callers must guarantee a seed evaluation happened.
    pub fn output(&self) -> O {
        match &self.subscription {
            Some(subscription) => subscription.output_rx.borrow().clone(),
            None => panic!("watcher output read before bind"),
        }
    }

    /// Subscribe to published outputs.
    ///
    /// The stream is handle-level: it survives rebinds and reconfigurations.
    /// Each bind's seed publication is delivered too.
    pub fn updates(&self) -> broadcast::Receiver<O> {
        self.updates_tx.subscribe()
    }

    /// Whether a subscription is currently live.
    pub fn is_bound(&self) -> bool {
        self.subscription.is_some()
    }

    /// Cooperatively stop the live subscription and wait for the task to
    /// finish.
    ///
    /// Normal termination (shutdown observed, stream closed) is `Ok`; a
    /// panicked task surfaces as [`WatchError::TaskPanicked`]. Unbinding an
    /// unbound watcher is a no-op.
    pub async fn unbind(&mut self) -> Result<(), WatchError> {
        self.bound_store = None;
        let Some(subscription) = self.subscription.take() else {
            return Ok(());
        };
        let _ = subscription.shutdown_tx.send(true);
        match subscription.task.await {
            Ok(()) => Ok(()),
            Err(join_error) if join_error.is_panic() => Err(WatchError::TaskPanicked),
            Err(_) => Ok(()),
        }
    }
}

impl<S, A, O> Drop for Watcher<S, A, O> {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            let _ = subscription.shutdown_tx.send(true);
            subscription.task.abort();
        }
    }
}

/// Subscription loop: one stream element at a time, to completion, until the
/// stream ends or shutdown is signalled.
#[allow(clippy::too_many_arguments)]
async fn drive<S, A, O>(
    mut projection: Projection<S, O>,
    mut transitions: broadcast::Receiver<Transition<S, A>>,
    store: Weak<StoreInner<S, A>>,
    filter: Option<TransitionFilter<S, A>>,
    output_tx: watch::Sender<O>,
    updates_tx: broadcast::Sender<O>,
    mut shutdown_rx: watch::Receiver<bool>,
    debug: bool,
    label: Option<String>,
) where
    S: Clone + Send + Sync + 'static,
    A: Clone + Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    loop {
        let transition = tokio::select! {
            _ = shutdown_rx.changed() => break,
            received = transitions.recv() => match received {
                Ok(transition) => transition,
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        skipped,
                        label = label.as_deref().unwrap_or(""),
                        "transition stream lagged; resuming from oldest retained element"
                    );
                    continue;
                }
            },
        };

        if *shutdown_rx.borrow() {
            break;
        }

        if let Some(filter) = &filter {
            if !filter(&transition.previous, &transition.action) {
                // Rejected elements invoke no selector of any kind.
                continue;
            }
        }

        let Some(store) = store.upgrade() else {
            break;
        };
        let published = store.select(|state| projection.evaluate(state));
        if !published {
            continue;
        }

        let output = projection.output().clone();
        if *shutdown_rx.borrow() {
            // Cancelled mid-element: the publish must stay invisible.
            break;
        }
        output_tx.send_replace(output.clone());
        let _ = updates_tx.send(output);

        if debug {
            tracing::debug!(
                label = label.as_deref().unwrap_or(""),
                "output published"
            );
        }
    }
}
