//! # Reference Store
//!
//! A minimal unidirectional state container exposing the three capabilities
//! watchers rely on:
//!
//! ```text
//! Action -> [dispatch] -> reducer -> State' -> Transition(previous, action)
//!                                                   |
//!                 select(projection) <- State'      v
//!                                         broadcast stream
//! ```
//!
//! - **dispatch**: applies an action through the injected pure reducer.
//! - **select**: synchronous, pure evaluation of a projection against the
//!   current state.
//! - **transitions**: an ordered broadcast of `(previous state, action)`
//!   pairs, one per applied action, emitted after the store already holds
//!   the post-action state.
//!
//! The store is deliberately thin. What state means, and how actions reduce,
//! belongs to the embedding application; the store only guarantees ordering
//! and the pre/post visibility contract above.

use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default transition stream depth per subscriber.
const DEFAULT_TRANSITION_CAPACITY: usize = 256;

/// Opaque store identity token.
///
/// Watchers compare tokens, never store values, to decide whether a `bind`
/// targets the store they are already subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreId(Uuid);

impl StoreId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// One applied action: the pre-action state snapshot plus the action itself.
///
/// Delivered after the store's state already reflects the action, so reading
/// current state while consuming the stream yields the post-action state.
#[derive(Debug, Clone)]
pub struct Transition<S, A> {
    /// State before the action was applied.
    pub previous: S,
    /// The applied action.
    pub action: A,
}

type Reducer<S, A> = Box<dyn Fn(&S, &A) -> S + Send + Sync>;

pub(crate) struct StoreInner<S, A> {
    id: StoreId,
    state: RwLock<S>,
    reducer: Reducer<S, A>,
    transitions: broadcast::Sender<Transition<S, A>>,
}

impl<S, A> StoreInner<S, A> {
    pub(crate) fn select<T>(&self, project: impl FnOnce(&S) -> T) -> T {
        project(&self.state.read())
    }
}

/// Cheaply cloneable handle to a single-source-of-truth state container.
///
/// All clones share the same state, reducer, and transition stream.
pub struct Store<S, A> {
    inner: Arc<StoreInner<S, A>>,
}

impl<S, A> Clone for Store<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, A> Store<S, A>
where
    S: Clone + Send + Sync + 'static,
    A: Clone + Send + 'static,
{
    /// Create a store from an initial state and a pure reducer.
    pub fn new(initial: S, reducer: impl Fn(&S, &A) -> S + Send + Sync + 'static) -> Self {
        Self::with_capacity(initial, reducer, DEFAULT_TRANSITION_CAPACITY)
    }

    /// Create a store with an explicit transition stream depth.
    ///
    /// Subscribers that fall more than `capacity` elements behind observe a
    /// lag error and resume from the oldest retained element; the stream is
    /// lossy by definition under sustained backpressure.
    pub fn with_capacity(
        initial: S,
        reducer: impl Fn(&S, &A) -> S + Send + Sync + 'static,
        capacity: usize,
    ) -> Self {
        let (transitions, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(StoreInner {
                id: StoreId::new(),
                state: RwLock::new(initial),
                reducer: Box::new(reducer),
                transitions,
            }),
        }
    }

    /// This store's identity token.
    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    /// Apply an action through the reducer and emit the transition.
    ///
    /// The transition is sent while the state write lock is held, so stream
    /// order always matches application order.
    pub fn dispatch(&self, action: A) {
        let mut state = self.inner.state.write();
        let next = (self.inner.reducer)(&state, &action);
        let previous = std::mem::replace(&mut *state, next);
        let _ = self.inner.transitions.send(Transition { previous, action });
    }

    /// Run an asynchronous action-producing procedure.
    ///
    /// The procedure receives a clone of this store, i.e. the dispatch and
    /// select capabilities. Any failure handling belongs to the procedure
    /// itself; the store neither catches nor retries.
    pub async fn dispatch_task<F, Fut>(&self, task: F)
    where
        F: FnOnce(Store<S, A>) -> Fut,
        Fut: Future<Output = ()>,
    {
        task(self.clone()).await;
    }

    /// Evaluate a pure projection against the current state.
    pub fn select<T>(&self, project: impl FnOnce(&S) -> T) -> T {
        self.inner.select(project)
    }

    /// Subscribe to the ordered `(previous state, action)` stream.
    ///
    /// Only transitions applied after the subscription are delivered.
    pub fn transitions(&self) -> broadcast::Receiver<Transition<S, A>> {
        self.inner.transitions.subscribe()
    }

    /// Number of live transition subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.transitions.receiver_count()
    }

    pub(crate) fn downgrade(&self) -> Weak<StoreInner<S, A>> {
        Arc::downgrade(&self.inner)
    }
}
