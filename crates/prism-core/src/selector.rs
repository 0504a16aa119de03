//! # Selector Descriptors
//!
//! A selector pairs a pure projection over state with a change detector:
//!
//! ```text
//! select:     &State -> T
//! did_change: (&T, &T) -> bool     (true = treat as changed)
//! ```
//!
//! Selectors are pure data. They never touch a store beyond the `&State`
//! they are handed, and the engine imposes no constraint on the detector
//! beyond its boolean contract: structural equality, threshold predicates,
//! and always-changed detectors are all valid.
//!
//! [`Dependency`] is the type-erased form used for heterogeneous dependency
//! lists: the projected value is boxed as `dyn Any` and the detector
//! downcasts both sides before comparing.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Erased dependency value held in a projection's memo.
pub(crate) type ErasedValue = Box<dyn Any + Send>;

type SelectFn<S, T> = Arc<dyn Fn(&S) -> T + Send + Sync>;
type DidChangeFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// A pure projection over state plus its change detector.
///
/// Cloning a `Selector` is cheap; both closures are shared.
pub struct Selector<S, T> {
    select: SelectFn<S, T>,
    did_change: DidChangeFn<T>,
}

impl<S, T> Clone for Selector<S, T> {
    fn clone(&self) -> Self {
        Self {
            select: Arc::clone(&self.select),
            did_change: Arc::clone(&self.did_change),
        }
    }
}

impl<S, T> fmt::Debug for Selector<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector").finish_non_exhaustive()
    }
}

impl<S, T> Selector<S, T> {
    /// Create a selector with an explicit change detector.
    pub fn new(
        select: impl Fn(&S) -> T + Send + Sync + 'static,
        did_change: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            select: Arc::new(select),
            did_change: Arc::new(did_change),
        }
    }

    /// Create a selector whose values are always treated as changed.
    pub fn always(select: impl Fn(&S) -> T + Send + Sync + 'static) -> Self {
        Self::new(select, |_, _| true)
    }

    /// Run the projection against a state snapshot.
    pub fn select(&self, state: &S) -> T {
        (self.select)(state)
    }

    /// Compare two projected values. `true` means "treat as changed".
    pub fn did_change(&self, old: &T, new: &T) -> bool {
        (self.did_change)(old, new)
    }
}

impl<S, T: PartialEq> Selector<S, T> {
    /// Create a selector that detects change by structural inequality.
    pub fn on_change(select: impl Fn(&S) -> T + Send + Sync + 'static) -> Self {
        Self::new(select, |old, new| old != new)
    }
}

/// A type-erased dependency descriptor.
///
/// Dependency lists are heterogeneous (one projection may track a `u64`
/// alongside a `Vec<String>`), so the projected value is erased to
/// `Box<dyn Any>` and the change detector downcasts both sides back to the
/// concrete type before comparing.
pub struct Dependency<S> {
    select: Arc<dyn Fn(&S) -> ErasedValue + Send + Sync>,
    did_change: Arc<dyn Fn(&ErasedValue, &ErasedValue) -> bool + Send + Sync>,
}

impl<S> Clone for Dependency<S> {
    fn clone(&self) -> Self {
        Self {
            select: Arc::clone(&self.select),
            did_change: Arc::clone(&self.did_change),
        }
    }
}

impl<S> fmt::Debug for Dependency<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency").finish_non_exhaustive()
    }
}

impl<S: 'static> Dependency<S> {
    /// Erase a typed selector into a dependency descriptor.
    pub fn new<T: Send + 'static>(selector: Selector<S, T>) -> Self {
        let project = Arc::clone(&selector.select);
        let detect = Arc::clone(&selector.did_change);
        Self {
            select: Arc::new(move |state| Box::new(project(state)) as ErasedValue),
            did_change: Arc::new(move |old, new| {
                match (old.downcast_ref::<T>(), new.downcast_ref::<T>()) {
                    (Some(old), Some(new)) => detect(old, new),
                    // A memo slot only ever holds values produced by this
                    // descriptor's own projection, so both sides downcast.
                    _ => true,
                }
            }),
        }
    }

    pub(crate) fn select(&self, state: &S) -> ErasedValue {
        (self.select)(state)
    }

    pub(crate) fn did_change(&self, old: &ErasedValue, new: &ErasedValue) -> bool {
        (self.did_change)(old, new)
    }
}

impl<S: 'static, T: Send + 'static> From<Selector<S, T>> for Dependency<S> {
    fn from(selector: Selector<S, T>) -> Self {
        Self::new(selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_change_uses_structural_inequality() {
        let selector: Selector<u32, u32> = Selector::on_change(|state| *state * 2);
        assert_eq!(selector.select(&21), 42);
        assert!(!selector.did_change(&42, &42));
        assert!(selector.did_change(&42, &44));
    }

    #[test]
    fn always_reports_change_for_equal_values() {
        let selector: Selector<u32, u32> = Selector::always(|state| *state);
        assert!(selector.did_change(&7, &7));
    }

    #[test]
    fn erased_dependency_preserves_detector() {
        let selector: Selector<i64, i64> = Selector::new(|state| *state, |old, new| new - old >= 10);
        let dependency = Dependency::new(selector);

        let old = dependency.select(&0);
        let close = dependency.select(&5);
        let far = dependency.select(&12);

        assert!(!dependency.did_change(&old, &close));
        assert!(dependency.did_change(&old, &far));
    }
}
