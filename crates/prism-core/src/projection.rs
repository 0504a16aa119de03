//! # Projection Engine
//!
//! The memoized recomputation engine behind a [`Watcher`](crate::Watcher).
//!
//! A [`Projection`] owns two private memos: the last projected value of every
//! dependency, and the last published output. On each evaluation it re-runs
//! every dependency projection, ORs their change detectors, and only when
//! something changed (or on the very first evaluation) re-runs the output
//! selector.
//!
//! # Invariants
//!
//! 1. Every dependency's `select` runs on every evaluation; only the output
//!    selector is conditionally skipped.
//! 2. The dependency memo is replaced on every evaluation, whether or not a
//!    change was detected. Skipping the refresh when "unchanged" would
//!    silently shift which future transitions register as changed.
//! 3. The output memo is a single cell, replaced wholesale on publish only.
//!    An evaluation that does not publish discards its candidate output, and
//!    the next comparison runs against the last stored value.
//! 4. The first evaluation always publishes.

use crate::selector::{Dependency, ErasedValue, Selector};

/// Memoized recomputation engine for one output selector and its
/// dependencies.
///
/// A `Projection` is exclusively owned (by a subscription task once bound,
/// by the caller in direct use) and is never shared between tasks.
pub struct Projection<S, O> {
    dependencies: Vec<Dependency<S>>,
    output: Selector<S, O>,
    previous_dependencies: Option<Vec<ErasedValue>>,
    previous_output: Option<O>,
}

impl<S: 'static, O> Projection<S, O> {
    /// Create an engine with empty memos. Dependency order is preserved; it
    /// fixes read order, not correctness.
    pub fn new(dependencies: Vec<Dependency<S>>, output: Selector<S, O>) -> Self {
        Self {
            dependencies,
            output,
            previous_dependencies: None,
            previous_output: None,
        }
    }

    /// Evaluate against a state snapshot. Returns `true` when a new output
    /// was published.
    ///
    /// With no dependencies configured, the output selector runs on every
    /// call and the publish rule alone decides whether the memoized output
    /// is replaced. With dependencies, the output selector only runs when at
    /// least one dependency changed since the previous evaluation.
    pub fn evaluate(&mut self, state: &S) -> bool {
        if self.dependencies.is_empty() {
            return self.evaluate_output(state);
        }

        let new_values: Vec<ErasedValue> = self
            .dependencies
            .iter()
            .map(|dependency| dependency.select(state))
            .collect();

        let any_changed = match &self.previous_dependencies {
            None => true,
            Some(previous) => previous
                .iter()
                .zip(&new_values)
                .zip(&self.dependencies)
                .any(|((old, new), dependency)| dependency.did_change(old, new)),
        };

        // Refresh unconditionally, even when nothing changed (invariant 2).
        self.previous_dependencies = Some(new_values);

        if any_changed {
            self.evaluate_output(state)
        } else {
            false
        }
    }

    fn evaluate_output(&mut self, state: &S) -> bool {
        let new_output = self.output.select(state);
        let publish = match &self.previous_output {
            None => true,
            Some(previous) => self.output.did_change(previous, &new_output),
        };
        if publish {
            self.previous_output = Some(new_output);
        }
        publish
    }

    /// The last published output.
    ///
    /// # Panics
    ///
    /// Panics if called before the first [`evaluate`](Self::evaluate). This
    /// is a contract violation by the caller, not a recoverable state.
    pub fn output(&self) -> &O {
        match &self.previous_output {
            Some(output) => output,
            None => panic!("projection output read before the first evaluation"),
        }
    }

    /// Whether at least one evaluation has published.
    pub fn has_output(&self) -> bool {
        self.previous_output.is_some()
    }
}
