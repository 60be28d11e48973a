// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Observer lists for register traffic.
//!
//! Two kinds of observers exist:
//!
//! - **Store observers** see every `get`/`set` on a
//!   [`RegisterStore`](crate::server::RegisterStore) and may replace the
//!   words flowing through them.
//! - **Poll observers** are notified by the
//!   [`PollingEngine`](crate::poller::PollingEngine) after each successful
//!   remote read or write, and after each completed cycle.
//!
//! Observers are invoked synchronously in registration order. A list is
//! snapshotted before invocation, so an observer may register further
//! observers or re-enter the component that called it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use mbt_core::{RegisterClass, Value};
use parking_lot::RwLock;

// =============================================================================
// Observer Types
// =============================================================================

/// One store access, as seen by a store observer.
#[derive(Debug, Clone, Copy)]
pub struct StoreAccess<'a> {
    /// Register class of the store.
    pub class: RegisterClass,
    /// First address of the access.
    pub address: u16,
    /// Words produced by the store or by the previous observer.
    pub words: &'a [u16],
    /// Words held before a `set`; `None` for a `get`.
    pub previous: Option<&'a [u16]>,
}

impl StoreAccess<'_> {
    /// Number of logical units covered.
    pub fn count(&self) -> usize {
        self.words.len()
    }

    /// Returns `true` for a `set`.
    pub fn is_write(&self) -> bool {
        self.previous.is_some()
    }
}

/// Store observer. Returning `Some` replaces the words for the remaining
/// observers and for the caller.
pub type StoreHook = dyn Fn(&StoreAccess<'_>) -> Option<Vec<u16>> + Send + Sync;

/// Called with `(class, address, value)` after a successful remote access.
pub type RegisterHook = dyn Fn(RegisterClass, u16, &Value) + Send + Sync;

/// Called with the duration of each completed polling cycle.
pub type CycleHook = dyn Fn(Duration) + Send + Sync;

// =============================================================================
// HookList
// =============================================================================

/// An ordered, thread-safe list of observers.
pub struct HookList<F: ?Sized> {
    hooks: RwLock<Vec<Arc<F>>>,
}

impl<F: ?Sized> HookList<F> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(Vec::new()),
        }
    }

    /// Appends an observer.
    pub fn push(&self, hook: Arc<F>) {
        self.hooks.write().push(hook);
    }

    /// Copies the current observers out of the lock.
    pub fn snapshot(&self) -> Vec<Arc<F>> {
        self.hooks.read().clone()
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    /// Returns `true` if no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }

    /// Removes every observer.
    pub fn clear(&self) {
        self.hooks.write().clear();
    }
}

impl<F: ?Sized> Default for HookList<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for HookList<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookList")
            .field("len", &self.len())
            .finish()
    }
}

impl HookList<StoreHook> {
    /// Threads `words` through every observer in order.
    ///
    /// Returns the final words, which equal the input when no observer
    /// replaced them.
    pub fn thread(
        &self,
        class: RegisterClass,
        address: u16,
        words: Vec<u16>,
        previous: Option<&[u16]>,
    ) -> Vec<u16> {
        let mut current = words;
        for hook in self.snapshot() {
            let access = StoreAccess {
                class,
                address,
                words: &current,
                previous,
            };
            if let Some(replacement) = hook(&access) {
                current = replacement;
            }
        }
        current
    }
}

impl HookList<RegisterHook> {
    /// Notifies every observer.
    pub fn notify(&self, class: RegisterClass, address: u16, value: &Value) {
        for hook in self.snapshot() {
            hook(class, address, value);
        }
    }
}

impl HookList<CycleHook> {
    /// Notifies every observer.
    pub fn notify(&self, duration: Duration) {
        for hook in self.snapshot() {
            hook(duration);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_replacements_thread_in_order() {
        let hooks: HookList<StoreHook> = HookList::new();
        hooks.push(Arc::new(|access: &StoreAccess<'_>| -> Option<Vec<u16>> {
            Some(access.words.iter().map(|w| w + 1).collect())
        }));
        hooks.push(Arc::new(|_: &StoreAccess<'_>| -> Option<Vec<u16>> { None }));
        hooks.push(Arc::new(|access: &StoreAccess<'_>| -> Option<Vec<u16>> {
            Some(access.words.iter().map(|w| w * 10).collect())
        }));

        let out = hooks.thread(RegisterClass::HoldingRegister, 0, vec![1, 2], None);
        assert_eq!(out, vec![20, 30]);
        assert_eq!(hooks.len(), 3);
    }

    #[test]
    fn test_empty_list_passes_through() {
        let hooks: HookList<StoreHook> = HookList::default();
        assert!(hooks.is_empty());
        assert_eq!(
            hooks.thread(RegisterClass::Coil, 4, vec![1], Some(&[0])),
            vec![1]
        );
    }

    #[test]
    fn test_observer_may_register_during_notify() {
        let hooks: Arc<HookList<CycleHook>> = Arc::new(HookList::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let inner = Arc::clone(&hooks);
        let counter = Arc::clone(&calls);
        hooks.push(Arc::new(move |_: Duration| {
            counter.fetch_add(1, Ordering::SeqCst);
            inner.push(Arc::new(|_: Duration| {}));
        }));

        hooks.notify(Duration::from_millis(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.len(), 2);
    }
}
