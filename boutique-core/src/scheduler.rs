//! Change batching
//!
//! Every dispatch and every `batch_changes` call opens a region. Stores
//! mutated inside a region are queued once; when the outermost region closes
//! each queued store emits a single change notification.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Weak;

use crate::store::StoreCore;

#[derive(Default)]
pub(crate) struct ChangeScheduler {
    depth: Cell<usize>,
    pending: RefCell<VecDeque<Weak<StoreCore>>>,
}

/// Open region; closing it only decrements the depth, flushing is explicit
struct Region<'a>(&'a ChangeScheduler);

impl Drop for Region<'_> {
    fn drop(&mut self) {
        self.0.depth.set(self.0.depth.get() - 1);
    }
}

impl ChangeScheduler {
    fn enter(&self) -> Region<'_> {
        self.depth.set(self.depth.get() + 1);
        Region(self)
    }

    /// Run `f` inside a region, flushing if it was the outermost one
    pub(crate) fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        let out = {
            let _region = self.enter();
            f()
        };
        if self.is_idle() {
            self.flush();
        }
        out
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.depth.get() == 0
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Queue `store` for notification unless it is already pending
    pub(crate) fn mark(&self, store: &StoreCore) {
        if !store.pending.replace(true) {
            self.pending.borrow_mut().push_back(store.weak());
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Notify queued stores in the order they became dirty
    fn flush(&self) {
        loop {
            // Listeners may queue more stores; never hold the borrow while notifying
            let next = self.pending.borrow_mut().pop_front();
            let Some(store) = next else { break };
            if let Some(store) = store.upgrade() {
                store.flush_change();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_regions_track_depth() {
        let scheduler = ChangeScheduler::default();
        assert!(scheduler.is_idle());

        scheduler.batch(|| {
            assert_eq!(scheduler.depth(), 1);
            scheduler.batch(|| assert_eq!(scheduler.depth(), 2));
            assert_eq!(scheduler.depth(), 1);
        });

        assert!(scheduler.is_idle());
        assert_eq!(scheduler.pending_len(), 0);
    }

    #[test]
    fn test_region_closes_on_panic() {
        let scheduler = ChangeScheduler::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            scheduler.batch(|| panic!("boom"))
        }));
        assert!(result.is_err());
        assert!(scheduler.is_idle());
    }
}
