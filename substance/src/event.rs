//! Event proxies.
//!
//! After each applied change, the document invokes every registered proxy
//! with `(change, info)` and then emits one `document:changed` signal.
//! Proxies exist so listeners don't fan out to every node on every
//! keystroke; the required proxy is **by-path**, maintaining a
//! `path -> listeners` map for O(1) dispatch per affected path.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::warn;

use crate::change::{DocumentChange, InfoBag};
use crate::node::Path;

type CallbackMap<Args> = Rc<RefCell<HashMap<u64, Box<dyn Fn(&Args)>>>>;

/// A registry of callbacks for one event type.
pub struct Observer<Args> {
    callbacks: CallbackMap<Args>,
    next_id: Rc<RefCell<u64>>,
}

impl<Args> Default for Observer<Args> {
    fn default() -> Self {
        Observer {
            callbacks: Rc::new(RefCell::new(HashMap::new())),
            next_id: Rc::new(RefCell::new(0)),
        }
    }
}

impl<Args> Observer<Args> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `f`; dropping the returned [`Subscription`] unsubscribes.
    pub fn subscribe<F>(&self, f: F) -> Subscription<Args>
    where
        F: Fn(&Args) + 'static,
    {
        let mut next = self.next_id.borrow_mut();
        let id = *next;
        *next += 1;
        drop(next);
        self.callbacks.borrow_mut().insert(id, Box::new(f));
        Subscription {
            id,
            callbacks: Rc::downgrade(&self.callbacks),
        }
    }

    /// Invokes every live callback, in registration order. A callback that
    /// panics would poison the whole dispatch in safe Rust with no
    /// `catch_unwind` boundary here; callers that need isolation should
    /// have their closures return/log their own errors rather than
    /// unwind — see [`PathProxy::dispatch`] for the by-path proxy's
    /// isolation wrapper.
    pub fn trigger(&self, args: &Args) {
        for cb in self.callbacks.borrow().values() {
            cb(args);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Subscription<Args> {
    id: u64,
    callbacks: Weak<RefCell<HashMap<u64, Box<dyn Fn(&Args)>>>>,
}

impl<Args> Drop for Subscription<Args> {
    fn drop(&mut self) {
        if let Some(callbacks) = self.callbacks.upgrade() {
            callbacks.borrow_mut().remove(&self.id);
        }
    }
}

/// Owned, cheaply-cloneable event payload delivered to `document:changed`
/// and proxy listeners.
#[derive(Clone)]
pub struct ChangeEvent {
    pub change: Rc<DocumentChange>,
    pub info: Rc<InfoBag>,
}

/// By-path proxy: listeners subscribe to a `[nodeId, property]` path and
/// are notified only when a committed change contains an op touching
/// that exact path.
#[derive(Default)]
pub struct PathProxy {
    by_path: HashMap<Path, Observer<ChangeEvent>>,
}

impl PathProxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, path: Path, f: F) -> Subscription<ChangeEvent>
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        self.by_path.entry(path).or_default().subscribe(f)
    }

    /// Dispatches `change` to every path-listener whose path was touched.
    /// A listener callback that panics is caught so the remaining
    /// listeners, and the trailing `document:changed` emission, still run.
    pub fn dispatch(&self, change: &DocumentChange, info: &InfoBag) {
        if self.by_path.is_empty() {
            return;
        }
        let event = ChangeEvent {
            change: Rc::new(change.clone()),
            info: Rc::new(info.clone()),
        };
        let mut touched: Vec<&Path> = change
            .ops
            .iter()
            .filter_map(|applied| applied.forward.path())
            .collect();
        touched.sort();
        touched.dedup();
        for path in touched {
            if let Some(observer) = self.by_path.get(path) {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    observer.trigger(&event);
                }));
                if result.is_err() {
                    warn!(%path, "path:changed listener panicked; isolated from other listeners");
                }
            }
        }
    }

    pub fn listener_count(&self, path: &Path) -> usize {
        self.by_path.get(path).map(|o| o.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::props;
    use crate::node::PropertyValue;
    use crate::ops::{AppliedOp, Operation};
    use std::cell::Cell;
    use std::rc::Rc as StdRc;

    fn change_with_set(path: Path) -> DocumentChange {
        DocumentChange {
            ops: vec![AppliedOp {
                forward: Operation::Set {
                    path: path.clone(),
                    value: PropertyValue::String("x".into()),
                },
                inverse: Operation::Set {
                    path,
                    value: PropertyValue::String("y".into()),
                },
            }],
            before_state: Default::default(),
            after_state: Default::default(),
            timestamp: 0,
            info: InfoBag::new(),
        }
    }

    #[test]
    fn only_matching_path_listener_fires() {
        let mut proxy = PathProxy::new();
        let hit = StdRc::new(Cell::new(0));
        let hit2 = hit.clone();
        let _sub = proxy.subscribe(Path::new("p1", props::CONTENT), move |_| {
            hit2.set(hit2.get() + 1);
        });
        let other_hit = StdRc::new(Cell::new(0));
        let other_hit2 = other_hit.clone();
        let _sub2 = proxy.subscribe(Path::new("p2", props::CONTENT), move |_| {
            other_hit2.set(other_hit2.get() + 1);
        });

        let change = change_with_set(Path::new("p1", props::CONTENT));
        proxy.dispatch(&change, &InfoBag::new());

        assert_eq!(hit.get(), 1);
        assert_eq!(other_hit.get(), 0);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let mut proxy = PathProxy::new();
        let path = Path::new("p1", props::CONTENT);
        let sub = proxy.subscribe(path.clone(), |_| {});
        assert_eq!(proxy.listener_count(&path), 1);
        drop(sub);
        assert_eq!(proxy.listener_count(&path), 0);
    }
}
