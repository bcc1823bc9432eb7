//! `Store<T>`: the shared collection processes communicate through.
//!
//! # Delivery rules
//!
//! - `put` appends, unless a parked `get` accepts the item: then the item is
//!   handed to the *first* such waiter (FIFO) and that waiter is scheduled at
//!   the current instant.  At most one waiter is woken per `put`.
//! - `get` takes the first matching item in insertion order, or parks the
//!   calling process until a matching `put` arrives.
//! - `remove`, `remove_all`, `replace` and `snapshot` never block.
//! - Between the handing `put` and the waiter's resumption the item is
//!   *in transit*: not in `items`, not yet with the receiver.  `count` and
//!   `is_settled` include it so ownership audits never miss it.
//!
//! Only one process runs at a time, so interior mutability through
//! `RefCell` is enough; no borrow is ever held across a suspension point.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use agv_core::ProcessId;
use tracing::trace;

use crate::SimHandle;

type Filter<T> = Rc<dyn Fn(&T) -> bool>;
type Slot<T> = Rc<RefCell<Option<T>>>;

struct Waiter<T> {
    process: ProcessId,
    filter:  Option<Filter<T>>,
    slot:    Slot<T>,
}

impl<T> Waiter<T> {
    fn accepts(&self, item: &T) -> bool {
        self.filter.as_ref().is_none_or(|f| f(item))
    }
}

struct StoreInner<T> {
    name:       String,
    handle:     SimHandle,
    items:      RefCell<VecDeque<T>>,
    waiters:    RefCell<VecDeque<Waiter<T>>>,
    /// Slots filled by `put` whose process has not resumed yet.
    in_transit: RefCell<Vec<Slot<T>>>,
}

/// A multiset of `T` with blocking withdrawal.  Clones share the same
/// contents.
pub struct Store<T> {
    inner: Rc<StoreInner<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<T: 'static> Store<T> {
    pub fn new(handle: SimHandle, name: &str) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                name: name.to_string(),
                handle,
                items: RefCell::new(VecDeque::new()),
                waiters: RefCell::new(VecDeque::new()),
                in_transit: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Add `item`, handing it straight to the first parked `get` that
    /// accepts it.
    pub fn put(&self, item: T) {
        let waiter = {
            let mut waiters = self.inner.waiters.borrow_mut();
            let pos = waiters.iter().position(|w| w.accepts(&item));
            pos.and_then(|i| waiters.remove(i))
        };
        match waiter {
            Some(w) => {
                *w.slot.borrow_mut() = Some(item);
                self.inner.in_transit.borrow_mut().push(Rc::clone(&w.slot));
                trace!(store = %self.inner.name, process = %w.process, "put handed to waiter");
                self.inner.handle.wake(w.process);
            }
            None => self.inner.items.borrow_mut().push_back(item),
        }
    }

    /// Insert `item` ahead of every stored item.  Parked waiters still get
    /// first refusal.
    pub fn put_front(&self, item: T) {
        let accepted = self.inner.waiters.borrow().iter().any(|w| w.accepts(&item));
        if accepted {
            self.put(item);
        } else {
            self.inner.items.borrow_mut().push_front(item);
        }
    }

    /// Withdraw the first item, suspending until one is available.
    pub fn get(&self) -> Get<T> {
        Get { store: self.clone(), filter: None, slot: None }
    }

    /// Withdraw the first item matching `filter`, suspending until one is
    /// available.
    pub fn get_filtered(&self, filter: impl Fn(&T) -> bool + 'static) -> Get<T> {
        Get { store: self.clone(), filter: Some(Rc::new(filter)), slot: None }
    }

    /// Withdraw the first matching item without blocking.  A miss is a no-op.
    pub fn remove(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        let mut items = self.inner.items.borrow_mut();
        let pos = items.iter().position(pred)?;
        items.remove(pos)
    }

    /// Withdraw every matching item, preserving their relative order.
    pub fn remove_all(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        let mut items = self.inner.items.borrow_mut();
        let (taken, kept): (VecDeque<T>, VecDeque<T>) = items.drain(..).partition(|i| pred(i));
        *items = kept;
        taken.into()
    }

    /// Swap the first item matching `pred` for `item` in one update, keeping
    /// its position.  Appends `item` if nothing matched.
    pub fn replace(&self, pred: impl Fn(&T) -> bool, item: T) {
        let pos = self.inner.items.borrow().iter().position(pred);
        match pos {
            Some(pos) => self.inner.items.borrow_mut()[pos] = item,
            None => self.put(item),
        }
    }

    /// `true` if any stored item matches `pred`.
    pub fn contains(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.inner.items.borrow().iter().any(pred)
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Number of processes parked on this store.
    pub fn waiting(&self) -> usize {
        self.inner.waiters.borrow().len()
    }

    /// Items already handed to a woken `get` whose process has not resumed.
    /// They belong to neither the store nor the receiver yet.
    pub fn in_transit(&self) -> usize {
        self.inner.in_transit.borrow().len()
    }

    /// `true` when nothing is stored and nothing is in transit.
    pub fn is_settled(&self) -> bool {
        self.is_empty() && self.in_transit() == 0
    }

    /// Stored plus in-transit items matching `pred`.
    pub fn count(&self, pred: impl Fn(&T) -> bool) -> usize {
        let stored = self.inner.items.borrow().iter().filter(|i| pred(i)).count();
        let moving = self
            .inner
            .in_transit
            .borrow()
            .iter()
            .filter(|slot| slot.borrow().as_ref().is_some_and(&pred))
            .count();
        stored + moving
    }

    fn settle(&self, slot: &Slot<T>) {
        self.inner.in_transit.borrow_mut().retain(|s| !Rc::ptr_eq(s, slot));
    }

    /// Read the contents without copying them.
    pub fn with_items<R>(&self, f: impl FnOnce(&VecDeque<T>) -> R) -> R {
        f(&self.inner.items.borrow())
    }

    fn take_now(&self, filter: Option<&Filter<T>>) -> Option<T> {
        let mut items = self.inner.items.borrow_mut();
        let pos = match filter {
            Some(f) => items.iter().position(|i| f(i))?,
            None if items.is_empty() => return None,
            None => 0,
        };
        items.remove(pos)
    }
}

impl<T: Clone + 'static> Store<T> {
    /// Copy of the current contents in insertion order.
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.items.borrow().iter().cloned().collect()
    }

    /// Copy of the first item matching `pred`.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.inner.items.borrow().iter().find(|i| pred(i)).cloned()
    }
}

// ── Get ───────────────────────────────────────────────────────────────────────

/// Future returned by [`Store::get`] and [`Store::get_filtered`].
pub struct Get<T: 'static> {
    store:  Store<T>,
    filter: Option<Filter<T>>,
    slot:   Option<Slot<T>>,
}

impl<T: 'static> Future for Get<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<T> {
        if let Some(slot) = &self.slot {
            let taken = slot.borrow_mut().take();
            return match taken {
                Some(item) => {
                    self.store.settle(slot);
                    Poll::Ready(item)
                }
                None => Poll::Pending,
            };
        }

        if let Some(item) = self.store.take_now(self.filter.as_ref()) {
            return Poll::Ready(item);
        }

        let process = self.store.inner.handle.park_current();
        let slot: Slot<T> = Rc::new(RefCell::new(None));
        self.store.inner.waiters.borrow_mut().push_back(Waiter {
            process,
            filter: self.filter.clone(),
            slot: Rc::clone(&slot),
        });
        trace!(store = %self.store.inner.name, %process, "get parked");
        self.slot = Some(slot);
        Poll::Pending
    }
}

impl<T: 'static> Drop for Get<T> {
    /// An abandoned `get` must not swallow an item: deregister the waiter and
    /// return anything already handed over.
    fn drop(&mut self) {
        let Some(slot) = self.slot.take() else { return };
        self.store
            .inner
            .waiters
            .borrow_mut()
            .retain(|w| !Rc::ptr_eq(&w.slot, &slot));
        self.store.settle(&slot);
        let item = slot.borrow_mut().take();
        if let Some(item) = item {
            self.store.inner.items.borrow_mut().push_front(item);
        }
    }
}
