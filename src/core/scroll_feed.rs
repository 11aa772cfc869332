//! Scroll event feed - host scroll notifications fanned out to controllers
//!
//! Architecture:
//! - Controllers (or any callback) subscribe and get a `Subscription` handle
//! - `notify()` invokes every callback immediately, in subscription order
//! - Events carry no payload: subscribers read scroll geometry themselves
//!
//! Dropping a `Subscription` keeps the callback registered; call
//! `unsubscribe()` to remove it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use indexmap::IndexMap;
use log::{trace, warn};

use super::controller::AnimationController;
use super::mapper::ScrollRegion;
use crate::entities::Canvas;

type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct FeedInner {
    subscribers: RwLock<IndexMap<u64, Callback>>,
    next_id: AtomicU64,
}

/// Scroll notification fan-out. Clones share subscribers.
#[derive(Clone, Default)]
pub struct ScrollFeed {
    inner: Arc<FeedInner>,
}

impl std::fmt::Debug for ScrollFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollFeed")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl ScrollFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for every scroll notification.
    ///
    /// # Example
    /// ```ignore
    /// let feed = ScrollFeed::new();
    /// let sub = feed.subscribe(move || println!("scrolled"));
    /// feed.notify();
    /// sub.unsubscribe();
    /// ```
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, Arc::new(callback));
        trace!("Scroll subscriber {} added", id);
        Subscription {
            id,
            feed: self.clone(),
        }
    }

    /// Subscribe a shared controller: every notification runs its scroll handler.
    pub fn bind<C, R>(&self, controller: Arc<Mutex<AnimationController<C, R>>>) -> Subscription
    where
        C: Canvas + Send + 'static,
        R: ScrollRegion + Send + 'static,
    {
        self.subscribe(move || {
            controller
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .render_on_scroll();
        })
    }

    /// Invoke all callbacks. Returns how many ran.
    pub fn notify(&self) -> usize {
        // Snapshot so callbacks may subscribe/unsubscribe without deadlocking
        let callbacks: Vec<Callback> = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        for cb in &callbacks {
            cb();
        }
        callbacks.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn remove(&self, id: u64) {
        let removed = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .shift_remove(&id);
        if removed.is_none() {
            warn!("Scroll subscriber {} was not registered", id);
        }
    }
}

/// Handle returned by `ScrollFeed::subscribe`
#[derive(Debug)]
#[must_use = "keep the handle to unsubscribe later"]
pub struct Subscription {
    id: u64,
    feed: ScrollFeed,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(self) {
        self.feed.remove(self.id);
        trace!("Scroll subscriber {} removed", self.id);
    }
}
