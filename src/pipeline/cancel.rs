//! Write-once cancellation shared by every pipeline stage.
//!
//! The token owns the only sender of a zero-traffic channel. Cancelling drops that sender,
//! so [`CancelToken::done`] becomes ready (disconnected) for every receiver at once and
//! can be raced against channel sends and receives in `select!`.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Callback = Box<dyn FnOnce() + Send>;

/// Handle for a callback registered with [`CancelToken::on_cancel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallbackId(u64);

#[derive(Default)]
struct Callbacks {
    next_id: u64,
    pending: Vec<(CallbackId, Callback)>,
}

struct Inner {
    cancelled: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
    callbacks: Mutex<Callbacks>,
    /// Set for children: the parent and the callback that forwards its cancellation here.
    parent: Mutex<Option<(Weak<Inner>, CallbackId)>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(slot) = self.parent.get_mut()
            && let Some((parent, id)) = slot.take()
            && let Some(parent) = parent.upgrade()
        {
            CancelToken { inner: parent }.remove_on_cancel(id);
        }
    }
}

/// Cancellation signal. Clones share state; cancelling any clone cancels all of them.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (trigger, done) = bounded::<()>(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(trigger)),
                done,
                callbacks: Mutex::new(Callbacks::default()),
                parent: Mutex::new(None),
            }),
        }
    }

    /// Signal cancellation. Returns true only for the call that flipped the state;
    /// repeated or racing calls are no-ops.
    pub fn cancel(&self) -> bool {
        let callbacks = {
            let mut callbacks = self.inner.callbacks.lock().unwrap();
            if self.inner.cancelled.swap(true, Ordering::AcqRel) {
                return false;
            }
            std::mem::take(&mut callbacks.pending)
        };
        drop(self.inner.trigger.lock().unwrap().take());
        for (_, f) in callbacks {
            f();
        }
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Receiver that never yields a value and disconnects on cancellation.
    /// Use as a `recv(token.done())` arm in `crossbeam_channel::select!`.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }

    /// Run `f` once when the token is cancelled. Runs immediately if it already is.
    pub fn on_cancel<F>(&self, f: F) -> CallbackId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = {
            let mut callbacks = self.inner.callbacks.lock().unwrap();
            let id = CallbackId(callbacks.next_id);
            callbacks.next_id += 1;
            if !self.is_cancelled() {
                callbacks.pending.push((id, Box::new(f)));
                return id;
            }
            id
        };
        f();
        id
    }

    /// Drop a callback that has not run yet. Returns false if it already ran or was removed.
    pub fn remove_on_cancel(&self, id: CallbackId) -> bool {
        let removed = {
            let mut callbacks = self.inner.callbacks.lock().unwrap();
            callbacks
                .pending
                .iter()
                .position(|(pending, _)| *pending == id)
                .map(|i| callbacks.pending.swap_remove(i))
        };
        removed.is_some()
    }

    /// New token cancelled whenever `self` is. Cancelling the child leaves the parent alone.
    ///
    /// The forwarding callback is removed from `self` once the last clone of the child drops.
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        let weak = Arc::downgrade(&child.inner);
        let id = self.on_cancel(move || {
            if let Some(inner) = weak.upgrade() {
                CancelToken { inner }.cancel();
            }
        });
        *child.inner.parent.lock().unwrap() = Some((Arc::downgrade(&self.inner), id));
        child
    }

    /// Guard that cancels this token when dropped.
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            token: self.clone(),
        }
    }
}

/// Cancels its token on drop, covering early returns and panics alike.
#[derive(Debug)]
pub struct CancelOnDrop {
    token: CancelToken,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
