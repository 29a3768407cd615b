#![forbid(unsafe_code)]

//! Wiring between a [`SnapshotHistory`], a shared document and an
//! [`EventHub`].
//!
//! [`HistorySession::attach`] subscribes one capture handler to each of
//! [`Channel::CAPTURE`] and one reset handler to [`Channel::ClearHistory`],
//! then records a baseline. The handlers hold weak references, so the hub
//! never keeps the document or history alive on its own.
//!
//! # Borrowing
//!
//! The document lives in an `Rc<RefCell<D>>` shared with the host. Emit
//! change events *after* releasing any `borrow_mut` of the document; a
//! capture handler that finds the document mutably borrowed reports
//! [`HistoryError::Busy`] instead of panicking.
//!
//! During a transition the document is mutably borrowed only for the restore
//! itself. Change events the restore emits reach the capture handlers while
//! the guard is held, and the handlers return before touching any `RefCell`.
//! `SelectionCleared` and `ResetRequired` listeners run with no borrow held
//! and may query the session (`can_undo`, `past_len`, ...).

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, info_span, trace, warn};
use web_time::Instant;

use crate::codec::DocumentCodec;
use crate::compress::{Compressor, GzipCompressor};
use crate::error::{HistoryError, HistoryResult};
use crate::guard::ReentrancyGuard;
use crate::history::{CaptureOutcome, SnapshotHistory};
use crate::hub::{Channel, Event, EventHub, SubscriptionHandle};
use crate::transition::Direction;

/// A history bound to one document and one hub.
pub struct HistorySession<D, C, Z = GzipCompressor> {
    document: Rc<RefCell<D>>,
    history: Rc<RefCell<SnapshotHistory<C, Z>>>,
    hub: EventHub,
    guard: ReentrancyGuard,
    handles: Vec<SubscriptionHandle>,
    disposed: bool,
}

impl<D, C, Z> fmt::Debug for HistorySession<D, C, Z> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistorySession")
            .field("history", &self.history)
            .field("subscriptions", &self.handles.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

fn busy<E>(what: &'static str) -> impl FnOnce(E) -> HistoryError {
    move |_| HistoryError::Busy(what)
}

impl<D, C, Z> HistorySession<D, C, Z>
where
    D: 'static,
    C: DocumentCodec<D> + 'static,
    Z: Compressor + 'static,
{
    /// Subscribe `history` to `hub` and capture the document's current state
    /// as the baseline.
    pub fn attach(
        hub: &EventHub,
        document: Rc<RefCell<D>>,
        history: SnapshotHistory<C, Z>,
    ) -> HistoryResult<Self> {
        history.ensure_live()?;
        let guard = history.guard().clone();
        let history = Rc::new(RefCell::new(history));

        let mut handles = Vec::with_capacity(Channel::CAPTURE.len() + 1);
        for channel in Channel::CAPTURE {
            let handler = capture_handler(&history, &document, &guard);
            handles.push(hub.subscribe(channel, handler));
        }
        handles.push(hub.subscribe(
            Channel::ClearHistory,
            reset_handler(&history, &document, &guard),
        ));

        let session = Self {
            document,
            history,
            hub: hub.clone(),
            guard,
            handles,
            disposed: false,
        };
        // On failure the session drops here and revokes its handlers.
        session.capture()?;
        debug!(
            subscriptions = session.handles.len(),
            "history session attached"
        );
        Ok(session)
    }

    /// Capture the document now, outside of any notification.
    pub fn capture(&self) -> HistoryResult<CaptureOutcome> {
        self.ensure_live()?;
        let document = self.document.try_borrow().map_err(busy("document"))?;
        let mut history = self.history.try_borrow_mut().map_err(busy("history"))?;
        history.capture(&*document)
    }

    /// Step back one state. `Ok(false)` at the oldest retained state.
    pub fn undo(&self) -> HistoryResult<bool> {
        self.transition(Direction::Undo)
    }

    /// Re-apply the most recently undone state. `Ok(false)` if none.
    pub fn redo(&self) -> HistoryResult<bool> {
        self.transition(Direction::Redo)
    }

    /// Clear both stacks and capture a new baseline.
    pub fn reset(&self) -> HistoryResult<()> {
        self.ensure_live()?;
        let document = self.document.try_borrow().map_err(busy("document"))?;
        let mut history = self.history.try_borrow_mut().map_err(busy("history"))?;
        history.reset(&*document)
    }

    fn transition(&self, direction: Direction) -> HistoryResult<bool> {
        self.ensure_live()?;
        let Some(_token) = self.guard.try_enter() else {
            return Err(HistoryError::TransitionInProgress);
        };
        let start = Instant::now();
        let _span = info_span!("history.transition", direction = direction.as_str()).entered();

        let staged = self
            .history
            .try_borrow_mut()
            .map_err(busy("history"))?
            .stage(direction)?;
        let Some(text) = staged else {
            trace!("nothing to {direction}");
            return Ok(false);
        };

        let applied = self.hub.emit(&Event::SelectionCleared).and_then(|()| {
            let history = self.history.try_borrow().map_err(busy("history"))?;
            let mut document = self.document.try_borrow_mut().map_err(busy("document"))?;
            history.restore_into(&mut *document, &text)
        });
        let mut history = match self.history.try_borrow_mut() {
            Ok(history) => history,
            Err(_) => {
                warn!(%direction, "history borrowed while finishing transition");
                return Err(applied.err().unwrap_or(HistoryError::Busy("history")));
            }
        };
        match applied {
            Ok(()) => history.commit(direction),
            Err(err) => {
                history.unstage(direction);
                return Err(err);
            }
        }
        drop(history);

        self.hub.emit(&Event::ResetRequired { full: true })?;
        debug!(
            past_len = self.past_len(),
            future_len = self.future_len(),
            duration_us = start.elapsed().as_micros() as u64,
            "transition applied"
        );
        Ok(true)
    }
}

impl<D, C, Z> HistorySession<D, C, Z> {
    /// Revoke every subscription and release all snapshots.
    ///
    /// Returns `false` if the session was already disposed.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            if self.history.try_borrow().is_ok_and(|h| !h.is_disposed()) {
                self.release_history();
            }
            return false;
        }
        for handle in self.handles.drain(..) {
            self.hub.unsubscribe(handle);
        }
        self.disposed = true;
        self.release_history();
        debug!("history session disposed");
        true
    }

    /// Drop every snapshot. Deferred to the next `dispose` (or drop) if the
    /// history is borrowed right now.
    fn release_history(&mut self) {
        match self.history.try_borrow_mut() {
            Ok(mut history) => {
                history.dispose();
            }
            Err(_) => warn!("history borrowed during dispose; releasing snapshots later"),
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.disposed && self.history.try_borrow().is_ok_and(|h| h.can_undo())
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.disposed && self.history.try_borrow().is_ok_and(|h| h.can_redo())
    }

    #[must_use]
    pub fn past_len(&self) -> usize {
        if self.disposed {
            return 0;
        }
        self.history.try_borrow().map_or(0, |h| h.past_len())
    }

    #[must_use]
    pub fn future_len(&self) -> usize {
        if self.disposed {
            return 0;
        }
        self.history.try_borrow().map_or(0, |h| h.future_len())
    }

    /// Is an undo/redo running right now?
    #[must_use]
    pub fn in_transition(&self) -> bool {
        self.guard.is_held()
    }

    /// The shared document.
    #[must_use]
    pub fn document(&self) -> &Rc<RefCell<D>> {
        &self.document
    }

    #[must_use]
    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Subscriptions this session still holds.
    #[must_use]
    pub fn subscriptions(&self) -> &[SubscriptionHandle] {
        &self.handles
    }

    /// Run `f` against the underlying history.
    pub fn with_history<R>(&self, f: impl FnOnce(&SnapshotHistory<C, Z>) -> R) -> HistoryResult<R> {
        let history = self.history.try_borrow().map_err(busy("history"))?;
        Ok(f(&history))
    }

    fn ensure_live(&self) -> HistoryResult<()> {
        if self.disposed {
            Err(HistoryError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl<D, C, Z> Drop for HistorySession<D, C, Z> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn capture_handler<D, C, Z>(
    history: &Rc<RefCell<SnapshotHistory<C, Z>>>,
    document: &Rc<RefCell<D>>,
    guard: &ReentrancyGuard,
) -> impl FnMut(&Event) -> HistoryResult<()> + 'static
where
    D: 'static,
    C: DocumentCodec<D> + 'static,
    Z: Compressor + 'static,
{
    let history: Weak<RefCell<SnapshotHistory<C, Z>>> = Rc::downgrade(history);
    let document: Weak<RefCell<D>> = Rc::downgrade(document);
    let guard = guard.clone();
    move |event| {
        if guard.is_held() {
            trace!(channel = %event.channel(), "capture suppressed during transition");
            return Ok(());
        }
        let (Some(history), Some(document)) = (history.upgrade(), document.upgrade()) else {
            return Ok(());
        };
        let document = document.try_borrow().map_err(busy("document"))?;
        let mut history = history.try_borrow_mut().map_err(busy("history"))?;
        history.capture(&*document).map(|_| ())
    }
}

fn reset_handler<D, C, Z>(
    history: &Rc<RefCell<SnapshotHistory<C, Z>>>,
    document: &Rc<RefCell<D>>,
    guard: &ReentrancyGuard,
) -> impl FnMut(&Event) -> HistoryResult<()> + 'static
where
    D: 'static,
    C: DocumentCodec<D> + 'static,
    Z: Compressor + 'static,
{
    let history: Weak<RefCell<SnapshotHistory<C, Z>>> = Rc::downgrade(history);
    let document: Weak<RefCell<D>> = Rc::downgrade(document);
    let guard = guard.clone();
    move |_event| {
        if guard.is_held() {
            trace!("clear-history ignored during transition");
            return Ok(());
        }
        let (Some(history), Some(document)) = (history.upgrade(), document.upgrade()) else {
            return Ok(());
        };
        let document = document.try_borrow().map_err(busy("document"))?;
        let mut history = history.try_borrow_mut().map_err(busy("history"))?;
        history.reset(&*document)
    }
}
