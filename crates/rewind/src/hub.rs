#![forbid(unsafe_code)]

//! Typed, single-threaded notification hub.
//!
//! # Design
//!
//! [`EventHub`] keeps its handlers in shared, reference-counted storage
//! (`Rc<RefCell<..>>`); cloning the hub yields another handle to the same
//! registry. Every [`subscribe`](EventHub::subscribe) returns a
//! [`SubscriptionHandle`] that revokes exactly that handler.
//!
//! # Dispatch
//!
//! `emit` snapshots the matching handlers before calling any of them, so
//! handlers may subscribe, unsubscribe or emit again while being called:
//!
//! - a handler revoked mid-dispatch is not called afterwards, even within
//!   the same `emit`;
//! - a handler that (directly or indirectly) re-triggers its own channel is
//!   not re-entered; the nested call skips it;
//! - the first handler error stops dispatch and is returned to the emitter.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::HistoryResult;
use crate::transition::TransitionObserver;

/// Named notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Some document field changed.
    DocumentChanged,
    /// The document needs a full rebuild (bulk edit, load, paste).
    RebuildRequired,
    /// A node changed position.
    NodeMoved,
    /// A node was inserted.
    NodeAdded,
    /// Drop all history, e.g. after a new file was loaded.
    ClearHistory,
    /// Published before a transition mutates the document.
    SelectionCleared,
    /// Published after a transition mutated the document.
    ResetRequired,
}

impl Channel {
    /// Channels whose events trigger a capture.
    pub const CAPTURE: [Channel; 4] = [
        Channel::DocumentChanged,
        Channel::RebuildRequired,
        Channel::NodeMoved,
        Channel::NodeAdded,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::DocumentChanged => "document-changed",
            Self::RebuildRequired => "rebuild-required",
            Self::NodeMoved => "node-moved",
            Self::NodeAdded => "node-added",
            Self::ClearHistory => "clear-history",
            Self::SelectionCleared => "selection-cleared",
            Self::ResetRequired => "reset-required",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An event and its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    DocumentChanged,
    RebuildRequired,
    NodeMoved,
    NodeAdded,
    ClearHistory,
    SelectionCleared,
    /// `full` distinguishes a complete rebuild from an incremental refresh.
    ResetRequired { full: bool },
}

impl Event {
    /// The channel this event is delivered on.
    #[must_use]
    pub fn channel(&self) -> Channel {
        match self {
            Self::DocumentChanged => Channel::DocumentChanged,
            Self::RebuildRequired => Channel::RebuildRequired,
            Self::NodeMoved => Channel::NodeMoved,
            Self::NodeAdded => Channel::NodeAdded,
            Self::ClearHistory => Channel::ClearHistory,
            Self::SelectionCleared => Channel::SelectionCleared,
            Self::ResetRequired { .. } => Channel::ResetRequired,
        }
    }
}

type Handler = Box<dyn FnMut(&Event) -> HistoryResult<()>>;

struct Slot {
    id: u64,
    channel: Channel,
    live: Cell<bool>,
    handler: RefCell<Handler>,
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    slots: Vec<Rc<Slot>>,
}

/// Revokes one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    channel: Channel,
}

impl SubscriptionHandle {
    #[must_use]
    pub fn channel(&self) -> Channel {
        self.channel
    }
}

/// Shared publish/subscribe registry.
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Rc<RefCell<HubInner>>,
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventHub")
            .field("subscribers", &inner.slots.len())
            .field("next_id", &inner.next_id)
            .finish()
    }
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `channel`.
    pub fn subscribe(
        &self,
        channel: Channel,
        handler: impl FnMut(&Event) -> HistoryResult<()> + 'static,
    ) -> SubscriptionHandle {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.slots.push(Rc::new(Slot {
            id,
            channel,
            live: Cell::new(true),
            handler: RefCell::new(Box::new(handler)),
        }));
        debug!(sub_id = id, %channel, "subscribed");
        SubscriptionHandle { id, channel }
    }

    /// Revoke a handler. Returns `false` if it was already revoked.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(pos) = inner.slots.iter().position(|s| s.id == handle.id) else {
            trace!(sub_id = handle.id, "unsubscribe of unknown handle");
            return false;
        };
        let slot = inner.slots.remove(pos);
        slot.live.set(false);
        debug!(sub_id = handle.id, channel = %handle.channel, "unsubscribed");
        true
    }

    /// Is `handle` still registered?
    #[must_use]
    pub fn is_subscribed(&self, handle: SubscriptionHandle) -> bool {
        self.inner.borrow().slots.iter().any(|s| s.id == handle.id)
    }

    /// Live handlers on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.inner
            .borrow()
            .slots
            .iter()
            .filter(|s| s.channel == channel)
            .count()
    }

    /// Deliver `event` to every handler on its channel, in registration order.
    pub fn emit(&self, event: &Event) -> HistoryResult<()> {
        let channel = event.channel();
        // Collect first so handlers can touch the registry.
        let targets: Vec<Rc<Slot>> = self
            .inner
            .borrow()
            .slots
            .iter()
            .filter(|s| s.channel == channel)
            .cloned()
            .collect();

        for slot in targets {
            if !slot.live.get() {
                continue;
            }
            match slot.handler.try_borrow_mut() {
                Ok(mut handler) => (&mut **handler)(event)?,
                Err(_) => trace!(sub_id = slot.id, %channel, "skipping re-entered handler"),
            }
        }
        Ok(())
    }
}

impl TransitionObserver for EventHub {
    fn selection_cleared(&mut self) -> HistoryResult<()> {
        self.emit(&Event::SelectionCleared)
    }

    fn reset_required(&mut self, full: bool) -> HistoryResult<()> {
        self.emit(&Event::ResetRequired { full })
    }
}
