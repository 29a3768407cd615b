#![forbid(unsafe_code)]

//! Records transition notifications, optionally probing host state at the
//! moment each one is delivered.

use std::cell::RefCell;
use std::rc::Rc;

use rewind::{Channel, Event, EventHub, SubscriptionHandle};

/// One delivered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub event: Event,
    /// Observer output captured during delivery.
    pub observed: Option<String>,
}

type Observer = Rc<dyn Fn() -> String>;

/// Listens on `SelectionCleared` and `ResetRequired`.
pub struct NoticeRecorder {
    hub: EventHub,
    log: Rc<RefCell<Vec<Notice>>>,
    handles: Vec<SubscriptionHandle>,
}

impl std::fmt::Debug for NoticeRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoticeRecorder")
            .field("notices", &self.log.borrow().len())
            .field("attached", &!self.handles.is_empty())
            .finish()
    }
}

impl NoticeRecorder {
    /// Record events only.
    #[must_use]
    pub fn attach(hub: &EventHub) -> Self {
        Self::subscribe(hub, None)
    }

    /// Record events plus `observe()` evaluated inside each handler.
    #[must_use]
    pub fn attach_observing(hub: &EventHub, observe: impl Fn() -> String + 'static) -> Self {
        Self::subscribe(hub, Some(Rc::new(observe)))
    }

    fn subscribe(hub: &EventHub, observer: Option<Observer>) -> Self {
        let log = Rc::new(RefCell::new(Vec::new()));
        let handles = [Channel::SelectionCleared, Channel::ResetRequired]
            .into_iter()
            .map(|channel| {
                let log = Rc::clone(&log);
                let observer = observer.clone();
                hub.subscribe(channel, move |event| {
                    let observed = observer.as_ref().map(|f| f());
                    log.borrow_mut().push(Notice {
                        event: *event,
                        observed,
                    });
                    Ok(())
                })
            })
            .collect();
        Self {
            hub: hub.clone(),
            log,
            handles,
        }
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.log.borrow().clone()
    }

    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.log.borrow().iter().map(|n| n.event).collect()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    /// Stop listening. Recorded notices are kept.
    pub fn detach(&mut self) {
        for handle in self.handles.drain(..) {
            self.hub.unsubscribe(handle);
        }
    }
}

impl Drop for NoticeRecorder {
    fn drop(&mut self) {
        self.detach();
    }
}
