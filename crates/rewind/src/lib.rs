#![forbid(unsafe_code)]

//! Rewind: full-snapshot undo/redo history.
//!
//! Every meaningful change to a document is captured as a compressed copy of
//! its complete serialized state. Undo and redo swap whole states in and out
//! of the live document, with a reentrancy guard keeping the restore from
//! recording itself as a new change.
//!
//! # Key Components
//!
//! - [`SnapshotHistory`] - capture policy, dedup and undo/redo over two stacks
//! - [`SnapshotStore`] - bounded past/future stacks with eviction
//! - [`DocumentCodec`] / [`JsonCodec`] - document <-> canonical text
//! - [`Compressor`] / [`GzipCompressor`] - text <-> stored bytes
//! - [`EventHub`] - typed notification channels with revocable handles
//! - [`HistorySession`] - binds a history to a shared document and a hub
//!
//! # Architecture
//!
//! ```text
//!  edit ─► EventHub ──(DocumentChanged | RebuildRequired | NodeMoved | NodeAdded)──┐
//!                                                                                   ▼
//!                           HistorySession ─► SnapshotHistory::capture ─► SnapshotStore
//!                                                   (dedup, compress)     (evict oldest)
//!
//!  undo/redo ─► guard ─► stage stacks ─► SelectionCleared ─► codec.restore
//!                                      ─► ResetRequired ─► release guard
//! ```
//!
//! # Quick Start
//!
//! ```
//! # #[cfg(feature = "json")] {
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use rewind::{Event, EventHub, HistoryConfig, HistorySession, JsonCodec, SnapshotHistory};
//!
//! let hub = EventHub::new();
//! let doc = Rc::new(RefCell::new(vec!["title".to_string()]));
//! let history = SnapshotHistory::new(JsonCodec, HistoryConfig::default()).unwrap();
//! let session = HistorySession::attach(&hub, Rc::clone(&doc), history).unwrap();
//!
//! doc.borrow_mut().push("subtitle".to_string());
//! hub.emit(&Event::NodeAdded).unwrap();
//!
//! assert!(session.undo().unwrap());
//! assert_eq!(doc.borrow().len(), 1);
//! # }
//! ```

pub mod codec;
pub mod compress;
pub mod config;
pub mod error;
pub mod guard;
pub mod history;
pub mod hub;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod transition;

pub use codec::DocumentCodec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use compress::{Compressor, GzipCompressor, Passthrough};
pub use config::{DEFAULT_MAX_HISTORY_LENGTH, HistoryConfig, RedoPolicy};
pub use error::{BoxError, HistoryError, HistoryResult, StackKind};
pub use guard::{GuardToken, ReentrancyGuard};
pub use history::{CaptureOutcome, SnapshotHistory};
pub use hub::{Channel, Event, EventHub, SubscriptionHandle};
pub use session::HistorySession;
pub use snapshot::Snapshot;
pub use store::SnapshotStore;
pub use transition::{Direction, TransitionObserver};
