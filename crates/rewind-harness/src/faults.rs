#![forbid(unsafe_code)]

//! Codec and compressor wrappers for failure and reentrancy scenarios.

use std::cell::Cell;
use std::io;
use std::rc::Rc;

use rewind::{BoxError, Channel, Compressor, DocumentCodec, Event, EventHub};

/// Shared on/off switch. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct FaultSwitch(Rc<Cell<bool>>);

impl FaultSwitch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&self) {
        self.0.set(true);
    }

    pub fn disarm(&self) {
        self.0.set(false);
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.0.get()
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Wraps a codec; each direction fails while its switch is armed.
#[derive(Debug, Clone)]
pub struct FaultyCodec<C> {
    inner: C,
    pub serialize_fault: FaultSwitch,
    pub restore_fault: FaultSwitch,
}

impl<C> FaultyCodec<C> {
    #[must_use]
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            serialize_fault: FaultSwitch::new(),
            restore_fault: FaultSwitch::new(),
        }
    }
}

impl<D: ?Sized, C: DocumentCodec<D>> DocumentCodec<D> for FaultyCodec<C> {
    fn serialize(&self, document: &D) -> Result<String, BoxError> {
        if self.serialize_fault.is_armed() {
            return Err("injected serialize fault".into());
        }
        self.inner.serialize(document)
    }

    fn restore(&self, document: &mut D, text: &str) -> Result<(), BoxError> {
        if self.restore_fault.is_armed() {
            return Err("injected restore fault".into());
        }
        self.inner.restore(document, text)
    }
}

// ============================================================================
// Compressor
// ============================================================================

/// Wraps a compressor; each direction fails while its switch is armed.
#[derive(Debug, Clone)]
pub struct FaultyCompressor<Z> {
    inner: Z,
    pub compress_fault: FaultSwitch,
    pub decompress_fault: FaultSwitch,
}

impl<Z> FaultyCompressor<Z> {
    #[must_use]
    pub fn new(inner: Z) -> Self {
        Self {
            inner,
            compress_fault: FaultSwitch::new(),
            decompress_fault: FaultSwitch::new(),
        }
    }
}

impl<Z: Compressor> Compressor for FaultyCompressor<Z> {
    fn compress(&self, text: &str) -> io::Result<Vec<u8>> {
        if self.compress_fault.is_armed() {
            return Err(io::Error::other("injected compress fault"));
        }
        self.inner.compress(text)
    }

    fn decompress(&self, bytes: &[u8]) -> io::Result<String> {
        if self.decompress_fault.is_armed() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "injected decompress fault",
            ));
        }
        self.inner.decompress(bytes)
    }
}

// ============================================================================
// Echoing codec
// ============================================================================

/// A codec that behaves like a real editor: applying a restored state fires
/// one change event per capture channel.
///
/// Those echoes must never turn into captures. `echoes()` counts how many
/// were sent so tests can assert they actually happened.
#[derive(Debug, Clone)]
pub struct EchoingCodec<C> {
    inner: C,
    hub: EventHub,
    echoes: Rc<Cell<usize>>,
}

impl<C> EchoingCodec<C> {
    #[must_use]
    pub fn new(inner: C, hub: &EventHub) -> Self {
        Self {
            inner,
            hub: hub.clone(),
            echoes: Rc::new(Cell::new(0)),
        }
    }

    /// Change events emitted from inside `restore` so far.
    #[must_use]
    pub fn echoes(&self) -> usize {
        self.echoes.get()
    }

    /// Shared counter, readable after the codec moved into a history.
    #[must_use]
    pub fn echo_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.echoes)
    }
}

fn echo_event(channel: Channel) -> Event {
    match channel {
        Channel::DocumentChanged => Event::DocumentChanged,
        Channel::RebuildRequired => Event::RebuildRequired,
        Channel::NodeMoved => Event::NodeMoved,
        _ => Event::NodeAdded,
    }
}

impl<D: ?Sized, C: DocumentCodec<D>> DocumentCodec<D> for EchoingCodec<C> {
    fn serialize(&self, document: &D) -> Result<String, BoxError> {
        self.inner.serialize(document)
    }

    fn restore(&self, document: &mut D, text: &str) -> Result<(), BoxError> {
        self.inner.restore(document, text)?;
        for channel in Channel::CAPTURE {
            self.hub.emit(&echo_event(channel))?;
            self.echoes.set(self.echoes.get() + 1);
        }
        Ok(())
    }
}
