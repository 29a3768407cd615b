#![forbid(unsafe_code)]

//! Reference document: a small node graph edited through an [`EventHub`].
//!
//! [`GraphEditor`] mutates the shared [`Graph`] and then announces the edit
//! on the matching channel, releasing its borrow first, which is the
//! contract [`HistorySession`](rewind::HistorySession) expects from a host.

use std::cell::RefCell;
use std::rc::Rc;

use rewind::{DocumentCodec, Event, EventHub, HistoryResult, JsonCodec};
use serde::{Deserialize, Serialize};

/// A graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: u32,
    pub kind: String,
    pub title: String,
    pub pos: (i32, i32),
}

/// A directed link between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub from: u32,
    pub to: u32,
}

/// Serializable node graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    next_id: u32,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node and return its id.
    pub fn add_node(&mut self, kind: &str, pos: (i32, i32)) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.push(Node {
            id,
            kind: kind.to_string(),
            title: kind.to_string(),
            pos,
        });
        id
    }

    #[must_use]
    pub fn node(&self, id: u32) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn node_mut(&mut self, id: u32) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Offset a node. Returns `false` for unknown ids.
    pub fn move_node(&mut self, id: u32, dx: i32, dy: i32) -> bool {
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        node.pos = (node.pos.0 + dx, node.pos.1 + dy);
        true
    }

    pub fn rename(&mut self, id: u32, title: &str) -> bool {
        let Some(node) = self.node_mut(id) else {
            return false;
        };
        node.title = title.to_string();
        true
    }

    /// Link two existing nodes. Duplicate links are ignored.
    pub fn connect(&mut self, from: u32, to: u32) -> bool {
        if self.node(from).is_none() || self.node(to).is_none() {
            return false;
        }
        let link = Link { from, to };
        if !self.links.contains(&link) {
            self.links.push(link);
        }
        true
    }

    /// Canonical text, as the history stores it.
    #[must_use]
    pub fn serialized(&self) -> String {
        JsonCodec.serialize(self).unwrap_or_default()
    }
}

/// Edits a shared [`Graph`] and announces each edit on the hub.
#[derive(Debug, Clone)]
pub struct GraphEditor {
    graph: Rc<RefCell<Graph>>,
    hub: EventHub,
}

impl GraphEditor {
    /// Editor over an empty graph.
    #[must_use]
    pub fn new(hub: &EventHub) -> Self {
        Self::with_graph(hub, Graph::new())
    }

    #[must_use]
    pub fn with_graph(hub: &EventHub, graph: Graph) -> Self {
        Self {
            graph: Rc::new(RefCell::new(graph)),
            hub: hub.clone(),
        }
    }

    /// The shared document handle.
    #[must_use]
    pub fn graph(&self) -> &Rc<RefCell<Graph>> {
        &self.graph
    }

    /// Current serialized state.
    #[must_use]
    pub fn serialized(&self) -> String {
        self.graph.borrow().serialized()
    }

    pub fn add_node(&self, kind: &str, pos: (i32, i32)) -> HistoryResult<u32> {
        let id = self.graph.borrow_mut().add_node(kind, pos);
        self.hub.emit(&Event::NodeAdded)?;
        Ok(id)
    }

    pub fn move_node(&self, id: u32, dx: i32, dy: i32) -> HistoryResult<bool> {
        let moved = self.graph.borrow_mut().move_node(id, dx, dy);
        self.hub.emit(&Event::NodeMoved)?;
        Ok(moved)
    }

    pub fn rename(&self, id: u32, title: &str) -> HistoryResult<bool> {
        let renamed = self.graph.borrow_mut().rename(id, title);
        self.hub.emit(&Event::DocumentChanged)?;
        Ok(renamed)
    }

    pub fn connect(&self, from: u32, to: u32) -> HistoryResult<bool> {
        let linked = self.graph.borrow_mut().connect(from, to);
        self.hub.emit(&Event::DocumentChanged)?;
        Ok(linked)
    }

    /// Swap the whole graph (paste, bulk edit).
    pub fn replace(&self, graph: Graph) -> HistoryResult<()> {
        *self.graph.borrow_mut() = graph;
        self.hub.emit(&Event::RebuildRequired)
    }

    /// Load a different file: swap the graph and drop all history.
    pub fn load(&self, graph: Graph) -> HistoryResult<()> {
        *self.graph.borrow_mut() = graph;
        self.hub.emit(&Event::ClearHistory)
    }
}
