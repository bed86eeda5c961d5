//! # Module: routing
//!
//! ## Responsibility
//! Typed lookup of the routing-protocol instance installed on each node,
//! plus the two consumers of that lookup: [`observation`] reads the quality
//! scalar, [`action`] writes the timer parameter.
//!
//! Every node carries a priority-ordered list of installed protocols, each
//! tagged with a [`Capability`]. Resolving a capability walks the list from
//! the highest priority down and returns the first match as a
//! [`ProtocolHandle`].
//!
//! ## NOT Responsible For
//! - The protocol's own message exchange or route computation
//! - Owning protocol instances (the node does; handles are shared references)

pub mod action;
pub mod observation;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

pub use action::{ActionApplier, OutOfBoundsPolicy};
pub use observation::{ObservationProvider, ObservationReduce, FALLBACK_QUALITY};

/// What an installed routing protocol is, for lookup purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Olsr,
    Static,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Olsr   => "olsr",
            Capability::Static => "static",
        };
        write!(f, "{s}")
    }
}

/// The slice of a routing protocol the control loop touches.
pub trait RoutingProtocol {
    /// Protocol-internal quality metric used as the observation.
    fn quality_scalar(&self) -> f64;

    /// Retune the controllable interval (TC interval for OLSR), in seconds.
    fn set_timer_parameter(&mut self, secs: f64);

    /// Current value of the controllable interval, in seconds.
    fn timer_parameter(&self) -> f64;
}

/// Shared reference to a node-owned protocol instance.
pub type ProtocolHandle = Rc<RefCell<dyn RoutingProtocol>>;

/// One entry of a node's list routing.
pub struct InstalledProtocol {
    pub capability: Capability,
    pub priority: i16,
    pub handle: ProtocolHandle,
}

/// Priority-ordered protocol list of one node.
#[derive(Default)]
pub struct ListRouting {
    entries: Vec<InstalledProtocol>,
}

impl ListRouting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a protocol. Higher priority wins; equal priorities keep
    /// installation order.
    pub fn add(&mut self, capability: Capability, priority: i16, handle: ProtocolHandle) {
        let pos = self.entries.partition_point(|e| e.priority >= priority);
        self.entries.insert(pos, InstalledProtocol { capability, priority, handle });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First protocol offering `capability`, in priority order.
    pub fn resolve(&self, capability: Capability) -> Option<ProtocolHandle> {
        self.entries
            .iter()
            .find(|e| e.capability == capability)
            .map(|e| Rc::clone(&e.handle))
    }

    pub fn entries(&self) -> impl Iterator<Item = &InstalledProtocol> {
        self.entries.iter()
    }
}

/// Protocol registry for every node of the simulation, indexed by node id.
///
/// A node without a [`ListRouting`] has no list-routing facility at all.
#[derive(Default)]
pub struct NodeRegistry {
    nodes: Vec<Option<ListRouting>>,
}

/// Registry handle shared by the observation provider and the action applier.
pub type SharedRegistry = Rc<NodeRegistry>;

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` nodes, each with an empty list routing.
    pub fn with_nodes(count: u32) -> Self {
        Self {
            nodes: (0..count).map(|_| Some(ListRouting::new())).collect(),
        }
    }

    /// Append a node and return its id.
    pub fn add_node(&mut self, routing: Option<ListRouting>) -> u32 {
        self.nodes.push(routing);
        (self.nodes.len() - 1) as u32
    }

    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    pub fn install(
        &mut self,
        node: u32,
        capability: Capability,
        priority: i16,
        handle: ProtocolHandle,
    ) -> Result<(), ResolveError> {
        let count = self.nodes.len();
        match self.nodes.get_mut(node as usize) {
            None => Err(ResolveError::UnknownNode { node, count }),
            Some(None) => Err(ResolveError::NoListRouting { node }),
            Some(Some(list)) => {
                list.add(capability, priority, handle);
                Ok(())
            }
        }
    }

    pub fn resolve(&self, node: u32, capability: Capability) -> Result<ProtocolHandle, ResolveError> {
        match self.nodes.get(node as usize) {
            None => Err(ResolveError::UnknownNode {
                node,
                count: self.nodes.len(),
            }),
            Some(None) => Err(ResolveError::NoListRouting { node }),
            Some(Some(list)) => list
                .resolve(capability)
                .ok_or(ResolveError::ProtocolMissing { node, capability }),
        }
    }
}

/// A protocol with a settable quality and no behaviour of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedProtocol {
    pub quality: f64,
    pub timer_secs: f64,
}

impl FixedProtocol {
    pub fn new(quality: f64, timer_secs: f64) -> Self {
        Self { quality, timer_secs }
    }

    pub fn handle(self) -> Rc<RefCell<FixedProtocol>> {
        Rc::new(RefCell::new(self))
    }
}

impl RoutingProtocol for FixedProtocol {
    fn quality_scalar(&self) -> f64 {
        self.quality
    }

    fn set_timer_parameter(&mut self, secs: f64) {
        self.timer_secs = secs;
    }

    fn timer_parameter(&self) -> f64 {
        self.timer_secs
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
