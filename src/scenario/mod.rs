//! # Module: scenario
//!
//! ## Responsibility
//! A seeded synthetic world for the binary and the end-to-end tests: a set
//! of nodes each running a [`SyntheticOlsr`] (under a static-routing
//! fallback), and CBR flows whose delivery depends on the TC intervals of
//! their endpoints.
//!
//! ## Guarantees
//! - Same seed and config, same counters and observations
//! - Implements the same traits a real simulator would
//!   ([`TelemetrySource`], [`RoutingProtocol`], [`NetworkModel`])
//!
//! ## NOT Responsible For
//! - Radio propagation, mobility or routing message exchange

pub mod olsr;
pub mod traffic;

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::config::ScenarioConfig;
use crate::error::ResolveError;
use crate::routing::{Capability, FixedProtocol, NodeRegistry, RoutingProtocol, SharedRegistry};
use crate::sim::{NetworkModel, SimTime};
use crate::telemetry::SharedTelemetry;

pub use olsr::{delivery_probability, SyntheticOlsr, HELLO_INTERVAL_SECS};
pub use traffic::{FlowSpec, TrafficModel};

/// Priority of the static-routing fallback on every node.
pub const STATIC_PRIORITY: i16 = 0;

pub struct SyntheticScenario {
    registry: SharedRegistry,
    olsr: Vec<Rc<RefCell<SyntheticOlsr>>>,
    traffic: Rc<RefCell<TrafficModel>>,
    rng: StdRng,
    link_sample_interval: SimTime,
    next_link_sample: SimTime,
}

impl SyntheticScenario {
    pub fn build(config: &ScenarioConfig, seed: u64) -> Result<Self, ResolveError> {
        let mut registry = NodeRegistry::with_nodes(config.nodes);
        let mut olsr = Vec::with_capacity(config.nodes as usize);
        for node in 0..config.nodes {
            let instance = Rc::new(RefCell::new(SyntheticOlsr::new(config.initial_tc_interval_secs)));
            registry.install(node, Capability::Static, STATIC_PRIORITY, FixedProtocol::new(0.0, 0.0).handle())?;
            registry.install(node, Capability::Olsr, config.olsr_priority, instance.clone())?;
            olsr.push(instance);
        }

        let flows = (0..config.flows)
            .map(|j| FlowSpec {
                src: j,
                dst: config.flows + j,
            })
            .collect();
        let traffic = TrafficModel::new(
            flows,
            config.packet_size,
            config.packet_interval(),
            SimTime::from_secs_f64(config.traffic_start_secs),
            SimTime::from_secs_f64(config.max_delay_secs),
        );

        info!(
            nodes = config.nodes,
            flows = config.flows,
            seed,
            tc_interval = config.initial_tc_interval_secs,
            "synthetic scenario built"
        );

        Ok(Self {
            registry: Rc::new(registry),
            olsr,
            traffic: Rc::new(RefCell::new(traffic)),
            rng: StdRng::seed_from_u64(seed),
            link_sample_interval: SimTime::from_secs_f64(HELLO_INTERVAL_SECS / 4.0),
            next_link_sample: SimTime::ZERO,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn telemetry(&self) -> SharedTelemetry {
        self.traffic.clone()
    }

    /// Current TC interval of `node`'s OLSR instance.
    pub fn tc_interval(&self, node: u32) -> Option<f64> {
        self.olsr.get(node as usize).map(|o| o.borrow().timer_parameter())
    }

    fn node_probability(&self, node: u32) -> f64 {
        self.olsr
            .get(node as usize)
            .map(|o| o.borrow().delivery_probability())
            .unwrap_or(0.0)
    }
}

impl NetworkModel for SyntheticScenario {
    fn advance_to(&mut self, now: SimTime) {
        while self.next_link_sample <= now {
            for instance in &self.olsr {
                instance.borrow_mut().sample_link(&mut self.rng);
            }
            self.next_link_sample = self.next_link_sample.saturating_add(self.link_sample_interval);
        }

        let probs: Vec<f64> = (0..self.olsr.len() as u32).map(|n| self.node_probability(n)).collect();
        let path_ok = |spec: &FlowSpec| {
            let src = probs.get(spec.src as usize).copied().unwrap_or(0.0);
            let dst = probs.get(spec.dst as usize).copied().unwrap_or(0.0);
            (src + dst) / 2.0
        };
        self.traffic.borrow_mut().advance(now, &mut self.rng, path_ok);
    }
}
