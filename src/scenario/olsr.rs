//! Statistical stand-in for one node's OLSR instance.
//!
//! Link quality is an EWMA of sampled neighbour-reachability; how reachable
//! neighbours are depends on the TC interval through
//! [`delivery_probability`]. Short intervals flood the channel with control
//! traffic, long ones leave topology information stale.

use rand::Rng;

use crate::routing::RoutingProtocol;

/// HELLO interval of every synthetic instance, in seconds.
pub const HELLO_INTERVAL_SECS: f64 = 2.0;

const EWMA_ALPHA: f64 = 0.1;
const GOOD_LINK: f64 = 0.75;
const FAIR_LINK: f64 = 0.6;

/// Probability that a packet crossing a node gets through, given that
/// node's TC interval in seconds.
pub fn delivery_probability(tc_interval_secs: f64) -> f64 {
    let t = tc_interval_secs.max(f64::EPSILON);
    let staleness = 0.08 * (t - HELLO_INTERVAL_SECS).max(0.0);
    let overhead = 0.3 * (HELLO_INTERVAL_SECS / t).powi(2);
    (0.95 - staleness - overhead).clamp(0.05, 0.99)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticOlsr {
    tc_interval: f64,
    link_ewma: f64,
}

impl SyntheticOlsr {
    pub fn new(tc_interval_secs: f64) -> Self {
        Self {
            tc_interval: tc_interval_secs,
            link_ewma: delivery_probability(tc_interval_secs),
        }
    }

    pub fn delivery_probability(&self) -> f64 {
        delivery_probability(self.tc_interval)
    }

    /// Fold one neighbour-reachability sample into the link estimate.
    pub fn sample_link<R: Rng>(&mut self, rng: &mut R) {
        let reached = if rng.gen::<f64>() < self.delivery_probability() {
            1.0
        } else {
            0.0
        };
        self.link_ewma = (1.0 - EWMA_ALPHA) * self.link_ewma + EWMA_ALPHA * reached;
    }

    pub fn link_estimate(&self) -> f64 {
        self.link_ewma
    }
}

impl RoutingProtocol for SyntheticOlsr {
    /// 3 for a good link estimate, 2 for fair, 1 otherwise.
    fn quality_scalar(&self) -> f64 {
        if self.link_ewma >= GOOD_LINK {
            3.0
        } else if self.link_ewma >= FAIR_LINK {
            2.0
        } else {
            1.0
        }
    }

    fn set_timer_parameter(&mut self, secs: f64) {
        self.tc_interval = secs;
    }

    fn timer_parameter(&self) -> f64 {
        self.tc_interval
    }
}
