//! Constant-bit-rate flows with a flow-monitor style ledger.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use rand::Rng;

use crate::sim::SimTime;
use crate::telemetry::{FlowId, FlowRecord, TelemetrySource};

const MIN_DELAY_SECS: f64 = 0.002;
const MAX_DELAY_SECS: f64 = 0.050;

/// One CBR flow between two nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSpec {
    pub src: u32,
    pub dst: u32,
}

#[derive(Debug, Clone)]
struct InFlight {
    flow: FlowId,
    sent_at: SimTime,
    arrives_at: SimTime,
}

/// Sends packets on every flow at a fixed interval and keeps per-flow
/// counters the way a flow monitor does.
///
/// Delivered packets are counted as received when their arrival time passes.
/// Dropped packets stay in flight until [`check_for_lost_packets`]
/// (TelemetrySource::check_for_lost_packets) finds them older than the
/// maximum delay.
#[derive(Debug)]
pub struct TrafficModel {
    flows: Vec<FlowSpec>,
    packet_size: u32,
    interval: SimTime,
    next_send: SimTime,
    max_delay: SimTime,
    now: SimTime,
    records: BTreeMap<FlowId, FlowRecord>,
    in_flight: VecDeque<InFlight>,
    dropped: VecDeque<InFlight>,
}

impl TrafficModel {
    pub fn new(flows: Vec<FlowSpec>, packet_size: u32, interval: SimTime, start: SimTime, max_delay: SimTime) -> Self {
        Self {
            flows,
            packet_size,
            interval,
            next_send: start,
            max_delay,
            now: SimTime::ZERO,
            records: BTreeMap::new(),
            in_flight: VecDeque::new(),
            dropped: VecDeque::new(),
        }
    }

    pub fn flows(&self) -> &[FlowSpec] {
        &self.flows
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Packets sent but not yet received or declared lost.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len() + self.dropped.len()
    }

    /// Send every packet due up to `now` and deliver every packet that has
    /// arrived by then. `path_ok` gives the delivery probability of a flow.
    pub fn advance<R, P>(&mut self, now: SimTime, rng: &mut R, mut path_ok: P)
    where
        R: Rng,
        P: FnMut(&FlowSpec) -> f64,
    {
        if now < self.now {
            return;
        }
        while self.interval > SimTime::ZERO && self.next_send <= now {
            let sent_at = self.next_send;
            for (i, spec) in self.flows.iter().enumerate() {
                let flow = i as FlowId + 1;
                let rec = self.records.entry(flow).or_default();
                rec.tx_packets += 1;
                rec.tx_bytes += u64::from(self.packet_size);

                let delay = SimTime::from_secs_f64(rng.gen_range(MIN_DELAY_SECS..MAX_DELAY_SECS));
                let packet = InFlight {
                    flow,
                    sent_at,
                    arrives_at: sent_at.saturating_add(delay),
                };
                if rng.gen::<f64>() < path_ok(spec) {
                    self.in_flight.push_back(packet);
                } else {
                    self.dropped.push_back(packet);
                }
            }
            self.next_send = self.next_send.saturating_add(self.interval);
        }
        self.now = now;
        self.deliver();
    }

    fn deliver(&mut self) {
        let now = self.now;
        let packet_size = u64::from(self.packet_size);
        // Arrival order is not send order, so scan rather than pop the front.
        let records = &mut self.records;
        self.in_flight.retain(|p| {
            if p.arrives_at > now {
                return true;
            }
            let rec = records.entry(p.flow).or_default();
            rec.rx_packets += 1;
            rec.rx_bytes += packet_size;
            rec.delay_sum += Duration::from_nanos(p.arrives_at.saturating_sub(p.sent_at).as_nanos());
            false
        });
    }
}

impl TelemetrySource for TrafficModel {
    fn check_for_lost_packets(&mut self) {
        while let Some(p) = self.dropped.front() {
            if self.now.saturating_sub(p.sent_at) < self.max_delay {
                break;
            }
            let flow = p.flow;
            self.dropped.pop_front();
            self.records.entry(flow).or_default().lost_packets += 1;
        }
    }

    fn flow_stats(&self) -> BTreeMap<FlowId, FlowRecord> {
        self.records.clone()
    }
}
