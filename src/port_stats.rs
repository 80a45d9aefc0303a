use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use log::{debug, warn};

use crate::features::{self, FeatureRow, PORT_FEATURE_COLUMNS};
use crate::packet::PacketDescriptor;
use crate::synthetic::SyntheticSource;

/// Source port a packet is grouped under; 0 when the packet carries none.
pub type PortKey = u16;

/// Cumulative counters of one port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortCounters {
    pub received_packets: u64,
    pub received_bytes: u64,
    pub sent_packets: u64,
    pub sent_bytes: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub alive_since: SystemTime,
    pub looked_up: u64,
    pub matched: u64,
    pub latest_bytes: u64,

    // Simulated, see `SyntheticSource`.
    pub connection_point: u32,
    pub active_flow_entries: u32,
    pub total_load_rate: u64,
    pub unknown_load_rate: u64,

    // Constant in everything a host-side capture can produce.
    pub is_valid: u8,
    pub table_id: u32,
    pub max_size: i64,
}

impl PortCounters {
    fn new(alive_since: SystemTime, synthetic: &mut dyn SyntheticSource) -> Self {
        PortCounters {
            received_packets: 0,
            received_bytes: 0,
            sent_packets: 0,
            sent_bytes: 0,
            rx_dropped: 0,
            tx_dropped: 0,
            rx_errors: 0,
            tx_errors: 0,
            alive_since,
            looked_up: 0,
            matched: 0,
            latest_bytes: 0,
            connection_point: synthetic.connection_point(),
            active_flow_entries: synthetic.active_flow_entries(),
            total_load_rate: 0,
            unknown_load_rate: 0,
            is_valid: 1,
            table_id: 0,
            max_size: -1,
        }
    }

    /// Counters after one more packet of `size` bytes, or `None` if any of
    /// them would overflow.
    fn with_packet(&self, size: u64, load: u64) -> Option<PortCounters> {
        Some(PortCounters {
            received_packets: self.received_packets.checked_add(1)?,
            received_bytes: self.received_bytes.checked_add(size)?,
            sent_packets: self.sent_packets.checked_add(1)?,
            sent_bytes: self.sent_bytes.checked_add(size)?,
            looked_up: self.looked_up.checked_add(1)?,
            matched: self.matched.checked_add(1)?,
            latest_bytes: size,
            total_load_rate: self.total_load_rate.checked_add(load)?,
            unknown_load_rate: self.unknown_load_rate.checked_add(load)?,
            ..*self
        })
    }

    fn alive_duration(&self, now: SystemTime) -> f64 {
        round2(
            now.duration_since(self.alive_since)
                .unwrap_or_default()
                .as_secs_f64(),
        )
    }
}

/// `current` as it stood at the last snapshot boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub counters: PortCounters,
    pub alive_duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortStats {
    current: PortCounters,
    previous: Option<Baseline>,
}

impl PortStats {
    pub fn current(&self) -> &PortCounters {
        &self.current
    }

    /// `None` until the port has been through one snapshot.
    pub fn previous(&self) -> Option<&Baseline> {
        self.previous.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoIpLayer,
    NotTcp,
    CounterOverflow,
}

impl SkipReason {
    /// Whether the skip counts as a processing error rather than a filter.
    pub fn is_error(&self) -> bool {
        matches!(self, SkipReason::CounterOverflow)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoIpLayer => write!(f, "no IP layer"),
            SkipReason::NotTcp => write!(f, "not TCP"),
            SkipReason::CounterOverflow => write!(f, "counter overflow"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveOutcome {
    Recorded(PortKey),
    Skipped(SkipReason),
}

/// Run-level tally of every packet handed to `observe`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub recorded: u64,
    pub skipped: u64,
    pub errors: u64,
}

/// Per-port counter table. Owned by the capture loop; nothing here is shared.
pub struct PortAggregator {
    ports: BTreeMap<PortKey, PortStats>,
    synthetic: Box<dyn SyntheticSource>,
    tcp_only: bool,
    totals: RunTotals,
}

impl PortAggregator {
    pub fn new(synthetic: Box<dyn SyntheticSource>) -> Self {
        PortAggregator {
            ports: BTreeMap::new(),
            synthetic,
            tcp_only: false,
            totals: RunTotals::default(),
        }
    }

    /// Skip every IP packet that is not TCP.
    pub fn tcp_only(mut self, tcp_only: bool) -> Self {
        self.tcp_only = tcp_only;
        self
    }

    pub fn observe(&mut self, packet: &PacketDescriptor) -> ObserveOutcome {
        self.observe_at(packet, SystemTime::now())
    }

    /// `now` becomes the port's creation time when the port is new.
    pub fn observe_at(&mut self, packet: &PacketDescriptor, now: SystemTime) -> ObserveOutcome {
        if !packet.has_ip_layer {
            return self.skip(SkipReason::NoIpLayer);
        }
        if self.tcp_only && !packet.is_tcp() {
            return self.skip(SkipReason::NotTcp);
        }

        let port = packet.source_port.unwrap_or(0);
        let size = packet.byte_length as u64;
        let load = self.synthetic.load_increment();

        let synthetic = &mut self.synthetic;
        let stats = self.ports.entry(port).or_insert_with(|| PortStats {
            current: PortCounters::new(now, &mut **synthetic),
            previous: None,
        });

        match stats.current.with_packet(size, load) {
            Some(next) => {
                stats.current = next;
                self.totals.recorded += 1;
                ObserveOutcome::Recorded(port)
            }
            None => {
                warn!("Packet processing error on port {}: {}", port, SkipReason::CounterOverflow);
                self.skip(SkipReason::CounterOverflow)
            }
        }
    }

    fn skip(&mut self, reason: SkipReason) -> ObserveOutcome {
        if reason.is_error() {
            self.totals.errors += 1;
        } else {
            self.totals.skipped += 1;
            debug!("Skipping packet: {}", reason);
        }
        ObserveOutcome::Skipped(reason)
    }

    pub fn snapshot_and_advance(&mut self) -> Vec<FeatureRow> {
        self.snapshot_at(SystemTime::now())
    }

    /// One row per tracked port in ascending port order, then every port's
    /// baseline moves up to its current counters.
    pub fn snapshot_at(&mut self, now: SystemTime) -> Vec<FeatureRow> {
        let mut rows = Vec::with_capacity(self.ports.len());

        for (port, stats) in self.ports.iter_mut() {
            let duration = stats.current.alive_duration(now);
            rows.push(build_row(*port, &stats.current, stats.previous.as_ref(), duration));
            stats.previous = Some(Baseline {
                counters: stats.current,
                alive_duration: duration,
            });
        }

        rows
    }

    pub fn reset(&mut self) {
        self.ports.clear();
    }

    pub fn port(&self, port: PortKey) -> Option<&PortStats> {
        self.ports.get(&port)
    }

    pub fn ports(&self) -> impl Iterator<Item = (PortKey, &PortStats)> {
        self.ports.iter().map(|(port, stats)| (*port, stats))
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn totals(&self) -> RunTotals {
        self.totals
    }

    /// Received packets summed over every tracked port.
    pub fn total_packets(&self) -> u64 {
        self.ports
            .values()
            .map(|stats| stats.current.received_packets)
            .sum()
    }
}

fn build_row(
    port: PortKey,
    current: &PortCounters,
    previous: Option<&Baseline>,
    duration: f64,
) -> FeatureRow {
    let delta = |field: fn(&PortCounters) -> u64| -> f64 {
        field(current) as f64 - previous.map_or(0.0, |base| field(&base.counters) as f64)
    };
    let delta_duration = round2(duration - previous.map_or(0.0, |base| base.alive_duration));

    let mut row = FeatureRow::with_capacity(PORT_FEATURE_COLUMNS.len());
    row.insert(features::PORT_NUMBER, port as f64);
    row.insert(features::RECEIVED_PACKETS, current.received_packets as f64);
    row.insert(features::RECEIVED_BYTES, current.received_bytes as f64);
    row.insert(features::SENT_BYTES, current.sent_bytes as f64);
    row.insert(features::SENT_PACKETS, current.sent_packets as f64);
    row.insert(features::ALIVE_DURATION, duration);
    row.insert(features::RX_DROPPED, current.rx_dropped as f64);
    row.insert(features::TX_DROPPED, current.tx_dropped as f64);
    row.insert(features::RX_ERRORS, current.rx_errors as f64);
    row.insert(features::TX_ERRORS, current.tx_errors as f64);

    row.insert(features::DELTA_RECEIVED_PACKETS, delta(|c| c.received_packets));
    row.insert(features::DELTA_RECEIVED_BYTES, delta(|c| c.received_bytes));
    row.insert(features::DELTA_SENT_BYTES, delta(|c| c.sent_bytes));
    row.insert(features::DELTA_SENT_PACKETS, delta(|c| c.sent_packets));
    row.insert(features::DELTA_ALIVE_DURATION, delta_duration);
    row.insert(features::DELTA_RX_DROPPED, delta(|c| c.rx_dropped));
    row.insert(features::DELTA_TX_DROPPED, delta(|c| c.tx_dropped));
    row.insert(features::DELTA_RX_ERRORS, delta(|c| c.rx_errors));
    row.insert(features::DELTA_TX_ERRORS, delta(|c| c.tx_errors));

    row.insert(features::CONNECTION_POINT, current.connection_point as f64);
    row.insert(features::TOTAL_LOAD_RATE, current.total_load_rate as f64);
    row.insert(features::TOTAL_LOAD_LATEST, current.total_load_rate as f64);
    row.insert(features::UNKNOWN_LOAD_RATE, current.unknown_load_rate as f64);
    row.insert(features::UNKNOWN_LOAD_LATEST, current.unknown_load_rate as f64);
    row.insert(features::LATEST_BYTES, current.latest_bytes as f64);
    row.insert(features::IS_VALID, current.is_valid as f64);
    row.insert(features::TABLE_ID, current.table_id as f64);
    row.insert(features::ACTIVE_FLOW_ENTRIES, current.active_flow_entries as f64);
    row.insert(features::LOOKED_UP, current.looked_up as f64);
    row.insert(features::MATCHED, current.matched as f64);
    row.insert(features::MAX_SIZE, current.max_size as f64);
    row
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::*;
    use crate::synthetic::FixedSynthetic;
    use std::time::Duration;

    const DELTA_PAIRS: [(&str, &str); 9] = [
        (RECEIVED_PACKETS, DELTA_RECEIVED_PACKETS),
        (RECEIVED_BYTES, DELTA_RECEIVED_BYTES),
        (SENT_BYTES, DELTA_SENT_BYTES),
        (SENT_PACKETS, DELTA_SENT_PACKETS),
        (ALIVE_DURATION, DELTA_ALIVE_DURATION),
        (RX_DROPPED, DELTA_RX_DROPPED),
        (TX_DROPPED, DELTA_TX_DROPPED),
        (RX_ERRORS, DELTA_RX_ERRORS),
        (TX_ERRORS, DELTA_TX_ERRORS),
    ];

    fn fixed_aggregator() -> PortAggregator {
        PortAggregator::new(Box::new(FixedSynthetic {
            connection_point: 3,
            active_flow_entries: 7,
            load_increment: 10,
        }))
    }

    #[test]
    fn test_three_packets_on_443() {
        let mut aggregator = fixed_aggregator();
        for size in [100, 200, 50] {
            let outcome = aggregator.observe(&PacketDescriptor::tcp(443, size));
            assert_eq!(outcome, ObserveOutcome::Recorded(443));
        }

        assert_eq!(aggregator.len(), 1);
        let counters = aggregator.port(443).unwrap().current();
        assert_eq!(counters.received_packets, 3);
        assert_eq!(counters.received_bytes, 350);
        assert_eq!(counters.sent_packets, 3);
        assert_eq!(counters.sent_bytes, 350);
        assert_eq!(counters.looked_up, 3);
        assert_eq!(counters.matched, 3);
        assert_eq!(counters.latest_bytes, 50);
        assert_eq!(counters.total_load_rate, 30);
        assert_eq!(counters.unknown_load_rate, 30);
    }

    #[test]
    fn test_missing_source_port_goes_to_port_zero() {
        let mut aggregator = fixed_aggregator();
        assert_eq!(
            aggregator.observe(&PacketDescriptor::portless(60)),
            ObserveOutcome::Recorded(0)
        );
        aggregator.observe(&PacketDescriptor::portless(40));

        let counters = aggregator.port(0).unwrap().current();
        assert_eq!(counters.received_packets, 2);
        assert_eq!(counters.received_bytes, 100);
    }

    #[test]
    fn test_non_ip_packet_is_skipped() {
        let mut aggregator = fixed_aggregator();
        assert_eq!(
            aggregator.observe(&PacketDescriptor::non_ip(42)),
            ObserveOutcome::Skipped(SkipReason::NoIpLayer)
        );
        assert!(aggregator.is_empty());
        assert_eq!(
            aggregator.totals(),
            RunTotals {
                recorded: 0,
                skipped: 1,
                errors: 0
            }
        );
    }

    #[test]
    fn test_tcp_only_filter() {
        let mut aggregator = fixed_aggregator().tcp_only(true);
        assert_eq!(
            aggregator.observe(&PacketDescriptor::udp(53, 80)),
            ObserveOutcome::Skipped(SkipReason::NotTcp)
        );
        assert_eq!(
            aggregator.observe(&PacketDescriptor::tcp(22, 80)),
            ObserveOutcome::Recorded(22)
        );
        assert!(aggregator.port(53).is_none());
        assert_eq!(aggregator.len(), 1);
    }

    #[test]
    fn test_overflow_is_counted_and_leaves_counters_alone() {
        let mut aggregator = fixed_aggregator();
        aggregator.observe(&PacketDescriptor::tcp(80, usize::MAX));
        let before = *aggregator.port(80).unwrap().current();

        assert_eq!(
            aggregator.observe(&PacketDescriptor::tcp(80, 1)),
            ObserveOutcome::Skipped(SkipReason::CounterOverflow)
        );
        assert_eq!(*aggregator.port(80).unwrap().current(), before);
        assert_eq!(aggregator.totals().errors, 1);

        // The run keeps going.
        assert_eq!(
            aggregator.observe(&PacketDescriptor::tcp(81, 10)),
            ObserveOutcome::Recorded(81)
        );
        assert_eq!(aggregator.totals().recorded, 2);
    }

    #[test]
    fn test_first_cycle_deltas_equal_current() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mut aggregator = fixed_aggregator();
        aggregator.observe_at(&PacketDescriptor::tcp(8080, 120), start);
        aggregator.observe_at(&PacketDescriptor::tcp(8080, 80), start);

        let rows = aggregator.snapshot_at(start + Duration::from_millis(2_500));
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.get(ALIVE_DURATION), Some(2.5));
        for (current, delta) in DELTA_PAIRS {
            assert_eq!(row.get(current), row.get(delta), "{} vs {}", current, delta);
        }
    }

    #[test]
    fn test_second_cycle_deltas_and_baseline() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mut aggregator = fixed_aggregator();
        aggregator.observe_at(&PacketDescriptor::tcp(443, 100), start);
        aggregator.snapshot_at(start + Duration::from_secs(10));

        let stats = aggregator.port(443).unwrap();
        assert_eq!(stats.previous().unwrap().counters, *stats.current());
        assert_eq!(stats.previous().unwrap().alive_duration, 10.0);

        aggregator.observe_at(&PacketDescriptor::tcp(443, 200), start);
        aggregator.observe_at(&PacketDescriptor::tcp(443, 300), start);
        let rows = aggregator.snapshot_at(start + Duration::from_secs(15));
        let row = &rows[0];

        assert_eq!(row.get(RECEIVED_PACKETS), Some(3.0));
        assert_eq!(row.get(DELTA_RECEIVED_PACKETS), Some(2.0));
        assert_eq!(row.get(RECEIVED_BYTES), Some(600.0));
        assert_eq!(row.get(DELTA_RECEIVED_BYTES), Some(500.0));
        assert_eq!(row.get(ALIVE_DURATION), Some(15.0));
        assert_eq!(row.get(DELTA_ALIVE_DURATION), Some(5.0));
        assert_eq!(row.get(DELTA_RX_DROPPED), Some(0.0));

        let stats = aggregator.port(443).unwrap();
        assert_eq!(stats.previous().unwrap().counters, *stats.current());
    }

    #[test]
    fn test_quiet_port_has_zero_deltas() {
        let start = SystemTime::UNIX_EPOCH;
        let mut aggregator = fixed_aggregator();
        aggregator.observe_at(&PacketDescriptor::tcp(25, 64), start);
        aggregator.snapshot_at(start + Duration::from_secs(1));

        let rows = aggregator.snapshot_at(start + Duration::from_secs(2));
        assert_eq!(rows[0].get(RECEIVED_PACKETS), Some(1.0));
        assert_eq!(rows[0].get(DELTA_RECEIVED_PACKETS), Some(0.0));
        assert_eq!(rows[0].get(DELTA_SENT_BYTES), Some(0.0));
    }

    #[test]
    fn test_empty_snapshot() {
        let mut aggregator = fixed_aggregator();
        assert!(aggregator.snapshot_and_advance().is_empty());
    }

    #[test]
    fn test_rows_follow_column_order_and_port_order() {
        let mut aggregator = fixed_aggregator();
        aggregator.observe(&PacketDescriptor::tcp(9000, 10));
        aggregator.observe(&PacketDescriptor::udp(53, 10));
        aggregator.observe(&PacketDescriptor::portless(10));

        let rows = aggregator.snapshot_and_advance();
        let ports: Vec<_> = rows.iter().filter_map(|row| row.port()).collect();
        assert_eq!(ports, vec![0, 53, 9000]);

        let names: Vec<_> = rows[0].names().collect();
        assert_eq!(names, PORT_FEATURE_COLUMNS.to_vec());
        assert_eq!(rows[0].get(CONNECTION_POINT), Some(3.0));
        assert_eq!(rows[0].get(ACTIVE_FLOW_ENTRIES), Some(7.0));
        assert_eq!(rows[0].get(TOTAL_LOAD_LATEST), rows[0].get(TOTAL_LOAD_RATE));
        assert_eq!(rows[0].get(IS_VALID), Some(1.0));
        assert_eq!(rows[0].get(MAX_SIZE), Some(-1.0));
    }

    #[test]
    fn test_reset_forgets_ports() {
        let mut aggregator = fixed_aggregator();
        aggregator.observe(&PacketDescriptor::tcp(443, 10));
        aggregator.reset();
        assert!(aggregator.is_empty());
        assert_eq!(aggregator.total_packets(), 0);
        assert!(aggregator.snapshot_and_advance().is_empty());
    }
}
