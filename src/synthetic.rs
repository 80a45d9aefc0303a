use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Supplies the port fields the capture cannot measure. The classifier was
/// trained on switch telemetry that a host-side sniffer has no access to, so
/// these values are either simulated or pinned by configuration.
pub trait SyntheticSource {
    /// Drawn once when a port is first seen.
    fn connection_point(&mut self) -> u32;
    /// Drawn once when a port is first seen.
    fn active_flow_entries(&mut self) -> u32;
    /// Added to both load-rate counters for every recorded packet.
    fn load_increment(&mut self) -> u64;
}

/// Uniform draws matching the ranges the demo dashboard used.
pub struct RandomSynthetic {
    rng: StdRng,
}

impl RandomSynthetic {
    pub fn new() -> Self {
        RandomSynthetic {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        RandomSynthetic {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSynthetic {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticSource for RandomSynthetic {
    fn connection_point(&mut self) -> u32 {
        self.rng.gen_range(0..=10)
    }

    fn active_flow_entries(&mut self) -> u32 {
        self.rng.gen_range(1..=10)
    }

    fn load_increment(&mut self) -> u64 {
        self.rng.gen_range(0..=100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSynthetic {
    pub connection_point: u32,
    pub active_flow_entries: u32,
    pub load_increment: u64,
}

impl Default for FixedSynthetic {
    fn default() -> Self {
        FixedSynthetic {
            connection_point: 0,
            active_flow_entries: 1,
            load_increment: 0,
        }
    }
}

impl SyntheticSource for FixedSynthetic {
    fn connection_point(&mut self) -> u32 {
        self.connection_point
    }

    fn active_flow_entries(&mut self) -> u32 {
        self.active_flow_entries
    }

    fn load_increment(&mut self) -> u64 {
        self.load_increment
    }
}
