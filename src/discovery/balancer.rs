use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Picks one address out of the ones it has been given.
pub trait Balancer {
    /// Offer an address. Addresses already known are ignored.
    fn add(&mut self, addr: String);

    /// Select an address, or `None` if none has been added.
    fn get(&mut self) -> Option<String>;
}

/// Hands out addresses in the order they were added, wrapping around.
#[derive(Debug, Default)]
pub struct RoundRobin {
    addrs: Vec<String>,
    cursor: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Balancer for RoundRobin {
    fn add(&mut self, addr: String) {
        if !self.addrs.contains(&addr) {
            self.addrs.push(addr);
        }
    }

    fn get(&mut self) -> Option<String> {
        if self.addrs.is_empty() {
            return None;
        }

        let addr = self.addrs[self.cursor % self.addrs.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);
        Some(addr)
    }
}

/// Picks a uniformly random address on every call.
#[derive(Debug)]
pub struct RandomBalancer {
    addrs: Vec<String>,
    rng: StdRng,
}

impl RandomBalancer {
    /// A balancer seeded from the operating system.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// A balancer with a reproducible selection order.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            addrs: Vec::new(),
            rng,
        }
    }
}

impl Default for RandomBalancer {
    fn default() -> Self {
        Self::new()
    }
}

impl Balancer for RandomBalancer {
    fn add(&mut self, addr: String) {
        if !self.addrs.contains(&addr) {
            self.addrs.push(addr);
        }
    }

    fn get(&mut self) -> Option<String> {
        if self.addrs.is_empty() {
            return None;
        }

        let index = self.rng.random_range(0..self.addrs.len());
        Some(self.addrs[index].clone())
    }
}
