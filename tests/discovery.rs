//! Properties of service address resolution over randomized registries.

use std::collections::BTreeSet;

use proptest::prelude::*;
use seedrpc::ResolveError;
use seedrpc::discovery::{RandomBalancer, RoundRobin, StaticRegistry, resolve_address};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn address() -> impl Strategy<Value = String> {
    (1u8..=254, 1024u16..=65535).prop_map(|(host, port)| format!("10.0.0.{host}:{port}"))
}

proptest! {
    /// Whatever the registry holds, the selected address is one of them.
    #[test]
    fn selected_address_is_registered(
        addrs in proptest::collection::btree_set(address(), 1..16),
        seed in any::<u64>(),
    ) {
        let registry = StaticRegistry::new();
        for addr in &addrs {
            registry.register("Echo", addr.clone());
        }

        let rt = runtime();
        let round_robin = rt
            .block_on(resolve_address(&registry, &mut RoundRobin::new(), "Echo"))
            .unwrap();
        let random = rt
            .block_on(resolve_address(&registry, &mut RandomBalancer::seeded(seed), "Echo"))
            .unwrap();

        prop_assert!(addrs.contains(&round_robin));
        prop_assert!(addrs.contains(&random));
    }

    /// Repeated resolution through one balancer never leaves the registered set.
    #[test]
    fn repeated_resolution_stays_in_set(
        addrs in proptest::collection::btree_set(address(), 1..8),
        rounds in 1usize..20,
    ) {
        let registry = StaticRegistry::new();
        for addr in &addrs {
            registry.register("Echo", addr.clone());
        }

        let rt = runtime();
        let mut balancer = RoundRobin::new();
        let mut seen = BTreeSet::new();
        for _ in 0..rounds {
            let addr = rt
                .block_on(resolve_address(&registry, &mut balancer, "Echo"))
                .unwrap();
            prop_assert!(addrs.contains(&addr));
            seen.insert(addr);
        }

        prop_assert!(seen.len() <= addrs.len());
    }

    /// A service with no addresses is always reported as not found.
    #[test]
    fn empty_service_is_not_found(
        other in proptest::collection::btree_set(address(), 0..4),
    ) {
        let registry = StaticRegistry::new();
        for addr in &other {
            registry.register("Other", addr.clone());
        }

        let result = runtime().block_on(resolve_address(&registry, &mut RoundRobin::new(), "Echo"));
        let is_not_found = matches!(result, Err(ResolveError::NoAddress { .. }));
        prop_assert!(is_not_found);
    }
}
