//! Resolving a service name to one server address.
//!
//! A [`Registry`] knows every address a service is reachable at, and a [`Balancer`] picks one
//! of them. [`resolve_address`] glues the two together and is meant to be called before a
//! connection is opened.

mod balancer;
mod registry;

use tracing::debug;

use crate::error::ResolveError;

pub use balancer::{Balancer, RandomBalancer, RoundRobin};
pub use registry::{Registry, StaticRegistry};

/// Look up every address of `service`, feed them to `balancer` and return its pick.
///
/// Nothing is cached: each call queries the registry again.
pub async fn resolve_address<G, B>(
    registry: &G,
    balancer: &mut B,
    service: &str,
) -> Result<String, ResolveError>
where
    G: Registry,
    B: Balancer + ?Sized,
{
    let addrs = registry.addresses(service).await?;
    if addrs.is_empty() {
        return Err(ResolveError::NoAddress {
            service: service.to_string(),
        });
    }

    debug!(service = %service, candidates = addrs.len(), "Resolved service addresses");

    for addr in addrs {
        balancer.add(addr);
    }

    balancer.get().ok_or_else(|| ResolveError::NoAddress {
        service: service.to_string(),
    })
}
