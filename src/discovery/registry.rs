use std::future::Future;

use dashmap::DashMap;

use crate::error::RegistryError;

/// Source of the addresses a service is reachable at.
pub trait Registry: Send + Sync {
    /// Every known address of `service`. An unknown service yields an empty list.
    fn addresses(
        &self,
        service: &str,
    ) -> impl Future<Output = Result<Vec<String>, RegistryError>> + Send;
}

/// An in-memory registry, populated by hand.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    services: DashMap<String, Vec<String>, ahash::RandomState>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `addr` to `service`. Registering the same address twice has no effect.
    pub fn register(&self, service: impl Into<String>, addr: impl Into<String>) {
        let addr = addr.into();
        let mut addrs = self.services.entry(service.into()).or_default();
        if !addrs.contains(&addr) {
            addrs.push(addr);
        }
    }

    /// Remove `addr` from `service`, returning whether it was registered.
    pub fn deregister(&self, service: &str, addr: &str) -> bool {
        let Some(mut addrs) = self.services.get_mut(service) else {
            return false;
        };

        let before = addrs.len();
        addrs.retain(|a| a != addr);
        let removed = addrs.len() != before;
        let now_empty = addrs.is_empty();
        drop(addrs);

        if now_empty {
            self.services.remove_if(service, |_, addrs| addrs.is_empty());
        }
        removed
    }

    /// Number of services with at least one address.
    pub fn service_count(&self) -> usize {
        self.services.len()
    }
}

impl Registry for StaticRegistry {
    async fn addresses(&self, service: &str) -> Result<Vec<String>, RegistryError> {
        Ok(self
            .services
            .get(service)
            .map(|addrs| addrs.clone())
            .unwrap_or_default())
    }
}
