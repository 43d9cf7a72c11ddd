//! C1 Service Registry: the authoritative in-memory index of declared
//! services, their replicas, owners, generation, and status.
//!
//! Three indexes (`by_id`, `by_owner`, `by_name`) are kept behind a single
//! registry mutex, distinct from and always acquired strictly outside of
//! the per-service lock. The per-service lock itself is the
//! `tokio::sync::Mutex<Service>` each [`ServiceHandle`] wraps — callers
//! take that lock to perform a mutation and hold it across whatever
//! synchronous and suspending work the mutation requires.
//!
//! A small, serde-able, thiserror-backed lookup structure, generalized
//! from a single placement-routing map to three independent indexes.

mod error;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

pub use error::RegistryError;
use statefuld_types::{Name, Namespace, Owner, Service, ServiceId, ServiceSpec, ServiceStatus};

/// A service record behind its per-service lock. Cloning a handle is cheap
/// (it clones the `Arc`); cloning the lock contents requires taking it.
pub type ServiceHandle = Arc<Mutex<Service>>;

struct Indexes {
    by_id: HashMap<ServiceId, ServiceHandle>,
    by_owner: HashMap<Owner, HashSet<ServiceId>>,
    by_name: HashMap<(Namespace, Name), ServiceId>,
}

impl Indexes {
    fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            by_owner: HashMap::new(),
            by_name: HashMap::new(),
        }
    }
}

/// The Service Registry (C1). Holds the registry mutex guarding the three
/// indexes; does not itself hold any per-service lock.
pub struct ServiceRegistry {
    indexes: Mutex<Indexes>,
    /// DNS zone suffix used to compute `headlessEndpoint`/`clusterEndpoint`
    /// on create; those strings are never recomputed afterward.
    dns_zone: String,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new(dns_zone: impl Into<String>) -> Self {
        Self {
            indexes: Mutex::new(Indexes::new()),
            dns_zone: dns_zone.into(),
        }
    }

    /// Registers a new service. Fails with [`RegistryError::AlreadyExists`]
    /// if `(namespace, name)` is already taken, or
    /// [`RegistryError::InvalidSpec`] if the spec violates schema.
    ///
    /// On success the service is returned in `creating` status *before*
    /// any replica is provisioned — the reconciler proceeds from there.
    pub async fn create(&self, owner: Owner, spec: ServiceSpec) -> Result<ServiceHandle, RegistryError> {
        spec.validate().map_err(|e| RegistryError::InvalidSpec(e.to_string()))?;
        let namespace = Namespace::parse(spec.namespace.clone())
            .map_err(|e| RegistryError::InvalidSpec(e.to_string()))?;
        let name =
            Name::parse(spec.name.clone()).map_err(|e| RegistryError::InvalidSpec(e.to_string()))?;

        let mut indexes = self.indexes.lock().await;
        let name_key = (namespace.clone(), name.clone());
        if indexes.by_name.contains_key(&name_key) {
            return Err(RegistryError::AlreadyExists {
                namespace: namespace.as_str().to_string(),
                name: name.as_str().to_string(),
            });
        }

        let now = Utc::now();
        let created_at_nanos = u64::try_from(now.timestamp_nanos_opt().unwrap_or_default().max(0))
            .unwrap_or_default();
        let id = ServiceId::derive(namespace.as_str(), name.as_str(), owner, created_at_nanos);

        let headless_endpoint = format!("{}.{}.headless.{}", name.as_str(), namespace.as_str(), self.dns_zone);
        let cluster_endpoint = format!("{}.{}.svc.{}", name.as_str(), namespace.as_str(), self.dns_zone);

        let service = Service {
            id,
            owner,
            namespace,
            name,
            spec,
            status: ServiceStatus::Creating,
            replicas: Vec::new(),
            current_leader: None,
            generation: 0,
            consensus_epoch: 0,
            headless_endpoint,
            cluster_endpoint,
            mpc_cluster_id: None,
            mpc_threshold_public_key: None,
            last_election_at: None,
            created_at: now,
        };

        let handle: ServiceHandle = Arc::new(Mutex::new(service));
        indexes.by_id.insert(id, handle.clone());
        indexes.by_owner.entry(owner).or_default().insert(id);
        indexes.by_name.insert(name_key, id);

        tracing::info!(service_id = %id, "service registered");
        Ok(handle)
    }

    #[must_use]
    pub async fn get(&self, id: ServiceId) -> Option<ServiceHandle> {
        self.indexes.lock().await.by_id.get(&id).cloned()
    }

    #[must_use]
    pub async fn get_by_name(&self, namespace: &Namespace, name: &Name) -> Option<ServiceHandle> {
        let indexes = self.indexes.lock().await;
        let id = indexes.by_name.get(&(namespace.clone(), name.clone()))?;
        indexes.by_id.get(id).cloned()
    }

    #[must_use]
    pub async fn list_by_owner(&self, owner: Owner) -> Vec<ServiceHandle> {
        let indexes = self.indexes.lock().await;
        let Some(ids) = indexes.by_owner.get(&owner) else {
            return Vec::new();
        };
        ids.iter().filter_map(|id| indexes.by_id.get(id).cloned()).collect()
    }

    /// Removes a service from all three indexes after authorization.
    /// Returns the handle so the caller can still drive reverse-order
    /// termination and stop background loops using the (now unregistered)
    /// service record.
    pub async fn terminate(&self, id: ServiceId, caller: Owner) -> Result<ServiceHandle, RegistryError> {
        let mut indexes = self.indexes.lock().await;
        let handle = indexes.by_id.get(&id).cloned().ok_or(RegistryError::NotFound(id))?;

        {
            let service = handle.lock().await;
            if !owner_eq(service.owner, caller) {
                return Err(RegistryError::Forbidden { id, caller });
            }
        }

        indexes.by_id.remove(&id);
        if let Some(ids) = indexes.by_owner.get_mut(&caller) {
            ids.remove(&id);
            if ids.is_empty() {
                indexes.by_owner.remove(&caller);
            }
        }
        let service = handle.lock().await;
        indexes.by_name.remove(&(service.namespace.clone(), service.name.clone()));
        drop(service);

        tracing::info!(service_id = %id, "service removed from registry");
        Ok(handle)
    }
}

/// Owner equality is case-insensitive in its hex-encoded representation;
/// [`Owner`] already normalizes to raw bytes on parse, so `PartialEq` is
/// the case-insensitive comparison.
fn owner_eq(a: Owner, b: Owner) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use statefuld_types::{BackupSpec, CpuArchitecture, GpuType, HardwareSpec, HealthCheckSpec, StorageType, TeePlatform};
    use std::collections::HashMap;

    fn spec(name: &str, replicas: u32) -> ServiceSpec {
        ServiceSpec {
            name: name.to_string(),
            namespace: "default".to_string(),
            replicas,
            image: "x/sql".to_string(),
            tag: "1".to_string(),
            command: vec![],
            args: vec![],
            env: HashMap::new(),
            ports: vec![],
            hardware: HardwareSpec {
                cpu_cores: 2,
                cpu_architecture: CpuArchitecture::Amd64,
                memory_mb: 2048,
                storage_mb: 102_400,
                storage_type: StorageType::Ssd,
                gpu_type: GpuType::None,
                gpu_count: 0,
                network_bandwidth_mbps: 1000,
                public_ip: false,
                tee_platform: TeePlatform::None,
                region: None,
            },
            volumes: vec![],
            consensus: None,
            mpc: None,
            health_check: HealthCheckSpec {
                path: "/v1/status".to_string(),
                port: 8080,
                interval_seconds: 10,
                timeout_seconds: 5,
                failure_threshold: 3,
                success_threshold: 1,
            },
            readiness: None,
            labels: HashMap::new(),
            annotations: HashMap::new(),
            termination_grace_period_seconds: 30,
        }
    }

    fn owner(byte: u8) -> Owner {
        let hex: String = [byte; 20].iter().map(|b| format!("{b:02x}")).collect();
        Owner::try_from(hex).unwrap()
    }

    #[tokio::test]
    async fn create_rejects_duplicate_namespace_name() {
        let registry = ServiceRegistry::new("cluster.local");
        registry.create(owner(1), spec("db", 3)).await.unwrap();
        let err = registry.create(owner(2), spec("db", 3)).await.unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn terminate_is_not_idempotent() {
        let registry = ServiceRegistry::new("cluster.local");
        let handle = registry.create(owner(1), spec("db", 3)).await.unwrap();
        let id = handle.lock().await.id;
        registry.terminate(id, owner(1)).await.unwrap();
        let err = registry.terminate(id, owner(1)).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[tokio::test]
    async fn terminate_forbidden_for_non_owner() {
        let registry = ServiceRegistry::new("cluster.local");
        let handle = registry.create(owner(1), spec("db", 3)).await.unwrap();
        let id = handle.lock().await.id;
        let err = registry.terminate(id, owner(2)).await.unwrap_err();
        assert!(matches!(err, RegistryError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn get_by_name_round_trips() {
        let registry = ServiceRegistry::new("cluster.local");
        registry.create(owner(1), spec("db", 3)).await.unwrap();
        let namespace = Namespace::default_namespace();
        let name = Name::parse("db").unwrap();
        let found = registry.get_by_name(&namespace, &name).await;
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn list_by_owner_returns_all_services_for_owner() {
        let registry = ServiceRegistry::new("cluster.local");
        registry.create(owner(1), spec("a", 1)).await.unwrap();
        registry.create(owner(1), spec("b", 1)).await.unwrap();
        registry.create(owner(2), spec("c", 1)).await.unwrap();
        assert_eq!(registry.list_by_owner(owner(1)).await.len(), 2);
        assert_eq!(registry.list_by_owner(owner(2)).await.len(), 1);
    }
}
