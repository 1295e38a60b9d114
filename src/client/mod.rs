//! The three-tier client stack.
//!
//! Callers compose decorators the same way throughout:
//! `PreloadingNetworkStoreClient` wrapping a `CachedNetworkStoreClient`
//! wrapping a `BufferedNetworkStoreClient` over a backend store. Reads are
//! served from cache or pending local state before touching the backend;
//! writes land in the cache synchronously and in a buffer until `flush`.

mod buffered;
mod cached;
mod preloading;

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::error::StoreError;
use crate::resource::attributes::{AttributeSet, LimitsSide};
use crate::resource::{Resource, ResourceType};

pub use buffered::BufferedNetworkStoreClient;
pub use cached::CachedNetworkStoreClient;
pub use preloading::{PreloadingNetworkStoreClient, PreloadingStrategy};

/// Operations exposed to domain callers, implemented by every layer of the
/// client stack.
pub trait NetworkStoreClient: Send + Sync {
    /// Get one resource by id. Absence is a normal result.
    fn get<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        id: &str,
    ) -> Result<Option<Resource<T>>, StoreError>;

    /// Get the full collection of a kind.
    fn get_all<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
    ) -> Result<Vec<Resource<T>>, StoreError>;

    /// Get the resources of a kind scoped to one container.
    fn get_by_container<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        container_id: &str,
    ) -> Result<Vec<Resource<T>>, StoreError>;

    /// Number of resources in the full collection of a kind.
    fn count<T: AttributeSet>(&self, network: Uuid, variant_num: i32)
        -> Result<usize, StoreError>;

    /// Create resources. Buffered until [`NetworkStoreClient::flush`].
    fn create<T: AttributeSet>(
        &self,
        network: Uuid,
        resources: Vec<Resource<T>>,
    ) -> Result<(), StoreError>;

    /// Update resources. Buffered until [`NetworkStoreClient::flush`].
    fn update<T: AttributeSet>(
        &self,
        network: Uuid,
        resources: Vec<Resource<T>>,
    ) -> Result<(), StoreError>;

    /// Remove resources by id. Buffered until [`NetworkStoreClient::flush`].
    fn remove<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        ids: Vec<String>,
    ) -> Result<(), StoreError>;

    /// Request removal of operational limits groups from one side of a
    /// branch-like equipment. Repeated requests for the same target merge
    /// into a single backend call at flush time.
    fn remove_operational_limits_group_attributes(
        &self,
        network: Uuid,
        variant_num: i32,
        kind: ResourceType,
        equipment_id: &str,
        side: LimitsSide,
        group_ids: BTreeSet<String>,
    ) -> Result<(), StoreError>;

    /// Request removal of an extension payload from an equipment. Repeated
    /// requests for the same target merge into a single backend call at
    /// flush time.
    fn remove_extension_attributes(
        &self,
        network: Uuid,
        variant_num: i32,
        kind: ResourceType,
        equipment_id: &str,
        extension_name: &str,
    ) -> Result<(), StoreError>;

    /// Persist every pending mutation of the network. All-or-nothing per
    /// batch call; a failure leaves unflushed buffers intact for retry.
    fn flush(&self, network: Uuid) -> Result<(), StoreError>;

    /// Clone a variant, immediately and unbuffered, carrying pending local
    /// state and full-variant lineage over to the target.
    fn clone_network(
        &self,
        network: Uuid,
        source_variant_num: i32,
        target_variant_num: i32,
        target_variant_id: &str,
    ) -> Result<(), StoreError>;
}
