//! The abstract backend collaborator.
//!
//! [`NetworkStore`] is the single seam between the client stack and the
//! remote service: per-kind loads at three scopes (one id, one container,
//! whole collection), batched writes, variant cloning and batched
//! sub-attribute removal. Wire format, URL construction and authentication
//! live behind implementations of this trait.

mod in_memory;

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::error::StoreError;
use crate::resource::attributes::{AttributeSet, LimitsSide};
use crate::resource::{Resource, ResourceType};

pub use in_memory::{InMemoryNetworkStore, StoreCall};

/// Backend storage for grid network model resources.
///
/// Absence is not an error: [`NetworkStore::load_one`] returns `None` for an
/// unknown id. Failures propagate unmodified; no retry happens at this layer.
pub trait NetworkStore: Send + Sync {
    /// Load a single resource by id.
    fn load_one<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        id: &str,
    ) -> Result<Option<Resource<T>>, StoreError>;

    /// Load every resource of the kind indexed under a container.
    fn load_by_container<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        container_id: &str,
    ) -> Result<Vec<Resource<T>>, StoreError>;

    /// Load the full collection of the kind.
    fn load_all<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
    ) -> Result<Vec<Resource<T>>, StoreError>;

    /// Batch-create resources. Each resource carries its own variant number.
    fn create<T: AttributeSet>(
        &self,
        network: Uuid,
        resources: Vec<Resource<T>>,
    ) -> Result<(), StoreError>;

    /// Batch-update resources. Each resource carries its own variant number.
    fn update<T: AttributeSet>(
        &self,
        network: Uuid,
        resources: Vec<Resource<T>>,
    ) -> Result<(), StoreError>;

    /// Batch-remove resources by id.
    fn remove<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        ids: Vec<String>,
    ) -> Result<(), StoreError>;

    /// Clone a variant. Fails with [`StoreError::CloneConflict`] when the
    /// target exists without `overwrite`, or when the protected initial
    /// variant is targeted.
    fn clone_variant(
        &self,
        network: Uuid,
        source_variant_num: i32,
        target_variant_num: i32,
        target_variant_id: &str,
        overwrite: bool,
    ) -> Result<(), StoreError>;

    /// Batch-remove operational limits groups, merged by side then by
    /// equipment id.
    fn remove_operational_limits_groups(
        &self,
        network: Uuid,
        variant_num: i32,
        kind: ResourceType,
        removals: BTreeMap<LimitsSide, BTreeMap<String, BTreeSet<String>>>,
    ) -> Result<(), StoreError>;

    /// Batch-remove extension payloads, merged by equipment id.
    fn remove_extension_attributes(
        &self,
        network: Uuid,
        variant_num: i32,
        kind: ResourceType,
        removals: BTreeMap<String, BTreeSet<String>>,
    ) -> Result<(), StoreError>;
}
