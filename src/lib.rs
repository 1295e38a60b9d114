//! Client-side caching and write-buffering for a remotely stored power-grid
//! network model.
//!
//! The model is addressed as (network uuid, variant number, resource kind).
//! Three decorator layers compose over a [`NetworkStore`] backend:
//!
//! * [`BufferedNetworkStoreClient`] coalesces writes per collection until an
//!   explicit [`NetworkStoreClient::flush`];
//! * [`CachedNetworkStoreClient`] adds scope-aware read-through caches and
//!   dual-writes every mutation into them;
//! * [`PreloadingNetworkStoreClient`] bulk-loads whole collections ahead of
//!   fine-grained access, driven by a [`PreloadingStrategy`].
//!
//! ```no_run
//! use gridstore::{
//!     BufferedNetworkStoreClient, CachedNetworkStoreClient, InMemoryNetworkStore,
//!     NetworkStoreClient, PreloadingNetworkStoreClient, PreloadingStrategy,
//!     Resource, SubstationAttributes,
//! };
//! use uuid::Uuid;
//!
//! # fn main() -> Result<(), gridstore::StoreError> {
//! let client = PreloadingNetworkStoreClient::new(
//!     CachedNetworkStoreClient::new(BufferedNetworkStoreClient::new(
//!         InMemoryNetworkStore::new(),
//!     )),
//!     PreloadingStrategy::bus_view(),
//! );
//!
//! let network = Uuid::new_v4();
//! client.create(
//!     network,
//!     vec![Resource::builder()
//!         .id("s1")
//!         .attributes(SubstationAttributes::default())
//!         .build()?],
//! )?;
//! client.flush(network)?;
//! # Ok(())
//! # }
//! ```

mod buffer;
mod cache;
mod client;
mod error;
mod resource;
mod store;

pub use buffer::{CollectionBuffer, Pending};
pub use cache::CollectionCache;
pub use client::{
    BufferedNetworkStoreClient, CachedNetworkStoreClient, NetworkStoreClient,
    PreloadingNetworkStoreClient, PreloadingStrategy,
};
pub use error::StoreError;
pub use resource::attributes::{
    AttributeSet, BusbarSectionAttributes, GeneratorAttributes, LimitsAttributes, LimitsSide,
    LineAttributes, LoadAttributes, NetworkAttributes, OperationalLimitsGroupAttributes,
    SubstationAttributes, SwitchAttributes, TapChangerStepAttributes,
    TemporaryLimitAttributes, TwoWindingsTransformerAttributes, VoltageLevelAttributes,
};
pub use resource::extensions::{
    ExtensionAttributes, ExtensionRegistry, RawExtensionAttributes,
};
pub use resource::{
    OwnerInfo, Resource, ResourceBuilder, ResourceType, UpdateListener, VariantLineage,
    INITIAL_VARIANT_NUM, SELF_FULL_VARIANT_NUM,
};
pub use store::{InMemoryNetworkStore, NetworkStore, StoreCall};
