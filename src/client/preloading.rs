use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;
use std::thread;

use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::resource::attributes::{dispatch_kind, AttributeSet, LimitsSide};
use crate::resource::{Resource, ResourceType};

use super::NetworkStoreClient;

const DEFAULT_PARALLELISM: usize = 4;

/// Which collections to pull in bulk on first access to a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreloadingStrategy {
    /// No preloading; every collection loads on demand.
    None,
    /// First access to any kind loads every collection of the network.
    Collection,
    /// First access to a kind in the set loads every collection in the set.
    /// Kinds outside the set load on demand.
    SpecificSet(BTreeSet<ResourceType>),
}

impl PreloadingStrategy {
    /// The set backing bus-view topology traversal: enough to walk the
    /// network without touching per-injection collections.
    pub fn bus_view() -> Self {
        PreloadingStrategy::SpecificSet(BTreeSet::from([
            ResourceType::Substation,
            ResourceType::VoltageLevel,
            ResourceType::Switch,
            ResourceType::BusbarSection,
            ResourceType::Line,
            ResourceType::TwoWindingsTransformer,
        ]))
    }
}

/// Top layer of the client stack: warms the caches below by bulk-loading
/// whole collections ahead of fine-grained access, fanning loads out over a
/// bounded number of worker threads.
///
/// Preload bookkeeping is per (network, kind); once a kind is preloaded for
/// a network, later accesses on any variant skip the bulk load and rely on
/// the per-variant caches underneath.
pub struct PreloadingNetworkStoreClient<C> {
    inner: C,
    strategy: PreloadingStrategy,
    parallelism: usize,
    loaded: Mutex<HashSet<(Uuid, ResourceType)>>,
}

impl<C: NetworkStoreClient> PreloadingNetworkStoreClient<C> {
    pub fn new(inner: C, strategy: PreloadingStrategy) -> Self {
        Self::with_parallelism(inner, strategy, DEFAULT_PARALLELISM)
    }

    pub fn with_parallelism(inner: C, strategy: PreloadingStrategy, parallelism: usize) -> Self {
        PreloadingNetworkStoreClient {
            inner,
            strategy,
            parallelism: parallelism.max(1),
            loaded: Mutex::new(HashSet::new()),
        }
    }

    fn load_collection<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
    ) -> Result<(), StoreError> {
        self.inner.get_all::<T>(network, variant_num).map(|_| ())
    }

    /// The lock is held across the whole bulk load so concurrent first
    /// accesses do not preload the same collections twice.
    fn ensure_loaded<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
    ) -> Result<(), StoreError> {
        let kinds: Vec<ResourceType> = match &self.strategy {
            PreloadingStrategy::None => return Ok(()),
            PreloadingStrategy::Collection => ResourceType::all().to_vec(),
            PreloadingStrategy::SpecificSet(set) => {
                if !set.contains(&T::KIND) {
                    return Ok(());
                }
                set.iter().copied().collect()
            }
        };
        let mut loaded = self
            .loaded
            .lock()
            .map_err(|_| StoreError::LockPoisoned("preload bookkeeping"))?;
        let pending: Vec<ResourceType> = kinds
            .into_iter()
            .filter(|kind| !loaded.contains(&(network, *kind)))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        debug!(%network, variant_num, kinds = pending.len(), "preloading collections");
        self.preload(network, variant_num, &pending)?;
        for kind in pending {
            loaded.insert((network, kind));
        }
        Ok(())
    }

    fn preload(
        &self,
        network: Uuid,
        variant_num: i32,
        kinds: &[ResourceType],
    ) -> Result<(), StoreError> {
        if self.parallelism == 1 || kinds.len() == 1 {
            for kind in kinds {
                dispatch_kind!(*kind, self.load_collection(network, variant_num))?;
            }
            return Ok(());
        }
        for chunk in kinds.chunks(self.parallelism) {
            thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|kind| {
                        scope.spawn(move || {
                            dispatch_kind!(*kind, self.load_collection(network, variant_num))
                        })
                    })
                    .collect();
                let mut first_error = None;
                for handle in handles {
                    let outcome = match handle.join() {
                        Ok(result) => result,
                        Err(_) => Err(StoreError::backend("preload worker panicked")),
                    };
                    if let Err(error) = outcome {
                        first_error.get_or_insert(error);
                    }
                }
                match first_error {
                    Some(error) => Err(error),
                    None => Ok(()),
                }
            })?;
        }
        Ok(())
    }
}

impl<C: NetworkStoreClient> NetworkStoreClient for PreloadingNetworkStoreClient<C> {
    fn get<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        id: &str,
    ) -> Result<Option<Resource<T>>, StoreError> {
        self.ensure_loaded::<T>(network, variant_num)?;
        self.inner.get(network, variant_num, id)
    }

    fn get_all<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
    ) -> Result<Vec<Resource<T>>, StoreError> {
        self.ensure_loaded::<T>(network, variant_num)?;
        self.inner.get_all(network, variant_num)
    }

    fn get_by_container<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        container_id: &str,
    ) -> Result<Vec<Resource<T>>, StoreError> {
        self.ensure_loaded::<T>(network, variant_num)?;
        self.inner.get_by_container(network, variant_num, container_id)
    }

    fn count<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
    ) -> Result<usize, StoreError> {
        self.ensure_loaded::<T>(network, variant_num)?;
        self.inner.count::<T>(network, variant_num)
    }

    fn create<T: AttributeSet>(
        &self,
        network: Uuid,
        resources: Vec<Resource<T>>,
    ) -> Result<(), StoreError> {
        if let Some(first) = resources.first() {
            self.ensure_loaded::<T>(network, first.variant_num())?;
        }
        self.inner.create(network, resources)
    }

    fn update<T: AttributeSet>(
        &self,
        network: Uuid,
        resources: Vec<Resource<T>>,
    ) -> Result<(), StoreError> {
        if let Some(first) = resources.first() {
            self.ensure_loaded::<T>(network, first.variant_num())?;
        }
        self.inner.update(network, resources)
    }

    fn remove<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        ids: Vec<String>,
    ) -> Result<(), StoreError> {
        self.ensure_loaded::<T>(network, variant_num)?;
        self.inner.remove::<T>(network, variant_num, ids)
    }

    fn remove_operational_limits_group_attributes(
        &self,
        network: Uuid,
        variant_num: i32,
        kind: ResourceType,
        equipment_id: &str,
        side: LimitsSide,
        group_ids: BTreeSet<String>,
    ) -> Result<(), StoreError> {
        dispatch_kind!(kind, self.ensure_loaded(network, variant_num))?;
        self.inner.remove_operational_limits_group_attributes(
            network,
            variant_num,
            kind,
            equipment_id,
            side,
            group_ids,
        )
    }

    fn remove_extension_attributes(
        &self,
        network: Uuid,
        variant_num: i32,
        kind: ResourceType,
        equipment_id: &str,
        extension_name: &str,
    ) -> Result<(), StoreError> {
        dispatch_kind!(kind, self.ensure_loaded(network, variant_num))?;
        self.inner.remove_extension_attributes(
            network,
            variant_num,
            kind,
            equipment_id,
            extension_name,
        )
    }

    fn flush(&self, network: Uuid) -> Result<(), StoreError> {
        self.inner.flush(network)
    }

    fn clone_network(
        &self,
        network: Uuid,
        source_variant_num: i32,
        target_variant_num: i32,
        target_variant_id: &str,
    ) -> Result<(), StoreError> {
        self.inner.clone_network(
            network,
            source_variant_num,
            target_variant_num,
            target_variant_id,
        )
    }
}
