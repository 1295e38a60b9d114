use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::cache::CollectionCache;
use crate::error::StoreError;
use crate::resource::attributes::{dispatch_kind, AttributeSet, LimitsSide};
use crate::resource::{Resource, ResourceType, VariantLineage};

use super::NetworkStoreClient;

type CollectionKey = (Uuid, i32, ResourceType);

/// Middle layer of the client stack: read-through caching per
/// (network, variant, kind), dual-writing so the cache reflects every
/// mutation before it is forwarded down.
///
/// Sub-attribute removals patch the cached copy in place so a later read
/// does not show a limits group or extension that is already gone locally.
/// Variant clones copy the source caches to the target, completeness flags
/// included, since the backend clone produces exactly the state the source
/// cache describes.
pub struct CachedNetworkStoreClient<C> {
    inner: Arc<C>,
    caches: Mutex<HashMap<CollectionKey, Arc<dyn Any + Send + Sync>>>,
    lineage: Mutex<VariantLineage>,
}

impl<C: NetworkStoreClient + 'static> CachedNetworkStoreClient<C> {
    pub fn new(inner: C) -> Self {
        CachedNetworkStoreClient {
            inner: Arc::new(inner),
            caches: Mutex::new(HashMap::new()),
            lineage: Mutex::new(VariantLineage::new()),
        }
    }

    /// The cache for one collection, created on first use with loaders wired
    /// to the wrapped client.
    fn cache<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
    ) -> Result<Arc<CollectionCache<T>>, StoreError> {
        let mut caches = self
            .caches
            .lock()
            .map_err(|_| StoreError::LockPoisoned("cache map"))?;
        let entry = caches
            .entry((network, variant_num, T::KIND))
            .or_insert_with(|| {
                let one = Arc::clone(&self.inner);
                let by_container = Arc::clone(&self.inner);
                let all = Arc::clone(&self.inner);
                Arc::new(CollectionCache::<T>::new(
                    Box::new(move |id| one.get(network, variant_num, id)),
                    Box::new(move |container_id| {
                        by_container.get_by_container(network, variant_num, container_id)
                    }),
                    Box::new(move || all.get_all(network, variant_num)),
                )) as Arc<dyn Any + Send + Sync>
            })
            .clone();
        entry
            .downcast::<CollectionCache<T>>()
            .map_err(|_| StoreError::TypeMismatch { kind: T::KIND })
    }

    /// The cache for one collection, if one was ever created.
    fn existing_cache<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
    ) -> Result<Option<Arc<CollectionCache<T>>>, StoreError> {
        let caches = self
            .caches
            .lock()
            .map_err(|_| StoreError::LockPoisoned("cache map"))?;
        match caches.get(&(network, variant_num, T::KIND)) {
            Some(entry) => entry
                .clone()
                .downcast::<CollectionCache<T>>()
                .map(Some)
                .map_err(|_| StoreError::TypeMismatch { kind: T::KIND }),
            None => Ok(None),
        }
    }

    fn evict_limits_groups<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        equipment_id: &str,
        side: LimitsSide,
        group_ids: &BTreeSet<String>,
    ) -> Result<(), StoreError> {
        if let Some(cache) = self.existing_cache::<T>(network, variant_num)? {
            if let Some(mut resource) = cache.peek_resource(equipment_id)? {
                for group_id in group_ids {
                    resource.attributes_mut().remove_limits_group(side, group_id);
                }
                cache.update_resource(resource)?;
            }
        }
        Ok(())
    }

    fn evict_extension<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        equipment_id: &str,
        extension_name: &str,
    ) -> Result<(), StoreError> {
        if let Some(cache) = self.existing_cache::<T>(network, variant_num)? {
            if let Some(mut resource) = cache.peek_resource(equipment_id)? {
                resource.attributes_mut().remove_extension(extension_name);
                cache.update_resource(resource)?;
            }
        }
        Ok(())
    }

    fn clone_cache<T: AttributeSet>(
        &self,
        network: Uuid,
        source_variant_num: i32,
        target_variant_num: i32,
        target_variant_id: &str,
        full_variant_num: i32,
    ) -> Result<(), StoreError> {
        let source = match self.existing_cache::<T>(network, source_variant_num)? {
            Some(cache) => cache,
            None => return Ok(()),
        };
        let target = self.cache::<T>(network, target_variant_num)?;
        source.copy_state_into(&target, |resource| {
            resource.set_variant_num(target_variant_num);
            resource
                .attributes_mut()
                .on_variant_clone(target_variant_id, full_variant_num);
        })
    }
}

impl<C: NetworkStoreClient + 'static> NetworkStoreClient for CachedNetworkStoreClient<C> {
    fn get<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        id: &str,
    ) -> Result<Option<Resource<T>>, StoreError> {
        self.cache::<T>(network, variant_num)?.get_resource(id)
    }

    fn get_all<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
    ) -> Result<Vec<Resource<T>>, StoreError> {
        self.cache::<T>(network, variant_num)?.get_resources()
    }

    fn get_by_container<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        container_id: &str,
    ) -> Result<Vec<Resource<T>>, StoreError> {
        self.cache::<T>(network, variant_num)?
            .get_container_resources(container_id)
    }

    fn count<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
    ) -> Result<usize, StoreError> {
        self.cache::<T>(network, variant_num)?.resource_count()
    }

    fn create<T: AttributeSet>(
        &self,
        network: Uuid,
        resources: Vec<Resource<T>>,
    ) -> Result<(), StoreError> {
        let mut by_variant: BTreeMap<i32, Vec<Resource<T>>> = BTreeMap::new();
        for resource in resources {
            by_variant
                .entry(resource.variant_num())
                .or_default()
                .push(resource);
        }
        for (variant_num, group) in by_variant {
            self.cache::<T>(network, variant_num)?
                .create_resources(group.clone())?;
            self.inner.create(network, group)?;
        }
        Ok(())
    }

    fn update<T: AttributeSet>(
        &self,
        network: Uuid,
        resources: Vec<Resource<T>>,
    ) -> Result<(), StoreError> {
        let mut by_variant: BTreeMap<i32, Vec<Resource<T>>> = BTreeMap::new();
        for resource in resources {
            by_variant
                .entry(resource.variant_num())
                .or_default()
                .push(resource);
        }
        for (variant_num, group) in by_variant {
            let cache = self.cache::<T>(network, variant_num)?;
            for resource in &group {
                cache.update_resource(resource.clone())?;
            }
            self.inner.update(network, group)?;
        }
        Ok(())
    }

    fn remove<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        ids: Vec<String>,
    ) -> Result<(), StoreError> {
        let cache = self.cache::<T>(network, variant_num)?;
        for id in &ids {
            cache.remove_resource(id)?;
        }
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
        dispatch_kind!(
            kind,
            self.evict_limits_groups(network, variant_num, equipment_id, side, &group_ids)
        )?;
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
        dispatch_kind!(
            kind,
            self.evict_extension(network, variant_num, equipment_id, extension_name)
        )?;
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
        )?;
        let full_variant_num = {
            let mut lineage = self
                .lineage
                .lock()
                .map_err(|_| StoreError::LockPoisoned("variant lineage"))?;
            lineage.record_clone(network, source_variant_num, target_variant_num);
            lineage.resolve(network, target_variant_num)
        };
        for kind in ResourceType::all() {
            dispatch_kind!(
                *kind,
                self.clone_cache(
                    network,
                    source_variant_num,
                    target_variant_num,
                    target_variant_id,
                    full_variant_num,
                )
            )?;
        }
        Ok(())
    }
}
