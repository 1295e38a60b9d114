use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use tracing::debug;
use uuid::Uuid;

use crate::buffer::{CollectionBuffer, Pending};
use crate::error::StoreError;
use crate::resource::attributes::{dispatch_kind, AttributeSet, LimitsSide};
use crate::resource::{OwnerInfo, Resource, ResourceType, VariantLineage};
use crate::store::NetworkStore;

use super::NetworkStoreClient;

type CollectionKey = (Uuid, i32, ResourceType);
type LimitsRemovalBody = BTreeMap<LimitsSide, BTreeMap<String, BTreeSet<String>>>;
type ExtensionRemovalBody = BTreeMap<String, BTreeSet<String>>;

/// Bottom layer of the client stack: buffers writes per
/// (network, variant, kind) and serves reads from pending local state
/// before delegating to the backend store.
///
/// Sub-attribute removal requests (operational limits groups, extensions)
/// accumulate per target and are merged into one backend call per
/// (variant, kind) at flush time. Variant clones are immediate and
/// unbuffered; pending buffers of the source variant are deep-copied to the
/// target, stamped with the target's variant id and resolved full-variant
/// ancestor.
pub struct BufferedNetworkStoreClient<S> {
    store: Arc<S>,
    buffers: Mutex<HashMap<CollectionKey, Arc<dyn Any + Send + Sync>>>,
    limits_removals: Mutex<BTreeMap<OwnerInfo, BTreeMap<LimitsSide, BTreeSet<String>>>>,
    extension_removals: Mutex<BTreeMap<OwnerInfo, BTreeSet<String>>>,
    lineage: Mutex<VariantLineage>,
}

impl<S: NetworkStore + 'static> BufferedNetworkStoreClient<S> {
    pub fn new(store: S) -> Self {
        BufferedNetworkStoreClient {
            store: Arc::new(store),
            buffers: Mutex::new(HashMap::new()),
            limits_removals: Mutex::new(BTreeMap::new()),
            extension_removals: Mutex::new(BTreeMap::new()),
            lineage: Mutex::new(VariantLineage::new()),
        }
    }

    /// The buffer for one collection, created on first use with flush
    /// callbacks wired to the backend store.
    fn buffer<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
    ) -> Result<Arc<CollectionBuffer<T>>, StoreError> {
        let mut buffers = self
            .buffers
            .lock()
            .map_err(|_| StoreError::LockPoisoned("buffer map"))?;
        let entry = buffers
            .entry((network, variant_num, T::KIND))
            .or_insert_with(|| {
                let create_store = Arc::clone(&self.store);
                let update_store = Arc::clone(&self.store);
                let remove_store = Arc::clone(&self.store);
                Arc::new(CollectionBuffer::<T>::new(
                    Box::new(move |resources| create_store.create(network, resources)),
                    Box::new(move |resources| update_store.update(network, resources)),
                    Box::new(move |ids| remove_store.remove::<T>(network, variant_num, ids)),
                )) as Arc<dyn Any + Send + Sync>
            })
            .clone();
        entry
            .downcast::<CollectionBuffer<T>>()
            .map_err(|_| StoreError::TypeMismatch { kind: T::KIND })
    }

    /// The buffer for one collection, if one was ever created.
    fn existing_buffer<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
    ) -> Result<Option<Arc<CollectionBuffer<T>>>, StoreError> {
        let buffers = self
            .buffers
            .lock()
            .map_err(|_| StoreError::LockPoisoned("buffer map"))?;
        match buffers.get(&(network, variant_num, T::KIND)) {
            Some(entry) => entry
                .clone()
                .downcast::<CollectionBuffer<T>>()
                .map(Some)
                .map_err(|_| StoreError::TypeMismatch { kind: T::KIND }),
            None => Ok(None),
        }
    }

    /// An update re-adding a sub-object suppresses its pending removal, so
    /// the object is not deleted right after being recreated. The reverse
    /// order does not suppress: a removal requested after an update stays.
    fn prune_sub_removals<T: AttributeSet>(
        &self,
        network: Uuid,
        resource: &Resource<T>,
    ) -> Result<(), StoreError> {
        let owner = OwnerInfo::new(resource.id(), T::KIND, network, resource.variant_num());

        let mut limits = self
            .limits_removals
            .lock()
            .map_err(|_| StoreError::LockPoisoned("limits removals"))?;
        if let Some(per_side) = limits.get_mut(&owner) {
            for side in [LimitsSide::One, LimitsSide::Two] {
                if let Some(groups) = per_side.get_mut(&side) {
                    for group_id in resource.attributes().limits_group_ids(side) {
                        groups.remove(&group_id);
                    }
                    if groups.is_empty() {
                        per_side.remove(&side);
                    }
                }
            }
            if per_side.is_empty() {
                limits.remove(&owner);
            }
        }
        drop(limits);

        let mut extensions = self
            .extension_removals
            .lock()
            .map_err(|_| StoreError::LockPoisoned("extension removals"))?;
        if let Some(names) = extensions.get_mut(&owner) {
            for name in resource.attributes().extension_names() {
                names.remove(&name);
            }
            if names.is_empty() {
                extensions.remove(&owner);
            }
        }
        Ok(())
    }

    fn flush_buffer<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
    ) -> Result<(), StoreError> {
        match self.existing_buffer::<T>(network, variant_num)? {
            Some(buffer) => buffer.flush(),
            None => Ok(()),
        }
    }

    fn flush_limits_removals(&self, network: Uuid) -> Result<(), StoreError> {
        let mut limits = self
            .limits_removals
            .lock()
            .map_err(|_| StoreError::LockPoisoned("limits removals"))?;
        let mut grouped: BTreeMap<(i32, ResourceType), (LimitsRemovalBody, Vec<OwnerInfo>)> =
            BTreeMap::new();
        for (owner, per_side) in limits.iter() {
            if owner.network_uuid != network {
                continue;
            }
            let (body, owners) = grouped
                .entry((owner.variant_num, owner.kind))
                .or_default();
            for (side, groups) in per_side {
                body.entry(*side)
                    .or_default()
                    .entry(owner.equipment_id.clone())
                    .or_default()
                    .extend(groups.iter().cloned());
            }
            owners.push(owner.clone());
        }
        for ((variant_num, kind), (body, owners)) in grouped {
            self.store
                .remove_operational_limits_groups(network, variant_num, kind, body)?;
            for owner in owners {
                limits.remove(&owner);
            }
        }
        Ok(())
    }

    fn flush_extension_removals(&self, network: Uuid) -> Result<(), StoreError> {
        let mut extensions = self
            .extension_removals
            .lock()
            .map_err(|_| StoreError::LockPoisoned("extension removals"))?;
        let mut grouped: BTreeMap<(i32, ResourceType), (ExtensionRemovalBody, Vec<OwnerInfo>)> =
            BTreeMap::new();
        for (owner, names) in extensions.iter() {
            if owner.network_uuid != network {
                continue;
            }
            let (body, owners) = grouped
                .entry((owner.variant_num, owner.kind))
                .or_default();
            body.entry(owner.equipment_id.clone())
                .or_default()
                .extend(names.iter().cloned());
            owners.push(owner.clone());
        }
        for ((variant_num, kind), (body, owners)) in grouped {
            self.store
                .remove_extension_attributes(network, variant_num, kind, body)?;
            for owner in owners {
                extensions.remove(&owner);
            }
        }
        Ok(())
    }

    fn clone_buffer<T: AttributeSet>(
        &self,
        network: Uuid,
        source_variant_num: i32,
        target_variant_num: i32,
        target_variant_id: &str,
        full_variant_num: i32,
    ) -> Result<(), StoreError> {
        let source = match self.existing_buffer::<T>(network, source_variant_num)? {
            Some(buffer) => buffer,
            None => return Ok(()),
        };
        let target = self.buffer::<T>(network, target_variant_num)?;
        source.clone_pending_into(&target, |resource| {
            resource.set_variant_num(target_variant_num);
            resource
                .attributes_mut()
                .on_variant_clone(target_variant_id, full_variant_num);
        })
    }
}

impl<S: NetworkStore + 'static> NetworkStoreClient for BufferedNetworkStoreClient<S> {
    fn get<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        id: &str,
    ) -> Result<Option<Resource<T>>, StoreError> {
        if let Some(buffer) = self.existing_buffer::<T>(network, variant_num)? {
            match buffer.pending(id)? {
                Pending::Create(resource) | Pending::Update(resource) => {
                    return Ok(Some(resource))
                }
                Pending::Remove => return Ok(None),
                Pending::None => {}
            }
        }
        self.store.load_one(network, variant_num, id)
    }

    fn get_all<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
    ) -> Result<Vec<Resource<T>>, StoreError> {
        let base = self.store.load_all(network, variant_num)?;
        match self.existing_buffer::<T>(network, variant_num)? {
            Some(buffer) => buffer.overlay(base, |_| true),
            None => Ok(base),
        }
    }

    fn get_by_container<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        container_id: &str,
    ) -> Result<Vec<Resource<T>>, StoreError> {
        let base = self.store.load_by_container(network, variant_num, container_id)?;
        match self.existing_buffer::<T>(network, variant_num)? {
            Some(buffer) => buffer.overlay(base, |resource| {
                resource
                    .attributes()
                    .container_ids()
                    .iter()
                    .any(|c| c == container_id)
            }),
            None => Ok(base),
        }
    }

    fn count<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
    ) -> Result<usize, StoreError> {
        Ok(self.get_all::<T>(network, variant_num)?.len())
    }

    fn create<T: AttributeSet>(
        &self,
        network: Uuid,
        resources: Vec<Resource<T>>,
    ) -> Result<(), StoreError> {
        for resource in resources {
            let buffer = self.buffer::<T>(network, resource.variant_num())?;
            buffer.create(resource)?;
        }
        Ok(())
    }

    fn update<T: AttributeSet>(
        &self,
        network: Uuid,
        resources: Vec<Resource<T>>,
    ) -> Result<(), StoreError> {
        for resource in resources {
            self.prune_sub_removals(network, &resource)?;
            let buffer = self.buffer::<T>(network, resource.variant_num())?;
            buffer.update(resource)?;
        }
        Ok(())
    }

    fn remove<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        ids: Vec<String>,
    ) -> Result<(), StoreError> {
        let buffer = self.buffer::<T>(network, variant_num)?;
        for id in ids {
            buffer.remove(&id)?;
        }
        Ok(())
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
        let owner = OwnerInfo::new(equipment_id, kind, network, variant_num);
        let mut limits = self
            .limits_removals
            .lock()
            .map_err(|_| StoreError::LockPoisoned("limits removals"))?;
        limits
            .entry(owner)
            .or_default()
            .entry(side)
            .or_default()
            .extend(group_ids);
        Ok(())
    }

    fn remove_extension_attributes(
        &self,
        network: Uuid,
        variant_num: i32,
        kind: ResourceType,
        equipment_id: &str,
        extension_name: &str,
    ) -> Result<(), StoreError> {
        let owner = OwnerInfo::new(equipment_id, kind, network, variant_num);
        let mut extensions = self
            .extension_removals
            .lock()
            .map_err(|_| StoreError::LockPoisoned("extension removals"))?;
        extensions
            .entry(owner)
            .or_default()
            .insert(extension_name.to_string());
        Ok(())
    }

    fn flush(&self, network: Uuid) -> Result<(), StoreError> {
        debug!(%network, "flushing pending buffers");
        let mut keys: Vec<CollectionKey> = {
            let buffers = self
                .buffers
                .lock()
                .map_err(|_| StoreError::LockPoisoned("buffer map"))?;
            buffers
                .keys()
                .filter(|(net, _, _)| *net == network)
                .copied()
                .collect()
        };
        keys.sort_unstable_by_key(|(_, variant_num, kind)| (*variant_num, *kind));
        for (_, variant_num, kind) in keys {
            dispatch_kind!(kind, self.flush_buffer(network, variant_num))?;
        }
        self.flush_limits_removals(network)?;
        self.flush_extension_removals(network)
    }

    fn clone_network(
        &self,
        network: Uuid,
        source_variant_num: i32,
        target_variant_num: i32,
        target_variant_id: &str,
    ) -> Result<(), StoreError> {
        debug!(
            %network,
            source_variant_num, target_variant_num, target_variant_id, "cloning variant"
        );
        self.store.clone_variant(
            network,
            source_variant_num,
            target_variant_num,
            target_variant_id,
            false,
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
                self.clone_buffer(
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
