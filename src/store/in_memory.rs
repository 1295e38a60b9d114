//! In-memory backend for tests and development.
//!
//! Stores resources as serialized JSON values and records every call it
//! receives, so tests can assert exact backend traffic (how many loads, how
//! a flush was batched, how removal bodies were merged).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::error::StoreError;
use crate::resource::attributes::{AttributeSet, LimitsSide};
use crate::resource::{Resource, ResourceType, INITIAL_VARIANT_NUM, SELF_FULL_VARIANT_NUM};

use super::NetworkStore;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    LoadOne {
        kind: ResourceType,
        variant_num: i32,
        id: String,
    },
    LoadByContainer {
        kind: ResourceType,
        variant_num: i32,
        container_id: String,
    },
    LoadAll {
        kind: ResourceType,
        variant_num: i32,
    },
    Create {
        kind: ResourceType,
        variant_nums: Vec<i32>,
        ids: Vec<String>,
    },
    Update {
        kind: ResourceType,
        variant_nums: Vec<i32>,
        ids: Vec<String>,
    },
    Remove {
        kind: ResourceType,
        variant_num: i32,
        ids: Vec<String>,
    },
    CloneVariant {
        source_variant_num: i32,
        target_variant_num: i32,
        target_variant_id: String,
    },
    RemoveLimitsGroups {
        kind: ResourceType,
        variant_num: i32,
        removals: BTreeMap<LimitsSide, BTreeMap<String, BTreeSet<String>>>,
    },
    RemoveExtensions {
        kind: ResourceType,
        variant_num: i32,
        removals: BTreeMap<String, BTreeSet<String>>,
    },
}

#[derive(Debug, Clone, Default)]
struct VariantState {
    variant_id: String,
    collections: HashMap<ResourceType, BTreeMap<String, serde_json::Value>>,
}

/// In-memory [`NetworkStore`] with a recorded call log.
///
/// Clone-friendly via `Arc`: clones share storage and the call log.
#[derive(Clone, Default)]
pub struct InMemoryNetworkStore {
    networks: Arc<Mutex<HashMap<Uuid, BTreeMap<i32, VariantState>>>>,
    calls: Arc<Mutex<Vec<StoreCall>>>,
}

impl InMemoryNetworkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Drop the recorded call log.
    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn record(&self, call: StoreCall) -> Result<(), StoreError> {
        self.calls
            .lock()
            .map_err(|_| StoreError::LockPoisoned("in-memory store call log"))?
            .push(call);
        Ok(())
    }

    fn decode<T: AttributeSet>(value: &serde_json::Value) -> Result<Resource<T>, StoreError> {
        serde_json::from_value(value.clone()).map_err(|e| StoreError::Serde(e.to_string()))
    }

    fn encode<T: AttributeSet>(resource: &Resource<T>) -> Result<serde_json::Value, StoreError> {
        serde_json::to_value(resource).map_err(|e| StoreError::Serde(e.to_string()))
    }
}

impl NetworkStore for InMemoryNetworkStore {
    fn load_one<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        id: &str,
    ) -> Result<Option<Resource<T>>, StoreError> {
        self.record(StoreCall::LoadOne {
            kind: T::KIND,
            variant_num,
            id: id.to_string(),
        })?;
        let networks = self
            .networks
            .lock()
            .map_err(|_| StoreError::LockPoisoned("in-memory store"))?;
        let value = networks
            .get(&network)
            .and_then(|variants| variants.get(&variant_num))
            .and_then(|state| state.collections.get(&T::KIND))
            .and_then(|collection| collection.get(id));
        match value {
            Some(value) => Ok(Some(Self::decode(value)?)),
            None => Ok(None),
        }
    }

    fn load_by_container<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        container_id: &str,
    ) -> Result<Vec<Resource<T>>, StoreError> {
        self.record(StoreCall::LoadByContainer {
            kind: T::KIND,
            variant_num,
            container_id: container_id.to_string(),
        })?;
        let networks = self
            .networks
            .lock()
            .map_err(|_| StoreError::LockPoisoned("in-memory store"))?;
        let mut resources = Vec::new();
        if let Some(collection) = networks
            .get(&network)
            .and_then(|variants| variants.get(&variant_num))
            .and_then(|state| state.collections.get(&T::KIND))
        {
            for value in collection.values() {
                let resource: Resource<T> = Self::decode(value)?;
                if resource
                    .attributes()
                    .container_ids()
                    .iter()
                    .any(|c| c == container_id)
                {
                    resources.push(resource);
                }
            }
        }
        Ok(resources)
    }

    fn load_all<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
    ) -> Result<Vec<Resource<T>>, StoreError> {
        self.record(StoreCall::LoadAll {
            kind: T::KIND,
            variant_num,
        })?;
        let networks = self
            .networks
            .lock()
            .map_err(|_| StoreError::LockPoisoned("in-memory store"))?;
        let mut resources = Vec::new();
        if let Some(collection) = networks
            .get(&network)
            .and_then(|variants| variants.get(&variant_num))
            .and_then(|state| state.collections.get(&T::KIND))
        {
            for value in collection.values() {
                resources.push(Self::decode(value)?);
            }
        }
        Ok(resources)
    }

    fn create<T: AttributeSet>(
        &self,
        network: Uuid,
        resources: Vec<Resource<T>>,
    ) -> Result<(), StoreError> {
        self.record(StoreCall::Create {
            kind: T::KIND,
            variant_nums: resources.iter().map(Resource::variant_num).collect(),
            ids: resources.iter().map(|r| r.id().to_string()).collect(),
        })?;
        let mut networks = self
            .networks
            .lock()
            .map_err(|_| StoreError::LockPoisoned("in-memory store"))?;
        let variants = networks.entry(network).or_default();
        for resource in resources {
            let value = Self::encode(&resource)?;
            variants
                .entry(resource.variant_num())
                .or_default()
                .collections
                .entry(T::KIND)
                .or_default()
                .insert(resource.id().to_string(), value);
        }
        Ok(())
    }

    fn update<T: AttributeSet>(
        &self,
        network: Uuid,
        resources: Vec<Resource<T>>,
    ) -> Result<(), StoreError> {
        self.record(StoreCall::Update {
            kind: T::KIND,
            variant_nums: resources.iter().map(Resource::variant_num).collect(),
            ids: resources.iter().map(|r| r.id().to_string()).collect(),
        })?;
        let mut networks = self
            .networks
            .lock()
            .map_err(|_| StoreError::LockPoisoned("in-memory store"))?;
        let variants = networks.entry(network).or_default();
        for resource in resources {
            let value = Self::encode(&resource)?;
            variants
                .entry(resource.variant_num())
                .or_default()
                .collections
                .entry(T::KIND)
                .or_default()
                .insert(resource.id().to_string(), value);
        }
        Ok(())
    }

    fn remove<T: AttributeSet>(
        &self,
        network: Uuid,
        variant_num: i32,
        ids: Vec<String>,
    ) -> Result<(), StoreError> {
        self.record(StoreCall::Remove {
            kind: T::KIND,
            variant_num,
            ids: ids.clone(),
        })?;
        let mut networks = self
            .networks
            .lock()
            .map_err(|_| StoreError::LockPoisoned("in-memory store"))?;
        if let Some(collection) = networks
            .get_mut(&network)
            .and_then(|variants| variants.get_mut(&variant_num))
            .and_then(|state| state.collections.get_mut(&T::KIND))
        {
            for id in &ids {
                collection.remove(id);
            }
        }
        Ok(())
    }

    fn clone_variant(
        &self,
        network: Uuid,
        source_variant_num: i32,
        target_variant_num: i32,
        target_variant_id: &str,
        overwrite: bool,
    ) -> Result<(), StoreError> {
        self.record(StoreCall::CloneVariant {
            source_variant_num,
            target_variant_num,
            target_variant_id: target_variant_id.to_string(),
        })?;
        if target_variant_num == INITIAL_VARIANT_NUM {
            return Err(StoreError::clone_conflict(
                "PROTECTED_VARIANT",
                "the initial variant cannot be a clone target",
            ));
        }
        let mut networks = self
            .networks
            .lock()
            .map_err(|_| StoreError::LockPoisoned("in-memory store"))?;
        let variants = networks.entry(network).or_default();
        if variants.contains_key(&target_variant_num) && !overwrite {
            return Err(StoreError::clone_conflict(
                "VARIANT_EXISTS",
                format!("variant {} already exists", target_variant_num),
            ));
        }
        let source = variants
            .get(&source_variant_num)
            .ok_or_else(|| {
                StoreError::backend(format!("unknown source variant {}", source_variant_num))
            })?
            .clone();

        let mut target = source;
        target.variant_id = target_variant_id.to_string();
        for (kind, collection) in target.collections.iter_mut() {
            for value in collection.values_mut() {
                value["variant_num"] = serde_json::json!(target_variant_num);
                if *kind == ResourceType::Network {
                    let full = value["attributes"]["full_variant_num"]
                        .as_i64()
                        .unwrap_or(i64::from(SELF_FULL_VARIANT_NUM));
                    let resolved = if full == i64::from(SELF_FULL_VARIANT_NUM) {
                        i64::from(source_variant_num)
                    } else {
                        full
                    };
                    value["attributes"]["variant_id"] = serde_json::json!(target_variant_id);
                    value["attributes"]["full_variant_num"] = serde_json::json!(resolved);
                }
            }
        }
        variants.insert(target_variant_num, target);
        Ok(())
    }

    fn remove_operational_limits_groups(
        &self,
        network: Uuid,
        variant_num: i32,
        kind: ResourceType,
        removals: BTreeMap<LimitsSide, BTreeMap<String, BTreeSet<String>>>,
    ) -> Result<(), StoreError> {
        self.record(StoreCall::RemoveLimitsGroups {
            kind,
            variant_num,
            removals: removals.clone(),
        })?;
        let mut networks = self
            .networks
            .lock()
            .map_err(|_| StoreError::LockPoisoned("in-memory store"))?;
        if let Some(collection) = networks
            .get_mut(&network)
            .and_then(|variants| variants.get_mut(&variant_num))
            .and_then(|state| state.collections.get_mut(&kind))
        {
            for (side, per_equipment) in &removals {
                let field = match side {
                    LimitsSide::One => "operational_limits_groups1",
                    LimitsSide::Two => "operational_limits_groups2",
                };
                for (equipment_id, group_ids) in per_equipment {
                    if let Some(groups) = collection
                        .get_mut(equipment_id)
                        .and_then(|value| value["attributes"][field].as_object_mut())
                    {
                        for group_id in group_ids {
                            groups.remove(group_id);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn remove_extension_attributes(
        &self,
        network: Uuid,
        variant_num: i32,
        kind: ResourceType,
        removals: BTreeMap<String, BTreeSet<String>>,
    ) -> Result<(), StoreError> {
        self.record(StoreCall::RemoveExtensions {
            kind,
            variant_num,
            removals: removals.clone(),
        })?;
        let mut networks = self
            .networks
            .lock()
            .map_err(|_| StoreError::LockPoisoned("in-memory store"))?;
        if let Some(collection) = networks
            .get_mut(&network)
            .and_then(|variants| variants.get_mut(&variant_num))
            .and_then(|state| state.collections.get_mut(&kind))
        {
            for (equipment_id, names) in &removals {
                if let Some(extensions) = collection
                    .get_mut(equipment_id)
                    .and_then(|value| value["attributes"]["extensions"].as_object_mut())
                {
                    for name in names {
                        extensions.remove(name);
                    }
                }
            }
        }
        Ok(())
    }
}
