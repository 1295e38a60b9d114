use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::StoreError;
use crate::resource::attributes::AttributeSet;
use crate::resource::Resource;

type LoadOneFn<T> = Box<dyn Fn(&str) -> Result<Option<Resource<T>>, StoreError> + Send + Sync>;
type LoadContainerFn<T> = Box<dyn Fn(&str) -> Result<Vec<Resource<T>>, StoreError> + Send + Sync>;
type LoadAllFn<T> = Box<dyn Fn() -> Result<Vec<Resource<T>>, StoreError> + Send + Sync>;

/// Per-kind resource cache with three independent completeness scopes:
/// the whole collection, one container, one id.
///
/// Once a scope is marked loaded, queries inside it never call a loader
/// again. Id resolution is tri-state: present in the id map, confirmed
/// absent, or unknown. A removed id is recorded as confirmed absent so it
/// can never spontaneously reappear from a stale loader call.
pub struct CollectionCache<T> {
    state: Mutex<CacheState<T>>,
    load_one: LoadOneFn<T>,
    load_by_container: LoadContainerFn<T>,
    load_all: LoadAllFn<T>,
}

struct CacheState<T> {
    resources: HashMap<String, Resource<T>>,
    absent: HashSet<String>,
    by_container: HashMap<String, HashSet<String>>,
    all_loaded: bool,
    containers_loaded: HashSet<String>,
}

impl<T> Default for CacheState<T> {
    fn default() -> Self {
        CacheState {
            resources: HashMap::new(),
            absent: HashSet::new(),
            by_container: HashMap::new(),
            all_loaded: false,
            containers_loaded: HashSet::new(),
        }
    }
}

impl<T: AttributeSet> CacheState<T> {
    fn index(&mut self, resource: &Resource<T>) {
        for container in resource.attributes().container_ids() {
            self.by_container
                .entry(container)
                .or_default()
                .insert(resource.id().to_string());
        }
    }

    /// Merge loader results: existing entries win (they may hold local
    /// modifications newer than the backend copy), confirmed-absent ids
    /// never resurrect.
    fn merge(&mut self, loaded: Vec<Resource<T>>) {
        for resource in loaded {
            if self.resources.contains_key(resource.id()) || self.absent.contains(resource.id())
            {
                continue;
            }
            self.index(&resource);
            self.resources.insert(resource.id().to_string(), resource);
        }
    }

    fn ensure_all_loaded(&mut self, load_all: &LoadAllFn<T>) -> Result<(), StoreError> {
        if !self.all_loaded {
            let loaded = load_all()?;
            self.merge(loaded);
            self.all_loaded = true;
        }
        Ok(())
    }

    fn sorted(&self, ids: impl Iterator<Item = String>) -> Vec<Resource<T>> {
        let mut ids: Vec<String> = ids.collect();
        ids.sort_unstable();
        ids.iter()
            .filter_map(|id| self.resources.get(id).cloned())
            .collect()
    }
}

impl<T: AttributeSet> CollectionCache<T> {
    pub fn new(
        load_one: LoadOneFn<T>,
        load_by_container: LoadContainerFn<T>,
        load_all: LoadAllFn<T>,
    ) -> Self {
        CollectionCache {
            state: Mutex::new(CacheState::default()),
            load_one,
            load_by_container,
            load_all,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, CacheState<T>>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::LockPoisoned("collection cache"))
    }

    /// Get one resource, loading it on first unresolved access.
    pub fn get_resource(&self, id: &str) -> Result<Option<Resource<T>>, StoreError> {
        let mut state = self.lock()?;
        if let Some(resource) = state.resources.get(id) {
            return Ok(Some(resource.clone()));
        }
        if state.absent.contains(id) || state.all_loaded {
            return Ok(None);
        }
        match (self.load_one)(id)? {
            Some(resource) => {
                state.index(&resource);
                state.resources.insert(id.to_string(), resource.clone());
                Ok(Some(resource))
            }
            None => {
                state.absent.insert(id.to_string());
                Ok(None)
            }
        }
    }

    /// Get the full collection, loading it once.
    pub fn get_resources(&self) -> Result<Vec<Resource<T>>, StoreError> {
        let mut state = self.lock()?;
        state.ensure_all_loaded(&self.load_all)?;
        Ok(state.sorted(state.resources.keys().cloned()))
    }

    /// Get the resources indexed under a container, loading that scope once.
    pub fn get_container_resources(
        &self,
        container_id: &str,
    ) -> Result<Vec<Resource<T>>, StoreError> {
        let mut state = self.lock()?;
        if !state.all_loaded && !state.containers_loaded.contains(container_id) {
            let loaded = (self.load_by_container)(container_id)?;
            state.merge(loaded);
            state.containers_loaded.insert(container_id.to_string());
        }
        let ids: Vec<String> = state
            .by_container
            .get(container_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        Ok(state.sorted(ids.into_iter()))
    }

    /// Insert newly created resources. Additive: no loader is called and no
    /// completeness flag changes.
    pub fn create_resources(&self, resources: Vec<Resource<T>>) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        for resource in resources {
            state.absent.remove(resource.id());
            state.index(&resource);
            state.resources.insert(resource.id().to_string(), resource);
        }
        Ok(())
    }

    /// Overwrite one entry unconditionally, even if it was never cached
    /// (covers a resource fetched through a container load and now updated
    /// by id).
    pub fn update_resource(&self, resource: Resource<T>) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.absent.remove(resource.id());
        state.index(&resource);
        state.resources.insert(resource.id().to_string(), resource);
        Ok(())
    }

    /// Drop one entry and record it as confirmed absent.
    pub fn remove_resource(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.resources.remove(id);
        for ids in state.by_container.values_mut() {
            ids.remove(id);
        }
        state.absent.insert(id.to_string());
        Ok(())
    }

    /// Number of resources in the full collection. Forces a full load.
    pub fn resource_count(&self) -> Result<usize, StoreError> {
        let mut state = self.lock()?;
        state.ensure_all_loaded(&self.load_all)?;
        Ok(state.resources.len())
    }

    /// Non-loading read of a cached entry.
    pub fn peek_resource(&self, id: &str) -> Result<Option<Resource<T>>, StoreError> {
        let state = self.lock()?;
        Ok(state.resources.get(id).cloned())
    }

    /// Mark the whole collection loaded without calling any loader,
    /// trusting that the cache already holds the truth.
    pub fn init(&self) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.all_loaded = true;
        Ok(())
    }

    /// Mark one container loaded without calling any loader.
    pub fn init_container(&self, container_id: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.containers_loaded.insert(container_id.to_string());
        Ok(())
    }

    /// Copy the full cache state into another instance, applying a rewrite
    /// to every resource. Completeness flags carry over: the target is
    /// trusted to the same extent as the source. Used by variant cloning.
    pub(crate) fn copy_state_into(
        &self,
        target: &CollectionCache<T>,
        rewrite: impl Fn(&mut Resource<T>),
    ) -> Result<(), StoreError> {
        let source = self.lock()?;
        let mut dest = target.lock()?;
        dest.resources = source
            .resources
            .iter()
            .map(|(id, resource)| {
                let mut cloned = resource.clone();
                rewrite(&mut cloned);
                (id.clone(), cloned)
            })
            .collect();
        dest.absent = source.absent.clone();
        dest.by_container = source.by_container.clone();
        dest.all_loaded = source.all_loaded;
        dest.containers_loaded = source.containers_loaded.clone();
        Ok(())
    }
}
