use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::StoreError;
use crate::resource::Resource;

type WriteFn<T> = Box<dyn Fn(Vec<Resource<T>>) -> Result<(), StoreError> + Send + Sync>;
type RemoveFn = Box<dyn Fn(Vec<String>) -> Result<(), StoreError> + Send + Sync>;

/// Pending local state of one id inside a buffer.
#[derive(Debug)]
pub enum Pending<T> {
    Create(Resource<T>),
    Update(Resource<T>),
    Remove,
    None,
}

/// Write buffer for one resource collection.
///
/// Coalesces pending create/update/remove operations per id until
/// [`CollectionBuffer::flush`] drains them through the injected callbacks.
/// After reconciliation an id is pending in at most one of the three sets:
/// create then update collapses to one create, create then remove cancels
/// out entirely, update then remove keeps only the remove.
pub struct CollectionBuffer<T> {
    state: Mutex<BufferState<T>>,
    on_create: WriteFn<T>,
    on_update: WriteFn<T>,
    on_remove: RemoveFn,
}

struct BufferState<T> {
    creates: HashMap<String, Resource<T>>,
    updates: HashMap<String, Resource<T>>,
    removes: HashSet<String>,
}

impl<T> Default for BufferState<T> {
    fn default() -> Self {
        BufferState {
            creates: HashMap::new(),
            updates: HashMap::new(),
            removes: HashSet::new(),
        }
    }
}

fn sorted_by_id<T: Clone>(pending: &HashMap<String, Resource<T>>) -> Vec<Resource<T>> {
    let mut ids: Vec<&String> = pending.keys().collect();
    ids.sort_unstable();
    ids.iter()
        .filter_map(|id| pending.get(*id).cloned())
        .collect()
}

impl<T: Clone> CollectionBuffer<T> {
    pub fn new(on_create: WriteFn<T>, on_update: WriteFn<T>, on_remove: RemoveFn) -> Self {
        CollectionBuffer {
            state: Mutex::new(BufferState::default()),
            on_create,
            on_update,
            on_remove,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BufferState<T>>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::LockPoisoned("collection buffer"))
    }

    /// Register a pending creation. Cancels a pending remove of the same id.
    pub fn create(&self, resource: Resource<T>) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.removes.remove(resource.id());
        state.updates.remove(resource.id());
        state.creates.insert(resource.id().to_string(), resource);
        Ok(())
    }

    /// Register a pending update. Collapses into a pending create of the
    /// same id when one exists.
    pub fn update(&self, resource: Resource<T>) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.creates.contains_key(resource.id()) {
            state.creates.insert(resource.id().to_string(), resource);
        } else {
            state.updates.insert(resource.id().to_string(), resource);
        }
        Ok(())
    }

    /// Register a pending removal. A created-then-removed id nets to
    /// nothing; an updated-then-removed id keeps only the removal.
    pub fn remove(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.creates.remove(id).is_some() {
            return Ok(());
        }
        state.updates.remove(id);
        state.removes.insert(id.to_string());
        Ok(())
    }

    /// Pending state of one id.
    pub fn pending(&self, id: &str) -> Result<Pending<T>, StoreError> {
        let state = self.lock()?;
        if let Some(resource) = state.creates.get(id) {
            return Ok(Pending::Create(resource.clone()));
        }
        if let Some(resource) = state.updates.get(id) {
            return Ok(Pending::Update(resource.clone()));
        }
        if state.removes.contains(id) {
            return Ok(Pending::Remove);
        }
        Ok(Pending::None)
    }

    /// Overlay pending local state over a backend read: pending updates
    /// replace, pending removes drop, pending creates matching `admit` are
    /// appended.
    pub fn overlay(
        &self,
        base: Vec<Resource<T>>,
        admit: impl Fn(&Resource<T>) -> bool,
    ) -> Result<Vec<Resource<T>>, StoreError> {
        let state = self.lock()?;
        let mut result: Vec<Resource<T>> = Vec::with_capacity(base.len());
        let mut seen: HashSet<String> = HashSet::new();
        for resource in base {
            if state.removes.contains(resource.id()) {
                continue;
            }
            seen.insert(resource.id().to_string());
            if let Some(updated) = state.updates.get(resource.id()) {
                result.push(updated.clone());
            } else if let Some(created) = state.creates.get(resource.id()) {
                result.push(created.clone());
            } else {
                result.push(resource);
            }
        }
        for created in sorted_by_id(&state.creates) {
            if !seen.contains(created.id()) && admit(&created) {
                result.push(created);
            }
        }
        Ok(result)
    }

    /// Drain pending state through the callbacks: creates, then updates,
    /// then removes, each only when non-empty. Pending state is cleared
    /// only after every callback succeeded; a failure leaves the whole
    /// buffer intact so a later flush retries the same payload.
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !state.creates.is_empty() {
            (self.on_create)(sorted_by_id(&state.creates))?;
        }
        if !state.updates.is_empty() {
            (self.on_update)(sorted_by_id(&state.updates))?;
        }
        if !state.removes.is_empty() {
            let mut ids: Vec<String> = state.removes.iter().cloned().collect();
            ids.sort_unstable();
            (self.on_remove)(ids)?;
        }
        state.creates.clear();
        state.updates.clear();
        state.removes.clear();
        Ok(())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        let state = self.lock()?;
        Ok(state.creates.is_empty() && state.updates.is_empty() && state.removes.is_empty())
    }

    /// Deep-copy pending state into another buffer, applying a rewrite to
    /// every pending resource. Used by variant cloning; pending removals
    /// carry over by id.
    pub(crate) fn clone_pending_into(
        &self,
        target: &CollectionBuffer<T>,
        rewrite: impl Fn(&mut Resource<T>),
    ) -> Result<(), StoreError> {
        let source = self.lock()?;
        let mut dest = target.lock()?;
        for (id, resource) in &source.creates {
            let mut cloned = resource.clone();
            rewrite(&mut cloned);
            dest.creates.insert(id.clone(), cloned);
        }
        for (id, resource) in &source.updates {
            let mut cloned = resource.clone();
            rewrite(&mut cloned);
            dest.updates.insert(id.clone(), cloned);
        }
        for id in &source.removes {
            dest.removes.insert(id.clone());
        }
        Ok(())
    }
}
