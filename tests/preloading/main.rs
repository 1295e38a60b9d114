use std::collections::{BTreeMap, BTreeSet};

use gridstore::{
    AttributeSet, BufferedNetworkStoreClient, CachedNetworkStoreClient, InMemoryNetworkStore,
    LimitsSide, LoadAttributes, NetworkStore, NetworkStoreClient, PreloadingNetworkStoreClient,
    PreloadingStrategy, Resource, ResourceType, StoreCall, StoreError, SwitchAttributes,
};
use uuid::Uuid;

type Client = PreloadingNetworkStoreClient<
    CachedNetworkStoreClient<BufferedNetworkStoreClient<InMemoryNetworkStore>>,
>;

fn client(strategy: PreloadingStrategy) -> (Client, InMemoryNetworkStore) {
    let store = InMemoryNetworkStore::new();
    let stack = PreloadingNetworkStoreClient::new(
        CachedNetworkStoreClient::new(BufferedNetworkStoreClient::new(store.clone())),
        strategy,
    );
    (stack, store)
}

fn load(id: &str, vl: &str) -> Resource<LoadAttributes> {
    Resource::builder()
        .id(id)
        .attributes(LoadAttributes {
            voltage_level_id: vl.into(),
            ..Default::default()
        })
        .build()
        .unwrap()
}

fn switch(id: &str, vl: &str) -> Resource<SwitchAttributes> {
    Resource::builder()
        .id(id)
        .attributes(SwitchAttributes {
            voltage_level_id: vl.into(),
            ..Default::default()
        })
        .build()
        .unwrap()
}

fn bulk_loaded_kinds(store: &InMemoryNetworkStore) -> BTreeSet<ResourceType> {
    store
        .calls()
        .iter()
        .filter_map(|call| match call {
            StoreCall::LoadAll { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect()
}

#[test]
fn no_preloading_loads_on_demand_only() {
    let (client, store) = client(PreloadingStrategy::None);
    let network = Uuid::new_v4();
    store.create(network, vec![load("l1", "vl1")]).unwrap();
    store.clear_calls();

    client.get::<LoadAttributes>(network, 0, "l1").unwrap();

    assert_eq!(
        store.calls(),
        vec![StoreCall::LoadOne {
            kind: ResourceType::Load,
            variant_num: 0,
            id: "l1".to_string(),
        }]
    );
}

#[test]
fn collection_strategy_bulk_loads_every_kind_on_first_access() {
    let (client, store) = client(PreloadingStrategy::Collection);
    let network = Uuid::new_v4();
    store.create(network, vec![load("l1", "vl1")]).unwrap();
    store.clear_calls();

    client.get::<LoadAttributes>(network, 0, "l1").unwrap();

    let kinds = bulk_loaded_kinds(&store);
    assert_eq!(kinds.len(), ResourceType::all().len());
    // The access itself is served from the warmed cache.
    assert!(store
        .calls()
        .iter()
        .all(|call| !matches!(call, StoreCall::LoadOne { .. })));
}

#[test]
fn preloading_happens_once_per_network() {
    let (client, store) = client(PreloadingStrategy::Collection);
    let network = Uuid::new_v4();
    store.create(network, vec![load("l1", "vl1")]).unwrap();

    client.get::<LoadAttributes>(network, 0, "l1").unwrap();
    store.clear_calls();
    client.get::<SwitchAttributes>(network, 0, "s1").unwrap();
    client.get_all::<LoadAttributes>(network, 0).unwrap();

    assert!(store.calls().is_empty());
}

#[test]
fn preloading_is_scoped_per_network() {
    let (client, store) = client(PreloadingStrategy::Collection);
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    store.create(a, vec![load("la", "vl1")]).unwrap();
    store.create(b, vec![load("lb", "vl1")]).unwrap();

    client.get::<LoadAttributes>(a, 0, "la").unwrap();
    store.clear_calls();
    client.get::<LoadAttributes>(b, 0, "lb").unwrap();

    assert_eq!(bulk_loaded_kinds(&store).len(), ResourceType::all().len());
}

#[test]
fn bus_view_strategy_loads_the_topology_set() {
    let (client, store) = client(PreloadingStrategy::bus_view());
    let network = Uuid::new_v4();
    store.create(network, vec![switch("s1", "vl1")]).unwrap();
    store.clear_calls();

    client.get::<SwitchAttributes>(network, 0, "s1").unwrap();

    let kinds = bulk_loaded_kinds(&store);
    assert_eq!(
        kinds,
        BTreeSet::from([
            ResourceType::Substation,
            ResourceType::VoltageLevel,
            ResourceType::Switch,
            ResourceType::BusbarSection,
            ResourceType::Line,
            ResourceType::TwoWindingsTransformer,
        ])
    );
}

#[test]
fn bus_view_strategy_leaves_other_kinds_on_demand() {
    let (client, store) = client(PreloadingStrategy::bus_view());
    let network = Uuid::new_v4();
    store.create(network, vec![load("l1", "vl1")]).unwrap();
    store.clear_calls();

    // Loads are outside the bus-view set: no bulk load fires at all.
    client.get::<LoadAttributes>(network, 0, "l1").unwrap();

    assert!(bulk_loaded_kinds(&store).is_empty());
    assert_eq!(
        store.calls(),
        vec![StoreCall::LoadOne {
            kind: ResourceType::Load,
            variant_num: 0,
            id: "l1".to_string(),
        }]
    );
}

#[test]
fn writes_also_trigger_preloading() {
    let (client, store) = client(PreloadingStrategy::bus_view());
    let network = Uuid::new_v4();
    store.clear_calls();

    client.create(network, vec![switch("s1", "vl1")]).unwrap();

    assert_eq!(bulk_loaded_kinds(&store).len(), 6);
}

// --- Failure paths ---

#[derive(Clone, Copy)]
enum BulkLoadBehavior {
    Fail,
    PanicOnLoadKind,
}

/// Backend whose bulk loads misbehave; everything else is a benign no-op.
struct UnreliableStore {
    behavior: BulkLoadBehavior,
}

impl NetworkStore for UnreliableStore {
    fn load_one<T: AttributeSet>(
        &self,
        _network: Uuid,
        _variant_num: i32,
        _id: &str,
    ) -> Result<Option<Resource<T>>, StoreError> {
        Ok(None)
    }

    fn load_by_container<T: AttributeSet>(
        &self,
        _network: Uuid,
        _variant_num: i32,
        _container_id: &str,
    ) -> Result<Vec<Resource<T>>, StoreError> {
        Ok(Vec::new())
    }

    fn load_all<T: AttributeSet>(
        &self,
        _network: Uuid,
        _variant_num: i32,
    ) -> Result<Vec<Resource<T>>, StoreError> {
        match self.behavior {
            BulkLoadBehavior::Fail => Err(StoreError::backend("bulk load failed")),
            BulkLoadBehavior::PanicOnLoadKind => {
                if T::KIND == ResourceType::Load {
                    panic!("loader crashed");
                }
                Ok(Vec::new())
            }
        }
    }

    fn create<T: AttributeSet>(
        &self,
        _network: Uuid,
        _resources: Vec<Resource<T>>,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    fn update<T: AttributeSet>(
        &self,
        _network: Uuid,
        _resources: Vec<Resource<T>>,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    fn remove<T: AttributeSet>(
        &self,
        _network: Uuid,
        _variant_num: i32,
        _ids: Vec<String>,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    fn clone_variant(
        &self,
        _network: Uuid,
        _source_variant_num: i32,
        _target_variant_num: i32,
        _target_variant_id: &str,
        _overwrite: bool,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    fn remove_operational_limits_groups(
        &self,
        _network: Uuid,
        _variant_num: i32,
        _kind: ResourceType,
        _removals: BTreeMap<LimitsSide, BTreeMap<String, BTreeSet<String>>>,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    fn remove_extension_attributes(
        &self,
        _network: Uuid,
        _variant_num: i32,
        _kind: ResourceType,
        _removals: BTreeMap<String, BTreeSet<String>>,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

fn unreliable_client(
    behavior: BulkLoadBehavior,
) -> PreloadingNetworkStoreClient<
    CachedNetworkStoreClient<BufferedNetworkStoreClient<UnreliableStore>>,
> {
    PreloadingNetworkStoreClient::with_parallelism(
        CachedNetworkStoreClient::new(BufferedNetworkStoreClient::new(UnreliableStore {
            behavior,
        })),
        PreloadingStrategy::Collection,
        3,
    )
}

#[test]
fn failed_parallel_preload_propagates_to_the_triggering_call() {
    let client = unreliable_client(BulkLoadBehavior::Fail);
    let network = Uuid::new_v4();

    let err = client
        .get::<LoadAttributes>(network, 0, "l1")
        .unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)));

    // No kind was marked preloaded: the next access retries the bulk load
    // instead of trusting a half-warmed cache.
    let err = client
        .get::<LoadAttributes>(network, 0, "l1")
        .unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)));
}

#[test]
fn panicked_preload_worker_surfaces_as_a_backend_error() {
    let client = unreliable_client(BulkLoadBehavior::PanicOnLoadKind);
    let network = Uuid::new_v4();

    let err = client
        .get::<SwitchAttributes>(network, 0, "s1")
        .unwrap_err();
    assert_eq!(err, StoreError::backend("preload worker panicked"));
}

#[test]
fn parallel_preloading_loads_each_kind_exactly_once() {
    let store = InMemoryNetworkStore::new();
    let client = PreloadingNetworkStoreClient::with_parallelism(
        CachedNetworkStoreClient::new(BufferedNetworkStoreClient::new(store.clone())),
        PreloadingStrategy::Collection,
        3,
    );
    let network = Uuid::new_v4();
    store.create(network, vec![load("l1", "vl1")]).unwrap();
    store.clear_calls();

    client.get::<LoadAttributes>(network, 0, "l1").unwrap();

    let mut per_kind: Vec<ResourceType> = store
        .calls()
        .iter()
        .filter_map(|call| match call {
            StoreCall::LoadAll { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    per_kind.sort_unstable();
    let deduped: BTreeSet<ResourceType> = per_kind.iter().copied().collect();
    assert_eq!(per_kind.len(), deduped.len());
    assert_eq!(deduped.len(), ResourceType::all().len());
}
