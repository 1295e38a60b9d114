use gridstore::{
    BufferedNetworkStoreClient, CachedNetworkStoreClient, InMemoryNetworkStore, LoadAttributes,
    NetworkAttributes, NetworkStore, NetworkStoreClient, Resource, StoreCall, StoreError,
    SubstationAttributes, SELF_FULL_VARIANT_NUM,
};
use uuid::Uuid;

type Client = CachedNetworkStoreClient<BufferedNetworkStoreClient<InMemoryNetworkStore>>;

fn client() -> (Client, InMemoryNetworkStore) {
    let store = InMemoryNetworkStore::new();
    (
        CachedNetworkStoreClient::new(BufferedNetworkStoreClient::new(store.clone())),
        store,
    )
}

fn substation(id: &str) -> Resource<SubstationAttributes> {
    Resource::builder()
        .id(id)
        .attributes(SubstationAttributes {
            name: id.to_string(),
            ..Default::default()
        })
        .build()
        .unwrap()
}

fn load(id: &str, p0: f64) -> Resource<LoadAttributes> {
    Resource::builder()
        .id(id)
        .attributes(LoadAttributes {
            voltage_level_id: "vl1".into(),
            p0,
            ..Default::default()
        })
        .build()
        .unwrap()
}

fn network_resource(network: Uuid, variant_id: &str, case_date: &str) -> Resource<NetworkAttributes> {
    Resource::builder()
        .id(network.to_string())
        .attributes(NetworkAttributes {
            uuid: network,
            variant_id: variant_id.to_string(),
            case_date: case_date.to_string(),
            ..Default::default()
        })
        .build()
        .unwrap()
}

// --- Backend cloning ---

#[test]
fn clone_duplicates_flushed_state_onto_the_target_variant() {
    let (client, store) = client();
    let network = Uuid::new_v4();
    client.create(network, vec![substation("s1")]).unwrap();
    client.flush(network).unwrap();

    client.clone_network(network, 0, 1, "v1").unwrap();

    let cloned = store
        .load_one::<SubstationAttributes>(network, 1, "s1")
        .unwrap()
        .unwrap();
    assert_eq!(cloned.variant_num(), 1);

    let via_client = client
        .get::<SubstationAttributes>(network, 1, "s1")
        .unwrap()
        .unwrap();
    assert_eq!(via_client.variant_num(), 1);
}

#[test]
fn clone_rejects_the_initial_variant_as_target() {
    let (client, _store) = client();
    let network = Uuid::new_v4();
    client.create(network, vec![substation("s1")]).unwrap();
    client.flush(network).unwrap();

    let err = client.clone_network(network, 0, 0, "init").unwrap_err();
    let StoreError::CloneConflict { status, code, .. } = err else {
        panic!("expected a clone conflict");
    };
    assert_eq!(status, 409);
    assert_eq!(code, "PROTECTED_VARIANT");
}

#[test]
fn clone_onto_an_existing_variant_conflicts() {
    let (client, _store) = client();
    let network = Uuid::new_v4();
    client.create(network, vec![substation("s1")]).unwrap();
    client.flush(network).unwrap();
    client.clone_network(network, 0, 1, "v1").unwrap();

    let err = client.clone_network(network, 0, 1, "v1").unwrap_err();
    let StoreError::CloneConflict { code, .. } = err else {
        panic!("expected a clone conflict");
    };
    assert_eq!(code, "VARIANT_EXISTS");
}

// --- Pending state carried over ---

#[test]
fn pending_writes_follow_the_clone_to_the_target_variant() {
    let (client, store) = client();
    let network = Uuid::new_v4();
    client.create(network, vec![substation("s1")]).unwrap();
    client.flush(network).unwrap();

    // Unflushed at clone time.
    client.create(network, vec![load("l1", 1.0)]).unwrap();
    client.clone_network(network, 0, 1, "v1").unwrap();

    let on_target = client
        .get::<LoadAttributes>(network, 1, "l1")
        .unwrap()
        .unwrap();
    assert_eq!(on_target.variant_num(), 1);

    client.flush(network).unwrap();
    assert!(store
        .load_one::<LoadAttributes>(network, 0, "l1")
        .unwrap()
        .is_some());
    let flushed = store
        .load_one::<LoadAttributes>(network, 1, "l1")
        .unwrap()
        .unwrap();
    assert_eq!(flushed.variant_num(), 1);
}

#[test]
fn clone_deep_copies_pending_state() {
    let (client, _store) = client();
    let network = Uuid::new_v4();
    client.create(network, vec![substation("s1")]).unwrap();
    client.flush(network).unwrap();

    client.create(network, vec![load("l1", 1.0)]).unwrap();
    client.clone_network(network, 0, 1, "v1").unwrap();
    // Mutating the source copy after the clone must not leak into the target.
    client.update(network, vec![load("l1", 99.0)]).unwrap();

    let on_target = client
        .get::<LoadAttributes>(network, 1, "l1")
        .unwrap()
        .unwrap();
    assert_eq!(on_target.attributes().p0, 1.0);
}

// --- Full-variant lineage ---

#[test]
fn pending_network_attributes_are_stamped_with_lineage_and_variant_id() {
    let (client, _store) = client();
    let network = Uuid::new_v4();
    client.create(network, vec![substation("s1")]).unwrap();
    client.flush(network).unwrap();

    client
        .create(
            network,
            vec![network_resource(network, "init", "2024-01-01T00:00:00Z")],
        )
        .unwrap();
    client.clone_network(network, 0, 1, "v1").unwrap();
    client.clone_network(network, 1, 2, "v2").unwrap();

    let on_v2 = client
        .get::<NetworkAttributes>(network, 2, &network.to_string())
        .unwrap()
        .unwrap();
    assert_eq!(on_v2.variant_num(), 2);
    assert_eq!(on_v2.attributes().variant_id, "v2");
    // Both clones are partial; the initial variant stays the full ancestor.
    assert_eq!(on_v2.attributes().full_variant_num, 0);
    // case_date is frozen at clone time.
    assert_eq!(on_v2.attributes().case_date, "2024-01-01T00:00:00Z");

    let on_v0 = client
        .get::<NetworkAttributes>(network, 0, &network.to_string())
        .unwrap()
        .unwrap();
    assert_eq!(on_v0.attributes().full_variant_num, SELF_FULL_VARIANT_NUM);
}

#[test]
fn flushed_network_attributes_get_lineage_from_the_backend() {
    let (client, store) = client();
    let network = Uuid::new_v4();
    client
        .create(
            network,
            vec![network_resource(network, "init", "2024-01-01T00:00:00Z")],
        )
        .unwrap();
    client.flush(network).unwrap();

    client.clone_network(network, 0, 1, "v1").unwrap();
    client.clone_network(network, 1, 2, "v2").unwrap();

    let stored = store
        .load_one::<NetworkAttributes>(network, 2, &network.to_string())
        .unwrap()
        .unwrap();
    assert_eq!(stored.attributes().variant_id, "v2");
    assert_eq!(stored.attributes().full_variant_num, 0);
}

#[test]
fn pending_updates_fan_out_to_every_cloned_variant_at_flush() {
    let (client, store) = client();
    let network = Uuid::new_v4();
    client
        .create(
            network,
            vec![network_resource(network, "init", "2024-01-01T00:00:00Z")],
        )
        .unwrap();
    client.flush(network).unwrap();
    store.clear_calls();

    let mut updated = network_resource(network, "init", "2024-01-01T00:00:00Z");
    updated.attributes_mut().forecast_distance = 250;
    client.update(network, vec![updated]).unwrap();

    client.clone_network(network, 0, 1, "v1").unwrap();
    client.clone_network(network, 1, 2, "v2").unwrap();

    // A later change on the source does not leak into the clones.
    let mut changed_again = network_resource(network, "init", "2024-06-01T00:00:00Z");
    changed_again.attributes_mut().forecast_distance = 540;
    client.update(network, vec![changed_again]).unwrap();

    client.flush(network).unwrap();

    let updates: Vec<i32> = store
        .calls()
        .iter()
        .filter_map(|call| match call {
            StoreCall::Update { variant_nums, .. } => Some(variant_nums.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(updates, vec![0, 1, 2]);

    let on_v0 = store
        .load_one::<NetworkAttributes>(network, 0, &network.to_string())
        .unwrap()
        .unwrap();
    assert_eq!(on_v0.attributes().forecast_distance, 540);
    assert_eq!(on_v0.attributes().case_date, "2024-06-01T00:00:00Z");
    assert_eq!(on_v0.attributes().full_variant_num, SELF_FULL_VARIANT_NUM);

    for (variant_num, variant_id) in [(1, "v1"), (2, "v2")] {
        let cloned = store
            .load_one::<NetworkAttributes>(network, variant_num, &network.to_string())
            .unwrap()
            .unwrap();
        assert_eq!(cloned.attributes().forecast_distance, 250);
        assert_eq!(cloned.attributes().variant_id, variant_id);
        assert_eq!(cloned.attributes().full_variant_num, 0);
        assert_eq!(cloned.attributes().case_date, "2024-01-01T00:00:00Z");
    }
}

// --- Cache state carried over ---

#[test]
fn cache_completeness_carries_to_the_clone() {
    let (client, store) = client();
    let network = Uuid::new_v4();
    client
        .create(network, vec![load("l1", 1.0), load("l2", 2.0)])
        .unwrap();
    client.flush(network).unwrap();

    // Marks the variant 0 load collection fully cached.
    assert_eq!(client.get_all::<LoadAttributes>(network, 0).unwrap().len(), 2);
    client.clone_network(network, 0, 1, "v1").unwrap();
    store.clear_calls();

    let on_target = client.get_all::<LoadAttributes>(network, 1).unwrap();
    assert_eq!(on_target.len(), 2);
    assert!(on_target.iter().all(|r| r.variant_num() == 1));
    // Served from the copied cache, no backend traffic.
    assert!(store.calls().is_empty());
}

#[test]
fn confirmed_absence_carries_to_the_clone() {
    let (client, store) = client();
    let network = Uuid::new_v4();
    client.create(network, vec![substation("s1")]).unwrap();
    client.flush(network).unwrap();

    assert!(client
        .get::<LoadAttributes>(network, 0, "ghost")
        .unwrap()
        .is_none());
    client.clone_network(network, 0, 1, "v1").unwrap();
    store.clear_calls();

    assert!(client
        .get::<LoadAttributes>(network, 1, "ghost")
        .unwrap()
        .is_none());
    assert!(store
        .calls()
        .iter()
        .all(|call| !matches!(call, StoreCall::LoadOne { .. })));
}
