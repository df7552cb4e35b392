//! The six literal scenarios of §8, driven end-to-end against the in-memory mock transport.
//! Maintenance ticks are invoked directly rather than through `service::Service`'s timers,
//! which gives deterministic control over convergence without needing a virtual clock —
//! `Ring`'s tick methods are plain `async fn`s with no internal sleeping.

use chordnet::capability::PeerConnector;
use chordnet::config::Settings;
use chordnet::identifier::Identifier;
use chordnet::node::NodeInfo;
use chordnet::ring::Ring;
use chordnet::store::Record;
use chordnet::timestamp::Timestamp;
use chordnet::transport::mock::MockNetwork;
use std::net::IpAddr;
use std::sync::Arc;

fn node_info(port: u16) -> NodeInfo {
    let ip: IpAddr = "127.0.0.1".parse().unwrap();
    NodeInfo::new(ip, port)
}

fn spawn_ring(net: &Arc<MockNetwork>, port: u16, settings: Settings) -> Arc<Ring> {
    let ring = Ring::new(node_info(port), net.clone(), settings);
    net.register(&ring);
    ring
}

async fn settle(rings: &[Arc<Ring>], ticks: usize) {
    for _ in 0..ticks {
        for ring in rings {
            ring.stabilize().await;
            ring.fix_fingers().await;
        }
    }
}

#[tokio::test]
async fn scenario_1_bootstrap_single_node() {
    let net = MockNetwork::new();
    let a = spawn_ring(&net, 10001, Settings::default());

    assert_eq!(a.successor_info(), a.local);
    assert!(a.predecessor_info().is_none());

    let any_id = Identifier::of_address("whatever", 9999);
    assert_eq!(a.find_successor(any_id).await.unwrap(), a.local);
}

#[tokio::test]
async fn scenario_2_two_node_join_converges() {
    let net = MockNetwork::new();
    let a = spawn_ring(&net, 10001, Settings::default());
    let b = spawn_ring(&net, 10002, Settings::default());

    let bootstrap = net.connect(a.local);
    b.join(bootstrap).await.unwrap();

    settle(&[a.clone(), b.clone()], 3);

    assert_eq!(a.successor_info(), b.local);
    assert_eq!(a.predecessor_info(), Some(b.local));
    assert_eq!(b.successor_info(), a.local);
    assert_eq!(b.predecessor_info(), Some(a.local));
}

#[tokio::test]
async fn scenario_3_finger_refresh_on_eight_node_ring() {
    let net = MockNetwork::new();
    let mut rings = Vec::new();
    for i in 0..8u16 {
        rings.push(spawn_ring(&net, 10001 + i, Settings::default()));
    }
    // Chain-join each node through the previous one so the ring starts connected.
    for i in 1..rings.len() {
        let bootstrap = net.connect(rings[i - 1].local);
        rings[i].join(bootstrap).await.unwrap();
    }

    // A generous number of stabilize+fix-finger rounds: one per finger index is sufficient
    // for the cursor to sweep the whole table at least once per node.
    settle(&rings, 160);

    for ring in &rings {
        let distinct = ring
            .finger_table_snapshot()
            .into_iter()
            .map(|(_, info)| info.identifier)
            .collect::<std::collections::BTreeSet<_>>()
            .len();
        // O(log N) for N = 8 is small; distinct entries should be far fewer than the 160
        // slots and at least 1 (every ring has at least its successor installed at index 1).
        assert!(distinct >= 1 && distinct <= 8, "expected O(log N) distinct fingers, got {distinct}");
    }
}

#[tokio::test]
async fn scenario_4_node_loss_promotes_successor_list() {
    let net = MockNetwork::new();
    let a = spawn_ring(&net, 10001, Settings::default());
    let b = spawn_ring(&net, 10002, Settings::default());
    let c = spawn_ring(&net, 10003, Settings::default());

    let bootstrap_b = net.connect(a.local);
    b.join(bootstrap_b).await.unwrap();
    settle(&[a.clone(), b.clone()], 3);
    let bootstrap_c = net.connect(a.local);
    c.join(bootstrap_c).await.unwrap();
    settle(&[a.clone(), b.clone(), c.clone()], 5);

    // Kill whichever of B/C is A's current successor.
    let dead_identifier = a.successor_info().identifier;
    net.unregister(dead_identifier);

    a.stabilize().await; // candidate walk must fail over to the next live successor-list entry
    assert_ne!(a.successor_info().identifier, dead_identifier);

    let target = Identifier::of_address("routing-probe", 1);
    assert!(a.find_successor(target).await.is_ok());
}

#[tokio::test]
async fn scenario_5_anti_entropy_repairs_divergent_replicas() {
    let net = MockNetwork::new();
    let settings = Settings::default().with_replicas(2);
    let a = spawn_ring(&net, 10001, settings.clone());
    let b = spawn_ring(&net, 10002, settings);

    let bootstrap = net.connect(a.local);
    b.join(bootstrap).await.unwrap();
    settle(&[a.clone(), b.clone()], 3);

    // A owns r1, r2, r3; B (its successor) only has r2 — a divergent replica.
    let r1 = Record::new(b"r1".to_vec());
    let r2 = Record::new(b"r2".to_vec());
    let r3 = Record::new(b"r3".to_vec());
    for r in [&r1, &r2, &r3] {
        assert!(a.handle_store(r.clone()));
    }
    assert!(b.handle_store(r2.clone()));

    a.sync_data().await;

    for id in [r1.identifier, r2.identifier, r3.identifier] {
        assert!(b.store().get(id).is_some(), "B should hold {id} after one sync round");
        assert!(a.store().get(id).is_some(), "A's own copy must survive the round");
    }
}

#[tokio::test]
async fn scenario_6_store_outside_owned_range_is_rejected() {
    let net = MockNetwork::new();
    let a = spawn_ring(&net, 10001, Settings::default());
    let b = spawn_ring(&net, 10002, Settings::default());

    let bootstrap = net.connect(a.local);
    b.join(bootstrap).await.unwrap();
    settle(&[a.clone(), b.clone()], 3);

    // B's predecessor is now A; a record whose identifier sits outside (A, B] is rejected.
    let predecessor_id = b.predecessor_info().unwrap().identifier;
    let outside = Record::with_identifier(predecessor_id, Timestamp::now(), vec![1, 2, 3]);
    assert!(!b.handle_store(outside));

    // A record that does fall in the owned range is accepted.
    let inside = Record::new(b"owned".to_vec());
    // Force its identifier into the owned half by construction: using the owner's own id
    // directly (right endpoint of the interval) is always owned.
    let inside = Record::with_identifier(b.local.identifier, inside.created_at, inside.content);
    assert!(b.handle_store(inside));
}
