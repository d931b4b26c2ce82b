//! top-level integration suite (§8): drives a pair of in-process nodes over real
//! `tokio::net` sockets rather than exercising components through mocked channels.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use sat_coordinator::config::{ClusterConfig, SatelliteConfig};
use sat_coordinator::listener::{run_listener, LinkSide};
use sat_coordinator::message::{Message, ProcessedData};
use sat_coordinator::orbit::OrbitalOracle;
use sat_coordinator::task::{BoundingBox, SatId, TaskId};
use sat_coordinator::transmitter::Transmitter;

/// a 2-node ring: `self_id` dials `peer_id`'s LEFT port since `peer`'s own
/// `connections[0]` names `self_id` back.
fn two_node_config(self_id: SatId, self_ip: IpAddr, peer_id: SatId, peer_ip: IpAddr) -> ClusterConfig {
    ClusterConfig {
        self_id,
        altitude: 500_000.0,
        ground_station_ip: "127.0.0.1".parse().unwrap(),
        ground_station_port: 9000,
        enable_legacy_udp: false,
        satellites: vec![
            SatelliteConfig { id: self_id, ip_address: self_ip, connections: [peer_id, peer_id], initial_angle: 0.0 },
            SatelliteConfig { id: peer_id, ip_address: peer_ip, connections: [self_id, self_id], initial_angle: 1.0 },
        ],
    }
}

fn oracle_for(self_id: SatId, peer_id: SatId) -> Arc<OrbitalOracle> {
    let ring = vec![self_id, peer_id];
    let angles: HashMap<SatId, f64> = ring.iter().map(|&id| (id, 0.0)).collect();
    Arc::new(OrbitalOracle::new(self_id, ring, 500_000.0, &angles))
}

/// an N-node ring (N >= 4) whose `connections` are each satellite's physical
/// ring neighbours (`[prev, next]` in `ids` order), matching the adjacency
/// `OrbitalOracle::ring()` and `Transmitter::neighbors()` both assume.
fn ring_config(ids: &[SatId], ips: &[IpAddr]) -> ClusterConfig {
    let n = ids.len();
    let satellites = (0..n)
        .map(|i| SatelliteConfig {
            id: ids[i],
            ip_address: ips[i],
            connections: [ids[(i + n - 1) % n], ids[(i + 1) % n]],
            initial_angle: i as f64,
        })
        .collect();
    ClusterConfig {
        self_id: ids[0],
        altitude: 500_000.0,
        ground_station_ip: "127.0.0.1".parse().unwrap(),
        ground_station_port: 9000,
        enable_legacy_udp: false,
        satellites,
    }
}

fn oracle_for_ring(self_id: SatId, ids: Vec<SatId>) -> Arc<OrbitalOracle> {
    let angles: HashMap<SatId, f64> = ids.iter().enumerate().map(|(i, &id)| (id, i as f64)).collect();
    Arc::new(OrbitalOracle::new(self_id, ids, 500_000.0, &angles))
}

#[tokio::test]
async fn request_crosses_the_wire_and_last_sender_is_rewritten() {
    let self_id: SatId = 1;
    let peer_id: SatId = 2;
    let self_ip: IpAddr = "127.0.1.1".parse().unwrap();
    let peer_ip: IpAddr = "127.0.1.2".parse().unwrap();

    let cfg = two_node_config(self_id, self_ip, peer_id, peer_ip);
    let transmitter = Transmitter::new(self_id, &cfg, oracle_for(self_id, peer_id));

    let (inbox_tx, inbox_rx) = sat_actor::channel::<Message>(8);
    let stop = sat_actor::StopFlag::new();
    let listener_stop = stop.clone();
    let listener_handle = tokio::spawn(run_listener(LinkSide::Left, peer_ip, inbox_tx, listener_stop));

    // give the listener a moment to bind before the transmitter dials it.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    // a REQUEST arriving with `last_sender == peer_id` simulates the message
    // having just hopped off some third node; the transmitter must stamp it
    // with its own id before it goes out (P3).
    let outgoing = Message::Request { task_id: TaskId::new(self_id, 0), deadline: 10.0, last_sender: peer_id };
    transmitter.transmit(outgoing).await;

    let received = tokio::time::timeout(std::time::Duration::from_secs(2), sat_actor::recv(&inbox_rx))
        .await
        .expect("message did not arrive within timeout")
        .expect("inbox closed unexpectedly");

    assert_eq!(received.kind(), "REQUEST");
    assert_eq!(received.last_sender(), self_id);

    stop.request_stop();
    let _ = listener_handle.await;
}

#[tokio::test]
async fn respond_with_explicit_first_hop_is_not_broadcast_back_to_sender() {
    let self_id: SatId = 3;
    let peer_id: SatId = 4;
    let self_ip: IpAddr = "127.0.1.3".parse().unwrap();
    let peer_ip: IpAddr = "127.0.1.4".parse().unwrap();

    let cfg = two_node_config(self_id, self_ip, peer_id, peer_ip);
    let transmitter = Transmitter::new(self_id, &cfg, oracle_for(self_id, peer_id));

    let (inbox_tx, inbox_rx) = sat_actor::channel::<Message>(8);
    let stop = sat_actor::StopFlag::new();
    let listener_stop = stop.clone();
    let listener_handle = tokio::spawn(run_listener(LinkSide::Left, peer_ip, inbox_tx, listener_stop));

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let task_id = TaskId::new(peer_id, 0);
    let respond = Message::Respond { task_id, source_sat: self_id, first_hop: peer_id, last_sender: self_id };
    transmitter.transmit(respond).await;

    let received = tokio::time::timeout(std::time::Duration::from_secs(2), sat_actor::recv(&inbox_rx))
        .await
        .expect("RESPOND did not arrive within timeout")
        .expect("inbox closed unexpectedly");

    assert_eq!(received.kind(), "RESPOND");
    assert_eq!(received.task_id(), Some(task_id));

    stop.request_stop();
    let _ = listener_handle.await;
}

/// scenario 5 (§8): a node that admitted a task and then receives RESPONSE-NACK
/// for it drops the entry and forwards any IMAGE-DATA that later arrives for
/// the same taskID instead of executing it.
#[tokio::test]
async fn nack_then_late_image_data_is_forwarded_not_executed() {
    use sat_coordinator::accepted_requests::AcceptedRequests;
    use sat_coordinator::executor::StubDetector;
    use sat_coordinator::response_collector::ResponseCollector;
    use sat_coordinator::router::MessageRouter;
    use sat_coordinator::task::{ImageBuf, Task};

    let self_id: SatId = 5;
    let neighbors = [6u64, 7u64];
    let oracle = oracle_for(self_id, 6);

    let accepted = Arc::new(AcceptedRequests::new());
    let collector = Arc::new(ResponseCollector::new(self_id, neighbors, oracle.clone(), {
        let (tx, _rx) = sat_actor::channel::<Message>(8);
        tx
    }));
    let (outbound_tx, outbound_rx) = sat_actor::channel::<Message>(8);
    let executor: Arc<dyn sat_coordinator::executor::TaskExecutor> = Arc::new(StubDetector::new(
        self_id,
        16,
        1.0,
        std::time::Duration::from_millis(1),
        oracle.clone(),
        outbound_tx.clone(),
    ));
    let (exec_tx, exec_rx) = sat_actor::channel::<(Task, f64)>(8);
    let router = MessageRouter::new(self_id, accepted.clone(), collector.clone(), executor, exec_tx, outbound_tx);

    let task_id = TaskId::new(6, 0);
    accepted.admit(task_id, 1.0, 1_000.0);
    assert!(accepted.has(task_id));

    router.dispatch(Message::ResponseNack { task_id, last_sender: 6 }, 0.0).await;
    assert!(!accepted.has(task_id));

    let img = ImageBuf { width: 1, height: 1, bytes: vec![0] };
    let task = Task::new(task_id, 0.0, 1_000.0, sat_common::Cartesian2::new(0.0, 0.0), "a.png", img).unwrap();
    router
        .dispatch(Message::ImageData { task, first_hop: None, last_sender: 6 }, 0.0)
        .await;

    let forwarded = tokio::time::timeout(std::time::Duration::from_secs(1), sat_actor::recv(&outbound_rx))
        .await
        .expect("no message forwarded")
        .expect("outbound queue closed");
    assert_eq!(forwarded.kind(), "IMAGE-DATA");
    assert!(exec_rx.try_recv().is_err(), "task must not reach the execution queue after a NACK");
}

fn sample_processed_data(first_hop: Option<SatId>, last_sender: SatId) -> Message {
    Message::ProcessedData {
        data: ProcessedData {
            cropped_image: vec![1, 2, 3],
            location: sat_common::Cartesian2::new(0.0, 0.0),
            timestamp: 0.0,
            file_name: "crop.png".into(),
            bounding_box: BoundingBox { x0: 0, y0: 0, x1: 4, y1: 4 },
        },
        first_hop,
        last_sender,
    }
}

/// scenario 6 (§8): a node that is the ground-closest satellite sends
/// PROCESSED-DATA directly to the ground-station endpoint rather than onto a
/// ring link, since its own `priority_list()` terminates at GROUND immediately.
#[tokio::test]
async fn processed_data_at_ground_closest_node_goes_to_ground_station() {
    let self_id: SatId = 10;
    let peer_id: SatId = 11;
    let self_ip: IpAddr = "127.0.2.1".parse().unwrap();
    let peer_ip: IpAddr = "127.0.2.2".parse().unwrap();

    let ground_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ground_addr = ground_listener.local_addr().unwrap();

    let mut cfg = two_node_config(self_id, self_ip, peer_id, peer_ip);
    cfg.ground_station_ip = ground_addr.ip();
    cfg.ground_station_port = ground_addr.port();

    // self is at angle 0, exactly over the ground station, so it is
    // ground-closest regardless of the peer's angle.
    let ring = vec![self_id, peer_id];
    let angles: HashMap<SatId, f64> = [(self_id, 0.0), (peer_id, 1.0)].into_iter().collect();
    let oracle = Arc::new(OrbitalOracle::new(self_id, ring, 500_000.0, &angles));

    let transmitter = Transmitter::new(self_id, &cfg, oracle);

    let accept = tokio::spawn(async move {
        let (mut sock, _) = ground_listener.accept().await.unwrap();
        sat_coordinator::wire::read_frame(&mut sock).await.unwrap().unwrap()
    });

    transmitter.transmit(sample_processed_data(None, peer_id)).await;

    let received = tokio::time::timeout(std::time::Duration::from_secs(2), accept)
        .await
        .expect("ground station never received a frame")
        .expect("accept task panicked");

    assert_eq!(received.kind(), "PROCESSED-DATA");
    assert_eq!(received.last_sender(), self_id);
}

/// a `first_hop` stamped by an earlier hop's own ground-ward computation no
/// longer names a neighbour of *this* node; the transmitter must treat it like
/// an absent hop and recompute from its own priority list rather than drop it.
#[tokio::test]
async fn processed_data_with_stale_first_hop_is_relayed_not_dropped() {
    let self_id: SatId = 12;
    let peer_id: SatId = 13;
    let self_ip: IpAddr = "127.0.2.3".parse().unwrap();
    let peer_ip: IpAddr = "127.0.2.4".parse().unwrap();

    let cfg = two_node_config(self_id, self_ip, peer_id, peer_ip);
    let transmitter = Transmitter::new(self_id, &cfg, oracle_for(self_id, peer_id));

    let (inbox_tx, inbox_rx) = sat_actor::channel::<Message>(8);
    let stop = sat_actor::StopFlag::new();
    let listener_stop = stop.clone();
    let listener_handle = tokio::spawn(run_listener(LinkSide::Left, peer_ip, inbox_tx, listener_stop));

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    // first_hop = self_id: the value a previous hop computed for *its own*
    // position, which can never be a neighbour of self.
    transmitter.transmit(sample_processed_data(Some(self_id), self_id)).await;

    let received = tokio::time::timeout(std::time::Duration::from_secs(2), sat_actor::recv(&inbox_rx))
        .await
        .expect("stale-hop PROCESSED-DATA was dropped instead of relayed")
        .expect("inbox closed unexpectedly");

    assert_eq!(received.kind(), "PROCESSED-DATA");

    stop.request_stop();
    let _ = listener_handle.await;
}

/// a ring of four, `1-2-3-4-1`: node 1 originates, node 3 (two hops away, not
/// a direct neighbour) admits and delegates, so every RESPOND and delegated
/// IMAGE-DATA between them must cross node 2 as a relay that is neither the
/// originator nor the delegate. Locks the router.rs/response_collector.rs and
/// transmitter.rs fixes for stale, multi-hop `first_hop` values together.
fn four_ring_ids_and_ips() -> ([SatId; 4], Vec<IpAddr>) {
    (
        [1, 2, 3, 4],
        vec![
            "127.0.3.1".parse().unwrap(),
            "127.0.3.2".parse().unwrap(),
            "127.0.3.3".parse().unwrap(),
            "127.0.3.4".parse().unwrap(),
        ],
    )
}

/// §7: a RESPOND a relay holds no ResponseCollector entry for must be
/// forwarded, not swallowed - node 3 admitted and answers with
/// `first_hop = 2` (the neighbour it received the forwarded REQUEST from);
/// node 2 is neither originator nor delegate and must relay it on to node 1.
#[tokio::test]
async fn respond_relays_through_non_originator_non_delegate_node_in_a_four_ring() {
    use sat_coordinator::accepted_requests::AcceptedRequests;
    use sat_coordinator::executor::StubDetector;
    use sat_coordinator::response_collector::ResponseCollector;
    use sat_coordinator::router::MessageRouter;
    use sat_coordinator::task::Task;

    let (ids, ips) = four_ring_ids_and_ips();
    let cfg = ring_config(&ids, &ips);
    let oracle = oracle_for_ring(2, ids.to_vec());

    let accepted = Arc::new(AcceptedRequests::new());
    let collector = Arc::new(ResponseCollector::new(2, [1, 3], oracle.clone(), {
        let (tx, _rx) = sat_actor::channel::<Message>(8);
        tx
    }));
    let (outbound_tx, outbound_rx) = sat_actor::channel::<Message>(8);
    let executor: Arc<dyn sat_coordinator::executor::TaskExecutor> = Arc::new(StubDetector::new(
        2,
        16,
        1.0,
        std::time::Duration::from_millis(1),
        oracle.clone(),
        outbound_tx.clone(),
    ));
    let (exec_tx, exec_rx) = sat_actor::channel::<(Task, f64)>(8);
    let router = MessageRouter::new(2, accepted, collector, executor, exec_tx, outbound_tx);
    let transmitter = Transmitter::new(2, &cfg, oracle);

    // node 1's listener: node 2 dials whichever of node 1's ports node 1 treats
    // node 2 from (node 1's own `connections[0]` names node 4, not node 2, so
    // node 2 is node 1's RIGHT-hand neighbour).
    let (inbox_tx, inbox_rx) = sat_actor::channel::<Message>(8);
    let stop = sat_actor::StopFlag::new();
    let listener_stop = stop.clone();
    let listener_handle = tokio::spawn(run_listener(LinkSide::Right, ips[0], inbox_tx, listener_stop));
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let task_id = TaskId::new(1, 0);
    router
        .dispatch(Message::Respond { task_id, source_sat: 3, first_hop: 2, last_sender: 3 }, 0.0)
        .await;

    let forwarded = tokio::time::timeout(std::time::Duration::from_secs(1), sat_actor::recv(&outbound_rx))
        .await
        .expect("router must forward, not swallow, a RESPOND it has no collector entry for")
        .expect("outbound queue closed");
    assert_eq!(forwarded.kind(), "RESPOND");
    assert!(exec_rx.try_recv().is_err());

    transmitter.transmit(forwarded).await;

    let received = tokio::time::timeout(std::time::Duration::from_secs(2), sat_actor::recv(&inbox_rx))
        .await
        .expect("RESPOND never reached node 1 - a stale first_hop must fall back to the not-last_sender rule")
        .expect("inbox closed unexpectedly");
    assert_eq!(received.kind(), "RESPOND");
    assert_eq!(received.task_id(), Some(task_id));

    stop.request_stop();
    let _ = listener_handle.await;
}

/// §4.3: a delegated IMAGE-DATA whose `first_hop` names the *originator's*
/// neighbour no longer names a neighbour once it reaches a relay two hops
/// out - node 1 sends `first_hop = 2` (its own neighbour toward delegate
/// node 3), and node 2, holding no AcceptedRequests entry, must relay it on
/// to node 3 rather than drop it as an unknown hop.
#[tokio::test]
async fn image_data_relays_through_non_originator_non_delegate_node_in_a_four_ring() {
    use sat_coordinator::accepted_requests::AcceptedRequests;
    use sat_coordinator::executor::StubDetector;
    use sat_coordinator::response_collector::ResponseCollector;
    use sat_coordinator::router::MessageRouter;
    use sat_coordinator::task::{ImageBuf, Task};

    let (ids, ips) = four_ring_ids_and_ips();
    let cfg = ring_config(&ids, &ips);
    let oracle = oracle_for_ring(2, ids.to_vec());

    let accepted = Arc::new(AcceptedRequests::new());
    let collector = Arc::new(ResponseCollector::new(2, [1, 3], oracle.clone(), {
        let (tx, _rx) = sat_actor::channel::<Message>(8);
        tx
    }));
    let (outbound_tx, outbound_rx) = sat_actor::channel::<Message>(8);
    let executor: Arc<dyn sat_coordinator::executor::TaskExecutor> = Arc::new(StubDetector::new(
        2,
        16,
        1.0,
        std::time::Duration::from_millis(1),
        oracle.clone(),
        outbound_tx.clone(),
    ));
    let (exec_tx, exec_rx) = sat_actor::channel::<(Task, f64)>(8);
    let router = MessageRouter::new(2, accepted, collector, executor, exec_tx, outbound_tx);
    let transmitter = Transmitter::new(2, &cfg, oracle);

    // node 3's listener: node 3's own `connections[0]` names node 2 back, so
    // node 2 dials node 3's LEFT port.
    let (inbox_tx, inbox_rx) = sat_actor::channel::<Message>(8);
    let stop = sat_actor::StopFlag::new();
    let listener_stop = stop.clone();
    let listener_handle = tokio::spawn(run_listener(LinkSide::Left, ips[2], inbox_tx, listener_stop));
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let img = ImageBuf { width: 1, height: 1, bytes: vec![9] };
    let task = Task::new(TaskId::new(1, 0), 0.0, 1_000_000.0, sat_common::Cartesian2::new(0.0, 0.0), "a.png", img).unwrap();
    let task_id = task.id;

    router
        .dispatch(Message::ImageData { task, first_hop: Some(2), last_sender: 1 }, 0.0)
        .await;

    assert!(exec_rx.try_recv().is_err(), "node 2 never accepted this task and must not execute it");
    let forwarded = tokio::time::timeout(std::time::Duration::from_secs(1), sat_actor::recv(&outbound_rx))
        .await
        .expect("router must forward an IMAGE-DATA it has no AcceptedRequests entry for")
        .expect("outbound queue closed");
    assert_eq!(forwarded.kind(), "IMAGE-DATA");

    transmitter.transmit(forwarded).await;

    let received = tokio::time::timeout(std::time::Duration::from_secs(2), sat_actor::recv(&inbox_rx))
        .await
        .expect("IMAGE-DATA never reached node 3 - a stale first_hop must fall back to the not-last_sender rule")
        .expect("inbox closed unexpectedly");
    assert_eq!(received.kind(), "IMAGE-DATA");
    assert_eq!(received.task_id(), Some(task_id));

    stop.request_stop();
    let _ = listener_handle.await;
}
