//! Transmitter (§4.3): drains the outbound queue and writes framed bytes to the
//! correct neighbour, maintaining one persistent outbound `TcpStream` per link.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use sat_actor::{MpscReceiver, StopFlag};

use crate::config::ClusterConfig;
use crate::message::Message;
use crate::orbit::OrbitalOracle;
use crate::task::SatId;
use crate::wire::write_frame;

const RECONNECT_BACKOFF: Duration = Duration::from_millis(500);

struct Link {
    addr: std::net::SocketAddr,
    stream: Option<TcpStream>,
}

/// holds one lazily-connected outbound stream per neighbour, reconnecting (with
/// a short backoff) the next time a send fails rather than per-message.
pub struct Transmitter {
    self_id: SatId,
    oracle: Arc<OrbitalOracle>,
    links: AsyncMutex<HashMap<SatId, Link>>,
    /// the ground-station endpoint (§6 config): PROCESSED-DATA destined for a
    /// ground-closest node with no matching neighbour hop goes here directly
    /// (§4.7, §8 scenario 6), not onto a ring link.
    ground: AsyncMutex<Link>,
}

impl Transmitter {
    pub fn new(self_id: SatId, config: &ClusterConfig, oracle: Arc<OrbitalOracle>) -> Self {
        let mut links = HashMap::new();
        if let Some(sat) = config.satellite(self_id) {
            for &neighbor_id in &sat.connections {
                if let Some(neighbor) = config.satellite(neighbor_id) {
                    // the port we dial on `neighbor` is whichever side *we* are of
                    // *their* `connections` pair (§6: LEFT listens on 4500, RIGHT on
                    // 4600) - not a function of our own id.
                    let port = if neighbor.connections[0] == self_id {
                        crate::listener::LEFT_PORT
                    } else {
                        crate::listener::RIGHT_PORT
                    };
                    let addr = std::net::SocketAddr::new(neighbor.ip_address, port);
                    links.insert(neighbor_id, Link { addr, stream: None });
                }
            }
        }
        let ground_addr = std::net::SocketAddr::new(config.ground_station_ip, config.ground_station_port);
        Transmitter {
            self_id,
            oracle,
            links: AsyncMutex::new(links),
            ground: AsyncMutex::new(Link { addr: ground_addr, stream: None }),
        }
    }

    async fn ensure_connected(link: &mut Link, label: &str) -> bool {
        if link.stream.is_some() {
            return true;
        }
        match TcpStream::connect(link.addr).await {
            Ok(stream) => {
                link.stream = Some(stream);
                true
            }
            Err(e) => {
                warn!(%label, error = %e, "failed to connect outbound link, will retry on next send");
                false
            }
        }
    }

    async fn send_to(&self, neighbor: SatId, msg: &Message) -> bool {
        let mut links = self.links.lock().await;
        let Some(link) = links.get_mut(&neighbor) else {
            return false;
        };
        if !Self::ensure_connected(link, &neighbor.to_string()).await {
            drop(links);
            tokio::time::sleep(RECONNECT_BACKOFF).await;
            return false;
        }
        let stream = link.stream.as_mut().expect("just ensured connected");
        match write_frame(stream, msg).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%neighbor, error = %e, "write failed, dropping outbound stream for reconnect");
                link.stream = None;
                false
            }
        }
    }

    async fn send_to_ground(&self, msg: &Message) -> bool {
        let mut link = self.ground.lock().await;
        if !Self::ensure_connected(&mut link, "ground-station").await {
            drop(link);
            tokio::time::sleep(RECONNECT_BACKOFF).await;
            return false;
        }
        let stream = link.stream.as_mut().expect("just ensured connected");
        match write_frame(stream, msg).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "write to ground station failed, dropping outbound stream for reconnect");
                link.stream = None;
                false
            }
        }
    }

    fn neighbors(&self) -> Vec<SatId> {
        let ring = self.oracle.ring();
        let n = ring.len();
        let pos = ring.iter().position(|&x| x == self.self_id).expect("self id must be a ring member");
        vec![ring[(pos + n - 1) % n], ring[(pos + 1) % n]]
    }

    /// the ground-ward next hop among the current neighbours, or `None` if self
    /// is the ground-closest satellite (PROCESSED-DATA then goes straight to the
    /// ground-station endpoint, §4.7, §8 scenario 6).
    fn ground_ward_neighbor(&self, neighbors: &[SatId]) -> Option<SatId> {
        for entry in &self.oracle.priority_list() {
            match entry {
                crate::orbit::PriorityEntry::Ground => return None,
                crate::orbit::PriorityEntry::Sat(id) if neighbors.contains(id) => return Some(*id),
                crate::orbit::PriorityEntry::Sat(_) => continue,
            }
        }
        None
    }

    /// sends one message, picking the neighbour per §4.3: an explicit `first_hop`
    /// wins if it names a *current* neighbour; otherwise REQUEST broadcasts,
    /// RESPOND/RESPONSE-NACK/IMAGE-DATA go to "not last_sender" (forward, never
    /// back-send), and PROCESSED-DATA goes to whichever neighbour is earlier in
    /// the priority list, or straight to the ground-station endpoint if self is
    /// already ground-closest.
    ///
    /// `first_hop` is set once by whichever node produced the message - the
    /// admitter for RESPOND (to *its* REQUEST's `last_sender`), the
    /// ResponseCollector for a delegated IMAGE-DATA (to the delegate's
    /// `last_sender`), the TaskExecutor for PROCESSED-DATA (§4.7) - and names a
    /// neighbour of *that* node, not necessarily of whichever node is relaying it
    /// now. Declined REQUESTs are forwarded around the ring (§4.6), so a RESPOND
    /// or a delegated IMAGE-DATA can cross several relays before reaching its
    /// addressee; at every relay past the first hop the stored `first_hop` no
    /// longer names a current neighbour. Such a stale value is treated the same
    /// as "absent" for every variant (not only PROCESSED-DATA) and falls through
    /// to the "not last_sender" forward below, so relaying steps the message one
    /// hop closer to its destination instead of dropping it.
    pub async fn transmit(&self, mut msg: Message) {
        let arrived_from = msg.last_sender();
        msg.set_last_sender(self.self_id);

        let neighbors = self.neighbors();
        let is_processed_data = matches!(msg, Message::ProcessedData { .. });
        let explicit_hop = msg.first_hop().filter(|hop| neighbors.contains(hop));

        if let Some(hop) = explicit_hop {
            if !self.send_to(hop, &msg).await {
                warn!(hop, kind = msg.kind(), "failed to transmit message to neighbour");
            }
            return;
        }

        if is_processed_data {
            match self.ground_ward_neighbor(&neighbors) {
                Some(hop) => {
                    if !self.send_to(hop, &msg).await {
                        warn!(hop, "failed to transmit processed-data to neighbour");
                    }
                }
                None => {
                    if !self.send_to_ground(&msg).await {
                        warn!("failed to transmit processed-data to ground station");
                    }
                }
            }
            return;
        }

        let targets: Vec<SatId> = match &msg {
            Message::Request { .. } => neighbors.clone(),
            _ => neighbors.iter().copied().filter(|&n| n != arrived_from).collect(),
        };
        for target in targets {
            if !self.send_to(target, &msg).await {
                warn!(target, kind = msg.kind(), "failed to transmit message to neighbour");
            }
        }
    }
}

/// drains the outbound queue in FIFO order, one message at a time (§4.3).
pub async fn run_transmitter(transmitter: Arc<Transmitter>, mut outbound: MpscReceiver<Message>, stop: StopFlag) {
    loop {
        tokio::select! {
            _ = stop.wait_for_stop() => {
                info!("transmitter stopping");
                return;
            }
            msg = sat_actor::recv(&outbound) => {
                match msg {
                    Some(msg) => transmitter.transmit(msg).await,
                    None => return,
                }
            }
        }
    }
}
