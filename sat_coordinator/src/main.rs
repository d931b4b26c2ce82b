//! binary entry point (§10): parses the CLI, loads and validates the cluster
//! config, boots logging, constructs the shared state, and spawns every
//! worker named in §5 as a tokio task, then waits for shutdown.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::task::JoinHandle;
use tracing::{error, info};

use sat_actor::{channel, StopFlag};
use sat_coordinator::accepted_requests::{run_sweep, AcceptedRequests};
use sat_coordinator::cli::Cli;
use sat_coordinator::config;
use sat_coordinator::executor::{run_executor, StubDetector, TaskExecutor};
use sat_coordinator::listener::{run_listener, run_udp_companion, LinkSide};
use sat_coordinator::logging;
use sat_coordinator::message::Message;
use sat_coordinator::orbit::{self, OrbitalOracle};
use sat_coordinator::response_collector::{run_tick as run_collector_tick, ResponseCollector};
use sat_coordinator::router::{run_router, MessageRouter};
use sat_coordinator::task::{SatId, Task};
use sat_coordinator::transmitter::{run_transmitter, Transmitter};

const ORBITAL_TICK_PERIOD: Duration = Duration::from_secs(5);
const RESPONSE_COLLECTOR_TICK_PERIOD: Duration = Duration::from_millis(100);
const ACCEPTED_REQUESTS_SWEEP_PERIOD: Duration = Duration::from_secs(1);
const MAX_ACCEPTED_QUEUE: usize = 16;
const MIN_LEAD_TIME_SECS: f64 = 2.0;
const STUB_PROCESSING_DELAY: Duration = Duration::from_millis(50);
const CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref());

    let cfg = config::load(&cli.config)?;
    let self_id: SatId = cli.satellite_id.unwrap_or(cfg.self_id);
    cfg.validate(self_id)?;

    let sat = cfg
        .satellite(self_id)
        .ok_or_else(|| anyhow::anyhow!("self id {self_id} not present in satellites list"))?;
    let neighbors: [SatId; 2] = sat.connections;

    let oracle = Arc::new(OrbitalOracle::new(self_id, cfg.ring(), cfg.altitude, &cfg.initial_angles()));

    let (inbox_tx, inbox_rx) = channel::<Message>(CHANNEL_CAPACITY);
    let (outbound_tx, outbound_rx) = channel::<Message>(CHANNEL_CAPACITY);
    let (exec_tx, exec_rx) = channel::<(Task, f64)>(CHANNEL_CAPACITY);

    let accepted = Arc::new(AcceptedRequests::new());
    let collector = Arc::new(ResponseCollector::new(self_id, neighbors, oracle.clone(), outbound_tx.clone()));
    let executor: Arc<dyn TaskExecutor> = Arc::new(StubDetector::new(
        self_id,
        MAX_ACCEPTED_QUEUE,
        MIN_LEAD_TIME_SECS,
        STUB_PROCESSING_DELAY,
        oracle.clone(),
        outbound_tx.clone(),
    ));
    let router = Arc::new(MessageRouter::new(
        self_id,
        accepted.clone(),
        collector.clone(),
        executor.clone(),
        exec_tx,
        outbound_tx,
    ));
    let transmitter = Arc::new(Transmitter::new(self_id, &cfg, oracle.clone()));

    let stop = StopFlag::new();
    // listeners and the UDP companion bind on all interfaces; which neighbour
    // dials in on a given link is determined by the port alone (§6).
    let bind_ip: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    {
        let inbox_tx = inbox_tx.clone();
        let stop = stop.clone();
        handles.push(sat_actor::spawn("listener-left", async move {
            if let Err(e) = run_listener(LinkSide::Left, bind_ip, inbox_tx, stop).await {
                error!(error = %e, "left link listener exited with error");
            }
        })?);
    }
    {
        let inbox_tx = inbox_tx.clone();
        let stop = stop.clone();
        handles.push(sat_actor::spawn("listener-right", async move {
            if let Err(e) = run_listener(LinkSide::Right, bind_ip, inbox_tx, stop).await {
                error!(error = %e, "right link listener exited with error");
            }
        })?);
    }
    handles.push(sat_actor::spawn(
        "transmitter",
        run_transmitter(transmitter, outbound_rx, stop.clone()),
    )?);
    handles.push(sat_actor::spawn(
        "orbital-tick",
        orbit::run_tick(oracle, stop.clone(), ORBITAL_TICK_PERIOD),
    )?);
    handles.push(sat_actor::spawn(
        "accepted-requests-sweep",
        run_sweep(accepted, stop.clone(), ACCEPTED_REQUESTS_SWEEP_PERIOD),
    )?);
    handles.push(sat_actor::spawn(
        "response-collector-tick",
        run_collector_tick(collector, stop.clone(), RESPONSE_COLLECTOR_TICK_PERIOD),
    )?);
    handles.push(sat_actor::spawn("task-executor", run_executor(executor, exec_rx, stop.clone()))?);
    handles.push(sat_actor::spawn(
        "message-router",
        run_router(router, inbox_rx, stop.clone(), sat_common::datetime::unix_now),
    )?);

    if cfg.enable_legacy_udp {
        let stop = stop.clone();
        handles.push(sat_actor::spawn("legacy-udp-companion", async move {
            if let Err(e) = run_udp_companion(bind_ip, stop).await {
                error!(error = %e, "legacy UDP companion exited with error");
            }
        })?);
    }

    info!(self_id, "satellite coordination core started");

    tokio::signal::ctrl_c().await?;
    info!("ctrl-c received, shutting down");

    stop.request_stop();
    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
