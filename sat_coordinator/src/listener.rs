//! Link Listener (§4.2): one instance per neighbour link, bound to a fixed port
//! per side. Accepts framed inbound messages and deposits decoded ones into the
//! shared inbox; malformed frames are dropped, never interpreted.

use std::net::{IpAddr, SocketAddr};

use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tracing::{debug, info, warn};

use sat_actor::{MpscSender, StopFlag};

use crate::errors::CoordinatorError;
use crate::message::Message;
use crate::wire::read_frame;

/// LEFT neighbour listens on 4500 (§6).
pub const LEFT_PORT: u16 = 4500;
/// RIGHT neighbour listens on 4600 (§6).
pub const RIGHT_PORT: u16 = 4600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSide {
    Left,
    Right,
}

impl LinkSide {
    pub fn port(self) -> u16 {
        match self {
            LinkSide::Left => LEFT_PORT,
            LinkSide::Right => RIGHT_PORT,
        }
    }
}

/// binds `side`'s port once, then loops accept → per-connection read, handing
/// each decoded message to `inbox`. A dropped stream (EOF or read error) is
/// logged and the listener goes back to `accept()` for a fresh connection from
/// the same neighbour rather than tearing down the worker (§4.2 reconnection).
pub async fn run_listener(
    side: LinkSide,
    bind_ip: IpAddr,
    inbox: MpscSender<Message>,
    stop: StopFlag,
) -> std::io::Result<()> {
    let bind_addr = SocketAddr::new(bind_ip, side.port());
    let listener = TcpListener::bind(bind_addr).await?;
    info!(?side, %bind_addr, "link listener bound");

    loop {
        tokio::select! {
            _ = stop.wait_for_stop() => {
                info!(?side, "link listener stopping");
                return Ok(());
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(?side, %peer, "accepted inbound link connection");
                        let inbox = inbox.clone();
                        let stop = stop.clone();
                        tokio::spawn(handle_connection(side, stream, inbox, stop));
                    }
                    Err(e) => {
                        warn!(?side, error = %e, "accept failed, continuing to listen");
                    }
                }
            }
        }
    }
}

/// reads frames off one accepted connection until EOF, an unrecoverable
/// framing error, or shutdown. A deserialisation failure drops only that frame
/// and keeps the connection open (§7: "keep connection open if possible")
/// since the length-prefixed body was still consumed in full; a truncated or
/// zero-length frame leaves the stream position untrustworthy and ends the
/// connection instead.
async fn handle_connection(side: LinkSide, mut stream: TcpStream, inbox: MpscSender<Message>, stop: StopFlag) {
    loop {
        if stop.is_stopped() {
            return;
        }
        match read_frame(&mut stream).await {
            Ok(Some(msg)) => {
                if sat_actor::send(&inbox, msg).await.is_err() {
                    warn!(?side, "inbox closed, dropping inbound connection");
                    return;
                }
            }
            Ok(None) => {
                debug!(?side, "inbound link connection closed (EOF)");
                return;
            }
            Err(CoordinatorError::DecodeError(e)) => {
                warn!(?side, error = %e, "malformed message payload, dropping frame and continuing");
            }
            Err(e) => {
                warn!(?side, error = %e, "framing error, dropping connection");
                return;
            }
        }
    }
}

/// legacy datagram companion on the LEFT port (§6): accepted for bootstrap/test
/// traffic but never fed into the inbox; logs what it receives and nothing more.
/// Only runs when the config opts in (`enable_legacy_udp`).
pub async fn run_udp_companion(bind_ip: IpAddr, stop: StopFlag) -> std::io::Result<()> {
    let bind_addr = SocketAddr::new(bind_ip, LEFT_PORT);
    let socket = UdpSocket::bind(bind_addr).await?;
    info!(%bind_addr, "legacy UDP companion bound (production should disable this)");
    let mut buf = [0u8; 4096];
    loop {
        tokio::select! {
            _ = stop.wait_for_stop() => {
                info!("legacy UDP companion stopping");
                return Ok(());
            }
            received = socket.recv_from(&mut buf) => {
                match received {
                    Ok((n, peer)) => {
                        debug!(%peer, bytes = n, "legacy UDP datagram received and discarded");
                    }
                    Err(e) => {
                        warn!(error = %e, "legacy UDP companion recv failed");
                    }
                }
            }
        }
    }
}
