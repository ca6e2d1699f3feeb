//! The RTP (and optional control) socket pair a session's media streams
//! multiplex over. Binding follows the dual-stack/`socket2` idiom used
//! throughout this workspace's ICE/STUN socket handling; RFC 7983
//! byte-range classification is re-expressed here against
//! `shared::util`'s classifier functions.
use std::io;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use shared::error::{Error, Result};
use shared::util::{is_stun, is_turn_data_indication, parse_turn_data_indication};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Notify};

/// Datagrams larger than this are dropped rather than handed upstream.
pub const PACKET_SIZE_CAP: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Rtp,
    Rtcp,
}

/// One classified inbound datagram, already stripped of any TURN Data
/// Indication framing.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Rtp {
        bytes: Bytes,
        from: SocketAddr,
        local_port: u16,
    },
    Rtcp {
        bytes: Bytes,
        from: SocketAddr,
    },
    Stun {
        bytes: Bytes,
        from: SocketAddr,
    },
}

const STATE_CREATED: u8 = 0;
const STATE_STARTED: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// Owns the bound RTP socket and, unless RTCP is multiplexed onto it, a
/// second control socket. `Created -> Started -> Closed` is terminal;
/// `Close` is idempotent.
pub struct UdpChannel {
    rtp_socket: Arc<UdpSocket>,
    rtcp_socket: Option<Arc<UdpSocket>>,
    state: AtomicU8,
    rtp_receiving: Arc<AtomicBool>,
    rtcp_receiving: Arc<AtomicBool>,
    closed_notify: Arc<Notify>,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl UdpChannel {
    /// Binds the RTP socket (and, unless multiplexed, an RTCP socket) to
    /// `bind_address`/`bind_port`, returning the channel plus the receive
    /// end of its event stream.
    pub async fn bind(
        bind_address: IpAddr,
        bind_port: u16,
        rtcp_multiplexed: bool,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ChannelEvent>)> {
        let rtp_socket = Arc::new(
            UdpSocket::bind(SocketAddr::new(bind_address, bind_port))
                .await
                .map_err(|_| Error::BindFailed)?,
        );
        let rtcp_socket = if rtcp_multiplexed {
            None
        } else {
            let local = rtp_socket.local_addr().map_err(|_| Error::BindFailed)?;
            Some(Arc::new(
                UdpSocket::bind(SocketAddr::new(bind_address, local.port() + 1))
                    .await
                    .map_err(|_| Error::BindFailed)?,
            ))
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = UdpChannel {
            rtp_socket,
            rtcp_socket,
            state: AtomicU8::new(STATE_CREATED),
            rtp_receiving: Arc::new(AtomicBool::new(false)),
            rtcp_receiving: Arc::new(AtomicBool::new(false)),
            closed_notify: Arc::new(Notify::new()),
            events: tx,
        };
        Ok((channel, rx))
    }

    pub fn local_port(&self) -> u16 {
        self.rtp_socket
            .local_addr()
            .map(|a| a.port())
            .unwrap_or_default()
    }

    fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_CLOSED
    }

    /// Spawns the receive loops if not already running; reentrant and a
    /// no-op once `Closed`.
    pub fn start(&self) {
        if self.is_closed() {
            return;
        }
        self.state
            .compare_exchange(
                STATE_CREATED,
                STATE_STARTED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok();
        self.ensure_receiving();
    }

    /// Re-arms a receive loop that isn't currently running, as long as the
    /// channel itself isn't closed. Called both by `start` and lazily by
    /// `send`, so sending on an idle channel re-arms its receiver.
    fn ensure_receiving(&self) {
        if self.is_closed() {
            return;
        }
        if self
            .rtp_receiving
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            spawn_receive_loop(
                self.rtp_socket.clone(),
                SocketKind::Rtp,
                self.events.clone(),
                self.closed_notify.clone(),
                self.rtp_receiving.clone(),
            );
        }
        if let Some(rtcp_socket) = &self.rtcp_socket {
            if self
                .rtcp_receiving
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                spawn_receive_loop(
                    rtcp_socket.clone(),
                    SocketKind::Rtcp,
                    self.events.clone(),
                    self.closed_notify.clone(),
                    self.rtcp_receiving.clone(),
                );
            }
        }
    }

    /// Sends `bytes` to `dst` over the RTP or control socket per `kind`.
    /// Refuses a closed channel, an empty buffer, or a wildcard
    /// destination; maps an IPv4 destination onto a dual-stack IPv6
    /// socket's mapped-address form.
    pub async fn send(&self, kind: SocketKind, dst: SocketAddr, bytes: &[u8]) -> Result<usize> {
        if self.is_closed() {
            return Err(Error::Disconnecting);
        }
        if bytes.is_empty() {
            return Err(Error::EmptyBuffer);
        }
        if dst.ip().is_unspecified() {
            return Err(Error::DestinationAddressRequired);
        }
        self.ensure_receiving();

        let socket = match kind {
            SocketKind::Rtp => &self.rtp_socket,
            SocketKind::Rtcp => self.rtcp_socket.as_ref().unwrap_or(&self.rtp_socket),
        };
        let dst = map_destination(socket.local_addr().ok(), dst);
        socket.send_to(bytes, dst).await.map_err(Error::from)
    }

    /// Idempotent: the second and subsequent calls are no-ops.
    pub fn close(&self) {
        if self
            .state
            .swap(STATE_CLOSED, Ordering::AcqRel)
            == STATE_CLOSED
        {
            return;
        }
        self.closed_notify.notify_waiters();
    }
}

/// If the local socket is bound to an IPv6 dual-stack address and `dst` is
/// IPv4, rewrite `dst` to its IPv4-mapped IPv6 form so `send_to` succeeds
/// on the v6 socket.
fn map_destination(local: Option<SocketAddr>, dst: SocketAddr) -> SocketAddr {
    match (local, dst) {
        (Some(SocketAddr::V6(_)), SocketAddr::V4(v4)) => {
            let mapped: Ipv6Addr = v4.ip().to_ipv6_mapped();
            SocketAddr::new(IpAddr::V6(mapped), dst.port())
        }
        _ => dst,
    }
}

fn spawn_receive_loop(
    socket: Arc<UdpSocket>,
    kind: SocketKind,
    events: mpsc::UnboundedSender<ChannelEvent>,
    closed_notify: Arc<Notify>,
    running: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        let mut buf = vec![0u8; PACKET_SIZE_CAP + 1];
        loop {
            tokio::select! {
                _ = closed_notify.notified() => break,
                res = socket.recv_from(&mut buf) => {
                    match res {
                        Ok((n, from)) => {
                            if n > PACKET_SIZE_CAP {
                                log::error!("dropping {n}-byte datagram exceeding the 256 KiB cap");
                                continue;
                            }
                            let data = &buf[..n];
                            let event = classify(kind, data, from, socket.local_addr().map(|a| a.port()).unwrap_or_default());
                            if events.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) if matches!(e.kind(), io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused) => {
                            continue;
                        }
                        Err(e) => {
                            log::error!("udp receive error: {e}");
                            continue;
                        }
                    }
                }
            }
        }
        running.store(false, Ordering::Release);
    });
}

fn classify(kind: SocketKind, data: &[u8], from: SocketAddr, local_port: u16) -> ChannelEvent {
    if is_turn_data_indication(data) {
        return match parse_turn_data_indication(data) {
            Some((peer, relayed)) => as_media_event(kind, &relayed, peer, local_port),
            None => {
                log::debug!("dropping malformed turn data indication from {from}");
                ChannelEvent::Stun {
                    bytes: Bytes::copy_from_slice(data),
                    from,
                }
            }
        };
    }
    if is_stun(data) {
        return ChannelEvent::Stun {
            bytes: Bytes::copy_from_slice(data),
            from,
        };
    }
    as_media_event(kind, data, from, local_port)
}

/// Builds the RTP/RTCP event `kind`'s socket would normally classify,
/// with `from` overridable so a TURN-relayed payload is attributed to the
/// peer address carried in its `XOR-PEER-ADDRESS` attribute rather than
/// the relay's own address.
fn as_media_event(kind: SocketKind, data: &[u8], from: SocketAddr, local_port: u16) -> ChannelEvent {
    match kind {
        SocketKind::Rtp => ChannelEvent::Rtp {
            bytes: Bytes::copy_from_slice(data),
            from,
            local_port,
        },
        SocketKind::Rtcp => ChannelEvent::Rtcp {
            bytes: Bytes::copy_from_slice(data),
            from,
        },
    }
}
