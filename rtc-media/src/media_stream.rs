//! `MediaStream`: the ingress/egress pipeline shared by
//! [`crate::audio_stream`], [`crate::video_stream`], and
//! [`crate::text_stream`]. One struct owns local/remote track state and
//! codec negotiation, with explicit send/receive step lists and a
//! closure-injected `SecureContext` standing in for an owned DTLS
//! transport and interceptor chain.
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use shared::error::{Error, Result};
use shared::util::is_private_address;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use rtp::extension::{TransportWideCc, URI_TRANSPORT_WIDE_CC};
use rtp::header::{Extension, Header as RtpHeader};
use rtp::packet::Packet as RtpPacket;
use rtp::packetizer::Depacketizer;
use rtp::sequence::is_jump;
use rtcp::session::RtcpSession;
use srtp::SecureContext;

use crate::config::{RtpSecureMediaOption, SessionConfig};
use crate::event::{emit, StreamEventKind, StreamEventReceiver, StreamEventSender};
use crate::pending::{PendingPackage, PendingQueue};
use crate::reorder::ReorderBuffer;
use crate::track::{MediaKind, MediaStreamTrack, StreamStatus};
use crate::udp_channel::{SocketKind, UdpChannel};

/// Residence timeout a reorder buffer holds a gap open for before it
/// force-emits the head out of order.
pub const REORDER_DROP_TIMEOUT: Duration = Duration::from_millis(100);

/// Dispatches a successfully reordered/unprotected payload either straight
/// through (audio/text) or into a codec depacketiser (video), per the
/// collapsing what could have been an inheritance tree into one struct
/// plus a kind tag instead of a trait-object hierarchy.
pub enum Dispatch {
    PassThrough,
    Video(Box<dyn Depacketizer + Send>),
}

/// Everything about the remote side that the receive path may need to
/// mutate in place: the latched track/SSRC and the two destination
/// endpoints. Grouped behind one lock so `AdjustRemoteEndPoint` can update
/// them atomically from `&self`.
#[derive(Default)]
struct RemoteState {
    track: Option<MediaStreamTrack>,
    rtp_destination: Option<SocketAddr>,
    rtcp_destination: Option<SocketAddr>,
}

pub struct MediaStream {
    pub index: usize,
    pub kind: MediaKind,
    local_track: Option<MediaStreamTrack>,
    remote: Mutex<RemoteState>,
    status: StreamStatus,
    secure_media_option: RtpSecureMediaOption,
    accept_rtp_from_any: bool,
    negotiated_dtmf_payload_type: u8,
    channel: Arc<UdpChannel>,
    secure: Mutex<Option<SecureContext>>,
    reorder: Mutex<Option<ReorderBuffer<RtpPacket>>>,
    pending: Mutex<PendingQueue>,
    rtcp: Mutex<RtcpSession>,
    dispatch: Mutex<Dispatch>,
    closed: AtomicBool,
    twcc_counter: AtomicU32,
    events: StreamEventSender,
}

impl MediaStream {
    pub fn new(
        index: usize,
        kind: MediaKind,
        config: &SessionConfig,
        channel: Arc<UdpChannel>,
        dispatch: Dispatch,
        use_reorder_buffer: bool,
    ) -> (Self, StreamEventReceiver) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let local_ssrc = shared::util::random_u32();
        let stream = MediaStream {
            index,
            kind,
            local_track: None,
            remote: Mutex::new(RemoteState::default()),
            status: StreamStatus::SendRecv,
            secure_media_option: config.rtp_secure_media_option,
            accept_rtp_from_any: config.accept_rtp_from_any,
            negotiated_dtmf_payload_type: config.negotiated_rtp_event_payload_id,
            channel,
            secure: Mutex::new(None),
            reorder: Mutex::new(if use_reorder_buffer {
                Some(ReorderBuffer::new(REORDER_DROP_TIMEOUT))
            } else {
                None
            }),
            pending: Mutex::new(PendingQueue::new()),
            rtcp: Mutex::new(RtcpSession::new(index, local_ssrc)),
            dispatch: Mutex::new(dispatch),
            closed: AtomicBool::new(false),
            twcc_counter: AtomicU32::new(0),
            events: tx,
        };
        (stream, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn attach_local_track(&mut self, track: MediaStreamTrack) {
        self.local_track = Some(track);
    }

    pub fn attach_remote_track(&mut self, track: MediaStreamTrack) {
        self.remote.get_mut().track = Some(track);
    }

    pub fn set_status(&mut self, status: StreamStatus) {
        self.status = status;
    }

    pub fn set_destination(&mut self, rtp: SocketAddr, rtcp: Option<SocketAddr>) {
        let remote = self.remote.get_mut();
        remote.rtp_destination = Some(rtp);
        remote.rtcp_destination = rtcp.or(Some(rtp));
    }

    /// Installs the SRTP/SRTCP closures once DTLS-SRTP keying completes,
    /// then replays every packet the pending queue accumulated while the
    /// context was absent.
    pub async fn set_security_context(&self, context: SecureContext) {
        *self.secure.lock().await = Some(context);
        if self.is_closed() {
            self.pending.lock().await.clear();
            return;
        }
        let drained = self.pending.lock().await.drain();
        for pkg in drained {
            self.on_receive_rtp_packet(pkg.header, pkg.local_port, pkg.remote, pkg.raw)
                .await;
        }
    }

    /// `IsClosed = true` is terminal: further sends are rejected, the
    /// pending cache is cleared, and subscribers are notified once.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        emit(&self.events, self.index, StreamEventKind::CloseStateChanged { closed: true });
    }

    /// Assembles and sends one RTP packet for `payload`, fragmented by
    /// the caller's packetiser beforehand.
    pub async fn send_rtp_raw(
        &self,
        payload_type: u8,
        timestamp: u32,
        marker: bool,
        payload: Bytes,
        extensions: &[Extension],
    ) -> Result<usize> {
        if self.is_closed() {
            return Err(Error::StreamClosed);
        }
        if matches!(self.status, StreamStatus::RecvOnly | StreamStatus::Inactive) {
            return Err(Error::SendNotPermitted);
        }
        if self.secure_media_option != RtpSecureMediaOption::None
            && self.secure.lock().await.is_none()
        {
            return Err(Error::ContextNotReady);
        }
        let dst = self
            .remote
            .lock()
            .await
            .rtp_destination
            .ok_or(Error::NoRemoteTrack)?;
        let track = self.local_track.as_ref().ok_or(Error::NoLocalTrack)?;
        let sequence_number = track
            .next_sequence_number()
            .expect("local track always owns a sequence allocator");

        let mut header = RtpHeader {
            version: 2,
            padding: false,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc: track.ssrc,
            csrc: Vec::new(),
            extension_profile: 0,
            extension_payload: Bytes::new(),
        };
        for extension in extensions {
            header.set_extension(extension.id, extension.payload.clone());
        }
        if let Some(id) = track.header_extensions.id_for(URI_TRANSPORT_WIDE_CC) {
            let sequence_number = self.twcc_counter.fetch_add(1, Ordering::Relaxed) as u16;
            header.set_extension(id, TransportWideCc { sequence_number }.marshal());
        }

        let packet = RtpPacket { header, payload };
        let plain = packet.marshal()?;

        let secure = self.secure.lock().await;
        let sent_len = if let Some(ctx) = secure.as_ref() {
            let protected = ctx.protect_rtp(&plain)?;
            self.channel
                .send(SocketKind::Rtp, dst, &protected)
                .await?
        } else {
            self.channel.send(SocketKind::Rtp, dst, &plain).await?
        };
        drop(secure);

        self.rtcp
            .lock()
            .await
            .note_rtp_sent(packet.payload.len());
        Ok(sent_len)
    }

    /// Runs the receive pipeline: DTMF short-circuit, NAT fixup, sequence
    /// tracking, unprotect, capability check, reorder, dispatch, RTCP
    /// bookkeeping.
    pub async fn on_receive_rtp_packet(
        &self,
        header: RtpHeader,
        local_port: u16,
        remote: SocketAddr,
        raw: Bytes,
    ) {
        if self.is_closed() {
            return;
        }

        // Step 1: DTMF payload types unprotect (if needed) and emit directly,
        // bypassing reorder/depacketisation.
        if header.payload_type == self.negotiated_dtmf_payload_type {
            let plaintext = match self.unprotect(&raw).await {
                Ok(p) => p,
                Err(_) => {
                    self.cache_pending(header, local_port, remote, raw).await;
                    return;
                }
            };
            if plaintext.len() >= 16 {
                if let Ok(event) = crate::dtmf::RtpEvent::unmarshal(&plaintext[12..16]) {
                    emit(&self.events, self.index, StreamEventKind::RtpEvent(event));
                }
            }
            return;
        }

        // Step 2: NAT-aware endpoint fixup on an unknown remote SSRC.
        let needs_fixup = {
            let state = self.remote.lock().await;
            state.rtp_destination.is_some()
                && state
                    .track
                    .as_ref()
                    .map(|t| t.ssrc != header.ssrc)
                    .unwrap_or(false)
        };
        if needs_fixup && !self.adjust_remote_endpoint(remote).await {
            return;
        }

        // Step 3: sequence jump logging (debug-plane only, never fatal).
        {
            let remote = self.remote.lock().await;
            if let Some(last) = remote
                .track
                .as_ref()
                .and_then(|t| t.last_remote_sequence_number)
            {
                if is_jump(last, header.sequence_number) {
                    log::debug!(
                        "stream {}: rtp sequence jump {} -> {}",
                        self.index,
                        last,
                        header.sequence_number
                    );
                }
            }
        }

        // Step 3b: header extensions live in the cleartext part of an SRTP
        // packet, so they're decoded straight off the wire header rather
        // than waiting on unprotect. URI resolution is the subscriber's
        // job, via its own negotiated `ExtensionMap`.
        for extension in header.extensions() {
            emit(
                &self.events,
                self.index,
                StreamEventKind::HeaderExtensionReceived {
                    id: extension.id,
                    payload: extension.payload,
                },
            );
        }

        // Step 4: unprotect.
        let plaintext = match self.unprotect(&raw).await {
            Ok(p) => p,
            Err(_) => {
                self.cache_pending(header, local_port, remote, raw).await;
                return;
            }
        };

        // Step 5: payload-type capability check.
        let known = {
            let remote_state = self.remote.lock().await;
            remote_state
                .track
                .as_ref()
                .map(|t| t.has_payload_type(header.payload_type))
                .unwrap_or(true)
        };
        if !known {
            log::debug!(
                "stream {}: dropping unsupported payload type {}",
                self.index,
                header.payload_type
            );
            return;
        }

        let packet = match RtpPacket::unmarshal(&plaintext) {
            Ok(p) => p,
            Err(_) => return,
        };

        {
            let mut remote_state = self.remote.lock().await;
            if let Some(track) = remote_state.track.as_mut() {
                track.ssrc = header.ssrc;
                track.last_remote_sequence_number = Some(header.sequence_number);
            }
        }

        // Step 6: reorder (if installed), otherwise process directly.
        let mut reorder = self.reorder.lock().await;
        let ready = if let Some(buffer) = reorder.as_mut() {
            buffer.insert(header.sequence_number, packet)
        } else {
            vec![packet]
        };
        drop(reorder);

        for packet in ready {
            self.dispatch_packet(packet).await;
        }

        // Step 8: receiver-side RTCP bookkeeping.
        self.rtcp
            .lock()
            .await
            .note_rtp_received(header.sequence_number);
    }

    async fn dispatch_packet(&self, packet: RtpPacket) {
        let mut dispatch = self.dispatch.lock().await;
        match &mut *dispatch {
            Dispatch::PassThrough => {
                emit(
                    &self.events,
                    self.index,
                    StreamEventKind::RtpPacketReceived(packet),
                );
            }
            Dispatch::Video(depacketizer) => match depacketizer.depacketize(&packet.payload) {
                Ok(frame) if !frame.is_empty() => {
                    emit(
                        &self.events,
                        self.index,
                        StreamEventKind::VideoFrameReceived(frame),
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("stream {}: depacketize error: {e}", self.index);
                }
            },
        }
    }

    /// Plain-RTP streams (`RtpSecureMediaOption::None`) pass raw bytes
    /// through untouched when no context is installed. Streams expecting
    /// SRTP keying treat an absent context as not-yet-ready rather than as
    /// "nothing to do", so early media lands in the pending queue instead
    /// of being misread as plaintext.
    async fn unprotect(&self, raw: &Bytes) -> Result<Bytes> {
        let secure = self.secure.lock().await;
        match secure.as_ref() {
            Some(ctx) => ctx.unprotect_rtp(raw),
            None if self.secure_media_option == RtpSecureMediaOption::None => Ok(raw.clone()),
            None => Err(Error::ContextNotReady),
        }
    }

    async fn cache_pending(
        &self,
        header: RtpHeader,
        local_port: u16,
        remote: SocketAddr,
        raw: Bytes,
    ) {
        if self.secure.lock().await.is_some() || self.is_closed() {
            return;
        }
        self.pending.lock().await.push(PendingPackage {
            header,
            local_port,
            remote,
            raw,
        });
    }

    /// Accepts an exact address/port match outright; otherwise accepts
    /// when `accept_rtp_from_any` is set, or when the expected endpoint is
    /// private and the arriving one is public (private-NAT inference).
    pub async fn adjust_remote_endpoint(&self, from: SocketAddr) -> bool {
        let mut state = self.remote.lock().await;
        let Some(expected) = state.rtp_destination else {
            return false;
        };
        if expected == from {
            return true;
        }
        let accepted = self.accept_rtp_from_any
            || (is_private_address(expected.ip()) && !is_private_address(from.ip()));
        if accepted {
            log::info!(
                "stream {}: remote endpoint switched {expected} -> {from}",
                self.index
            );
            state.rtp_destination = Some(from);
            state.rtcp_destination = Some(from);
        } else {
            log::warn!(
                "stream {}: rejecting rtp from unrecognised source {from}",
                self.index
            );
        }
        accepted
    }

    /// Builds and sends (if a secure context is ready) the periodic
    /// sender/receiver report pair.
    pub async fn send_rtcp_report(&self) -> Result<()> {
        let secure = self.secure.lock().await;
        if secure.is_none() {
            return Err(Error::ContextNotReady);
        }
        let dst = self
            .remote
            .lock()
            .await
            .rtcp_destination
            .ok_or(Error::NoRemoteTrack)?;
        let rtcp = self.rtcp.lock().await;
        let plain = if let Some(sr) = rtcp.build_sender_report() {
            emit(&self.events, self.index, StreamEventKind::SendReport(sr.clone()));
            sr.marshal()?
        } else {
            let rr = rtcp.build_receiver_report();
            emit(
                &self.events,
                self.index,
                StreamEventKind::ReceiveReport(rr.clone()),
            );
            rr.marshal()?
        };
        drop(rtcp);

        let ctx = secure.as_ref().expect("checked above");
        let protected = match ctx.protect_rtcp(&plain) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("stream {}: rtcp protect failed: {e}", self.index);
                return Ok(());
            }
        };
        drop(secure);
        self.channel.send(SocketKind::Rtcp, dst, &protected).await?;
        Ok(())
    }

    /// Drives this stream's background upkeep until `cancel` fires: ticks
    /// the RTCP report schedule (raising `Timeout` once the no-activity
    /// deadline passes) and periodically flushes reorder-buffer entries
    /// that have aged out with no in-order predecessor ever arriving.
    /// Mirrors [`crate::dtmf::send_event`]'s shape — an `&self` loop the
    /// caller spawns, rather than one this stream spawns on its own.
    pub async fn run_housekeeping(&self, cancel: &CancellationToken) {
        let mut report_timer = RtcpSession::report_timer();
        let mut reorder_timer = tokio::time::interval(REORDER_DROP_TIMEOUT);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = report_timer.tick() => self.tick_report().await,
                _ = reorder_timer.tick() => self.tick_reorder().await,
            }
        }
    }

    async fn tick_report(&self) {
        if self.rtcp.lock().await.is_timed_out() {
            emit(&self.events, self.index, StreamEventKind::Timeout);
        }
        match self.send_rtcp_report().await {
            Ok(()) | Err(Error::ContextNotReady) | Err(Error::NoRemoteTrack) => {}
            Err(e) => log::warn!("stream {}: rtcp report failed: {e}", self.index),
        }
    }

    async fn tick_reorder(&self) {
        let mut reorder = self.reorder.lock().await;
        let ready = match reorder.as_mut() {
            Some(buffer) => buffer.poll_timeouts(),
            None => Vec::new(),
        };
        drop(reorder);
        for packet in ready {
            self.dispatch_packet(packet).await;
        }
    }
}
