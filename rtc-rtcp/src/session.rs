//! Per-stream RTCP bookkeeping: periodic sender/receiver report emission
//! and the no-activity RTP timeout. Owns no direct reference back to its
//! `MediaStream`: it only tracks the owning stream's index and lets the
//! stream itself construct and send reports, avoiding an `Arc` cycle
//! between the two.
use std::time::{Duration, Instant};

use rand::Rng;
use shared::time::SystemInstant;

use crate::receiver_report::ReceiverReport;
use crate::reception_report::ReceptionReport;
use crate::sender_report::SenderReport;

/// Default interval between scheduled SR/RR emissions.
pub const RTCP_REPORT_PERIOD: Duration = Duration::from_secs(10);
/// RTP silence duration after which a stream is considered dead.
pub const NO_RTP_TIMEOUT: Duration = Duration::from_secs(35);

/// Running counters for one local (sent) or remote (received) SSRC,
/// accumulated between successive report emissions.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamStats {
    pub packet_count: u32,
    pub octet_count: u32,
    pub highest_sequence_number: u32,
    pub last_sender_report_ntp: u64,
    pub jitter: u32,
}

impl StreamStats {
    pub fn record_sent(&mut self, payload_len: usize) {
        self.packet_count = self.packet_count.wrapping_add(1);
        self.octet_count = self.octet_count.wrapping_add(payload_len as u32);
    }

    pub fn record_received(&mut self, sequence_number: u16) {
        self.packet_count = self.packet_count.wrapping_add(1);
        self.highest_sequence_number = self.highest_sequence_number.max(sequence_number as u32);
    }
}

/// Owns the report-emission schedule and activity deadline for one stream's
/// local/remote SSRC pair. `index` is the owning `MediaStream`'s position in
/// its session, used to label emitted `StreamEvent`s rather than holding a
/// back-reference.
#[derive(Debug)]
pub struct RtcpSession {
    pub index: usize,
    pub local_ssrc: u32,
    pub remote_ssrc: Option<u32>,
    sent: StreamStats,
    received: StreamStats,
    anchor: SystemInstant,
    last_rtp_activity: Instant,
}

impl RtcpSession {
    pub fn new(index: usize, local_ssrc: u32) -> Self {
        RtcpSession {
            index,
            local_ssrc,
            remote_ssrc: None,
            sent: StreamStats::default(),
            received: StreamStats::default(),
            anchor: SystemInstant::now(),
            last_rtp_activity: Instant::now(),
        }
    }

    /// A randomised `1..=10` second offset for the first report, so many
    /// streams started at once don't all report in lockstep.
    pub fn initial_offset() -> Duration {
        Duration::from_secs(rand::rng().random_range(1..=10))
    }

    /// A `tokio::time::interval` timer for this session's report schedule,
    /// first-ticking after [`Self::initial_offset`] rather than
    /// immediately (the default `tokio::time::interval` behaviour).
    pub fn report_timer() -> tokio::time::Interval {
        let mut timer = tokio::time::interval_at(
            tokio::time::Instant::now() + Self::initial_offset(),
            RTCP_REPORT_PERIOD,
        );
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        timer
    }

    pub fn note_rtp_sent(&mut self, payload_len: usize) {
        self.sent.record_sent(payload_len);
    }

    pub fn note_rtp_received(&mut self, sequence_number: u16) {
        self.received.record_received(sequence_number);
        self.last_rtp_activity = Instant::now();
    }

    /// True once `NO_RTP_TIMEOUT` has elapsed since the last received RTP
    /// packet; the caller raises a timeout event and tears the stream down.
    pub fn is_timed_out(&self) -> bool {
        Instant::now().duration_since(self.last_rtp_activity) >= NO_RTP_TIMEOUT
    }

    /// A sender report reflecting packets sent since the last call, only
    /// meaningful once the local track has sent at least one packet.
    pub fn build_sender_report(&self) -> Option<SenderReport> {
        if self.sent.packet_count == 0 {
            return None;
        }
        Some(SenderReport {
            ssrc: self.local_ssrc,
            ntp_time: self.anchor.ntp(Instant::now()),
            rtp_time: self.sent.highest_sequence_number,
            packet_count: self.sent.packet_count,
            octet_count: self.sent.octet_count,
            reports: self.reception_report().into_iter().collect(),
            profile_extensions: bytes::Bytes::new(),
        })
    }

    pub fn build_receiver_report(&self) -> ReceiverReport {
        ReceiverReport {
            ssrc: self.local_ssrc,
            reports: self.reception_report().into_iter().collect(),
            profile_extensions: bytes::Bytes::new(),
        }
    }

    fn reception_report(&self) -> Option<ReceptionReport> {
        let remote_ssrc = self.remote_ssrc?;
        Some(ReceptionReport {
            ssrc: remote_ssrc,
            fraction_lost: 0,
            total_lost: 0,
            last_sequence_number: self.received.highest_sequence_number,
            jitter: self.received.jitter,
            last_sender_report: 0,
            delay: 0,
        })
    }
}
