//! `MediaStreamTrack`, grounded on `webrtc-rs-webrtc`'s
//! `rtp_transceiver::rtp_receiver`/`rtp_sender` internals (SSRC, capability
//! list, coding parameters) but collapsed from that crate's multi-SSRC,
//! multi-coding model down to this engine's one local/remote track per
//! stream.
use std::collections::HashMap;

use rtp::extension::ExtensionMap;
use rtp::sequence::SequenceNumber;
use shared::util::{random_u16, random_u32};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackDirection {
    Local,
    Remote,
}

/// Direction the stream is permitted to move media in, independent of
/// which of local/remote tracks are actually attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadCapability {
    pub payload_type: u8,
    pub format: String,
}

/// RFC 2833/4733 telephone-event capability, appended to a local audio
/// track's capability list unless the caller opts out.
pub fn telephone_event_capability(payload_type: u8) -> PayloadCapability {
    PayloadCapability {
        payload_type,
        format: "telephone-event".to_string(),
    }
}

#[derive(Debug)]
pub struct MediaStreamTrack {
    pub direction: TrackDirection,
    pub kind: MediaKind,
    pub ssrc: u32,
    pub timestamp: u32,
    pub capabilities: Vec<PayloadCapability>,
    pub status: StreamStatus,
    pub ssrc_attributes: HashMap<String, u32>,
    pub last_remote_sequence_number: Option<u16>,
    pub max_bandwidth: Option<u32>,
    pub header_extensions: ExtensionMap,
    sequence: Option<SequenceNumber>,
}

impl MediaStreamTrack {
    /// A local track with a random SSRC and initial sequence number (RFC
    /// 3550 §5.1 recommends both be unpredictable).
    pub fn new_local(kind: MediaKind) -> Self {
        let mut track = MediaStreamTrack {
            direction: TrackDirection::Local,
            kind,
            ssrc: random_u32(),
            timestamp: random_u32(),
            capabilities: Vec::new(),
            status: StreamStatus::SendRecv,
            ssrc_attributes: HashMap::new(),
            last_remote_sequence_number: None,
            max_bandwidth: None,
            header_extensions: ExtensionMap::default(),
            sequence: Some(SequenceNumber::new(random_u16())),
        };
        if kind == MediaKind::Audio {
            track.enable_telephone_event(crate::config::DEFAULT_RTP_EVENT_PAYLOAD_ID);
        }
        track
    }

    pub fn new_remote(kind: MediaKind) -> Self {
        MediaStreamTrack {
            direction: TrackDirection::Remote,
            kind,
            ssrc: 0,
            timestamp: 0,
            capabilities: Vec::new(),
            status: StreamStatus::SendRecv,
            ssrc_attributes: HashMap::new(),
            last_remote_sequence_number: None,
            max_bandwidth: None,
            header_extensions: ExtensionMap::default(),
            sequence: None,
        }
    }

    /// Appends a telephone-event capability unless one is already present.
    /// No-op on non-audio tracks.
    pub fn enable_telephone_event(&mut self, payload_type: u8) {
        if self.kind != MediaKind::Audio {
            return;
        }
        let already_present = self
            .capabilities
            .iter()
            .any(|c| c.format == "telephone-event");
        if !already_present {
            self.capabilities.push(telephone_event_capability(payload_type));
        }
    }

    pub fn has_payload_type(&self, payload_type: u8) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.payload_type == payload_type)
    }

    /// Allocates the next RTP sequence number for a local track; `None` on
    /// a remote track (which has no send sequence of its own).
    pub fn next_sequence_number(&self) -> Option<u16> {
        self.sequence.as_ref().map(|s| s.next())
    }
}
