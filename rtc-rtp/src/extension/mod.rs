//! Typed RFC 5285 header extensions.
//!
//! Each extension type below declares its negotiated URI and knows how to
//! marshal/unmarshal its own fixed-size payload; [`crate::header::Header`]
//! only deals in raw id+bytes. Ids outside `1..14` are silently skipped
//! when marshalling a one-byte-profile header (RFC 5285 §4.2 reserves id
//! 15 and the two-byte profile is required above that).
use bytes::{BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};

pub const URI_ABS_SEND_TIME: &str =
    "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time";
pub const URI_TRANSPORT_WIDE_CC: &str =
    "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";
pub const URI_AUDIO_LEVEL: &str = "urn:ietf:params:rtp-hdrext:ssrc-audio-level";
pub const URI_VIDEO_ORIENTATION: &str = "urn:3gpp:video-orientation";
pub const URI_ABS_CAPTURE_TIME: &str = "http://www.webrtc.org/experiments/rtp-hdrext/abs-capture-time";

/// Absolute send time: 24-bit fixed-point NTP fraction of a second, RFC
/// unofficial draft `abs-send-time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsSendTime {
    /// 24-bit value: 6.18 fixed point seconds since NTP epoch, wrapped.
    pub timestamp: u32,
}

impl AbsSendTime {
    pub fn from_ntp(ntp: u64) -> Self {
        // Keep the 18 fraction + 6 integer bits per the draft spec.
        AbsSendTime {
            timestamp: ((ntp >> 14) & 0x00FF_FFFF) as u32,
        }
    }

    pub fn marshal(&self) -> Bytes {
        let v = self.timestamp & 0x00FF_FFFF;
        Bytes::copy_from_slice(&v.to_be_bytes()[1..4])
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        if buf.len() != 3 {
            return Err(Error::TooShort);
        }
        Ok(AbsSendTime {
            timestamp: u32::from_be_bytes([0, buf[0], buf[1], buf[2]]),
        })
    }
}

/// Coordination of Video Orientation (CVO), one byte: camera/flip bits plus
/// a 2-bit rotation value in units of 90 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoOrientation {
    pub camera_front_facing: bool,
    pub camera_flipped: bool,
    pub rotation_degrees: u16,
}

impl VideoOrientation {
    pub fn marshal(&self) -> Bytes {
        let cw = match self.rotation_degrees % 360 {
            90 => 1u8,
            180 => 2,
            270 => 3,
            _ => 0,
        };
        let mut b = cw & 0x3;
        if self.camera_flipped {
            b |= 1 << 2;
        }
        if self.camera_front_facing {
            b |= 1 << 3;
        }
        Bytes::copy_from_slice(&[b])
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        if buf.len() != 1 {
            return Err(Error::TooShort);
        }
        let b = buf[0];
        let rotation_degrees = match b & 0x3 {
            1 => 90,
            2 => 180,
            3 => 270,
            _ => 0,
        };
        Ok(VideoOrientation {
            camera_front_facing: (b >> 3) & 1 != 0,
            camera_flipped: (b >> 2) & 1 != 0,
            rotation_degrees,
        })
    }
}

/// Client-to-mixer audio level, one byte: voice-activity bit + 7-bit level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioLevel {
    pub voice_activity: bool,
    pub level: u8,
}

impl AudioLevel {
    pub fn marshal(&self) -> Bytes {
        let mut b = self.level & 0x7F;
        if self.voice_activity {
            b |= 1 << 7;
        }
        Bytes::copy_from_slice(&[b])
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        if buf.len() != 1 {
            return Err(Error::TooShort);
        }
        Ok(AudioLevel {
            voice_activity: buf[0] & 0x80 != 0,
            level: buf[0] & 0x7F,
        })
    }
}

/// Transport-wide sequence number, incremented once per packet sent on the
/// transport (not per stream), used purely to let a remote TWCC feedback
/// report identify packets; no congestion response is implemented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportWideCc {
    pub sequence_number: u16,
}

impl TransportWideCc {
    pub fn marshal(&self) -> Bytes {
        Bytes::copy_from_slice(&self.sequence_number.to_be_bytes())
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        if buf.len() != 2 {
            return Err(Error::TooShort);
        }
        Ok(TransportWideCc {
            sequence_number: u16::from_be_bytes([buf[0], buf[1]]),
        })
    }
}

/// Absolute capture time: 64-bit NTP timestamp of when the media was
/// captured, surfaced on the remote track for synchronisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsCaptureTime {
    pub absolute_capture_timestamp: u64,
}

impl AbsCaptureTime {
    pub fn marshal(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8);
        buf.put_u64(self.absolute_capture_timestamp);
        buf.freeze()
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        if buf.len() != 8 {
            return Err(Error::TooShort);
        }
        let mut arr = [0u8; 8];
        arr.copy_from_slice(buf);
        Ok(AbsCaptureTime {
            absolute_capture_timestamp: u64::from_be_bytes(arr),
        })
    }
}

/// Negotiated id -> URI table a [`crate::header::Header`]'s extension ids
/// are resolved against, populated from SDP extmap negotiation (outside
/// this crate's scope).
#[derive(Debug, Clone, Default)]
pub struct ExtensionMap {
    by_id: std::collections::HashMap<u8, String>,
}

impl ExtensionMap {
    pub fn register(&mut self, id: u8, uri: &str) {
        self.by_id.insert(id, uri.to_string());
    }

    pub fn uri(&self, id: u8) -> Option<&str> {
        self.by_id.get(&id).map(|s| s.as_str())
    }

    pub fn id_for(&self, uri: &str) -> Option<u8> {
        self.by_id
            .iter()
            .find(|(_, v)| v.as_str() == uri)
            .map(|(k, _)| *k)
    }
}
