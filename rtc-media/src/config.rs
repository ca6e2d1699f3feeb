//! Session-wide configuration a [`crate::media_stream::MediaStream`] is
//! built from. Construction only: no file or environment parsing lives
//! here, matching `ice::agent::agent_config::AgentConfig`'s role as a
//! plain argument-collecting struct.
use std::net::{IpAddr, Ipv4Addr};

/// How SRTP keying is expected to reach a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RtpSecureMediaOption {
    #[default]
    None,
    DtlsSrtp,
    SdpCryptoNegotiation,
}

/// Default reassembled-video-frame cap before a frame is dropped rather
/// than grown without bound.
pub const DEFAULT_MAX_RECONSTRUCTED_VIDEO_FRAME_SIZE: usize = 1_048_576;
/// Default dynamic payload type negotiated for RFC 2833/4733 telephone
/// events.
pub const DEFAULT_RTP_EVENT_PAYLOAD_ID: u8 = 101;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Audio and video share one RTP socket when true.
    pub is_media_multiplexed: bool,
    /// RTCP shares the RTP socket (RFC 5761) when true.
    pub is_rtcp_multiplexed: bool,
    pub rtp_secure_media_option: RtpSecureMediaOption,
    pub bind_address: IpAddr,
    pub bind_port: u16,
    /// Inclusive port range a stream may bind an RTP/RTCP pair within,
    /// when `bind_port` is `0` (OS-assigned).
    pub rtp_port_range: Option<(u16, u16)>,
    /// Disables the private-NAT source filter in `AdjustRemoteEndPoint`.
    pub accept_rtp_from_any: bool,
    pub max_reconstructed_video_frame_size: usize,
    pub negotiated_rtp_event_payload_id: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            is_media_multiplexed: false,
            is_rtcp_multiplexed: true,
            rtp_secure_media_option: RtpSecureMediaOption::default(),
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            bind_port: 0,
            rtp_port_range: None,
            accept_rtp_from_any: false,
            max_reconstructed_video_frame_size: DEFAULT_MAX_RECONSTRUCTED_VIDEO_FRAME_SIZE,
            negotiated_rtp_event_payload_id: DEFAULT_RTP_EVENT_PAYLOAD_ID,
        }
    }
}
