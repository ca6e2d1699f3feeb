use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced across the RTP/RTCP/SRTP/media crates.
///
/// The data plane never panics: every packet-shaped anomaly maps to a
/// variant here, is logged, and the packet is dropped by the caller. Only
/// the control plane (track setup, send-path preconditions) propagates
/// these with `?`.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    // --- RTP header / packet framing ---
    #[error("rtp header: buffer too short")]
    TooShort,
    #[error("rtp header: unknown extension profile {0:#06x}")]
    UnknownExtensionProfile(u16),
    #[error("rtp header: csrc count {0} exceeds 15")]
    TooManyCsrc(usize),
    #[error("rtp packet: payload required")]
    EmptyPayload,

    // --- RTCP framing ---
    #[error("rtcp: wrong marshal size")]
    WrongMarshalSize,
    #[error("rtcp: invalid total lost count")]
    InvalidTotalLost,
    #[error("rtcp: invalid header")]
    InvalidHeader,
    #[error("rtcp: empty compound packet")]
    EmptyCompound,
    #[error("rtcp: first packet in compound must be SR or RR")]
    BadFirstPacket,
    #[error("rtcp: report count exceeds 31")]
    TooManyReports,
    #[error("rtcp: reason string too long")]
    ReasonTooLong,

    // --- security / SRTP ---
    #[error("srtp: protect failed")]
    ProtectFailed,
    #[error("srtp: unprotect failed")]
    UnprotectFailed,
    #[error("srtp: security context not ready")]
    ContextNotReady,

    // --- endpoint / transport ---
    #[error("udp: destination address required (wildcard rejected)")]
    DestinationAddressRequired,
    #[error("udp: channel is disconnecting")]
    Disconnecting,
    #[error("udp: empty buffer")]
    EmptyBuffer,
    #[error("udp: packet exceeds 256 KiB cap")]
    PacketTooBig,
    #[error("udp: unrecognised source endpoint")]
    UnrecognisedSource,
    #[error("udp: bind failed")]
    BindFailed,

    // --- media stream control plane ---
    #[error("media stream: closed")]
    StreamClosed,
    #[error("media stream: no local track")]
    NoLocalTrack,
    #[error("media stream: no remote track")]
    NoRemoteTrack,
    #[error("media stream: send not permitted by stream status")]
    SendNotPermitted,
    #[error("media stream: unsupported payload type {0}")]
    UnsupportedPayloadType(u8),
    #[error("media stream: unsupported video codec")]
    UnsupportedVideoCodec,

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
