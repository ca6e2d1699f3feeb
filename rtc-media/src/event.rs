//! Consumer-facing notifications, one `mpsc::UnboundedSender` per stream
//! rather than a multicast delegate set. A full or
//! dropped receiver must never block the receive loop; sends are always
//! best-effort (`.ok()`).
use bytes::Bytes;

use rtcp::receiver_report::ReceiverReport;
use rtcp::sender_report::SenderReport;
use rtp::Packet;

use crate::dtmf::RtpEvent;

#[derive(Debug, Clone)]
pub enum StreamEventKind {
    Timeout,
    SendReport(SenderReport),
    ReceiveReport(ReceiverReport),
    RtpPacketReceived(Packet),
    RtpEvent(RtpEvent),
    HeaderExtensionReceived { id: u8, payload: Bytes },
    CloseStateChanged { closed: bool },
    AudioFormatsNegotiated(Vec<u8>),
    VideoFormatsNegotiated(Vec<u8>),
    VideoFrameReceived(Bytes),
    TextFormatsNegotiated(Vec<u8>),
}

/// One notification from a `MediaStream`, tagged with the stream's
/// `index` within its owning session so a subscriber multiplexing many
/// streams over one channel can tell them apart.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub index: usize,
    pub kind: StreamEventKind,
}

pub type StreamEventSender = tokio::sync::mpsc::UnboundedSender<StreamEvent>;
pub type StreamEventReceiver = tokio::sync::mpsc::UnboundedReceiver<StreamEvent>;

/// Sends `kind` on `sender`, discarding the error when nobody (or no
/// longer anybody) is listening.
pub fn emit(sender: &StreamEventSender, index: usize, kind: StreamEventKind) {
    let _ = sender.send(StreamEvent { index, kind });
}
