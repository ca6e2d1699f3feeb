//! End-to-end coverage of the pending-package queue that bridges DTLS/SRTP
//! keying against early media arrival, driven through `MediaStream`'s
//! public API.
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use rtp::header::Header as RtpHeader;
use rtp::packet::Packet as RtpPacket;

use rtc_media::config::{RtpSecureMediaOption, SessionConfig};
use rtc_media::event::StreamEventKind;
use rtc_media::media_stream::{Dispatch, MediaStream};
use rtc_media::track::{MediaKind, MediaStreamTrack, PayloadCapability};
use rtc_media::udp_channel::UdpChannel;
use srtp::SecureContext;

fn header(sequence_number: u16) -> RtpHeader {
    RtpHeader {
        version: 2,
        padding: false,
        marker: false,
        payload_type: 8,
        sequence_number,
        timestamp: 0,
        ssrc: 42,
        csrc: Vec::new(),
        extension_profile: 0,
        extension_payload: Bytes::new(),
    }
}

fn wire_bytes(header: RtpHeader) -> Bytes {
    RtpPacket { header, payload: Bytes::from_static(b"g711") }
        .marshal()
        .unwrap()
}

fn identity_context() -> SecureContext {
    let pass = Arc::new(|b: &[u8]| Ok(Bytes::copy_from_slice(b)));
    SecureContext::new(pass.clone(), pass.clone(), pass.clone(), pass)
}

#[tokio::test]
async fn packets_queued_before_keying_replay_in_arrival_order_once_context_installs() {
    let mut config = SessionConfig::default();
    config.rtp_secure_media_option = RtpSecureMediaOption::DtlsSrtp;
    let (channel, _rx) = UdpChannel::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, true)
        .await
        .unwrap();
    let (mut stream, mut events) = MediaStream::new(
        0,
        MediaKind::Audio,
        &config,
        Arc::new(channel),
        Dispatch::PassThrough,
        false,
    );

    let mut remote_track = MediaStreamTrack::new_remote(MediaKind::Audio);
    remote_track.capabilities.push(PayloadCapability {
        payload_type: 8,
        format: "PCMA".to_string(),
    });
    stream.attach_remote_track(remote_track);
    let source: SocketAddr = "192.0.2.10:4000".parse().unwrap();

    for sequence_number in 0..5u16 {
        let h = header(sequence_number);
        stream
            .on_receive_rtp_packet(h.clone(), 4000, source, wire_bytes(h))
            .await;
    }
    // No security context yet: every packet above should have landed in
    // the pending queue rather than producing a received-packet event.
    assert!(events.try_recv().is_err());

    stream.set_security_context(identity_context()).await;

    let mut received = Vec::new();
    for _ in 0..5 {
        let event = events.recv().await.expect("all 5 packets replay");
        match event.kind {
            StreamEventKind::RtpPacketReceived(packet) => {
                received.push(packet.header.sequence_number)
            }
            other => panic!("expected RtpPacketReceived, got {other:?}"),
        }
    }
    assert_eq!(received, vec![0, 1, 2, 3, 4]);
}
