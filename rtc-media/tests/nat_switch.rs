//! End-to-end coverage of the NAT-aware endpoint fixup in
//! `MediaStream::on_receive_rtp_packet` / `adjust_remote_endpoint`, driven
//! through the crate's public API rather than the unit-level helpers in
//! `media_stream.rs` itself.
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use rtp::header::Header as RtpHeader;
use rtp::packet::Packet as RtpPacket;

use rtc_media::config::SessionConfig;
use rtc_media::event::StreamEventKind;
use rtc_media::media_stream::{Dispatch, MediaStream};
use rtc_media::track::{MediaKind, MediaStreamTrack, PayloadCapability};
use rtc_media::udp_channel::UdpChannel;

fn header(ssrc: u32, sequence_number: u16) -> RtpHeader {
    RtpHeader {
        version: 2,
        padding: false,
        marker: false,
        payload_type: 96,
        sequence_number,
        timestamp: 0,
        ssrc,
        csrc: Vec::new(),
        extension_profile: 0,
        extension_payload: Bytes::new(),
    }
}

fn wire_bytes(header: RtpHeader) -> Bytes {
    RtpPacket { header, payload: Bytes::from_static(b"frame") }
        .marshal()
        .unwrap()
}

async fn channel() -> Arc<UdpChannel> {
    let (channel, _rx) = UdpChannel::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, true)
        .await
        .unwrap();
    Arc::new(channel)
}

#[tokio::test]
async fn first_packet_from_a_public_address_switches_a_private_destination() {
    let config = SessionConfig::default();
    let (mut stream, mut events) = MediaStream::new(
        0,
        MediaKind::Video,
        &config,
        channel().await,
        Dispatch::PassThrough,
        false,
    );

    let mut remote_track = MediaStreamTrack::new_remote(MediaKind::Video);
    remote_track.capabilities.push(PayloadCapability {
        payload_type: 96,
        format: "H264".to_string(),
    });
    stream.attach_remote_track(remote_track);
    let private_destination: SocketAddr = "10.0.0.5:5004".parse().unwrap();
    stream.set_destination(private_destination, None);

    let public_source: SocketAddr = "203.0.113.7:40002".parse().unwrap();
    let incoming = header(777, 1);
    stream
        .on_receive_rtp_packet(incoming.clone(), 5004, public_source, wire_bytes(incoming))
        .await;

    let event = events.recv().await.expect("dispatch emits a packet event");
    assert!(matches!(event.kind, StreamEventKind::RtpPacketReceived(_)));
    assert!(stream.adjust_remote_endpoint(public_source).await);
}

#[tokio::test]
async fn a_packet_with_an_unrecognised_ssrc_from_the_old_address_is_rejected() {
    let config = SessionConfig::default();
    let (mut stream, mut events) = MediaStream::new(
        0,
        MediaKind::Video,
        &config,
        channel().await,
        Dispatch::PassThrough,
        false,
    );

    let mut remote_track = MediaStreamTrack::new_remote(MediaKind::Video);
    remote_track.capabilities.push(PayloadCapability {
        payload_type: 96,
        format: "H264".to_string(),
    });
    stream.attach_remote_track(remote_track);
    let private_destination: SocketAddr = "10.0.0.5:5004".parse().unwrap();
    stream.set_destination(private_destination, None);

    let public_source: SocketAddr = "203.0.113.7:40002".parse().unwrap();
    let first = header(777, 1);
    stream
        .on_receive_rtp_packet(first.clone(), 5004, public_source, wire_bytes(first))
        .await;
    events.recv().await.expect("first packet is accepted");

    // An impostor reusing the original private address, with an SSRC the
    // stream has not latched, must not switch the endpoint back.
    let impostor = header(999, 1);
    stream
        .on_receive_rtp_packet(impostor.clone(), 5004, private_destination, wire_bytes(impostor))
        .await;

    assert!(events.try_recv().is_err());
}
