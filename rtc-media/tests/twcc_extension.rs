//! End-to-end coverage proving `MediaStream::send_rtp_raw` actually embeds
//! a `TransportWideCc` header extension when the local track's
//! `ExtensionMap` has one registered, and omits it entirely otherwise.
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use rtp::extension::{TransportWideCc, URI_TRANSPORT_WIDE_CC};
use rtp::header::Header as RtpHeader;

use rtc_media::config::SessionConfig;
use rtc_media::media_stream::{Dispatch, MediaStream};
use rtc_media::track::{MediaKind, MediaStreamTrack};
use rtc_media::udp_channel::UdpChannel;

async fn channel() -> Arc<UdpChannel> {
    let (channel, _rx) = UdpChannel::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, true)
        .await
        .unwrap();
    Arc::new(channel)
}

#[tokio::test]
async fn registered_twcc_extension_is_embedded_and_increments_per_send() {
    let config = SessionConfig::default();
    let (mut stream, _events) = MediaStream::new(
        0,
        MediaKind::Video,
        &config,
        channel().await,
        Dispatch::PassThrough,
        false,
    );

    let mut local_track = MediaStreamTrack::new_local(MediaKind::Video);
    local_track.header_extensions.register(5, URI_TRANSPORT_WIDE_CC);
    stream.attach_local_track(local_track);

    let (peer, mut peer_rx) = UdpChannel::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, true)
        .await
        .unwrap();
    peer.start();
    let dst = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), peer.local_port());
    stream.set_destination(dst, None);

    stream
        .send_rtp_raw(96, 1000, true, bytes::Bytes::from_static(b"a"), &[])
        .await
        .unwrap();
    stream
        .send_rtp_raw(96, 1000, true, bytes::Bytes::from_static(b"b"), &[])
        .await
        .unwrap();

    let mut sequence_numbers = Vec::new();
    for _ in 0..2 {
        let event = tokio::time::timeout(Duration::from_millis(200), peer_rx.recv())
            .await
            .unwrap()
            .unwrap();
        let bytes = match event {
            rtc_media::udp_channel::ChannelEvent::Rtp { bytes, .. } => bytes,
            other => panic!("expected Rtp event, got {other:?}"),
        };
        let (header, _) = RtpHeader::unmarshal(&bytes).unwrap();
        let payload = header.get_extension(5).expect("twcc extension present");
        sequence_numbers.push(TransportWideCc::unmarshal(&payload).unwrap().sequence_number);
    }
    assert_eq!(sequence_numbers[1], sequence_numbers[0] + 1);
}

#[tokio::test]
async fn no_registered_extension_means_no_extension_block_at_all() {
    let config = SessionConfig::default();
    let (mut stream, _events) = MediaStream::new(
        0,
        MediaKind::Video,
        &config,
        channel().await,
        Dispatch::PassThrough,
        false,
    );
    stream.attach_local_track(MediaStreamTrack::new_local(MediaKind::Video));

    let (peer, mut peer_rx) = UdpChannel::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, true)
        .await
        .unwrap();
    peer.start();
    let dst = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), peer.local_port());
    stream.set_destination(dst, None);

    stream
        .send_rtp_raw(96, 1000, true, bytes::Bytes::from_static(b"a"), &[])
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_millis(200), peer_rx.recv())
        .await
        .unwrap()
        .unwrap();
    let bytes = match event {
        rtc_media::udp_channel::ChannelEvent::Rtp { bytes, .. } => bytes,
        other => panic!("expected Rtp event, got {other:?}"),
    };
    let (header, _) = RtpHeader::unmarshal(&bytes).unwrap();
    assert!(!header.has_extension());
}
