//! End-to-end coverage of `MediaStream::run_housekeeping`: the RTCP report
//! timer raising a `Timeout` event after prolonged silence, and a reorder
//! buffer entry ageing out with no in-order predecessor ever arriving.
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rtp::header::Header as RtpHeader;
use rtp::packet::Packet as RtpPacket;
use tokio_util::sync::CancellationToken;

use rtc_media::config::SessionConfig;
use rtc_media::event::StreamEventKind;
use rtc_media::media_stream::{Dispatch, MediaStream};
use rtc_media::track::{MediaKind, MediaStreamTrack, PayloadCapability};
use rtc_media::udp_channel::UdpChannel;

fn header(sequence_number: u16) -> RtpHeader {
    RtpHeader {
        version: 2,
        padding: false,
        marker: false,
        payload_type: 96,
        sequence_number,
        timestamp: 0,
        ssrc: 42,
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

#[tokio::test(start_paused = true)]
async fn prolonged_silence_raises_a_timeout_event_from_the_background_task() {
    let config = SessionConfig::default();
    let (stream, mut events) = MediaStream::new(
        0,
        MediaKind::Audio,
        &config,
        channel().await,
        Dispatch::PassThrough,
        false,
    );

    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        stream.run_housekeeping(&task_cancel).await;
    });

    tokio::time::advance(Duration::from_secs(36)).await;

    let mut saw_timeout = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event.kind, StreamEventKind::Timeout) {
            saw_timeout = true;
        }
    }
    assert!(saw_timeout);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn a_stuck_reorder_entry_flushes_once_its_residence_timeout_elapses() {
    let config = SessionConfig::default();
    let (mut stream, mut events) = MediaStream::new(
        0,
        MediaKind::Video,
        &config,
        channel().await,
        Dispatch::PassThrough,
        true,
    );

    let mut remote_track = MediaStreamTrack::new_remote(MediaKind::Video);
    remote_track.capabilities.push(PayloadCapability {
        payload_type: 96,
        format: "H264".to_string(),
    });
    stream.attach_remote_track(remote_track);
    let source: SocketAddr = "192.0.2.10:4000".parse().unwrap();
    stream.set_destination(source, None);

    // Sequence 1 arrives first and drains immediately (the buffer latches
    // onto whatever sequence arrives first as "expected"). Sequence 3
    // then arrives with a gap at 2, which never comes, so 3 sits in the
    // reorder buffer until the housekeeping tick forces it out.
    let first = header(1);
    stream
        .on_receive_rtp_packet(first.clone(), 4000, source, wire_bytes(first))
        .await;
    let opening = events.recv().await.expect("sequence 1 drains immediately");
    assert!(matches!(opening.kind, StreamEventKind::RtpPacketReceived(_)));

    let third = header(3);
    stream
        .on_receive_rtp_packet(third.clone(), 4000, source, wire_bytes(third))
        .await;
    assert!(events.try_recv().is_err());

    let stream = Arc::new(stream);
    let task_stream = stream.clone();
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        task_stream.run_housekeeping(&task_cancel).await;
    });

    tokio::time::advance(Duration::from_millis(200)).await;

    let event = tokio::time::timeout(Duration::from_millis(200), events.recv())
        .await
        .unwrap()
        .expect("the stuck entry is force-emitted");
    match event.kind {
        StreamEventKind::RtpPacketReceived(packet) => {
            assert_eq!(packet.header.sequence_number, 3);
        }
        other => panic!("expected RtpPacketReceived, got {other:?}"),
    }

    cancel.cancel();
    handle.await.unwrap();
}
