//! Video specialisation of [`crate::media_stream::MediaStream`]: selects a
//! codec-specific depacketiser/packetiser pair and negotiates a matching
//! payload capability list before attaching a local/remote track.
use std::sync::Arc;

use bytes::Bytes;
use shared::error::Result;
use tokio::sync::Mutex;

use rtp::codec::h264::{H264Packet, H264Packetizer};
use rtp::codec::h265::{H265Packet, H265Packetizer};
use rtp::codec::mjpeg::{MjpegPacket, MjpegPacketizer};
use rtp::codec::vp8::{Vp8Packet, Vp8Packetizer};
use rtp::packetizer::Packetizer;

use crate::config::SessionConfig;
use crate::event::StreamEventReceiver;
use crate::media_stream::{Dispatch, MediaStream};
use crate::track::MediaKind;
use crate::udp_channel::UdpChannel;

/// The codecs this engine depacketises, named rather than inferred from a
/// negotiated MIME string (that lookup is SDP negotiation's job, out of
/// scope here).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
    H265,
    Vp8,
    Mjpeg,
}

fn dispatch_for(codec: VideoCodec) -> Dispatch {
    match codec {
        VideoCodec::H264 => Dispatch::Video(Box::new(H264Packet::default())),
        VideoCodec::H265 => Dispatch::Video(Box::new(H265Packet::default())),
        VideoCodec::Vp8 => Dispatch::Video(Box::new(Vp8Packet::default())),
        VideoCodec::Mjpeg => Dispatch::Video(Box::new(MjpegPacket::default())),
    }
}

fn packetizer_for(codec: VideoCodec) -> Box<dyn Packetizer + Send> {
    match codec {
        VideoCodec::H264 => Box::new(H264Packetizer),
        VideoCodec::H265 => Box::new(H265Packetizer),
        VideoCodec::Vp8 => Box::new(Vp8Packetizer),
        VideoCodec::Mjpeg => Box::new(MjpegPacketizer),
    }
}

pub struct VideoStream {
    pub stream: MediaStream,
    pub codec: VideoCodec,
    packetizer: Mutex<Box<dyn Packetizer + Send>>,
}

impl VideoStream {
    pub fn new(
        index: usize,
        codec: VideoCodec,
        config: &SessionConfig,
        channel: Arc<UdpChannel>,
    ) -> (Self, StreamEventReceiver) {
        let (stream, rx) = MediaStream::new(
            index,
            MediaKind::Video,
            config,
            channel,
            dispatch_for(codec),
            true,
        );
        (
            VideoStream {
                stream,
                codec,
                packetizer: Mutex::new(packetizer_for(codec)),
            },
            rx,
        )
    }

    /// Fragments `sample` (one encoded frame/access unit) through the
    /// codec's packetiser and sends every resulting RTP payload, marking
    /// only the last one as the frame's final packet.
    pub async fn send_frame(
        &self,
        payload_type: u8,
        timestamp: u32,
        sample: &[u8],
    ) -> Result<usize> {
        let payloads = {
            let mut packetizer = self.packetizer.lock().await;
            packetizer.packetize(sample, 0)?
        };
        let last = payloads.len().saturating_sub(1);
        let mut sent = 0;
        for (i, payload) in payloads.into_iter().enumerate() {
            sent += self
                .stream
                .send_rtp_raw(payload_type, timestamp, i == last, payload, &[])
                .await?;
        }
        Ok(sent)
    }

    pub async fn send_rtp_raw(
        &self,
        payload_type: u8,
        timestamp: u32,
        marker: bool,
        payload: Bytes,
    ) -> Result<usize> {
        self.stream
            .send_rtp_raw(payload_type, timestamp, marker, payload, &[])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;

    use crate::track::MediaStreamTrack;

    #[tokio::test]
    async fn video_stream_is_created_with_the_requested_codec() {
        let config = SessionConfig::default();
        let (channel, _rx) = UdpChannel::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, true)
            .await
            .unwrap();
        let (video, _events) = VideoStream::new(0, VideoCodec::H264, &config, Arc::new(channel));
        assert_eq!(video.codec, VideoCodec::H264);
        assert_eq!(video.stream.kind, MediaKind::Video);
    }

    #[tokio::test]
    async fn send_frame_fragments_a_large_sample_into_multiple_packets() {
        let config = SessionConfig::default();
        let (channel, _rx) = UdpChannel::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, true)
            .await
            .unwrap();
        let (mut video, _events) = VideoStream::new(0, VideoCodec::H264, &config, Arc::new(channel));
        video
            .stream
            .attach_local_track(MediaStreamTrack::new_local(MediaKind::Video));

        let (peer, mut peer_rx) = UdpChannel::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, true)
            .await
            .unwrap();
        peer.start();
        let dst = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), peer.local_port());
        video.stream.set_destination(dst, None);

        let mut nal = vec![0x65u8];
        nal.extend(std::iter::repeat(0xEE).take(3499));
        let mut sample = vec![0, 0, 0, 1];
        sample.extend_from_slice(&nal);

        video.send_frame(96, 1000, &sample).await.unwrap();

        let mut fragments = 0;
        while tokio::time::timeout(Duration::from_millis(200), peer_rx.recv())
            .await
            .is_ok()
        {
            fragments += 1;
        }
        assert_eq!(fragments, 3);
    }
}
