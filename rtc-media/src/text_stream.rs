//! T.140 text specialisation of [`crate::media_stream::MediaStream`]:
//! payloads pass through unchanged on receive, mirroring audio's dispatch,
//! but sends are fragmented through [`T140Packetizer`] rather than handed
//! to `send_rtp_raw` whole. Kept as its own thin type so a caller's API
//! surface names each media kind directly rather than exposing one generic
//! stream type.
use std::sync::Arc;

use bytes::Bytes;
use shared::error::Result;
use tokio::sync::Mutex;

use rtp::codec::t140::T140Packetizer;
use rtp::packetizer::Packetizer;

use crate::config::SessionConfig;
use crate::event::StreamEventReceiver;
use crate::media_stream::{Dispatch, MediaStream};
use crate::track::MediaKind;
use crate::udp_channel::UdpChannel;

pub struct TextStream {
    pub stream: MediaStream,
    packetizer: Mutex<T140Packetizer>,
}

impl TextStream {
    pub fn new(
        index: usize,
        config: &SessionConfig,
        channel: Arc<UdpChannel>,
    ) -> (Self, StreamEventReceiver) {
        let (stream, rx) = MediaStream::new(
            index,
            MediaKind::Text,
            config,
            channel,
            Dispatch::PassThrough,
            true,
        );
        (
            TextStream {
                stream,
                packetizer: Mutex::new(T140Packetizer::default()),
            },
            rx,
        )
    }

    /// Fragments `text` to the MTU through [`T140Packetizer`], sending one
    /// RTP packet per fragment. The marker bit lands on the first fragment
    /// only, and only when the packetiser judges this send an idle-period
    /// resumption.
    pub async fn send_encoded_sample(
        &self,
        payload_type: u8,
        timestamp: u32,
        text: &[u8],
    ) -> Result<usize> {
        let (payloads, marker_on_first) = {
            let mut packetizer = self.packetizer.lock().await;
            let payloads = packetizer.packetize(text, 0)?;
            (payloads, packetizer.marker_on_first())
        };
        let mut sent = 0;
        for (i, payload) in payloads.into_iter().enumerate() {
            let marker = i == 0 && marker_on_first;
            sent += self
                .stream
                .send_rtp_raw(payload_type, timestamp, marker, payload, &[])
                .await?;
        }
        Ok(sent)
    }

    pub async fn send_text(&self, timestamp: u32, payload_type: u8, text: Bytes) -> Result<usize> {
        self.send_encoded_sample(payload_type, timestamp, &text)
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
    async fn text_stream_uses_pass_through_dispatch() {
        let config = SessionConfig::default();
        let (channel, _rx) = UdpChannel::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, true)
            .await
            .unwrap();
        let (text, _events) = TextStream::new(0, &config, Arc::new(channel));
        assert_eq!(text.stream.kind, MediaKind::Text);
    }

    #[tokio::test]
    async fn send_text_fragments_large_input_to_the_mtu() {
        let config = SessionConfig::default();
        let (channel, _rx) = UdpChannel::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, true)
            .await
            .unwrap();
        let (mut text, _events) = TextStream::new(0, &config, Arc::new(channel));
        text.stream
            .attach_local_track(MediaStreamTrack::new_local(MediaKind::Text));

        let (peer, mut peer_rx) = UdpChannel::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, true)
            .await
            .unwrap();
        peer.start();
        let dst = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), peer.local_port());
        text.stream.set_destination(dst, None);

        let sample = vec![b'a'; 3000];
        text.send_text(0, 98, Bytes::from(sample)).await.unwrap();

        let mut fragments = 0;
        while tokio::time::timeout(Duration::from_millis(200), peer_rx.recv())
            .await
            .is_ok()
        {
            fragments += 1;
        }
        assert!(fragments > 1);
    }
}
