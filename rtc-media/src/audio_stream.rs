//! Audio specialisation of [`crate::media_stream::MediaStream`]: payloads
//! pass straight through (no depacketiser) and telephone-event sends are
//! exposed here rather than on the shared base, since only audio tracks
//! carry RFC 2833/4733 events.
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use shared::error::Result;
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::dtmf::{self, DEFAULT_AUDIO_CLOCK_RATE, RTP_EVENT_DEFAULT_SAMPLE_PERIOD};
use crate::event::StreamEventReceiver;
use crate::media_stream::{Dispatch, MediaStream};
use crate::track::MediaKind;
use crate::udp_channel::UdpChannel;

pub struct AudioStream {
    pub stream: MediaStream,
    negotiated_dtmf_payload_type: u8,
}

impl AudioStream {
    pub fn new(
        index: usize,
        config: &SessionConfig,
        channel: Arc<UdpChannel>,
    ) -> (Self, StreamEventReceiver) {
        let (stream, rx) = MediaStream::new(
            index,
            MediaKind::Audio,
            config,
            channel,
            Dispatch::PassThrough,
            true,
        );
        (
            AudioStream {
                stream,
                negotiated_dtmf_payload_type: config.negotiated_rtp_event_payload_id,
            },
            rx,
        )
    }

    /// Schedules one telephone event, sending each copy as a raw RTP
    /// packet on the negotiated DTMF payload-type. Cancelling `cancel`
    /// mid-schedule leaves the event without a forced end-of-event copy.
    pub async fn send_telephone_event(
        &self,
        event_id: u8,
        volume: u8,
        total_duration: Duration,
        timestamp: u32,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let payload_type = self.negotiated_dtmf_payload_type;
        dtmf::send_event(
            event_id,
            volume,
            total_duration,
            RTP_EVENT_DEFAULT_SAMPLE_PERIOD,
            DEFAULT_AUDIO_CLOCK_RATE,
            cancel,
            |event| async move {
                let _ = self
                    .stream
                    .send_rtp_raw(payload_type, timestamp, false, event.marshal(), &[])
                    .await;
            },
        )
        .await;
        Ok(())
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
    use std::net::{IpAddr, Ipv4Addr};

    #[tokio::test]
    async fn audio_stream_negotiates_default_dtmf_payload_type() {
        let config = SessionConfig::default();
        let (channel, _rx) = UdpChannel::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, true)
            .await
            .unwrap();
        let (audio, _events) = AudioStream::new(0, &config, Arc::new(channel));
        assert_eq!(audio.negotiated_dtmf_payload_type, 101);
    }
}
