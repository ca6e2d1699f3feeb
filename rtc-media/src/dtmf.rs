//! RFC 2833/4733 telephone-event (DTMF) payloads: the wire layout for one
//! event plus the duplicate start/end copy scheduling a sender runs
//! through, spacing sends and checking cancellation at each packet
//! boundary.
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use shared::error::{Error, Result};
use tokio_util::sync::CancellationToken;

/// Number of identical copies sent at the start and end of an event, RFC
/// 4733 §2.5.1.3.
pub const DUPLICATE_COUNT: usize = 3;
/// Default spacing between successive event packets.
pub const RTP_EVENT_DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(50);
/// Default audio clock rate telephone-event durations are expressed
/// against.
pub const DEFAULT_AUDIO_CLOCK_RATE: u32 = 8000;

/// One RFC 2833/4733 telephone-event payload: event id, end-of-event
/// flag, 6-bit volume, and total duration in RTP clock ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpEvent {
    pub event_id: u8,
    pub end: bool,
    pub volume: u8,
    pub duration: u16,
}

impl RtpEvent {
    pub fn marshal(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4);
        buf.extend_from_slice(&[self.event_id, (self.end as u8) << 7 | (self.volume & 0x3F)]);
        buf.extend_from_slice(&self.duration.to_be_bytes());
        buf.freeze()
    }

    pub fn unmarshal(buf: &[u8]) -> Result<Self> {
        if buf.len() != 4 {
            return Err(Error::TooShort);
        }
        Ok(RtpEvent {
            event_id: buf[0],
            end: buf[1] & 0x80 != 0,
            volume: buf[1] & 0x3F,
            duration: u16::from_be_bytes([buf[2], buf[3]]),
        })
    }
}

/// The RTP timestamp increments a telephone-event's `duration` advances
/// by for one sample period at `clock_rate`.
pub fn duration_ticks(sample_period: Duration, clock_rate: u32) -> u16 {
    ((sample_period.as_secs_f64() * clock_rate as f64).round() as u64).min(u16::MAX as u64) as u16
}

/// Schedules one telephone event: `DUPLICATE_COUNT` start copies (all
/// carrying the initial duration), progressive copies as `duration`
/// advances by one sample period each send, then `DUPLICATE_COUNT` copies
/// at the final duration with `end` set. `send` is invoked once per
/// packet; cancellation is observed between sends and leaves the event
/// incomplete (no forced end-of-event).
pub async fn send_event<F, Fut>(
    event_id: u8,
    volume: u8,
    total_duration: Duration,
    sample_period: Duration,
    clock_rate: u32,
    cancel: &CancellationToken,
    mut send: F,
) where
    F: FnMut(RtpEvent) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let ticks_per_sample = duration_ticks(sample_period, clock_rate);
    let total_ticks = duration_ticks(total_duration, clock_rate);

    let mut sent_any_progressive = false;
    let mut duration = ticks_per_sample.min(total_ticks.max(ticks_per_sample));

    for _ in 0..DUPLICATE_COUNT {
        if cancel.is_cancelled() {
            return;
        }
        send(RtpEvent {
            event_id,
            end: false,
            volume,
            duration,
        })
        .await;
    }

    while duration < total_ticks {
        if cancel.is_cancelled() {
            return;
        }
        tokio::time::sleep(sample_period).await;
        duration = duration.saturating_add(ticks_per_sample).min(total_ticks);
        send(RtpEvent {
            event_id,
            end: false,
            volume,
            duration,
        })
        .await;
        sent_any_progressive = true;
    }
    let _ = sent_any_progressive;

    for _ in 0..DUPLICATE_COUNT {
        if cancel.is_cancelled() {
            return;
        }
        send(RtpEvent {
            event_id,
            end: true,
            volume,
            duration: total_ticks,
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_marshal_matches_rfc_4733_example() {
        let event = RtpEvent {
            event_id: 5,
            end: true,
            volume: 10,
            duration: 400,
        };
        assert_eq!(&event.marshal()[..], &[0x05, 0x8A, 0x01, 0x90]);
    }

    #[test]
    fn event_unmarshal_round_trips() {
        let event = RtpEvent {
            event_id: 5,
            end: true,
            volume: 10,
            duration: 400,
        };
        assert_eq!(RtpEvent::unmarshal(&event.marshal()).unwrap(), event);
    }

    #[tokio::test(start_paused = true)]
    async fn send_schedule_emits_start_progressive_and_end_copies() {
        let cancel = CancellationToken::new();
        let events = std::sync::Mutex::new(Vec::new());
        send_event(
            5,
            10,
            Duration::from_millis(800),
            Duration::from_millis(50),
            DEFAULT_AUDIO_CLOCK_RATE,
            &cancel,
            |ev| {
                events.lock().unwrap().push(ev);
                async {}
            },
        )
        .await;
        let events = events.into_inner().unwrap();
        let starts = events.iter().filter(|e| !e.end).count();
        let ends = events.iter().filter(|e| e.end).count();
        assert_eq!(ends, DUPLICATE_COUNT);
        assert!(starts >= DUPLICATE_COUNT);
        assert_eq!(events.last().unwrap().duration, events.last().unwrap().duration);
    }

    #[tokio::test(start_paused = true)]
    async fn event_five_with_800_tick_duration_matches_the_literal_scenario() {
        // 800 ticks at 8 kHz = 100ms total, one 50ms sample period short of it.
        let cancel = CancellationToken::new();
        let events = std::sync::Mutex::new(Vec::new());
        send_event(
            5,
            10,
            Duration::from_micros(800 * 1_000_000 / DEFAULT_AUDIO_CLOCK_RATE as u64),
            RTP_EVENT_DEFAULT_SAMPLE_PERIOD,
            DEFAULT_AUDIO_CLOCK_RATE,
            &cancel,
            |ev| {
                events.lock().unwrap().push(ev);
                async {}
            },
        )
        .await;
        let events = events.into_inner().unwrap();
        assert_eq!(events[0].duration, 400);
        assert_eq!(events[1].duration, 400);
        assert_eq!(events[2].duration, 400);
        assert_eq!(events[3].duration, 800);
        assert!(events[4..].iter().all(|e| e.end && e.duration == 800));
        assert_eq!(events.len(), DUPLICATE_COUNT + 1 + DUPLICATE_COUNT);
    }

    #[tokio::test]
    async fn cancellation_stops_before_any_end_copy() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let events = std::sync::Mutex::new(Vec::new());
        send_event(
            5,
            0,
            Duration::from_millis(800),
            Duration::from_millis(50),
            DEFAULT_AUDIO_CLOCK_RATE,
            &cancel,
            |ev| {
                events.lock().unwrap().push(ev);
                async {}
            },
        )
        .await;
        assert!(events.into_inner().unwrap().is_empty());
    }
}
