use std::ops::Add;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Anchors a monotonic [`Instant`] to wall-clock time so NTP timestamps can
/// be derived for RTCP sender reports without repeatedly querying the
/// system clock (which is not monotonic).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemInstant {
    instant: Instant,
    duration_since_unix_epoch: Duration,
}

impl SystemInstant {
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
            duration_since_unix_epoch: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_else(|_| Duration::from_secs(0)),
        }
    }

    pub fn duration_since_unix_epoch(&self, now: Instant) -> Duration {
        now.duration_since(self.instant)
            .add(self.duration_since_unix_epoch)
    }

    /// 64-bit NTP timestamp (32.32 fixed point) for the given instant.
    pub fn ntp(&self, now: Instant) -> u64 {
        SystemInstant::unix2ntp(self.duration_since_unix_epoch(now).as_nanos() as u64)
    }

    pub fn instant(&self, ntp: u64) -> Instant {
        let unix = SystemInstant::ntp2unix(ntp);
        let duration_since_unix_epoch =
            Duration::new(unix / 1_000_000_000, (unix % 1_000_000_000) as u32);
        self.instant + duration_since_unix_epoch - self.duration_since_unix_epoch
    }

    fn unix2ntp(u: u64) -> u64 {
        let mut s = u / 1_000_000_000;
        s += 0x83AA_7E80; // offset in seconds between unix epoch and ntp epoch
        let mut f = u % 1_000_000_000;
        f <<= 32;
        f /= 1_000_000_000;
        s <<= 32;
        s | f
    }

    fn ntp2unix(t: u64) -> u64 {
        let mut s = t >> 32;
        let f = (t & 0xFFFF_FFFF) * 1_000_000_000 >> 32;
        s -= 0x83AA_7E80;
        s * 1_000_000_000 + f
    }
}

/// Middle 32 bits of a 64-bit NTP timestamp, as carried in an RTCP sender
/// report's `ntp_timestamp` compact form.
pub fn ntp_to_compact(ntp: u64) -> u32 {
    ((ntp >> 16) & 0xFFFF_FFFF) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ntp_round_trip_within_a_second() {
        let anchor = SystemInstant::now();
        let now = Instant::now();
        let ntp = anchor.ntp(now);
        let recovered = anchor.instant(ntp);
        let delta = if recovered > now {
            recovered - now
        } else {
            now - recovered
        };
        assert!(delta < Duration::from_millis(1));
    }
}
