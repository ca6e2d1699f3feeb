//! `SecureContext` wraps the four protect/unprotect closures the DTLS-SRTP
//! layer installs once keying completes. No cryptography is implemented in
//! this crate: the closures are the actual cipher, supplied externally by
//! the DTLS-SRTP layer.
use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use shared::error::Result;

use rtp::packet::SRTP_MAX_PREFIX_LENGTH;

/// Encrypts/authenticates one RTP or RTCP packet, returning the protected
/// wire bytes (plaintext length plus the trailing authentication tag).
pub type ProtectFn = Arc<dyn Fn(&[u8]) -> Result<Bytes> + Send + Sync>;
/// Verifies and decrypts one protected RTP or RTCP packet, returning the
/// plaintext.
pub type UnprotectFn = Arc<dyn Fn(&[u8]) -> Result<Bytes> + Send + Sync>;

#[derive(Clone)]
pub struct SecureContext {
    protect_rtp: ProtectFn,
    unprotect_rtp: UnprotectFn,
    protect_rtcp: ProtectFn,
    unprotect_rtcp: UnprotectFn,
}

impl fmt::Debug for SecureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureContext").finish_non_exhaustive()
    }
}

impl SecureContext {
    pub fn new(
        protect_rtp: ProtectFn,
        unprotect_rtp: UnprotectFn,
        protect_rtcp: ProtectFn,
        unprotect_rtcp: UnprotectFn,
    ) -> Self {
        SecureContext {
            protect_rtp,
            unprotect_rtp,
            protect_rtcp,
            unprotect_rtcp,
        }
    }

    pub fn protect_rtp(&self, plaintext: &[u8]) -> Result<Bytes> {
        (self.protect_rtp)(plaintext)
    }

    pub fn unprotect_rtp(&self, ciphertext: &[u8]) -> Result<Bytes> {
        (self.unprotect_rtp)(ciphertext)
    }

    pub fn protect_rtcp(&self, plaintext: &[u8]) -> Result<Bytes> {
        (self.protect_rtcp)(plaintext)
    }

    pub fn unprotect_rtcp(&self, ciphertext: &[u8]) -> Result<Bytes> {
        (self.unprotect_rtcp)(ciphertext)
    }
}

/// Pre-sizes a buffer for a protect call: plaintext followed by
/// [`SRTP_MAX_PREFIX_LENGTH`] bytes of slack for the authentication tag.
pub fn buffer_with_slack(plaintext: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(plaintext.len() + SRTP_MAX_PREFIX_LENGTH);
    buf.extend_from_slice(plaintext);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::Error;

    fn identity_closures() -> SecureContext {
        let pass: ProtectFn = Arc::new(|b: &[u8]| Ok(Bytes::copy_from_slice(b)));
        let unpass: UnprotectFn = Arc::new(|b: &[u8]| Ok(Bytes::copy_from_slice(b)));
        SecureContext::new(pass.clone(), unpass.clone(), pass, unpass)
    }

    #[test]
    fn protect_and_unprotect_round_trip_through_closures() {
        let ctx = identity_closures();
        let protected = ctx.protect_rtp(b"payload").unwrap();
        let recovered = ctx.unprotect_rtp(&protected).unwrap();
        assert_eq!(&recovered[..], b"payload");
    }

    #[test]
    fn a_failing_closure_surfaces_its_error() {
        let fail: ProtectFn = Arc::new(|_: &[u8]| Err(Error::ProtectFailed));
        let unpass: UnprotectFn = Arc::new(|b: &[u8]| Ok(Bytes::copy_from_slice(b)));
        let ctx = SecureContext::new(fail.clone(), unpass.clone(), fail, unpass);
        assert_eq!(ctx.protect_rtp(b"x"), Err(Error::ProtectFailed));
    }

    #[test]
    fn buffer_with_slack_reserves_trailing_capacity() {
        let buf = buffer_with_slack(b"hello");
        assert_eq!(buf.len(), 5);
        assert!(buf.capacity() >= 5 + SRTP_MAX_PREFIX_LENGTH);
    }
}
