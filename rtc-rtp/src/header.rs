use bytes::{Bytes, BytesMut};
use shared::error::{Error, Result};

/// One-byte header extension profile, RFC 5285 §4.2.
pub const EXTENSION_PROFILE_ONE_BYTE: u16 = 0xBEDE;
/// Two-byte header extension profile, RFC 5285 §4.3.
pub const EXTENSION_PROFILE_TWO_BYTE: u16 = 0x1000;

const HEADER_LENGTH: usize = 12;
const VERSION_SHIFT: u8 = 6;
const VERSION_MASK: u8 = 0x3;
const PADDING_SHIFT: u8 = 5;
const PADDING_MASK: u8 = 0x1;
const EXTENSION_SHIFT: u8 = 4;
const EXTENSION_MASK: u8 = 0x1;
const CC_MASK: u8 = 0xF;
const MARKER_SHIFT: u8 = 7;
const MARKER_MASK: u8 = 0x1;
const PT_MASK: u8 = 0x7F;

/// A single RFC 5285 header extension element, keyed by its negotiated id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub id: u8,
    pub payload: Bytes,
}

/// RTP fixed header (RFC 3550 §5.1) plus optional CSRC list and extension
/// block.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       sequence number        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           timestamp                          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |           synchronization source (SSRC) identifier           |
/// +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// |            contributing source (CSRC) identifiers            |
/// |                             ....                             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub version: u8,
    pub padding: bool,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc: Vec<u32>,
    /// Zero when no extension block is present.
    pub extension_profile: u16,
    /// Raw extension payload, always a multiple of 4 bytes when present.
    pub extension_payload: Bytes,
}

impl Default for Header {
    fn default() -> Self {
        Header {
            version: 2,
            padding: false,
            marker: false,
            payload_type: 0,
            sequence_number: 0,
            timestamp: 0,
            ssrc: 0,
            csrc: Vec::new(),
            extension_profile: 0,
            extension_payload: Bytes::new(),
        }
    }
}

impl Header {
    pub fn has_extension(&self) -> bool {
        self.extension_profile != 0
    }

    /// Total marshaled size of the fixed header, CSRC list and extension
    /// block (payload excluded).
    pub fn marshal_size(&self) -> usize {
        let mut size = HEADER_LENGTH + self.csrc.len() * 4;
        if self.has_extension() {
            size += 4 + self.extension_payload.len();
        }
        size
    }

    /// Parses a header from the front of `buf`. Returns the header and the
    /// number of bytes consumed (header + CSRC + extension, not payload).
    ///
    /// Fails only with [`Error::TooShort`] when the buffer cannot possibly
    /// hold a well-formed header; never panics.
    pub fn unmarshal(buf: &[u8]) -> Result<(Header, usize)> {
        if buf.len() < HEADER_LENGTH {
            return Err(Error::TooShort);
        }

        let b0 = buf[0];
        let version = (b0 >> VERSION_SHIFT) & VERSION_MASK;
        let padding = ((b0 >> PADDING_SHIFT) & PADDING_MASK) != 0;
        let extension = ((b0 >> EXTENSION_SHIFT) & EXTENSION_MASK) != 0;
        let csrc_count = (b0 & CC_MASK) as usize;

        let b1 = buf[1];
        let marker = ((b1 >> MARKER_SHIFT) & MARKER_MASK) != 0;
        let payload_type = b1 & PT_MASK;

        let sequence_number = u16::from_be_bytes([buf[2], buf[3]]);
        let timestamp = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let ssrc = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);

        let mut offset = HEADER_LENGTH;
        let csrc_end = offset + csrc_count * 4;
        if buf.len() < csrc_end {
            return Err(Error::TooShort);
        }
        let mut csrc = Vec::with_capacity(csrc_count);
        while offset < csrc_end {
            csrc.push(u32::from_be_bytes([
                buf[offset],
                buf[offset + 1],
                buf[offset + 2],
                buf[offset + 3],
            ]));
            offset += 4;
        }

        let mut extension_profile = 0u16;
        let mut extension_payload = Bytes::new();
        if extension {
            if buf.len() < offset + 4 {
                return Err(Error::TooShort);
            }
            extension_profile = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
            let ext_len_words = u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]) as usize;
            offset += 4;
            let ext_bytes = ext_len_words * 4;
            if buf.len() < offset + ext_bytes {
                return Err(Error::TooShort);
            }
            extension_payload = Bytes::copy_from_slice(&buf[offset..offset + ext_bytes]);
            offset += ext_bytes;
        }

        Ok((
            Header {
                version,
                padding,
                marker,
                payload_type,
                sequence_number,
                timestamp,
                ssrc,
                csrc,
                extension_profile,
                extension_payload,
            },
            offset,
        ))
    }

    pub fn marshal(&self) -> Result<Bytes> {
        if self.csrc.len() > 15 {
            return Err(Error::TooManyCsrc(self.csrc.len()));
        }
        let mut buf = BytesMut::with_capacity(self.marshal_size());

        let mut b0 = (self.version & VERSION_MASK) << VERSION_SHIFT;
        if self.padding {
            b0 |= 1 << PADDING_SHIFT;
        }
        if self.has_extension() {
            b0 |= 1 << EXTENSION_SHIFT;
        }
        b0 |= (self.csrc.len() as u8) & CC_MASK;
        buf.extend_from_slice(&[b0]);

        let mut b1 = self.payload_type & PT_MASK;
        if self.marker {
            b1 |= 1 << MARKER_SHIFT;
        }
        buf.extend_from_slice(&[b1]);

        buf.extend_from_slice(&self.sequence_number.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.ssrc.to_be_bytes());

        for c in &self.csrc {
            buf.extend_from_slice(&c.to_be_bytes());
        }

        if self.has_extension() {
            if self.extension_payload.len() % 4 != 0 {
                return Err(Error::WrongMarshalSize);
            }
            buf.extend_from_slice(&self.extension_profile.to_be_bytes());
            let ext_len_words = (self.extension_payload.len() / 4) as u16;
            buf.extend_from_slice(&ext_len_words.to_be_bytes());
            buf.extend_from_slice(&self.extension_payload);
        }

        Ok(buf.freeze())
    }

    /// Iterates the decoded extension elements carried in
    /// `extension_payload`, per the profile in `extension_profile`.
    /// Unrecognised profiles yield no elements. Malformed spans abort the
    /// walk and return whatever elements were already decoded, never
    /// panicking and never propagating a partially-read element.
    pub fn extensions(&self) -> Vec<Extension> {
        let mut out = Vec::new();
        let buf = &self.extension_payload;
        match self.extension_profile {
            EXTENSION_PROFILE_ONE_BYTE => {
                let mut i = 0usize;
                while i < buf.len() {
                    let b = buf[i];
                    if b == 0 {
                        // Padding byte, RFC 5285 §4.2.
                        i += 1;
                        continue;
                    }
                    let id = b >> 4;
                    let len = ((b & 0x0F) as usize) + 1;
                    i += 1;
                    if i + len > buf.len() {
                        break;
                    }
                    out.push(Extension {
                        id,
                        payload: Bytes::copy_from_slice(&buf[i..i + len]),
                    });
                    i += len;
                }
            }
            EXTENSION_PROFILE_TWO_BYTE => {
                let mut i = 0usize;
                while i + 2 <= buf.len() {
                    let id = buf[i];
                    let len = buf[i + 1] as usize;
                    i += 2;
                    if id == 0 {
                        // Padding byte, RFC 5285 §4.3.
                        continue;
                    }
                    if i + len > buf.len() {
                        break;
                    }
                    out.push(Extension {
                        id,
                        payload: Bytes::copy_from_slice(&buf[i..i + len]),
                    });
                    i += len;
                }
            }
            _ => {}
        }
        out
    }

    pub fn get_extension(&self, id: u8) -> Option<Bytes> {
        self.extensions()
            .into_iter()
            .find(|e| e.id == id)
            .map(|e| e.payload)
    }

    /// Sets (or replaces) a one-byte-profile extension element. Ids
    /// outside 1..14, or an oversized/empty payload, are silently
    /// skipped — the one-byte profile cannot represent them, and a bad
    /// extension id from a caller must not fail the whole packet.
    pub fn set_extension(&mut self, id: u8, payload: Bytes) {
        if !(1..=14).contains(&id) || payload.is_empty() || payload.len() > 16 {
            return;
        }
        let mut elements: Vec<Extension> =
            self.extensions().into_iter().filter(|e| e.id != id).collect();
        elements.push(Extension { id, payload });
        self.set_one_byte_extensions(&elements);
    }

    /// Every element here came from a prior `set_extension` call, which
    /// already enforced the 1..=16-byte payload bound.
    fn set_one_byte_extensions(&mut self, elements: &[Extension]) {
        let mut buf = BytesMut::new();
        for e in elements {
            let len = e.payload.len();
            buf.extend_from_slice(&[(e.id << 4) | ((len - 1) as u8 & 0x0F)]);
            buf.extend_from_slice(&e.payload);
        }
        while buf.len() % 4 != 0 {
            buf.extend_from_slice(&[0]);
        }
        self.extension_profile = EXTENSION_PROFILE_ONE_BYTE;
        self.extension_payload = buf.freeze();
    }
}

/// Modulo-2^32 timestamp delta from `prev` to the header's timestamp.
/// Returns 0 when `prev` is zero (no baseline established yet).
pub fn timestamp_delta(prev: u32, curr: u32) -> u32 {
    if prev == 0 {
        0
    } else {
        curr.wrapping_sub(prev)
    }
}
