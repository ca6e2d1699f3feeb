//! Source Description (SDES, PT=202): RFC 3550 §6.5 — per-SSRC chunks of
//! `(type, text)` items, each chunk padded to a 32-bit boundary.
use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};

use crate::header::{padding_size, Header, PacketType, HEADER_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdesType {
    End,
    Cname,
    Name,
    Email,
    Phone,
    Loc,
    Tool,
    Note,
    Priv,
    Unsupported(u8),
}

impl SdesType {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SdesType::End,
            1 => SdesType::Cname,
            2 => SdesType::Name,
            3 => SdesType::Email,
            4 => SdesType::Phone,
            5 => SdesType::Loc,
            6 => SdesType::Tool,
            7 => SdesType::Note,
            8 => SdesType::Priv,
            other => SdesType::Unsupported(other),
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            SdesType::End => 0,
            SdesType::Cname => 1,
            SdesType::Name => 2,
            SdesType::Email => 3,
            SdesType::Phone => 4,
            SdesType::Loc => 5,
            SdesType::Tool => 6,
            SdesType::Note => 7,
            SdesType::Priv => 8,
            SdesType::Unsupported(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptionItem {
    pub sdes_type: SdesType,
    pub text: Bytes,
}

impl SourceDescriptionItem {
    fn marshal_size(&self) -> usize {
        2 + self.text.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptionChunk {
    pub source: u32,
    pub items: Vec<SourceDescriptionItem>,
}

impl SourceDescriptionChunk {
    fn raw_size(&self) -> usize {
        let items_len: usize = self.items.iter().map(|i| i.marshal_size()).sum();
        4 + items_len + 1 // +1 for the terminating null item
    }

    fn marshal_size(&self) -> usize {
        let l = self.raw_size();
        l + padding_size(l)
    }

    fn marshal(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u32(self.source);
        for item in &self.items {
            if item.text.len() > u8::MAX as usize {
                return Err(Error::ReasonTooLong);
            }
            buf.put_u8(item.sdes_type.to_u8());
            buf.put_u8(item.text.len() as u8);
            buf.extend_from_slice(&item.text);
        }
        buf.put_u8(SdesType::End.to_u8());
        let pad = padding_size(self.raw_size());
        buf.extend_from_slice(&vec![0u8; pad]);
        Ok(())
    }

    fn unmarshal(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(Error::TooShort);
        }
        let source = buf.get_u32();
        let mut items = Vec::new();
        let mut consumed = 4usize;
        loop {
            if buf.remaining() == 0 {
                return Err(Error::TooShort);
            }
            let t = buf.get_u8();
            consumed += 1;
            if t == 0 {
                break;
            }
            if buf.remaining() == 0 {
                return Err(Error::TooShort);
            }
            let len = buf.get_u8() as usize;
            consumed += 1;
            if buf.remaining() < len {
                return Err(Error::TooShort);
            }
            let text = buf.copy_to_bytes(len);
            consumed += len;
            items.push(SourceDescriptionItem {
                sdes_type: SdesType::from_u8(t),
                text,
            });
        }
        let pad = padding_size(consumed);
        if buf.remaining() < pad {
            return Err(Error::TooShort);
        }
        buf.advance(pad);
        Ok(SourceDescriptionChunk { source, items })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceDescription {
    pub chunks: Vec<SourceDescriptionChunk>,
}

impl SourceDescription {
    fn raw_size(&self) -> usize {
        HEADER_LENGTH + self.chunks.iter().map(|c| c.marshal_size()).sum::<usize>()
    }

    pub fn marshal_size(&self) -> usize {
        self.raw_size()
    }

    pub fn marshal(&self) -> Result<Bytes> {
        if self.chunks.len() > crate::header::COUNT_MAX as usize {
            return Err(Error::TooManyReports);
        }
        let header = Header {
            padding: false,
            count: self.chunks.len() as u8,
            packet_type: PacketType::SourceDescription,
            length: (self.marshal_size() / 4 - 1) as u16,
        };
        let mut buf = BytesMut::with_capacity(self.marshal_size());
        buf.extend_from_slice(&header.marshal()?);
        for chunk in &self.chunks {
            chunk.marshal(&mut buf)?;
        }
        Ok(buf.freeze())
    }

    pub fn unmarshal(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < HEADER_LENGTH {
            return Err(Error::TooShort);
        }
        let header = Header::unmarshal(buf)?;
        if header.packet_type != PacketType::SourceDescription {
            return Err(Error::InvalidHeader);
        }
        let mut chunks = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            chunks.push(SourceDescriptionChunk::unmarshal(buf)?);
        }
        Ok(SourceDescription { chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_source_description() {
        let sdes = SourceDescription {
            chunks: vec![
                SourceDescriptionChunk {
                    source: 0x902f_9e2e,
                    items: vec![
                        SourceDescriptionItem {
                            sdes_type: SdesType::Cname,
                            text: Bytes::from_static(b"user@example.com"),
                        },
                        SourceDescriptionItem {
                            sdes_type: SdesType::Name,
                            text: Bytes::from_static(b"John Doe"),
                        },
                    ],
                },
                SourceDescriptionChunk {
                    source: 0xbc5e_9a40,
                    items: vec![SourceDescriptionItem {
                        sdes_type: SdesType::Cname,
                        text: Bytes::from_static(b"peer@example.com"),
                    }],
                },
            ],
        };
        let mut buf = sdes.marshal().unwrap();
        assert_eq!(SourceDescription::unmarshal(&mut buf).unwrap(), sdes);
    }
}
