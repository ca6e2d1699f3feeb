use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::Bytes;
use rand::{rng, Rng};

/// True for RFC 1918 (IPv4) and unique-local (IPv6 `fc00::/7`) addresses,
/// used by `AdjustRemoteEndPoint`'s private-NAT inference: a remote peer
/// advertising a private address that then sends from a public one is
/// treated as behind a NAT rather than as an impostor.
pub fn is_private_address(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local()
        }
        IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00 || v6.is_loopback(),
    }
}

fn match_range(lower: u8, upper: u8) -> impl Fn(&[u8]) -> bool {
    move |buf: &[u8]| -> bool {
        if buf.is_empty() {
            return false;
        }
        let b = buf[0];
        b >= lower && b <= upper
    }
}

/// RFC 7983 demultiplexing: STUN occupies [0..3], DTLS [20..63], TURN
/// ChannelData [64..79], RTP/RTCP [128..191].
pub fn is_stun(buf: &[u8]) -> bool {
    match_range(0, 3)(buf)
}

pub fn is_rtp_or_rtcp(buf: &[u8]) -> bool {
    match_range(128, 191)(buf)
}

/// True when the first byte's top two bits mark an RTCP payload-type
/// range (192..=223) at offset 1, per RFC 5761 §4 disambiguation.
pub fn is_rtcp(buf: &[u8]) -> bool {
    if buf.len() < 4 {
        return false;
    }
    let packet_type = buf[1];
    (192..=223).contains(&packet_type)
}

pub fn match_srtp(buf: &[u8]) -> bool {
    is_rtp_or_rtcp(buf) && !is_rtcp(buf)
}

pub fn match_srtcp(buf: &[u8]) -> bool {
    is_rtp_or_rtcp(buf) && is_rtcp(buf)
}

/// A TURN Data Indication starts with message type 0x0017 (STUN class
/// "indication", method "Data") per RFC 5766 §10.4.
pub fn is_turn_data_indication(buf: &[u8]) -> bool {
    buf.len() >= 2 && buf[0] == 0x00 && buf[1] == 0x17
}

const STUN_HEADER_LENGTH: usize = 20;
const STUN_MAGIC_COOKIE: u32 = 0x2112_A442;
const ATTR_XOR_PEER_ADDRESS: u16 = 0x0012;
const ATTR_DATA: u16 = 0x0013;

/// Extracts the relayed payload and originating peer address from a TURN
/// Data Indication (RFC 5766 §10.4): the `DATA` attribute carries the
/// payload, `XOR-PEER-ADDRESS` carries the peer the relay received it
/// from. `None` on a malformed message or one missing either attribute.
pub fn parse_turn_data_indication(buf: &[u8]) -> Option<(SocketAddr, Bytes)> {
    if buf.len() < STUN_HEADER_LENGTH || !is_turn_data_indication(buf) {
        return None;
    }
    let attrs_len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    let end = STUN_HEADER_LENGTH.checked_add(attrs_len)?;
    if buf.len() < end {
        return None;
    }
    let transaction_id = &buf[8..STUN_HEADER_LENGTH];

    let mut peer = None;
    let mut data = None;
    let mut offset = STUN_HEADER_LENGTH;
    while offset + 4 <= end {
        let attr_type = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
        let attr_len = u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]) as usize;
        let value_start = offset + 4;
        let value_end = value_start + attr_len;
        if value_end > end {
            break;
        }
        let value = &buf[value_start..value_end];
        match attr_type {
            ATTR_XOR_PEER_ADDRESS => peer = decode_xor_address(value, transaction_id),
            ATTR_DATA => data = Some(Bytes::copy_from_slice(value)),
            _ => {}
        }
        offset = value_start + ((attr_len + 3) & !3);
    }
    Some((peer?, data?))
}

/// Reverses the XOR-MAPPED-ADDRESS family encoding (RFC 5389 §15.2):
/// the port is XORed with the cookie's high 16 bits, and the address with
/// the cookie (IPv4) or cookie+transaction-id (IPv6).
fn decode_xor_address(value: &[u8], transaction_id: &[u8]) -> Option<SocketAddr> {
    if value.len() < 4 {
        return None;
    }
    let cookie = STUN_MAGIC_COOKIE.to_be_bytes();
    let port = u16::from_be_bytes([value[2] ^ cookie[0], value[3] ^ cookie[1]]);
    match value[1] {
        0x01 if value.len() >= 8 => {
            let mut octets = [0u8; 4];
            for i in 0..4 {
                octets[i] = value[4 + i] ^ cookie[i];
            }
            Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port))
        }
        0x02 if value.len() >= 20 && transaction_id.len() >= 12 => {
            let mut mask = [0u8; 16];
            mask[..4].copy_from_slice(&cookie);
            mask[4..16].copy_from_slice(&transaction_id[..12]);
            let mut octets = [0u8; 16];
            for i in 0..16 {
                octets[i] = value[4 + i] ^ mask[i];
            }
            Some(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
        }
        _ => None,
    }
}

pub fn random_u32() -> u32 {
    rng().random()
}

pub fn random_u16() -> u16 {
    rng().random()
}
