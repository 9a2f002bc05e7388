//! Ethernet header decoding for packet-in payloads.

use crate::models::MacAddr;

pub const ETH_HEADER_LEN: usize = 14;
pub const ETH_TYPE_VLAN: u16 = 0x8100;
pub const ETH_TYPE_LLDP: u16 = 0x88cc;

/// Bridge-filtered group addresses used by link discovery (01:80:c2:00:00:0x).
const DISCOVERY_GROUP_PREFIX: [u8; 5] = [0x01, 0x80, 0xc2, 0x00, 0x00];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated ethernet frame ({len} bytes)")]
    Truncated { len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    /// Ethertype after any 802.1Q tag.
    pub ethertype: u16,
}

impl EthernetHeader {
    /// Topology probes are consumed by the controller, never forwarded or measured.
    pub fn is_discovery_probe(&self) -> bool {
        self.ethertype == ETH_TYPE_LLDP
            || (self.dst.0[..5] == DISCOVERY_GROUP_PREFIX && matches!(self.dst.0[5], 0x00 | 0x03 | 0x0e))
    }
}

pub fn parse_ethernet(data: &[u8]) -> Result<EthernetHeader, DecodeError> {
    let truncated = || DecodeError::Truncated { len: data.len() };
    if data.len() < ETH_HEADER_LEN {
        return Err(truncated());
    }

    let dst = MacAddr::from_slice(&data[0..6]).ok_or_else(truncated)?;
    let src = MacAddr::from_slice(&data[6..12]).ok_or_else(truncated)?;
    let mut ethertype = u16::from_be_bytes([data[12], data[13]]);
    if ethertype == ETH_TYPE_VLAN {
        let inner = data.get(16..18).ok_or_else(truncated)?;
        ethertype = u16::from_be_bytes([inner[0], inner[1]]);
    }

    Ok(EthernetHeader { dst, src, ethertype })
}
