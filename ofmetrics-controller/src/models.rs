use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::snapshot::Category;

/// Datapath id of a connected switch.
pub type SwitchId = u64;
pub type PortNo = u32;
/// Switch-side buffer handle for a packet held while the controller decides.
pub type BufferId = u32;

/// 48-bit Ethernet address. Serialized as `aa:bb:cc:dd:ee:ff`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; 6] = bytes.get(..6)?.try_into().ok()?;
        Some(Self(octets))
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid MAC address: {0}")]
pub struct ParseMacError(String);

impl FromStr for MacAddr {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(|| ParseMacError(s.to_string()))?;
            *octet = u8::from_str_radix(part, 16).map_err(|_| ParseMacError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(ParseMacError(s.to_string()));
        }
        Ok(Self(octets))
    }
}

impl TryFrom<String> for MacAddr {
    type Error = ParseMacError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddr> for String {
    fn from(mac: MacAddr) -> Self {
        mac.to_string()
    }
}

/// Why a port-status message was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortReason {
    Add,
    Delete,
    Modify,
}

/// Handshake and keepalive messages reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeKind {
    Hello,
    FeaturesRequest,
    EchoRequest,
    EchoReply,
}

impl HandshakeKind {
    pub fn category(self) -> Category {
        match self {
            HandshakeKind::Hello => Category::Hello,
            HandshakeKind::FeaturesRequest => Category::FeaturesRequest,
            HandshakeKind::EchoRequest => Category::EchoRequest,
            HandshakeKind::EchoReply => Category::EchoReply,
        }
    }
}

/// Decoded events delivered by the protocol stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwitchEvent {
    /// Features reply received; the switch is ready for configuration.
    SwitchConnected {
        switch: SwitchId,
        #[serde(default)]
        features_len: u64,
    },
    PacketArrived {
        switch: SwitchId,
        in_port: PortNo,
        data: Vec<u8>,
        #[serde(default)]
        buffer_id: Option<BufferId>,
    },
    PortStatusChanged {
        switch: SwitchId,
        port: PortNo,
        reason: PortReason,
    },
    ControlMessage {
        switch: SwitchId,
        kind: HandshakeKind,
        size: u64,
    },
}

impl SwitchEvent {
    pub fn switch(&self) -> SwitchId {
        match self {
            SwitchEvent::SwitchConnected { switch, .. }
            | SwitchEvent::PacketArrived { switch, .. }
            | SwitchEvent::PortStatusChanged { switch, .. }
            | SwitchEvent::ControlMessage { switch, .. } => *switch,
        }
    }
}
