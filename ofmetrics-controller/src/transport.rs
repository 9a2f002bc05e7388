/**
 * TRANSPORT BOUNDARY - commands sent from the controller to switches
 *
 * ROLE: describes the two commands the controller issues (flow-mod and
 * packet-out) and the `Transport` trait the protocol stack implements.
 * The wire codec stays on the other side of this trait.
 *
 * Sends are synchronous: the call returns once the message has been handed
 * to the channel, and the time spent inside it is part of the latency the
 * controller measures.
 */

use serde::Serialize;
use tracing::debug;

use crate::models::{BufferId, MacAddr, PortNo, SwitchId};

/// OpenFlow 1.3 framing sizes, used to size messages we build ourselves.
const OFP_HEADER_LEN: usize = 8;
const FLOW_MOD_FIXED_LEN: usize = 56;
const PACKET_OUT_FIXED_LEN: usize = 24;
const MATCH_HEADER_LEN: usize = 4;
const INSTRUCTION_HEADER_LEN: usize = 8;
const ACTION_OUTPUT_LEN: usize = 16;
const OXM_HEADER_LEN: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("switch {0:#x} is not connected")]
    Disconnected(SwitchId),
    #[error("send to switch {switch:#x} failed: {reason}")]
    Send { switch: SwitchId, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Output { port: PortNo },
    /// Send to the controller, `max_len` bytes of the packet (0xffff = no buffering).
    Controller { max_len: u16 },
    Flood,
}

impl Action {
    pub const CONTROLLER_NO_BUFFER: u16 = 0xffff;
}

/// Match fields supported by the controller; `None` is a wildcard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlowMatch {
    pub in_port: Option<PortNo>,
    pub eth_dst: Option<MacAddr>,
    pub eth_src: Option<MacAddr>,
}

impl FlowMatch {
    /// Matches every packet (table-miss rule).
    pub fn any() -> Self {
        Self::default()
    }

    pub fn exact(in_port: PortNo, eth_dst: MacAddr, eth_src: MacAddr) -> Self {
        Self { in_port: Some(in_port), eth_dst: Some(eth_dst), eth_src: Some(eth_src) }
    }

    fn encoded_len(&self) -> usize {
        let fields = self.in_port.map_or(0, |_| OXM_HEADER_LEN + 4)
            + self.eth_dst.map_or(0, |_| OXM_HEADER_LEN + 6)
            + self.eth_src.map_or(0, |_| OXM_HEADER_LEN + 6);
        pad8(MATCH_HEADER_LEN + fields)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowMod {
    pub switch: SwitchId,
    pub priority: u16,
    pub matching: FlowMatch,
    pub actions: Vec<Action>,
    pub buffer_id: Option<BufferId>,
}

impl FlowMod {
    /// Size of the message on the wire, apply-actions instruction included.
    pub fn encoded_len(&self) -> usize {
        // The fixed part already counts the 8-byte empty match.
        FLOW_MOD_FIXED_LEN - 8
            + self.matching.encoded_len()
            + INSTRUCTION_HEADER_LEN
            + ACTION_OUTPUT_LEN * self.actions.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PacketOut {
    pub switch: SwitchId,
    pub buffer_id: Option<BufferId>,
    /// Original frame, only carried when the switch did not buffer it.
    pub data: Option<Vec<u8>>,
    pub in_port: PortNo,
    pub actions: Vec<Action>,
}

impl PacketOut {
    pub fn encoded_len(&self) -> usize {
        PACKET_OUT_FIXED_LEN + ACTION_OUTPUT_LEN * self.actions.len() + self.data.as_ref().map_or(0, Vec::len)
    }
}

/// Command sink provided by the protocol stack.
///
/// Each call returns the number of bytes handed to the channel.
pub trait Transport: Send + Sync {
    fn install_rule(&self, flow_mod: &FlowMod) -> Result<usize, TransportError>;

    fn send_packet_out(&self, packet_out: &PacketOut) -> Result<usize, TransportError>;
}

/// Transport that only logs commands. Used by the replay binary, where no
/// switch is listening.
#[derive(Debug, Default, Clone)]
pub struct LoggingTransport;

impl Transport for LoggingTransport {
    fn install_rule(&self, flow_mod: &FlowMod) -> Result<usize, TransportError> {
        let len = flow_mod.encoded_len();
        debug!(
            switch = flow_mod.switch,
            priority = flow_mod.priority,
            bytes = len,
            "[TX] flow_mod {:?} -> {:?}",
            flow_mod.matching,
            flow_mod.actions
        );
        Ok(len)
    }

    fn send_packet_out(&self, packet_out: &PacketOut) -> Result<usize, TransportError> {
        let len = packet_out.encoded_len();
        debug!(
            switch = packet_out.switch,
            in_port = packet_out.in_port,
            bytes = len,
            "[TX] packet_out {:?}",
            packet_out.actions
        );
        Ok(len)
    }
}

fn pad8(len: usize) -> usize {
    len.div_ceil(OFP_HEADER_LEN) * OFP_HEADER_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_miss_flow_mod_size() {
        let flow_mod = FlowMod {
            switch: 1,
            priority: 0,
            matching: FlowMatch::any(),
            actions: vec![Action::Controller { max_len: Action::CONTROLLER_NO_BUFFER }],
            buffer_id: None,
        };
        // 56-byte flow_mod with empty match, 8-byte instruction, 16-byte action.
        assert_eq!(flow_mod.encoded_len(), 80);
    }

    #[test]
    fn test_exact_match_is_padded() {
        let m = FlowMatch::exact(1, MacAddr([0, 0, 0, 0, 0, 2]), MacAddr([0, 0, 0, 0, 0, 1]));
        // 4 + 8 + 10 + 10 = 32
        assert_eq!(m.encoded_len(), 32);
    }

    #[test]
    fn test_packet_out_size_includes_data() {
        let out = PacketOut {
            switch: 1,
            buffer_id: None,
            data: Some(vec![0u8; 60]),
            in_port: 1,
            actions: vec![Action::Flood],
        };
        assert_eq!(out.encoded_len(), 24 + 16 + 60);
        assert_eq!(LoggingTransport.send_packet_out(&out).unwrap(), 100);
    }
}
