/*!
Builders for switch events and the raw frames they carry.
*/

use ofmetrics_controller::models::{BufferId, HandshakeKind, MacAddr, PortNo, PortReason, SwitchEvent, SwitchId};
use ofmetrics_controller::packet::ETH_TYPE_LLDP;

const ETH_TYPE_IPV4: u16 = 0x0800;
/// Minimum Ethernet frame without FCS.
const MIN_FRAME_LEN: usize = 60;
/// Features reply size for a switch with no ports listed (OpenFlow 1.3).
const FEATURES_REPLY_LEN: u64 = 32;

pub struct EventBuilder;

impl EventBuilder {
    /// Host address `00:00:00:00:00:<host>`.
    pub fn mac(host: u8) -> MacAddr {
        MacAddr([0, 0, 0, 0, 0, host])
    }

    pub fn frame(dst: MacAddr, src: MacAddr, ethertype: u16) -> Vec<u8> {
        let mut data = Vec::with_capacity(MIN_FRAME_LEN);
        data.extend_from_slice(&dst.octets());
        data.extend_from_slice(&src.octets());
        data.extend_from_slice(&ethertype.to_be_bytes());
        data.resize(MIN_FRAME_LEN, 0);
        data
    }

    pub fn connect(switch: SwitchId) -> SwitchEvent {
        SwitchEvent::SwitchConnected { switch, features_len: FEATURES_REPLY_LEN }
    }

    /// Unbuffered IPv4 packet from host `src` to host `dst`.
    pub fn packet(switch: SwitchId, in_port: PortNo, src: u8, dst: u8) -> SwitchEvent {
        SwitchEvent::PacketArrived {
            switch,
            in_port,
            data: Self::frame(Self::mac(dst), Self::mac(src), ETH_TYPE_IPV4),
            buffer_id: None,
        }
    }

    pub fn buffered_packet(switch: SwitchId, in_port: PortNo, src: u8, dst: u8, buffer_id: BufferId) -> SwitchEvent {
        SwitchEvent::PacketArrived {
            switch,
            in_port,
            data: Self::frame(Self::mac(dst), Self::mac(src), ETH_TYPE_IPV4),
            buffer_id: Some(buffer_id),
        }
    }

    pub fn lldp(switch: SwitchId, in_port: PortNo) -> SwitchEvent {
        SwitchEvent::PacketArrived {
            switch,
            in_port,
            data: Self::frame(MacAddr([0x01, 0x80, 0xc2, 0, 0, 0x0e]), Self::mac(0xfe), ETH_TYPE_LLDP),
            buffer_id: None,
        }
    }

    /// Frame shorter than an Ethernet header.
    pub fn truncated(switch: SwitchId, in_port: PortNo) -> SwitchEvent {
        SwitchEvent::PacketArrived { switch, in_port, data: vec![0xde, 0xad, 0xbe, 0xef], buffer_id: None }
    }

    pub fn port_status(switch: SwitchId, port: PortNo, reason: PortReason) -> SwitchEvent {
        SwitchEvent::PortStatusChanged { switch, port, reason }
    }

    pub fn echo_request(switch: SwitchId) -> SwitchEvent {
        SwitchEvent::ControlMessage { switch, kind: HandshakeKind::EchoRequest, size: 8 }
    }

    /// One line of a replay file.
    pub fn to_json_line(event: &SwitchEvent) -> serde_json::Result<String> {
        serde_json::to_string(event)
    }
}
