/*!
Mock transport for running the controller without switches.

Records every flow-mod and packet-out in send order and can fail sends on
demand, so tests can assert both on what the controller sent and on what
it recorded when a send did not go through.
*/

use ofmetrics_controller::transport::{FlowMod, PacketOut, Transport, TransportError};
use ofmetrics_controller::SwitchId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum SentCommand {
    FlowMod(FlowMod),
    PacketOut(PacketOut),
}

impl SentCommand {
    pub fn switch(&self) -> SwitchId {
        match self {
            SentCommand::FlowMod(f) => f.switch,
            SentCommand::PacketOut(p) => p.switch,
        }
    }
}

#[derive(Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<SentCommand>>>,
    failures_left: Arc<AtomicUsize>,
    send_delay: Arc<Mutex<Option<Duration>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` sends, whatever their kind.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Block inside every send, like a slow control channel would.
    pub fn set_send_delay(&self, delay: Option<Duration>) {
        *self.send_delay.lock() = delay;
    }

    fn dispatch(&self, switch: SwitchId, command: SentCommand) -> Result<(), TransportError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            log::warn!("[MOCK] dropping command to {:#x}", switch);
            return Err(TransportError::Send { switch, reason: "injected failure".into() });
        }

        if let Some(delay) = *self.send_delay.lock() {
            std::thread::sleep(delay);
        }
        log::debug!("[MOCK] sent {:?}", command);
        self.sent.lock().push(command);
        Ok(())
    }

    pub fn sent(&self) -> Vec<SentCommand> {
        self.sent.lock().clone()
    }

    pub fn flow_mods(&self) -> Vec<FlowMod> {
        self.sent
            .lock()
            .iter()
            .filter_map(|c| match c {
                SentCommand::FlowMod(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    /// Flow-mods above the table-miss priority.
    pub fn forwarding_rules(&self) -> Vec<FlowMod> {
        self.flow_mods().into_iter().filter(|f| f.priority > 0).collect()
    }

    pub fn packet_outs(&self) -> Vec<PacketOut> {
        self.sent
            .lock()
            .iter()
            .filter_map(|c| match c {
                SentCommand::PacketOut(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Transport for MockTransport {
    fn install_rule(&self, flow_mod: &FlowMod) -> Result<usize, TransportError> {
        self.dispatch(flow_mod.switch, SentCommand::FlowMod(flow_mod.clone()))?;
        Ok(flow_mod.encoded_len())
    }

    fn send_packet_out(&self, packet_out: &PacketOut) -> Result<usize, TransportError> {
        self.dispatch(packet_out.switch, SentCommand::PacketOut(packet_out.clone()))?;
        Ok(packet_out.encoded_len())
    }
}
