use std::collections::HashMap;

use crate::models::{MacAddr, PortNo, SwitchId};

/// Learned host locations, per switch. Entries never age out.
///
/// Not synchronized on its own; the controller keeps it behind a mutex.
#[derive(Debug, Default)]
pub struct ForwardingTable {
    switches: HashMap<SwitchId, HashMap<MacAddr, PortNo>>,
}

impl ForwardingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `mac` as reachable through `port`; the latest packet wins.
    /// Returns the port previously recorded for this host, if any.
    pub fn learn(&mut self, switch: SwitchId, mac: MacAddr, port: PortNo) -> Option<PortNo> {
        self.switches.entry(switch).or_default().insert(mac, port)
    }

    pub fn lookup(&self, switch: SwitchId, mac: &MacAddr) -> Option<PortNo> {
        self.switches.get(&switch)?.get(mac).copied()
    }

    /// Number of hosts learned on one switch.
    pub fn hosts(&self, switch: SwitchId) -> usize {
        self.switches.get(&switch).map_or(0, HashMap::len)
    }

    /// Number of hosts learned across all switches.
    pub fn len(&self) -> usize {
        self.switches.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(n: u8) -> MacAddr {
        MacAddr([0, 0, 0, 0, 0, n])
    }

    #[test]
    fn test_last_write_wins() {
        let mut table = ForwardingTable::new();
        assert_eq!(table.learn(1, mac(1), 1), None);
        assert_eq!(table.learn(1, mac(1), 3), Some(1));
        assert_eq!(table.lookup(1, &mac(1)), Some(3));
        assert_eq!(table.hosts(1), 1);
    }

    #[test]
    fn test_switches_are_isolated() {
        let mut table = ForwardingTable::new();
        table.learn(1, mac(1), 1);
        table.learn(2, mac(1), 7);
        assert_eq!(table.lookup(1, &mac(1)), Some(1));
        assert_eq!(table.lookup(2, &mac(1)), Some(7));
        assert_eq!(table.lookup(3, &mac(1)), None);
        assert_eq!(table.len(), 2);
    }
}
