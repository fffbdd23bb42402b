//! Client-side table of known gateways, populated by ADVERTISE/GWINFO and
//! aged out by the advertised duration plus a grace window.
//!
//! Grounded on the teacher's `mqtt-broker/src/mailbox.rs`/`session.rs` style
//! of small fixed-capacity peer bookkeeping, adapted to the gateway-liveness
//! semantics MQTT-SN's discovery procedure (spec.md §4.2) defines and plain
//! MQTT has no equivalent of.

use std::time::{Duration, Instant};

/// Gateways that go quiet are still considered reachable for this long past
/// their advertised duration, to absorb jitter on lossy links.
pub const LIVENESS_GRACE: Duration = Duration::from_secs(60);

pub const DEFAULT_TABLE_CAPACITY: usize = 5;

#[derive(Debug, Clone)]
pub struct GatewayEntry {
    address: Vec<u8>,
    gw_id: u8,
    advertised_duration: Duration,
    last_activity: Instant,
    /// Set by out-of-band configuration; permanent entries are never evicted
    /// regardless of liveness and are preferred over discovered ones.
    permanent: bool,
}

impl GatewayEntry {
    pub fn address(&self) -> &[u8] {
        &self.address
    }

    pub fn gw_id(&self) -> u8 {
        self.gw_id
    }

    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.permanent || now.duration_since(self.last_activity) <= self.advertised_duration + LIVENESS_GRACE
    }
}

#[derive(Debug)]
pub struct GatewayTable {
    capacity: usize,
    entries: Vec<GatewayEntry>,
}

impl GatewayTable {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Vec::new() }
    }

    pub fn add_permanent(&mut self, address: Vec<u8>, gw_id: u8) {
        self.entries.push(GatewayEntry {
            address,
            gw_id,
            advertised_duration: Duration::MAX,
            last_activity: Instant::now(),
            permanent: true,
        });
    }

    /// Records an ADVERTISE/GWINFO sighting, refreshing liveness for an
    /// existing entry or inserting a new one. Evicts the least-recently-seen
    /// non-permanent entry when the table is full and a new gateway arrives.
    pub fn observe(&mut self, address: Vec<u8>, gw_id: u8, advertised_duration: Duration, now: Instant) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.address == address) {
            entry.gw_id = gw_id;
            entry.advertised_duration = advertised_duration;
            entry.last_activity = now;
            return;
        }

        if self.entries.len() >= self.capacity {
            let evict_idx = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| !e.permanent)
                .min_by_key(|(_, e)| e.last_activity)
                .map(|(idx, _)| idx);
            match evict_idx {
                Some(idx) => {
                    self.entries[idx] = GatewayEntry { address, gw_id, advertised_duration, last_activity: now, permanent: false };
                }
                None => return, // table is full of permanent entries; drop the sighting
            }
            return;
        }

        self.entries.push(GatewayEntry { address, gw_id, advertised_duration, last_activity: now, permanent: false });
    }

    pub fn get_by_id(&self, gw_id: u8) -> Option<&GatewayEntry> {
        self.entries.iter().find(|e| e.gw_id == gw_id)
    }

    pub fn get_by_address(&self, address: &[u8]) -> Option<&GatewayEntry> {
        self.entries.iter().find(|e| e.address == address)
    }

    /// Any gateway still considered live at `now`, preferring permanent
    /// entries over discovered ones.
    pub fn best_active(&self, now: Instant) -> Option<&GatewayEntry> {
        self.entries
            .iter()
            .filter(|e| e.is_active(now))
            .max_by_key(|e| e.permanent)
    }

    pub fn prune_inactive(&mut self, now: Instant) {
        self.entries.retain(|e| e.is_active(now));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for GatewayTable {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observed_gateway_is_active_within_advertised_window() {
        let mut t = GatewayTable::default();
        let t0 = Instant::now();
        t.observe(vec![1], 7, Duration::from_secs(300), t0);
        assert!(t.get_by_id(7).unwrap().is_active(t0 + Duration::from_secs(300)));
    }

    #[test]
    fn gateway_expires_after_duration_plus_grace() {
        let mut t = GatewayTable::default();
        let t0 = Instant::now();
        t.observe(vec![1], 7, Duration::from_secs(100), t0);
        assert!(t.get_by_id(7).unwrap().is_active(t0 + Duration::from_secs(159)));
        assert!(!t.get_by_id(7).unwrap().is_active(t0 + Duration::from_secs(161)));
    }

    #[test]
    fn permanent_entries_are_always_active() {
        let mut t = GatewayTable::default();
        t.add_permanent(vec![9], 1);
        assert!(t.get_by_id(1).unwrap().is_active(Instant::now() + Duration::from_secs(1_000_000)));
    }

    #[test]
    fn table_evicts_oldest_non_permanent_when_full() {
        let mut t = GatewayTable::new(2);
        let t0 = Instant::now();
        t.observe(vec![1], 1, Duration::from_secs(300), t0);
        t.observe(vec![2], 2, Duration::from_secs(300), t0 + Duration::from_secs(1));
        t.observe(vec![3], 3, Duration::from_secs(300), t0 + Duration::from_secs(2));
        assert_eq!(t.len(), 2);
        assert!(t.get_by_id(1).is_none());
        assert!(t.get_by_id(3).is_some());
    }

    #[test]
    fn prune_inactive_removes_expired_entries() {
        let mut t = GatewayTable::default();
        let t0 = Instant::now();
        t.observe(vec![1], 1, Duration::from_secs(10), t0);
        t.prune_inactive(t0 + Duration::from_secs(1000));
        assert!(t.is_empty());
    }
}
