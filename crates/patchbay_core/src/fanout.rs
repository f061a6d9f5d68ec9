//! Per-module registry of downstream receivers.
//!
//! Each sender port (one per signal kind) keeps an ordered list of the
//! receiver ports it feeds. Lists are copy-on-write: [`FanOut::emit`] grabs the
//! current snapshot and delivers outside the lock, so a receiver's intake may
//! emit further, and the patcher may rewire concurrently, without either side
//! blocking the other. A frame racing a rewire may go to the old snapshot.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::port::Port;
use crate::types::SignalKind;

#[derive(Default)]
pub struct FanOut {
    routes: RwLock<HashMap<SignalKind, Arc<Vec<Port>>>>,
}

impl FanOut {
    /// Append `receiver` to the list fed by `sender`. Idempotent; returns true
    /// if the list changed.
    pub fn add_receiver(&self, sender: &Port, receiver: Port) -> bool {
        debug_assert!(sender.is_sender(), "fan-out is keyed by sender ports");
        let mut routes = self.routes.write();
        let list = routes.entry(sender.kind().clone()).or_default();
        if list.contains(&receiver) {
            return false;
        }
        Arc::make_mut(list).push(receiver);
        true
    }

    /// Remove `receiver` if present. Never fails; returns true if the list
    /// changed.
    pub fn remove_receiver(&self, receiver: &Port) -> bool {
        let mut routes = self.routes.write();
        let Some(list) = routes.get_mut(receiver.kind()) else {
            return false;
        };
        let Some(index) = list.iter().position(|r| r == receiver) else {
            return false;
        };
        Arc::make_mut(list).remove(index);
        if list.is_empty() {
            routes.remove(receiver.kind());
        }
        true
    }

    /// Deliver `payload` to every receiver fed by the `kind` sender port, in
    /// insertion order. Receivers whose module has gone away are skipped.
    /// Returns the number of deliveries.
    pub fn emit(&self, kind: &SignalKind, payload: &[u8]) -> usize {
        let Some(snapshot) = self.snapshot(kind) else {
            return 0;
        };
        let mut delivered = 0;
        for receiver in snapshot.iter() {
            if receiver.deliver(kind, payload) {
                delivered += 1;
            } else {
                tracing::trace!("skipping dropped receiver {:?}", receiver);
            }
        }
        delivered
    }

    /// Snapshot of the receivers fed by the `kind` sender port.
    pub fn receivers(&self, kind: &SignalKind) -> Vec<Port> {
        self.snapshot(kind)
            .map(|list| list.as_ref().clone())
            .unwrap_or_default()
    }

    /// Number of times `receiver` appears in its kind's list (0 or 1 when the
    /// registry is consistent).
    pub fn count(&self, receiver: &Port) -> usize {
        self.snapshot(receiver.kind())
            .map(|list| list.iter().filter(|r| *r == receiver).count())
            .unwrap_or(0)
    }

    pub fn contains(&self, receiver: &Port) -> bool {
        self.count(receiver) > 0
    }

    /// Every (kind, receiver) pair in the registry.
    pub fn entries(&self) -> Vec<(SignalKind, Port)> {
        let routes = self.routes.read();
        let mut entries = routes
            .iter()
            .flat_map(|(kind, list)| list.iter().map(move |r| (kind.clone(), r.clone())))
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().values().all(|list| list.is_empty())
    }

    fn snapshot(&self, kind: &SignalKind) -> Option<Arc<Vec<Port>>> {
        self.routes.read().get(kind).cloned()
    }
}
