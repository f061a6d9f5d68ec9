//! Integration tests for the patch routing core.
//!
//! These drive the patcher only through its public selection API, the way an
//! interaction layer would, and check the connection set, the fan-out lists
//! and the data path after every step.

use parking_lot::Mutex;
use patchbay_core::types::{AUDIO, HEARTBEAT, MIDI};
use patchbay_core::{
    Module, ModuleHandle, Outcome, Patcher, Port, Rejection, Role, SharedPatcher, SignalKind,
};
use std::sync::Arc;

// ─── Helpers ──────────────────────────────────────────────────────────────────

type Inbox = Arc<Mutex<Vec<(SignalKind, Vec<u8>)>>>;

/// Module that records everything it receives.
struct Probe {
    name: String,
    inbox: Inbox,
}

impl Module for Probe {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&self, kind: &SignalKind, payload: &[u8]) {
        self.inbox.lock().push((kind.clone(), payload.to_vec()));
    }
}

fn probe(name: &str) -> (ModuleHandle, Inbox) {
    let inbox = Inbox::default();
    let module = ModuleHandle::new(Probe {
        name: name.to_string(),
        inbox: inbox.clone(),
    });
    (module, inbox)
}

/// Module that, on receiving anything, replays queued selections through a
/// shared patcher.
struct Unplugger {
    patcher: SharedPatcher,
    touches: Arc<Mutex<Vec<Port>>>,
    received: Arc<Mutex<usize>>,
}

impl Module for Unplugger {
    fn name(&self) -> &str {
        "unplugger"
    }

    fn receive(&self, _kind: &SignalKind, _payload: &[u8]) {
        *self.received.lock() += 1;
        let touches = std::mem::take(&mut *self.touches.lock());
        for port in touches {
            self.patcher.select_port(port);
        }
    }
}

/// Select two ports and assert the graph is consistent afterwards.
fn patch(
    patcher: &mut Patcher,
    first: (&ModuleHandle, SignalKind, Role),
    second: (&ModuleHandle, SignalKind, Role),
) -> Outcome {
    assert_eq!(
        patcher.select(first.0, first.1, first.2, None),
        Outcome::Pending
    );
    let outcome = patcher.select(second.0, second.1, second.2, None);
    assert_eq!(patcher.pending(), 0);
    patcher
        .check_consistency()
        .unwrap_or_else(|e| panic!("inconsistent after {outcome}: {e}"));
    outcome
}

// ─── Worked examples ─────────────────────────────────────────────────────────

#[test]
fn example_connect_sender_to_receiver() {
    let (a, _) = probe("A");
    let (b, _) = probe("B");
    let mut patcher = Patcher::default();

    let outcome = patch(
        &mut patcher,
        (&a, MIDI, Role::Sender),
        (&b, MIDI, Role::Receiver),
    );
    assert!(matches!(outcome, Outcome::Connected { .. }));
    assert_eq!(patcher.connections().len(), 1);
    assert_eq!(a.fanout().receivers(&MIDI), vec![b.receiver(MIDI)]);
}

#[test]
fn example_repeat_disconnects() {
    let (a, _) = probe("A");
    let (b, _) = probe("B");
    let mut patcher = Patcher::default();

    patch(
        &mut patcher,
        (&a, MIDI, Role::Sender),
        (&b, MIDI, Role::Receiver),
    );
    let outcome = patch(
        &mut patcher,
        (&a, MIDI, Role::Sender),
        (&b, MIDI, Role::Receiver),
    );
    assert!(matches!(outcome, Outcome::Disconnected { .. }));
    assert!(patcher.connections().is_empty());
    assert!(a.fanout().receivers(&MIDI).is_empty());
}

#[test]
fn example_self_loop_refused() {
    let (a, _) = probe("A");
    let mut patcher = Patcher::default();

    let outcome = patch(
        &mut patcher,
        (&a, MIDI, Role::Sender),
        (&a, MIDI, Role::Receiver),
    );
    assert_eq!(outcome, Outcome::Rejected(Rejection::SelfRouting));
    assert!(patcher.connections().is_empty());
    assert!(a.fanout().is_empty());
}

#[test]
fn example_kind_mismatch_refused() {
    let (a, _) = probe("A");
    let (b, _) = probe("B");
    let mut patcher = Patcher::default();

    let outcome = patch(
        &mut patcher,
        (&a, MIDI, Role::Sender),
        (&b, AUDIO, Role::Receiver),
    );
    assert_eq!(outcome, Outcome::Rejected(Rejection::KindMismatch));
    assert!(patcher.connections().is_empty());
}

#[test]
fn example_two_senders_refused() {
    let (a, _) = probe("A");
    let mut patcher = Patcher::default();

    let outcome = patch(
        &mut patcher,
        (&a, MIDI, Role::Sender),
        (&a, MIDI, Role::Sender),
    );
    assert_eq!(outcome, Outcome::Rejected(Rejection::RoleMismatch));
    assert!(patcher.connections().is_empty());
}

// ─── Properties ──────────────────────────────────────────────────────────────

#[test]
fn toggle_is_order_independent() {
    let (a, _) = probe("A");
    let (b, _) = probe("B");
    let mut patcher = Patcher::default();

    patch(
        &mut patcher,
        (&a, MIDI, Role::Sender),
        (&b, MIDI, Role::Receiver),
    );
    let outcome = patch(
        &mut patcher,
        (&b, MIDI, Role::Receiver),
        (&a, MIDI, Role::Sender),
    );
    assert!(matches!(outcome, Outcome::Disconnected { .. }));
    assert!(patcher.connections().is_empty());
}

#[test]
fn toggle_leaves_other_connections_alone() {
    let (a, _) = probe("A");
    let (b, _) = probe("B");
    let (c, _) = probe("C");
    let mut patcher = Patcher::default();

    patch(
        &mut patcher,
        (&a, MIDI, Role::Sender),
        (&b, MIDI, Role::Receiver),
    );
    patch(
        &mut patcher,
        (&a, MIDI, Role::Sender),
        (&c, MIDI, Role::Receiver),
    );
    patch(
        &mut patcher,
        (&c, MIDI, Role::Receiver),
        (&a, MIDI, Role::Sender),
    );

    assert_eq!(patcher.connections().len(), 1);
    assert!(patcher.is_connected(&a.sender(MIDI), &b.receiver(MIDI)));
    assert_eq!(a.fanout().receivers(&MIDI), vec![b.receiver(MIDI)]);
}

#[test]
fn fan_out_and_fan_in_are_both_supported() {
    let (a, _) = probe("A");
    let (b, _) = probe("B");
    let (c, inbox_c) = probe("C");
    let mut patcher = Patcher::default();

    patch(
        &mut patcher,
        (&a, MIDI, Role::Sender),
        (&c, MIDI, Role::Receiver),
    );
    patch(
        &mut patcher,
        (&b, MIDI, Role::Sender),
        (&c, MIDI, Role::Receiver),
    );
    patch(
        &mut patcher,
        (&a, MIDI, Role::Sender),
        (&b, MIDI, Role::Receiver),
    );
    assert_eq!(patcher.connections().len(), 3);

    assert_eq!(a.emit(&MIDI, &[1]), 2);
    assert_eq!(b.emit(&MIDI, &[2]), 1);
    let inbox = inbox_c.lock();
    assert_eq!(*inbox, vec![(MIDI, vec![1]), (MIDI, vec![2])]);
}

#[test]
fn emitted_data_follows_the_patch() {
    let (keys, _) = probe("keys");
    let (synth, inbox) = probe("synth");
    let mut patcher = Patcher::default();

    assert_eq!(keys.emit(&MIDI, &[0x90, 60, 100]), 0);
    patch(
        &mut patcher,
        (&keys, MIDI, Role::Sender),
        (&synth, MIDI, Role::Receiver),
    );
    assert_eq!(keys.emit(&MIDI, &[0x90, 60, 100]), 1);
    patch(
        &mut patcher,
        (&keys, MIDI, Role::Sender),
        (&synth, MIDI, Role::Receiver),
    );
    assert_eq!(keys.emit(&MIDI, &[0x80, 60, 0]), 0);

    assert_eq!(*inbox.lock(), vec![(MIDI, vec![0x90, 60, 100])]);
}

#[test]
fn separate_sender_ports_keep_separate_fan_out() {
    let (clock, _) = probe("metronome");
    let (a, inbox_a) = probe("A");
    let (b, inbox_b) = probe("B");
    let mut patcher = Patcher::default();

    patch(
        &mut patcher,
        (&clock, HEARTBEAT, Role::Sender),
        (&a, HEARTBEAT, Role::Receiver),
    );
    patch(
        &mut patcher,
        (&clock, MIDI, Role::Sender),
        (&b, MIDI, Role::Receiver),
    );

    clock.emit(&HEARTBEAT, &[]);
    assert_eq!(inbox_a.lock().len(), 1);
    assert!(inbox_b.lock().is_empty());
}

#[test]
fn pending_selection_never_leaks_past_a_resolution() {
    let (a, _) = probe("A");
    let (b, _) = probe("B");
    let (c, _) = probe("C");
    let mut patcher = Patcher::default();

    // A rejected pair must not leave its second selection armed.
    patch(
        &mut patcher,
        (&a, MIDI, Role::Sender),
        (&b, MIDI, Role::Sender),
    );
    assert_eq!(
        patcher.select(&c, MIDI, Role::Receiver, None),
        Outcome::Pending
    );
    assert!(matches!(
        patcher.select(&a, MIDI, Role::Sender, None),
        Outcome::Connected { .. }
    ));
    assert!(patcher.is_connected(&a.sender(MIDI), &c.receiver(MIDI)));
    assert!(!patcher.is_connected(&b.sender(MIDI), &c.receiver(MIDI)));
}

#[test]
fn intake_can_unpatch_its_own_sender_mid_emit() {
    let (source, _) = probe("source");
    let shared = SharedPatcher::new(Patcher::default());
    let touches = Arc::new(Mutex::new(Vec::new()));
    let received = Arc::new(Mutex::new(0));
    let sink = ModuleHandle::new(Unplugger {
        patcher: shared.clone(),
        touches: touches.clone(),
        received: received.clone(),
    });

    shared.select(&source, MIDI, Role::Sender, None);
    shared.select(&sink, MIDI, Role::Receiver, None);
    assert_eq!(shared.connections().len(), 1);

    // The sink's intake toggles the very connection it is being fed through.
    touches
        .lock()
        .extend([source.sender(MIDI), sink.receiver(MIDI)]);
    assert_eq!(source.emit(&MIDI, &[1]), 1);

    assert_eq!(*received.lock(), 1);
    assert!(shared.connections().is_empty());
    assert!(source.fanout().is_empty());
    shared.lock().check_consistency().unwrap();
    assert_eq!(source.emit(&MIDI, &[2]), 0);
}

/// Deterministic pseudo-random walk over selections, checking every invariant
/// after each event and mirroring the expected connection set by hand.
#[test]
fn random_selection_walk_stays_consistent() {
    let modules: Vec<_> = ["A", "B", "C", "D"].iter().map(|n| probe(n).0).collect();
    let kinds = [MIDI, AUDIO];
    let roles = [Role::Sender, Role::Receiver];
    let mut patcher = Patcher::default();
    let mut expected: Vec<(usize, SignalKind, usize)> = Vec::new();
    let mut first: Option<(usize, SignalKind, Role)> = None;

    let mut seed: u64 = 0x5eed;
    let mut next = |n: usize| {
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((seed >> 33) as usize) % n
    };

    for _ in 0..2_000 {
        let m = next(modules.len());
        let kind = kinds[next(kinds.len())].clone();
        let role = roles[next(roles.len())];
        let outcome = patcher.select(&modules[m], kind.clone(), role, None);
        assert!(patcher.pending() <= 1);

        match first.take() {
            None => {
                assert_eq!(outcome, Outcome::Pending);
                first = Some((m, kind, role));
            }
            Some((m0, kind0, role0)) => {
                let pair = match (role0, role) {
                    (Role::Sender, Role::Receiver) => Some(((m0, kind0), (m, kind))),
                    (Role::Receiver, Role::Sender) => Some(((m, kind), (m0, kind0))),
                    _ => None,
                };
                match pair {
                    None => assert_eq!(outcome, Outcome::Rejected(Rejection::RoleMismatch)),
                    Some(((_, ks), (_, kr))) if ks != kr => {
                        assert_eq!(outcome, Outcome::Rejected(Rejection::KindMismatch));
                    }
                    Some(((s, _), (r, _))) if s == r => {
                        assert_eq!(outcome, Outcome::Rejected(Rejection::SelfRouting));
                    }
                    Some(((s, k), (r, _))) => {
                        let edge = (s, k, r);
                        if let Some(i) = expected.iter().position(|e| *e == edge) {
                            expected.remove(i);
                            assert!(matches!(outcome, Outcome::Disconnected { .. }));
                        } else {
                            expected.push(edge);
                            assert!(matches!(outcome, Outcome::Connected { .. }));
                        }
                    }
                }
            }
        }

        patcher.check_consistency().unwrap();
        assert_eq!(patcher.connections().len(), expected.len());
        for (s, k, r) in &expected {
            let sender = modules[*s].sender(k.clone());
            let receiver = modules[*r].receiver(k.clone());
            assert!(patcher.is_connected(&sender, &receiver));
            assert_eq!(modules[*s].fanout().count(&receiver), 1);
        }
    }
}
