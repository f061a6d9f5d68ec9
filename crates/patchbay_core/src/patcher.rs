//! The connection manager.
//!
//! Users patch by touching two ports: a sender then a receiver, or the other
//! way round. Every touch is reported to [`Patcher::select`]. The first touch
//! is held as pending; the second resolves the pair:
//!
//! - not one sender and one receiver, mismatched kinds, or both ends on the
//!   same module: rejected, nothing changes;
//! - otherwise the pair is toggled: connected if absent, disconnected if
//!   present.
//!
//! Either way both touched controls are reset and the pending stack is empty
//! again before `select` returns.

use parking_lot::{Mutex, MutexGuard};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::config::PatcherConfig;
use crate::connection::Connection;
use crate::error::{InvariantViolation, Rejection};
use crate::module::{ModuleHandle, ModuleId};
use crate::port::Port;
use crate::types::{Anchor, GuiId, LineId, Role, SignalKind};
use crate::visual::{NullVisuals, VisualLayer, VisualRequest};

/// Result of reporting one selection.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// First half of a pair; waiting for the second selection.
    Pending,
    Connected {
        sender: Port,
        receiver: Port,
        line: Option<LineId>,
    },
    Disconnected {
        sender: Port,
        receiver: Port,
    },
    Rejected(Rejection),
}

impl Outcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pending => write!(f, "pending"),
            Outcome::Connected { sender, receiver, .. } => {
                write!(f, "connected {} -> {}", sender, receiver)
            }
            Outcome::Disconnected { sender, receiver } => {
                write!(f, "disconnected {} -> {}", sender, receiver)
            }
            Outcome::Rejected(reason) => write!(f, "rejected: {}", reason),
        }
    }
}

pub struct Patcher {
    config: PatcherConfig,
    visuals: Box<dyn VisualLayer>,
    pending: Vec<Port>,
    connections: Vec<Connection>,
    /// One port per module that has ever been selected, used to reach its
    /// fan-out registry.
    seen: HashMap<ModuleId, Port>,
    lines_visible: bool,
}

impl Default for Patcher {
    fn default() -> Self {
        Self::new(PatcherConfig::default(), NullVisuals)
    }
}

impl Patcher {
    pub fn new(config: PatcherConfig, visuals: impl VisualLayer + 'static) -> Self {
        Self::with_boxed_visuals(config, Box::new(visuals))
    }

    pub fn with_boxed_visuals(config: PatcherConfig, visuals: Box<dyn VisualLayer>) -> Self {
        let lines_visible = config.lines_visible;
        Self {
            config,
            visuals,
            pending: Vec::with_capacity(2),
            connections: Vec::new(),
            seen: HashMap::new(),
            lines_visible,
        }
    }

    pub fn config(&self) -> &PatcherConfig {
        &self.config
    }

    /// Report that a user touched the `kind`/`role` port of `module`, drawn
    /// at `anchor`.
    pub fn select(
        &mut self,
        module: &ModuleHandle,
        kind: impl Into<SignalKind>,
        role: Role,
        anchor: Option<Anchor>,
    ) -> Outcome {
        self.select_port(Port::new(module, kind.into(), role, anchor))
    }

    /// Report a touch on an existing port.
    pub fn select_port(&mut self, port: Port) -> Outcome {
        tracing::debug!("received patch point: {} {}", port.kind(), port.role());
        self.seen
            .entry(port.module_id())
            .or_insert_with(|| port.clone());
        self.pending.push(port);

        if self.pending.len() < 2 {
            tracing::debug!(
                "not doing anything, {} selection(s) pending",
                self.pending.len()
            );
            return Outcome::Pending;
        }

        // Drain before resolving so nothing pending can outlive this event.
        let selections = std::mem::take(&mut self.pending);
        debug_assert_eq!(selections.len(), 2, "resolution needs exactly two selections");
        tracing::debug!("have 2 pending patch points, checking for a match");

        let outcome = self.resolve(&selections[0], &selections[1]);
        for selection in &selections {
            self.reset_control(selection);
        }

        debug_assert!(
            self.check_consistency().is_ok(),
            "{:?}",
            self.check_consistency()
        );
        outcome
    }

    fn resolve(&mut self, first: &Port, second: &Port) -> Outcome {
        let (sender, receiver) = match (first.role(), second.role()) {
            (Role::Sender, Role::Receiver) => (first, second),
            (Role::Receiver, Role::Sender) => (second, first),
            _ => return self.reject(Rejection::RoleMismatch),
        };
        if sender.kind() != receiver.kind() {
            return self.reject(Rejection::KindMismatch);
        }
        if sender.same_module(receiver) {
            return self.reject(Rejection::SelfRouting);
        }

        tracing::info!("we have a match: {} -> {}", sender, receiver);
        let existing = self
            .connections
            .iter()
            .position(|c| c.links(sender, receiver));
        match existing {
            Some(index) => self.disconnect(index),
            None => self.connect(sender.clone(), receiver.clone()),
        }
    }

    fn reject(&self, reason: Rejection) -> Outcome {
        tracing::debug!("{}", reason);
        Outcome::Rejected(reason)
    }

    fn connect(&mut self, sender: Port, receiver: Port) -> Outcome {
        tracing::info!("patch doesn't yet exist, adding");
        match sender.module() {
            Some(module) => {
                module.fanout().add_receiver(&sender, receiver.clone());
            }
            None => tracing::info!("{} has no live module, connection is graph-only", sender),
        }

        let line = self.create_line(&sender, &receiver);
        self.connections.push(Connection {
            sender: sender.clone(),
            receiver: receiver.clone(),
            line,
        });
        Outcome::Connected {
            sender,
            receiver,
            line,
        }
    }

    fn disconnect(&mut self, index: usize) -> Outcome {
        tracing::info!("patch already exists, deleting");
        let connection = self.connections.remove(index);
        self.release(&connection);
        Outcome::Disconnected {
            sender: connection.sender,
            receiver: connection.receiver,
        }
    }

    /// Undo a connection's side effects outside the connection set.
    fn release(&self, connection: &Connection) {
        if let Some(module) = connection.sender.module() {
            module.fanout().remove_receiver(&connection.receiver);
        }
        if let Some(line) = connection.line {
            self.visuals.request(VisualRequest::DestroyLine { line });
        }
    }

    fn create_line(&self, sender: &Port, receiver: &Port) -> Option<LineId> {
        let (Some(from), Some(to)) = (sender.anchor(), receiver.anchor()) else {
            tracing::info!("missing visual anchor, {} -> {} has no line", sender, receiver);
            return None;
        };
        let (Some(from), Some(to)) = (
            self.visuals.world_position(&from, Role::Sender),
            self.visuals.world_position(&to, Role::Receiver),
        ) else {
            tracing::info!("visual layer cannot place {} -> {}, no line", sender, receiver);
            return None;
        };
        let line = LineId::next();
        self.visuals.request(VisualRequest::CreateLine {
            line,
            from,
            to,
            visible: self.lines_visible,
        });
        Some(line)
    }

    fn reset_control(&self, selection: &Port) {
        if let Some(anchor) = selection.anchor() {
            self.visuals.request(VisualRequest::SetControlState {
                control: anchor.control,
                armed: self.config.reset_armed,
            });
        }
    }

    /// Re-draw every line with an end on `gui`, e.g. after its panel moved.
    /// Returns the number of lines updated.
    pub fn refresh_visuals(&self, gui: GuiId) -> usize {
        tracing::debug!("updating patch lines touching {}", gui);
        let mut updated = 0;
        for connection in self.connections.iter().filter(|c| c.touches(gui)) {
            let Some(line) = connection.line else {
                continue;
            };
            let positions = connection
                .sender
                .anchor()
                .zip(connection.receiver.anchor())
                .and_then(|(from, to)| {
                    Some((
                        self.visuals.world_position(&from, Role::Sender)?,
                        self.visuals.world_position(&to, Role::Receiver)?,
                    ))
                });
            let Some((from, to)) = positions else {
                tracing::debug!("cannot place {}, leaving line as is", connection);
                continue;
            };
            self.visuals.request(VisualRequest::UpdateLine { line, from, to });
            updated += 1;
        }
        updated
    }

    pub fn show_all_visuals(&mut self) {
        self.set_lines_visible(true);
    }

    pub fn hide_all_visuals(&mut self) {
        self.set_lines_visible(false);
    }

    /// Whether lines are currently shown. New lines follow this state.
    pub fn lines_visible(&self) -> bool {
        self.lines_visible
    }

    fn set_lines_visible(&mut self, visible: bool) {
        self.lines_visible = visible;
        for line in self.connections.iter().filter_map(|c| c.line) {
            self.visuals.request(VisualRequest::SetLineVisible { line, visible });
        }
    }

    /// Drop every connection with an endpoint on a module that no longer
    /// exists. Returns the number removed.
    pub fn prune_detached(&mut self) -> usize {
        let (detached, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.connections)
            .into_iter()
            .partition(Connection::is_detached);
        self.connections = live;
        for connection in &detached {
            tracing::info!("removing detached connection {}", connection);
            self.release(connection);
        }
        self.seen.retain(|_, port| port.module().is_some());
        detached.len()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn is_connected(&self, sender: &Port, receiver: &Port) -> bool {
        self.connections.iter().any(|c| c.links(sender, receiver))
    }

    /// Number of selections waiting for a partner (0 or 1 between events).
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Verify the graph invariants: at most one pending selection, every
    /// connection well formed and unique, and the fan-out lists of every
    /// module that has passed through [`Patcher::select`] mirroring the
    /// connection set exactly. Fan-out lists of modules this patcher has never
    /// seen are not inspected.
    pub fn check_consistency(&self) -> Result<(), InvariantViolation> {
        if self.pending.len() > 1 {
            return Err(InvariantViolation::PendingOverflow {
                pending: self.pending.len(),
            });
        }

        let mut unique = HashSet::new();
        for connection in &self.connections {
            let (sender, receiver) = (&connection.sender, &connection.receiver);
            if !connection.is_well_formed() {
                return Err(InvariantViolation::MalformedConnection {
                    sender: sender.clone(),
                    receiver: receiver.clone(),
                });
            }
            if !unique.insert((sender, receiver)) {
                return Err(InvariantViolation::DuplicateConnection {
                    sender: sender.clone(),
                    receiver: receiver.clone(),
                });
            }
            let Some(module) = sender.module() else {
                continue;
            };
            let occurrences = module.fanout().count(receiver);
            if occurrences != 1 {
                return Err(InvariantViolation::FanOutMismatch {
                    sender: sender.clone(),
                    receiver: receiver.clone(),
                    occurrences,
                });
            }
        }

        for port in self.seen.values() {
            let Some(module) = port.module() else {
                continue;
            };
            for (kind, receiver) in module.fanout().entries() {
                let sender = module.sender(kind);
                if !self.is_connected(&sender, &receiver) {
                    return Err(InvariantViolation::OrphanedFanOut { sender, receiver });
                }
            }
        }
        Ok(())
    }
}

/// A [`Patcher`] behind a mutex, for when selections can arrive from more
/// than one thread. Each call holds the lock for one short, non-blocking
/// step; visual requests are queued, never awaited.
#[derive(Clone)]
pub struct SharedPatcher {
    inner: Arc<Mutex<Patcher>>,
}

impl SharedPatcher {
    pub fn new(patcher: Patcher) -> Self {
        Self {
            inner: Arc::new(Mutex::new(patcher)),
        }
    }

    pub fn select(
        &self,
        module: &ModuleHandle,
        kind: impl Into<SignalKind>,
        role: Role,
        anchor: Option<Anchor>,
    ) -> Outcome {
        self.inner.lock().select(module, kind, role, anchor)
    }

    pub fn select_port(&self, port: Port) -> Outcome {
        self.inner.lock().select_port(port)
    }

    pub fn refresh_visuals(&self, gui: GuiId) -> usize {
        self.inner.lock().refresh_visuals(gui)
    }

    pub fn show_all_visuals(&self) {
        self.inner.lock().show_all_visuals();
    }

    pub fn hide_all_visuals(&self) {
        self.inner.lock().hide_all_visuals();
    }

    /// Snapshot of the current connections.
    pub fn connections(&self) -> Vec<Connection> {
        self.inner.lock().connections().to_vec()
    }

    pub fn lock(&self) -> MutexGuard<'_, Patcher> {
        self.inner.lock()
    }
}
