//! Modules and the handles the patcher uses to reach them.
//!
//! A module is anything that exposes ports on the patch bay: a keyboard, a
//! metronome, a synth voice. The core only cares about two things: its
//! identity, and its intake entry point for data arriving from a connected
//! sender. Everything else about a module is its own business.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};
use uuid::Uuid;

use crate::fanout::FanOut;
use crate::port::Port;
use crate::types::{Anchor, Role, SignalKind};

/// Behaviour a module plugs into the patch bay.
pub trait Module: Send + Sync {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    /// Intake for data pushed by a connected sender.
    fn receive(&self, _kind: &SignalKind, _payload: &[u8]) {}
}

/// Stable identity of a module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(Uuid);

impl ModuleId {
    pub fn new() -> Self {
        ModuleId(Uuid::new_v4())
    }
}

impl Default for ModuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) struct Node {
    pub(crate) id: ModuleId,
    pub(crate) module: Box<dyn Module>,
    pub(crate) fanout: FanOut,
}

/// Owning handle to a module and its fan-out registry.
///
/// Cloning is cheap and yields a handle to the same module. Ports only hold a
/// weak reference, so dropping every handle drops the module even while it is
/// still patched.
#[derive(Clone)]
pub struct ModuleHandle {
    pub(crate) inner: Arc<Node>,
}

impl ModuleHandle {
    pub fn new(module: impl Module + 'static) -> Self {
        Self::from_boxed(Box::new(module))
    }

    pub fn from_boxed(module: Box<dyn Module>) -> Self {
        Self {
            inner: Arc::new(Node {
                id: ModuleId::new(),
                module,
                fanout: FanOut::default(),
            }),
        }
    }

    pub fn id(&self) -> ModuleId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        self.inner.module.name()
    }

    /// Access the wrapped module.
    pub fn module(&self) -> &dyn Module {
        self.inner.module.as_ref()
    }

    /// The receivers this module's sender ports currently feed.
    pub fn fanout(&self) -> &FanOut {
        &self.inner.fanout
    }

    /// Create a port on this module without a visual anchor.
    pub fn port(&self, kind: impl Into<SignalKind>, role: Role) -> Port {
        Port::new(self, kind.into(), role, None)
    }

    /// Create a port on this module drawn at `anchor`.
    pub fn anchored_port(&self, kind: impl Into<SignalKind>, role: Role, anchor: Anchor) -> Port {
        Port::new(self, kind.into(), role, Some(anchor))
    }

    pub fn sender(&self, kind: impl Into<SignalKind>) -> Port {
        self.port(kind, Role::Sender)
    }

    pub fn receiver(&self, kind: impl Into<SignalKind>) -> Port {
        self.port(kind, Role::Receiver)
    }

    /// Push `payload` out of this module's `kind` sender port. Returns the
    /// number of receivers it was delivered to.
    pub fn emit(&self, kind: &SignalKind, payload: &[u8]) -> usize {
        self.inner.fanout.emit(kind, payload)
    }

    pub fn ptr_eq(&self, other: &ModuleHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<Node> {
        Arc::downgrade(&self.inner)
    }
}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("id", &self.inner.id)
            .field("name", &self.name())
            .finish()
    }
}
