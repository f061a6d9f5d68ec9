use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Weak;

use crate::module::{ModuleHandle, ModuleId, Node};
use crate::types::{Anchor, Role, SignalKind};

/// A typed connection endpoint on a module.
///
/// Identity is (module, kind, role). The anchor only says where the port is
/// drawn and does not take part in equality, so a module's send and receive
/// ports of the same kind stay distinct even when they share a panel.
#[derive(Clone)]
pub struct Port {
    module: Weak<Node>,
    module_id: ModuleId,
    kind: SignalKind,
    role: Role,
    anchor: Option<Anchor>,
}

impl Port {
    pub fn new(
        module: &ModuleHandle,
        kind: SignalKind,
        role: Role,
        anchor: Option<Anchor>,
    ) -> Self {
        Self {
            module: module.downgrade(),
            module_id: module.id(),
            kind,
            role,
            anchor,
        }
    }

    /// The owning module, if it is still alive.
    pub fn module(&self) -> Option<ModuleHandle> {
        let inner = self.module.upgrade()?;
        Some(ModuleHandle { inner })
    }

    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    pub fn kind(&self) -> &SignalKind {
        &self.kind
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_sender(&self) -> bool {
        self.role.is_sender()
    }

    pub fn anchor(&self) -> Option<Anchor> {
        self.anchor
    }

    /// Returns true if both ports live on the same module instance.
    pub fn same_module(&self, other: &Port) -> bool {
        self.module_id == other.module_id
    }

    pub(crate) fn deliver(&self, kind: &SignalKind, payload: &[u8]) -> bool {
        let Some(node) = self.module.upgrade() else {
            return false;
        };
        node.module.receive(kind, payload);
        true
    }

    fn module_name(&self) -> String {
        self.module
            .upgrade()
            .map(|node| node.module.name().to_string())
            .unwrap_or_else(|| "<dropped>".into())
    }
}

impl PartialEq for Port {
    fn eq(&self, other: &Self) -> bool {
        self.module_id == other.module_id && self.role == other.role && self.kind == other.kind
    }
}

impl Eq for Port {}

impl Hash for Port {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.module_id.hash(state);
        self.role.hash(state);
        self.kind.hash(state);
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("module", &self.module_name())
            .field("module_id", &self.module_id)
            .field("kind", &self.kind)
            .field("role", &self.role)
            .field("anchor", &self.anchor)
            .finish()
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.module_name(), self.kind, self.role)
    }
}
