use std::fmt;

use crate::port::Port;
use crate::types::{GuiId, LineId};

/// A directed edge from a sender port to a receiver port, plus the handle of
/// the line drawn for it (if any).
///
/// Equality is by (sender, receiver) only; the line handle is presentation.
#[derive(Debug, Clone)]
pub struct Connection {
    pub(crate) sender: Port,
    pub(crate) receiver: Port,
    pub(crate) line: Option<LineId>,
}

impl Connection {
    pub fn sender(&self) -> &Port {
        &self.sender
    }

    pub fn receiver(&self) -> &Port {
        &self.receiver
    }

    pub fn line(&self) -> Option<LineId> {
        self.line
    }

    /// Returns true if this connection is exactly `sender -> receiver`.
    pub fn links(&self, sender: &Port, receiver: &Port) -> bool {
        self.sender == *sender && self.receiver == *receiver
    }

    /// Returns true if either endpoint is drawn on `gui`.
    pub fn touches(&self, gui: GuiId) -> bool {
        let on = |port: &Port| port.anchor().is_some_and(|anchor| anchor.gui == gui);
        on(&self.sender) || on(&self.receiver)
    }

    /// Returns true if either endpoint's module has been dropped.
    pub fn is_detached(&self) -> bool {
        self.sender.module().is_none() || self.receiver.module().is_none()
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        self.sender.is_sender()
            && !self.receiver.is_sender()
            && self.sender.kind() == self.receiver.kind()
            && !self.sender.same_module(&self.receiver)
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.links(&other.sender, &other.receiver)
    }
}

impl Eq for Connection {}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.sender, self.receiver)
    }
}
