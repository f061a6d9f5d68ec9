use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::ops::{Add, Sub};
use std::sync::atomic::{AtomicU64, Ordering};

/// Signal kind carried by a port, e.g. `"midi"` or `"heartbeat"`.
///
/// A sender and a receiver can only be patched together when their kinds match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalKind(Cow<'static, str>);

impl SignalKind {
    pub const fn from_static(name: &'static str) -> Self {
        SignalKind(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        SignalKind(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for SignalKind {
    fn from(value: &str) -> Self {
        SignalKind::new(value)
    }
}

impl From<String> for SignalKind {
    fn from(value: String) -> Self {
        SignalKind::new(value)
    }
}

/// MIDI messages.
pub const MIDI: SignalKind = SignalKind::from_static("midi");

/// Audio frames.
pub const AUDIO: SignalKind = SignalKind::from_static("audio");

/// Clock pulses from a metronome-like module.
pub const HEARTBEAT: SignalKind = SignalKind::from_static("heartbeat");

/// Which end of a connection a port sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    pub fn is_sender(self) -> bool {
        matches!(self, Role::Sender)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Sender => write!(f, "sender"),
            Role::Receiver => write!(f, "receiver"),
        }
    }
}

/// Position in world space, as reported by the visual layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Vec3 { x, y, z }
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Self) -> Self::Output {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Self) -> Self::Output {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Opaque handle to a panel (GUI group) owned by the visual layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuiId(pub u64);

/// Opaque handle to a UI control (the button that raised a selection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlId(pub u64);

/// Handle to a connection line. Allocated by the patcher so that creating a
/// line never has to wait on the visual layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(pub u64);

impl LineId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        LineId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for GuiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gui#{}", self.0)
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "control#{}", self.0)
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line#{}", self.0)
    }
}

/// Where a port lives visually: the panel it is drawn on and the control the
/// user touches to select it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Anchor {
    pub gui: GuiId,
    pub control: ControlId,
}

impl Anchor {
    pub fn new(gui: GuiId, control: ControlId) -> Self {
        Anchor { gui, control }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_kind_compares_by_name() {
        assert_eq!(MIDI, SignalKind::new("midi"));
        assert_eq!(SignalKind::from("audio"), AUDIO);
        assert_ne!(MIDI, HEARTBEAT);
    }

    #[test]
    fn signal_kind_serializes_as_plain_string() {
        let json = serde_json::to_string(&MIDI).unwrap();
        assert_eq!(json, "\"midi\"");
        let kind: SignalKind = serde_json::from_str("\"heartbeat\"").unwrap();
        assert_eq!(kind, HEARTBEAT);
    }

    #[test]
    fn role_uses_lowercase_names() {
        let role: Role = serde_json::from_str("\"receiver\"").unwrap();
        assert_eq!(role, Role::Receiver);
        assert_eq!(Role::Sender.to_string(), "sender");
    }

    #[test]
    fn line_ids_are_unique() {
        let a = LineId::next();
        let b = LineId::next();
        assert_ne!(a, b);
    }
}
