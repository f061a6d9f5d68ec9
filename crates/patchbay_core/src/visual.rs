//! The visual layer as seen from the patcher.
//!
//! Rendering lives elsewhere. The patcher asks for world positions of ports
//! and pushes [`VisualRequest`]s; it never waits for the visual layer to act
//! on them.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{Anchor, ControlId, GuiId, LineId, Role, Vec3};

/// Fire-and-forget instruction for the visual layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisualRequest {
    CreateLine {
        line: LineId,
        from: Vec3,
        to: Vec3,
        visible: bool,
    },
    UpdateLine {
        line: LineId,
        from: Vec3,
        to: Vec3,
    },
    DestroyLine {
        line: LineId,
    },
    SetLineVisible {
        line: LineId,
        visible: bool,
    },
    SetControlState {
        control: ControlId,
        armed: bool,
    },
}

/// Capability the patcher calls through to reach the visual layer.
pub trait VisualLayer: Send {
    /// World position of the jack drawn for a port at `anchor`. `None` when
    /// the layer cannot place it (unknown panel, not yet laid out).
    fn world_position(&self, anchor: &Anchor, role: Role) -> Option<Vec3>;

    /// Queue a request. Must not block.
    fn request(&self, request: VisualRequest);
}

/// A patcher without any visual layer: every connection is graph-only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullVisuals;

impl VisualLayer for NullVisuals {
    fn world_position(&self, _anchor: &Anchor, _role: Role) -> Option<Vec3> {
        None
    }

    fn request(&self, _request: VisualRequest) {}
}

/// Default distance from a control's centre to its jacks. Senders sit on the
/// right edge, receivers on the left.
pub const DEFAULT_JACK_OFFSET: Vec3 = Vec3::new(0.75 / 2.0, 0.1 / 2.0, 0.0);

/// Where panels and their controls are in the world.
///
/// Panels are translated only; a control's position is relative to its
/// panel's origin.
#[derive(Debug, Clone)]
pub struct PanelLayout {
    jack_offset: Vec3,
    panels: HashMap<GuiId, Vec3>,
    controls: HashMap<ControlId, Vec3>,
}

impl Default for PanelLayout {
    fn default() -> Self {
        Self::new(DEFAULT_JACK_OFFSET)
    }
}

impl PanelLayout {
    pub fn new(jack_offset: Vec3) -> Self {
        Self {
            jack_offset,
            panels: HashMap::new(),
            controls: HashMap::new(),
        }
    }

    /// Place (or move) a panel. Returns its previous origin.
    pub fn move_panel(&mut self, gui: GuiId, origin: Vec3) -> Option<Vec3> {
        self.panels.insert(gui, origin)
    }

    /// Place a control relative to its panel.
    pub fn place_control(&mut self, control: ControlId, local: Vec3) {
        self.controls.insert(control, local);
    }

    pub fn panel_origin(&self, gui: GuiId) -> Option<Vec3> {
        self.panels.get(&gui).copied()
    }

    pub fn jack_position(&self, anchor: &Anchor, role: Role) -> Option<Vec3> {
        let origin = self.panel_origin(anchor.gui)?;
        let local = self.controls.get(&anchor.control).copied().unwrap_or_default();
        let mut offset = self.jack_offset;
        if !role.is_sender() {
            offset.x = -offset.x;
        }
        Some(origin + local + offset)
    }
}

/// Visual layer that forwards requests over a channel and answers positions
/// from a shared [`PanelLayout`].
#[derive(Clone)]
pub struct ChannelVisuals {
    layout: Arc<RwLock<PanelLayout>>,
    tx: Sender<VisualRequest>,
}

impl ChannelVisuals {
    pub fn new(layout: Arc<RwLock<PanelLayout>>) -> (Self, Receiver<VisualRequest>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { layout, tx }, rx)
    }

    pub fn layout(&self) -> &Arc<RwLock<PanelLayout>> {
        &self.layout
    }
}

impl VisualLayer for ChannelVisuals {
    fn world_position(&self, anchor: &Anchor, role: Role) -> Option<Vec3> {
        self.layout.read().jack_position(anchor, role)
    }

    fn request(&self, request: VisualRequest) {
        if let Err(err) = self.tx.send(request) {
            tracing::trace!("visual layer gone, dropping {:?}", err.into_inner());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> Anchor {
        Anchor::new(GuiId(1), ControlId(10))
    }

    #[test]
    fn jacks_sit_on_opposite_edges() {
        let mut layout = PanelLayout::new(Vec3::new(0.375, 0.25, 0.0));
        layout.move_panel(GuiId(1), Vec3::new(1.0, 2.0, 3.0));
        layout.place_control(ControlId(10), Vec3::new(0.0, 0.5, 0.0));

        let send = layout.jack_position(&anchor(), Role::Sender).unwrap();
        let recv = layout.jack_position(&anchor(), Role::Receiver).unwrap();
        assert_eq!(send, Vec3::new(1.375, 2.75, 3.0));
        assert_eq!(recv, Vec3::new(0.625, 2.75, 3.0));
    }

    #[test]
    fn unknown_panel_has_no_position() {
        let layout = PanelLayout::default();
        assert!(layout.jack_position(&anchor(), Role::Sender).is_none());
    }

    #[test]
    fn moving_a_panel_moves_its_jacks() {
        let mut layout = PanelLayout::new(Vec3::ZERO);
        layout.move_panel(GuiId(1), Vec3::ZERO);
        assert_eq!(layout.jack_position(&anchor(), Role::Sender), Some(Vec3::ZERO));
        assert_eq!(layout.move_panel(GuiId(1), Vec3::new(0.0, 1.0, 0.0)), Some(Vec3::ZERO));
        assert_eq!(
            layout.jack_position(&anchor(), Role::Sender),
            Some(Vec3::new(0.0, 1.0, 0.0))
        );
    }

    #[test]
    fn channel_visuals_forward_requests() {
        let (visuals, rx) = ChannelVisuals::new(Arc::default());
        visuals.request(VisualRequest::SetControlState {
            control: ControlId(3),
            armed: true,
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            VisualRequest::SetControlState {
                control: ControlId(3),
                armed: true
            }
        );
    }

    #[test]
    fn requests_after_receiver_dropped_are_ignored() {
        let (visuals, rx) = ChannelVisuals::new(Arc::default());
        drop(rx);
        visuals.request(VisualRequest::DestroyLine { line: LineId(1) });
    }
}
