//! Patch bay routing core
//!
//! Modules expose typed sender and receiver ports; users wire them together
//! at runtime by touching two ports in turn. This crate holds the state
//! machine that turns those touches into connect/disconnect decisions, the
//! resulting connection graph, and the per-module fan-out lists that carry
//! signal data from each sender to its receivers.
//!
//! Rendering, hand tracking, permissions and payload semantics live outside
//! this crate and are reached through [`Module`] and [`VisualLayer`].

pub mod config;
pub mod connection;
pub mod error;
pub mod fanout;
pub mod module;
pub mod patcher;
pub mod port;
pub mod types;
pub mod visual;

// Re-export commonly used items
pub use config::PatcherConfig;
pub use connection::Connection;
pub use error::{ConfigError, InvariantViolation, Rejection};
pub use fanout::FanOut;
pub use module::{Module, ModuleHandle, ModuleId};
pub use patcher::{Outcome, Patcher, SharedPatcher};
pub use port::Port;
pub use types::{Anchor, ControlId, GuiId, LineId, Role, SignalKind, Vec3};
pub use visual::{ChannelVisuals, NullVisuals, PanelLayout, VisualLayer, VisualRequest};
