//! Selection scripts: a JSON description of modules, panels and a sequence of
//! user events, replayed against a fresh patcher.

use anyhow::{Context, Result, anyhow};
use parking_lot::{Mutex, RwLock};
use patchbay_core::{
    Anchor, ChannelVisuals, ControlId, GuiId, Module, ModuleHandle, Outcome, Patcher,
    PatcherConfig, Role, SignalKind, Vec3, VisualRequest,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub config: PatcherConfig,
    #[serde(default)]
    pub panels: Vec<PanelSpec>,
    pub modules: Vec<ModuleSpec>,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PanelSpec {
    pub gui: GuiId,
    #[serde(default)]
    pub origin: Vec3,
    #[serde(default)]
    pub controls: Vec<ControlSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlSpec {
    pub control: ControlId,
    #[serde(default)]
    pub position: Vec3,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleSpec {
    pub name: String,
    /// Panel the module's controls are drawn on. Without one its ports have
    /// no anchor and every connection to it is graph-only.
    pub panel: Option<GuiId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Select {
        module: String,
        kind: SignalKind,
        role: Role,
        control: Option<ControlId>,
    },
    Emit {
        module: String,
        kind: SignalKind,
        #[serde(default)]
        payload: Vec<u8>,
    },
    MovePanel {
        gui: GuiId,
        origin: Vec3,
    },
    ShowLines,
    HideLines,
}

impl Event {
    fn describe(&self) -> String {
        match self {
            Event::Select {
                module, kind, role, ..
            } => format!("select {}:{}:{}", module, kind, role),
            Event::Emit { module, kind, payload } => {
                format!("emit {}:{} {:?}", module, kind, payload)
            }
            Event::MovePanel { gui, .. } => format!("move {}", gui),
            Event::ShowLines => "show lines".into(),
            Event::HideLines => "hide lines".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub module: String,
    pub kind: SignalKind,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub event: String,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub sender: String,
    pub kind: SignalKind,
    pub receiver: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub steps: Vec<Step>,
    pub connections: Vec<Route>,
    pub fanout: Vec<Route>,
    pub deliveries: Vec<Delivery>,
    pub visual_requests: Vec<VisualRequest>,
}

/// Module that logs what it receives into the shared delivery log.
struct ScriptModule {
    name: String,
    log: Arc<Mutex<Vec<Delivery>>>,
}

impl Module for ScriptModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&self, kind: &SignalKind, payload: &[u8]) {
        self.log.lock().push(Delivery {
            module: self.name.clone(),
            kind: kind.clone(),
            payload: payload.to_vec(),
        });
    }
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("failed to parse script {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Replay every event in order and report the outcome.
    pub fn replay(&self) -> Result<Report> {
        let mut layout = self.config.layout();
        for panel in &self.panels {
            layout.move_panel(panel.gui, panel.origin);
            for control in &panel.controls {
                layout.place_control(control.control, control.position);
            }
        }
        let layout = Arc::new(RwLock::new(layout));
        let (visuals, requests) = ChannelVisuals::new(layout.clone());
        let mut patcher = Patcher::new(self.config.clone(), visuals);

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut modules: HashMap<&str, (ModuleHandle, Option<GuiId>)> = HashMap::new();
        for spec in &self.modules {
            let handle = ModuleHandle::new(ScriptModule {
                name: spec.name.clone(),
                log: log.clone(),
            });
            if modules
                .insert(spec.name.as_str(), (handle, spec.panel))
                .is_some()
            {
                return Err(anyhow!("module '{}' declared twice", spec.name));
            }
        }
        let lookup = |name: &str| {
            modules
                .get(name)
                .ok_or_else(|| anyhow!("unknown module '{}'", name))
        };

        let mut steps = Vec::with_capacity(self.events.len());
        for (index, event) in self.events.iter().enumerate() {
            let result = match event {
                Event::Select {
                    module,
                    kind,
                    role,
                    control,
                } => {
                    let (handle, panel) = lookup(module)
                        .with_context(|| format!("event {}", index))?;
                    let anchor = panel
                        .zip(*control)
                        .map(|(gui, control)| Anchor::new(gui, control));
                    let outcome = patcher.select(handle, kind.clone(), *role, anchor);
                    describe(&outcome)
                }
                Event::Emit {
                    module,
                    kind,
                    payload,
                } => {
                    let (handle, _) = lookup(module)
                        .with_context(|| format!("event {}", index))?;
                    let delivered = handle.emit(kind, payload);
                    format!("delivered to {}", delivered)
                }
                Event::MovePanel { gui, origin } => {
                    layout.write().move_panel(*gui, *origin);
                    let updated = patcher.refresh_visuals(*gui);
                    format!("{} line(s) updated", updated)
                }
                Event::ShowLines => {
                    patcher.show_all_visuals();
                    "lines shown".into()
                }
                Event::HideLines => {
                    patcher.hide_all_visuals();
                    "lines hidden".into()
                }
            };
            tracing::debug!("event {}: {} => {}", index, event.describe(), result);
            steps.push(Step {
                event: event.describe(),
                result,
            });
        }

        patcher
            .check_consistency()
            .context("patch graph is inconsistent after replay")?;

        let connections = patcher
            .connections()
            .iter()
            .map(|c| route(c.sender(), c.receiver()))
            .collect();

        let mut fanout = Vec::new();
        for spec in &self.modules {
            let (handle, _) = &modules[spec.name.as_str()];
            for (kind, receiver) in handle.fanout().entries() {
                fanout.push(Route {
                    sender: spec.name.clone(),
                    kind,
                    receiver: module_name(&receiver),
                });
            }
        }

        drop(patcher);
        let deliveries = log.lock().clone();
        Ok(Report {
            steps,
            connections,
            fanout,
            deliveries,
            visual_requests: requests.try_iter().collect(),
        })
    }
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Connected {
            line: Some(line), ..
        } => format!("{} ({})", outcome, line),
        _ => outcome.to_string(),
    }
}

fn module_name(port: &patchbay_core::Port) -> String {
    port.module()
        .map(|m| m.name().to_string())
        .unwrap_or_else(|| port.module_id().to_string())
}

fn route(sender: &patchbay_core::Port, receiver: &patchbay_core::Port) -> Route {
    Route {
        sender: module_name(sender),
        kind: sender.kind().clone(),
        receiver: module_name(receiver),
    }
}
