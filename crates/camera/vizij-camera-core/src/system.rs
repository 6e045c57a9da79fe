//! Camera system: the owning evaluation loop around the blend stacks.
//!
//! Layers are evaluated in order over one shared result:
//! base (persistent), main (transient), global (persistent), visual (persistent).
//! The system owns the parameter setter service and hands it to every layer
//! each frame.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::result::EvalResult;
use crate::setters::ParameterSetterService;
use crate::stack::{PersistentStack, StackEvent, StackRunParams, TransientStack};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    Base,
    Main,
    Global,
    Visual,
}

/// A stack event tagged with the layer that raised it.
#[derive(Clone, Debug)]
pub struct LayerEvent {
    pub layer: Layer,
    pub event: StackEvent,
}

#[derive(Debug)]
pub struct CameraSystem {
    cfg: Config,
    setters: ParameterSetterService,
    base: PersistentStack,
    main: TransientStack,
    global: PersistentStack,
    visual: PersistentStack,
    result: EvalResult,
    events: Vec<LayerEvent>,
}

impl Default for CameraSystem {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl CameraSystem {
    pub fn new(cfg: Config) -> Self {
        let persistent =
            || PersistentStack::new(cfg.initial_entry_capacity, cfg.max_events_per_tick);
        Self {
            setters: ParameterSetterService::with_capacity(cfg.setter_capacity),
            base: persistent(),
            main: TransientStack::new(
                cfg.main_layer.isolated,
                cfg.initial_entry_capacity,
                cfg.max_events_per_tick,
            ),
            global: persistent(),
            visual: persistent(),
            result: EvalResult::default(),
            events: Vec::new(),
            cfg,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn setters(&self) -> &ParameterSetterService {
        &self.setters
    }

    pub fn setters_mut(&mut self) -> &mut ParameterSetterService {
        &mut self.setters
    }

    pub fn main(&self) -> &TransientStack {
        &self.main
    }

    pub fn main_mut(&mut self) -> &mut TransientStack {
        &mut self.main
    }

    /// Persistent layer by name; `None` for [`Layer::Main`].
    pub fn persistent(&self, layer: Layer) -> Option<&PersistentStack> {
        match layer {
            Layer::Base => Some(&self.base),
            Layer::Global => Some(&self.global),
            Layer::Visual => Some(&self.visual),
            Layer::Main => None,
        }
    }

    pub fn persistent_mut(&mut self, layer: Layer) -> Option<&mut PersistentStack> {
        match layer {
            Layer::Base => Some(&mut self.base),
            Layer::Global => Some(&mut self.global),
            Layer::Visual => Some(&mut self.visual),
            Layer::Main => None,
        }
    }

    /// Result of the last `update`.
    pub fn result(&self) -> &EvalResult {
        &self.result
    }

    /// Advance setters and evaluate every layer.
    pub fn update(&mut self, dt: f32) -> &EvalResult {
        self.setters.update(dt);
        let mut out = EvalResult::default();
        self.evaluate(dt, false, &mut out);
        self.result = out;
        self.collect_events();
        &self.result
    }

    /// Evaluate without committing anything: no blend time passes, no entry
    /// is popped, no status changes and no events are raised.
    pub fn preview(&mut self, dt: f32) -> EvalResult {
        let mut out = EvalResult::default();
        self.evaluate(dt, true, &mut out);
        out
    }

    fn evaluate(&mut self, dt: f32, stateless: bool, out: &mut EvalResult) {
        let params = StackRunParams {
            delta_time: dt,
            stateless,
            setters: Some(&self.setters),
        };
        self.base.run(&params, out);
        self.main.run(&params, out);
        self.global.run(&params, out);
        self.visual.run(&params, out);
    }

    fn collect_events(&mut self) {
        let drained = [
            (Layer::Base, self.base.take_events()),
            (Layer::Main, self.main.take_events()),
            (Layer::Global, self.global.take_events()),
            (Layer::Visual, self.visual.take_events()),
        ];
        for (layer, events) in drained {
            for event in events {
                if self.events.len() >= self.cfg.max_events_per_tick {
                    log::debug!("camera event buffer full; dropping {:?}", event.kind);
                    continue;
                }
                self.events.push(LayerEvent { layer, event });
            }
        }
    }

    /// Drain events raised by stack operations and updates since the last call.
    pub fn take_events(&mut self) -> Vec<LayerEvent> {
        self.collect_events();
        std::mem::take(&mut self.events)
    }
}
