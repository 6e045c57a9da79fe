//! Scene contexts: externally owned per-gameplay-object camera inputs.
//!
//! Stack entries only hold a [`ContextHandle`] (a weak reference) and resolve it
//! at the start of every run. A context that was dropped makes its entries
//! invalid for that frame; it never removes them.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::ids::ParamId;
use crate::result::{CameraPose, EvalResult};
use crate::value::Value;

/// Strong reference held by whoever owns the context.
pub type SharedContext = Rc<RefCell<SceneContext>>;

#[derive(Debug, Default)]
pub struct SceneContext {
    pub name: String,
    /// Externally driven overrides pushed by the owner for the next frame.
    pub result: EvalResult,
}

impl SceneContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result: EvalResult::default(),
        }
    }

    /// Wrap into the shared form stacks expect.
    pub fn shared(name: impl Into<String>) -> SharedContext {
        Rc::new(RefCell::new(Self::new(name)))
    }

    /// Drive the pose of every rig bound to this context.
    pub fn set_pose(&mut self, pose: CameraPose) {
        self.result.pose = pose;
        self.result.is_valid = true;
    }

    pub fn set_param(&mut self, id: ParamId, value: impl Into<Value>) {
        self.result.params.set(id, value);
    }

    /// Flag the next frame as a camera cut.
    pub fn request_cut(&mut self) {
        self.result.is_cut = true;
    }

    /// Clear per-frame flags after the owning loop consumed them.
    pub fn end_frame(&mut self) {
        self.result.is_cut = false;
        self.result.params.clear_changed_flags();
    }
}

/// Non-owning handle to a [`SceneContext`].
#[derive(Clone, Default)]
pub struct ContextHandle(Weak<RefCell<SceneContext>>);

impl ContextHandle {
    pub fn new(context: &SharedContext) -> Self {
        ContextHandle(Rc::downgrade(context))
    }

    /// Pin the context for the duration of a call; `None` once it was dropped.
    pub fn resolve(&self) -> Option<SharedContext> {
        self.0.upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub fn points_to(&self, context: &SharedContext) -> bool {
        std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(context))
    }

    pub fn same_as(&self, other: &ContextHandle) -> bool {
        self.0.ptr_eq(&other.0)
    }

    /// Context name for diagnostics, empty when it is gone.
    pub fn name(&self) -> String {
        self.resolve()
            .map(|c| c.borrow().name.clone())
            .unwrap_or_default()
    }
}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolve() {
            Some(ctx) => write!(f, "ContextHandle({:?})", ctx.borrow().name),
            None => f.write_str("ContextHandle(<dropped>)"),
        }
    }
}
