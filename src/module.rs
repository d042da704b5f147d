//! Graph nodes: configurable computation units.
//!
//! Three kinds, a closed set:
//! - `HyperInput` — a graph entry point carrying no computation.
//! - `Identity` — a generic unit; its semantics live outside this crate,
//!   here it is a named node with declared hyperparameters.
//! - `DynamicModule` — a placeholder whose internal structure is decided
//!   only once its governing parameters are assigned, at which point it is
//!   spliced out of the graph and replaced by the builder's (head, tail)
//!   pair.
//!
//! Constructors register into an explicit [`Space`] (`build` variants) or
//! into the thread-local default space (`new` variants). Module names are
//! `<Kind>_<n>` with per-space, per-kind counters starting at 1.

use std::fmt;
use std::rc::Rc;

use crate::context::get_default_space;
use crate::error::SpaceError;
use crate::param::{ParamRef, ParamSpec};
use crate::space::Space;

/// Stable arena index of a module within its space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModuleId(pub(crate) usize);

/// A dynamic placeholder's builder: given the placeholder, construct the
/// replacement subgraph and return its (head, tail) modules. head == tail is
/// allowed. Modules constructed inside the builder register into the
/// placeholder's space, which is the thread-local default while it runs.
pub(crate) type BuilderFn = dyn Fn(&ModuleRef) -> Result<(ModuleRef, ModuleRef), String>;

/// Kind-specific module state.
pub(crate) enum ModuleKind {
    HyperInput,
    Identity,
    Dynamic { builder: Rc<BuilderFn>, built: bool },
}

impl ModuleKind {
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            ModuleKind::HyperInput => "HyperInput",
            ModuleKind::Identity => "Identity",
            ModuleKind::Dynamic { .. } => "DynamicModule",
        }
    }

    pub(crate) fn is_unbuilt_dynamic(&self) -> bool {
        matches!(self, ModuleKind::Dynamic { built: false, .. })
    }
}

impl fmt::Debug for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::Dynamic { built, .. } => {
                f.debug_struct("Dynamic").field("built", built).finish_non_exhaustive()
            }
            other => f.write_str(other.tag()),
        }
    }
}

/// One module's record in a space's arena.
#[derive(Debug)]
pub(crate) struct ModuleData {
    pub(crate) name: String,
    pub(crate) kind: ModuleKind,
    /// Declared parameters, `(local name, id)`, in declaration order.
    pub(crate) params: Vec<(String, crate::param::ParamId)>,
    /// Predecessors (edge sources), in connection order.
    pub(crate) inbound: Vec<ModuleId>,
    /// Successors (edge destinations), in connection order.
    pub(crate) outbound: Vec<ModuleId>,
}

// ─── Handles ───────────────────────────────────────────────────────

/// A cheap handle to one module in a space.
#[derive(Clone)]
pub struct ModuleRef {
    pub(crate) space: Space,
    pub(crate) id: ModuleId,
}

impl ModuleRef {
    /// The generated stable name, e.g. `Identity_3`.
    pub fn name(&self) -> String {
        self.space.inner.borrow().slots[self.id.0].data.name.clone()
    }

    /// Kind tag: `HyperInput`, `Identity` or `DynamicModule`.
    pub fn kind_tag(&self) -> &'static str {
        self.space.inner.borrow().slots[self.id.0].data.kind.tag()
    }

    /// The owning space.
    pub fn space(&self) -> Space {
        self.space.clone()
    }

    /// Wire each source, in order, as a predecessor of this module.
    pub fn connect<'a, I>(&self, sources: I) -> Result<(), SpaceError>
    where
        I: IntoIterator<Item = &'a ModuleRef>,
    {
        self.space.connect(self, sources)
    }

    /// Predecessors in connection order.
    pub fn inputs(&self) -> Vec<ModuleRef> {
        let inner = self.space.inner.borrow();
        inner.slots[self.id.0]
            .data
            .inbound
            .iter()
            .map(|&id| ModuleRef {
                space: self.space.clone(),
                id,
            })
            .collect()
    }

    /// Successors in connection order.
    pub fn outputs(&self) -> Vec<ModuleRef> {
        let inner = self.space.inner.borrow();
        inner.slots[self.id.0]
            .data
            .outbound
            .iter()
            .map(|&id| ModuleRef {
                space: self.space.clone(),
                id,
            })
            .collect()
    }

    /// Declared parameters, `(local name, handle)`, in declaration order.
    pub fn params(&self) -> Vec<(String, ParamRef)> {
        let inner = self.space.inner.borrow();
        inner.slots[self.id.0]
            .data
            .params
            .iter()
            .map(|(n, id)| {
                (
                    n.clone(),
                    ParamRef {
                        space: self.space.clone(),
                        id: *id,
                    },
                )
            })
            .collect()
    }

    /// Look up a declared parameter by its local name.
    pub fn param(&self, local_name: &str) -> Option<ParamRef> {
        let inner = self.space.inner.borrow();
        inner.slots[self.id.0]
            .data
            .params
            .iter()
            .find(|(n, _)| n == local_name)
            .map(|(_, id)| ParamRef {
                space: self.space.clone(),
                id: *id,
            })
    }

    /// Whether this module is still a member of its space. A dynamic
    /// placeholder stops being a member once it expands.
    pub fn is_member(&self) -> bool {
        self.space.inner.borrow().slots[self.id.0].alive
    }
}

impl PartialEq for ModuleRef {
    fn eq(&self, other: &Self) -> bool {
        self.space == other.space && self.id == other.id
    }
}

impl Eq for ModuleRef {}

impl fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleRef({})", self.name())
    }
}

// ─── Constructors ──────────────────────────────────────────────────

/// A graph entry point.
pub struct HyperInput;

impl HyperInput {
    /// Register into the thread-local default space.
    pub fn new() -> ModuleRef {
        Self::build(&get_default_space())
    }

    /// Register into an explicit space.
    pub fn build(space: &Space) -> ModuleRef {
        space.register_module(ModuleKind::HyperInput, Vec::new())
    }
}

/// A generic computation unit with declared hyperparameters.
pub struct Identity;

impl Identity {
    /// Register a parameterless unit into the thread-local default space.
    pub fn new() -> ModuleRef {
        Self::build(&get_default_space(), Vec::new())
    }

    /// Register a unit with declared parameters into the thread-local
    /// default space.
    pub fn with_params<S: Into<String>>(
        params: impl IntoIterator<Item = (S, ParamSpec)>,
    ) -> ModuleRef {
        Self::build(
            &get_default_space(),
            params.into_iter().map(|(n, s)| (n.into(), s)).collect(),
        )
    }

    /// Register into an explicit space.
    pub fn build(space: &Space, params: Vec<(String, ParamSpec)>) -> ModuleRef {
        space.register_module(ModuleKind::Identity, params)
    }
}

/// An expandable placeholder governed by its declared parameters.
pub struct DynamicModule;

impl DynamicModule {
    /// Register into the thread-local default space. Fails only if every
    /// declared parameter is already assigned at construction (all
    /// constants) and the immediate expansion fails.
    pub fn new<F, S>(
        builder: F,
        params: impl IntoIterator<Item = (S, ParamSpec)>,
    ) -> Result<ModuleRef, SpaceError>
    where
        F: Fn(&ModuleRef) -> Result<(ModuleRef, ModuleRef), String> + 'static,
        S: Into<String>,
    {
        Self::build(
            &get_default_space(),
            builder,
            params.into_iter().map(|(n, s)| (n.into(), s)).collect(),
        )
    }

    /// Register into an explicit space.
    pub fn build<F>(
        space: &Space,
        builder: F,
        params: Vec<(String, ParamSpec)>,
    ) -> Result<ModuleRef, SpaceError>
    where
        F: Fn(&ModuleRef) -> Result<(ModuleRef, ModuleRef), String> + 'static,
    {
        let module = space.register_module(
            ModuleKind::Dynamic {
                builder: Rc::new(builder),
                built: false,
            },
            params,
        );
        // All-constant governing params leave nothing to wait for.
        space.expand_if_ready(module.id)?;
        Ok(module)
    }
}
