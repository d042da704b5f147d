//! The search space: one mutable, traversable DAG of modules plus its
//! hyperparameter registry.
//!
//! A [`Space`] owns everything: the module arena (stable indices — expanding
//! a dynamic placeholder kills its slot but never shifts others), the global
//! edge list in insertion order, per-module adjacency in connection order,
//! the flat append-ordered hyperparameter registry, and the per-kind naming
//! counters. Handles ([`ModuleRef`](crate::ModuleRef),
//! [`ParamRef`](crate::ParamRef)) address the arenas by index, so graph
//! mutation mid-iteration cannot invalidate them.
//!
//! The graph is acyclic by construction discipline: `connect` rejects
//! self-loops and duplicate edges but does not run cycle detection; callers
//! must not create cycles.

mod expand;
mod resolve;
#[cfg(test)]
pub(crate) mod testkit;
mod traverse;

pub use resolve::UnassignedParams;
pub use traverse::Direction;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{SpaceError, StructuralError};
use crate::module::{ModuleData, ModuleId, ModuleKind, ModuleRef};
use crate::param::{ParamCell, ParamId, ParamKind, ParamRef, ParamSpec, SpecInner};
use crate::value::Value;

/// One directed edge: data flows `src` → `dst`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Edge {
    pub(crate) src: ModuleId,
    pub(crate) dst: ModuleId,
}

/// An arena slot. Dead slots belong to expanded placeholders; their indices
/// stay reserved so outstanding handles remain valid.
#[derive(Debug)]
pub(crate) struct ModuleSlot {
    pub(crate) alive: bool,
    pub(crate) data: ModuleData,
}

#[derive(Default)]
pub(crate) struct SpaceInner {
    pub(crate) slots: Vec<ModuleSlot>,
    pub(crate) edges: Vec<Edge>,
    /// Every parameter ever registered, in registration order. Doubles as
    /// the arena and the flat inventory.
    pub(crate) params: Vec<ParamCell>,
    module_counters: HashMap<&'static str, u32>,
    param_counters: HashMap<&'static str, u32>,
    module_names: HashMap<String, ModuleId>,
    param_names: HashMap<String, ParamId>,
}

/// A handle to one search space. Cloning is cheap (shared ownership);
/// equality is identity.
#[derive(Clone, Default)]
pub struct Space {
    pub(crate) inner: Rc<RefCell<SpaceInner>>,
}

impl PartialEq for Space {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Space {}

impl fmt::Debug for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Space")
            .field("modules", &self.module_count())
            .field("edges", &inner.edges.len())
            .field("params", &inner.params.len())
            .finish()
    }
}

impl Space {
    pub fn new() -> Self {
        Space::default()
    }

    // ─── Registration ──────────────────────────────────────────────

    /// Register a module and its declared parameter specs, assigning the
    /// next `<Kind>_<n>` name.
    pub(crate) fn register_module(
        &self,
        kind: ModuleKind,
        params: Vec<(String, ParamSpec)>,
    ) -> ModuleRef {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let tag = kind.tag();
            let n = inner.module_counters.entry(tag).or_insert(0);
            *n += 1;
            let name = format!("{}_{}", tag, n);
            let id = ModuleId(inner.slots.len());
            tracing::trace!(module = %name, "register module");
            inner.slots.push(ModuleSlot {
                alive: true,
                data: ModuleData {
                    name: name.clone(),
                    kind,
                    params: Vec::new(),
                    inbound: Vec::new(),
                    outbound: Vec::new(),
                },
            });
            inner.module_names.insert(name, id);
            for (local_name, spec) in params {
                let pid = register_spec(&mut inner, spec, Some(id));
                inner.slots[id.0].data.params.push((local_name, pid));
            }
            id
        };
        ModuleRef {
            space: self.clone(),
            id,
        }
    }

    /// Register a free-standing parameter (no owning module). It still
    /// enters the flat inventory and the naming counters.
    pub fn attach_param(&self, spec: ParamSpec) -> ParamRef {
        let id = register_spec(&mut self.inner.borrow_mut(), spec, None);
        ParamRef {
            space: self.clone(),
            id,
        }
    }

    // ─── Graph store ───────────────────────────────────────────────

    /// Append one edge per source, in order, to the global edge list and to
    /// both endpoints' adjacency lists. All sources are validated before any
    /// edge is added.
    pub fn connect<'a, I>(&self, dest: &ModuleRef, sources: I) -> Result<(), SpaceError>
    where
        I: IntoIterator<Item = &'a ModuleRef>,
    {
        if dest.space != *self {
            return Err(StructuralError::ForeignModule(dest.name()).into());
        }
        let mut inner = self.inner.borrow_mut();
        if !inner.slots[dest.id.0].alive {
            return Err(StructuralError::NotAMember(inner.slots[dest.id.0].data.name.clone()).into());
        }

        let mut src_ids = Vec::new();
        for source in sources {
            if source.space != *self {
                let name = source.space.inner.borrow().slots[source.id.0].data.name.clone();
                return Err(StructuralError::ForeignModule(name).into());
            }
            let src = source.id;
            if !inner.slots[src.0].alive {
                return Err(StructuralError::NotAMember(inner.slots[src.0].data.name.clone()).into());
            }
            if src == dest.id {
                return Err(StructuralError::SelfLoop(inner.slots[src.0].data.name.clone()).into());
            }
            let duplicate = inner
                .edges
                .iter()
                .any(|e| e.src == src && e.dst == dest.id)
                || src_ids.contains(&src);
            if duplicate {
                return Err(StructuralError::DuplicateEdge(
                    inner.slots[src.0].data.name.clone(),
                    inner.slots[dest.id.0].data.name.clone(),
                )
                .into());
            }
            src_ids.push(src);
        }

        for src in src_ids {
            inner.edges.push(Edge { src, dst: dest.id });
            inner.slots[src.0].data.outbound.push(dest.id);
            inner.slots[dest.id.0].data.inbound.push(src);
        }
        Ok(())
    }

    /// Remove exactly one matching edge from the global list and both
    /// endpoints' adjacency lists. No-op if no such edge exists.
    pub fn disconnect(&self, src: &ModuleRef, dest: &ModuleRef) {
        if src.space != *self || dest.space != *self {
            return;
        }
        let mut inner = self.inner.borrow_mut();
        let Some(pos) = inner
            .edges
            .iter()
            .position(|e| e.src == src.id && e.dst == dest.id)
        else {
            return;
        };
        inner.edges.remove(pos);
        if let Some(i) = inner.slots[src.id.0]
            .data
            .outbound
            .iter()
            .position(|&m| m == dest.id)
        {
            inner.slots[src.id.0].data.outbound.remove(i);
        }
        if let Some(i) = inner.slots[dest.id.0]
            .data
            .inbound
            .iter()
            .position(|&m| m == src.id)
        {
            inner.slots[dest.id.0].data.inbound.remove(i);
        }
    }

    /// Modules with zero inbound edges, in creation order.
    pub fn inputs(&self) -> Vec<ModuleRef> {
        self.collect_modules(|slot| slot.data.inbound.is_empty())
    }

    /// Modules with zero outbound edges, in creation order.
    pub fn outputs(&self) -> Vec<ModuleRef> {
        self.collect_modules(|slot| slot.data.outbound.is_empty())
    }

    /// A module's predecessor list, in connection order.
    pub fn inputs_of(&self, module: &ModuleRef) -> Vec<ModuleRef> {
        debug_assert!(module.space == *self);
        module.inputs()
    }

    /// A module's successor list, in connection order.
    pub fn outputs_of(&self, module: &ModuleRef) -> Vec<ModuleRef> {
        debug_assert!(module.space == *self);
        module.outputs()
    }

    // ─── Inventory ─────────────────────────────────────────────────

    /// Live modules in creation order.
    pub fn modules(&self) -> Vec<ModuleRef> {
        self.collect_modules(|_| true)
    }

    /// Number of live modules.
    pub fn module_count(&self) -> usize {
        self.inner.borrow().slots.iter().filter(|s| s.alive).count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.borrow().edges.len()
    }

    /// Every parameter ever registered, in registration order — including
    /// constants and parameters of expanded placeholders.
    pub fn params(&self) -> Vec<ParamRef> {
        let inner = self.inner.borrow();
        (0..inner.params.len())
            .map(|i| ParamRef {
                space: self.clone(),
                id: ParamId(i),
            })
            .collect()
    }

    /// Look up a live module by its generated name.
    pub fn module(&self, name: &str) -> Option<ModuleRef> {
        let inner = self.inner.borrow();
        let id = *inner.module_names.get(name)?;
        if !inner.slots[id.0].alive {
            return None;
        }
        Some(ModuleRef {
            space: self.clone(),
            id,
        })
    }

    /// Look up a parameter by its generated name.
    pub fn param(&self, name: &str) -> Option<ParamRef> {
        let id = *self.inner.borrow().param_names.get(name)?;
        Some(ParamRef {
            space: self.clone(),
            id,
        })
    }

    /// The assigned `(name, value)` pairs in registration order — the
    /// in-memory configuration a search driver exports once
    /// [`all_assigned`](Space::all_assigned) holds.
    pub fn assigned_vector(&self) -> Vec<(String, Value)> {
        let inner = self.inner.borrow();
        inner
            .params
            .iter()
            .filter_map(|cell| cell.value.clone().map(|v| (cell.name.clone(), v)))
            .collect()
    }

    fn collect_modules(&self, keep: impl Fn(&ModuleSlot) -> bool) -> Vec<ModuleRef> {
        let inner = self.inner.borrow();
        inner
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.alive && keep(slot))
            .map(|(i, _)| ModuleRef {
                space: self.clone(),
                id: ModuleId(i),
            })
            .collect()
    }
}

/// Register one spec (depth-first: a dynamic's sub-parameters before the
/// dynamic itself, so naming counters advance in declaration order).
fn register_spec(inner: &mut SpaceInner, spec: ParamSpec, owner: Option<ModuleId>) -> ParamId {
    let (kind, value) = match spec.inner {
        SpecInner::Constant(v) => (ParamKind::Constant, Some(v)),
        SpecInner::Choice(options) => (ParamKind::Choice(options), None),
        SpecInner::Int { low, high } => (ParamKind::Int { low, high }, None),
        SpecInner::Real { low, high } => (ParamKind::Real { low, high }, None),
        SpecInner::Dynamic { compute, subs } => {
            let deps: Vec<(String, ParamId)> = subs
                .into_iter()
                .map(|(n, sub)| {
                    let pid = register_spec(inner, sub, owner);
                    (n, pid)
                })
                .collect();
            // All-constant dependencies leave nothing to wait for.
            let ready = deps.iter().all(|(_, pid)| inner.params[pid.0].is_assigned());
            let value = ready.then(|| {
                let args: HashMap<String, Value> = deps
                    .iter()
                    .map(|(n, pid)| {
                        (n.clone(), inner.params[pid.0].value.clone().unwrap())
                    })
                    .collect();
                (*compute)(&args)
            });
            (ParamKind::Dynamic { compute, deps }, value)
        }
    };

    let tag = kind.tag();
    let n = inner.param_counters.entry(tag).or_insert(0);
    *n += 1;
    let name = format!("Param_{}_{}", tag, n);
    let id = ParamId(inner.params.len());
    inner.param_names.insert(name.clone(), id);
    inner.params.push(ParamCell {
        name,
        kind,
        value,
        owner,
    });
    id
}
