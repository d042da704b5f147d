//! Hyperparameters: sampleable value cells attached to modules.
//!
//! Five kinds, a closed set:
//! - `Constant` — assigned at construction, never sampled.
//! - `Choice` — one member of a candidate set.
//! - `Int` — an integer drawn from an inclusive range.
//! - `Real` — a float drawn uniformly from a range.
//! - `Dynamic` — computed from named sub-parameters the instant the last of
//!   them is assigned; never sampled or assigned directly.
//!
//! A [`ParamSpec`] describes a parameter before registration; the owning
//! [`Space`](crate::Space) turns specs into registered cells with stable
//! names (`Param_<Kind>_<n>`, counters per space and per kind).

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use rand::Rng;

use crate::error::{AssignmentError, SpaceError};
use crate::module::ModuleRef;
use crate::space::Space;
use crate::value::Value;

/// Stable arena index of a parameter within its space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParamId(pub(crate) usize);

/// A `Dynamic` parameter's compute function: named dependency values in,
/// computed value out.
pub(crate) type ComputeFn = dyn Fn(&HashMap<String, Value>) -> Value;

/// The kind-specific state of a registered parameter.
pub(crate) enum ParamKind {
    Constant,
    Choice(Vec<Value>),
    Int { low: i64, high: i64 },
    Real { low: f64, high: f64 },
    Dynamic {
        compute: Rc<ComputeFn>,
        /// Named dependencies in declaration order.
        deps: Vec<(String, ParamId)>,
    },
}

impl ParamKind {
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            ParamKind::Constant => "Constant",
            ParamKind::Choice(_) => "Choice",
            ParamKind::Int { .. } => "Int",
            ParamKind::Real { .. } => "Real",
            ParamKind::Dynamic { .. } => "Dynamic",
        }
    }
}

impl fmt::Debug for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Choice(options) => f.debug_tuple("Choice").field(options).finish(),
            ParamKind::Int { low, high } => {
                f.debug_struct("Int").field("low", low).field("high", high).finish()
            }
            ParamKind::Real { low, high } => {
                f.debug_struct("Real").field("low", low).field("high", high).finish()
            }
            ParamKind::Constant => f.write_str("Constant"),
            ParamKind::Dynamic { deps, .. } => {
                f.debug_struct("Dynamic").field("deps", deps).finish_non_exhaustive()
            }
        }
    }
}

/// One registered parameter cell in a space's arena.
#[derive(Debug)]
pub(crate) struct ParamCell {
    pub(crate) name: String,
    pub(crate) kind: ParamKind,
    pub(crate) value: Option<Value>,
    /// The module that declared this parameter (or a sub-parameter of one of
    /// its `Dynamic` parameters). `None` for free-standing parameters.
    pub(crate) owner: Option<crate::module::ModuleId>,
}

impl ParamCell {
    pub(crate) fn is_assigned(&self) -> bool {
        self.value.is_some()
    }
}

// ─── Specs ─────────────────────────────────────────────────────────

/// A parameter description awaiting registration into a space.
pub struct ParamSpec {
    pub(crate) inner: SpecInner,
}

pub(crate) enum SpecInner {
    Constant(Value),
    Choice(Vec<Value>),
    Int { low: i64, high: i64 },
    Real { low: f64, high: f64 },
    Dynamic {
        compute: Rc<ComputeFn>,
        subs: Vec<(String, ParamSpec)>,
    },
}

impl ParamSpec {
    /// A fixed value; assigned the moment it is registered.
    pub fn constant(value: impl Into<Value>) -> Self {
        ParamSpec {
            inner: SpecInner::Constant(value.into()),
        }
    }

    /// One member of a candidate set.
    pub fn choice<V: Into<Value>>(options: impl IntoIterator<Item = V>) -> Self {
        ParamSpec {
            inner: SpecInner::Choice(options.into_iter().map(Into::into).collect()),
        }
    }

    /// An integer in `[low, high]`.
    pub fn int(low: i64, high: i64) -> Self {
        ParamSpec {
            inner: SpecInner::Int { low, high },
        }
    }

    /// A float drawn uniformly from `[low, high)`.
    pub fn real(low: f64, high: f64) -> Self {
        ParamSpec {
            inner: SpecInner::Real { low, high },
        }
    }

    /// A value computed from named sub-parameters once all of them are
    /// assigned. The sub-parameters are registered (and named) before the
    /// dynamic parameter itself.
    pub fn dynamic<F, S>(compute: F, subs: impl IntoIterator<Item = (S, ParamSpec)>) -> Self
    where
        F: Fn(&HashMap<String, Value>) -> Value + 'static,
        S: Into<String>,
    {
        ParamSpec {
            inner: SpecInner::Dynamic {
                compute: Rc::new(compute),
                subs: subs.into_iter().map(|(n, s)| (n.into(), s)).collect(),
            },
        }
    }
}

// ─── Handles ───────────────────────────────────────────────────────

/// A cheap handle to one registered parameter.
#[derive(Clone)]
pub struct ParamRef {
    pub(crate) space: Space,
    pub(crate) id: ParamId,
}

impl ParamRef {
    /// The generated stable name, e.g. `Param_Choice_1`.
    pub fn name(&self) -> String {
        self.space.inner.borrow().params[self.id.0].name.clone()
    }

    /// Kind tag: `Constant`, `Choice`, `Int`, `Real` or `Dynamic`.
    pub fn kind_tag(&self) -> &'static str {
        self.space.inner.borrow().params[self.id.0].kind.tag()
    }

    pub fn is_assigned(&self) -> bool {
        self.space.inner.borrow().params[self.id.0].is_assigned()
    }

    /// The current value, if assigned.
    pub fn value(&self) -> Option<Value> {
        self.space.inner.borrow().params[self.id.0].value.clone()
    }

    /// The module that declared this parameter, if any.
    pub fn owner(&self) -> Option<ModuleRef> {
        let owner = self.space.inner.borrow().params[self.id.0].owner;
        owner.map(|id| ModuleRef {
            space: self.space.clone(),
            id,
        })
    }

    /// Assign an explicit value. Fails if the value is outside the declared
    /// domain, the parameter is already assigned, or the parameter is
    /// `Dynamic` (computed, never set directly). Chained effects — dynamic
    /// computation and placeholder expansion — run before this returns.
    pub fn assign(&self, value: impl Into<Value>) -> Result<(), SpaceError> {
        self.space.assign_param(self.id, value.into())
    }

    /// Assign a uniformly drawn value using the thread RNG.
    pub fn random_sample(&self) -> Result<(), SpaceError> {
        self.random_sample_with(&mut rand::thread_rng())
    }

    /// Assign a uniformly drawn value using the given RNG.
    pub fn random_sample_with<R: Rng>(&self, rng: &mut R) -> Result<(), SpaceError> {
        let value = {
            let inner = self.space.inner.borrow();
            let cell = &inner.params[self.id.0];
            if cell.is_assigned() {
                return Err(AssignmentError::AlreadyAssigned(cell.name.clone()).into());
            }
            sample_value(&cell.kind, &cell.name, rng)?
        };
        self.space.assign_param(self.id, value)
    }

    /// Clear a sampled value so the parameter can be assigned again.
    /// Constants and computed (`Dynamic`) parameters cannot be reset.
    pub fn reset(&self) -> Result<(), AssignmentError> {
        let mut inner = self.space.inner.borrow_mut();
        let cell = &mut inner.params[self.id.0];
        match cell.kind {
            ParamKind::Constant => {
                Err(AssignmentError::NotResettable(cell.name.clone(), "constant"))
            }
            ParamKind::Dynamic { .. } => {
                Err(AssignmentError::NotResettable(cell.name.clone(), "computed"))
            }
            _ => {
                cell.value = None;
                Ok(())
            }
        }
    }
}

impl PartialEq for ParamRef {
    fn eq(&self, other: &Self) -> bool {
        self.space == other.space && self.id == other.id
    }
}

impl Eq for ParamRef {}

impl fmt::Debug for ParamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParamRef({})", self.name())
    }
}

/// Draw a uniform value from a sampleable kind.
fn sample_value<R: Rng>(
    kind: &ParamKind,
    name: &str,
    rng: &mut R,
) -> Result<Value, AssignmentError> {
    match kind {
        ParamKind::Choice(options) => {
            if options.is_empty() {
                return Err(AssignmentError::EmptyDomain(name.to_string()));
            }
            Ok(options[rng.gen_range(0..options.len())].clone())
        }
        ParamKind::Int { low, high } => {
            if low > high {
                return Err(AssignmentError::EmptyDomain(name.to_string()));
            }
            Ok(Value::Int(rng.gen_range(*low..=*high)))
        }
        ParamKind::Real { low, high } => {
            if low > high {
                return Err(AssignmentError::EmptyDomain(name.to_string()));
            }
            if low == high {
                return Ok(Value::Float(*low));
            }
            Ok(Value::Float(rng.gen_range(*low..*high)))
        }
        ParamKind::Constant => Err(AssignmentError::AlreadyAssigned(name.to_string())),
        ParamKind::Dynamic { .. } => {
            Err(AssignmentError::NotDirectlyAssignable(name.to_string()))
        }
    }
}
