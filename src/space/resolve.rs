//! Hyperparameter resolution: unassigned-parameter enumeration, random
//! full resolution, and the assignment chain.
//!
//! Enumeration order is the forward traversal order of the module graph;
//! within a module, parameters follow declaration order. Constants never
//! appear; a `Dynamic` parameter is replaced by its unassigned named
//! sub-parameters and is never yielded itself.
//!
//! The assignment chain runs synchronously inside `assign`: the moment a
//! parameter transitions to assigned, every `Dynamic` parameter naming it
//! as a dependency is re-checked (and computed when complete), and the
//! owning module is re-checked for placeholder expansion. A failed chain
//! rolls back every value assigned during the call before the error is
//! returned.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use rand::Rng;

use crate::error::{AssignmentError, SpaceError};
use crate::param::{ComputeFn, ParamCell, ParamId, ParamKind, ParamRef};
use crate::space::{Space, SpaceInner};

use super::traverse::Direction;
use crate::value::Value;

/// A fresh, finite enumeration of the currently unassigned sampleable
/// parameters. Obtained from [`Space::unassigned_iter`]; each call takes a
/// new traversal snapshot. Assignment state is re-checked at yield time, so
/// a parameter assigned after the snapshot is skipped, not yielded stale.
pub struct UnassignedParams {
    space: Space,
    candidates: VecDeque<ParamId>,
}

impl Iterator for UnassignedParams {
    type Item = ParamRef;

    fn next(&mut self) -> Option<ParamRef> {
        while let Some(id) = self.candidates.pop_front() {
            if !self.space.inner.borrow().params[id.0].is_assigned() {
                return Some(ParamRef {
                    space: self.space.clone(),
                    id,
                });
            }
        }
        None
    }
}

/// Collect the sampleable parameter ids a single declared parameter
/// contributes: nothing for constants, the unrolled sub-parameters for a
/// dynamic, the parameter itself otherwise.
fn push_candidates(inner: &SpaceInner, id: ParamId, out: &mut VecDeque<ParamId>) {
    match &inner.params[id.0].kind {
        ParamKind::Constant => {}
        ParamKind::Dynamic { deps, .. } => {
            for (_, sub) in deps {
                push_candidates(inner, *sub, out);
            }
        }
        _ => out.push_back(id),
    }
}

impl Space {
    /// Enumerate the unassigned sampleable parameters in traversal order.
    /// Restartable: every call is a fresh snapshot.
    pub fn unassigned_iter(&self) -> UnassignedParams {
        let order = self.traversal_order(Direction::Forward);
        let mut candidates = VecDeque::new();
        {
            let inner = self.inner.borrow();
            for module in order {
                for (_, pid) in &inner.slots[module.0].data.params {
                    push_candidates(&inner, *pid, &mut candidates);
                }
            }
        }
        UnassignedParams {
            space: self.clone(),
            candidates,
        }
    }

    /// The materialized [`unassigned_iter`](Space::unassigned_iter) sequence.
    pub fn get_assignable_params(&self) -> Vec<ParamRef> {
        self.unassigned_iter().collect()
    }

    /// True iff no sampleable parameter remains unassigned.
    pub fn all_assigned(&self) -> bool {
        self.unassigned_iter().next().is_none()
    }

    /// Assign every unassigned parameter a uniformly drawn value, using the
    /// thread RNG. See [`random_sample_with`](Space::random_sample_with).
    pub fn random_sample(&self) -> Result<(), SpaceError> {
        self.random_sample_with(&mut rand::thread_rng())
    }

    /// Assign every unassigned parameter a uniformly drawn value. The first
    /// unassigned parameter is re-queried after every assignment, because an
    /// assignment can compute dynamic parameters and expand placeholders —
    /// either of which changes the remaining parameter set.
    pub fn random_sample_with<R: Rng>(&self, rng: &mut R) -> Result<(), SpaceError> {
        loop {
            let Some(param) = self.unassigned_iter().next() else {
                return Ok(());
            };
            param.random_sample_with(rng)?;
        }
    }

    // ─── Assignment chain ──────────────────────────────────────────

    /// Validate and set one parameter, then run the chained effects. On any
    /// failure, every value assigned during this call is rolled back.
    pub(crate) fn assign_param(&self, id: ParamId, value: Value) -> Result<(), SpaceError> {
        let mut journal = Vec::new();
        let result = self.assign_checked(id, value, &mut journal);
        if result.is_err() {
            let mut inner = self.inner.borrow_mut();
            for pid in journal {
                inner.params[pid.0].value = None;
            }
        }
        result
    }

    fn assign_checked(
        &self,
        id: ParamId,
        value: Value,
        journal: &mut Vec<ParamId>,
    ) -> Result<(), SpaceError> {
        {
            let mut inner = self.inner.borrow_mut();
            let cell = &mut inner.params[id.0];
            validate(cell, &value)?;
            tracing::trace!(param = %cell.name, %value, "assign");
            cell.value = Some(value);
        }
        journal.push(id);
        self.propagate(id, journal)
    }

    /// Chained effects of `id` having just been assigned: compute ready
    /// dynamic dependents (recursively), then re-check the owning module
    /// for expansion.
    fn propagate(&self, id: ParamId, journal: &mut Vec<ParamId>) -> Result<(), SpaceError> {
        let ready: Vec<(ParamId, Rc<ComputeFn>, HashMap<String, Value>)> = {
            let inner = self.inner.borrow();
            inner
                .params
                .iter()
                .enumerate()
                .filter_map(|(i, cell)| {
                    if cell.is_assigned() {
                        return None;
                    }
                    let ParamKind::Dynamic { compute, deps } = &cell.kind else {
                        return None;
                    };
                    if !deps.iter().any(|(_, dep)| *dep == id) {
                        return None;
                    }
                    let mut args = HashMap::new();
                    for (name, dep) in deps {
                        args.insert(name.clone(), inner.params[dep.0].value.clone()?);
                    }
                    Some((ParamId(i), compute.clone(), args))
                })
                .collect()
        };

        for (pid, compute, args) in ready {
            let computed = (*compute)(&args);
            {
                let mut inner = self.inner.borrow_mut();
                let cell = &mut inner.params[pid.0];
                tracing::trace!(param = %cell.name, value = %computed, "computed");
                cell.value = Some(computed);
            }
            journal.push(pid);
            self.propagate(pid, journal)?;
        }

        let owner = self.inner.borrow().params[id.0].owner;
        if let Some(module) = owner {
            self.expand_if_ready(module)?;
        }
        Ok(())
    }
}

/// Domain and state validation for a direct assignment.
fn validate(cell: &ParamCell, value: &Value) -> Result<(), AssignmentError> {
    if cell.is_assigned() {
        return Err(AssignmentError::AlreadyAssigned(cell.name.clone()));
    }
    let in_domain = match &cell.kind {
        // Constants are assigned at registration, so this arm is
        // unreachable through `is_assigned` above; keep it exhaustive.
        ParamKind::Constant => {
            return Err(AssignmentError::AlreadyAssigned(cell.name.clone()));
        }
        ParamKind::Dynamic { .. } => {
            return Err(AssignmentError::NotDirectlyAssignable(cell.name.clone()));
        }
        ParamKind::Choice(options) => options.contains(value),
        ParamKind::Int { low, high } => {
            matches!(value, Value::Int(v) if low <= v && v <= high)
        }
        ParamKind::Real { low, high } => match value.as_float() {
            Some(v) => matches!(value, Value::Int(_) | Value::Float(_)) && *low <= v && v <= *high,
            None => false,
        },
    };
    if !in_domain {
        return Err(AssignmentError::OutOfDomain {
            name: cell.name.clone(),
            value: value.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::space::testkit::{reference_space, reference_space_with_dynamic};
    use crate::{AssignmentError, ParamSpec, SpaceError, Value};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x5eed)
    }

    fn unassigned_names(space: &crate::Space) -> Vec<String> {
        space.unassigned_iter().map(|p| p.name()).collect()
    }

    // ── Test: enumeration follows traversal order, skips constants,
    //    recurses through dynamics ──

    #[test]
    fn test_unassigned_iterator() {
        let space = reference_space();
        assert_eq!(
            unassigned_names(&space),
            ["Param_Real_1", "Param_Choice_1", "Param_Int_1", "Param_Choice_2"]
        );

        space
            .param("Param_Choice_1")
            .unwrap()
            .random_sample_with(&mut rng())
            .unwrap();
        assert_eq!(
            unassigned_names(&space),
            ["Param_Real_1", "Param_Int_1", "Param_Choice_2"]
        );
    }

    #[test]
    fn test_unassigned_iterator_with_placeholder() {
        let space = reference_space_with_dynamic();
        assert_eq!(
            unassigned_names(&space),
            [
                "Param_Real_1",
                "Param_Choice_3",
                "Param_Choice_1",
                "Param_Int_1",
                "Param_Choice_2",
            ]
        );

        // Expanding the placeholder swaps its governing parameter for the
        // built module's fresh one, at the same position in the order.
        space
            .param("Param_Choice_3")
            .unwrap()
            .random_sample_with(&mut rng())
            .unwrap();
        assert_eq!(
            unassigned_names(&space),
            [
                "Param_Real_1",
                "Param_Choice_4",
                "Param_Choice_1",
                "Param_Int_1",
                "Param_Choice_2",
            ]
        );
    }

    #[test]
    fn test_get_assignable_params_skips_constants() {
        let space = reference_space();
        let constant = space.attach_param(ParamSpec::constant(1));
        assert!(space.params().contains(&constant));

        let names: Vec<String> = space
            .get_assignable_params()
            .iter()
            .map(|p| p.name())
            .collect();
        assert_eq!(
            names,
            ["Param_Real_1", "Param_Choice_1", "Param_Int_1", "Param_Choice_2"]
        );
    }

    // ── Test: all_assigned flips only when the last parameter lands ──

    #[test]
    fn test_all_assigned_progression() {
        let space = reference_space();
        let mut rng = rng();

        assert!(!space.all_assigned());
        space
            .param("Param_Choice_1")
            .unwrap()
            .random_sample_with(&mut rng)
            .unwrap();
        assert!(!space.all_assigned());
        space
            .param("Param_Int_1")
            .unwrap()
            .random_sample_with(&mut rng)
            .unwrap();
        assert!(!space.all_assigned());
        space.param("Param_Real_1").unwrap().assign(0.1).unwrap();
        assert!(!space.all_assigned());
        space
            .param("Param_Choice_2")
            .unwrap()
            .random_sample_with(&mut rng)
            .unwrap();
        assert!(space.all_assigned());
    }

    // ── Test: full random resolution, including mid-loop expansion ──

    #[test]
    fn test_random_sample() {
        let space = reference_space_with_dynamic();
        space.random_sample_with(&mut rng()).unwrap();
        assert!(space.all_assigned());
        assert_eq!(space.unassigned_iter().count(), 0);
    }

    // ── Test: dynamic computation fires on the last dependency ──

    #[test]
    fn test_dynamic_computes_from_dependency() {
        let space = reference_space();
        let p5 = space.param("Param_Choice_2").unwrap();
        let p4 = space.param("Param_Dynamic_1").unwrap();
        assert!(!p4.is_assigned());

        p5.assign(4).unwrap();
        assert_eq!(p4.value(), Some(Value::Int(12)));
    }

    #[test]
    fn test_dynamic_rejects_direct_assignment() {
        let space = reference_space();
        let p4 = space.param("Param_Dynamic_1").unwrap();
        let err = p4.assign(9).unwrap_err();
        assert!(matches!(
            err,
            SpaceError::Assignment(AssignmentError::NotDirectlyAssignable(_))
        ));
    }

    // ── Test: domain validation ──

    #[test]
    fn test_assign_out_of_domain() {
        let space = reference_space();
        let choice = space.param("Param_Choice_1").unwrap();
        assert!(matches!(
            choice.assign(3).unwrap_err(),
            SpaceError::Assignment(AssignmentError::OutOfDomain { .. })
        ));

        let int = space.param("Param_Int_1").unwrap();
        assert!(matches!(
            int.assign(101).unwrap_err(),
            SpaceError::Assignment(AssignmentError::OutOfDomain { .. })
        ));
        assert!(matches!(
            int.assign(0.5).unwrap_err(),
            SpaceError::Assignment(AssignmentError::OutOfDomain { .. })
        ));

        let real = space.param("Param_Real_1").unwrap();
        assert!(matches!(
            real.assign(1.5).unwrap_err(),
            SpaceError::Assignment(AssignmentError::OutOfDomain { .. })
        ));
    }

    #[test]
    fn test_reassign_requires_reset() {
        let space = reference_space();
        let int = space.param("Param_Int_1").unwrap();
        int.assign(10).unwrap();
        assert!(matches!(
            int.assign(20).unwrap_err(),
            SpaceError::Assignment(AssignmentError::AlreadyAssigned(_))
        ));

        int.reset().unwrap();
        int.assign(20).unwrap();
        assert_eq!(int.value(), Some(Value::Int(20)));
    }

    #[test]
    fn test_constant_is_not_resettable() {
        let space = crate::Space::new();
        let constant = space.attach_param(ParamSpec::constant(7));
        assert!(matches!(
            constant.reset().unwrap_err(),
            AssignmentError::NotResettable(_, "constant")
        ));
        assert_eq!(constant.value(), Some(Value::Int(7)));
    }

    // ── Test: sampling respects declared domains ──

    #[test]
    fn test_sampled_values_in_domain() {
        let mut rng = rng();
        for _ in 0..32 {
            let space = reference_space();
            space.random_sample_with(&mut rng).unwrap();

            let p1 = space.param("Param_Choice_1").unwrap().value().unwrap();
            assert!(matches!(p1, Value::Int(1) | Value::Int(2)));

            let p2 = space.param("Param_Int_1").unwrap().value().unwrap();
            let v = p2.as_int().unwrap();
            assert!((1..=100).contains(&v));

            let p3 = space.param("Param_Real_1").unwrap().value().unwrap();
            let v = p3.as_float().unwrap();
            assert!((0.0..1.0).contains(&v));

            let p5 = space.param("Param_Choice_2").unwrap().value().unwrap();
            let p4 = space.param("Param_Dynamic_1").unwrap().value().unwrap();
            assert_eq!(p4.as_int().unwrap(), p5.as_int().unwrap() * 3);
        }
    }

    // ── Test: the exported configuration carries every assigned value ──

    #[test]
    fn test_assigned_vector() {
        let space = reference_space();
        space.random_sample_with(&mut rng()).unwrap();
        let config = space.assigned_vector();
        // 5 sampleable/computed parameters, all assigned.
        assert_eq!(config.len(), 5);
        assert_eq!(config[0].0, "Param_Choice_1");
        assert!(serde_json::to_string(&config).is_ok());
    }
}
