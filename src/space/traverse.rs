//! Deterministic worklist traversal.
//!
//! A single FIFO worklist, seeded with the zero-degree modules of the chosen
//! direction in creation order. A popped module is visited only when every
//! neighbor on its upstream side has been visited; otherwise it is pushed to
//! the back and retried later. Unbuilt dynamic placeholders are additionally
//! forced not-ready on their first probe of each traversal — they get one
//! cycle to decide whether they must expand before ordinary structural
//! readiness applies. Order is fully determined by the graph and its
//! edge-insertion history.

use std::collections::{HashSet, VecDeque};

use crate::module::{ModuleId, ModuleRef};
use crate::space::Space;

/// Which way the worklist walks the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Dependency → dependent: seeds are the zero-inbound modules.
    Forward,
    /// Dependent → dependency: seeds are the zero-outbound modules.
    Backward,
}

impl Space {
    /// Visit every module reachable from the seed set exactly once, in
    /// dependency order. The visitor returning `false` stops the whole
    /// traversal; `traverse` then returns `false`.
    ///
    /// Returns `false` as well if the worklist stops making progress, which
    /// can only happen when the caller has wired a cycle.
    pub fn traverse<F>(&self, direction: Direction, mut visitor: F) -> bool
    where
        F: FnMut(&ModuleRef) -> bool,
    {
        let seeds = match direction {
            Direction::Forward => self.inputs(),
            Direction::Backward => self.outputs(),
        };
        let mut queue: VecDeque<ModuleId> = seeds.into_iter().map(|m| m.id).collect();
        let mut visited: HashSet<ModuleId> = HashSet::new();
        let mut probed_placeholders: HashSet<ModuleId> = HashSet::new();
        let mut deferred_in_a_row = 0usize;

        while let Some(id) = queue.pop_front() {
            if visited.contains(&id) {
                continue;
            }

            let ready = {
                let inner = self.inner.borrow();
                let data = &inner.slots[id.0].data;
                let first_probe =
                    data.kind.is_unbuilt_dynamic() && probed_placeholders.insert(id);
                let upstream = match direction {
                    Direction::Forward => &data.inbound,
                    Direction::Backward => &data.outbound,
                };
                !first_probe && upstream.iter().all(|m| visited.contains(m))
            };

            if !ready {
                queue.push_back(id);
                deferred_in_a_row += 1;
                if deferred_in_a_row > queue.len() {
                    // Every queued module was deferred in a row: a cycle.
                    return false;
                }
                continue;
            }
            deferred_in_a_row = 0;
            visited.insert(id);

            // The visitor runs without any borrow held; it may inspect the
            // space freely.
            let module = ModuleRef {
                space: self.clone(),
                id,
            };
            tracing::trace!(module = %module.name(), "visit");
            if !visitor(&module) {
                return false;
            }

            // Re-fetch adjacency by index; the visitor may have mutated it.
            let downstream: Vec<ModuleId> = {
                let inner = self.inner.borrow();
                let data = &inner.slots[id.0].data;
                match direction {
                    Direction::Forward => data.outbound.clone(),
                    Direction::Backward => data.inbound.clone(),
                }
            };
            queue.extend(downstream);
        }
        true
    }

    /// Module visitation order of a full traversal.
    pub(crate) fn traversal_order(&self, direction: Direction) -> Vec<ModuleId> {
        let mut order = Vec::new();
        self.traverse(direction, |m| {
            order.push(m.id);
            true
        });
        order
    }
}
