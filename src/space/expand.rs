//! Dynamic placeholder expansion.
//!
//! When the parameters a placeholder declares as its own are all assigned,
//! its builder runs (with the owning space as the thread-local default, so
//! modules constructed inside register there) and returns a (head, tail)
//! pair. The placeholder is then spliced out: every edge into it is rewired
//! to head and every edge out of it to tail, in place — list positions and
//! global edge positions are preserved. The placeholder's arena slot is
//! killed but its index stays reserved, so handles held elsewhere stay
//! valid.
//!
//! Rewiring happens only after the builder succeeds and its result is
//! validated; a failed expansion leaves the graph untouched.

use crate::error::{ExpansionError, SpaceError};
use crate::module::{ModuleId, ModuleKind, ModuleRef};
use crate::space::Space;

impl Space {
    /// Expand `id` if it is an unbuilt placeholder whose declared
    /// parameters are all assigned; otherwise do nothing.
    pub(crate) fn expand_if_ready(&self, id: ModuleId) -> Result<(), SpaceError> {
        let ready = {
            let inner = self.inner.borrow();
            let slot = &inner.slots[id.0];
            slot.alive
                && slot.data.kind.is_unbuilt_dynamic()
                && slot
                    .data
                    .params
                    .iter()
                    .all(|(_, pid)| inner.params[pid.0].is_assigned())
        };
        if !ready {
            return Ok(());
        }
        self.expand(id)
    }

    fn expand(&self, id: ModuleId) -> Result<(), SpaceError> {
        let (builder, name) = {
            let inner = self.inner.borrow();
            let data = &inner.slots[id.0].data;
            let ModuleKind::Dynamic { builder, .. } = &data.kind else {
                unreachable!("expand on a non-dynamic module");
            };
            (builder.clone(), data.name.clone())
        };

        let placeholder = ModuleRef {
            space: self.clone(),
            id,
        };
        let (head, tail) = {
            let _guard = self.as_default();
            (*builder)(&placeholder).map_err(|reason| ExpansionError::BuilderFailed {
                name: name.clone(),
                reason,
            })?
        };

        // Validate the replacement before touching any edge.
        if head.space != *self || tail.space != *self {
            return Err(ExpansionError::ForeignReplacement { name }.into());
        }
        {
            let inner = self.inner.borrow();
            let valid = |m: &ModuleRef| m.id != id && inner.slots[m.id.0].alive;
            if !valid(&head) || !valid(&tail) {
                return Err(ExpansionError::ForeignReplacement { name }.into());
            }
        }

        let mut inner = self.inner.borrow_mut();
        let head = head.id;
        let tail = tail.id;

        // Rewire in place: edges into the placeholder now enter head, edges
        // out of it now leave tail, at unchanged positions.
        for edge in inner.edges.iter_mut() {
            if edge.dst == id {
                edge.dst = head;
            }
            if edge.src == id {
                edge.src = tail;
            }
        }
        for slot in inner.slots.iter_mut() {
            for m in slot.data.outbound.iter_mut() {
                if *m == id {
                    *m = head;
                }
            }
            for m in slot.data.inbound.iter_mut() {
                if *m == id {
                    *m = tail;
                }
            }
        }
        let inbound = std::mem::take(&mut inner.slots[id.0].data.inbound);
        let outbound = std::mem::take(&mut inner.slots[id.0].data.outbound);
        inner.slots[head.0].data.inbound.extend(inbound);
        inner.slots[tail.0].data.outbound.extend(outbound);

        // Kill the slot; the index stays reserved.
        inner.slots[id.0].alive = false;
        if let ModuleKind::Dynamic { built, .. } = &mut inner.slots[id.0].data.kind {
            *built = true;
        }
        inner.module_names.remove(&name);
        let head_name = inner.slots[head.0].data.name.clone();
        let tail_name = inner.slots[tail.0].data.name.clone();
        tracing::debug!(
            placeholder = %name,
            head = %head_name,
            tail = %tail_name,
            "expanded dynamic placeholder"
        );
        Ok(())
    }
}
