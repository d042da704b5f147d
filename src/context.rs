//! The thread-local default-space stack.
//!
//! Constructors that are not handed an explicit space register into
//! [`get_default_space`]: the top of a per-thread stack of spaces, or a
//! lazily-created per-thread root space when the stack is empty. The root
//! persists for the thread's lifetime and is reused across all empty-stack
//! queries.
//!
//! [`Space::as_default`] pushes a space and returns an RAII guard; dropping
//! the guard pops, so the previous top is restored on every exit path,
//! including unwinding.

use std::cell::{OnceCell, RefCell};

use crate::space::Space;

thread_local! {
    static DEFAULT_STACK: RefCell<Vec<Space>> = RefCell::new(Vec::new());
    static ROOT_SPACE: OnceCell<Space> = OnceCell::new();
}

/// The space implicit constructors register into: top of the thread's
/// default stack, else the thread's lazily-created root space.
pub fn get_default_space() -> Space {
    let top = DEFAULT_STACK.with(|stack| stack.borrow().last().cloned());
    match top {
        Some(space) => space,
        None => ROOT_SPACE.with(|root| root.get_or_init(Space::new).clone()),
    }
}

/// RAII guard holding a space on the thread's default stack. Guards nest;
/// drop order must mirror acquisition order (the natural scoping discipline
/// enforces this).
#[must_use = "dropping the guard immediately restores the previous default space"]
pub struct DefaultGuard {
    space: Space,
}

impl Drop for DefaultGuard {
    fn drop(&mut self) {
        DEFAULT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert!(
                popped.as_ref() == Some(&self.space),
                "default-space guards dropped out of order"
            );
        });
    }
}

impl Space {
    /// Push this space as the thread's default; the returned guard pops it
    /// on drop.
    pub fn as_default(&self) -> DefaultGuard {
        DEFAULT_STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        DefaultGuard {
            space: self.clone(),
        }
    }
}
