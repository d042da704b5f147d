//! A mutable, traversable search-space graph for configuration search.
//!
//! The substrate an architecture/hyperparameter search explores: a DAG of
//! configurable computation units ([`ModuleRef`]) whose hyperparameters
//! ([`ParamRef`]) stay unassigned until sampled. Some modules are dynamic
//! placeholders whose internal structure is only decided — and spliced into
//! the graph — once a governing parameter receives a value.
//!
//! The crate covers the graph store, naming registry, hyperparameter model
//! with dependency resolution, the deterministic worklist traversal, and
//! the thread-local default-space context. What the units compute, and any
//! training or execution backend, live outside.
//!
//! ```
//! use hyperspace::{Direction, HyperInput, Identity, ParamSpec, Space};
//!
//! let space = Space::new();
//! let _guard = space.as_default();
//!
//! let input = HyperInput::new();
//! let layer = Identity::with_params([
//!     ("units", ParamSpec::choice([64, 128, 256])),
//!     ("dropout", ParamSpec::real(0.0, 0.5)),
//! ]);
//! layer.connect([&input]).unwrap();
//!
//! space.random_sample().unwrap();
//! assert!(space.all_assigned());
//!
//! let mut order = Vec::new();
//! space.traverse(Direction::Forward, |m| {
//!     order.push(m.name());
//!     true
//! });
//! assert_eq!(order, ["HyperInput_1", "Identity_1"]);
//! ```

pub mod context;
pub mod error;
pub mod module;
pub mod param;
pub mod space;
pub mod value;

pub use context::{get_default_space, DefaultGuard};
pub use error::{AssignmentError, ExpansionError, SpaceError, StructuralError};
pub use module::{DynamicModule, HyperInput, Identity, ModuleRef};
pub use param::{ParamRef, ParamSpec};
pub use space::{Direction, Space, UnassignedParams};
pub use value::Value;
