//! # frame_core - Steel Gravity Frame Design Pipeline
//!
//! `frame_core` takes raw frame geometry (joints and members in feet) and
//! carries it through to a sized, code-checked steel design. All inputs and
//! outputs are JSON-serializable, and every stage can be checkpointed.
//!
//! ## Design Philosophy
//!
//! - **Staged**: each component commits its result before the next reads it
//! - **JSON-First**: all types implement Serialize/Deserialize
//! - **Rich Errors**: structured error types with offending ids
//! - **Deterministic**: same geometry in, same levels, areas and groups out
//!
//! ## Quick Start
//!
//! ```rust
//! use frame_core::analysis::TributarySolver;
//! use frame_core::config::DesignConfig;
//! use frame_core::model::{Point3, StructuralModel};
//! use frame_core::pipeline::Pipeline;
//!
//! let mut model = StructuralModel::new();
//! for (id, x, y) in [("A", 0.0, 0.0), ("B", 24.0, 0.0), ("C", 24.0, 20.0), ("D", 0.0, 20.0)] {
//!     model.add_joint(format!("{id}0"), Point3::new(x, y, 0.0)).unwrap();
//!     model.add_joint(format!("{id}1"), Point3::new(x, y, 12.0)).unwrap();
//!     model.add_frame(format!("C{id}"), format!("{id}0"), format!("{id}1")).unwrap();
//! }
//! for (id, a, b) in [("B1", "A1", "B1"), ("B2", "B1", "C1"), ("B3", "C1", "D1"), ("B4", "D1", "A1")] {
//!     model.add_frame(id, a, b).unwrap();
//! }
//!
//! let mut pipeline = Pipeline::new(model, DesignConfig::default()).unwrap();
//! let report = pipeline.run_all(&mut TributarySolver::new()).unwrap();
//! assert!(report.summary.feasible);
//! ```
//!
//! ## Modules
//!
//! - [`geometry`] - Geometry Indexer: roles, levels, floor areas, supports
//! - [`loads`] - Load Applicator: area loads, self-weight, combinations
//! - [`classify`] - Member Classifier: span buckets and column positions
//! - [`optimizer`] - Section Optimizer: analysis/check/adjust loop
//! - [`report`] - Report Aggregator
//! - [`analysis`] - Solver boundary and the built-in tributary solver
//! - [`design`] - AISC 360 member checks
//! - [`pipeline`] - Stage machine and checkpoints
//! - [`file_io`] - Atomic checkpoint files with locking

pub mod analysis;
pub mod classify;
pub mod config;
pub mod design;
pub mod errors;
pub mod file_io;
pub mod geometry;
pub mod loads;
pub mod model;
pub mod optimizer;
pub mod pipeline;
pub mod report;
pub mod sections;
pub mod units;

// Re-export commonly used types at crate root for convenience
pub use config::DesignConfig;
pub use errors::{DesignError, DesignResult};
pub use file_io::{load_checkpoint, save_checkpoint, CheckpointLock};
pub use pipeline::{Checkpoint, Pipeline, Stage};
