//! Sparse linear algebra building blocks for hierarchical space-time systems.
pub mod block;
pub mod cg;
pub mod constraints;
pub mod kron;

pub use block::{BlockMatrix, BlockOffsets, BlockStructureError};
pub use constraints::{eliminate_rows_and_columns, zero_constrained_entries};
pub use kron::{kronecker_product, scaled_kronecker_product};

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
