pub mod assembly;
pub mod config;
pub mod connectivity;
pub mod element;
pub mod error;
pub mod hierarchy;
pub mod mesh;
pub mod problem;
pub mod quadrature;
pub mod solution;
pub mod solver;
pub mod space;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
pub extern crate sparse_heat_linalg;

pub use error::AssemblyError;
