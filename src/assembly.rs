//! Assembly of block-structured operators on nested hierarchies.
//!
//! Element matrices are produced by [`integrators`], organized into block matrices over
//! FE hierarchies by [`form`], specialized to the temporal hierarchy in [`temporal`] and
//! combined with spatial operators into the global least-squares system in [`system`].
pub mod direct;
pub mod form;
pub mod global;
pub mod integrators;
pub mod rhs;
pub mod system;
pub mod temporal;

pub use form::{BlockBilinearForm, BlockMixedBilinearForm, LevelCoupling};
pub use integrators::{Integrator, LevelRelation, OperatorKind};
pub use system::{IdentityLevelPairing, LevelPairing, ReverseLevelPairing, SparseSystemAssembler};
pub use temporal::TemporalBlockMatrixAssembler;
