//! Errors reported by hierarchy construction and assembly.
use crate::assembly::integrators::{LevelRelation, OperatorKind};
use sparse_heat_linalg::BlockStructureError;
use std::error::Error;
use std::fmt;

/// Failure conditions of hierarchy construction, block assembly and solution access.
///
/// All variants are fail-fast: no partially assembled matrix or partially filled solution
/// is ever returned alongside them.
#[derive(Debug)]
#[non_exhaustive]
pub enum AssemblyError {
    /// Block offsets, FE-space sizes, table sizes or vector lengths do not agree,
    /// or a block index is out of range.
    StructuralMismatch { description: String },
    /// An integrator was requested for a level relation it does not implement.
    UnsupportedOperator {
        operator: OperatorKind,
        relation: LevelRelation,
    },
    /// A fine element cannot be matched to exactly one parent, or the children of a parent
    /// do not tile it.
    HierarchyInconsistency { description: String },
    /// A block matrix or solution field was queried before it was assembled or stored.
    UnassembledAccess { description: String },
    /// An element-level computation failed (missing quadrature rule, degenerate element).
    Element(eyre::Report),
}

impl AssemblyError {
    pub(crate) fn structural(description: impl Into<String>) -> Self {
        Self::StructuralMismatch {
            description: description.into(),
        }
    }

    pub(crate) fn hierarchy(description: impl Into<String>) -> Self {
        Self::HierarchyInconsistency {
            description: description.into(),
        }
    }

    pub(crate) fn unassembled(description: impl Into<String>) -> Self {
        Self::UnassembledAccess {
            description: description.into(),
        }
    }
}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StructuralMismatch { description } => write!(f, "Structural mismatch: {}", description),
            Self::UnsupportedOperator { operator, relation } => write!(
                f,
                "Operator {:?} is not implemented for level relation {:?}",
                operator, relation
            ),
            Self::HierarchyInconsistency { description } => {
                write!(f, "Inconsistent hierarchy: {}", description)
            }
            Self::UnassembledAccess { description } => {
                write!(f, "Access before assembly: {}", description)
            }
            Self::Element(report) => write!(f, "Element computation failed: {}", report),
        }
    }
}

impl Error for AssemblyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Element(report) => Some(AsRef::<dyn Error>::as_ref(report)),
            _ => None,
        }
    }
}

impl From<BlockStructureError> for AssemblyError {
    fn from(err: BlockStructureError) -> Self {
        Self::structural(err.to_string())
    }
}

impl From<eyre::Report> for AssemblyError {
    fn from(report: eyre::Report) -> Self {
        Self::Element(report)
    }
}
