//! Piecewise linear finite element spaces on a single mesh level.
use crate::connectivity::Connectivity;
use crate::element::{ElementConnectivity, FiniteElement};
use crate::error::AssemblyError;
use crate::mesh::transformation::MeshTransformationTable;
use crate::mesh::Mesh;

/// Tolerance for identifying a child vertex with a vertex of its parent in reference coordinates.
const VERTEX_MATCH_TOL: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeSpaceKind {
    /// Every mesh vertex carries a basis function.
    Nodal,
    /// Only the vertices introduced by the last refinement carry basis functions.
    HierarchicalIncrement,
}

/// A P1 space over the vertices of a mesh, scalar or vector valued.
///
/// Vector-valued spaces number their degrees of freedom interleaved, i.e. component `c` of
/// node `n` has index `n * solution_dim + c`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeSpace {
    kind: FeSpaceKind,
    solution_dim: usize,
    node_to_dof_node: Vec<Option<usize>>,
    num_dof_nodes: usize,
}

impl FeSpace {
    pub fn nodal(num_vertices: usize, solution_dim: usize) -> Self {
        Self {
            kind: FeSpaceKind::Nodal,
            solution_dim,
            node_to_dof_node: (0..num_vertices).map(Some).collect(),
            num_dof_nodes: num_vertices,
        }
    }

    /// The scalar space on `fine` spanned by the nodal functions of vertices that are not
    /// vertices of the coarse mesh. These are numbered in ascending vertex order.
    pub fn hierarchical_increment<const D: usize, C>(
        coarse: &Mesh<D, C>,
        fine: &Mesh<D, C>,
        table: &MeshTransformationTable<D>,
    ) -> Result<Self, AssemblyError>
    where
        C: ElementConnectivity<D>,
    {
        if table.num_children() != fine.num_elements() || table.num_parents() != coarse.num_elements() {
            return Err(AssemblyError::structural(
                "transformation table does not relate the given meshes",
            ));
        }

        let mut is_inherited = vec![false; fine.num_vertices()];
        for (child_idx, (conn, child)) in fine
            .connectivity()
            .iter()
            .zip(fine.element_iter())
            .enumerate()
        {
            let parent = coarse
                .element(table.parent(child_idx))
                .expect("Parent index is within the coarse mesh");
            let map = table.affine_map(child_idx);
            for (local_idx, &vertex_idx) in conn.vertex_indices().iter().enumerate() {
                let xi_parent = map.apply(&child.reference_node(local_idx));
                let coincides_with_parent_vertex = (0..parent.num_nodes())
                    .any(|j| (parent.reference_node(j) - xi_parent).norm() <= VERTEX_MATCH_TOL);
                if coincides_with_parent_vertex {
                    is_inherited[vertex_idx] = true;
                }
            }
        }

        let mut num_dof_nodes = 0;
        let node_to_dof_node = is_inherited
            .into_iter()
            .map(|inherited| {
                if inherited {
                    None
                } else {
                    num_dof_nodes += 1;
                    Some(num_dof_nodes - 1)
                }
            })
            .collect();

        Ok(Self {
            kind: FeSpaceKind::HierarchicalIncrement,
            solution_dim: 1,
            node_to_dof_node,
            num_dof_nodes,
        })
    }

    pub fn kind(&self) -> FeSpaceKind {
        self.kind
    }

    pub fn solution_dim(&self) -> usize {
        self.solution_dim
    }

    pub fn num_vertices(&self) -> usize {
        self.node_to_dof_node.len()
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dof_nodes * self.solution_dim
    }

    /// The index of the node among the nodes carrying degrees of freedom, if any.
    pub fn dof_node(&self, vertex: usize) -> Option<usize> {
        self.node_to_dof_node.get(vertex).copied().flatten()
    }

    /// Global degree of freedom of component `component` at `vertex`, if the vertex carries one.
    pub fn dof(&self, vertex: usize, component: usize) -> Option<usize> {
        debug_assert!(component < self.solution_dim);
        self.dof_node(vertex)
            .map(|node| node * self.solution_dim + component)
    }

    /// Fills `dofs` with the global degrees of freedom of an element, local node-major with
    /// interleaved components, matching the layout of element matrices.
    pub fn populate_element_dofs<C: Connectivity>(&self, conn: &C, dofs: &mut Vec<Option<usize>>) {
        dofs.clear();
        for &vertex in conn.vertex_indices() {
            for component in 0..self.solution_dim {
                dofs.push(self.dof(vertex, component));
            }
        }
    }

    /// Degrees of freedom associated with the given vertices, all components included.
    pub fn dofs_for_vertices(&self, vertices: &[usize]) -> Vec<usize> {
        vertices
            .iter()
            .flat_map(|&v| (0..self.solution_dim).filter_map(move |c| self.dof(v, c)))
            .collect()
    }
}
