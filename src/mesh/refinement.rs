//! Functionality and abstractions for mesh refinement.
//!
//! Currently we only provide uniform refinement for segments and triangles through
//! [`refine_mesh`] and [`UniformRefinement`].
use crate::mesh::Mesh;
use nalgebra::Point;
use rustc_hash::FxHashMap;
use std::hash::Hash;

pub mod detail;

#[derive(Debug, Clone)]
pub struct InvalidVertexCount;

pub trait VertexRepresentation: Clone {
    fn construct_vertex<const D: usize>(&self, all_vertices: &[Point<f64, D>]) -> Point<f64, D>;
}

/// Defines a refinement scheme for a given connectivity.
pub trait RefineConnectivity<Connectivity> {
    /// An intermediate connectivity type that holds the necessary information
    /// to represent the connectivity in a manner independent of the index labeling of
    /// new vertices.
    type Intermediate;
    /// The resulting connectivity type after refinement.
    type OutputConnectivity;
    /// The kind of label used to define vertices in a globally consistent fashion.
    type VertexLabel: VertexRepresentation;

    /// For a given connectivity, produce the intermediate connectivities of its children.
    fn populate_refined_connectivity(&self, connectivity: &Connectivity, intermediates: &mut Vec<Self::Intermediate>);

    /// Populate a set of vertex labels associated with an intermediate connectivity.
    fn populate_vertex_labels(&self, intermediate: &Self::Intermediate, labels: &mut Vec<Self::VertexLabel>);

    /// Construct the final connectivity from an intermediate given final,
    /// globally consistent vertex indices.
    ///
    /// The implementation must succeed if the number of vertex indices is equal to the
    /// number of vertex labels produced by
    /// [`populate_vertex_labels`](Self::populate_vertex_labels).
    fn construct_output_connectivity(
        &self,
        intermediate: &Self::Intermediate,
        vertex_indices: &[usize],
    ) -> Result<Self::OutputConnectivity, InvalidVertexCount>;
}

pub struct UniformRefinement;

/// Refine a mesh with the provided refinement scheme.
///
/// The children of coarse element `k` are stored consecutively, in the order produced by the
/// refinement scheme. Vertex indices are assigned in the order their labels are first
/// encountered, so refining a left-to-right interval mesh yields a left-to-right mesh.
pub fn refine_mesh<const D: usize, C, Refinement>(
    mesh: &Mesh<D, C>,
    refinement_scheme: Refinement,
) -> Mesh<D, Refinement::OutputConnectivity>
where
    Refinement: RefineConnectivity<C>,
    Refinement::VertexLabel: Eq + Hash,
{
    let mut label_to_idx_map = FxHashMap::default();
    let mut next_vertex_idx = 0;

    let mut new_connectivity = Vec::new();

    // Local buffers
    let mut intermediates = Vec::new();
    let mut vertex_labels = Vec::new();
    let mut new_vertex_indices = Vec::new();
    for connectivity in mesh.connectivity() {
        intermediates.clear();
        refinement_scheme.populate_refined_connectivity(connectivity, &mut intermediates);
        for intermediate in &intermediates {
            vertex_labels.clear();
            new_vertex_indices.clear();
            refinement_scheme.populate_vertex_labels(intermediate, &mut vertex_labels);
            for label in &vertex_labels {
                let idx = label_to_idx_map.entry(label.clone()).or_insert_with(|| {
                    let idx = next_vertex_idx;
                    next_vertex_idx += 1;
                    idx
                });
                new_vertex_indices.push(*idx);
            }
            let new_element_connectivity = refinement_scheme
                .construct_output_connectivity(intermediate, &new_vertex_indices)
                .expect("Must succeed since vertex label count is consistent with vertex index count");
            new_connectivity.push(new_element_connectivity);
        }
    }

    let mut new_vertices = vec![Point::origin(); next_vertex_idx];
    for (label, index) in label_to_idx_map {
        new_vertices[index] = label.construct_vertex(mesh.vertices());
    }
    Mesh::from_vertices_and_connectivity(new_vertices, new_connectivity)
}

/// Apply one round of uniform mesh refinement.
///
/// This is a convenience function for `refine_mesh(mesh, UniformRefinement)`.
pub fn refine_uniformly<const D: usize, C>(mesh: &Mesh<D, C>) -> Mesh<D, C>
where
    UniformRefinement: RefineConnectivity<C, OutputConnectivity = C>,
    <UniformRefinement as RefineConnectivity<C>>::VertexLabel: Eq + Hash,
{
    refine_mesh(mesh, UniformRefinement)
}

/// Returns `mesh` followed by `num_refinements` successive uniform refinements of it.
pub fn uniform_refinement_sequence<const D: usize, C>(mesh: Mesh<D, C>, num_refinements: usize) -> Vec<Mesh<D, C>>
where
    UniformRefinement: RefineConnectivity<C, OutputConnectivity = C>,
    <UniformRefinement as RefineConnectivity<C>>::VertexLabel: Eq + Hash,
{
    let mut meshes = vec![mesh];
    for _ in 0..num_refinements {
        let finest = meshes.last().expect("Sequence is never empty");
        let refined = refine_uniformly(finest);
        meshes.push(refined);
    }
    meshes
}
