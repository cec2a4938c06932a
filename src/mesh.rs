use crate::connectivity::{Connectivity, Segment1dConnectivity, Tri3d2Connectivity};
use crate::element::{ElementConnectivity, FiniteElement};
use nalgebra::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod locate;
pub mod procedural;
pub mod refinement;
pub mod transformation;

/// Index-based data structure for conforming meshes (i.e. no hanging nodes).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Mesh<const D: usize, Connectivity> {
    vertices: Vec<Point<f64, D>>,
    connectivity: Vec<Connectivity>,
}

/// A mesh of segments, used both for temporal meshes and for one-dimensional spatial domains.
pub type IntervalMesh = Mesh<1, Segment1dConnectivity>;
pub type TriangleMesh2d = Mesh<2, Tri3d2Connectivity>;

impl<const D: usize, Connectivity> Mesh<D, Connectivity> {
    pub fn vertices(&self) -> &[Point<f64, D>] {
        &self.vertices
    }

    pub fn connectivity(&self) -> &[Connectivity] {
        &self.connectivity
    }

    /// Construct a mesh from vertices and connectivity.
    ///
    /// The connectivity is expected to only reference valid vertex indices. Methods that
    /// build elements return `None` or panic on out-of-bounds indices.
    pub fn from_vertices_and_connectivity(vertices: Vec<Point<f64, D>>, connectivity: Vec<Connectivity>) -> Self {
        Self { vertices, connectivity }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_elements(&self) -> usize {
        self.connectivity.len()
    }
}

impl<const D: usize, C> Mesh<D, C>
where
    C: ElementConnectivity<D>,
{
    pub fn element(&self, index: usize) -> Option<C::Element> {
        self.connectivity
            .get(index)
            .and_then(|conn| conn.element(&self.vertices))
    }

    pub fn element_iter(&self) -> impl '_ + Iterator<Item = C::Element> {
        self.connectivity.iter().map(move |conn| {
            conn.element(&self.vertices)
                .expect("Connectivity must only reference valid vertex indices")
        })
    }

    /// Total measure (length, area) of the mesh.
    pub fn measure(&self) -> f64 {
        self.element_iter().map(|element| element.measure()).sum()
    }

    /// The largest element diameter.
    pub fn mesh_width(&self) -> f64 {
        self.element_iter()
            .map(|element| element.diameter())
            .fold(0.0, f64::max)
    }
}

impl<const D: usize, C> Mesh<D, C>
where
    C: Connectivity,
{
    /// Finds faces which are only connected to exactly one element, along with the connected
    /// element index and the local index of the face within that element.
    pub fn find_boundary_faces(&self) -> Vec<(C::FaceConnectivity, usize, usize)> {
        let mut face_info = Vec::new();
        // Count the occurrences of faces referring to the same (sorted) vertex indices.
        // A BTreeMap keeps the output order independent of hashing.
        let mut face_counts = BTreeMap::new();

        for (element_idx, element_conn) in self.connectivity.iter().enumerate() {
            for local_idx in 0..element_conn.num_faces() {
                let face_conn = element_conn
                    .get_face_connectivity(local_idx)
                    .expect("Local face index is less than the number of faces");
                let mut key = face_conn.vertex_indices().to_vec();
                key.sort_unstable();
                let info_idx = face_info.len();
                face_info.push((face_conn, element_idx, local_idx));
                face_counts
                    .entry(key)
                    .and_modify(|(_, count)| *count += 1)
                    .or_insert((info_idx, 1));
            }
        }

        face_counts
            .into_values()
            .filter(|&(_, count)| count == 1)
            .map(|(i, _)| face_info[i].clone())
            .collect()
    }

    /// Returns a sorted list of vertices that are determined to be on the boundary.
    ///
    /// A vertex is considered to be a part of the boundary if it belongs to a boundary face.
    pub fn find_boundary_vertices(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        for (connectivity, _, _) in self.find_boundary_faces() {
            indices.extend_from_slice(connectivity.vertex_indices());
        }
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
