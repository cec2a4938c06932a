//! Lower level details for refinement abstractions.

use crate::connectivity::{Segment1dConnectivity, Tri3d2Connectivity};
use crate::mesh::refinement::{InvalidVertexCount, RefineConnectivity, UniformRefinement, VertexRepresentation};
use core::cmp::{max, min};
use core::hash::{Hash, Hasher};
use nalgebra::Point;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VertexLabel(pub usize);

impl VertexRepresentation for VertexLabel {
    fn construct_vertex<const D: usize>(&self, all_vertices: &[Point<f64, D>]) -> Point<f64, D> {
        let &Self(vertex_idx) = self;
        all_vertices[vertex_idx]
    }
}

/// The midpoint of the edge between two vertices, independent of the edge orientation.
#[derive(Debug, Copy, Clone, Eq)]
pub struct EdgeMidpointLabel(pub [usize; 2]);

impl EdgeMidpointLabel {
    fn canonical_vertex_indices(&self) -> [usize; 2] {
        let &EdgeMidpointLabel([a, b]) = self;
        [min(a, b), max(a, b)]
    }
}

impl VertexRepresentation for EdgeMidpointLabel {
    fn construct_vertex<const D: usize>(&self, all_vertices: &[Point<f64, D>]) -> Point<f64, D> {
        let [a, b] = self.canonical_vertex_indices().map(|idx| &all_vertices[idx]);
        Point::from((a.coords + b.coords) / 2.0)
    }
}

impl PartialEq for EdgeMidpointLabel {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_vertex_indices() == other.canonical_vertex_indices()
    }
}

impl Hash for EdgeMidpointLabel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_vertex_indices().hash(state)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VertexOrEdgeMidpointVertex {
    Vertex(VertexLabel),
    EdgeMidpoint(EdgeMidpointLabel),
}

impl From<VertexLabel> for VertexOrEdgeMidpointVertex {
    fn from(label: VertexLabel) -> Self {
        Self::Vertex(label)
    }
}

impl From<EdgeMidpointLabel> for VertexOrEdgeMidpointVertex {
    fn from(label: EdgeMidpointLabel) -> Self {
        Self::EdgeMidpoint(label)
    }
}

impl VertexRepresentation for VertexOrEdgeMidpointVertex {
    fn construct_vertex<const D: usize>(&self, all_vertices: &[Point<f64, D>]) -> Point<f64, D> {
        match self {
            Self::Vertex(label) => label.construct_vertex(all_vertices),
            Self::EdgeMidpoint(label) => label.construct_vertex(all_vertices),
        }
    }
}

pub fn edge_midpoint(vertices: [usize; 2]) -> EdgeMidpointLabel {
    EdgeMidpointLabel(vertices)
}

pub fn vertex(vertex: usize) -> VertexLabel {
    VertexLabel(vertex)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IntermediateSegment1d([VertexOrEdgeMidpointVertex; 2]);

impl RefineConnectivity<Segment1dConnectivity> for UniformRefinement {
    type Intermediate = IntermediateSegment1d;
    type OutputConnectivity = Segment1dConnectivity;
    type VertexLabel = VertexOrEdgeMidpointVertex;

    fn populate_refined_connectivity(
        &self,
        connectivity: &Segment1dConnectivity,
        intermediates: &mut Vec<Self::Intermediate>,
    ) {
        let &Segment1dConnectivity([a, b]) = connectivity;
        let m = edge_midpoint([a, b]).into();
        let [a, b] = [a, b].map(|vertex_idx| vertex(vertex_idx).into());

        intermediates.extend_from_slice(&[IntermediateSegment1d([a, m]), IntermediateSegment1d([m, b])]);
    }

    fn populate_vertex_labels(&self, intermediate: &Self::Intermediate, labels: &mut Vec<Self::VertexLabel>) {
        labels.extend_from_slice(&intermediate.0);
    }

    fn construct_output_connectivity(
        &self,
        _intermediate: &Self::Intermediate,
        vertex_indices: &[usize],
    ) -> Result<Self::OutputConnectivity, InvalidVertexCount> {
        Ok(Segment1dConnectivity(
            vertex_indices.try_into().map_err(|_| InvalidVertexCount)?,
        ))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IntermediateTri3d2([VertexOrEdgeMidpointVertex; 3]);

impl RefineConnectivity<Tri3d2Connectivity> for UniformRefinement {
    type Intermediate = IntermediateTri3d2;
    type OutputConnectivity = Tri3d2Connectivity;
    type VertexLabel = VertexOrEdgeMidpointVertex;

    fn populate_refined_connectivity(
        &self,
        connectivity: &Tri3d2Connectivity,
        intermediates: &mut Vec<Self::Intermediate>,
    ) {
        let &Tri3d2Connectivity([a, b, c]) = connectivity;
        let d = edge_midpoint([a, b]).into();
        let e = edge_midpoint([b, c]).into();
        let f = edge_midpoint([c, a]).into();
        let [a, b, c] = [a, b, c].map(|vertex_idx| vertex(vertex_idx).into());

        intermediates.extend_from_slice(&[
            IntermediateTri3d2([a, d, f]),
            IntermediateTri3d2([d, b, e]),
            IntermediateTri3d2([f, e, c]),
            IntermediateTri3d2([d, e, f]),
        ]);
    }

    fn populate_vertex_labels(&self, intermediate: &Self::Intermediate, labels: &mut Vec<Self::VertexLabel>) {
        labels.extend_from_slice(&intermediate.0);
    }

    fn construct_output_connectivity(
        &self,
        _intermediate: &Self::Intermediate,
        vertex_indices: &[usize],
    ) -> Result<Self::OutputConnectivity, InvalidVertexCount> {
        Ok(Tri3d2Connectivity(
            vertex_indices.try_into().map_err(|_| InvalidVertexCount)?,
        ))
    }
}
