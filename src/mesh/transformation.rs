//! Parent-child relations between the elements of a mesh and its refinement.
use crate::element::{AffineMap, ElementConnectivity, FiniteElement};
use crate::error::AssemblyError;
use crate::mesh::locate::ElementLocator;
use crate::mesh::Mesh;
use log::debug;

/// Tolerance for reference-coordinate containment tests.
const CONTAINMENT_TOL: f64 = 1e-10;
/// Relative tolerance when comparing a parent's measure with the sum of its children's.
const MEASURE_REL_TOL: f64 = 1e-10;
/// Tolerance for reference maps, relative to the parent's diameter.
const MAP_REL_TOL: f64 = 1e-10;

/// Maps every element of a fine mesh (child) to the element of the coarse mesh (parent)
/// containing it, together with the affine map from the child's reference domain
/// to the parent's reference domain.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshTransformationTable<const D: usize> {
    parents: Vec<usize>,
    maps: Vec<AffineMap<D>>,
    // Children of parent `p` are child_indices[child_offsets[p] .. child_offsets[p + 1]].
    child_offsets: Vec<usize>,
    child_indices: Vec<usize>,
}

impl<const D: usize> MeshTransformationTable<D> {
    /// Creates a table from per-child parent indices and reference maps.
    ///
    /// Fails with a structural mismatch if the arrays have different lengths or a parent
    /// index is out of bounds, and with a hierarchy inconsistency if a parent owns no child.
    pub fn try_new(
        num_parents: usize,
        parents: Vec<usize>,
        maps: Vec<AffineMap<D>>,
    ) -> Result<Self, AssemblyError> {
        if parents.len() != maps.len() {
            return Err(AssemblyError::structural(format!(
                "{} parent indices but {} affine maps",
                parents.len(),
                maps.len()
            )));
        }
        if let Some(&p) = parents.iter().find(|&&p| p >= num_parents) {
            return Err(AssemblyError::structural(format!(
                "parent index {} out of bounds for {} coarse elements",
                p, num_parents
            )));
        }

        let mut counts = vec![0; num_parents];
        for &p in &parents {
            counts[p] += 1;
        }
        if let Some(childless) = counts.iter().position(|&c| c == 0) {
            return Err(AssemblyError::hierarchy(format!(
                "coarse element {} owns no child element",
                childless
            )));
        }

        let mut child_offsets = Vec::with_capacity(num_parents + 1);
        child_offsets.push(0);
        for count in &counts {
            let last = *child_offsets.last().expect("Offsets are never empty");
            child_offsets.push(last + count);
        }
        let mut next = child_offsets[..num_parents].to_vec();
        let mut child_indices = vec![0; parents.len()];
        for (child, &p) in parents.iter().enumerate() {
            child_indices[next[p]] = child;
            next[p] += 1;
        }

        Ok(Self {
            parents,
            maps,
            child_offsets,
            child_indices,
        })
    }

    /// Number of fine (child) elements.
    pub fn num_children(&self) -> usize {
        self.parents.len()
    }

    /// Number of coarse (parent) elements.
    pub fn num_parents(&self) -> usize {
        self.child_offsets.len() - 1
    }

    pub fn parents(&self) -> &[usize] {
        &self.parents
    }

    /// # Panics
    ///
    /// Panics if the child index is out of bounds.
    pub fn parent(&self, child: usize) -> usize {
        self.parents[child]
    }

    /// The map `xi_parent = A xi_child + b` for the given child.
    pub fn affine_map(&self, child: usize) -> &AffineMap<D> {
        &self.maps[child]
    }

    /// Children of the given parent in ascending order.
    pub fn children(&self, parent: usize) -> &[usize] {
        &self.child_indices[self.child_offsets[parent]..self.child_offsets[parent + 1]]
    }

    /// Checks that the children of every parent lie inside the parent, that their measures
    /// sum to the parent's measure, and that each child's reference map sends the child's
    /// nodes to their physical positions inside the parent.
    pub fn verify_tiling<C>(&self, coarse: &Mesh<D, C>, fine: &Mesh<D, C>) -> Result<(), AssemblyError>
    where
        C: ElementConnectivity<D>,
    {
        if self.num_parents() != coarse.num_elements() || self.num_children() != fine.num_elements() {
            return Err(AssemblyError::structural(format!(
                "table relates {} parents to {} children, but meshes have {} coarse and {} fine elements",
                self.num_parents(),
                self.num_children(),
                coarse.num_elements(),
                fine.num_elements()
            )));
        }

        for (parent_idx, parent) in coarse.element_iter().enumerate() {
            let mut children_measure = 0.0;
            for &child_idx in self.children(parent_idx) {
                let child = fine
                    .element(child_idx)
                    .expect("Child index is within the fine mesh");
                for vertex in child.vertices() {
                    let xi = parent.map_physical_coords(vertex)?;
                    if !parent.contains_reference_point(&xi, CONTAINMENT_TOL) {
                        return Err(AssemblyError::hierarchy(format!(
                            "child element {} is not contained in its parent {}",
                            child_idx, parent_idx
                        )));
                    }
                }
                let map = self.affine_map(child_idx);
                for k in 0..child.num_nodes() {
                    let xi = child.reference_node(k);
                    let mapped = parent.map_reference_coords(&map.apply(&xi));
                    let distance = (mapped - child.map_reference_coords(&xi)).norm();
                    if distance > MAP_REL_TOL * parent.diameter() {
                        return Err(AssemblyError::hierarchy(format!(
                            "reference map of child element {} misplaces its node {} by {:e}",
                            child_idx, k, distance
                        )));
                    }
                }
                children_measure += child.measure();
            }
            let parent_measure = parent.measure();
            if (children_measure - parent_measure).abs() > MEASURE_REL_TOL * parent_measure {
                return Err(AssemblyError::hierarchy(format!(
                    "children of element {} have total measure {:e}, but the parent has measure {:e}",
                    parent_idx, children_measure, parent_measure
                )));
            }
        }
        Ok(())
    }
}

/// Builds the transformation table between a coarse mesh and its refinement.
///
/// Every fine element is assigned the unique coarse element containing its centroid.
/// Fails with a hierarchy inconsistency if no or several coarse elements contain it, or if
/// the resulting children do not tile their parents.
pub fn build_hierarchical_transformations<const D: usize, C>(
    coarse: &Mesh<D, C>,
    fine: &Mesh<D, C>,
) -> Result<MeshTransformationTable<D>, AssemblyError>
where
    C: ElementConnectivity<D>,
{
    let locator = ElementLocator::from_mesh(coarse);
    let mut parents = Vec::with_capacity(fine.num_elements());
    let mut maps = Vec::with_capacity(fine.num_elements());

    for (child_idx, child) in fine.element_iter().enumerate() {
        let centroid = child.centroid();
        let containing = locator.locate(coarse, &centroid, CONTAINMENT_TOL);
        let parent_idx = match containing.as_slice() {
            [parent_idx] => *parent_idx,
            _ => {
                return Err(AssemblyError::hierarchy(format!(
                    "fine element {} has {} candidate parents, expected exactly one",
                    child_idx,
                    containing.len()
                )))
            }
        };
        let parent = coarse
            .element(parent_idx)
            .expect("Located element index is within the coarse mesh");
        parents.push(parent_idx);
        maps.push(child.reference_map_into(&parent)?);
    }

    let table = MeshTransformationTable::try_new(coarse.num_elements(), parents, maps)?;
    table.verify_tiling(coarse, fine)?;
    debug!(
        "Built transformation table: {} coarse elements, {} fine elements",
        table.num_parents(),
        table.num_children()
    );
    Ok(table)
}
