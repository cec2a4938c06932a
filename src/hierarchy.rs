//! Nested sequences of meshes and of finite element spaces on them.
//!
//! A [`NestedMeshHierarchy`] owns its meshes, coarsest first, together with one
//! [`MeshTransformationTable`] per pair of consecutive levels. A [`NestedFeHierarchy`]
//! borrows a mesh hierarchy and attaches one [`FeSpace`] to each level, so the mesh
//! hierarchy must outlive every FE hierarchy and assembler built on top of it.
use crate::element::{AffineMap, ElementConnectivity, FiniteElement};
use crate::error::AssemblyError;
use crate::mesh::refinement::{uniform_refinement_sequence, RefineConnectivity, UniformRefinement};
use crate::mesh::transformation::{build_hierarchical_transformations, MeshTransformationTable};
use crate::mesh::Mesh;
use crate::space::FeSpace;
use log::{debug, warn};
use std::hash::Hash;

fn warn_degenerate_elements<const D: usize, C: ElementConnectivity<D>>(mesh: &Mesh<D, C>, level: usize) {
    let num_degenerate = mesh
        .element_iter()
        .filter(|element| element.measure() <= 0.0)
        .count();
    if num_degenerate > 0 {
        warn!("Mesh level {} has {} elements with zero measure", level, num_degenerate);
    }
}

#[derive(Debug, Clone)]
pub struct NestedMeshHierarchy<const D: usize, C> {
    meshes: Vec<Mesh<D, C>>,
    transformations: Vec<MeshTransformationTable<D>>,
}

impl<const D: usize, C> NestedMeshHierarchy<D, C>
where
    C: ElementConnectivity<D>,
{
    /// A hierarchy with a single level.
    pub fn new(mesh: Mesh<D, C>) -> Self {
        warn_degenerate_elements(&mesh, 0);
        Self {
            meshes: vec![mesh],
            transformations: Vec::new(),
        }
    }

    /// Builds a hierarchy of `mesh` and `num_refinements` successive uniform refinements.
    pub fn from_uniform_refinement(mesh: Mesh<D, C>, num_refinements: usize) -> Result<Self, AssemblyError>
    where
        UniformRefinement: RefineConnectivity<C, OutputConnectivity = C>,
        <UniformRefinement as RefineConnectivity<C>>::VertexLabel: Eq + Hash,
    {
        let mut meshes = uniform_refinement_sequence(mesh, num_refinements).into_iter();
        let mut hierarchy = Self::new(meshes.next().expect("Sequence starts with the input mesh"));
        for refined in meshes {
            hierarchy.add_mesh(refined)?;
        }
        Ok(hierarchy)
    }

    /// Appends a new finest level, building the transformation table from the geometry.
    pub fn add_mesh(&mut self, mesh: Mesh<D, C>) -> Result<(), AssemblyError> {
        let table = build_hierarchical_transformations(self.finest_mesh(), &mesh)?;
        self.push_level(mesh, table);
        Ok(())
    }

    /// Appends a new finest level with a caller-supplied transformation table.
    ///
    /// The table must relate every element of `mesh` to an element of the current finest
    /// level, and the children of each coarse element must tile it.
    pub fn add_mesh_with_transformation(
        &mut self,
        mesh: Mesh<D, C>,
        table: MeshTransformationTable<D>,
    ) -> Result<(), AssemblyError> {
        table.verify_tiling(self.finest_mesh(), &mesh)?;
        self.push_level(mesh, table);
        Ok(())
    }

    fn push_level(&mut self, mesh: Mesh<D, C>, table: MeshTransformationTable<D>) {
        warn_degenerate_elements(&mesh, self.meshes.len());
        debug!(
            "Adding mesh level {} with {} elements",
            self.meshes.len(),
            mesh.num_elements()
        );
        self.meshes.push(mesh);
        self.transformations.push(table);
    }

    pub fn meshes(&self) -> &[Mesh<D, C>] {
        &self.meshes
    }

    /// The table relating level `l` to level `l + 1` is at index `l`.
    pub fn transformations(&self) -> &[MeshTransformationTable<D>] {
        &self.transformations
    }

    pub fn num_levels(&self) -> usize {
        self.meshes.len()
    }

    pub fn mesh(&self, level: usize) -> &Mesh<D, C> {
        &self.meshes[level]
    }

    pub fn finest_mesh(&self) -> &Mesh<D, C> {
        self.meshes
            .last()
            .expect("A hierarchy has at least one level")
    }

    pub fn num_elements(&self, level: usize) -> usize {
        self.meshes[level].num_elements()
    }

    /// The parent of `element` on level `level - 1`, or `None` on the coarsest level.
    pub fn parent(&self, level: usize, element: usize) -> Option<usize> {
        level
            .checked_sub(1)
            .map(|coarse| self.transformations[coarse].parent(element))
    }

    /// The ancestor of `element` (on `level`) on `coarse_level`, together with the map from
    /// the element's reference domain to the ancestor's reference domain.
    ///
    /// # Panics
    ///
    /// Panics if `coarse_level > level`.
    pub fn ancestor_with_map(&self, level: usize, element: usize, coarse_level: usize) -> (usize, AffineMap<D>) {
        assert!(coarse_level <= level, "Ancestor level must not be finer than the element level");
        let mut current = element;
        let mut map = AffineMap::identity();
        for l in (coarse_level..level).rev() {
            let table = &self.transformations[l];
            map = map.then(table.affine_map(current));
            current = table.parent(current);
        }
        (current, map)
    }

    pub fn ancestor(&self, level: usize, element: usize, coarse_level: usize) -> usize {
        self.ancestor_with_map(level, element, coarse_level).0
    }

    /// The largest element diameter on each level.
    pub fn mesh_widths(&self) -> Vec<f64> {
        self.meshes.iter().map(|mesh| mesh.mesh_width()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct NestedFeHierarchy<'a, const D: usize, C> {
    meshes: &'a NestedMeshHierarchy<D, C>,
    spaces: Vec<FeSpace>,
}

impl<'a, const D: usize, C> NestedFeHierarchy<'a, D, C>
where
    C: ElementConnectivity<D>,
{
    /// An FE hierarchy without spaces. Spaces are attached level by level with
    /// [`add_fe_space`](Self::add_fe_space).
    pub fn new(meshes: &'a NestedMeshHierarchy<D, C>) -> Self {
        Self {
            meshes,
            spaces: Vec::new(),
        }
    }

    /// Nodal spaces with `solution_dim` components on every level.
    pub fn nodal(meshes: &'a NestedMeshHierarchy<D, C>, solution_dim: usize) -> Self {
        let spaces = meshes
            .meshes()
            .iter()
            .map(|mesh| FeSpace::nodal(mesh.num_vertices(), solution_dim))
            .collect();
        Self { meshes, spaces }
    }

    /// Scalar hierarchical spaces: nodal on the coarsest level, increment spaces on finer levels.
    pub fn hierarchical(meshes: &'a NestedMeshHierarchy<D, C>) -> Result<Self, AssemblyError> {
        let mut hierarchy = Self::new(meshes);
        hierarchy.add_fe_space(FeSpace::nodal(meshes.mesh(0).num_vertices(), 1))?;
        for (level, table) in meshes.transformations().iter().enumerate() {
            let space = FeSpace::hierarchical_increment(meshes.mesh(level), meshes.mesh(level + 1), table)?;
            hierarchy.add_fe_space(space)?;
        }
        Ok(hierarchy)
    }

    /// Attaches a space to the next level without one.
    pub fn add_fe_space(&mut self, space: FeSpace) -> Result<(), AssemblyError> {
        let level = self.spaces.len();
        if level >= self.meshes.num_levels() {
            return Err(AssemblyError::structural(format!(
                "cannot add FE space for level {} to a hierarchy of {} mesh levels",
                level,
                self.meshes.num_levels()
            )));
        }
        let num_vertices = self.meshes.mesh(level).num_vertices();
        if space.num_vertices() != num_vertices {
            return Err(AssemblyError::structural(format!(
                "FE space on {} vertices does not fit level {} with {} vertices",
                space.num_vertices(),
                level,
                num_vertices
            )));
        }
        self.spaces.push(space);
        Ok(())
    }

    pub fn mesh_hierarchy(&self) -> &'a NestedMeshHierarchy<D, C> {
        self.meshes
    }

    pub fn fe_spaces(&self) -> &[FeSpace] {
        &self.spaces
    }

    pub fn num_levels(&self) -> usize {
        self.meshes.num_levels()
    }

    /// Degrees of freedom per level.
    pub fn num_dofs(&self) -> Vec<usize> {
        self.spaces.iter().map(FeSpace::num_dofs).collect()
    }

    /// Fails with a structural mismatch unless every mesh level has a space.
    pub fn check_complete(&self) -> Result<(), AssemblyError> {
        if self.spaces.len() == self.meshes.num_levels() {
            Ok(())
        } else {
            Err(AssemblyError::structural(format!(
                "{} FE spaces for {} mesh levels",
                self.spaces.len(),
                self.meshes.num_levels()
            )))
        }
    }
}
