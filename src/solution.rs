//! Storage of solved space-time coefficient vectors, per field and per temporal level.
use crate::assembly::system::LevelPairing;
use crate::error::AssemblyError;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use sparse_heat_linalg::BlockOffsets;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Temperature,
    HeatFlux,
}

#[derive(Debug, Clone)]
struct FieldData {
    /// Spatial degrees of freedom of the field, per temporal level.
    spatial_sizes: Vec<usize>,
    levels: Vec<Option<DVector<f64>>>,
}

impl FieldData {
    fn new(spatial_sizes: Vec<usize>) -> Self {
        let levels = vec![None; spatial_sizes.len()];
        Self { spatial_sizes, levels }
    }
}

/// Splits solution vectors of the space-time system into fields and levels.
///
/// The global vector is laid out as `[u_0, ..., u_{L-1}, q_0, ..., q_{L-1}]`, where block
/// `l` holds the coefficients of temporal level `l` in time-major order. The temporal
/// vertices of level 0 are assumed to be ordered by time.
#[derive(Debug, Clone)]
pub struct SolutionHandler {
    temporal_sizes: Vec<usize>,
    offsets: BlockOffsets,
    temperature: FieldData,
    heat_flux: FieldData,
}

impl SolutionHandler {
    /// Creates an empty handler.
    ///
    /// `temperature_sizes` and `heat_flux_sizes` are the spatial degrees of freedom per
    /// spatial level; `pairing` selects the spatial level of each temporal level.
    pub fn new(
        temporal_sizes: &[usize],
        temperature_sizes: &[usize],
        heat_flux_sizes: &[usize],
        pairing: &dyn LevelPairing,
    ) -> Result<Self, AssemblyError> {
        let num_levels = temporal_sizes.len();
        if num_levels == 0 {
            return Err(AssemblyError::structural("a solution needs at least one temporal level"));
        }

        let paired_sizes = |spatial_sizes: &[usize]| -> Result<Vec<usize>, AssemblyError> {
            (0..num_levels)
                .map(|level| {
                    let spatial_level = pairing.spatial_level(level, num_levels);
                    spatial_sizes.get(spatial_level).copied().ok_or_else(|| {
                        AssemblyError::structural(format!(
                            "temporal level {} is paired with spatial level {}, but only {} spatial levels exist",
                            level,
                            spatial_level,
                            spatial_sizes.len()
                        ))
                    })
                })
                .collect()
        };
        let temperature = FieldData::new(paired_sizes(temperature_sizes)?);
        let heat_flux = FieldData::new(paired_sizes(heat_flux_sizes)?);

        let block_sizes = |field: &FieldData| -> Vec<usize> {
            temporal_sizes
                .iter()
                .zip(&field.spatial_sizes)
                .map(|(n_t, n_x)| n_t * n_x)
                .collect()
        };
        let offsets = BlockOffsets::from_sizes(
            block_sizes(&temperature)
                .into_iter()
                .chain(block_sizes(&heat_flux)),
        );

        Ok(Self {
            temporal_sizes: temporal_sizes.to_vec(),
            offsets,
            temperature,
            heat_flux,
        })
    }

    pub fn num_levels(&self) -> usize {
        self.temporal_sizes.len()
    }

    /// Block layout of the global solution vector.
    pub fn offsets(&self) -> &BlockOffsets {
        &self.offsets
    }

    fn field(&self, field: Field) -> &FieldData {
        match field {
            Field::Temperature => &self.temperature,
            Field::HeatFlux => &self.heat_flux,
        }
    }

    /// Splits a global solution vector and replaces all stored data.
    pub fn store(&mut self, solution: &DVector<f64>) -> Result<(), AssemblyError> {
        if solution.len() != self.offsets.total_size() {
            return Err(AssemblyError::structural(format!(
                "solution of length {} does not match the system size {}",
                solution.len(),
                self.offsets.total_size()
            )));
        }
        let num_levels = self.num_levels();
        for level in 0..num_levels {
            let u = self.offsets.block_range(level);
            let q = self.offsets.block_range(num_levels + level);
            self.temperature.levels[level] = Some(solution.rows(u.start, u.len()).into_owned());
            self.heat_flux.levels[level] = Some(solution.rows(q.start, q.len()).into_owned());
        }
        Ok(())
    }

    /// Forgets all stored data.
    pub fn clear(&mut self) {
        for data in self
            .temperature
            .levels
            .iter_mut()
            .chain(self.heat_flux.levels.iter_mut())
        {
            *data = None;
        }
    }

    /// The coefficients of a field on one temporal level, in time-major order.
    pub fn level_data(&self, field: Field, level: usize) -> Result<&DVector<f64>, AssemblyError> {
        let data = self.field(field).levels.get(level).ok_or_else(|| {
            AssemblyError::structural(format!(
                "level {} is out of range for {} temporal levels",
                level,
                self.num_levels()
            ))
        })?;
        data.as_ref().ok_or_else(|| {
            AssemblyError::unassembled(format!("no {:?} data stored for temporal level {}", field, level))
        })
    }

    fn data_at_temporal_node(&self, field: Field, node: usize) -> Result<DVector<f64>, AssemblyError> {
        let data = self.level_data(field, 0)?;
        let n_x = self.field(field).spatial_sizes[0];
        Ok(data.rows(node * n_x, n_x).into_owned())
    }

    /// Spatial coefficients at the final time.
    ///
    /// Temporal functions of finer levels vanish at both ends of the time interval, so only
    /// the coarsest level contributes.
    pub fn data_at_end_time(&self, field: Field) -> Result<DVector<f64>, AssemblyError> {
        self.data_at_temporal_node(field, self.temporal_sizes[0] - 1)
    }

    /// Spatial coefficients at the initial time.
    pub fn data_at_initial_time(&self, field: Field) -> Result<DVector<f64>, AssemblyError> {
        self.data_at_temporal_node(field, 0)
    }
}
