//! Block-partitioned sparse matrices.
//!
//! A [`BlockMatrix`] is a grid of optional CSR blocks laid out according to row and column
//! [`BlockOffsets`]. Missing blocks are structurally zero.
use core::fmt;
use nalgebra::{RealField, Scalar};
use nalgebra_sparse::CsrMatrix;
use std::error::Error;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BlockStructureError {
    /// Offsets must be non-empty, start at zero and be non-decreasing.
    InvalidOffsets { offsets: Vec<usize> },
    BlockIndexOutOfBounds {
        block_row: usize,
        block_col: usize,
        num_block_rows: usize,
        num_block_cols: usize,
    },
    BlockDimensionMismatch {
        block_row: usize,
        block_col: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

impl fmt::Display for BlockStructureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOffsets { offsets } => {
                write!(f, "Invalid block offsets {:?}", offsets)
            }
            Self::BlockIndexOutOfBounds {
                block_row,
                block_col,
                num_block_rows,
                num_block_cols,
            } => write!(
                f,
                "Block ({}, {}) out of bounds for {} x {} block layout",
                block_row, block_col, num_block_rows, num_block_cols
            ),
            Self::BlockDimensionMismatch {
                block_row,
                block_col,
                expected,
                actual,
            } => write!(
                f,
                "Block ({}, {}) has dimensions {}x{}, but the layout expects {}x{}",
                block_row, block_col, actual.0, actual.1, expected.0, expected.1
            ),
        }
    }
}

impl Error for BlockStructureError {}

/// Offsets `[0, n_0, n_0 + n_1, ...]` partitioning a range of indices into consecutive blocks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockOffsets {
    offsets: Vec<usize>,
}

impl BlockOffsets {
    pub fn from_sizes(sizes: impl IntoIterator<Item = usize>) -> Self {
        let mut offsets = vec![0];
        let mut total = 0;
        for size in sizes {
            total += size;
            offsets.push(total);
        }
        Self { offsets }
    }

    pub fn try_from_offsets(offsets: Vec<usize>) -> Result<Self, BlockStructureError> {
        let starts_at_zero = offsets.first() == Some(&0);
        let non_decreasing = offsets.windows(2).all(|w| w[0] <= w[1]);
        if starts_at_zero && non_decreasing {
            Ok(Self { offsets })
        } else {
            Err(BlockStructureError::InvalidOffsets { offsets })
        }
    }

    pub fn num_blocks(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn total_size(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    pub fn block_offset(&self, block: usize) -> usize {
        self.offsets[block]
    }

    pub fn block_size(&self, block: usize) -> usize {
        self.offsets[block + 1] - self.offsets[block]
    }

    pub fn block_range(&self, block: usize) -> Range<usize> {
        self.offsets[block]..self.offsets[block + 1]
    }

    pub fn sizes(&self) -> impl '_ + Iterator<Item = usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0])
    }

    /// Appends the blocks of `other` after the blocks of `self`.
    pub fn concat(&self, other: &BlockOffsets) -> Self {
        Self::from_sizes(self.sizes().chain(other.sizes()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockMatrix<T> {
    row_offsets: BlockOffsets,
    col_offsets: BlockOffsets,
    blocks: Vec<Option<CsrMatrix<T>>>,
}

impl<T: Scalar> BlockMatrix<T> {
    /// Creates a block matrix with the given layout in which every block is empty.
    pub fn new(row_offsets: BlockOffsets, col_offsets: BlockOffsets) -> Self {
        let num_blocks = row_offsets.num_blocks() * col_offsets.num_blocks();
        Self {
            row_offsets,
            col_offsets,
            blocks: vec![None; num_blocks],
        }
    }

    pub fn row_offsets(&self) -> &BlockOffsets {
        &self.row_offsets
    }

    pub fn col_offsets(&self) -> &BlockOffsets {
        &self.col_offsets
    }

    pub fn num_block_rows(&self) -> usize {
        self.row_offsets.num_blocks()
    }

    pub fn num_block_cols(&self) -> usize {
        self.col_offsets.num_blocks()
    }

    pub fn nrows(&self) -> usize {
        self.row_offsets.total_size()
    }

    pub fn ncols(&self) -> usize {
        self.col_offsets.total_size()
    }

    fn linear_index(&self, block_row: usize, block_col: usize) -> Result<usize, BlockStructureError> {
        if block_row < self.num_block_rows() && block_col < self.num_block_cols() {
            Ok(block_row * self.num_block_cols() + block_col)
        } else {
            Err(BlockStructureError::BlockIndexOutOfBounds {
                block_row,
                block_col,
                num_block_rows: self.num_block_rows(),
                num_block_cols: self.num_block_cols(),
            })
        }
    }

    fn check_block_dimensions(
        &self,
        block_row: usize,
        block_col: usize,
        block: &CsrMatrix<T>,
    ) -> Result<(), BlockStructureError> {
        let expected = (self.row_offsets.block_size(block_row), self.col_offsets.block_size(block_col));
        let actual = (block.nrows(), block.ncols());
        if expected == actual {
            Ok(())
        } else {
            Err(BlockStructureError::BlockDimensionMismatch {
                block_row,
                block_col,
                expected,
                actual,
            })
        }
    }

    /// Returns the block at the given position, or `None` if the block is empty
    /// or out of bounds.
    pub fn block(&self, block_row: usize, block_col: usize) -> Option<&CsrMatrix<T>> {
        self.linear_index(block_row, block_col)
            .ok()
            .and_then(|idx| self.blocks[idx].as_ref())
    }

    pub fn has_block(&self, block_row: usize, block_col: usize) -> bool {
        self.block(block_row, block_col).is_some()
    }

    pub fn set_block(
        &mut self,
        block_row: usize,
        block_col: usize,
        block: CsrMatrix<T>,
    ) -> Result<(), BlockStructureError> {
        let idx = self.linear_index(block_row, block_col)?;
        self.check_block_dimensions(block_row, block_col, &block)?;
        self.blocks[idx] = Some(block);
        Ok(())
    }

    /// Iterates over all non-empty blocks as `(block_row, block_col, block)`.
    pub fn block_iter(&self) -> impl '_ + Iterator<Item = (usize, usize, &CsrMatrix<T>)> {
        let num_block_cols = self.num_block_cols();
        self.blocks.iter().enumerate().filter_map(move |(idx, block)| {
            block
                .as_ref()
                .map(|block| (idx / num_block_cols, idx % num_block_cols, block))
        })
    }

    pub fn transpose(&self) -> Self {
        let mut result = Self::new(self.col_offsets.clone(), self.row_offsets.clone());
        for (i, j, block) in self.block_iter() {
            let idx = j * result.num_block_cols() + i;
            result.blocks[idx] = Some(block.transpose());
        }
        result
    }
}

impl<T: RealField> BlockMatrix<T> {
    /// Adds `block` to the block at the given position, inserting it if the block is empty.
    pub fn add_to_block(
        &mut self,
        block_row: usize,
        block_col: usize,
        block: &CsrMatrix<T>,
    ) -> Result<(), BlockStructureError> {
        let idx = self.linear_index(block_row, block_col)?;
        self.check_block_dimensions(block_row, block_col, block)?;
        let sum = match self.blocks[idx].take() {
            Some(existing) => &existing + block,
            None => block.clone(),
        };
        self.blocks[idx] = Some(sum);
        Ok(())
    }

    /// Multiplies every stored entry by `factor`.
    pub fn scale_mut(&mut self, factor: T) {
        for block in self.blocks.iter_mut().flatten() {
            for v in block.values_mut() {
                *v *= factor.clone();
            }
        }
    }

    /// Assembles the blocks into a single CSR matrix with global indices.
    pub fn to_monolithic(&self) -> CsrMatrix<T> {
        let mut row_offsets = Vec::with_capacity(self.nrows() + 1);
        let mut col_indices = Vec::new();
        let mut values = Vec::new();
        row_offsets.push(0);

        for i in 0..self.num_block_rows() {
            for local_row in 0..self.row_offsets.block_size(i) {
                for j in 0..self.num_block_cols() {
                    if let Some(block) = self.block(i, j) {
                        let col_offset = self.col_offsets.block_offset(j);
                        let row = block.row(local_row);
                        col_indices.extend(row.col_indices().iter().map(|&c| c + col_offset));
                        values.extend_from_slice(row.values());
                    }
                }
                row_offsets.push(col_indices.len());
            }
        }

        CsrMatrix::try_from_csr_data(self.nrows(), self.ncols(), row_offsets, col_indices, values)
            .expect("Blocks are valid CSR matrices whose dimensions match the block layout")
    }
}
