extern crate itertools;
extern crate nalgebra;

use itertools::Itertools;
use nalgebra::DMatrix;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};

#[allow(non_camel_case_types)]
type float = f64;

type Mask = DMatrix<bool>;

/// Handle to a block of a built matrix whose values can be replaced in place.
///
/// The sparsity of the block is fixed when it is created with `block_mut`. Entries outside the
/// sparsity mask are never stored and must stay zero.
#[derive(Clone, Debug)]
pub struct BlockRef {
    id: usize,
    nrows: usize,
    ncols: usize,
}

impl BlockRef {
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }
}

#[derive(Clone, Debug)]
pub struct Builder {
    tracked_blocks: Vec<(usize, usize, usize, Mask)>,
    coords: Vec<(usize, usize, float)>,
    nrows: usize,
    ncols: usize,
}

impl Builder {
    pub fn with_capacity(nrows: usize, ncols: usize, nnz: usize) -> Builder {
        Builder {
            tracked_blocks: Vec::new(),
            coords: Vec::with_capacity(nnz),
            nrows,
            ncols,
        }
    }

    pub fn build_csc(&mut self) -> CscMatrix {
        // Sort and sum any duplicates in the same cell
        let mut coords = mem::take(&mut self.coords);
        coords.sort_unstable_by_key(|&(r, c, _)| (c, r));
        self.coords = coords
            .into_iter()
            .coalesce(|l, r| {
                if l.0 == r.0 && l.1 == r.1 {
                    Ok((l.0, l.1, l.2 + r.2))
                } else {
                    Err((l, r))
                }
            })
            .collect();

        let mut indptr = vec![0; self.ncols + 1];
        let mut indices = vec![0; self.coords.len()];
        let mut data = vec![0.0; self.coords.len()];

        // Fill in CSC column start and end pointer and row index
        let mut last_c = 0;
        for (i, &(r, c, val)) in self.coords.iter().enumerate() {
            while last_c < c {
                last_c += 1;
                indptr[last_c] = i;
            }
            indices[i] = r;
            data[i] = val;
        }
        // Set the remaining column index pointers to one past the end of the data array
        while last_c < self.ncols {
            last_c += 1;
            indptr[last_c] = self.coords.len();
        }

        // Map every tracked block entry to its index in the data array
        let mut tracked_blocks = self
            .tracked_blocks
            .iter()
            .map(|&(id, row, col, ref sparsity)| {
                let (nrows, ncols) = sparsity.shape();
                let mut block_indices = DMatrix::from_element(nrows, ncols, None);

                for c in 0..ncols {
                    let rows_start = indptr[col + c];
                    let rows_end = indptr[col + c + 1];
                    let row_indices = &indices[rows_start..rows_end];

                    for r in (0..nrows).filter(|&r| sparsity[(r, c)]) {
                        // row_indices are guaranteed to be in ascending order
                        let offset = row_indices
                            .binary_search(&(row + r))
                            .expect("tracked entry missing from matrix");
                        block_indices[(r, c)] = Some(rows_start + offset);
                    }
                }

                (id, block_indices)
            })
            .collect::<Vec<_>>();

        tracked_blocks.sort_by_key(|b| b.0);

        CscMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            indptr,
            indices,
            data,
            tracked_blocks,
        }
    }
}

impl AsRef<Builder> for Builder {
    fn as_ref(&self) -> &Builder {
        self
    }
}

pub fn eye(n: usize) -> Builder {
    let mut builder = Builder::with_capacity(n, n, n);
    for i in 0..n {
        builder.coords.push((i, i, 1.0));
    }
    builder
}

/// A constant block. Zero entries are not stored.
pub fn block(block: &DMatrix<float>) -> Builder {
    let (nrows, ncols) = block.shape();

    let coords = (0..nrows)
        .flat_map(move |r| (0..ncols).map(move |c| (r, c, block[(r, c)])))
        .filter(|&(_, _, val)| val != 0.0)
        .collect();

    Builder {
        tracked_blocks: Vec::new(),
        coords,
        nrows,
        ncols,
    }
}

/// A block with a structural sparsity given by `sparsity` whose values are set after the matrix
/// is built using `CscMatrix::set_block`.
pub fn block_mut(sparsity: &Mask) -> (Builder, BlockRef) {
    static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

    let (nrows, ncols) = sparsity.shape();

    let coords = (0..nrows)
        .flat_map(move |r| {
            (0..ncols)
                .filter(move |&c| sparsity[(r, c)])
                .map(move |c| (r, c, 0.0))
        })
        .collect();

    let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);

    (
        Builder {
            tracked_blocks: vec![(id, 0, 0, sparsity.clone())],
            coords,
            nrows,
            ncols,
        },
        BlockRef { id, nrows, ncols },
    )
}

pub fn vstack<B: AsRef<Builder>>(blocks: &[B]) -> Builder {
    let ncols = blocks.get(0).map(|b| b.as_ref().ncols).unwrap_or(0);
    let mut acc = preallocate_for_merge(blocks);
    acc.ncols = ncols;
    for block in blocks.iter().map(AsRef::as_ref) {
        assert_eq!(
            acc.ncols, block.ncols,
            "vstack requires matrices to have the same number of columns"
        );
        let row_shift = acc.nrows;
        block_merge(&mut acc, block, row_shift, 0);
        acc.nrows += block.nrows;
    }
    acc
}

fn preallocate_for_merge<B: AsRef<Builder>>(blocks: &[B]) -> Builder {
    let (nnz, nt) = blocks.iter().map(AsRef::as_ref).fold((0, 0), |(nnz, nt), b| {
        (nnz + b.coords.len(), nt + b.tracked_blocks.len())
    });
    let mut builder = Builder::with_capacity(0, 0, nnz);
    builder.tracked_blocks = Vec::with_capacity(nt);
    builder
}

fn block_merge(left: &mut Builder, right: &Builder, row_shift: usize, col_shift: usize) {
    let left_coords_len = left.coords.len();
    let left_tracked_blocks_len = left.tracked_blocks.len();

    left.coords.extend_from_slice(&right.coords);
    left.tracked_blocks.extend_from_slice(&right.tracked_blocks);

    for &mut (ref mut r, ref mut c, _) in &mut left.coords[left_coords_len..] {
        *r += row_shift;
        *c += col_shift;
    }

    for &mut (_, ref mut r, ref mut c, _) in &mut left.tracked_blocks[left_tracked_blocks_len..] {
        *r += row_shift;
        *c += col_shift;
    }
}

#[derive(Clone, Debug)]
pub struct CscMatrix {
    nrows: usize,
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<float>,
    tracked_blocks: Vec<(usize, DMatrix<Option<usize>>)>,
}

impl CscMatrix {
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    pub fn indptr(&self) -> &[usize] {
        &self.indptr
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn data(&self) -> &[float] {
        &self.data
    }

    /// Overwrites the stored entries of a tracked block. The sparsity pattern is unchanged.
    pub fn set_block(&mut self, block: &BlockRef, value: &DMatrix<float>) {
        assert_eq!(block.shape(), value.shape());

        let start_idx = self
            .tracked_blocks
            .binary_search_by(|&(id, _)| id.cmp(&block.id));
        let mut start_idx = start_idx.expect("Block not in this matrix");

        for i in (0..start_idx).rev() {
            if self.tracked_blocks[i].0 != block.id {
                break;
            }
            start_idx = i;
        }

        for i in start_idx..self.tracked_blocks.len() {
            let (id, ref indices) = self.tracked_blocks[i];
            if id != block.id {
                break;
            }
            for (index, &val) in indices.iter().zip(value.iter()) {
                if let Some(index) = *index {
                    self.data[index] = val;
                } else {
                    assert_eq!(
                        0.0, val,
                        "unexpected non-zero element in sparse tracked block"
                    );
                }
            }
        }
    }

    /// Zeroes stored entries smaller in magnitude than `tol`, returning how many were zeroed.
    ///
    /// Pruned entries stay in the sparsity pattern so the matrix can still be used to update a
    /// solver that requires a fixed structure.
    pub fn prune(&mut self, tol: float) -> usize {
        let mut pruned = 0;
        for val in self.data.iter_mut() {
            if *val != 0.0 && val.abs() < tol {
                *val = 0.0;
                pruned += 1;
            }
        }
        pruned
    }

    pub fn is_upper_triangular(&self) -> bool {
        (0..self.ncols).all(|c| {
            self.indices[self.indptr[c]..self.indptr[c + 1]]
                .iter()
                .all(|&r| r <= c)
        })
    }

    pub fn to_dense(&self) -> DMatrix<float> {
        let mut mat = DMatrix::zeros(self.nrows, self.ncols);

        for c in 0..self.ncols {
            for i in self.indptr[c]..self.indptr[c + 1] {
                let r = self.indices[i];
                mat[(r, c)] = self.data[i];
            }
        }

        mat
    }
}
