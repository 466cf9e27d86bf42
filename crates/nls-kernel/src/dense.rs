//! Dense LU factorization with partial pivoting on top of
//! [`nalgebra::linalg::LU`].
//!
//! [`LuFactors`] keeps one factorization alive between trust-region steps
//! and reuses its storage. [`gesv`] is the entry point of the linear driver
//! and keeps the LAPACK `dgesv` shape: column-major storage
//! (`a[i + j * lda]`), 1-based pivots, status `0` on success, `-k` when
//! argument `k` is illegal and `k > 0` when `U(k, k)` is exactly zero.

use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVector, Dyn};

type DenseLu = LU<f64, Dyn, Dyn>;

/// 1-based position of the first exactly-zero diagonal entry of `U`, or 0.
fn first_zero_pivot(lu: &DenseLu) -> i32 {
    if lu.is_invertible() {
        return 0;
    }
    lu.u()
        .diagonal()
        .iter()
        .position(|d| *d == 0.0)
        .map_or(0, |k| (k + 1) as i32)
}

/// Reusable LU factors of a square matrix.
#[derive(Clone, Debug)]
pub struct LuFactors {
    lu: DenseLu,
    n: usize,
    info: i32,
}

impl LuFactors {
    /// Factors of the `n x n` zero matrix.
    pub fn new(n: usize) -> Self {
        let lu = LU::new(DMatrix::zeros(n, n));
        let info = first_zero_pivot(&lu);
        Self { lu, n, info }
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    /// Factor `a` as `P * L * U`, reusing the storage of the previous factors.
    ///
    /// Returns the first zero pivot (1-based), 0 when `a` is regular and -1
    /// when it is not square.
    pub fn factor(&mut self, a: &DMatrix<f64>) -> i32 {
        let previous = std::mem::replace(&mut self.lu, LU::new(DMatrix::zeros(0, 0)));
        let mut storage = previous.l_unpack();
        if storage.shape() == a.shape() {
            storage.copy_from(a);
        } else {
            storage = a.clone();
        }
        let square = a.is_square();
        self.n = a.nrows();
        self.lu = LU::new(storage);
        self.info = if square {
            first_zero_pivot(&self.lu)
        } else {
            -1
        };
        self.info
    }

    /// Status of the last [`factor`](Self::factor) call.
    pub fn info(&self) -> i32 {
        self.info
    }

    pub fn is_singular(&self) -> bool {
        self.info != 0
    }

    /// Overwrite `b` with the solution of `A * x = b`.
    ///
    /// Returns `false` and leaves `b` untouched when the factors are singular
    /// or `b` has the wrong length.
    pub fn solve_mut(&self, b: &mut DVector<f64>) -> bool {
        if self.info != 0 || b.len() != self.n {
            return false;
        }
        self.lu.solve_mut(b)
    }
}

/// Combined `L \ U` factors back into the caller's column-major block.
fn write_factors(lu: &DenseLu, n: usize, a: &mut [f64], lda: usize) {
    let l = lu.l();
    let u = lu.u();
    for j in 0..n {
        for i in 0..n {
            a[i + j * lda] = if i > j { l[(i, j)] } else { u[(i, j)] };
        }
    }
}

/// LAPACK-style row interchanges: row `i` was swapped with row `ipiv[i]`.
fn write_pivots(lu: &DenseLu, ipiv: &mut [usize]) {
    let n = ipiv.len();
    let mut order = DVector::<usize>::from_iterator(n, 0..n);
    lu.p().permute_rows(&mut order);
    // `order[i]` is the original row that ended at position `i`.
    let mut rows: Vec<usize> = (0..n).collect();
    for i in 0..n {
        let j = (i..n).find(|&j| rows[j] == order[i]).unwrap_or(i);
        rows.swap(i, j);
        ipiv[i] = j + 1;
    }
}

/// Solve `A * X = B` for a square `A`, overwriting `a` with its LU factors
/// and `b` with the solution.
///
/// When the matrix is singular the factors are still written but `b` is left
/// untouched.
pub fn gesv(
    n: usize,
    nrhs: usize,
    a: &mut [f64],
    lda: usize,
    ipiv: &mut [usize],
    b: &mut [f64],
    ldb: usize,
) -> i32 {
    let min_ld = n.max(1);
    if lda < min_ld {
        return -4;
    }
    if ldb < min_ld {
        return -7;
    }
    if n > 0 && a.len() < lda * (n - 1) + n {
        return -3;
    }
    if ipiv.len() < n {
        return -5;
    }
    if nrhs > 0 && b.len() < ldb * (nrhs - 1) + n {
        return -6;
    }
    if n == 0 || nrhs == 0 {
        return 0;
    }

    let lu = LU::new(DMatrix::from_fn(n, n, |i, j| a[i + j * lda]));
    write_factors(&lu, n, a, lda);
    write_pivots(&lu, &mut ipiv[..n]);
    let info = first_zero_pivot(&lu);
    if info != 0 {
        return info;
    }

    let mut column = DVector::zeros(n);
    for r in 0..nrhs {
        let rhs = &mut b[r * ldb..r * ldb + n];
        column.as_mut_slice().copy_from_slice(rhs);
        lu.solve_mut(&mut column);
        rhs.copy_from_slice(column.as_slice());
    }
    0
}
