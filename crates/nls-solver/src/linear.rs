//! Single-attempt driver for dense linear systems `A x = b`.

use crate::context::SimulationInfo;
use crate::error::{SolverError, SolverResult};
use crate::model::LinearModel;
use nalgebra::{DMatrix, DVector};
use nls_core::SysId;
use nls_kernel::gesv;
use serde::Serialize;
use tracing::{debug, debug_span, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearFailure {
    /// LAPACK-style argument error (`argument` is the 1-based position).
    IllegalArgument { argument: i32 },
    /// `U(pivot, pivot)` is exactly zero (1-based).
    Singular { pivot: usize },
}

#[derive(Clone, Debug, Serialize)]
pub struct LinearReport {
    pub system: SysId,
    pub name: String,
    pub time: f64,
    pub success: bool,
    pub failure: Option<LinearFailure>,
}

impl LinearReport {
    pub fn into_result(self) -> SolverResult<()> {
        match self.failure {
            None => Ok(()),
            Some(LinearFailure::IllegalArgument { argument }) => {
                Err(SolverError::IllegalArgument {
                    system: self.name,
                    argument,
                })
            }
            Some(LinearFailure::Singular { pivot }) => Err(SolverError::Singular {
                system: self.name,
                pivot,
            }),
        }
    }
}

/// Dense linear system whose matrix and right-hand side are rebuilt by its
/// model on every solve.
pub struct LinearSystem {
    id: SysId,
    name: String,
    model: Box<dyn LinearModel>,
    a: DMatrix<f64>,
    b: DVector<f64>,
    x: DVector<f64>,
    ipiv: Vec<usize>,
}

impl LinearSystem {
    pub fn new(
        id: SysId,
        name: impl Into<String>,
        n: usize,
        model: Box<dyn LinearModel>,
    ) -> SolverResult<Self> {
        if n == 0 {
            return Err(SolverError::Setup {
                what: "linear system must have at least one unknown".to_string(),
            });
        }
        Ok(Self {
            id,
            name: name.into(),
            model,
            a: DMatrix::zeros(n, n),
            b: DVector::zeros(n),
            x: DVector::zeros(n),
            ipiv: vec![0; n],
        })
    }

    pub fn id(&self) -> SysId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Latest solution, best effort after a failed solve.
    pub fn x(&self) -> &[f64] {
        self.x.as_slice()
    }

    /// LU factors left by the last solve.
    pub fn factors(&self) -> &DMatrix<f64> {
        &self.a
    }
}

/// Rebuild and solve `system` once.
///
/// Whatever the factorization leaves in the right-hand side is copied into
/// `x`, also on failure.
pub fn solve_linear(system: &mut LinearSystem, sim: &SimulationInfo) -> LinearReport {
    let span = debug_span!("linear_solve", system = %system.name, time = sim.time);
    let _enter = span.enter();
    let n = system.len();

    system.a.fill(0.0);
    system.model.set_matrix(&mut system.a);
    system.model.set_rhs(&mut system.b);

    if tracing::enabled!(tracing::Level::TRACE) {
        for (i, row) in system.a.row_iter().enumerate() {
            let values: Vec<f64> = row.iter().copied().collect();
            trace!(row = i, values = ?values, "A matrix");
        }
        trace!(b = ?system.b.as_slice(), "b vector");
    }

    let info = gesv(
        n,
        1,
        system.a.as_mut_slice(),
        n,
        &mut system.ipiv,
        system.b.as_mut_slice(),
        n,
    );

    let failure = if info < 0 {
        warn!(
            system = %system.name,
            time = sim.time,
            argument = -info,
            "error solving linear system: illegal argument"
        );
        Some(LinearFailure::IllegalArgument { argument: -info })
    } else if info > 0 {
        let pivot = info as usize;
        warn!(
            system = %system.name,
            time = sim.time,
            pivot,
            "failed to solve linear system: matrix is singular"
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            for (i, row) in system.a.row_iter().enumerate() {
                let values: Vec<f64> = row.iter().copied().collect();
                debug!(row = i, values = ?values, "matrix U");
            }
            debug!(x = ?system.b.as_slice(), "solution x");
        }
        Some(LinearFailure::Singular { pivot })
    } else {
        None
    };

    system.x.copy_from(&system.b);

    LinearReport {
        system: system.id,
        name: system.name.clone(),
        time: sim.time,
        success: failure.is_none(),
        failure,
    }
}
