use config::ConfigError;
use prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error("qp setup failed: {0}")]
    Setup(String),

    #[error(transparent)]
    Solve(#[from] SolveFailure),
}

/// Malformed tick inputs, rejected before anything reaches the solver.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum InputError {
    #[error("{input} has length {got}, expected {expected}")]
    Length {
        input: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{input}[{index}] is not finite ({value})")]
    NotFinite {
        input: &'static str,
        index: usize,
        value: float,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    Solved,
    SolvedInaccurate,
    PrimalInfeasible,
    DualInfeasible,
    NonConvex,
    MaxIterations,
    TimeLimit,
    Other,
}

impl SolveStatus {
    pub fn is_success(self) -> bool {
        match self {
            SolveStatus::Solved | SolveStatus::SolvedInaccurate => true,
            _ => false,
        }
    }
}

/// A solve that produced no usable trajectory.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("qp solve failed with status {status:?} after {iterations} iterations")]
pub struct SolveFailure {
    pub status: SolveStatus,
    pub iterations: u32,
}

impl PlannerError {
    /// The solver status when this is a solve failure.
    pub fn solve_status(&self) -> Option<SolveStatus> {
        match *self {
            PlannerError::Solve(ref failure) => Some(failure.status),
            _ => None,
        }
    }
}
