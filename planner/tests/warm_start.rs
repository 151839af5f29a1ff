extern crate config;
extern crate planner;

use std::collections::VecDeque;
use std::time::Duration;

use config::PlannerConfig;
use planner::{
    ForwardDiff, Planner, PlannerError, QpBackend, QpCoefficients, QpSolution, QpStructure,
    SolveFailure, SolveStats, SolveStatus, TickInputs,
};

/// Returns a scripted sequence of results and records the warm starts it was given.
#[derive(Default)]
struct ScriptedBackend {
    script: VecDeque<Result<Vec<f64>, SolveStatus>>,
    warm_starts: Vec<Vec<f64>>,
    n_vars: usize,
    updates: usize,
}

impl QpBackend for ScriptedBackend {
    fn setup(
        &mut self,
        structure: &QpStructure,
        coefficients: &QpCoefficients,
    ) -> Result<(), PlannerError> {
        assert_eq!(coefficients.f.len(), structure.n_vars);
        self.n_vars = structure.n_vars;
        Ok(())
    }

    fn update(&mut self, coefficients: &QpCoefficients) {
        assert_eq!(coefficients.H.len(), self.n_vars);
        self.updates += 1;
    }

    fn solve(&mut self, warm_start: &[f64]) -> Result<QpSolution, SolveFailure> {
        self.warm_starts.push(warm_start.to_vec());
        match self.script.pop_front().expect("script exhausted") {
            Ok(x) => Ok(QpSolution {
                x,
                stats: SolveStats {
                    status: SolveStatus::Solved,
                    objective: 0.0,
                    iterations: 1,
                    solve_time: Duration::from_millis(1),
                },
            }),
            Err(status) => Err(SolveFailure {
                status,
                iterations: 10,
            }),
        }
    }
}

fn small_config() -> PlannerConfig {
    let mut config = PlannerConfig::default();
    config.horizon.nodes = 3;
    config.risk.spline_resolution = 1;
    config
}

fn inputs() -> TickInputs<'static> {
    TickInputs {
        initial_condition: &[0.0; 9],
        obstacle: &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        risk: &[0.0, 0.5],
    }
}

#[test]
fn failed_tick_keeps_previous_warm_start() {
    let first: Vec<f64> = (0..27).map(|i| i as f64 * 0.01).collect();
    let second: Vec<f64> = (0..27).map(|i| -(i as f64) * 0.01).collect();

    let mut backend = ScriptedBackend::default();
    backend.script.push_back(Ok(first.clone()));
    backend.script.push_back(Err(SolveStatus::PrimalInfeasible));
    backend.script.push_back(Ok(second.clone()));

    let mut planner = Planner::with_backend(small_config(), backend, ForwardDiff).unwrap();
    assert_eq!(planner.warm_start(), &[0.0; 27][..]);

    planner.tick(&inputs()).unwrap();
    assert_eq!(planner.warm_start(), &first[..]);
    let published = planner.trajectory().clone();

    let err = planner.tick(&inputs()).err().expect("scripted failure");
    assert_eq!(err.solve_status(), Some(SolveStatus::PrimalInfeasible));
    assert_eq!(planner.warm_start(), &first[..]);
    assert_eq!(planner.trajectory(), &published);

    planner.tick(&inputs()).unwrap();
    assert_eq!(planner.warm_start(), &second[..]);
}

#[test]
fn solver_receives_previous_solution() {
    let first: Vec<f64> = (0..27).map(|i| i as f64).collect();

    let mut backend = ScriptedBackend::default();
    backend.script.push_back(Ok(first.clone()));
    backend.script.push_back(Err(SolveStatus::MaxIterations));
    backend.script.push_back(Ok(vec![0.0; 27]));

    let mut planner = Planner::with_backend(small_config(), backend, ForwardDiff).unwrap();
    for _ in 0..3 {
        let _ = planner.tick(&inputs());
    }

    let backend = planner.backend();
    assert_eq!(backend.updates, 3);
    assert_eq!(
        backend.warm_starts,
        vec![vec![0.0; 27], first.clone(), first.clone()]
    );
    assert_eq!(planner.warm_start(), &[0.0; 27][..]);
}

#[test]
fn invalid_inputs_never_reach_the_backend() {
    let backend = ScriptedBackend::default();
    let mut planner = Planner::with_backend(small_config(), backend, ForwardDiff).unwrap();

    let bad = TickInputs {
        initial_condition: &[0.0; 9],
        obstacle: &[0.0; 6],
        risk: &[0.0, 0.5, 1.0],
    };
    assert!(matches!(
        planner.tick(&bad),
        Err(PlannerError::InvalidInput(_))
    ));
    assert_eq!(planner.backend().updates, 0);
    assert!(planner.backend().warm_starts.is_empty());
}
