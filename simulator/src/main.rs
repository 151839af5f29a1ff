extern crate env_logger;
#[macro_use]
extern crate log;
extern crate planner;
extern crate prelude;
extern crate serde;
extern crate stats;

#[cfg(test)]
extern crate approx;

mod config;
mod flame_merge;
mod setpoint;
mod simulation_model;

use std::env;
use std::error::Error;
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use ::config::PlannerConfig;
use planner::{Planner, TickInputs};
use prelude::*;

use self::config::SimulatorConfig;
use self::flame_merge::FlameLog;
use self::simulation_model::{Adversary, PointMass};

/// Ticks between folding recorded flame spans into the merged log.
const FLAME_CHECKPOINT_STEPS: usize = 100;

fn main() {
    env_logger::init();

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| config::CONFIG_FILE.to_owned());

    let mut flame_log = FlameLog::default();
    let result = run(&config_path, &mut flame_log);

    if let Err(e) = flame_log.write() {
        error!("unable to write flame graph: {}", e);
    }

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(config_path: &str, flame_log: &mut FlameLog) -> Result<(), Box<dyn Error>> {
    let sim_config = SimulatorConfig::load(config_path)?;
    let planner_config = PlannerConfig::load(&sim_config.planner_config)?;

    let period = planner_config.period();
    let n_steps = (sim_config.duration / period) as usize;
    let period_duration = Duration::from_secs_f64(period);
    let control_limit = planner_config.bounds.control;
    let model = planner_config.model.clone();

    let mut planner = Planner::new(planner_config)?;
    let grid = planner.grid().clone();
    let mut agent = PointMass::new(
        &model,
        sim_config.integration_steps,
        sim_config.agent.position,
        sim_config.agent.velocity,
    );
    let mut adversary = Adversary::new(
        sim_config.adversary.position,
        sim_config.adversary.velocity,
    );

    let mut stats = stats::OnlineStats::new();
    let mut min_separation = INFINITY;

    for i in 0..n_steps {
        let step_start = Instant::now();

        let initial_condition = agent.measurement();
        let obstacle = adversary.measurement();
        let inputs = TickInputs {
            initial_condition: &initial_condition,
            obstacle: &obstacle,
            risk: &sim_config.risk,
        };

        let planner_start = Instant::now();
        let solution = planner.tick(&inputs)?;
        let planner_millis = planner_start.elapsed().as_secs_f64() * 1e3;
        stats.add(planner_millis);

        let control = setpoint::control_at(
            solution.trajectory,
            &grid,
            &model,
            control_limit,
            period,
        );

        let p = agent.position();
        let o = adversary.position();
        let separation = (p[0] - o[0]).hypot(p[1] - o[1]);
        min_separation = min(min_separation, separation);

        info!(
            "t {:.2}s planner {:.2}ms iterations {} position {:?} control {:?} separation {:.3}",
            i as float * period,
            planner_millis,
            solution.stats.iterations,
            p,
            control,
            separation
        );
        debug!("risk slack {:?}", solution.diagnostics.slack);

        agent.step(period, control);
        adversary.step(period);

        if (i + 1) % FLAME_CHECKPOINT_STEPS == 0 {
            flame_log.checkpoint();
        }

        let step_elapsed = step_start.elapsed();
        match period_duration.checked_sub(step_elapsed) {
            Some(remaining) => {
                if sim_config.real_time {
                    thread::sleep(remaining);
                }
            }
            None => warn!(
                "step missed deadline. took {:.1}ms.",
                step_elapsed.as_secs_f64() * 1e3
            ),
        }
    }

    println!("Planner stats (mean/ms, stdev/ms): {:?}", stats);
    println!("Minimum separation: {:.3}", min_separation);
    Ok(())
}
