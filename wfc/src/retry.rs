use crate::error::Failure;
use crate::solver::{Run, Seeds, Solver};
use log::debug;

pub trait Retry: private::Sealed {
    type Return;
    fn retry(&mut self, solver: &mut Solver, seed: u64, bias_seed: u64) -> Self::Return;
}

// Seed of the given attempt. Zero stays zero so the solver draws a fresh
// time-derived seed for every attempt.
fn attempt_seed(seed: u64, attempt: u64) -> u64 {
    if seed == 0 {
        0
    } else {
        seed.wrapping_add(attempt).max(1)
    }
}

fn attempt(solver: &mut Solver, seed: u64, bias_seed: u64, attempt: u64) -> Run {
    solver.reset(attempt_seed(seed, attempt), bias_seed);
    solver.run(seed, bias_seed, 0)
}

/// Retry after every contradiction until a run succeeds.
#[derive(Debug, Clone, Copy)]
pub struct Forever;

impl Retry for Forever {
    type Return = Result<Seeds, Failure>;
    fn retry(&mut self, solver: &mut Solver, seed: u64, bias_seed: u64) -> Self::Return {
        let mut num_attempts = 0;
        loop {
            match attempt(solver, seed, bias_seed, num_attempts) {
                Run::Succeeded => return Ok(solver.seeds()),
                Run::Failed(Failure::Contradiction) => {
                    debug!("attempt {} ended in a contradiction", num_attempts);
                    num_attempts += 1;
                }
                Run::Failed(failure) => return Err(failure),
                Run::Incomplete => unreachable!("runs without a step limit always finish"),
            }
        }
    }
}

/// Retry after a contradiction at most the given number of times.
#[derive(Debug, Clone, Copy)]
pub struct NumTimes(pub usize);

impl Retry for NumTimes {
    type Return = Result<Seeds, Failure>;
    fn retry(&mut self, solver: &mut Solver, seed: u64, bias_seed: u64) -> Self::Return {
        let mut num_attempts = 0;
        loop {
            match attempt(solver, seed, bias_seed, num_attempts) {
                Run::Succeeded => return Ok(solver.seeds()),
                Run::Failed(Failure::Contradiction) => {
                    if self.0 == 0 {
                        return Err(Failure::Contradiction);
                    } else {
                        self.0 -= 1;
                        num_attempts += 1;
                    }
                }
                Run::Failed(failure) => return Err(failure),
                Run::Incomplete => unreachable!("runs without a step limit always finish"),
            }
        }
    }
}

mod private {
    use super::*;

    pub trait Sealed {}

    impl Sealed for Forever {}
    impl Sealed for NumTimes {}
}
