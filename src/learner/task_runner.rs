//! Task submission seam for parallel candidate scoring.

use crate::errors::TrainError;

pub type Task<'a> = Box<dyn FnOnce() + Send + 'a>;

/// An externally supplied work pool. The learner hands it one task per
/// candidate being scored; tasks are pure with respect to the tree under
/// construction and communicate through their own captured sinks. A runner
/// that refuses a submission surfaces [`TrainError::Cancelled`], which the
/// learner treats as fatal.
pub trait TaskRunner: Sync {
    /// Runs every task and returns once all of them have completed.
    fn run_all<'a>(&self, tasks: Vec<Task<'a>>) -> Result<(), TrainError>;
}

/// Runs tasks inline on the caller's thread. The default, and the only
/// fully deterministic choice for `Top3Random` reproducibility notes.
#[derive(Debug, Default)]
pub struct SerialRunner;

impl TaskRunner for SerialRunner {
    fn run_all<'a>(&self, tasks: Vec<Task<'a>>) -> Result<(), TrainError> {
        for task in tasks {
            task();
        }
        Ok(())
    }
}

/// Fans tasks out over the global rayon pool.
#[derive(Debug, Default)]
pub struct RayonRunner;

impl TaskRunner for RayonRunner {
    fn run_all<'a>(&self, tasks: Vec<Task<'a>>) -> Result<(), TrainError> {
        rayon::scope(|scope| {
            for task in tasks {
                scope.spawn(move |_| task());
            }
        });
        Ok(())
    }
}
