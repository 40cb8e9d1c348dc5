//! The tree-growth engine: contexts, configuration, candidate scoring and
//! the task-runner seam.

pub mod config;
pub mod context;
mod holder;
mod scoring;
pub mod task_runner;

pub use config::{FeatureSelectionStrategy, TrainConfig, TrainConfigBuilder};
pub use context::{BagHolder, Context, LearnContext};
pub use task_runner::{RayonRunner, SerialRunner, Task, TaskRunner};
