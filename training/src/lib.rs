mod diagnostics;
mod error;
mod evaluation;
mod hyper_parameter;
mod hyper_surfer;
mod schedule;
mod series;
mod training;
mod training_history;

pub use diagnostics::{Channel, Diagnostics, LogDiagnostics, MemoryDiagnostics, NullDiagnostics};
pub use error::{Result, TrainingError};
pub use evaluation::{Evaluator, total_accuracy, total_cost};
pub use hyper_parameter::{
    HyperParameter, HyperParameterBuilder, HyperParameterBuilderError, LearningScheduleType,
};
pub use hyper_surfer::{HyperSurfer, SurfParameter, SurfSettings};
pub use schedule::{LearningSchedule, ScheduleStep};
pub use series::{strictly_monotone_decrease, sum_delta};
pub use training::{Termination, Trainer};
pub use training_history::TrainingHistory;

pub mod prelude {
    pub use crate::HyperParameterBuilder;
    pub use crate::HyperSurfer;
    pub use crate::LearningScheduleType;
    pub use crate::Trainer;
    pub use crate::TrainingHistory;
}
