mod sync;
mod trainer;
mod validator;

pub use sync::{GradSync, NoSync};
pub use trainer::{TrainStats, train_epoch};
pub use validator::{Validation, argmax, validate_epoch};
