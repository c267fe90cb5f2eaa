use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use ndarray::ShapeError;
use rand_distr::uniform::Error as UniformError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidInput(&'static str),
    LabelOutOfRange {
        label: usize,
        classes: usize,
    },
    NonFiniteLoss {
        batch: usize,
        loss: f32,
    },
    EmptyPass(&'static str),
    SyncAborted,
    InvalidIdx {
        path: String,
        reason: String,
    },
    Distribution(String),
    Shape(ShapeError),
    Io(io::Error),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch for {what}, got {got} and expected {expected}"
            ),
            MlErr::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            MlErr::LabelOutOfRange { label, classes } => {
                write!(f, "label {label} is out of range for {classes} classes")
            }
            MlErr::NonFiniteLoss { batch, loss } => {
                write!(f, "the loss became non finite ({loss}) at batch {batch}")
            }
            MlErr::EmptyPass(what) => write!(f, "the {what} pass did not see any batch"),
            MlErr::SyncAborted => write!(f, "gradient sync aborted, another replica failed"),
            MlErr::InvalidIdx { path, reason } => write!(f, "invalid idx file '{path}': {reason}"),
            MlErr::Distribution(msg) => write!(f, "invalid parameter distribution: {msg}"),
            MlErr::Shape(e) => write!(f, "shape error: {e}"),
            MlErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            MlErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<UniformError> for MlErr {
    fn from(value: UniformError) -> Self {
        Self::Distribution(value.to_string())
    }
}
