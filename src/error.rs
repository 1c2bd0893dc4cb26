use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("parameter `{0}` is already registered")]
    DuplicateParameter(String),

    #[error("no gradient was computed for parameter `{0}`")]
    MissingGradient(String),

    #[error("shape mismatch for `{name}`: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("incompatible shapes for {op}: {lhs:?} and {rhs:?}")]
    IncompatibleShapes {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },

    #[error("expected {expected} input tensors, got {got}")]
    InputCount { expected: usize, got: usize },

    #[error("cost must be a single value, got shape {0:?}")]
    NonScalarCost(Vec<usize>),

    #[error("unknown optimizer `{0}`")]
    UnknownAlgorithm(String),

    #[error("invalid optimizer config: {0}")]
    Config(#[from] serde_json::Error),
}
