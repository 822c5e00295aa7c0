use thiserror::Error;
use voxscan_grid::GridError;
use voxscan_raster::ShapeError;

/// Failure classes a render job can end in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Allocation,
    Shape,
    Worker,
    BudgetExceeded,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Allocation => "allocation",
            ErrorKind::Shape => "shape",
            ErrorKind::Worker => "worker",
            ErrorKind::BudgetExceeded => "budget_exceeded",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("allocation error: {0}")]
    Allocation(String),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("worker error in {task}: {reason}")]
    Worker { task: String, reason: String },

    #[error("export of {cost} bytes exceeds budget: {reason}")]
    BudgetExceeded { cost: u64, reason: String },
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::Configuration(_) => ErrorKind::Configuration,
            RenderError::Allocation(_) => ErrorKind::Allocation,
            RenderError::Shape(_) => ErrorKind::Shape,
            RenderError::Worker { .. } => ErrorKind::Worker,
            RenderError::BudgetExceeded { .. } => ErrorKind::BudgetExceeded,
        }
    }

    pub(crate) fn worker(task: impl Into<String>, reason: impl Into<String>) -> Self {
        RenderError::Worker {
            task: task.into(),
            reason: reason.into(),
        }
    }
}

impl From<GridError> for RenderError {
    fn from(e: GridError) -> Self {
        match e {
            GridError::TooLarge { .. } => RenderError::Allocation(e.to_string()),
            _ => RenderError::Configuration(e.to_string()),
        }
    }
}
