mod expression;
mod paths;
mod request;
mod validator;

pub use expression::{ExpressionError, FilterExpression};
pub use paths::TestTarget;
pub use request::{
    CaptureDisplay, ExecutionRequest, FilePattern, StopPolicy, Verbosity,
};
pub use validator::{known_fields, validate_request};
