use thiserror::Error;

/// Errors raised when building a tween
#[derive(Debug, Error, PartialEq)]
pub enum TweenError {
    /// The target has no property with this name
    #[error("tween target has no property `{0}`")]
    MissingProperty(String),

    /// The property value does not start with a number
    #[error("property `{property}` is not numeric: {value:?}")]
    NotNumeric { property: String, value: String },
}
