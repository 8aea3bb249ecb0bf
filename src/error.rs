use thiserror::Error;

/// Result alias for `mlviz`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced at the control layer.
///
/// Step functions never fail; out-of-range values are clamped before they
/// reach them. These variants cover lookups that can't be clamped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("unknown lesson `{0}`")]
    UnknownLesson(String),

    #[error("lesson `{lesson}` has no parameter `{key}`")]
    UnknownParam { lesson: &'static str, key: String },

    #[error("parameter `{key}` must be a finite number")]
    NonFinite { key: String },

    #[error("chapter {0} does not exist")]
    UnknownChapter(usize),

    #[error("malformed parameter assignment `{0}` (expected key=value)")]
    MalformedAssignment(String),
}
