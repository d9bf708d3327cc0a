use tether_parser::SyntaxError;

/// Errors surfaced to the caller while compiling a tree or addressing the model.
///
/// Data-shape problems found while rendering (a missing filter or handler, a
/// non-list `each` source, a write through a destroyed view) are not errors:
/// they degrade gracefully and are only logged. A write the caller asks for
/// that would have to overwrite a list or a scalar to succeed is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("invalid property path `{0}`")]
    InvalidPath(String),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("`{path}` holds {found}, not a list")]
    NotAList { path: String, found: &'static str },

    #[error("cannot write `{path}` into {found}")]
    Unwritable { path: String, found: String },

    #[error("`each` on <{tag}> cannot be a bound root, bind its parent instead")]
    OrphanTemplate { tag: String },
}

pub type Result<T, E = BindError> = std::result::Result<T, E>;
