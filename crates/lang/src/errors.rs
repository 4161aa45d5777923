use thiserror::Error;

/// Source position, 1-based.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub line: u32,
    pub col: u32,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("parse error at {1}: {0}")]
    Parse(String, Span),

    #[error("type error at {1}: {0}")]
    Type(String, Span),

    #[error("duplicate definition at {1}: {0}")]
    Duplicate(String, Span),

    #[error("out of range at {1}: {0}")]
    OutOfRange(String, Span),

    #[error("unsupported array operation at {1}: {0}")]
    UnsupportedArrayOp(String, Span),
}
