use std::fmt;

/// Machine-readable error codes for flow compilation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    MetadataInvalid,
    EmptyFlow,
    GrammarError,
    DuplicateEntity,
    UnboundEntity,
    NodeIdCollision,
    InvariantViolation,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::MetadataInvalid => "E1002",
            Self::EmptyFlow => "E1003",
            Self::GrammarError => "E2001",
            Self::DuplicateEntity => "E3001",
            Self::UnboundEntity => "E3002",
            Self::NodeIdCollision => "E3003",
            Self::InvariantViolation => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::MetadataInvalid => "Invalid metadata block",
            Self::EmptyFlow => "Document has no flow lines",
            Self::GrammarError => "Flow line does not match the grammar",
            Self::DuplicateEntity => "Entity declared twice",
            Self::UnboundEntity => "Entity used before it exists",
            Self::NodeIdCollision => "Two nodes share one id",
            Self::InvariantViolation => "Internal graph invariant violated",
        }
    }

    /// Optional remediation hint that can be surfaced to users.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in grc.toml and retry."),
            Self::MetadataInvalid => {
                Some("The block above the `----` separator must be YAML with a `name` key.")
            }
            Self::EmptyFlow => Some("Add at least one flow line below the `----` separator."),
            Self::GrammarError => {
                Some("Lines look like `a[10g], b | step[arg, arg] | step > out  # comment`.")
            }
            Self::DuplicateEntity => {
                Some("Declare each raw input once; later lines refer to it by name.")
            }
            Self::UnboundEntity => {
                Some("Declare the entity first, or produce it as an output of an earlier line.")
            }
            Self::NodeIdCollision => {
                Some("Give the step and its outputs distinct names, and list each output once.")
            }
            Self::InvariantViolation => Some("This is a bug; report it with the input document."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A line or term that does not match the flow grammar.
///
/// `column` is 1-based and counts characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason} at column {column} in `{text}`")]
pub struct GrammarError {
    pub text: String,
    pub column: usize,
    pub reason: String,
}

impl GrammarError {
    pub(crate) fn new(text: &str, byte_offset: usize, reason: impl Into<String>) -> Self {
        let column = text
            .get(..byte_offset)
            .map_or(1, |prefix| prefix.chars().count() + 1);
        Self {
            text: text.to_string(),
            column,
            reason: reason.into(),
        }
    }

    /// Shift the reported column so it is relative to an enclosing line.
    #[must_use]
    pub(crate) fn within(mut self, line: &str, byte_offset: usize) -> Self {
        let prefix = line
            .get(..byte_offset)
            .map_or(0, |prefix| prefix.chars().count());
        self.column += prefix;
        self.text = line.to_string();
        self
    }
}

/// Errors raised while building or simplifying a flow graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("line {line}: {source}")]
    Grammar {
        line: usize,
        #[source]
        source: GrammarError,
    },

    #[error("line {line}: entity `{name}` is already declared (bound: {})", .bound.join(", "))]
    DuplicateEntity {
        line: usize,
        name: String,
        bound: Vec<String>,
    },

    #[error("line {line}: input `{name}` is not an ingredient or earlier output (bound: {})", .bound.join(", "))]
    UnboundEntity {
        line: usize,
        name: String,
        bound: Vec<String>,
    },

    #[error("line {line}: node id `{id}` is produced twice")]
    NodeIdCollision { line: usize, id: String },

    #[error("invalid metadata: {0}")]
    Metadata(String),

    #[error("document has no flow lines")]
    EmptyFlow,

    #[error("invariant violated at node `{node}`: {reason}")]
    InvariantViolation { node: String, reason: String },
}

impl FlowError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Grammar { .. } => ErrorCode::GrammarError,
            Self::DuplicateEntity { .. } => ErrorCode::DuplicateEntity,
            Self::UnboundEntity { .. } => ErrorCode::UnboundEntity,
            Self::NodeIdCollision { .. } => ErrorCode::NodeIdCollision,
            Self::Metadata(_) => ErrorCode::MetadataInvalid,
            Self::EmptyFlow => ErrorCode::EmptyFlow,
            Self::InvariantViolation { .. } => ErrorCode::InvariantViolation,
        }
    }

    /// Optional remediation hint for users.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Flow line (1-based) the error was raised on, if it concerns one line.
    #[must_use]
    pub const fn line(&self) -> Option<usize> {
        match self {
            Self::Grammar { line, .. }
            | Self::DuplicateEntity { line, .. }
            | Self::UnboundEntity { line, .. }
            | Self::NodeIdCollision { line, .. } => Some(*line),
            Self::Metadata(_) | Self::EmptyFlow | Self::InvariantViolation { .. } => None,
        }
    }

    /// `true` for errors caused by the input document rather than a defect.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        !matches!(self, Self::InvariantViolation { .. })
    }
}

pub type Result<T, E = FlowError> = std::result::Result<T, E>;
