use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Unknown type: {0}")]
    UnknownType(String),
    #[error("Unknown field '{field}' for type {type_name}")]
    UnknownField { type_name: String, field: String },
    #[error("Unknown reference: @{0}")]
    UnknownReference(String),
    #[error("Parameter conflict: '{0}' already exists in the parameter pool")]
    ParameterConflict(String),
    #[error("Unsafe query: literal '{literal}' at column {col}; pass values through named parameters")]
    UnsafeQuery { literal: String, col: usize },
    #[error("Invalid sort field '{field}' for type {type_name}")]
    InvalidSort { type_name: String, field: String },
    #[error("Duplicate name {0} in requests")]
    DuplicateName(String),
    #[error("Forbidden: {0}")]
    ForbiddenAccess(String),
    #[error("Unknown request user {0}")]
    UnknownRequester(i64),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<usize>, col: Option<usize> },
    #[error("{type_name} with id {id} not found")]
    NotFound { type_name: String, id: i64 },
    #[error("Search cancelled before request '{0}'")]
    Cancelled(String),
    #[error("Request '{request}' failed: {source}")]
    InRequest {
        request: String,
        #[source]
        source: Box<SearchError>,
    },
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;

impl SearchError {
    /// Wraps an error with the name of the request that raised it.
    pub fn in_request(request: &str, source: SearchError) -> Self {
        match source {
            already @ (Self::InRequest { .. } | Self::Cancelled(_)) => already,
            other => Self::InRequest { request: request.to_string(), source: Box::new(other) },
        }
    }
    /// The underlying error, with any request wrapping removed.
    pub fn root(&self) -> &SearchError {
        match self {
            Self::InRequest { source, .. } => source.root(),
            other => other,
        }
    }
    pub fn request_name(&self) -> Option<&str> {
        match self {
            Self::InRequest { request, .. } => Some(request),
            _ => None,
        }
    }
    /// Caller errors are caused by the batch or identity handed in; the rest
    /// are infrastructure failures the caller may retry.
    pub fn is_caller_error(&self) -> bool {
        !matches!(
            self.root(),
            Self::Config(_) | Self::Persistence(_) | Self::Lock(_) | Self::Cancelled(_)
        )
    }
}

// Helper conversions
impl From<rusqlite::Error> for SearchError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl From<config::ConfigError> for SearchError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl From<serde_json::Error> for SearchError {
    fn from(e: serde_json::Error) -> Self { Self::InvalidQuery(e.to_string()) }
}
