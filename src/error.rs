//! Application error type.
//!
//! Every failure in the pipeline is fatal. Errors carry the process exit code
//! so `main` can terminate with a status that tells the caller which stage
//! failed:
//!
//! | code | stage |
//! |------|-------|
//! | 2    | input data or run configuration |
//! | 3    | model fitting |
//! | 4    | model comparison |
//! | 5    | writing reports |

pub const EXIT_DATA: u8 = 2;
pub const EXIT_FIT: u8 = 3;
pub const EXIT_COMPARISON: u8 = 4;
pub const EXIT_IO: u8 = 5;

#[derive(Clone, PartialEq, Eq)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Missing/malformed input file or invalid run configuration.
    pub fn data(message: impl Into<String>) -> Self {
        Self::new(EXIT_DATA, message)
    }

    /// A model-fitting routine failed (sampler could not start, non-finite
    /// posterior, ...).
    pub fn fit(message: impl Into<String>) -> Self {
        Self::new(EXIT_FIT, message)
    }

    /// An information criterion could not be computed.
    pub fn comparison(message: impl Into<String>) -> Self {
        Self::new(EXIT_COMPARISON, message)
    }

    /// A report file could not be written.
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(EXIT_IO, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
