//! Parsing options and configuration.

/// Options for parsing page XML.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Drop text nodes made only of whitespace (indentation between elements)
    pub strip_whitespace_text: bool,

    /// Error handling mode
    pub error_mode: ErrorMode,
}

impl ParseOptions {
    /// Create new parse options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep or drop whitespace-only text nodes.
    pub fn with_whitespace_text(mut self, keep: bool) -> Self {
        self.strip_whitespace_text = !keep;
        self
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Enable lenient mode (close unterminated elements at end of input).
    pub fn lenient(mut self) -> Self {
        self.error_mode = ErrorMode::Lenient;
        self
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strip_whitespace_text: true,
            error_mode: ErrorMode::Strict,
        }
    }
}

/// Error handling mode during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Fail on any structural error
    #[default]
    Strict,
    /// Recover from truncated documents where possible
    Lenient,
}
