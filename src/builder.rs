use crate::{compiler::Compiler, CompileResult, Program};

/// The longest pattern accepted by default. Legacy programs addressed their
/// nodes with 16-bit offsets, which bounds patterns to this size.
const DEFAULT_SIZE_LIMIT: usize = 0x7FFF;

/// A sink for diagnostic messages.
///
/// Compilation and substitution failures are always returned as values. A
/// reporter passed to [`Builder::build_with`] or
/// [`substitute_with`](crate::substitute_with) additionally receives a human
/// readable message for each one, which is how hosts that print their own
/// diagnostics hook in.
///
/// Any `FnMut(&str)` is a reporter:
///
/// ```
/// let mut seen = Vec::new();
/// let result = regexp::Builder::new()
///     .build_with("a)", &mut |msg: &str| seen.push(msg.to_string()));
/// assert!(result.is_err());
/// assert_eq!(seen, vec!["unmatched () at offset 1".to_string()]);
/// ```
pub trait Reporter {
    fn report(&mut self, message: &str);
}

impl<F: FnMut(&str)> Reporter for F {
    fn report(&mut self, message: &str) {
        self(message)
    }
}

/// Configures and compiles patterns.
#[derive(Clone, Debug)]
pub struct Builder {
    size_limit: usize,
}

impl Builder {
    pub fn new() -> Self {
        Self { size_limit: DEFAULT_SIZE_LIMIT }
    }

    /// Set the maximum pattern length in bytes. Longer patterns fail with
    /// [`CompileError::PatternTooLong`](crate::CompileError::PatternTooLong).
    pub fn size_limit(&mut self, bytes: usize) -> &mut Self {
        self.size_limit = bytes;
        self
    }

    /// Compile `pattern`.
    pub fn build(&self, pattern: &str) -> CompileResult<Program> {
        Compiler::new(pattern.as_bytes(), self.size_limit).compile().map_err(|err| {
            debug!("failed to compile {:?}: {}", pattern, err);
            err
        })
    }

    /// Compile `pattern`, sending the message of any error to `reporter`
    /// before returning it.
    pub fn build_with(&self, pattern: &str, reporter: &mut dyn Reporter) -> CompileResult<Program> {
        self.build(pattern).map_err(|err| {
            reporter.report(&err.to_string());
            err
        })
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
