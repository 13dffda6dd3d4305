use std::path::Path;

use strum_macros::Display;
use thiserror::Error;

/// Number of source lines shown in a rendered excerpt.
const EXCERPT_LINES: usize = 3;

/// A position within a Buildfile. Lines and columns are 1-based, `offset` is
/// the byte offset from the start of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub col: usize,
    pub offset: usize,
}

impl Location {
    /// Distinguished location for errors raised once the input is exhausted.
    pub const EOF: Location = Location {
        line: usize::MAX,
        col: usize::MAX,
        offset: usize::MAX,
    };

    pub fn new(line: usize, col: usize, offset: usize) -> Self {
        Self { line, col, offset }
    }

    pub fn is_eof(&self) -> bool {
        *self == Self::EOF
    }

    /// Byte offset of the first character of the line this location is on.
    pub fn line_start(&self) -> usize {
        self.offset - (self.col - 1)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_eof() {
            write!(f, "end of file")
        } else {
            write!(f, "{}:{}", self.line, self.col)
        }
    }
}

/// Broad classification of a [`BuildError`], named the way they are shown to
/// the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    #[strum(serialize = "UnknownError")]
    Unknown,
    #[strum(serialize = "IOError")]
    Io,
    #[strum(serialize = "SyntaxError")]
    Syntax,
    #[strum(serialize = "TypeError")]
    Type,
    #[strum(serialize = "ValueError")]
    Value,
    #[strum(serialize = "LogicError")]
    Logic,
    #[strum(serialize = "SystemError")]
    System,
}

/// The error type threaded through the whole pipeline. Carries a kind, a
/// message, an optional source location, and a stack of context frames pushed
/// as the error propagates out of each phase.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct BuildError {
    kind: ErrorKind,
    message: String,
    location: Option<Location>,
    context: Vec<String>,
}

impl BuildError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
            context: Vec::new(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, message)
    }

    pub fn logic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Logic, message)
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::System, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> Option<Location> {
        self.location
    }

    pub fn context_frames(&self) -> &[String] {
        &self.context
    }

    /// Push a frame describing the phase that was underway when the error
    /// surfaced. Frames accumulate innermost-first.
    #[must_use]
    pub fn during(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    /// Pin the error to `loc` unless a more precise location is already set.
    #[must_use]
    pub fn at(mut self, loc: Location) -> Self {
        self.location.get_or_insert(loc);
        self
    }

    /// Render the full user-facing report, including a source excerpt when a
    /// location is available.
    pub fn format(&self, src_file: &Path) -> String {
        let mut out = format!("Exception thrown: {}", self.kind);
        out.push_str(&format!("\nMessage: {}", self.message));

        if let Some(loc) = self.location {
            if loc.is_eof() {
                out.push_str(&format!("\nLocation: {}: end of file", src_file.display()));
            } else {
                out.push_str(&format!(
                    "\nLocation: {}:{}:{}\n",
                    src_file.display(),
                    loc.line,
                    loc.col
                ));
                out.push_str(&excerpt(loc, src_file));
            }
        }

        if !self.context.is_empty() {
            out.push_str("\nContext: Error occurred during:");
            for ctx in &self.context {
                out.push_str(&format!("\n- [{ctx}]"));
            }
        }

        out
    }
}

/// Render up to [`EXCERPT_LINES`] lines starting at the error's line, with a
/// line-number gutter and a caret under the offending column.
fn excerpt(loc: Location, src_file: &Path) -> String {
    let source = match std::fs::read_to_string(src_file) {
        Ok(source) => source,
        Err(err) => return format!("Failed to read code excerpt: {err}"),
    };

    let start = loc.line_start().min(source.len());
    let chunk = source.get(start..).unwrap_or("");

    let gutter = loc.line.to_string();
    let pad = " ".repeat(gutter.len());

    let mut lines = chunk.lines().take(EXCERPT_LINES);
    let mut out = String::new();
    if let Some(first) = lines.next() {
        out.push_str(&format!("{gutter} |{first}\n"));
        out.push_str(&format!("{pad} |{}^ error here", " ".repeat(loc.col - 1)));
        for line in lines {
            out.push_str(&format!("\n{pad} |{line}"));
        }
    }
    out
}

/// Mirrors the combinators on [`BuildError`] for `Result` chains.
pub trait ResultExt<T> {
    fn during(self, ctx: impl Into<String>) -> Result<T, BuildError>;
    fn at(self, loc: Location) -> Result<T, BuildError>;
}

impl<T> ResultExt<T> for Result<T, BuildError> {
    fn during(self, ctx: impl Into<String>) -> Result<T, BuildError> {
        self.map_err(|err| err.during(ctx))
    }

    fn at(self, loc: Location) -> Result<T, BuildError> {
        self.map_err(|err| err.at(loc))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn line_start() {
        let loc = Location::new(3, 5, 24);
        assert_eq!(loc.line_start(), 20);
    }

    #[test]
    fn at_keeps_existing_location() {
        let first = Location::new(1, 2, 1);
        let second = Location::new(9, 9, 90);
        let err = BuildError::syntax("oops").at(first).at(second);
        assert_eq!(err.location(), Some(first));
    }

    #[test]
    fn context_accumulates_innermost_first() {
        let err = BuildError::value("bad").during("Parsing term").during("Parsing");
        assert_eq!(err.context_frames(), ["Parsing term", "Parsing"]);
    }

    #[test]
    fn format_without_location() {
        let err = BuildError::logic("no can do").during("Evaluating");
        let report = err.format(Path::new("Buildfile"));
        assert_eq!(
            report,
            "Exception thrown: LogicError\n\
             Message: no can do\n\
             Context: Error occurred during:\n\
             - [Evaluating]"
        );
    }

    #[test]
    fn format_renders_excerpt() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "first line\nbad line here\nthird line\nfourth line").unwrap();

        // Points at the 'l' of "line" on line 2.
        let loc = Location::new(2, 5, 15);
        let err = BuildError::syntax("Unexpected token 'line'").at(loc);
        let report = err.format(file.path());

        let expected = format!(
            "Exception thrown: SyntaxError\n\
             Message: Unexpected token 'line'\n\
             Location: {}:2:5\n\
             2 |bad line here\n  \
               |    ^ error here\n  \
               |third line\n  \
               |fourth line",
            file.path().display()
        );
        assert_eq!(report, expected);
    }

    #[test]
    fn format_at_eof() {
        let err = BuildError::syntax("Unexpected end of input").at(Location::EOF);
        let report = err.format(Path::new("Buildfile"));
        assert!(report.contains("Location: Buildfile: end of file"));
    }

    #[test]
    fn kind_names() {
        assert_eq!(ErrorKind::Io.to_string(), "IOError");
        assert_eq!(ErrorKind::Syntax.to_string(), "SyntaxError");
        assert_eq!(ErrorKind::Unknown.to_string(), "UnknownError");
    }
}
