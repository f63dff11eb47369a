use std::fmt::{self, Write};

use crate::token::Span;

/// A user-facing error message attached to a region of the source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, span: Span) -> Diagnostic {
        Diagnostic {
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.span, self.message)
    }
}

/// The side channel through which the parser and the resolver surface
/// errors. Reporting never interrupts the caller.
pub trait Reporter {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl Reporter for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        log::trace!("reported {diagnostic}");
        self.push(diagnostic);
    }
}

/// Renders a diagnostic as a caret-annotated excerpt of `src`.
pub fn render(path: &str, src: &str, diagnostic: &Diagnostic) -> String {
    let Span { from, to, .. } = diagnostic.span;
    let width = to.line.to_string().len();
    let pad = "";

    let mut out = String::with_capacity(256);
    // Writing into a `String` never fails.
    _ = writeln!(out, "error: {}", diagnostic.message);
    _ = writeln!(out, "{pad:width$}--> {path} [{}]", diagnostic.span.range());
    _ = writeln!(out, "{pad:width$} |");

    let first = from.line as usize;
    let last = to.line.max(from.line) as usize;
    // `lines` drops the empty line after a trailing newline, where errors at
    // the end of input point.
    let lines = src.lines().chain(std::iter::once(""));
    for (line_no, line) in lines.enumerate().skip(first - 1).take(last - first + 1) {
        let line_no = line_no + 1;
        let start = if line_no == first { from.col as usize } else { 1 };
        let end = if line_no == last {
            to.col as usize
        } else {
            line.chars().count() + 1
        };
        let carets = end.saturating_sub(start).max(1);

        _ = writeln!(out, "{line_no:>width$} | {line}");
        _ = writeln!(
            out,
            "{pad:width$} | {pad:lead$}{:^<carets$}",
            "",
            lead = start - 1,
        );
    }
    out
}
