use log::debug;

use crate::{
    ast::{Program, Resolved},
    codegen::{self, Options},
    diagnostic::Diagnostic,
    parser, resolver,
    util::{fmt::tree, intern::Interner},
};

/// The result of running every stage before code generation.
pub struct Analysis {
    pub program: Program<Resolved>,
    pub ident_interner: Interner<str>,
    /// Lexer, parser and resolver diagnostics, in report order.
    pub diagnostics: Vec<Diagnostic>,
}

impl Analysis {
    /// Prints the resolved tree.
    pub fn tree(&self) -> String {
        tree::print_program_string(&self.ident_interner, &self.program)
    }
}

/// Parses and resolves `src`. Never stops early: errors are collected into
/// [`Analysis::diagnostics`].
pub fn analyze(src: &str) -> Analysis {
    let mut ident_interner = Interner::with_capacity(128);
    let mut diagnostics = Vec::new();

    let program = parser::parse_program(src, &mut ident_interner, &mut diagnostics);
    debug!(
        "parsed {} top-level statements ({} diagnostics)",
        program.body.len(),
        diagnostics.len()
    );

    let program = resolver::resolve(program, &ident_interner, &mut diagnostics);
    debug!("resolved program ({} diagnostics)", diagnostics.len());

    Analysis {
        program,
        ident_interner,
        diagnostics,
    }
}

/// Compiles `src` into a WebAssembly module.
pub fn compile(src: &str, options: &Options) -> Result<Vec<u8>, Error> {
    let analysis = analyze(src);
    if !analysis.diagnostics.is_empty() {
        return Err(Error::Diagnostics(analysis.diagnostics));
    }
    let bytes = codegen::generate(&analysis.program, &analysis.ident_interner, options)?;
    debug!("emitted module of {} bytes", bytes.len());
    Ok(bytes)
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("compilation failed with {} diagnostic(s)", .0.len())]
    Diagnostics(Vec<Diagnostic>),
    #[error(transparent)]
    Codegen(#[from] codegen::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_diagnostics_from_every_stage_are_collected() {
        let src = "mut x = 1 2; y";
        let Err(Error::Diagnostics(diagnostics)) = compile(src, &Options::default()) else {
            panic!("expected diagnostics");
        };
        let messages: Vec<_> = diagnostics.iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            [
                "10..11: expected `;`, but got number",
                "13..14: usage of an undefined variable `y`",
            ]
        );
    }

    #[test]
    fn test_compile_emits_wasm_magic() {
        let bytes = compile("1 + 2", &Options::default()).unwrap();
        assert_eq!(&bytes[..4], b"\0asm");
    }

    #[test]
    fn test_nul_char_is_reported() {
        let analysis = analyze("1\0 2");
        assert!(!analysis.diagnostics.is_empty());
        assert_eq!(analysis.diagnostics[0].span.to_string(), "1..2");
    }

    #[test]
    fn test_analysis_tree() {
        let analysis = analyze("mut x = 1; x");
        assert_eq!(analysis.diagnostics, []);
        assert_eq!(
            analysis.tree(),
            "mut x (0..9 %: local 0)\n  number 1 (8..9)\nident x (11..12 %: local 0)\n"
        );
    }
}
