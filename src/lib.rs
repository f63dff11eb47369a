/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// Buffers the lexer's tokens so that the parser can look ahead and
/// backtrack.
pub mod token_stream;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The resolver binds every name in an AST to a local slot or an upvalue,
/// and records what each function literal captures.
pub mod resolver;

/// Code generation takes a resolved AST, mapping it into a WebAssembly
/// module.
pub mod codegen;

pub mod ast;
pub mod diagnostic;
pub mod pipeline;
pub mod token;

pub mod util {
    pub mod fmt;
    pub mod intern;
    #[cfg(test)]
    pub(crate) mod test_utils;
}
