use crate::{
    ast::{Program, Resolved},
    token::Span,
    util::intern::Interner,
};

pub mod layout;
pub mod runtime;
pub mod wasm;


/// Emits a complete WebAssembly module for a resolved program. The module is
/// validated before being returned.
pub fn generate(
    program: &Program<Resolved>,
    ident_interner: &Interner<str>,
    options: &Options,
) -> Result<Vec<u8>, Error> {
    wasm::Generator::new(options, ident_interner).generate(program)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Initial size of the linear memory, in 64 KiB pages. Raised when the
    /// static data doesn't fit.
    pub initial_pages: u32,
    /// Memory never grows past this many pages. `None` means no limit besides
    /// the 4 GiB address space.
    pub maximum_pages: Option<u32>,
    /// Lowest address the heap may start at.
    pub heap_base: u32,
    /// Also export the runtime routines and the heap top global.
    pub export_runtime: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            initial_pages: 1,
            maximum_pages: Some(16),
            heap_base: 8192,
            export_runtime: false,
        }
    }
}

/// Conditions under which no module can be produced. None of them is caused
/// by user input that made it past the resolver without diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}: cannot generate code for a construct that failed to parse")]
    UnexpectedError(Span),
    #[error("{span}: cannot generate code for the undefined variable `{name}`")]
    UnresolvedAccess { name: String, span: Span },
    #[error("the module needs {required} memory pages, but at most {maximum} are allowed")]
    MemoryCeiling { required: u32, maximum: u32 },
    #[error("emitted an invalid module: {0}")]
    InvalidModule(String),
}
