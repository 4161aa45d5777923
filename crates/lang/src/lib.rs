//! Compiler for the contract language: a statically typed, block
//! structured source form lowered to VM bytecode.
//!
//! Pipeline: lex → parse → type check + codegen.  Arrays are fixed size
//! and flattened into consecutive slots at compile time; dynamic indexing
//! does not exist at this layer.

pub mod ast;
pub mod codegen;
pub mod errors;
pub mod lexer;
pub mod parser;
pub mod types;

pub use codegen::{compile, compile_asset_script, compile_contract, compile_tx_script, CompiledUnit};
pub use errors::CompileError;
pub use types::Type;
