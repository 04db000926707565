pub mod ast;
pub mod compilation;
