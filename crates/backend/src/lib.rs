//! # solcov-backend
//!
//! Statement and branch coverage maps for EVM bytecode compiled by solc.
//!
//! The compiler's compressed source map is expanded and walked in lockstep with the deployed
//! opcodes, attributing every instruction to a source offset and function. Statement and branch
//! candidates extracted from the AST are assigned coverage indices as they are reached.

#[macro_use]
extern crate tracing;

pub mod analysis;
pub mod artifact;
pub mod config;
pub mod error;
mod utils;

pub use analysis::coverage::{
    BranchEntry, BranchMap, ContractSources, CoverageAnalysis, CoverageMaps, PcMap,
    ProgramCounter, StatementMap,
};
pub use artifact::compilation::{CompilerOutput, ContractCoverage, CoverageBuilder};
pub use config::CoverageConfig;
pub use error::{CoverageError, Diagnostic};
