//! Error kinds of the coverage engine.
//!
//! Fatal problems abort the coverage build for one contract and are reported as
//! [`CoverageError`] wrapped in an [`eyre::Report`]. Partial attribution is not an error: the
//! build succeeds and the affected sites are listed as [`Diagnostic`]s next to the maps.

use rustc_hash::FxHashSet;
use serde::Serialize;
use thiserror::Error;

use crate::artifact::ast::Offset;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CoverageError {
    /// The compressed source map cannot be expanded, or does not line up with the opcodes.
    #[error("malformed source map: {0}")]
    MalformedSourceMap(String),

    /// A push operand could not be decoded.
    #[error("invalid operand `{operand}` for {op} at pc {pc}")]
    InvalidOperand { op: String, operand: String, pc: usize },

    /// The AST does not have the expected shape.
    #[error("invalid AST: {0}")]
    InvalidAst(String),

    /// The compiler output does not contain the requested contract.
    #[error("unknown contract `{0}`")]
    UnknownContract(String),
}

/// A non-fatal attribution gap.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Diagnostic {
    /// A statement or branch candidate was reached outside of any function definition.
    #[serde(rename_all = "camelCase")]
    AmbiguousAttribution { path: String, offset: Offset },

    /// A bare `revert()` call could not be matched to any jump into the shared revert target.
    #[serde(rename_all = "camelCase")]
    UnattributedRevert { path: String, function: String, offset: Offset },
}

/// Diagnostics in discovery order, each reported once.
#[derive(Clone, Debug, Default)]
pub(crate) struct Diagnostics {
    seen: FxHashSet<Diagnostic>,
    list: Vec<Diagnostic>,
}

impl Diagnostics {
    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        if self.seen.insert(diagnostic.clone()) {
            debug!(?diagnostic, "partial coverage attribution");
            self.list.push(diagnostic);
        }
    }

    pub(crate) fn into_vec(self) -> Vec<Diagnostic> {
        self.list
    }
}
