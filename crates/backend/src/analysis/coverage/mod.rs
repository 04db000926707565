//! Coverage map reconstruction for one contract.
//!
//! The walk happens in three passes over a private copy of the candidates:
//! 1. `correlator` attributes every instruction to a source path, offset and function, hands
//!    out statement indices and tracks which branch candidates are resolved by a JUMPI.
//! 2. `revert` attributes bare `revert()` calls to the jumps into the shared revert target.
//! 3. `branch` hands out branch indices and builds the branch map.

use std::collections::BTreeMap;

use eyre::Result;
use foundry_compilers::artifacts::SourceUnit;
use serde::Serialize;

use self::correlator::Correlator;
use super::{
    candidates::SourceCandidates,
    source_map::{parse_source_map, serialize_jump, Jump},
};
use crate::{
    artifact::ast::{source_index, Offset},
    config::CoverageConfig,
    error::Diagnostic,
    utils::opcode::Disassembler,
};

mod branch;
mod correlator;
mod revert;

/// Program counter to instruction metadata.
pub type PcMap = BTreeMap<usize, ProgramCounter>;

/// `path -> function -> coverage index -> statement offset`.
pub type StatementMap = BTreeMap<String, BTreeMap<String, BTreeMap<usize, Offset>>>;

/// `path -> function -> coverage index -> branch`.
pub type BranchMap = BTreeMap<String, BTreeMap<String, BTreeMap<usize, BranchEntry>>>;

/// Everything known about one instruction of the deployed bytecode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramCounter {
    #[serde(skip)]
    pub pc: usize,
    pub op: String,
    /// Push operand, as printed by the compiler.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<Offset>,
    #[serde(rename = "fn", skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_jump")]
    pub jump: Option<Jump>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<usize>,
    /// The REVERT shared by every function that reverts without a reason.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub first_revert: bool,
    /// A jump into the shared REVERT, attributed to a bare `revert()` call.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub jump_revert: bool,
}

/// One side of a conditional. Serialized as `(start, end, jump)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(into = "(usize, usize, bool)")]
pub struct BranchEntry {
    pub offset: Offset,
    /// The branch is taken when the JUMPI jumps, rather than when it falls through.
    pub jump: bool,
}

impl From<BranchEntry> for (usize, usize, bool) {
    fn from(entry: BranchEntry) -> Self {
        (entry.offset.start, entry.offset.end, entry.jump)
    }
}

/// The coverage maps of one contract.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageMaps {
    pub pc_map: PcMap,
    pub statements: StatementMap,
    pub branches: BranchMap,
    /// Sites that could not be attributed. The maps are still usable.
    pub diagnostics: Vec<Diagnostic>,
}

/// The source units a contract's bytecode may refer to, keyed by source index.
#[derive(Clone, Debug, Default)]
pub struct ContractSources<'a> {
    units: BTreeMap<usize, &'a SourceUnit>,
}

impl<'a> ContractSources<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: usize, unit: &'a SourceUnit) {
        self.units.insert(index, unit);
    }

    pub fn get(&self, index: usize) -> Option<&'a SourceUnit> {
        self.units.get(&index).copied()
    }

    pub fn by_path(&self, path: &str) -> Option<&'a SourceUnit> {
        self.units.values().find(|unit| unit.absolute_path == path).copied()
    }

    pub fn paths(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.units.values().map(|unit| unit.absolute_path.as_str())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl<'a> FromIterator<&'a SourceUnit> for ContractSources<'a> {
    fn from_iter<T: IntoIterator<Item = &'a SourceUnit>>(iter: T) -> Self {
        let mut sources = Self::new();
        for unit in iter {
            match source_index(unit) {
                Some(index) => sources.insert(index, unit),
                None => warn!(path = %unit.absolute_path, "source unit without a source index"),
            }
        }
        sources
    }
}

/// Coverage map reconstruction.
pub struct CoverageAnalysis {}

impl CoverageAnalysis {
    /// Correlates a contract's deployed bytecode with its sources.
    ///
    /// `source_map` and `opcodes` are the compiler's `deployedBytecode.sourceMap` and
    /// `deployedBytecode.opcodes`. The candidates are only read; every call works on its own
    /// copy.
    pub fn analyze(
        source_map: &str,
        opcodes: &str,
        sources: &ContractSources<'_>,
        candidates: &SourceCandidates,
        config: &CoverageConfig,
    ) -> Result<CoverageMaps> {
        if opcodes.trim().is_empty() {
            debug!("no deployed bytecode, skipping coverage");
            return Ok(CoverageMaps::default());
        }

        let elements = parse_source_map(source_map)?;
        // instructions past the last source map entry (the metadata hash) are never decoded
        let steps = Disassembler::new(opcodes)
            .take(elements.len())
            .collect::<Result<Vec<_>, _>>()?;

        let mut correlation = Correlator::new(sources, candidates).walk(&elements, &steps)?;
        if config.reconcile_reverts {
            revert::reconcile_reverts(&mut correlation, sources)?;
        }
        let branches = branch::finalize_branches(&mut correlation, sources);
        let indices = correlation.counter;

        let (pc_list, statements, diagnostics) = correlation.into_parts();
        debug!(
            instructions = pc_list.len(),
            indices,
            diagnostics = diagnostics.len(),
            "built coverage maps"
        );

        Ok(CoverageMaps {
            pc_map: pc_list.into_iter().map(|pc| (pc.pc, pc)).collect(),
            statements,
            branches,
            diagnostics,
        })
    }
}
