//! The lockstep walk over the expanded source map and the disassembled bytecode.

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::U256;
use revm::interpreter::opcode::{DUP1, JUMPDEST, JUMPI, PUSH1, REVERT};

use super::{ContractSources, ProgramCounter, StatementMap};
use crate::{
    analysis::{
        candidates::{BranchCandidates, SourceCandidates},
        source_map::{element_index, element_offset, Jump, SourceElement},
    },
    artifact::ast::{find_enclosing_function, Offset},
    error::{CoverageError, Diagnostic, Diagnostics},
    utils::opcode::OpcodeStep,
};

/// Coverage state of one source path.
///
/// A branch candidate is *armed* when an instruction maps to it and *resolved* by the next
/// JUMPI of the same path. Arming it again discards an earlier resolution.
#[derive(Clone, Debug, Default)]
pub(crate) struct PathState {
    statements: BTreeSet<Offset>,
    branches: BranchCandidates,
    active: BTreeMap<Offset, usize>,
    resolved: BTreeMap<Offset, (usize, usize)>,
}

impl PathState {
    pub(crate) fn new(statements: BTreeSet<Offset>, branches: BranchCandidates) -> Self {
        Self { statements, branches, ..Default::default() }
    }

    pub(crate) fn has_active(&self) -> bool {
        !self.active.is_empty()
    }

    pub(crate) fn is_branch(&self, offset: &Offset) -> bool {
        self.branches.contains_key(offset)
    }

    pub(crate) fn jump_of(&self, offset: &Offset) -> Option<bool> {
        self.branches.get(offset).copied()
    }

    pub(crate) fn arm(&mut self, offset: Offset, index: usize) {
        self.resolved.remove(&offset);
        self.active.insert(offset, index);
    }

    /// Resolves every armed branch with the JUMPI at `jumpi`.
    pub(crate) fn resolve_active(&mut self, jumpi: usize) {
        for (offset, armed) in std::mem::take(&mut self.active) {
            self.resolved.insert(offset, (armed, jumpi));
        }
    }

    pub(crate) fn resolved(&self) -> &BTreeMap<Offset, (usize, usize)> {
        &self.resolved
    }

    /// Removes and returns the innermost unconsumed statement containing `offset`.
    pub(crate) fn take_statement(&mut self, offset: &Offset) -> Option<Offset> {
        let statement = self
            .statements
            .iter()
            .filter(|statement| statement.contains(offset))
            .min_by_key(|statement| statement.len())
            .copied()?;
        self.statements.remove(&statement);
        Some(statement)
    }

    pub(crate) fn has_statement_at(&self, offset: &Offset) -> bool {
        self.statements.iter().any(|statement| statement.contains(offset))
    }
}

/// The outcome of the walk, refined by the later passes.
#[derive(Debug)]
pub(crate) struct Correlation<'a> {
    pub(crate) pc_list: Vec<ProgramCounter>,
    pub(crate) states: BTreeMap<&'a str, PathState>,
    /// Indices of the jumps into the shared revert target, per path and function.
    pub(crate) revert_jumps: BTreeMap<(&'a str, String), Vec<usize>>,
    pub(crate) statements: StatementMap,
    /// The next coverage index. Statements and branches share one index space.
    pub(crate) counter: usize,
    pub(crate) diagnostics: Diagnostics,
}

impl Correlation<'_> {
    pub(crate) fn next_index(&mut self) -> usize {
        let index = self.counter;
        self.counter += 1;
        index
    }

    pub(crate) fn into_parts(self) -> (Vec<ProgramCounter>, StatementMap, Vec<Diagnostic>) {
        (self.pc_list, self.statements, self.diagnostics.into_vec())
    }
}

pub(crate) struct Correlator<'a> {
    sources: &'a ContractSources<'a>,
    first_revert: Option<U256>,
    correlation: Correlation<'a>,
}

impl<'a> Correlator<'a> {
    pub(crate) fn new(sources: &'a ContractSources<'a>, candidates: &SourceCandidates) -> Self {
        let mut states = BTreeMap::new();
        let mut statements = StatementMap::new();
        for path in sources.paths() {
            states.insert(
                path,
                PathState::new(
                    candidates.statements.get(path).cloned().unwrap_or_default(),
                    candidates.branches.get(path).cloned().unwrap_or_default(),
                ),
            );
            statements.insert(path.to_string(), BTreeMap::new());
        }

        Self {
            sources,
            first_revert: None,
            correlation: Correlation {
                pc_list: Vec::new(),
                states,
                revert_jumps: BTreeMap::new(),
                statements,
                counter: 0,
                diagnostics: Diagnostics::default(),
            },
        }
    }

    /// Walks the source map entries and the instructions in lockstep.
    ///
    /// Instructions past the end of the source map (the metadata hash) are ignored.
    pub(crate) fn walk(
        mut self,
        elements: &[SourceElement],
        steps: &[OpcodeStep],
    ) -> Result<Correlation<'a>, CoverageError> {
        if steps.len() < elements.len() {
            return Err(CoverageError::MalformedSourceMap(format!(
                "{} source map entries but only {} instructions",
                elements.len(),
                steps.len()
            )));
        }
        if steps.len() > elements.len() {
            debug!(trailing = steps.len() - elements.len(), "ignoring unmapped instructions");
        }

        self.correlation.pc_list.reserve(elements.len());
        for (ic, element) in elements.iter().enumerate() {
            let next = steps.get(ic + 1).filter(|_| ic + 1 < elements.len());
            let mut record = ProgramCounter {
                pc: steps[ic].pc,
                op: steps[ic].op.clone(),
                value: steps[ic].operand.clone(),
                jump: (element.jump() != Jump::Regular).then(|| element.jump()),
                ..Default::default()
            };

            self.detect_first_revert(ic, steps, &mut record);
            self.attribute(ic, element, &steps[ic], next, &mut record);
            self.correlation.pc_list.push(record);
        }

        Ok(self.correlation)
    }

    /// Spots the REVERT at the end of the function selector. Functions that revert without a
    /// reason may jump there instead of having a REVERT of their own.
    fn detect_first_revert(
        &mut self,
        ic: usize,
        steps: &[OpcodeStep],
        record: &mut ProgramCounter,
    ) {
        if self.first_revert.is_some() || ic < 3 || !steps[ic].is(REVERT) {
            return;
        }
        let window = &steps[ic - 3..ic];
        if window[0].is(JUMPDEST) && window[1].is(PUSH1) && window[2].is(DUP1) {
            trace!(pc = window[0].pc, "found shared revert target");
            self.first_revert = Some(U256::from(window[0].pc));
            record.first_revert = true;
        }
    }

    fn attribute(
        &mut self,
        ic: usize,
        element: &SourceElement,
        step: &OpcodeStep,
        next: Option<&OpcodeStep>,
        record: &mut ProgramCounter,
    ) {
        let Some(unit) = element_index(element).and_then(|index| self.sources.get(index)) else {
            return;
        };
        let path = unit.absolute_path.as_str();
        record.path = Some(path.to_string());

        let Some(offset) = element_offset(element) else {
            return;
        };
        record.offset = Some(offset);

        let correlation = &mut self.correlation;
        let Some(state) = correlation.states.get_mut(path) else {
            return;
        };

        if step.is(JUMPI) && state.has_active() {
            state.resolve_active(ic);
        } else if state.is_branch(&offset) {
            state.arm(offset, ic);
        }

        let previous = ic.checked_sub(1).map(|i| &correlation.pc_list[i]);
        let inherited = previous
            .filter(|p| p.offset == Some(offset) && p.path.as_deref() == Some(path))
            .map(|p| p.function.clone());
        let statement = match inherited {
            Some(function) => {
                record.function = function;
                None
            }
            None => {
                record.function = find_enclosing_function(unit, offset);
                match &record.function {
                    Some(_) => state.take_statement(&offset),
                    None if state.has_statement_at(&offset) => {
                        correlation.diagnostics.push(Diagnostic::AmbiguousAttribution {
                            path: path.to_string(),
                            offset,
                        });
                        None
                    }
                    None => None,
                }
            }
        };

        if let (Some(statement), Some(function)) = (statement, &record.function) {
            let index = correlation.next_index();
            correlation
                .statements
                .entry(path.to_string())
                .or_default()
                .entry(function.clone())
                .or_default()
                .insert(index, statement);
            record.statement = Some(index);
        }

        let jumps_to_revert = matches!(
            (step.value, self.first_revert),
            (Some(value), Some(target)) if value == target
        ) && next.is_some_and(OpcodeStep::is_jump);
        if let (true, Some(function)) = (jumps_to_revert, &record.function) {
            trace!(pc = step.pc, function = %function, "jump into shared revert target");
            correlation
                .revert_jumps
                .entry((path, function.clone()))
                .or_default()
                .push(ic + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analysis::source_map::parse_source_map, utils::opcode::Disassembler};

    #[test]
    fn test_branch_transitions() {
        let (a, b) = (Offset::new(10, 11), Offset::new(15, 16));
        let mut state =
            PathState::new(BTreeSet::new(), BranchCandidates::from([(a, true), (b, false)]));
        assert!(state.is_branch(&a));
        assert!(!state.is_branch(&Offset::new(10, 12)));

        state.arm(a, 1);
        state.arm(b, 2);
        assert!(state.has_active());
        state.resolve_active(3);
        assert!(!state.has_active());
        assert_eq!(state.resolved().get(&a), Some(&(1, 3)));
        assert_eq!(state.resolved().get(&b), Some(&(2, 3)));

        // arming again supersedes the earlier resolution
        state.arm(a, 7);
        assert_eq!(state.resolved().get(&a), None);
        state.resolve_active(9);
        assert_eq!(state.resolved().get(&a), Some(&(7, 9)));
        assert_eq!(state.jump_of(&b), Some(false));
    }

    #[test]
    fn test_take_innermost_statement() {
        let outer = Offset::new(0, 50);
        let inner = Offset::new(10, 20);
        let mut state = PathState::new(BTreeSet::from([outer, inner]), BranchCandidates::new());

        assert_eq!(state.take_statement(&Offset::new(12, 14)), Some(inner));
        // consumed statements are never handed out twice
        assert_eq!(state.take_statement(&Offset::new(12, 14)), Some(outer));
        assert_eq!(state.take_statement(&Offset::new(12, 14)), None);
        assert!(!state.has_statement_at(&Offset::new(0, 1)));
    }

    #[test]
    fn test_first_revert_needs_full_pattern() {
        let sources = ContractSources::new();
        let candidates = SourceCandidates::default();
        let opcodes = "PUSH1 0x0 JUMPDEST DUP1 REVERT JUMPDEST PUSH1 0x0 DUP1 REVERT";
        let steps = Disassembler::new(opcodes).collect::<Result<Vec<_>, _>>().unwrap();
        let map = vec!["-1:-1:-1:-"; steps.len()].join(";");
        let elements = parse_source_map(&map).unwrap();

        let correlation = Correlator::new(&sources, &candidates).walk(&elements, &steps).unwrap();
        let flagged: Vec<_> =
            correlation.pc_list.iter().filter(|pc| pc.first_revert).map(|pc| pc.pc).collect();
        assert_eq!(flagged, vec![9]);
    }
}
