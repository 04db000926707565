//! Branch indices and the branch map.

use super::{correlator::Correlation, BranchEntry, BranchMap, ContractSources};
use crate::{artifact::ast::find_enclosing_function, error::Diagnostic};

/// Hands out a coverage index to every resolved branch, marks its armed step and its JUMPI, and
/// builds the branch map. Paths and offsets are visited in sorted order.
pub(crate) fn finalize_branches(
    correlation: &mut Correlation<'_>,
    sources: &ContractSources<'_>,
) -> BranchMap {
    let mut branches: BranchMap =
        correlation.states.keys().map(|path| (path.to_string(), Default::default())).collect();

    let resolved: Vec<_> = correlation
        .states
        .iter()
        .flat_map(|(path, state)| {
            state.resolved().iter().map(move |(offset, steps)| {
                (*path, *offset, *steps, state.jump_of(offset).unwrap_or_default())
            })
        })
        .collect();

    for (path, offset, (armed, jumpi), jump) in resolved {
        let function = correlation.pc_list[armed].function.clone().or_else(|| {
            sources.by_path(path).and_then(|unit| find_enclosing_function(unit, offset))
        });
        let Some(function) = function else {
            correlation
                .diagnostics
                .push(Diagnostic::AmbiguousAttribution { path: path.to_string(), offset });
            continue;
        };

        let index = correlation.next_index();
        correlation.pc_list[armed].branch = Some(index);
        correlation.pc_list[jumpi].branch = Some(index);
        branches
            .entry(path.to_string())
            .or_default()
            .entry(function)
            .or_default()
            .insert(index, BranchEntry { offset, jump });
    }

    branches
}
