//! Attribution of bare `revert()` calls.
//!
//! A `revert()` without a reason usually compiles to a jump into the REVERT at the end of the
//! function selector, so no instruction carries its offset. The jumps recorded during the walk
//! are handed out to such calls in source order.

use eyre::Result;

use super::{correlator::Correlation, ContractSources};
use crate::{
    analysis::candidates::bare_reverts_of, artifact::ast::function_by_full_name,
    error::Diagnostic,
};

pub(crate) fn reconcile_reverts(
    correlation: &mut Correlation<'_>,
    sources: &ContractSources<'_>,
) -> Result<()> {
    for ((path, function), jumps) in std::mem::take(&mut correlation.revert_jumps) {
        let Some(definition) =
            sources.by_path(path).and_then(|unit| function_by_full_name(unit, &function))
        else {
            warn!(path, function = %function, "shared revert jump from an unknown function");
            continue;
        };

        let mut jumps = jumps.into_iter();
        for offset in bare_reverts_of(definition)? {
            let mapped = correlation
                .pc_list
                .iter()
                .any(|pc| pc.offset == Some(offset) && pc.path.as_deref() == Some(path));
            if mapped {
                continue;
            }

            match jumps.next() {
                Some(ic) => {
                    trace!(path, function = %function, %offset, ic, "attributed bare revert");
                    let record = &mut correlation.pc_list[ic];
                    record.offset = Some(offset);
                    record.jump_revert = true;
                }
                None => correlation.diagnostics.push(Diagnostic::UnattributedRevert {
                    path: path.to_string(),
                    function: function.clone(),
                    offset,
                }),
            }
        }
    }
    Ok(())
}
