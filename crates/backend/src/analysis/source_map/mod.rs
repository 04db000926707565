//! Expansion of solc's compressed source maps.
//!
//! A source map is a `;`-separated list with one entry per instruction. Each entry is a
//! `:`-separated list of `start:length:index:jump:modifierDepth`. Empty entries and empty fields
//! repeat the value of the previous entry.

use foundry_compilers::artifacts::sourcemap;
pub use foundry_compilers::artifacts::sourcemap::{Jump, SourceElement};
use itertools::Itertools;
use serde::Serializer;

use crate::{artifact::ast::Offset, error::CoverageError};

/// Whether a start or length field was `-1`.
fn is_unset(value: i64) -> bool {
    value < 0 || value == i64::from(u32::MAX)
}

/// Expands a compressed source map into one [`SourceElement`] per instruction.
pub fn parse_source_map(source_map: &str) -> Result<Vec<SourceElement>, CoverageError> {
    let first = source_map.split(';').next().unwrap_or_default();
    let mut fields = first.split(':');
    if (0..3).any(|_| fields.next().map_or(true, str::is_empty)) {
        return Err(CoverageError::MalformedSourceMap(
            "the first entry must specify start, length and source index".to_string(),
        ));
    }

    let mut elements = sourcemap::parse(source_map)
        .map_err(|err| CoverageError::MalformedSourceMap(err.to_string()))?;

    // trailing empty entries repeat the last element
    let entries = source_map.split(';').count();
    if let Some(last) = elements.last().cloned() {
        if elements.len() < entries {
            elements.resize(entries, last);
        }
    }

    trace!(entries = elements.len(), "expanded source map");
    Ok(elements)
}

/// The source index, unless the instruction belongs to no source unit.
pub fn element_index(element: &SourceElement) -> Option<usize> {
    element.index().map(|index| index as usize)
}

/// The source range, unless the instruction has no location.
pub fn element_offset(element: &SourceElement) -> Option<Offset> {
    let (start, length) = (element.offset() as i64, element.length() as i64);
    if is_unset(start) || is_unset(length) {
        return None;
    }
    Some(Offset::new(start as usize, (start + length) as usize))
}

pub fn jump_code(jump: &Jump) -> &'static str {
    match jump {
        Jump::In => "i",
        Jump::Out => "o",
        Jump::Regular => "-",
    }
}

pub(crate) fn serialize_jump<S: Serializer>(
    jump: &Option<Jump>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match jump {
        Some(jump) => serializer.serialize_str(jump_code(jump)),
        None => serializer.serialize_none(),
    }
}

/// Renders expanded entries back into a fully specified source map.
pub fn to_source_map(elements: &[SourceElement]) -> String {
    let field = |value: i64| if is_unset(value) { "-1".to_string() } else { value.to_string() };
    elements
        .iter()
        .map(|element| {
            let index = element.index().map_or_else(|| "-1".to_string(), |i| i.to_string());
            format!(
                "{}:{}:{index}:{}",
                field(element.offset() as i64),
                field(element.length() as i64),
                jump_code(&element.jump())
            )
        })
        .join(";")
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn expanded(elements: &[SourceElement]) -> Vec<(Option<Offset>, Option<usize>, &'static str)> {
        elements
            .iter()
            .map(|e| (element_offset(e), element_index(e), jump_code(&e.jump())))
            .collect()
    }

    #[test]
    fn test_expand_full_entries() {
        let elements = parse_source_map("0:10:0:-;10:5:0:i;15:5:0:o").unwrap();
        assert_eq!(
            expanded(&elements),
            vec![
                (Some(Offset::new(0, 10)), Some(0), "-"),
                (Some(Offset::new(10, 15)), Some(0), "i"),
                (Some(Offset::new(15, 20)), Some(0), "o"),
            ]
        );
    }

    #[test]
    fn test_expand_inherits_fields() {
        let elements = parse_source_map("0:10:1:-;;5;:3::i;-1:-1:-1:-:2").unwrap();
        assert_eq!(elements.len(), 5);
        assert_eq!(
            expanded(&elements[..4]),
            vec![
                (Some(Offset::new(0, 10)), Some(1), "-"),
                (Some(Offset::new(0, 10)), Some(1), "-"),
                (Some(Offset::new(5, 15)), Some(1), "-"),
                (Some(Offset::new(5, 8)), Some(1), "i"),
            ]
        );
        assert_eq!(element_index(&elements[4]), None);
    }

    #[test]
    fn test_first_entry_jump_defaults_to_regular() {
        let elements = parse_source_map("1:2:0;3").unwrap();
        assert_eq!(
            expanded(&elements),
            vec![(Some(Offset::new(1, 3)), Some(0), "-"), (Some(Offset::new(3, 5)), Some(0), "-")]
        );
    }

    #[test]
    fn test_trailing_empty_entries_are_kept() {
        let elements = parse_source_map("0:1:0;;;").unwrap();
        assert_eq!(elements.len(), 4);
        assert_eq!(element_offset(&elements[3]), Some(Offset::new(0, 1)));
    }

    #[test]
    fn test_malformed_source_maps() {
        for map in ["", ";0:1:0", "0:1", "x:1:0", "0:1:0:q", "0:1:0;1:y"] {
            assert!(
                matches!(parse_source_map(map), Err(CoverageError::MalformedSourceMap(_))),
                "{map} should be rejected"
            );
        }
    }

    #[test]
    fn test_reexpansion_is_stable() {
        let elements = parse_source_map("26:104:0:-:0;;;45:3::i;;7:1:2:o;").unwrap();
        let rendered = to_source_map(&elements);
        assert_eq!(expanded(&parse_source_map(&rendered).unwrap()), expanded(&elements));
    }

    type Entry = (Option<u32>, Option<u32>, Option<u32>, Option<&'static str>);

    fn arb_entry() -> impl Strategy<Value = Entry> {
        (
            proptest::option::of(0u32..500),
            proptest::option::of(0u32..100),
            proptest::option::of(0u32..4),
            proptest::option::of(prop_oneof![Just("i"), Just("o"), Just("-")]),
        )
    }

    fn render(entry: &Entry) -> String {
        let field = |v: Option<u32>| v.map(|v| v.to_string()).unwrap_or_default();
        let jump = entry.3.unwrap_or_default();
        let rendered = format!("{}:{}:{}:{jump}", field(entry.0), field(entry.1), field(entry.2));
        rendered.trim_end_matches(':').to_string()
    }

    proptest! {
        #[test]
        fn prop_expansion_forward_fills(rest in proptest::collection::vec(arb_entry(), 0..64)) {
            let first = (Some(0), Some(1), Some(0), None);
            let entries: Vec<_> = std::iter::once(first).chain(rest).collect();
            let map = entries.iter().map(render).join(";");

            let elements = parse_source_map(&map).unwrap();
            prop_assert_eq!(elements.len(), entries.len());

            let (mut start, mut length, mut index, mut jump) = (0, 1, 0, "-");
            for (entry, got) in entries.iter().zip(&elements) {
                start = entry.0.unwrap_or(start);
                length = entry.1.unwrap_or(length);
                index = entry.2.unwrap_or(index);
                jump = entry.3.unwrap_or(jump);
                let want = Offset::new(start as usize, (start + length) as usize);
                prop_assert_eq!(element_offset(got), Some(want));
                prop_assert_eq!(element_index(got), Some(index as usize));
                prop_assert_eq!(jump_code(&got.jump()), jump);
            }

            let reparsed = parse_source_map(&to_source_map(&elements)).unwrap();
            prop_assert_eq!(expanded(&reparsed), expanded(&elements));
        }
    }
}
