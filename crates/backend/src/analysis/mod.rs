pub mod ast_visitor;
pub mod candidates;
pub mod coverage;
pub mod source_map;

#[cfg(test)]
pub(crate) mod testutils;
