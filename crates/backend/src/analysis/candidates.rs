//! Statement and branch candidates extracted from the AST.
//!
//! Candidates are computed once per compiler run and shared read-only between contracts. The
//! correlator works on private copies.

use std::collections::{BTreeMap, BTreeSet};

use eyre::Result;

use foundry_compilers::artifacts::{
    BinaryOperator, Conditional, Expression, FunctionCall, FunctionDefinition, IfStatement,
    SourceUnit, Statement,
};

use super::ast_visitor::{Visitor, Walk};
use crate::{
    artifact::ast::{
        children, contains_logical_operation, expression_offset, is_bare_revert, is_boolean,
        is_constructor, is_executable, is_require, logical_operator, src_offset, statement_src,
        Offset,
    },
    config::CoverageConfig,
};

/// Branch candidate offsets mapped to their `jump` flag.
pub type BranchCandidates = BTreeMap<Offset, bool>;

/// One side of a conditional that may compile to its own JUMPI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BranchCandidate {
    pub offset: Offset,
    pub jump: bool,
}

/// A leaf operand of a short-circuit boolean expression.
#[derive(Clone, Copy, Debug)]
pub struct BooleanOperand<'a> {
    pub expression: &'a Expression,
    /// Operator of the nearest enclosing boolean operation that has this operand in its left
    /// side, i.e. the operation that still has a sibling to evaluate after this operand.
    /// Comparisons of booleans such as `(a || b) == c` count as well.
    pub left_of: Option<&'a BinaryOperator>,
}

impl BooleanOperand<'_> {
    /// No sibling operand is evaluated after this one.
    pub fn is_rightmost(&self) -> bool {
        self.left_of.is_none()
    }

    /// The `jump` flag of this operand, given whether the root construct is a `require`.
    pub fn jump(&self, require: bool) -> bool {
        match self.left_of {
            None => require,
            Some(operator) => *operator == BinaryOperator::Or,
        }
    }
}

/// Leaf operands of every `&&` / `||` operation inside `condition`, in evaluation order.
///
/// An operand is a leaf if it contains no boolean operation itself. Operands that do are
/// decomposed further, also across non-boolean nodes such as `!(a && b)` or `f(a || b)`.
pub fn boolean_operands_of(condition: &Expression) -> Vec<BooleanOperand<'_>> {
    let mut operands = Vec::new();
    collect_boolean_operands(condition, None, &mut operands);
    operands
}

fn collect_boolean_operands<'a>(
    expr: &'a Expression,
    left_of: Option<&'a BinaryOperator>,
    operands: &mut Vec<BooleanOperand<'a>>,
) {
    let Expression::BinaryOperation(op) = expr else {
        for child in children(expr) {
            collect_boolean_operands(child, left_of, operands);
        }
        return;
    };

    let left: &Expression = &op.lhs;
    let right: &Expression = &op.rhs;
    if !is_boolean(op) {
        collect_boolean_operands(left, left_of, operands);
        collect_boolean_operands(right, left_of, operands);
        return;
    }

    // only the direct operands of `&&` / `||` are leaves
    let logical = logical_operator(expr).is_some();
    for (operand, left_of) in [(left, Some(&op.operator)), (right, left_of)] {
        if logical && !contains_logical_operation(operand) {
            operands.push(BooleanOperand { expression: operand, left_of });
        } else {
            collect_boolean_operands(operand, left_of, operands);
        }
    }
}

/// Branch candidates for one `require` call, `if` condition or ternary condition.
fn branches_of_condition(
    condition: &Expression,
    fallback: Option<&Expression>,
    require: bool,
) -> Vec<BranchCandidate> {
    if !contains_logical_operation(condition) {
        return fallback
            .and_then(expression_offset)
            .map(|offset| BranchCandidate { offset, jump: require })
            .into_iter()
            .collect();
    }

    boolean_operands_of(condition)
        .into_iter()
        .filter_map(|operand| {
            let offset = expression_offset(operand.expression)?;
            Some(BranchCandidate { offset, jump: operand.jump(require) })
        })
        .collect()
}

/// Branch candidates for a `require(...)` call: its first argument, or the leaf operands of any
/// boolean operation among its arguments.
pub fn branches_of_require(call: &FunctionCall) -> Vec<BranchCandidate> {
    let mut candidates = Vec::new();
    let has_logical = call.arguments.iter().any(contains_logical_operation);

    if !has_logical {
        if let Some(offset) = call.arguments.first().and_then(expression_offset) {
            candidates.push(BranchCandidate { offset, jump: true });
        }
        return candidates;
    }

    for argument in &call.arguments {
        candidates.extend(branches_of_condition(argument, None, true));
    }
    candidates
}

#[derive(Debug, Default)]
struct BranchVisitor {
    in_function: bool,
    branches: BranchCandidates,
}

impl BranchVisitor {
    fn insert(&mut self, candidates: Vec<BranchCandidate>) {
        for candidate in candidates {
            // the first candidate discovered at an offset wins
            self.branches.entry(candidate.offset).or_insert(candidate.jump);
        }
    }
}

impl Visitor for BranchVisitor {
    fn visit_function_definition(&mut self, _definition: &FunctionDefinition) -> Result<()> {
        self.in_function = true;
        Ok(())
    }

    fn post_visit_function_definition(&mut self, _definition: &FunctionDefinition) -> Result<()> {
        self.in_function = false;
        Ok(())
    }

    fn visit_function_call(&mut self, function_call: &FunctionCall) -> Result<()> {
        if self.in_function && is_require(function_call) {
            self.insert(branches_of_require(function_call));
        }
        Ok(())
    }

    fn visit_if_statement(&mut self, if_statement: &IfStatement) -> Result<()> {
        if self.in_function {
            let condition = &if_statement.condition;
            self.insert(branches_of_condition(condition, Some(condition), false));
        }
        Ok(())
    }

    fn visit_conditional(&mut self, conditional: &Conditional) -> Result<()> {
        if self.in_function {
            let condition: &Expression = &conditional.condition;
            self.insert(branches_of_condition(condition, Some(condition), false));
        }
        Ok(())
    }
}

/// Every branch candidate inside the function bodies of `unit`. Modifiers are not scanned.
pub fn branches_of(unit: &SourceUnit) -> Result<BranchCandidates> {
    let mut visitor = BranchVisitor::default();
    unit.walk(&mut visitor)?;
    trace!(
        path = %unit.absolute_path,
        branches = visitor.branches.len(),
        "collected branch candidates"
    );
    Ok(visitor.branches)
}

#[derive(Debug, Default)]
struct StatementVisitor {
    skip_constructor: bool,
    in_constructor: bool,
    statements: BTreeSet<Offset>,
}

impl Visitor for StatementVisitor {
    fn visit_function_definition(&mut self, definition: &FunctionDefinition) -> Result<()> {
        self.in_constructor = self.skip_constructor && is_constructor(definition);
        Ok(())
    }

    fn post_visit_function_definition(&mut self, _definition: &FunctionDefinition) -> Result<()> {
        self.in_constructor = false;
        Ok(())
    }

    fn visit_statement(&mut self, statement: &Statement) -> Result<()> {
        if self.in_constructor || !is_executable(statement) {
            return Ok(());
        }
        if let Some(offset) = src_offset(statement_src(statement)) {
            self.statements.insert(offset);
        }
        Ok(())
    }
}

/// Offsets of every executable statement in `unit`.
pub fn statements_of(unit: &SourceUnit, skip_constructor: bool) -> Result<BTreeSet<Offset>> {
    let mut visitor = StatementVisitor { skip_constructor, ..Default::default() };
    unit.walk(&mut visitor)?;
    trace!(
        path = %unit.absolute_path,
        statements = visitor.statements.len(),
        "collected statement candidates"
    );
    Ok(visitor.statements)
}

#[derive(Debug, Default)]
struct RevertCallVisitor {
    calls: Vec<Offset>,
}

impl Visitor for RevertCallVisitor {
    fn visit_function_call(&mut self, function_call: &FunctionCall) -> Result<()> {
        if is_bare_revert(function_call) {
            self.calls.extend(src_offset(&function_call.src));
        }
        Ok(())
    }
}

/// Offsets of the argument-less `revert()` calls in `function`, in source order.
pub fn bare_reverts_of(function: &FunctionDefinition) -> Result<Vec<Offset>> {
    let mut visitor = RevertCallVisitor::default();
    function.walk(&mut visitor)?;
    Ok(visitor.calls)
}

/// Statement and branch candidates of every source unit, keyed by absolute path.
#[derive(Clone, Debug, Default)]
pub struct SourceCandidates {
    pub statements: BTreeMap<String, BTreeSet<Offset>>,
    pub branches: BTreeMap<String, BranchCandidates>,
}

impl SourceCandidates {
    pub fn extract<'a>(
        units: impl IntoIterator<Item = &'a SourceUnit>,
        config: &CoverageConfig,
    ) -> Result<Self> {
        let mut candidates = Self::default();
        for unit in units {
            let path = unit.absolute_path.clone();
            candidates
                .statements
                .insert(path.clone(), statements_of(unit, config.skip_constructor_statements)?);
            candidates.branches.insert(path, branches_of(unit)?);
        }
        Ok(candidates)
    }
}
