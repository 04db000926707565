//! Byte ranges and lookups over the solc AST.

use std::fmt::{self, Display, Formatter};

use foundry_compilers::artifacts::{
    ast::SourceLocation, BinaryOperation, BinaryOperator, ContractDefinition,
    ContractDefinitionPart, Expression, FunctionCall, FunctionDefinition, FunctionKind,
    SourceUnit, SourceUnitPart, Statement,
};
use serde::{Deserialize, Serialize};

/// A half-open `(start, end)` byte range into one source unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct Offset {
    pub start: usize,
    pub end: usize,
}

impl Offset {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `inner` lies entirely within this range.
    pub const fn contains(&self, inner: &Self) -> bool {
        self.start <= inner.start && inner.end <= self.end
    }
}

impl From<(usize, usize)> for Offset {
    fn from((start, end): (usize, usize)) -> Self {
        Self::new(start, end)
    }
}

impl From<Offset> for (usize, usize) {
    fn from(offset: Offset) -> Self {
        (offset.start, offset.end)
    }
}

impl Display for Offset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// The byte range of a node, if solc gave it one.
pub fn src_offset(src: &SourceLocation) -> Option<Offset> {
    let start = src.start?;
    Some(Offset::new(start, start + src.length?))
}

pub fn expression_src(expr: &Expression) -> &SourceLocation {
    match expr {
        Expression::Assignment(assignment) => &assignment.src,
        Expression::BinaryOperation(binary) => &binary.src,
        Expression::Conditional(conditional) => &conditional.src,
        Expression::ElementaryTypeNameExpression(type_expr) => &type_expr.src,
        Expression::FunctionCall(func_call) => &func_call.src,
        Expression::FunctionCallOptions(func_call_opts) => &func_call_opts.src,
        Expression::Identifier(ident) => &ident.src,
        Expression::IndexAccess(index_access) => &index_access.src,
        Expression::IndexRangeAccess(index_range) => &index_range.src,
        Expression::Literal(literal) => &literal.src,
        Expression::MemberAccess(member_access) => &member_access.src,
        Expression::NewExpression(new_expr) => &new_expr.src,
        Expression::TupleExpression(tuple_expr) => &tuple_expr.src,
        Expression::UnaryOperation(unary) => &unary.src,
    }
}

pub fn expression_offset(expr: &Expression) -> Option<Offset> {
    src_offset(expression_src(expr))
}

pub fn statement_src(statement: &Statement) -> &SourceLocation {
    match statement {
        Statement::Block(block) => &block.src,
        Statement::Break(stmt) => &stmt.src,
        Statement::Continue(stmt) => &stmt.src,
        Statement::DoWhileStatement(stmt) => &stmt.src,
        Statement::EmitStatement(stmt) => &stmt.src,
        Statement::ExpressionStatement(stmt) => &stmt.src,
        Statement::ForStatement(stmt) => &stmt.src,
        Statement::IfStatement(stmt) => &stmt.src,
        Statement::InlineAssembly(stmt) => &stmt.src,
        Statement::PlaceholderStatement(stmt) => &stmt.src,
        Statement::Return(stmt) => &stmt.src,
        Statement::RevertStatement(stmt) => &stmt.src,
        Statement::TryStatement(stmt) => &stmt.src,
        Statement::UncheckedBlock(stmt) => &stmt.src,
        Statement::VariableDeclarationStatement(stmt) => &stmt.src,
        Statement::WhileStatement(stmt) => &stmt.src,
    }
}

/// Blocks only group other statements and never execute on their own.
pub fn is_executable(statement: &Statement) -> bool {
    !matches!(statement, Statement::Block(_) | Statement::UncheckedBlock(_))
}

/// Direct sub-expressions, in evaluation order.
pub fn children(expr: &Expression) -> Vec<&Expression> {
    let mut children: Vec<&Expression> = Vec::new();
    match expr {
        Expression::BinaryOperation(op) => {
            children.push(&op.lhs);
            children.push(&op.rhs);
        }
        Expression::UnaryOperation(op) => children.push(&op.sub_expression),
        Expression::Conditional(cond) => {
            children.push(&cond.condition);
            children.push(&cond.true_expression);
            children.push(&cond.false_expression);
        }
        Expression::FunctionCall(call) => {
            children.push(&call.expression);
            for argument in &call.arguments {
                children.push(argument);
            }
        }
        Expression::FunctionCallOptions(call) => {
            children.push(&call.expression);
            for option in &call.options {
                children.push(option);
            }
        }
        Expression::Assignment(assignment) => {
            children.push(&assignment.lhs);
            children.push(&assignment.rhs);
        }
        Expression::IndexAccess(access) => {
            children.push(&access.base_expression);
            if let Some(index) = &access.index_expression {
                children.push(index);
            }
        }
        Expression::IndexRangeAccess(access) => {
            children.push(&access.base_expression);
            if let Some(start) = &access.start_expression {
                children.push(start);
            }
            if let Some(end) = &access.end_expression {
                children.push(end);
            }
        }
        Expression::MemberAccess(access) => children.push(&access.expression),
        Expression::TupleExpression(tuple) => {
            for component in tuple.components.iter().flatten() {
                children.push(component);
            }
        }
        Expression::ElementaryTypeNameExpression(_) |
        Expression::Identifier(_) |
        Expression::Literal(_) |
        Expression::NewExpression(_) => {}
    }
    children
}

/// Returns true if solc typed the operation as `bool`, or left it untyped.
pub fn is_boolean(op: &BinaryOperation) -> bool {
    op.type_descriptions.type_string.as_deref().map_or(true, |ty| ty == "bool")
}

/// The short-circuit operator, if this is a boolean `&&` / `||` operation.
pub fn logical_operator(expr: &Expression) -> Option<&BinaryOperator> {
    match expr {
        Expression::BinaryOperation(op)
            if is_boolean(op) &&
                (op.operator == BinaryOperator::And || op.operator == BinaryOperator::Or) =>
        {
            Some(&op.operator)
        }
        _ => None,
    }
}

/// Returns true if this expression is, or contains, a boolean `&&` / `||` operation.
pub fn contains_logical_operation(expr: &Expression) -> bool {
    logical_operator(expr).is_some() || children(expr).into_iter().any(contains_logical_operation)
}

pub fn is_constructor(function: &FunctionDefinition) -> bool {
    // Pre-0.5 compilers mark constructors with a flag instead of a kind.
    function.is_constructor || matches!(function.kind(), FunctionKind::Constructor)
}

/// The name used to key coverage data, e.g. `Token.transfer` or `Token.<constructor>`.
pub fn full_name(function: &FunctionDefinition, contract: Option<&str>) -> String {
    let name = if is_constructor(function) {
        "<constructor>"
    } else {
        match function.kind() {
            FunctionKind::Fallback => "<fallback>",
            FunctionKind::Receive => "<receive>",
            _ if function.name.is_empty() => "<fallback>",
            _ => function.name.as_str(),
        }
    };

    match contract {
        Some(contract) => format!("{contract}.{name}"),
        None => name.to_string(),
    }
}

fn callee_name(call: &FunctionCall) -> Option<&str> {
    let callee: &Expression = &call.expression;
    match callee {
        Expression::Identifier(ident) => Some(ident.name.as_str()),
        _ => None,
    }
}

pub fn is_require(call: &FunctionCall) -> bool {
    callee_name(call) == Some("require")
}

/// A `revert()` call without a reason string or custom error.
pub fn is_bare_revert(call: &FunctionCall) -> bool {
    callee_name(call) == Some("revert") && call.arguments.is_empty()
}

/// The source index this unit is referred to by in source maps.
pub fn source_index(unit: &SourceUnit) -> Option<usize> {
    unit.src.index
}

pub fn contracts(unit: &SourceUnit) -> impl Iterator<Item = &ContractDefinition> {
    unit.nodes.iter().filter_map(|part| match part {
        SourceUnitPart::ContractDefinition(contract) => {
            let contract: &ContractDefinition = contract;
            Some(contract)
        }
        _ => None,
    })
}

/// Every function in the unit, paired with the name of its contract (`None` for free functions).
pub fn functions(unit: &SourceUnit) -> Vec<(Option<&str>, &FunctionDefinition)> {
    let mut functions = Vec::new();
    for part in &unit.nodes {
        match part {
            SourceUnitPart::ContractDefinition(contract) => {
                for node in &contract.nodes {
                    if let ContractDefinitionPart::FunctionDefinition(function) = node {
                        let function: &FunctionDefinition = function;
                        functions.push((Some(contract.name.as_str()), function));
                    }
                }
            }
            SourceUnitPart::FunctionDefinition(function) => {
                let function: &FunctionDefinition = function;
                functions.push((None, function));
            }
            _ => {}
        }
    }
    functions
}

/// Full name of the innermost function whose definition encloses `offset`.
pub fn find_enclosing_function(unit: &SourceUnit, offset: Offset) -> Option<String> {
    functions(unit)
        .into_iter()
        .filter_map(|(contract, function)| Some((contract, function, src_offset(&function.src)?)))
        .filter(|(_, _, range)| range.contains(&offset))
        .min_by_key(|(_, _, range)| range.len())
        .map(|(contract, function, _)| full_name(function, contract))
}

pub fn function_by_full_name<'a>(
    unit: &'a SourceUnit,
    name: &str,
) -> Option<&'a FunctionDefinition> {
    functions(unit)
        .into_iter()
        .find(|(contract, function)| full_name(function, *contract) == name)
        .map(|(_, function)| function)
}
