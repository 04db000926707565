use eyre::Result;
use foundry_compilers::artifacts::*;
use paste::paste;

use crate::artifact::ast::children;

pub trait Visitor {
    fn visit_source_unit(&mut self, _source_unit: &SourceUnit) -> Result<()> {
        Ok(())
    }
    fn visit_contract_definition(&mut self, _definition: &ContractDefinition) -> Result<()> {
        Ok(())
    }
    fn visit_function_definition(&mut self, _definition: &FunctionDefinition) -> Result<()> {
        Ok(())
    }
    fn visit_modifier_definition(&mut self, _definition: &ModifierDefinition) -> Result<()> {
        Ok(())
    }
    fn visit_block(&mut self, _block: &Block) -> Result<()> {
        Ok(())
    }
    fn visit_unchecked_block(&mut self, _unchecked_block: &UncheckedBlock) -> Result<()> {
        Ok(())
    }
    fn visit_statement(&mut self, _statement: &Statement) -> Result<()> {
        Ok(())
    }
    fn visit_if_statement(&mut self, _if_statement: &IfStatement) -> Result<()> {
        Ok(())
    }
    fn visit_for_statement(&mut self, _for_statement: &ForStatement) -> Result<()> {
        Ok(())
    }
    fn visit_while_statement(&mut self, _while_statement: &WhileStatement) -> Result<()> {
        Ok(())
    }
    fn visit_do_while_statement(&mut self, _do_while_statement: &DoWhileStatement) -> Result<()> {
        Ok(())
    }
    fn visit_try_statement(&mut self, _try_statement: &TryStatement) -> Result<()> {
        Ok(())
    }
    fn visit_expression(&mut self, _expression: &Expression) -> Result<()> {
        Ok(())
    }
    fn visit_function_call(&mut self, _function_call: &FunctionCall) -> Result<()> {
        Ok(())
    }
    fn visit_binary_operation(&mut self, _binary_op: &BinaryOperation) -> Result<()> {
        Ok(())
    }
    fn visit_conditional(&mut self, _conditional: &Conditional) -> Result<()> {
        Ok(())
    }

    fn post_visit_source_unit(&mut self, _source_unit: &SourceUnit) -> Result<()> {
        Ok(())
    }
    fn post_visit_contract_definition(&mut self, _definition: &ContractDefinition) -> Result<()> {
        Ok(())
    }
    fn post_visit_function_definition(&mut self, _definition: &FunctionDefinition) -> Result<()> {
        Ok(())
    }
    fn post_visit_modifier_definition(&mut self, _definition: &ModifierDefinition) -> Result<()> {
        Ok(())
    }
    fn post_visit_block(&mut self, _block: &Block) -> Result<()> {
        Ok(())
    }
    fn post_visit_unchecked_block(&mut self, _unchecked_block: &UncheckedBlock) -> Result<()> {
        Ok(())
    }
    fn post_visit_statement(&mut self, _statement: &Statement) -> Result<()> {
        Ok(())
    }
    fn post_visit_if_statement(&mut self, _if_statement: &IfStatement) -> Result<()> {
        Ok(())
    }
    fn post_visit_for_statement(&mut self, _for_statement: &ForStatement) -> Result<()> {
        Ok(())
    }
    fn post_visit_while_statement(&mut self, _while_statement: &WhileStatement) -> Result<()> {
        Ok(())
    }
    fn post_visit_do_while_statement(
        &mut self,
        _do_while_statement: &DoWhileStatement,
    ) -> Result<()> {
        Ok(())
    }
    fn post_visit_try_statement(&mut self, _try_statement: &TryStatement) -> Result<()> {
        Ok(())
    }
    fn post_visit_expression(&mut self, _expression: &Expression) -> Result<()> {
        Ok(())
    }
    fn post_visit_function_call(&mut self, _function_call: &FunctionCall) -> Result<()> {
        Ok(())
    }
    fn post_visit_binary_operation(&mut self, _binary_op: &BinaryOperation) -> Result<()> {
        Ok(())
    }
    fn post_visit_conditional(&mut self, _conditional: &Conditional) -> Result<()> {
        Ok(())
    }
}

pub trait Walk {
    fn walk(&self, visitor: &mut dyn Visitor) -> Result<()>;
}

macro_rules! impl_walk {
    // Implement `Walk` for a type, calling the given function.
    ($ty:ty, | $val:ident, $visitor:ident | $e:expr) => {
        impl Walk for $ty {
            fn walk(&self, visitor: &mut dyn Visitor) -> Result<()> {
                let $val = self;
                let $visitor = visitor;
                $e
            }
        }
    };
    ($ty:ty, $func:ident, | $val:ident, $visitor:ident | $e:expr) => {
        impl_walk!($ty, |$val, $visitor| {
            $visitor.$func($val)?;
            let r = $e;
            if r.is_err() {
                return r;
            }
            paste! { $visitor.[<post_ $func>]($val)?; }
            Ok(())
        });
    };
}

impl_walk!(SourceUnit, visit_source_unit, |source_unit, visitor| {
    for node in &source_unit.nodes {
        node.walk(visitor)?;
    }
    Ok(())
});

impl_walk!(SourceUnitPart, |part, visitor| {
    match part {
        SourceUnitPart::ContractDefinition(contract) => contract.walk(visitor),
        SourceUnitPart::FunctionDefinition(function) => function.walk(visitor),
        // declarations without executable code
        _ => Ok(()),
    }
});

impl_walk!(ContractDefinition, visit_contract_definition, |contract, visitor| {
    for part in &contract.nodes {
        match part {
            ContractDefinitionPart::FunctionDefinition(function) => function.walk(visitor)?,
            ContractDefinitionPart::ModifierDefinition(modifier) => modifier.walk(visitor)?,
            _ => {}
        }
    }
    Ok(())
});

impl_walk!(FunctionDefinition, visit_function_definition, |function, visitor| {
    if let Some(body) = &function.body {
        body.walk(visitor)?;
    }
    Ok(())
});

impl_walk!(ModifierDefinition, visit_modifier_definition, |modifier, visitor| {
    if let Some(body) = &modifier.body {
        body.walk(visitor)?;
    }
    Ok(())
});

impl_walk!(Block, visit_block, |block, visitor| {
    for statement in &block.statements {
        statement.walk(visitor)?;
    }
    Ok(())
});

impl_walk!(UncheckedBlock, visit_unchecked_block, |unchecked_block, visitor| {
    for statement in &unchecked_block.statements {
        statement.walk(visitor)?;
    }
    Ok(())
});

impl_walk!(Statement, visit_statement, |statement, visitor| {
    match statement {
        Statement::Block(block) => block.walk(visitor),
        Statement::WhileStatement(statement) => statement.walk(visitor),
        Statement::ForStatement(statement) => statement.walk(visitor),
        Statement::IfStatement(statement) => statement.walk(visitor),
        Statement::DoWhileStatement(statement) => statement.walk(visitor),
        Statement::EmitStatement(statement) => statement.event_call.walk(visitor),
        Statement::VariableDeclarationStatement(statement) => statement.walk(visitor),
        Statement::ExpressionStatement(statement) => statement.walk(visitor),
        Statement::UncheckedBlock(statement) => statement.walk(visitor),
        Statement::TryStatement(statement) => statement.walk(visitor),
        Statement::RevertStatement(statement) => statement.error_call.walk(visitor),
        Statement::Return(statement) => match &statement.expression {
            Some(expr) => expr.walk(visitor),
            None => Ok(()),
        },
        Statement::InlineAssembly(_) |
        Statement::Break(_) |
        Statement::Continue(_) |
        Statement::PlaceholderStatement(_) => Ok(()),
    }
});

impl_walk!(BlockOrStatement, |block_or_statement, visitor| {
    match block_or_statement {
        BlockOrStatement::Block(block) => block.walk(visitor),
        BlockOrStatement::Statement(statement) => statement.walk(visitor),
    }
});

impl_walk!(ExpressionOrVariableDeclarationStatement, |val, visitor| {
    match val {
        ExpressionOrVariableDeclarationStatement::ExpressionStatement(expression) => {
            expression.walk(visitor)
        }
        ExpressionOrVariableDeclarationStatement::VariableDeclarationStatement(stmt) => {
            stmt.walk(visitor)
        }
    }
});

impl_walk!(ExpressionStatement, |expression_statement, visitor| {
    expression_statement.expression.walk(visitor)
});

impl_walk!(VariableDeclarationStatement, |stmt, visitor| {
    if let Some(initial_value) = &stmt.initial_value {
        initial_value.walk(visitor)?;
    }
    Ok(())
});

impl_walk!(IfStatement, visit_if_statement, |if_statement, visitor| {
    if_statement.condition.walk(visitor)?;
    if_statement.true_body.walk(visitor)?;

    if let Some(false_body) = &if_statement.false_body {
        false_body.walk(visitor)?;
    }
    Ok(())
});

impl_walk!(ForStatement, visit_for_statement, |for_statement, visitor| {
    if let Some(initialization_expr) = &for_statement.initialization_expression {
        initialization_expr.walk(visitor)?;
    }

    if let Some(condition) = &for_statement.condition {
        condition.walk(visitor)?;
    }

    if let Some(loop_expression) = &for_statement.loop_expression {
        loop_expression.walk(visitor)?;
    }

    for_statement.body.walk(visitor)
});

impl_walk!(WhileStatement, visit_while_statement, |while_statement, visitor| {
    while_statement.condition.walk(visitor)?;
    while_statement.body.walk(visitor)
});

impl_walk!(DoWhileStatement, visit_do_while_statement, |do_while_statement, visitor| {
    do_while_statement.body.walk(visitor)?;
    do_while_statement.condition.walk(visitor)
});

impl_walk!(TryStatement, visit_try_statement, |try_statement, visitor| {
    try_statement.external_call.walk(visitor)?;
    for clause in &try_statement.clauses {
        clause.block.walk(visitor)?;
    }
    Ok(())
});

impl_walk!(Expression, visit_expression, |expr, visitor| {
    match expr {
        Expression::FunctionCall(function_call) => function_call.walk(visitor),
        Expression::BinaryOperation(binary_op) => binary_op.walk(visitor),
        Expression::Conditional(conditional) => conditional.walk(visitor),
        // the remaining nodes have no dedicated hooks, only their operands are walked
        _ => {
            for child in children(expr) {
                child.walk(visitor)?;
            }
            Ok(())
        }
    }
});

impl_walk!(FunctionCall, visit_function_call, |function_call, visitor| {
    function_call.expression.walk(visitor)?;
    for argument in &function_call.arguments {
        argument.walk(visitor)?;
    }
    Ok(())
});

impl_walk!(BinaryOperation, visit_binary_operation, |binary_op, visitor| {
    binary_op.lhs.walk(visitor)?;
    binary_op.rhs.walk(visitor)
});

impl_walk!(Conditional, visit_conditional, |conditional, visitor| {
    conditional.condition.walk(visitor)?;
    conditional.true_expression.walk(visitor)?;
    conditional.false_expression.walk(visitor)
});
