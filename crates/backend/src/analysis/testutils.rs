//! Builders for solc-shaped JSON ASTs over a snippet of source code.
//!
//! Node locations are taken from the position of a needle in the code, so tests read like the
//! source they describe.

use std::cell::Cell;

use serde_json::{json, Value};

use foundry_compilers::artifacts::SourceUnit;

use crate::artifact::ast::Offset;

pub struct Fixture {
    pub code: String,
    pub path: String,
    pub index: usize,
    next_id: Cell<usize>,
}

impl Fixture {
    pub fn new(code: &str) -> Self {
        Self::with_path(code, "contracts/C.sol", 0)
    }

    pub fn with_path(code: &str, path: &str, index: usize) -> Self {
        Self { code: code.to_string(), path: path.to_string(), index, next_id: Cell::new(1) }
    }

    fn id(&self) -> usize {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Start of the `n`-th occurrence of `needle` that is not part of a longer identifier.
    pub fn find_nth(&self, needle: &str, n: usize) -> usize {
        let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
        let starts_ident = needle.chars().next().is_some_and(is_ident);
        let ends_ident = needle.chars().next_back().is_some_and(is_ident);

        self.code
            .match_indices(needle)
            .map(|(i, _)| i)
            .filter(|&i| {
                let before = self.code[..i].chars().next_back().is_some_and(is_ident);
                let after = self.code[i + needle.len()..].chars().next().is_some_and(is_ident);
                !(starts_ident && before) && !(ends_ident && after)
            })
            .nth(n)
            .unwrap_or_else(|| panic!("`{needle}` #{n} not found in `{}`", self.code))
    }

    pub fn offset(&self, needle: &str) -> Offset {
        self.offset_nth(needle, 0)
    }

    pub fn offset_nth(&self, needle: &str, n: usize) -> Offset {
        let start = self.find_nth(needle, n);
        Offset::new(start, start + needle.len())
    }

    pub fn src(&self, needle: &str) -> String {
        self.src_nth(needle, 0)
    }

    pub fn src_nth(&self, needle: &str, n: usize) -> String {
        format!("{}:{}:{}", self.find_nth(needle, n), needle.len(), self.index)
    }

    /// Attributes every typed expression node carries.
    pub fn expression(
        &self,
        node_type: &str,
        src: String,
        type_string: &str,
        fields: Value,
    ) -> Value {
        let mut node = json!({
            "nodeType": node_type,
            "id": self.id(),
            "src": src,
            "argumentTypes": null,
            "isConstant": false,
            "isLValue": false,
            "isPure": false,
            "lValueRequested": false,
            "typeDescriptions": { "typeString": type_string },
        });
        if let (Some(node), Value::Object(fields)) = (node.as_object_mut(), fields) {
            node.extend(fields);
        }
        node
    }

    fn parameter_list(&self) -> Value {
        json!({ "nodeType": "ParameterList", "id": self.id(), "src": "0:0:0", "parameters": [] })
    }

    pub fn unit_json(&self, nodes: Vec<Value>) -> Value {
        json!({
            "nodeType": "SourceUnit",
            "id": self.id(),
            "absolutePath": self.path,
            "exportedSymbols": {},
            "src": format!("0:{}:{}", self.code.len(), self.index),
            "nodes": nodes,
        })
    }

    pub fn unit(&self, nodes: Vec<Value>) -> SourceUnit {
        serde_json::from_value(self.unit_json(nodes)).unwrap()
    }

    pub fn contract(&self, name: &str, id: usize, nodes: Vec<Value>) -> Value {
        self.contract_with_bases(name, id, &[id], nodes)
    }

    pub fn contract_with_bases(
        &self,
        name: &str,
        id: usize,
        bases: &[usize],
        nodes: Vec<Value>,
    ) -> Value {
        let needle = format!("contract {name}");
        let start = self.find_nth(&needle, 0);
        json!({
            "nodeType": "ContractDefinition",
            "id": id,
            "name": name,
            "src": format!("{start}:{}:{}", self.code.len() - start, self.index),
            "abstract": false,
            "baseContracts": [],
            "canonicalName": name,
            "contractDependencies": [],
            "contractKind": "contract",
            "fullyImplemented": true,
            "linearizedBaseContracts": bases,
            "nodes": nodes,
            "scope": 0,
            "usedErrors": [],
            "usedEvents": [],
        })
    }

    fn function_json(&self, name: &str, kind: &str, needle: &str, statements: Vec<Value>) -> Value {
        json!({
            "nodeType": "FunctionDefinition",
            "id": self.id(),
            "name": name,
            "kind": kind,
            "src": self.src(needle),
            "implemented": true,
            "modifiers": [],
            "parameters": self.parameter_list(),
            "returnParameters": self.parameter_list(),
            "scope": 0,
            "stateMutability": "nonpayable",
            "virtual": false,
            "visibility": "public",
            "body": self.block(needle, statements),
        })
    }

    pub fn function(&self, name: &str, needle: &str, statements: Vec<Value>) -> Value {
        self.function_json(name, "function", needle, statements)
    }

    pub fn constructor(&self, needle: &str, statements: Vec<Value>) -> Value {
        self.function_json("", "constructor", needle, statements)
    }

    pub fn modifier(&self, name: &str, needle: &str, statements: Vec<Value>) -> Value {
        json!({
            "nodeType": "ModifierDefinition",
            "id": self.id(),
            "name": name,
            "src": self.src(needle),
            "parameters": self.parameter_list(),
            "virtual": false,
            "visibility": "internal",
            "body": self.block(needle, statements),
        })
    }

    pub fn block(&self, needle: &str, statements: Vec<Value>) -> Value {
        json!({
            "nodeType": "Block",
            "id": self.id(),
            "src": self.src(needle),
            "statements": statements,
        })
    }

    pub fn expression_statement(&self, expression: Value) -> Value {
        json!({
            "nodeType": "ExpressionStatement",
            "id": self.id(),
            "src": expression["src"].clone(),
            "expression": expression,
        })
    }

    /// An expression statement whose expression is of no interest.
    pub fn expression_statement_at(&self, needle: &str) -> Value {
        self.expression_statement(self.literal(needle))
    }

    pub fn if_statement(&self, needle: &str, condition: Value, body: Value) -> Value {
        json!({
            "nodeType": "IfStatement",
            "id": self.id(),
            "src": self.src(needle),
            "condition": condition,
            "trueBody": body,
        })
    }

    pub fn return_statement(&self, needle: &str) -> Value {
        json!({
            "nodeType": "Return",
            "id": self.id(),
            "src": self.src(needle),
            "functionReturnParameters": 0,
        })
    }

    pub fn return_with(&self, needle: &str, expression: Value) -> Value {
        json!({
            "nodeType": "Return",
            "id": self.id(),
            "src": self.src(needle),
            "functionReturnParameters": 0,
            "expression": expression,
        })
    }

    pub fn placeholder(&self, needle: &str) -> Value {
        json!({ "nodeType": "PlaceholderStatement", "id": self.id(), "src": self.src(needle) })
    }

    pub fn call(&self, name: &str, needle: &str, arguments: Vec<Value>) -> Value {
        self.call_nth(name, needle, 0, arguments)
    }

    pub fn call_nth(&self, name: &str, needle: &str, n: usize, arguments: Vec<Value>) -> Value {
        let start = self.find_nth(needle, n);
        let callee = self.identifier(name, format!("{start}:{}:{}", name.len(), self.index));
        self.expression(
            "FunctionCall",
            self.src_nth(needle, n),
            "tuple()",
            json!({
                "expression": callee,
                "arguments": arguments,
                "kind": "functionCall",
                "names": [],
                "nameLocations": [],
                "tryCall": false,
            }),
        )
    }

    pub fn require(&self, needle: &str, arguments: Vec<Value>) -> Value {
        self.call("require", needle, arguments)
    }

    pub fn binary(&self, operator: &str, needle: &str, left: Value, right: Value) -> Value {
        let ty = if matches!(operator, "&&" | "||" | ">" | "<" | "==" | "!=") {
            "bool"
        } else {
            "uint256"
        };
        self.expression(
            "BinaryOperation",
            self.src(needle),
            ty,
            json!({
                "operator": operator,
                "commonType": { "typeString": ty },
                "leftExpression": left,
                "rightExpression": right,
            }),
        )
    }

    pub fn not(&self, needle: &str, operand: Value) -> Value {
        self.expression(
            "UnaryOperation",
            self.src(needle),
            "bool",
            json!({ "operator": "!", "prefix": true, "subExpression": operand }),
        )
    }

    /// A parenthesized expression.
    pub fn tuple(&self, needle: &str, inner: Value) -> Value {
        self.expression(
            "TupleExpression",
            self.src(needle),
            "bool",
            json!({ "components": [inner], "isInlineArray": false }),
        )
    }

    pub fn conditional(&self, needle: &str, condition: Value, t: Value, f: Value) -> Value {
        self.expression(
            "Conditional",
            self.src(needle),
            "uint256",
            json!({ "condition": condition, "trueExpression": t, "falseExpression": f }),
        )
    }

    pub fn identifier(&self, name: &str, src: String) -> Value {
        json!({
            "nodeType": "Identifier",
            "id": self.id(),
            "name": name,
            "src": src,
            "argumentTypes": null,
            "overloadedDeclarations": [],
            "referencedDeclaration": 0,
            "typeDescriptions": { "typeString": "bool" },
        })
    }

    pub fn ident(&self, name: &str) -> Value {
        self.ident_nth(name, 0)
    }

    pub fn ident_nth(&self, name: &str, n: usize) -> Value {
        self.identifier(name, self.src_nth(name, n))
    }

    pub fn literal(&self, needle: &str) -> Value {
        self.expression(
            "Literal",
            self.src(needle),
            "int_const",
            json!({ "hexValue": "", "kind": "number", "value": needle }),
        )
    }
}
