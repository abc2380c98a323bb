//! Flattens the decorated AST into a linear IR: operations, a literal data
//! pool, and a variable map.
//!
//! One recursive function per node category, returning a [`Data`] handle
//! the caller threads into its own operand slot.

use std::collections::HashMap;

use crate::compiler::ast::{Arena, NodeId, SyntaxKind};
use crate::diagnostics::{Diagnostic, DiagnosticSink, Severity};

/// Every machine-independent operation the emitter knows how to lower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseNot,
    ShiftLeft,
    ShiftRight,
    ShiftRightUnsigned,
    RotateLeft,
    RotateRight,
    LogicalNot,
    Negate,
    Identity,
    Compare,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AlmostEqual,
    StrictlyEqual,
    StrictlyNotEqual,
    Minimum,
    Maximum,
    AbsoluteValue,
    Increment,
    Decrement,
    Assignment,
    IfTrue,
    IfFalse,
    Goto,
    Label,
    Array,
    Param,
    Call,
}

/// An IR operand: either an inline literal or a named variable/temporary.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Integer(i64),
    Float(f64),
    Str(String),
    Variable(String),
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub op_kind: OpKind,
    pub source_node: NodeId,
    pub lhs: Option<Data>,
    pub rhs: Option<Data>,
    pub extra_params: Vec<Data>,
    pub result: Option<Data>,
    pub label: Option<String>,
}

#[derive(Debug, Default)]
pub struct FlattenedProgram {
    pub operations: Vec<Operation>,
    pub data: Vec<Data>,
    pub variables: Vec<String>,
}

struct Flattener<'a> {
    arena: &'a Arena,
    sink: &'a DiagnosticSink,
    program: FlattenedProgram,
    scope: HashMap<String, bool>,
    temp_counter: u32,
    label_counter: u32,
}

/// Walks `root` and produces a [`FlattenedProgram`], or `None` if the root
/// kind is not a recognized top-level container.
pub fn flatten(root: NodeId, arena: &Arena, sink: &DiagnosticSink) -> Option<FlattenedProgram> {
    let mut flattener = Flattener {
        arena,
        sink,
        program: FlattenedProgram::default(),
        scope: HashMap::new(),
        temp_counter: 0,
        label_counter: 0,
    };
    match arena.get(root).kind() {
        SyntaxKind::DirectiveList | SyntaxKind::Package | SyntaxKind::Program | SyntaxKind::Root => {
            flattener.harvest_declarations(root);
            let mut last_result = None;
            for &child in arena.get(root).children() {
                last_result = flattener.flatten_statement(child);
            }
            flattener.finalize(last_result, root);
            Some(flattener.program)
        }
        _ => None,
    }
}

impl<'a> Flattener<'a> {
    fn fresh_temp(&mut self) -> String {
        self.temp_counter += 1;
        format!("%temp{}", self.temp_counter)
    }

    fn fresh_label(&mut self, tag: &str) -> String {
        self.label_counter += 1;
        format!("%label_{tag}{}", self.label_counter)
    }

    fn emit(&mut self, op: Operation) {
        self.program.operations.push(op);
    }

    fn declare(&mut self, name: &str) {
        if self.scope.insert(name.to_string(), true).is_none() {
            self.program.variables.push(name.to_string());
        }
    }

    /// Pre-harvests every declaration reachable directly under this scope's
    /// variable list, ahead of flattening any statement body.
    fn harvest_declarations(&mut self, scope: NodeId) {
        for &var in self.arena.get(scope).variables() {
            if let Some(name) = self.arena.get(var).get_string() {
                self.declare(name);
            }
        }
    }

    fn finalize(&mut self, last_result: Option<Data>, fallback_source: NodeId) {
        if let (Some(Data::Variable(name)), Some(op)) = (last_result.clone(), self.program.operations.last_mut()) {
            if matches!(&op.result, Some(Data::Variable(r)) if r == &name) {
                op.result = Some(Data::Variable("%result".to_string()));
                self.declare("%result");
                return;
            }
        }
        // No trailing operation to rename (e.g. the program's last
        // statement was a bare literal) — synthesize an explicit
        // assignment so `%result` is always extern-visible.
        if let Some(value) = last_result {
            self.declare("%result");
            self.emit(Operation {
                op_kind: OpKind::Assignment,
                source_node: fallback_source,
                lhs: Some(value),
                rhs: None,
                extra_params: Vec::new(),
                result: Some(Data::Variable("%result".to_string())),
                label: None,
            });
        }
    }

    fn flatten_statement(&mut self, id: NodeId) -> Option<Data> {
        match self.arena.get(id).kind() {
            SyntaxKind::Var | SyntaxKind::Let | SyntaxKind::Const => {
                self.flatten_declaration(id);
                None
            }
            SyntaxKind::Block | SyntaxKind::DirectiveList => {
                let mut last = None;
                for &child in self.arena.get(id).children() {
                    last = self.flatten_statement(child);
                }
                last
            }
            SyntaxKind::Empty => None,
            _ => self.flatten_expression(id),
        }
    }

    fn flatten_declaration(&mut self, id: NodeId) {
        for &child in self.arena.get(id).children() {
            match self.arena.get(child).kind() {
                SyntaxKind::Identifier => {
                    if let Some(name) = self.arena.get(child).get_string() {
                        self.declare(name);
                    }
                }
                SyntaxKind::Assignment => {
                    let children = self.arena.get(child).children();
                    if children.len() == 2 {
                        let (target, init) = (children[0], children[1]);
                        if let Some(name) = self.arena.get(target).get_string() {
                            self.declare(name);
                            let value = self.flatten_expression(init);
                            self.emit(Operation {
                                op_kind: OpKind::Assignment,
                                source_node: child,
                                lhs: value,
                                rhs: None,
                                extra_params: Vec::new(),
                                result: Some(Data::Variable(name.to_string())),
                                label: None,
                            });
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn flatten_expression(&mut self, id: NodeId) -> Option<Data> {
        let kind = self.arena.get(id).kind();
        match kind {
            SyntaxKind::Integer => self.arena.get(id).get_integer().map(|v| Data::Integer(v.value())),
            SyntaxKind::True => Some(Data::Integer(1)),
            SyntaxKind::False => Some(Data::Integer(0)),
            SyntaxKind::Null | SyntaxKind::Undefined => Some(Data::Integer(0)),
            SyntaxKind::FloatingPoint => self.arena.get(id).get_float().map(|v| self.pool_float(v.value())),
            SyntaxKind::String => self.arena.get(id).get_string().map(|s| self.pool_string(s.to_string())),
            SyntaxKind::Identifier => self.flatten_identifier(id),
            SyntaxKind::Conditional => self.flatten_conditional(id),
            SyntaxKind::Member | SyntaxKind::Index => self.flatten_member(id),
            SyntaxKind::Call => self.flatten_call(id),
            k if binary_op_kind(k).is_some() => self.flatten_binary(id, binary_op_kind(k).unwrap()),
            k if unary_op_kind(k).is_some() => self.flatten_unary(id, unary_op_kind(k).unwrap()),
            _ => {
                self.sink.report(Diagnostic::at(
                    Severity::Error,
                    self.arena.get(id).position().clone(),
                    format!("node kind `{kind:?}` has no flattening rule"),
                ));
                None
            }
        }
    }

    fn pool_float(&mut self, value: f64) -> Data {
        let key = value.to_bits();
        for d in &self.program.data {
            if let Data::Float(existing) = d {
                if existing.to_bits() == key {
                    return d.clone();
                }
            }
        }
        let data = Data::Float(value);
        self.program.data.push(data.clone());
        data
    }

    fn pool_string(&mut self, value: String) -> Data {
        for d in &self.program.data {
            if let Data::Str(existing) = d {
                if existing == &value {
                    return d.clone();
                }
            }
        }
        let data = Data::Str(value);
        self.program.data.push(data.clone());
        data
    }

    fn flatten_identifier(&mut self, id: NodeId) -> Option<Data> {
        let name = self.arena.get(id).get_string()?.to_string();
        if !self.scope.contains_key(&name) {
            self.sink.report(Diagnostic::at(
                Severity::Error,
                self.arena.get(id).position().clone(),
                format!("reference to undeclared identifier `{name}`"),
            ));
            self.declare(&name);
        }
        Some(Data::Variable(name))
    }

    fn flatten_binary(&mut self, id: NodeId, op_kind: OpKind) -> Option<Data> {
        let children = self.arena.get(id).children();
        if children.len() != 2 {
            return None;
        }
        let (lhs_id, rhs_id) = (children[0], children[1]);
        let lhs = self.flatten_expression(lhs_id);
        let rhs = self.flatten_expression(rhs_id);
        let temp = self.fresh_temp();
        self.declare(&temp);
        self.emit(Operation {
            op_kind,
            source_node: id,
            lhs,
            rhs,
            extra_params: Vec::new(),
            result: Some(Data::Variable(temp.clone())),
            label: None,
        });
        Some(Data::Variable(temp))
    }

    fn flatten_unary(&mut self, id: NodeId, op_kind: OpKind) -> Option<Data> {
        let children = self.arena.get(id).children();
        if children.len() != 1 {
            return None;
        }
        let operand = self.flatten_expression(children[0]);
        let temp = self.fresh_temp();
        self.declare(&temp);
        self.emit(Operation {
            op_kind,
            source_node: id,
            lhs: operand,
            rhs: None,
            extra_params: Vec::new(),
            result: Some(Data::Variable(temp.clone())),
            label: None,
        });
        Some(Data::Variable(temp))
    }

    /// `cond ? a : b` → IfFalse, true branch assigned to a shared temp,
    /// Goto past the false branch, false branch assigned to the same temp.
    fn flatten_conditional(&mut self, id: NodeId) -> Option<Data> {
        let children = self.arena.get(id).children();
        if children.len() != 3 {
            return None;
        }
        let (cond_id, true_id, false_id) = (children[0], children[1], children[2]);
        let cond = self.flatten_expression(cond_id);
        let temp = self.fresh_temp();
        self.declare(&temp);
        let label_false = self.fresh_label("else");
        let label_after = self.fresh_label("endif");

        self.emit(Operation {
            op_kind: OpKind::IfFalse,
            source_node: id,
            lhs: cond,
            rhs: None,
            extra_params: Vec::new(),
            result: None,
            label: Some(label_false.clone()),
        });
        let true_value = self.flatten_expression(true_id);
        self.emit(Operation {
            op_kind: OpKind::Assignment,
            source_node: true_id,
            lhs: true_value,
            rhs: None,
            extra_params: Vec::new(),
            result: Some(Data::Variable(temp.clone())),
            label: None,
        });
        self.emit(Operation {
            op_kind: OpKind::Goto,
            source_node: id,
            lhs: None,
            rhs: None,
            extra_params: Vec::new(),
            result: None,
            label: Some(label_after.clone()),
        });
        self.emit(Operation {
            op_kind: OpKind::Label,
            source_node: id,
            lhs: None,
            rhs: None,
            extra_params: Vec::new(),
            result: None,
            label: Some(label_false),
        });
        let false_value = self.flatten_expression(false_id);
        self.emit(Operation {
            op_kind: OpKind::Assignment,
            source_node: false_id,
            lhs: false_value,
            rhs: None,
            extra_params: Vec::new(),
            result: Some(Data::Variable(temp.clone())),
            label: None,
        });
        self.emit(Operation {
            op_kind: OpKind::Label,
            source_node: id,
            lhs: None,
            rhs: None,
            extra_params: Vec::new(),
            result: None,
            label: Some(label_after),
        });
        Some(Data::Variable(temp))
    }

    fn flatten_member(&mut self, id: NodeId) -> Option<Data> {
        let children = self.arena.get(id).children();
        if children.len() != 2 {
            return None;
        }
        let (object_id, property_id) = (children[0], children[1]);
        let lhs = self.flatten_expression(object_id);
        let rhs = self
            .arena
            .get(property_id)
            .get_string()
            .map(|s| Data::Str(s.to_string()))
            .or_else(|| self.flatten_expression(property_id));
        let temp = self.fresh_temp();
        self.declare(&temp);
        self.emit(Operation {
            op_kind: OpKind::Array,
            source_node: id,
            lhs,
            rhs,
            extra_params: Vec::new(),
            result: Some(Data::Variable(temp.clone())),
            label: None,
        });
        Some(Data::Variable(temp))
    }

    fn flatten_call(&mut self, id: NodeId) -> Option<Data> {
        let children = self.arena.get(id).children();
        if children.is_empty() {
            return None;
        }
        let (callee_id, arg_ids) = (children[0], &children[1..]);

        if let Some(builtin) = self.recognize_math_builtin(callee_id) {
            let args: Vec<Option<Data>> = arg_ids.iter().map(|&a| self.flatten_expression(a)).collect();
            let temp = self.fresh_temp();
            self.declare(&temp);
            self.emit(Operation {
                op_kind: builtin,
                source_node: id,
                lhs: args.first().cloned().flatten(),
                rhs: args.get(1).cloned().flatten(),
                extra_params: Vec::new(),
                result: Some(Data::Variable(temp.clone())),
                label: None,
            });
            return Some(Data::Variable(temp));
        }

        let array_temp = self.fresh_temp();
        self.declare(&array_temp);
        for &arg_id in arg_ids {
            let mut value = self.flatten_expression(arg_id);
            if matches!(value, Some(Data::Integer(_)) | Some(Data::Float(_)) | Some(Data::Str(_))) {
                let literal_temp = self.fresh_temp();
                self.declare(&literal_temp);
                self.emit(Operation {
                    op_kind: OpKind::Assignment,
                    source_node: arg_id,
                    lhs: value.take(),
                    rhs: None,
                    extra_params: Vec::new(),
                    result: Some(Data::Variable(literal_temp.clone())),
                    label: None,
                });
                value = Some(Data::Variable(literal_temp));
            }
            self.emit(Operation {
                op_kind: OpKind::Param,
                source_node: arg_id,
                lhs: value,
                rhs: None,
                extra_params: Vec::new(),
                result: Some(Data::Variable(array_temp.clone())),
                label: None,
            });
        }

        let callee = self.flatten_expression(callee_id);
        let result_temp = self.fresh_temp();
        self.declare(&result_temp);
        self.emit(Operation {
            op_kind: OpKind::Call,
            source_node: id,
            lhs: callee,
            rhs: Some(Data::Variable(array_temp)),
            extra_params: Vec::new(),
            result: Some(Data::Variable(result_temp.clone())),
            label: None,
        });
        Some(Data::Variable(result_temp))
    }

    fn recognize_math_builtin(&self, callee_id: NodeId) -> Option<OpKind> {
        if self.arena.get(callee_id).kind() != SyntaxKind::Member {
            return None;
        }
        let children = self.arena.get(callee_id).children();
        if children.len() != 2 {
            return None;
        }
        let object_name = self.arena.get(children[0]).get_string()?;
        let property_name = self.arena.get(children[1]).get_string()?;
        if object_name != "Math" {
            return None;
        }
        match property_name {
            "abs" => Some(OpKind::AbsoluteValue),
            "min" => Some(OpKind::Minimum),
            "max" => Some(OpKind::Maximum),
            _ => None,
        }
    }
}

fn binary_op_kind(kind: SyntaxKind) -> Option<OpKind> {
    Some(match kind {
        SyntaxKind::Add => OpKind::Add,
        SyntaxKind::Subtract => OpKind::Subtract,
        SyntaxKind::Multiply => OpKind::Multiply,
        SyntaxKind::Divide => OpKind::Divide,
        SyntaxKind::Modulo => OpKind::Modulo,
        SyntaxKind::Power => OpKind::Power,
        SyntaxKind::BitwiseAnd => OpKind::BitwiseAnd,
        SyntaxKind::BitwiseOr => OpKind::BitwiseOr,
        SyntaxKind::BitwiseXor => OpKind::BitwiseXor,
        SyntaxKind::ShiftLeft => OpKind::ShiftLeft,
        SyntaxKind::ShiftRight => OpKind::ShiftRight,
        SyntaxKind::ShiftRightUnsigned => OpKind::ShiftRightUnsigned,
        SyntaxKind::RotateLeft => OpKind::RotateLeft,
        SyntaxKind::RotateRight => OpKind::RotateRight,
        SyntaxKind::Compare => OpKind::Compare,
        SyntaxKind::Equal => OpKind::Equal,
        SyntaxKind::NotEqual => OpKind::NotEqual,
        SyntaxKind::Less => OpKind::Less,
        SyntaxKind::LessEqual => OpKind::LessEqual,
        SyntaxKind::Greater => OpKind::Greater,
        SyntaxKind::GreaterEqual => OpKind::GreaterEqual,
        SyntaxKind::AlmostEqual => OpKind::AlmostEqual,
        SyntaxKind::StrictlyEqual => OpKind::StrictlyEqual,
        SyntaxKind::StrictlyNotEqual => OpKind::StrictlyNotEqual,
        SyntaxKind::Assignment => OpKind::Assignment,
        _ => return None,
    })
}

fn unary_op_kind(kind: SyntaxKind) -> Option<OpKind> {
    Some(match kind {
        SyntaxKind::Negate => OpKind::Negate,
        SyntaxKind::Identity => OpKind::Identity,
        SyntaxKind::BitwiseNot => OpKind::BitwiseNot,
        SyntaxKind::LogicalNot => OpKind::LogicalNot,
        SyntaxKind::Increment => OpKind::Increment,
        SyntaxKind::Decrement => OpKind::Decrement,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    fn leaf(arena: &mut Arena, kind: SyntaxKind) -> NodeId {
        arena.create(kind, Position::new("t.js"))
    }

    #[test]
    fn arithmetic_expression_flattens_to_add_and_multiply() {
        let mut arena = Arena::new();
        let sink = DiagnosticSink::new();
        let root = arena.create(SyntaxKind::Root, Position::new("t.js"));

        // 1 + 2 * 3
        let one = leaf(&mut arena, SyntaxKind::Integer);
        arena.set_integer(one, crate::literal::Integer::new(1));
        let two = leaf(&mut arena, SyntaxKind::Integer);
        arena.set_integer(two, crate::literal::Integer::new(2));
        let three = leaf(&mut arena, SyntaxKind::Integer);
        arena.set_integer(three, crate::literal::Integer::new(3));

        let mul = leaf(&mut arena, SyntaxKind::Multiply);
        arena.append_child(mul, two);
        arena.append_child(mul, three);

        let add = leaf(&mut arena, SyntaxKind::Add);
        arena.append_child(add, one);
        arena.append_child(add, mul);

        arena.append_child(root, add);

        let program = flatten(root, &arena, &sink).expect("root should flatten");
        assert_eq!(program.operations.len(), 2);
        assert_eq!(program.operations[0].op_kind, OpKind::Multiply);
        assert_eq!(program.operations[1].op_kind, OpKind::Add);
        assert_eq!(program.operations[1].result, Some(Data::Variable("%result".to_string())));
        assert!(sink.error_count() == 0);
    }

    #[test]
    fn undeclared_identifier_is_synthesized_with_a_diagnostic() {
        let mut arena = Arena::new();
        let sink = DiagnosticSink::new();
        let root = arena.create(SyntaxKind::Root, Position::new("t.js"));
        let ident = leaf(&mut arena, SyntaxKind::Identifier);
        arena.set_string(ident, "mystery");
        arena.append_child(root, ident);

        let program = flatten(root, &arena, &sink).unwrap();
        assert!(sink.error_count() >= 1);
        assert!(program.variables.contains(&"mystery".to_string()));
    }
}
