//! The AST node model.
//!
//! Children are strongly owned; every other cross-link (parent, type-node,
//! instance, goto, variables, labels) is non-owning, mirroring as2js's
//! shared_ptr/weak_ptr split. An arena of nodes addressed by stable
//! [`NodeId`] indices gets the same effect without `Arc` parent pointers
//! (a reference cycle) or unsafe `Weak<Node>` plumbing: "non-owning" becomes
//! "an index that does not keep the entry alive", and indices stay valid
//! even if `clean_tree` later recycles a kind to `Unknown`, the as2js
//! equivalent of a dangling weak pointer resolving to nothing.

use std::collections::HashMap;

use crate::diagnostics::{Diagnostic, DiagnosticSink, Severity};
use crate::literal::{CompareResult, FloatingPoint, Integer};
use crate::position::Position;

use super::attributes::{Attribute, Group};
use super::ids::NodeId;
use super::kind::SyntaxKind;
use super::node_flags::{flag_allowed_on, NodeFlags};

/// The integer/float/string payload triplet, modeled as as2js does: only one
/// of the three slots is ever meaningful for a given kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Integer(Integer),
    Float(FloatingPoint),
    String(String),
}

pub struct Node {
    kind: SyntaxKind,
    position: Position,
    payload: Payload,
    flags: NodeFlags,
    attributes: [Option<Attribute>; 5],
    switch_operator: Option<SyntaxKind>,

    children: Vec<NodeId>,
    parent: Option<NodeId>,
    offset: i32,

    type_node: Option<NodeId>,
    instance: Option<NodeId>,
    goto_enter: Option<NodeId>,
    goto_exit: Option<NodeId>,

    variables: Vec<NodeId>,
    labels: HashMap<String, NodeId>,

    param_depth: Vec<i32>,
    param_index: Vec<i32>,

    lock: i32,
}

fn group_index(group: Group) -> usize {
    match group {
        Group::ConditionalCompilation => 0,
        Group::FunctionType => 1,
        Group::FunctionContract => 2,
        Group::SwitchType => 3,
        Group::MemberVisibility => 4,
    }
}

impl Node {
    fn new(kind: SyntaxKind, position: Position) -> Self {
        Node {
            kind,
            position,
            payload: Payload::None,
            flags: NodeFlags::NONE,
            attributes: [None; 5],
            switch_operator: None,
            children: Vec::new(),
            parent: None,
            offset: -1,
            type_node: None,
            instance: None,
            goto_enter: None,
            goto_exit: None,
            variables: Vec::new(),
            labels: HashMap::new(),
            param_depth: Vec::new(),
            param_index: Vec::new(),
            lock: 0,
        }
    }

    pub fn kind(&self) -> SyntaxKind {
        self.kind
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn type_node(&self) -> Option<NodeId> {
        self.type_node
    }

    pub fn instance(&self) -> Option<NodeId> {
        self.instance
    }

    pub fn goto_enter(&self) -> Option<NodeId> {
        self.goto_enter
    }

    pub fn goto_exit(&self) -> Option<NodeId> {
        self.goto_exit
    }

    pub fn variables(&self) -> &[NodeId] {
        &self.variables
    }

    pub fn labels(&self) -> &HashMap<String, NodeId> {
        &self.labels
    }

    pub fn switch_operator(&self) -> Option<SyntaxKind> {
        self.switch_operator
    }

    pub fn param_depth(&self) -> &[i32] {
        &self.param_depth
    }

    pub fn param_index(&self) -> &[i32] {
        &self.param_index
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn is_locked(&self) -> bool {
        self.lock > 0
    }

    pub fn lock_count(&self) -> i32 {
        self.lock
    }

    pub fn get_attribute(&self, group: Group) -> Option<Attribute> {
        self.attributes[group_index(group)]
    }

    pub fn has_attribute(&self, attribute: Attribute) -> bool {
        self.attributes[group_index(attribute.group())] == Some(attribute)
    }

    // --- payload accessors ---------------------------------------------------

    pub fn get_integer(&self) -> Option<Integer> {
        match &self.payload {
            Payload::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_float(&self) -> Option<FloatingPoint> {
        match &self.payload {
            Payload::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_string(&self) -> Option<&str> {
        match &self.payload {
            Payload::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Owns every node created during a compile. Cross-links are [`NodeId`]
/// indices into this arena rather than pointers, so cycles (parent <->
/// child, instance <-> declaration) are representable without reference
/// counting.
#[derive(Default)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn new() -> Self {
        Arena { nodes: Vec::new() }
    }

    pub fn create(&mut self, kind: SyntaxKind, position: Position) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(Node::new(kind, position));
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.value() as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.value() as usize]
    }

    fn is_locked(&self, id: NodeId) -> bool {
        self.get(id).is_locked()
    }

    // --- construction / copying ------------------------------------------------

    /// Deep-copies payload and cross-links but not children/parent — the
    /// "basic" (leaf) clone used when rewriting a node in place.
    pub fn clone_basic_node(&mut self, id: NodeId) -> NodeId {
        let source = self.get(id);
        let kind = source.kind;
        let position = source.position.clone();
        let payload = source.payload.clone();
        let flags = source.flags;
        let attributes = source.attributes;
        let switch_operator = source.switch_operator;
        let type_node = source.type_node;
        let instance = source.instance;
        let goto_enter = source.goto_enter;
        let goto_exit = source.goto_exit;

        let new_id = self.create(kind, position);
        let node = self.get_mut(new_id);
        node.payload = payload;
        node.flags = flags;
        node.attributes = attributes;
        node.switch_operator = switch_operator;
        node.type_node = type_node;
        node.instance = instance;
        node.goto_enter = goto_enter;
        node.goto_exit = goto_exit;
        new_id
    }

    /// A fresh node of `new_kind` sharing only `id`'s position — used when a
    /// pass rewrites a subtree to a different shape.
    pub fn create_replacement(&mut self, id: NodeId, new_kind: SyntaxKind) -> NodeId {
        let position = self.get(id).position.clone();
        self.create(new_kind, position)
    }

    /// Marks a node for later removal by [`Self::clean_tree`].
    pub fn to_unknown(&mut self, id: NodeId) {
        self.get_mut(id).kind = SyntaxKind::Unknown;
    }

    /// Removes every child (recursively) whose kind has become `Unknown`.
    pub fn clean_tree(&mut self, root: NodeId) {
        let children: Vec<NodeId> = self.get(root).children().to_vec();
        let mut kept = Vec::with_capacity(children.len());
        for child in children {
            if self.get(child).kind == SyntaxKind::Unknown {
                continue;
            }
            self.clean_tree(child);
            kept.push(child);
        }
        for (new_offset, child) in kept.iter().enumerate() {
            self.get_mut(*child).offset = new_offset as i32;
        }
        self.get_mut(root).children = kept;
    }

    // --- cross-links -----------------------------------------------------------

    pub fn set_type_node(&mut self, id: NodeId, type_node: Option<NodeId>) {
        self.get_mut(id).type_node = type_node;
    }

    pub fn set_instance(&mut self, id: NodeId, instance: Option<NodeId>) {
        self.get_mut(id).instance = instance;
    }

    pub fn set_goto_enter(&mut self, id: NodeId, target: Option<NodeId>) {
        self.get_mut(id).goto_enter = target;
    }

    pub fn set_goto_exit(&mut self, id: NodeId, target: Option<NodeId>) {
        self.get_mut(id).goto_exit = target;
    }

    pub fn set_switch_operator(&mut self, id: NodeId, op: SyntaxKind) {
        assert_eq!(self.get(id).kind, SyntaxKind::Switch, "switch_operator only valid on Switch nodes");
        self.get_mut(id).switch_operator = Some(op);
    }

    pub fn add_variable(&mut self, scope: NodeId, variable: NodeId) {
        self.get_mut(scope).variables.push(variable);
    }

    pub fn add_label(&mut self, scope: NodeId, name: impl Into<String>, target: NodeId) {
        self.get_mut(scope).labels.insert(name.into(), target);
    }

    pub fn find_label(&self, scope: NodeId, name: &str) -> Option<NodeId> {
        self.get(scope).labels.get(name).copied()
    }

    pub fn set_param_size(&mut self, id: NodeId, size: usize) {
        assert_eq!(self.get(id).kind, SyntaxKind::ParamMatch, "param depth/index only valid on ParamMatch");
        let node = self.get_mut(id);
        node.param_depth = vec![0; size];
        node.param_index = vec![0; size];
    }

    pub fn set_param_depth(&mut self, id: NodeId, index: usize, depth: i32) {
        self.get_mut(id).param_depth[index] = depth;
    }

    pub fn set_param_index(&mut self, id: NodeId, index: usize, param_index: i32) {
        self.get_mut(id).param_index[index] = param_index;
    }

    // --- flags / attributes -----------------------------------------------------

    pub fn set_flag(&mut self, id: NodeId, flag: NodeFlags, value: bool, sink: &DiagnosticSink) {
        let kind = self.get(id).kind;
        assert!(
            flag_allowed_on(flag, kind),
            "{}",
            crate::diagnostics::InternalError::InvalidFlagForKind { kind, flag: "<flag>" }
        );
        if self.is_locked(id) {
            sink.report(Diagnostic::new(Severity::Error, "cannot modify a locked node"));
            return;
        }
        self.get_mut(id).flags.set(flag, value);
    }

    /// Sets `attribute`, enforcing the five exclusion groups. On conflict: the new attribute is rejected, the
    /// existing one is left set, and a diagnostic is reported.
    pub fn set_attribute(&mut self, id: NodeId, attribute: Attribute, value: bool, sink: &DiagnosticSink) {
        if self.is_locked(id) {
            sink.report(Diagnostic::new(Severity::Error, "cannot modify a locked node"));
            return;
        }
        let group = group_index(attribute.group());
        if !value {
            let node = self.get_mut(id);
            if node.attributes[group] == Some(attribute) {
                node.attributes[group] = None;
            }
            return;
        }
        let position = self.get(id).position.clone();
        let existing = self.get(id).attributes[group];
        match existing {
            Some(prior) if prior != attribute && !prior.compatible_with(attribute) => {
                sink.report(Diagnostic::at(
                    Severity::Error,
                    position,
                    format!("attribute {attribute:?} conflicts with already-set {prior:?}"),
                ));
            }
            _ => self.get_mut(id).attributes[group] = Some(attribute),
        }
    }

    /// Recursive variant of [`Self::set_attribute`].
    pub fn set_attribute_tree(&mut self, id: NodeId, attribute: Attribute, value: bool, sink: &DiagnosticSink) {
        self.set_attribute(id, attribute, value, sink);
        let children = self.get(id).children().to_vec();
        for child in children {
            self.set_attribute_tree(child, attribute, value, sink);
        }
    }

    pub fn set_integer(&mut self, id: NodeId, value: Integer) {
        let kind = self.get(id).kind;
        assert!(kind.accepts_integer_payload(), "{kind:?} cannot carry an integer payload");
        self.get_mut(id).payload = Payload::Integer(value);
    }

    pub fn set_float(&mut self, id: NodeId, value: FloatingPoint) {
        let kind = self.get(id).kind;
        assert!(kind.accepts_float_payload(), "{kind:?} cannot carry a float payload");
        self.get_mut(id).payload = Payload::Float(value);
    }

    pub fn set_string(&mut self, id: NodeId, value: impl Into<String>) {
        let kind = self.get(id).kind;
        assert!(kind.accepts_string_payload(), "{kind:?} cannot carry a string payload");
        self.get_mut(id).payload = Payload::String(value.into());
    }

    // --- structural mutation -----------------------------------------------------

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let index = self.get(parent).children.len();
        self.get_mut(parent).children.push(child);
        self.set_parent(child, Some(parent), index as i32);
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.get_mut(parent).children.insert(index, child);
        self.reindex_children(parent, index);
    }

    pub fn set_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.get_mut(parent).children[index] = child;
        self.set_parent(child, Some(parent), index as i32);
    }

    pub fn delete_child(&mut self, parent: NodeId, index: usize) -> NodeId {
        let removed = self.get_mut(parent).children.remove(index);
        self.get_mut(removed).parent = None;
        self.get_mut(removed).offset = -1;
        self.reindex_children(parent, index);
        removed
    }

    fn reindex_children(&mut self, parent: NodeId, from: usize) {
        let children = self.get(parent).children().to_vec();
        for (i, child) in children.into_iter().enumerate().skip(from) {
            self.get_mut(child).offset = i as i32;
            self.get_mut(child).parent = Some(parent);
        }
    }

    /// Replaces `id` with `replacement` inside `id`'s own parent.
    pub fn replace_with(&mut self, id: NodeId, replacement: NodeId) {
        let parent = self.get(id).parent.expect("replace_with requires a parent");
        let offset = self.get(id).offset as usize;
        self.set_child(parent, offset, replacement);
    }

    /// The only mutator of `parent`; verifies acyclicity by walking up from `new_parent` and rejecting if `child` appears.
    pub fn set_parent(&mut self, child: NodeId, new_parent: Option<NodeId>, index: i32) {
        if let Some(np) = new_parent {
            let mut walker = Some(np);
            while let Some(w) = walker {
                assert_ne!(w, child, "set_parent would introduce a cycle");
                walker = self.get(w).parent;
            }
        }
        let node = self.get_mut(child);
        node.parent = new_parent;
        node.offset = index;
    }

    // --- traversal ---------------------------------------------------------------

    pub fn find_first_child(&self, parent: NodeId, kind: SyntaxKind) -> Option<NodeId> {
        self.get(parent).children().iter().copied().find(|c| self.get(*c).kind == kind)
    }

    pub fn find_next_child(&self, parent: NodeId, prev: NodeId, kind: SyntaxKind) -> Option<NodeId> {
        let children = self.get(parent).children();
        let start = children.iter().position(|c| *c == prev).map(|p| p + 1).unwrap_or(0);
        children[start..].iter().copied().find(|c| self.get(*c).kind == kind)
    }

    /// Pre-order search for the first descendant matching `kind` and
    /// `filter`.
    pub fn find_descendent(
        &self,
        root: NodeId,
        kind: SyntaxKind,
        filter: &dyn Fn(&Node) -> bool,
    ) -> Option<NodeId> {
        if self.get(root).kind == kind && filter(self.get(root)) {
            return Some(root);
        }
        for child in self.get(root).children().to_vec() {
            if let Some(found) = self.find_descendent(child, kind, filter) {
                return Some(found);
            }
        }
        None
    }

    // --- locking -------------------------------------------------------------------

    pub fn lock(&mut self, id: NodeId) {
        self.get_mut(id).lock += 1;
    }

    pub fn unlock(&mut self, id: NodeId) {
        let node = self.get_mut(id);
        assert!(node.lock > 0, "{}", crate::diagnostics::InternalError::UnbalancedUnlock);
        node.lock -= 1;
    }

    // --- type coercions ------------------------------------------------

    /// What `to_boolean` *would* produce without mutating — `True`, `False`,
    /// or `Undefined` if the node's kind can't be coerced.
    pub fn to_boolean_type_only(&self, id: NodeId) -> SyntaxKind {
        let node = self.get(id);
        match node.kind {
            SyntaxKind::Null | SyntaxKind::Undefined => SyntaxKind::False,
            SyntaxKind::True | SyntaxKind::False => node.kind,
            SyntaxKind::Integer => {
                if node.get_integer().unwrap().value() == 0 {
                    SyntaxKind::False
                } else {
                    SyntaxKind::True
                }
            }
            SyntaxKind::FloatingPoint => {
                let f = node.get_float().unwrap();
                if f.value() == 0.0 || f.is_nan() {
                    SyntaxKind::False
                } else {
                    SyntaxKind::True
                }
            }
            SyntaxKind::String => {
                if crate::literal::is_truthy_string(node.get_string().unwrap()) {
                    SyntaxKind::True
                } else {
                    SyntaxKind::False
                }
            }
            _ => SyntaxKind::Undefined,
        }
    }

    /// Mutates `id` in place to `True`/`False`/`Undefined` per
    /// [`Self::to_boolean_type_only`].
    pub fn to_boolean(&mut self, id: NodeId) -> bool {
        let target = self.to_boolean_type_only(id);
        let node = self.get_mut(id);
        node.kind = target;
        node.payload = Payload::None;
        target != SyntaxKind::Undefined
    }

    /// Numeric coercion following as2js `node_convert.cpp`'s table:
    /// Integer/FloatingPoint pass through, True/False -> 1/0, Null -> 0,
    /// Undefined -> NaN, String -> integer or float depending on content.
    pub fn to_number(&mut self, id: NodeId) -> bool {
        let kind = self.get(id).kind;
        match kind {
            SyntaxKind::Integer | SyntaxKind::FloatingPoint => true,
            SyntaxKind::True => {
                let node = self.get_mut(id);
                node.kind = SyntaxKind::Integer;
                node.payload = Payload::Integer(Integer::new(1));
                true
            }
            SyntaxKind::False | SyntaxKind::Null => {
                let node = self.get_mut(id);
                node.kind = SyntaxKind::Integer;
                node.payload = Payload::Integer(Integer::new(0));
                true
            }
            SyntaxKind::Undefined => {
                let node = self.get_mut(id);
                node.kind = SyntaxKind::FloatingPoint;
                node.payload = Payload::Float(FloatingPoint::new(f64::NAN));
                true
            }
            SyntaxKind::String => {
                let s = self.get(id).get_string().unwrap().to_string();
                if crate::literal::is_integer_string(&s, true) {
                    let v = crate::literal::string_to_integer(&s);
                    let node = self.get_mut(id);
                    node.kind = SyntaxKind::Integer;
                    node.payload = Payload::Integer(Integer::new(v));
                } else {
                    let v = crate::literal::string_to_floating_point(&s);
                    let node = self.get_mut(id);
                    node.kind = SyntaxKind::FloatingPoint;
                    node.payload = Payload::Float(FloatingPoint::new(v));
                }
                true
            }
            _ => false,
        }
    }

    pub fn to_integer(&mut self, id: NodeId) -> bool {
        if !self.to_number(id) {
            return false;
        }
        if self.get(id).kind == SyntaxKind::FloatingPoint {
            let v = self.get(id).get_float().unwrap().value() as i64;
            let node = self.get_mut(id);
            node.kind = SyntaxKind::Integer;
            node.payload = Payload::Integer(Integer::new(v));
        }
        true
    }

    pub fn to_floating_point(&mut self, id: NodeId) -> bool {
        if !self.to_number(id) {
            return false;
        }
        if self.get(id).kind == SyntaxKind::Integer {
            let v = self.get(id).get_integer().unwrap().value() as f64;
            let node = self.get_mut(id);
            node.kind = SyntaxKind::FloatingPoint;
            node.payload = Payload::Float(FloatingPoint::new(v));
        }
        true
    }

    /// Renders any literal/identifier kind to its display text — also backs
    /// diagnostic rendering.
    pub fn literal_to_display_string(&self, id: NodeId) -> Option<String> {
        let node = self.get(id);
        match node.kind {
            SyntaxKind::Integer => Some(node.get_integer().unwrap().value().to_string()),
            SyntaxKind::FloatingPoint => Some(node.get_float().unwrap().value().to_string()),
            SyntaxKind::String | SyntaxKind::Identifier => Some(node.get_string().unwrap().to_string()),
            SyntaxKind::True => Some("true".to_string()),
            SyntaxKind::False => Some("false".to_string()),
            SyntaxKind::Null => Some("null".to_string()),
            SyntaxKind::Undefined => Some("undefined".to_string()),
            _ => None,
        }
    }

    pub fn to_string_conversion(&mut self, id: NodeId) -> bool {
        match self.literal_to_display_string(id) {
            Some(text) => {
                let node = self.get_mut(id);
                node.kind = SyntaxKind::String;
                node.payload = Payload::String(text);
                true
            }
            None => false,
        }
    }

    pub fn to_identifier(&mut self, id: NodeId) -> bool {
        if self.get(id).kind != SyntaxKind::String {
            return false;
        }
        self.get_mut(id).kind = SyntaxKind::Identifier;
        true
    }

    pub fn to_label(&mut self, id: NodeId) -> bool {
        if self.get(id).kind != SyntaxKind::Identifier {
            return false;
        }
        self.get_mut(id).kind = SyntaxKind::Label;
        true
    }

    /// Three-way compare between two literal nodes. Calling on
    /// a non-literal is an internal error.
    pub fn compare(&self, lhs: NodeId, rhs: NodeId, mode: CompareMode) -> CompareResult2 {
        let l = self.get(lhs);
        let r = self.get(rhs);
        let comparable = |k: SyntaxKind| k.is_literal() || k == SyntaxKind::Identifier;
        assert!(
            comparable(l.kind),
            "{}",
            crate::diagnostics::InternalError::CompareOnNonLiteral { kind: l.kind }
        );
        assert!(
            comparable(r.kind),
            "{}",
            crate::diagnostics::InternalError::CompareOnNonLiteral { kind: r.kind }
        );

        let null_like = |k: SyntaxKind| matches!(k, SyntaxKind::Null | SyntaxKind::Undefined);
        if mode != CompareMode::Strict && null_like(l.kind) && null_like(r.kind) {
            return CompareResult2::Equal;
        }

        match (l.kind, r.kind) {
            (SyntaxKind::Integer, SyntaxKind::Integer) => {
                cmp_to_result2(l.get_integer().unwrap().value().cmp(&r.get_integer().unwrap().value()))
            }
            (SyntaxKind::FloatingPoint, SyntaxKind::FloatingPoint) => {
                let lf = l.get_float().unwrap();
                let rf = r.get_float().unwrap();
                if mode == CompareMode::Smart && lf.nearly_equal(&rf) {
                    CompareResult2::Equal
                } else {
                    match lf.compare(&rf) {
                        CompareResult::Less => CompareResult2::Less,
                        CompareResult::Equal => CompareResult2::Equal,
                        CompareResult::Greater => CompareResult2::Greater,
                        CompareResult::Unordered => CompareResult2::Unordered,
                    }
                }
            }
            (SyntaxKind::String, SyntaxKind::String) => {
                cmp_to_result2(l.get_string().unwrap().cmp(r.get_string().unwrap()))
            }
            (a, b) if a == b => CompareResult2::Equal,
            _ if mode == CompareMode::Strict => CompareResult2::Unordered,
            _ => CompareResult2::Undefined,
        }
    }
}

fn cmp_to_result2(ord: std::cmp::Ordering) -> CompareResult2 {
    match ord {
        std::cmp::Ordering::Less => CompareResult2::Less,
        std::cmp::Ordering::Equal => CompareResult2::Equal,
        std::cmp::Ordering::Greater => CompareResult2::Greater,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    Strict,
    Loose,
    Smart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult2 {
    Equal,
    Less,
    Greater,
    Unordered,
    Undefined,
}

/// Scoped-acquisition lock guard: locks `id` on construction, unlocks on
/// drop (including on panic unwind), mirroring as2js's `node_lock` RAII
/// class.
pub struct NodeLock<'a> {
    arena: &'a mut Arena,
    id: NodeId,
    released: bool,
}

impl<'a> NodeLock<'a> {
    pub fn new(arena: &'a mut Arena, id: NodeId) -> Self {
        arena.lock(id);
        NodeLock { arena, id, released: false }
    }

    /// Unlocks before the guard would otherwise drop.
    pub fn unlock(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.arena.unlock(self.id);
            self.released = true;
        }
    }
}

impl Drop for NodeLock<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Position {
        Position::new("test.js")
    }

    #[test]
    fn append_child_sets_parent_and_offset() {
        let mut arena = Arena::new();
        let parent = arena.create(SyntaxKind::Block, pos());
        let child = arena.create(SyntaxKind::Integer, pos());
        arena.append_child(parent, child);
        assert_eq!(arena.get(child).parent(), Some(parent));
        assert_eq!(arena.get(child).offset(), 0);
        assert_eq!(arena.get(parent).children(), &[child]);
    }

    #[test]
    fn delete_child_removes_and_reindexes() {
        let mut arena = Arena::new();
        let parent = arena.create(SyntaxKind::Block, pos());
        let a = arena.create(SyntaxKind::Integer, pos());
        let b = arena.create(SyntaxKind::Integer, pos());
        arena.append_child(parent, a);
        arena.append_child(parent, b);
        arena.delete_child(parent, 0);
        assert_eq!(arena.get(parent).children(), &[b]);
        assert_eq!(arena.get(b).offset(), 0);
    }

    #[test]
    fn locked_node_rejects_flag_mutation() {
        let mut arena = Arena::new();
        let sink = DiagnosticSink::new();
        let catch = arena.create(SyntaxKind::Catch, pos());
        arena.lock(catch);
        let before = arena.get(catch).flags();
        arena.set_flag(catch, NodeFlags::CATCH_TYPED, true, &sink);
        assert_eq!(arena.get(catch).flags(), before);
        assert!(sink.error_count() >= 1);
    }

    #[test]
    fn node_lock_guard_unlocks_on_drop() {
        let mut arena = Arena::new();
        let n = arena.create(SyntaxKind::Block, pos());
        {
            let _guard = NodeLock::new(&mut arena, n);
            assert!(arena.get(n).is_locked());
        }
        assert!(!arena.get(n).is_locked());
    }

    #[test]
    fn conflicting_attribute_is_rejected_not_unset() {
        let mut arena = Arena::new();
        let sink = DiagnosticSink::new();
        let func = arena.create(SyntaxKind::Function, pos());
        arena.set_attribute(func, Attribute::Public, true, &sink);
        arena.set_attribute(func, Attribute::Private, true, &sink);
        assert_eq!(arena.get(func).get_attribute(Group::MemberVisibility), Some(Attribute::Public));
        assert!(sink.error_count() >= 1);
    }

    #[test]
    fn native_and_constructor_are_compatible_function_type_attributes() {
        let mut arena = Arena::new();
        let sink = DiagnosticSink::new();
        let func = arena.create(SyntaxKind::Function, pos());
        arena.set_attribute(func, Attribute::Native, true, &sink);
        arena.set_attribute(func, Attribute::Constructor, true, &sink);
        assert_eq!(arena.get(func).get_attribute(Group::FunctionType), Some(Attribute::Constructor));
    }

    #[test]
    fn to_boolean_type_only_matches_to_boolean_kind() {
        let mut arena = Arena::new();
        let n = arena.create(SyntaxKind::Integer, pos());
        arena.set_integer(n, Integer::new(0));
        let predicted = arena.to_boolean_type_only(n);
        let basic = arena.clone_basic_node(n);
        arena.to_boolean(basic);
        assert_eq!(predicted, arena.get(basic).kind());
    }

    #[test]
    fn acyclicity_is_enforced() {
        let mut arena = Arena::new();
        let a = arena.create(SyntaxKind::Block, pos());
        let b = arena.create(SyntaxKind::Block, pos());
        arena.append_child(a, b);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            arena.set_parent(a, Some(b), 0);
        }));
        assert!(result.is_err());
    }

    #[test]
    fn compare_strict_rejects_cross_kind() {
        let mut arena = Arena::new();
        let i = arena.create(SyntaxKind::Integer, pos());
        arena.set_integer(i, Integer::new(1));
        let s = arena.create(SyntaxKind::String, pos());
        arena.set_string(s, "1");
        assert_eq!(arena.compare(i, s, CompareMode::Strict), CompareResult2::Unordered);
    }
}
