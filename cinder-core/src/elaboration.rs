#![forbid(unsafe_code)]

use std::collections::HashMap;

use cinder_ast::{CastKind, NodeId};

use crate::types::Type;

/// Static types attached to one cast expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CastRecord {
    pub source: Type,
    pub target: Type,
    pub kind: CastKind,
}

/// Result of checking a program, keyed by expression node.
///
/// Each node is written at most once.
#[derive(Clone, Debug, Default)]
pub struct Elaboration {
    expression_types: HashMap<NodeId, Type>,
    casts: HashMap<NodeId, CastRecord>,
    reference_types: HashMap<NodeId, Type>,
}

impl Elaboration {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_expression_type(&mut self, id: NodeId, ty: Type) {
        let previous = self.expression_types.insert(id, ty);
        debug_assert!(previous.is_none(), "expression {id} typed twice");
    }

    pub(crate) fn record_cast(&mut self, id: NodeId, record: CastRecord) {
        let previous = self.casts.insert(id, record);
        debug_assert!(previous.is_none(), "cast {id} recorded twice");
    }

    pub(crate) fn record_reference(&mut self, id: NodeId, ty: Type) {
        let previous = self.reference_types.insert(id, ty);
        debug_assert!(previous.is_none(), "reference {id} recorded twice");
    }

    pub fn expression_type(&self, id: NodeId) -> Option<&Type> {
        self.expression_types.get(&id)
    }

    pub fn cast(&self, id: NodeId) -> Option<&CastRecord> {
        self.casts.get(&id)
    }

    pub fn reference_type(&self, id: NodeId) -> Option<&Type> {
        self.reference_types.get(&id)
    }

    /// Every cast, ordered by node id.
    pub fn casts(&self) -> Vec<(NodeId, &CastRecord)> {
        let mut casts: Vec<_> = self.casts.iter().map(|(id, r)| (*id, r)).collect();
        casts.sort_by_key(|(id, _)| *id);
        casts
    }

    pub fn expression_count(&self) -> usize {
        self.expression_types.len()
    }
}
