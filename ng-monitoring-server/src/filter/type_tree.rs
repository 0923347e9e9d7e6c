use opcua::types::{NodeId, ObjectTypeId};
use std::collections::HashMap;

/// Supertype lookup for event types.
pub trait TypeHierarchy: Send + Sync {
    /// Whether `type_id` names a type this hierarchy knows about.
    fn is_known(&self, type_id: &NodeId) -> bool;

    fn supertype(&self, type_id: &NodeId) -> Option<NodeId>;

    /// `type_id` equals `ancestor` or derives from it transitively.
    fn is_subtype_of(&self, type_id: &NodeId, ancestor: &NodeId) -> bool {
        let mut current = type_id.clone();
        // bounded walk, a malformed tree must not hang the evaluator
        for _ in 0..64 {
            if &current == ancestor {
                return true;
            }
            match self.supertype(&current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }
}

impl std::fmt::Debug for dyn TypeHierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TypeHierarchy")
    }
}

/// Event type tree rooted at BaseEventType.
#[derive(Debug, Clone)]
pub struct EventTypeTree {
    parents: HashMap<NodeId, NodeId>,
}

impl EventTypeTree {
    /// Tree with the standard event types of namespace 0.
    pub fn standard() -> Self {
        let mut tree = Self {
            parents: HashMap::new(),
        };
        let base: NodeId = ObjectTypeId::BaseEventType.into();
        for id in [
            ObjectTypeId::AuditEventType,
            ObjectTypeId::SystemEventType,
            ObjectTypeId::BaseModelChangeEventType,
            ObjectTypeId::SemanticChangeEventType,
            ObjectTypeId::ConditionType,
            ObjectTypeId::EventQueueOverflowEventType,
            ObjectTypeId::ProgressEventType,
        ] {
            tree.register(id.into(), base.clone());
        }
        tree.register(
            ObjectTypeId::AcknowledgeableConditionType.into(),
            ObjectTypeId::ConditionType.into(),
        );
        tree.register(
            ObjectTypeId::AlarmConditionType.into(),
            ObjectTypeId::AcknowledgeableConditionType.into(),
        );
        tree
    }

    /// Adds (or re-parents) `type_id` under `supertype`.
    pub fn register(&mut self, type_id: NodeId, supertype: NodeId) -> &mut Self {
        self.parents.insert(type_id, supertype);
        self
    }
}

impl Default for EventTypeTree {
    fn default() -> Self {
        Self::standard()
    }
}

impl TypeHierarchy for EventTypeTree {
    fn is_known(&self, type_id: &NodeId) -> bool {
        *type_id == NodeId::from(ObjectTypeId::BaseEventType) || self.parents.contains_key(type_id)
    }

    fn supertype(&self, type_id: &NodeId) -> Option<NodeId> {
        self.parents.get(type_id).cloned()
    }
}
