use opcua::types::{
    AttributeId, ByteString, DateTime, LocalizedText, NodeId, ObjectId, ObjectTypeId,
    QualifiedName, Variant,
};
use std::collections::HashMap;
use uuid::Uuid;

/// An event occurrence as seen by event filters.
pub trait EventSource: Send + Sync {
    fn event_type(&self) -> &NodeId;

    /// Reads `attribute` of the field at `browse_path` relative to the event.
    fn read(&self, browse_path: &[QualifiedName], attribute: AttributeId) -> Option<Variant>;
}

/// Browse path reduced to `(namespace, name)` pairs.
type FieldKey = Vec<(u16, String)>;

fn field_key(path: &[QualifiedName]) -> FieldKey {
    path.iter()
        .map(|q| (q.namespace_index, q.name.as_ref().to_string()))
        .collect()
}

/// Event with fields keyed by browse path.
#[derive(Debug, Clone)]
pub struct BaseEvent {
    node_id: NodeId,
    event_type: NodeId,
    fields: HashMap<FieldKey, Variant>,
}

impl BaseEvent {
    /// New event of `event_type` with a fresh EventId and Time/ReceiveTime
    /// set to now.
    pub fn new(event_type: NodeId) -> Self {
        let now = DateTime::now();
        let event_id = Uuid::new_v4();
        let mut event = Self {
            node_id: NodeId::new(1, event_id.to_string()),
            event_type: event_type.clone(),
            fields: HashMap::new(),
        };
        event
            .set(
                "EventId",
                Variant::ByteString(ByteString::from(event_id.as_bytes().to_vec())),
            )
            .set("EventType", Variant::NodeId(Box::new(event_type)))
            .set("Time", Variant::DateTime(Box::new(now)))
            .set("ReceiveTime", Variant::DateTime(Box::new(now)))
            .set("Severity", 0u16);
        event
    }

    /// Synthetic notification placed in an event queue that overflowed.
    pub fn queue_overflow() -> Self {
        let mut event = Self::new(ObjectTypeId::EventQueueOverflowEventType.into());
        event
            .set(
                "SourceNode",
                Variant::NodeId(Box::new(ObjectId::Server.into())),
            )
            .set("SourceName", "Internal/EventQueueOverflow")
            .set(
                "Message",
                Variant::LocalizedText(Box::new(LocalizedText::new("", "Event queue overflow"))),
            );
        event
    }

    /// Sets the field at a `/`-separated browse path in namespace 0.
    pub fn set(&mut self, path: &str, value: impl Into<Variant>) -> &mut Self {
        let key = path.split('/').map(|name| (0, name.to_string())).collect();
        self.fields.insert(key, value.into());
        self
    }

    pub fn with(mut self, path: &str, value: impl Into<Variant>) -> Self {
        self.set(path, value);
        self
    }

    pub fn field(&self, path: &str) -> Option<&Variant> {
        let key: FieldKey = path.split('/').map(|name| (0, name.to_string())).collect();
        self.fields.get(&key)
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }
}

impl EventSource for BaseEvent {
    fn event_type(&self) -> &NodeId {
        &self.event_type
    }

    fn read(&self, browse_path: &[QualifiedName], attribute: AttributeId) -> Option<Variant> {
        match attribute {
            AttributeId::Value => self.fields.get(&field_key(browse_path)).cloned(),
            AttributeId::NodeId if browse_path.is_empty() => {
                Some(Variant::NodeId(Box::new(self.node_id.clone())))
            }
            _ => None,
        }
    }
}
