use opcua::types::{Identifier, NodeId, Variant, VariantScalarTypeId};

/// OPC UA built-in data types, numbered as on the wire.
///
/// The content filter ranks operands by these types when it applies
/// implicit conversions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum BuiltinType {
    Boolean = 1,
    SByte = 2,
    Byte = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    String = 12,
    DateTime = 13,
    Guid = 14,
    ByteString = 15,
    XmlElement = 16,
    NodeId = 17,
    ExpandedNodeId = 18,
    StatusCode = 19,
    QualifiedName = 20,
    LocalizedText = 21,
    ExtensionObject = 22,
    DataValue = 23,
    Variant = 24,
    DiagnosticInfo = 25,
}

impl BuiltinType {
    const ALL: [BuiltinType; 25] = [
        BuiltinType::Boolean,
        BuiltinType::SByte,
        BuiltinType::Byte,
        BuiltinType::Int16,
        BuiltinType::UInt16,
        BuiltinType::Int32,
        BuiltinType::UInt32,
        BuiltinType::Int64,
        BuiltinType::UInt64,
        BuiltinType::Float,
        BuiltinType::Double,
        BuiltinType::String,
        BuiltinType::DateTime,
        BuiltinType::Guid,
        BuiltinType::ByteString,
        BuiltinType::XmlElement,
        BuiltinType::NodeId,
        BuiltinType::ExpandedNodeId,
        BuiltinType::StatusCode,
        BuiltinType::QualifiedName,
        BuiltinType::LocalizedText,
        BuiltinType::ExtensionObject,
        BuiltinType::DataValue,
        BuiltinType::Variant,
        BuiltinType::DiagnosticInfo,
    ];

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.get((id as usize).checked_sub(1)?).copied()
    }

    /// Resolves a DataType node id in namespace 0 to its built-in type.
    pub fn from_data_type(node_id: &NodeId) -> Option<Self> {
        match (&node_id.identifier, node_id.namespace) {
            (Identifier::Numeric(id), 0) => Self::from_id(*id),
            _ => None,
        }
    }

    /// DataType node of this built-in type.
    pub fn node_id(self) -> NodeId {
        NodeId::new(0, self as u32)
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            BuiltinType::SByte
                | BuiltinType::Byte
                | BuiltinType::Int16
                | BuiltinType::UInt16
                | BuiltinType::Int32
                | BuiltinType::UInt32
                | BuiltinType::Int64
                | BuiltinType::UInt64
                | BuiltinType::Float
                | BuiltinType::Double
        )
    }

    /// Element type tag for arrays of this type.
    pub fn scalar_type_id(self) -> VariantScalarTypeId {
        match self {
            BuiltinType::Boolean => VariantScalarTypeId::Boolean,
            BuiltinType::SByte => VariantScalarTypeId::SByte,
            BuiltinType::Byte => VariantScalarTypeId::Byte,
            BuiltinType::Int16 => VariantScalarTypeId::Int16,
            BuiltinType::UInt16 => VariantScalarTypeId::UInt16,
            BuiltinType::Int32 => VariantScalarTypeId::Int32,
            BuiltinType::UInt32 => VariantScalarTypeId::UInt32,
            BuiltinType::Int64 => VariantScalarTypeId::Int64,
            BuiltinType::UInt64 => VariantScalarTypeId::UInt64,
            BuiltinType::Float => VariantScalarTypeId::Float,
            BuiltinType::Double => VariantScalarTypeId::Double,
            BuiltinType::String => VariantScalarTypeId::String,
            BuiltinType::DateTime => VariantScalarTypeId::DateTime,
            BuiltinType::Guid => VariantScalarTypeId::Guid,
            BuiltinType::ByteString => VariantScalarTypeId::ByteString,
            BuiltinType::XmlElement => VariantScalarTypeId::XmlElement,
            BuiltinType::NodeId => VariantScalarTypeId::NodeId,
            BuiltinType::ExpandedNodeId => VariantScalarTypeId::ExpandedNodeId,
            BuiltinType::StatusCode => VariantScalarTypeId::StatusCode,
            BuiltinType::QualifiedName => VariantScalarTypeId::QualifiedName,
            BuiltinType::LocalizedText => VariantScalarTypeId::LocalizedText,
            BuiltinType::ExtensionObject => VariantScalarTypeId::ExtensionObject,
            BuiltinType::DataValue => VariantScalarTypeId::DataValue,
            BuiltinType::Variant => VariantScalarTypeId::Variant,
            BuiltinType::DiagnosticInfo => VariantScalarTypeId::DiagnosticInfo,
        }
    }
}

/// Type inspection the filter evaluator and deadband checks need.
pub trait VariantExt {
    /// Built-in type of a scalar, or of the first element of an array.
    /// `None` for the null variant, empty arrays and structured payloads.
    fn builtin_type(&self) -> Option<BuiltinType>;

    fn is_null_value(&self) -> bool;

    fn boolean(&self) -> Option<bool>;

    /// Numeric scalar widened to `f64`, used for deadband arithmetic.
    fn numeric(&self) -> Option<f64>;
}

impl VariantExt for Variant {
    fn builtin_type(&self) -> Option<BuiltinType> {
        Some(match self {
            Variant::Empty => return None,
            Variant::Boolean(_) => BuiltinType::Boolean,
            Variant::SByte(_) => BuiltinType::SByte,
            Variant::Byte(_) => BuiltinType::Byte,
            Variant::Int16(_) => BuiltinType::Int16,
            Variant::UInt16(_) => BuiltinType::UInt16,
            Variant::Int32(_) => BuiltinType::Int32,
            Variant::UInt32(_) => BuiltinType::UInt32,
            Variant::Int64(_) => BuiltinType::Int64,
            Variant::UInt64(_) => BuiltinType::UInt64,
            Variant::Float(_) => BuiltinType::Float,
            Variant::Double(_) => BuiltinType::Double,
            Variant::String(_) => BuiltinType::String,
            Variant::DateTime(_) => BuiltinType::DateTime,
            Variant::Guid(_) => BuiltinType::Guid,
            Variant::ByteString(_) => BuiltinType::ByteString,
            Variant::NodeId(_) => BuiltinType::NodeId,
            Variant::ExpandedNodeId(_) => BuiltinType::ExpandedNodeId,
            Variant::StatusCode(_) => BuiltinType::StatusCode,
            Variant::QualifiedName(_) => BuiltinType::QualifiedName,
            Variant::LocalizedText(_) => BuiltinType::LocalizedText,
            Variant::Array(array) => return array.values.first()?.builtin_type(),
            // structured payloads take no part in filter comparisons
            _ => return None,
        })
    }

    fn is_null_value(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    fn boolean(&self) -> Option<bool> {
        match self {
            Variant::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    fn numeric(&self) -> Option<f64> {
        Some(match self {
            Variant::SByte(v) => *v as f64,
            Variant::Byte(v) => *v as f64,
            Variant::Int16(v) => *v as f64,
            Variant::UInt16(v) => *v as f64,
            Variant::Int32(v) => *v as f64,
            Variant::UInt32(v) => *v as f64,
            Variant::Int64(v) => *v as f64,
            Variant::UInt64(v) => *v as f64,
            Variant::Float(v) => *v as f64,
            Variant::Double(v) => *v,
            _ => return None,
        })
    }
}
