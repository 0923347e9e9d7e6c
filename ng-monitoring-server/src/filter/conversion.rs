//! Built-in type conversions used by the content filter operators.
//!
//! Implicit conversions are applied when two operands of different types are
//! compared: the lower-precedence operand is converted to the type of the
//! higher-precedence one. Explicit conversions additionally cover the
//! text/parse and narrowing-to-boolean rules used by `Cast`.

use chrono::Utc;
use ng_monitoring_types::{BuiltinType, VariantExt};
use opcua::types::{
    Array, ByteString, DateTime, ExpandedNodeId, Guid, LocalizedText, NodeId, QualifiedName,
    StatusCode, UAString, Variant,
};
use std::cmp::Ordering;
use uuid::Uuid;

/// Highest precedence first.
const PRECEDENCE: [BuiltinType; 18] = [
    BuiltinType::Double,
    BuiltinType::Float,
    BuiltinType::Int64,
    BuiltinType::UInt64,
    BuiltinType::Int32,
    BuiltinType::UInt32,
    BuiltinType::StatusCode,
    BuiltinType::Int16,
    BuiltinType::UInt16,
    BuiltinType::SByte,
    BuiltinType::Byte,
    BuiltinType::Boolean,
    BuiltinType::Guid,
    BuiltinType::String,
    BuiltinType::ExpandedNodeId,
    BuiltinType::NodeId,
    BuiltinType::LocalizedText,
    BuiltinType::QualifiedName,
];

/// Rank of `t` in the implicit conversion order, 0 being the highest.
pub fn precedence(t: BuiltinType) -> Option<usize> {
    PRECEDENCE.iter().position(|p| *p == t)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Implicit,
    Explicit,
}

/// Converts both operands to the type of the higher-precedence operand.
///
/// Returns `None` when either operand is null, either type has no
/// precedence, or the conversion fails.
pub fn coerce_pair(a: &Variant, b: &Variant) -> Option<(Variant, Variant)> {
    let (ta, tb) = (a.builtin_type()?, b.builtin_type()?);
    if ta == tb {
        return Some((a.clone(), b.clone()));
    }
    let (pa, pb) = (precedence(ta)?, precedence(tb)?);
    if pa < pb {
        Some((a.clone(), implicit_convert(b, ta)?))
    } else {
        Some((implicit_convert(a, tb)?, b.clone()))
    }
}

pub fn implicit_convert(v: &Variant, target: BuiltinType) -> Option<Variant> {
    convert(v, target, Mode::Implicit)
}

pub fn explicit_convert(v: &Variant, target: BuiltinType) -> Option<Variant> {
    convert(v, target, Mode::Explicit)
}

fn convert(v: &Variant, target: BuiltinType, mode: Mode) -> Option<Variant> {
    match v {
        Variant::Empty => None,
        Variant::Array(array) => {
            let values = array
                .values
                .iter()
                .map(|e| convert(e, target, mode))
                .collect::<Option<Vec<_>>>()?;
            Some(Variant::Array(Box::new(Array {
                value_type: target.scalar_type_id(),
                values,
                dimensions: array.dimensions.clone(),
            })))
        }
        _ if v.builtin_type() == Some(target) => Some(v.clone()),
        _ => convert_scalar(v, target, mode),
    }
}

fn convert_scalar(v: &Variant, target: BuiltinType, mode: Mode) -> Option<Variant> {
    let explicit = mode == Mode::Explicit;

    if target.is_numeric() {
        let n = match v {
            Variant::Boolean(b) => Num::Int(*b as i128),
            Variant::StatusCode(s) => Num::Int(s.bits() as i128),
            Variant::String(s) if explicit => parse_num(s.as_ref(), target)?,
            other => Num::of(other)?,
        };
        return n.into_variant(target);
    }

    match (v, target) {
        (Variant::String(s), BuiltinType::Boolean) if explicit => {
            match s.as_ref().trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Variant::Boolean(true)),
                "false" | "0" => Some(Variant::Boolean(false)),
                _ => None,
            }
        }
        (other, BuiltinType::Boolean) if explicit => {
            Num::of(other).map(|n| Variant::Boolean(!n.is_zero()))
        }
        (other, BuiltinType::StatusCode) => match Num::of(other)? {
            Num::Int(i) if matches!(other, Variant::UInt32(_)) || explicit => u32::try_from(i)
                .ok()
                .map(|c| Variant::StatusCode(StatusCode::from(c))),
            _ => None,
        },
        (Variant::String(s), BuiltinType::LocalizedText) => Some(localized(s.as_ref())),
        (Variant::QualifiedName(q), BuiltinType::LocalizedText) => Some(localized(q.name.as_ref())),
        (Variant::LocalizedText(t), BuiltinType::String) => Some(Variant::String(t.text.clone())),
        (Variant::QualifiedName(q), BuiltinType::String) => {
            Some(Variant::String(UAString::from(qualified_text(q))))
        }
        (Variant::NodeId(n), BuiltinType::ExpandedNodeId) => Some(Variant::ExpandedNodeId(
            Box::new(ExpandedNodeId::from((**n).clone())),
        )),
        _ if explicit => convert_explicit_only(v, target),
        _ => None,
    }
}

fn convert_explicit_only(v: &Variant, target: BuiltinType) -> Option<Variant> {
    match (v, target) {
        (Variant::String(s), BuiltinType::Guid) => s
            .as_ref()
            .trim()
            .parse::<Guid>()
            .ok()
            .map(|g| Variant::Guid(Box::new(g))),
        (Variant::String(s), BuiltinType::NodeId) => s
            .as_ref()
            .trim()
            .parse::<NodeId>()
            .ok()
            .map(|n| Variant::NodeId(Box::new(n))),
        (Variant::String(s), BuiltinType::ExpandedNodeId) => s
            .as_ref()
            .trim()
            .parse::<NodeId>()
            .ok()
            .map(|n| Variant::ExpandedNodeId(Box::new(ExpandedNodeId::from(n)))),
        (Variant::String(s), BuiltinType::DateTime) => {
            chrono::DateTime::parse_from_rfc3339(s.as_ref().trim())
                .ok()
                .map(|d| Variant::DateTime(Box::new(DateTime::from(d.with_timezone(&Utc)))))
        }
        (Variant::String(s), BuiltinType::QualifiedName) => Some(Variant::QualifiedName(
            Box::new(parse_qualified_name(s.as_ref())),
        )),
        (Variant::ByteString(b), BuiltinType::Guid) => Uuid::from_slice(b.as_ref())
            .ok()
            .and_then(|u| u.to_string().parse::<Guid>().ok())
            .map(|g| Variant::Guid(Box::new(g))),
        (Variant::Guid(g), BuiltinType::ByteString) => Uuid::parse_str(&g.to_string())
            .ok()
            .map(|u| Variant::ByteString(ByteString::from(u.as_bytes().to_vec()))),
        (Variant::ExpandedNodeId(e), BuiltinType::NodeId) => {
            local_node(e).map(|n| Variant::NodeId(Box::new(n)))
        }
        (other, BuiltinType::String) => to_text(other).map(|s| Variant::String(UAString::from(s))),
        _ => None,
    }
}

/// Node id of an expanded node id that points into the local server.
pub fn local_node(e: &ExpandedNodeId) -> Option<NodeId> {
    (e.server_index == 0 && e.namespace_uri.is_null()).then(|| e.node_id.clone())
}

fn localized(text: &str) -> Variant {
    Variant::LocalizedText(Box::new(LocalizedText::new("", text)))
}

fn qualified_text(q: &QualifiedName) -> String {
    if q.namespace_index == 0 {
        q.name.as_ref().to_string()
    } else {
        format!("{}:{}", q.namespace_index, q.name.as_ref())
    }
}

fn to_text(v: &Variant) -> Option<String> {
    Some(match v {
        Variant::Boolean(b) => b.to_string(),
        Variant::SByte(x) => x.to_string(),
        Variant::Byte(x) => x.to_string(),
        Variant::Int16(x) => x.to_string(),
        Variant::UInt16(x) => x.to_string(),
        Variant::Int32(x) => x.to_string(),
        Variant::UInt32(x) => x.to_string(),
        Variant::Int64(x) => x.to_string(),
        Variant::UInt64(x) => x.to_string(),
        Variant::Float(x) => x.to_string(),
        Variant::Double(x) => x.to_string(),
        Variant::DateTime(d) => d.as_chrono().to_rfc3339(),
        Variant::Guid(g) => g.to_string(),
        Variant::NodeId(n) => n.to_string(),
        Variant::ExpandedNodeId(e) => local_node(e)?.to_string(),
        Variant::StatusCode(s) => s.to_string(),
        _ => return None,
    })
}

fn parse_num(s: &str, target: BuiltinType) -> Option<Num> {
    let s = s.trim();
    match target {
        BuiltinType::Float | BuiltinType::Double => s.parse::<f64>().ok().map(Num::Float),
        _ => s.parse::<i128>().ok().map(Num::Int),
    }
}

/// Numeric value widened for conversion and comparison.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Num {
    Int(i128),
    Float(f64),
}

impl Num {
    fn of(v: &Variant) -> Option<Num> {
        Some(match v {
            Variant::SByte(x) => Num::Int(*x as i128),
            Variant::Byte(x) => Num::Int(*x as i128),
            Variant::Int16(x) => Num::Int(*x as i128),
            Variant::UInt16(x) => Num::Int(*x as i128),
            Variant::Int32(x) => Num::Int(*x as i128),
            Variant::UInt32(x) => Num::Int(*x as i128),
            Variant::Int64(x) => Num::Int(*x as i128),
            Variant::UInt64(x) => Num::Int(*x as i128),
            Variant::Float(x) => Num::Float(*x as f64),
            Variant::Double(x) => Num::Float(*x),
            _ => return None,
        })
    }

    fn is_zero(self) -> bool {
        match self {
            Num::Int(i) => i == 0,
            Num::Float(f) => f == 0.0,
        }
    }

    /// Integer view, rounding floats half away from zero.
    fn to_int(self) -> Option<i128> {
        match self {
            Num::Int(i) => Some(i),
            Num::Float(f) if f.is_finite() => {
                let r = f.round();
                (r >= i64::MIN as f64 && r <= u64::MAX as f64).then_some(r as i128)
            }
            Num::Float(_) => None,
        }
    }

    fn into_variant(self, target: BuiltinType) -> Option<Variant> {
        macro_rules! int {
            ($ty:ty, $variant:ident) => {
                self.to_int()
                    .and_then(|i| <$ty>::try_from(i).ok())
                    .map(Variant::$variant)
            };
        }
        match target {
            BuiltinType::SByte => int!(i8, SByte),
            BuiltinType::Byte => int!(u8, Byte),
            BuiltinType::Int16 => int!(i16, Int16),
            BuiltinType::UInt16 => int!(u16, UInt16),
            BuiltinType::Int32 => int!(i32, Int32),
            BuiltinType::UInt32 => int!(u32, UInt32),
            BuiltinType::Int64 => int!(i64, Int64),
            BuiltinType::UInt64 => int!(u64, UInt64),
            BuiltinType::Double => Some(Variant::Double(match self {
                Num::Int(i) => i as f64,
                Num::Float(f) => f,
            })),
            BuiltinType::Float => match self {
                Num::Int(i) => Some(Variant::Float(i as f32)),
                Num::Float(f) if f.is_finite() && f.abs() > f32::MAX as f64 => None,
                Num::Float(f) => Some(Variant::Float(f as f32)),
            },
            _ => None,
        }
    }
}

/// Ordering of two same-typed numeric operands. Non-numeric values have no
/// ordering.
pub fn compare_numeric(a: &Variant, b: &Variant) -> Option<Ordering> {
    match (Num::of(a)?, Num::of(b)?) {
        (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
        (Num::Float(x), Num::Float(y)) => x.partial_cmp(&y),
        (Num::Int(x), Num::Float(y)) => (x as f64).partial_cmp(&y),
        (Num::Float(x), Num::Int(y)) => x.partial_cmp(&(y as f64)),
    }
}

/// Integer payload of an integer-typed operand, for bitwise operators.
pub fn integer_bits(v: &Variant) -> Option<i128> {
    match Num::of(v)? {
        Num::Int(i) => Some(i),
        Num::Float(_) => None,
    }
}

/// Rebuilds an integer of type `t` from the result of a bitwise operation.
pub fn integer_of_type(bits: i128, t: BuiltinType) -> Option<Variant> {
    Num::Int(bits).into_variant(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_to_higher_precedence() {
        let (a, b) = coerce_pair(&Variant::Int32(5), &Variant::UInt64(3)).unwrap();
        assert_eq!(a, Variant::UInt64(5));
        assert_eq!(b, Variant::UInt64(3));

        let (a, b) = coerce_pair(&Variant::Byte(2), &Variant::Double(2.5)).unwrap();
        assert_eq!(a, Variant::Double(2.0));
        assert_eq!(b, Variant::Double(2.5));
    }

    #[test]
    fn out_of_range_coercion_fails() {
        assert!(coerce_pair(&Variant::Int32(-1), &Variant::UInt64(3)).is_none());
        assert!(implicit_convert(&Variant::Int32(300), BuiltinType::Byte).is_none());
    }

    #[test]
    fn null_never_coerces() {
        assert!(coerce_pair(&Variant::Empty, &Variant::Int32(1)).is_none());
    }

    #[test]
    fn floats_round_half_away_from_zero() {
        assert_eq!(
            explicit_convert(&Variant::Double(2.5), BuiltinType::Int32),
            Some(Variant::Int32(3))
        );
        assert_eq!(
            explicit_convert(&Variant::Double(-2.5), BuiltinType::Int32),
            Some(Variant::Int32(-3))
        );
        assert!(explicit_convert(&Variant::Double(f64::NAN), BuiltinType::Int32).is_none());
    }

    #[test]
    fn text_conversions_are_explicit_only() {
        assert!(implicit_convert(&Variant::from("42"), BuiltinType::Int32).is_none());
        assert_eq!(
            explicit_convert(&Variant::from(" 42 "), BuiltinType::Int32),
            Some(Variant::Int32(42))
        );
        assert_eq!(
            explicit_convert(&Variant::Int32(7), BuiltinType::String),
            Some(Variant::from("7"))
        );
        assert_eq!(
            explicit_convert(&Variant::from("TRUE"), BuiltinType::Boolean),
            Some(Variant::Boolean(true))
        );
        assert_eq!(
            explicit_convert(&Variant::from("ns=2;i=5"), BuiltinType::NodeId),
            Some(Variant::NodeId(Box::new(NodeId::new(2, 5u32))))
        );
    }

    #[test]
    fn arrays_convert_element_wise_keeping_dimensions() {
        let v = Variant::Array(Box::new(Array {
            value_type: BuiltinType::Int16.scalar_type_id(),
            values: vec![Variant::Int16(1), Variant::Int16(2)],
            dimensions: Some(vec![2]),
        }));
        let Some(Variant::Array(out)) = implicit_convert(&v, BuiltinType::Double) else {
            panic!("expected array");
        };
        assert_eq!(out.value_type, BuiltinType::Double.scalar_type_id());
        assert_eq!(out.values, vec![Variant::Double(1.0), Variant::Double(2.0)]);
        assert_eq!(out.dimensions, Some(vec![2]));
    }

    #[test]
    fn qualified_names_and_status_codes_convert() {
        let q = Variant::QualifiedName(Box::new(QualifiedName::new(2, "Temp")));
        assert_eq!(
            implicit_convert(&q, BuiltinType::String),
            Some(Variant::from("2:Temp"))
        );
        assert_eq!(
            explicit_convert(&Variant::UInt32(0x8034_0000), BuiltinType::StatusCode),
            Some(Variant::StatusCode(StatusCode::BadNodeIdUnknown))
        );
        assert!(implicit_convert(&Variant::Int32(1), BuiltinType::StatusCode).is_none());
    }

    #[test]
    fn unsigned_64_bit_ordering_is_unsigned() {
        assert_eq!(
            compare_numeric(&Variant::UInt64(u64::MAX), &Variant::UInt64(1)),
            Some(Ordering::Greater)
        );
        assert_eq!(compare_numeric(&Variant::from("a"), &Variant::from("b")), None);
    }
}
