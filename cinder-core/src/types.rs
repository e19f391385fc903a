#![forbid(unsafe_code)]

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use cinder_ast::CompositeKind;
use indexmap::IndexMap;
use num_bigint::{BigInt, BigUint, Sign};

use crate::location::{Location, TypeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Int256,
    UInt,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    UInt256,
    Word8,
    Word16,
    Word32,
    Word64,
    Fix64,
    UFix64,

    Number,
    SignedNumber,
    Integer,
    SignedInteger,
    FixedPoint,
    SignedFixedPoint,

    Bool,
    String,
    Character,
    Address,
    Void,
}

/// Width of a fixed-size integer type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntegerWidth {
    pub signed: bool,
    pub bits: u32,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 31] = [
        PrimitiveType::Int,
        PrimitiveType::Int8,
        PrimitiveType::Int16,
        PrimitiveType::Int32,
        PrimitiveType::Int64,
        PrimitiveType::Int128,
        PrimitiveType::Int256,
        PrimitiveType::UInt,
        PrimitiveType::UInt8,
        PrimitiveType::UInt16,
        PrimitiveType::UInt32,
        PrimitiveType::UInt64,
        PrimitiveType::UInt128,
        PrimitiveType::UInt256,
        PrimitiveType::Word8,
        PrimitiveType::Word16,
        PrimitiveType::Word32,
        PrimitiveType::Word64,
        PrimitiveType::Fix64,
        PrimitiveType::UFix64,
        PrimitiveType::Number,
        PrimitiveType::SignedNumber,
        PrimitiveType::Integer,
        PrimitiveType::SignedInteger,
        PrimitiveType::FixedPoint,
        PrimitiveType::SignedFixedPoint,
        PrimitiveType::Bool,
        PrimitiveType::String,
        PrimitiveType::Character,
        PrimitiveType::Address,
        PrimitiveType::Void,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Int => "Int",
            PrimitiveType::Int8 => "Int8",
            PrimitiveType::Int16 => "Int16",
            PrimitiveType::Int32 => "Int32",
            PrimitiveType::Int64 => "Int64",
            PrimitiveType::Int128 => "Int128",
            PrimitiveType::Int256 => "Int256",
            PrimitiveType::UInt => "UInt",
            PrimitiveType::UInt8 => "UInt8",
            PrimitiveType::UInt16 => "UInt16",
            PrimitiveType::UInt32 => "UInt32",
            PrimitiveType::UInt64 => "UInt64",
            PrimitiveType::UInt128 => "UInt128",
            PrimitiveType::UInt256 => "UInt256",
            PrimitiveType::Word8 => "Word8",
            PrimitiveType::Word16 => "Word16",
            PrimitiveType::Word32 => "Word32",
            PrimitiveType::Word64 => "Word64",
            PrimitiveType::Fix64 => "Fix64",
            PrimitiveType::UFix64 => "UFix64",
            PrimitiveType::Number => "Number",
            PrimitiveType::SignedNumber => "SignedNumber",
            PrimitiveType::Integer => "Integer",
            PrimitiveType::SignedInteger => "SignedInteger",
            PrimitiveType::FixedPoint => "FixedPoint",
            PrimitiveType::SignedFixedPoint => "SignedFixedPoint",
            PrimitiveType::Bool => "Bool",
            PrimitiveType::String => "String",
            PrimitiveType::Character => "Character",
            PrimitiveType::Address => "Address",
            PrimitiveType::Void => "Void",
        }
    }

    /// Fixed width, or `None` for the arbitrary-precision and abstract integer types.
    pub fn integer_width(self) -> Option<IntegerWidth> {
        let (signed, bits) = match self {
            PrimitiveType::Int8 => (true, 8),
            PrimitiveType::Int16 => (true, 16),
            PrimitiveType::Int32 => (true, 32),
            PrimitiveType::Int64 => (true, 64),
            PrimitiveType::Int128 => (true, 128),
            PrimitiveType::Int256 => (true, 256),
            PrimitiveType::UInt8 | PrimitiveType::Word8 => (false, 8),
            PrimitiveType::UInt16 | PrimitiveType::Word16 => (false, 16),
            PrimitiveType::UInt32 | PrimitiveType::Word32 => (false, 32),
            PrimitiveType::UInt64 | PrimitiveType::Word64 => (false, 64),
            PrimitiveType::UInt128 => (false, 128),
            PrimitiveType::UInt256 => (false, 256),
            _ => return None,
        };
        Some(IntegerWidth { signed, bits })
    }

    pub fn is_concrete_integer(self) -> bool {
        matches!(
            self,
            PrimitiveType::Int
                | PrimitiveType::Int8
                | PrimitiveType::Int16
                | PrimitiveType::Int32
                | PrimitiveType::Int64
                | PrimitiveType::Int128
                | PrimitiveType::Int256
                | PrimitiveType::UInt
                | PrimitiveType::UInt8
                | PrimitiveType::UInt16
                | PrimitiveType::UInt32
                | PrimitiveType::UInt64
                | PrimitiveType::UInt128
                | PrimitiveType::UInt256
                | PrimitiveType::Word8
                | PrimitiveType::Word16
                | PrimitiveType::Word32
                | PrimitiveType::Word64
        )
    }

    /// Concrete integers plus the abstract `Integer` and `SignedInteger`.
    pub fn is_integer(self) -> bool {
        self.is_concrete_integer()
            || matches!(self, PrimitiveType::Integer | PrimitiveType::SignedInteger)
    }

    pub fn is_signed_integer(self) -> bool {
        matches!(
            self,
            PrimitiveType::Int
                | PrimitiveType::Int8
                | PrimitiveType::Int16
                | PrimitiveType::Int32
                | PrimitiveType::Int64
                | PrimitiveType::Int128
                | PrimitiveType::Int256
                | PrimitiveType::SignedInteger
        )
    }

    pub fn is_fixed_point(self) -> bool {
        matches!(
            self,
            PrimitiveType::Fix64
                | PrimitiveType::UFix64
                | PrimitiveType::FixedPoint
                | PrimitiveType::SignedFixedPoint
        )
    }

    pub fn is_signed_fixed_point(self) -> bool {
        matches!(self, PrimitiveType::Fix64 | PrimitiveType::SignedFixedPoint)
    }

    pub fn is_number(self) -> bool {
        self.is_integer()
            || self.is_fixed_point()
            || matches!(self, PrimitiveType::Number | PrimitiveType::SignedNumber)
    }

    pub fn is_signed_number(self) -> bool {
        self.is_signed_integer()
            || self.is_signed_fixed_point()
            || self == PrimitiveType::SignedNumber
    }

    /// Subtyping within the primitive lattice.
    pub fn is_subtype_of(self, other: PrimitiveType) -> bool {
        if self == other {
            return true;
        }
        match other {
            PrimitiveType::Number => self.is_number(),
            PrimitiveType::SignedNumber => self.is_signed_number(),
            PrimitiveType::Integer => self.is_integer(),
            PrimitiveType::SignedInteger => self.is_signed_integer(),
            PrimitiveType::FixedPoint => self.is_fixed_point(),
            PrimitiveType::SignedFixedPoint => self.is_signed_fixed_point(),
            _ => false,
        }
    }

    /// Inclusive value range of a fixed-width integer type.
    pub fn integer_range(self) -> Option<(BigInt, BigInt)> {
        let IntegerWidth { signed, bits } = self.integer_width()?;
        let range = if signed {
            let half = BigInt::from(1u8) << (bits - 1);
            (-half.clone(), half - 1u8)
        } else {
            (BigInt::from(0u8), (BigInt::from(1u8) << bits) - 1u8)
        };
        Some(range)
    }

    /// Whether an integer literal with the given magnitude and sign fits this type.
    pub fn admits_integer_literal(self, magnitude: &BigUint, negative: bool) -> bool {
        let sign = if negative { Sign::Minus } else { Sign::Plus };
        let value = BigInt::from_biguint(sign, magnitude.clone());
        match self.integer_range() {
            Some((min, max)) => min <= value && value <= max,
            // Arbitrary precision; unsigned kinds still reject negatives.
            None => !(value.sign() == Sign::Minus && self == PrimitiveType::UInt),
        }
    }

    /// Display bounds of the integer type, `None` if unbounded.
    pub fn integer_bounds(self) -> Option<(String, String)> {
        self.integer_range()
            .map(|(min, max)| (min.to_string(), max.to_string()))
    }

    /// Values of these kinds can be dictionary keys.
    pub fn is_hashable(self) -> bool {
        self != PrimitiveType::Void
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered, deduplicated set of interfaces.
///
/// Insertion order is kept for display; equality and hashing only consider
/// the set of type IDs.
#[derive(Clone, Debug, Default)]
pub struct InterfaceSet(IndexMap<TypeId, Arc<InterfaceType>>);

impl InterfaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the interface was already present.
    pub fn insert(&mut self, interface: Arc<InterfaceType>) -> bool {
        if self.0.contains_key(interface.id()) {
            return false;
        }
        self.0.insert(interface.id().to_string(), interface);
        true
    }

    pub fn contains(&self, interface: &InterfaceType) -> bool {
        self.0.contains_key(interface.id())
    }

    pub fn is_subset(&self, other: &InterfaceSet) -> bool {
        self.0.keys().all(|id| other.0.contains_key(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<InterfaceType>> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Arc<InterfaceType>> for InterfaceSet {
    fn from_iter<T: IntoIterator<Item = Arc<InterfaceType>>>(iter: T) -> Self {
        let mut set = InterfaceSet::new();
        for interface in iter {
            set.insert(interface);
        }
        set
    }
}

impl PartialEq for InterfaceSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.is_subset(other)
    }
}

impl Eq for InterfaceSet {}

impl Hash for InterfaceSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut ids: Vec<&TypeId> = self.0.keys().collect();
        ids.sort();
        ids.hash(state);
    }
}

impl fmt::Display for InterfaceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, interface) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&interface.identifier)?;
        }
        f.write_str("}")
    }
}

#[derive(Debug)]
pub struct InterfaceType {
    pub location: Location,
    pub identifier: String,
    pub kind: CompositeKind,
    id: TypeId,
}

impl InterfaceType {
    pub fn new(location: Location, identifier: impl Into<String>, kind: CompositeKind) -> Self {
        let identifier = identifier.into();
        let id = location.type_id(&identifier);
        Self {
            location,
            identifier,
            kind,
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_resource(&self) -> bool {
        self.kind == CompositeKind::Resource
    }
}

impl PartialEq for InterfaceType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for InterfaceType {}

impl Hash for InterfaceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Debug)]
pub struct CompositeType {
    pub location: Location,
    pub identifier: String,
    pub kind: CompositeKind,
    /// Declared conformances, fixed at construction.
    pub conformances: InterfaceSet,
    id: TypeId,
}

impl CompositeType {
    pub fn new(
        location: Location,
        identifier: impl Into<String>,
        kind: CompositeKind,
        conformances: InterfaceSet,
    ) -> Self {
        let identifier = identifier.into();
        let id = location.type_id(&identifier);
        Self {
            location,
            identifier,
            kind,
            conformances,
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_resource(&self) -> bool {
        self.kind == CompositeKind::Resource
    }

    pub fn conforms_to(&self, interface: &InterfaceType) -> bool {
        self.conformances.contains(interface)
    }
}

impl PartialEq for CompositeType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CompositeType {}

impl Hash for CompositeType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Parameter {
    /// Required argument label; `None` if the argument is passed unlabelled.
    pub label: Option<String>,
    pub identifier: String,
    pub ty: Type,
}

impl Parameter {
    pub fn unlabelled(identifier: impl Into<String>, ty: Type) -> Self {
        Self {
            label: None,
            identifier: identifier.into(),
            ty,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FunctionType {
    pub parameters: Vec<Parameter>,
    pub return_type: Type,
}

impl FunctionType {
    pub fn new(parameters: Vec<Parameter>, return_type: Type) -> Self {
        Self {
            parameters,
            return_type,
        }
    }
}

// Parameter identifiers are not part of the type.
impl PartialEq for FunctionType {
    fn eq(&self, other: &Self) -> bool {
        self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.label == b.label && a.ty == b.ty)
            && self.return_type == other.return_type
    }
}

impl Eq for FunctionType {}

impl Hash for FunctionType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for param in &self.parameters {
            param.label.hash(state);
            param.ty.hash(state);
        }
        self.return_type.hash(state);
    }
}

/// `T{I1, I2}`: a value of `base` that also satisfies every restriction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RestrictedType {
    pub base: Box<Type>,
    pub restrictions: InterfaceSet,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(PrimitiveType),
    Optional(Box<Type>),
    VariableSizedArray(Box<Type>),
    ConstantSizedArray {
        element: Box<Type>,
        size: u64,
    },
    Dictionary {
        key: Box<Type>,
        value: Box<Type>,
    },
    Composite(Arc<CompositeType>),
    Interface(Arc<InterfaceType>),
    Function(Arc<FunctionType>),
    Reference {
        authorized: bool,
        referenced: Box<Type>,
    },
    Restricted(RestrictedType),
    Any,
    AnyStruct,
    AnyResource,
    Capability(Option<Box<Type>>),
    /// Bottom type.
    Never,
    /// The type of run-time type values (`Type`).
    Meta,
    /// Sentinel for expressions that failed to check; suppresses cascading errors.
    Invalid,
}

impl Type {
    pub const INT: Type = Type::Primitive(PrimitiveType::Int);
    pub const BOOL: Type = Type::Primitive(PrimitiveType::Bool);
    pub const STRING: Type = Type::Primitive(PrimitiveType::String);
    pub const VOID: Type = Type::Primitive(PrimitiveType::Void);

    pub fn optional(inner: Type) -> Type {
        Type::Optional(Box::new(inner))
    }

    pub fn reference(authorized: bool, referenced: Type) -> Type {
        Type::Reference {
            authorized,
            referenced: Box::new(referenced),
        }
    }

    /// Build `base{restrictions}`; an empty restriction set is just `base`.
    pub fn restricted(base: Type, restrictions: InterfaceSet) -> Type {
        if restrictions.is_empty() {
            return base;
        }
        Type::Restricted(RestrictedType {
            base: Box::new(base),
            restrictions,
        })
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid)
    }

    /// Whether `Invalid` occurs anywhere inside this type.
    pub fn contains_invalid(&self) -> bool {
        match self {
            Type::Invalid => true,
            Type::Optional(inner) | Type::VariableSizedArray(inner) => inner.contains_invalid(),
            Type::ConstantSizedArray { element, .. } => element.contains_invalid(),
            Type::Dictionary { key, value } => key.contains_invalid() || value.contains_invalid(),
            Type::Function(f) => {
                f.parameters.iter().any(|p| p.ty.contains_invalid())
                    || f.return_type.contains_invalid()
            }
            Type::Reference { referenced, .. } => referenced.contains_invalid(),
            Type::Restricted(r) => r.base.contains_invalid(),
            Type::Capability(borrow) => borrow.as_ref().is_some_and(|b| b.contains_invalid()),
            Type::Primitive(_)
            | Type::Composite(_)
            | Type::Interface(_)
            | Type::Any
            | Type::AnyStruct
            | Type::AnyResource
            | Type::Never
            | Type::Meta => false,
        }
    }

    /// `Any`, `AnyStruct` or `AnyResource`.
    pub fn is_top(&self) -> bool {
        matches!(self, Type::Any | Type::AnyStruct | Type::AnyResource)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Primitive(p) if p.is_integer())
    }

    /// Resource-kind values are move-only. Containers are resource-kind if
    /// anything they hold is.
    pub fn is_resource_kind(&self) -> bool {
        match self {
            Type::AnyResource => true,
            Type::Composite(c) => c.is_resource(),
            Type::Interface(i) => i.is_resource(),
            Type::Optional(inner) | Type::VariableSizedArray(inner) => inner.is_resource_kind(),
            Type::ConstantSizedArray { element, .. } => element.is_resource_kind(),
            Type::Dictionary { key, value } => key.is_resource_kind() || value.is_resource_kind(),
            Type::Restricted(r) => {
                r.base.is_resource_kind() || r.restrictions.iter().any(|i| i.is_resource())
            }
            Type::Primitive(_)
            | Type::Function(_)
            | Type::Reference { .. }
            | Type::Capability(_)
            | Type::Any
            | Type::AnyStruct
            | Type::Never
            | Type::Meta
            | Type::Invalid => false,
        }
    }

    pub fn is_valid_dictionary_key(&self) -> bool {
        match self {
            Type::Primitive(p) => p.is_hashable(),
            Type::Invalid => true,
            _ => false,
        }
    }

    /// Display form with nominal types spelled as their full type IDs.
    pub fn qualified_string(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write_type(&mut out, self, true);
        out
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type(f, self, false)
    }
}

fn write_type(out: &mut impl fmt::Write, ty: &Type, qualified: bool) -> fmt::Result {
    match ty {
        Type::Primitive(p) => out.write_str(p.name()),
        Type::Optional(inner) => {
            write_type(out, inner, qualified)?;
            out.write_str("?")
        }
        Type::VariableSizedArray(element) => {
            out.write_str("[")?;
            write_type(out, element, qualified)?;
            out.write_str("]")
        }
        Type::ConstantSizedArray { element, size } => {
            out.write_str("[")?;
            write_type(out, element, qualified)?;
            write!(out, "; {size}]")
        }
        Type::Dictionary { key, value } => {
            out.write_str("{")?;
            write_type(out, key, qualified)?;
            out.write_str(": ")?;
            write_type(out, value, qualified)?;
            out.write_str("}")
        }
        Type::Composite(c) if qualified => out.write_str(c.id()),
        Type::Composite(c) => out.write_str(&c.identifier),
        Type::Interface(i) if qualified => out.write_str(i.id()),
        Type::Interface(i) => out.write_str(&i.identifier),
        Type::Function(f) => {
            out.write_str("((")?;
            for (i, param) in f.parameters.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_type(out, &param.ty, qualified)?;
            }
            out.write_str("): ")?;
            write_type(out, &f.return_type, qualified)?;
            out.write_str(")")
        }
        Type::Reference {
            authorized,
            referenced,
        } => {
            if *authorized {
                out.write_str("auth ")?;
            }
            out.write_str("&")?;
            write_type(out, referenced, qualified)
        }
        Type::Restricted(r) => {
            write_type(out, &r.base, qualified)?;
            out.write_str("{")?;
            for (i, interface) in r.restrictions.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                if qualified {
                    out.write_str(interface.id())?;
                } else {
                    out.write_str(&interface.identifier)?;
                }
            }
            out.write_str("}")
        }
        Type::Any => out.write_str("Any"),
        Type::AnyStruct => out.write_str("AnyStruct"),
        Type::AnyResource => out.write_str("AnyResource"),
        Type::Capability(None) => out.write_str("Capability"),
        Type::Capability(Some(borrow)) => {
            out.write_str("Capability<")?;
            write_type(out, borrow, qualified)?;
            out.write_str(">")
        }
        Type::Never => out.write_str("Never"),
        Type::Meta => out.write_str("Type"),
        Type::Invalid => out.write_str("<<invalid>>"),
    }
}
