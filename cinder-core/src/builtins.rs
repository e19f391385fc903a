#![forbid(unsafe_code)]

//! Process-wide, read-only built-in tables.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::types::{FunctionType, Parameter, PrimitiveType, Type};

static BASE_TYPES: LazyLock<HashMap<&'static str, Type>> = LazyLock::new(|| {
    let mut table: HashMap<&'static str, Type> = PrimitiveType::ALL
        .iter()
        .map(|p| (p.name(), Type::Primitive(*p)))
        .collect();
    table.insert("AnyStruct", Type::AnyStruct);
    table.insert("AnyResource", Type::AnyResource);
    table.insert("Never", Type::Never);
    table.insert("Type", Type::Meta);
    table
});

static ALL_INTEGER_TYPES: LazyLock<Vec<Type>> = LazyLock::new(|| {
    PrimitiveType::ALL
        .iter()
        .copied()
        .filter(|p| p.is_integer())
        .map(Type::Primitive)
        .collect()
});

/// A built-in function that builds a run-time type value.
#[derive(Clone, Debug)]
pub struct RuntimeTypeConstructor {
    pub name: &'static str,
    pub function_type: Arc<FunctionType>,
    pub description: &'static str,
}

impl RuntimeTypeConstructor {
    pub fn ty(&self) -> Type {
        Type::Function(self.function_type.clone())
    }
}

static RUNTIME_TYPE_CONSTRUCTORS: LazyLock<Vec<RuntimeTypeConstructor>> = LazyLock::new(|| {
    let meta = || Type::Meta;
    let optional_meta = || Type::optional(Type::Meta);
    let constructor = |name, params: Vec<(&str, Type)>, ret, description| RuntimeTypeConstructor {
        name,
        function_type: Arc::new(FunctionType::new(
            params
                .into_iter()
                .map(|(identifier, ty)| Parameter::unlabelled(identifier, ty))
                .collect(),
            ret,
        )),
        description,
    };

    vec![
        constructor(
            "OptionalType",
            vec![("type", meta())],
            meta(),
            "Creates a run-time type representing an optional version of the given run-time type.",
        ),
        constructor(
            "VariableSizedArrayType",
            vec![("type", meta())],
            meta(),
            "Creates a run-time type representing a variable-sized array type of the given run-time type.",
        ),
        constructor(
            "ConstantSizedArrayType",
            vec![("type", meta()), ("size", Type::INT)],
            meta(),
            "Creates a run-time type representing a constant-sized array type of the given run-time type with the specified size.",
        ),
        constructor(
            "DictionaryType",
            vec![("key", meta()), ("value", meta())],
            optional_meta(),
            "Creates a run-time type representing a dictionary type of the given run-time key and value types. Returns nil if the key type is not a valid dictionary key.",
        ),
        constructor(
            "CompositeType",
            vec![("identifier", Type::STRING)],
            optional_meta(),
            "Creates a run-time type representing the composite type associated with the given type identifier. Returns nil if the identifier does not correspond to any composite type.",
        ),
        constructor(
            "InterfaceType",
            vec![("identifier", Type::STRING)],
            optional_meta(),
            "Creates a run-time type representing the interface type associated with the given type identifier. Returns nil if the identifier does not correspond to any interface type.",
        ),
        constructor(
            "FunctionType",
            vec![
                ("parameters", Type::VariableSizedArray(Box::new(meta()))),
                ("return", meta()),
            ],
            meta(),
            "Creates a run-time type representing a function type associated with the given parameters and return type.",
        ),
        constructor(
            "ReferenceType",
            vec![("authorized", Type::BOOL), ("type", meta())],
            meta(),
            "Creates a run-time type representing a reference type of the given type, with authorization provided by the first argument.",
        ),
        constructor(
            "RestrictedType",
            vec![
                ("typeID", Type::optional(Type::STRING)),
                ("restrictions", Type::VariableSizedArray(Box::new(Type::STRING))),
            ],
            optional_meta(),
            "Creates a run-time type representing a restricted type of the first argument, restricted by the interface identifiers in the second argument. Returns nil if the restriction is not valid.",
        ),
        constructor(
            "CapabilityType",
            vec![("type", meta())],
            optional_meta(),
            "Creates a run-time type representing a capability type of the given reference type. Returns nil if the type is not a reference.",
        ),
    ]
});

/// Built-in type for a name, excluding `Any` (gated by configuration).
pub fn base_type(name: &str) -> Option<Type> {
    BASE_TYPES.get(name).cloned()
}

/// Every concrete integer type plus `Integer` and `SignedInteger`.
pub fn all_integer_types() -> &'static [Type] {
    &ALL_INTEGER_TYPES
}

pub fn runtime_type_constructors() -> &'static [RuntimeTypeConstructor] {
    &RUNTIME_TYPE_CONSTRUCTORS
}
