#![forbid(unsafe_code)]

use std::sync::Arc;

use tracing::trace;

use crate::types::{CompositeType, InterfaceSet, InterfaceType, Type};

/// Whether a value of type `sub` may be used where `sup` is expected,
/// without an explicit cast.
pub fn is_subtype(sub: &Type, sup: &Type) -> bool {
    let result = check_subtype(sub, sup);
    trace!(%sub, %sup, result, "subtype");
    result
}

fn check_subtype(sub: &Type, sup: &Type) -> bool {
    if sub == sup {
        return true;
    }

    match (sub, sup) {
        (Type::Never, _) => return true,
        (_, Type::Never) => return false,
        (Type::Invalid, _) | (_, Type::Invalid) => return false,
        _ => {}
    }

    match sup {
        Type::Any => return true,
        Type::AnyStruct => {
            return !sub.is_resource_kind() && !matches!(sub, Type::Any | Type::AnyResource);
        }
        Type::AnyResource => return sub.is_resource_kind(),
        Type::Optional(sup_inner) => {
            return match sub {
                Type::Optional(sub_inner) => {
                    is_subtype(sub_inner, sup_inner) || is_subtype(sub, sup_inner)
                }
                _ => is_subtype(sub, sup_inner),
            };
        }
        _ => {}
    }

    match (sub, sup) {
        (Type::Primitive(a), Type::Primitive(b)) => a.is_subtype_of(*b),

        (Type::Composite(c), Type::Interface(i)) => c.conforms_to(i),

        (Type::Composite(_) | Type::Interface(_), Type::Restricted(r)) => {
            is_subtype(sub, &r.base) && r.restrictions.iter().all(|i| declares(sub, i))
        }

        (Type::Restricted(a), Type::Restricted(b)) => {
            is_subtype(&a.base, &b.base) && b.restrictions.is_subset(&a.restrictions)
        }

        (Type::Restricted(a), Type::Interface(i)) => {
            a.restrictions.contains(i) || is_subtype(&a.base, sup)
        }

        // Dropping restrictions is always allowed.
        (Type::Restricted(a), _) => is_subtype(&a.base, sup),

        (
            Type::Reference {
                authorized: sub_auth,
                referenced: sub_ref,
            },
            Type::Reference {
                authorized: sup_auth,
                referenced: sup_ref,
            },
        ) => match (sub_auth, sup_auth) {
            (true, _) => is_subtype(sub_ref, sup_ref),
            (false, true) => false,
            (false, false) => is_unauthorized_reference_subtype(sub_ref, sup_ref),
        },

        (Type::VariableSizedArray(a), Type::VariableSizedArray(b)) => is_subtype(a, b),

        (
            Type::ConstantSizedArray {
                element: a,
                size: n,
            },
            Type::ConstantSizedArray {
                element: b,
                size: m,
            },
        ) => n == m && is_subtype(a, b),

        (
            Type::Dictionary {
                key: sub_key,
                value: sub_value,
            },
            Type::Dictionary {
                key: sup_key,
                value: sup_value,
            },
        ) => sub_key == sup_key && is_subtype(sub_value, sup_value),

        (Type::Function(a), Type::Function(b)) => {
            a.parameters.len() == b.parameters.len()
                && a.parameters
                    .iter()
                    .zip(&b.parameters)
                    .all(|(p, q)| p.label == q.label && p.ty == q.ty)
                && is_subtype(&a.return_type, &b.return_type)
        }

        (Type::Capability(_), Type::Capability(None)) => true,
        (Type::Capability(Some(a)), Type::Capability(Some(b))) => is_subtype(a, b),

        _ => false,
    }
}

/// Subtyping between the referenced types of two unauthorized references.
///
/// Without authorization a reference cannot be narrowed back to a concrete
/// type, so restrictions may only be dropped towards a top type, and a
/// composite target must be reached without losing the restriction set.
pub fn is_unauthorized_reference_subtype(sub: &Type, sup: &Type) -> bool {
    if sub == sup {
        return true;
    }
    match sup {
        Type::Restricted(target) if target.base.is_top() => match sub {
            Type::Restricted(source) => {
                is_subtype(&source.base, &target.base)
                    && target.restrictions.is_subset(&source.restrictions)
            }
            Type::Composite(c) => {
                is_subtype(sub, &target.base) && target.restrictions.is_subset(&c.conformances)
            }
            _ => false,
        },
        Type::Restricted(target) => match sub {
            Type::Restricted(source) => {
                source.base == target.base && target.restrictions.is_subset(&source.restrictions)
            }
            Type::Composite(_) => sub == target.base.as_ref(),
            _ => false,
        },
        Type::Composite(_) => false,
        _ => is_subtype(sub, sup),
    }
}

/// The composite a type is built on: `C` itself or the base of `C{...}`.
pub fn underlying_composite(ty: &Type) -> Option<&Arc<CompositeType>> {
    match ty {
        Type::Composite(c) => Some(c),
        Type::Restricted(r) => match r.base.as_ref() {
            Type::Composite(c) => Some(c),
            _ => None,
        },
        _ => None,
    }
}

/// Whether every interface in `restrictions` is a declared conformance of `composite`.
pub fn conforms_to_all(composite: &CompositeType, restrictions: &InterfaceSet) -> bool {
    restrictions.is_subset(&composite.conformances)
}

fn declares(ty: &Type, interface: &InterfaceType) -> bool {
    match ty {
        Type::Composite(c) => c.conforms_to(interface),
        Type::Interface(i) => i.as_ref() == interface,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use cinder_ast::CompositeKind;

    use super::*;
    use crate::location::Location;
    use crate::types::{FunctionType, Parameter, PrimitiveType};

    struct Fixture {
        i1: Arc<InterfaceType>,
        i2: Arc<InterfaceType>,
        r: Type,
        r2: Type,
        s: Type,
    }

    fn fixture() -> Fixture {
        let i1 = Arc::new(InterfaceType::new(Location::default(), "I1", CompositeKind::Resource));
        let i2 = Arc::new(InterfaceType::new(Location::default(), "I2", CompositeKind::Resource));
        let r = Type::Composite(Arc::new(CompositeType::new(
            Location::default(),
            "R",
            CompositeKind::Resource,
            [i1.clone(), i2.clone()].into_iter().collect(),
        )));
        let r2 = Type::Composite(Arc::new(CompositeType::new(
            Location::default(),
            "R2",
            CompositeKind::Resource,
            [i1.clone()].into_iter().collect(),
        )));
        let s = Type::Composite(Arc::new(CompositeType::new(
            Location::default(),
            "S",
            CompositeKind::Structure,
            InterfaceSet::new(),
        )));
        Fixture { i1, i2, r, r2, s }
    }

    fn set(interfaces: &[&Arc<InterfaceType>]) -> InterfaceSet {
        interfaces.iter().map(|i| Arc::clone(i)).collect()
    }

    #[test]
    fn never_is_bottom_and_not_top() {
        let f = fixture();
        assert!(is_subtype(&Type::Never, &f.r));
        assert!(is_subtype(&Type::Never, &Type::Never));
        assert!(!is_subtype(&f.r, &Type::Never));
    }

    #[test]
    fn optional_accepts_plain_and_nested_values() {
        let int = Type::INT;
        assert!(is_subtype(&int, &Type::optional(int.clone())));
        assert!(is_subtype(
            &Type::optional(int.clone()),
            &Type::optional(Type::optional(int.clone()))
        ));
        assert!(!is_subtype(&Type::optional(int.clone()), &int));
        assert!(is_subtype(
            &Type::optional(Type::Never),
            &Type::optional(Type::STRING)
        ));
    }

    #[test]
    fn composite_conformance_is_declared_not_inferred() {
        let f = fixture();
        assert!(is_subtype(&f.r, &Type::Interface(f.i2.clone())));
        assert!(!is_subtype(&f.r2, &Type::Interface(f.i2.clone())));
    }

    #[test]
    fn composite_into_restricted_types() {
        let f = fixture();
        let r_i1 = Type::restricted(f.r.clone(), set(&[&f.i1]));
        let any_i2 = Type::restricted(Type::AnyResource, set(&[&f.i2]));
        assert!(is_subtype(&f.r, &r_i1));
        assert!(is_subtype(&f.r, &any_i2));
        assert!(!is_subtype(&f.r2, &any_i2));
        assert!(!is_subtype(&f.r2, &r_i1));
    }

    #[test]
    fn restricted_to_restricted_requires_fewer_restrictions() {
        let f = fixture();
        let r_i1 = Type::restricted(f.r.clone(), set(&[&f.i1]));
        let r_i12 = Type::restricted(f.r.clone(), set(&[&f.i1, &f.i2]));
        assert!(is_subtype(&r_i12, &r_i1));
        assert!(!is_subtype(&r_i1, &r_i12));
        // Dropping restrictions entirely.
        assert!(is_subtype(&r_i1, &f.r));
        assert!(is_subtype(&r_i1, &Type::AnyResource));
        assert!(is_subtype(&r_i1, &Type::Interface(f.i1.clone())));
    }

    #[test]
    fn top_types_partition_by_kind() {
        let f = fixture();
        assert!(is_subtype(&f.r, &Type::AnyResource));
        assert!(!is_subtype(&f.r, &Type::AnyStruct));
        assert!(is_subtype(&f.s, &Type::AnyStruct));
        assert!(is_subtype(&f.s, &Type::Any));
        assert!(is_subtype(&f.r, &Type::Any));
        assert!(!is_subtype(&Type::AnyResource, &f.r));
        assert!(!is_subtype(&Type::Any, &Type::AnyStruct));
        assert!(is_subtype(&Type::reference(false, f.r.clone()), &Type::AnyStruct));
    }

    #[test]
    fn references_are_covariant_and_auth_is_one_way() {
        let f = fixture();
        let r_i1 = Type::restricted(f.r.clone(), set(&[&f.i1]));
        assert!(is_subtype(
            &Type::reference(true, f.r.clone()),
            &Type::reference(false, f.r.clone())
        ));
        assert!(!is_subtype(
            &Type::reference(false, f.r.clone()),
            &Type::reference(true, f.r.clone())
        ));
        assert!(is_subtype(
            &Type::reference(true, r_i1.clone()),
            &Type::reference(false, f.r.clone())
        ));
        // An unauthorized reference cannot shed its restrictions towards a composite.
        assert!(!is_subtype(
            &Type::reference(false, r_i1.clone()),
            &Type::reference(false, f.r.clone())
        ));
        assert!(is_subtype(
            &Type::reference(false, r_i1),
            &Type::reference(false, Type::AnyResource)
        ));
    }

    #[test]
    fn containers_are_covariant_within_the_same_shape() {
        let f = fixture();
        let arr = |t: Type| Type::VariableSizedArray(Box::new(t));
        assert!(is_subtype(&arr(f.r.clone()), &arr(Type::AnyResource)));
        assert!(!is_subtype(
            &Type::ConstantSizedArray {
                element: Box::new(Type::INT),
                size: 2
            },
            &Type::ConstantSizedArray {
                element: Box::new(Type::INT),
                size: 3
            }
        ));
        assert!(!is_subtype(
            &Type::ConstantSizedArray {
                element: Box::new(Type::INT),
                size: 2
            },
            &arr(Type::INT)
        ));
        let dict = |k: Type, v: Type| Type::Dictionary {
            key: Box::new(k),
            value: Box::new(v),
        };
        assert!(is_subtype(
            &dict(Type::STRING, Type::INT),
            &dict(Type::STRING, Type::AnyStruct)
        ));
        assert!(!is_subtype(
            &dict(Type::Primitive(PrimitiveType::Int8), Type::INT),
            &dict(Type::INT, Type::INT)
        ));
    }

    #[test]
    fn function_parameters_are_invariant_and_returns_covariant() {
        let f = |param: Type, ret: Type| {
            Type::Function(Arc::new(FunctionType::new(
                vec![Parameter::unlabelled("x", param)],
                ret,
            )))
        };
        let int8 = Type::Primitive(PrimitiveType::Int8);
        let integer = Type::Primitive(PrimitiveType::Integer);
        assert!(is_subtype(&f(Type::INT, int8.clone()), &f(Type::INT, integer.clone())));
        assert!(!is_subtype(&f(Type::INT, integer.clone()), &f(Type::INT, int8.clone())));
        assert!(!is_subtype(&f(int8, Type::INT), &f(integer, Type::INT)));
    }
}
