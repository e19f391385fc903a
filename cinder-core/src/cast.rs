#![forbid(unsafe_code)]

use cinder_ast::CastKind;
use tracing::trace;

use crate::subtype::{
    conforms_to_all, is_subtype, is_unauthorized_reference_subtype, underlying_composite,
};
use crate::types::{InterfaceSet, Type};

/// Outcome of checking one cast expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CastResult {
    /// Whether the cast type-checks. A rejected cast is reported as a
    /// `TypeMismatch` with the target as expected type.
    pub allowed: bool,
    /// Type of the cast expression: the target, or an optional of it for `as?`.
    pub ty: Type,
}

pub fn check_cast(source: &Type, target: &Type, kind: CastKind) -> CastResult {
    let allowed = match kind {
        CastKind::Static => is_static_cast_allowed(source, target),
        CastKind::Dynamic | CastKind::ForceDynamic => is_dynamic_cast_plausible(source, target),
    };
    trace!(%source, %target, op = kind.operator(), allowed, "cast");

    let ty = match kind {
        CastKind::Dynamic => Type::optional(target.clone()),
        CastKind::Static | CastKind::ForceDynamic => target.clone(),
    };
    CastResult { allowed, ty }
}

/// `source as target`: provable without looking at the run-time value.
pub fn is_static_cast_allowed(source: &Type, target: &Type) -> bool {
    if let (
        Type::Reference {
            authorized: source_auth,
            referenced: source_ref,
        },
        Type::Reference {
            authorized: target_auth,
            referenced: target_ref,
        },
    ) = (source, target)
    {
        return match (source_auth, target_auth) {
            (true, _) => is_static_cast_allowed(source_ref, target_ref),
            (false, true) => false,
            (false, false) => is_unauthorized_reference_subtype(source_ref, target_ref),
        };
    }

    is_subtype(source, target) || is_restriction_upcast(source, target)
}

/// A composite value, restricted or not, re-viewed through a restriction set
/// the composite itself declares.
fn is_restriction_upcast(source: &Type, target: &Type) -> bool {
    let Some(composite) = underlying_composite(source) else {
        return false;
    };
    let Type::Restricted(target) = target else {
        return false;
    };

    match target.base.as_ref() {
        Type::Composite(base) => base == composite,
        base if base.is_top() => {
            is_subtype(&Type::Composite(composite.clone()), base)
                && conforms_to_all(composite, &target.restrictions)
        }
        _ => false,
    }
}

/// `source as? target` / `source as! target`: rejected only when no value of
/// the source type can have the target type at run time.
pub fn is_dynamic_cast_plausible(source: &Type, target: &Type) -> bool {
    if source.contains_invalid() || target.contains_invalid() {
        return true;
    }

    match (source, target) {
        (
            Type::Reference {
                authorized: source_auth,
                referenced: source_ref,
            },
            Type::Reference {
                authorized: target_auth,
                referenced: target_ref,
            },
        ) => match (source_auth, target_auth) {
            (true, _) => is_dynamic_cast_plausible(source_ref, target_ref),
            (false, true) => false,
            (false, false) => is_unauthorized_reference_subtype(source_ref, target_ref),
        },

        (_, Type::Restricted(restricted)) if restricted.base.is_top() => {
            plausible_into_restricted_top(source, &restricted.base, &restricted.restrictions)
        }

        (_, Type::Restricted(restricted)) if matches!(*restricted.base, Type::Composite(_)) => {
            plausible_into_composite(source, &restricted.base)
        }
        (_, Type::Composite(_)) => plausible_into_composite(source, target),

        (Type::Optional(source_inner), Type::Optional(target_inner)) => {
            is_dynamic_cast_plausible(source_inner, target_inner)
        }
        (_, Type::Optional(target_inner)) if !source.is_top() => {
            is_dynamic_cast_plausible(source, target_inner)
        }
        (Type::VariableSizedArray(a), Type::VariableSizedArray(b)) => {
            is_dynamic_cast_plausible(a, b)
        }
        (
            Type::ConstantSizedArray {
                element: a,
                size: n,
            },
            Type::ConstantSizedArray {
                element: b,
                size: m,
            },
        ) => n == m && is_dynamic_cast_plausible(a, b),
        (
            Type::Dictionary {
                key: source_key,
                value: source_value,
            },
            Type::Dictionary {
                key: target_key,
                value: target_value,
            },
        ) => source_key == target_key && is_dynamic_cast_plausible(source_value, target_value),

        (top, _) if top.is_top() => is_subtype(source, target) || may_hold(top, target),

        _ => is_subtype(source, target),
    }
}

fn plausible_into_restricted_top(source: &Type, top: &Type, restrictions: &InterfaceSet) -> bool {
    if source.is_top() {
        return may_hold(source, &Type::restricted(top.clone(), restrictions.clone()));
    }
    if let Some(composite) = underlying_composite(source) {
        return is_subtype(&Type::Composite(composite.clone()), top)
            && conforms_to_all(composite, restrictions);
    }
    match source {
        Type::Restricted(restricted) if restricted.base.is_top() => {
            is_subtype(&restricted.base, top) || is_subtype(top, &restricted.base)
        }
        Type::Interface(_) => may_hold(top, source),
        _ => is_subtype(source, &Type::restricted(top.clone(), restrictions.clone())),
    }
}

fn plausible_into_composite(source: &Type, target: &Type) -> bool {
    let Some(target_composite) = underlying_composite(target) else {
        return is_subtype(source, target);
    };
    let target_plain = Type::Composite(target_composite.clone());

    if source.is_top() {
        return is_subtype(&target_plain, source);
    }
    if let Some(composite) = underlying_composite(source) {
        return composite == target_composite;
    }
    match source {
        Type::Restricted(restricted) if restricted.base.is_top() => {
            is_subtype(&target_plain, &restricted.base)
        }
        Type::Interface(interface) => target_composite.conforms_to(interface),
        _ => is_subtype(source, target),
    }
}

/// Whether a value statically typed as the top type `top` may be of type `ty`.
fn may_hold(top: &Type, ty: &Type) -> bool {
    match top {
        Type::Any => true,
        Type::AnyResource => ty.is_resource_kind() || matches!(ty, Type::Any),
        Type::AnyStruct => !ty.is_resource_kind(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cinder_ast::CompositeKind;

    use super::*;
    use crate::location::Location;
    use crate::types::{CompositeType, InterfaceType};

    fn interface(name: &str) -> Arc<InterfaceType> {
        Arc::new(InterfaceType::new(Location::default(), name, CompositeKind::Resource))
    }

    fn resource(name: &str, conformances: &[&Arc<InterfaceType>]) -> Type {
        Type::Composite(Arc::new(CompositeType::new(
            Location::default(),
            name,
            CompositeKind::Resource,
            conformances.iter().map(|i| Arc::clone(i)).collect(),
        )))
    }

    fn restricted(base: &Type, interfaces: &[&Arc<InterfaceType>]) -> Type {
        Type::restricted(base.clone(), interfaces.iter().map(|i| Arc::clone(i)).collect())
    }

    #[test]
    fn static_casts_only_go_up() {
        let ri = interface("RI");
        let r = resource("R", &[&ri]);
        let any_ri = restricted(&Type::AnyResource, &[&ri]);
        let r_ri = restricted(&r, &[&ri]);

        assert!(check_cast(&r, &any_ri, CastKind::Static).allowed);
        assert!(!check_cast(&any_ri, &r_ri, CastKind::Static).allowed);
        assert!(check_cast(&any_ri, &r_ri, CastKind::Dynamic).allowed);
        assert!(!check_cast(&Type::AnyResource, &r, CastKind::Static).allowed);
        assert!(check_cast(&Type::AnyResource, &r, CastKind::ForceDynamic).allowed);
    }

    #[test]
    fn widening_the_restriction_set_of_the_same_composite_is_static() {
        let i1 = interface("I1");
        let i2 = interface("I2");
        let r = resource("R", &[&i1, &i2]);
        assert!(is_static_cast_allowed(
            &restricted(&r, &[&i1]),
            &restricted(&r, &[&i1, &i2])
        ));
        assert!(is_static_cast_allowed(
            &restricted(&r, &[&i1]),
            &restricted(&Type::AnyResource, &[&i2])
        ));
        assert!(!is_static_cast_allowed(
            &restricted(&Type::AnyResource, &[&i1]),
            &restricted(&Type::AnyResource, &[&i1, &i2])
        ));
    }

    #[test]
    fn disjoint_composites_never_cast() {
        let i = interface("I");
        let r1 = resource("R1", &[&i]);
        let r2 = resource("R2", &[&i]);
        for kind in [CastKind::Static, CastKind::Dynamic, CastKind::ForceDynamic] {
            assert!(!check_cast(&restricted(&r1, &[&i]), &restricted(&r2, &[&i]), kind).allowed);
            assert!(!check_cast(&r1, &r2, kind).allowed);
        }
    }

    #[test]
    fn dynamic_cast_result_is_optional() {
        let r = resource("R", &[]);
        let result = check_cast(&Type::AnyResource, &r, CastKind::Dynamic);
        assert_eq!(result.ty, Type::optional(r.clone()));
        let result = check_cast(&Type::AnyResource, &r, CastKind::ForceDynamic);
        assert_eq!(result.ty, r);
    }

    #[test]
    fn authorization_cannot_be_acquired() {
        let r = resource("R", &[]);
        let unauth = Type::reference(false, r.clone());
        let auth = Type::reference(true, r.clone());
        for kind in [CastKind::Static, CastKind::Dynamic] {
            assert!(check_cast(&auth, &unauth, kind).allowed);
            assert!(!check_cast(&unauth, &auth, kind).allowed);
        }
    }

    #[test]
    fn authorized_references_may_be_downcast_dynamically() {
        let ri = interface("RI");
        let r = resource("R", &[&ri]);
        let source = Type::reference(true, restricted(&Type::AnyResource, &[&ri]));
        let target = Type::reference(false, restricted(&r, &[&ri]));
        assert!(!is_static_cast_allowed(&source, &target));
        assert!(is_dynamic_cast_plausible(&source, &target));

        let unauth_source = Type::reference(false, restricted(&Type::AnyResource, &[&ri]));
        assert!(!is_dynamic_cast_plausible(&unauth_source, &target));
    }

    #[test]
    fn top_type_sources_need_kind_overlap() {
        let s = Type::Composite(Arc::new(CompositeType::new(
            Location::default(),
            "S",
            CompositeKind::Structure,
            InterfaceSet::new(),
        )));
        let r = resource("R", &[]);
        assert!(is_dynamic_cast_plausible(&Type::AnyStruct, &s));
        assert!(!is_dynamic_cast_plausible(&Type::AnyStruct, &r));
        assert!(is_dynamic_cast_plausible(&Type::Any, &r));
        assert!(is_dynamic_cast_plausible(&Type::AnyStruct, &Type::INT));
        assert!(!is_dynamic_cast_plausible(&Type::AnyResource, &Type::INT));
    }
}
