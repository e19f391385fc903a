#![forbid(unsafe_code)]

use cinder_ast::Span;
use tracing::trace;

use crate::error::SemanticError;
use crate::types::{InterfaceSet, Type};

/// Check that `restrictions` may restrict `base`.
///
/// Conformance is only checked for a composite base; the top types accept
/// any interface of a matching kind, and conformance is decided later when
/// a concrete value is cast into the restricted type.
pub fn validate_restrictions(
    base: &Type,
    restrictions: &InterfaceSet,
    span: Span,
) -> Vec<SemanticError> {
    let mut errors = Vec::new();

    match base {
        Type::Composite(composite) => {
            for interface in restrictions.iter() {
                if !composite.conforms_to(interface) {
                    errors.push(SemanticError::InvalidNonConformanceRestriction {
                        interface: Type::Interface(interface.clone()),
                        composite: base.clone(),
                        span,
                    });
                }
            }
        }
        Type::AnyResource | Type::AnyStruct => {
            let resource = matches!(base, Type::AnyResource);
            for interface in restrictions.iter() {
                if interface.is_resource() != resource {
                    errors.push(SemanticError::RestrictionKindMismatch {
                        restriction: Type::Interface(interface.clone()),
                        ty: base.clone(),
                        span,
                    });
                }
            }
        }
        Type::Any => {
            let mut interfaces = restrictions.iter();
            if let Some(first) = interfaces.next() {
                for interface in interfaces {
                    if interface.is_resource() != first.is_resource() {
                        errors.push(SemanticError::RestrictionKindMismatch {
                            restriction: Type::Interface(interface.clone()),
                            ty: base.clone(),
                            span,
                        });
                    }
                }
            }
        }
        Type::Invalid => {}
        _ => errors.push(SemanticError::InvalidRestrictedType {
            ty: base.clone(),
            span,
        }),
    }

    trace!(%base, %restrictions, errors = errors.len(), "validate restrictions");
    errors
}

/// Build `base{restrictions}` and validate it. An invalid base yields `Invalid`;
/// non-conforming restrictions are reported but the restricted type is kept.
pub fn restrict(base: Type, restrictions: InterfaceSet, span: Span) -> (Type, Vec<SemanticError>) {
    let errors = validate_restrictions(&base, &restrictions, span);
    let invalid_base = errors
        .iter()
        .any(|e| matches!(e, SemanticError::InvalidRestrictedType { .. }));
    if invalid_base || base.is_invalid() {
        return (Type::Invalid, errors);
    }
    (Type::restricted(base, restrictions), errors)
}
