#![forbid(unsafe_code)]

//! Syntactic type annotations to checked types.

use std::sync::Arc;

use cinder_ast::{Ident, Span, TypeAnnotation, TypeExpr, TypeExprKind};

use crate::builtins;
use crate::error::SemanticError;
use crate::restriction::restrict;
use crate::sema::Checker;
use crate::types::{FunctionType, InterfaceSet, Parameter, Type};

impl Checker {
    pub(crate) fn convert_annotation(&mut self, annotation: &TypeAnnotation) -> Type {
        self.convert_type(&annotation.ty)
    }

    pub(crate) fn convert_type(&mut self, ty: &TypeExpr) -> Type {
        match &ty.kind {
            TypeExprKind::Nominal(name) => self.convert_nominal(name),

            TypeExprKind::Restricted { base, restrictions } => {
                self.convert_restricted(base.as_deref(), restrictions, ty.span)
            }

            TypeExprKind::Optional(inner) => Type::optional(self.convert_type(inner)),

            TypeExprKind::VariableSized(element) => {
                Type::VariableSizedArray(Box::new(self.convert_type(element)))
            }

            TypeExprKind::ConstantSized { element, size } => Type::ConstantSizedArray {
                element: Box::new(self.convert_type(element)),
                size: *size,
            },

            TypeExprKind::Dictionary { key, value } => {
                let key_ty = self.convert_type(key);
                if !key_ty.is_valid_dictionary_key() {
                    self.report(SemanticError::InvalidDictionaryKeyType {
                        ty: key_ty.clone(),
                        span: key.span,
                    });
                }
                let value_ty = self.convert_type(value);
                Type::Dictionary {
                    key: Box::new(key_ty),
                    value: Box::new(value_ty),
                }
            }

            TypeExprKind::Reference {
                authorized,
                referenced,
            } => Type::reference(*authorized, self.convert_type(referenced)),

            TypeExprKind::Function {
                params,
                return_type,
            } => {
                let parameters = params
                    .iter()
                    .map(|p| Parameter::unlabelled("", self.convert_type(p)))
                    .collect();
                let return_type = self.convert_type(return_type);
                Type::Function(Arc::new(FunctionType::new(parameters, return_type)))
            }

            TypeExprKind::Capability(borrow) => {
                Type::Capability(borrow.as_ref().map(|b| Box::new(self.convert_type(b))))
            }
        }
    }

    fn convert_nominal(&mut self, name: &Ident) -> Type {
        if name.node == "Any" {
            if self.config().any_type_enabled {
                return Type::Any;
            }
        } else if let Some(ty) = builtins::base_type(&name.node) {
            return ty;
        } else if let Some(ty) = self.declared_type(&name.node) {
            return ty;
        }

        self.report(SemanticError::UnknownType {
            name: name.node.clone(),
            span: name.span,
        });
        Type::Invalid
    }

    fn convert_restricted(
        &mut self,
        base: Option<&TypeExpr>,
        restrictions: &[Ident],
        span: Span,
    ) -> Type {
        let mut set = InterfaceSet::new();
        for name in restrictions {
            match self.resolve_restriction(name) {
                Some(Type::Interface(interface)) => {
                    set.insert(interface);
                }
                Some(other) => self.report(SemanticError::InvalidRestrictionType {
                    ty: other,
                    span: name.span,
                }),
                None => self.report(SemanticError::UnknownType {
                    name: name.node.clone(),
                    span: name.span,
                }),
            }
        }

        let base = match base {
            Some(base) => self.convert_type(base),
            None if set.iter().any(|i| i.is_resource()) => Type::AnyResource,
            None => Type::AnyStruct,
        };
        if base.is_invalid() {
            return Type::Invalid;
        }

        let (ty, errors) = restrict(base, set, span);
        for error in errors {
            self.report(error);
        }
        ty
    }

    fn resolve_restriction(&self, name: &Ident) -> Option<Type> {
        if name.node == "Any" && self.config().any_type_enabled {
            return Some(Type::Any);
        }
        builtins::base_type(&name.node).or_else(|| self.declared_type(&name.node))
    }
}

#[cfg(test)]
mod tests {
    use cinder_parse::parse_type;

    use super::*;
    use crate::config::CheckerConfig;
    use crate::error::ErrorKind;
    use crate::types::PrimitiveType;

    fn convert(checker: &mut Checker, src: &str) -> Type {
        let annotation = parse_type(src).expect("parse");
        checker.convert_annotation(&annotation)
    }

    fn checker_with(src: &str, config: CheckerConfig) -> Checker {
        let program = cinder_parse::parse_source(src).expect("parse");
        let mut checker = Checker::with_config(config);
        checker.check_program(&program).expect("declarations check");
        checker
    }

    #[test]
    fn any_is_gated_by_configuration() {
        let mut checker = Checker::new();
        assert_eq!(convert(&mut checker, "Any"), Type::Invalid);
        assert_eq!(checker.error_kinds(), vec![ErrorKind::UnknownType]);

        let mut checker = Checker::with_config(CheckerConfig::default().with_any_type(true));
        assert_eq!(convert(&mut checker, "Any"), Type::Any);
        assert!(checker.error_kinds().is_empty());
    }

    #[test]
    fn baseless_restriction_picks_top_type_by_kind() {
        let mut checker = checker_with(
            "resource interface RI {}\nstruct interface SI {}",
            CheckerConfig::default(),
        );
        assert_eq!(
            convert(&mut checker, "@{RI}").to_string(),
            "AnyResource{RI}"
        );
        assert_eq!(convert(&mut checker, "{SI}").to_string(), "AnyStruct{SI}");
        assert!(checker.error_kinds().is_empty());
    }

    #[test]
    fn restriction_must_name_an_interface() {
        let mut checker = checker_with(
            "resource interface I {}\nresource R: I {}",
            CheckerConfig::default(),
        );
        let ty = convert(&mut checker, "@R{Int, Missing, I}");
        assert_eq!(ty.to_string(), "R{I}");
        assert_eq!(
            checker.error_kinds(),
            vec![ErrorKind::InvalidRestrictionType, ErrorKind::UnknownType]
        );
    }

    #[test]
    fn dictionary_keys_must_be_primitive() {
        let mut checker = checker_with("struct S {}", CheckerConfig::default());
        let ty = convert(&mut checker, "{S: Int}");
        assert!(matches!(ty, Type::Dictionary { .. }));
        assert_eq!(checker.error_kinds(), vec![ErrorKind::InvalidDictionaryKeyType]);

        let mut checker = Checker::new();
        assert_eq!(
            convert(&mut checker, "{String: [UInt8]}").to_string(),
            "{String: [UInt8]}"
        );
        assert!(checker.error_kinds().is_empty());
    }

    #[test]
    fn function_and_capability_annotations() {
        let mut checker = Checker::new();
        let ty = convert(&mut checker, "((Int, String): Bool)");
        let Type::Function(function) = &ty else {
            panic!("expected function type, got {ty}");
        };
        assert_eq!(function.parameters.len(), 2);
        assert_eq!(function.return_type, Type::Primitive(PrimitiveType::Bool));

        assert_eq!(
            convert(&mut checker, "Capability<&Int>").to_string(),
            "Capability<&Int>"
        );
    }
}
