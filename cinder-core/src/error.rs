#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use std::fmt;

use cinder_ast::Span;
use miette::Diagnostic;
use thiserror::Error;

use crate::types::Type;

/// Stable tag for each diagnostic kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TypeMismatch,
    InvalidNonConformanceRestriction,
    UnknownType,
    NotDeclared,
    NotCallable,
    ArgumentCount,
    IncorrectArgumentLabel,
    InvalidRestrictedType,
    InvalidRestrictionType,
    RestrictionKindMismatch,
    InvalidDictionaryKeyType,
    InvalidIntegerLiteralRange,
    NonReferenceTypeReference,
    MissingCreate,
    InvalidConstruction,
    NotIndexable,
    NotDeclaredMember,
    InvalidRestrictedTypeMemberAccess,
    DuplicateDeclaration,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::InvalidNonConformanceRestriction => "InvalidNonConformanceRestriction",
            ErrorKind::UnknownType => "UnknownType",
            ErrorKind::NotDeclared => "NotDeclared",
            ErrorKind::NotCallable => "NotCallable",
            ErrorKind::ArgumentCount => "ArgumentCount",
            ErrorKind::IncorrectArgumentLabel => "IncorrectArgumentLabel",
            ErrorKind::InvalidRestrictedType => "InvalidRestrictedType",
            ErrorKind::InvalidRestrictionType => "InvalidRestrictionType",
            ErrorKind::RestrictionKindMismatch => "RestrictionKindMismatch",
            ErrorKind::InvalidDictionaryKeyType => "InvalidDictionaryKeyType",
            ErrorKind::InvalidIntegerLiteralRange => "InvalidIntegerLiteralRange",
            ErrorKind::NonReferenceTypeReference => "NonReferenceTypeReference",
            ErrorKind::MissingCreate => "MissingCreate",
            ErrorKind::InvalidConstruction => "InvalidConstruction",
            ErrorKind::NotIndexable => "NotIndexable",
            ErrorKind::NotDeclaredMember => "NotDeclaredMember",
            ErrorKind::InvalidRestrictedTypeMemberAccess => "InvalidRestrictedTypeMemberAccess",
            ErrorKind::DuplicateDeclaration => "DuplicateDeclaration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum SemanticError {
    #[error("mismatched types: expected `{expected}`, got `{actual}`")]
    #[diagnostic(code(cinder::sema::type_mismatch))]
    TypeMismatch {
        expected: Type,
        actual: Type,
        #[label("type mismatch")]
        span: Span,
    },

    #[error("restricted type `{composite}` cannot be restricted by `{interface}`: it does not conform to it")]
    #[diagnostic(
        code(cinder::sema::non_conformance_restriction),
        help("add the interface to the composite's conformances, or drop the restriction")
    )]
    InvalidNonConformanceRestriction {
        interface: Type,
        composite: Type,
        #[label]
        span: Span,
    },

    #[error("cannot find type `{name}` in this scope")]
    #[diagnostic(code(cinder::sema::unknown_type))]
    UnknownType {
        name: String,
        #[label("not found")]
        span: Span,
    },

    #[error("cannot find `{name}` in this scope")]
    #[diagnostic(code(cinder::sema::not_declared))]
    NotDeclared {
        name: String,
        #[label("not declared")]
        span: Span,
    },

    #[error("cannot call type `{ty}`")]
    #[diagnostic(code(cinder::sema::not_callable))]
    NotCallable {
        ty: Type,
        #[label]
        span: Span,
    },

    #[error("incorrect number of arguments: expected {expected}, got {actual}")]
    #[diagnostic(code(cinder::sema::argument_count))]
    ArgumentCount {
        expected: usize,
        actual: usize,
        #[label]
        span: Span,
    },

    #[error("incorrect argument label: expected `{expected}`, got `{actual}`")]
    #[diagnostic(code(cinder::sema::argument_label))]
    IncorrectArgumentLabel {
        expected: String,
        actual: String,
        #[label]
        span: Span,
    },

    #[error("cannot restrict type `{ty}`: only composites and `Any`, `AnyStruct`, `AnyResource` can be restricted")]
    #[diagnostic(code(cinder::sema::invalid_restricted_type))]
    InvalidRestrictedType {
        ty: Type,
        #[label]
        span: Span,
    },

    #[error("cannot restrict using non-interface type `{ty}`")]
    #[diagnostic(code(cinder::sema::invalid_restriction_type))]
    InvalidRestrictionType {
        ty: Type,
        #[label]
        span: Span,
    },

    #[error("restriction `{restriction}` has a different kind than restricted type `{ty}`")]
    #[diagnostic(code(cinder::sema::restriction_kind_mismatch))]
    RestrictionKindMismatch {
        restriction: Type,
        ty: Type,
        #[label]
        span: Span,
    },

    #[error("cannot use type `{ty}` as dictionary key type")]
    #[diagnostic(code(cinder::sema::dictionary_key))]
    InvalidDictionaryKeyType {
        ty: Type,
        #[label]
        span: Span,
    },

    #[error("integer literal out of range for `{ty}`: expected value in {min}..={max}")]
    #[diagnostic(code(cinder::sema::integer_literal_range))]
    InvalidIntegerLiteralRange {
        ty: Type,
        min: String,
        max: String,
        #[label]
        span: Span,
    },

    #[error("cannot create reference: expected reference type, got `{ty}`")]
    #[diagnostic(code(cinder::sema::non_reference_type))]
    NonReferenceTypeReference {
        ty: Type,
        #[label]
        span: Span,
    },

    #[error("cannot construct resource `{ty}` without `create`")]
    #[diagnostic(code(cinder::sema::missing_create))]
    MissingCreate {
        ty: Type,
        #[label]
        span: Span,
    },

    #[error("cannot `create` non-resource value")]
    #[diagnostic(code(cinder::sema::invalid_construction))]
    InvalidConstruction {
        #[label]
        span: Span,
    },

    #[error("cannot index into value of type `{ty}`")]
    #[diagnostic(code(cinder::sema::not_indexable))]
    NotIndexable {
        ty: Type,
        #[label]
        span: Span,
    },

    #[error("value of type `{ty}` has no member `{name}`")]
    #[diagnostic(code(cinder::sema::not_declared_member))]
    NotDeclaredMember {
        name: String,
        ty: Type,
        #[label]
        span: Span,
    },

    #[error("cannot access `{name}`: member of restricted type `{ty}` is not declared by any restriction")]
    #[diagnostic(code(cinder::sema::restricted_member_access))]
    InvalidRestrictedTypeMemberAccess {
        name: String,
        ty: Type,
        #[label]
        span: Span,
    },

    #[error("cannot redeclare `{name}`: it is already declared")]
    #[diagnostic(code(cinder::sema::duplicate_declaration))]
    DuplicateDeclaration {
        name: String,
        #[label("redeclared here")]
        span: Span,
    },
}

impl SemanticError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SemanticError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            SemanticError::InvalidNonConformanceRestriction { .. } => {
                ErrorKind::InvalidNonConformanceRestriction
            }
            SemanticError::UnknownType { .. } => ErrorKind::UnknownType,
            SemanticError::NotDeclared { .. } => ErrorKind::NotDeclared,
            SemanticError::NotCallable { .. } => ErrorKind::NotCallable,
            SemanticError::ArgumentCount { .. } => ErrorKind::ArgumentCount,
            SemanticError::IncorrectArgumentLabel { .. } => ErrorKind::IncorrectArgumentLabel,
            SemanticError::InvalidRestrictedType { .. } => ErrorKind::InvalidRestrictedType,
            SemanticError::InvalidRestrictionType { .. } => ErrorKind::InvalidRestrictionType,
            SemanticError::RestrictionKindMismatch { .. } => ErrorKind::RestrictionKindMismatch,
            SemanticError::InvalidDictionaryKeyType { .. } => ErrorKind::InvalidDictionaryKeyType,
            SemanticError::InvalidIntegerLiteralRange { .. } => {
                ErrorKind::InvalidIntegerLiteralRange
            }
            SemanticError::NonReferenceTypeReference { .. } => {
                ErrorKind::NonReferenceTypeReference
            }
            SemanticError::MissingCreate { .. } => ErrorKind::MissingCreate,
            SemanticError::InvalidConstruction { .. } => ErrorKind::InvalidConstruction,
            SemanticError::NotIndexable { .. } => ErrorKind::NotIndexable,
            SemanticError::NotDeclaredMember { .. } => ErrorKind::NotDeclaredMember,
            SemanticError::InvalidRestrictedTypeMemberAccess { .. } => {
                ErrorKind::InvalidRestrictedTypeMemberAccess
            }
            SemanticError::DuplicateDeclaration { .. } => ErrorKind::DuplicateDeclaration,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            SemanticError::TypeMismatch { span, .. }
            | SemanticError::InvalidNonConformanceRestriction { span, .. }
            | SemanticError::UnknownType { span, .. }
            | SemanticError::NotDeclared { span, .. }
            | SemanticError::NotCallable { span, .. }
            | SemanticError::ArgumentCount { span, .. }
            | SemanticError::IncorrectArgumentLabel { span, .. }
            | SemanticError::InvalidRestrictedType { span, .. }
            | SemanticError::InvalidRestrictionType { span, .. }
            | SemanticError::RestrictionKindMismatch { span, .. }
            | SemanticError::InvalidDictionaryKeyType { span, .. }
            | SemanticError::InvalidIntegerLiteralRange { span, .. }
            | SemanticError::NonReferenceTypeReference { span, .. }
            | SemanticError::MissingCreate { span, .. }
            | SemanticError::InvalidConstruction { span }
            | SemanticError::NotIndexable { span, .. }
            | SemanticError::NotDeclaredMember { span, .. }
            | SemanticError::InvalidRestrictedTypeMemberAccess { span, .. }
            | SemanticError::DuplicateDeclaration { span, .. } => *span,
        }
    }
}

/// Every diagnostic reported while checking one program.
#[derive(Debug, Error, Diagnostic)]
#[error("semantic check failed with {} error(s)", .errors.len())]
#[diagnostic(code(cinder::sema))]
pub struct CheckerError {
    #[related]
    pub errors: Vec<SemanticError>,
}

impl CheckerError {
    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.errors.iter().map(SemanticError::kind).collect()
    }
}
