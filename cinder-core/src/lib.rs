#![forbid(unsafe_code)]

mod builtins;
mod cast;
mod config;
mod convert;
mod elaboration;
mod error;
mod location;
mod restriction;
mod sema;
mod subtype;
mod types;

use cinder_ast::Program;
use rayon::prelude::*;

pub use builtins::{RuntimeTypeConstructor, all_integer_types, base_type, runtime_type_constructors};
pub use cast::{CastResult, check_cast, is_dynamic_cast_plausible, is_static_cast_allowed};
pub use config::CheckerConfig;
pub use elaboration::{CastRecord, Elaboration};
pub use error::{CheckerError, ErrorKind, SemanticError};
pub use location::{Location, LocationError, TypeId, decode_type_id};
pub use restriction::{restrict, validate_restrictions};
pub use sema::Checker;
pub use subtype::{is_subtype, is_unauthorized_reference_subtype};
pub use types::{
    CompositeType, FunctionType, IntegerWidth, InterfaceSet, InterfaceType, Parameter,
    PrimitiveType, RestrictedType, Type,
};

/// Check independent programs in parallel, each with its own checker.
pub fn check_programs(
    programs: &[Program],
    config: &CheckerConfig,
) -> Vec<(Checker, Result<(), CheckerError>)> {
    programs
        .par_iter()
        .map(|program| {
            let mut checker = Checker::with_config(config.clone());
            let result = checker.check_program(program);
            (checker, result)
        })
        .collect()
}
