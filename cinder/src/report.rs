#![forbid(unsafe_code)]

use std::path::Path;

use cinder_ast::Span;
use cinder_core::{CheckerError, Elaboration, Location, RuntimeTypeConstructor, SemanticError};
use miette::Diagnostic;
use serde::Serialize;

pub const CHECK_SCHEMA: &str = "cinder.check.v1";

#[derive(Debug, Clone, Serialize)]
pub struct SpanRange {
    pub offset: usize,
    pub len: usize,
}

impl From<Span> for SpanRange {
    fn from(s: Span) -> Self {
        Self {
            offset: s.offset(),
            len: s.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub schema: &'static str,
    pub location: Location,
    pub ok: bool,
    pub files: Vec<FileReport>,
}

impl CheckReport {
    pub fn new(location: Location, files: Vec<FileReport>) -> Self {
        Self {
            schema: CHECK_SCHEMA,
            location,
            ok: files.iter().all(|f| f.ok),
            files,
        }
    }

    pub fn error_count(&self) -> usize {
        self.files.iter().map(|f| f.diagnostics.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    pub ok: bool,
    pub diagnostics: Vec<DiagnosticReport>,
    pub casts: Vec<CastReport>,
}

impl FileReport {
    pub fn parse_failure(path: &Path, report: &miette::Report) -> Self {
        let span = report
            .labels()
            .and_then(|mut labels| labels.next())
            .map(|label| SpanRange::from(*label.inner()));
        Self {
            path: path.display().to_string(),
            ok: false,
            diagnostics: vec![DiagnosticReport {
                kind: "ParseError".to_string(),
                code: report.code().map(|c| c.to_string()),
                message: report.to_string(),
                span,
            }],
            casts: Vec::new(),
        }
    }

    pub fn checked(
        path: &Path,
        result: &Result<(), CheckerError>,
        elaboration: &Elaboration,
    ) -> Self {
        let diagnostics = match result {
            Ok(()) => Vec::new(),
            Err(err) => err.errors.iter().map(DiagnosticReport::from).collect(),
        };
        let casts = elaboration
            .casts()
            .into_iter()
            .map(|(_, record)| CastReport {
                operator: record.kind.operator(),
                source: record.source.to_string(),
                target: record.target.to_string(),
            })
            .collect();
        Self {
            path: path.display().to_string(),
            ok: diagnostics.is_empty(),
            diagnostics,
            casts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<SpanRange>,
}

impl From<&SemanticError> for DiagnosticReport {
    fn from(err: &SemanticError) -> Self {
        Self {
            kind: err.kind().to_string(),
            code: err.code().map(|c| c.to_string()),
            message: err.to_string(),
            span: Some(err.span().into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CastReport {
    pub operator: &'static str,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuiltinReport {
    pub name: &'static str,
    pub signature: String,
    pub description: &'static str,
}

impl From<&RuntimeTypeConstructor> for BuiltinReport {
    fn from(constructor: &RuntimeTypeConstructor) -> Self {
        Self {
            name: constructor.name,
            signature: constructor.ty().to_string(),
            description: constructor.description,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use cinder_core::{Checker, runtime_type_constructors};

    use super::*;

    fn check(src: &str) -> FileReport {
        let program = cinder_parse::parse_source(src).expect("parse");
        let mut checker = Checker::new();
        let result = checker.check_program(&program);
        FileReport::checked(&PathBuf::from("main.cdc"), &result, checker.elaboration())
    }

    #[test]
    fn type_mismatch_is_reported_with_kind_and_span() {
        let file = check("let x: Bool = 1\n");
        assert!(!file.ok);
        let [diagnostic] = file.diagnostics.as_slice() else {
            panic!("expected one diagnostic, got {:?}", file.diagnostics);
        };
        assert_eq!(diagnostic.kind, "TypeMismatch");
        assert_eq!(diagnostic.code.as_deref(), Some("cinder::sema::type_mismatch"));
        let span = diagnostic.span.as_ref().expect("span");
        assert_eq!((span.offset, span.len), (14, 1));
    }

    #[test]
    fn casts_are_listed_in_source_order() {
        let file = check("let a = 1 as Int8\nlet b = a as? Integer\n");
        assert!(file.ok);
        let casts: Vec<_> = file
            .casts
            .iter()
            .map(|c| (c.operator, c.source.as_str(), c.target.as_str()))
            .collect();
        assert_eq!(casts, vec![("as", "Int8", "Int8"), ("as?", "Int8", "Integer")]);
    }

    #[test]
    fn report_serializes_location_and_schema() {
        let report = CheckReport::new(Location::default(), vec![check("struct S {}\n")]);
        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["schema"], CHECK_SCHEMA);
        assert_eq!(json["ok"], true);
        assert_eq!(json["location"]["Type"], "StringLocation");
        assert_eq!(json["files"][0]["path"], "main.cdc");
    }

    #[test]
    fn builtin_report_renders_signatures() {
        let reports: Vec<BuiltinReport> =
            runtime_type_constructors().iter().map(BuiltinReport::from).collect();
        let optional = reports
            .iter()
            .find(|r| r.name == "OptionalType")
            .expect("OptionalType");
        assert_eq!(optional.signature, "((Type): Type)");
    }
}
