use cinder_ast::{
    BigUint, CastKind, Decl, ExprKind, IfTest, Stmt, Transfer, TypeExprKind, UnaryOp,
};
use cinder_parse::{parse_expr, parse_source, parse_source_with_config, parse_type, ParseConfig};

#[test]
fn chained_comparisons_are_rejected() {
    let src = "let x = 0\nlet y = 1\nlet z = 2\nlet a = x < y < z\n";
    let err = parse_source(src).expect_err("expected parse error");
    let msg = err.to_string();
    assert!(
        msg.contains("chained comparisons"),
        "unexpected error message: {msg}"
    );
}

#[test]
fn resource_interface_and_conformance_parse() {
    let src = r#"
resource interface I1 {
    pub fun foo(): Int
}
resource interface I2 {}
pub resource R: I1, I2 {
    pub let balance: Int
    init(balance: Int) {
        self.balance = balance
    }
    pub fun foo(): Int { return self.balance }
}
"#;
    let program = parse_source(src).expect("program should parse");
    assert_eq!(program.decls.len(), 3);
    let Decl::Composite(r) = &program.decls[2] else {
        panic!("expected composite declaration");
    };
    assert_eq!(r.name.node, "R");
    let names: Vec<_> = r.conformances.iter().map(|c| c.node.as_str()).collect();
    assert_eq!(names, vec!["I1", "I2"]);
    assert_eq!(r.members.fields.len(), 1);
    assert_eq!(r.members.initializers.len(), 1);
    assert_eq!(r.members.functions.len(), 1);

    let Decl::Interface(i1) = &program.decls[0] else {
        panic!("expected interface declaration");
    };
    assert!(i1.members.functions[0].body.is_none());
}

#[test]
fn restricted_types_parse_in_all_forms() {
    let ty = parse_type("@R{I1, I2}").expect("restricted type");
    assert!(ty.is_resource);
    let TypeExprKind::Restricted { base, restrictions } = &ty.ty.kind else {
        panic!("expected restricted type, got {:?}", ty.ty.kind);
    };
    assert!(base.is_some());
    assert_eq!(restrictions.len(), 2);

    let ty = parse_type("{I}").expect("anonymous restricted type");
    assert!(matches!(
        &ty.ty.kind,
        TypeExprKind::Restricted { base: None, restrictions } if restrictions.len() == 1
    ));

    let ty = parse_type("R{}").expect("empty restriction set");
    assert!(matches!(
        &ty.ty.kind,
        TypeExprKind::Restricted { restrictions, .. } if restrictions.is_empty()
    ));

    let ty = parse_type("{String: Int}").expect("dictionary type");
    assert!(matches!(ty.ty.kind, TypeExprKind::Dictionary { .. }));
}

#[test]
fn reference_optional_and_array_types_parse() {
    let ty = parse_type("auth &R{I}").expect("authorized reference");
    let TypeExprKind::Reference {
        authorized,
        referenced,
    } = &ty.ty.kind
    else {
        panic!("expected reference type");
    };
    assert!(*authorized);
    assert!(matches!(referenced.kind, TypeExprKind::Restricted { .. }));

    let ty = parse_type("&R").expect("reference");
    assert!(matches!(
        ty.ty.kind,
        TypeExprKind::Reference {
            authorized: false,
            ..
        }
    ));

    let ty = parse_type("@R{I}?").expect("optional restricted");
    let TypeExprKind::Optional(inner) = &ty.ty.kind else {
        panic!("expected optional");
    };
    assert!(matches!(inner.kind, TypeExprKind::Restricted { .. }));

    let ty = parse_type("[Int8; 3]").expect("constant sized array");
    assert!(matches!(
        ty.ty.kind,
        TypeExprKind::ConstantSized { size: 3, .. }
    ));

    let ty = parse_type("[[@R]]").expect("nested array");
    assert!(matches!(ty.ty.kind, TypeExprKind::VariableSized(_)));

    let ty = parse_type("((Int, String): Bool)").expect("function type");
    let TypeExprKind::Function { params, .. } = &ty.ty.kind else {
        panic!("expected function type");
    };
    assert_eq!(params.len(), 2);

    let ty = parse_type("Capability<&R>").expect("capability");
    assert!(matches!(ty.ty.kind, TypeExprKind::Capability(Some(_))));
}

#[test]
fn cast_operators_bind_tighter_than_arithmetic() {
    let expr = parse_expr("1 + x as Int8").expect("expression");
    let ExprKind::Binary { right, .. } = &expr.kind else {
        panic!("expected binary expression");
    };
    assert!(matches!(
        right.kind,
        ExprKind::Cast {
            kind: CastKind::Static,
            ..
        }
    ));

    let expr = parse_expr("r as? @R{I}").expect("dynamic cast");
    assert!(matches!(
        expr.kind,
        ExprKind::Cast {
            kind: CastKind::Dynamic,
            ..
        }
    ));

    let expr = parse_expr("r as! R").expect("force cast");
    assert!(matches!(
        expr.kind,
        ExprKind::Cast {
            kind: CastKind::ForceDynamic,
            ..
        }
    ));
}

#[test]
fn if_let_with_failable_cast_keeps_block_separate() {
    let src = r#"
fun test(r: @R): @R? {
    if let r2 <- r as? @R {
        return <-r2
    } else {
        destroy r
        return nil
    }
}
"#;
    let program = parse_source(src).expect("program should parse");
    let Decl::Function(f) = &program.decls[0] else {
        panic!("expected function");
    };
    let body = f.body.as_ref().expect("body");
    let Stmt::If(if_stmt) = &body.stmts[0] else {
        panic!("expected if statement");
    };
    let IfTest::Binding(binding) = &if_stmt.test else {
        panic!("expected if-let binding");
    };
    assert_eq!(binding.transfer, Transfer::Move);
    let ExprKind::Cast { ty, .. } = &binding.value.kind else {
        panic!("expected cast");
    };
    assert!(matches!(ty.ty.kind, TypeExprKind::Nominal(_)));

    let Stmt::Return(ret) = &if_stmt.then_block.stmts[0] else {
        panic!("expected return");
    };
    let value = ret.value.as_ref().expect("return value");
    assert!(matches!(
        value.kind,
        ExprKind::Unary {
            op: UnaryOp::Move,
            ..
        }
    ));
    let else_block = if_stmt.else_block.as_ref().expect("else block");
    assert!(matches!(else_block.stmts[0], Stmt::Destroy(_)));
}

#[test]
fn reference_expression_parses() {
    let expr = parse_expr("&r as auth &R{I}").expect("reference expression");
    let ExprKind::Reference { ty, .. } = &expr.kind else {
        panic!("expected reference expression");
    };
    assert!(matches!(
        ty.ty.kind,
        TypeExprKind::Reference {
            authorized: true,
            ..
        }
    ));
}

#[test]
fn labelled_arguments_and_create_parse() {
    let expr = parse_expr("create R(balance: 1, 2)").expect("create expression");
    let ExprKind::Create(call) = &expr.kind else {
        panic!("expected create");
    };
    let ExprKind::Call { args, .. } = &call.kind else {
        panic!("expected call");
    };
    assert_eq!(args[0].label.as_ref().map(|l| l.node.as_str()), Some("balance"));
    assert!(args[1].label.is_none());
}

#[test]
fn expression_ids_are_unique() {
    let expr = parse_expr("[1, 2, x as Int8]").expect("array literal");
    let ExprKind::Array(elements) = &expr.kind else {
        panic!("expected array");
    };
    let mut ids: Vec<_> = elements.iter().map(|e| e.id).collect();
    ids.push(expr.id);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);
}

#[test]
fn functions_and_initializers_get_distinct_ids() {
    let src = "struct S {\n\
               init(a: Int) {}\n\
               fun f(): Int { return 1 }\n\
               fun g() {}\n\
               }\n\
               fun f() {}\n";
    let program = parse_source(src).expect("parse");
    let Decl::Composite(s) = &program.decls[0] else {
        panic!("expected composite");
    };
    let Decl::Function(top) = &program.decls[1] else {
        panic!("expected function");
    };
    let mut ids = vec![s.members.initializers[0].id, top.id];
    ids.extend(s.members.functions.iter().map(|f| f.id));
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);
}

#[test]
fn block_comments_and_wide_literals() {
    let src = "/* header */\n\
               let x = /* inline /* nested */ */ 340282366920938463463374607431768211456\n\
               let y = 1 /* a ** b */\n";
    let program = parse_source(src).expect("parse");
    let Decl::Variable(x) = &program.decls[0] else {
        panic!("expected variable");
    };
    let ExprKind::IntLit(value) = &x.value.kind else {
        panic!("expected integer literal");
    };
    assert_eq!(*value, BigUint::from(u128::MAX) + 1u8);
    assert_eq!(program.decls.len(), 2);

    let err = parse_source("let x = 1 /* open").expect_err("unterminated comment");
    assert!(err.to_string().contains("unterminated block comment"), "{err}");
}

#[test]
fn type_depth_limit_is_enforced() {
    let config = ParseConfig {
        max_type_depth: 3,
        ..ParseConfig::default()
    };
    parse_source_with_config("let x: [[Int]] = []", &config).expect("within limit");
    let err = parse_source_with_config("let x: [[[[Int]]]] = []", &config)
        .expect_err("nesting exceeds limit");
    assert!(err.to_string().contains("max type depth"));
}

#[test]
fn expression_depth_limit_is_enforced() {
    let config = ParseConfig {
        max_expression_depth: 4,
        ..ParseConfig::default()
    };
    let err = parse_source_with_config("let x = ((((((1))))))", &config)
        .expect_err("nesting exceeds limit");
    assert!(err.to_string().contains("max expression depth"));
}

#[test]
fn recovery_skips_to_next_declaration() {
    let src = "let a = \nlet b = 1\nfun f() {}\n";
    let (program, errors) =
        cinder_parse::parse_source_with_recovery(src, &ParseConfig::default())
            .expect("lexing succeeds");
    assert_eq!(errors.len(), 1);
    assert_eq!(program.decls.len(), 2);
}
