use cinder_core::{Checker, CheckerConfig, ErrorKind, Location, SemanticError, Type, check_programs};

fn check(src: &str) -> (Checker, Vec<ErrorKind>) {
    let program = cinder_parse::parse_source(src).expect("parse");
    let mut checker = Checker::new();
    let kinds = match checker.check_program(&program) {
        Ok(()) => Vec::new(),
        Err(err) => err.kinds(),
    };
    (checker, kinds)
}

fn global(checker: &Checker, name: &str) -> String {
    checker
        .global_value(name)
        .map(Type::to_string)
        .unwrap_or_else(|| panic!("no global `{name}`"))
}

#[test]
fn dropping_a_restriction_yields_the_unrestricted_type() {
    let src = "resource interface I {}\n\
               resource R: I {}\n\
               let r: @R{I} <- create R()\n\
               let r2 <- r as @R\n";
    let (checker, kinds) = check(src);
    assert!(kinds.is_empty(), "{kinds:?}");
    assert_eq!(global(&checker, "r2"), "R");
}

#[test]
fn widening_a_restriction_set_on_the_same_composite() {
    let src = "resource interface I1 {}\n\
               resource interface I2 {}\n\
               resource R: I1, I2 {}\n\
               let r: @R{I1} <- create R()\n\
               let r2 <- r as @R{I1, I2}\n";
    let (checker, kinds) = check(src);
    assert!(kinds.is_empty(), "{kinds:?}");
    assert_eq!(global(&checker, "r2"), "R{I1, I2}");
}

#[test]
fn static_cast_cannot_downcast_but_failable_cast_can() {
    let types = "resource interface RI {}\nresource R: RI {}\n";
    let (_, kinds) = check(&format!(
        "{types}let r: @AnyResource{{RI}} <- create R()\nlet r2 <- r as @R{{RI}}\n"
    ));
    assert_eq!(kinds, vec![ErrorKind::TypeMismatch]);

    let (checker, kinds) = check(&format!(
        "{types}let r: @AnyResource{{RI}} <- create R()\nlet r2 <- r as? @R{{RI}}\n"
    ));
    assert!(kinds.is_empty(), "{kinds:?}");
    assert_eq!(global(&checker, "r2"), "R{RI}?");
}

#[test]
fn type_mismatch_names_expected_and_actual() {
    let program = cinder_parse::parse_source("let x: Bool = 1\n").expect("parse");
    let err = Checker::new().check_program(&program).expect_err("mismatch");
    let [SemanticError::TypeMismatch { expected, actual, .. }] = err.errors.as_slice() else {
        panic!("unexpected errors: {:?}", err.kinds());
    };
    assert_eq!(*expected, Type::BOOL);
    assert_eq!(*actual, Type::INT);
}

#[test]
fn integer_literals_are_range_checked() {
    let (_, kinds) = check("let a: UInt8 = 256\nlet b: Int8 = -128\nlet c: UInt = -1\n");
    assert_eq!(
        kinds,
        vec![
            ErrorKind::InvalidIntegerLiteralRange,
            ErrorKind::InvalidIntegerLiteralRange
        ]
    );

    let (checker, kinds) = check("let a: Int8? = 1\nlet b = -5\n");
    assert!(kinds.is_empty(), "{kinds:?}");
    assert_eq!(global(&checker, "a"), "Int8?");
    assert_eq!(global(&checker, "b"), "Int");
}

#[test]
fn integer_literals_wider_than_128_bits() {
    let two_128 = "340282366920938463463374607431768211456";
    let int256_min =
        "-57896044618658097763942835484737091784889963434911648497733316612834364579328";
    let uint256_max =
        "115792089237316195423570985008687907853269984665640564039457584007913129639935";
    let src = format!(
        "let a: UInt256 = {two_128}\n\
         let b: Int = {two_128}\n\
         let c: Int256 = {int256_min}\n\
         let d: UInt256 = {uint256_max}\n\
         let e: Integer = -{uint256_max}{uint256_max}\n"
    );
    let (checker, kinds) = check(&src);
    assert!(kinds.is_empty(), "{kinds:?}");
    assert_eq!(global(&checker, "c"), "Int256");

    // One past each bound.
    let src = format!(
        "let a: UInt128 = {two_128}\n\
         let b: UInt256 = 0x1{zeros}\n\
         let c: Int256 = {int256_min}0\n",
        zeros = "0".repeat(64),
    );
    let (_, kinds) = check(&src);
    assert_eq!(kinds, vec![ErrorKind::InvalidIntegerLiteralRange; 3]);
}

#[test]
fn members_are_only_visible_through_restrictions() {
    let src = "resource interface HasBalance {\n\
               let balance: Int\n\
               }\n\
               resource Vault: HasBalance {\n\
               let balance: Int\n\
               let secret: String\n\
               init(balance: Int) {\n\
               self.balance = balance\n\
               self.secret = \"s\"\n\
               }\n\
               }\n\
               fun read(v: &Vault{HasBalance}): Int {\n\
               let s = v.secret\n\
               let m = v.missing\n\
               return v.balance\n\
               }\n";
    let (_, kinds) = check(src);
    assert_eq!(
        kinds,
        vec![
            ErrorKind::InvalidRestrictedTypeMemberAccess,
            ErrorKind::NotDeclaredMember
        ]
    );
}

#[test]
fn resources_need_create_and_structs_reject_it() {
    let src = "resource R {}\n\
               struct S {}\n\
               fun f() {\n\
               let r <- R()\n\
               let s = create S()\n\
               let ok <- create R()\n\
               destroy r\n\
               destroy ok\n\
               }\n";
    let (_, kinds) = check(src);
    assert_eq!(
        kinds,
        vec![ErrorKind::MissingCreate, ErrorKind::InvalidConstruction]
    );
}

#[test]
fn calls_check_arity_labels_and_argument_types() {
    let src = "fun add(a: Int, _ b: Int): Int {\n\
               return a + b\n\
               }\n\
               let x = add(a: 1, 2)\n\
               let y = add(1, 2)\n\
               let z = add(a: 1, \"two\")\n\
               let w = add(a: 1)\n\
               let v = x(1)\n";
    let (checker, kinds) = check(src);
    assert_eq!(
        kinds,
        vec![
            ErrorKind::IncorrectArgumentLabel,
            ErrorKind::TypeMismatch,
            ErrorKind::ArgumentCount,
            ErrorKind::NotCallable
        ]
    );
    assert_eq!(global(&checker, "x"), "Int");
}

#[test]
fn unknown_names_and_redeclarations() {
    let src = "struct S {}\n\
               struct S {}\n\
               let a = b\n\
               let c: Missing = 1\n\
               let a = 2\n";
    let (_, kinds) = check(src);
    assert_eq!(
        kinds,
        vec![
            ErrorKind::DuplicateDeclaration,
            ErrorKind::NotDeclared,
            ErrorKind::UnknownType,
            ErrorKind::DuplicateDeclaration
        ]
    );
}

#[test]
fn conformance_must_name_an_interface() {
    let (_, kinds) = check("struct S {}\nstruct T: S, Missing {}\n");
    assert_eq!(kinds, vec![ErrorKind::UnknownType, ErrorKind::UnknownType]);
}

#[test]
fn restricted_type_validation() {
    let src = "resource interface RI {}\n\
               struct interface SI {}\n\
               struct S {}\n\
               fun f(a: Int{SI}, b: @AnyResource{SI}, c: S{RI}, d: {Int: S}) {}\n";
    let (_, kinds) = check(src);
    assert_eq!(
        kinds,
        vec![
            ErrorKind::InvalidRestrictedType,
            ErrorKind::RestrictionKindMismatch,
            ErrorKind::InvalidNonConformanceRestriction
        ]
    );

    let (_, kinds) = check("struct S {}\nfun f(d: {S: Int}, e: S{Int}) {}\n");
    assert_eq!(
        kinds,
        vec![
            ErrorKind::InvalidDictionaryKeyType,
            ErrorKind::InvalidRestrictionType
        ]
    );
}

#[test]
fn reference_expressions_need_a_reference_type() {
    let src = "struct S {}\n\
               let s = S()\n\
               let r = &s as S\n\
               let t = &s as &Int\n";
    let (_, kinds) = check(src);
    assert_eq!(
        kinds,
        vec![ErrorKind::NonReferenceTypeReference, ErrorKind::TypeMismatch]
    );
}

#[test]
fn optional_binding_unwraps_and_requires_an_optional() {
    let src = "fun f(x: Int?): Int {\n\
               if let y = x {\n\
               return y\n\
               }\n\
               if let z = 1 {\n\
               return z\n\
               }\n\
               return x ?? 0\n\
               }\n";
    let (_, kinds) = check(src);
    assert_eq!(kinds, vec![ErrorKind::TypeMismatch]);
}

#[test]
fn returns_are_checked_against_the_declared_type() {
    let src = "fun f(): String {\n\
               return 1\n\
               }\n\
               fun g() {\n\
               return\n\
               }\n\
               fun h(): Int {\n\
               return\n\
               }\n";
    let (_, kinds) = check(src);
    assert_eq!(kinds, vec![ErrorKind::TypeMismatch, ErrorKind::TypeMismatch]);
}

#[test]
fn indexing_arrays_and_dictionaries() {
    let src = "let xs = [1, 2, 3]\n\
               let d = {\"a\": 1}\n\
               let a = xs[0]\n\
               let b = d[\"a\"]\n\
               let c = 1[0]\n\
               let e = xs[\"x\"]\n";
    let (checker, kinds) = check(src);
    assert_eq!(kinds, vec![ErrorKind::NotIndexable, ErrorKind::TypeMismatch]);
    assert_eq!(global(&checker, "xs"), "[Int]");
    assert_eq!(global(&checker, "a"), "Int");
    assert_eq!(global(&checker, "b"), "Int?");
}

#[test]
fn force_unwrap_requires_an_optional() {
    let (checker, kinds) = check("let a: Int? = 1\nlet b = a!\nlet c = b!\n");
    assert_eq!(kinds, vec![ErrorKind::TypeMismatch]);
    assert_eq!(global(&checker, "b"), "Int");
}

#[test]
fn runtime_type_constructors_are_callable_globals() {
    let src = "fun f(t: Type): Type? {\n\
               let o: Type = OptionalType(t)\n\
               let r = ReferenceType(true, o)\n\
               return RestrictedType(nil, [\"S.test.I\"])\n\
               }\n";
    let (checker, kinds) = check(src);
    assert!(kinds.is_empty(), "{kinds:?}");
    assert_eq!(global(&checker, "CapabilityType"), "((Type): Type?)");
}

#[test]
fn contracts_are_global_values_and_events_are_constructors() {
    let src = "contract C {\n\
               let total: Int\n\
               fun get(): Int { return self.total }\n\
               }\n\
               event Deposited(amount: UInt64)\n\
               let n = C.get()\n\
               let e = Deposited(amount: 10)\n";
    let (checker, kinds) = check(src);
    assert!(kinds.is_empty(), "{kinds:?}");
    assert_eq!(global(&checker, "n"), "Int");
    assert_eq!(global(&checker, "e"), "Deposited");
}

#[test]
fn event_values_have_the_event_type() {
    let src = "event Deposited(amount: UInt64)\n\
               let e = Deposited(amount: 10)\n\
               let x: Deposited = e\n\
               fun emit(): Deposited { return Deposited(amount: 1) }\n";
    let (checker, kinds) = check(src);
    assert!(kinds.is_empty(), "{kinds:?}");
    assert_eq!(global(&checker, "x"), "Deposited");
}

#[test]
fn bodies_see_their_own_parameter_types() {
    let src = "struct A {\n\
               init(flag: Bool) { let b: Bool = flag }\n\
               fun get(v: Int8): Int8 { return v }\n\
               }\n\
               struct B {\n\
               init(flag: Int8) { let i: Int8 = flag }\n\
               fun get(v: Bool): Bool { return v }\n\
               }\n\
               fun get(v: String): String { return v }\n";
    let (_, kinds) = check(src);
    assert!(kinds.is_empty(), "{kinds:?}");

    let (_, kinds) = check("struct A { fun get(v: Int8): Bool { return v } }\n");
    assert_eq!(kinds, vec![ErrorKind::TypeMismatch]);
}

#[test]
fn any_requires_the_configuration_flag() {
    let (_, kinds) = check("let x: Any = 1\n");
    assert_eq!(kinds, vec![ErrorKind::UnknownType]);

    let program = cinder_parse::parse_source("let x: Any = 1\n").expect("parse");
    let mut checker = Checker::with_config(CheckerConfig::default().with_any_type(true));
    checker.check_program(&program).expect("Any enabled");
}

#[test]
fn declared_types_carry_the_program_location() {
    let program = cinder_parse::parse_source("struct S {}\n").expect("parse");
    let config = CheckerConfig::default().with_location(Location::Transaction(vec![0xab]));
    let mut checker = Checker::with_config(config);
    checker.check_program(&program).expect("sema");
    let ty = checker.global_type("S").expect("S declared");
    assert_eq!(ty.qualified_string(), "t.ab.S");
}

#[test]
fn every_expression_is_typed_once() {
    let src = "let xs = [1, -2, 3 as Int8]\n";
    let program = cinder_parse::parse_source(src).expect("parse");
    let mut checker = Checker::new();
    checker.check_program(&program).expect("sema");
    // literal 1, literal 2, negation, literal 3, cast, array
    assert_eq!(checker.elaboration().expression_count(), 6);
}

#[test]
fn independent_programs_check_in_parallel() {
    let sources = [
        "struct S {}\nlet s = S()\n",
        "let x: Bool = 1\n",
        "resource R {}\nfun f() { let r <- create R()\ndestroy r }\n",
    ];
    let programs: Vec<_> = sources
        .iter()
        .map(|src| cinder_parse::parse_source(src).expect("parse"))
        .collect();

    let results = check_programs(&programs, &CheckerConfig::default());
    assert_eq!(results.len(), 3);
    assert!(results[0].1.is_ok());
    assert!(results[1].1.is_err());
    assert!(results[2].1.is_ok());
    assert!(results[0].0.global_type("S").is_some());
    assert!(results[1].0.global_type("S").is_none());
}
