use mlrv_compiler::{compile, eval_source, CompileError};

// ── Lexical ──────────────────────────────────────────────────────────────

#[test]
fn stray_character_is_a_lexical_error() {
    let err = compile("1 + $").unwrap_err();
    assert!(matches!(err, CompileError::Lexical(_)));
    assert!(err.to_string().contains('$'), "got: {err}");
}

// ── Parse ────────────────────────────────────────────────────────────────

#[test]
fn missing_operand_is_a_parse_error() {
    let err = compile("1 +").unwrap_err();
    assert!(matches!(err, CompileError::Parse { .. }));
}

#[test]
fn parse_errors_carry_line_and_column() {
    let err = compile("let v <- 1 in\nv +\nend").unwrap_err();
    match err {
        CompileError::Parse { line, .. } => assert_eq!(line, 3),
        other => panic!("expected parse error, got {other}"),
    }
}

#[test]
fn let_without_in_is_rejected() {
    let err = compile("let v <- 1 v end").unwrap_err();
    assert!(err.to_string().contains("expected 'in'"), "got: {err}");
}

// ── Type ─────────────────────────────────────────────────────────────────

#[test]
fn adding_a_boolean_is_a_type_error() {
    let err = compile("1 + true").unwrap_err();
    assert!(matches!(err, CompileError::Type(_)));
    assert!(err.to_string().contains("expected int"), "got: {err}");
}

#[test]
fn branching_on_an_integer_is_a_type_error() {
    let err = compile("if 1 then 2 else 3").unwrap_err();
    assert!(matches!(err, CompileError::Type(_)));
}

#[test]
fn unbound_variable_is_a_type_error() {
    let err = compile("x + 1").unwrap_err();
    assert!(err.to_string().contains("undefined variable 'x'"), "got: {err}");
}

#[test]
fn mismatched_if_arms_are_a_type_error() {
    let err = compile("if true then 1 else false").unwrap_err();
    assert!(err.to_string().contains("branches disagree"), "got: {err}");
}

// ── Evaluation ───────────────────────────────────────────────────────────

#[test]
fn interpreter_reports_division_by_zero() {
    let err = eval_source("1 / 0").unwrap_err();
    assert!(matches!(err, CompileError::Eval(_)));
    assert!(err.to_string().contains("division by zero"), "got: {err}");
}

#[test]
fn type_checking_runs_before_evaluation() {
    // Even though the right arm never evaluates, it must still type-check.
    let err = eval_source("if true then 1 else false").unwrap_err();
    assert!(matches!(err, CompileError::Type(_)));
}
