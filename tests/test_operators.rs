use gorgon::operators::{self, ArithmeticFlip, BinaryExpr, ConditionNegation, Operator};

fn expr(op: &str) -> BinaryExpr {
    BinaryExpr {
        op: op.to_string(),
        left: "x".to_string(),
        right: "y".to_string(),
    }
}

// --- arithmetic_flip ---

#[test]
fn arithmetic_flip_maps_plus_to_minus() {
    assert_eq!(ArithmeticFlip.replacement(&expr("+")), Some("-"));
}

#[test]
fn arithmetic_flip_maps_minus_to_plus() {
    assert_eq!(ArithmeticFlip.replacement(&expr("-")), Some("+"));
}

#[test]
fn arithmetic_flip_maps_star_to_slash() {
    assert_eq!(ArithmeticFlip.replacement(&expr("*")), Some("/"));
}

#[test]
fn arithmetic_flip_maps_slash_to_star() {
    assert_eq!(ArithmeticFlip.replacement(&expr("/")), Some("*"));
}

#[test]
fn arithmetic_flip_ignores_modulo_and_shifts() {
    for op in ["%", "<<", ">>", "&", "|"] {
        assert!(!ArithmeticFlip.applies(&expr(op)), "{op} should not apply");
        assert_eq!(ArithmeticFlip.replacement(&expr(op)), None);
    }
}

// --- condition_negation ---

#[test]
fn condition_negation_maps_eq_to_neq() {
    assert_eq!(ConditionNegation.replacement(&expr("==")), Some("!="));
    assert_eq!(ConditionNegation.replacement(&expr("!=")), Some("=="));
}

#[test]
fn condition_negation_maps_lt_to_gte() {
    assert_eq!(ConditionNegation.replacement(&expr("<")), Some(">="));
    assert_eq!(ConditionNegation.replacement(&expr(">=")), Some("<"));
}

#[test]
fn condition_negation_maps_lte_to_gt() {
    assert_eq!(ConditionNegation.replacement(&expr("<=")), Some(">"));
    assert_eq!(ConditionNegation.replacement(&expr(">")), Some("<="));
}

#[test]
fn condition_negation_ignores_logical_operators() {
    for op in ["&&", "||"] {
        assert!(!ConditionNegation.applies(&expr(op)), "{op} should not apply");
    }
}

// --- operators are stateless and pure ---

#[test]
fn replacement_does_not_depend_on_operands() {
    let a = BinaryExpr {
        op: "+".to_string(),
        left: "count".to_string(),
        right: "offset * 2".to_string(),
    };
    let b = expr("+");
    assert_eq!(
        ArithmeticFlip.replacement(&a),
        ArithmeticFlip.replacement(&b)
    );
}

// --- registry selection ---

#[test]
fn select_single_operator() {
    let ops = operators::select_operators("arithmetic_flip").unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].name(), "arithmetic_flip");
}

#[test]
fn select_rejects_unknown_operator() {
    assert!(operators::select_operators("nope").is_err());
}

#[test]
fn select_trims_whitespace_around_names() {
    let ops = operators::select_operators("arithmetic_flip, condition_negation").unwrap();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[1].name(), "condition_negation");
}
