use std::sync::Arc;

use crate::error::{Error, Result};

/// Snapshot of a binary expression: the operator token and the spelled-out
/// operands. Operators decide applicability and replacement from this view
/// alone; they never see or touch the tree.
#[derive(Debug, Clone)]
pub struct BinaryExpr {
    pub op: String,
    pub left: String,
    pub right: String,
}

pub trait Operator: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;
    fn applies(&self, expr: &BinaryExpr) -> bool;
    fn replacement(&self, expr: &BinaryExpr) -> Option<&'static str>;
}

/// Flips integer arithmetic: `+` ↔ `-`, `*` ↔ `/`.
#[derive(Debug)]
pub struct ArithmeticFlip;

impl Operator for ArithmeticFlip {
    fn name(&self) -> &'static str {
        "arithmetic_flip"
    }

    fn applies(&self, expr: &BinaryExpr) -> bool {
        self.replacement(expr).is_some()
    }

    fn replacement(&self, expr: &BinaryExpr) -> Option<&'static str> {
        match expr.op.as_str() {
            "+" => Some("-"),
            "-" => Some("+"),
            "*" => Some("/"),
            "/" => Some("*"),
            _ => None,
        }
    }
}

/// Negates comparisons: `==` ↔ `!=`, `<` ↔ `>=`, `<=` ↔ `>`.
#[derive(Debug)]
pub struct ConditionNegation;

impl Operator for ConditionNegation {
    fn name(&self) -> &'static str {
        "condition_negation"
    }

    fn applies(&self, expr: &BinaryExpr) -> bool {
        self.replacement(expr).is_some()
    }

    fn replacement(&self, expr: &BinaryExpr) -> Option<&'static str> {
        match expr.op.as_str() {
            "==" => Some("!="),
            "!=" => Some("=="),
            "<" => Some(">="),
            "<=" => Some(">"),
            ">" => Some("<="),
            ">=" => Some("<"),
            _ => None,
        }
    }
}

pub fn all_operators() -> Vec<Arc<dyn Operator>> {
    vec![Arc::new(ArithmeticFlip), Arc::new(ConditionNegation)]
}

/// Resolve an operator selection: `"all"` or a comma-delimited list of
/// names. List order is preserved so mutant ID assignment follows it.
/// Unknown names are fatal.
pub fn select_operators(spec: &str) -> Result<Vec<Arc<dyn Operator>>> {
    if spec == "all" {
        return Ok(all_operators());
    }
    let mut selected: Vec<Arc<dyn Operator>> = Vec::new();
    for name in spec.split(',') {
        let name = name.trim();
        let op = all_operators()
            .into_iter()
            .find(|op| op.name() == name)
            .ok_or_else(|| Error::UnknownOperator(name.to_string()))?;
        selected.push(op);
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(op: &str) -> BinaryExpr {
        BinaryExpr {
            op: op.to_string(),
            left: "a".to_string(),
            right: "b".to_string(),
        }
    }

    #[test]
    fn arithmetic_flip_is_an_involution() {
        let op = ArithmeticFlip;
        for token in ["+", "-", "*", "/"] {
            let flipped = op.replacement(&expr(token)).unwrap();
            let back = op.replacement(&expr(flipped)).unwrap();
            assert_eq!(back, token);
        }
    }

    #[test]
    fn condition_negation_is_an_involution() {
        let op = ConditionNegation;
        for token in ["==", "!=", "<", "<=", ">", ">="] {
            let negated = op.replacement(&expr(token)).unwrap();
            let back = op.replacement(&expr(negated)).unwrap();
            assert_eq!(back, token);
        }
    }

    #[test]
    fn arithmetic_flip_rejects_comparisons() {
        assert!(!ArithmeticFlip.applies(&expr("==")));
        assert!(!ArithmeticFlip.applies(&expr("%")));
    }

    #[test]
    fn condition_negation_rejects_arithmetic() {
        assert!(!ConditionNegation.applies(&expr("+")));
        assert!(!ConditionNegation.applies(&expr("&&")));
    }

    #[test]
    fn select_all_returns_builtins_in_registry_order() {
        let ops = select_operators("all").unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].name(), "arithmetic_flip");
        assert_eq!(ops[1].name(), "condition_negation");
    }

    #[test]
    fn select_csv_preserves_order() {
        let ops = select_operators("condition_negation,arithmetic_flip").unwrap();
        assert_eq!(ops[0].name(), "condition_negation");
        assert_eq!(ops[1].name(), "arithmetic_flip");
    }

    #[test]
    fn select_unknown_name_fails() {
        let err = select_operators("arithmetic_flip,bogus").unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }
}
