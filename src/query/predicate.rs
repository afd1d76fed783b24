use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use super::path::Path;

/// Compiled membership test over records.
///
/// Comparison nodes pair a field path with a literal; a record matches when
/// the resolved field value compares accordingly. A missing or incomparable
/// field fails the node, it never errors.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Predicate {
    /// Matches every record (`*` in the condition language).
    All,
    Eq { field: Path, value: Value },
    Neq { field: Path, value: Value },
    Gt { field: Path, value: Value },
    Gte { field: Path, value: Value },
    Lt { field: Path, value: Value },
    Lte { field: Path, value: Value },
    Prefix { field: Path, prefix: String },
    And { predicates: Vec<Predicate> },
    Or { predicates: Vec<Predicate> },
    Not { predicate: Box<Predicate> },
}

/// Resolve a dotted path against a record, one object level per segment.
pub fn resolve_path<'a>(record: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = record;
    for segment in path.segments() {
        current = current.as_object()?.get(segment.as_str())?;
    }
    Some(current)
}

/// Order two JSON values of the same kind. Numbers compare as f64 like the
/// rest of the JSON world; mixed kinds are incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64()?, y.as_f64()?);
            x.partial_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

pub fn evaluate(pred: &Predicate, record: &Value) -> bool {
    match pred {
        Predicate::All => true,
        Predicate::And { predicates } => predicates.iter().all(|p| evaluate(p, record)),
        Predicate::Or { predicates } => predicates.iter().any(|p| evaluate(p, record)),
        Predicate::Not { predicate } => !evaluate(predicate, record),
        Predicate::Prefix { field, prefix } => match resolve_path(record, field) {
            Some(Value::String(s)) => s.starts_with(prefix.as_str()),
            _ => false,
        },
        Predicate::Eq { field, value }
        | Predicate::Neq { field, value }
        | Predicate::Gt { field, value }
        | Predicate::Gte { field, value }
        | Predicate::Lt { field, value }
        | Predicate::Lte { field, value } => {
            let actual = match resolve_path(record, field) {
                Some(v) => v,
                None => return false,
            };
            let ord = match compare_values(actual, value) {
                Some(ord) => ord,
                None => return false,
            };
            match pred {
                Predicate::Eq { .. } => ord == Ordering::Equal,
                Predicate::Neq { .. } => ord != Ordering::Equal,
                Predicate::Gt { .. } => ord == Ordering::Greater,
                Predicate::Gte { .. } => ord != Ordering::Less,
                Predicate::Lt { .. } => ord == Ordering::Less,
                Predicate::Lte { .. } => ord != Ordering::Greater,
                _ => false,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_nested_path() {
        let record = json!({"author": {"name": "alice"}});
        let value = resolve_path(&record, &Path::new("author.name"));
        assert_eq!(value, Some(&json!("alice")));
        assert_eq!(resolve_path(&record, &Path::new("author.missing")), None);
    }

    #[test]
    fn test_numeric_comparisons() {
        let record = json!({"value": 7});
        let gte = Predicate::Gte { field: Path::new("value"), value: json!(5) };
        let lt = Predicate::Lt { field: Path::new("value"), value: json!(10) };
        assert!(evaluate(&gte, &record));
        assert!(evaluate(&lt, &record));
        assert!(!evaluate(&lt, &json!({"value": 10})));
    }

    #[test]
    fn test_missing_field_fails_all_comparisons() {
        let record = json!({"other": 1});
        let field = Path::new("value");
        for pred in [
            Predicate::Eq { field: field.clone(), value: json!(1) },
            Predicate::Neq { field: field.clone(), value: json!(1) },
            Predicate::Gt { field: field.clone(), value: json!(1) },
        ] {
            assert!(!evaluate(&pred, &record));
        }
    }

    #[test]
    fn test_incomparable_kinds_fail() {
        let record = json!({"value": "seven"});
        let pred = Predicate::Gt { field: Path::new("value"), value: json!(5) };
        assert!(!evaluate(&pred, &record));
    }

    #[test]
    fn test_boolean_composition() {
        let record = json!({"value": 7, "active": true});
        let pred = Predicate::And {
            predicates: vec![
                Predicate::Eq { field: Path::new("active"), value: json!(true) },
                Predicate::Not {
                    predicate: Box::new(Predicate::Lt {
                        field: Path::new("value"),
                        value: json!(5),
                    }),
                },
            ],
        };
        assert!(evaluate(&pred, &record));
    }

    #[test]
    fn test_prefix() {
        let record = json!({"id": "user:abc"});
        let pred = Predicate::Prefix { field: Path::new("id"), prefix: "user:".into() };
        assert!(evaluate(&pred, &record));
    }

    #[test]
    fn test_serde_tagged_form() {
        let pred = Predicate::Gte { field: Path::new("value"), value: json!(15) };
        let json = serde_json::to_value(&pred).unwrap();
        assert_eq!(json, json!({"type": "gte", "field": "value", "value": 15}));
        let restored: Predicate = serde_json::from_value(json).unwrap();
        assert_eq!(restored, pred);
    }
}
