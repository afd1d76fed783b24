//! The membership predicate.
//!
//! A [`Query`] holds condition source text and its compiled [`Predicate`]
//! tree. The source can be swapped and recompiled at any time; the view
//! reacts to either by resynchronizing.

pub mod parser;
pub mod path;
pub mod predicate;

pub use path::Path;
pub use predicate::Predicate;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Query {
    source: String,
    root: Predicate,
}

impl Query {
    /// Compile a condition, e.g. `5 <= value AND value < 10`.
    pub fn parse(source: &str) -> Result<Self> {
        let root = parser::parse_condition(source)?;
        Ok(Self { source: source.to_string(), root })
    }

    /// Membership test for a single record.
    #[inline]
    pub fn matches(&self, record: &Value) -> bool {
        predicate::evaluate(&self.root, record)
    }

    /// Re-parse the current source. The compiled tree is only replaced on
    /// success.
    pub fn recompile(&mut self) -> Result<()> {
        self.root = parser::parse_condition(&self.source)?;
        Ok(())
    }

    /// Replace the source and recompile.
    pub fn set_source(&mut self, source: &str) -> Result<()> {
        let root = parser::parse_condition(source)?;
        self.source = source.to_string();
        self.root = root;
        Ok(())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Predicate {
        &self.root
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_and_match() {
        let query = Query::parse("5 <= value AND value < 10").unwrap();
        assert!(query.matches(&json!({"value": 7})));
        assert!(!query.matches(&json!({"value": 12})));
        assert!(!query.matches(&json!({})));
    }

    #[test]
    fn test_set_source_keeps_old_tree_on_error() {
        let mut query = Query::parse("value > 1").unwrap();
        assert!(query.set_source("value >").is_err());
        assert_eq!(query.source(), "value > 1");
        assert!(query.matches(&json!({"value": 2})));
    }

    #[test]
    fn test_serde_round_trip() {
        let query = Query::parse("value >= 15").unwrap();
        let json = serde_json::to_string(&query).unwrap();
        let restored: Query = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, query);
    }
}
