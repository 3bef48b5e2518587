//! Rich-query selectors.
//!
//! A [`Selector`] is a conjunction of equality conditions over fields of a
//! JSON document. Field paths may use dots to reach nested objects
//! (`"accountData.email"`).

use serde_json::Value;
use std::collections::BTreeMap;

/// Equality predicate over JSON fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    conditions: BTreeMap<String, Value>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`.
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.insert(field.to_string(), value.into());
        self
    }

    /// Require `field` to equal `value` when `value` is present.
    pub fn eq_opt<V: Into<Value>>(self, field: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.eq(field, v),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether `doc` satisfies every condition.
    pub fn matches(&self, doc: &Value) -> bool {
        if !doc.is_object() {
            return false;
        }
        self.conditions
            .iter()
            .all(|(path, expected)| lookup(doc, path) == Some(expected))
    }

    /// Parse `bytes` as JSON and match. Non-JSON values never match.
    pub fn matches_bytes(&self, bytes: &[u8]) -> bool {
        serde_json::from_slice::<Value>(bytes)
            .map(|doc| self.matches(&doc))
            .unwrap_or(false)
    }
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |node, segment| node.get(segment))
}
