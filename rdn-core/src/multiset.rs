//! Polymorphic multiset specifier for `Process`/`Task` construction.
//!
//! Resolved once at construction time into a canonical `HashMap<String, u32>`;
//! the variant itself is never retained on `Process` or `Task`.

use std::collections::HashMap;

use crate::error::RdnError;

#[derive(Debug, Clone)]
pub enum MultisetSpec {
    Map(HashMap<String, u32>),
    Collection(Vec<String>),
    Scalar(String),
}

impl MultisetSpec {
    pub fn resolve(self) -> HashMap<String, u32> {
        match self {
            MultisetSpec::Map(m) => m,
            MultisetSpec::Collection(items) => {
                let mut m = HashMap::new();
                for key in items {
                    *m.entry(key).or_insert(0) += 1;
                }
                m
            }
            MultisetSpec::Scalar(key) => HashMap::from([(key, 1)]),
        }
    }

    /// Used by the YAML scenario loader, where the shape of a document node
    /// is only known at runtime. This is the one place a malformed multiset
    /// specifier is a genuine (non-compile-time) type error.
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Self, RdnError> {
        match value {
            serde_yaml::Value::Mapping(map) => {
                let mut m = HashMap::new();
                for (k, v) in map {
                    let key = k
                        .as_str()
                        .ok_or_else(|| RdnError::Type("multiset key must be a string".into()))?
                        .to_string();
                    let count = v.as_u64().ok_or_else(|| {
                        RdnError::Type("multiset count must be a non-negative integer".into())
                    })? as u32;
                    m.insert(key, count);
                }
                Ok(MultisetSpec::Map(m))
            }
            serde_yaml::Value::Sequence(items) => {
                let mut keys = Vec::with_capacity(items.len());
                for item in items {
                    let key = item
                        .as_str()
                        .ok_or_else(|| RdnError::Type("multiset item must be a string".into()))?
                        .to_string();
                    keys.push(key);
                }
                Ok(MultisetSpec::Collection(keys))
            }
            serde_yaml::Value::String(s) => Ok(MultisetSpec::Scalar(s.clone())),
            serde_yaml::Value::Null => Ok(MultisetSpec::Map(HashMap::new())),
            other => Err(RdnError::Type(format!(
                "unrecognised multiset specifier: {other:?}"
            ))),
        }
    }
}

impl From<HashMap<String, u32>> for MultisetSpec {
    fn from(m: HashMap<String, u32>) -> Self {
        MultisetSpec::Map(m)
    }
}

impl From<Vec<String>> for MultisetSpec {
    fn from(items: Vec<String>) -> Self {
        MultisetSpec::Collection(items)
    }
}

impl From<Vec<&str>> for MultisetSpec {
    fn from(items: Vec<&str>) -> Self {
        MultisetSpec::Collection(items.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for MultisetSpec {
    fn from(items: [&str; N]) -> Self {
        MultisetSpec::Collection(items.into_iter().map(str::to_string).collect())
    }
}

impl From<&str> for MultisetSpec {
    fn from(key: &str) -> Self {
        MultisetSpec::Scalar(key.to_string())
    }
}

impl From<String> for MultisetSpec {
    fn from(key: String) -> Self {
        MultisetSpec::Scalar(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_resolves_to_single_count() {
        let m = MultisetSpec::from("x").resolve();
        assert_eq!(m.get("x"), Some(&1));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn collection_counts_duplicates() {
        let m = MultisetSpec::from(vec!["x", "x", "y"]).resolve();
        assert_eq!(m.get("x"), Some(&2));
        assert_eq!(m.get("y"), Some(&1));
    }

    #[test]
    fn map_is_used_as_given() {
        let mut src = HashMap::new();
        src.insert("x".to_string(), 2);
        let m = MultisetSpec::from(src.clone()).resolve();
        assert_eq!(m, src);
    }

    #[test]
    fn yaml_string_is_scalar() {
        let v: serde_yaml::Value = serde_yaml::from_str("x").unwrap();
        let m = MultisetSpec::from_yaml(&v).unwrap().resolve();
        assert_eq!(m.get("x"), Some(&1));
    }

    #[test]
    fn yaml_unsupported_shape_is_type_error() {
        let v: serde_yaml::Value = serde_yaml::from_str("42").unwrap();
        assert!(matches!(
            MultisetSpec::from_yaml(&v),
            Err(RdnError::Type(_))
        ));
    }
}
