#![forbid(unsafe_code)]

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Functions whose frames are interesting, keyed by a function name suffix,
/// each with the ordered expressions to capture there.
///
/// Keys are matched with "ends with" so that `execStmt` matches
/// `pkg/sql.(*connExecutor).execStmt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FramesOfInterestSpec(BTreeMap<String, Vec<String>>);

impl FramesOfInterestSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, function: impl Into<String>, exprs: &[&str]) -> Self {
        self.insert(function, exprs.iter().map(|expr| (*expr).to_owned()));
        self
    }

    pub fn insert(&mut self, function: impl Into<String>, exprs: impl IntoIterator<Item = String>) {
        self.0.entry(function.into()).or_default().extend(exprs);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Spec keys matching `function`, in key order.
    pub fn matches<'a>(&'a self, function: &'a str) -> impl Iterator<Item = (&'a str, &'a [String])> {
        self.iter().filter(move |(key, _)| function.ends_with(key))
    }

    /// Reject empty keys and empty expressions.
    pub fn validate(&self) -> Result<(), Error> {
        for (key, exprs) in self.iter() {
            if key.trim().is_empty() {
                return Err(Error::InvalidFramesSpec("empty function name".to_owned()));
            }
            if exprs.iter().any(|expr| expr.trim().is_empty()) {
                return Err(Error::InvalidFramesSpec(format!(
                    "empty expression for `{key}`"
                )));
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, Vec<String>)> for FramesOfInterestSpec {
    fn from_iter<T: IntoIterator<Item = (String, Vec<String>)>>(iter: T) -> Self {
        let mut spec = Self::new();
        for (function, exprs) in iter {
            spec.insert(function, exprs);
        }
        spec
    }
}

/// Custom loading rule for values of one type: either everything, or only
/// the listed field expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSpec {
    pub collect_all: bool,
    pub expressions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub type_name: String,
    #[serde(default)]
    pub load_spec: LoadSpec,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn suffix_match() {
        let spec = FramesOfInterestSpec::new().with("execStmt", &["stmt"]);
        assert_eq!(spec.matches("pkg.execStmt").count(), 1);
        assert_eq!(spec.matches("pkg.otherFunc").count(), 0);
    }

    #[test]
    fn validate_rejects_empty_entries() {
        let spec = FramesOfInterestSpec::new().with("", &["x"]);
        assert!(matches!(spec.validate(), Err(Error::InvalidFramesSpec(_))));

        let spec = FramesOfInterestSpec::new().with("f", &[" "]);
        assert!(matches!(spec.validate(), Err(Error::InvalidFramesSpec(_))));

        let spec = FramesOfInterestSpec::new().with("f", &["x", "y.z"]);
        assert!(spec.validate().is_ok());
    }

    proptest! {
        #[test]
        fn any_qualified_name_matches_its_suffix(
            package in "[a-z]{1,8}(/[a-z]{1,8}){0,3}",
            function in "[A-Za-z]{1,12}",
        ) {
            let spec = FramesOfInterestSpec::new().with(function.clone(), &["x"]);
            let qualified = format!("{package}.{function}");
            prop_assert_eq!(spec.matches(&qualified).count(), 1);
            let other = format!("{package}.{function}_");
            prop_assert_eq!(spec.matches(&other).count(), 0);
        }
    }
}
