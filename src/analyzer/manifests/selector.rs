//! Label selector evaluation.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use std::collections::BTreeMap;

/// A selector that cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("unknown selector operator {operator:?} for key {key:?}")]
    UnknownOperator { key: String, operator: String },

    #[error("selector operator {operator} for key {key:?} requires values")]
    MissingValues { key: String, operator: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    In(String, Vec<String>),
    NotIn(String, Vec<String>),
    Exists(String),
    DoesNotExist(String),
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Self::In(key, values) => labels.get(key).is_some_and(|v| values.contains(v)),
            Self::NotIn(key, values) => labels.get(key).is_none_or(|v| !values.contains(v)),
            Self::Exists(key) => labels.contains_key(key),
            Self::DoesNotExist(key) => !labels.contains_key(key),
        }
    }
}

/// A compiled label selector (`matchLabels` plus `matchExpressions`).
///
/// An empty selector matches every label set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    match_labels: BTreeMap<String, String>,
    requirements: Vec<Requirement>,
}

impl Selector {
    /// Compile a Kubernetes label selector.
    pub fn from_label_selector(selector: &LabelSelector) -> Result<Self, SelectorError> {
        let match_labels = selector.match_labels.clone().unwrap_or_default();
        let mut requirements = Vec::new();

        for expr in selector.match_expressions.iter().flatten() {
            let values = expr.values.clone().unwrap_or_default();
            let requirement = match expr.operator.as_str() {
                "In" | "NotIn" if values.is_empty() => {
                    return Err(SelectorError::MissingValues {
                        key: expr.key.clone(),
                        operator: expr.operator.clone(),
                    });
                }
                "In" => Requirement::In(expr.key.clone(), values),
                "NotIn" => Requirement::NotIn(expr.key.clone(), values),
                "Exists" => Requirement::Exists(expr.key.clone()),
                "DoesNotExist" => Requirement::DoesNotExist(expr.key.clone()),
                other => {
                    return Err(SelectorError::UnknownOperator {
                        key: expr.key.clone(),
                        operator: other.to_string(),
                    });
                }
            };
            requirements.push(requirement);
        }

        Ok(Self {
            match_labels,
            requirements,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.requirements.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
            && self.requirements.iter().all(|r| r.matches(labels))
    }
}

/// A selector that only applies to objects of one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespacedSelector {
    pub namespace: String,
    pub selector: Selector,
}

impl NamespacedSelector {
    pub fn new(namespace: impl Into<String>, selector: Selector) -> Self {
        Self {
            namespace: namespace.into(),
            selector,
        }
    }

    /// True when `namespace` is the selector's namespace and `labels` match.
    pub fn matches(&self, namespace: &str, labels: &BTreeMap<String, String>) -> bool {
        self.namespace == namespace && self.selector.matches(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelectorRequirement;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn expr(key: &str, operator: &str, values: &[&str]) -> LabelSelectorRequirement {
        LabelSelectorRequirement {
            key: key.to_string(),
            operator: operator.to_string(),
            values: if values.is_empty() {
                None
            } else {
                Some(values.iter().map(|v| v.to_string()).collect())
            },
        }
    }

    #[test]
    fn test_match_labels() {
        let selector = Selector::from_label_selector(&LabelSelector {
            match_labels: Some(labels(&[("app", "web")])),
            match_expressions: None,
        })
        .unwrap();

        assert!(selector.matches(&labels(&[("app", "web"), ("tier", "front")])));
        assert!(!selector.matches(&labels(&[("app", "api")])));
        assert!(!selector.matches(&labels(&[])));
    }

    #[test]
    fn test_match_expressions() {
        let selector = Selector::from_label_selector(&LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![
                expr("app", "In", &["web", "api"]),
                expr("canary", "DoesNotExist", &[]),
                expr("tier", "NotIn", &["batch"]),
            ]),
        })
        .unwrap();

        assert!(selector.matches(&labels(&[("app", "api")])));
        assert!(!selector.matches(&labels(&[("app", "api"), ("canary", "true")])));
        assert!(!selector.matches(&labels(&[("app", "web"), ("tier", "batch")])));
        assert!(!selector.matches(&labels(&[("tier", "front")])));
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let selector = Selector::from_label_selector(&LabelSelector::default()).unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&labels(&[])));
        assert!(selector.matches(&labels(&[("app", "web")])));
    }

    #[test]
    fn test_invalid_operators() {
        let err = Selector::from_label_selector(&LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![expr("app", "Like", &["w"])]),
        })
        .unwrap_err();
        assert!(matches!(err, SelectorError::UnknownOperator { .. }));

        let err = Selector::from_label_selector(&LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![expr("app", "In", &[])]),
        })
        .unwrap_err();
        assert!(matches!(err, SelectorError::MissingValues { .. }));
    }

    #[test]
    fn test_namespace_scoping() {
        let selector = NamespacedSelector::new(
            "ns1",
            Selector::from_label_selector(&LabelSelector {
                match_labels: Some(labels(&[("app", "web")])),
                match_expressions: None,
            })
            .unwrap(),
        );

        assert!(selector.matches("ns1", &labels(&[("app", "web")])));
        assert!(!selector.matches("ns2", &labels(&[("app", "web")])));
    }
}
