//! Locate datasets inside a [`Container`] without hard-coding absolute paths.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::container::{AttrValue, Container, Dataset};

/// Rule used to find a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetPath {
    /// The dataset's full path contains this substring.
    Contains { path: String },
    /// The dataset carries `attribute` with exactly `value`.
    WithAttribute { attribute: String, value: AttrValue },
}

impl DatasetPath {
    pub fn contains(path: impl Into<String>) -> Self {
        Self::Contains { path: path.into() }
    }

    pub fn with_attribute(attribute: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self::WithAttribute {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Whether a dataset at `path` satisfies this rule.
    pub fn matches(&self, path: &str, dataset: &Dataset) -> bool {
        match self {
            DatasetPath::Contains { path: needle } => path.contains(needle.as_str()),
            DatasetPath::WithAttribute { attribute, value } => {
                dataset.attr(attribute) == Some(value)
            }
        }
    }
}

impl fmt::Display for DatasetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetPath::Contains { path } => write!(f, "path containing {path:?}"),
            DatasetPath::WithAttribute { attribute, value } => {
                write!(f, "attribute {attribute:?} = {value:?}")
            }
        }
    }
}

/// A dataset found by [`locate`], together with its full path.
#[derive(Debug, Clone)]
pub struct LocatedDataset<'a> {
    pub path: String,
    pub dataset: &'a Dataset,
}

impl Deref for LocatedDataset<'_> {
    type Target = Dataset;

    fn deref(&self) -> &Dataset {
        self.dataset
    }
}

/// First dataset satisfying `rule`, in [`Container::walk`] order.
///
/// Groups are never returned. A miss is `None`; callers must check it before
/// indexing.
pub fn locate<'a>(container: &'a Container, rule: &DatasetPath) -> Option<LocatedDataset<'a>> {
    container.walk().find_map(|(path, node)| {
        let dataset = node.as_dataset()?;
        rule.matches(&path, dataset)
            .then_some(LocatedDataset { path, dataset })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Group;

    fn scalars(n: usize) -> Dataset {
        Dataset::from_scalars((0..n).map(|v| v as f64).collect())
    }

    fn sample() -> Container {
        let measurement = Group::new()
            .with_dataset(
                "xpad_image",
                scalars(1).with_attr("interpretation", "image"),
            )
            .unwrap()
            .with_dataset("delta", scalars(2).with_attr("unit", "deg"))
            .unwrap();
        let second = Group::new()
            .with_dataset("xpad_image", scalars(3).with_attr("interpretation", "image"))
            .unwrap()
            .with_dataset("counts", scalars(4).with_attr("rank", 2i64))
            .unwrap();
        let root = Group::new()
            .with_group("scan_1", Group::new().with_group("measurement", measurement).unwrap())
            .unwrap()
            .with_group("scan_2", second)
            .unwrap();
        Container::new(root)
    }

    #[test]
    fn substring_returns_first_in_walk_order() {
        let container = sample();
        let found = locate(&container, &DatasetPath::contains("xpad")).unwrap();
        assert_eq!(found.path, "scan_1/measurement/xpad_image");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn substring_skips_groups() {
        let container = sample();
        // "measurement" names a group; the first dataset below it matches.
        let found = locate(&container, &DatasetPath::contains("measurement")).unwrap();
        assert_eq!(found.path, "scan_1/measurement/xpad_image");
    }

    #[test]
    fn substring_miss_is_none() {
        let container = sample();
        assert!(locate(&container, &DatasetPath::contains("eiger")).is_none());
    }

    #[test]
    fn attribute_match_is_exact() {
        let container = sample();
        let found = locate(&container, &DatasetPath::with_attribute("unit", "deg")).unwrap();
        assert_eq!(found.path, "scan_1/measurement/delta");

        let found = locate(&container, &DatasetPath::with_attribute("rank", 2i64)).unwrap();
        assert_eq!(found.path, "scan_2/counts");

        // Same number, different type.
        assert!(locate(&container, &DatasetPath::with_attribute("rank", 2.0)).is_none());
        // Same text, bytes instead of string.
        assert!(
            locate(&container, &DatasetPath::with_attribute("unit", &b"deg"[..])).is_none()
        );
        assert!(locate(&container, &DatasetPath::with_attribute("unit", "rad")).is_none());
    }

    #[test]
    fn attribute_returns_first_of_several() {
        let container = sample();
        let rule = DatasetPath::with_attribute("interpretation", "image");
        let found = locate(&container, &rule).unwrap();
        assert_eq!(found.path, "scan_1/measurement/xpad_image");
    }

    #[test]
    fn display_names_the_rule() {
        assert_eq!(
            DatasetPath::contains("delta").to_string(),
            "path containing \"delta\""
        );
    }
}
