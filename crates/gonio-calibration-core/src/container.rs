//! Hierarchical, attribute-bearing data container.
//!
//! A container is a tree of named groups and datasets. Children keep their
//! insertion order, and [`Container::walk`] visits nodes depth-first in
//! pre-order, so "first match" lookups are deterministic.
//!
//! Containers are stored on disk as JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Image, Real};

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("failed to access container {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse container {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("dataset shape {shape:?} needs {expected} values, got {actual}")]
    Shape {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error("node {0:?} already exists in this group")]
    DuplicateName(String),
}

/// Attribute value. Equality is exact: variants never compare across types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    Int(i64),
    Float(Real),
    Text(String),
    Bytes(Vec<u8>),
    Bool(bool),
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<Real> for AttrValue {
    fn from(v: Real) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&[u8]> for AttrValue {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

pub type Attributes = BTreeMap<String, AttrValue>;

/// N-dimensional array of reals stored in row-major order.
///
/// `data.len()` always equals the product of `shape`, including for datasets
/// read from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset")]
pub struct Dataset {
    shape: Vec<usize>,
    data: Vec<Real>,
    attrs: Attributes,
}

/// On-disk form of a [`Dataset`], checked by `TryFrom` before use.
#[derive(Deserialize)]
struct RawDataset {
    shape: Vec<usize>,
    data: Vec<Real>,
    #[serde(default)]
    attrs: Attributes,
}

impl TryFrom<RawDataset> for Dataset {
    type Error = ContainerError;

    fn try_from(raw: RawDataset) -> Result<Self, ContainerError> {
        let mut dataset = Dataset::new(raw.shape, raw.data)?;
        dataset.attrs = raw.attrs;
        Ok(dataset)
    }
}

impl Dataset {
    pub fn new(shape: Vec<usize>, data: Vec<Real>) -> Result<Self, ContainerError> {
        let expected = shape.iter().product::<usize>();
        if expected != data.len() {
            return Err(ContainerError::Shape {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            shape,
            data,
            attrs: Attributes::new(),
        })
    }

    /// One-dimensional dataset.
    pub fn from_scalars(values: Vec<Real>) -> Self {
        Self {
            shape: vec![values.len()],
            data: values,
            attrs: Attributes::new(),
        }
    }

    /// Stack equally sized images into a `frames x rows x cols` dataset.
    pub fn from_images(images: &[Image]) -> Result<Self, ContainerError> {
        let (rows, cols) = images.first().map_or((0, 0), |img| img.shape());
        let mut data = Vec::with_capacity(images.len() * rows * cols);
        for img in images {
            if img.shape() != (rows, cols) {
                return Err(ContainerError::Shape {
                    shape: vec![images.len(), rows, cols],
                    expected: rows * cols,
                    actual: img.len(),
                });
            }
            // nalgebra is column-major; datasets are row-major.
            for r in 0..rows {
                data.extend(img.row(r).iter().copied());
            }
        }
        Self::new(vec![images.len(), rows, cols], data)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Extent of the first axis.
    pub fn len(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    /// Element `idx` of a one-dimensional dataset.
    pub fn scalar(&self, idx: usize) -> Option<Real> {
        if self.rank() != 1 {
            return None;
        }
        self.data.get(idx).copied()
    }

    /// Frame `idx` of a three-dimensional image stack.
    pub fn image(&self, idx: usize) -> Option<Image> {
        let &[frames, rows, cols] = self.shape.as_slice() else {
            return None;
        };
        if idx >= frames {
            return None;
        }
        let stride = rows * cols;
        let slice = self.data.get(idx * stride..(idx + 1) * stride)?;
        Some(Image::from_row_slice(rows, cols, slice))
    }
}

/// A named child of a [`Group`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Child {
    pub name: String,
    pub node: Node,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Group(Group),
    Dataset(Dataset),
}

impl Node {
    pub fn as_dataset(&self) -> Option<&Dataset> {
        match self {
            Node::Dataset(ds) => Some(ds),
            Node::Group(_) => None,
        }
    }

    pub fn attrs(&self) -> &Attributes {
        match self {
            Node::Group(g) => &g.attrs,
            Node::Dataset(ds) => &ds.attrs,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    attrs: Attributes,
    #[serde(default)]
    children: Vec<Child>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child node, rejecting duplicate names.
    pub fn add(&mut self, name: impl Into<String>, node: Node) -> Result<(), ContainerError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(ContainerError::DuplicateName(name));
        }
        self.children.push(Child { name, node });
        Ok(())
    }

    /// Builder form of [`add`](Self::add) for a subgroup.
    pub fn with_group(
        mut self,
        name: impl Into<String>,
        group: Group,
    ) -> Result<Self, ContainerError> {
        self.add(name, Node::Group(group))?;
        Ok(self)
    }

    /// Builder form of [`add`](Self::add) for a dataset.
    pub fn with_dataset(
        mut self,
        name: impl Into<String>,
        dataset: Dataset,
    ) -> Result<Self, ContainerError> {
        self.add(name, Node::Dataset(dataset))?;
        Ok(self)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.children
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.node)
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }
}

/// Root of a hierarchical data file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Container {
    root: Group,
}

impl Container {
    pub fn new(root: Group) -> Self {
        Self { root }
    }

    /// Read a container from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ContainerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let container = serde_json::from_str(&text).map_err(|source| ContainerError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("opened container {}", path.display());
        Ok(container)
    }

    /// Write the container to disk, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ContainerError> {
        let path = path.as_ref();
        let text = serde_json::to_string(self).map_err(|source| ContainerError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, text).map_err(|source| ContainerError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Node at an exact slash-separated path.
    pub fn get(&self, path: &str) -> Option<&Node> {
        let mut parts = path.split('/').filter(|p| !p.is_empty());
        let first = parts.next()?;
        let mut node = self.root.get(first)?;
        for part in parts {
            match node {
                Node::Group(g) => node = g.get(part)?,
                Node::Dataset(_) => return None,
            }
        }
        Some(node)
    }

    /// Depth-first, pre-order traversal yielding `(path, node)`.
    ///
    /// Paths are relative to the root, slash-joined, without a leading slash.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![(String::new(), self.root.children.iter())],
        }
    }
}

pub struct Walk<'a> {
    stack: Vec<(String, std::slice::Iter<'a, Child>)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (String, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (prefix, iter) = self.stack.last_mut()?;
            let Some(child) = iter.next() else {
                self.stack.pop();
                continue;
            };
            let path = if prefix.is_empty() {
                child.name.clone()
            } else {
                format!("{prefix}/{}", child.name)
            };
            if let Node::Group(group) = &child.node {
                self.stack.push((path.clone(), group.children.iter()));
            }
            return Some((path, &child.node));
        }
    }
}
