//! File uploads over the GraphQL multipart request convention
//!
//! Variables are modelled as a [`VariableTree`], a JSON tree with an extra
//! payload leaf. A depth-first walk replaces every payload with `null`,
//! records its dotted path under the next sequential key of a [`FileMap`],
//! and collects the payloads in the same order. The multipart body is then
//! `operations`, `map`, and one part per file named by its key.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Number, Value};
use std::path::Path;

use crate::error::{GqlError, GqlResult};
use crate::operation::{GraphqlQuery, GraphqlRequest};
use crate::transport::MultipartForm;

/// Root of every recorded path
pub const VARIABLES_PREFIX: &str = "variables";

/// Binary file attached to an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Content type guessed from the file extension
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self::new(file_name, content_type, bytes)
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::from_bytes(file_name, bytes))
    }
}

/// JSON-like variables tree whose leaves may be binary payloads
///
/// Objects keep insertion order, which is also the order payloads are
/// numbered in.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableTree<P> {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<VariableTree<P>>),
    Object(Vec<(String, VariableTree<P>)>),
    Payload(P),
}

impl<P> From<Value> for VariableTree<P> {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<UploadFile> for VariableTree<UploadFile> {
    fn from(file: UploadFile) -> Self {
        Self::Payload(file)
    }
}

/// Result of a payload walk
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<P> {
    /// Variables with every payload replaced by `null`
    pub variables: Value,
    /// `(dotted path, payload)` in depth-first order
    pub payloads: Vec<(String, P)>,
}

impl<P> VariableTree<P> {
    /// Empty object
    pub fn object() -> Self {
        Self::Object(Vec::new())
    }

    /// Set `key` on an object, replacing an existing entry
    ///
    /// Non-object trees are returned unchanged.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<VariableTree<P>>) -> Self {
        if let Self::Object(entries) = &mut self {
            set_entry(entries, key.into(), value.into());
        }
        self
    }

    /// Number of payload leaves
    pub fn payload_count(&self) -> usize {
        match self {
            Self::Payload(_) => 1,
            Self::Array(items) => items.iter().map(Self::payload_count).sum(),
            Self::Object(entries) => entries
                .iter()
                .enumerate()
                .filter(|(i, (key, _))| !entries[i + 1..].iter().any(|(k, _)| k == key))
                .map(|(_, (_, v))| v.payload_count())
                .sum(),
            _ => 0,
        }
    }

    /// Place `value` at a dotted path, creating intermediate objects
    ///
    /// A leading `variables.` segment is accepted and ignored. Numeric
    /// segments index into existing arrays.
    pub fn insert_at(&mut self, path: &str, value: VariableTree<P>) -> GqlResult<()> {
        let mut segments: Vec<&str> = path.split('.').collect();
        if segments.first() == Some(&VARIABLES_PREFIX) {
            segments.remove(0);
        }
        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(GqlError::Setup(format!("Invalid variable path '{}'", path)));
        }

        let mut current = self;
        let (last, parents) = segments.split_last().ok_or_else(|| {
            GqlError::Setup(format!("Invalid variable path '{}'", path))
        })?;

        for segment in parents {
            current = child_mut(current, segment, path)?;
        }

        if matches!(current, Self::Null) {
            *current = Self::object();
        }
        match current {
            Self::Object(entries) => {
                set_entry(entries, (*last).to_string(), value);
                Ok(())
            }
            Self::Array(items) => match last.parse::<usize>() {
                Ok(index) if index < items.len() => {
                    items[index] = value;
                    Ok(())
                }
                Ok(index) if index == items.len() => {
                    items.push(value);
                    Ok(())
                }
                _ => Err(GqlError::Setup(format!(
                    "Index '{}' out of range in '{}'",
                    last, path
                ))),
            },
            _ => Err(GqlError::Setup(format!(
                "Cannot insert '{}' into a scalar in '{}'",
                last, path
            ))),
        }
    }

    /// Depth-first walk replacing payloads with `null`
    pub fn extract_payloads(self, prefix: &str) -> Extracted<P> {
        let mut payloads = Vec::new();
        let variables = self.walk(prefix, &mut payloads);
        Extracted {
            variables,
            payloads,
        }
    }

    fn walk(self, path: &str, payloads: &mut Vec<(String, P)>) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(b),
            Self::Number(n) => Value::Number(n),
            Self::String(s) => Value::String(s),
            Self::Array(items) => Value::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| item.walk(&format!("{}.{}", path, index), payloads))
                    .collect(),
            ),
            Self::Object(entries) => {
                // Later duplicates replace earlier ones before any payload is recorded
                let mut unique: Vec<(String, Self)> = Vec::with_capacity(entries.len());
                for (key, item) in entries {
                    set_entry(&mut unique, key, item);
                }
                let mut map = Map::with_capacity(unique.len());
                for (key, item) in unique {
                    let child = item.walk(&format!("{}.{}", path, key), payloads);
                    map.insert(key, child);
                }
                Value::Object(map)
            }
            Self::Payload(payload) => {
                payloads.push((path.to_string(), payload));
                Value::Null
            }
        }
    }
}

fn set_entry<P>(entries: &mut Vec<(String, VariableTree<P>)>, key: String, value: VariableTree<P>) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some((_, existing)) => *existing = value,
        None => entries.push((key, value)),
    }
}

fn child_mut<'a, P>(
    node: &'a mut VariableTree<P>,
    segment: &str,
    path: &str,
) -> GqlResult<&'a mut VariableTree<P>> {
    if matches!(node, VariableTree::Null) {
        *node = VariableTree::object();
    }
    match node {
        VariableTree::Object(entries) => {
            let position = match entries.iter().position(|(k, _)| k == segment) {
                Some(position) => position,
                None => {
                    entries.push((segment.to_string(), VariableTree::object()));
                    entries.len() - 1
                }
            };
            Ok(&mut entries[position].1)
        }
        VariableTree::Array(items) => {
            let index = segment
                .parse::<usize>()
                .ok()
                .filter(|i| *i < items.len())
                .ok_or_else(|| {
                    GqlError::Setup(format!("Index '{}' out of range in '{}'", segment, path))
                })?;
            Ok(&mut items[index])
        }
        _ => Err(GqlError::Setup(format!(
            "Segment '{}' of '{}' descends into a scalar",
            segment, path
        ))),
    }
}

/// Multipart `map` field: sequential key to a one-element path array
///
/// Serializes in insertion order, so `"10"` follows `"9"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMap {
    entries: Vec<(String, Vec<String>)>,
}

impl FileMap {
    /// Record a path under the next key and return the key
    pub fn push(&mut self, path: impl Into<String>) -> String {
        let key = self.entries.len().to_string();
        self.entries.push((key.clone(), vec![path.into()]));
        key
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, paths)| paths.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for FileMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, paths) in &self.entries {
            map.serialize_entry(key, paths)?;
        }
        map.end()
    }
}

/// Everything needed to send one multipart operation
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPlan<P = UploadFile> {
    /// `{query, variables}` with payloads nulled
    pub operations: Value,
    pub map: FileMap,
    /// `(key, payload)` in map order
    pub files: Vec<(String, P)>,
}

impl<P> UploadPlan<P> {
    pub fn build(query: &GraphqlQuery, variables: VariableTree<P>) -> GqlResult<Self> {
        let extracted = variables.extract_payloads(VARIABLES_PREFIX);

        let mut map = FileMap::default();
        let mut files = Vec::with_capacity(extracted.payloads.len());
        for (path, payload) in extracted.payloads {
            let key = map.push(path);
            files.push((key, payload));
        }

        let operations = serde_json::to_value(GraphqlRequest {
            query: query.as_str(),
            variables: Some(extracted.variables),
        })?;

        Ok(Self {
            operations,
            map,
            files,
        })
    }
}

impl UploadPlan<UploadFile> {
    /// `operations`, `map`, then one part per file
    pub fn into_form(self) -> GqlResult<MultipartForm> {
        let mut form = MultipartForm::new()
            .text("operations", serde_json::to_string(&self.operations)?)
            .text("map", serde_json::to_string(&self.map)?);
        for (key, file) in self.files {
            form = form.file(key, file);
        }
        Ok(form)
    }
}
