//! Query keys, option factories and the query cache
//!
//! A query option bundles a cache key with a typed document and its
//! variables. A mutation option carries the keys to invalidate once the
//! mutation succeeds. [`QueryCache`] runs both through a [`GraphqlClient`].

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::client::GraphqlClient;
use crate::error::GqlResult;
use crate::operation::Operation;
use crate::upload::{UploadFile, VariableTree};

/// One element of a query key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySegment {
    /// Fixed name such as `"tracks"`
    Literal(String),
    /// Parameter value, stored as canonical JSON
    Param(String),
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySegment::Literal(s) => write!(f, "{}", s),
            KeySegment::Param(json) => write!(f, "{}", json),
        }
    }
}

/// Cache key: literal names followed by parameter values
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
    pub fn new(root: impl Into<String>) -> Self {
        Self(vec![KeySegment::Literal(root.into())])
    }

    pub fn literal(mut self, name: impl Into<String>) -> Self {
        self.0.push(KeySegment::Literal(name.into()));
        self
    }

    /// Append a parameter, stored as its JSON text
    pub fn param(mut self, value: impl Into<Value>) -> Self {
        self.0.push(KeySegment::Param(value.into().to_string()));
        self
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    /// True when `prefix`'s segments equal the leading segments of `self`
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Everything needed to fetch and cache one query
pub struct QueryOptions<O: Operation> {
    pub key: QueryKey,
    pub variables: O::Variables,
    _operation: PhantomData<fn() -> O>,
}

impl<O: Operation> QueryOptions<O> {
    pub fn new(key: QueryKey, variables: O::Variables) -> Self {
        Self {
            key,
            variables,
            _operation: PhantomData,
        }
    }
}

/// How a mutation is sent
pub enum MutationInput<V> {
    Json(V),
    Upload(VariableTree<UploadFile>),
}

/// A mutation plus the cache keys it makes stale
pub struct MutationOptions<O: Operation> {
    pub input: MutationInput<O::Variables>,
    pub invalidates: Vec<QueryKey>,
    _operation: PhantomData<fn() -> O>,
}

impl<O: Operation> MutationOptions<O> {
    pub fn json(variables: O::Variables, invalidates: Vec<QueryKey>) -> Self {
        Self {
            input: MutationInput::Json(variables),
            invalidates,
            _operation: PhantomData,
        }
    }

    pub fn upload(variables: VariableTree<UploadFile>, invalidates: Vec<QueryKey>) -> Self {
        Self {
            input: MutationInput::Upload(variables),
            invalidates,
            _operation: PhantomData,
        }
    }

    /// Send the mutation without touching any cache
    pub async fn run(self, client: &GraphqlClient) -> GqlResult<O::ResponseData> {
        match self.input {
            MutationInput::Json(variables) => client.execute::<O>(&variables).await,
            MutationInput::Upload(variables) => client.execute_upload::<O>(variables).await,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedEntry {
    value: Value,
    fetched_at: DateTime<Utc>,
}

/// In-process store keyed by [`QueryKey`]
///
/// Clones share one store. Errors are never cached. Concurrent fetches of
/// the same key are not coalesced; the last one to finish wins.
#[derive(Clone)]
pub struct QueryCache {
    client: GraphqlClient,
    entries: Arc<RwLock<HashMap<QueryKey, CachedEntry>>>,
    stale_time: Option<Duration>,
}

impl QueryCache {
    pub fn new(client: GraphqlClient) -> Self {
        Self {
            client,
            entries: Arc::new(RwLock::new(HashMap::new())),
            stale_time: None,
        }
    }

    /// Refetch entries older than `stale_time`. Without it entries live until
    /// invalidated.
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn client(&self) -> &GraphqlClient {
        &self.client
    }

    /// Cached value for the key, or the result of running the query
    pub async fn fetch<O: Operation>(&self, options: &QueryOptions<O>) -> GqlResult<O::ResponseData> {
        if let Some(value) = self.fresh_value(&options.key).await {
            debug!(key = %options.key, "Query cache hit");
            return Ok(serde_json::from_value(value)?);
        }

        debug!(key = %options.key, operation = O::OPERATION_NAME, "Query cache miss");
        let data = self.client.execute::<O>(&options.variables).await?;
        let entry = CachedEntry {
            value: serde_json::to_value(&data)?,
            fetched_at: Utc::now(),
        };
        self.entries.write().await.insert(options.key.clone(), entry);
        Ok(data)
    }

    /// Run a mutation and invalidate its keys on success
    pub async fn mutate<O: Operation>(&self, options: MutationOptions<O>) -> GqlResult<O::ResponseData> {
        let invalidates = options.invalidates.clone();
        let data = options.run(&self.client).await?;
        for key in &invalidates {
            self.invalidate(key).await;
        }
        Ok(data)
    }

    /// Drop every entry whose key starts with `prefix`; returns the count
    pub async fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        debug!(key = %prefix, removed, "Invalidated queries");
        removed
    }

    pub async fn contains(&self, key: &QueryKey) -> bool {
        self.entries.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn fresh_value(&self, key: &QueryKey) -> Option<Value> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if let Some(stale_time) = self.stale_time {
            let age = Utc::now().signed_duration_since(entry.fetched_at);
            if age.to_std().map(|age| age >= stale_time).unwrap_or(false) {
                return None;
            }
        }
        Some(entry.value.clone())
    }
}
