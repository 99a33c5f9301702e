//! tunemart-gql - GraphQL access layer for the Tunemart marketplace
//!
//! Provides:
//! - [`GraphqlClient`]: JSON and multipart execution with a single
//!   token-refresh retry on authentication errors
//! - File extraction for the GraphQL multipart request convention
//! - Query keys, option factories and an in-process query cache
//! - Typed documents for the marketplace operations

pub mod client;
pub mod documents;
pub mod error;
pub mod operation;
pub mod query;
pub mod refresh;
pub mod session;
pub mod transport;
pub mod upload;

pub use client::GraphqlClient;
pub use error::{GqlError, GqlResult};
pub use operation::{GraphqlError, GraphqlQuery, Operation};
pub use query::{MutationOptions, QueryCache, QueryKey, QueryOptions};
pub use refresh::{HttpTokenRefresher, TokenRefresher};
pub use session::{FileSession, MemorySession, SessionContext};
pub use transport::{ReqwestTransport, Transport, TransportError, TransportRequest};
pub use upload::{FileMap, UploadFile, UploadPlan, VariableTree};
