//! Tool catalog + HTTP invocation pipeline.
//!
//! This crate is the transport-independent half of Toolbridge:
//! - the catalog of declaratively described HTTP operations ("tools"),
//!   loaded once at startup and immutable afterwards
//! - the invocation pipeline that turns a tool call into an outbound HTTP
//!   request: argument validation, credential binding, request building,
//!   execution, and result classification
//!
//! It intentionally contains **no** session or wire-protocol logic; that
//! lives in `toolbridge-gateway`.

pub mod catalog;
pub mod credentials;
pub mod definition;
pub mod error;
pub mod executor;
pub mod invoker;
pub mod loader;
pub mod request;
pub mod security;
pub mod semantics;
pub mod template;
pub mod validate;
