//! Node executors
//!
//! - `http`: HTTP requester
//! - `database`: tabular data nodes (query, insert, update, delete)
//! - `Passthrough`: entry and exit nodes
//!
//! Every executor receives its resolved input map and the run's
//! `ExecutionContext`, and returns its output map.

pub mod database;
pub mod http;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::runtime::ExecutionContext;

/// One node's behaviour at run time
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn invoke(&self, ctx: &ExecutionContext, input: Map<String, Value>) -> Result<Map<String, Value>>;
}

/// Entry and exit nodes: output is the resolved input
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl NodeExecutor for Passthrough {
    async fn invoke(&self, _ctx: &ExecutionContext, input: Map<String, Value>) -> Result<Map<String, Value>> {
        Ok(input)
    }
}
