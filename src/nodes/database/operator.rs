//! DatabaseOperator - the storage seam of the tabular nodes

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

use super::condition::{ConditionGroup, UpdateInventory};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Who runs the statement and whether it targets the debug copy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Caller {
    pub is_debug: bool,
    pub operator: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub table_id: i64,
    /// Empty selects every column
    pub select_fields: Vec<String>,
    pub condition_group: Option<ConditionGroup>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub caller: Caller,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertRequest {
    pub table_id: i64,
    pub fields: Map<String, Value>,
    pub caller: Caller,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub table_id: i64,
    pub inventory: UpdateInventory,
    pub caller: Caller,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub table_id: i64,
    pub condition_group: ConditionGroup,
    pub caller: Caller,
}

/// Rows returned and the returned or affected row count
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub objects: Vec<Map<String, Value>>,
    pub row_number: Option<i64>,
}

#[async_trait]
pub trait DatabaseOperator: Send + Sync {
    async fn query(&self, request: QueryRequest) -> Result<Response>;

    async fn insert(&self, request: InsertRequest) -> Result<Response>;

    async fn update(&self, request: UpdateRequest) -> Result<Response>;

    async fn delete(&self, request: DeleteRequest) -> Result<Response>;
}
