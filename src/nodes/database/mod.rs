//! Tabular data nodes
//!
//! - `coerce`: `formatted`, `object_formatted`, `response_formatted`
//! - `condition`: clause groups and operand binding
//! - `operator`: `DatabaseOperator` seam and its request/response types
//! - `memory`: `InMemoryDatabase`
//! - `node`: `DatabaseConfig` and the `DatabaseNode` executor

mod coerce;
mod condition;
mod memory;
mod node;
mod operator;

pub use coerce::{
    formatted, object_formatted, output_list_properties, response_formatted, OUTPUT_LIST, ROW_NUM,
};
pub use condition::{
    convert_clause_group_to_condition_group, convert_clause_group_to_update_inventory,
    multi_right_key, take_fields, Clause, ClauseGroup, Condition, ConditionGroup, MultiClause,
    Operator, Relation, UpdateInventory, FIELDS, SINGLE_RIGHT,
};
pub use memory::{AuditEntry, InMemoryDatabase};
pub use node::{
    DatabaseAction, DatabaseConfig, DatabaseNode, CONFIG_CLAUSE_GROUP, CONFIG_LIMIT,
    CONFIG_ORDER_CLAUSES, CONFIG_QUERY_FIELDS, CONFIG_TABLE_ID,
};
pub use operator::{
    Caller, DatabaseOperator, DeleteRequest, InsertRequest, OrderBy, QueryRequest, Response,
    SortDirection, UpdateRequest,
};
