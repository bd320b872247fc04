//! DatabaseNode - executor shared by the four tabular node kinds
//!
//! ```yaml
//! type: database_query
//! configs:
//!   DatabaseInfoID: 7
//!   ClauseGroup: { single: { left: age, operator: ">" } }
//!   QueryFields: [id, name]
//!   OrderClauses: [{ field: age, direction: DESC }]
//!   Limit: 10
//! output_types:
//!   outputList: { type: array, elem_type_info: { type: object, properties: { id: { type: integer } } } }
//!   rowNum: { type: integer }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::ast::{NodeKind, NodeSchema, TypeInfo};
use crate::error::{FlowError, Result};
use crate::nodes::NodeExecutor;
use crate::runtime::ExecutionContext;

use super::coerce::{output_list_properties, response_formatted};
use super::condition::{
    convert_clause_group_to_condition_group, convert_clause_group_to_update_inventory, take_fields,
    ClauseGroup,
};
use super::operator::{
    Caller, DatabaseOperator, DeleteRequest, InsertRequest, OrderBy, QueryRequest, UpdateRequest,
};

pub const CONFIG_TABLE_ID: &str = "DatabaseInfoID";
pub const CONFIG_CLAUSE_GROUP: &str = "ClauseGroup";
pub const CONFIG_QUERY_FIELDS: &str = "QueryFields";
pub const CONFIG_ORDER_CLAUSES: &str = "OrderClauses";
pub const CONFIG_LIMIT: &str = "Limit";

#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseAction {
    Query {
        select_fields: Vec<String>,
        clause_group: Option<ClauseGroup>,
        order_by: Vec<OrderBy>,
        limit: Option<usize>,
    },
    Insert,
    Update { clause_group: ClauseGroup },
    Delete { clause_group: ClauseGroup },
}

impl DatabaseAction {
    pub fn name(&self) -> &'static str {
        match self {
            DatabaseAction::Query { .. } => "query",
            DatabaseAction::Insert => "insert",
            DatabaseAction::Update { .. } => "update",
            DatabaseAction::Delete { .. } => "delete",
        }
    }
}

/// Typed configuration of a tabular node
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub table_id: i64,
    pub action: DatabaseAction,
    pub output_types: FxHashMap<String, TypeInfo>,
}

impl DatabaseConfig {
    pub fn from_schema(schema: &NodeSchema) -> Result<Self> {
        let table_id: i64 = schema.must_get_key(CONFIG_TABLE_ID)?;

        let action = match schema.kind {
            NodeKind::DatabaseQuery => DatabaseAction::Query {
                select_fields: schema.get_key_or_default(CONFIG_QUERY_FIELDS)?,
                clause_group: optional_key(schema, CONFIG_CLAUSE_GROUP)?,
                order_by: optional_key(schema, CONFIG_ORDER_CLAUSES)?.unwrap_or_default(),
                limit: optional_key::<usize>(schema, CONFIG_LIMIT)?.filter(|&n| n > 0),
            },
            NodeKind::DatabaseInsert => DatabaseAction::Insert,
            NodeKind::DatabaseUpdate => DatabaseAction::Update {
                clause_group: schema.must_get_key(CONFIG_CLAUSE_GROUP)?,
            },
            NodeKind::DatabaseDelete => DatabaseAction::Delete {
                clause_group: schema.must_get_key(CONFIG_CLAUSE_GROUP)?,
            },
            other => {
                return Err(FlowError::InvalidConfig {
                    node: schema.key.clone(),
                    key: "type".to_string(),
                    reason: format!("{other} is not a database node"),
                })
            }
        };

        output_list_properties(&schema.output_types)?;

        Ok(Self {
            table_id,
            action,
            output_types: schema.output_types.clone(),
        })
    }
}

/// Absent and null are `None`; a present value must decode
fn optional_key<T: serde::de::DeserializeOwned>(schema: &NodeSchema, key: &str) -> Result<Option<T>> {
    match schema.configs.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => schema.must_get_key(key).map(Some),
    }
}

/// Executes one tabular node against a `DatabaseOperator`
pub struct DatabaseNode {
    node: Arc<str>,
    config: DatabaseConfig,
    operator: Arc<dyn DatabaseOperator>,
}

impl DatabaseNode {
    pub fn new(node: impl Into<Arc<str>>, config: DatabaseConfig, operator: Arc<dyn DatabaseOperator>) -> Self {
        Self {
            node: node.into(),
            config,
            operator,
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }
}

#[async_trait]
impl NodeExecutor for DatabaseNode {
    #[instrument(skip(self, ctx, input), fields(node = %self.node, action = self.config.action.name()))]
    async fn invoke(&self, ctx: &ExecutionContext, input: Map<String, Value>) -> Result<Map<String, Value>> {
        let table_id = self.config.table_id;
        let caller = Caller {
            is_debug: ctx.is_debug(),
            operator: ctx.operator(),
        };

        let response = match &self.config.action {
            DatabaseAction::Query {
                select_fields,
                clause_group,
                order_by,
                limit,
            } => {
                let condition_group = clause_group
                    .as_ref()
                    .map(|group| convert_clause_group_to_condition_group(group, &input))
                    .transpose()?;
                let request = QueryRequest {
                    table_id,
                    select_fields: select_fields.clone(),
                    condition_group,
                    order_by: order_by.clone(),
                    limit: *limit,
                    caller,
                };
                ctx.run_cancellable(self.operator.query(request)).await?
            }
            DatabaseAction::Insert => {
                let request = InsertRequest {
                    table_id,
                    fields: take_fields(&input)?,
                    caller,
                };
                ctx.run_cancellable(self.operator.insert(request)).await?
            }
            DatabaseAction::Update { clause_group } => {
                let request = UpdateRequest {
                    table_id,
                    inventory: convert_clause_group_to_update_inventory(clause_group, &input)?,
                    caller,
                };
                ctx.run_cancellable(self.operator.update(request)).await?
            }
            DatabaseAction::Delete { clause_group } => {
                let request = DeleteRequest {
                    table_id,
                    condition_group: convert_clause_group_to_condition_group(clause_group, &input)?,
                    caller,
                };
                ctx.run_cancellable(self.operator.delete(request)).await?
            }
        };

        debug!(rows = response.objects.len(), row_number = ?response.row_number, "database response");
        response_formatted(&self.config.output_types, &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::database::{InMemoryDatabase, OUTPUT_LIST, ROW_NUM};
    use crate::runtime::ExecuteMode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema(kind: NodeKind, configs: Value) -> NodeSchema {
        let mut node = NodeSchema::new("db_1", kind);
        node.configs = configs.as_object().cloned().unwrap_or_default();
        node.set_output_type(
            OUTPUT_LIST,
            TypeInfo::array_of(TypeInfo::object_of([("id", TypeInfo::integer()), ("name", TypeInfo::string())])),
        );
        node.set_output_type(ROW_NUM, TypeInfo::integer());
        node
    }

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn database() -> Arc<InMemoryDatabase> {
        Arc::new(InMemoryDatabase::new().with_table(
            7,
            serde_json::from_value(json!([
                {"id": "1", "name": "Ada", "age": 36},
                {"id": "2", "name": "Alan", "age": 41}
            ]))
            .unwrap(),
        ))
    }

    #[test]
    fn decodes_query_config() {
        let config = DatabaseConfig::from_schema(&schema(
            NodeKind::DatabaseQuery,
            json!({
                "DatabaseInfoID": 7,
                "QueryFields": ["id"],
                "OrderClauses": [{"field": "age", "direction": "DESC"}],
                "Limit": 0
            }),
        ))
        .unwrap();

        let DatabaseAction::Query {
            select_fields,
            clause_group,
            order_by,
            limit,
        } = config.action
        else {
            panic!("expected a query")
        };
        assert_eq!(select_fields, vec!["id".to_string()]);
        assert!(clause_group.is_none());
        assert_eq!(order_by.len(), 1);
        assert_eq!(limit, None);
    }

    #[test]
    fn mistyped_query_fields_rejected() {
        let err = DatabaseConfig::from_schema(&schema(
            NodeKind::DatabaseQuery,
            json!({"DatabaseInfoID": 7, "QueryFields": "id"}),
        ))
        .unwrap_err();
        assert!(matches!(err, FlowError::InvalidConfig { ref key, .. } if key == "QueryFields"));

        let config = DatabaseConfig::from_schema(&schema(
            NodeKind::DatabaseQuery,
            json!({"DatabaseInfoID": 7, "QueryFields": null}),
        ))
        .unwrap();
        assert!(matches!(config.action, DatabaseAction::Query { ref select_fields, .. } if select_fields.is_empty()));
    }

    #[test]
    fn update_requires_clause_group() {
        let err = DatabaseConfig::from_schema(&schema(NodeKind::DatabaseUpdate, json!({"DatabaseInfoID": 7})))
            .unwrap_err();
        assert!(matches!(err, FlowError::MissingConfig { ref key, .. } if key == "ClauseGroup"));
    }

    #[test]
    fn output_list_contract_checked_at_decode() {
        let mut node = NodeSchema::new("db_1", NodeKind::DatabaseInsert);
        node.set_config_kv("DatabaseInfoID", 7);
        let err = DatabaseConfig::from_schema(&node).unwrap_err();
        assert_eq!(err.code(), "FLOW-004");
    }

    #[tokio::test]
    async fn query_formats_rows_and_passes_caller() {
        let db = database();
        let config = DatabaseConfig::from_schema(&schema(
            NodeKind::DatabaseQuery,
            json!({
                "DatabaseInfoID": 7,
                "ClauseGroup": {"single": {"left": "age", "operator": ">"}}
            }),
        ))
        .unwrap();
        let node = DatabaseNode::new("db_1", config, db.clone());
        let ctx = ExecutionContext::in_memory(1)
            .with_mode(ExecuteMode::NodeDebug)
            .with_operator(77);

        let out = node.invoke(&ctx, input(json!({"SingleRight": 40}))).await.unwrap();

        assert_eq!(
            Value::Object(out),
            json!({"outputList": [{"id": 2, "name": "Alan"}], "rowNum": 1})
        );
        let audit = db.audit();
        assert!(audit[0].caller.is_debug);
        assert_eq!(audit[0].caller.operator, 77);
    }

    #[tokio::test]
    async fn insert_then_update_then_delete() {
        let db = database();
        let ctx = ExecutionContext::in_memory(2);
        let node = |kind, configs: Value| {
            DatabaseNode::new("db", DatabaseConfig::from_schema(&schema(kind, configs)).unwrap(), db.clone())
        };
        let by_id = json!({"DatabaseInfoID": 7, "ClauseGroup": {"single": {"left": "id", "operator": "="}}});

        let out = node(NodeKind::DatabaseInsert, json!({"DatabaseInfoID": 7}))
            .invoke(&ctx, input(json!({"Fields": {"id": 3, "name": "Grace"}})))
            .await
            .unwrap();
        assert_eq!(out[ROW_NUM], json!(1));
        assert_eq!(out[OUTPUT_LIST], json!([]));

        let out = node(NodeKind::DatabaseUpdate, by_id.clone())
            .invoke(&ctx, input(json!({"SingleRight": 3, "Fields": {"name": "Hopper"}})))
            .await
            .unwrap();
        assert_eq!(out[ROW_NUM], json!(1));

        let out = node(NodeKind::DatabaseDelete, by_id)
            .invoke(&ctx, input(json!({"SingleRight": "1"})))
            .await
            .unwrap();
        assert_eq!(out[ROW_NUM], json!(1));

        let names: Vec<Value> = db.rows(7).unwrap().iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("Alan"), json!("Hopper")]);
    }

    #[tokio::test]
    async fn missing_operand_fails_before_the_call() {
        let db = database();
        let config = DatabaseConfig::from_schema(&schema(
            NodeKind::DatabaseDelete,
            json!({"DatabaseInfoID": 7, "ClauseGroup": {"single": {"left": "id", "operator": "="}}}),
        ))
        .unwrap();
        let err = DatabaseNode::new("db", config, db.clone())
            .invoke(&ExecutionContext::in_memory(3), Map::new())
            .await
            .unwrap_err();

        assert_eq!(err.code(), "FLOW-062");
        assert!(db.audit().is_empty());
    }
}
