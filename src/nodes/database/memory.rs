//! InMemoryDatabase - process-local `DatabaseOperator`
//!
//! Tables are plain row vectors keyed by table id. Conditions are evaluated
//! with loose comparison: numeric when both sides parse as numbers, textual
//! otherwise; comparisons against null never match. `LIKE` is
//! case-insensitive with `%` and `_` wildcards.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{FlowError, Result};

use super::condition::{Condition, ConditionGroup, Operator, Relation};
use super::operator::{
    Caller, DatabaseOperator, DeleteRequest, InsertRequest, OrderBy, QueryRequest, Response,
    SortDirection, UpdateRequest,
};

type Row = Map<String, Value>;

/// One statement as seen by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub action: &'static str,
    pub table_id: i64,
    pub caller: Caller,
}

#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    tables: Arc<DashMap<i64, Vec<Row>>>,
    audit: Arc<Mutex<Vec<AuditEntry>>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, table_id: i64, rows: Vec<Row>) -> Self {
        self.tables.insert(table_id, rows);
        self
    }

    pub fn create_table(&self, table_id: i64) {
        self.tables.entry(table_id).or_default();
    }

    /// Snapshot of a table's rows
    pub fn rows(&self, table_id: i64) -> Option<Vec<Row>> {
        self.tables.get(&table_id).map(|rows| rows.clone())
    }

    /// Statements executed so far, oldest first
    pub fn audit(&self) -> Vec<AuditEntry> {
        self.audit.lock().clone()
    }

    fn record(&self, action: &'static str, table_id: i64, caller: Caller) {
        debug!(action, table_id, is_debug = caller.is_debug, operator = caller.operator, "database statement");
        self.audit.lock().push(AuditEntry {
            action,
            table_id,
            caller,
        });
    }

    fn missing_table(table_id: i64) -> FlowError {
        FlowError::Database {
            reason: format!("table {table_id} does not exist"),
        }
    }
}

#[async_trait]
impl DatabaseOperator for InMemoryDatabase {
    async fn query(&self, request: QueryRequest) -> Result<Response> {
        self.record("query", request.table_id, request.caller);
        let rows = self
            .rows(request.table_id)
            .ok_or_else(|| Self::missing_table(request.table_id))?;

        let mut selected: Vec<Row> = rows
            .into_iter()
            .filter(|row| {
                request
                    .condition_group
                    .as_ref()
                    .map_or(true, |group| group_matches(group, row))
            })
            .collect();

        if !request.order_by.is_empty() {
            selected.sort_by(|a, b| compare_rows(a, b, &request.order_by));
        }
        if let Some(limit) = request.limit {
            selected.truncate(limit);
        }
        if !request.select_fields.is_empty() {
            selected = selected
                .into_iter()
                .map(|row| {
                    request
                        .select_fields
                        .iter()
                        .filter_map(|f| row.get(f).map(|v| (f.clone(), v.clone())))
                        .collect()
                })
                .collect();
        }

        let row_number = selected.len() as i64;
        Ok(Response {
            objects: selected,
            row_number: Some(row_number),
        })
    }

    async fn insert(&self, request: InsertRequest) -> Result<Response> {
        self.record("insert", request.table_id, request.caller);
        let mut rows = self
            .tables
            .get_mut(&request.table_id)
            .ok_or_else(|| Self::missing_table(request.table_id))?;
        rows.push(request.fields);

        Ok(Response {
            objects: Vec::new(),
            row_number: Some(1),
        })
    }

    async fn update(&self, request: UpdateRequest) -> Result<Response> {
        self.record("update", request.table_id, request.caller);
        let mut rows = self
            .tables
            .get_mut(&request.table_id)
            .ok_or_else(|| Self::missing_table(request.table_id))?;

        let mut affected = 0i64;
        for row in rows
            .iter_mut()
            .filter(|row| group_matches(&request.inventory.condition_group, row))
        {
            for (k, v) in &request.inventory.fields {
                row.insert(k.clone(), v.clone());
            }
            affected += 1;
        }

        Ok(Response {
            objects: Vec::new(),
            row_number: Some(affected),
        })
    }

    async fn delete(&self, request: DeleteRequest) -> Result<Response> {
        self.record("delete", request.table_id, request.caller);
        let mut rows = self
            .tables
            .get_mut(&request.table_id)
            .ok_or_else(|| Self::missing_table(request.table_id))?;

        let before = rows.len();
        rows.retain(|row| !group_matches(&request.condition_group, row));

        Ok(Response {
            objects: Vec::new(),
            row_number: Some((before - rows.len()) as i64),
        })
    }
}

// ═══════════════════════════════════════════
// Condition evaluation
// ═══════════════════════════════════════════

fn group_matches(group: &ConditionGroup, row: &Row) -> bool {
    match group.relation {
        Relation::And => group.conditions.iter().all(|c| condition_matches(c, row)),
        Relation::Or => {
            group.conditions.is_empty() || group.conditions.iter().any(|c| condition_matches(c, row))
        }
    }
}

fn condition_matches(condition: &Condition, row: &Row) -> bool {
    let left = row.get(&condition.left).unwrap_or(&Value::Null);
    let right = condition.right.as_ref().unwrap_or(&Value::Null);

    match condition.operator {
        Operator::IsNull => left.is_null(),
        Operator::IsNotNull => !left.is_null(),
        _ if left.is_null() || right.is_null() => false,
        Operator::Equal => loose_eq(left, right),
        Operator::NotEqual => !loose_eq(left, right),
        Operator::Greater => compare(left, right) == Some(Ordering::Greater),
        Operator::GreaterEqual => matches!(compare(left, right), Some(Ordering::Greater | Ordering::Equal)),
        Operator::Less => compare(left, right) == Some(Ordering::Less),
        Operator::LessEqual => matches!(compare(left, right), Some(Ordering::Less | Ordering::Equal)),
        Operator::In => operand_list(right).iter().any(|r| loose_eq(left, r)),
        Operator::NotIn => !operand_list(right).iter().any(|r| loose_eq(left, r)),
        Operator::Like => like(&text(left), &text(right)),
        Operator::NotLike => !like(&text(left), &text(right)),
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (number(a), number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => !a.is_null() && !b.is_null() && text(a) == text(b),
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_null() || b.is_null() {
        return None;
    }
    match (number(a), number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => Some(text(a).cmp(&text(b))),
    }
}

/// Right operand of `IN`: an array, a JSON array string, or one scalar
fn operand_list(right: &Value) -> Vec<Value> {
    match right {
        Value::Array(items) => items.clone(),
        Value::String(s) => match serde_json::from_str::<Vec<Value>>(s) {
            Ok(items) => items,
            Err(_) => vec![right.clone()],
        },
        other => vec![other.clone()],
    }
}

fn like(value: &str, pattern: &str) -> bool {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push_str("(?is)^");
    for ch in pattern.chars() {
        match ch {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            c => expr.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    expr.push('$');
    Regex::new(&expr).is_ok_and(|re| re.is_match(value))
}

/// Nulls sort first; incomparable values keep their order
fn compare_rows(a: &Row, b: &Row, order_by: &[OrderBy]) -> Ordering {
    for order in order_by {
        let left = a.get(&order.field).unwrap_or(&Value::Null);
        let right = b.get(&order.field).unwrap_or(&Value::Null);
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => compare(left, right).unwrap_or(Ordering::Equal),
        };
        let ordering = match order.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::database::condition::UpdateInventory;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rows(value: Value) -> Vec<Row> {
        serde_json::from_value(value).unwrap()
    }

    fn db() -> InMemoryDatabase {
        InMemoryDatabase::new().with_table(
            1,
            rows(json!([
                {"id": 1, "name": "Ada", "age": 36, "deleted_at": null},
                {"id": 2, "name": "alan", "age": "41"},
                {"id": 3, "name": "Grace", "age": 85, "deleted_at": "1992"}
            ])),
        )
    }

    fn cond(left: &str, operator: Operator, right: Option<Value>) -> Condition {
        Condition {
            left: left.to_string(),
            operator,
            right,
        }
    }

    fn group(relation: Relation, conditions: Vec<Condition>) -> ConditionGroup {
        ConditionGroup { conditions, relation }
    }

    async fn ids(db: &InMemoryDatabase, group: ConditionGroup) -> Vec<Value> {
        let response = db
            .query(QueryRequest {
                table_id: 1,
                select_fields: vec!["id".to_string()],
                condition_group: Some(group),
                order_by: vec![OrderBy {
                    field: "id".to_string(),
                    direction: SortDirection::Asc,
                }],
                limit: None,
                caller: Caller::default(),
            })
            .await
            .unwrap();
        response.objects.into_iter().map(|r| r["id"].clone()).collect()
    }

    #[tokio::test]
    async fn evaluates_operators() {
        let db = db();
        assert_eq!(ids(&db, group(Relation::And, vec![cond("age", Operator::Greater, Some(json!(40)))])).await, vec![json!(2), json!(3)]);
        assert_eq!(ids(&db, group(Relation::And, vec![cond("name", Operator::Like, Some(json!("a%")))])).await, vec![json!(1), json!(2)]);
        assert_eq!(ids(&db, group(Relation::And, vec![cond("deleted_at", Operator::IsNull, None)])).await, vec![json!(1), json!(2)]);
        assert_eq!(ids(&db, group(Relation::And, vec![cond("id", Operator::In, Some(json!("[1, 3]")))])).await, vec![json!(1), json!(3)]);
        assert_eq!(ids(&db, group(Relation::And, vec![cond("id", Operator::NotIn, Some(json!([1])))])).await, vec![json!(2), json!(3)]);
        assert_eq!(
            ids(
                &db,
                group(
                    Relation::Or,
                    vec![cond("id", Operator::Equal, Some(json!("1"))), cond("age", Operator::GreaterEqual, Some(json!(85)))]
                )
            )
            .await,
            vec![json!(1), json!(3)]
        );
    }

    #[tokio::test]
    async fn query_orders_limits_and_projects() {
        let db = db();
        let response = db
            .query(QueryRequest {
                table_id: 1,
                select_fields: vec!["name".to_string()],
                condition_group: None,
                order_by: vec![OrderBy {
                    field: "age".to_string(),
                    direction: SortDirection::Desc,
                }],
                limit: Some(2),
                caller: Caller {
                    is_debug: true,
                    operator: 9,
                },
            })
            .await
            .unwrap();

        assert_eq!(response.objects, rows(json!([{"name": "Grace"}, {"name": "alan"}])));
        assert_eq!(response.row_number, Some(2));
        assert_eq!(
            db.audit(),
            vec![AuditEntry {
                action: "query",
                table_id: 1,
                caller: Caller {
                    is_debug: true,
                    operator: 9
                }
            }]
        );
    }

    #[tokio::test]
    async fn insert_update_delete() {
        let db = db();
        let fields = json!({"id": 4, "name": "Linus"}).as_object().cloned().unwrap();
        let inserted = db
            .insert(InsertRequest {
                table_id: 1,
                fields,
                caller: Caller::default(),
            })
            .await
            .unwrap();
        assert_eq!(inserted.row_number, Some(1));

        let updated = db
            .update(UpdateRequest {
                table_id: 1,
                inventory: UpdateInventory {
                    condition_group: group(Relation::And, vec![cond("id", Operator::LessEqual, Some(json!(2)))]),
                    fields: json!({"age": 0}).as_object().cloned().unwrap(),
                },
                caller: Caller::default(),
            })
            .await
            .unwrap();
        assert_eq!(updated.row_number, Some(2));

        let deleted = db
            .delete(DeleteRequest {
                table_id: 1,
                condition_group: group(Relation::And, vec![cond("age", Operator::Equal, Some(json!(0)))]),
                caller: Caller::default(),
            })
            .await
            .unwrap();
        assert_eq!(deleted.row_number, Some(2));
        assert_eq!(db.rows(1).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_table_is_database_error() {
        let err = InMemoryDatabase::new()
            .insert(InsertRequest {
                table_id: 42,
                fields: Map::new(),
                caller: Caller::default(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FLOW-041");
    }
}
