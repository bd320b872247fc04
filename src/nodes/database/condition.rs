//! Clause groups and their translation into operator conditions
//!
//! A node's configured `ClauseGroup` names the left column and operator of
//! each clause; the right operands arrive at run time in the input map under
//! `SingleRight` or `Multi_<index>_Right`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::binding::take_map_value;
use crate::error::{FlowError, Result};

/// Input key of a single clause's right operand
pub const SINGLE_RIGHT: &str = "SingleRight";
/// Input key holding the columns written by an insert or update
pub const FIELDS: &str = "Fields";

/// Input key of the right operand of clause `index` in a multi group
pub fn multi_right_key(index: usize) -> String {
    format!("Multi_{index}_Right")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    #[serde(alias = "=")]
    Equal,
    #[serde(alias = "!=")]
    NotEqual,
    #[serde(alias = ">")]
    Greater,
    #[serde(alias = ">=")]
    GreaterEqual,
    #[serde(alias = "<")]
    Less,
    #[serde(alias = "<=")]
    LessEqual,
    In,
    #[serde(alias = "NOT IN")]
    NotIn,
    Like,
    #[serde(alias = "NOT LIKE")]
    NotLike,
    #[serde(alias = "IS NULL")]
    IsNull,
    #[serde(alias = "IS NOT NULL")]
    IsNotNull,
}

impl Operator {
    /// Null checks take no right operand
    pub fn needs_operand(&self) -> bool {
        !matches!(self, Operator::IsNull | Operator::IsNotNull)
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Relation {
    #[default]
    #[serde(alias = "and")]
    And,
    #[serde(alias = "or")]
    Or,
}

/// Configured clause: column and operator, operand supplied at run time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub left: String,
    pub operator: Operator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiClause {
    pub clauses: Vec<Clause>,
    #[serde(default)]
    pub relation: Relation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseGroup {
    Single(Clause),
    Multi(MultiClause),
}

/// Clause with its operand bound; `right` is `None` for null checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub left: String,
    pub operator: Operator,
    pub right: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub conditions: Vec<Condition>,
    pub relation: Relation,
}

/// Conditions plus the column values an update writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateInventory {
    pub condition_group: ConditionGroup,
    pub fields: Map<String, Value>,
}

fn bind(clause: &Clause, key: &str, input: &Map<String, Value>) -> Result<Condition> {
    let right = if clause.operator.needs_operand() {
        let value = take_map_value(input, &[key]).ok_or_else(|| FlowError::MissingOperand {
            key: key.to_string(),
        })?;
        Some(value.clone())
    } else {
        None
    };

    Ok(Condition {
        left: clause.left.clone(),
        operator: clause.operator,
        right,
    })
}

/// Bind each clause's right operand from `input`
pub fn convert_clause_group_to_condition_group(
    group: &ClauseGroup,
    input: &Map<String, Value>,
) -> Result<ConditionGroup> {
    match group {
        ClauseGroup::Single(clause) => Ok(ConditionGroup {
            conditions: vec![bind(clause, SINGLE_RIGHT, input)?],
            relation: Relation::And,
        }),
        ClauseGroup::Multi(multi) => Ok(ConditionGroup {
            conditions: multi
                .clauses
                .iter()
                .enumerate()
                .map(|(i, clause)| bind(clause, &multi_right_key(i), input))
                .collect::<Result<_>>()?,
            relation: multi.relation,
        }),
    }
}

/// Condition group plus the required `Fields` object from `input`
pub fn convert_clause_group_to_update_inventory(
    group: &ClauseGroup,
    input: &Map<String, Value>,
) -> Result<UpdateInventory> {
    Ok(UpdateInventory {
        condition_group: convert_clause_group_to_condition_group(group, input)?,
        fields: take_fields(input)?,
    })
}

/// The `Fields` object written by inserts and updates
pub fn take_fields(input: &Map<String, Value>) -> Result<Map<String, Value>> {
    match take_map_value(input, &[FIELDS]) {
        Some(Value::Object(fields)) => Ok(fields.clone()),
        Some(other) => Err(FlowError::InvalidInput {
            reason: format!("'{FIELDS}' must be an object, got {other}"),
        }),
        None => Err(FlowError::MissingOperand {
            key: FIELDS.to_string(),
        }),
    }
}
