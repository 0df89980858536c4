//! Item table trait for wide-column storage

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// A typed attribute value in the table's wire format (`{"S": "..."}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String
    S(String),
    /// Number, carried as its decimal string
    N(String),
    /// Boolean
    #[serde(rename = "BOOL")]
    Bool(bool),
    /// Null marker
    #[serde(rename = "NULL")]
    Null(bool),
}

impl AttributeValue {
    /// String attribute
    pub fn string(value: impl Into<String>) -> Self {
        Self::S(value.into())
    }

    /// Number attribute
    pub fn number(value: impl ToString) -> Self {
        Self::N(value.to_string())
    }

    /// Plain JSON rendering, numbers parsed back when they fit
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::S(s) => serde_json::Value::String(s.clone()),
            Self::N(n) => n
                .parse::<i64>()
                .map(serde_json::Value::from)
                .or_else(|_| n.parse::<f64>().map(serde_json::Value::from))
                .unwrap_or_else(|_| serde_json::Value::String(n.clone())),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Null(_) => serde_json::Value::Null,
        }
    }
}

/// One table row: attribute name to value
pub type Item = HashMap<String, AttributeValue>;

/// Render an item as a plain JSON object
pub fn item_to_json(item: &Item) -> serde_json::Value {
    serde_json::Value::Object(
        item.iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect(),
    )
}

/// Trait for key-addressed item storage
///
/// Implementations:
/// - `DynamoDbClient`: DynamoDB `GetItem` / `PutItem` / `UpdateItem`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemTable: Send + Sync {
    /// Read one item by primary key
    async fn get_item(&self, table: &str, key: Item) -> Result<Option<Item>>;

    /// Write a whole item
    async fn put_item(&self, table: &str, item: Item) -> Result<()>;

    /// Apply an update expression to one item
    async fn update_item(
        &self,
        table: &str,
        key: Item,
        update_expression: &str,
        values: Item,
    ) -> Result<()>;
}
