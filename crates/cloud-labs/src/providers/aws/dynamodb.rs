//! DynamoDB client for item reads and writes

use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde::Deserialize;
use std::sync::Arc;

use super::auth::{AwsAuth, ServiceRequest};
use crate::error::{Error, Result};
use crate::providers::item_table::{Item, ItemTable};

const CONTENT_TYPE: &str = "application/x-amz-json-1.0";
const TARGET_PREFIX: &str = "DynamoDB_20120810";

/// DynamoDB JSON protocol client
pub struct DynamoDbClient {
    auth: Arc<AwsAuth>,
}

impl DynamoDbClient {
    pub fn new(auth: Arc<AwsAuth>) -> Self {
        Self { auth }
    }

    fn request<'a>(
        &self,
        operation: &'a str,
        body: &serde_json::Value,
    ) -> Result<ServiceRequest<'a>> {
        ServiceRequest::target(
            "dynamodb",
            operation,
            self.auth.endpoint("dynamodb"),
            &format!("{}.{}", TARGET_PREFIX, operation),
            CONTENT_TYPE,
            body,
        )
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetItemResponse {
    #[serde(default)]
    item: Option<Item>,
}

#[async_trait]
impl ItemTable for DynamoDbClient {
    #[tracing::instrument(skip(self, key))]
    async fn get_item(&self, table: &str, key: Item) -> Result<Option<Item>> {
        let body = serde_json::json!({ "TableName": table, "Key": key });
        let response: GetItemResponse = self
            .auth
            .call(self.request("GetItem", &body)?, Error::Database)
            .await?;
        Ok(response.item)
    }

    #[tracing::instrument(skip(self, item))]
    async fn put_item(&self, table: &str, item: Item) -> Result<()> {
        let body = serde_json::json!({ "TableName": table, "Item": item });
        let _: IgnoredAny = self
            .auth
            .call(self.request("PutItem", &body)?, Error::Database)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, key, values))]
    async fn update_item(
        &self,
        table: &str,
        key: Item,
        update_expression: &str,
        values: Item,
    ) -> Result<()> {
        let body = serde_json::json!({
            "TableName": table,
            "Key": key,
            "UpdateExpression": update_expression,
            "ExpressionAttributeValues": values,
        });
        let _: IgnoredAny = self
            .auth
            .call(self.request("UpdateItem", &body)?, Error::Database)
            .await?;
        Ok(())
    }
}
