use async_trait::async_trait;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::operation::RequestId;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue, Select};
use aws_sdk_dynamodb::{Client as DynamoDbClient, Error as DynamoDbError};
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::models::{
    Collection, DeleteResult, Document, DocumentId, Filter, InsertOneResult, Pagination,
    RepositoryError, RepositoryResult, UpdateResult, ID_FIELD,
};

/// Single-document operations against one collection of the document store
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// The collection this repository reads and writes
    fn collection(&self) -> Collection;

    /// Find every document matching the filter, windowed by skip/limit, in store order
    async fn find_many(
        &self,
        filter: Filter,
        pagination: Pagination,
    ) -> RepositoryResult<Vec<Document>>;

    /// Find the first matching document; zero matches is `None`
    async fn find_one(&self, filter: Filter) -> RepositoryResult<Option<Document>>;

    /// Number of documents in the whole collection, ignoring filters
    async fn estimated_count(&self) -> RepositoryResult<u64>;

    /// Store a document under a freshly generated identifier
    async fn insert_one(&self, document: Document) -> RepositoryResult<InsertOneResult>;

    /// Set the given fields on the first matching document
    async fn update_one(&self, filter: Filter, fields: Document)
        -> RepositoryResult<UpdateResult>;

    /// Remove the first matching document
    async fn delete_one(&self, filter: Filter) -> RepositoryResult<DeleteResult>;

    /// Cheap connectivity check against the backing store
    async fn ping(&self) -> RepositoryResult<()>;
}

/// DynamoDB implementation of the DocumentRepository trait.
///
/// Each collection is one table with a string partition key `_id`.
pub struct DynamoDbDocumentRepository {
    client: Arc<DynamoDbClient>,
    collection: Collection,
    table_name: String,
    region: String,
}

impl DynamoDbDocumentRepository {
    /// Create a new DynamoDB document repository
    pub fn new(
        client: Arc<DynamoDbClient>,
        collection: Collection,
        table_name: String,
        region: String,
    ) -> Self {
        Self {
            client,
            collection,
            table_name,
            region,
        }
    }

    /// Get the table name (for testing)
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Create a DynamoDB client span with the usual AWS/OpenTelemetry attributes
    fn create_dynamodb_span(&self, operation: &str) -> tracing::Span {
        tracing::info_span!(
            "DynamoDB",
            "aws.service" = "DynamoDB",
            "aws.operation" = operation,
            "aws.region" = %self.region,
            "aws.dynamodb.table_name" = %self.table_name,
            "aws.request_id" = tracing::field::Empty,
            "aws.remote.service" = "AWS::DynamoDB",
            "aws.remote.operation" = operation,
            "aws.remote.resource.type" = "AWS::DynamoDB::Table",
            "aws.remote.resource.identifier" = %self.table_name,
            "otel.kind" = "client",
            "otel.name" = format!("DynamoDB.{}", operation),
            "rpc.system" = "aws-api",
            "rpc.service" = "AmazonDynamoDBv2",
            "rpc.method" = operation,
            "db.system" = "dynamodb",
            "db.name" = %self.table_name,
            "db.operation" = operation,
            "collection" = %self.collection,
        )
    }

    /// Convert DynamoDB error to RepositoryError
    fn map_dynamodb_error(&self, error: DynamoDbError) -> RepositoryError {
        error!("DynamoDB error: {:?}", error);

        if let DynamoDbError::ResourceNotFoundException(_) = error {
            return RepositoryError::TableNotFound {
                table_name: self.table_name.clone(),
            };
        }

        RepositoryError::AwsSdk {
            message: error.to_string(),
        }
    }

    fn id_key(id: DocumentId) -> AttributeValue {
        AttributeValue::S(id.to_string())
    }

    async fn get_by_id(&self, id: DocumentId) -> RepositoryResult<Option<Document>> {
        let get_span = self.create_dynamodb_span("GetItem");

        let response = async {
            let result = self
                .client
                .get_item()
                .table_name(&self.table_name)
                .key(ID_FIELD, Self::id_key(id))
                .send()
                .await;

            match &result {
                Ok(output) => {
                    if let Some(request_id) = output.request_id() {
                        tracing::Span::current().record("aws.request_id", request_id);
                    }
                }
                Err(e) => {
                    error!("DynamoDB GetItem failed: {}", e);
                }
            }

            result.map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(get_span)
        .await?;

        response.item.map(item_to_document).transpose()
    }

    /// Scan the table with the filter's field terms, stopping once `max` documents were collected
    async fn scan(&self, filter: &Filter, max: Option<u64>) -> RepositoryResult<Vec<Document>> {
        let expression = filter_expression(filter);
        let mut documents = Vec::new();
        let mut exclusive_start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut scan_builder = self
                .client
                .scan()
                .table_name(&self.table_name)
                .select(Select::AllAttributes)
                .set_exclusive_start_key(exclusive_start_key.take());

            if let Some(expression) = &expression {
                scan_builder = scan_builder
                    .filter_expression(expression.text.clone())
                    .set_expression_attribute_names(Some(expression.names.clone()))
                    .set_expression_attribute_values(Some(expression.values.clone()));
            }

            let scan_span = self.create_dynamodb_span("Scan");
            let response = async move {
                scan_builder
                    .send()
                    .await
                    .map_err(|e| self.map_dynamodb_error(e.into()))
            }
            .instrument(scan_span)
            .await?;

            let limit_reached =
                collect_page(&mut documents, response.items.unwrap_or_default(), max);

            match next_page(response.last_evaluated_key) {
                Some(key) if !limit_reached => exclusive_start_key = Some(key),
                _ => break,
            }
        }

        Ok(documents)
    }

    /// Resolve the identifier of the first document a filter selects
    async fn resolve_target(&self, filter: &Filter) -> RepositoryResult<Option<DocumentId>> {
        match target_lookup(filter) {
            TargetLookup::Direct(id) => Ok(Some(id)),
            TargetLookup::Nothing => Ok(None),
            TargetLookup::Search => {
                let document = self.find_one(filter.clone()).await?;
                Ok(document.as_ref().and_then(DocumentId::of))
            }
        }
    }
}

#[async_trait]
impl DocumentRepository for DynamoDbDocumentRepository {
    fn collection(&self) -> Collection {
        self.collection
    }

    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn find_many(
        &self,
        filter: Filter,
        pagination: Pagination,
    ) -> RepositoryResult<Vec<Document>> {
        info!("Finding documents");

        if filter.is_unsatisfiable() {
            info!("Filter can match nothing");
            return Ok(Vec::new());
        }

        let candidates: Vec<Document> = match filter.id() {
            Some(id) => self
                .get_by_id(id)
                .await?
                .filter(|document| filter.matches(document))
                .into_iter()
                .collect(),
            None => {
                let max = pagination
                    .limit
                    .map(|limit| pagination.skip.saturating_add(limit));
                self.scan(&filter, max).await?
            }
        };

        let documents = pagination.apply(candidates);
        info!("Found {} documents", documents.len());
        Ok(documents)
    }

    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn find_one(&self, filter: Filter) -> RepositoryResult<Option<Document>> {
        info!("Finding one document");

        let document = if filter.is_unsatisfiable() {
            None
        } else {
            match filter.id() {
                Some(id) => self
                    .get_by_id(id)
                    .await?
                    .filter(|document| filter.matches(document)),
                None => self.scan(&filter, Some(1)).await?.into_iter().next(),
            }
        };

        if document.is_some() {
            info!("Document found");
        } else {
            info!("Document not found");
        }
        Ok(document)
    }

    /// Counts with a paginated `Select::Count` scan, so fresh writes are included
    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn estimated_count(&self) -> RepositoryResult<u64> {
        let mut total = 0u64;
        let mut exclusive_start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let count_span = self.create_dynamodb_span("Scan");
            let request = self
                .client
                .scan()
                .table_name(&self.table_name)
                .select(Select::Count)
                .set_exclusive_start_key(exclusive_start_key.take());

            let response = async move {
                request
                    .send()
                    .await
                    .map_err(|e| self.map_dynamodb_error(e.into()))
            }
            .instrument(count_span)
            .await?;

            total = add_page_count(total, response.count());

            match next_page(response.last_evaluated_key) {
                Some(key) => exclusive_start_key = Some(key),
                None => break,
            }
        }

        debug!(count = total, "Counted documents");
        Ok(total)
    }

    #[instrument(skip(self, document), fields(table = %self.table_name))]
    async fn insert_one(&self, mut document: Document) -> RepositoryResult<InsertOneResult> {
        info!("Inserting document");

        let id = DocumentId::new();
        document.insert(ID_FIELD.to_string(), id.into());
        let item = document_to_item(&document);

        let put_span = self.create_dynamodb_span("PutItem");

        async {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .condition_expression("attribute_not_exists(#id)")
                .expression_attribute_names("#id", ID_FIELD)
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(put_span)
        .await?;

        info!(id = %id, "Document inserted successfully");
        Ok(InsertOneResult::new(id))
    }

    #[instrument(skip(self, fields), fields(table = %self.table_name))]
    async fn update_one(
        &self,
        filter: Filter,
        mut fields: Document,
    ) -> RepositoryResult<UpdateResult> {
        info!("Updating document");

        let Some(id) = self.resolve_target(&filter).await? else {
            info!("No document matched update filter");
            return Ok(UpdateResult::unmatched());
        };

        // The identifier is immutable
        fields.remove(ID_FIELD);
        if fields.is_empty() {
            let matched = self.get_by_id(id).await?.is_some();
            return Ok(UpdateResult::new(u64::from(matched), 0));
        }

        let expression = update_expression(&fields);
        let update_span = self.create_dynamodb_span("UpdateItem");

        let result = async {
            self.client
                .update_item()
                .table_name(&self.table_name)
                .key(ID_FIELD, Self::id_key(id))
                .update_expression(expression.text)
                .condition_expression("attribute_exists(#id)")
                .set_expression_attribute_names(Some(expression.names))
                .set_expression_attribute_values(Some(expression.values))
                .return_values(ReturnValue::UpdatedOld)
                .send()
                .await
        }
        .instrument(update_span)
        .await;

        let output = match result {
            Ok(output) => output,
            Err(e) if e.as_service_error().map(is_missing_target).unwrap_or(false) => {
                info!(id = %id, "Document vanished before update");
                return Ok(UpdateResult::unmatched());
            }
            Err(e) => return Err(self.map_dynamodb_error(e.into())),
        };

        let modified = modified_count(&fields, output.attributes());
        info!(id = %id, modified, "Document updated successfully");
        Ok(UpdateResult::new(1, modified))
    }

    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn delete_one(&self, filter: Filter) -> RepositoryResult<DeleteResult> {
        info!("Deleting document");

        let Some(id) = self.resolve_target(&filter).await? else {
            info!("No document matched delete filter");
            return Ok(DeleteResult::new(0));
        };

        let delete_span = self.create_dynamodb_span("DeleteItem");

        let output = async {
            self.client
                .delete_item()
                .table_name(&self.table_name)
                .key(ID_FIELD, Self::id_key(id))
                .return_values(ReturnValue::AllOld)
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(delete_span)
        .await?;

        let deleted = deleted_count(output.attributes());
        info!(id = %id, deleted, "Delete completed");
        Ok(DeleteResult::new(deleted))
    }

    async fn ping(&self) -> RepositoryResult<()> {
        self.client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
            .map_err(|e| self.map_dynamodb_error(e.into()))?;
        Ok(())
    }
}

/// Expression text with its `#name` and `:value` placeholders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    pub text: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

/// Scan filter for the field terms of `filter`; `None` when there are none
pub fn filter_expression(filter: &Filter) -> Option<Expression> {
    if filter.fields().is_empty() {
        return None;
    }

    let mut expression = Expression::default();
    let mut terms = Vec::with_capacity(filter.fields().len());

    for (index, (name, value)) in filter.fields().iter().enumerate() {
        let name_placeholder = format!("#f{}", index);
        let value_placeholder = format!(":v{}", index);

        // null also matches a missing attribute
        if value.is_null() {
            terms.push(format!(
                "(attribute_not_exists({name}) OR {name} = {value})",
                name = name_placeholder,
                value = value_placeholder
            ));
        } else {
            terms.push(format!("{} = {}", name_placeholder, value_placeholder));
        }

        expression.names.insert(name_placeholder, name.clone());
        expression
            .values
            .insert(value_placeholder, json_to_attribute(value));
    }

    expression.text = terms.join(" AND ");
    Some(expression)
}

/// `SET` expression assigning every field; `#id` is bound for the existence condition
pub fn update_expression(fields: &Document) -> Expression {
    let mut expression = Expression::default();
    expression
        .names
        .insert("#id".to_string(), ID_FIELD.to_string());

    let assignments: Vec<String> = fields
        .iter()
        .enumerate()
        .map(|(index, (name, value))| {
            let name_placeholder = format!("#f{}", index);
            let value_placeholder = format!(":v{}", index);
            let assignment = format!("{} = {}", name_placeholder, value_placeholder);
            expression.names.insert(name_placeholder, name.clone());
            expression
                .values
                .insert(value_placeholder, json_to_attribute(value));
            assignment
        })
        .collect();

    expression.text = format!("SET {}", assignments.join(", "));
    expression
}

/// Append one scan page to `documents`. Returns true once `max` documents are held.
pub fn collect_page(
    documents: &mut Vec<Document>,
    items: Vec<HashMap<String, AttributeValue>>,
    max: Option<u64>,
) -> bool {
    for item in items {
        match item_to_document(item) {
            Ok(document) => documents.push(document),
            Err(e) => warn!("Failed to convert item to document: {}", e),
        }
    }

    match max {
        Some(max) if documents.len() as u64 >= max => {
            documents.truncate(usize::try_from(max).unwrap_or(usize::MAX));
            true
        }
        _ => false,
    }
}

/// Start key for the next scan page; `None` after the last page
pub fn next_page(
    last_evaluated_key: Option<HashMap<String, AttributeValue>>,
) -> Option<HashMap<String, AttributeValue>> {
    last_evaluated_key.filter(|key| !key.is_empty())
}

/// Add a page's `Count` to the running total
pub fn add_page_count(total: u64, page_count: i32) -> u64 {
    total.saturating_add(u64::try_from(page_count).unwrap_or(0))
}

/// 1 when any field differs from its value in the `UpdatedOld` attributes
pub fn modified_count(
    fields: &Document,
    previous: Option<&HashMap<String, AttributeValue>>,
) -> u64 {
    let modified = fields.iter().any(|(name, value)| {
        match previous.and_then(|previous| previous.get(name)) {
            Some(old) => attribute_to_json(name, old).ok().as_ref() != Some(value),
            None => true,
        }
    });
    u64::from(modified)
}

/// 1 when `AllOld` returned the removed item
pub fn deleted_count(old: Option<&HashMap<String, AttributeValue>>) -> u64 {
    u64::from(old.map(|attributes| !attributes.is_empty()).unwrap_or(false))
}

/// How update and delete find the document a filter selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetLookup {
    /// Pure identifier filter: address the key directly
    Direct(DocumentId),
    /// Other terms present: find the first match, then use its key
    Search,
    /// The filter can match nothing
    Nothing,
}

pub fn target_lookup(filter: &Filter) -> TargetLookup {
    if filter.is_unsatisfiable() {
        return TargetLookup::Nothing;
    }
    match filter.id() {
        Some(id) if filter.is_id_only() => TargetLookup::Direct(id),
        _ => TargetLookup::Search,
    }
}

/// The conditional check guarding updates fails when the item is gone
pub fn is_missing_target(error: &UpdateItemError) -> bool {
    error.is_conditional_check_failed_exception()
}

/// Convert a JSON value to a DynamoDB attribute value
pub fn json_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(flag) => AttributeValue::Bool(*flag),
        Value::Number(number) => AttributeValue::N(number.to_string()),
        Value::String(text) => AttributeValue::S(text.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(json_to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(key, value)| (key.clone(), json_to_attribute(value)))
                .collect(),
        ),
    }
}

/// Convert a DynamoDB attribute value back to JSON. `field` names the attribute in errors.
pub fn attribute_to_json(field: &str, attribute: &AttributeValue) -> RepositoryResult<Value> {
    match attribute {
        AttributeValue::S(text) => Ok(Value::String(text.clone())),
        AttributeValue::N(number) => parse_number(field, number),
        AttributeValue::Bool(flag) => Ok(Value::Bool(*flag)),
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::L(values) => values
            .iter()
            .map(|value| attribute_to_json(field, value))
            .collect::<RepositoryResult<Vec<_>>>()
            .map(Value::Array),
        AttributeValue::M(map) => map
            .iter()
            .map(|(key, value)| attribute_to_json(key, value).map(|json| (key.clone(), json)))
            .collect::<RepositoryResult<Document>>()
            .map(Value::Object),
        AttributeValue::Ss(values) => Ok(Value::Array(
            values.iter().cloned().map(Value::String).collect(),
        )),
        AttributeValue::Ns(values) => values
            .iter()
            .map(|number| parse_number(field, number))
            .collect::<RepositoryResult<Vec<_>>>()
            .map(Value::Array),
        _ => Err(RepositoryError::UnsupportedAttribute {
            field: field.to_string(),
        }),
    }
}

fn parse_number(field: &str, raw: &str) -> RepositoryResult<Value> {
    if let Ok(integer) = raw.parse::<i64>() {
        return Ok(Value::Number(integer.into()));
    }
    if let Ok(unsigned) = raw.parse::<u64>() {
        return Ok(Value::Number(unsigned.into()));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| RepositoryError::InvalidDocument {
            message: format!("Invalid number in field {}: {}", field, raw),
        })
}

/// Convert a document to a DynamoDB item
pub fn document_to_item(document: &Document) -> HashMap<String, AttributeValue> {
    document
        .iter()
        .map(|(key, value)| (key.clone(), json_to_attribute(value)))
        .collect()
}

/// Convert a DynamoDB item to a document
pub fn item_to_document(item: HashMap<String, AttributeValue>) -> RepositoryResult<Document> {
    if !item.contains_key(ID_FIELD) {
        return Err(RepositoryError::InvalidDocument {
            message: format!("Missing {}", ID_FIELD),
        });
    }

    item.iter()
        .map(|(key, value)| attribute_to_json(key, value).map(|json| (key.clone(), json)))
        .collect()
}
