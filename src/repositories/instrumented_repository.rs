use async_trait::async_trait;
use std::sync::Arc;

use super::DocumentRepository;
use crate::models::{
    Collection, DeleteResult, Document, Filter, InsertOneResult, Pagination, RepositoryResult,
    UpdateResult,
};
use crate::observability::DatabaseTracingMiddleware;

/// Decorates a repository with per-operation metrics and logging
pub struct InstrumentedRepository {
    inner: Arc<dyn DocumentRepository>,
    tracer: DatabaseTracingMiddleware,
}

impl InstrumentedRepository {
    pub fn new(inner: Arc<dyn DocumentRepository>, tracer: DatabaseTracingMiddleware) -> Self {
        Self { inner, tracer }
    }

    fn label(&self) -> String {
        self.inner.collection().to_string()
    }
}

#[async_trait]
impl DocumentRepository for InstrumentedRepository {
    fn collection(&self) -> Collection {
        self.inner.collection()
    }

    async fn find_many(
        &self,
        filter: Filter,
        pagination: Pagination,
    ) -> RepositoryResult<Vec<Document>> {
        self.tracer
            .trace_operation(
                "find_many",
                &self.label(),
                self.inner.find_many(filter, pagination),
            )
            .await
    }

    async fn find_one(&self, filter: Filter) -> RepositoryResult<Option<Document>> {
        self.tracer
            .trace_operation("find_one", &self.label(), self.inner.find_one(filter))
            .await
    }

    async fn estimated_count(&self) -> RepositoryResult<u64> {
        self.tracer
            .trace_operation("estimated_count", &self.label(), self.inner.estimated_count())
            .await
    }

    async fn insert_one(&self, document: Document) -> RepositoryResult<InsertOneResult> {
        self.tracer
            .trace_operation("insert_one", &self.label(), self.inner.insert_one(document))
            .await
    }

    async fn update_one(
        &self,
        filter: Filter,
        fields: Document,
    ) -> RepositoryResult<UpdateResult> {
        self.tracer
            .trace_operation(
                "update_one",
                &self.label(),
                self.inner.update_one(filter, fields),
            )
            .await
    }

    async fn delete_one(&self, filter: Filter) -> RepositoryResult<DeleteResult> {
        self.tracer
            .trace_operation("delete_one", &self.label(), self.inner.delete_one(filter))
            .await
    }

    async fn ping(&self) -> RepositoryResult<()> {
        self.tracer
            .trace_operation("ping", &self.label(), self.inner.ping())
            .await
    }
}
