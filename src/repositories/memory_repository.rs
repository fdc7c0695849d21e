use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::DocumentRepository;
use crate::models::{
    Collection, DeleteResult, Document, DocumentId, Filter, InsertOneResult, Pagination,
    RepositoryResult, UpdateResult, ID_FIELD,
};

/// Process-local document store keeping insertion order. Used for local runs and tests.
pub struct InMemoryDocumentRepository {
    collection: Collection,
    documents: RwLock<Vec<Document>>,
}

impl InMemoryDocumentRepository {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            documents: RwLock::new(Vec::new()),
        }
    }

    /// Seed the store; documents without a valid `_id` get a fresh one.
    pub fn with_documents(collection: Collection, documents: Vec<Document>) -> Self {
        let documents = documents
            .into_iter()
            .map(|mut document| {
                if DocumentId::of(&document).is_none() {
                    document.insert(ID_FIELD.to_string(), DocumentId::new().into());
                }
                document
            })
            .collect();

        Self {
            collection,
            documents: RwLock::new(documents),
        }
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    fn collection(&self) -> Collection {
        self.collection
    }

    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn find_many(
        &self,
        filter: Filter,
        pagination: Pagination,
    ) -> RepositoryResult<Vec<Document>> {
        let documents = self.documents.read().await;
        let found = pagination.apply(
            documents
                .iter()
                .filter(|document| filter.matches(document))
                .cloned(),
        );
        debug!("Found {} documents", found.len());
        Ok(found)
    }

    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn find_one(&self, filter: Filter) -> RepositoryResult<Option<Document>> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .find(|document| filter.matches(document))
            .cloned())
    }

    async fn estimated_count(&self) -> RepositoryResult<u64> {
        Ok(self.documents.read().await.len() as u64)
    }

    #[instrument(skip(self, document), fields(collection = %self.collection))]
    async fn insert_one(&self, mut document: Document) -> RepositoryResult<InsertOneResult> {
        let id = DocumentId::new();
        document.insert(ID_FIELD.to_string(), id.into());
        self.documents.write().await.push(document);
        debug!(id = %id, "Document inserted");
        Ok(InsertOneResult::new(id))
    }

    #[instrument(skip(self, fields), fields(collection = %self.collection))]
    async fn update_one(
        &self,
        filter: Filter,
        fields: Document,
    ) -> RepositoryResult<UpdateResult> {
        let mut documents = self.documents.write().await;
        let Some(document) = documents
            .iter_mut()
            .find(|document| filter.matches(document))
        else {
            return Ok(UpdateResult::unmatched());
        };

        let mut modified = false;
        for (name, value) in fields {
            if name == ID_FIELD {
                continue;
            }
            if document.get(&name) != Some(&value) {
                document.insert(name, value);
                modified = true;
            }
        }

        Ok(UpdateResult::new(1, u64::from(modified)))
    }

    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn delete_one(&self, filter: Filter) -> RepositoryResult<DeleteResult> {
        let mut documents = self.documents.write().await;
        match documents
            .iter()
            .position(|document| filter.matches(document))
        {
            Some(index) => {
                documents.remove(index);
                Ok(DeleteResult::new(1))
            }
            None => Ok(DeleteResult::new(0)),
        }
    }

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn seeded() -> InMemoryDocumentRepository {
        InMemoryDocumentRepository::with_documents(
            Collection::Reviews,
            vec![
                doc(json!({"email": "a@kitchen.io", "message": "first"})),
                doc(json!({"email": "b@kitchen.io", "message": "second"})),
                doc(json!({"email": "a@kitchen.io", "message": "third"})),
            ],
        )
    }

    #[tokio::test]
    async fn test_with_documents_assigns_ids() {
        let repo = seeded();
        let all = repo.find_many(Filter::all(), Pagination::unbounded()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|document| DocumentId::of(document).is_some()));
    }

    #[tokio::test]
    async fn test_find_many_keeps_insertion_order() {
        let repo = seeded();
        let found = repo
            .find_many(
                Filter::all().with_field("email", "a@kitchen.io"),
                Pagination::unbounded(),
            )
            .await
            .unwrap();

        let messages: Vec<_> = found.iter().map(|d| d["message"].clone()).collect();
        assert_eq!(messages, vec![json!("first"), json!("third")]);
    }

    #[tokio::test]
    async fn test_find_many_window() {
        let repo = seeded();
        let page = repo
            .find_many(Filter::all(), Pagination { skip: 1, limit: Some(1) })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["message"], "second");
    }

    #[tokio::test]
    async fn test_find_one_absent_is_none() {
        let repo = seeded();
        let found = repo.find_one(Filter::by_id(DocumentId::new())).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_insert_one_overrides_client_id() {
        let repo = InMemoryDocumentRepository::new(Collection::Services);
        let result = repo
            .insert_one(doc(json!({"_id": "client-chosen", "name": "Pizza Place"})))
            .await
            .unwrap();

        assert!(result.acknowledged);
        let stored = repo.find_one(Filter::by_id(result.inserted_id)).await.unwrap().unwrap();
        assert_eq!(stored["name"], "Pizza Place");
        assert_eq!(stored[ID_FIELD], json!(result.inserted_id.to_string()));
        assert_eq!(repo.estimated_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_one_sets_only_named_fields() {
        let repo = seeded();
        let target = repo.find_one(Filter::all()).await.unwrap().unwrap();
        let id = DocumentId::of(&target).unwrap();

        let result = repo
            .update_one(Filter::by_id(id), doc(json!({"message": "edited"})))
            .await
            .unwrap();
        assert_eq!(result, UpdateResult::new(1, 1));

        let updated = repo.find_one(Filter::by_id(id)).await.unwrap().unwrap();
        assert_eq!(updated["message"], "edited");
        assert_eq!(updated["email"], "a@kitchen.io");

        // Same value again: matched but not modified
        let result = repo
            .update_one(Filter::by_id(id), doc(json!({"message": "edited"})))
            .await
            .unwrap();
        assert_eq!(result, UpdateResult::new(1, 0));
    }

    #[tokio::test]
    async fn test_update_one_without_match() {
        let repo = seeded();
        let result = repo
            .update_one(Filter::by_id(DocumentId::new()), doc(json!({"message": "x"})))
            .await
            .unwrap();
        assert_eq!(result, UpdateResult::unmatched());
    }

    #[tokio::test]
    async fn test_delete_one() {
        let repo = seeded();
        let target = repo.find_one(Filter::all()).await.unwrap().unwrap();
        let id = DocumentId::of(&target).unwrap();

        assert_eq!(repo.delete_one(Filter::by_id(id)).await.unwrap().deleted_count, 1);
        assert_eq!(repo.delete_one(Filter::by_id(id)).await.unwrap().deleted_count, 0);
        assert_eq!(repo.estimated_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_malformed_id_filter_touches_nothing() {
        let repo = seeded();
        let filter = Filter::all().with_field(ID_FIELD, "not-an-id");

        assert!(repo.find_one(filter.clone()).await.unwrap().is_none());
        let update = repo
            .update_one(filter.clone(), doc(json!({"message": "hijacked"})))
            .await
            .unwrap();
        assert_eq!(update, UpdateResult::unmatched());
        assert_eq!(repo.delete_one(filter).await.unwrap().deleted_count, 0);

        assert_eq!(repo.estimated_count().await.unwrap(), 3);
        let untouched = repo
            .find_many(
                Filter::all().with_field("message", "hijacked"),
                Pagination::unbounded(),
            )
            .await
            .unwrap();
        assert!(untouched.is_empty());
    }
}
