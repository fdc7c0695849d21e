use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use crate::models::{
    Collection, DeleteResult, Document, DocumentId, Filter, InsertOneResult, Pagination,
    RepositoryResult, ServiceResult, TokenClaims, UpdateResult,
};
use crate::repositories::DocumentRepository;

/// Review listing, creation, message edits and deletion
pub struct ReviewService {
    reviews: Arc<dyn DocumentRepository>,
}

impl ReviewService {
    pub fn new(reviews: Arc<dyn DocumentRepository>) -> Self {
        Self { reviews }
    }

    /// Listing is allowed only when the token's `email` claim equals the requested email.
    /// Both absent also counts as equal.
    pub fn may_list(claims: &TokenClaims, requested_email: Option<&str>) -> bool {
        claims.payload.get("email") == requested_email.map(Value::from).as_ref()
    }

    /// Reviews written by `email`, or every review when the email is absent or empty
    #[instrument(skip(self))]
    pub async fn list_reviews(&self, email: Option<&str>) -> ServiceResult<Vec<Document>> {
        let filter = match email.filter(|email| !email.is_empty()) {
            Some(email) => Filter::all().with_field("email", email),
            None => Filter::all(),
        };

        let reviews = self.reviews.find_many(filter, Pagination::unbounded()).await?;
        crate::info_with_trace!("Found {} reviews", reviews.len());
        Ok(reviews)
    }

    #[instrument(skip(self, review))]
    pub async fn add_review(&self, review: Document) -> ServiceResult<InsertOneResult> {
        let result = self.reviews.insert_one(review).await?;
        crate::info_with_trace!(id = %result.inserted_id, "Review added");
        Ok(result)
    }

    /// Set only the `message` field; an absent message is stored as null
    #[instrument(skip(self, message))]
    pub async fn update_message(
        &self,
        id: &str,
        message: Option<Value>,
    ) -> ServiceResult<UpdateResult> {
        let id = DocumentId::parse(id)?;

        let mut fields = Document::new();
        fields.insert("message".to_string(), message.unwrap_or(Value::Null));

        Ok(self.reviews.update_one(Filter::by_id(id), fields).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete_review(&self, id: &str) -> ServiceResult<DeleteResult> {
        let id = DocumentId::parse(id)?;
        let result = self.reviews.delete_one(Filter::by_id(id)).await?;
        crate::info_with_trace!(deleted = result.deleted_count, "Review delete completed");
        Ok(result)
    }

    /// Ping the reviews collection
    pub async fn check_stores(&self) -> Vec<(Collection, RepositoryResult<()>)> {
        vec![(self.reviews.collection(), self.reviews.ping().await)]
    }
}
