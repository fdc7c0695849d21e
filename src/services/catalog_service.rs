use std::sync::Arc;
use tracing::{debug, instrument};

use crate::models::{
    Collection, Document, DocumentId, Filter, InsertOneResult, Pagination, RepositoryResult,
    ServiceResult, ServicesPage,
};
use crate::repositories::DocumentRepository;

/// Read and create operations over the service listings and the food list
pub struct CatalogService {
    services: Arc<dyn DocumentRepository>,
    food: Arc<dyn DocumentRepository>,
}

impl CatalogService {
    pub fn new(services: Arc<dyn DocumentRepository>, food: Arc<dyn DocumentRepository>) -> Self {
        Self { services, food }
    }

    /// One page of services plus the estimated size of the whole collection
    #[instrument(skip(self))]
    pub async fn list_services(&self, pagination: Pagination) -> ServiceResult<ServicesPage> {
        crate::info_with_trace!("Listing services");

        let services = self.services.find_many(Filter::all(), pagination).await?;
        let count = self.services.estimated_count().await?;

        crate::info_with_trace!("Returning {} of ~{} services", services.len(), count);
        Ok(ServicesPage { count, services })
    }

    #[instrument(skip(self))]
    pub async fn get_service(&self, id: &str) -> ServiceResult<Option<Document>> {
        let id = DocumentId::parse(id)?;
        Ok(self.services.find_one(Filter::by_id(id)).await?)
    }

    #[instrument(skip(self, service))]
    pub async fn add_service(&self, service: Document) -> ServiceResult<InsertOneResult> {
        let result = self.services.insert_one(service).await?;
        crate::info_with_trace!(id = %result.inserted_id, "Service added");
        Ok(result)
    }

    /// Every food item, unpaginated
    #[instrument(skip(self))]
    pub async fn list_food(&self) -> ServiceResult<Vec<Document>> {
        Ok(self.food.find_many(Filter::all(), Pagination::unbounded()).await?)
    }

    /// `GET /review/:id` resolves against the services collection.
    #[instrument(skip(self))]
    pub async fn get_review_by_id(&self, id: &str) -> ServiceResult<Option<Document>> {
        let id = DocumentId::parse(id)?;
        debug!(id = %id, "Review lookup served from the services collection");
        Ok(self.services.find_one(Filter::by_id(id)).await?)
    }

    /// Ping the services and food collections
    pub async fn check_stores(&self) -> Vec<(Collection, RepositoryResult<()>)> {
        vec![
            (self.services.collection(), self.services.ping().await),
            (self.food.collection(), self.food.ping().await),
        ]
    }
}
