// Repositories module - data access layer

pub mod document_repository;
pub mod instrumented_repository;
pub mod memory_repository;


pub use document_repository::{DocumentRepository, DynamoDbDocumentRepository};
pub use instrumented_repository::InstrumentedRepository;
pub use memory_repository::InMemoryDocumentRepository;
