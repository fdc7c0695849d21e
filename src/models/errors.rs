use thiserror::Error;

/// Service-level errors that can occur in request handling
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid document identifier: {id}")]
    InvalidIdentifier { id: String },

    #[error("Repository error: {source}")]
    Repository {
        #[from]
        source: RepositoryError,
    },
}

/// Repository-level errors for document store operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("AWS SDK error: {message}")]
    AwsSdk { message: String },

    #[error("DynamoDB table not found: {table_name}. Ensure the table exists and IAM permissions are correct.")]
    TableNotFound { table_name: String },

    #[error("Unsupported attribute type for field: {field}")]
    UnsupportedAttribute { field: String },

    #[error("Invalid document: {message}")]
    InvalidDocument { message: String },
}

/// Token issuing and verification errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization header missing")]
    MissingHeader,

    #[error("Authorization header malformed")]
    MalformedHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result type alias for token operations
pub type AuthResult<T> = Result<T, AuthError>;
