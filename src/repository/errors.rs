use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Malformed document {collection}/{id}: {message}")]
    MalformedDocument {
        collection: &'static str,
        id: String,
        message: String,
    },
}
