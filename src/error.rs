use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to connect to {address}: {reason}")]
    ConnectionError { address: String, reason: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Parameter index {index} out of bounds for {len} parameters")]
    BindingError { index: usize, len: usize },

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Coercion error: {0}")]
    CoercionError(String),

    #[error("Store operation on {table} failed: {source}")]
    StoreError {
        table: String,
        #[source]
        source: Box<DbError>,
    },

    #[error("Capability not supported: {0}")]
    CapabilityNotSupported(String),

    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("Duplicate key {key} in collection '{collection}'")]
    DuplicateKey { collection: String, key: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// Wraps a store-level failure with the table it happened on.
    pub fn store(table: &str, source: DbError) -> Self {
        DbError::StoreError {
            table: table.to_string(),
            source: Box::new(source),
        }
    }
}

impl serde::Serialize for DbError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
