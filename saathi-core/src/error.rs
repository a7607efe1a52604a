use thiserror::Error;

#[derive(Error, Debug)]
pub enum SaathiError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cannot load config {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: config::ConfigError,
    },

    #[error("No database url configured")]
    NoDatabase,
}
