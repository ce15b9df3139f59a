//! Error types and handling for the city geocoder

use thiserror::Error;

/// Main error type for the city geocoder
#[derive(Error, Debug)]
pub enum GeocoderError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Geocoding service communication errors
    #[error("API error: {message}")]
    Api { message: String },

    /// Missing or malformed input records
    #[error("Invalid input: {message}")]
    Input { message: String },

    /// Checkpoint and output file errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Record (de)serialization errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl GeocoderError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a new input error
    pub fn input<S: Into<String>>(message: S) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            GeocoderError::Config { message } => {
                format!("Configuration error: {message}. Please check your config file.")
            }
            GeocoderError::Api { .. } => {
                "Unable to reach the geocoding service. Please check your internet connection."
                    .to_string()
            }
            GeocoderError::Input { message } => format!("Invalid input: {message}"),
            GeocoderError::Storage { message } => format!("Could not save results: {message}"),
            GeocoderError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
            GeocoderError::Json { source } => format!("Malformed JSON: {source}"),
        }
    }
}
