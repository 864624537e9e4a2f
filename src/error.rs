// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Error types for the fleet collector

use thiserror::Error;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network or IO error
    #[error("IO error")]
    Io(#[from] std::io::Error),

    /// Panel API error (login, unexpected payload, unsuccessful response)
    #[error("Panel error: {0}")]
    Panel(String),

    /// Node registry could not be read
    #[error("Registry error: {0}")]
    Registry(String),

    /// Cache computation or distributed cache failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Snapshot sink (metrics/history) failure
    #[error("Sink error: {0}")]
    Sink(String),

    /// Metrics encoding error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Address parsing error
    #[error("Address parse error")]
    AddrParse(#[from] std::net::AddrParseError),
}

/// Convenient alias for Result with application error
pub type Result<T> = std::result::Result<T, AppError>;
