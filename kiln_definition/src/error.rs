// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Loading errors.

use thiserror::Error;

/// One schema document could not be used.
///
/// Document errors are never fatal on their own: the loader logs them and
/// continues with the remaining documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Whoever fetched the document reported a failure.
    #[error("document unavailable: {0}")]
    Unavailable(String),
    /// The text is not JSON.
    #[error("document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The JSON does not have the shape of a schema document.
    #[error("malformed schema document: {0}")]
    Shape(String),
}

/// The definition store could not be built.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// Some expected documents have not arrived yet.
    #[error("still waiting for {pending} schema document(s)")]
    NotReady {
        /// How many documents are outstanding.
        pending: usize,
    },
    /// Every document failed, so there is nothing to build from.
    #[error("no schema document loaded successfully")]
    NoDefinitions,
}
