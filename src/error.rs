// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

use std::io;
use thiserror::Error;

/// Failures while turning a request source into RDF.
///
/// The HTTP layer only needs to tell an upstream HTTP failure apart from
/// everything else: the former gets its own page carrying the upstream status.
#[derive(Debug, Error)]
pub enum DistillerError {
    /// The source URI answered with a non-success status.
    #[error("HTTP Error: {code} ({reason})")]
    Http { code: u16, reason: String },

    /// The source URI could not be retrieved at all.
    #[error("unable to retrieve {uri}: {source}")]
    Fetch {
        uri: String,
        #[source]
        source: io::Error,
    },

    #[error("source document exceeds the limit of {limit} bytes")]
    TooLarge { limit: u64 },

    /// The URI did not pass the safety check.
    #[error("{reason}")]
    UnsafeUri { uri: String, reason: String },

    #[error("unable to run distiller '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("distiller exited with status {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("distiller did not finish within {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("distiller output exceeds the limit of {limit} bytes")]
    OutputTooLarge { limit: u64 },

    #[error("too many redirections from {uri}, the last target was {target}")]
    TooManyRedirects { uri: String, target: String },

    #[error("invalid distiller output: {0}")]
    Output(#[from] oxrdfio::RdfParseError),

    #[error("serialization error: {0}")]
    Serialize(#[source] io::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DistillerError {
    /// Status to answer with when this error ends a request.
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            DistillerError::Http { code, .. } if *code >= 400 => {
                http::StatusCode::from_u16(*code).unwrap_or(http::StatusCode::BAD_REQUEST)
            }
            _ => http::StatusCode::BAD_REQUEST,
        }
    }
}
