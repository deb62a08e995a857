// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

//! Request processing independent of the HTTP server: from form fields to a reply.

use crate::config::ServiceConfig;
use crate::distiller::{CommandDistiller, Distiller, Syntax};
use crate::error::DistillerError;
use crate::extract::{extract_microdata, extract_rdf};
use crate::form::FormData;
use crate::format::OutputFormat;
use crate::options::Options;
use crate::pages::{self, Operation};
use crate::source::{Fetcher, HttpFetcher, Selection, Source, UrlPolicy};
use crate::validator::validate_rdfa;
use http::StatusCode;
use log::{debug, info, warn};
use std::sync::Arc;
use url::form_urlencoded;

const HTML: &str = "text/html; charset=utf-8";

/// What to send back for one request.
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub content_type: String,
    /// `Location` header of a redirect.
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl Reply {
    fn html(status: StatusCode, page: String) -> Self {
        Reply {
            status,
            content_type: HTML.to_string(),
            location: None,
            body: page.into_bytes(),
        }
    }

    fn redirect(location: String) -> Self {
        Reply {
            status: StatusCode::TEMPORARY_REDIRECT,
            content_type: HTML.to_string(),
            location: Some(location),
            body: Vec::new(),
        }
    }
}

pub struct Service {
    distiller: Arc<dyn Distiller>,
    fetcher: Arc<dyn Fetcher>,
    policy: UrlPolicy,
    no_referer_page: String,
}

impl Service {
    pub fn new(
        distiller: Arc<dyn Distiller>,
        fetcher: Arc<dyn Fetcher>,
        policy: UrlPolicy,
        no_referer_page: impl Into<String>,
    ) -> Self {
        Self {
            distiller,
            fetcher,
            policy,
            no_referer_page: no_referer_page.into(),
        }
    }

    /// The production service: external distiller program and HTTP retrieval.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let policy = UrlPolicy {
            allow_private_hosts: config.allow_private_hosts,
        };
        Self::new(
            Arc::new(
                CommandDistiller::new(config.distiller.clone(), config.distiller_args.clone())
                    .with_timeout(config.distiller_timeout)
                    .with_max_output(config.max_distiller_output),
            ),
            Arc::new(
                HttpFetcher::new(
                    config.fetch_timeout,
                    config.redirection_limit,
                    config.max_fetch_size,
                )
                .with_policy(policy.clone()),
            ),
            policy,
            config.no_referer_page.clone(),
        )
    }

    /// Runs one operation.
    ///
    /// `endpoint` is the path the request came in on, used for referer
    /// redirects. `negotiated` is the format picked from the `Accept` header;
    /// a `format` field overrides it.
    pub fn process(
        &self,
        operation: Operation,
        endpoint: &str,
        form: &FormData,
        referer: Option<&str>,
        negotiated: Option<OutputFormat>,
    ) -> Reply {
        let syntax = operation.syntax();
        let source = match Source::select(form) {
            Selection::Source(source) => source,
            Selection::Missing => {
                debug!("no source in request");
                return Reply::html(StatusCode::BAD_REQUEST, pages::no_uri_page(syntax));
            }
            Selection::Referer => return self.referer_redirect(syntax, endpoint, referer),
        };

        if let Source::Uri(uri) = &source {
            if let Err(e) = self.policy.check(uri) {
                warn!("refusing {uri}: {e}");
                return Reply::html(
                    StatusCode::BAD_REQUEST,
                    pages::cannot_process_page(syntax, uri, &e.to_string()),
                );
            }
        }

        let options = Options::from_form(form);
        let format = if options.format.is_some() {
            options.output_format()
        } else {
            negotiated.unwrap_or_default()
        };
        info!("{operation:?} for {}", source.label());
        let result = match operation {
            Operation::ValidateRdfa => validate_rdfa(
                self.distiller.as_ref(),
                self.fetcher.as_ref(),
                &source,
                &options,
            )
            .map(|page| Reply::html(StatusCode::OK, page)),
            Operation::ExtractRdfa | Operation::ExtractMicrodata => {
                let extract = if operation == Operation::ExtractRdfa {
                    extract_rdf
                } else {
                    extract_microdata
                };
                extract(
                    self.distiller.as_ref(),
                    self.fetcher.as_ref(),
                    &source,
                    &options,
                    format,
                )
                .map(|serialized| Reply {
                    status: StatusCode::OK,
                    content_type: serialized.content_type(),
                    location: None,
                    body: serialized.body,
                })
            }
        };
        result.unwrap_or_else(|e| failure(operation, &e, &source, &options, format))
    }

    fn referer_redirect(
        &self,
        syntax: Syntax,
        endpoint: &str,
        referer: Option<&str>,
    ) -> Reply {
        let Some(referer) = referer else {
            debug!("uri=referer without a Referer header");
            return Reply::redirect(self.no_referer_page.clone());
        };
        if let Err(e) = self.policy.check(referer) {
            warn!("refusing referer {referer}: {e}");
            return Reply::html(
                StatusCode::BAD_REQUEST,
                pages::cannot_process_page(syntax, referer, &e.to_string()),
            );
        }
        let encoded: String = form_urlencoded::byte_serialize(referer.as_bytes()).collect();
        Reply::redirect(format!("{endpoint}?uri={encoded}"))
    }
}

fn failure(
    operation: Operation,
    error: &DistillerError,
    source: &Source,
    options: &Options,
    format: OutputFormat,
) -> Reply {
    warn!("{operation:?} failed for {}: {error}", source.label());
    match error {
        DistillerError::Http { code, reason } => Reply::html(
            error.status_code(),
            pages::http_failure_page(operation, source.label(), *code, reason),
        ),
        DistillerError::UnsafeUri { uri, reason } => Reply::html(
            StatusCode::BAD_REQUEST,
            pages::cannot_process_page(operation.syntax(), uri, reason),
        ),
        _ => Reply::html(
            error.status_code(),
            pages::failure_page(operation, error, source, options, format),
        ),
    }
}
