// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

//! Selection and retrieval of the content to distill.

use crate::error::DistillerError;
use crate::form::FormData;
use crate::options::HostLanguage;
use http::header::{ACCEPT, CONTENT_TYPE, LOCATION, USER_AGENT};
use http::{HeaderValue, Request, Response};
use log::{debug, warn};
use oxhttp::model::Body;
use oxhttp::Client;
use oxiri::Iri;
use std::io::{self, Read};
use std::net::{IpAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use url::{Host, Url};

const SOURCE_ACCEPT: &str = "text/html;q=0.9, application/xhtml+xml, image/svg+xml;q=0.9, application/atom+xml;q=0.8, application/xml;q=0.8, */*;q=0.1";

/// Where the content of a request comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Uri(String),
    Uploaded { filename: String, data: Vec<u8> },
    Text(String),
}

/// Outcome of looking at the source fields of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Source(Source),
    /// `uri=referer`: the caller wants the page it came from.
    Referer,
    /// None of `uploaded`, `text` or `uri` is usable.
    Missing,
}

impl Source {
    /// Picks the source of a request: an upload first, then pasted text, then a URI.
    pub fn select(form: &FormData) -> Selection {
        if let Some((filename, data)) = form.file("uploaded") {
            if !data.is_empty() {
                return Selection::Source(Source::Uploaded {
                    filename: filename.to_string(),
                    data: data.to_vec(),
                });
            }
        }
        if let Some(text) = form.get_first("text") {
            if !text.trim().is_empty() {
                return Selection::Source(Source::Text(text.to_string()));
            }
        }
        match form.get_first("uri") {
            Some("referer") => Selection::Referer,
            Some(uri) => Selection::Source(Source::Uri(uri.trim().to_string())),
            None => Selection::Missing,
        }
    }

    /// The URI, or the `uploaded:`/`text:` pseudo URI shown in reports.
    pub fn label(&self) -> &str {
        match self {
            Source::Uri(uri) => uri,
            Source::Uploaded { .. } => "uploaded:",
            Source::Text(_) => "text:",
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Source::Uri(_))
    }

    pub fn load(&self, fetcher: &dyn Fetcher) -> Result<Document, DistillerError> {
        match self {
            Source::Uri(uri) => fetcher.fetch(uri),
            Source::Uploaded { data, .. } => Ok(Document {
                content: data.clone(),
                base: None,
                media_type: None,
            }),
            Source::Text(text) => Ok(Document {
                content: text.as_bytes().to_vec(),
                base: None,
                media_type: None,
            }),
        }
    }
}

/// Content handed to the distiller.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub content: Vec<u8>,
    pub base: Option<String>,
    /// Media type announced by the origin, without parameters.
    pub media_type: Option<String>,
}

impl Document {
    /// The host language: explicit choice, then the announced media type, then a guess.
    pub fn host_language(&self, requested: Option<HostLanguage>) -> HostLanguage {
        requested
            .or_else(|| {
                self.media_type
                    .as_deref()
                    .and_then(HostLanguage::from_media_type)
            })
            .unwrap_or_else(|| HostLanguage::sniff(&self.content))
    }
}

pub trait Fetcher: Send + Sync {
    fn fetch(&self, uri: &str) -> Result<Document, DistillerError>;
}

pub struct HttpFetcher {
    client: Client,
    redirection_limit: usize,
    max_size: u64,
    user_agent: String,
    /// Checked on the URI and on every redirection target.
    policy: Option<UrlPolicy>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, redirection_limit: usize, max_size: u64) -> Self {
        Self {
            // redirections are followed here, one policy check per hop
            client: Client::new().with_global_timeout(timeout),
            redirection_limit,
            max_size,
            user_agent: concat!("rdfa-md/", env!("CARGO_PKG_VERSION")).to_string(),
            policy: None,
        }
    }

    pub fn with_policy(mut self, policy: UrlPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    fn get(&self, uri: &str) -> Result<Response<Body>, DistillerError> {
        let fetch_error = |source| DistillerError::Fetch {
            uri: uri.to_string(),
            source,
        };
        let request = Request::builder()
            .uri(uri)
            .header(ACCEPT, SOURCE_ACCEPT)
            .header(USER_AGENT, &self.user_agent)
            .body(Body::empty())
            .map_err(|e| fetch_error(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        self.client.request(request).map_err(fetch_error)
    }

    fn document(&self, uri: String, response: Response<Body>) -> Result<Document, DistillerError> {
        let status = response.status();
        if !status.is_success() {
            warn!("{uri} answered {status}");
            return Err(DistillerError::Http {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }
        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());

        let mut content = Vec::new();
        response
            .into_body()
            .take(self.max_size + 1)
            .read_to_end(&mut content)
            .map_err(|source| DistillerError::Fetch {
                uri: uri.clone(),
                source,
            })?;
        if content.len() as u64 > self.max_size {
            return Err(DistillerError::TooLarge {
                limit: self.max_size,
            });
        }
        Ok(Document {
            content,
            base: Some(uri),
            media_type,
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, uri: &str) -> Result<Document, DistillerError> {
        let mut target = uri.to_string();
        for _ in 0..=self.redirection_limit {
            if let Some(policy) = &self.policy {
                policy.check(&target)?;
            }
            debug!("fetching {target}");
            let response = self.get(&target)?;
            if response.status().is_redirection() {
                if let Some(location) = response.headers().get(LOCATION) {
                    let next = resolve_location(&target, location)?;
                    debug!("{target} redirects to {next}");
                    target = next;
                    continue;
                }
            }
            return self.document(target, response);
        }
        Err(DistillerError::TooManyRedirects {
            uri: uri.to_string(),
            target,
        })
    }
}

/// Resolves a `Location` header against the URI that sent it.
fn resolve_location(base: &str, location: &HeaderValue) -> Result<String, DistillerError> {
    let invalid = |reason: String| DistillerError::Fetch {
        uri: base.to_string(),
        source: io::Error::new(io::ErrorKind::InvalidData, reason),
    };
    let location = location
        .to_str()
        .map_err(|e| invalid(format!("invalid Location header: {e}")))?;
    let base = Iri::parse(base).map_err(|e| invalid(format!("invalid URI: {e}")))?;
    let target = base
        .resolve(location)
        .map_err(|e| invalid(format!("invalid Location header '{location}': {e}")))?;
    Ok(target.into_inner())
}

/// Fetcher for command line use: `file:` URIs are read from disk, anything
/// else goes through [`HttpFetcher`].
pub struct LocalFetcher {
    pub remote: HttpFetcher,
}

impl Fetcher for LocalFetcher {
    fn fetch(&self, uri: &str) -> Result<Document, DistillerError> {
        let Ok(url) = Url::parse(uri) else {
            return self.remote.fetch(uri);
        };
        if url.scheme() != "file" {
            return self.remote.fetch(uri);
        }
        let path = url.to_file_path().map_err(|_| DistillerError::Fetch {
            uri: uri.to_string(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a local path"),
        })?;
        debug!("reading {path:?}");
        let content = std::fs::read(&path).map_err(|source| DistillerError::Fetch {
            uri: uri.to_string(),
            source,
        })?;
        Ok(Document {
            content,
            base: Some(uri.to_string()),
            media_type: media_type_for_path(&path).map(str::to_string),
        })
    }
}

fn media_type_for_path(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
        "html" | "htm" => Some("text/html"),
        "xhtml" => Some("application/xhtml+xml"),
        "svg" => Some("image/svg+xml"),
        "atom" => Some("application/atom+xml"),
        "xml" => Some("application/xml"),
        _ => None,
    }
}

/// Rules a URI must pass before the service dereferences it.
#[derive(Debug, Clone, Default)]
pub struct UrlPolicy {
    pub allow_private_hosts: bool,
}

impl UrlPolicy {
    pub fn check(&self, uri: &str) -> Result<(), DistillerError> {
        let unsafe_uri = |reason: String| DistillerError::UnsafeUri {
            uri: uri.to_string(),
            reason,
        };
        Iri::parse(uri).map_err(|e| unsafe_uri(format!("Invalid URI: {e}")))?;
        let url = Url::parse(uri).map_err(|e| unsafe_uri(format!("Invalid URI: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(unsafe_uri(format!(
                "Unsupported URI scheme '{}'",
                url.scheme()
            )));
        }
        let host = url
            .host()
            .ok_or_else(|| unsafe_uri("URI without a host".to_string()))?;
        if self.allow_private_hosts {
            return Ok(());
        }

        let addresses: Vec<IpAddr> = match host {
            Host::Ipv4(ip) => vec![IpAddr::V4(ip)],
            Host::Ipv6(ip) => vec![IpAddr::V6(ip)],
            Host::Domain(domain) => {
                let port = url.port_or_known_default().unwrap_or(80);
                (domain, port)
                    .to_socket_addrs()
                    .map_err(|e| unsafe_uri(format!("Unable to resolve host '{domain}': {e}")))?
                    .map(|a| a.ip())
                    .collect()
            }
        };
        if let Some(ip) = addresses.iter().find(|ip| !is_public(ip)) {
            return Err(unsafe_uri(format!(
                "Access to the non-public address {ip} is not allowed"
            )));
        }
        Ok(())
    }
}

fn is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => {
            !(ip.is_loopback()
                || ip.is_private()
                || ip.is_link_local()
                || ip.is_unspecified()
                || ip.is_broadcast()
                || ip.is_documentation()
                // shared address space, 100.64.0.0/10
                || (ip.octets()[0] == 100 && (ip.octets()[1] & 0xc0) == 64))
        }
        IpAddr::V6(ip) => {
            if let Some(v4) = ip.to_ipv4_mapped() {
                return is_public(&IpAddr::V4(v4));
            }
            let first = ip.segments()[0];
            !(ip.is_loopback()
                || ip.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80)
        }
    }
}
