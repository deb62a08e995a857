// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

use std::time::Duration;

pub const DEFAULT_DISTILLER: &str = "rdfa-distill";
pub const DEFAULT_DISTILLER_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_DISTILLER_OUTPUT: u64 = 64 * 1024 * 1024;

/// Settings of the distiller service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address, or host name and port, to listen on.
    pub bind: String,
    pub distiller: String,
    pub distiller_args: Vec<String>,
    /// Time a distiller run may take before it is killed.
    pub distiller_timeout: Duration,
    /// Largest distiller output read, in bytes.
    pub max_distiller_output: u64,
    /// Timeout for dereferencing source URIs.
    pub fetch_timeout: Duration,
    pub redirection_limit: usize,
    /// Largest source document fetched, in bytes.
    pub max_fetch_size: u64,
    /// Largest request body accepted, in bytes.
    pub max_body_size: u64,
    /// Lets source URIs point to loopback and private networks.
    pub allow_private_hosts: bool,
    /// Where `uri=referer` requests without a `Referer` header are sent.
    pub no_referer_page: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            bind: "localhost:7878".to_string(),
            distiller: DEFAULT_DISTILLER.to_string(),
            distiller_args: Vec::new(),
            distiller_timeout: DEFAULT_DISTILLER_TIMEOUT,
            max_distiller_output: DEFAULT_MAX_DISTILLER_OUTPUT,
            fetch_timeout: Duration::from_secs(30),
            redirection_limit: 5,
            max_fetch_size: 16 * 1024 * 1024,
            max_body_size: 16 * 1024 * 1024,
            allow_private_hosts: false,
            no_referer_page: "/no_referer.html".to_string(),
        }
    }
}
