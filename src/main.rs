// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

use clap::{Args, Parser, Subcommand};
use log::error;
use rdfa_md::config::{ServiceConfig, DEFAULT_DISTILLER};
use rdfa_md::distiller::CommandDistiller;
use rdfa_md::options::{HostLanguage, Options};
use rdfa_md::source::{HttpFetcher, LocalFetcher};
use rdfa_md::*;
use std::io::{stdin, stdout, BufWriter};
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about="Extract RDF from RDFa and Microdata markup, and validate RDFa", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity,
    /// External distiller program doing the RDFa and Microdata parsing
    #[arg(long, global = true, env = "RDFA_MD_DISTILLER", default_value = DEFAULT_DISTILLER)]
    distiller: String,
    /// Extra argument passed to the distiller program, may be repeated
    #[arg(long = "distiller-arg", global = true, allow_hyphen_values = true)]
    distiller_args: Vec<String>,
    /// Seconds a distiller run may take before it is killed
    #[arg(long, global = true, default_value_t = 60)]
    distiller_timeout: u64,
    /// Timeout in seconds for dereferencing source URIs
    #[arg(long, global = true, default_value_t = 30)]
    fetch_timeout: u64,
    /// Largest source document fetched, in bytes
    #[arg(long, global = true, default_value_t = 16 * 1024 * 1024)]
    max_fetch_size: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the distiller web service
    Serve {
        #[arg(short, long, default_value = "localhost:7878")]
        /// Address to listen on
        bind: String,
        /// Largest request body accepted, in bytes
        #[arg(long, default_value_t = 16 * 1024 * 1024)]
        max_body_size: u64,
        /// Let source URIs point to loopback and private networks
        #[arg(long)]
        allow_private_hosts: bool,
        /// Redirect target for uri=referer requests without a Referer header
        #[arg(long)]
        no_referer_page: Option<String>,
    },
    /// Extract RDF from a file, stdin (-) or URI and write it to stdout
    Extract {
        source: String,
        /// Convert Microdata instead of RDFa
        #[arg(long)]
        microdata: bool,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Validate the RDFa of a file, stdin (-) or URI and write the HTML report to stdout
    Validate {
        source: String,
        #[command(flatten)]
        options: OptionArgs,
    },
    /// Check that the distiller program is available
    Check,
}

#[derive(Args)]
struct OptionArgs {
    /// Output format: turtle, nt, json-ld or xml
    #[arg(short, long)]
    format: Option<String>,
    /// Graphs to return: output, processor or output,processor
    #[arg(short, long)]
    graph: Option<String>,
    /// Host language: html, xhtml, svg, atom or xml
    #[arg(long)]
    host_language: Option<String>,
    #[arg(long, default_value = "1.1")]
    rdfa_version: String,
    /// Report non RDFa Lite attribute usage
    #[arg(long)]
    rdfa_lite: bool,
    /// Extract embedded Turtle and RDF/XML
    #[arg(long)]
    embedded_rdf: bool,
    /// Expand vocabularies through RDFS entailment
    #[arg(long)]
    vocab_expansion: bool,
    /// Do not preserve white space in literals
    #[arg(long)]
    no_space_preserve: bool,
    /// Do not use the vocabulary cache
    #[arg(long)]
    no_vocab_cache: bool,
    #[arg(long)]
    vocab_cache_refresh: bool,
    #[arg(long)]
    vocab_cache_report: bool,
}

impl OptionArgs {
    fn to_options(&self) -> Options {
        let lower = |v: &Option<String>| v.as_ref().map(|v| v.to_lowercase());
        Options {
            host_language: self
                .host_language
                .as_deref()
                .map(|v| HostLanguage::from_form_value(&v.to_lowercase())),
            rdfa_version: self.rdfa_version.clone(),
            check_lite: self.rdfa_lite,
            embedded_rdf: self.embedded_rdf,
            space_preserve: !self.no_space_preserve,
            vocab_cache: !self.no_vocab_cache,
            vocab_cache_report: self.vocab_cache_report,
            refresh_vocab_cache: self.vocab_cache_refresh,
            vocab_expansion: self.vocab_expansion,
            format: lower(&self.format),
            graph: lower(&self.graph),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let distiller_timeout = Duration::from_secs(cli.distiller_timeout);
    let distiller = CommandDistiller::new(cli.distiller.clone(), cli.distiller_args.clone())
        .with_timeout(distiller_timeout);
    let fetch_timeout = Duration::from_secs(cli.fetch_timeout);
    let fetcher = || LocalFetcher {
        remote: HttpFetcher::new(fetch_timeout, 5, cli.max_fetch_size),
    };
    let mut stdout_writer = BufWriter::new(stdout());
    // Matching CLI input to commands
    let result = match &cli.command {
        Commands::Serve {
            bind,
            max_body_size,
            allow_private_hosts,
            no_referer_page,
        } => {
            let defaults = ServiceConfig::default();
            let config = ServiceConfig {
                bind: bind.clone(),
                distiller: cli.distiller.clone(),
                distiller_args: cli.distiller_args.clone(),
                distiller_timeout,
                fetch_timeout,
                max_fetch_size: cli.max_fetch_size,
                max_body_size: *max_body_size,
                allow_private_hosts: *allow_private_hosts,
                no_referer_page: no_referer_page
                    .clone()
                    .unwrap_or(defaults.no_referer_page),
                ..defaults
            };
            serve::serve(&config)
        }
        Commands::Extract {
            source,
            microdata,
            options,
        } => commands::source_from_arg(source, &mut stdin()).and_then(|source| {
            commands::do_extract(
                &distiller,
                &fetcher(),
                &source,
                &options.to_options(),
                *microdata,
                &mut stdout_writer,
            )
        }),
        Commands::Validate { source, options } => commands::source_from_arg(source, &mut stdin())
            .and_then(|source| {
                commands::do_validate(
                    &distiller,
                    &fetcher(),
                    &source,
                    &options.to_options(),
                    &mut stdout_writer,
                )
            }),
        Commands::Check => check::do_check(&cli.distiller, None).map(|message| println!("{message}")),
    };

    match result {
        Ok(_) => std::process::exit(exitcode::OK),
        Err(e) => {
            error!("Error during execution: {e:?}");
            std::process::exit(exitcode::UNAVAILABLE);
        }
    }
}
