// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

// file handles calls to the external RDFa/Microdata distiller

use crate::config::{DEFAULT_DISTILLER_TIMEOUT, DEFAULT_MAX_DISTILLER_OUTPUT};
use crate::error::DistillerError;
use crate::options::{HostLanguage, Options};
use crate::source::Document;
use log::{debug, warn};
use oxrdf::{Graph, GraphName, TripleRef};
use oxrdfio::{RdfFormat, RdfParser};
use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ScopedJoinHandle;
use std::time::{Duration, Instant};

/// Named graph carrying the processor graph in the distiller output.
pub const PROCESSOR_GRAPH: &str = "urn:x-rdfa-md:processor-graph";

const WAIT_INTERVAL: Duration = Duration::from_millis(10);
const MAX_STDERR: u64 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Rdfa,
    Microdata,
}

impl Syntax {
    pub fn as_str(self) -> &'static str {
        match self {
            Syntax::Rdfa => "rdfa",
            Syntax::Microdata => "microdata",
        }
    }
}

/// Everything the distiller is told about one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    pub syntax: Syntax,
    pub base: Option<String>,
    pub host_language: HostLanguage,
    pub rdfa_version: String,
    pub check_lite: bool,
    pub embedded_rdf: bool,
    pub space_preserve: bool,
    pub vocab_expansion: bool,
    pub vocab_cache: bool,
    pub refresh_vocab_cache: bool,
    pub vocab_cache_report: bool,
    pub informational_messages: bool,
}

impl ParseOptions {
    /// Options for an RDFa extraction, taking every request option into account.
    pub fn rdfa(options: &Options, document: &Document) -> Self {
        ParseOptions {
            syntax: Syntax::Rdfa,
            base: document.base.clone(),
            host_language: document.host_language(options.host_language),
            rdfa_version: options.rdfa_version.clone(),
            check_lite: options.check_lite,
            embedded_rdf: options.embedded_rdf,
            space_preserve: options.space_preserve,
            vocab_expansion: options.vocab_expansion,
            vocab_cache: options.vocab_cache,
            refresh_vocab_cache: options.refresh_vocab_cache,
            vocab_cache_report: options.vocab_cache_report,
            informational_messages: false,
        }
    }

    /// Options for a validation run: only the options the validator honours.
    pub fn validation(options: &Options, document: &Document) -> Self {
        ParseOptions {
            check_lite: options.check_lite,
            embedded_rdf: options.embedded_rdf,
            vocab_expansion: options.vocab_expansion,
            informational_messages: true,
            ..ParseOptions::defaults(Syntax::Rdfa, options, document)
        }
    }

    /// Options for a Microdata extraction: only vocabulary expansion and caching apply.
    pub fn microdata(options: &Options, document: &Document) -> Self {
        ParseOptions {
            vocab_expansion: options.vocab_expansion,
            vocab_cache: options.vocab_cache,
            ..ParseOptions::defaults(Syntax::Microdata, options, document)
        }
    }

    fn defaults(syntax: Syntax, options: &Options, document: &Document) -> Self {
        let defaults = Options::default();
        ParseOptions {
            syntax,
            base: document.base.clone(),
            host_language: document.host_language(options.host_language),
            rdfa_version: defaults.rdfa_version,
            check_lite: defaults.check_lite,
            embedded_rdf: defaults.embedded_rdf,
            space_preserve: defaults.space_preserve,
            vocab_expansion: defaults.vocab_expansion,
            vocab_cache: defaults.vocab_cache,
            refresh_vocab_cache: defaults.refresh_vocab_cache,
            vocab_cache_report: defaults.vocab_cache_report,
            informational_messages: false,
        }
    }

    /// Command line flags describing these options.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["--syntax".to_string(), self.syntax.as_str().to_string()];
        if let Some(base) = &self.base {
            args.push("--base".to_string());
            args.push(base.clone());
        }
        args.push("--media-type".to_string());
        args.push(self.host_language.media_type().to_string());
        args.push("--rdfa-version".to_string());
        args.push(self.rdfa_version.clone());
        for (set, flag) in [
            (self.check_lite, "--check-lite"),
            (self.embedded_rdf, "--embedded-rdf"),
            (self.space_preserve, "--space-preserve"),
            (self.vocab_expansion, "--vocab-expansion"),
            (self.vocab_cache, "--vocab-cache"),
            (self.refresh_vocab_cache, "--refresh-vocab-cache"),
            (self.vocab_cache_report, "--vocab-cache-report"),
            (self.informational_messages, "--informational"),
        ] {
            if set {
                args.push(flag.to_string());
            }
        }
        args
    }
}

/// Result of one distiller run.
#[derive(Debug, Default)]
pub struct Distillation {
    pub graph: Graph,
    pub processor_graph: Graph,
}

pub trait Distiller: Sync + Send {
    fn distill(
        &self,
        document: &Document,
        options: &ParseOptions,
    ) -> Result<Distillation, DistillerError>;
}

/// Runs an external distiller program.
///
/// The document goes to the program's stdin, the options are appended to
/// `args` as flags (see [`ParseOptions::to_args`]). The program answers with
/// N-Quads on stdout: the default graph holds the extracted triples and the
/// [`PROCESSOR_GRAPH`] named graph the processor triples.
///
/// A run is killed once it exceeds `timeout` or writes more than `max_output`
/// bytes to stdout.
#[derive(Debug, Clone)]
pub struct CommandDistiller {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub max_output: u64,
}

impl CommandDistiller {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_DISTILLER_TIMEOUT,
            max_output: DEFAULT_MAX_DISTILLER_OUTPUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output(mut self, max_output: u64) -> Self {
        self.max_output = max_output;
        self
    }

    /// Waits for the child, killing it on timeout or when stdout overflowed.
    fn wait(&self, child: &mut Child, overflow: &AtomicBool) -> Result<ExitStatus, DistillerError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            let error = if overflow.load(Ordering::Relaxed) {
                DistillerError::OutputTooLarge {
                    limit: self.max_output,
                }
            } else if Instant::now() >= deadline {
                DistillerError::Timeout {
                    seconds: self.timeout.as_secs(),
                }
            } else {
                std::thread::sleep(WAIT_INTERVAL);
                continue;
            };
            warn!("killing distiller {}: {error}", self.program);
            if let Err(e) = child.kill().and_then(|()| child.wait().map(|_| ())) {
                warn!("unable to kill distiller {}: {e}", self.program);
            }
            return Err(error);
        }
    }
}

impl Distiller for CommandDistiller {
    fn distill(
        &self,
        document: &Document,
        options: &ParseOptions,
    ) -> Result<Distillation, DistillerError> {
        debug!("Running distiller {} for {:?}", self.program, options.syntax);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .args(options.to_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DistillerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let overflow = AtomicBool::new(false);
        let (status, stdout, stderr) = std::thread::scope(|s| {
            if let Some(mut stdin) = child.stdin.take() {
                let content = &document.content;
                s.spawn(move || match stdin.write_all(content) {
                    Err(e) if e.kind() != io::ErrorKind::BrokenPipe => {
                        warn!("unable to write the document to the distiller: {e}")
                    }
                    _ => (),
                });
            }
            let stdout = child.stdout.take().map(|pipe| {
                let overflow = &overflow;
                let limit = self.max_output;
                s.spawn(move || {
                    let mut out = Vec::new();
                    let read = pipe.take(limit + 1).read_to_end(&mut out);
                    if out.len() as u64 > limit {
                        overflow.store(true, Ordering::Relaxed);
                    }
                    read.map(|_| out)
                })
            });
            let stderr = child.stderr.take().map(|mut pipe| {
                s.spawn(move || {
                    let mut err = Vec::new();
                    pipe.by_ref().take(MAX_STDERR).read_to_end(&mut err)?;
                    io::copy(&mut pipe, &mut io::sink())?;
                    Ok::<_, io::Error>(err)
                })
            });
            let status = self.wait(&mut child, &overflow);
            (status, joined(stdout), joined(stderr))
        });
        let status = status?;
        let (stdout, stderr) = (stdout?, stderr?);

        debug!("{}", String::from_utf8_lossy(&stderr));
        if overflow.load(Ordering::Relaxed) {
            return Err(DistillerError::OutputTooLarge {
                limit: self.max_output,
            });
        }
        if !status.success() {
            return Err(DistillerError::Failed {
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        read_distillation(&stdout)
    }
}

fn joined(reader: Option<ScopedJoinHandle<'_, io::Result<Vec<u8>>>>) -> io::Result<Vec<u8>> {
    match reader {
        Some(reader) => reader
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("distiller pipe reader panicked"))),
        None => Ok(Vec::new()),
    }
}

/// Splits N-Quads distiller output into the output and processor graphs.
pub fn read_distillation(nquads: &[u8]) -> Result<Distillation, DistillerError> {
    let mut result = Distillation::default();
    for q in RdfParser::from_format(RdfFormat::NQuads).for_reader(nquads) {
        let q = q?;
        let triple = TripleRef {
            subject: q.subject.as_ref(),
            predicate: q.predicate.as_ref(),
            object: q.object.as_ref(),
        };
        match &q.graph_name {
            GraphName::DefaultGraph => {
                result.graph.insert(triple);
            }
            GraphName::NamedNode(n) if n.as_str() == PROCESSOR_GRAPH => {
                result.processor_graph.insert(triple);
            }
            other => {
                warn!("unexpected graph {other} in distiller output, merging into the output graph");
                result.graph.insert(triple);
            }
        }
    }
    debug!(
        "distilled {} triples, {} processor triples",
        result.graph.len(),
        result.processor_graph.len()
    );
    Ok(result)
}
