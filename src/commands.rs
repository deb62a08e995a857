// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

// Command line counterparts of the service operations

use crate::distiller::Distiller;
use crate::extract::{extract_microdata, extract_rdf};
use crate::options::Options;
use crate::source::{Fetcher, Source};
use crate::validator::validate_rdfa;
use log::debug;
use std::io::{Read, Write};
use std::path::Path;
use url::Url;

/// Resolves a command line source: `-` is stdin, an http(s) or file URI is
/// used as is, anything else is a local path.
pub fn source_from_arg(arg: &str, stdin: &mut impl Read) -> anyhow::Result<Source> {
    if arg == "-" {
        let mut data = Vec::new();
        stdin.read_to_end(&mut data)?;
        return Ok(Source::Uploaded {
            filename: "-".to_string(),
            data,
        });
    }
    if let Ok(url) = Url::parse(arg) {
        if matches!(url.scheme(), "http" | "https" | "file") {
            return Ok(Source::Uri(arg.to_string()));
        }
    }
    let path = Path::new(arg).canonicalize()?;
    let url = Url::from_file_path(&path)
        .map_err(|_| anyhow::anyhow!("unable to build a URI for {}", path.display()))?;
    debug!("reading {arg} as {url}");
    Ok(Source::Uri(url.to_string()))
}

pub fn do_extract(
    distiller: &dyn Distiller,
    fetcher: &dyn Fetcher,
    source: &Source,
    options: &Options,
    microdata: bool,
    writer: &mut impl Write,
) -> anyhow::Result<()> {
    let format = options.output_format();
    let serialized = if microdata {
        extract_microdata(distiller, fetcher, source, options, format)?
    } else {
        extract_rdf(distiller, fetcher, source, options, format)?
    };
    writer.write_all(&serialized.body)?;
    writer.flush()?;
    Ok(())
}

pub fn do_validate(
    distiller: &dyn Distiller,
    fetcher: &dyn Fetcher,
    source: &Source,
    options: &Options,
    writer: &mut impl Write,
) -> anyhow::Result<()> {
    let report = validate_rdfa(distiller, fetcher, source, options)?;
    writer.write_all(report.as_bytes())?;
    writer.flush()?;
    Ok(())
}
