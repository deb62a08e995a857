// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

use crate::distiller::{Distillation, Distiller, ParseOptions};
use crate::error::DistillerError;
use crate::format::{serialize_graph, OutputFormat, Serialized};
use crate::options::{GraphChoice, Options};
use crate::source::{Fetcher, Source};
use log::debug;
use oxrdf::Graph;

/// Distills the source as RDFa and serializes the graphs the request asked for.
pub fn extract_rdf(
    distiller: &dyn Distiller,
    fetcher: &dyn Fetcher,
    source: &Source,
    options: &Options,
    format: OutputFormat,
) -> Result<Serialized, DistillerError> {
    let document = source.load(fetcher)?;
    let parse_options = ParseOptions::rdfa(options, &document);
    let distillation = distiller.distill(&document, &parse_options)?;
    let graph = select_graphs(distillation, options.graph_choice());
    serialize_graph(&graph, format).map_err(DistillerError::Serialize)
}

/// Distills the source as Microdata; only the output graph is returned.
pub fn extract_microdata(
    distiller: &dyn Distiller,
    fetcher: &dyn Fetcher,
    source: &Source,
    options: &Options,
    format: OutputFormat,
) -> Result<Serialized, DistillerError> {
    let document = source.load(fetcher)?;
    let parse_options = ParseOptions::microdata(options, &document);
    let distillation = distiller.distill(&document, &parse_options)?;
    serialize_graph(&distillation.graph, format).map_err(DistillerError::Serialize)
}

/// Union of the graphs named by `choice`.
pub fn select_graphs(distillation: Distillation, choice: GraphChoice) -> Graph {
    debug!("returning graphs {choice:?}");
    let Distillation {
        graph,
        processor_graph,
    } = distillation;
    match (choice.output, choice.processor) {
        (true, false) => graph,
        (false, true) => processor_graph,
        (true, true) => {
            let mut union = graph;
            for t in processor_graph.iter() {
                union.insert(t);
            }
            union
        }
        (false, false) => Graph::new(),
    }
}
