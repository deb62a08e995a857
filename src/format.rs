// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

//! Output serialization of distilled graphs.

use log::{debug, warn};
use oxrdf::Graph;
use oxrdfio::{RdfFormat, RdfSerializer};
use std::io;
use std::str::FromStr;

/// Prefixes bound when the output syntax supports them.
const PREFIXES: &[(&str, &str)] = &[
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("rdfa", "http://www.w3.org/ns/rdfa#"),
    ("dc", "http://purl.org/dc/terms/"),
];

/// Serialization requested through the `format` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// https://www.w3.org/TR/n-triples/
    NTriples,
    /// https://www.w3.org/TR/turtle/
    #[default]
    Turtle,
    /// https://www.w3.org/TR/json-ld11/
    JsonLd,
    /// https://www.w3.org/TR/rdf-syntax-grammar/
    RdfXml,
}

impl OutputFormat {
    /// Maps a (lowercased) `format` field value. Unknown values select RDF/XML.
    pub fn from_form_value(value: &str) -> Self {
        match value {
            "nt" => OutputFormat::NTriples,
            "turtle" => OutputFormat::Turtle,
            "json-ld" | "json" => OutputFormat::JsonLd,
            _ => OutputFormat::RdfXml,
        }
    }

    /// The `format` field value selecting this format.
    pub fn form_value(self) -> &'static str {
        match self {
            OutputFormat::NTriples => "nt",
            OutputFormat::Turtle => "turtle",
            OutputFormat::JsonLd => "json-ld",
            OutputFormat::RdfXml => "xml",
        }
    }

    /// Maps an `Accept` media type, used when no `format` field is given.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let base = media_type.split(';').next()?.trim().to_ascii_lowercase();
        match base.as_str() {
            "application/n-triples" | "text/plain" => Some(OutputFormat::NTriples),
            "text/turtle" | "application/x-turtle" => Some(OutputFormat::Turtle),
            "application/ld+json" | "application/json" => Some(OutputFormat::JsonLd),
            "application/rdf+xml" => Some(OutputFormat::RdfXml),
            _ => None,
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            OutputFormat::NTriples => "application/n-triples",
            OutputFormat::Turtle => "text/turtle",
            OutputFormat::JsonLd => "application/ld+json",
            OutputFormat::RdfXml => "application/rdf+xml",
        }
    }

    /// `Content-Type` header value for a response in this format.
    pub fn content_type(self) -> String {
        format!("{}; charset=utf-8", self.media_type())
    }

    /// The serializer backing this format, if the RDF stack provides one.
    fn rdf_format(self) -> Option<RdfFormat> {
        match self {
            OutputFormat::NTriples => Some(RdfFormat::NTriples),
            OutputFormat::Turtle => Some(RdfFormat::Turtle),
            OutputFormat::RdfXml => Some(RdfFormat::RdfXml),
            OutputFormat::JsonLd => RdfFormat::from_media_type(self.media_type()),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_form_value(&s.to_lowercase()))
    }
}

/// A serialized graph, with the format that was actually used.
#[derive(Debug)]
pub struct Serialized {
    pub format: OutputFormat,
    pub body: Vec<u8>,
}

impl Serialized {
    pub fn content_type(&self) -> String {
        self.format.content_type()
    }
}

/// Serializes `graph`. JSON-LD falls back to Turtle when unavailable.
pub fn serialize_graph(graph: &Graph, format: OutputFormat) -> io::Result<Serialized> {
    let (format, rdf_format) = match format.rdf_format() {
        Some(f) => (format, f),
        None => {
            warn!("no serializer for {}, falling back on turtle", format.media_type());
            (OutputFormat::Turtle, RdfFormat::Turtle)
        }
    };
    debug!("serializing {} triples as {}", graph.len(), format.media_type());

    // line based syntaxes ignore the prefixes
    let mut serializer = RdfSerializer::from_format(rdf_format);
    for (name, iri) in PREFIXES {
        serializer = serializer
            .with_prefix(*name, *iri)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    }
    let mut writer = serializer.for_writer(Vec::new());
    for t in graph.iter() {
        writer.serialize_triple(t)?;
    }
    Ok(Serialized {
        format,
        body: writer.finish()?,
    })
}

/// Turtle text of a graph, as embedded in the validator report.
pub fn to_turtle(graph: &Graph) -> io::Result<String> {
    let serialized = serialize_graph(graph, OutputFormat::Turtle)?;
    String::from_utf8(serialized.body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
