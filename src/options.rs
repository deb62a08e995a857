// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

//! Normalization of request fields into distiller options.
//!
//! Field values are lowercased. Boolean options accept the legacy hyphenated
//! spelling (`vocab-expansion`) next to the underscore one (`vocab_expansion`).

use crate::form::FormData;
use crate::format::OutputFormat;

/// Host language of the source, named by the `host_language` field or
/// derived from the source media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostLanguage {
    Html,
    Xhtml,
    Svg,
    Atom,
    Xml,
}

impl HostLanguage {
    /// Maps a `host_language` field value; anything unknown is generic XML.
    pub fn from_form_value(value: &str) -> Self {
        match value {
            "xhtml" => HostLanguage::Xhtml,
            "html" => HostLanguage::Html,
            "svg" => HostLanguage::Svg,
            "atom" => HostLanguage::Atom,
            _ => HostLanguage::Xml,
        }
    }

    /// Maps a media type (parameters ignored). Unknown types yield `None`.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let base = media_type.split(';').next()?.trim().to_ascii_lowercase();
        match base.as_str() {
            "text/html" => Some(HostLanguage::Html),
            "application/xhtml+xml" => Some(HostLanguage::Xhtml),
            "image/svg+xml" => Some(HostLanguage::Svg),
            "application/atom+xml" => Some(HostLanguage::Atom),
            "application/xml" | "text/xml" => Some(HostLanguage::Xml),
            _ => None,
        }
    }

    /// Guesses the host language from the first bytes of a document.
    pub fn sniff(content: &[u8]) -> Self {
        let head = String::from_utf8_lossy(&content[..content.len().min(1024)]);
        let head = head.trim_start_matches('\u{feff}').trim_start();
        if head.starts_with("<?xml") {
            if head.contains("<svg") {
                HostLanguage::Svg
            } else {
                HostLanguage::Xhtml
            }
        } else if head.starts_with("<svg") {
            HostLanguage::Svg
        } else {
            HostLanguage::Html
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            HostLanguage::Html => "text/html",
            HostLanguage::Xhtml => "application/xhtml+xml",
            HostLanguage::Svg => "image/svg+xml",
            HostLanguage::Atom => "application/atom+xml",
            HostLanguage::Xml => "application/xml",
        }
    }

    /// Name used in the validator report.
    pub fn name(self) -> &'static str {
        match self {
            HostLanguage::Html => "HTML5",
            HostLanguage::Xhtml => "XHTML+RDFa",
            HostLanguage::Svg => "SVG",
            HostLanguage::Atom => "Atom",
            HostLanguage::Xml => "XML+RDFa",
        }
    }
}

/// Which graphs an RDFa extraction returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphChoice {
    pub output: bool,
    pub processor: bool,
}

impl GraphChoice {
    pub fn from_form_value(value: Option<&str>) -> Self {
        match value {
            Some("processor") => GraphChoice {
                output: false,
                processor: true,
            },
            Some("processor,output") | Some("output,processor") => GraphChoice {
                output: true,
                processor: true,
            },
            _ => GraphChoice::default(),
        }
    }
}

impl Default for GraphChoice {
    fn default() -> Self {
        GraphChoice {
            output: true,
            processor: false,
        }
    }
}

/// The normalized view of one request's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub host_language: Option<HostLanguage>,
    pub rdfa_version: String,
    pub check_lite: bool,
    pub embedded_rdf: bool,
    pub space_preserve: bool,
    pub vocab_cache: bool,
    pub vocab_cache_report: bool,
    pub refresh_vocab_cache: bool,
    pub vocab_expansion: bool,
    /// Raw `format` value, kept for error reports.
    pub format: Option<String>,
    /// Raw graph choice (`rdfagraph`, then `graph`), kept for error reports.
    pub graph: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            host_language: None,
            rdfa_version: "1.1".to_string(),
            check_lite: false,
            embedded_rdf: false,
            space_preserve: true,
            vocab_cache: true,
            vocab_cache_report: false,
            refresh_vocab_cache: false,
            vocab_expansion: false,
            format: None,
            graph: None,
        }
    }
}

impl Options {
    pub fn from_form(form: &FormData) -> Self {
        let defaults = Options::default();
        Options {
            host_language: get_value(form, "host_language")
                .map(|v| HostLanguage::from_form_value(&v)),
            rdfa_version: get_value(form, "rdfa_version").unwrap_or(defaults.rdfa_version),
            check_lite: get_value(form, "rdfa_lite").is_some_and(|v| v == "true"),
            embedded_rdf: check_option(form, "embedded_rdf", defaults.embedded_rdf),
            space_preserve: check_option(form, "space_preserve", defaults.space_preserve),
            vocab_cache: check_option(form, "vocab_cache", defaults.vocab_cache),
            vocab_cache_report: check_option(
                form,
                "vocab_cache_report",
                defaults.vocab_cache_report,
            ),
            refresh_vocab_cache: check_option(
                form,
                "vocab_cache_refresh",
                defaults.refresh_vocab_cache,
            ),
            vocab_expansion: check_option(form, "vocab_expansion", defaults.vocab_expansion),
            format: get_value(form, "format"),
            graph: get_value(form, "rdfagraph").or_else(|| get_value(form, "graph")),
        }
    }

    /// Serialization selected by the `format` field, Turtle when absent.
    pub fn output_format(&self) -> OutputFormat {
        self.format
            .as_deref()
            .map(OutputFormat::from_form_value)
            .unwrap_or_default()
    }

    /// Graphs to return; a vocabulary cache report always needs the processor graph.
    pub fn graph_choice(&self) -> GraphChoice {
        let mut choice = GraphChoice::from_form_value(self.graph.as_deref());
        if self.vocab_cache_report {
            choice.processor = true;
        }
        choice
    }
}

/// Lowercased first value of a field, if the field is present.
fn get_value(form: &FormData, key: &str) -> Option<String> {
    if form.contains(key) {
        Some(form.get_first(key).unwrap_or_default().to_lowercase())
    } else {
        None
    }
}

/// Whether a boolean option equals `true`, trying the hyphenated spelling
/// when the underscore one is absent.
fn check_option(form: &FormData, key: &str, default: bool) -> bool {
    get_value(form, key)
        .or_else(|| get_value(form, &key.replace('_', "-")))
        .map_or(default, |v| v == "true")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(query: &str) -> FormData {
        let mut f = FormData::new();
        f.extend_urlencoded(query.as_bytes());
        f
    }

    #[test]
    fn test_defaults() {
        let o = Options::from_form(&form(""));
        assert_eq!(o, Options::default());
        assert_eq!(o.output_format(), OutputFormat::Turtle);
        assert_eq!(o.graph_choice(), GraphChoice::default());
        assert!(o.space_preserve);
        assert!(o.vocab_cache);
        assert_eq!(o.rdfa_version, "1.1");
    }

    #[test]
    fn test_aliases_and_case() {
        let o = Options::from_form(&form(
            "vocab-expansion=TRUE&embedded_rdf=true&space_preserve=false&rdfa_lite=True&format=NT",
        ));
        assert!(o.vocab_expansion);
        assert!(o.embedded_rdf);
        assert!(!o.space_preserve);
        assert!(o.check_lite);
        assert_eq!(o.output_format(), OutputFormat::NTriples);

        // the underscore spelling wins over the legacy one
        let o = Options::from_form(&form("vocab_expansion=false&vocab-expansion=true"));
        assert!(!o.vocab_expansion);

        // a checked box comes before its hidden "false" companion
        let o = Options::from_form(&form("space_preserve=true&space_preserve=false"));
        assert!(o.space_preserve);
        let o = Options::from_form(&form("space_preserve=false"));
        assert!(!o.space_preserve);

        // present but empty is not "true"
        let o = Options::from_form(&form("vocab_cache="));
        assert!(!o.vocab_cache);
    }

    #[test]
    fn test_host_language() {
        let o = Options::from_form(&form("host_language=SVG"));
        assert_eq!(o.host_language, Some(HostLanguage::Svg));
        assert_eq!(o.host_language.unwrap().media_type(), "image/svg+xml");
        let o = Options::from_form(&form("host_language=docbook"));
        assert_eq!(o.host_language, Some(HostLanguage::Xml));
        assert_eq!(o.host_language.unwrap().media_type(), "application/xml");

        assert_eq!(
            HostLanguage::from_media_type("text/html; charset=utf-8"),
            Some(HostLanguage::Html)
        );
        assert_eq!(HostLanguage::from_media_type("text/plain"), None);
    }

    #[test]
    fn test_sniff() {
        assert_eq!(HostLanguage::sniff(b"<!DOCTYPE html><html>"), HostLanguage::Html);
        assert_eq!(
            HostLanguage::sniff(b"<?xml version=\"1.0\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\">"),
            HostLanguage::Xhtml
        );
        assert_eq!(
            HostLanguage::sniff(b"<?xml version=\"1.0\"?><svg xmlns=\"http://www.w3.org/2000/svg\"/>"),
            HostLanguage::Svg
        );
        assert_eq!(HostLanguage::sniff(b"  <svg/>"), HostLanguage::Svg);
        assert_eq!(HostLanguage::sniff(b""), HostLanguage::Html);
    }

    #[test]
    fn test_graph_choice() {
        let o = Options::from_form(&form("graph=processor"));
        assert_eq!(
            o.graph_choice(),
            GraphChoice {
                output: false,
                processor: true
            }
        );
        let o = Options::from_form(&form("rdfagraph=output,processor&graph=processor"));
        assert_eq!(
            o.graph_choice(),
            GraphChoice {
                output: true,
                processor: true
            }
        );
        let o = Options::from_form(&form("graph=everything"));
        assert_eq!(o.graph_choice(), GraphChoice::default());

        let o = Options::from_form(&form("vocab_cache_report=true"));
        assert_eq!(
            o.graph_choice(),
            GraphChoice {
                output: true,
                processor: true
            }
        );
    }
}
