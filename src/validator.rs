// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

//! RDFa validation: distill with the processor graph switched on and turn the
//! processor messages into a readable HTML report.

use crate::distiller::{Distillation, Distiller, ParseOptions};
use crate::error::DistillerError;
use crate::format::to_turtle;
use crate::options::Options;
use crate::pages::escape_html;
use crate::source::{Fetcher, Source};
use log::debug;
use oxrdf::vocab::rdf;
use oxrdf::{Graph, NamedNodeRef, NamedOrBlankNodeRef, TermRef};
use std::fmt::Write as _;

const REPORT_PAGE: &str = include_str!("../templates/validator.html");

mod rdfa {
    use oxrdf::NamedNodeRef;

    pub const ERROR: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#Error");
    pub const DOCUMENT_ERROR: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#DocumentError");
    pub const WARNING: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#Warning");
    pub const UNRESOLVED_CURIE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#UnresolvedCURIE");
    pub const UNRESOLVED_TERM: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#UnresolvedTerm");
    pub const PREFIX_REDEFINITION: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#PrefixRedefinition");
    pub const VOCAB_REFERENCE_ERROR: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#VocabReferenceError");
    pub const INFO: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#Info");
}

mod dc {
    use oxrdf::NamedNodeRef;

    pub const DESCRIPTION: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://purl.org/dc/terms/description");
    pub const DATE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://purl.org/dc/terms/date");
}

const ERROR_CLASSES: &[NamedNodeRef<'static>] = &[rdfa::ERROR, rdfa::DOCUMENT_ERROR];
const WARNING_CLASSES: &[NamedNodeRef<'static>] = &[
    rdfa::WARNING,
    rdfa::UNRESOLVED_CURIE,
    rdfa::UNRESOLVED_TERM,
    rdfa::PREFIX_REDEFINITION,
    rdfa::VOCAB_REFERENCE_ERROR,
];
const INFO_CLASSES: &[NamedNodeRef<'static>] = &[rdfa::INFO];

/// One processor message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub date: Option<String>,
    pub descriptions: Vec<String>,
}

/// Processor messages by kind, each kind ordered by time stamp.
#[derive(Debug, Default)]
pub struct Messages {
    pub errors: Vec<Message>,
    pub warnings: Vec<Message>,
    pub infos: Vec<Message>,
}

impl Messages {
    pub fn from_processor_graph(graph: &Graph) -> Self {
        let mut seen = Vec::new();
        let errors = collect(graph, ERROR_CLASSES, &mut seen);
        let warnings = collect(graph, WARNING_CLASSES, &mut seen);
        let infos = collect(graph, INFO_CLASSES, &mut seen);
        Messages {
            errors,
            warnings,
            infos,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty() && self.infos.is_empty()
    }

    /// The `div#Message` content of the report.
    pub fn to_html(&self, options: &ParseOptions) -> String {
        let mut html = String::new();
        if self.is_empty() {
            paragraph(&mut html, "Congratulations, your RDFa source is valid!");
        } else {
            paragraph(
                &mut html,
                &summary(self.errors.len(), self.warnings.len(), self.infos.len()),
            );
        }
        paragraph(
            &mut html,
            &format!(
                "(Checked RDFa {}{}, with {} as host language.)",
                options.rdfa_version,
                if options.check_lite { " Lite" } else { "" },
                options.host_language.name()
            ),
        );
        for (title, messages, kind) in [
            ("Errors", &self.errors, "Error"),
            ("Warnings", &self.warnings, "Warning"),
            ("Informational messages", &self.infos, "Info"),
        ] {
            if messages.is_empty() {
                continue;
            }
            let _ = writeln!(html, "<h3>{title}</h3>");
            for message in messages {
                for description in &message.descriptions {
                    let _ = writeln!(
                        html,
                        "<p class=\"{kind}\"><span>{kind}</span>: <span>{}</span></p>",
                        escape_html(description)
                    );
                }
            }
        }
        html
    }
}

fn paragraph(html: &mut String, text: &str) {
    let _ = writeln!(html, "<p>{}</p>", escape_html(text));
}

fn collect<'a>(
    graph: &'a Graph,
    classes: &[NamedNodeRef<'_>],
    seen: &mut Vec<NamedOrBlankNodeRef<'a>>,
) -> Vec<Message> {
    let mut messages = Vec::new();
    for class in classes {
        for subject in graph.subjects_for_predicate_object(rdf::TYPE, *class) {
            if seen.contains(&subject) {
                continue;
            }
            seen.push(subject);
            messages.push(Message {
                date: graph
                    .object_for_subject_predicate(subject, dc::DATE)
                    .map(term_value),
                descriptions: graph
                    .objects_for_subject_predicate(subject, dc::DESCRIPTION)
                    .map(term_value)
                    .collect(),
            });
        }
    }
    messages.sort_by(|a, b| (&a.date, &a.descriptions).cmp(&(&b.date, &b.descriptions)));
    messages
}

fn term_value(term: TermRef<'_>) -> String {
    match term {
        TermRef::Literal(l) => l.value().to_string(),
        other => other.to_string(),
    }
}

fn count(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("one {singular}")
    } else {
        format!("{n} {plural}")
    }
}

fn is_are(n: usize) -> &'static str {
    if n == 1 {
        "is"
    } else {
        "are"
    }
}

/// Opening sentence of a report with `e` errors, `w` warnings and `i`
/// informational messages, `e + w + i > 0`.
pub fn summary(e: usize, w: usize, i: usize) -> String {
    let infos = count(i, "informational message", "informational messages");
    if e > 0 {
        let errors = format!("{} {}", is_are(e), count(e, "error", "errors"));
        if w > 0 {
            let warnings = count(w, "warning", "warnings");
            let extra = if i > 0 {
                format!(" plus {infos}")
            } else {
                String::new()
            };
            format!("There {errors} (and {warnings}{extra}) in your RDFa content")
        } else if i > 0 {
            format!("There {errors} (and {infos}) in your RDFa content")
        } else {
            format!("There {errors} in your RDFa content")
        }
    } else if w > 0 {
        let warnings = format!("{} {}", is_are(w), count(w, "warning", "warnings"));
        let extra = if i > 0 {
            format!(" and {infos}")
        } else {
            String::new()
        };
        format!("Congratulations, your RDFa source is valid; however there {warnings}{extra} in your RDFa content that you might want to check")
    } else {
        format!("Congratulations, your RDFa source is valid; however there {} {infos} in your RDFa content that you might want to check", is_are(i))
    }
}

/// The complete report page for a distillation.
pub fn render_report(
    distillation: &Distillation,
    options: &ParseOptions,
) -> std::io::Result<String> {
    let messages = Messages::from_processor_graph(&distillation.processor_graph);
    debug!(
        "{} errors, {} warnings, {} informational messages",
        messages.errors.len(),
        messages.warnings.len(),
        messages.infos.len()
    );
    let html = messages.to_html(options);
    let turtle = escape_html(&to_turtle(&distillation.graph)?);
    let date = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
    Ok(fill(
        REPORT_PAGE,
        &[
            ("messages", html.as_str()),
            ("turtle", turtle.as_str()),
            ("date", date.as_str()),
        ],
    ))
}

/// Replaces `{{name}}` placeholders in a single pass; unknown names are kept.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let value = after.find("}}").and_then(|end| {
            values
                .iter()
                .find(|(name, _)| *name == &after[..end])
                .map(|(_, value)| (end, *value))
        });
        match value {
            Some((end, value)) => {
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Distills the source as RDFa and renders the validation report.
pub fn validate_rdfa(
    distiller: &dyn Distiller,
    fetcher: &dyn Fetcher,
    source: &Source,
    options: &Options,
) -> Result<String, DistillerError> {
    let document = source.load(fetcher)?;
    let parse_options = ParseOptions::validation(options, &document);
    let distillation = distiller.distill(&document, &parse_options)?;
    render_report(&distillation, &parse_options).map_err(DistillerError::Serialize)
}
