// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

//! Static HTML pages and the error pages sent back on failure.

use crate::distiller::Syntax;
use crate::format::OutputFormat;
use crate::options::Options;
use crate::source::Source;
use std::error::Error;
use std::fmt::Write as _;

pub const INDEX_PAGE: &str = include_str!("../templates/index.html");
pub const NO_REFERER_PAGE: &str = include_str!("../templates/no_referer.html");

/// The kind of request a page answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ExtractRdfa,
    ValidateRdfa,
    ExtractMicrodata,
}

impl Operation {
    pub fn syntax(self) -> Syntax {
        match self {
            Operation::ExtractRdfa | Operation::ValidateRdfa => Syntax::Rdfa,
            Operation::ExtractMicrodata => Syntax::Microdata,
        }
    }

    fn failure_title(self) -> &'static str {
        match self {
            Operation::ExtractRdfa => "Exception in distilling RDFa",
            Operation::ValidateRdfa => "Error in RDFa validation processing",
            Operation::ExtractMicrodata => "Exception in extracting microdata",
        }
    }

    fn http_failure_title(self) -> &'static str {
        match self {
            Operation::ExtractRdfa => "HTTP Error in distilling RDFa content",
            Operation::ValidateRdfa => "HTTP Error in RDFa validation processing",
            Operation::ExtractMicrodata => "HTTP Error in extracting microdata",
        }
    }
}

fn error_titles(syntax: Syntax) -> (&'static str, &'static str) {
    match syntax {
        Syntax::Rdfa => ("Error in RDFa processing", "Error in distilling RDFa"),
        Syntax::Microdata => (
            "Error in Microdata processing",
            "Error in converting Microdata",
        ),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn page(title: &str, heading: &str, content: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n<title>{}</title>\n</head>\n<body>\n<h1>{}</h1>\n{content}</body>\n</html>\n",
        escape_html(title),
        escape_html(heading)
    )
}

/// Page for a request naming no source at all.
pub fn no_uri_page(syntax: Syntax) -> String {
    let (title, heading) = error_titles(syntax);
    page(title, heading, "<p>No URI has been specified</p>\n")
}

/// Page for a URI refused by the URL policy.
pub fn cannot_process_page(syntax: Syntax, uri: &str, message: &str) -> String {
    let (title, heading) = error_titles(syntax);
    let mut content = format!(
        "<p>{} cannot process this URI: {}</p>\n",
        env!("CARGO_PKG_NAME"),
        escape_html(uri)
    );
    if !message.is_empty() {
        let _ = writeln!(content, "<p>{}</p>", escape_html(message));
    }
    page(title, heading, &content)
}

/// Page for any failure other than an upstream HTTP error, with the request details.
pub fn failure_page(
    operation: Operation,
    error: &dyn Error,
    source: &Source,
    options: &Options,
    format: OutputFormat,
) -> String {
    let mut content = String::from("<pre>\n");
    content.push_str(&escape_html(&error.to_string()));
    let mut cause = error.source();
    while let Some(e) = cause {
        let _ = write!(content, "\ncaused by: {}", escape_html(&e.to_string()));
        cause = e.source();
    }
    content.push_str("\n</pre>\n<h1>Distiller request details</h1>\n<dl>\n");

    match source {
        Source::Text(text) => {
            let _ = writeln!(
                content,
                "<dt>Text input:</dt><dd>{}</dd>",
                escape_html(text).replace('\n', "<br/>")
            );
        }
        Source::Uploaded { .. } => content.push_str("<dt>Uploaded file</dt>\n"),
        Source::Uri(uri) => {
            let _ = writeln!(
                content,
                "<dt>URI received:</dt><dd><code>'{}'</code></dd>",
                escape_html(uri)
            );
        }
    }
    if let Some(host_language) = options.host_language {
        let _ = writeln!(
            content,
            "<dt>Media Type:</dt><dd>{}</dd>",
            host_language.media_type()
        );
    }
    if operation != Operation::ValidateRdfa {
        if operation == Operation::ExtractRdfa {
            let _ = writeln!(
                content,
                "<dt>Requested graphs:</dt><dd>{}</dd>",
                escape_html(options.graph.as_deref().unwrap_or("default"))
            );
            let _ = writeln!(
                content,
                "<dt>Space preserve:</dt><dd>{}</dd>",
                options.space_preserve
            );
        }
        let _ = writeln!(
            content,
            "<dt>Output serialization format:</dt><dd>{}</dd>",
            format.form_value()
        );
    }
    content.push_str("</dl>\n");
    let title = operation.failure_title();
    page(title, title, &content)
}

/// Page for a source URI that answered with an HTTP error.
pub fn http_failure_page(operation: Operation, uri: &str, code: u16, reason: &str) -> String {
    let title = operation.http_failure_title();
    let content = format!(
        "<p>HTTP Error: {code} ({})</p>\n<p>On URI: <code>'{}'</code></p>\n",
        escape_html(reason),
        escape_html(uri)
    );
    page(title, title, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DistillerError;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27;&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_error_pages() {
        let p = no_uri_page(Syntax::Microdata);
        assert!(p.contains("<title>Error in Microdata processing</title>"));
        assert!(p.contains("<h1>Error in converting Microdata</h1>"));
        assert!(p.contains("No URI has been specified"));

        let p = cannot_process_page(Syntax::Rdfa, "http://127.0.0.1/<x>", "private address");
        assert!(p.contains("<title>Error in RDFa processing</title>"));
        assert!(p.contains("cannot process this URI: http://127.0.0.1/&lt;x&gt;"));
        assert!(p.contains("<p>private address</p>"));

        let p = http_failure_page(Operation::ExtractMicrodata, "http://example.org/", 404, "Not Found");
        assert!(p.contains("<h1>HTTP Error in extracting microdata</h1>"));
        assert!(p.contains("HTTP Error: 404 (Not Found)"));
        assert!(p.contains("<code>'http://example.org/'</code>"));
    }

    #[test]
    fn test_failure_page() {
        let error = DistillerError::Failed {
            status: "exit status: 1".to_string(),
            stderr: "bad <markup>".to_string(),
        };
        let mut options = Options::default();
        options.host_language = Some(crate::options::HostLanguage::Svg);
        options.format = Some("nt".to_string());

        let p = failure_page(
            Operation::ExtractRdfa,
            &error,
            &Source::Text("line 1\n<line 2>".to_string()),
            &options,
            options.output_format(),
        );
        assert!(p.contains("<h1>Exception in distilling RDFa</h1>"));
        assert!(p.contains("bad &lt;markup&gt;"));
        assert!(p.contains("<dt>Text input:</dt><dd>line 1<br/>&lt;line 2&gt;</dd>"));
        assert!(p.contains("<dt>Media Type:</dt><dd>image/svg+xml</dd>"));
        assert!(p.contains("<dt>Requested graphs:</dt><dd>default</dd>"));
        assert!(p.contains("<dt>Space preserve:</dt><dd>true</dd>"));
        assert!(p.contains("<dt>Output serialization format:</dt><dd>nt</dd>"));

        let p = failure_page(
            Operation::ExtractMicrodata,
            &error,
            &Source::Uri("http://example.org/".to_string()),
            &Options::default(),
            OutputFormat::Turtle,
        );
        assert!(p.contains("<dt>URI received:</dt><dd><code>'http://example.org/'</code></dd>"));
        assert!(!p.contains("Requested graphs"));
        assert!(p.contains("<dt>Output serialization format:</dt><dd>turtle</dd>"));

        // a format negotiated through Accept, with no format field
        let p = failure_page(
            Operation::ExtractRdfa,
            &error,
            &Source::Uri("http://example.org/".to_string()),
            &Options::default(),
            OutputFormat::RdfXml,
        );
        assert!(p.contains("<dt>Output serialization format:</dt><dd>xml</dd>"));

        let p = failure_page(
            Operation::ValidateRdfa,
            &error,
            &Source::Uploaded {
                filename: "a.html".to_string(),
                data: vec![b'x'],
            },
            &Options::default(),
            OutputFormat::Turtle,
        );
        assert!(p.contains("<dt>Uploaded file</dt>"));
        assert!(!p.contains("Output serialization format"));
    }
}
