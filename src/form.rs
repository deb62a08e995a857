// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

//! Request field intake.
//!
//! Fields come from the URL query string and from the request body, either
//! `application/x-www-form-urlencoded` or `multipart/form-data`.

use log::debug;
use thiserror::Error;
use url::form_urlencoded;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("multipart body without a boundary parameter")]
    MissingBoundary,
    #[error("multipart body is not terminated by its boundary")]
    Unterminated,
    #[error("multipart part without a header block")]
    MalformedPart,
    #[error("multipart part without a field name")]
    MissingName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    File {
        filename: String,
        content_type: Option<String>,
        data: Vec<u8>,
    },
}

/// Ordered multimap of the fields of one request.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    fields: Vec<(String, FieldValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields
            .push((name.into(), FieldValue::Text(value.into())));
    }

    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push((name.into(), value));
    }

    /// Adds the fields of an urlencoded string, e.g. a URL query.
    pub fn extend_urlencoded(&mut self, encoded: &[u8]) {
        for (k, v) in form_urlencoded::parse(encoded) {
            self.push_text(k.into_owned(), v.into_owned());
        }
    }

    /// Adds the fields of a `multipart/form-data` body.
    pub fn extend_multipart(&mut self, body: &[u8], boundary: &str) -> Result<(), FormError> {
        for (name, value) in parse_multipart(body, boundary)? {
            self.fields.push((name, value));
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == name)
    }

    /// First text value of a field. Uploaded files are not text values.
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.fields.iter().find_map(|(k, v)| match v {
            FieldValue::Text(s) if k == name => Some(s.as_str()),
            _ => None,
        })
    }

    /// First uploaded file of a field, as `(filename, data)`.
    pub fn file(&self, name: &str) -> Option<(&str, &[u8])> {
        self.fields.iter().find_map(|(k, v)| match v {
            FieldValue::File { filename, data, .. } if k == name => {
                Some((filename.as_str(), data.as_slice()))
            }
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Extracts the `boundary` parameter of a `multipart/form-data` content type.
pub fn multipart_boundary(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("boundary") {
            let value = value.trim().trim_matches('"');
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn parse_multipart(body: &[u8], boundary: &str) -> Result<Vec<(String, FieldValue)>, FormError> {
    if boundary.is_empty() {
        return Err(FormError::MissingBoundary);
    }
    let delimiter = format!("--{boundary}");
    let next_delimiter = format!("\r\n--{boundary}");
    let mut parts = Vec::new();

    let mut pos = find(body, delimiter.as_bytes(), 0).ok_or(FormError::Unterminated)?
        + delimiter.len();
    loop {
        if body[pos..].starts_with(b"--") {
            break;
        }
        // the rest of the delimiter line
        pos = find(body, b"\r\n", pos).ok_or(FormError::Unterminated)? + 2;
        let header_end = find(body, b"\r\n\r\n", pos).ok_or(FormError::MalformedPart)?;
        let headers = String::from_utf8_lossy(&body[pos..header_end]);
        let content_start = header_end + 4;
        let content_end =
            find(body, next_delimiter.as_bytes(), content_start).ok_or(FormError::Unterminated)?;
        let content = &body[content_start..content_end];
        parts.push(part_to_field(&headers, content)?);
        pos = content_end + next_delimiter.len();
    }
    debug!("parsed {} multipart fields", parts.len());
    Ok(parts)
}

fn part_to_field(headers: &str, content: &[u8]) -> Result<(String, FieldValue), FormError> {
    let mut name = None;
    let mut filename = None;
    let mut content_type = None;
    for line in headers.split("\r\n") {
        let Some((header, value)) = line.split_once(':') else {
            continue;
        };
        if header.trim().eq_ignore_ascii_case("content-disposition") {
            for param in value.split(';').skip(1) {
                if let Some((k, v)) = param.split_once('=') {
                    let v = v.trim().trim_matches('"').to_string();
                    match k.trim().to_ascii_lowercase().as_str() {
                        "name" => name = Some(v),
                        "filename" => filename = Some(v),
                        _ => (),
                    }
                }
            }
        } else if header.trim().eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_string());
        }
    }
    let name = name.ok_or(FormError::MissingName)?;
    let value = match filename {
        Some(filename) => FieldValue::File {
            filename,
            content_type,
            data: content.to_vec(),
        },
        None => FieldValue::Text(String::from_utf8_lossy(content).into_owned()),
    };
    Ok((name, value))
}
