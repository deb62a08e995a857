// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

use std::{
    fmt,
    io::Read,
    net::ToSocketAddrs,
    str::FromStr,
    thread::available_parallelism,
    time::Duration,
};

use http::{
    header::{ACCEPT, CONTENT_TYPE, LOCATION, REFERER},
    HeaderValue, Request, Response, StatusCode,
};
use log::{debug, error, info};
use oxhttp::{model::Body, Server};

use crate::config::ServiceConfig;
use crate::form::{multipart_boundary, FormData};
use crate::format::OutputFormat;
use crate::pages::{Operation, INDEX_PAGE, NO_REFERER_PAGE};
use crate::service::{Reply, Service};

pub type HttpError = (StatusCode, String);

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

pub fn serve(config: &ServiceConfig) -> anyhow::Result<()> {
    let service = Service::from_config(config);
    let max_body_size = config.max_body_size;
    debug!("distiller {} {:?}", config.distiller, config.distiller_args);

    let mut server = Server::new(move |request| {
        handle_request(request, &service, max_body_size)
            .unwrap_or_else(|(status, message)| error(status, message))
    })
    .with_global_timeout(HTTP_TIMEOUT)
    .with_server_name(concat!("rdfa-md / ", env!("CARGO_PKG_VERSION")))?
    .with_max_concurrent_connections(available_parallelism()?.get() * 128);
    for socket in config.bind.to_socket_addrs()? {
        server = server.bind(socket);
    }
    let server = server.spawn()?;
    info!("Listening for requests at http://{}", config.bind);
    server.join()?;
    Ok(())
}

pub fn handle_request(
    request: &mut Request<Body>,
    service: &Service,
    max_body_size: u64,
) -> Result<Response<Body>, HttpError> {
    debug!(
        "handling {} {}",
        request.uri().path(),
        request.method().as_ref()
    );
    let path = request.uri().path().to_string();
    match (path.as_str(), request.method().as_ref()) {
        ("/", "HEAD") => html_response(Body::empty()),
        ("/", "GET") => html_response(INDEX_PAGE.into()),
        ("/no_referer.html", "GET") => html_response(NO_REFERER_PAGE.into()),
        ("/extract" | "/validate" | "/microdata", "GET" | "POST") => {
            let form = read_form(request, max_body_size)?;
            let operation = match path.as_str() {
                "/microdata" => Operation::ExtractMicrodata,
                "/validate" => Operation::ValidateRdfa,
                _ if form.contains("validate") => Operation::ValidateRdfa,
                _ => Operation::ExtractRdfa,
            };
            let negotiated = rdf_content_negotiation(request);
            let referer = request
                .headers()
                .get(REFERER)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string);
            let reply = service.process(
                operation,
                &path,
                &form,
                referer.as_deref(),
                Some(negotiated),
            );
            reply_response(reply)
        }
        _ => Err((
            StatusCode::NOT_FOUND,
            format!(
                "{} {} is not supported by this server",
                request.method(),
                request.uri().path()
            ),
        )),
    }
}

fn html_response(body: Body) -> Result<Response<Body>, HttpError> {
    Response::builder()
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .body(body)
        .map_err(internal_server_error)
}

fn reply_response(reply: Reply) -> Result<Response<Body>, HttpError> {
    let mut builder = Response::builder()
        .status(reply.status)
        .header(CONTENT_TYPE, reply.content_type);
    if let Some(location) = reply.location {
        builder = builder.header(LOCATION, location);
    }
    builder
        .body(reply.body.into())
        .map_err(internal_server_error)
}

fn error(status: StatusCode, message: impl fmt::Display) -> Response<Body> {
    let mut response = Response::new(Body::from(message.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn url_query(request: &Request<Body>) -> &[u8] {
    request.uri().query().unwrap_or_default().as_bytes()
}

fn bad_request(message: impl fmt::Display) -> HttpError {
    (StatusCode::BAD_REQUEST, message.to_string())
}

fn internal_server_error(message: impl fmt::Display) -> HttpError {
    error!("Internal server error: {message}");
    (StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
}

fn unsupported_media_type(content_type: &str) -> HttpError {
    (
        StatusCode::UNSUPPORTED_MEDIA_TYPE,
        format!("No supported content Content-Type given: {content_type}"),
    )
}

/// Query string fields, then body fields for a POST.
fn read_form(request: &mut Request<Body>, max_body_size: u64) -> Result<FormData, HttpError> {
    let mut form = FormData::new();
    form.extend_urlencoded(url_query(request));
    if request.method().as_str() != "POST" {
        return Ok(form);
    }

    let header = request
        .headers()
        .get(CONTENT_TYPE)
        .ok_or_else(|| bad_request("No Content-Type given"))?
        .to_str()
        .map_err(|_| bad_request("The Content-Type header should be a valid ASCII string"))?
        .to_string();
    match content_type(&header).as_str() {
        "application/x-www-form-urlencoded" => {
            let body = limited_body(request, max_body_size)?;
            form.extend_urlencoded(&body);
        }
        "multipart/form-data" => {
            let boundary = multipart_boundary(&header)
                .ok_or_else(|| bad_request("multipart/form-data without a boundary"))?;
            let body = limited_body(request, max_body_size)?;
            form.extend_multipart(&body, &boundary)
                .map_err(|e| bad_request(format!("Invalid multipart body: {e}")))?;
        }
        other => return Err(unsupported_media_type(other)),
    }
    debug!("{} form fields", form.len());
    Ok(form)
}

fn limited_body(request: &mut Request<Body>, max_size: u64) -> Result<Vec<u8>, HttpError> {
    let body = request.body_mut();
    if let Some(body_len) = body.len() {
        if body_len > max_size {
            // it's too big
            return Err(bad_request(format!(
                "Request bodies are limited to {max_size} bytes, found {body_len} bytes"
            )));
        }
        let mut payload = Vec::with_capacity(
            body_len
                .try_into()
                .map_err(|_| bad_request("Huge body size"))?,
        );
        body.read_to_end(&mut payload)
            .map_err(internal_server_error)?;
        Ok(payload)
    } else {
        let mut payload = Vec::new();
        body.take(max_size + 1)
            .read_to_end(&mut payload)
            .map_err(internal_server_error)?;
        if payload.len() as u64 > max_size {
            return Err(bad_request(format!(
                "Request bodies are limited to {max_size} bytes"
            )));
        }
        Ok(payload)
    }
}

/// Format asked for in the `Accept` header, Turtle when nothing usable is asked for.
fn rdf_content_negotiation(request: &Request<Body>) -> OutputFormat {
    content_negotiation(
        request,
        OutputFormat::from_media_type,
        OutputFormat::Turtle,
        &[
            ("application", OutputFormat::Turtle),
            ("text", OutputFormat::Turtle),
        ],
    )
    .unwrap_or_else(|(_, message)| {
        debug!("{message}, falling back on turtle");
        OutputFormat::Turtle
    })
}

fn content_negotiation<F: Copy>(
    request: &Request<Body>,
    parse: impl Fn(&str) -> Option<F>,
    default: F,
    default_by_base: &[(&str, F)],
) -> Result<F, HttpError> {
    let header = request
        .headers()
        .get(ACCEPT)
        .map(|h| h.to_str())
        .transpose()
        .map_err(|_| bad_request("The Accept header should be a valid ASCII string"))?
        .unwrap_or_default();

    if header.is_empty() {
        return Ok(default);
    }
    let mut result = None;
    let mut result_score = 0_f32;
    for mut possible in header.split(',') {
        let mut score = 1.;
        if let Some((possible_type, last_parameter)) = possible.rsplit_once(';') {
            if let Some((name, value)) = last_parameter.split_once('=') {
                if name.trim().eq_ignore_ascii_case("q") {
                    score = f32::from_str(value.trim()).map_err(|_| {
                        bad_request(format!("Invalid Accept media type score: {value}"))
                    })?;
                    possible = possible_type;
                }
            }
        }
        if score <= result_score {
            continue;
        }
        let (possible_base, possible_sub) = possible
            .split_once(';')
            .unwrap_or((possible, ""))
            .0
            .split_once('/')
            .ok_or_else(|| bad_request(format!("Invalid media type: '{possible}'")))?;
        let possible_base = possible_base.trim();
        let possible_sub = possible_sub.trim();

        let mut format = None;
        if possible_base == "*" && possible_sub == "*" {
            format = Some(default);
        } else if possible_sub == "*" {
            for (base, sub_format) in default_by_base {
                if *base == possible_base {
                    format = Some(*sub_format);
                }
            }
        } else {
            format = parse(possible);
        }
        if let Some(format) = format {
            result = Some(format);
            result_score = score;
        }
    }

    result.ok_or_else(|| {
        (
            StatusCode::NOT_ACCEPTABLE,
            "The accept header does not provide any RDF format".to_string(),
        )
    })
}

/// Media type of a `Content-Type` value, without parameters, lowercased.
fn content_type(value: &str) -> String {
    value
        .split_once(';')
        .map_or(value, |(b, _)| b)
        .trim()
        .to_ascii_lowercase()
}
