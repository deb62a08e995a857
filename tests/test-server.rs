// Copyright (c) 2025, Decisym, LLC
// Licensed under the BSD 3-Clause License (see LICENSE file in the project root).

mod server_tests {
    use http::header::{ACCEPT, CONTENT_TYPE, LOCATION, REFERER};
    use http::{Method, Request, StatusCode};
    use oxhttp::model::Body;
    use rdfa_md::distiller::{CommandDistiller, Distiller};
    use rdfa_md::error::DistillerError;
    use rdfa_md::serve::handle_request;
    use rdfa_md::service::Service;
    use rdfa_md::source::{Document, Fetcher, UrlPolicy};
    use std::io::Read as _;
    use std::sync::Arc;

    const MAX_BODY: u64 = 1024 * 1024;
    const DOC: &str = "http://example.org/doc";

    /// Serves the page fixture for `DOC`, 404 for anything else.
    struct FixtureFetcher;

    impl Fetcher for FixtureFetcher {
        fn fetch(&self, uri: &str) -> Result<Document, DistillerError> {
            if uri == DOC {
                Ok(Document {
                    content: std::fs::read("tests/resources/page.html")?,
                    base: Some(uri.to_string()),
                    media_type: Some("text/html".to_string()),
                })
            } else {
                Err(DistillerError::Http {
                    code: 404,
                    reason: "Not Found".to_string(),
                })
            }
        }
    }

    // A distiller replaying a fixture file, whatever the input
    fn replay(fixture: &str) -> Arc<dyn Distiller> {
        Arc::new(CommandDistiller::new(
            "sh",
            vec![
                "-c".to_string(),
                format!("cat > /dev/null; cat tests/resources/{fixture}"),
            ],
        ))
    }

    // A distiller answering with one triple holding its command line flags
    fn echo_args() -> Arc<dyn Distiller> {
        Arc::new(CommandDistiller::new(
            "sh",
            vec![
                "-c".to_string(),
                r#"cat > /dev/null; printf '<urn:test:run> <urn:test:args> "%s" .\n' "$0 $*""#
                    .to_string(),
            ],
        ))
    }

    fn service_with(distiller: Arc<dyn Distiller>, allow_private_hosts: bool) -> Service {
        Service::new(
            distiller,
            Arc::new(FixtureFetcher),
            UrlPolicy {
                allow_private_hosts,
            },
            "/no_referer.html",
        )
    }

    fn service(fixture: &str) -> Service {
        service_with(replay(fixture), true)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(format!("http://localhost{uri}"))
            .body(Body::empty())
            .unwrap()
    }

    fn post(uri: &str, content_type: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(format!("http://localhost{uri}"))
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap()
    }

    // Helper to read body from response
    fn read_body(response: http::Response<Body>) -> String {
        let mut body = response.into_body();
        let mut content = Vec::new();
        body.read_to_end(&mut content).unwrap();
        String::from_utf8(content).unwrap()
    }

    // Helper to convert HttpError to anyhow::Error
    fn handle(
        request: &mut Request<Body>,
        service: &Service,
    ) -> anyhow::Result<http::Response<Body>> {
        handle_request(request, service, MAX_BODY)
            .map_err(|(status, msg)| anyhow::anyhow!("HTTP Error {}: {}", status, msg))
    }

    fn content_type(response: &http::Response<Body>) -> &str {
        response.headers()[CONTENT_TYPE].to_str().unwrap()
    }

    fn query(pairs: &[(&str, &str)]) -> String {
        pairs
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    #[test]
    fn test_landing_pages() -> anyhow::Result<()> {
        let service = service("output.nq");

        let response = handle(&mut get("/"), &service)?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(content_type(&response), "text/html; charset=utf-8");
        let body = read_body(response);
        assert!(body.contains("<form action=\"/extract\""));
        // unchecking the box still sends space_preserve=false
        let checkbox = body.find("type=\"checkbox\" name=\"space_preserve\"");
        let hidden = body.find("type=\"hidden\" name=\"space_preserve\" value=\"false\"");
        assert!(matches!((checkbox, hidden), (Some(c), Some(h)) if c < h));

        let mut head = Request::builder()
            .method(Method::HEAD)
            .uri("http://localhost/")
            .body(Body::empty())?;
        let response = handle(&mut head, &service)?;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(read_body(response).is_empty());

        let response = handle(&mut get("/no_referer.html"), &service)?;
        assert!(read_body(response).contains("Referer"));
        Ok(())
    }

    #[test]
    fn test_extract_uri() -> anyhow::Result<()> {
        let service = service("output.nq");
        let mut request = get(&format!("/extract?{}", query(&[("uri", DOC), ("format", "NT")])));
        let response = handle(&mut request, &service)?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(content_type(&response), "application/n-triples; charset=utf-8");
        let body = read_body(response);
        assert_eq!(body.lines().count(), 2);
        assert!(body.contains("\"A title\""));
        assert!(!body.contains("rdfa#Info"));
        Ok(())
    }

    #[test]
    fn test_extract_graph_choice() -> anyhow::Result<()> {
        let service = service("output.nq");
        let form = query(&[
            ("text", "<p property=\"title\">A title</p>"),
            ("rdfagraph", "processor"),
            ("format", "nt"),
        ]);
        let mut request = post(
            "/extract",
            "application/x-www-form-urlencoded",
            form.into_bytes(),
        );
        let body = read_body(handle(&mut request, &service)?);
        assert_eq!(body.lines().count(), 2);
        assert!(body.contains("<http://www.w3.org/ns/rdfa#Info>"));

        // a vocabulary cache report adds the processor graph
        let mut request = get(&format!(
            "/extract?{}",
            query(&[("uri", DOC), ("format", "nt"), ("vocab-cache-report", "true")])
        ));
        let body = read_body(handle(&mut request, &service)?);
        assert_eq!(body.lines().count(), 4);
        Ok(())
    }

    #[test]
    fn test_accept_negotiation() -> anyhow::Result<()> {
        let service = service("output.nq");
        let uri = format!("/extract?{}", query(&[("uri", DOC)]));

        let mut request = get(&uri);
        request
            .headers_mut()
            .insert(ACCEPT, "application/rdf+xml".parse()?);
        let response = handle(&mut request, &service)?;
        assert_eq!(content_type(&response), "application/rdf+xml; charset=utf-8");

        let mut request = get(&uri);
        request
            .headers_mut()
            .insert(ACCEPT, "text/html,application/xhtml+xml;q=0.9".parse()?);
        let response = handle(&mut request, &service)?;
        assert_eq!(content_type(&response), "text/turtle; charset=utf-8");

        // the format field wins over the Accept header
        let mut request = get(&format!("{uri}&format=nt"));
        request
            .headers_mut()
            .insert(ACCEPT, "application/rdf+xml".parse()?);
        let response = handle(&mut request, &service)?;
        assert_eq!(content_type(&response), "application/n-triples; charset=utf-8");
        Ok(())
    }

    #[test]
    fn test_upload_and_validate() -> anyhow::Result<()> {
        let service = service("output.nq");
        let page = std::fs::read("tests/resources/page.html")?;
        let mut body = Vec::new();
        body.extend_from_slice(
            b"--XyZ\r\nContent-Disposition: form-data; name=\"uploaded\"; filename=\"page.html\"\r\nContent-Type: text/html\r\n\r\n",
        );
        body.extend_from_slice(&page);
        body.extend_from_slice(
            b"\r\n--XyZ\r\nContent-Disposition: form-data; name=\"validate\"\r\n\r\nyes\r\n--XyZ--\r\n",
        );
        let mut request = post("/extract", "multipart/form-data; boundary=XyZ", body);
        let response = handle(&mut request, &service)?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(content_type(&response), "text/html; charset=utf-8");
        let body = read_body(response);
        assert!(body.contains(
            "Congratulations, your RDFa source is valid; however there is one informational message in your RDFa content that you might want to check"
        ));
        assert!(body.contains("(Checked RDFa 1.1, with HTML5 as host language.)"));
        assert!(body.contains("<h3>Informational messages</h3>"));
        assert!(body.contains("A title"));
        Ok(())
    }

    #[test]
    fn test_validate_errors() -> anyhow::Result<()> {
        let service = service("errors.nq");
        let mut request = get(&format!(
            "/validate?{}",
            query(&[("uri", DOC), ("rdfa_lite", "true")])
        ));
        let response = handle(&mut request, &service)?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_body(response);
        assert!(body.contains("There is one error (and one warning) in your RDFa content"));
        assert!(body.contains("(Checked RDFa 1.1 Lite, with HTML5 as host language.)"));
        assert!(body.contains(
            "<p class=\"Error\"><span>Error</span>: <span>Unknown prefix &#x27;foaf&#x27;</span></p>"
        ));
        assert!(body.contains("<h3>Warnings</h3>"));
        assert!(!body.contains("Unknown prefix 'foaf'"));
        Ok(())
    }

    #[test]
    fn test_microdata_options() -> anyhow::Result<()> {
        let service = service_with(echo_args(), true);
        let mut request = get(&format!(
            "/microdata?{}",
            query(&[
                ("uri", DOC),
                ("format", "nt"),
                ("vocab_expansion", "true"),
                ("embedded_rdf", "true"),
                ("space_preserve", "false"),
            ])
        ));
        let body = read_body(handle(&mut request, &service)?);
        assert!(body.contains("--syntax microdata --base http://example.org/doc --media-type text/html"));
        assert!(body.contains("--vocab-expansion"));
        assert!(!body.contains("--embedded-rdf"));
        // microdata keeps the default
        assert!(body.contains("--space-preserve"));

        let mut request = get(&format!(
            "/extract?{}",
            query(&[
                ("text", "<p/>"),
                ("format", "nt"),
                ("host_language", "svg"),
                ("embedded-rdf", "true"),
                ("rdfa_version", "1.0"),
            ])
        ));
        let body = read_body(handle(&mut request, &service)?);
        assert!(body.contains("--syntax rdfa --media-type image/svg+xml --rdfa-version 1.0 --embedded-rdf"));
        assert!(!body.contains("--base"));
        Ok(())
    }

    #[test]
    fn test_no_source() -> anyhow::Result<()> {
        let service = service("output.nq");
        let response = handle(&mut get("/microdata?format=nt"), &service)?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_body(response);
        assert!(body.contains("<title>Error in Microdata processing</title>"));
        assert!(body.contains("No URI has been specified"));

        // blank text and an empty upload do not count as a source
        let response = handle(&mut get("/extract?text=%20%0A"), &service)?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(read_body(response).contains("<h1>Error in distilling RDFa</h1>"));
        Ok(())
    }

    #[test]
    fn test_referer() -> anyhow::Result<()> {
        let service = service("output.nq");
        let response = handle(&mut get("/extract?uri=referer"), &service)?;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[LOCATION], "/no_referer.html");

        let mut request = get("/microdata?uri=referer");
        request.headers_mut().insert(REFERER, DOC.parse()?);
        let response = handle(&mut request, &service)?;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[LOCATION],
            "/microdata?uri=http%3A%2F%2Fexample.org%2Fdoc"
        );
        Ok(())
    }

    #[test]
    fn test_url_policy() -> anyhow::Result<()> {
        let service = service_with(replay("output.nq"), false);
        for uri in ["http://127.0.0.1/secret", "http://[::1]/", "ftp://example.org/", "not a uri"] {
            let mut request = get(&format!("/extract?{}", query(&[("uri", uri)])));
            let response = handle(&mut request, &service)?;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert!(read_body(response).contains("cannot process this URI"));
        }

        let mut request = get("/extract?uri=referer");
        request
            .headers_mut()
            .insert(REFERER, "http://10.0.0.1/intranet".parse()?);
        let response = handle(&mut request, &service)?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // text input is not a URI
        let response = handle(&mut get("/extract?text=%3Cp%2F%3E"), &service)?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[test]
    fn test_upstream_http_error() -> anyhow::Result<()> {
        let service = service("output.nq");
        let mut request = get(&format!(
            "/extract?{}",
            query(&[("uri", "http://example.org/missing")])
        ));
        let response = handle(&mut request, &service)?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = read_body(response);
        assert!(body.contains("<h1>HTTP Error in distilling RDFa content</h1>"));
        assert!(body.contains("HTTP Error: 404 (Not Found)"));
        assert!(body.contains("<code>'http://example.org/missing'</code>"));
        Ok(())
    }

    #[test]
    fn test_distiller_failure() -> anyhow::Result<()> {
        let failing = Arc::new(CommandDistiller::new(
            "sh",
            vec![
                "-c".to_string(),
                "cat > /dev/null; echo 'parser exploded' >&2; exit 2".to_string(),
            ],
        ));
        let service = service_with(failing, true);
        let mut request = get(&format!(
            "/extract?{}",
            query(&[("text", "line 1\nline 2"), ("graph", "processor")])
        ));
        let response = handle(&mut request, &service)?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_body(response);
        assert!(body.contains("<h1>Exception in distilling RDFa</h1>"));
        assert!(body.contains("parser exploded"));
        assert!(body.contains("<h1>Distiller request details</h1>"));
        assert!(body.contains("<dt>Text input:</dt><dd>line 1<br/>line 2</dd>"));
        assert!(body.contains("<dt>Requested graphs:</dt><dd>processor</dd>"));
        assert!(body.contains("<dt>Output serialization format:</dt><dd>turtle</dd>"));

        // the details show the format picked from the Accept header
        let mut request = get(&format!("/extract?{}", query(&[("text", "<p/>")])));
        request
            .headers_mut()
            .insert(ACCEPT, "application/n-triples".parse()?);
        let body = read_body(handle(&mut request, &service)?);
        assert!(body.contains("<dt>Output serialization format:</dt><dd>nt</dd>"));
        Ok(())
    }

    #[test]
    fn test_bad_requests() -> anyhow::Result<()> {
        let service = service("output.nq");

        let mut request = post("/extract", "text/plain", b"uri=x".to_vec());
        let err = handle_request(&mut request, &service, MAX_BODY).unwrap_err();
        assert_eq!(err.0, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let mut request = post(
            "/extract",
            "application/x-www-form-urlencoded",
            vec![b'a'; 64],
        );
        let err = handle_request(&mut request, &service, 16).unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let mut request = post(
            "/extract",
            "multipart/form-data; boundary=XyZ",
            b"--XyZ\r\nno end".to_vec(),
        );
        let err = handle_request(&mut request, &service, MAX_BODY).unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);

        let err = handle_request(&mut get("/query"), &service, MAX_BODY).unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
        Ok(())
    }
}
