//! Static pages served by the broker itself

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::config::BrokerConfig;

/// Landing page for requests to the bare base domain
pub fn landing(config: &BrokerConfig) -> Response {
    let domain = escape_html(&config.domain);
    let body = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>tunl</title></head>
<body>
  <h1>tunl</h1>
  <p>Expose a local HTTP server at <code>{scheme}://&lt;name&gt;.{domain}</code>.</p>
  <pre>tunl --port 3000 --domain {domain}</pre>
</body>
</html>
"#,
        scheme = escape_html(&config.scheme),
        domain = domain,
    );

    html(StatusCode::OK, body)
}

/// 404 page for a subdomain with no connected agent
pub fn not_found(subdomain: &str) -> Response {
    let body = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Tunnel not found</title></head>
<body>
  <h1>Tunnel "{}" not found</h1>
  <p>No agent is connected for this subdomain.</p>
</body>
</html>
"#,
        escape_html(subdomain)
    );

    html(StatusCode::NOT_FOUND, body)
}

fn html(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("plain"), "plain");
        assert_eq!(
            escape_html(r#"<script>"x" & 'y'</script>"#),
            "&lt;script&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_not_found_status() {
        let response = not_found("ghost");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
    }

    #[test]
    fn test_landing_status() {
        let response = landing(&BrokerConfig::default());
        assert_eq!(response.status(), StatusCode::OK);
    }
}
