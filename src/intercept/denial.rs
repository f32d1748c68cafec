//! Denial artifact rendering.
//!
//! # Responsibilities
//! - Render the 403 response returned in place of a blocked request
//! - Embed the rejected host without letting it escape its slot
//!
//! # Design Decisions
//! - Pure function of (host, format, template); rendered per denial, never cached
//! - HTML output escapes after substitution, text output drops control characters

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Placeholder replaced by the rejected host in message templates.
pub const HOST_PLACEHOLDER: &str = "{host}";

/// Rendered when a request carried no usable host.
pub const UNKNOWN_HOST: &str = "(unknown)";

/// Body format of the denial response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DenialFormat {
    #[default]
    Text,
    Html,
}

impl DenialFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            DenialFormat::Text => "text/plain; charset=utf-8",
            DenialFormat::Html => "text/html; charset=utf-8",
        }
    }
}

/// A fully formed response substituted for a blocked request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenialArtifact {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

impl IntoResponse for DenialArtifact {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(self.content_type),
        );
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        );
        response
    }
}

/// Renders denial artifacts from a configured format and templates.
#[derive(Debug, Clone)]
pub struct DenialRenderer {
    format: DenialFormat,
    title: String,
    message: String,
}

impl DenialRenderer {
    pub fn new(format: DenialFormat, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            format,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn format(&self) -> DenialFormat {
        self.format
    }

    /// Render the artifact for a rejected `host`.
    pub fn render(&self, host: &str) -> DenialArtifact {
        let host: String = host.chars().filter(|c| !c.is_control()).collect();
        let host = if host.trim().is_empty() { UNKNOWN_HOST } else { host.as_str() };
        let message = substitute(&self.message, host);

        let body = match self.format {
            DenialFormat::Text => {
                let mut body = message;
                body.push('\n');
                body
            }
            DenialFormat::Html => render_html(&escape_html(&self.title), &escape_html(&message)),
        };

        DenialArtifact {
            status: StatusCode::FORBIDDEN,
            content_type: self.format.content_type(),
            body,
        }
    }
}

impl Default for DenialRenderer {
    fn default() -> Self {
        Self::new(
            DenialFormat::Text,
            "Access Denied",
            "Access Denied: {host} is blocked.",
        )
    }
}

/// Replace placeholders in `template` only. The inserted host is never rescanned.
fn substitute(template: &str, host: &str) -> String {
    let mut out = String::with_capacity(template.len() + host.len());
    let mut parts = template.split(HOST_PLACEHOLDER);
    if let Some(first) = parts.next() {
        out.push_str(first);
    }
    for part in parts {
        out.push_str(host);
        out.push_str(part);
    }
    out
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

fn render_html(title: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; background: #f4f4f5; color: #18181b; }}
main {{ max-width: 36rem; margin: 12vh auto; padding: 2rem; background: #fff; border-radius: 8px; border-top: 4px solid #dc2626; }}
h1 {{ font-size: 1.4rem; margin-top: 0; }}
</style>
</head>
<body>
<main>
<h1>{title}</h1>
<p>{message}</p>
</main>
</body>
</html>
"#
    )
}
