//! Generation service client
//!
//! Blocking HTTP client for the external generation API: summaries from
//! pasted text or an uploaded file, mind map graphs from either, and
//! document conversions (DOCX to PDF, HTML to DOCX). The service returns
//! bare `{nodes, edges}` concept graphs; layout and styling happen here
//! before the result can enter the editor.

use crate::error::{Error, Result};
use crate::types::{Edge, MindMapDoc, Node, NodeRecord, Position};
use serde::Deserialize;
use std::time::Duration;

/// Horizontal spacing of the generated grid layout.
const GRID_COL_WIDTH: f64 = 300.0;
/// Vertical spacing of the generated grid layout.
const GRID_ROW_HEIGHT: f64 = 200.0;
/// Nodes per grid row.
const GRID_COLS: usize = 4;

/// Requested summary length/shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStyle {
    Short,
    Long,
    Bullet,
}

impl SummaryStyle {
    fn as_str(&self) -> &'static str {
        match self {
            SummaryStyle::Short => "short",
            SummaryStyle::Long => "long",
            SummaryStyle::Bullet => "bullet",
        }
    }
}

/// Concept graph as the service returns it: ids and labels only.
#[derive(Debug, Clone, Deserialize)]
pub struct MindMapResponse {
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub edges: Vec<RawEdge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawNode {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEdge {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: String,
}

impl MindMapResponse {
    /// Lay the concept graph out on a fixed grid, apply default styling
    /// and wrap it as a savable document.
    pub fn into_mindmap(self, title: &str) -> MindMapDoc {
        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                let col = (i % GRID_COLS) as f64;
                let row = (i / GRID_COLS) as f64;
                let position = Position {
                    x: col * GRID_COL_WIDTH,
                    y: row * GRID_ROW_HEIGHT,
                };
                NodeRecord::from_node(&Node::new(&raw.id, &raw.label, position))
            })
            .collect();

        let edges = self
            .edges
            .into_iter()
            .enumerate()
            .map(|(i, raw)| Edge {
                id: if raw.id.is_empty() {
                    format!("e{}-{}-{}", raw.source, raw.target, i)
                } else {
                    raw.id
                },
                source: raw.source,
                target: raw.target,
                label: raw.label,
                style: Default::default(),
            })
            .collect();

        let mut doc = MindMapDoc::new(title);
        doc.nodes = nodes;
        doc.edges = edges;
        doc
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SummaryResponse {
    summary: String,
}

/// Client for the generation service.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    base_url: String,
    timeout: Duration,
}

impl GenerationClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Summarize pasted text in the requested style.
    pub fn summarize(&self, text: &str, style: SummaryStyle) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::Validation("text must not be empty".to_string()));
        }
        let url = format!("{}/summarize", self.base_url);
        let body = serde_json::json!({ "text": text, "type": style.as_str() });
        let response: SummaryResponse = ureq::post(&url)
            .timeout(self.timeout)
            .send_json(body)
            .map_err(remote_error)?
            .into_json()
            .map_err(|e| Error::Remote(format!("invalid summary response: {}", e)))?;
        Ok(response.summary)
    }

    /// Summarize an uploaded document (PDF, DOCX or image).
    pub fn summarize_file(
        &self,
        filename: &str,
        bytes: &[u8],
        style: SummaryStyle,
    ) -> Result<String> {
        let url = format!("{}/summarize-file", self.base_url);
        let form = MultipartForm::new()
            .field("type", style.as_str())
            .file("file", filename, bytes);
        let response: SummaryResponse = self.post_multipart(&url, form)?;
        Ok(response.summary)
    }

    /// Generate a concept graph from pasted text.
    pub fn generate_mindmap(&self, text: &str) -> Result<MindMapResponse> {
        if text.trim().is_empty() {
            return Err(Error::Validation("text must not be empty".to_string()));
        }
        let url = format!("{}/generate-mindmap", self.base_url);
        ureq::post(&url)
            .timeout(self.timeout)
            .send_json(serde_json::json!({ "text": text }))
            .map_err(remote_error)?
            .into_json()
            .map_err(|e| Error::Remote(format!("invalid mindmap response: {}", e)))
    }

    /// Generate a concept graph from an uploaded document.
    pub fn generate_mindmap_from_file(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<MindMapResponse> {
        let url = format!("{}/generate-mindmap-file", self.base_url);
        let form = MultipartForm::new().file("file", filename, bytes);
        self.post_multipart(&url, form)
    }

    /// Convert an uploaded DOCX to PDF. Returns the PDF bytes.
    pub fn convert_docx_to_pdf(&self, filename: &str, bytes: &[u8]) -> Result<Vec<u8>> {
        if bytes.is_empty() {
            return Err(Error::Validation("file must not be empty".to_string()));
        }
        let url = format!("{}/convert-docx-to-pdf", self.base_url);
        let form = MultipartForm::new().file("file", filename, bytes);
        let content_type = form.content_type();
        ureq::post(&url)
            .timeout(self.timeout)
            .set("Content-Type", &content_type)
            .send_bytes(&form.finish())
            .map_err(remote_error)
            .and_then(read_bytes)
    }

    /// Render an HTML fragment as a DOCX document. Returns the DOCX bytes.
    pub fn html_to_docx(&self, html: &str, title: &str) -> Result<Vec<u8>> {
        if html.trim().is_empty() {
            return Err(Error::Validation("html must not be empty".to_string()));
        }
        let url = format!("{}/html-to-docx", self.base_url);
        ureq::post(&url)
            .timeout(self.timeout)
            .send_json(serde_json::json!({ "html": html, "title": title }))
            .map_err(remote_error)
            .and_then(read_bytes)
    }

    fn post_multipart<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        form: MultipartForm,
    ) -> Result<T> {
        let content_type = form.content_type();
        let body = form.finish();
        ureq::post(url)
            .timeout(self.timeout)
            .set("Content-Type", &content_type)
            .send_bytes(&body)
            .map_err(remote_error)?
            .into_json()
            .map_err(|e| Error::Remote(format!("invalid response: {}", e)))
    }
}

fn read_bytes(response: ureq::Response) -> Result<Vec<u8>> {
    use std::io::Read;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|e| Error::Remote(format!("truncated response body: {}", e)))?;
    Ok(bytes)
}

/// Surface the service's own `detail` message when it sent one.
fn remote_error(err: ureq::Error) -> Error {
    match err {
        ureq::Error::Status(code, response) => {
            let detail = response
                .into_json::<serde_json::Value>()
                .ok()
                .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from));
            match detail {
                Some(detail) => Error::Remote(detail),
                None => Error::Remote(format!("generation service returned {}", code)),
            }
        }
        ureq::Error::Transport(t) => Error::Remote(format!("generation service unreachable: {}", t)),
    }
}

/// Hand-assembled multipart/form-data body.
struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    fn new() -> Self {
        Self {
            boundary: format!("----boundary{:016x}", rand::random::<u64>()),
            body: Vec::new(),
        }
    }

    fn field(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    fn file(mut self, name: &str, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                self.boundary, name, filename
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> MindMapResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_grid_layout_wraps_every_four_nodes() {
        let resp = response(
            r#"{"nodes":[
                {"id":"1","label":"a"},{"id":"2","label":"b"},
                {"id":"3","label":"c"},{"id":"4","label":"d"},
                {"id":"5","label":"e"}
            ],"edges":[]}"#,
        );
        let doc = resp.into_mindmap("Layout");
        assert_eq!(doc.nodes[0].position, Position { x: 0.0, y: 0.0 });
        assert_eq!(doc.nodes[3].position, Position { x: 900.0, y: 0.0 });
        assert_eq!(doc.nodes[4].position, Position { x: 0.0, y: 200.0 });
    }

    #[test]
    fn test_missing_edge_ids_are_synthesized() {
        let resp = response(
            r#"{"nodes":[{"id":"1","label":"a"},{"id":"2","label":"b"}],
                "edges":[
                    {"source":"1","target":"2","label":"causes"},
                    {"id":"keep","source":"2","target":"1"}
                ]}"#,
        );
        let doc = resp.into_mindmap("Edges");
        assert_eq!(doc.edges[0].id, "e1-2-0");
        assert_eq!(doc.edges[0].label, "causes");
        assert_eq!(doc.edges[1].id, "keep");
        assert_eq!(doc.edges[1].label, "");
    }

    #[test]
    fn test_generated_nodes_carry_default_styling() {
        let resp = response(r#"{"nodes":[{"id":"1","label":"a"}],"edges":[]}"#);
        let doc = resp.into_mindmap("Styled");
        assert_eq!(doc.nodes[0].node_type, "custom");
        assert_eq!(doc.nodes[0].data.bg_color, crate::types::DEFAULT_BG_COLOR);
    }

    #[test]
    fn test_empty_text_rejected_before_any_request() {
        let client = GenerationClient::new("http://localhost:1");
        assert!(matches!(
            client.generate_mindmap("   "),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            client.summarize("", SummaryStyle::Short),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_conversion_inputs_validated_before_any_request() {
        let client = GenerationClient::new("http://localhost:1");
        assert!(matches!(
            client.convert_docx_to_pdf("notes.docx", b""),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            client.html_to_docx("  \n ", "Notes"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_multipart_body_layout() {
        let form = MultipartForm::new().field("type", "short").file(
            "file",
            "notes.pdf",
            b"%PDF",
        );
        let content_type = form.content_type();
        let boundary = content_type.split("boundary=").nth(1).unwrap().to_string();
        let body = String::from_utf8_lossy(&form.finish()).to_string();
        assert!(body.contains(&format!("--{}\r\n", boundary)));
        assert!(body.contains("name=\"type\"\r\n\r\nshort"));
        assert!(body.contains("filename=\"notes.pdf\""));
        assert!(body.ends_with(&format!("--{}--\r\n", boundary)));
    }
}
