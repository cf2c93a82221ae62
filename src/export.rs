//! Mind map export
//!
//! Renders a saved mind map to PNG and PDF. The graph is drawn onto a
//! fixed 1600x1200 canvas (scaled to fit), rasterized at 3x for crisp
//! output, and the PDF page is sized to the bitmap so the image fills it
//! edge to edge.

use crate::error::{Error, Result};
use crate::types::MindMapDoc;
use std::fmt::Write as _;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

/// Logical export canvas, before the raster scale factor.
const EXPORT_WIDTH: f64 = 1600.0;
const EXPORT_HEIGHT: f64 = 1200.0;
/// Raster scale factor applied when rendering to a bitmap.
const PIXEL_RATIO: u32 = 3;
/// Drawn node footprint, matching the editor's card size.
const NODE_WIDTH: f64 = 150.0;
const NODE_HEIGHT: f64 = 40.0;
const MARGIN: f64 = 40.0;

/// Render a mind map to a PNG file.
pub fn export_png(doc: &MindMapDoc, path: &Path) -> Result<()> {
    let pixmap = render_pixmap(doc)?;
    pixmap
        .save_png(path)
        .map_err(|e| Error::Export(format!("failed to write PNG: {}", e)))
}

/// Render a mind map to a single-page PDF sized to the bitmap.
pub fn export_pdf(doc: &MindMapDoc, path: &Path) -> Result<()> {
    use printpdf::{
        ColorBits, ColorSpace, Image, ImageTransform, ImageXObject, Mm, PdfDocument, Pt, Px,
    };

    let pixmap = render_pixmap(doc)?;
    let (width_px, height_px) = (pixmap.width(), pixmap.height());

    // 1px = 1pt at 72 dpi, so the page matches the bitmap exactly.
    let page_width = Mm::from(Pt(width_px as f32));
    let page_height = Mm::from(Pt(height_px as f32));
    let (pdf, page, layer) = PdfDocument::new(&doc.title, page_width, page_height, "mindmap");

    let mut rgb = Vec::with_capacity((width_px * height_px * 3) as usize);
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        rgb.extend_from_slice(&[c.red(), c.green(), c.blue()]);
    }

    let image = Image::from(ImageXObject {
        width: Px(width_px as usize),
        height: Px(height_px as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: false,
        image_data: rgb,
        image_filter: None,
        smask: None,
        clipping_bbox: None,
    });

    image.add_to_layer(
        pdf.get_page(page).get_layer(layer),
        ImageTransform {
            dpi: Some(72.0),
            ..Default::default()
        },
    );

    let file = File::create(path)?;
    pdf.save(&mut BufWriter::new(file))
        .map_err(|e| Error::Export(format!("failed to write PDF: {}", e)))
}

/// Rasterize the export canvas at [`PIXEL_RATIO`].
pub fn render_pixmap(doc: &MindMapDoc) -> Result<tiny_skia::Pixmap> {
    let svg = build_svg(doc);

    let mut opt = usvg::Options::default();
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    opt.fontdb = Arc::new(db);

    let tree = usvg::Tree::from_data(svg.as_bytes(), &opt)
        .map_err(|e| Error::Export(format!("failed to build export image: {}", e)))?;

    let width = EXPORT_WIDTH as u32 * PIXEL_RATIO;
    let height = EXPORT_HEIGHT as u32 * PIXEL_RATIO;
    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| Error::Export(format!("cannot allocate {}x{} canvas", width, height)))?;

    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(PIXEL_RATIO as f32, PIXEL_RATIO as f32),
        &mut pixmap.as_mut(),
    );
    Ok(pixmap)
}

/// Draw the graph as an SVG document on the logical export canvas, scaled
/// and centered so every node is in view.
pub fn build_svg(doc: &MindMapDoc) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\" viewBox=\"0 0 {} {}\">",
        EXPORT_WIDTH, EXPORT_HEIGHT, EXPORT_WIDTH, EXPORT_HEIGHT
    );
    let _ = writeln!(
        out,
        "<rect x=\"0\" y=\"0\" width=\"{}\" height=\"{}\" fill=\"#ffffff\"/>",
        EXPORT_WIDTH, EXPORT_HEIGHT
    );
    let _ = writeln!(out, "<defs>");
    let _ = writeln!(
        out,
        "  <marker id=\"arrow\" markerWidth=\"10\" markerHeight=\"7\" refX=\"10\" refY=\"3.5\" orient=\"auto\">\n    <polygon points=\"0 0, 10 3.5, 0 7\" fill=\"#000000\"/>\n  </marker>"
    );
    let _ = writeln!(out, "</defs>");

    if !doc.nodes.is_empty() {
        let (min_x, min_y, max_x, max_y) = bounds(doc);
        let graph_w = (max_x - min_x).max(1.0);
        let graph_h = (max_y - min_y).max(1.0);
        let scale = ((EXPORT_WIDTH - 2.0 * MARGIN) / graph_w)
            .min((EXPORT_HEIGHT - 2.0 * MARGIN) / graph_h)
            .min(2.0);
        let offset_x = (EXPORT_WIDTH - graph_w * scale) / 2.0 - min_x * scale;
        let offset_y = (EXPORT_HEIGHT - graph_h * scale) / 2.0 - min_y * scale;

        let _ = writeln!(
            out,
            "<g transform=\"translate({:.2} {:.2}) scale({:.4})\">",
            offset_x, offset_y, scale
        );

        for edge in &doc.edges {
            let (Some(source), Some(target)) = (
                doc.nodes.iter().find(|n| n.id == edge.source),
                doc.nodes.iter().find(|n| n.id == edge.target),
            ) else {
                continue;
            };
            let (x1, y1) = (
                source.position.x + NODE_WIDTH / 2.0,
                source.position.y + NODE_HEIGHT / 2.0,
            );
            let (x2, y2) = (
                target.position.x + NODE_WIDTH / 2.0,
                target.position.y + NODE_HEIGHT / 2.0,
            );
            let _ = writeln!(
                out,
                "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"{}\" marker-end=\"url(#arrow)\"/>",
                x1, y1, x2, y2, escape_xml(&edge.style.stroke), edge.style.stroke_width
            );
            if !edge.label.is_empty() {
                let (mx, my) = ((x1 + x2) / 2.0, (y1 + y2) / 2.0);
                let _ = writeln!(
                    out,
                    "<text x=\"{:.1}\" y=\"{:.1}\" font-family=\"sans-serif\" font-size=\"12\" fill=\"#333333\" text-anchor=\"middle\">{}</text>",
                    mx, my - 4.0, escape_xml(&edge.label)
                );
            }
        }

        for record in &doc.nodes {
            let x = record.position.x;
            let y = record.position.y;
            let _ = writeln!(
                out,
                "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{}\" height=\"{}\" rx=\"6\" ry=\"6\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.5\"/>",
                x, y, NODE_WIDTH, NODE_HEIGHT,
                escape_xml(&record.data.bg_color),
                escape_xml(&record.data.border_color)
            );
            let _ = writeln!(
                out,
                "<text x=\"{:.1}\" y=\"{:.1}\" font-family=\"sans-serif\" font-size=\"14\" fill=\"#000000\" text-anchor=\"middle\" dominant-baseline=\"central\">{}</text>",
                x + NODE_WIDTH / 2.0,
                y + NODE_HEIGHT / 2.0,
                escape_xml(&record.data.label)
            );
        }

        let _ = writeln!(out, "</g>");
    }

    let _ = writeln!(out, "</svg>");
    out
}

fn bounds(doc: &MindMapDoc) -> (f64, f64, f64, f64) {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for record in &doc.nodes {
        min_x = min_x.min(record.position.x);
        min_y = min_y.min(record.position.y);
        max_x = max_x.max(record.position.x + NODE_WIDTH);
        max_y = max_y.max(record.position.y + NODE_HEIGHT);
    }
    (min_x, min_y, max_x, max_y)
}

fn escape_xml(input: &str) -> String {
    let mut s = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => s.push_str("&amp;"),
            '<' => s.push_str("&lt;"),
            '>' => s.push_str("&gt;"),
            '"' => s.push_str("&quot;"),
            '\'' => s.push_str("&apos;"),
            _ => s.push(ch),
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Edge, Node, NodeRecord, Position};
    use tempfile::TempDir;

    fn sample_doc() -> MindMapDoc {
        let mut doc = MindMapDoc::new("Water Cycle");
        doc.nodes = vec![
            NodeRecord::from_node(&Node::new(
                "1",
                "Evaporation",
                Position { x: 0.0, y: 0.0 },
            )),
            NodeRecord::from_node(&Node::new(
                "2",
                "Condensation <clouds>",
                Position { x: 300.0, y: 200.0 },
            )),
        ];
        doc.edges = vec![Edge {
            id: "e1-2-0".into(),
            source: "1".into(),
            target: "2".into(),
            label: "rises & cools".into(),
            style: Default::default(),
        }];
        doc
    }

    #[test]
    fn test_svg_contains_nodes_edges_and_background() {
        let svg = build_svg(&sample_doc());
        assert!(svg.contains("fill=\"#ffffff\""));
        assert!(svg.contains("Evaporation"));
        assert!(svg.contains("Condensation &lt;clouds&gt;"));
        assert!(svg.contains("rises &amp; cools"));
        assert!(svg.contains("marker-end=\"url(#arrow)\""));
    }

    #[test]
    fn test_svg_skips_edges_with_missing_endpoints() {
        let mut doc = sample_doc();
        doc.edges.push(Edge {
            id: "dangling".into(),
            source: "1".into(),
            target: "missing".into(),
            label: "nope".into(),
            style: Default::default(),
        });
        let svg = build_svg(&doc);
        assert!(!svg.contains("nope"));
    }

    #[test]
    fn test_empty_doc_renders_blank_canvas() {
        let doc = MindMapDoc::new("Empty");
        let pixmap = render_pixmap(&doc).unwrap();
        assert_eq!(pixmap.width(), 4800);
        assert_eq!(pixmap.height(), 3600);
        let center = pixmap.pixel(2400, 1800).unwrap().demultiply();
        assert_eq!((center.red(), center.green(), center.blue()), (255, 255, 255));
    }

    #[test]
    fn test_pixmap_is_three_x_logical_size() {
        let pixmap = render_pixmap(&sample_doc()).unwrap();
        assert_eq!(pixmap.width(), 1600 * 3);
        assert_eq!(pixmap.height(), 1200 * 3);
    }

    #[test]
    fn test_png_and_pdf_files_written() {
        let dir = TempDir::new().unwrap();
        let doc = sample_doc();

        let png = dir.path().join("map.png");
        export_png(&doc, &png).unwrap();
        assert!(png.metadata().unwrap().len() > 0);

        let pdf = dir.path().join("map.pdf");
        export_pdf(&doc, &pdf).unwrap();
        let header = std::fs::read(&pdf).unwrap();
        assert_eq!(&header[..5], b"%PDF-");
    }
}
