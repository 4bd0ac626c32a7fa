//! Minimal static SVG rendering of the artifacts.
//!
//! Presentation only: fixed canvas, linear axes, no styling hooks. Anything
//! fancier should consume the JSON artifacts instead.

use crate::belt_curve::BeltCurveArtifact;
use crate::ul_hist::UpperLimitHistArtifact;
use std::fmt::Write as _;

const WIDTH: f64 = 640.0;
const HEIGHT: f64 = 480.0;
const MARGIN_LEFT: f64 = 64.0;
const MARGIN_RIGHT: f64 = 16.0;
const MARGIN_TOP: f64 = 24.0;
const MARGIN_BOTTOM: f64 = 48.0;

struct Frame {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Frame {
    fn x(&self, v: f64) -> f64 {
        let span = (self.x_max - self.x_min).max(f64::MIN_POSITIVE);
        MARGIN_LEFT + (v - self.x_min) / span * (WIDTH - MARGIN_LEFT - MARGIN_RIGHT)
    }

    fn y(&self, v: f64) -> f64 {
        let span = (self.y_max - self.y_min).max(f64::MIN_POSITIVE);
        HEIGHT - MARGIN_BOTTOM - (v - self.y_min) / span * (HEIGHT - MARGIN_TOP - MARGIN_BOTTOM)
    }
}

fn document_open(out: &mut String) {
    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif" font-size="12">"#
    );
    let _ = write!(out, r#"<rect width="{WIDTH}" height="{HEIGHT}" fill="white"/>"#);
}

fn axes(out: &mut String, frame: &Frame, x_label: &str, y_label: &str) {
    let x0 = frame.x(frame.x_min);
    let x1 = frame.x(frame.x_max);
    let y0 = frame.y(frame.y_min);
    let y1 = frame.y(frame.y_max);
    let _ = write!(
        out,
        r#"<line x1="{x0}" y1="{y0}" x2="{x1}" y2="{y0}" stroke="black"/><line x1="{x0}" y1="{y0}" x2="{x0}" y2="{y1}" stroke="black"/>"#
    );

    // Min/max tick labels keep the plot readable without a full tick engine.
    let _ = write!(
        out,
        r#"<text x="{x0}" y="{ly}" text-anchor="middle">{:.3}</text><text x="{x1}" y="{ly}" text-anchor="middle">{:.3}</text>"#,
        frame.x_min,
        frame.x_max,
        ly = y0 + 16.0,
    );
    let _ = write!(
        out,
        r#"<text x="{lx}" y="{y0}" text-anchor="end">{:.3}</text><text x="{lx}" y="{y1}" text-anchor="end">{:.3}</text>"#,
        frame.y_min,
        frame.y_max,
        lx = x0 - 6.0,
    );

    let _ = write!(
        out,
        r#"<text x="{cx}" y="{by}" text-anchor="middle">{x_label}</text>"#,
        cx = (x0 + x1) / 2.0,
        by = HEIGHT - 8.0,
    );
    let _ = write!(
        out,
        r#"<text x="14" y="{cy}" text-anchor="middle" transform="rotate(-90 14 {cy})">{y_label}</text>"#,
        cy = (y0 + y1) / 2.0,
    );
}

/// Render the belt (threshold vs POI) as a line plot with markers.
pub fn render_belt_curve(artifact: &BeltCurveArtifact) -> String {
    let mut out = String::new();
    document_open(&mut out);

    if artifact.mu_values.is_empty() {
        out.push_str("</svg>");
        return out;
    }

    let x_min = artifact.mu_values.first().copied().unwrap();
    let x_max = artifact.mu_values.last().copied().unwrap();
    let y_max = artifact.thresholds.iter().cloned().fold(0.0_f64, f64::max).max(1.0);
    let frame = Frame { x_min, x_max: x_max.max(x_min + 1e-12), y_min: 0.0, y_max };

    axes(&mut out, &frame, "parameter of interest", "acceptance threshold");

    let mut path = String::new();
    for (i, (&mu, &t)) in artifact.mu_values.iter().zip(&artifact.thresholds).enumerate() {
        let cmd = if i == 0 { 'M' } else { 'L' };
        let _ = write!(path, "{}{:.2},{:.2}", cmd, frame.x(mu), frame.y(t));
    }
    let _ = write!(out, r#"<path d="{path}" fill="none" stroke="steelblue" stroke-width="2"/>"#);
    for (&mu, &t) in artifact.mu_values.iter().zip(&artifact.thresholds) {
        let _ = write!(
            out,
            r#"<circle cx="{:.2}" cy="{:.2}" r="3" fill="steelblue"/>"#,
            frame.x(mu),
            frame.y(t)
        );
    }

    let _ = write!(
        out,
        r#"<text x="{x}" y="{y}">CL = {:.3}</text>"#,
        artifact.confidence_level,
        x = MARGIN_LEFT + 8.0,
        y = MARGIN_TOP + 12.0,
    );

    out.push_str("</svg>");
    out
}

/// Render the upper-limit histogram with band markers.
pub fn render_upper_limit_hist(artifact: &UpperLimitHistArtifact) -> String {
    let mut out = String::new();
    document_open(&mut out);

    if artifact.counts.is_empty() || artifact.bin_edges.len() != artifact.counts.len() + 1 {
        out.push_str("</svg>");
        return out;
    }

    let x_min = artifact.bin_edges[0];
    let x_max = *artifact.bin_edges.last().unwrap();
    let y_max = artifact.counts.iter().copied().max().unwrap_or(1).max(1) as f64;
    let frame = Frame { x_min, x_max: x_max.max(x_min + 1e-12), y_min: 0.0, y_max };

    axes(&mut out, &frame, "upper limit (background only)", "entries");

    for (i, &count) in artifact.counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let x0 = frame.x(artifact.bin_edges[i]);
        let x1 = frame.x(artifact.bin_edges[i + 1]);
        let y0 = frame.y(count as f64);
        let y1 = frame.y(0.0);
        let _ = write!(
            out,
            r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="lightsteelblue" stroke="steelblue"/>"#,
            x0,
            y0,
            (x1 - x0).max(0.5),
            (y1 - y0).max(0.0),
        );
    }

    // Dashed verticals for the five bands, solid red for the observed limit.
    for (value, label) in artifact
        .bands
        .iter()
        .zip(["-2σ", "-1σ", "median", "+1σ", "+2σ"])
    {
        let x = frame.x(*value);
        let _ = write!(
            out,
            r#"<line x1="{x:.2}" y1="{y0:.2}" x2="{x:.2}" y2="{y1:.2}" stroke="gray" stroke-dasharray="4 3"/><text x="{x:.2}" y="{ty:.2}" text-anchor="middle" font-size="10">{label}</text>"#,
            y0 = frame.y(0.0),
            y1 = frame.y(frame.y_max),
            ty = MARGIN_TOP + 10.0,
        );
    }
    if let Some(obs) = artifact.observed_limit {
        let x = frame.x(obs);
        let _ = write!(
            out,
            r#"<line x1="{x:.2}" y1="{y0:.2}" x2="{x:.2}" y2="{y1:.2}" stroke="crimson" stroke-width="2"/>"#,
            y0 = frame.y(0.0),
            y1 = frame.y(frame.y_max),
        );
    }

    out.push_str("</svg>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn belt_curve_svg_is_well_formed() {
        let artifact = BeltCurveArtifact {
            confidence_level: 0.95,
            mu_values: vec![0.5, 1.5, 2.5],
            thresholds: vec![1.1, 1.3, 2.8],
            n_valid: vec![100, 100, 100],
        };
        let svg = render_belt_curve(&artifact);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<circle").count(), 3);
    }

    #[test]
    fn hist_svg_marks_bands_and_observed_limit() {
        let artifact = UpperLimitHistArtifact {
            bin_edges: vec![0.0, 1.0, 2.0, 3.0],
            counts: vec![5, 2, 0],
            bands: [0.4, 0.8, 1.2, 1.8, 2.4],
            observed_limit: Some(1.5),
            clb_strict: Some(0.4),
            clb_inclusive: Some(0.42),
            n_toys: 7,
        };
        let svg = render_upper_limit_hist(&artifact);
        assert!(svg.contains("crimson"));
        assert_eq!(svg.matches("stroke-dasharray").count(), 5);
        // Zero-count bins draw no bar.
        assert_eq!(svg.matches("<rect").count(), 1 + 2);
    }

    #[test]
    fn empty_artifacts_render_empty_documents() {
        let artifact = BeltCurveArtifact {
            confidence_level: 0.95,
            mu_values: vec![],
            thresholds: vec![],
            n_valid: vec![],
        };
        let svg = render_belt_curve(&artifact);
        assert!(svg.ends_with("</svg>"));
    }
}
