//! Success-by-attempt histogram and its pie chart.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Counts of theorems solved on attempt 1..=shots, plus a failure bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptHistogram {
    labels: Vec<String>,
    counts: Vec<u64>,
}

impl AttemptHistogram {
    pub fn new(shots: usize) -> Self {
        let mut labels: Vec<String> = (1..=shots)
            .map(|i| format!("Success on attempt {}", i))
            .collect();
        labels.push("Failure".to_string());
        Self {
            counts: vec![0; labels.len()],
            labels,
        }
    }

    pub fn shots(&self) -> usize {
        self.labels.len() - 1
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Count a theorem first solved on `attempt` (1-based).
    pub fn record_success(&mut self, attempt: usize) -> Result<()> {
        if attempt == 0 || attempt > self.shots() {
            return Err(Error::sequencing(format!(
                "attempt {} is outside 1..={}",
                attempt,
                self.shots()
            )));
        }
        self.counts[attempt - 1] += 1;
        Ok(())
    }

    pub fn record_failure(&mut self) {
        let last = self.counts.len() - 1;
        self.counts[last] += 1;
    }

    pub fn successes_on(&self, attempt: usize) -> u64 {
        if attempt == 0 || attempt > self.shots() {
            0
        } else {
            self.counts[attempt - 1]
        }
    }

    pub fn failures(&self) -> u64 {
        self.counts.last().copied().unwrap_or(0)
    }

    pub fn solved(&self) -> u64 {
        self.counts[..self.shots()].iter().sum()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn any_success(&self) -> bool {
        self.solved() > 0
    }

    /// Render the histogram as a standalone SVG pie chart.
    pub fn to_svg_pie(&self, config: &PieConfig) -> String {
        let mut svg = String::new();
        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
            w = config.width,
            h = config.height
        ));
        svg.push_str(&format!(
            "  <title>{}</title>\n",
            escape_xml(&config.title)
        ));

        let total = self.total();
        let cx = config.height as f64 / 2.0;
        let cy = config.height as f64 / 2.0;
        let radius = cx * 0.7;

        if total == 0 {
            svg.push_str(&format!(
                "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\">No theorems evaluated</text>\n",
                cx, cy
            ));
            svg.push_str("</svg>\n");
            return svg;
        }

        let failure_idx = self.counts.len() - 1;
        let mut angle = -PI / 2.0;
        for (idx, &count) in self.counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let sweep = 2.0 * PI * count as f64 / total as f64;
            let color = config.color(idx, idx == failure_idx);

            let pull = if idx == failure_idx { config.pull * radius } else { 0.0 };
            let mid = angle + sweep / 2.0;
            let (ox, oy) = (cx + pull * mid.cos(), cy + pull * mid.sin());

            if count == total {
                svg.push_str(&format!(
                    "  <circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.2}\" fill=\"{}\"/>\n",
                    ox, oy, radius, color
                ));
            } else {
                let (x1, y1) = (ox + radius * angle.cos(), oy + radius * angle.sin());
                let end = angle + sweep;
                let (x2, y2) = (ox + radius * end.cos(), oy + radius * end.sin());
                let large_arc = if sweep > PI { 1 } else { 0 };
                svg.push_str(&format!(
                    "  <path d=\"M {:.2} {:.2} L {:.2} {:.2} A {:.2} {:.2} 0 {} 1 {:.2} {:.2} Z\" fill=\"{}\" stroke=\"white\"/>\n",
                    ox, oy, x1, y1, radius, radius, large_arc, x2, y2, color
                ));
            }
            angle += sweep;
        }

        // Legend
        let legend_x = config.height as f64 + 10.0;
        for (idx, (label, count)) in self.labels.iter().zip(&self.counts).enumerate() {
            let y = 30.0 + idx as f64 * 22.0;
            svg.push_str(&format!(
                "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"14\" height=\"14\" fill=\"{}\"/>\n",
                legend_x,
                y - 11.0,
                config.color(idx, idx == failure_idx)
            ));
            svg.push_str(&format!(
                "  <text x=\"{:.1}\" y=\"{:.1}\" font-size=\"13\">{} ({})</text>\n",
                legend_x + 20.0,
                y,
                escape_xml(label),
                count
            ));
        }

        svg.push_str("</svg>\n");
        svg
    }
}

/// Layout of the pie chart.
#[derive(Debug, Clone)]
pub struct PieConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    /// Offset of the failure slice, as a fraction of the radius.
    pub pull: f64,
    pub palette: Vec<String>,
    pub failure_color: String,
}

impl Default for PieConfig {
    fn default() -> Self {
        Self {
            width: 560,
            height: 360,
            title: "Proof attempts".to_string(),
            pull: 0.2,
            palette: ["#636efa", "#00cc96", "#ab63fa", "#ffa15a", "#19d3f3", "#ff6692"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            failure_color: "#ef553b".to_string(),
        }
    }
}

impl PieConfig {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    fn color(&self, idx: usize, failure: bool) -> &str {
        if failure || self.palette.is_empty() {
            &self.failure_color
        } else {
            &self.palette[idx % self.palette.len()]
        }
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
