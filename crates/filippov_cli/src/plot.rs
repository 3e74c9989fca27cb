//! SVG figures for phase portraits and time series.

use anyhow::{bail, Result};
use filippov_core::nullcline::Segment;
use filippov_core::vector_field::{FieldSample, Window};
use plotters::prelude::*;
use std::path::Path;

const SIZE: (u32, u32) = (1000, 800);
/// Arrow length as a fraction of the plot span.
const ARROW: f64 = 0.018;

pub const DARK_RED: RGBColor = RGBColor(139, 0, 0);
pub const DARK_BLUE: RGBColor = RGBColor(0, 0, 139);
pub const DARK_GREEN: RGBColor = RGBColor(0, 100, 0);
pub const ORANGE: RGBColor = RGBColor(255, 140, 0);
pub const PURPLE: RGBColor = RGBColor(128, 0, 128);
pub const GREY: RGBColor = RGBColor(128, 128, 128);

struct Curve {
    label: Option<String>,
    points: Vec<(f64, f64)>,
    color: RGBColor,
}

/// A chart assembled layer by layer and written once with [`Figure::save`].
pub struct Figure {
    title: String,
    x_desc: String,
    y_desc: String,
    window: Option<Window>,
    fields: Vec<(Vec<FieldSample>, RGBColor)>,
    segments: Vec<(Vec<Segment>, RGBColor)>,
    curves: Vec<Curve>,
    markers: Vec<((f64, f64), RGBColor)>,
    hlines: Vec<(f64, RGBColor)>,
}

impl Figure {
    pub fn new(title: impl Into<String>, x_desc: &str, y_desc: &str) -> Self {
        Self {
            title: title.into(),
            x_desc: x_desc.to_string(),
            y_desc: y_desc.to_string(),
            window: None,
            fields: Vec::new(),
            segments: Vec::new(),
            curves: Vec::new(),
            markers: Vec::new(),
            hlines: Vec::new(),
        }
    }

    /// Phase portrait over a fixed window.
    pub fn phase(title: impl Into<String>, window: Window) -> Self {
        let mut figure = Self::new(title, "x", "y");
        figure.window = Some(window);
        figure
    }

    pub fn field(&mut self, samples: Vec<FieldSample>, color: RGBColor) -> &mut Self {
        self.fields.push((samples, color));
        self
    }

    pub fn segments(&mut self, segments: Vec<Segment>, color: RGBColor) -> &mut Self {
        self.segments.push((segments, color));
        self
    }

    pub fn curve(&mut self, points: Vec<(f64, f64)>, color: RGBColor) -> &mut Self {
        self.curves.push(Curve {
            label: None,
            points,
            color,
        });
        self
    }

    pub fn labelled_curve(
        &mut self,
        label: impl Into<String>,
        points: Vec<(f64, f64)>,
        color: RGBColor,
    ) -> &mut Self {
        self.curves.push(Curve {
            label: Some(label.into()),
            points,
            color,
        });
        self
    }

    pub fn marker(&mut self, point: (f64, f64), color: RGBColor) -> &mut Self {
        self.markers.push((point, color));
        self
    }

    pub fn hline(&mut self, y: f64, color: RGBColor) -> &mut Self {
        self.hlines.push((y, color));
        self
    }

    fn ranges(&self) -> Result<Window> {
        if let Some(window) = self.window {
            window.validate()?;
            return Ok(window);
        }
        let points = self
            .curves
            .iter()
            .flat_map(|c| c.points.iter().copied())
            .chain(self.markers.iter().map(|m| m.0))
            .filter(|(x, y)| x.is_finite() && y.is_finite());
        let mut bounds: Option<Window> = None;
        for (x, y) in points {
            bounds = Some(match bounds {
                None => Window::new(x, x, y, y),
                Some(b) => Window::new(b.x_min.min(x), b.x_max.max(x), b.y_min.min(y), b.y_max.max(y)),
            });
        }
        let Some(b) = bounds else {
            bail!("Figure '{}' has nothing to draw.", self.title);
        };
        let xpad = 0.02 * (b.x_max - b.x_min).abs().max(1e-9);
        let ypad = 0.05 * (b.y_max - b.y_min).abs().max(1e-9);
        Ok(Window::new(b.x_min - xpad, b.x_max + xpad, b.y_min - ypad, b.y_max + ypad))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let r = self.ranges()?;
        let root = SVGBackend::new(path, SIZE).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .caption(&self.title, ("sans-serif", 28))
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(r.x_min..r.x_max, r.y_min..r.y_max)?;

        chart
            .configure_mesh()
            .x_desc(self.x_desc.as_str())
            .y_desc(self.y_desc.as_str())
            .light_line_style(RGBColor(230, 230, 230))
            .draw()?;

        let (sx, sy) = (r.x_max - r.x_min, r.y_max - r.y_min);
        for (samples, color) in &self.fields {
            let style = color.mix(0.6).stroke_width(1);
            chart.draw_series(samples.iter().filter_map(|s| {
                arrow(s, sx, sy).map(|tip| PathElement::new(vec![(s.x, s.y), tip], style))
            }))?;
            chart.draw_series(samples.iter().filter_map(|s| {
                arrow(s, sx, sy).map(|tip| Circle::new(tip, 1, color.mix(0.6).filled()))
            }))?;
        }

        for (segments, color) in &self.segments {
            let style = color.stroke_width(2);
            chart.draw_series(
                segments
                    .iter()
                    .map(|s| PathElement::new(vec![s.start, s.end], style)),
            )?;
        }

        for (y, color) in &self.hlines {
            chart.draw_series(LineSeries::new(
                vec![(r.x_min, *y), (r.x_max, *y)],
                color.stroke_width(2),
            ))?;
        }

        let mut labelled = false;
        for curve in &self.curves {
            let color = curve.color;
            let points = curve
                .points
                .iter()
                .copied()
                .filter(|(x, y)| x.is_finite() && y.is_finite());
            let series = chart.draw_series(LineSeries::new(points, color.stroke_width(2)))?;
            if let Some(label) = &curve.label {
                labelled = true;
                series
                    .label(label.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
            }
        }

        for (point, color) in &self.markers {
            chart.draw_series(std::iter::once(Circle::new(*point, 4, color.filled())))?;
        }

        if labelled {
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }

        root.present()?;
        log::info!("wrote {}", path.display());
        Ok(())
    }
}

/// Tip of the direction arrow at `s`, scaled to the screen aspect so all
/// arrows have the same drawn length. `None` where the field vanishes.
fn arrow(s: &FieldSample, span_x: f64, span_y: f64) -> Option<(f64, f64)> {
    let (u, v) = (s.dx / span_x, s.dy / span_y);
    let norm = (u * u + v * v).sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    Some((
        s.x + ARROW * span_x * u / norm,
        s.y + ARROW * span_y * v / norm,
    ))
}
