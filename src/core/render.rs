//! Retained-mode scenes for lesson rendering.
//!
//! A lesson turns its current state into a [`Scene`]: a flat list of shapes
//! in data coordinates plus a [`Viewport`]. Painting maps the shapes to
//! pixels and hands them to a [`Surface`] (browser canvas, SVG text).
//! Building a scene only reads lesson state.

use std::fmt;
use std::fmt::Write as _;

use crate::timeline::TimelineFrame;

/// Theme background (dark scientific).
pub const BACKGROUND: Color = Color::rgb(0x0a, 0x0f, 0x1a);
pub const GRID: Color = Color::rgb(0x7a, 0xa2, 0xff);
pub const INK: Color = Color::rgb(0xb2, 0xba, 0xd2);
pub const HIGHLIGHT: Color = Color::rgb(0xfb, 0xbf, 0x24);

/// Class colors, indexed by label.
pub const SERIES_COLORS: [Color; 5] = [
    Color::rgb(0x7a, 0xa2, 0xff), // blue
    Color::rgb(0xfb, 0x71, 0x85), // pink/red
    Color::rgb(0x4a, 0xde, 0x80), // green
    Color::rgb(0xa7, 0x8b, 0xfa), // purple
    Color::rgb(0xfb, 0xbf, 0x24), // amber
];

/// Neutral color for points without a class.
pub const UNLABELED: Color = Color::rgb(0x6b, 0x72, 0x80);

pub fn series_color(label: usize) -> Color {
    SERIES_COLORS[label % SERIES_COLORS.len()]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear blend towards `other` (`t = 0` is `self`).
    pub fn mix(self, other: Color, t: f64) -> Color {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Color::rgb(
            lerp(self.r, other.r),
            lerp(self.g, other.g),
            lerp(self.b, other.b),
        )
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Style {
    pub stroke: Option<Color>,
    pub fill: Option<Color>,
    pub line_width: f64,
    pub opacity: f64,
}

impl Style {
    pub fn stroke(color: Color, line_width: f64) -> Self {
        Self {
            stroke: Some(color),
            fill: None,
            line_width,
            opacity: 1.0,
        }
    }

    pub fn fill(color: Color) -> Self {
        Self {
            stroke: None,
            fill: Some(color),
            line_width: 0.0,
            opacity: 1.0,
        }
    }

    pub fn with_stroke(mut self, color: Color, line_width: f64) -> Self {
        self.stroke = Some(color);
        self.line_width = line_width;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = if opacity.is_finite() {
            opacity.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Line {
        from: (f64, f64),
        to: (f64, f64),
    },
    Polyline {
        points: Vec<(f64, f64)>,
    },
    /// `radius` is in pixels regardless of coordinate space.
    Circle {
        center: (f64, f64),
        radius: f64,
    },
    Rect {
        min: (f64, f64),
        max: (f64, f64),
    },
    Text {
        at: (f64, f64),
        text: String,
        size: f64,
    },
}

/// One drawable, tagged with the reveal target it belongs to.
#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    pub target: &'static str,
    pub shape: Shape,
    pub style: Style,
}

/// Data-space window mapped onto a pixel canvas (y grows upwards).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub width: f64,
    pub height: f64,
    pub padding: f64,
}

impl Viewport {
    pub fn new(x: (f64, f64), y: (f64, f64), width: f64, height: f64) -> Self {
        Self {
            x_min: x.0,
            x_max: x.1,
            y_min: y.0,
            y_max: y.1,
            width,
            height,
            padding: 24.0,
        }
    }

    fn span(lo: f64, hi: f64) -> f64 {
        let s = hi - lo;
        if s.is_finite() && s.abs() > 1e-12 {
            s
        } else {
            1.0
        }
    }

    pub fn to_px(&self, (x, y): (f64, f64)) -> (f64, f64) {
        let inner_w = (self.width - 2.0 * self.padding).max(1.0);
        let inner_h = (self.height - 2.0 * self.padding).max(1.0);
        let fx = (x - self.x_min) / Self::span(self.x_min, self.x_max);
        let fy = (y - self.y_min) / Self::span(self.y_min, self.y_max);
        (
            self.padding + fx * inner_w,
            self.height - self.padding - fy * inner_h,
        )
    }

    pub fn contains_x(&self, x: f64) -> bool {
        x >= self.x_min.min(self.x_max) && x <= self.x_max.max(self.x_min)
    }

    pub fn contains_y(&self, y: f64) -> bool {
        y >= self.y_min.min(self.y_max) && y <= self.y_max.max(self.y_min)
    }
}

/// Tick spacing of the form {1, 2, 5} x 10^k giving roughly `target` ticks.
pub fn nice_step(span: f64, target: usize) -> f64 {
    if !span.is_finite() || span <= 0.0 || target == 0 {
        return 1.0;
    }
    let raw = span / target as f64;
    let mag = 10f64.powf(raw.log10().floor());
    let norm = raw / mag;
    let nice = if norm < 1.5 {
        1.0
    } else if norm < 3.5 {
        2.0
    } else if norm < 7.5 {
        5.0
    } else {
        10.0
    };
    nice * mag
}

/// Drawing backend. Shapes arrive in pixel coordinates.
pub trait Surface {
    fn clear(&mut self, width: f64, height: f64, background: Color);
    fn draw(&mut self, shape: &Shape, style: &Style);
}

#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    pub viewport: Viewport,
    pub background: Color,
    pub items: Vec<Item>,
}

impl Scene {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            background: BACKGROUND,
            items: Vec::new(),
        }
    }

    /// Set the data window, keeping the canvas size.
    pub fn set_range(&mut self, x: (f64, f64), y: (f64, f64)) {
        self.viewport.x_min = x.0;
        self.viewport.x_max = x.1;
        self.viewport.y_min = y.0;
        self.viewport.y_max = y.1;
    }

    /// Fit the data window around `points` with a relative margin.
    pub fn fit(&mut self, points: &[crate::dataset::Point], margin: f64) {
        match crate::dataset::bounds(points) {
            Some((lo, hi)) => {
                let mx = ((hi.x - lo.x) * margin).max(0.5);
                let my = ((hi.y - lo.y) * margin).max(0.5);
                self.set_range((lo.x - mx, hi.x + mx), (lo.y - my, hi.y + my));
            }
            None => self.set_range((-1.0, 1.0), (-1.0, 1.0)),
        }
    }

    pub fn push(&mut self, target: &'static str, shape: Shape, style: Style) {
        self.items.push(Item {
            target,
            shape,
            style,
        });
    }

    pub fn line(&mut self, target: &'static str, from: (f64, f64), to: (f64, f64), style: Style) {
        self.push(target, Shape::Line { from, to }, style);
    }

    pub fn polyline(&mut self, target: &'static str, points: Vec<(f64, f64)>, style: Style) {
        if points.len() >= 2 {
            self.push(target, Shape::Polyline { points }, style);
        }
    }

    pub fn circle(&mut self, target: &'static str, center: (f64, f64), radius: f64, style: Style) {
        self.push(target, Shape::Circle { center, radius }, style);
    }

    pub fn rect(&mut self, target: &'static str, min: (f64, f64), max: (f64, f64), style: Style) {
        self.push(target, Shape::Rect { min, max }, style);
    }

    pub fn text(&mut self, target: &'static str, at: (f64, f64), text: impl Into<String>) {
        self.push(
            target,
            Shape::Text {
                at,
                text: text.into(),
                size: 12.0,
            },
            Style::fill(INK),
        );
    }

    /// Grid lines at nice ticks plus the zero axes when they're in view.
    pub fn axes(&mut self) {
        let v = self.viewport;
        let grid = Style::stroke(GRID, 1.0).with_opacity(0.08);
        let sx = nice_step(v.x_max - v.x_min, 6);
        let sy = nice_step(v.y_max - v.y_min, 6);

        let mut x = (v.x_min / sx).ceil() * sx;
        while x <= v.x_max + 1e-9 {
            self.line("grid", (x, v.y_min), (x, v.y_max), grid);
            x += sx;
        }
        let mut y = (v.y_min / sy).ceil() * sy;
        while y <= v.y_max + 1e-9 {
            self.line("grid", (v.x_min, y), (v.x_max, y), grid);
            y += sy;
        }

        let axis = Style::stroke(GRID, 1.5).with_opacity(0.35);
        if v.contains_y(0.0) {
            self.line("axes", (v.x_min, 0.0), (v.x_max, 0.0), axis);
        }
        if v.contains_x(0.0) {
            self.line("axes", (0.0, v.y_min), (0.0, v.y_max), axis);
        }
    }

    /// Scale the opacity of every item whose target carries an `opacity`
    /// value in the timeline frame.
    pub fn apply_reveal(&mut self, frame: &TimelineFrame) {
        for item in &mut self.items {
            if let Some(o) = frame.get(item.target, "opacity") {
                item.style.opacity = (item.style.opacity * o).clamp(0.0, 1.0);
            }
        }
    }

    fn to_px(&self, shape: &Shape) -> Shape {
        let v = &self.viewport;
        match shape {
            Shape::Line { from, to } => Shape::Line {
                from: v.to_px(*from),
                to: v.to_px(*to),
            },
            Shape::Polyline { points } => Shape::Polyline {
                points: points.iter().map(|p| v.to_px(*p)).collect(),
            },
            Shape::Circle { center, radius } => Shape::Circle {
                center: v.to_px(*center),
                radius: *radius,
            },
            Shape::Rect { min, max } => {
                let a = v.to_px(*min);
                let b = v.to_px(*max);
                Shape::Rect {
                    min: (a.0.min(b.0), a.1.min(b.1)),
                    max: (a.0.max(b.0), a.1.max(b.1)),
                }
            }
            Shape::Text { at, text, size } => Shape::Text {
                at: v.to_px(*at),
                text: text.clone(),
                size: *size,
            },
        }
    }

    /// Clear the surface, then draw every item in order. Items with
    /// non-finite coordinates or zero opacity are skipped.
    pub fn paint(&self, surface: &mut dyn Surface) {
        surface.clear(self.viewport.width, self.viewport.height, self.background);
        for item in &self.items {
            if item.style.opacity <= 0.0 || !shape_is_finite(&item.shape) {
                continue;
            }
            surface.draw(&self.to_px(&item.shape), &item.style);
        }
    }

    pub fn to_svg(&self) -> String {
        let mut svg = SvgSurface::default();
        self.paint(&mut svg);
        svg.finish()
    }
}

fn shape_is_finite(shape: &Shape) -> bool {
    let ok = |p: &(f64, f64)| p.0.is_finite() && p.1.is_finite();
    match shape {
        Shape::Line { from, to } => ok(from) && ok(to),
        Shape::Polyline { points } => points.iter().all(ok),
        Shape::Circle { center, radius } => ok(center) && radius.is_finite(),
        Shape::Rect { min, max } => ok(min) && ok(max),
        Shape::Text { at, .. } => ok(at),
    }
}

/// Builds a standalone SVG document.
#[derive(Default)]
pub struct SvgSurface {
    body: String,
    width: f64,
    height: f64,
}

impl SvgSurface {
    fn style_attrs(style: &Style) -> String {
        let mut s = String::new();
        match style.fill {
            Some(c) => {
                let _ = write!(s, " fill=\"{c}\"");
            }
            None => s.push_str(" fill=\"none\""),
        }
        if let Some(c) = style.stroke {
            let _ = write!(s, " stroke=\"{c}\" stroke-width=\"{:.2}\"", style.line_width);
        }
        if style.opacity < 1.0 {
            let _ = write!(s, " opacity=\"{:.3}\"", style.opacity);
        }
        s
    }

    pub fn finish(self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n{body}</svg>\n",
            w = self.width,
            h = self.height,
            body = self.body
        )
    }
}

pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

impl Surface for SvgSurface {
    fn clear(&mut self, width: f64, height: f64, background: Color) {
        self.body.clear();
        self.width = width;
        self.height = height;
        let _ = writeln!(
            self.body,
            "<rect x=\"0\" y=\"0\" width=\"{width}\" height=\"{height}\" fill=\"{background}\"/>"
        );
    }

    fn draw(&mut self, shape: &Shape, style: &Style) {
        let attrs = Self::style_attrs(style);
        let _ = match shape {
            Shape::Line { from, to } => writeln!(
                self.body,
                "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\"{attrs}/>",
                from.0, from.1, to.0, to.1
            ),
            Shape::Polyline { points } => {
                let pts: Vec<String> = points
                    .iter()
                    .map(|(x, y)| format!("{x:.2},{y:.2}"))
                    .collect();
                writeln!(self.body, "<polyline points=\"{}\"{attrs}/>", pts.join(" "))
            }
            Shape::Circle { center, radius } => writeln!(
                self.body,
                "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.2}\"{attrs}/>",
                center.0, center.1, radius
            ),
            Shape::Rect { min, max } => writeln!(
                self.body,
                "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\"{attrs}/>",
                min.0,
                min.1,
                max.0 - min.0,
                max.1 - min.1
            ),
            Shape::Text { at, text, size } => writeln!(
                self.body,
                "<text x=\"{:.2}\" y=\"{:.2}\" font-size=\"{size}\" font-family=\"sans-serif\"{attrs}>{}</text>",
                at.0,
                at.1,
                escape_xml(text)
            ),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{Timeline, Tween};

    #[test]
    fn viewport_maps_corners_with_y_up() {
        let v = Viewport {
            padding: 0.0,
            ..Viewport::new((0.0, 10.0), (0.0, 5.0), 100.0, 50.0)
        };
        assert_eq!(v.to_px((0.0, 0.0)), (0.0, 50.0));
        assert_eq!(v.to_px((10.0, 5.0)), (100.0, 0.0));
    }

    #[test]
    fn degenerate_viewport_stays_finite() {
        let v = Viewport::new((3.0, 3.0), (1.0, 1.0), 100.0, 100.0);
        let (x, y) = v.to_px((3.0, 1.0));
        assert!(x.is_finite() && y.is_finite());
    }

    #[test]
    fn nice_steps() {
        assert_eq!(nice_step(10.0, 5), 2.0);
        assert!((nice_step(1.0, 4) - 0.2).abs() < 1e-12);
        assert!((nice_step(730.0, 6) - 100.0).abs() < 1e-9);
        assert_eq!(nice_step(0.0, 5), 1.0);
    }

    #[test]
    fn empty_scene_paints_background_only() {
        let scene = Scene::new(Viewport::new((0.0, 1.0), (0.0, 1.0), 200.0, 100.0));
        let svg = scene.to_svg();
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<rect").count(), 1);
        assert!(svg.contains("#0a0f1a"));
    }

    #[test]
    fn non_finite_items_are_skipped() {
        let mut scene = Scene::new(Viewport::new((0.0, 1.0), (0.0, 1.0), 200.0, 100.0));
        scene.circle("points", (f64::NAN, 0.5), 3.0, Style::fill(INK));
        scene.circle("points", (0.5, 0.5), 3.0, Style::fill(INK));
        assert_eq!(scene.to_svg().matches("<circle").count(), 1);
    }

    #[test]
    fn text_is_escaped() {
        let mut scene = Scene::new(Viewport::new((0.0, 1.0), (0.0, 1.0), 200.0, 100.0));
        scene.text("labels", (0.5, 0.5), "a<b & c");
        assert!(scene.to_svg().contains("a&lt;b &amp; c"));
    }

    #[test]
    fn reveal_scales_target_opacity() {
        let mut scene = Scene::new(Viewport::new((0.0, 1.0), (0.0, 1.0), 200.0, 100.0));
        scene.circle("points", (0.5, 0.5), 3.0, Style::fill(INK));
        scene.circle("centroids", (0.5, 0.5), 3.0, Style::fill(INK));

        let mut timeline = Timeline::new();
        timeline.set_base("points", "opacity", 0.0);
        timeline.push(Tween::new("points", "opacity", 1.0, 100.0, 0.0));
        scene.apply_reveal(&timeline.sample(50.0));

        assert!((scene.items[0].style.opacity - 0.5).abs() < 1e-9);
        assert_eq!(scene.items[1].style.opacity, 1.0);
    }

    #[test]
    fn mix_endpoints() {
        let a = Color::rgb(0, 0, 0);
        let b = Color::rgb(255, 255, 255);
        assert_eq!(a.mix(b, 0.0), a);
        assert_eq!(a.mix(b, 1.0), b);
        assert_eq!(format!("{}", Color::rgb(10, 15, 26)), "#0a0f1a");
    }
}
