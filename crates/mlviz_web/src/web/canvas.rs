//! 2D canvas backend for [`Scene::paint`].

use mlviz::render::{Color, Scene, Shape, Style, Surface};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

fn context_2d(
    canvas: &web_sys::HtmlCanvasElement,
) -> Result<web_sys::CanvasRenderingContext2d, String> {
    canvas
        .get_context("2d")
        .map_err(|_| "canvas: get_context threw".to_string())?
        .ok_or("canvas: missing 2d context".to_string())?
        .dyn_into::<web_sys::CanvasRenderingContext2d>()
        .map_err(|_| "canvas: context is not 2d".to_string())
}

/// Draws onto a canvas context. Canvas calls that can throw record the first
/// failure instead of aborting the frame.
struct CanvasSurface {
    ctx: web_sys::CanvasRenderingContext2d,
    error: Option<String>,
}

impl CanvasSurface {
    fn note(&mut self, res: Result<(), JsValue>, what: &str) {
        if res.is_err() && self.error.is_none() {
            self.error = Some(format!("canvas: {what} threw"));
        }
    }

    #[allow(deprecated)]
    fn finish_path(&self, style: &Style) {
        if let Some(fill) = style.fill {
            self.ctx.set_fill_style(&JsValue::from_str(&fill.to_string()));
            self.ctx.fill();
        }
        if let Some(stroke) = style.stroke {
            self.ctx
                .set_stroke_style(&JsValue::from_str(&stroke.to_string()));
            self.ctx.set_line_width(style.line_width);
            self.ctx.stroke();
        }
    }
}

impl Surface for CanvasSurface {
    #[allow(deprecated)]
    fn clear(&mut self, width: f64, height: f64, background: Color) {
        self.ctx.set_global_alpha(1.0);
        self.ctx
            .set_fill_style(&JsValue::from_str(&background.to_string()));
        self.ctx.fill_rect(0.0, 0.0, width, height);
    }

    #[allow(deprecated)]
    fn draw(&mut self, shape: &Shape, style: &Style) {
        self.ctx.set_global_alpha(style.opacity);
        match shape {
            Shape::Line { from, to } => {
                self.ctx.begin_path();
                self.ctx.move_to(from.0, from.1);
                self.ctx.line_to(to.0, to.1);
                self.finish_path(style);
            }
            Shape::Polyline { points } => {
                let Some((first, rest)) = points.split_first() else {
                    return;
                };
                self.ctx.begin_path();
                self.ctx.move_to(first.0, first.1);
                for p in rest {
                    self.ctx.line_to(p.0, p.1);
                }
                self.finish_path(style);
            }
            Shape::Circle { center, radius } => {
                self.ctx.begin_path();
                let res = self
                    .ctx
                    .arc(center.0, center.1, radius.max(0.0), 0.0, std::f64::consts::TAU);
                self.note(res, "arc");
                self.finish_path(style);
            }
            Shape::Rect { min, max } => {
                self.ctx.begin_path();
                self.ctx.rect(min.0, min.1, max.0 - min.0, max.1 - min.1);
                self.finish_path(style);
            }
            Shape::Text { at, text, size } => {
                self.ctx.set_font(&format!("{size}px sans-serif"));
                let color = style.fill.or(style.stroke).unwrap_or(mlviz::render::INK);
                self.ctx.set_fill_style(&JsValue::from_str(&color.to_string()));
                let res = self.ctx.fill_text(text, at.0, at.1);
                self.note(res, "fill_text");
            }
        }
    }
}

/// Size the canvas to the scene and paint it.
pub fn paint_scene(canvas: &web_sys::HtmlCanvasElement, scene: &Scene) -> Result<(), String> {
    let ctx = context_2d(canvas)?;
    let mut surface = CanvasSurface { ctx, error: None };
    scene.paint(&mut surface);
    surface.ctx.set_global_alpha(1.0);
    match surface.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
