use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = mlvizLatexRenderAll)]
    fn mlviz_latex_render_all();
}

/// Typeset every `.katex-src` node on the page. The JS side waits for KaTeX
/// to finish loading, so this is fire-and-forget.
pub fn render_all() {
    mlviz_latex_render_all();
}
