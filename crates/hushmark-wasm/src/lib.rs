use hushmark_core::{Markup, MarkupOptions, SanitizePolicy};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParseOptions {
    gfm: Option<bool>,
    breaks: Option<bool>,
    max_nesting: Option<usize>,
}

#[wasm_bindgen(js_name = mdParse)]
pub fn md_parse(text: &str) -> String {
    hushmark_core::md_parse(text)
}

#[wasm_bindgen(js_name = mdParseInline)]
pub fn md_parse_inline(text: &str) -> String {
    hushmark_core::md_parse_inline(text)
}

#[wasm_bindgen]
pub fn sanitize(html: &str) -> String {
    hushmark_core::sanitize(html)
}

#[wasm_bindgen(js_name = mdParseWithOptions)]
pub fn md_parse_with_options(text: &str, options: JsValue) -> Result<String, JsValue> {
    Ok(markup_from_js(options)?.parse(text))
}

#[wasm_bindgen(js_name = mdParseInlineWithOptions)]
pub fn md_parse_inline_with_options(text: &str, options: JsValue) -> Result<String, JsValue> {
    Ok(markup_from_js(options)?.parse_inline(text))
}

fn markup_from_js(value: JsValue) -> Result<Markup, JsValue> {
    let parsed = if value.is_null() || value.is_undefined() {
        ParseOptions::default()
    } else {
        serde_wasm_bindgen::from_value(value).map_err(|err| JsValue::from_str(&err.to_string()))?
    };
    Markup::new(markup_options(parsed), &SanitizePolicy::DEFAULT)
        .map_err(|err| JsValue::from_str(&err.to_string()))
}

fn markup_options(parsed: ParseOptions) -> MarkupOptions {
    let mut out = MarkupOptions::default();
    if let Some(gfm) = parsed.gfm {
        out.gfm = gfm;
    }
    if let Some(breaks) = parsed.breaks {
        out.breaks = breaks;
    }
    if let Some(max_nesting) = parsed.max_nesting {
        out.max_nesting = max_nesting;
    }
    out
}
