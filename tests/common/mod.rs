pub mod fixtures;

use serde_json::Value;
use std::collections::HashMap;
use xdjango::{TemplateContext, TransformError, Transformer, TransformerBuilder};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub const XHTML: &str = "http://www.w3.org/1999/xhtml";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn context(value: Value) -> TemplateContext {
    TemplateContext::from_json(value).expect("context must be a JSON object")
}

/// Compiles `body` inside the blank stylesheet.
pub fn compile(body: &str) -> Result<Transformer, TransformError> {
    init_logging();
    Transformer::compile(&fixtures::stylesheet(body))
}

/// Compiles `body` inside the blank stylesheet and renders it against `data`.
pub fn render(body: &str, data: Value) -> Result<String, TransformError> {
    compile(body)?.render(context(data))
}

/// Renders with a verbose transformer, which reports failures as an HTML page.
pub fn render_verbose(body: &str, data: Value) -> Result<String, TransformError> {
    init_logging();
    TransformerBuilder::new()
        .with_verbose(true)
        .build(&fixtures::stylesheet(body))?
        .execute(xdjango::Input::Empty, context(data), &HashMap::new())
}
