//! Tera engine adapter.

use serde_json::Value;
use tera::{Context, Tera};

use super::{CompiledTemplate, EngineError, TemplateEngine};

/// Adapter over [`tera`].
///
/// Each compile builds a single-template `Tera` instance; the cache only
/// ever renders one template at a time.
#[derive(Debug, Default)]
pub struct TeraEngine;

impl TeraEngine {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateEngine for TeraEngine {
    fn name(&self) -> &'static str {
        "tera"
    }

    fn compile(
        &self,
        name: &str,
        source: String,
    ) -> Result<Box<dyn CompiledTemplate>, EngineError> {
        let mut tera = Tera::default();
        tera.add_raw_template(name, &source)
            .map_err(|err| EngineError::compile(name, err))?;
        Ok(Box::new(TeraTemplate {
            name: name.to_string(),
            tera,
        }))
    }
}

struct TeraTemplate {
    name: String,
    tera: Tera,
}

impl CompiledTemplate for TeraTemplate {
    fn render(&self, data: &Value) -> Result<String, EngineError> {
        let context =
            Context::from_value(data.clone()).map_err(|err| EngineError::render(&self.name, err))?;
        self.tera
            .render(&self.name, &context)
            .map_err(|err| EngineError::render(&self.name, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_with_data() {
        let engine = TeraEngine::new();
        let template = engine
            .compile("greeting", "Hello {{ name }}!".to_string())
            .unwrap();

        let html = template.render(&json!({ "name": "world" })).unwrap();
        assert_eq!(html, "Hello world!");
    }

    #[test]
    fn reports_syntax_errors_at_compile_time() {
        let engine = TeraEngine::new();
        let err = engine
            .compile("broken", "Hello {{ name".to_string())
            .unwrap_err();
        assert!(matches!(err, EngineError::Compile { .. }));
    }

    #[test]
    fn reports_missing_variables_at_render_time() {
        let engine = TeraEngine::new();
        let template = engine
            .compile("strict", "{{ missing }}".to_string())
            .unwrap();
        let err = template.render(&json!({})).unwrap_err();
        assert!(matches!(err, EngineError::Render { .. }));
    }
}
