//! Handlebars engine adapter.

use handlebars::Handlebars;
use serde_json::Value;

use super::{CompiledTemplate, EngineError, RenderErrorMode, TemplateEngine};

/// Adapter over [`handlebars`].
///
/// This engine reports failures inline: the error text becomes the page
/// body and the request still answers 200. Hosts that migrated handlebars
/// templates from other systems rely on seeing the error in the page;
/// diagnostics are never written to the cache.
#[derive(Debug, Default)]
pub struct HandlebarsEngine;

impl HandlebarsEngine {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateEngine for HandlebarsEngine {
    fn name(&self) -> &'static str {
        "handlebars"
    }

    fn error_mode(&self) -> RenderErrorMode {
        RenderErrorMode::Inline
    }

    fn compile(
        &self,
        name: &str,
        source: String,
    ) -> Result<Box<dyn CompiledTemplate>, EngineError> {
        let mut registry = Handlebars::new();
        registry
            .register_template_string(name, source)
            .map_err(|err| EngineError::compile(name, err))?;
        Ok(Box::new(HandlebarsTemplate {
            name: name.to_string(),
            registry,
        }))
    }
}

struct HandlebarsTemplate {
    name: String,
    registry: Handlebars<'static>,
}

impl CompiledTemplate for HandlebarsTemplate {
    fn render(&self, data: &Value) -> Result<String, EngineError> {
        self.registry
            .render(&self.name, data)
            .map_err(|err| EngineError::render(&self.name, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_with_data() {
        let engine = HandlebarsEngine::new();
        let template = engine
            .compile("greeting", "Hello {{name}}!".to_string())
            .unwrap();

        let html = template.render(&json!({ "name": "world" })).unwrap();
        assert_eq!(html, "Hello world!");
    }

    #[test]
    fn reports_unclosed_blocks_at_compile_time() {
        let engine = HandlebarsEngine::new();
        let err = engine
            .compile("broken", "{{#if flag}}never closed".to_string())
            .unwrap_err();
        assert!(matches!(err, EngineError::Compile { .. }));
    }

    #[test]
    fn failures_are_reported_inline() {
        assert_eq!(HandlebarsEngine::new().error_mode(), RenderErrorMode::Inline);
    }
}
