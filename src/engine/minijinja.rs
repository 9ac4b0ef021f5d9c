//! MiniJinja engine adapter.

use minijinja::Environment;
use serde_json::Value;

use super::{CompiledTemplate, EngineError, TemplateEngine};

/// Adapter over [`minijinja`].
///
/// Templates are parsed when added, so syntax errors surface at compile
/// time just like with the tera adapter.
#[derive(Debug, Default)]
pub struct MinijinjaEngine;

impl MinijinjaEngine {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateEngine for MinijinjaEngine {
    fn name(&self) -> &'static str {
        "minijinja"
    }

    fn compile(
        &self,
        name: &str,
        source: String,
    ) -> Result<Box<dyn CompiledTemplate>, EngineError> {
        let mut env = Environment::new();
        env.add_template_owned(name.to_string(), source)
            .map_err(|err| EngineError::compile(name, err))?;
        Ok(Box::new(MinijinjaTemplate {
            name: name.to_string(),
            env,
        }))
    }
}

struct MinijinjaTemplate {
    name: String,
    env: Environment<'static>,
}

impl CompiledTemplate for MinijinjaTemplate {
    fn render(&self, data: &Value) -> Result<String, EngineError> {
        let template = self
            .env
            .get_template(&self.name)
            .map_err(|err| EngineError::render(&self.name, err))?;
        template
            .render(data)
            .map_err(|err| EngineError::render(&self.name, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_with_data() {
        let engine = MinijinjaEngine::new();
        let template = engine
            .compile("greeting", "Hello {{ name }}!".to_string())
            .unwrap();

        let html = template.render(&json!({ "name": "world" })).unwrap();
        assert_eq!(html, "Hello world!");
    }

    #[test]
    fn reports_syntax_errors_at_compile_time() {
        let engine = MinijinjaEngine::new();
        let err = engine
            .compile("broken", "{% for x in %}".to_string())
            .unwrap_err();
        assert!(matches!(err, EngineError::Compile { .. }));
    }
}
