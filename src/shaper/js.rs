//! JavaScript shape functions on an embedded `boa_engine` context

use anyhow::{anyhow, Result};
use boa_engine::{Context, JsValue, Source};
use serde_json::Value;
use tracing::{debug, trace};

use super::{Evaluator, ScriptError, ShapeContext, ShapeHandle};

/// Single-threaded JS engine holding every registered shape
pub struct JsEvaluator {
    context: Context<'static>,
    shapes: Vec<String>,
}

impl JsEvaluator {
    /// Create an engine with `globals` installed as the script global `global`
    pub fn new(globals: &Value) -> Result<Self> {
        let mut evaluator = Self {
            context: Context::default(),
            shapes: Vec::new(),
        };

        let globals = if globals.is_null() {
            "{}".to_string()
        } else {
            serde_json::to_string(globals)?
        };
        evaluator
            .eval(&format!("var global = {};", globals))
            .map_err(|e| anyhow!("Failed to install script globals: {}", e))?;

        Ok(evaluator)
    }

    fn eval(&mut self, code: &str) -> std::result::Result<JsValue, String> {
        self.context
            .eval(Source::from_bytes(code))
            .map_err(|e| e.to_string())
    }

    fn eval_string(&mut self, code: &str) -> std::result::Result<Option<String>, String> {
        let value = self.eval(code)?;
        Ok(value.as_string().map(|s| s.to_std_string_escaped()))
    }
}

impl Evaluator for JsEvaluator {
    fn register(&mut self, label: &str, source: &str) -> Result<ShapeHandle, ScriptError> {
        let id = self.shapes.len();
        let name = format!("__shape_{}", id);

        self.eval(&format!("var {} = ({});", name, function_source(source)))
            .map_err(|message| ScriptError::Compile {
                label: label.to_string(),
                message,
            })?;

        let kind = self
            .eval_string(&format!("typeof {}", name))
            .map_err(|message| ScriptError::Compile {
                label: label.to_string(),
                message,
            })?;
        if kind.as_deref() != Some("function") {
            return Err(ScriptError::NotAFunction {
                label: label.to_string(),
            });
        }

        debug!("Registered shape '{}' as {}", label, name);
        self.shapes.push(name);
        Ok(ShapeHandle::new(id))
    }

    fn call(&mut self, handle: ShapeHandle, ctx: &ShapeContext) -> Result<Value, ScriptError> {
        let name = self
            .shapes
            .get(handle.id())
            .cloned()
            .ok_or(ScriptError::UnknownHandle(handle.id()))?;

        let prelude = format!(
            "var device = {}; var type = {}; var key = {}; var value = {}; var data = {};",
            serde_json::to_string(&ctx.device)?,
            serde_json::to_string(&ctx.type_name)?,
            ctx.key,
            serde_json::to_string(&ctx.value)?,
            serde_json::to_string(&ctx.data)?,
        );
        self.eval(&prelude).map_err(ScriptError::Call)?;

        // JSON.stringify turns undefined (and functions) into undefined
        let result = self
            .eval_string(&format!(
                "(function (r) {{ return r === undefined ? \"null\" : JSON.stringify(r); }})({}())",
                name
            ))
            .map_err(ScriptError::Call)?;

        trace!("{}({}, {}) -> {:?}", name, ctx.device, ctx.key, result);

        match result {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Value::Null),
        }
    }
}

/// Turn a `shape` entry into a function expression.
///
/// Accepted: a function or arrow expression, a body with `return`, or a bare
/// expression.
fn function_source(source: &str) -> String {
    let trimmed = source.trim().trim_end_matches(';').trim_end();

    if trimmed.starts_with("function") || is_arrow(trimmed) {
        trimmed.to_string()
    } else if has_return(source) {
        format!("function () {{\n{}\n}}", source)
    } else {
        format!("function () {{ return ({}); }}", trimmed)
    }
}

fn is_arrow(source: &str) -> bool {
    let Some((params, _)) = source.split_once("=>") else {
        return false;
    };
    let params = params.trim();

    (params.starts_with('(') && params.ends_with(')'))
        || (!params.is_empty()
            && params
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '$'))
}

fn has_return(source: &str) -> bool {
    source
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .any(|word| word == "return")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(key: u32, value: f32) -> ShapeContext {
        ShapeContext {
            device: "nanoKONTROL2".into(),
            type_name: "number".into(),
            key,
            value,
            data: json!({ "name": "fader", "map": [0, 10] }),
        }
    }

    fn run(source: &str, ctx: &ShapeContext) -> Value {
        let mut js = JsEvaluator::new(&json!({ "scale": 3 })).unwrap();
        let handle = js.register("test", source).unwrap();
        js.call(handle, ctx).unwrap()
    }

    #[test]
    fn test_source_forms() {
        assert_eq!(
            function_source("value * 2;"),
            "function () { return (value * 2); }"
        );
        assert!(function_source("return value;").starts_with("function () {"));
        assert_eq!(function_source("(v) => v;"), "(v) => v");
        assert_eq!(function_source("function () { return 1; }"), "function () { return 1; }");
        assert!(!is_arrow("var f = (x) => x; return f(value);"));
        assert!(!has_return("returned + 1"));
    }

    #[test]
    fn test_body_with_return() {
        let result = run("if (value > 64) { return true; } return false;", &ctx(3, 100.0));
        assert_eq!(result, json!(true));
    }

    #[test]
    fn test_bare_expression_and_globals() {
        let result = run("value * global.scale", &ctx(3, 20.0));
        assert_eq!(result.as_f64(), Some(60.0));
    }

    #[test]
    fn test_context_variables_are_visible() {
        let result = run(
            "function () { return [device, type, key, data.name, data.map[1]]; }",
            &ctx(7, 1.0),
        );
        assert_eq!(result, json!(["nanoKONTROL2", "number", 7, "fader", 10]));
    }

    #[test]
    fn test_undefined_is_null() {
        assert_eq!(run("function () {}", &ctx(0, 0.0)), Value::Null);
        assert_eq!(run("return;", &ctx(0, 0.0)), Value::Null);
    }

    #[test]
    fn test_pairs_and_objects_come_back_as_json() {
        let result = run("return [[5, value * 4]];", &ctx(3, 20.0));
        assert_eq!(result[0][0], json!(5));
        assert_eq!(result[0][1].as_f64(), Some(80.0));

        let result = run(
            "return { pads: [[36, 127]], pads_FEEDBACKLEDS: [[36, 1]] };",
            &ctx(3, 20.0),
        );
        assert_eq!(result["pads_FEEDBACKLEDS"], json!([[36, 1]]));
    }

    #[test]
    fn test_object_properties_keep_script_order() {
        let result = run("return { synth: [[60, 1]], fx: [[1, 2]], bass: [[2, 3]] };", &ctx(0, 0.0));
        let names: Vec<&str> = result.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["synth", "fx", "bass"]);
    }

    #[test]
    fn test_shapes_keep_their_own_handles() {
        let mut js = JsEvaluator::new(&Value::Null).unwrap();
        let double = js.register("double", "value * 2").unwrap();
        let negate = js.register("negate", "(v) => -value").unwrap();

        assert_eq!(js.call(double, &ctx(0, 4.0)).unwrap().as_f64(), Some(8.0));
        assert_eq!(js.call(negate, &ctx(0, 4.0)).unwrap().as_f64(), Some(-4.0));
    }

    #[test]
    fn test_errors() {
        let mut js = JsEvaluator::new(&Value::Null).unwrap();
        assert!(matches!(
            js.register("broken", "return (;"),
            Err(ScriptError::Compile { .. })
        ));

        let throws = js.register("throws", "return missing.field;").unwrap();
        assert!(matches!(js.call(throws, &ctx(0, 0.0)), Err(ScriptError::Call(_))));

        assert!(matches!(
            js.call(ShapeHandle::new(99), &ctx(0, 0.0)),
            Err(ScriptError::UnknownHandle(99))
        ));
    }
}
