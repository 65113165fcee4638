//! Prompt rendering with MiniJinja

use crate::error::Result;
use minijinja::Environment;

/// Render `template` with `vars`
///
/// Besides the built-in filters, `pct` formats a number as a percentage with
/// one decimal and `num` rounds to two decimals; both print `n/a` for null.
pub fn render(template: &str, vars: &serde_json::Value) -> Result<String> {
    let mut env = Environment::new();

    env.add_filter("pct", |v: Option<f64>| match v {
        Some(v) => format!("{v:.1}%"),
        None => "n/a".to_string(),
    });
    env.add_filter("num", |v: Option<f64>| match v {
        Some(v) => format!("{v:.2}"),
        None => "n/a".to_string(),
    });

    let value = minijinja::Value::from_serialize(vars);
    Ok(env.render_str(template, value)?)
}
