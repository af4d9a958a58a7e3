//! Expect message templates.
//!
//! A template is literal text with `{ expr }` placeholders. Each placeholder
//! is replaced by the string value of its expression; a placeholder whose
//! expression fails to evaluate is left as written.

use crate::model::PathExpression;
use crate::path::EvaluationError;

/// Render `template`, evaluating placeholders with `eval`.
pub fn render_template<F>(template: &str, mut eval: F) -> String
where
    F: FnMut(&PathExpression) -> Result<String, EvaluationError>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            // Unterminated placeholder is literal text.
            out.push_str(&rest[open..]);
            return out;
        };

        let placeholder = &rest[open..open + close + 2];
        let expr = after[..close].trim();
        if expr.is_empty() {
            out.push_str(placeholder);
        } else {
            match eval(&PathExpression::new(expr)) {
                Ok(value) => out.push_str(&value),
                Err(_) => out.push_str(placeholder),
            }
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}
