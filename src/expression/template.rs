use regex::Regex;
use serde_json::Value;

use super::error::{ExpressionError, ExpressionResult};
use super::value::stringify;

/// Default marker tag, as in `{{spel: #payload['id']}}`.
pub const DEFAULT_TAG: &str = "spel";

/// Finds `{{tag: expr}}` markers and substitutes their evaluated values.
#[derive(Debug, Clone)]
pub struct Template {
    tag: String,
    marker: Regex,
}

impl Template {
    pub fn new(tag: &str) -> ExpressionResult<Self> {
        let pattern = format!(r"\{{\{{{}:\s*(.*?)\s*\}}\}}", regex::escape(tag));
        let marker = Regex::new(&pattern).map_err(|e| ExpressionError::InvalidRegex {
            pattern,
            message: e.to_string(),
        })?;

        Ok(Template {
            tag: tag.to_string(),
            marker,
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Replace every marker in `text` with the stringified result of `eval`.
    ///
    /// Substituted text is inserted verbatim and never scanned again.
    pub fn render<F>(&self, text: &str, mut eval: F) -> ExpressionResult<String>
    where
        F: FnMut(&str) -> ExpressionResult<Value>,
    {
        let mut rendered = String::with_capacity(text.len());
        let mut last = 0;

        for caps in self.marker.captures_iter(text) {
            let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            rendered.push_str(&text[last..whole.start()]);
            rendered.push_str(&stringify(&eval(body.as_str())?));
            last = whole.end();
        }

        rendered.push_str(&text[last..]);
        Ok(rendered)
    }
}
