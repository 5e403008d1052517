//! Prebuilt POML templates
//!
//! Templates are parameterized with `{{ variable }}` placeholders. Filling
//! them in is left to the caller, through the same substitution the renderer
//! uses.

use crate::{Error, Result};

/// Template used when a host supplies no selection
pub const DEFAULT_TEMPLATE: &str = "Analysis";

const TEMPLATES: &[(&str, &str)] = &[
    (
        "Analysis",
        r"<poml>
<role>You are an experienced analyst specializing in {{ analysis_type }}.</role>
<task>Analyze the provided {{ data_type }} and provide comprehensive insights.</task>
<example>
  <input>Sales data showing quarterly trends</input>
  <output>Key findings: Growth of 15% in Q3, seasonal patterns observed, recommendations for Q4 strategy.</output>
</example>
<output-format>Structure your analysis with: Summary, Key Findings, Insights, Recommendations.</output-format>
</poml>",
    ),
    (
        "Creative Writing",
        r#"<poml>
<role>You are a creative writer with expertise in {{ genre }}.</role>
<task>Create {{ content_type }} based on the theme: {{ theme }}.</task>
<output-format style="tone: {{ tone }}; length: {{ length }}">
Write in an engaging {{ style }} style suitable for {{ audience }}.
</output-format>
</poml>"#,
    ),
    (
        "Technical Documentation",
        r"<poml>
<role>You are a technical writer specializing in {{ domain }}.</role>
<task>Create clear documentation for {{ subject }}.</task>
<output-format>
Use structured format with:
- Overview
- Key concepts
- Step-by-step instructions
- Examples
- Troubleshooting tips
</output-format>
</poml>",
    ),
    (
        "Customer Support",
        r#"<poml>
<role>You are a {{ company }} customer support specialist.</role>
<task>Help the customer with their {{ issue_type }} inquiry.</task>
<example>
  <input>How do I reset my password?</input>
  <output>I'll help you reset your password. Here are the steps: 1) Go to login page, 2) Click "Forgot Password", 3) Enter your email...</output>
</example>
<output-format style="tone: helpful; format: step-by-step">
Provide clear, actionable guidance with empathy.
</output-format>
</poml>"#,
    ),
    (
        "Data Analysis",
        r#"<poml>
<role>You are a data scientist with expertise in {{ field }}.</role>
<task>Analyze the dataset and identify {{ analysis_focus }}.</task>
<table title="{{ dataset_name }}">
{{ table_data }}
</table>
<output-format style="format: executive-summary">
Present findings with statistical significance, trends, and actionable recommendations.
</output-format>
</poml>"#,
    ),
];

/// Look up a template by name
///
/// # Errors
///
/// Returns `Error::NotFound` for unknown names
pub fn get_template(name: &str) -> Result<&'static str> {
    TEMPLATES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, body)| *body)
        .ok_or_else(|| Error::NotFound(format!("template '{name}'")))
}

/// Template names in display order
#[must_use]
pub fn names() -> Vec<&'static str> {
    TEMPLATES.iter().map(|(n, _)| *n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poml::{check_root, parse};

    #[test]
    fn every_template_is_well_formed() {
        for name in names() {
            let body = get_template(name).unwrap();
            check_root(body).unwrap();
            let root = parse(body).unwrap();
            assert!(root.find("role").is_some(), "{name} has no role");
            assert!(root.find("task").is_some(), "{name} has no task");
        }
    }

    #[test]
    fn unknown_template_is_not_found() {
        assert!(matches!(get_template("Limerick"), Err(Error::NotFound(_))));
    }

    #[test]
    fn default_template_exists() {
        assert!(names().contains(&DEFAULT_TEMPLATE));
        assert_eq!(names().len(), 5);
    }
}
