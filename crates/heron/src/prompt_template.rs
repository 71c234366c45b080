use serde::Serialize;
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use tera::{Context, Error as TeraError, Tera};

/// Templates compiled into the binary, addressed by file name
const BUNDLED_PROMPTS: [(&str, &str); 5] = [
    ("system.md", include_str!("prompts/system.md")),
    ("sql_generation.md", include_str!("prompts/sql_generation.md")),
    ("data_analysis.md", include_str!("prompts/data_analysis.md")),
    ("chart_configuration.md", include_str!("prompts/chart_configuration.md")),
    ("create_chart.md", include_str!("prompts/create_chart.md")),
];

fn bundled_prompt(name: &Path) -> Option<&'static str> {
    let name = name.to_str()?;
    BUNDLED_PROMPTS
        .iter()
        .find(|(bundled, _)| *bundled == name)
        .map(|(_, body)| *body)
}

/// Render an inline template. Every variable it uses must be present in `context_data`.
pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    tera.render("inline_template", &context)
}

/// Render a template file. A file on disk at `template_file` takes precedence;
/// otherwise the name is looked up among the bundled prompts.
pub fn load_prompt_file<T: Serialize>(
    template_file: impl AsRef<Path>,
    context_data: &T,
) -> Result<String, TeraError> {
    let path = template_file.as_ref();
    let template: Cow<'static, str> = if path.is_file() {
        let content = fs::read_to_string(path).map_err(|e| {
            TeraError::chain(format!("Failed to read template file {}", path.display()), e)
        })?;
        Cow::Owned(content)
    } else {
        let body = bundled_prompt(path)
            .ok_or_else(|| TeraError::msg(format!("Unknown prompt template {}", path.display())))?;
        Cow::Borrowed(body)
    };
    load_prompt(&template, context_data)
}
