//! Template filling. Plain `{{ key }}` / `{{key}}` substitution, no
//! expressions and no escaping.

use std::collections::BTreeMap;
use std::path::Path;

pub type TemplateFields = BTreeMap<String, String>;

/// Subject when the template has no `<title>`.
pub const DEFAULT_SUBJECT: &str = "Relatório de Ambiente";
/// Used when the template file cannot be read.
pub const FALLBACK_SUBJECT: &str = "Relatório Agendado";
pub const FALLBACK_BODY: &str = "<p>Relatório em anexo.</p>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composed {
    pub subject: String,
    pub body: String,
}

pub fn compose(template: &str, fields: &TemplateFields) -> Composed {
    let mut body = template.to_string();
    for (key, value) in fields {
        body = body.replace(&format!("{{{{ {key} }}}}"), value);
        body = body.replace(&format!("{{{{{key}}}}}"), value);
    }
    let subject = extract_title(&body).unwrap_or_else(|| DEFAULT_SUBJECT.to_string());
    Composed { subject, body }
}

/// Load the template from disk and fill it. A missing or unreadable file
/// degrades to a minimal message.
pub fn compose_from_file(path: &Path, fields: &TemplateFields) -> Composed {
    match std::fs::read_to_string(path) {
        Ok(template) => compose(&template, fields),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "email template unreadable, using fallback");
            Composed {
                subject: FALLBACK_SUBJECT.to_string(),
                body: FALLBACK_BODY.to_string(),
            }
        }
    }
}

fn extract_title(html: &str) -> Option<String> {
    let start = html.find("<title>")? + "<title>".len();
    let len = html[start..].find("</title>")?;
    Some(html[start..start + len].trim())
        .filter(|t| !t.is_empty())
        .map(String::from)
}
