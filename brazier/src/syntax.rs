//! The declaration grammar and usage rendering.
//!
//! Declarations describe a command shape in text: bare words are literals
//! (`|` separates aliases), `<name>` is a required variable, `[name]` an
//! optional one. A `:parser` suffix inside the brackets picks a named parser
//! explicitly. `[optional] <required>` is rejected outright.

use crate::component::{CommandComponent, ComponentKind};
use crate::error::RegistrationError;

/// One parsed piece of a declaration string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxFragment {
    /// A fixed word with optional aliases.
    Literal {
        /// Primary spelling.
        name: String,
        /// Alternative spellings.
        aliases: Vec<String>,
    },
    /// `<name>` or `<name:parser>`.
    Required {
        /// Component name.
        name: String,
        /// Named parser override.
        parser: Option<String>,
    },
    /// `[name]` or `[name:parser]`.
    Optional {
        /// Component name.
        name: String,
        /// Named parser override.
        parser: Option<String>,
    },
}

fn split_parser(body: &str) -> (String, Option<String>) {
    match body.split_once(':') {
        Some((name, parser)) => (name.to_string(), Some(parser.to_string())),
        None => (body.to_string(), None),
    }
}

/// Parses a declaration string into fragments, enforcing the
/// required-before-optional ordering.
pub fn parse_declaration(declaration: &str) -> Result<Vec<SyntaxFragment>, RegistrationError> {
    let mut fragments = Vec::new();
    let mut seen_optional = false;

    for token in declaration.split_whitespace() {
        let fragment = if let Some(body) = token.strip_prefix('<') {
            let Some(body) = body.strip_suffix('>') else {
                return Err(RegistrationError::invalid(format!(
                    "malformed required component '{token}'"
                )));
            };
            let (name, parser) = split_parser(body);
            SyntaxFragment::Required { name, parser }
        } else if let Some(body) = token.strip_prefix('[') {
            let Some(body) = body.strip_suffix(']') else {
                return Err(RegistrationError::invalid(format!(
                    "malformed optional component '{token}'"
                )));
            };
            let (name, parser) = split_parser(body);
            SyntaxFragment::Optional { name, parser }
        } else {
            let mut spellings = token.split('|').map(str::to_string);
            let name = spellings.next().unwrap_or_default();
            SyntaxFragment::Literal {
                name,
                aliases: spellings.collect(),
            }
        };

        let name = match &fragment {
            SyntaxFragment::Literal { name, .. }
            | SyntaxFragment::Required { name, .. }
            | SyntaxFragment::Optional { name, .. } => name,
        };
        if name.is_empty() {
            return Err(RegistrationError::invalid(format!(
                "empty component name in '{token}'"
            )));
        }

        match &fragment {
            SyntaxFragment::Optional { .. } => seen_optional = true,
            _ if seen_optional => {
                return Err(RegistrationError::invalid(format!(
                    "required component '{token}' follows an optional component"
                )));
            }
            _ => {}
        }
        fragments.push(fragment);
    }

    Ok(fragments)
}

/// Renders one component the way a declaration would spell it.
pub(crate) fn format_component<S>(component: &CommandComponent<S>) -> String {
    match component.kind() {
        ComponentKind::Literal { .. } => component
            .alias_set()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("|"),
        ComponentKind::Required => format!("<{}>", component.name()),
        ComponentKind::Optional { .. } => format!("[{}]", component.name()),
        ComponentKind::Flag { names } => names
            .iter()
            .map(|name| format!("[--{name}]"))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Renders a whole component sequence.
pub(crate) fn format_components<'a, S: 'a>(
    components: impl IntoIterator<Item = &'a CommandComponent<S>>,
) -> String {
    components
        .into_iter()
        .map(format_component)
        .collect::<Vec<_>>()
        .join(" ")
}
