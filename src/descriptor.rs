//! Ways to identify a target element on a surface.
//!
//! A [`Descriptor`] is one alternative way to find an element; callers
//! hand the resolver an ordered slice of them (lower index = higher
//! priority) so the engine can tolerate markup drift between sessions.

/// Represents ways to locate an element on a surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Descriptor {
    /// Select by ARIA role and optional accessible name
    Role { role: String, name: Option<String> },
    /// Select by a CSS selector
    Css(String),
    /// Select by visible text content
    Text(String),
    /// Select by an attribute whose value contains the given pattern
    Attr { name: String, pattern: String },
    /// Select an input by its placeholder text
    Placeholder(String),
    /// Represents an invalid descriptor string, with a reason.
    Invalid(String),
}

impl Descriptor {
    /// Role + exact accessible name, the most drift-resistant form.
    pub fn role(role: &str, name: &str) -> Self {
        Descriptor::Role {
            role: role.to_string(),
            name: Some(name.to_string()),
        }
    }

    /// Role with no name constraint.
    pub fn any_role(role: &str) -> Self {
        Descriptor::Role {
            role: role.to_string(),
            name: None,
        }
    }

    pub fn css(selector: &str) -> Self {
        Descriptor::Css(selector.to_string())
    }

    pub fn attr(name: &str, pattern: &str) -> Self {
        Descriptor::Attr {
            name: name.to_string(),
            pattern: pattern.to_string(),
        }
    }
}

impl std::fmt::Display for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl From<&str> for Descriptor {
    fn from(s: &str) -> Self {
        // role:button|name:Join  (preferred precise format)
        if let Some(rest) = s.strip_prefix("role:") {
            if rest.contains('|') {
                let parts: Vec<&str> = rest.splitn(2, '|').collect();
                let role = parts[0].trim().to_string();
                let name = parts[1].trim().strip_prefix("name:").unwrap_or(parts[1]);
                return Descriptor::Role {
                    role,
                    name: Some(name.trim().to_string()),
                };
            }
            return Descriptor::Role {
                role: rest.trim().to_string(),
                name: None,
            };
        }

        match s {
            _ if s.starts_with("css:") => Descriptor::Css(s[4..].trim().to_string()),
            _ if s.starts_with("text:") => Descriptor::Text(s[5..].to_string()),
            _ if s.to_lowercase().starts_with("placeholder:") => {
                Descriptor::Placeholder(s["placeholder:".len()..].to_string())
            }
            _ if s.starts_with("attr:") => {
                // attr:aria-label~leave
                let rest = &s[5..];
                match rest.split_once('~') {
                    Some((name, pattern)) if !name.is_empty() => Descriptor::Attr {
                        name: name.trim().to_string(),
                        pattern: pattern.trim().to_string(),
                    },
                    _ => Descriptor::Invalid(format!(
                        "Attribute descriptor must be 'attr:<name>~<pattern>', got \"{s}\""
                    )),
                }
            }
            _ if s.starts_with('#') || s.starts_with('.') || s.starts_with('[') => {
                Descriptor::Css(s.to_string())
            }
            _ => Descriptor::Invalid(format!(
                "Unknown descriptor format: \"{s}\". Use prefixes like 'role:', 'css:', 'text:', 'attr:', or 'placeholder:'."
            )),
        }
    }
}
