//! Minimal mustache-compatible renderer over JSON contexts.
//!
//! Supported syntax: `{{name}}` (HTML-escaped), `{{{name}}}` (raw),
//! dotted lookups, `{{#name}}…{{/name}}` truthy sections, and
//! `{{^name}}…{{/name}}` inverted sections. Sections render their body
//! once against the same context. Undefined variables render empty.

use serde_json::Value;

use conductor_core::error::ConductorError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    Variable { path: String, raw: bool },
    SectionOpen { path: String, inverted: bool },
    SectionClose { path: String },
}

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Variable { path: String, raw: bool },
    Section {
        path: String,
        inverted: bool,
        body: Vec<Node>,
    },
}

/// Render `template` against `context`. Pure: identical inputs always
/// produce identical output.
pub fn render(template: &str, context: &Value) -> Result<String, ConductorError> {
    let tokens = tokenize(template)?;
    let (nodes, rest) = parse(&tokens, 0, None)?;
    debug_assert_eq!(rest, tokens.len());
    let mut out = String::with_capacity(template.len());
    render_nodes(&nodes, context, &mut out);
    Ok(out)
}

fn tokenize(template: &str) -> Result<Vec<Token>, ConductorError> {
    let mut tokens = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        if open > 0 {
            tokens.push(Token::Text(rest[..open].to_string()));
        }
        rest = &rest[open..];

        let (token, consumed) = if rest.starts_with("{{{") {
            let end = rest.find("}}}").ok_or_else(|| unclosed(rest))?;
            let path = rest[3..end].trim().to_string();
            (Token::Variable { path, raw: true }, end + 3)
        } else {
            let end = rest.find("}}").ok_or_else(|| unclosed(rest))?;
            let inner = rest[2..end].trim();
            let token = match inner.chars().next() {
                Some('#') => Token::SectionOpen {
                    path: inner[1..].trim().to_string(),
                    inverted: false,
                },
                Some('^') => Token::SectionOpen {
                    path: inner[1..].trim().to_string(),
                    inverted: true,
                },
                Some('/') => Token::SectionClose {
                    path: inner[1..].trim().to_string(),
                },
                _ => Token::Variable {
                    path: inner.to_string(),
                    raw: false,
                },
            };
            (token, end + 2)
        };

        tokens.push(token);
        rest = &rest[consumed..];
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_string()));
    }
    Ok(tokens)
}

fn unclosed(at: &str) -> ConductorError {
    let preview: String = at.chars().take(30).collect();
    ConductorError::Template {
        reason: format!("unclosed tag near '{preview}'"),
    }
}

/// Recursive-descent assembly of the token stream into a node tree.
fn parse(
    tokens: &[Token],
    mut index: usize,
    open_section: Option<&str>,
) -> Result<(Vec<Node>, usize), ConductorError> {
    let mut nodes = Vec::new();

    while index < tokens.len() {
        match &tokens[index] {
            Token::Text(text) => {
                nodes.push(Node::Text(text.clone()));
                index += 1;
            }
            Token::Variable { path, raw } => {
                nodes.push(Node::Variable {
                    path: path.clone(),
                    raw: *raw,
                });
                index += 1;
            }
            Token::SectionOpen { path, inverted } => {
                let (body, next) = parse(tokens, index + 1, Some(path))?;
                nodes.push(Node::Section {
                    path: path.clone(),
                    inverted: *inverted,
                    body,
                });
                index = next;
            }
            Token::SectionClose { path } => {
                return match open_section {
                    Some(open) if open == path => Ok((nodes, index + 1)),
                    Some(open) => Err(ConductorError::Template {
                        reason: format!("section '{open}' closed by '{path}'"),
                    }),
                    None => Err(ConductorError::Template {
                        reason: format!("unexpected closing tag '{path}'"),
                    }),
                };
            }
        }
    }

    match open_section {
        Some(open) => Err(ConductorError::Template {
            reason: format!("unclosed section '{open}'"),
        }),
        None => Ok((nodes, index)),
    }
}

fn render_nodes(nodes: &[Node], context: &Value, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable { path, raw } => {
                let text = stringify(lookup(context, path));
                if *raw {
                    out.push_str(&text);
                } else {
                    out.push_str(&escape_html(&text));
                }
            }
            Node::Section {
                path,
                inverted,
                body,
            } => {
                let present = truthy(lookup(context, path));
                if present != *inverted {
                    render_nodes(body, context, out);
                }
            }
        }
    }
}

/// Dotted lookup into the context. Missing segments yield `None`.
fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = context;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
