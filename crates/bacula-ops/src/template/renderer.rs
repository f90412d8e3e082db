use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{TemplateError, EMBEDDED_TEMPLATES};

/// Renders named templates against a JSON variable tree.
///
/// Every lookup is strict: a referenced variable that is missing from the
/// variable tree fails the render instead of producing empty text.
pub struct TemplateRenderer {
    templates: HashMap<String, Template>,
}

struct Template {
    nodes: Vec<Node>,
}

#[derive(Debug)]
enum Node {
    Text(String),
    Expr(Vec<String>),
    For {
        binding: String,
        iterable: Vec<String>,
        body: Vec<Node>,
    },
    If {
        negate: bool,
        condition: Vec<String>,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

enum Token {
    Text(String),
    Expr(String),
    Block(String),
}

// Expression tags `{{ ... }}` in group 1, block tags `{% ... %}` in group 2
static RE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}|\{%(.*?)%\}").unwrap());

impl TemplateRenderer {
    /// Creates a renderer with no templates.
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Creates a renderer holding every built-in template.
    pub fn embedded() -> Result<Self, TemplateError> {
        let mut renderer = Self::new();
        for (name, source) in EMBEDDED_TEMPLATES {
            renderer.add(name, source)?;
        }
        Ok(renderer)
    }

    /// Built-in templates, with any same-named file in `dir` taking precedence.
    pub fn with_overrides(dir: &Path) -> Result<Self, TemplateError> {
        let mut renderer = Self::embedded()?;
        for (name, _) in EMBEDDED_TEMPLATES {
            let path = dir.join(name);
            if !path.exists() {
                continue;
            }
            let source =
                std::fs::read_to_string(&path).map_err(|e| TemplateError::ReadTemplate {
                    path: path.clone(),
                    source: e,
                })?;
            log::debug!("using template override {}", path.display());
            renderer.add(name, &source)?;
        }
        Ok(renderer)
    }

    /// Parses and registers a template, replacing any previous one of the same name.
    pub fn add(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        let tokens = tokenize(source);
        let mut iter = tokens.into_iter();
        let (nodes, terminator) = parse_nodes(name, &mut iter)?;
        if let Some(tag) = terminator {
            return Err(TemplateError::Syntax {
                template: name.to_string(),
                message: format!("unexpected '{{% {} %}}'", tag),
            });
        }
        self.templates.insert(name.to_string(), Template { nodes });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Renders `name` against `variables`.
    pub fn render(&self, name: &str, variables: &Value) -> Result<String, TemplateError> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))?;
        let mut out = String::new();
        let mut scope = Scope {
            template: name,
            root: variables,
            locals: Vec::new(),
        };
        render_nodes(&template.nodes, &mut scope, &mut out)?;
        Ok(out)
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits the source into text, expression and block tokens.
///
/// A block tag alone on its line swallows the whole line, so control flow
/// never leaves blank lines behind in the rendered output.
fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for caps in RE_TAG.captures_iter(source) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let mut text_end = whole.start();
        let mut next = whole.end();

        if let Some(block) = caps.get(2) {
            let line_start = source[..whole.start()].rfind('\n').map_or(0, |i| i + 1);
            let before = &source[line_start.max(cursor)..whole.start()];
            let after_end = source[whole.end()..]
                .find('\n')
                .map_or(source.len(), |i| whole.end() + i + 1);
            let after = &source[whole.end()..after_end];
            let own_line = line_start >= cursor
                && before.chars().all(|c| c == ' ' || c == '\t')
                && after.trim().is_empty();
            if own_line {
                text_end = line_start;
                next = after_end;
            }
            if text_end > cursor {
                tokens.push(Token::Text(source[cursor..text_end].to_string()));
            }
            tokens.push(Token::Block(block.as_str().trim().to_string()));
        } else if let Some(expr) = caps.get(1) {
            if text_end > cursor {
                tokens.push(Token::Text(source[cursor..text_end].to_string()));
            }
            tokens.push(Token::Expr(expr.as_str().trim().to_string()));
        }
        cursor = next;
    }

    if cursor < source.len() {
        tokens.push(Token::Text(source[cursor..].to_string()));
    }
    tokens
}

fn parse_path(template: &str, expr: &str) -> Result<Vec<String>, TemplateError> {
    let segments: Vec<String> = expr.split('.').map(|s| s.to_string()).collect();
    let valid = segments.iter().all(|s| {
        let mut chars = s.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    });
    if !valid {
        return Err(TemplateError::Syntax {
            template: template.to_string(),
            message: format!("invalid variable reference '{}'", expr),
        });
    }
    Ok(segments)
}

/// Parses until end of input or an `endfor`/`endif`/`else` tag, which is
/// returned to the caller.
fn parse_nodes(
    template: &str,
    tokens: &mut std::vec::IntoIter<Token>,
) -> Result<(Vec<Node>, Option<String>), TemplateError> {
    let mut nodes = Vec::new();

    while let Some(token) = tokens.next() {
        match token {
            Token::Text(text) => nodes.push(Node::Text(text)),
            Token::Expr(expr) => nodes.push(Node::Expr(parse_path(template, &expr)?)),
            Token::Block(block) => {
                let words: Vec<&str> = block.split_whitespace().collect();
                match words.as_slice() {
                    ["for", binding, "in", iterable] => {
                        let (body, end) = parse_nodes(template, tokens)?;
                        if end.as_deref() != Some("endfor") {
                            return Err(unterminated(template, "for"));
                        }
                        nodes.push(Node::For {
                            binding: parse_path(template, binding)?.join("."),
                            iterable: parse_path(template, iterable)?,
                            body,
                        });
                    }
                    ["if", rest @ ..] if !rest.is_empty() => {
                        let (negate, condition) = match rest {
                            ["not", path] => (true, *path),
                            [path] => (false, *path),
                            _ => {
                                return Err(TemplateError::Syntax {
                                    template: template.to_string(),
                                    message: format!("unsupported condition '{}'", block),
                                })
                            }
                        };
                        let (then, end) = parse_nodes(template, tokens)?;
                        let otherwise = match end.as_deref() {
                            Some("endif") => Vec::new(),
                            Some("else") => {
                                let (otherwise, end) = parse_nodes(template, tokens)?;
                                if end.as_deref() != Some("endif") {
                                    return Err(unterminated(template, "if"));
                                }
                                otherwise
                            }
                            _ => return Err(unterminated(template, "if")),
                        };
                        nodes.push(Node::If {
                            negate,
                            condition: parse_path(template, condition)?,
                            then,
                            otherwise,
                        });
                    }
                    ["endfor"] | ["endif"] | ["else"] => {
                        return Ok((nodes, Some(words[0].to_string())));
                    }
                    _ => {
                        return Err(TemplateError::Syntax {
                            template: template.to_string(),
                            message: format!("unknown tag '{}'", block),
                        })
                    }
                }
            }
        }
    }

    Ok((nodes, None))
}

fn unterminated(template: &str, tag: &str) -> TemplateError {
    TemplateError::Syntax {
        template: template.to_string(),
        message: format!("unterminated '{}' block", tag),
    }
}

struct Scope<'a> {
    template: &'a str,
    root: &'a Value,
    locals: Vec<(String, &'a Value)>,
}

impl<'a> Scope<'a> {
    fn lookup(&self, path: &[String]) -> Result<&'a Value, TemplateError> {
        let undefined = || TemplateError::UndefinedVariable {
            template: self.template.to_string(),
            name: path.join("."),
        };
        let (first, rest) = path.split_first().ok_or_else(undefined)?;

        let mut value = match self.locals.iter().rev().find(|(name, _)| name == first) {
            Some((_, value)) => *value,
            None => self.root.get(first).ok_or_else(undefined)?,
        };
        for segment in rest {
            value = value.get(segment).ok_or_else(undefined)?;
        }
        Ok(value)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn render_nodes<'a>(
    nodes: &'a [Node],
    scope: &mut Scope<'a>,
    out: &mut String,
) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Expr(path) => match scope.lookup(path)? {
                Value::String(s) => out.push_str(s),
                Value::Number(n) => out.push_str(&n.to_string()),
                Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
                Value::Null => {}
                Value::Array(_) | Value::Object(_) => {
                    return Err(TemplateError::NotScalar {
                        template: scope.template.to_string(),
                        name: path.join("."),
                    })
                }
            },
            Node::For {
                binding,
                iterable,
                body,
            } => {
                let items = match scope.lookup(iterable)? {
                    Value::Array(items) => items,
                    _ => {
                        return Err(TemplateError::NotIterable {
                            template: scope.template.to_string(),
                            name: iterable.join("."),
                        })
                    }
                };
                for item in items {
                    scope.locals.push((binding.clone(), item));
                    let result = render_nodes(body, scope, out);
                    scope.locals.pop();
                    result?;
                }
            }
            Node::If {
                negate,
                condition,
                then,
                otherwise,
            } => {
                let truthy = is_truthy(scope.lookup(condition)?) != *negate;
                render_nodes(if truthy { then } else { otherwise }, scope, out)?;
            }
        }
    }
    Ok(())
}
