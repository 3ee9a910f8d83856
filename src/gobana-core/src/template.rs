//! Text templates for query bodies
//!
//! Query files use `{{.key}}` actions to pull in values passed with
//! `--data key=value`. Supported syntax:
//! - `{{.key}}` field lookup, `{{.}}` the current value
//! - `{{if ..}} .. {{else if ..}} .. {{else}} .. {{end}}`
//! - `{{with ..}} .. {{else}} .. {{end}}` (rebinds `.`)
//! - `{{/* comments */}}` and `{{- ` / ` -}}` whitespace trimming
//! - string literals (`"..."` or raw backquotes), `true` / `false`
//! - functions `not`, `eq`, `ne`, `and`, `or`, `len`, `default`
//!
//! Keys missing from the data render as an empty string.

use std::collections::HashMap;

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, tag, take_until, take_while1},
    character::complete::{char, multispace0, multispace1, none_of},
    combinator::{all_consuming, map, opt, value, verify},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};

use crate::error::{GobanaError, Result};

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Dot,
    Field(String),
    Literal(String),
    Bool(bool),
    Sub(Box<Command>),
}

#[derive(Debug, Clone, PartialEq)]
struct Command {
    func: Option<String>,
    args: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Print(Command),
    If(Command),
    ElseIf(Command),
    With(Command),
    Else,
    End,
}

enum Segment {
    Text(String),
    Action(Action),
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Print(Command),
    If {
        branches: Vec<(Command, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    With {
        pipe: Command,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

/// Parse an identifier (alphanumeric + _)
fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// Parse a double-quoted or raw string literal
fn string_literal(input: &str) -> IResult<&str, String> {
    alt((
        delimited(
            char('"'),
            map(
                opt(escaped_transform(
                    none_of("\\\""),
                    '\\',
                    alt((
                        value("\\", char('\\')),
                        value("\"", char('"')),
                        value("\n", char('n')),
                        value("\t", char('t')),
                    )),
                )),
                Option::unwrap_or_default,
            ),
            char('"'),
        ),
        map(
            delimited(char('`'), take_until("`"), char('`')),
            |s: &str| s.to_string(),
        ),
    ))(input)
}

fn operand(input: &str) -> IResult<&str, Operand> {
    alt((
        map(preceded(char('.'), identifier), |name: &str| {
            Operand::Field(name.to_string())
        }),
        map(char('.'), |_| Operand::Dot),
        map(string_literal, Operand::Literal),
        map(
            verify(identifier, |s: &str| s == "true" || s == "false"),
            |s: &str| Operand::Bool(s == "true"),
        ),
        map(
            delimited(
                terminated(char('('), multispace0),
                command,
                preceded(multispace0, char(')')),
            ),
            |c| Operand::Sub(Box::new(c)),
        ),
    ))(input)
}

fn command(input: &str) -> IResult<&str, Command> {
    alt((
        map(operand, |op| Command {
            func: None,
            args: vec![op],
        }),
        map(
            pair(identifier, many0(preceded(multispace1, operand))),
            |(func, args)| Command {
                func: Some(func.to_string()),
                args,
            },
        ),
    ))(input)
}

fn action(input: &str) -> IResult<&str, Action> {
    all_consuming(delimited(
        multispace0,
        alt((
            map(
                preceded(
                    pair(tag("else"), preceded(multispace1, tag("if"))),
                    preceded(multispace1, command),
                ),
                Action::ElseIf,
            ),
            map(preceded(tag("if"), preceded(multispace1, command)), Action::If),
            map(
                preceded(tag("with"), preceded(multispace1, command)),
                Action::With,
            ),
            value(Action::Else, tag("else")),
            value(Action::End, tag("end")),
            map(command, Action::Print),
        )),
        multispace0,
    ))(input)
}

/// Find the `}}` closing an action, skipping over string literals
fn find_close(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if q == b'"' && b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'`' {
                    quote = Some(b);
                } else if b == b'}' && bytes.get(i + 1) == Some(&b'}') {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}

/// Known functions; `Some(false)` when `argc` does not fit
fn accepts(name: &str, argc: usize) -> Option<bool> {
    let fits = match name {
        "not" | "len" => argc == 1,
        "ne" | "default" => argc == 2,
        "eq" => argc >= 2,
        "and" | "or" => argc >= 1,
        _ => return None,
    };
    Some(fits)
}

/// Reject unknown functions and bad argument counts before anything runs
fn check(cmd: &Command) -> Result<()> {
    if let Some(name) = &cmd.func {
        match accepts(name, cmd.args.len()) {
            None => {
                return Err(GobanaError::TemplateRender(format!(
                    "function {} not defined",
                    name
                )))
            }
            Some(false) => {
                return Err(GobanaError::TemplateRender(format!(
                    "wrong number of args for {}: got {}",
                    name,
                    cmd.args.len()
                )))
            }
            Some(true) => {}
        }
    }
    for arg in &cmd.args {
        if let Operand::Sub(sub) = arg {
            check(sub)?;
        }
    }
    Ok(())
}

fn segments(source: &str) -> Result<Vec<Segment>> {
    let mut out = Vec::new();
    let mut rest = source;
    let mut trim_next = false;

    while let Some(start) = rest.find("{{") {
        let mut text = &rest[..start];
        if trim_next {
            text = text.trim_start();
        }

        let after = &rest[start + 2..];
        let body_start = match after.strip_prefix('-') {
            Some(r) if r.starts_with(char::is_whitespace) => {
                text = text.trim_end();
                r
            }
            _ => after,
        };
        if !text.is_empty() {
            out.push(Segment::Text(text.to_string()));
        }

        let offset = source.len() - rest.len() + start;
        let unclosed = || {
            GobanaError::TemplateRender(format!("unclosed action starting at byte {}", offset))
        };

        // Comments may hold quotes, so they end at the first `*/`
        if let Some(comment) = body_start.trim_start().strip_prefix("/*") {
            let end = comment.find("*/").ok_or_else(unclosed)?;
            let tail = &comment[end + 2..];
            let close = tail.trim_start();
            if let Some(r) = close.strip_prefix("}}") {
                rest = r;
                trim_next = false;
            } else if let Some(r) = close.strip_prefix("-}}") {
                if close.len() == tail.len() {
                    return Err(GobanaError::TemplateRender(format!(
                        "comment at byte {} ends with '-' but no space",
                        offset
                    )));
                }
                rest = r;
                trim_next = true;
            } else {
                return Err(GobanaError::TemplateRender(format!(
                    "comment at byte {} not followed by '}}}}'",
                    offset
                )));
            }
            continue;
        }

        let end = find_close(body_start).ok_or_else(unclosed)?;
        let mut body = &body_start[..end];
        rest = &body_start[end + 2..];

        trim_next = false;
        if let Some(b) = body.strip_suffix('-') {
            if b.ends_with(char::is_whitespace) {
                body = b;
                trim_next = true;
            }
        }

        let (_, parsed) = action(body).map_err(|_| {
            GobanaError::TemplateRender(format!("bad action '{{{{{}}}}}'", body.trim()))
        })?;
        match &parsed {
            Action::Print(cmd) | Action::If(cmd) | Action::ElseIf(cmd) | Action::With(cmd) => {
                check(cmd)?
            }
            Action::Else | Action::End => {}
        }
        out.push(Segment::Action(parsed));
    }

    let text = if trim_next { rest.trim_start() } else { rest };
    if !text.is_empty() {
        out.push(Segment::Text(text.to_string()));
    }

    Ok(out)
}

fn describe(action: &Option<Action>) -> &'static str {
    match action {
        Some(Action::ElseIf(_)) => "{{else if}}",
        Some(Action::Else) => "{{else}}",
        Some(Action::End) => "{{end}}",
        Some(_) => "action",
        None => "end of template",
    }
}

/// Collect nodes until a block terminator (`else`, `else if`, `end`) or EOF
fn parse_block<I>(iter: &mut I) -> Result<(Vec<Node>, Option<Action>)>
where
    I: Iterator<Item = Segment>,
{
    let mut nodes = Vec::new();
    while let Some(segment) = iter.next() {
        match segment {
            Segment::Text(t) => nodes.push(Node::Text(t)),
            Segment::Action(Action::Print(c)) => nodes.push(Node::Print(c)),
            Segment::Action(Action::If(cond)) => nodes.push(parse_if(cond, iter)?),
            Segment::Action(Action::With(pipe)) => nodes.push(parse_with(pipe, iter)?),
            Segment::Action(terminator) => return Ok((nodes, Some(terminator))),
        }
    }
    Ok((nodes, None))
}

fn parse_if<I>(first: Command, iter: &mut I) -> Result<Node>
where
    I: Iterator<Item = Segment>,
{
    let mut branches = Vec::new();
    let mut cond = first;
    loop {
        let (body, term) = parse_block(iter)?;
        branches.push((cond, body));
        match term {
            Some(Action::ElseIf(next)) => cond = next,
            Some(Action::Else) => {
                let (otherwise, term) = parse_block(iter)?;
                return match term {
                    Some(Action::End) => Ok(Node::If {
                        branches,
                        otherwise,
                    }),
                    other => Err(GobanaError::TemplateRender(format!(
                        "unexpected {} in {{{{if}}}}",
                        describe(&other)
                    ))),
                };
            }
            Some(Action::End) => {
                return Ok(Node::If {
                    branches,
                    otherwise: Vec::new(),
                })
            }
            other => {
                return Err(GobanaError::TemplateRender(format!(
                    "unexpected {} in {{{{if}}}}",
                    describe(&other)
                )))
            }
        }
    }
}

fn parse_with<I>(pipe: Command, iter: &mut I) -> Result<Node>
where
    I: Iterator<Item = Segment>,
{
    let (body, term) = parse_block(iter)?;
    let otherwise = match term {
        Some(Action::End) => Vec::new(),
        Some(Action::Else) => match parse_block(iter)? {
            (otherwise, Some(Action::End)) => otherwise,
            (_, other) => {
                return Err(GobanaError::TemplateRender(format!(
                    "unexpected {} in {{{{with}}}}",
                    describe(&other)
                )))
            }
        },
        other => {
            return Err(GobanaError::TemplateRender(format!(
                "unexpected {} in {{{{with}}}}",
                describe(&other)
            )))
        }
    };
    Ok(Node::With {
        pipe,
        body,
        otherwise,
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Missing,
    Str(String),
    Bool(bool),
    Int(usize),
}

impl Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Missing => false,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
        }
    }

    fn render(&self) -> String {
        match self {
            Value::Missing => String::new(),
            Value::Str(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
        }
    }
}

enum Scope<'a> {
    Root(&'a HashMap<String, String>),
    Value(Value),
}

impl Scope<'_> {
    fn dot(&self) -> Value {
        match self {
            Scope::Root(data) if data.is_empty() => Value::Missing,
            Scope::Root(data) => {
                let mut keys: Vec<&String> = data.keys().collect();
                keys.sort();
                let pairs: Vec<String> = keys
                    .into_iter()
                    .map(|k| format!("{}:{}", k, data[k]))
                    .collect();
                Value::Str(format!("map[{}]", pairs.join(" ")))
            }
            Scope::Value(v) => v.clone(),
        }
    }

    fn field(&self, name: &str) -> Result<Value> {
        match self {
            Scope::Root(data) => Ok(data
                .get(name)
                .map(|v| Value::Str(v.clone()))
                .unwrap_or(Value::Missing)),
            Scope::Value(_) => Err(GobanaError::TemplateRender(format!(
                "can't evaluate field {} in type string",
                name
            ))),
        }
    }
}

fn call(name: &str, args: Vec<Value>) -> Result<Value> {
    let result = match (name, args.as_slice()) {
        ("not", [a]) => Value::Bool(!a.is_truthy()),
        ("eq", [a, rest @ ..]) if !rest.is_empty() => {
            Value::Bool(rest.iter().any(|b| a.render() == b.render()))
        }
        ("ne", [a, b]) => Value::Bool(a.render() != b.render()),
        ("and", [.., last]) => args
            .iter()
            .find(|v| !v.is_truthy())
            .unwrap_or(last)
            .clone(),
        ("or", [.., last]) => args
            .iter()
            .find(|v| v.is_truthy())
            .unwrap_or(last)
            .clone(),
        ("len", [a]) => Value::Int(a.render().chars().count()),
        ("default", [fallback, a]) => {
            if a.is_truthy() {
                a.clone()
            } else {
                fallback.clone()
            }
        }
        _ => {
            return Err(GobanaError::TemplateRender(format!(
                "function {} not defined for {} argument(s)",
                name,
                args.len()
            )))
        }
    };
    Ok(result)
}

fn eval_operand(op: &Operand, scope: &Scope) -> Result<Value> {
    match op {
        Operand::Dot => Ok(scope.dot()),
        Operand::Field(name) => scope.field(name),
        Operand::Literal(s) => Ok(Value::Str(s.clone())),
        Operand::Bool(b) => Ok(Value::Bool(*b)),
        Operand::Sub(c) => eval(c, scope),
    }
}

fn eval(cmd: &Command, scope: &Scope) -> Result<Value> {
    let args = cmd
        .args
        .iter()
        .map(|op| eval_operand(op, scope))
        .collect::<Result<Vec<_>>>()?;
    match &cmd.func {
        Some(name) => call(name, args),
        None => Ok(args.into_iter().next().unwrap_or(Value::Missing)),
    }
}

fn exec(nodes: &[Node], scope: &Scope, out: &mut String) -> Result<()> {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Print(c) => out.push_str(&eval(c, scope)?.render()),
            Node::If {
                branches,
                otherwise,
            } => {
                let mut taken = false;
                for (cond, body) in branches {
                    if eval(cond, scope)?.is_truthy() {
                        exec(body, scope, out)?;
                        taken = true;
                        break;
                    }
                }
                if !taken {
                    exec(otherwise, scope, out)?;
                }
            }
            Node::With {
                pipe,
                body,
                otherwise,
            } => {
                let v = eval(pipe, scope)?;
                if v.is_truthy() {
                    exec(body, &Scope::Value(v), out)?;
                } else {
                    exec(otherwise, scope, out)?;
                }
            }
        }
    }
    Ok(())
}

/// A parsed query template
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let mut iter = segments(source)?.into_iter();
        let (nodes, term) = parse_block(&mut iter)?;
        if term.is_some() {
            return Err(GobanaError::TemplateRender(format!(
                "unexpected {}",
                describe(&term)
            )));
        }
        Ok(Self { nodes })
    }

    pub fn render(&self, data: &HashMap<String, String>) -> Result<String> {
        let mut out = String::new();
        exec(&self.nodes, &Scope::Root(data), &mut out)?;
        Ok(out)
    }
}

/// Parse and render `source` against `data` in one step
pub fn render(source: &str, data: &HashMap<String, String>) -> Result<String> {
    Template::parse(source)?.render(data)
}
