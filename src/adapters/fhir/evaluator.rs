//! Filter expression evaluation
//!
//! Receiver filters are boolean path expressions evaluated against a decoded
//! bundle. [`PathExpressionEvaluator`] implements the subset used by routing
//! filters:
//!
//! - dotted paths from the bundle root (`Bundle.entry.resource.birthDate`),
//!   flattening arrays at every step
//! - `%resource` for the resource in focus (an observation when condition
//!   filters are evaluated) and `%bundle` for the bundle itself
//! - functions `exists()`, `empty()`, `count()`, `first()`, `not()`,
//!   `hasValue()`, `ofType(Type)`, `startsWith('x')`, `contains('x')`
//! - string, number and boolean literals
//! - comparisons `=`, `!=`, `<`, `<=`, `>`, `>=`
//! - `and` / `or` with empty-propagating three-valued logic
//!
//! An empty result counts as `false`; anything other than a single boolean
//! is not a valid condition. Expressions are parsed with `nom` combinators.

use crate::domain::{Bundle, FilterError};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{
        alpha1, alphanumeric1, anychar, char, digit1, multispace0, none_of, satisfy,
    },
    combinator::{all_consuming, map, map_opt, map_res, not, opt, recognize, value, verify},
    multi::{fold_many0, many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};
use serde_json::Value;
use std::cmp::Ordering;

/// Evaluates path expressions against a bundle
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate an expression with `%resource` bound to `resource`
    fn evaluate_in(
        &self,
        bundle: &Bundle,
        resource: &Value,
        expression: &str,
    ) -> Result<Vec<Value>, FilterError>;

    /// Evaluate an expression to a collection of values
    fn evaluate(&self, bundle: &Bundle, expression: &str) -> Result<Vec<Value>, FilterError> {
        self.evaluate_in(bundle, bundle.as_value(), expression)
    }

    /// Evaluate an expression that must produce a boolean
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidExpression`] if the expression cannot be
    /// evaluated or does not produce a single boolean
    fn evaluate_condition(&self, bundle: &Bundle, expression: &str) -> Result<bool, FilterError> {
        self.evaluate_condition_in(bundle, bundle.as_value(), expression)
    }

    /// [`evaluate_condition`](Self::evaluate_condition) with `%resource` bound to `resource`
    fn evaluate_condition_in(
        &self,
        bundle: &Bundle,
        resource: &Value,
        expression: &str,
    ) -> Result<bool, FilterError> {
        let result = self.evaluate_in(bundle, resource, expression)?;
        match result.as_slice() {
            [] => Ok(false),
            [Value::Bool(value)] => Ok(*value),
            _ => Err(invalid(
                expression,
                format!("expression did not evaluate to a boolean (got {})", describe(&result)),
            )),
        }
    }
}

/// Path expression evaluator over JSON bundles
#[derive(Debug, Clone, Copy, Default)]
pub struct PathExpressionEvaluator;

impl PathExpressionEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEvaluator for PathExpressionEvaluator {
    fn evaluate_in(
        &self,
        bundle: &Bundle,
        resource: &Value,
        expression: &str,
    ) -> Result<Vec<Value>, FilterError> {
        let ast = parse_expression(expression).map_err(|reason| invalid(expression, reason))?;
        let scope = Scope {
            root: bundle.as_value(),
            resource,
        };
        eval(&ast, &scope).map_err(|reason| invalid(expression, reason))
    }
}

/// Values the environment variables resolve to
struct Scope<'a> {
    /// `%bundle`, and the base of root paths
    root: &'a Value,

    /// `%resource`
    resource: &'a Value,
}

fn invalid(expression: &str, reason: impl Into<String>) -> FilterError {
    FilterError::InvalidExpression {
        expression: expression.to_string(),
        reason: reason.into(),
    }
}

fn describe(values: &[Value]) -> String {
    match values {
        [single] => match single {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "boolean".to_string(),
            Value::Number(_) => "number".to_string(),
            Value::String(_) => "string".to_string(),
            Value::Array(_) => "array".to_string(),
            Value::Object(_) => "object".to_string(),
        },
        many => format!("collection of {}", many.len()),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    /// Path segments from the bundle root
    Root(Vec<String>),
    /// `%name` environment variable
    Variable(String),
    Member(Box<Expr>, String),
    Call(Box<Expr>, String, Vec<Expr>),
    Compare(Box<Expr>, String, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

fn parse_expression(input: &str) -> Result<Expr, String> {
    if input.trim().is_empty() {
        return Err("expression is empty".to_string());
    }

    match all_consuming(ws(or_expr))(input) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) if e.input.is_empty() => {
            Err("unexpected end of expression".to_string())
        }
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(format!(
            "unexpected input at position {}: '{}'",
            input.len() - e.input.len(),
            e.input
        )),
        Err(nom::Err::Incomplete(_)) => Err("incomplete expression".to_string()),
    }
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// A reserved word not followed by more identifier characters
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(
        tag(word),
        not(satisfy(|c: char| c.is_alphanumeric() || c == '_')),
    )
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

// or_expr := and_expr ("or" and_expr)*
fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(ws(keyword("or")), and_expr))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |left, right| Expr::Or(Box::new(left), Box::new(right)));
    Ok((input, expr))
}

// and_expr := comparison ("and" comparison)*
fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = comparison(input)?;
    let (input, rest) = many0(preceded(ws(keyword("and")), comparison))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |left, right| Expr::And(Box::new(left), Box::new(right)));
    Ok((input, expr))
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, left) = postfix(input)?;
    let (input, right) = opt(pair(ws(comparator), postfix))(input)?;
    let expr = match right {
        Some((op, right)) => Expr::Compare(Box::new(left), op.to_string(), Box::new(right)),
        None => left,
    };
    Ok((input, expr))
}

fn comparator(input: &str) -> IResult<&str, &str> {
    alt((tag("!="), tag("<="), tag(">="), tag("="), tag("<"), tag(">")))(input)
}

// postfix := primary ("." name arguments?)*
fn postfix(input: &str) -> IResult<&str, Expr> {
    let (input, base) = primary(input)?;
    let (input, segments) = many0(preceded(char('.'), pair(identifier, opt(arguments))))(input)?;

    let expr = segments
        .into_iter()
        .fold(base, |expr, (name, args)| match (expr, args) {
            (expr, Some(args)) => Expr::Call(Box::new(expr), name.to_string(), args),
            (Expr::Root(mut path), None) => {
                path.push(name.to_string());
                Expr::Root(path)
            }
            (expr, None) => Expr::Member(Box::new(expr), name.to_string()),
        });
    Ok((input, expr))
}

fn arguments(input: &str) -> IResult<&str, Vec<Expr>> {
    delimited(
        char('('),
        separated_list0(char(','), ws(or_expr)),
        preceded(multispace0, char(')')),
    )(input)
}

fn primary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(string_literal, |s| Expr::Literal(Value::String(s))),
        number_literal,
        map(preceded(char('%'), identifier), |name| {
            Expr::Variable(name.to_string())
        }),
        delimited(
            terminated(char('('), multispace0),
            or_expr,
            preceded(multispace0, char(')')),
        ),
        value(Expr::Literal(Value::Bool(true)), keyword("true")),
        value(Expr::Literal(Value::Bool(false)), keyword("false")),
        map(root_name, |name| Expr::Root(vec![name.to_string()])),
    ))(input)
}

// Functions are only callable on a path, never bare at the root
fn root_name(input: &str) -> IResult<&str, &str> {
    terminated(
        verify(identifier, |word: &str| word != "and" && word != "or"),
        not(preceded(multispace0, char('('))),
    )(input)
}

// 'text' with backslash escapes
fn string_literal(input: &str) -> IResult<&str, String> {
    delimited(
        char('\''),
        fold_many0(
            alt((preceded(char('\\'), anychar), none_of("\\'"))),
            String::new,
            |mut acc, c| {
                acc.push(c);
                acc
            },
        ),
        char('\''),
    )(input)
}

fn number_literal(input: &str) -> IResult<&str, Expr> {
    map_opt(
        map_res(
            recognize(pair(digit1, opt(pair(char('.'), digit1)))),
            |text: &str| text.parse::<f64>(),
        ),
        |number| serde_json::Number::from_f64(number).map(|n| Expr::Literal(Value::Number(n))),
    )(input)
}

fn eval(expr: &Expr, scope: &Scope<'_>) -> Result<Vec<Value>, String> {
    match expr {
        Expr::Literal(value) => Ok(vec![value.clone()]),
        Expr::Variable(name) => match name.as_str() {
            "resource" => Ok(vec![scope.resource.clone()]),
            "bundle" | "rootResource" => Ok(vec![scope.root.clone()]),
            other => Err(format!("unknown variable '%{other}'")),
        },
        Expr::Root(segments) => {
            let root = scope.root;
            let mut current = vec![root.clone()];
            let mut rest = segments.as_slice();
            // A leading resource type names the root itself
            if let Some((first, tail)) = segments.split_first() {
                if root.get("resourceType").and_then(Value::as_str) == Some(first.as_str()) {
                    rest = tail;
                }
            }
            for segment in rest {
                current = member(&current, segment);
            }
            Ok(current)
        }
        Expr::Member(inner, name) => Ok(member(&eval(inner, scope)?, name)),
        Expr::Call(inner, name, args) => {
            let input = eval(inner, scope)?;
            call(name, input, args, scope)
        }
        Expr::Compare(left, op, right) => {
            let left = eval(left, scope)?;
            let right = eval(right, scope)?;
            compare(&left, op, &right)
        }
        Expr::And(left, right) => {
            let left = as_logic(&eval(left, scope)?)?;
            let right = as_logic(&eval(right, scope)?)?;
            Ok(from_logic(match (left, right) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            }))
        }
        Expr::Or(left, right) => {
            let left = as_logic(&eval(left, scope)?)?;
            let right = as_logic(&eval(right, scope)?)?;
            Ok(from_logic(match (left, right) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            }))
        }
    }
}

fn member(input: &[Value], name: &str) -> Vec<Value> {
    let mut out = Vec::new();
    for value in input {
        match value.get(name) {
            Some(Value::Array(items)) => out.extend(items.iter().cloned()),
            Some(Value::Null) | None => {}
            Some(other) => out.push(other.clone()),
        }
    }
    out
}

fn call(name: &str, input: Vec<Value>, args: &[Expr], scope: &Scope<'_>) -> Result<Vec<Value>, String> {
    let arity = |expected: usize| -> Result<(), String> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(format!(
                "{name}() takes {expected} argument(s), got {}",
                args.len()
            ))
        }
    };

    match name {
        "exists" => {
            arity(0)?;
            Ok(vec![Value::Bool(!input.is_empty())])
        }
        "empty" => {
            arity(0)?;
            Ok(vec![Value::Bool(input.is_empty())])
        }
        "count" => {
            arity(0)?;
            Ok(vec![Value::from(input.len())])
        }
        "first" => {
            arity(0)?;
            Ok(input.into_iter().take(1).collect())
        }
        "hasValue" => {
            arity(0)?;
            let has_value = matches!(
                input.as_slice(),
                [Value::String(_)] | [Value::Number(_)] | [Value::Bool(_)]
            );
            Ok(vec![Value::Bool(has_value)])
        }
        "not" => {
            arity(0)?;
            Ok(from_logic(as_logic(&input)?.map(|value| !value)))
        }
        "ofType" => {
            arity(1)?;
            let type_name = match &args[0] {
                Expr::Root(segments) if segments.len() == 1 => segments[0].clone(),
                _ => return Err("ofType() expects a type name".to_string()),
            };
            Ok(input
                .into_iter()
                .filter(|value| {
                    value.get("resourceType").and_then(Value::as_str) == Some(type_name.as_str())
                })
                .collect())
        }
        "startsWith" | "contains" => {
            arity(1)?;
            let needle = match eval(&args[0], scope)?.as_slice() {
                [Value::String(needle)] => needle.clone(),
                _ => return Err(format!("{name}() expects a string argument")),
            };
            match input.as_slice() {
                [] => Ok(Vec::new()),
                [Value::String(haystack)] => {
                    let found = if name == "startsWith" {
                        haystack.starts_with(&needle)
                    } else {
                        haystack.contains(&needle)
                    };
                    Ok(vec![Value::Bool(found)])
                }
                _ => Err(format!("{name}() must be called on a single string")),
            }
        }
        other => Err(format!("unknown function '{other}()'")),
    }
}

fn as_logic(values: &[Value]) -> Result<Option<bool>, String> {
    match values {
        [] => Ok(None),
        [Value::Bool(value)] => Ok(Some(*value)),
        _ => Err(format!("expected a boolean, got {}", describe(values))),
    }
}

fn from_logic(value: Option<bool>) -> Vec<Value> {
    value.map(Value::Bool).into_iter().collect()
}

fn compare(left: &[Value], op: &str, right: &[Value]) -> Result<Vec<Value>, String> {
    if left.is_empty() || right.is_empty() {
        return Ok(Vec::new());
    }

    match op {
        "=" | "!=" => {
            let equal = left.len() == right.len()
                && left.iter().zip(right).all(|(l, r)| values_equal(l, r));
            Ok(vec![Value::Bool(if op == "=" { equal } else { !equal })])
        }
        "<" | "<=" | ">" | ">=" => {
            let (l, r) = match (left, right) {
                ([l], [r]) => (l, r),
                _ => return Err(format!("'{op}' requires single values on both sides")),
            };
            let ordering = order(l, r).ok_or_else(|| format!("cannot compare {l} with {r}"))?;
            let result = match op {
                "<" => ordering == Ordering::Less,
                "<=" => ordering != Ordering::Greater,
                ">" => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(vec![Value::Bool(result)])
        }
        other => Err(format!("unknown operator '{other}'")),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64() == r.as_f64(),
        _ => left == right,
    }
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    }
}
