use std::rc::Rc;

use super::errors::{line_of, unexpected_rule};
use super::statements::build_for_targets;
use super::strings::{build_fstring, unescape};
use super::{children, required, Pair, ParseError, ParseResult, Rule};
use crate::ast::{
    Argument, BinaryOp, CompareOp, Comprehension, Expr, FunctionDef, Literal, Param, Stmt,
    StmtKind, UnaryOp,
};

pub(super) fn build_expression(pair: Pair) -> ParseResult<Expr> {
    match pair.as_rule() {
        Rule::expression | Rule::slice_start | Rule::slice_stop => {
            let line = line_of(&pair);
            let mut inner = children(pair);
            build_expression(required(&mut inner, "expression", line)?)
        }
        Rule::lambda_expr => build_lambda(pair),
        Rule::ternary => build_ternary(pair),
        Rule::or_expr => build_bool_chain(pair, Rule::or_op, Expr::Or),
        Rule::and_expr => build_bool_chain(pair, Rule::and_op, Expr::And),
        Rule::not_expr => build_not(pair),
        Rule::comparison => build_comparison(pair),
        Rule::arith | Rule::term => build_binary_chain(pair),
        Rule::factor => build_unary(pair),
        Rule::power => build_power(pair),
        Rule::postfix => build_postfix(pair),
        _ => build_primary(pair),
    }
}

/// `a, b` at statement level evaluates to a tuple.
pub(super) fn build_expression_list(pair: Pair) -> ParseResult<Expr> {
    let mut items = pair
        .into_inner()
        .map(build_expression)
        .collect::<ParseResult<Vec<_>>>()?;
    if items.len() == 1 {
        Ok(items.remove(0))
    } else {
        Ok(Expr::Tuple(items))
    }
}

fn build_lambda(pair: Pair) -> ParseResult<Expr> {
    let line = line_of(&pair);
    let mut params = Vec::new();
    let mut body = None;
    for child in children(pair) {
        match child.as_rule() {
            Rule::lambda_params => {
                params = child
                    .into_inner()
                    .map(|p| Param {
                        name: p.as_str().to_string(),
                        default: None,
                    })
                    .collect()
            }
            Rule::expression => body = Some(build_expression(child)?),
            _ => return Err(unexpected_rule(&child)),
        }
    }
    let body = body.ok_or_else(|| ParseError::at_line("lambda needs a body", line))?;
    Ok(Expr::Lambda(Rc::new(FunctionDef {
        name: "<lambda>".to_string(),
        params,
        body: vec![Stmt {
            kind: StmtKind::Return(Some(body)),
            line,
        }],
        line,
    })))
}

fn build_ternary(pair: Pair) -> ParseResult<Expr> {
    let line = line_of(&pair);
    let mut inner = children(pair);
    let value = build_expression(required(&mut inner, "expression", line)?)?;
    let Some(condition) = inner.next() else {
        return Ok(value);
    };
    let condition = build_expression(condition)?;
    let otherwise = build_expression(required(&mut inner, "else branch", line)?)?;
    Ok(Expr::Ternary {
        condition: Box::new(condition),
        then: Box::new(value),
        otherwise: Box::new(otherwise),
    })
}

fn build_bool_chain(
    pair: Pair,
    operator: Rule,
    combine: fn(Box<Expr>, Box<Expr>) -> Expr,
) -> ParseResult<Expr> {
    let line = line_of(&pair);
    let mut operands = pair.into_inner().filter(|p| p.as_rule() != operator);
    let mut expr = build_expression(required(&mut operands, "operand", line)?)?;
    for operand in operands {
        expr = combine(Box::new(expr), Box::new(build_expression(operand)?));
    }
    Ok(expr)
}

fn build_not(pair: Pair) -> ParseResult<Expr> {
    let line = line_of(&pair);
    let mut negations = 0;
    let mut operand = None;
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::not_op => negations += 1,
            _ => operand = Some(build_expression(child)?),
        }
    }
    let mut expr = operand.ok_or_else(|| ParseError::at_line("missing operand", line))?;
    for _ in 0..negations {
        expr = Expr::Not(Box::new(expr));
    }
    Ok(expr)
}

fn build_comparison(pair: Pair) -> ParseResult<Expr> {
    let line = line_of(&pair);
    let mut inner = pair.into_inner();
    let first = build_expression(required(&mut inner, "operand", line)?)?;
    let mut rest = Vec::new();
    while let Some(op) = inner.next() {
        let op = compare_op(op)?;
        let operand = build_expression(required(&mut inner, "right operand", line)?)?;
        rest.push((op, operand));
    }
    if rest.is_empty() {
        Ok(first)
    } else {
        Ok(Expr::Compare {
            first: Box::new(first),
            rest,
        })
    }
}

fn compare_op(pair: Pair) -> ParseResult<CompareOp> {
    let line = line_of(&pair);
    let mut inner = pair.into_inner();
    let op = required(&mut inner, "comparison operator", line)?;
    Ok(match op.as_rule() {
        Rule::not_in_op => CompareOp::NotIn,
        Rule::in_op => CompareOp::In,
        Rule::is_not_op => CompareOp::IsNot,
        Rule::is_op => CompareOp::Is,
        _ => match op.as_str() {
            "==" => CompareOp::Eq,
            "!=" => CompareOp::NotEq,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::LtE,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::GtE,
            other => {
                return Err(ParseError::at_line(
                    format!("unknown comparison operator '{other}'"),
                    line,
                ))
            }
        },
    })
}

fn build_binary_chain(pair: Pair) -> ParseResult<Expr> {
    let line = line_of(&pair);
    let mut inner = pair.into_inner();
    let mut expr = build_expression(required(&mut inner, "operand", line)?)?;
    while let Some(op) = inner.next() {
        let op = match op.as_str() {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "//" => BinaryOp::FloorDiv,
            "%" => BinaryOp::Mod,
            other => {
                return Err(ParseError::at_line(
                    format!("unknown operator '{other}'"),
                    line,
                ))
            }
        };
        let right = build_expression(required(&mut inner, "right operand", line)?)?;
        expr = Expr::Binary {
            op,
            left: Box::new(expr),
            right: Box::new(right),
        };
    }
    Ok(expr)
}

fn build_unary(pair: Pair) -> ParseResult<Expr> {
    let line = line_of(&pair);
    let mut ops = Vec::new();
    let mut operand = None;
    for child in pair.into_inner() {
        match child.as_rule() {
            Rule::unary_op => ops.push(if child.as_str() == "-" {
                UnaryOp::Neg
            } else {
                UnaryOp::Pos
            }),
            _ => operand = Some(build_expression(child)?),
        }
    }
    let mut expr = operand.ok_or_else(|| ParseError::at_line("missing operand", line))?;
    for op in ops.into_iter().rev() {
        expr = Expr::Unary {
            op,
            operand: Box::new(expr),
        };
    }
    Ok(expr)
}

fn build_power(pair: Pair) -> ParseResult<Expr> {
    let line = line_of(&pair);
    let mut operands = pair.into_inner().filter(|p| p.as_rule() != Rule::pow_op);
    let base = build_expression(required(&mut operands, "operand", line)?)?;
    match operands.next() {
        Some(exponent) => Ok(Expr::Binary {
            op: BinaryOp::Pow,
            left: Box::new(base),
            right: Box::new(build_expression(exponent)?),
        }),
        None => Ok(base),
    }
}

fn build_postfix(pair: Pair) -> ParseResult<Expr> {
    let line = line_of(&pair);
    let mut inner = pair.into_inner();
    let mut expr = build_primary(required(&mut inner, "operand", line)?)?;

    for suffix in inner {
        expr = match suffix.as_rule() {
            Rule::call => Expr::Call {
                callee: Box::new(expr),
                args: build_arguments(suffix)?,
            },
            Rule::attribute => {
                let suffix_line = line_of(&suffix);
                let mut parts = suffix.into_inner();
                let name = required(&mut parts, "attribute name", suffix_line)?;
                Expr::Attribute {
                    object: Box::new(expr),
                    name: name.as_str().to_string(),
                }
            }
            Rule::index => {
                let suffix_line = line_of(&suffix);
                let mut parts = suffix.into_inner();
                let key = required(&mut parts, "index", suffix_line)?;
                if key.as_rule() == Rule::slice {
                    let mut start = None;
                    let mut stop = None;
                    for bound in key.into_inner() {
                        match bound.as_rule() {
                            Rule::slice_start => start = Some(Box::new(build_expression(bound)?)),
                            Rule::slice_stop => stop = Some(Box::new(build_expression(bound)?)),
                            _ => return Err(unexpected_rule(&bound)),
                        }
                    }
                    Expr::Slice {
                        object: Box::new(expr),
                        start,
                        stop,
                    }
                } else {
                    Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(build_expression(key)?),
                    }
                }
            }
            _ => return Err(unexpected_rule(&suffix)),
        };
    }
    Ok(expr)
}

fn build_arguments(pair: Pair) -> ParseResult<Vec<Argument>> {
    let mut args = Vec::new();
    for argument in pair.into_inner() {
        let line = line_of(&argument);
        let mut inner = argument.into_inner();
        let first = required(&mut inner, "argument", line)?;
        let arg = if first.as_rule() == Rule::keyword_arg {
            let mut parts = first.into_inner().filter(|p| p.as_rule() != Rule::assign_eq);
            let name = required(&mut parts, "keyword", line)?.as_str().to_string();
            let value = build_expression(required(&mut parts, "keyword value", line)?)?;
            if args
                .iter()
                .any(|a| matches!(a, Argument::Keyword(existing, _) if *existing == name))
            {
                return Err(ParseError::at_line(
                    format!("keyword argument repeated: {name}"),
                    line,
                ));
            }
            Argument::Keyword(name, value)
        } else {
            let element = build_expression(first)?;
            let value = match inner.next() {
                Some(comp_for) => build_comprehension(element, comp_for)?,
                None => element,
            };
            if args.iter().any(|a| matches!(a, Argument::Keyword(..))) {
                return Err(ParseError::at_line(
                    "positional argument follows keyword argument",
                    line,
                ));
            }
            Argument::Positional(value)
        };
        args.push(arg);
    }
    Ok(args)
}

fn build_comprehension(element: Expr, comp_for: Pair) -> ParseResult<Expr> {
    let line = line_of(&comp_for);
    let mut inner = children(comp_for);
    let targets = build_for_targets(required(&mut inner, "loop variable", line)?);
    let iter = build_expression(required(&mut inner, "iterable", line)?)?;
    let conditions = inner
        .map(|comp_if| {
            let if_line = line_of(&comp_if);
            let mut parts = children(comp_if);
            build_expression(required(&mut parts, "condition", if_line)?)
        })
        .collect::<ParseResult<Vec<_>>>()?;
    Ok(Expr::ListComp(Box::new(Comprehension {
        element,
        targets,
        iter,
        conditions,
    })))
}

fn build_primary(pair: Pair) -> ParseResult<Expr> {
    let line = line_of(&pair);
    match pair.as_rule() {
        Rule::integer => {
            let digits: String = pair.as_str().chars().filter(|c| *c != '_').collect();
            digits
                .parse::<i64>()
                .map(|n| Expr::Literal(Literal::Int(n)))
                .map_err(|_| ParseError::invalid("integer literal too large", &pair))
        }
        Rule::float => pair
            .as_str()
            .parse::<f64>()
            .map(|n| Expr::Literal(Literal::Float(n)))
            .map_err(|_| ParseError::invalid("invalid float literal", &pair)),
        Rule::string => {
            let mut inner = pair.into_inner();
            let body = required(&mut inner, "string body", line)?;
            Ok(Expr::Literal(Literal::Str(unescape(body.as_str(), line)?)))
        }
        Rule::fstring => {
            let mut inner = pair.into_inner();
            let body = required(&mut inner, "string body", line)?;
            Ok(Expr::FString(build_fstring(body.as_str(), line)?))
        }
        Rule::boolean => Ok(Expr::Literal(Literal::Bool(pair.as_str() == "True"))),
        Rule::none => Ok(Expr::Literal(Literal::None)),
        Rule::identifier => Ok(Expr::Name(pair.as_str().to_string())),
        Rule::list_lit => {
            let mut items = Vec::new();
            for child in pair.into_inner() {
                match child.as_rule() {
                    Rule::comp_for => {
                        let element = items.pop().ok_or_else(|| {
                            ParseError::at_line("comprehension needs an element", line)
                        })?;
                        return build_comprehension(element, child);
                    }
                    _ => items.push(build_expression(child)?),
                }
            }
            Ok(Expr::List(items))
        }
        Rule::dict_lit => {
            let entries = pair
                .into_inner()
                .map(|entry| {
                    let entry_line = line_of(&entry);
                    let mut parts = entry.into_inner();
                    let key = build_expression(required(&mut parts, "key", entry_line)?)?;
                    let value = build_expression(required(&mut parts, "value", entry_line)?)?;
                    Ok((key, value))
                })
                .collect::<ParseResult<Vec<_>>>()?;
            Ok(Expr::Dict(entries))
        }
        Rule::paren_expr => {
            let mut items = Vec::new();
            let mut trailing_comma = false;
            for child in pair.into_inner() {
                match child.as_rule() {
                    Rule::comp_for => {
                        let element = items.pop().ok_or_else(|| {
                            ParseError::at_line("comprehension needs an element", line)
                        })?;
                        return build_comprehension(element, child);
                    }
                    Rule::trailing_comma => trailing_comma = true,
                    _ => items.push(build_expression(child)?),
                }
            }
            if items.len() == 1 && !trailing_comma {
                Ok(items.remove(0))
            } else {
                Ok(Expr::Tuple(items))
            }
        }
        _ => Err(unexpected_rule(&pair)),
    }
}
