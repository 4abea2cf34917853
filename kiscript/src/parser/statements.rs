use std::rc::Rc;

use pest::iterators::Pairs;

use super::errors::{line_of, unexpected_rule};
use super::expressions::{build_expression, build_expression_list};
use super::{children, required, Pair, ParseError, ParseResult, Rule};
use crate::ast::{BinaryOp, Expr, ExceptHandler, FunctionDef, Param, Stmt, StmtKind, Target};

pub(super) fn build_statements(pairs: Pairs<Rule>) -> ParseResult<Vec<Stmt>> {
    pairs
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(build_statement)
        .collect()
}

pub(super) fn build_block(pair: Pair) -> ParseResult<Vec<Stmt>> {
    build_statements(pair.into_inner())
}

fn build_statement(pair: Pair) -> ParseResult<Stmt> {
    let line = line_of(&pair);
    let kind = match pair.as_rule() {
        Rule::import_stmt => {
            return Err(ParseError::invalid(
                "import statements are not supported; every available name is already bound",
                &pair,
            ))
        }
        Rule::def_stmt => StmtKind::FunctionDef(Rc::new(build_function_def(pair)?)),
        Rule::if_stmt => build_if(pair)?,
        Rule::for_stmt => build_for(pair)?,
        Rule::while_stmt => {
            let mut inner = children(pair);
            let condition = build_expression(required(&mut inner, "loop condition", line)?)?;
            let body = build_block(required(&mut inner, "loop body", line)?)?;
            StmtKind::While { condition, body }
        }
        Rule::try_stmt => build_try(pair)?,
        Rule::return_stmt => {
            let value = children(pair).next().map(build_expression_list).transpose()?;
            StmtKind::Return(value)
        }
        Rule::raise_stmt => {
            let value = children(pair).next().map(build_expression).transpose()?;
            StmtKind::Raise(value)
        }
        Rule::break_stmt => StmtKind::Break,
        Rule::continue_stmt => StmtKind::Continue,
        Rule::pass_stmt => StmtKind::Pass,
        Rule::assign_stmt => build_assign(pair)?,
        Rule::expr_stmt => {
            let mut inner = children(pair);
            StmtKind::Expr(build_expression_list(required(&mut inner, "expression", line)?)?)
        }
        _ => return Err(unexpected_rule(&pair)),
    };
    Ok(Stmt { kind, line })
}

pub(super) fn build_function_def(pair: Pair) -> ParseResult<FunctionDef> {
    let line = line_of(&pair);
    let mut name = None;
    let mut params = Vec::new();
    let mut body = None;

    for child in children(pair) {
        match child.as_rule() {
            Rule::identifier => name = Some(child.as_str().to_string()),
            Rule::param_list => params = build_params(child)?,
            Rule::block => body = Some(build_block(child)?),
            _ => return Err(unexpected_rule(&child)),
        }
    }

    Ok(FunctionDef {
        name: name.ok_or_else(|| ParseError::at_line("missing function name", line))?,
        params,
        body: body.ok_or_else(|| ParseError::at_line("missing function body", line))?,
        line,
    })
}

fn build_params(pair: Pair) -> ParseResult<Vec<Param>> {
    let mut params: Vec<Param> = Vec::new();
    for param in pair.into_inner() {
        let line = line_of(&param);
        let mut inner = param.into_inner();
        let name = required(&mut inner, "parameter name", line)?
            .as_str()
            .to_string();
        let default = inner
            .find(|p| p.as_rule() == Rule::expression)
            .map(build_expression)
            .transpose()?;

        if params.iter().any(|p| p.name == name) {
            return Err(ParseError::at_line(
                format!("duplicate parameter '{name}'"),
                line,
            ));
        }
        if default.is_none() && params.iter().any(|p| p.default.is_some()) {
            return Err(ParseError::at_line(
                "non-default parameter follows default parameter",
                line,
            ));
        }
        params.push(Param { name, default });
    }
    Ok(params)
}

fn build_if(pair: Pair) -> ParseResult<StmtKind> {
    let line = line_of(&pair);
    let mut inner = children(pair);
    let condition = build_expression(required(&mut inner, "condition", line)?)?;
    let body = build_block(required(&mut inner, "body", line)?)?;
    let mut branches = vec![(condition, body)];
    let mut orelse = None;

    for clause in inner {
        let clause_line = line_of(&clause);
        match clause.as_rule() {
            Rule::elif_clause => {
                let mut parts = children(clause);
                let condition =
                    build_expression(required(&mut parts, "condition", clause_line)?)?;
                let body = build_block(required(&mut parts, "body", clause_line)?)?;
                branches.push((condition, body));
            }
            Rule::else_clause => {
                let mut parts = children(clause);
                orelse = Some(build_block(required(&mut parts, "body", clause_line)?)?);
            }
            _ => return Err(unexpected_rule(&clause)),
        }
    }

    Ok(StmtKind::If { branches, orelse })
}

fn build_for(pair: Pair) -> ParseResult<StmtKind> {
    let line = line_of(&pair);
    let mut inner = children(pair);
    let targets = build_for_targets(required(&mut inner, "loop variable", line)?);
    let iter = build_expression(required(&mut inner, "iterable", line)?)?;
    let body = build_block(required(&mut inner, "loop body", line)?)?;
    Ok(StmtKind::For {
        targets,
        iter,
        body,
    })
}

pub(super) fn build_for_targets(pair: Pair) -> Vec<String> {
    pair.into_inner().map(|p| p.as_str().to_string()).collect()
}

fn build_try(pair: Pair) -> ParseResult<StmtKind> {
    let line = line_of(&pair);
    let mut inner = children(pair);
    let body = build_block(required(&mut inner, "try body", line)?)?;
    let mut handlers = Vec::new();
    let mut finally = None;

    for clause in inner {
        match clause.as_rule() {
            Rule::except_clause => {
                let clause_line = line_of(&clause);
                let mut kind = None;
                let mut binding = None;
                let mut handler_body = None;
                for part in children(clause) {
                    match part.as_rule() {
                        Rule::exception_name => kind = Some(part.as_str().to_string()),
                        Rule::identifier => binding = Some(part.as_str().to_string()),
                        Rule::block => handler_body = Some(build_block(part)?),
                        _ => return Err(unexpected_rule(&part)),
                    }
                }
                handlers.push(ExceptHandler {
                    kind,
                    binding,
                    body: handler_body
                        .ok_or_else(|| ParseError::at_line("missing except body", clause_line))?,
                });
            }
            Rule::finally_clause => {
                let clause_line = line_of(&clause);
                let mut parts = children(clause);
                finally = Some(build_block(required(&mut parts, "finally body", clause_line)?)?);
            }
            _ => return Err(unexpected_rule(&clause)),
        }
    }

    if handlers.is_empty() && finally.is_none() {
        return Err(ParseError::at_line(
            "'try' needs at least one 'except' or 'finally' clause",
            line,
        ));
    }

    Ok(StmtKind::Try {
        body,
        handlers,
        finally,
    })
}

fn build_assign(pair: Pair) -> ParseResult<StmtKind> {
    let line = line_of(&pair);
    let mut inner = children(pair);
    let target_list = required(&mut inner, "assignment target", line)?;
    let op = required(&mut inner, "assignment operator", line)?;
    let value = build_expression_list(required(&mut inner, "assigned value", line)?)?;

    let targets = target_list
        .into_inner()
        .map(build_target)
        .collect::<ParseResult<Vec<_>>>()?;

    let aug_op = match op.as_str() {
        "=" => return Ok(StmtKind::Assign { targets, value }),
        "+=" => BinaryOp::Add,
        "-=" => BinaryOp::Sub,
        "*=" => BinaryOp::Mul,
        "/=" => BinaryOp::Div,
        "//=" => BinaryOp::FloorDiv,
        "%=" => BinaryOp::Mod,
        other => {
            return Err(ParseError::at_line(
                format!("unknown assignment operator '{other}'"),
                line,
            ))
        }
    };

    let mut targets = targets.into_iter();
    match (targets.next(), targets.next()) {
        (Some(target), None) => Ok(StmtKind::AugAssign {
            target,
            op: aug_op,
            value,
        }),
        _ => Err(ParseError::at_line(
            "augmented assignment needs exactly one target",
            line,
        )),
    }
}

fn build_target(pair: Pair) -> ParseResult<Target> {
    let line = line_of(&pair);
    match build_expression(pair)? {
        Expr::Name(name) => Ok(Target::Name(name)),
        Expr::Attribute { object, name } => Ok(Target::Attribute {
            object: *object,
            name,
        }),
        Expr::Index { object, index } => Ok(Target::Index {
            object: *object,
            index: *index,
        }),
        _ => Err(ParseError::at_line("cannot assign to expression", line)),
    }
}
