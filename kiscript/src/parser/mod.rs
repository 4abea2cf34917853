use crate::ast::{Expr, Program};
use pest::Parser;

pub mod errors;
mod expressions;
mod statements;
mod strings;

pub use errors::ParseError;

// Define the parser struct using the grammar file
#[derive(pest_derive::Parser)]
#[grammar = "kiscript.pest"] // Path relative to src/
pub struct KiScriptParser;

pub(crate) type Pair<'a> = pest::iterators::Pair<'a, Rule>;
pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a full KiScript program.
pub fn parse(source: &str) -> ParseResult<Program> {
    let mut pairs = KiScriptParser::parse(Rule::program, source)?;
    let program = pairs
        .next()
        .ok_or_else(|| ParseError::at_line("parser produced no program", 1))?;
    let body = statements::build_statements(program.into_inner())?;
    Ok(Program { body })
}

/// Parse a single expression (used for f-string fields and by tests).
pub fn parse_expression(source: &str) -> ParseResult<Expr> {
    let mut pairs = KiScriptParser::parse(Rule::fstring_field, source)?;
    let field = pairs
        .next()
        .ok_or_else(|| ParseError::at_line("no expression found", 1))?;
    let expr = field
        .into_inner()
        .find(|p| p.as_rule() == Rule::expression)
        .ok_or_else(|| ParseError::at_line("no expression found", 1))?;
    expressions::build_expression(expr)
}

// Keyword tokens carry no information once the enclosing rule matched.
fn is_keyword_token(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_def
            | Rule::kw_if
            | Rule::kw_elif
            | Rule::kw_else
            | Rule::kw_for
            | Rule::kw_in
            | Rule::kw_is
            | Rule::kw_not
            | Rule::kw_while
            | Rule::kw_try
            | Rule::kw_except
            | Rule::kw_as
            | Rule::kw_finally
            | Rule::kw_return
            | Rule::kw_raise
            | Rule::kw_lambda
            | Rule::kw_import
            | Rule::kw_from
    )
}

pub(crate) fn children(pair: Pair) -> impl Iterator<Item = Pair> {
    pair.into_inner().filter(|p| !is_keyword_token(p.as_rule()))
}

pub(crate) fn required<'a>(
    iter: &mut impl Iterator<Item = Pair<'a>>,
    what: &str,
    line: usize,
) -> ParseResult<Pair<'a>> {
    iter.next()
        .ok_or_else(|| ParseError::at_line(format!("missing {what}"), line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Argument, BinaryOp, CompareOp, Literal, StmtKind, Target};
    use pretty_assertions::assert_eq;

    fn int(n: i64) -> Expr {
        Expr::Literal(Literal::Int(n))
    }

    fn name(n: &str) -> Expr {
        Expr::Name(n.to_string())
    }

    #[test]
    fn test_semicolon_separated_statements() {
        let program = parse("print('hi'); 2+2").unwrap();
        assert_eq!(program.body.len(), 2);
        assert_eq!(
            program.body[1].kind,
            StmtKind::Expr(Expr::Binary {
                op: BinaryOp::Add,
                left: Box::new(int(2)),
                right: Box::new(int(2)),
            })
        );
        assert!(program.trailing_expression().is_some());
    }

    #[test]
    fn test_operator_precedence() {
        let cases = vec![
            (
                "1 + 2 * 3",
                Expr::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(int(1)),
                    right: Box::new(Expr::Binary {
                        op: BinaryOp::Mul,
                        left: Box::new(int(2)),
                        right: Box::new(int(3)),
                    }),
                },
            ),
            (
                "-2 ** 2",
                Expr::Unary {
                    op: crate::ast::UnaryOp::Neg,
                    operand: Box::new(Expr::Binary {
                        op: BinaryOp::Pow,
                        left: Box::new(int(2)),
                        right: Box::new(int(2)),
                    }),
                },
            ),
            (
                "a not in b",
                Expr::Compare {
                    first: Box::new(name("a")),
                    rest: vec![(CompareOp::NotIn, name("b"))],
                },
            ),
            (
                "x is not None",
                Expr::Compare {
                    first: Box::new(name("x")),
                    rest: vec![(CompareOp::IsNot, Expr::Literal(Literal::None))],
                },
            ),
        ];

        for (source, expected) in cases {
            assert_eq!(parse_expression(source).unwrap(), expected, "source: {source}");
        }
    }

    #[test]
    fn test_keyword_prefixed_identifiers_are_names() {
        let program = parse("returned = 1\nformat_x = iffy\nnot_found = []").unwrap();
        let names: Vec<_> = program
            .body
            .iter()
            .map(|stmt| match &stmt.kind {
                StmtKind::Assign { targets, .. } => targets[0].clone(),
                other => panic!("unexpected statement {other:?}"),
            })
            .collect();
        assert_eq!(
            names,
            vec![
                Target::Name("returned".into()),
                Target::Name("format_x".into()),
                Target::Name("not_found".into()),
            ]
        );
    }

    #[test]
    fn test_multiline_call_with_keywords() {
        let program = parse("move(fp,\n     x=1,\n     y=2,\n)").unwrap();
        match &program.body[0].kind {
            StmtKind::Expr(Expr::Call { args, .. }) => {
                assert_eq!(args.len(), 3);
                assert!(matches!(&args[1], Argument::Keyword(k, _) if k == "x"));
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn test_blocks_and_line_numbers() {
        let source = "total = 0\nfor i in range(3) {\n    total += i\n}\nif total > 2 {\n    print(total)\n} elif total == 0 {\n    pass\n}\nelse {\n    print('small')\n}";
        let program = parse(source).unwrap();
        assert_eq!(program.body.len(), 3);
        assert_eq!(program.body[1].line, 2);
        match &program.body[1].kind {
            StmtKind::For { body, .. } => assert_eq!(body[0].line, 3),
            other => panic!("unexpected statement {other:?}"),
        }
        match &program.body[2].kind {
            StmtKind::If { branches, orelse } => {
                assert_eq!(branches.len(), 2);
                assert!(orelse.is_some());
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let program = parse("# header\n\nx = 1  # trailing\n\n# done\n").unwrap();
        assert_eq!(program.body.len(), 1);
        assert_eq!(program.body[0].line, 3);
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let error = parse("x = 1\ny = (2 +\n").unwrap_err();
        match error {
            ParseError::Syntax { line, .. } => assert_eq!(line, 2),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_import_is_rejected() {
        let error = parse("import math").unwrap_err();
        assert!(error.to_string().contains("not supported"));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let error = parse("f() = 3").unwrap_err();
        assert!(matches!(error, ParseError::Invalid { line: 1, .. }));
    }

    #[test]
    fn test_try_requires_handler() {
        assert!(parse("try {\n  x = 1\n}").is_err());
        assert!(parse("try {\n  x = 1\n} finally {\n  pass\n}").is_ok());
    }

    #[test]
    fn test_fstring_fields() {
        let expr = parse_expression("f\"{n} items, {ratio:.2f}% {{literal}}\"").unwrap();
        match expr {
            Expr::FString(parts) => assert_eq!(parts.len(), 4),
            other => panic!("expected f-string, got {other:?}"),
        }
    }
}
