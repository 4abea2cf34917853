use super::{Pair, Rule};
use pest::error::{Error as PestError, LineColLocation};
use thiserror::Error;

/// Errors raised while turning source text into a [`crate::ast::Program`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The grammar rejected the input.
    #[error("invalid syntax at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
        /// Pest's rendering with the offending line and a caret.
        rendered: String,
    },
    /// The input matched the grammar but is not a valid program.
    #[error("line {line}: {message}")]
    Invalid { message: String, line: usize },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::Syntax { line, .. } | ParseError::Invalid { line, .. } => *line,
        }
    }

    /// Multi-line description suitable for a traceback section.
    pub fn rendered(&self) -> String {
        match self {
            ParseError::Syntax { rendered, .. } => rendered.clone(),
            ParseError::Invalid { .. } => self.to_string(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>, pair: &Pair) -> Self {
        ParseError::Invalid {
            message: message.into(),
            line: line_of(pair),
        }
    }

    pub(crate) fn at_line(message: impl Into<String>, line: usize) -> Self {
        ParseError::Invalid {
            message: message.into(),
            line,
        }
    }
}

impl From<PestError<Rule>> for ParseError {
    fn from(error: PestError<Rule>) -> Self {
        let (line, column) = match error.line_col {
            LineColLocation::Pos(pos) => pos,
            LineColLocation::Span(start, _) => start,
        };
        let error = error.renamed_rules(describe_rule);
        ParseError::Syntax {
            message: error.variant.message().into_owned(),
            line,
            column,
            rendered: error.to_string(),
        }
    }
}

pub(crate) fn line_of(pair: &Pair) -> usize {
    pair.as_span().start_pos().line_col().0
}

pub(crate) fn unexpected_rule(pair: &Pair) -> ParseError {
    ParseError::invalid(format!("unexpected {:?} in syntax tree", pair.as_rule()), pair)
}

// Friendlier names for the rules pest lists in "expected ..." messages.
fn describe_rule(rule: &Rule) -> String {
    let name = match rule {
        Rule::EOI => "end of input",
        Rule::identifier => "name",
        Rule::expression
        | Rule::expression_list
        | Rule::ternary
        | Rule::or_expr
        | Rule::and_expr
        | Rule::not_expr
        | Rule::comparison
        | Rule::arith
        | Rule::term
        | Rule::factor
        | Rule::power
        | Rule::postfix => "expression",
        Rule::block => "`{`",
        Rule::call => "`(`",
        Rule::index => "`[`",
        Rule::attribute => "`.`",
        Rule::assign_op | Rule::assign_eq => "`=`",
        Rule::eq_op | Rule::comp_op => "comparison operator",
        Rule::add_op | Rule::mul_op | Rule::pow_op => "operator",
        Rule::or_op => "`or`",
        Rule::and_op => "`and`",
        Rule::kw_in | Rule::in_op => "`in`",
        Rule::kw_else => "`else`",
        Rule::kw_elif => "`elif`",
        Rule::kw_except => "`except`",
        Rule::kw_finally => "`finally`",
        Rule::kw_if => "`if`",
        Rule::kw_for => "`for`",
        Rule::kw_as => "`as`",
        Rule::string | Rule::fstring => "string",
        Rule::integer | Rule::float => "number",
        Rule::param_list | Rule::param => "parameter",
        Rule::argument | Rule::keyword_arg => "argument",
        Rule::dict_entry => "dict entry",
        Rule::for_targets => "loop variable",
        Rule::comp_for => "`for`",
        Rule::comp_if => "`if`",
        other => return format!("{other:?}"),
    };
    name.to_string()
}
