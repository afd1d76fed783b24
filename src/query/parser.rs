//! Condition-language parser.
//!
//! Turns text like `5 <= value AND value < 10` into a [`Predicate`] tree.
//! Comparisons pair a dotted field path with a literal on either side;
//! `AND`/`OR`/`NOT` and parentheses compose them; `*` matches everything.

use anyhow::{anyhow, bail, Result};
use lazy_static::lazy_static;
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{map, opt, recognize},
    multi::many0,
    sequence::{delimited, preceded, tuple},
    IResult,
};
use rustc_hash::FxHashSet;
use serde_json::{Number, Value};
use tracing::instrument;

use super::path::Path;
use super::predicate::Predicate;

lazy_static! {
    static ref KEYWORDS: FxHashSet<&'static str> =
        ["AND", "OR", "NOT", "TRUE", "FALSE", "NULL"].into_iter().collect();
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Keyword(String),
    Word(String),
    Number(String),
    Str(String),
    Op(String),
}

fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(s.to_ascii_uppercase().as_str())
}

fn parse_string_lit(input: &str) -> IResult<&str, Token> {
    let parse_single = delimited(char('\''), recognize(opt(is_not("'"))), char('\''));
    let parse_double = delimited(char('"'), recognize(opt(is_not("\""))), char('"'));
    map(alt((parse_single, parse_double)), |s: &str| Token::Str(s.to_string()))(input)
}

fn parse_number(input: &str) -> IResult<&str, Token> {
    map(
        recognize(tuple((opt(char('-')), digit1, opt(tuple((char('.'), digit1)))))),
        |s: &str| Token::Number(s.to_string()),
    )(input)
}

fn parse_word(input: &str) -> IResult<&str, Token> {
    let allowed = |c: char| c.is_alphanumeric() || c == '_' || c == '.';
    map(take_while1(allowed), |s: &str| {
        if is_keyword(s) {
            Token::Keyword(s.to_ascii_uppercase())
        } else {
            Token::Word(s.to_string())
        }
    })(input)
}

fn parse_op(input: &str) -> IResult<&str, Token> {
    map(
        alt((
            tag("=="),
            tag("!="),
            tag(">="),
            tag("<="),
            tag("="),
            tag(">"),
            tag("<"),
            tag("("),
            tag(")"),
            tag("*"),
        )),
        |s: &str| Token::Op(s.to_string()),
    )(input)
}

fn parse_tokens(input: &str) -> IResult<&str, Vec<Token>> {
    many0(preceded(
        multispace0,
        alt((parse_string_lit, parse_number, parse_op, parse_word)),
    ))(input)
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    match parse_tokens(source) {
        Ok((rest, tokens)) if rest.trim().is_empty() => Ok(tokens),
        Ok((rest, _)) => Err(anyhow!("unrecognized input near '{}'", rest.trim())),
        Err(e) => Err(anyhow!("tokenizer error: {}", e)),
    }
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if matches!(self.peek(), Some(Token::Keyword(k)) if k == kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(o)) if o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos == self.tokens.len()
    }
}

enum Operand {
    Field(Path),
    Literal(Value),
}

fn parse_or(cursor: &mut Cursor) -> Result<Predicate> {
    let mut terms = vec![parse_and(cursor)?];
    while cursor.eat_keyword("OR") {
        terms.push(parse_and(cursor)?);
    }
    if terms.len() == 1 {
        Ok(terms.pop().unwrap())
    } else {
        Ok(Predicate::Or { predicates: terms })
    }
}

fn parse_and(cursor: &mut Cursor) -> Result<Predicate> {
    let mut terms = vec![parse_unary(cursor)?];
    while cursor.eat_keyword("AND") {
        terms.push(parse_unary(cursor)?);
    }
    if terms.len() == 1 {
        Ok(terms.pop().unwrap())
    } else {
        Ok(Predicate::And { predicates: terms })
    }
}

fn parse_unary(cursor: &mut Cursor) -> Result<Predicate> {
    if cursor.eat_keyword("NOT") {
        let inner = parse_unary(cursor)?;
        Ok(Predicate::Not { predicate: Box::new(inner) })
    } else {
        parse_primary(cursor)
    }
}

fn parse_primary(cursor: &mut Cursor) -> Result<Predicate> {
    if cursor.eat_op("(") {
        let inner = parse_or(cursor)?;
        if !cursor.eat_op(")") {
            bail!("missing closing parenthesis");
        }
        return Ok(inner);
    }
    if cursor.eat_op("*") {
        return Ok(Predicate::All);
    }
    parse_comparison(cursor)
}

fn parse_comparison(cursor: &mut Cursor) -> Result<Predicate> {
    let left = parse_operand(cursor)?;
    let op = match cursor.next() {
        Some(Token::Op(op)) if is_comparison_op(op) => op.as_str(),
        other => bail!("expected comparison operator, found {:?}", other),
    };
    let right = parse_operand(cursor)?;

    match (left, right) {
        (Operand::Field(field), Operand::Literal(value)) => build_comparison(field, op, value),
        // Literal-first form: normalize `5 <= value` into `value >= 5`.
        (Operand::Literal(value), Operand::Field(field)) => {
            build_comparison(field, flip_op(op), value)
        }
        (Operand::Field(_), Operand::Field(_)) => {
            bail!("field-to-field comparisons are not supported")
        }
        (Operand::Literal(_), Operand::Literal(_)) => {
            bail!("comparison needs a field on one side")
        }
    }
}

fn parse_operand(cursor: &mut Cursor) -> Result<Operand> {
    match cursor.next() {
        Some(Token::Word(w)) => Ok(Operand::Field(Path::new(w))),
        Some(Token::Str(s)) => Ok(Operand::Literal(Value::String(s.clone()))),
        Some(Token::Number(n)) => Ok(Operand::Literal(number_literal(n)?)),
        Some(Token::Keyword(k)) => match k.as_str() {
            "TRUE" => Ok(Operand::Literal(Value::Bool(true))),
            "FALSE" => Ok(Operand::Literal(Value::Bool(false))),
            "NULL" => Ok(Operand::Literal(Value::Null)),
            other => bail!("unexpected keyword '{}'", other),
        },
        other => bail!("expected operand, found {:?}", other),
    }
}

fn number_literal(raw: &str) -> Result<Value> {
    if raw.contains('.') {
        let f: f64 = raw.parse()?;
        Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| anyhow!("non-finite number literal '{}'", raw))
    } else {
        let i: i64 = raw.parse()?;
        Ok(Value::Number(Number::from(i)))
    }
}

fn is_comparison_op(op: &str) -> bool {
    matches!(op, "=" | "==" | "!=" | ">" | ">=" | "<" | "<=")
}

fn flip_op(op: &str) -> &str {
    match op {
        ">" => "<",
        ">=" => "<=",
        "<" => ">",
        "<=" => ">=",
        other => other,
    }
}

fn build_comparison(field: Path, op: &str, value: Value) -> Result<Predicate> {
    Ok(match op {
        "=" | "==" => Predicate::Eq { field, value },
        "!=" => Predicate::Neq { field, value },
        ">" => Predicate::Gt { field, value },
        ">=" => Predicate::Gte { field, value },
        "<" => Predicate::Lt { field, value },
        "<=" => Predicate::Lte { field, value },
        other => bail!("unsupported operator '{}'", other),
    })
}

/// Parse a condition into a predicate tree.
#[instrument(level = "debug", skip(source), err)]
pub fn parse_condition(source: &str) -> Result<Predicate> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        bail!("empty condition");
    }
    let mut cursor = Cursor::new(&tokens);
    let predicate = parse_or(&mut cursor)?;
    if !cursor.at_end() {
        bail!("unexpected trailing tokens after condition");
    }
    Ok(predicate)
}
