//! Scanning of filter expressions into an [`Expression`] tree.

use tracing::warn;

use crate::error::QuerySyntaxError;
use crate::types::{Literal, LogicalOperator, SearchOperation};

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A single comparison.
    Condition(Condition),
    /// Child expressions joined by one operator.
    Group {
        /// Operator shared by every child at this level.
        operator: LogicalOperator,
        /// Children, left to right.
        children: Vec<Expression>,
    },
}

/// `attribute operator value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Attribute path as written.
    pub attribute: String,
    /// The comparison.
    pub operation: SearchOperation,
    /// The parsed value; `Null` for null checks, `List` for membership.
    pub value: Literal,
}

/// Comparison symbols, longest first so `!=` is not read as `=`.
pub(crate) const SYMBOLS: &[(&str, SearchOperation)] = &[
    ("!~", SearchOperation::NotLike),
    ("!=", SearchOperation::NotEquals),
    (">=", SearchOperation::GreaterEqual),
    ("<=", SearchOperation::LessEqual),
    ("~", SearchOperation::Like),
    ("=", SearchOperation::Equals),
    (">", SearchOperation::Greater),
    ("<", SearchOperation::Less),
];

type ParseResult<T> = Result<T, QuerySyntaxError>;

/// Tracks quoting while walking a string character by character.
#[derive(Default)]
struct QuoteState {
    quote: Option<char>,
    escaped: bool,
}

impl QuoteState {
    /// Feeds one character; returns true if it is outside quotes and not a
    /// quote delimiter.
    fn feed(&mut self, c: char) -> bool {
        if self.escaped {
            self.escaped = false;
            return false;
        }
        match self.quote {
            Some(_) if c == '\\' => {
                self.escaped = true;
                false
            }
            Some(q) if c == q => {
                self.quote = None;
                false
            }
            Some(_) => false,
            None if c == '\'' || c == '"' => {
                self.quote = Some(c);
                false
            }
            None => true,
        }
    }

    fn in_quotes(&self) -> bool {
        self.quote.is_some()
    }
}

/// Parses `input` into an expression tree.
pub(crate) fn parse_expression(input: &str, reject_mixed: bool) -> ParseResult<Expression> {
    check_structure(input)?;
    parse_level(input, reject_mixed)
}

fn check_structure(input: &str) -> ParseResult<()> {
    let mut quotes = QuoteState::default();
    let mut depth = 0i32;
    for c in input.chars() {
        if !quotes.feed(c) {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(QuerySyntaxError::new("Unbalanced parentheses in query"));
                }
            }
            _ => {}
        }
    }
    if quotes.in_quotes() {
        return Err(QuerySyntaxError::new("Unclosed quote in query"));
    }
    if depth != 0 {
        return Err(QuerySyntaxError::new("Unbalanced parentheses in query"));
    }
    Ok(())
}

fn parse_level(input: &str, reject_mixed: bool) -> ParseResult<Expression> {
    let input = strip_wrapping_parentheses(input.trim());
    if input.is_empty() {
        return Err(QuerySyntaxError::new("Empty condition"));
    }

    let (tokens, operators) = split_top_level(input);
    let Some(&operator) = operators.first() else {
        return parse_condition(input).map(Expression::Condition);
    };

    if operators.iter().any(|op| *op != operator) {
        if reject_mixed {
            return Err(QuerySyntaxError::new(format!(
                "Mixed '&' and '|' at the same level in '{}'; add parentheses",
                input
            )));
        }
        warn!(
            expression = %input,
            operator = %operator,
            "Mixed '&' and '|' at one level, applying the first operator to all"
        );
    }

    let mut children = Vec::with_capacity(tokens.len());
    for token in tokens {
        if token.is_empty() {
            return Err(QuerySyntaxError::new(
                "Empty condition found - check for missing operands around & or |",
            ));
        }
        children.push(parse_level(token, reject_mixed)?);
    }
    Ok(Expression::Group { operator, children })
}

/// Removes parentheses enclosing the whole input, repeatedly.
fn strip_wrapping_parentheses(mut input: &str) -> &str {
    while input.starts_with('(') && input.ends_with(')') && closes_at_end(input) {
        input = input[1..input.len() - 1].trim();
    }
    input
}

/// True if the opening parenthesis at index 0 is closed by the last
/// character.
fn closes_at_end(input: &str) -> bool {
    let mut quotes = QuoteState::default();
    let mut depth = 0i32;
    let last = input.len() - 1;
    for (i, c) in input.char_indices() {
        if !quotes.feed(c) {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth == 0 {
            return i == last;
        }
    }
    false
}

fn split_top_level(input: &str) -> (Vec<&str>, Vec<LogicalOperator>) {
    let mut quotes = QuoteState::default();
    let mut depth = 0i32;
    let mut tokens = Vec::new();
    let mut operators = Vec::new();
    let mut start = 0;

    for (i, c) in input.char_indices() {
        if !quotes.feed(c) {
            continue;
        }
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            '&' | '|' if depth == 0 => {
                tokens.push(input[start..i].trim());
                operators.push(if c == '&' {
                    LogicalOperator::And
                } else {
                    LogicalOperator::Or
                });
                start = i + 1;
            }
            _ => {}
        }
    }
    tokens.push(input[start..].trim());
    (tokens, operators)
}

fn parse_condition(input: &str) -> ParseResult<Condition> {
    if let Some(condition) = parse_keyword_condition(input)? {
        return Ok(condition);
    }

    for (symbol, operation) in SYMBOLS {
        let Some(index) = find_operator(input, symbol) else {
            continue;
        };
        if index == 0 {
            continue;
        }
        let attribute = input[..index].trim();
        let value = parse_value(input[index + symbol.len()..].trim())?;
        return Ok(Condition {
            attribute: attribute.to_string(),
            operation: *operation,
            value,
        });
    }

    Err(QuerySyntaxError::new(format!(
        "Invalid condition: '{}'. Expected format: field operator value. \
         Supported operators: =, !=, ~, !~, >, <, >=, <=, IS NULL, IS NOT NULL, IN, NOT IN",
        input
    )))
}

/// Handles `attr IS [NOT] NULL` and `attr [NOT] IN (...)`.
fn parse_keyword_condition(input: &str) -> ParseResult<Option<Condition>> {
    let input = input.trim();
    let attribute_end = input
        .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '.' | '[' | ']')))
        .unwrap_or(input.len());
    let (attribute, rest) = input.split_at(attribute_end);
    if attribute.is_empty() || !rest.starts_with(char::is_whitespace) {
        return Ok(None);
    }

    let words: Vec<&str> = rest.split_whitespace().collect();
    let upper: Vec<String> = words.iter().map(|w| w.to_ascii_uppercase()).collect();
    let upper: Vec<&str> = upper.iter().map(String::as_str).collect();

    let null_check = match upper.as_slice() {
        ["IS", "NULL"] => Some(SearchOperation::IsNull),
        ["IS", "NOT", "NULL"] => Some(SearchOperation::IsNotNull),
        _ => None,
    };
    if let Some(operation) = null_check {
        return Ok(Some(Condition {
            attribute: attribute.to_string(),
            operation,
            value: Literal::Null,
        }));
    }

    let rest = rest.trim_start();
    let (operation, after_keyword) = if let Some(r) = strip_keyword(rest, "NOT") {
        match strip_keyword(r.trim_start(), "IN") {
            Some(r) => (SearchOperation::NotIn, r),
            None => return Ok(None),
        }
    } else if let Some(r) = strip_keyword(rest, "IN") {
        (SearchOperation::In, r)
    } else {
        return Ok(None);
    };

    let list = after_keyword.trim();
    let Some(inner) = list.strip_prefix('(').and_then(|l| l.strip_suffix(')')) else {
        return Ok(None);
    };
    let values = parse_in_values(inner)?;
    Ok(Some(Condition {
        attribute: attribute.to_string(),
        operation,
        value: Literal::List(values),
    }))
}

/// Strips a case-insensitive keyword followed by whitespace or `(`.
fn strip_keyword<'a>(input: &'a str, keyword: &str) -> Option<&'a str> {
    let head = input.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &input[keyword.len()..];
    (rest.starts_with(char::is_whitespace) || rest.starts_with('(')).then_some(rest)
}

fn find_operator(input: &str, symbol: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut quotes = QuoteState::default();

    for (i, c) in input.char_indices() {
        if !quotes.feed(c) || !input[i..].starts_with(symbol) {
            continue;
        }
        let prev = i.checked_sub(1).map(|p| bytes[p]);
        let next = bytes.get(i + symbol.len()).copied();
        let part_of_longer = match symbol {
            "=" => matches!(prev, Some(b'!' | b'>' | b'<')),
            "~" => prev == Some(b'!'),
            ">" | "<" => next == Some(b'='),
            _ => false,
        };
        if !part_of_longer {
            return Some(i);
        }
    }
    None
}

fn parse_in_values(inner: &str) -> ParseResult<Vec<Literal>> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut quotes = QuoteState::default();

    for c in inner.chars() {
        let was_escaped = quotes.escaped;
        let outside = quotes.feed(c);
        if outside && c == ',' {
            push_in_value(&mut values, &mut current);
            continue;
        }
        let delimiter = !outside && !was_escaped && (c == '\'' || c == '"' || c == '\\');
        if outside || !delimiter {
            current.push(c);
        }
    }
    push_in_value(&mut values, &mut current);

    if values.is_empty() {
        return Err(QuerySyntaxError::new("IN clause requires at least one value"));
    }
    Ok(values)
}

fn push_in_value(values: &mut Vec<Literal>, current: &mut String) {
    let value = current.trim();
    if !value.is_empty() {
        values.push(Literal::Text(value.to_string()));
    }
    current.clear();
}

/// Parses the right-hand side of a comparison.
///
/// Quoted values are text. Bare `true`, `false` and `null` are keywords and
/// bare numbers are numeric; anything else is text.
fn parse_value(raw: &str) -> ParseResult<Literal> {
    if raw.is_empty() {
        return Err(QuerySyntaxError::new("Missing value after operator"));
    }

    for quote in ['\'', '"'] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            let inner = &raw[1..raw.len() - 1];
            return Ok(Literal::Text(
                inner.replace("\\'", "'").replace("\\\"", "\""),
            ));
        }
    }

    if raw.eq_ignore_ascii_case("true") {
        return Ok(Literal::Bool(true));
    }
    if raw.eq_ignore_ascii_case("false") {
        return Ok(Literal::Bool(false));
    }
    if raw.eq_ignore_ascii_case("null") {
        return Ok(Literal::Null);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Literal::Integer(i));
    }
    if raw.contains('.') {
        if let Ok(f) = raw.parse::<f64>() {
            return Ok(Literal::Float(f));
        }
    }
    Ok(Literal::Text(raw.to_string()))
}
