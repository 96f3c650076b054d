use crate::error::CoreError;
use crate::expr::Expr;
use crate::step::FieldExpr;

///
/// Expression parser
///
/// A small precedence-climbing parser for the expression language spec.md
/// §4.3 defines: identifiers, numeric/string/bool literals, `timestamp`,
/// `== != < <= > >= && || !`, and parenthesized grouping.
///

#[derive(Debug, PartialEq, Clone)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

fn tokenize(src: &str) -> Result<Vec<Token>, CoreError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    s.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(CoreError::BadQuery(format!("unterminated string in expression: {src}")));
                }
                i += 1;
                tokens.push(Token::Str(s));
            }
            '=' | '!' | '<' | '>' | '&' | '|' => {
                let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                let op = match two.as_str() {
                    "==" => Some(("==", 2)),
                    "!=" => Some(("!=", 2)),
                    "<=" => Some(("<=", 2)),
                    ">=" => Some((">=", 2)),
                    "&&" => Some(("&&", 2)),
                    "||" => Some(("||", 2)),
                    _ => None,
                };
                if let Some((op, len)) = op {
                    tokens.push(Token::Op(op));
                    i += len;
                } else {
                    let op = match c {
                        '<' => "<",
                        '>' => ">",
                        '!' => "!",
                        other => {
                            return Err(CoreError::BadQuery(format!("unexpected character '{other}' in expression: {src}")))
                        }
                    };
                    tokens.push(Token::Op(op));
                    i += 1;
                }
            }
            _ if c.is_ascii_digit() => {
                let start = i;
                let mut is_float = false;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    if chars[i] == '.' {
                        is_float = true;
                    }
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                if is_float {
                    tokens.push(Token::Float(text.parse().map_err(|_| {
                        CoreError::BadQuery(format!("invalid number in expression: {text}"))
                    })?));
                } else {
                    tokens.push(Token::Int(text.parse().map_err(|_| {
                        CoreError::BadQuery(format!("invalid number in expression: {text}"))
                    })?));
                }
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                match text.as_str() {
                    "true" => tokens.push(Token::Int(1).pipe_bool(true)),
                    "false" => tokens.push(Token::Int(0).pipe_bool(false)),
                    _ => tokens.push(Token::Ident(text)),
                }
            }
            other => return Err(CoreError::BadQuery(format!("unexpected character '{other}' in expression: {src}"))),
        }
    }
    Ok(tokens)
}

impl Token {
    /// `true`/`false` keywords tokenize to a dedicated boolean literal
    /// rather than `Int`; this helper keeps the match arm above terse.
    fn pipe_bool(self, value: bool) -> Token {
        Token::Op(if value { "true" } else { "false" })
    }
}

pub fn parse_expr(src: &str) -> Result<Expr, CoreError> {
    let tokens = tokenize(src)?;
    let mut p = Parser { tokens, pos: 0 };
    let expr = p.parse_or()?;
    if p.pos != p.tokens.len() {
        return Err(CoreError::BadQuery(format!("trailing tokens in expression: {src}")));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, CoreError> {
        let mut lhs = self.parse_and()?;
        while self.eat_op("||") {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, CoreError> {
        let mut lhs = self.parse_not()?;
        while self.eat_op("&&") {
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, CoreError> {
        if self.eat_op("!") {
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, CoreError> {
        let lhs = self.parse_primary()?;
        for (op, ctor) in [
            ("==", Expr::Eq as fn(Box<Expr>, Box<Expr>) -> Expr),
            ("!=", Expr::Ne),
            ("<=", Expr::Le),
            (">=", Expr::Ge),
            ("<", Expr::Lt),
            (">", Expr::Gt),
        ] {
            if self.eat_op(op) {
                let rhs = self.parse_primary()?;
                return Ok(ctor(Box::new(lhs), Box::new(rhs)));
            }
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Expr, CoreError> {
        match self.bump() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                if !matches!(self.bump(), Some(Token::RParen)) {
                    return Err(CoreError::BadQuery("unbalanced parentheses in expression".into()));
                }
                Ok(inner)
            }
            Some(Token::Ident(name)) if name == "timestamp" => Ok(Expr::Timestamp),
            Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
            Some(Token::Int(i)) => Ok(Expr::IntLit(i)),
            Some(Token::Float(f)) => Ok(Expr::FloatLit(f)),
            Some(Token::Str(s)) => Ok(Expr::StrLit(s)),
            Some(Token::Op("true")) => Ok(Expr::BoolLit(true)),
            Some(Token::Op("false")) => Ok(Expr::BoolLit(false)),
            other => Err(CoreError::BadQuery(format!("unexpected token in expression: {other:?}"))),
        }
    }
}

/// Parses an aggregator field expression: `count()`, `sum(x)`, `min(x)`,
/// `max(x)`, `histogram(x)` (spec.md §4.3).
pub fn parse_field_expr(src: &str) -> Result<FieldExpr, CoreError> {
    let src = src.trim();
    let open = src.find('(').ok_or_else(|| CoreError::BadQuery(format!("not an aggregator expression: {src}")))?;
    if !src.ends_with(')') {
        return Err(CoreError::BadQuery(format!("not an aggregator expression: {src}")));
    }
    let name = &src[..open];
    let arg = src[open + 1..src.len() - 1].trim();
    match name {
        "count" => Ok(FieldExpr::Count),
        "sum" => Ok(FieldExpr::Sum(require_arg(arg, "sum")?)),
        "min" => Ok(FieldExpr::Min(require_arg(arg, "min")?)),
        "max" => Ok(FieldExpr::Max(require_arg(arg, "max")?)),
        "histogram" => Ok(FieldExpr::Histogram(require_arg(arg, "histogram")?)),
        other => Err(CoreError::BadQuery(format!("unknown aggregator '{other}'"))),
    }
}

fn require_arg(arg: &str, aggregator: &str) -> Result<String, CoreError> {
    if arg.is_empty() {
        return Err(CoreError::BadQuery(format!("{aggregator}() requires one property argument")));
    }
    Ok(arg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timestamp_range() {
        let expr = parse_expr("timestamp >= 2 && timestamp < 6").unwrap();
        assert_eq!(
            expr,
            Expr::And(
                Box::new(Expr::Ge(Box::new(Expr::Timestamp), Box::new(Expr::IntLit(2)))),
                Box::new(Expr::Lt(Box::new(Expr::Timestamp), Box::new(Expr::IntLit(6)))),
            )
        );
    }

    #[test]
    fn parses_string_equality() {
        let expr = parse_expr("action == 'A0'").unwrap();
        assert_eq!(
            expr,
            Expr::Eq(Box::new(Expr::Ident("action".into())), Box::new(Expr::StrLit("A0".into())))
        );
    }

    #[test]
    fn parses_field_expressions() {
        assert_eq!(parse_field_expr("count()").unwrap(), FieldExpr::Count);
        assert_eq!(parse_field_expr("sum(price)").unwrap(), FieldExpr::Sum("price".into()));
    }
}
