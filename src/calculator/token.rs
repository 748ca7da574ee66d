use std::fmt;

use super::EvalError;

/// Binary operators of the accepted grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl Operator {
    /// Binding strength; every operator is left-associative, `^` included.
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Add | Operator::Sub => 1,
            Operator::Mul | Operator::Div => 2,
            Operator::Pow => 3,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
            Operator::Pow => '^',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Sub),
            '*' => Some(Operator::Mul),
            '/' => Some(Operator::Div),
            '^' => Some(Operator::Pow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A numeric literal, possibly carrying a folded unary minus.
    /// `text` is kept verbatim so tokens render back to their source.
    Number { text: String, value: f64 },
    Operator(Operator),
    LeftParen,
    RightParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number { text, .. } => f.write_str(text),
            Token::Operator(op) => write!(f, "{}", op.symbol()),
            Token::LeftParen => f.write_str("("),
            Token::RightParen => f.write_str(")"),
        }
    }
}

fn is_permitted(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | '*' | '/' | '^' | '(' | ')' | ' ')
}

/// Splits an expression into tokens.
///
/// Spaces are dropped first. A `-` at the very start or right after `(` is the
/// sign of the number that follows and becomes part of its token; any other `-`
/// is the subtraction operator.
pub fn tokenize(expr: &str) -> Result<Vec<Token>, EvalError> {
    if let Some(bad) = expr.chars().find(|c| !is_permitted(*c)) {
        return Err(EvalError::InvalidCharacter(bad));
    }

    let mut tokens = Vec::new();
    let mut number = String::new();
    let mut prev: Option<char> = None;

    for c in expr.chars().filter(|c| *c != ' ') {
        match c {
            '0'..='9' | '.' => number.push(c),
            '-' if matches!(prev, None | Some('(')) => number.push(c),
            '(' => {
                flush_number(&mut number, &mut tokens)?;
                tokens.push(Token::LeftParen);
            }
            ')' => {
                flush_number(&mut number, &mut tokens)?;
                tokens.push(Token::RightParen);
            }
            other => {
                flush_number(&mut number, &mut tokens)?;
                let op = Operator::from_char(other).ok_or(EvalError::InvalidCharacter(other))?;
                tokens.push(Token::Operator(op));
            }
        }
        prev = Some(c);
    }
    flush_number(&mut number, &mut tokens)?;

    Ok(tokens)
}

fn flush_number(buf: &mut String, tokens: &mut Vec<Token>) -> Result<(), EvalError> {
    if buf.is_empty() {
        return Ok(());
    }
    let text = std::mem::take(buf);

    // A sign with no digits behind it (`-(`, `--`) stays an ordinary minus.
    if text == "-" {
        tokens.push(Token::Operator(Operator::Sub));
        return Ok(());
    }

    if !is_well_formed_number(&text) {
        return Err(EvalError::InvalidExpression);
    }
    let value = text
        .parse::<f64>()
        .map_err(|_| EvalError::InvalidExpression)?;
    tokens.push(Token::Number { text, value });
    Ok(())
}

/// `-? digit+ ('.' digit+)?`
fn is_well_formed_number(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (unsigned, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(int_part) && frac_part.map_or(true, all_digits)
}
