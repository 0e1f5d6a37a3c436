//! Formula engine for observable formulas, noise formulas and expected
//! simulation values of test cases.
//!
//! Supports arithmetic (+, -, *, /, ^ or **), comparisons (==, !=, <, <=, >,
//! >=), boolean operators (&&, ||, !), and built-in functions (abs, sqrt,
//! exp, log, ln, log10, log2, pow, min, max, conversion_a, conversion_b).

use pt_core::{Error, Result};

use crate::analytical;

// ── AST ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Expr {
    Number(f64),
    Var(usize), // index into symbols
    UnaryNeg(Box<Expr>),
    UnaryNot(Box<Expr>),
    BinOp(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy)]
enum Func {
    Abs,
    Sqrt,
    Exp,
    Ln,
    Log,
    Log10,
    Log2,
    Pow,
    Min,
    Max,
    ConversionA,
    ConversionB,
}

impl Func {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Func::Abs,
            "sqrt" => Func::Sqrt,
            "exp" => Func::Exp,
            "ln" => Func::Ln,
            "log" => Func::Log,
            "log10" => Func::Log10,
            "log2" => Func::Log2,
            "pow" => Func::Pow,
            "min" => Func::Min,
            "max" => Func::Max,
            "conversion_a" => Func::ConversionA,
            "conversion_b" => Func::ConversionB,
            _ => return None,
        })
    }

    /// Accepted argument counts (inclusive range).
    fn arity(&self) -> (usize, usize) {
        match self {
            Func::Abs | Func::Sqrt | Func::Exp | Func::Ln | Func::Log10 | Func::Log2 => (1, 1),
            // log(x) is natural, log(x, base) is explicit
            Func::Log => (1, 2),
            Func::Pow | Func::Min | Func::Max => (2, 2),
            Func::ConversionA | Func::ConversionB => (5, 5),
        }
    }
}

// ── Compiled expression ────────────────────────────────────────

/// A compiled expression ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    ast: Expr,
    /// Free symbols referenced by this expression (ordered by first occurrence).
    pub symbols: Vec<String>,
}

impl CompiledExpr {
    /// Parse and compile an expression string.
    pub fn compile(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(Error::Validation("empty expression".to_string()));
        }
        let mut parser = Parser::new(&tokens);
        let ast = parser.parse_or()?;
        if parser.pos < parser.tokens.len() {
            return Err(Error::Validation(format!(
                "unexpected token after expression in '{input}': {:?}",
                parser.tokens[parser.pos]
            )));
        }
        let symbols = std::mem::take(&mut parser.symbols);
        Ok(CompiledExpr { ast, symbols })
    }

    /// Evaluate with positional symbol values.
    ///
    /// `values` must have the same length and order as `symbols`.
    pub fn eval_row(&self, values: &[f64]) -> f64 {
        eval_expr(&self.ast, values)
    }

    /// Evaluate, resolving every symbol through `lookup`.
    pub fn eval_with<F>(&self, lookup: F) -> Result<f64>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let mut values = Vec::with_capacity(self.symbols.len());
        for s in &self.symbols {
            let v = lookup(s)
                .ok_or_else(|| Error::Computation(format!("unresolved symbol '{s}'")))?;
            values.push(v);
        }
        Ok(self.eval_row(&values))
    }
}

/// Compile and evaluate in one go.
pub fn evaluate<F>(input: &str, lookup: F) -> Result<f64>
where
    F: Fn(&str) -> Option<f64>,
{
    CompiledExpr::compile(input)?.eval_with(lookup)
}

// ── Evaluation ─────────────────────────────────────────────────

fn truth(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn eval_expr(e: &Expr, vals: &[f64]) -> f64 {
    match e {
        Expr::Number(n) => *n,
        Expr::Var(i) => vals[*i],
        Expr::UnaryNeg(a) => -eval_expr(a, vals),
        Expr::UnaryNot(a) => truth(eval_expr(a, vals) <= 0.0),
        Expr::BinOp(op, a, b) => {
            let lhs = eval_expr(a, vals);
            let rhs = eval_expr(b, vals);
            match op {
                BinOp::Add => lhs + rhs,
                BinOp::Sub => lhs - rhs,
                BinOp::Mul => lhs * rhs,
                BinOp::Div => lhs / rhs,
                BinOp::Pow => lhs.powf(rhs),
                BinOp::Eq => truth((lhs - rhs).abs() < f64::EPSILON),
                BinOp::Ne => truth((lhs - rhs).abs() >= f64::EPSILON),
                BinOp::Lt => truth(lhs < rhs),
                BinOp::Le => truth(lhs <= rhs),
                BinOp::Gt => truth(lhs > rhs),
                BinOp::Ge => truth(lhs >= rhs),
                BinOp::And => truth(lhs > 0.0 && rhs > 0.0),
                BinOp::Or => truth(lhs > 0.0 || rhs > 0.0),
            }
        }
        Expr::Call(f, args) => {
            let arg = |i: usize| eval_expr(&args[i], vals);
            match f {
                Func::Abs => arg(0).abs(),
                Func::Sqrt => arg(0).sqrt(),
                Func::Exp => arg(0).exp(),
                Func::Ln => arg(0).ln(),
                Func::Log => {
                    if args.len() == 2 {
                        arg(0).log(arg(1))
                    } else {
                        arg(0).ln()
                    }
                }
                Func::Log10 => arg(0).log10(),
                Func::Log2 => arg(0).log2(),
                Func::Pow => arg(0).powf(arg(1)),
                Func::Min => arg(0).min(arg(1)),
                Func::Max => arg(0).max(arg(1)),
                Func::ConversionA => analytical::conversion_a(arg(0), arg(1), arg(2), arg(3), arg(4)),
                Func::ConversionB => analytical::conversion_b(arg(0), arg(1), arg(2), arg(3), arg(4)),
            }
        }
    }
}

// ── Tokenizer ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Two-character operators
        if i + 1 < chars.len() {
            let two: String = chars[i..i + 2].iter().collect();
            let tok = match two.as_str() {
                "&&" => Some(Token::And),
                "||" => Some(Token::Or),
                "==" => Some(Token::Eq),
                "!=" => Some(Token::Ne),
                "<=" => Some(Token::Le),
                ">=" => Some(Token::Ge),
                "**" => Some(Token::Caret),
                _ => None,
            };
            if let Some(t) = tok {
                tokens.push(t);
                i += 2;
                continue;
            }
        }

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            '<' => Some(Token::Lt),
            '>' => Some(Token::Gt),
            '!' => Some(Token::Not),
            _ => None,
        };
        if let Some(t) = single {
            tokens.push(t);
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_ascii_digit()
                    || chars[i] == '.'
                    || chars[i] == 'e'
                    || chars[i] == 'E'
                    || ((chars[i] == '+' || chars[i] == '-')
                        && i > start
                        && (chars[i - 1] == 'e' || chars[i - 1] == 'E')))
            {
                i += 1;
            }
            let s: String = chars[start..i].iter().collect();
            let n: f64 =
                s.parse().map_err(|_| Error::Validation(format!("invalid number: '{s}'")))?;
            tokens.push(Token::Num(n));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            return Err(Error::Validation(format!("unexpected character: '{c}'")));
        }
    }

    Ok(tokens)
}

// ── Parser (recursive descent) ─────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    symbols: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0, symbols: Vec::new() }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(t) if t == expected => Ok(()),
            other => Err(Error::Validation(format!("expected {expected:?}, got {other:?}"))),
        }
    }

    fn resolve_var(&mut self, name: &str) -> usize {
        if let Some(i) = self.symbols.iter().position(|b| b == name) {
            i
        } else {
            self.symbols.push(name.to_string());
            self.symbols.len() - 1
        }
    }

    // ── Grammar rules ──────────────────────────────────────────

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::BinOp(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_cmp()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let rhs = self.parse_cmp()?;
            lhs = Expr::BinOp(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<Expr> {
        let lhs = self.parse_add()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinOp::Eq,
            Some(Token::Ne) => BinOp::Ne,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_add()?;
        Ok(Expr::BinOp(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_add(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = Expr::BinOp(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::BinOp(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                let e = self.parse_unary()?;
                Ok(Expr::UnaryNeg(Box::new(e)))
            }
            Some(Token::Plus) => {
                self.advance();
                self.parse_unary()
            }
            Some(Token::Not) => {
                self.advance();
                let e = self.parse_unary()?;
                Ok(Expr::UnaryNot(Box::new(e)))
            }
            _ => self.parse_pow(),
        }
    }

    // right-associative, binds tighter than unary minus: -x^2 == -(x^2)
    fn parse_pow(&mut self) -> Result<Expr> {
        let base = self.parse_atom()?;
        if matches!(self.peek(), Some(Token::Caret)) {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(Expr::BinOp(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.advance().cloned() {
            Some(Token::Num(n)) => Ok(Expr::Number(n)),
            Some(Token::LParen) => {
                let e = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(e)
            }
            Some(Token::Ident(name)) => {
                if !matches!(self.peek(), Some(Token::LParen)) {
                    let idx = self.resolve_var(&name);
                    return Ok(Expr::Var(idx));
                }
                self.advance(); // consume '('
                let func = Func::lookup(&name)
                    .ok_or_else(|| Error::Validation(format!("unknown function: '{name}'")))?;
                let mut args = vec![self.parse_or()?];
                while matches!(self.peek(), Some(Token::Comma)) {
                    self.advance();
                    args.push(self.parse_or()?);
                }
                self.expect(&Token::RParen)?;
                let (lo, hi) = func.arity();
                if args.len() < lo || args.len() > hi {
                    return Err(Error::Validation(format!(
                        "function '{name}' takes {lo}..={hi} arguments, got {}",
                        args.len()
                    )));
                }
                Ok(Expr::Call(func, args))
            }
            other => Err(Error::Validation(format!(
                "expected number, identifier, or '(', got {other:?}"
            ))),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_arithmetic() {
        let e = CompiledExpr::compile("2 + 3 * 4").unwrap();
        assert!(e.symbols.is_empty());
        assert!((e.eval_row(&[]) - 14.0).abs() < 1e-10);
    }

    #[test]
    fn observable_formula_symbols() {
        let e = CompiledExpr::compile("scaling_A * A + offset_A").unwrap();
        assert_eq!(e.symbols, vec!["scaling_A", "A", "offset_A"]);
        assert!((e.eval_row(&[0.5, 0.4, 2.0]) - 2.2).abs() < 1e-12);
    }

    #[test]
    fn power_operators() {
        let e = CompiledExpr::compile("x^2 + x**3").unwrap();
        assert!((e.eval_row(&[2.0]) - 12.0).abs() < 1e-12);
        let e = CompiledExpr::compile("-x^2").unwrap();
        assert!((e.eval_row(&[3.0]) + 9.0).abs() < 1e-12);
        let e = CompiledExpr::compile("2^3^2").unwrap();
        assert!((e.eval_row(&[]) - 512.0).abs() < 1e-9);
    }

    #[test]
    fn functions() {
        assert!((evaluate("sqrt(9)", |_| None).unwrap() - 3.0).abs() < 1e-12);
        assert!((evaluate("log10(1000)", |_| None).unwrap() - 3.0).abs() < 1e-12);
        assert!((evaluate("log(8, 2)", |_| None).unwrap() - 3.0).abs() < 1e-12);
        assert!((evaluate("max(a, b)", |s| if s == "a" { Some(3.0) } else { Some(7.0) })
            .unwrap()
            - 7.0)
            .abs()
            < 1e-12);
    }

    #[test]
    fn conversion_functions() {
        let v = evaluate("conversion_a(t, 1, 0, 0.8, 0.6)", |s| (s == "t").then_some(0.0)).unwrap();
        assert!((v - 1.0).abs() < 1e-12);
        let v = evaluate("conversion_b(0, 1, 0, 0.8, 0.6)", |_| None).unwrap();
        assert!(v.abs() < 1e-12);
    }

    #[test]
    fn arity_checked() {
        assert!(CompiledExpr::compile("pow(2)").is_err());
        assert!(CompiledExpr::compile("conversion_a(1, 2)").is_err());
        assert!(CompiledExpr::compile("nope(1)").is_err());
    }

    #[test]
    fn unresolved_symbol_is_error() {
        let err = evaluate("k1 * 2", |_| None).unwrap_err();
        assert!(err.to_string().contains("k1"));
    }

    #[test]
    fn comparison_and_boolean() {
        let e = CompiledExpr::compile("t >= 4 && x > 25.0").unwrap();
        assert!((e.eval_row(&[4.0, 30.0]) - 1.0).abs() < 1e-10);
        assert!((e.eval_row(&[3.0, 30.0]) - 0.0).abs() < 1e-10);
        let e = CompiledExpr::compile("!(x > 3)").unwrap();
        assert!((e.eval_row(&[2.0]) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn malformed_input() {
        assert!(CompiledExpr::compile("").is_err());
        assert!(CompiledExpr::compile("1 +").is_err());
        assert!(CompiledExpr::compile("(1 + 2").is_err());
        assert!(CompiledExpr::compile("1 $ 2").is_err());
    }

    #[test]
    fn scientific_notation() {
        let e = CompiledExpr::compile("1.5e2 + 3.0E-1").unwrap();
        assert!((e.eval_row(&[]) - 150.3).abs() < 1e-10);
    }
}
