//! Arithmetic formulas for invoice rules.
//!
//! A formula is parsed once into an expression tree and evaluated against named `f64`
//! variables. Supported syntax: decimal literals, identifiers, `+ - * / %`, parentheses,
//! unary minus and the functions `min`, `max`, `round`, `ceil`, `floor` and `abs`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::iter::Peekable;
use std::str::{CharIndices, FromStr};

use thiserror::Error;

const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,
    #[error("unexpected character '{found}' at position {position}")]
    UnexpectedCharacter { found: char, position: usize },
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unexpected {0}")]
    UnexpectedToken(String),
    #[error("formula ends unexpectedly")]
    UnexpectedEnd,
    #[error("formula nests deeper than {MAX_DEPTH} levels")]
    TooDeep,
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("{function} expects {expected} argument(s), got {found}")]
    WrongArity {
        function: &'static str,
        expected: &'static str,
        found: usize,
    },
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a finite number")]
    NotFinite,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(value) => write!(f, "number {value}"),
            Token::Ident(name) => write!(f, "identifier '{name}'"),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Star => f.write_str("'*'"),
            Token::Slash => f.write_str("'/'"),
            Token::Percent => f.write_str("'%'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, FormulaError> {
    let mut chars: Peekable<CharIndices<'_>> = source.char_indices().peekable();
    let mut tokens = Vec::new();
    while let Some(&(position, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        literal.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| FormulaError::InvalidNumber(literal.clone()))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            _ => {
                let token = match ch {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    found => {
                        return Err(FormulaError::UnexpectedCharacter { found, position });
                    }
                };
                tokens.push(token);
                chars.next();
            }
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Min,
    Max,
    Round,
    Ceil,
    Floor,
    Abs,
}

impl Function {
    fn parse(name: &str) -> Result<Self, FormulaError> {
        match name.to_ascii_lowercase().as_str() {
            "min" => Ok(Function::Min),
            "max" => Ok(Function::Max),
            "round" => Ok(Function::Round),
            "ceil" => Ok(Function::Ceil),
            "floor" => Ok(Function::Floor),
            "abs" => Ok(Function::Abs),
            _ => Err(FormulaError::UnknownFunction(name.to_string())),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Function::Min => "min",
            Function::Max => "max",
            Function::Round => "round",
            Function::Ceil => "ceil",
            Function::Floor => "floor",
            Function::Abs => "abs",
        }
    }

    fn check_arity(self, found: usize) -> Result<(), FormulaError> {
        let (accepted, expected) = match self {
            Function::Min | Function::Max => (found >= 1, "at least 1"),
            Function::Round => ((1..=2).contains(&found), "1 or 2"),
            Function::Ceil | Function::Floor | Function::Abs => (found == 1, "1"),
        };
        if accepted {
            Ok(())
        } else {
            Err(FormulaError::WrongArity {
                function: self.name(),
                expected,
                found,
            })
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        match self {
            Function::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Function::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Function::Round => {
                let digits = args.get(1).copied().unwrap_or(0.0).trunc();
                let scale = 10f64.powf(digits);
                (args[0] * scale).round() / scale
            }
            Function::Ceil => args[0].ceil(),
            Function::Floor => args[0].floor(),
            Function::Abs => args[0].abs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Variable(String),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), FormulaError> {
        match self.advance() {
            Some(token) if &token == expected => Ok(()),
            Some(token) => Err(FormulaError::UnexpectedToken(token.to_string())),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep);
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr, FormulaError> {
        self.descend()?;
        let mut left = self.term()?;
        while let Some(op) = match self.peek() {
            Some(Token::Plus) => Some(BinaryOp::Add),
            Some(Token::Minus) => Some(BinaryOp::Sub),
            _ => None,
        } {
            self.position += 1;
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth -= 1;
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.unary()?;
        while let Some(op) = match self.peek() {
            Some(Token::Star) => Some(BinaryOp::Mul),
            Some(Token::Slash) => Some(BinaryOp::Div),
            Some(Token::Percent) => Some(BinaryOp::Rem),
            _ => None,
        } {
            self.position += 1;
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        let negate = match self.peek() {
            Some(Token::Minus) => true,
            Some(Token::Plus) => false,
            _ => return self.primary(),
        };
        self.position += 1;
        self.descend()?;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(if negate {
            Expr::Negate(Box::new(operand))
        } else {
            operand
        })
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Ident(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(Expr::Variable(name));
                }
                let function = Function::parse(&name)?;
                self.position += 1;
                let mut args = Vec::new();
                if self.peek() != Some(&Token::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if self.peek() == Some(&Token::Comma) {
                            self.position += 1;
                        } else {
                            break;
                        }
                    }
                }
                self.expect(&Token::RParen)?;
                function.check_arity(args.len())?;
                Ok(Expr::Call { function, args })
            }
            Some(Token::LParen) => {
                let inner = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(token) => Err(FormulaError::UnexpectedToken(token.to_string())),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

fn evaluate(expr: &Expr, variables: &BTreeMap<String, f64>) -> Result<f64, FormulaError> {
    let value = match expr {
        Expr::Number(value) => *value,
        Expr::Variable(name) => *variables
            .get(name)
            .ok_or_else(|| FormulaError::UnknownVariable(name.clone()))?,
        Expr::Negate(operand) => -evaluate(operand, variables)?,
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, variables)?;
            let right = evaluate(right, variables)?;
            match op {
                BinaryOp::Add => left + right,
                BinaryOp::Sub => left - right,
                BinaryOp::Mul => left * right,
                BinaryOp::Div | BinaryOp::Rem if right == 0.0 => {
                    return Err(FormulaError::DivisionByZero)
                }
                BinaryOp::Div => left / right,
                BinaryOp::Rem => left % right,
            }
        }
        Expr::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, variables))
                .collect::<Result<Vec<_>, _>>()?;
            function.apply(&args)
        }
    };
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FormulaError::NotFinite)
    }
}

fn collect_variables<'a>(expr: &'a Expr, names: &mut BTreeSet<&'a str>) {
    match expr {
        Expr::Number(_) => {}
        Expr::Variable(name) => {
            names.insert(name);
        }
        Expr::Negate(operand) => collect_variables(operand, names),
        Expr::Binary { left, right, .. } => {
            collect_variables(left, names);
            collect_variables(right, names);
        }
        Expr::Call { args, .. } => {
            for arg in args {
                collect_variables(arg, names);
            }
        }
    }
}

/// A parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    root: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }
        let mut parser = Parser {
            tokens,
            position: 0,
            depth: 0,
        };
        let root = parser.expression()?;
        if let Some(token) = parser.peek() {
            return Err(FormulaError::UnexpectedToken(token.to_string()));
        }
        Ok(Self { root })
    }

    pub fn evaluate(&self, variables: &BTreeMap<String, f64>) -> Result<f64, FormulaError> {
        evaluate(&self.root, variables)
    }

    /// Names the formula reads, in sorted order.
    pub fn variables(&self) -> Vec<&str> {
        let mut names = BTreeSet::new();
        collect_variables(&self.root, &mut names);
        names.into_iter().collect()
    }
}

impl FromStr for Formula {
    type Err = FormulaError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Formula::parse(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }

    fn eval(source: &str, pairs: &[(&str, f64)]) -> Result<f64, FormulaError> {
        Formula::parse(source)?.evaluate(&vars(pairs))
    }

    #[test]
    fn precedence_and_grouping() {
        assert_eq!(eval("2 + 3 * 4", &[]), Ok(14.0));
        assert_eq!(eval("(2 + 3) * 4", &[]), Ok(20.0));
        assert_eq!(eval("10 - 4 - 3", &[]), Ok(3.0));
        assert_eq!(eval("-2 * -3", &[]), Ok(6.0));
        assert_eq!(eval("17 % 5", &[]), Ok(2.0));
    }

    #[test]
    fn fee_formula_with_variables_and_functions() {
        let fee = eval(
            "round(max(base_fee, area * rate_per_m2) * (1 + surcharge / 100), 2)",
            &[
                ("base_fee", 150_000.0),
                ("area", 72.5),
                ("rate_per_m2", 2_500.0),
                ("surcharge", 3.0),
            ],
        );
        assert_eq!(fee, Ok(186_687.5));
        assert_eq!(eval("floor(7.9) + ceil(0.1) + abs(-2)", &[]), Ok(10.0));
        assert_eq!(eval("min(3, 1, 2)", &[]), Ok(1.0));
    }

    #[test]
    fn evaluation_errors_are_reported() {
        assert_eq!(
            eval("amount * rate", &[("amount", 1.0)]),
            Err(FormulaError::UnknownVariable("rate".to_string()))
        );
        assert_eq!(eval("1 / (2 - 2)", &[]), Err(FormulaError::DivisionByZero));
        assert_eq!(eval("5 % 0", &[]), Err(FormulaError::DivisionByZero));
    }

    #[test]
    fn malformed_formulas_are_rejected() {
        assert_eq!(Formula::parse("   "), Err(FormulaError::Empty));
        assert_eq!(Formula::parse("2 +"), Err(FormulaError::UnexpectedEnd));
        assert!(matches!(
            Formula::parse("2 $ 3"),
            Err(FormulaError::UnexpectedCharacter { found: '$', position: 2 })
        ));
        assert!(matches!(
            Formula::parse("(1 + 2"),
            Err(FormulaError::UnexpectedEnd)
        ));
        assert!(matches!(
            Formula::parse("1 2"),
            Err(FormulaError::UnexpectedToken(_))
        ));
        assert!(matches!(
            Formula::parse("sqrt(4)"),
            Err(FormulaError::UnknownFunction(_))
        ));
        assert!(matches!(
            Formula::parse("abs(1, 2)"),
            Err(FormulaError::WrongArity { function: "abs", .. })
        ));
        assert!(matches!(
            Formula::parse("1.2.3"),
            Err(FormulaError::InvalidNumber(_))
        ));
        let nested = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(Formula::parse(&nested), Err(FormulaError::TooDeep));
    }

    #[test]
    fn lists_the_variables_it_reads() {
        let formula: Formula = "area * rate + max(area, minimum)".parse().expect("parses");
        assert_eq!(formula.variables(), vec!["area", "minimum", "rate"]);
    }
}
