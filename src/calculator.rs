//! Expression evaluator behind the `calculator` tool.
//!
//! Input comes straight from the model, so it is treated as untrusted: length
//! and nesting are bounded, every failure is a `CalcError`, and nothing panics.
//!
//! Supported:
//!   - `+ - * / % ^` (power is right-associative), unary sign, postfix `!`
//!   - implicit multiplication: `2pi`, `3(4 + 1)`
//!   - constants `pi`, `e`, `tau`
//!   - functions (`log(x)` is natural, `log(x, b)` takes a base)
//!   - units for length, mass, time, volume and angle, with `to`/`in` conversion:
//!     `5 km to m`, `60 km/h in m/s`, `sin(30 deg)`
//!
//! Results are rounded to 14 significant digits.

use std::f64::consts::{E, PI, TAU};

use thiserror::Error;

const MAX_LEN: usize = 512;
const MAX_DEPTH: usize = 64;
const SIGNIFICANT_DIGITS: usize = 14;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
  #[error("expression is empty")]
  Empty,
  #[error("expression is longer than 512 characters")]
  TooLong,
  #[error("expression nests deeper than 64 levels")]
  TooDeep,
  #[error("unexpected character '{0}' at position {1}")]
  UnexpectedChar(char, usize),
  #[error("invalid number '{0}'")]
  BadNumber(String),
  #[error("unexpected end of expression")]
  UnexpectedEnd,
  #[error("unexpected '{0}'")]
  UnexpectedToken(String),
  #[error("unknown identifier '{0}'")]
  UnknownIdentifier(String),
  #[error("{0}() expects {1}")]
  Arity(String, &'static str),
  #[error("incompatible units: {0}")]
  Units(String),
  #[error("{0}")]
  Domain(String),
  #[error("result is not a finite number")]
  NotFinite,
}

/// Evaluate an expression and render the result (with its unit, if any).
pub fn evaluate(expr: &str) -> Result<String, CalcError> {
  if expr.chars().count() > MAX_LEN {
    return Err(CalcError::TooLong);
  }
  if expr.trim().is_empty() {
    return Err(CalcError::Empty);
  }
  let tokens = tokenize(expr)?;
  let mut p = Parser { src: expr, tokens, pos: 0, depth: 0 };
  let value = p.parse_expr()?;

  let out = match p.peek() {
    None => render(&value)?,
    Some(Tok::Ident(kw)) if kw == "to" || kw == "in" => {
      p.pos += 1;
      let target_start = p.span_start().ok_or(CalcError::UnexpectedEnd)?;
      let target = p.parse_expr()?;
      if let Some(t) = p.peek() {
        return Err(CalcError::UnexpectedToken(t.to_string()));
      }
      convert(&value, &target, p.src[target_start..].trim())?
    }
    Some(t) => return Err(CalcError::UnexpectedToken(t.to_string())),
  };
  Ok(out)
}

// ---------- values ----------

/// Exponents of (length, mass, time). Angles are dimensionless radians.
type Dim = [i8; 3];
const SCALAR: Dim = [0, 0, 0];

#[derive(Debug, Clone, Copy, PartialEq)]
struct Quantity {
  value: f64,
  dim: Dim,
}

impl Quantity {
  fn scalar(value: f64) -> Self {
    Self { value, dim: SCALAR }
  }

  fn is_scalar(&self) -> bool {
    self.dim == SCALAR
  }
}

fn unit(name: &str) -> Option<(f64, Dim)> {
  const L: Dim = [1, 0, 0];
  const M: Dim = [0, 1, 0];
  const T: Dim = [0, 0, 1];
  const V: Dim = [3, 0, 0];
  let u = match name {
    "m" => (1.0, L),
    "km" => (1e3, L),
    "cm" => (1e-2, L),
    "mm" => (1e-3, L),
    "um" => (1e-6, L),
    "nm" => (1e-9, L),
    "inch" => (0.0254, L),
    "ft" => (0.3048, L),
    "yd" => (0.9144, L),
    "mi" => (1609.344, L),
    "g" => (1e-3, M),
    "kg" => (1.0, M),
    "mg" => (1e-6, M),
    "lb" => (0.45359237, M),
    "oz" => (0.028349523125, M),
    "s" => (1.0, T),
    "ms" => (1e-3, T),
    "min" => (60.0, T),
    "h" | "hr" => (3600.0, T),
    "day" => (86400.0, T),
    "L" => (1e-3, V),
    "mL" => (1e-6, V),
    "rad" => (1.0, SCALAR),
    "deg" => (PI / 180.0, SCALAR),
    _ => return None,
  };
  Some(u)
}

fn constant(name: &str) -> Option<f64> {
  match name {
    "pi" => Some(PI),
    "e" => Some(E),
    "tau" => Some(TAU),
    _ => None,
  }
}

fn dim_op(a: Dim, b: Dim, f: impl Fn(i8, i8) -> Option<i8>) -> Result<Dim, CalcError> {
  let mut out = SCALAR;
  for i in 0..3 {
    out[i] = f(a[i], b[i]).ok_or_else(|| CalcError::Units("unit exponent out of range".into()))?;
  }
  Ok(out)
}

fn dim_name(dim: Dim) -> String {
  if dim == SCALAR {
    return "dimensionless".into();
  }
  let mut parts = Vec::new();
  for (sym, exp) in ["m", "kg", "s"].iter().zip(dim.iter()) {
    match exp {
      0 => {}
      1 => parts.push(sym.to_string()),
      n => parts.push(format!("{sym}^{n}")),
    }
  }
  parts.join(" ")
}

fn require_scalar(fname: &str, q: &Quantity) -> Result<f64, CalcError> {
  if q.is_scalar() {
    Ok(q.value)
  } else {
    Err(CalcError::Units(format!("{fname}() needs a dimensionless argument, got {}", dim_name(q.dim))))
  }
}

fn same_dim(op: &str, a: &Quantity, b: &Quantity) -> Result<(), CalcError> {
  if a.dim == b.dim {
    Ok(())
  } else {
    Err(CalcError::Units(format!("cannot {op} {} and {}", dim_name(a.dim), dim_name(b.dim))))
  }
}

fn format_number(x: f64) -> Result<String, CalcError> {
  if !x.is_finite() {
    return Err(CalcError::NotFinite);
  }
  let rounded: f64 = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, x)
    .parse()
    .map_err(|_| CalcError::NotFinite)?;
  if rounded == 0.0 {
    return Ok("0".into());
  }
  let abs = rounded.abs();
  if !(1e-7..1e21).contains(&abs) {
    Ok(format!("{rounded:e}"))
  } else {
    Ok(format!("{rounded}"))
  }
}

fn render(q: &Quantity) -> Result<String, CalcError> {
  let n = format_number(q.value)?;
  if q.is_scalar() {
    Ok(n)
  } else {
    Ok(format!("{n} {}", dim_name(q.dim)))
  }
}

fn convert(value: &Quantity, target: &Quantity, target_text: &str) -> Result<String, CalcError> {
  if value.dim != target.dim {
    return Err(CalcError::Units(format!(
      "cannot convert {} to {target_text} ({})",
      dim_name(value.dim),
      dim_name(target.dim)
    )));
  }
  if target.value == 0.0 || !target.value.is_finite() {
    return Err(CalcError::Domain(format!("cannot convert to '{target_text}'")));
  }
  Ok(format!("{} {target_text}", format_number(value.value / target.value)?))
}

// ---------- lexing ----------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
  Num(f64),
  Ident(String),
  Op(char),
  LParen,
  RParen,
  Comma,
}

impl std::fmt::Display for Tok {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Tok::Num(n) => write!(f, "{n}"),
      Tok::Ident(s) => write!(f, "{s}"),
      Tok::Op(c) => write!(f, "{c}"),
      Tok::LParen => write!(f, "("),
      Tok::RParen => write!(f, ")"),
      Tok::Comma => write!(f, ","),
    }
  }
}

/// Tokens with their byte offset in the source.
fn tokenize(src: &str) -> Result<Vec<(Tok, usize)>, CalcError> {
  let chars: Vec<(usize, char)> = src.char_indices().collect();
  let mut out = Vec::new();
  let mut i = 0;
  while i < chars.len() {
    let (at, c) = chars[i];
    if c.is_whitespace() {
      i += 1;
      continue;
    }
    if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|(_, n)| n.is_ascii_digit())) {
      let start = i;
      while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
        i += 1;
      }
      // scientific suffix only when digits follow: "2e3" is a number, "2e" is 2 * e
      if i < chars.len() && (chars[i].1 == 'e' || chars[i].1 == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j].1 == '+' || chars[j].1 == '-') {
          j += 1;
        }
        if j < chars.len() && chars[j].1.is_ascii_digit() {
          i = j;
          while i < chars.len() && chars[i].1.is_ascii_digit() {
            i += 1;
          }
        }
      }
      let end = chars.get(i).map(|(b, _)| *b).unwrap_or(src.len());
      let text = &src[chars[start].0..end];
      let n: f64 = text.parse().map_err(|_| CalcError::BadNumber(text.to_string()))?;
      out.push((Tok::Num(n), at));
      continue;
    }
    if c.is_alphabetic() || c == '_' {
      let start = i;
      while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
        i += 1;
      }
      let end = chars.get(i).map(|(b, _)| *b).unwrap_or(src.len());
      out.push((Tok::Ident(src[chars[start].0..end].to_string()), at));
      continue;
    }
    let tok = match c {
      '+' | '-' | '/' | '%' | '^' | '!' => Tok::Op(c),
      '*' => {
        if chars.get(i + 1).is_some_and(|(_, n)| *n == '*') {
          i += 1;
          Tok::Op('^')
        } else {
          Tok::Op('*')
        }
      }
      '×' => Tok::Op('*'),
      '÷' => Tok::Op('/'),
      '(' => Tok::LParen,
      ')' => Tok::RParen,
      ',' => Tok::Comma,
      other => return Err(CalcError::UnexpectedChar(other, at)),
    };
    out.push((tok, at));
    i += 1;
  }
  Ok(out)
}

// ---------- parsing + evaluation ----------

struct Parser<'a> {
  src: &'a str,
  tokens: Vec<(Tok, usize)>,
  pos: usize,
  depth: usize,
}

impl<'a> Parser<'a> {
  fn peek(&self) -> Option<&Tok> {
    self.tokens.get(self.pos).map(|(t, _)| t)
  }

  fn peek_at(&self, offset: usize) -> Option<&Tok> {
    self.tokens.get(self.pos + offset).map(|(t, _)| t)
  }

  fn span_start(&self) -> Option<usize> {
    self.tokens.get(self.pos).map(|(_, at)| *at)
  }

  fn next(&mut self) -> Result<Tok, CalcError> {
    let t = self.tokens.get(self.pos).map(|(t, _)| t.clone()).ok_or(CalcError::UnexpectedEnd)?;
    self.pos += 1;
    Ok(t)
  }

  fn expect(&mut self, want: Tok) -> Result<(), CalcError> {
    let got = self.next()?;
    if got == want {
      Ok(())
    } else {
      Err(CalcError::UnexpectedToken(got.to_string()))
    }
  }

  fn descend(&mut self) -> Result<(), CalcError> {
    self.depth += 1;
    if self.depth > MAX_DEPTH {
      return Err(CalcError::TooDeep);
    }
    Ok(())
  }

  fn parse_expr(&mut self) -> Result<Quantity, CalcError> {
    self.descend()?;
    let mut lhs = self.parse_term()?;
    while let Some(Tok::Op(op @ ('+' | '-'))) = self.peek().cloned() {
      self.pos += 1;
      let rhs = self.parse_term()?;
      same_dim(if op == '+' { "add" } else { "subtract" }, &lhs, &rhs)?;
      lhs.value = if op == '+' { lhs.value + rhs.value } else { lhs.value - rhs.value };
    }
    self.depth -= 1;
    Ok(lhs)
  }

  fn starts_operand(&self) -> bool {
    match self.peek() {
      Some(Tok::Num(_)) | Some(Tok::LParen) => true,
      Some(Tok::Ident(s)) => s != "to" && s != "in",
      _ => false,
    }
  }

  fn parse_term(&mut self) -> Result<Quantity, CalcError> {
    let mut lhs = self.parse_unary()?;
    loop {
      let op = match self.peek() {
        Some(Tok::Op(c @ ('*' | '/' | '%'))) => {
          let c = *c;
          self.pos += 1;
          c
        }
        _ if self.starts_operand() => '*',
        _ => break,
      };
      let rhs = self.parse_unary()?;
      lhs = match op {
        '*' => Quantity { value: lhs.value * rhs.value, dim: dim_op(lhs.dim, rhs.dim, i8::checked_add)? },
        '/' => Quantity { value: lhs.value / rhs.value, dim: dim_op(lhs.dim, rhs.dim, i8::checked_sub)? },
        _ => {
          same_dim("take the remainder of", &lhs, &rhs)?;
          Quantity { value: lhs.value % rhs.value, dim: lhs.dim }
        }
      };
    }
    Ok(lhs)
  }

  fn parse_unary(&mut self) -> Result<Quantity, CalcError> {
    match self.peek() {
      Some(Tok::Op('-')) => {
        self.pos += 1;
        self.descend()?;
        let mut q = self.parse_unary()?;
        self.depth -= 1;
        q.value = -q.value;
        Ok(q)
      }
      Some(Tok::Op('+')) => {
        self.pos += 1;
        self.descend()?;
        let q = self.parse_unary()?;
        self.depth -= 1;
        Ok(q)
      }
      _ => self.parse_power(),
    }
  }

  fn parse_power(&mut self) -> Result<Quantity, CalcError> {
    let base = self.parse_postfix()?;
    if let Some(Tok::Op('^')) = self.peek() {
      self.pos += 1;
      // right-associative, and binds tighter than a leading minus on the exponent
      self.descend()?;
      let exp = self.parse_unary()?;
      self.depth -= 1;
      return pow(base, exp);
    }
    Ok(base)
  }

  fn parse_postfix(&mut self) -> Result<Quantity, CalcError> {
    let mut q = self.parse_primary()?;
    while let Some(Tok::Op('!')) = self.peek() {
      self.pos += 1;
      q = Quantity::scalar(factorial(require_scalar("factorial", &q)?)?);
    }
    Ok(q)
  }

  fn parse_primary(&mut self) -> Result<Quantity, CalcError> {
    match self.next()? {
      Tok::Num(n) => {
        let mut q = Quantity::scalar(n);
        if let Some(u) = self.try_unit()? {
          q.value *= u.value;
          q.dim = u.dim;
        }
        Ok(q)
      }
      Tok::LParen => {
        let q = self.parse_expr()?;
        self.expect(Tok::RParen)?;
        Ok(q)
      }
      Tok::Ident(name) => {
        if let Some(Tok::LParen) = self.peek() {
          self.pos += 1;
          let args = self.parse_args()?;
          return call(&name, &args);
        }
        if let Some(c) = constant(&name) {
          return Ok(Quantity::scalar(c));
        }
        if let Some((factor, dim)) = unit(&name) {
          return Ok(Quantity { value: factor, dim });
        }
        Err(CalcError::UnknownIdentifier(name))
      }
      other => Err(CalcError::UnexpectedToken(other.to_string())),
    }
  }

  /// Unit written directly after a number (`3 m`, `2 m^2`); the exponent binds to the unit.
  fn try_unit(&mut self) -> Result<Option<Quantity>, CalcError> {
    let (factor, dim) = match self.peek() {
      Some(Tok::Ident(name)) if !matches!(self.peek_at(1), Some(Tok::LParen)) => match unit(name) {
        Some(u) => u,
        None => return Ok(None),
      },
      _ => return Ok(None),
    };
    self.pos += 1;
    let mut q = Quantity { value: factor, dim };
    if let (Some(Tok::Op('^')), Some(Tok::Num(_))) = (self.peek(), self.peek_at(1)) {
      self.pos += 1;
      if let Tok::Num(n) = self.next()? {
        q = pow(q, Quantity::scalar(n))?;
      }
    } else if let (Some(Tok::Op('^')), Some(Tok::Op('-')), Some(Tok::Num(_))) =
      (self.peek(), self.peek_at(1), self.peek_at(2))
    {
      self.pos += 2;
      if let Tok::Num(n) = self.next()? {
        q = pow(q, Quantity::scalar(-n))?;
      }
    }
    Ok(Some(q))
  }

  fn parse_args(&mut self) -> Result<Vec<Quantity>, CalcError> {
    let mut args = Vec::new();
    if let Some(Tok::RParen) = self.peek() {
      self.pos += 1;
      return Ok(args);
    }
    loop {
      args.push(self.parse_expr()?);
      match self.next()? {
        Tok::Comma => continue,
        Tok::RParen => break,
        other => return Err(CalcError::UnexpectedToken(other.to_string())),
      }
    }
    Ok(args)
  }
}

fn pow(base: Quantity, exp: Quantity) -> Result<Quantity, CalcError> {
  let e = require_scalar("pow", &exp)?;
  if base.is_scalar() {
    return Ok(Quantity::scalar(base.value.powf(e)));
  }
  if e.fract() != 0.0 || e.abs() > 16.0 {
    return Err(CalcError::Units(format!("cannot raise {} to a non-integer power", dim_name(base.dim))));
  }
  let n = e as i8;
  Ok(Quantity { value: base.value.powf(e), dim: dim_op(base.dim, SCALAR, |d, _| d.checked_mul(n))? })
}

fn factorial(n: f64) -> Result<f64, CalcError> {
  if n < 0.0 || n.fract() != 0.0 {
    return Err(CalcError::Domain("factorial needs a non-negative integer".into()));
  }
  if n > 170.0 {
    return Err(CalcError::NotFinite);
  }
  Ok((1..=n as u32).fold(1.0, |acc, k| acc * k as f64))
}

fn call(name: &str, args: &[Quantity]) -> Result<Quantity, CalcError> {
  let one = |args: &[Quantity]| -> Result<Quantity, CalcError> {
    match args {
      [a] => Ok(*a),
      _ => Err(CalcError::Arity(name.to_string(), "one argument")),
    }
  };
  let two = |args: &[Quantity]| -> Result<(Quantity, Quantity), CalcError> {
    match args {
      [a, b] => Ok((*a, *b)),
      _ => Err(CalcError::Arity(name.to_string(), "two arguments")),
    }
  };
  let scalar_fn = |f: fn(f64) -> f64| -> Result<Quantity, CalcError> {
    let x = require_scalar(name, &one(args)?)?;
    Ok(Quantity::scalar(f(x)))
  };

  match name {
    "sin" => scalar_fn(f64::sin),
    "cos" => scalar_fn(f64::cos),
    "tan" => scalar_fn(f64::tan),
    "asin" => scalar_fn(f64::asin),
    "acos" => scalar_fn(f64::acos),
    "atan" => scalar_fn(f64::atan),
    "sinh" => scalar_fn(f64::sinh),
    "cosh" => scalar_fn(f64::cosh),
    "tanh" => scalar_fn(f64::tanh),
    "exp" => scalar_fn(f64::exp),
    "ln" => scalar_fn(f64::ln),
    "log10" => scalar_fn(f64::log10),
    "log2" => scalar_fn(f64::log2),
    "cbrt" => scalar_fn(f64::cbrt),
    "log" => match args {
      [_] => scalar_fn(f64::ln),
      [x, b] => {
        let x = require_scalar(name, x)?;
        let b = require_scalar(name, b)?;
        Ok(Quantity::scalar(x.ln() / b.ln()))
      }
      _ => Err(CalcError::Arity(name.to_string(), "one or two arguments")),
    },
    "atan2" => {
      let (y, x) = two(args)?;
      same_dim("compare", &y, &x)?;
      Ok(Quantity::scalar(y.value.atan2(x.value)))
    }
    "sqrt" => {
      let q = one(args)?;
      if q.value < 0.0 {
        return Err(CalcError::Domain("sqrt of a negative number".into()));
      }
      if q.dim.iter().any(|d| d % 2 != 0) {
        return Err(CalcError::Units(format!("cannot take the square root of {}", dim_name(q.dim))));
      }
      Ok(Quantity { value: q.value.sqrt(), dim: [q.dim[0] / 2, q.dim[1] / 2, q.dim[2] / 2] })
    }
    "abs" => {
      let q = one(args)?;
      Ok(Quantity { value: q.value.abs(), dim: q.dim })
    }
    "floor" | "ceil" | "round" => {
      let q = one(args)?;
      let v = match name {
        "floor" => q.value.floor(),
        "ceil" => q.value.ceil(),
        _ => q.value.round(),
      };
      Ok(Quantity { value: v, dim: q.dim })
    }
    "min" | "max" => {
      let first = *args.first().ok_or_else(|| CalcError::Arity(name.to_string(), "at least one argument"))?;
      args.iter().skip(1).try_fold(first, |acc, q| {
        same_dim("compare", &acc, q)?;
        let keep = if name == "min" { q.value < acc.value } else { q.value > acc.value };
        Ok(if keep { *q } else { acc })
      })
    }
    "pow" => {
      let (b, e) = two(args)?;
      pow(b, e)
    }
    _ => Err(CalcError::UnknownIdentifier(name.to_string())),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn arithmetic_rounds_float_noise() {
    assert_eq!(evaluate("1.2 * (2 + 4.5)").unwrap(), "7.8");
    assert_eq!(evaluate("0.1 + 0.2").unwrap(), "0.3");
    assert_eq!(evaluate("7 % 4").unwrap(), "3");
  }

  #[test]
  fn precedence_and_associativity() {
    assert_eq!(evaluate("2 + 3 * 4").unwrap(), "14");
    assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), "512");
    assert_eq!(evaluate("-2 ^ 2").unwrap(), "-4");
    assert_eq!(evaluate("2 ^ -1").unwrap(), "0.5");
    assert_eq!(evaluate("2 ** 10").unwrap(), "1024");
    assert_eq!(evaluate("5!").unwrap(), "120");
  }

  #[test]
  fn implicit_multiplication_and_constants() {
    assert_eq!(evaluate("2pi").unwrap(), evaluate("2 * pi").unwrap());
    assert_eq!(evaluate("3(4 + 1)").unwrap(), "15");
    assert_eq!(evaluate("2e3").unwrap(), "2000");
    assert_eq!(evaluate("2e").unwrap(), evaluate("2 * e").unwrap());
  }

  #[test]
  fn trigonometry_accepts_degrees() {
    assert_eq!(evaluate("sin(30 deg)").unwrap(), "0.5");
    assert_eq!(evaluate("cos(0)").unwrap(), "1");
    assert_eq!(evaluate("atan2(1, 1) to deg").unwrap(), "45 deg");
  }

  #[test]
  fn functions() {
    assert_eq!(evaluate("sqrt(16)").unwrap(), "4");
    assert_eq!(evaluate("log(8, 2)").unwrap(), "3");
    assert_eq!(evaluate("log10(1000)").unwrap(), "3");
    assert_eq!(evaluate("max(1, 7, 3)").unwrap(), "7");
    assert_eq!(evaluate("round(2.5)").unwrap(), "3");
  }

  #[test]
  fn unit_conversions() {
    assert_eq!(evaluate("5 km to m").unwrap(), "5000 m");
    assert_eq!(evaluate("2 h in min").unwrap(), "120 min");
    assert_eq!(evaluate("60 km/h to m/s").unwrap(), "16.666666666667 m/s");
    assert_eq!(evaluate("3 m * 2 m").unwrap(), "6 m^2");
    assert_eq!(evaluate("1 L to mL").unwrap(), "1000 mL");
    assert_eq!(evaluate("12 inch to ft").unwrap(), "1 ft");
  }

  #[test]
  fn unit_mismatches_are_errors() {
    assert!(matches!(evaluate("5 km + 3 s"), Err(CalcError::Units(_))));
    assert!(matches!(evaluate("5 kg to m"), Err(CalcError::Units(_))));
    assert!(matches!(evaluate("sin(3 m)"), Err(CalcError::Units(_))));
  }

  #[test]
  fn malformed_input_fails_cleanly() {
    assert!(evaluate("bogus(").is_err());
    assert!(matches!(evaluate("bogus(1)"), Err(CalcError::UnknownIdentifier(_))));
    assert!(matches!(evaluate("1 +"), Err(CalcError::UnexpectedEnd)));
    assert!(matches!(evaluate("(1 + 2"), Err(CalcError::UnexpectedEnd)));
    assert!(matches!(evaluate("1 + 2)"), Err(CalcError::UnexpectedToken(_))));
    assert!(matches!(evaluate("2 # 3"), Err(CalcError::UnexpectedChar('#', 2))));
    assert!(matches!(evaluate("   "), Err(CalcError::Empty)));
    assert!(matches!(evaluate("1..2"), Err(CalcError::BadNumber(_))));
  }

  #[test]
  fn non_finite_results_are_errors() {
    assert_eq!(evaluate("1 / 0"), Err(CalcError::NotFinite));
    assert!(matches!(evaluate("sqrt(-1)"), Err(CalcError::Domain(_))));
    assert_eq!(evaluate("ln(-1)"), Err(CalcError::NotFinite));
    assert_eq!(evaluate("171!"), Err(CalcError::NotFinite));
  }

  #[test]
  fn hostile_input_is_bounded() {
    let deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
    assert_eq!(evaluate(&deep), Err(CalcError::TooDeep));
    let long = "1+".repeat(300) + "1";
    assert_eq!(evaluate(&long), Err(CalcError::TooLong));
    let signs = format!("{}1", "-".repeat(100));
    assert_eq!(evaluate(&signs), Err(CalcError::TooDeep));
  }
}
