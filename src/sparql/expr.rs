//! Expressions evaluated per solution row
//!
//! Evaluation never fails a query: callers turn an [`ExpressionError`] into an
//! unbound cell (BIND, projection) or a rejected row (FILTER).

use super::functions::{self, Function};
use super::table::Solution;
use crate::rdf::{variable_name, Term, TermResult};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use oxrdf::vocab::xsd;
use std::cmp::Ordering;
use thiserror::Error;

/// Expression evaluation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    /// Variable not bound in the current row
    #[error("Unbound variable: {0}")]
    Unbound(String),

    /// Operand of the wrong kind
    #[error("Type error: {0}")]
    Type(String),

    /// Argument rejected by a function
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type ExpressionResult<T> = Result<T, ExpressionError>;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Equal to (=)
    Eq,
    /// Not equal to (!=)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal to (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal to (>=)
    Ge,
    /// Logical AND
    And,
    /// Logical OR
    Or,
    /// Addition (+)
    Add,
    /// Subtraction (-)
    Sub,
    /// Multiplication (*)
    Mul,
    /// Division (/)
    Div,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Logical NOT
    Not,
    /// Negation (-)
    Minus,
}

/// Row-level expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant term
    Constant(Term),
    /// Variable reference (`?NAME`)
    Variable(String),
    /// Binary operation
    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },
    /// Unary operation
    Unary { op: UnaryOp, expr: Box<Expression> },
    /// Built-in function call
    Function {
        function: Function,
        args: Vec<Expression>,
    },
    /// `expr IN (...)` / `expr NOT IN (...)`
    In {
        expr: Box<Expression>,
        list: Vec<Expression>,
        negated: bool,
    },
    /// `BOUND(?var)`
    Bound(String),
    /// `IF(cond, then, else)`
    If {
        condition: Box<Expression>,
        then: Box<Expression>,
        otherwise: Box<Expression>,
    },
    /// First argument that evaluates without error
    Coalesce(Vec<Expression>),
}

impl Expression {
    pub fn constant(term: Term) -> Self {
        Expression::Constant(term)
    }

    /// Variable reference; the name is normalised to `?NAME`
    pub fn variable(name: &str) -> TermResult<Self> {
        Ok(Expression::Variable(variable_name(name)?))
    }

    pub fn binary(left: Expression, op: BinaryOp, right: Expression) -> Self {
        Expression::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn not(expr: Expression) -> Self {
        Expression::Unary {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        }
    }

    pub fn call(function: Function, args: Vec<Expression>) -> Self {
        Expression::Function { function, args }
    }

    pub fn bound(name: &str) -> TermResult<Self> {
        Ok(Expression::Bound(variable_name(name)?))
    }

    pub fn if_then_else(condition: Expression, then: Expression, otherwise: Expression) -> Self {
        Expression::If {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }
}

/// Evaluates expressions against solution rows
///
/// `NOW()` is fixed for the lifetime of the evaluator so every row of one
/// query sees the same instant.
#[derive(Debug, Clone)]
pub struct ExpressionEvaluator {
    now: DateTime<Utc>,
}

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self { now: Utc::now() }
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn evaluate(&self, expr: &Expression, solution: &Solution<'_>) -> ExpressionResult<Term> {
        match expr {
            Expression::Constant(Term::Variable(name)) | Expression::Variable(name) => solution
                .term(name)
                .ok_or_else(|| ExpressionError::Unbound(name.clone())),
            Expression::Constant(term) => Ok(term.clone()),
            Expression::Binary { left, op, right } => match op {
                BinaryOp::And => {
                    // SPARQL logical-and: an error on one side is absorbed by false on the other
                    let l = self.evaluate_bool(left, solution);
                    let r = self.evaluate_bool(right, solution);
                    match (l, r) {
                        (Ok(false), _) | (_, Ok(false)) => Ok(Term::boolean(false)),
                        (Ok(true), Ok(true)) => Ok(Term::boolean(true)),
                        (Err(e), _) | (_, Err(e)) => Err(e),
                    }
                }
                BinaryOp::Or => {
                    let l = self.evaluate_bool(left, solution);
                    let r = self.evaluate_bool(right, solution);
                    match (l, r) {
                        (Ok(true), _) | (_, Ok(true)) => Ok(Term::boolean(true)),
                        (Ok(false), Ok(false)) => Ok(Term::boolean(false)),
                        (Err(e), _) | (_, Err(e)) => Err(e),
                    }
                }
                _ => {
                    let l = self.evaluate(left, solution)?;
                    let r = self.evaluate(right, solution)?;
                    evaluate_binary_op(*op, &l, &r)
                }
            },
            Expression::Unary { op, expr } => match op {
                UnaryOp::Not => Ok(Term::boolean(!self.evaluate_bool(expr, solution)?)),
                UnaryOp::Minus => {
                    let value = self.evaluate(expr, solution)?;
                    let n = Numeric::from_term(&value)
                        .ok_or_else(|| ExpressionError::Type(format!("not numeric: {value}")))?;
                    Ok(n.negate().into_term())
                }
            },
            Expression::Function { function, args } => {
                let values = args
                    .iter()
                    .map(|a| self.evaluate(a, solution))
                    .collect::<ExpressionResult<Vec<_>>>()?;
                functions::call(*function, &values, self)
            }
            Expression::In {
                expr,
                list,
                negated,
            } => {
                let value = self.evaluate(expr, solution)?;
                let mut found = false;
                let mut error = None;
                for candidate in list {
                    match self
                        .evaluate(candidate, solution)
                        .and_then(|c| terms_equal(&value, &c))
                    {
                        Ok(true) => {
                            found = true;
                            break;
                        }
                        Ok(false) => {}
                        Err(e) => error = Some(e),
                    }
                }
                match (found, error) {
                    (false, Some(e)) => Err(e),
                    _ => Ok(Term::boolean(found != *negated)),
                }
            }
            Expression::Bound(name) => Ok(Term::boolean(solution.get(name).is_some())),
            Expression::If {
                condition,
                then,
                otherwise,
            } => {
                if self.evaluate_bool(condition, solution)? {
                    self.evaluate(then, solution)
                } else {
                    self.evaluate(otherwise, solution)
                }
            }
            Expression::Coalesce(args) => args
                .iter()
                .find_map(|a| self.evaluate(a, solution).ok())
                .ok_or_else(|| ExpressionError::InvalidArgument("COALESCE: no bound argument".to_string())),
        }
    }

    /// Effective boolean value of an expression
    pub fn evaluate_bool(&self, expr: &Expression, solution: &Solution<'_>) -> ExpressionResult<bool> {
        effective_boolean_value(&self.evaluate(expr, solution)?)
    }
}

impl Default for ExpressionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn evaluate_binary_op(op: BinaryOp, left: &Term, right: &Term) -> ExpressionResult<Term> {
    match op {
        BinaryOp::Eq => terms_equal(left, right).map(Term::boolean),
        BinaryOp::Ne => terms_equal(left, right).map(|eq| Term::boolean(!eq)),
        BinaryOp::Lt => compare_terms(left, right).map(|o| Term::boolean(o == Ordering::Less)),
        BinaryOp::Le => compare_terms(left, right).map(|o| Term::boolean(o != Ordering::Greater)),
        BinaryOp::Gt => compare_terms(left, right).map(|o| Term::boolean(o == Ordering::Greater)),
        BinaryOp::Ge => compare_terms(left, right).map(|o| Term::boolean(o != Ordering::Less)),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            let (l, r) = match (Numeric::from_term(left), Numeric::from_term(right)) {
                (Some(l), Some(r)) => (l, r),
                _ => {
                    return Err(ExpressionError::Type(format!(
                        "arithmetic on non-numeric operands {left} and {right}"
                    )))
                }
            };
            l.arithmetic(op, r).map(Numeric::into_term)
        }
        BinaryOp::And | BinaryOp::Or => {
            let l = effective_boolean_value(left)?;
            let r = effective_boolean_value(right)?;
            Ok(Term::boolean(if op == BinaryOp::And { l && r } else { l || r }))
        }
    }
}

/// Numeric value of a literal, keeping the XSD type family
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Numeric {
    Integer(i64),
    Decimal(f64),
    Double(f64),
}

const INTEGER_TYPES: &[&str] = &[
    "integer",
    "int",
    "long",
    "short",
    "byte",
    "nonNegativeInteger",
    "nonPositiveInteger",
    "positiveInteger",
    "negativeInteger",
    "unsignedLong",
    "unsignedInt",
    "unsignedShort",
    "unsignedByte",
];

const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

impl Numeric {
    pub(crate) fn from_term(term: &Term) -> Option<Self> {
        let Term::TypedLiteral { value, datatype } = term else {
            return None;
        };
        let local = datatype.strip_prefix(XSD_NS)?;
        let value = value.trim();
        if INTEGER_TYPES.contains(&local) {
            value.parse().ok().map(Numeric::Integer)
        } else if local == "decimal" {
            value.parse().ok().map(Numeric::Decimal)
        } else if local == "double" || local == "float" {
            match value {
                "INF" | "+INF" => Some(Numeric::Double(f64::INFINITY)),
                "-INF" => Some(Numeric::Double(f64::NEG_INFINITY)),
                "NaN" => Some(Numeric::Double(f64::NAN)),
                v => v.parse().ok().map(Numeric::Double),
            }
        } else {
            None
        }
    }

    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Numeric::Integer(i) => i as f64,
            Numeric::Decimal(d) | Numeric::Double(d) => d,
        }
    }

    pub(crate) fn into_term(self) -> Term {
        match self {
            Numeric::Integer(i) => Term::integer(i),
            Numeric::Decimal(d) => Term::decimal(d),
            Numeric::Double(d) => Term::double(d),
        }
    }

    fn negate(self) -> Self {
        match self {
            Numeric::Integer(i) => i
                .checked_neg()
                .map(Numeric::Integer)
                .unwrap_or(Numeric::Decimal(-(i as f64))),
            Numeric::Decimal(d) => Numeric::Decimal(-d),
            Numeric::Double(d) => Numeric::Double(-d),
        }
    }

    /// Apply `op`, promoting integer < decimal < double
    pub(crate) fn arithmetic(self, op: BinaryOp, other: Numeric) -> ExpressionResult<Numeric> {
        use Numeric::*;
        match (self, other) {
            (Integer(a), Integer(b)) if op != BinaryOp::Div => {
                let result = match op {
                    BinaryOp::Add => a.checked_add(b),
                    BinaryOp::Sub => a.checked_sub(b),
                    BinaryOp::Mul => a.checked_mul(b),
                    _ => None,
                };
                match result {
                    Some(value) => Ok(Integer(value)),
                    None => Decimal(a as f64).arithmetic(op, Decimal(b as f64)),
                }
            }
            (Double(_), _) | (_, Double(_)) => {
                Ok(Double(apply_float(op, self.as_f64(), other.as_f64())))
            }
            _ => {
                if op == BinaryOp::Div && other.as_f64() == 0.0 {
                    return Err(ExpressionError::InvalidArgument("division by zero".to_string()));
                }
                Ok(Decimal(apply_float(op, self.as_f64(), other.as_f64())))
            }
        }
    }

    pub(crate) fn partial_cmp(self, other: Numeric) -> Option<Ordering> {
        match (self, other) {
            (Numeric::Integer(a), Numeric::Integer(b)) => Some(a.cmp(&b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

fn apply_float(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        _ => a / b,
    }
}

/// Instant of an `xsd:dateTime` or `xsd:date` literal
pub(crate) fn datetime_value(term: &Term) -> Option<DateTime<FixedOffset>> {
    let Term::TypedLiteral { value, datatype } = term else {
        return None;
    };
    if datatype == xsd::DATE_TIME.as_str() {
        DateTime::parse_from_rfc3339(value).ok().or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc().fixed_offset())
        })
    } else if datatype == xsd::DATE.as_str() {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc().fixed_offset())
    } else {
        None
    }
}

/// Whether a term is a simple or `xsd:string` literal without language
fn is_string_literal(term: &Term) -> bool {
    match term {
        Term::PlainLiteral { language: None, .. } => true,
        Term::TypedLiteral { datatype, .. } => datatype == xsd::STRING.as_str(),
        _ => false,
    }
}

/// RDFterm-equal with value equality for numerics and dates
pub(crate) fn terms_equal(left: &Term, right: &Term) -> ExpressionResult<bool> {
    if let (Some(l), Some(r)) = (Numeric::from_term(left), Numeric::from_term(right)) {
        return Ok(l.partial_cmp(r) == Some(Ordering::Equal));
    }
    if let (Some(l), Some(r)) = (datetime_value(left), datetime_value(right)) {
        return Ok(l == r);
    }
    if is_string_literal(left) && is_string_literal(right) {
        return Ok(left.lexical() == right.lexical());
    }
    Ok(left == right)
}

/// Ordering for `<`, `<=`, `>`, `>=`
pub(crate) fn compare_terms(left: &Term, right: &Term) -> ExpressionResult<Ordering> {
    if let (Some(l), Some(r)) = (Numeric::from_term(left), Numeric::from_term(right)) {
        return l
            .partial_cmp(r)
            .ok_or_else(|| ExpressionError::Type("NaN comparison".to_string()));
    }
    if let (Some(l), Some(r)) = (datetime_value(left), datetime_value(right)) {
        return Ok(l.cmp(&r));
    }
    if is_string_literal(left) && is_string_literal(right) {
        return Ok(left.lexical().cmp(right.lexical()));
    }
    match (left, right) {
        (
            Term::PlainLiteral {
                value: l,
                language: Some(ll),
            },
            Term::PlainLiteral {
                value: r,
                language: Some(rl),
            },
        ) if ll == rl => Ok(l.cmp(r)),
        (Term::TypedLiteral { datatype: ld, .. }, Term::TypedLiteral { datatype: rd, .. })
            if ld == rd && ld == xsd::BOOLEAN.as_str() =>
        {
            Ok(effective_boolean_value(left)?.cmp(&effective_boolean_value(right)?))
        }
        (Term::Resource(l), Term::Resource(r)) => Ok(l.cmp(r)),
        _ => Err(ExpressionError::Type(format!("cannot compare {left} and {right}"))),
    }
}

/// Ordering used by ORDER BY on two bound encoded cells
///
/// A total order: blank nodes, then IRIs, then numbers by value, then dates by
/// instant, then every other literal. Ties within a kind fall back to the
/// encoded form.
pub(crate) fn order_encoded(left: &str, right: &str) -> Ordering {
    let (l, r) = (OrderKey::of(left), OrderKey::of(right));
    l.rank()
        .cmp(&r.rank())
        .then_with(|| match (&l, &r) {
            (OrderKey::Numeric(a), OrderKey::Numeric(b)) => a.total_cmp(b),
            (OrderKey::DateTime(a), OrderKey::DateTime(b)) => a.cmp(b),
            _ => Ordering::Equal,
        })
        .then_with(|| left.cmp(right))
}

enum OrderKey {
    Blank,
    Iri,
    Numeric(f64),
    DateTime(DateTime<FixedOffset>),
    Literal,
}

impl OrderKey {
    fn of(encoded: &str) -> Self {
        let term = Term::decode(encoded);
        if term.is_blank() {
            OrderKey::Blank
        } else if term.is_resource() {
            OrderKey::Iri
        } else if let Some(n) = Numeric::from_term(&term) {
            OrderKey::Numeric(n.as_f64())
        } else if let Some(instant) = datetime_value(&term) {
            OrderKey::DateTime(instant)
        } else {
            OrderKey::Literal
        }
    }

    fn rank(&self) -> u8 {
        match self {
            OrderKey::Blank => 0,
            OrderKey::Iri => 1,
            OrderKey::Numeric(_) => 2,
            OrderKey::DateTime(_) => 3,
            OrderKey::Literal => 4,
        }
    }
}

/// SPARQL effective boolean value
pub fn effective_boolean_value(term: &Term) -> ExpressionResult<bool> {
    match term {
        Term::TypedLiteral { value, datatype } if datatype == xsd::BOOLEAN.as_str() => {
            Ok(value == "true" || value == "1")
        }
        Term::TypedLiteral { .. } if Numeric::from_term(term).is_some() => {
            let n = Numeric::from_term(term).map(Numeric::as_f64).unwrap_or(0.0);
            Ok(n != 0.0 && !n.is_nan())
        }
        t if is_string_literal(t) => Ok(!t.lexical().is_empty()),
        Term::PlainLiteral { value, .. } => Ok(!value.is_empty()),
        other => Err(ExpressionError::Type(format!("no boolean value for {other}"))),
    }
}
