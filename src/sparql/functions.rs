//! Built-in functions
//!
//! Arguments arrive already evaluated; lazy forms (`IF`, `COALESCE`, `BOUND`)
//! live in [`super::expr`].

use super::expr::{datetime_value, ExpressionError, ExpressionEvaluator, ExpressionResult, Numeric};
use crate::rdf::Term;
use chrono::{Datelike, Offset, SecondsFormat, Timelike};
use oxrdf::vocab::xsd;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::RegexBuilder;
use sha2::Digest;

/// Unreserved characters of RFC 3986 stay as they are
const URI_UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Built-in function names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    // numeric
    Abs,
    Ceil,
    Floor,
    Round,
    // string
    Str,
    StrLen,
    UCase,
    LCase,
    Concat,
    SubStr,
    StrStarts,
    StrEnds,
    Contains,
    StrBefore,
    StrAfter,
    Replace,
    Regex,
    EncodeForUri,
    Lang,
    LangMatches,
    Datatype,
    Iri,
    StrDt,
    StrLang,
    // hashing
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    // date and random
    Now,
    Year,
    Month,
    Day,
    Hours,
    Minutes,
    Seconds,
    Tz,
    Rand,
    Uuid,
    StrUuid,
    // term tests
    IsIri,
    IsBlank,
    IsLiteral,
    IsNumeric,
    SameTerm,
}

impl Function {
    /// Accepted argument count range
    fn arity(self) -> (usize, usize) {
        use Function::*;
        match self {
            Now | Rand | Uuid | StrUuid => (0, 0),
            Concat => (0, usize::MAX),
            SubStr => (2, 3),
            Regex => (2, 3),
            Replace => (3, 4),
            StrStarts | StrEnds | Contains | StrBefore | StrAfter | LangMatches | StrDt
            | StrLang | SameTerm => (2, 2),
            _ => (1, 1),
        }
    }
}

/// Apply `function` to evaluated arguments
pub(crate) fn call(
    function: Function,
    args: &[Term],
    evaluator: &ExpressionEvaluator,
) -> ExpressionResult<Term> {
    let (min, max) = function.arity();
    if args.len() < min || args.len() > max {
        return Err(ExpressionError::InvalidArgument(format!(
            "{function:?} takes {min}..={max} arguments, got {}",
            args.len()
        )));
    }

    use Function::*;
    match function {
        Abs | Ceil | Floor | Round => numeric_unary(function, &args[0]),
        Str => match &args[0] {
            t if t.is_blank() => Err(ExpressionError::Type("STR of a blank node".to_string())),
            Term::Variable(name) => Err(ExpressionError::Unbound(name.clone())),
            t => Ok(Term::plain(t.lexical())),
        },
        StrLen => Ok(Term::integer(string_arg(&args[0])?.chars().count() as i64)),
        UCase => Ok(with_same_tag(&args[0], string_arg(&args[0])?.to_uppercase())),
        LCase => Ok(with_same_tag(&args[0], string_arg(&args[0])?.to_lowercase())),
        Concat => {
            let mut out = String::new();
            let mut language = args.first().and_then(|a| a.language().map(str::to_string));
            for arg in args {
                out.push_str(string_arg(arg)?);
                if arg.language() != language.as_deref() {
                    language = None;
                }
            }
            Ok(match language {
                Some(language) => Term::PlainLiteral {
                    value: out,
                    language: Some(language),
                },
                None => Term::plain(out),
            })
        }
        SubStr => {
            let source = string_arg(&args[0])?;
            let start = integer_arg(&args[1])?;
            let length = args.get(2).map(integer_arg).transpose()?;
            // 1-based, characters before position 1 are dropped from the length
            let skip = usize::try_from(start.saturating_sub(1).max(0)).unwrap_or(usize::MAX);
            let take = match length {
                Some(length) => {
                    let end = length.saturating_add(start.min(1)).saturating_sub(1);
                    usize::try_from(end.max(0)).unwrap_or(usize::MAX)
                }
                None => usize::MAX,
            };
            let value: String = source.chars().skip(skip).take(take).collect();
            Ok(with_same_tag(&args[0], value))
        }
        StrStarts => {
            let (a, b) = compatible_strings(&args[0], &args[1])?;
            Ok(Term::boolean(a.starts_with(b)))
        }
        StrEnds => {
            let (a, b) = compatible_strings(&args[0], &args[1])?;
            Ok(Term::boolean(a.ends_with(b)))
        }
        Contains => {
            let (a, b) = compatible_strings(&args[0], &args[1])?;
            Ok(Term::boolean(a.contains(b)))
        }
        StrBefore => {
            let (a, b) = compatible_strings(&args[0], &args[1])?;
            Ok(match a.find(b) {
                Some(i) if b.is_empty() => Term::plain(&a[..i]),
                Some(i) => with_same_tag(&args[0], a[..i].to_string()),
                None => Term::plain(""),
            })
        }
        StrAfter => {
            let (a, b) = compatible_strings(&args[0], &args[1])?;
            Ok(match a.find(b) {
                Some(i) => with_same_tag(&args[0], a[i + b.len()..].to_string()),
                None => Term::plain(""),
            })
        }
        Replace => {
            let source = string_arg(&args[0])?;
            let regex = build_regex(string_arg(&args[1])?, args.get(3))?;
            let replacement = string_arg(&args[2])?;
            Ok(with_same_tag(
                &args[0],
                regex.replace_all(source, replacement).into_owned(),
            ))
        }
        Regex => {
            let source = string_arg(&args[0])?;
            let regex = build_regex(string_arg(&args[1])?, args.get(2))?;
            Ok(Term::boolean(regex.is_match(source)))
        }
        EncodeForUri => Ok(Term::plain(
            utf8_percent_encode(string_arg(&args[0])?, URI_UNRESERVED).to_string(),
        )),
        Lang => match &args[0] {
            t if t.is_literal() => Ok(Term::plain(t.language().unwrap_or(""))),
            other => Err(ExpressionError::Type(format!("LANG of non-literal {other}"))),
        },
        LangMatches => {
            let tag = string_arg(&args[0])?;
            let range = string_arg(&args[1])?;
            Ok(Term::boolean(lang_matches(tag, range)))
        }
        Datatype => match args[0].datatype() {
            Some(datatype) if args[0].is_literal() => Ok(Term::Resource(datatype.to_string())),
            _ => Err(ExpressionError::Type(format!("DATATYPE of non-literal {}", args[0]))),
        },
        Iri => match &args[0] {
            t if t.is_resource() => Ok(t.clone()),
            t => Term::resource(string_arg(t)?)
                .map_err(|e| ExpressionError::InvalidArgument(e.to_string())),
        },
        StrDt => {
            let value = simple_string(&args[0])?;
            match &args[1] {
                Term::Resource(datatype) if datatype == xsd::STRING.as_str() => {
                    Ok(Term::plain(value))
                }
                Term::Resource(datatype) if !args[1].is_blank() => {
                    Ok(Term::typed(value, datatype.as_str()))
                }
                other => Err(ExpressionError::Type(format!("STRDT datatype {other}"))),
            }
        }
        StrLang => {
            let value = simple_string(&args[0])?;
            let tag = string_arg(&args[1])?;
            Term::lang(value, tag).map_err(|e| ExpressionError::InvalidArgument(e.to_string()))
        }
        Md5 => Ok(Term::plain(hex::encode(md5::Md5::digest(simple_string(&args[0])?)))),
        Sha1 => Ok(Term::plain(hex::encode(sha1::Sha1::digest(simple_string(&args[0])?)))),
        Sha256 => Ok(Term::plain(hex::encode(sha2::Sha256::digest(simple_string(&args[0])?)))),
        Sha384 => Ok(Term::plain(hex::encode(sha2::Sha384::digest(simple_string(&args[0])?)))),
        Sha512 => Ok(Term::plain(hex::encode(sha2::Sha512::digest(simple_string(&args[0])?)))),
        Now => Ok(Term::typed(
            evaluator.now().to_rfc3339_opts(SecondsFormat::AutoSi, true),
            xsd::DATE_TIME.as_str(),
        )),
        Year | Month | Day | Hours | Minutes | Seconds | Tz => {
            let instant = datetime_value(&args[0])
                .ok_or_else(|| ExpressionError::Type(format!("not a date: {}", args[0])))?;
            Ok(match function {
                Year => Term::integer(instant.year() as i64),
                Month => Term::integer(instant.month() as i64),
                Day => Term::integer(instant.day() as i64),
                Hours => Term::integer(instant.hour() as i64),
                Minutes => Term::integer(instant.minute() as i64),
                Seconds => Term::decimal(
                    instant.second() as f64 + instant.nanosecond() as f64 / 1_000_000_000.0,
                ),
                _ => {
                    let offset = instant.offset().fix().local_minus_utc();
                    if offset == 0 {
                        Term::plain("Z")
                    } else {
                        let sign = if offset < 0 { '-' } else { '+' };
                        let minutes = offset.abs() / 60;
                        Term::plain(format!("{sign}{:02}:{:02}", minutes / 60, minutes % 60))
                    }
                }
            })
        }
        Rand => Ok(Term::double(rand::random::<f64>())),
        Uuid => Ok(Term::Resource(format!("urn:uuid:{}", uuid::Uuid::new_v4()))),
        StrUuid => Ok(Term::plain(uuid::Uuid::new_v4().to_string())),
        IsIri => Ok(Term::boolean(args[0].is_resource() && !args[0].is_blank())),
        IsBlank => Ok(Term::boolean(args[0].is_blank())),
        IsLiteral => Ok(Term::boolean(args[0].is_literal())),
        IsNumeric => Ok(Term::boolean(Numeric::from_term(&args[0]).is_some())),
        SameTerm => Ok(Term::boolean(args[0] == args[1])),
    }
}

fn numeric_unary(function: Function, arg: &Term) -> ExpressionResult<Term> {
    let value = Numeric::from_term(arg)
        .ok_or_else(|| ExpressionError::Type(format!("not numeric: {arg}")))?;
    let round = |f: f64| match function {
        Function::Abs => f.abs(),
        Function::Ceil => f.ceil(),
        Function::Floor => f.floor(),
        // SPARQL rounds halves towards positive infinity
        _ => (f + 0.5).floor(),
    };
    Ok(match value {
        Numeric::Integer(i) if function == Function::Abs => i
            .checked_abs()
            .map(Term::integer)
            .unwrap_or_else(|| Term::decimal(round(i as f64))),
        Numeric::Integer(i) => Term::integer(i),
        Numeric::Decimal(d) => Term::decimal(round(d)),
        Numeric::Double(d) => Term::double(round(d)),
    })
}

/// Lexical form of a string literal (simple, `xsd:string` or language-tagged)
fn string_arg(term: &Term) -> ExpressionResult<&str> {
    match term {
        Term::PlainLiteral { value, .. } => Ok(value),
        Term::TypedLiteral { value, datatype } if datatype == xsd::STRING.as_str() => Ok(value),
        other => Err(ExpressionError::Type(format!("not a string literal: {other}"))),
    }
}

/// Lexical form of a string literal without language tag
fn simple_string(term: &Term) -> ExpressionResult<&str> {
    if term.language().is_some() {
        return Err(ExpressionError::Type(format!("language-tagged literal {term}")));
    }
    string_arg(term)
}

fn integer_arg(term: &Term) -> ExpressionResult<i64> {
    match Numeric::from_term(term) {
        Some(Numeric::Integer(i)) => Ok(i),
        Some(n) => Ok(n.as_f64().round() as i64),
        None => Err(ExpressionError::Type(format!("not numeric: {term}"))),
    }
}

/// Argument pair for the string-matching functions: the second argument may not
/// carry a language tag different from the first
fn compatible_strings<'a>(a: &'a Term, b: &'a Term) -> ExpressionResult<(&'a str, &'a str)> {
    if let Some(tag) = b.language() {
        if a.language() != Some(tag) {
            return Err(ExpressionError::Type(format!(
                "incompatible arguments {a} and {b}"
            )));
        }
    }
    Ok((string_arg(a)?, string_arg(b)?))
}

/// String result keeping the language tag or datatype of `source`
fn with_same_tag(source: &Term, value: String) -> Term {
    match source {
        Term::PlainLiteral { language, .. } => Term::PlainLiteral {
            value,
            language: language.clone(),
        },
        Term::TypedLiteral { datatype, .. } => Term::typed(value, datatype.as_str()),
        _ => Term::plain(value),
    }
}

fn build_regex(pattern: &str, flags: Option<&Term>) -> ExpressionResult<regex::Regex> {
    let mut builder = RegexBuilder::new(pattern);
    if let Some(flags) = flags {
        for flag in string_arg(flags)?.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => {
                    return Err(ExpressionError::InvalidArgument(format!(
                        "unknown regex flag {other}"
                    )))
                }
            };
        }
    }
    builder
        .build()
        .map_err(|e| ExpressionError::InvalidArgument(e.to_string()))
}

pub(crate) fn lang_matches(tag: &str, range: &str) -> bool {
    if range == "*" {
        return !tag.is_empty();
    }
    let tag = tag.to_ascii_lowercase();
    let range = range.to_ascii_lowercase();
    tag == range || tag.starts_with(&format!("{range}-"))
}
