//! Query building blocks: patterns, property paths, VALUES blocks, filters,
//! binds and pattern groups

use super::expr::{BinaryOp, Expression};
use super::functions::Function;
use super::table::{Cell, Solution, SolutionTable};
use crate::rdf::{variable_name, Term, TermError, TermResult};
use indexmap::IndexMap;
use std::fmt;
use uuid::Uuid;

/// Stable identity of a pattern group or query, used as a cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberId(Uuid);

impl MemberId {
    pub fn new() -> Self {
        MemberId(Uuid::new_v4())
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Triple or quad pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    pub context: Option<Term>,
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub is_optional: bool,
    pub union_with_next: bool,
}

impl Pattern {
    pub fn triple(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            context: None,
            subject,
            predicate,
            object,
            is_optional: false,
            union_with_next: false,
        }
    }

    pub fn quad(context: Term, subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            context: Some(context),
            ..Self::triple(subject, predicate, object)
        }
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn union_with_next(mut self) -> Self {
        self.union_with_next = true;
        self
    }

    pub fn is_quad(&self) -> bool {
        self.context.is_some()
    }

    /// Positions in `C, S, P, O` order (context only for quads)
    pub fn positions(&self) -> impl Iterator<Item = &Term> {
        self.context
            .iter()
            .chain([&self.subject, &self.predicate, &self.object])
    }

    /// Distinct variables in position order
    pub fn variables(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for name in self.positions().filter_map(Term::as_variable) {
            if !out.iter().any(|v| v == name) {
                out.push(name.to_string());
            }
        }
        out
    }
}

impl fmt::Display for Pattern {
    /// One-line SPARQL form: `?S <p> ?O .` or `GRAPH <c> { ?S <p> ?O }`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(
                f,
                "GRAPH {context} {{ {} {} {} }}",
                self.subject, self.predicate, self.object
            ),
            None => write!(f, "{} {} {} .", self.subject, self.predicate, self.object),
        }
    }
}

/// One predicate of a path step
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathProperty {
    pub predicate: Term,
    pub inverse: bool,
}

impl PathProperty {
    pub fn new(predicate: Term) -> Self {
        Self {
            predicate,
            inverse: false,
        }
    }

    pub fn inverse(predicate: Term) -> Self {
        Self {
            predicate,
            inverse: true,
        }
    }
}

/// A step of a path: one property, or an alternative between several
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathStep {
    pub alternatives: Vec<PathProperty>,
}

/// Chain of steps from `start` to `end`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    pub start: Term,
    pub end: Term,
    pub steps: Vec<PathStep>,
    pub is_optional: bool,
    pub union_with_next: bool,
}

impl PropertyPath {
    pub fn new(start: Term, end: Term) -> Self {
        Self {
            start,
            end,
            steps: Vec::new(),
            is_optional: false,
            union_with_next: false,
        }
    }

    /// Append a single-property step
    pub fn then(mut self, property: PathProperty) -> Self {
        self.steps.push(PathStep {
            alternatives: vec![property],
        });
        self
    }

    /// Append a step matching any of `properties`
    pub fn then_any(mut self, properties: Vec<PathProperty>) -> Self {
        if !properties.is_empty() {
            self.steps.push(PathStep {
                alternatives: properties,
            });
        }
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn union_with_next(mut self) -> Self {
        self.union_with_next = true;
        self
    }

    pub fn is_evaluable(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Start/end variables exposed by the path
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        for name in [&self.start, &self.end].into_iter().filter_map(Term::as_variable) {
            if !out.iter().any(|v: &String| v == name) {
                out.push(name.to_string());
            }
        }
        out
    }
}

/// Inline table of bindings
///
/// Every column has the same number of entries; `None` is `UNDEF`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Values {
    bindings: IndexMap<String, Vec<Option<Term>>>,
    pub union_with_next: bool,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column of bindings for `variable`
    pub fn bind(mut self, variable: &str, values: Vec<Option<Term>>) -> TermResult<Self> {
        let name = variable_name(variable)?;
        if let Some(existing) = self.bindings.values().next() {
            if existing.len() != values.len() {
                return Err(TermError::InvalidVariable(format!(
                    "{name}: expected {} values, got {}",
                    existing.len(),
                    values.len()
                )));
            }
        }
        if let Some(bad) = values.iter().flatten().find(|t| t.is_variable()) {
            return Err(TermError::NotConcrete(bad.to_string()));
        }
        self.bindings.insert(name, values);
        Ok(self)
    }

    pub fn union_with_next(mut self) -> Self {
        self.union_with_next = true;
        self
    }

    pub fn variables(&self) -> Vec<String> {
        self.bindings.keys().cloned().collect()
    }

    /// Number of binding rows
    pub fn len(&self) -> usize {
        self.bindings.values().next().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_evaluable(&self) -> bool {
        !self.bindings.is_empty()
    }

    /// Whether any binding is `UNDEF`
    pub fn has_undef(&self) -> bool {
        self.bindings.values().flatten().any(Option::is_none)
    }

    /// Row `index` as terms, in variable order
    pub fn row(&self, index: usize) -> Vec<Option<&Term>> {
        self.bindings
            .values()
            .map(|column| column.get(index).and_then(Option::as_ref))
            .collect()
    }

    /// Solution table of the block; an `UNDEF` makes it optional
    pub fn to_table(&self) -> SolutionTable {
        let mut table = SolutionTable::new(self.bindings.keys().cloned());
        for index in 0..self.len() {
            table.push_row(
                self.row(index)
                    .into_iter()
                    .map(|t| t.map(Term::encode))
                    .collect(),
            );
        }
        table.with_flags(self.has_undef(), false)
    }

    /// Whether `solution` is compatible with at least one binding row
    ///
    /// Only variables the row actually carries are compared; unbound cells
    /// and `UNDEF` are compatible with anything.
    pub fn admits(&self, solution: &Solution<'_>) -> bool {
        let checked: Vec<(usize, &String)> = self
            .bindings
            .keys()
            .enumerate()
            .filter(|(_, name)| solution.has_column(name))
            .collect();
        if checked.is_empty() {
            return true;
        }
        (0..self.len()).any(|index| {
            let row = self.row(index);
            checked.iter().all(|(position, name)| {
                match (row[*position], solution.get(name)) {
                    (Some(term), Some(value)) => term.encode() == value,
                    _ => true,
                }
            })
        })
    }

    /// Encoded rows, for rendering
    pub(crate) fn encoded_rows(&self) -> Vec<Vec<Cell>> {
        (0..self.len())
            .map(|i| self.row(i).into_iter().map(|t| t.map(Term::encode)).collect())
            .collect()
    }
}

/// Row filter of a pattern group
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Keep rows whose expression has effective boolean value true
    Expression(Expression),
    /// Keep rows compatible (or, negated, incompatible) with a sub-group's solutions
    Exists {
        group: Box<PatternGroup>,
        negated: bool,
    },
    /// Keep rows compatible with a VALUES block
    Values(Values),
}

impl Filter {
    pub fn expression(expr: Expression) -> Self {
        Filter::Expression(expr)
    }

    pub fn exists(group: PatternGroup) -> Self {
        Filter::Exists {
            group: Box::new(group),
            negated: false,
        }
    }

    pub fn not_exists(group: PatternGroup) -> Self {
        Filter::Exists {
            group: Box::new(group),
            negated: true,
        }
    }

    pub fn bound(variable: &str) -> TermResult<Self> {
        Ok(Filter::Expression(Expression::bound(variable)?))
    }

    pub fn is_iri(variable: &str) -> TermResult<Self> {
        Self::unary(Function::IsIri, variable)
    }

    pub fn is_blank(variable: &str) -> TermResult<Self> {
        Self::unary(Function::IsBlank, variable)
    }

    pub fn is_literal(variable: &str) -> TermResult<Self> {
        Self::unary(Function::IsLiteral, variable)
    }

    pub fn is_numeric(variable: &str) -> TermResult<Self> {
        Self::unary(Function::IsNumeric, variable)
    }

    pub fn same_term(variable: &str, term: Term) -> TermResult<Self> {
        Ok(Filter::Expression(Expression::call(
            Function::SameTerm,
            vec![Expression::variable(variable)?, Expression::constant(term)],
        )))
    }

    /// `REGEX(STR(?var), pattern, flags)`
    pub fn regex(variable: &str, pattern: &str, flags: Option<&str>) -> TermResult<Self> {
        let mut args = vec![
            Expression::call(Function::Str, vec![Expression::variable(variable)?]),
            Expression::constant(Term::plain(pattern)),
        ];
        if let Some(flags) = flags {
            args.push(Expression::constant(Term::plain(flags)));
        }
        Ok(Filter::Expression(Expression::call(Function::Regex, args)))
    }

    /// `LANGMATCHES(LANG(?var), range)`
    pub fn lang_matches(variable: &str, range: &str) -> TermResult<Self> {
        Ok(Filter::Expression(Expression::call(
            Function::LangMatches,
            vec![
                Expression::call(Function::Lang, vec![Expression::variable(variable)?]),
                Expression::constant(Term::plain(range)),
            ],
        )))
    }

    /// `DATATYPE(?var) = datatype`
    pub fn datatype(variable: &str, datatype: &str) -> TermResult<Self> {
        Ok(Filter::Expression(Expression::binary(
            Expression::call(Function::Datatype, vec![Expression::variable(variable)?]),
            BinaryOp::Eq,
            Expression::constant(Term::resource(datatype)?),
        )))
    }

    /// `?var op term`
    pub fn comparison(variable: &str, op: BinaryOp, term: Term) -> TermResult<Self> {
        Ok(Filter::Expression(Expression::binary(
            Expression::variable(variable)?,
            op,
            Expression::constant(term),
        )))
    }

    /// `?var IN (terms)`
    pub fn in_list(variable: &str, terms: Vec<Term>) -> TermResult<Self> {
        Ok(Filter::Expression(Expression::In {
            expr: Box::new(Expression::variable(variable)?),
            list: terms.into_iter().map(Expression::constant).collect(),
            negated: false,
        }))
    }

    fn unary(function: Function, variable: &str) -> TermResult<Self> {
        Ok(Filter::Expression(Expression::call(
            function,
            vec![Expression::variable(variable)?],
        )))
    }
}

/// Computed column: `BIND(expression AS ?variable)`
#[derive(Debug, Clone, PartialEq)]
pub struct Bind {
    pub expression: Expression,
    pub variable: String,
}

impl Bind {
    pub fn new(expression: Expression, variable: &str) -> TermResult<Self> {
        Ok(Self {
            expression,
            variable: variable_name(variable)?,
        })
    }
}

/// Evaluable member of a pattern group
#[derive(Debug, Clone, PartialEq)]
pub enum GroupMember {
    Pattern(Pattern),
    Path(PropertyPath),
    Values(Values),
}

impl GroupMember {
    pub fn is_evaluable(&self) -> bool {
        match self {
            GroupMember::Pattern(_) => true,
            GroupMember::Path(path) => path.is_evaluable(),
            GroupMember::Values(values) => values.is_evaluable(),
        }
    }

    pub(crate) fn is_optional(&self) -> bool {
        match self {
            GroupMember::Pattern(p) => p.is_optional,
            GroupMember::Path(p) => p.is_optional,
            GroupMember::Values(v) => v.has_undef(),
        }
    }

    pub(crate) fn union_with_next(&self) -> bool {
        match self {
            GroupMember::Pattern(p) => p.union_with_next,
            GroupMember::Path(p) => p.union_with_next,
            GroupMember::Values(v) => v.union_with_next,
        }
    }
}

/// Patterns, paths and VALUES evaluated and folded together, then filtered
#[derive(Debug, Clone, PartialEq)]
pub struct PatternGroup {
    id: MemberId,
    pub members: Vec<GroupMember>,
    pub binds: Vec<Bind>,
    pub filters: Vec<Filter>,
    pub is_optional: bool,
    pub union_with_next: bool,
}

impl PatternGroup {
    pub fn new() -> Self {
        Self {
            id: MemberId::new(),
            members: Vec::new(),
            binds: Vec::new(),
            filters: Vec::new(),
            is_optional: false,
            union_with_next: false,
        }
    }

    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn add_pattern(mut self, pattern: Pattern) -> Self {
        self.members.push(GroupMember::Pattern(pattern));
        self
    }

    pub fn add_path(mut self, path: PropertyPath) -> Self {
        self.members.push(GroupMember::Path(path));
        self
    }

    pub fn add_values(mut self, values: Values) -> Self {
        self.members.push(GroupMember::Values(values));
        self
    }

    pub fn add_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn add_bind(mut self, bind: Bind) -> Self {
        self.binds.push(bind);
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn union_with_next(mut self) -> Self {
        self.union_with_next = true;
        self
    }

    pub fn is_evaluable(&self) -> bool {
        self.members.iter().any(GroupMember::is_evaluable)
    }

    /// First VALUES member sharing a variable with `pattern`
    pub(crate) fn values_for(&self, pattern: &Pattern) -> Option<&Values> {
        let variables = pattern.variables();
        self.members.iter().find_map(|member| match member {
            GroupMember::Values(values)
                if values.variables().iter().any(|v| variables.contains(v)) =>
            {
                Some(values)
            }
            _ => None,
        })
    }
}

impl Default for PatternGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(s: &str) -> Term {
        Term::resource(format!("http://example.org/{s}")).unwrap()
    }

    fn var(s: &str) -> Term {
        Term::variable(s).unwrap()
    }

    #[test]
    fn test_pattern_variables_and_display() {
        let pattern = Pattern::triple(var("x"), iri("knows"), var("x"));
        assert_eq!(pattern.variables(), vec!["?X".to_string()]);
        assert_eq!(pattern.to_string(), "?X <http://example.org/knows> ?X .");

        let quad = Pattern::quad(var("c"), var("s"), iri("p"), Term::plain("o"));
        assert_eq!(
            quad.variables(),
            vec!["?C".to_string(), "?S".to_string()]
        );
        assert_eq!(
            quad.to_string(),
            "GRAPH ?C { ?S <http://example.org/p> \"o\" }"
        );
    }

    #[test]
    fn test_values_table_and_admission() {
        let values = Values::new()
            .bind("x", vec![Some(iri("a")), None])
            .unwrap();
        assert!(values.has_undef());

        let table = values.to_table();
        assert!(table.is_optional);
        assert_eq!(table.len(), 2);

        let rows = SolutionTable::from_rows(
            ["?X"],
            vec![vec![Some(iri("b").encode())]],
        );
        // the UNDEF row admits anything
        assert!(values.admits(&rows.solution(0).unwrap()));

        let strict = Values::new().bind("x", vec![Some(iri("a"))]).unwrap();
        assert!(!strict.admits(&rows.solution(0).unwrap()));
        assert!(Values::new()
            .bind("x", vec![Some(iri("a"))])
            .unwrap()
            .bind("y", vec![])
            .is_err());
    }

    #[test]
    fn test_values_for_pattern() {
        let values = Values::new().bind("x", vec![Some(iri("a"))]).unwrap();
        let pattern = Pattern::triple(var("x"), iri("p"), var("y"));
        let group = PatternGroup::new()
            .add_values(Values::new().bind("z", vec![Some(iri("z"))]).unwrap())
            .add_values(values.clone())
            .add_pattern(pattern.clone());

        assert_eq!(group.values_for(&pattern), Some(&values));
        assert!(group.is_evaluable());
        assert!(!PatternGroup::new().is_evaluable());
    }

    #[test]
    fn test_path_builder() {
        let path = PropertyPath::new(var("a"), var("b"))
            .then(PathProperty::new(iri("p")))
            .then_any(vec![]);
        assert_eq!(path.steps.len(), 1);
        assert!(path.is_evaluable());
        assert!(!PropertyPath::new(var("a"), var("b")).is_evaluable());
    }
}
