//! Query object model
//!
//! Queries are built programmatically: a form (SELECT, ASK, DESCRIBE,
//! CONSTRUCT), ordered top-level members (pattern groups and subqueries) and
//! solution modifiers.

use super::expr::Expression;
use super::pattern::{MemberId, Pattern, PatternGroup};
use crate::rdf::{variable_name, Term, TermError, TermResult};

/// Query form and its form-specific input
#[derive(Debug, Clone, PartialEq)]
pub enum QueryForm {
    Select,
    Ask,
    /// Resources or variables to describe; empty means every variable
    Describe { terms: Vec<Term> },
    /// Triple or quad templates filled from each solution
    Construct { templates: Vec<Pattern> },
}

/// Top-level member of a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryMember {
    Group(PatternGroup),
    Subquery(Box<Query>),
}

impl QueryMember {
    pub fn id(&self) -> MemberId {
        match self {
            QueryMember::Group(group) => group.id(),
            QueryMember::Subquery(query) => query.id(),
        }
    }

    pub fn is_evaluable(&self) -> bool {
        match self {
            QueryMember::Group(group) => group.is_evaluable(),
            QueryMember::Subquery(query) => query.is_evaluable(),
        }
    }

    pub(crate) fn is_optional(&self) -> bool {
        match self {
            QueryMember::Group(group) => group.is_optional,
            QueryMember::Subquery(query) => query.is_optional,
        }
    }

    pub(crate) fn union_with_next(&self) -> bool {
        match self {
            QueryMember::Group(group) => group.union_with_next,
            QueryMember::Subquery(query) => query.union_with_next,
        }
    }
}

/// One projected column
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionItem {
    Variable(String),
    /// `(expression AS ?alias)`
    Expression { expression: Expression, alias: String },
}

impl ProjectionItem {
    pub fn name(&self) -> &str {
        match self {
            ProjectionItem::Variable(name) => name,
            ProjectionItem::Expression { alias, .. } => alias,
        }
    }
}

/// `ORDER BY` key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub variable: String,
    pub descending: bool,
}

/// Aggregate functions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Sample,
    GroupConcat { separator: String },
}

/// `FUNCTION(DISTINCT? ?variable) AS ?alias`; no variable means `COUNT(*)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregator {
    pub function: AggregateFunction,
    pub variable: Option<String>,
    pub alias: String,
    pub distinct: bool,
}

impl Aggregator {
    pub fn new(function: AggregateFunction, variable: &str, alias: &str) -> TermResult<Self> {
        Ok(Self {
            function,
            variable: Some(variable_name(variable)?),
            alias: variable_name(alias)?,
            distinct: false,
        })
    }

    /// `COUNT(*) AS ?alias`
    pub fn count_all(alias: &str) -> TermResult<Self> {
        Ok(Self {
            function: AggregateFunction::Count,
            variable: None,
            alias: variable_name(alias)?,
            distinct: false,
        })
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

/// `GROUP BY` keys, aggregates and `HAVING` conditions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupBy {
    pub variables: Vec<String>,
    pub aggregators: Vec<Aggregator>,
    /// Evaluated against each grouped row (keys and aggregate aliases)
    pub having: Vec<Expression>,
}

impl GroupBy {
    pub fn new(variables: &[&str]) -> TermResult<Self> {
        Ok(Self {
            variables: variables
                .iter()
                .map(|v| variable_name(v))
                .collect::<TermResult<_>>()?,
            ..Self::default()
        })
    }

    pub fn aggregate(mut self, aggregator: Aggregator) -> Self {
        self.aggregators.push(aggregator);
        self
    }

    pub fn having(mut self, condition: Expression) -> Self {
        self.having.push(condition);
        self
    }

    /// Output columns: keys then aggregate aliases
    pub fn columns(&self) -> Vec<String> {
        self.variables
            .iter()
            .cloned()
            .chain(self.aggregators.iter().map(|a| a.alias.clone()))
            .collect()
    }
}

/// Solution modifiers, applied in a fixed order by the executor
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Modifiers {
    pub group_by: Option<GroupBy>,
    pub order_by: Vec<OrderBy>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub distinct: bool,
}

/// Query object graph
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    id: MemberId,
    pub form: QueryForm,
    pub members: Vec<QueryMember>,
    /// Empty projection means `*`
    pub projection: Vec<ProjectionItem>,
    pub modifiers: Modifiers,
    /// Only meaningful when used as a subquery
    pub is_optional: bool,
    pub union_with_next: bool,
}

impl Query {
    fn with_form(form: QueryForm) -> Self {
        Self {
            id: MemberId::new(),
            form,
            members: Vec::new(),
            projection: Vec::new(),
            modifiers: Modifiers::default(),
            is_optional: false,
            union_with_next: false,
        }
    }

    pub fn select() -> Self {
        Self::with_form(QueryForm::Select)
    }

    pub fn ask() -> Self {
        Self::with_form(QueryForm::Ask)
    }

    /// DESCRIBE of resources and/or variables
    pub fn describe(terms: Vec<Term>) -> TermResult<Self> {
        if let Some(bad) = terms.iter().find(|t| t.is_literal()) {
            return Err(TermError::InvalidIri(bad.to_string()));
        }
        Ok(Self::with_form(QueryForm::Describe { terms }))
    }

    pub fn construct(templates: Vec<Pattern>) -> Self {
        Self::with_form(QueryForm::Construct { templates })
    }

    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn add_group(mut self, group: PatternGroup) -> Self {
        self.members.push(QueryMember::Group(group));
        self
    }

    pub fn add_subquery(mut self, query: Query) -> Self {
        self.members.push(QueryMember::Subquery(Box::new(query)));
        self
    }

    pub fn project(mut self, variable: &str) -> TermResult<Self> {
        self.projection
            .push(ProjectionItem::Variable(variable_name(variable)?));
        Ok(self)
    }

    pub fn project_expression(mut self, expression: Expression, alias: &str) -> TermResult<Self> {
        self.projection.push(ProjectionItem::Expression {
            expression,
            alias: variable_name(alias)?,
        });
        Ok(self)
    }

    pub fn distinct(mut self) -> Self {
        self.modifiers.distinct = true;
        self
    }

    pub fn order_by(mut self, variable: &str, descending: bool) -> TermResult<Self> {
        self.modifiers.order_by.push(OrderBy {
            variable: variable_name(variable)?,
            descending,
        });
        Ok(self)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.modifiers.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.modifiers.offset = Some(offset);
        self
    }

    pub fn group_by(mut self, group_by: GroupBy) -> Self {
        self.modifiers.group_by = Some(group_by);
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
        self.members.iter().any(QueryMember::is_evaluable)
    }
}
