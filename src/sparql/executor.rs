//! SPARQL query executor

use super::algebra::{combine_tables, union};
use super::config::EngineConfig;
use super::expr::ExpressionEvaluator;
use super::federation::evaluate_pattern;
use super::group::evaluate_group;
use super::modifiers::apply_modifiers;
use super::pattern::{MemberId, Pattern};
use super::query::{Query, QueryForm, QueryMember};
use super::results::SparqlResults;
use super::table::{Cell, SolutionTable};
use super::{SparqlError, SparqlResult};
use crate::rdf::{DataSource, Term};
use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

pub const CONTEXT_VARIABLE: &str = "?CONTEXT";
pub const SUBJECT_VARIABLE: &str = "?SUBJECT";
pub const PREDICATE_VARIABLE: &str = "?PREDICATE";
pub const OBJECT_VARIABLE: &str = "?OBJECT";

/// State of one evaluation call
///
/// Created fresh for every query run and dropped when it returns, so an
/// executor can be shared between concurrent evaluations.
#[derive(Debug)]
pub(crate) struct EvaluationContext {
    pub config: EngineConfig,
    pub evaluator: ExpressionEvaluator,
    /// Pattern group id -> member tables before folding
    pub group_tables: FxHashMap<MemberId, Vec<SolutionTable>>,
    /// Query member id -> finalized member table
    pub member_tables: FxHashMap<MemberId, SolutionTable>,
}

impl EvaluationContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            evaluator: ExpressionEvaluator::new(),
            group_tables: FxHashMap::default(),
            member_tables: FxHashMap::default(),
        }
    }
}

/// SPARQL query executor
#[derive(Debug, Clone, Default)]
pub struct SparqlExecutor {
    config: EngineConfig,
}

impl SparqlExecutor {
    /// Create a new executor
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute a query of any form
    pub async fn execute(&self, query: &Query, source: &DataSource) -> SparqlResult<SparqlResults> {
        Ok(match &query.form {
            QueryForm::Select => SparqlResults::Solutions(self.execute_select(query, source).await?),
            QueryForm::Ask => SparqlResults::Boolean(self.execute_ask(query, source).await?),
            QueryForm::Describe { .. } => {
                SparqlResults::Graph(self.execute_describe(query, source).await?)
            }
            QueryForm::Construct { .. } => {
                SparqlResults::Graph(self.execute_construct(query, source).await?)
            }
        })
    }

    /// Execute a SELECT query
    pub async fn execute_select(&self, query: &Query, source: &DataSource) -> SparqlResult<SolutionTable> {
        info!(query = %query.id(), source = %source.label(), "executing SELECT");
        let mut ctx = EvaluationContext::new(self.config.clone());
        let table = evaluate_members(query, source, &mut ctx).await?;
        Ok(apply_modifiers(query, table, &ctx.evaluator, &ctx.config))
    }

    /// Execute an ASK query
    ///
    /// True iff the query has an evaluable member and its solutions are
    /// non-empty.
    pub async fn execute_ask(&self, query: &Query, source: &DataSource) -> SparqlResult<bool> {
        info!(query = %query.id(), source = %source.label(), "executing ASK");
        if !query.is_evaluable() {
            return Ok(false);
        }
        let mut ctx = EvaluationContext::new(self.config.clone());
        let table = evaluate_members(query, source, &mut ctx).await?;
        Ok(!table.is_empty())
    }

    /// Execute a DESCRIBE query
    ///
    /// Columns are `?CONTEXT ?SUBJECT ?PREDICATE ?OBJECT` for quad stores and
    /// `?SUBJECT ?PREDICATE ?OBJECT` otherwise.
    pub async fn execute_describe(&self, query: &Query, source: &DataSource) -> SparqlResult<SolutionTable> {
        info!(query = %query.id(), source = %source.label(), "executing DESCRIBE");
        let QueryForm::Describe { terms } = &query.form else {
            return Err(SparqlError::Execution(format!(
                "query {} is not a DESCRIBE query",
                query.id()
            )));
        };
        let mut ctx = EvaluationContext::new(self.config.clone());
        let solutions = if query.is_evaluable() {
            evaluate_members(query, source, &mut ctx).await?
        } else {
            SolutionTable::default()
        };

        let resources = describe_resources(terms, &solutions);
        debug!(resources = resources.len(), "describe terms resolved");

        let quads = source.is_quad_capable();
        let mut result = SolutionTable::new(graph_columns(quads));
        let predicate = Term::Variable(PREDICATE_VARIABLE.to_string());
        let object = Term::Variable(OBJECT_VARIABLE.to_string());
        for resource in resources {
            let subject = Term::decode(&resource);
            let pattern = if quads {
                Pattern::quad(
                    Term::Variable(CONTEXT_VARIABLE.to_string()),
                    subject,
                    predicate.clone(),
                    object.clone(),
                )
            } else {
                Pattern::triple(subject, predicate.clone(), object.clone())
            };
            let mut described = evaluate_pattern(&pattern, source, None, &ctx.config).await?;
            let column = described.add_column(SUBJECT_VARIABLE);
            for row in 0..described.len() {
                described.set_cell(row, column, Some(resource.clone()));
            }
            result = union(&result, &described);
        }

        finish_graph(query, &mut result);
        Ok(result)
    }

    /// Execute a CONSTRUCT query
    ///
    /// Rows that would put an unbound value anywhere, a non-resource in the
    /// subject or context, or a non-IRI in the predicate are skipped for that
    /// template.
    pub async fn execute_construct(&self, query: &Query, source: &DataSource) -> SparqlResult<SolutionTable> {
        info!(query = %query.id(), source = %source.label(), "executing CONSTRUCT");
        let QueryForm::Construct { templates } = &query.form else {
            return Err(SparqlError::Execution(format!(
                "query {} is not a CONSTRUCT query",
                query.id()
            )));
        };
        let mut ctx = EvaluationContext::new(self.config.clone());
        let solutions = evaluate_members(query, source, &mut ctx).await?;

        let quads = templates.iter().any(Pattern::is_quad);
        let mut result = SolutionTable::new(graph_columns(quads));
        for template in templates {
            for solution in solutions.solutions() {
                let fill = |term: &Term| -> Option<Term> {
                    match term {
                        Term::Variable(name) => solution.term(name),
                        constant => Some(constant.clone()),
                    }
                };
                let context = match &template.context {
                    Some(context) => match fill(context) {
                        Some(c) if c.is_resource() && !c.is_blank() => Some(c),
                        _ => continue,
                    },
                    None => None,
                };
                let (Some(subject), Some(predicate), Some(object)) = (
                    fill(&template.subject),
                    fill(&template.predicate),
                    fill(&template.object),
                ) else {
                    continue;
                };
                if !subject.is_resource() || !predicate.is_resource() || predicate.is_blank() {
                    continue;
                }

                let mut row: Vec<Cell> = Vec::with_capacity(4);
                if quads {
                    row.push(context.map(|c| c.encode()));
                }
                row.extend([
                    Some(subject.encode()),
                    Some(predicate.encode()),
                    Some(object.encode()),
                ]);
                result.push_row(row);
            }
        }

        finish_graph(query, &mut result);
        Ok(result)
    }
}

/// Fold every evaluable top-level member into the query's solution table
///
/// Subqueries run through the full modifier pipeline first.
pub(crate) fn evaluate_members<'a>(
    query: &'a Query,
    source: &'a DataSource,
    ctx: &'a mut EvaluationContext,
) -> BoxFuture<'a, SparqlResult<SolutionTable>> {
    async move {
        let mut tables = Vec::with_capacity(query.members.len());
        let mut previous_union = false;
        for member in query.members.iter().filter(|m| m.is_evaluable()) {
            let table = match member {
                QueryMember::Group(group) => evaluate_group(group, source, ctx).await?,
                QueryMember::Subquery(subquery) => {
                    let inner = evaluate_members(subquery, source, ctx).await?;
                    apply_modifiers(subquery, inner, &ctx.evaluator, &ctx.config)
                }
            };
            let table = table.with_flags(member.is_optional(), previous_union);
            debug!(member = %member.id(), rows = table.len(), "top-level member evaluated");
            ctx.member_tables.insert(member.id(), table.clone());
            tables.push(table);
            previous_union = member.union_with_next();
        }
        Ok(combine_tables(tables))
    }
    .boxed()
}

/// Encoded resources to describe, in first-appearance order
fn describe_resources(terms: &[Term], solutions: &SolutionTable) -> IndexSet<String> {
    let is_resource = |encoded: &String| Term::decode(encoded).is_resource();
    let mut resources = IndexSet::new();
    if terms.is_empty() {
        for column in solutions.columns() {
            resources.extend(
                solutions
                    .column_values(column)
                    .into_iter()
                    .filter(is_resource),
            );
        }
        return resources;
    }
    for term in terms {
        match term {
            Term::Variable(name) => resources.extend(
                solutions
                    .column_values(name)
                    .into_iter()
                    .filter(is_resource),
            ),
            resource if resource.is_resource() => {
                resources.insert(resource.encode());
            }
            _ => {}
        }
    }
    resources
}

fn graph_columns(quads: bool) -> Vec<&'static str> {
    let mut columns = Vec::with_capacity(4);
    if quads {
        columns.push(CONTEXT_VARIABLE);
    }
    columns.extend([SUBJECT_VARIABLE, PREDICATE_VARIABLE, OBJECT_VARIABLE]);
    columns
}

/// DISTINCT, OFFSET and LIMIT on a produced triple/quad table
fn finish_graph(query: &Query, table: &mut SolutionTable) {
    if query.modifiers.distinct {
        table.distinct();
    }
    table.slice(query.modifiers.offset, query.modifiers.limit);
}
