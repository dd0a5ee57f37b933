use samyama_sparql::rdf::{DataSource, Graph, MemoryStore, Quad, Term, Triple};
use samyama_sparql::sparql::{
    AggregateFunction, Aggregator, BinaryOp, EngineConfig, Expression, Filter, Function, GroupBy,
    Pattern, PatternGroup, PropertyPath, PathProperty, Query, SparqlEngine, SparqlResults,
    UnboundOrdering, Values,
};

fn iri(local: &str) -> Term {
    Term::resource(format!("http://example.org/{local}")).unwrap()
}

fn var(name: &str) -> Term {
    Term::variable(name).unwrap()
}

fn dog_graph() -> Graph {
    let mut graph = Graph::new();
    graph.insert(Triple::new(iri("pluto"), iri("dogOf"), iri("topolino"))).unwrap();
    graph
        .insert(Triple::new(
            iri("topolino"),
            iri("hasName"),
            Term::lang("Mickey Mouse", "en-US").unwrap(),
        ))
        .unwrap();
    graph.insert(Triple::new(iri("fido"), iri("dogOf"), iri("paperino"))).unwrap();
    graph
        .insert(Triple::new(
            iri("paperino"),
            iri("hasName"),
            Term::lang("Donald Duck", "en-US").unwrap(),
        ))
        .unwrap();
    graph.insert(Triple::new(iri("balto"), iri("dogOf"), iri("whoever"))).unwrap();
    graph
}

fn dogs_with_optional_names() -> PatternGroup {
    PatternGroup::new()
        .add_pattern(Pattern::triple(var("y"), iri("dogOf"), var("x")))
        .add_pattern(Pattern::triple(var("x"), iri("hasName"), var("n")).optional())
}

fn cell(value: &str) -> Option<String> {
    Some(value.to_string())
}

async fn select(engine: &SparqlEngine, query: Query) -> samyama_sparql::SolutionTable {
    match engine.query(&query).await.unwrap() {
        SparqlResults::Solutions(table) => table,
        other => panic!("Expected solutions, got {other:?}"),
    }
}

#[tokio::test]
async fn test_optional_owner_names_ordered() {
    let engine = SparqlEngine::new(dog_graph());
    let query = Query::select()
        .add_group(dogs_with_optional_names())
        .order_by("x", false)
        .unwrap();
    let table = select(&engine, query).await;

    assert_eq!(table.columns(), &["?Y".to_string(), "?X".to_string(), "?N".to_string()]);
    assert_eq!(
        table.rows(),
        &[
            vec![cell("http://example.org/fido"), cell("http://example.org/paperino"), cell("Donald Duck@EN-US")],
            vec![cell("http://example.org/pluto"), cell("http://example.org/topolino"), cell("Mickey Mouse@EN-US")],
            vec![cell("http://example.org/balto"), cell("http://example.org/whoever"), None],
        ]
    );
}

#[tokio::test]
async fn test_union_then_inner_join_drops_unmatched_branch() {
    let engine = SparqlEngine::new(dog_graph());
    let group = PatternGroup::new()
        .add_pattern(Pattern::triple(iri("pluto"), iri("dogOf"), var("x")).union_with_next())
        .add_pattern(Pattern::triple(iri("balto"), iri("dogOf"), var("x")))
        .add_pattern(Pattern::triple(var("x"), iri("hasName"), var("n")));
    let table = select(&engine, Query::select().add_group(group)).await;

    assert_eq!(table.len(), 1);
    assert_eq!(table.cell(0, "?X"), Some("http://example.org/topolino"));
    assert_eq!(table.cell(0, "?N"), Some("Mickey Mouse@EN-US"));
}

#[tokio::test]
async fn test_ask_without_evaluable_members_is_false() {
    let engine = SparqlEngine::new(dog_graph());
    let answer = engine
        .query(&Query::ask().add_group(PatternGroup::new()))
        .await
        .unwrap();
    assert_eq!(answer.as_bool(), Some(false));
}

#[tokio::test]
async fn test_unbound_last_and_descending() {
    let config = EngineConfig {
        unbound_ordering: UnboundOrdering::Last,
        ..EngineConfig::default()
    };
    let engine = SparqlEngine::new(dog_graph()).with_config(config);

    let ascending = Query::select()
        .add_group(dogs_with_optional_names())
        .order_by("n", false)
        .unwrap();
    let table = select(&engine, ascending).await;
    assert_eq!(table.cell(0, "?N"), Some("Donald Duck@EN-US"));
    assert_eq!(table.cell(2, "?N"), None);

    // descending mirrors ascending, unbound comes first
    let descending = Query::select()
        .add_group(dogs_with_optional_names())
        .order_by("n", true)
        .unwrap();
    let table = select(&engine, descending).await;
    assert_eq!(table.cell(0, "?N"), None);
    assert_eq!(table.cell(1, "?N"), Some("Mickey Mouse@EN-US"));
}

#[tokio::test]
async fn test_projection_slice_and_distinct() {
    let engine = SparqlEngine::new(dog_graph());
    let query = Query::select()
        .add_group(
            PatternGroup::new().add_pattern(Pattern::triple(var("s"), var("p"), var("o"))),
        )
        .project("p")
        .unwrap()
        .order_by("p", false)
        .unwrap()
        .distinct();
    let table = select(&engine, query).await;
    assert_eq!(table.columns(), &["?P".to_string()]);
    assert_eq!(
        table.rows(),
        &[vec![cell("http://example.org/dogOf")], vec![cell("http://example.org/hasName")]]
    );

    let query = Query::select()
        .add_group(dogs_with_optional_names())
        .order_by("y", false)
        .unwrap()
        .offset(1)
        .limit(1)
        .project("y")
        .unwrap();
    let table = select(&engine, query).await;
    assert_eq!(table.rows(), &[vec![cell("http://example.org/fido")]]);
}

#[tokio::test]
async fn test_filters_and_bind() {
    let engine = SparqlEngine::new(dog_graph());
    let group = dogs_with_optional_names()
        .add_filter(Filter::bound("n").unwrap())
        .add_filter(Filter::regex("n", "^mickey", Some("i")).unwrap())
        .add_bind(
            samyama_sparql::sparql::Bind::new(
                Expression::call(Function::UCase, vec![Expression::variable("n").unwrap()]),
                "shout",
            )
            .unwrap(),
        );
    let table = select(&engine, Query::select().add_group(group)).await;

    assert_eq!(table.len(), 1);
    assert_eq!(table.cell(0, "?Y"), Some("http://example.org/pluto"));
    assert_eq!(table.cell(0, "?SHOUT"), Some("MICKEY MOUSE@EN-US"));
}

#[tokio::test]
async fn test_values_block_restricts_rows() {
    let engine = SparqlEngine::new(dog_graph());
    let values = Values::new()
        .bind("y", vec![Some(iri("fido")), Some(iri("balto"))])
        .unwrap();
    let group = PatternGroup::new()
        .add_pattern(Pattern::triple(var("y"), iri("dogOf"), var("x")))
        .add_values(values);
    let query = Query::select().add_group(group).order_by("y", false).unwrap();
    let table = select(&engine, query).await;

    assert_eq!(table.len(), 2);
    assert_eq!(table.cell(0, "?Y"), Some("http://example.org/balto"));
    assert_eq!(table.cell(1, "?Y"), Some("http://example.org/fido"));
}

#[tokio::test]
async fn test_property_path_to_owner_name() {
    let engine = SparqlEngine::new(dog_graph());
    let path = PropertyPath::new(var("dog"), var("name"))
        .then(PathProperty::new(iri("dogOf")))
        .then(PathProperty::new(iri("hasName")));
    let query = Query::select()
        .add_group(PatternGroup::new().add_path(path))
        .order_by("dog", false)
        .unwrap();
    let table = select(&engine, query).await;

    assert_eq!(table.columns(), &["?DOG".to_string(), "?NAME".to_string()]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.cell(0, "?DOG"), Some("http://example.org/fido"));
}

#[tokio::test]
async fn test_group_by_with_having() {
    let mut graph = dog_graph();
    graph.insert(Triple::new(iri("rex"), iri("dogOf"), iri("topolino"))).unwrap();
    let engine = SparqlEngine::new(graph);

    let group_by = GroupBy::new(&["x"])
        .unwrap()
        .aggregate(Aggregator::new(AggregateFunction::Count, "y", "dogs").unwrap())
        .having(Expression::binary(
            Expression::variable("dogs").unwrap(),
            BinaryOp::Gt,
            Expression::constant(Term::integer(1)),
        ));
    let query = Query::select()
        .add_group(PatternGroup::new().add_pattern(Pattern::triple(var("y"), iri("dogOf"), var("x"))))
        .group_by(group_by);
    let table = select(&engine, query).await;

    assert_eq!(table.columns(), &["?X".to_string(), "?DOGS".to_string()]);
    assert_eq!(table.len(), 1);
    assert_eq!(table.cell(0, "?X"), Some("http://example.org/topolino"));
    assert_eq!(
        table.solution(0).and_then(|s| s.term("?DOGS")),
        Some(Term::integer(2))
    );
}

#[tokio::test]
async fn test_quad_store_source_and_shared_graph() {
    let mut store = MemoryStore::new();
    for (g, s) in [("g1", "pluto"), ("g2", "fido")] {
        store
            .insert(Quad::from_triple(iri(g), Triple::new(iri(s), iri("dogOf"), iri("topolino"))))
            .unwrap();
    }
    let engine = SparqlEngine::new(store);
    let query = Query::select().add_group(PatternGroup::new().add_pattern(Pattern::quad(
        var("g"),
        var("dog"),
        iri("dogOf"),
        var("owner"),
    )));
    let table = select(&engine, query).await;
    assert_eq!(table.len(), 2);
    assert_eq!(table.cell(1, "?G"), Some("http://example.org/g2"));

    let shared = std::sync::Arc::new(tokio::sync::RwLock::new(dog_graph()));
    let engine = SparqlEngine::new(DataSource::from(shared.clone()));
    shared
        .write()
        .await
        .insert(Triple::new(iri("rex"), iri("dogOf"), iri("whoever")))
        .unwrap();
    let query = Query::select().add_group(
        PatternGroup::new().add_pattern(Pattern::triple(var("y"), iri("dogOf"), iri("whoever"))),
    );
    assert_eq!(select(&engine, query).await.len(), 2);
}

#[tokio::test]
async fn test_top_level_optional_and_union_groups() {
    let engine = SparqlEngine::new(dog_graph());
    let owners = PatternGroup::new().add_pattern(Pattern::triple(var("y"), iri("dogOf"), var("x")));
    let names = PatternGroup::new()
        .add_pattern(Pattern::triple(var("x"), iri("hasName"), var("n")))
        .optional();
    let query = Query::select()
        .add_group(owners)
        .add_group(names)
        .order_by("y", false)
        .unwrap();
    let table = select(&engine, query).await;

    assert_eq!(table.len(), 3);
    assert_eq!(table.cell(0, "?Y"), Some("http://example.org/balto"));
    assert_eq!(table.cell(0, "?N"), None);
    assert_eq!(table.cell(2, "?N"), Some("Mickey Mouse@EN-US"));

    let pluto = PatternGroup::new()
        .add_pattern(Pattern::triple(iri("pluto"), iri("dogOf"), var("x")))
        .union_with_next();
    let fido = PatternGroup::new().add_pattern(Pattern::triple(iri("fido"), iri("dogOf"), var("x")));
    let query = Query::select()
        .add_group(pluto)
        .add_group(fido)
        .order_by("x", false)
        .unwrap();
    let table = select(&engine, query).await;

    assert_eq!(
        table.rows(),
        &[vec![cell("http://example.org/paperino")], vec![cell("http://example.org/topolino")]]
    );
}

#[tokio::test]
async fn test_order_by_mixed_object_kinds() {
    let mut graph = Graph::new();
    let objects = [
        Term::plain("Pluto"),
        Term::integer(12),
        iri("topolino"),
        Term::typed("2020-01-01T00:00:00Z", "http://www.w3.org/2001/XMLSchema#dateTime"),
        Term::blank("b1"),
        Term::integer(3),
    ];
    for (i, object) in objects.into_iter().enumerate() {
        graph
            .insert(Triple::new(iri("pluto"), iri(&format!("p{i}")), object))
            .unwrap();
    }
    let engine = SparqlEngine::new(graph);
    let query = Query::select()
        .add_group(PatternGroup::new().add_pattern(Pattern::triple(var("s"), var("p"), var("o"))))
        .project("o")
        .unwrap()
        .order_by("o", false)
        .unwrap();
    let table = select(&engine, query).await;

    assert_eq!(
        table.rows(),
        &[
            vec![cell("bnode:b1")],
            vec![cell("http://example.org/topolino")],
            vec![cell("3^^http://www.w3.org/2001/XMLSchema#integer")],
            vec![cell("12^^http://www.w3.org/2001/XMLSchema#integer")],
            vec![cell("2020-01-01T00:00:00Z^^http://www.w3.org/2001/XMLSchema#dateTime")],
            vec![cell("Pluto")],
        ]
    );
}
