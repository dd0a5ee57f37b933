use samyama_sparql::sparql::ResultFormat;
use samyama_sparql::{
    Graph, Pattern, PatternGroup, Query, SolutionTable, SparqlEngine, SparqlResults, Term, Triple,
};

const EX: &str = "http://example.org/";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("Samyama SPARQL v{}", samyama_sparql::version());
    println!("==========================================");
    println!();

    let engine = SparqlEngine::new(dog_graph()?);

    // Demo 1: SELECT with an optional member
    println!("=== Demo 1: SELECT ===");
    let select = Query::select()
        .add_group(dogs_and_owner_names()?)
        .order_by("x", false)?;
    if let SparqlResults::Solutions(table) = engine.query(&select).await? {
        print_table(&table);
    }

    // Demo 2: ASK
    println!("\n=== Demo 2: ASK ===");
    let ask = Query::ask().add_group(PatternGroup::new().add_pattern(Pattern::triple(
        iri("balto")?,
        iri("dogOf")?,
        Term::variable("owner")?,
    )));
    println!("Does balto have an owner? {:?}", engine.query(&ask).await?.as_bool());

    // Demo 3: CONSTRUCT
    println!("\n=== Demo 3: CONSTRUCT ===");
    let construct = Query::construct(vec![Pattern::triple(
        Term::variable("x")?,
        iri("owns")?,
        Term::variable("y")?,
    )])
    .add_group(dogs_and_owner_names()?);
    let graph = engine.query(&construct).await?;
    print!("{}", graph.serialize(ResultFormat::NTriples)?);

    Ok(())
}

fn iri(local: &str) -> anyhow::Result<Term> {
    Ok(Term::resource(format!("{EX}{local}"))?)
}

fn dog_graph() -> anyhow::Result<Graph> {
    let mut graph = Graph::new();
    graph.insert(Triple::new(iri("pluto")?, iri("dogOf")?, iri("topolino")?))?;
    graph.insert(Triple::new(
        iri("topolino")?,
        iri("hasName")?,
        Term::lang("Mickey Mouse", "en-US")?,
    ))?;
    graph.insert(Triple::new(iri("fido")?, iri("dogOf")?, iri("paperino")?))?;
    graph.insert(Triple::new(
        iri("paperino")?,
        iri("hasName")?,
        Term::lang("Donald Duck", "en-US")?,
    ))?;
    graph.insert(Triple::new(iri("balto")?, iri("dogOf")?, iri("whoever")?))?;
    println!("✓ Loaded {} triples", graph.len());
    Ok(graph)
}

/// `{ ?Y dogOf ?X } OPTIONAL { ?X hasName ?N }`
fn dogs_and_owner_names() -> anyhow::Result<PatternGroup> {
    Ok(PatternGroup::new()
        .add_pattern(Pattern::triple(
            Term::variable("y")?,
            iri("dogOf")?,
            Term::variable("x")?,
        ))
        .add_pattern(
            Pattern::triple(Term::variable("x")?, iri("hasName")?, Term::variable("n")?).optional(),
        ))
}

fn print_table(table: &SolutionTable) {
    println!("  {}", table.columns().join(" | "));
    for row in table.rows() {
        let cells: Vec<&str> = row.iter().map(|c| c.as_deref().unwrap_or("-")).collect();
        println!("  {}", cells.join(" | "));
    }
    println!("  ({} rows)", table.len());
}
