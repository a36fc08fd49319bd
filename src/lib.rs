//! SPARQL to Circom circuit compiler.
//!
//! Compiles a restricted SPARQL SELECT query (projection over an optionally
//! filtered basic graph pattern) into a Circom circuit that verifies, in zero
//! knowledge, that a set of hidden triples matches the query. Alongside the
//! circuit source the compiler produces a witness manifest naming the public
//! outputs and the slots needed for property proofs.
//!
//! Pipeline: parse ([`spargebra`]) -> lower ([`lower`]) -> simplify
//! ([`optimize`]) -> emit ([`emit`]), with RDF terms encoded into fixed-width
//! integer vectors by [`encode`].

use spargebra::algebra::GraphPattern;
use spargebra::{Query, SparqlParser};

pub mod emit;
pub mod encode;
pub mod error;
pub mod ir;
pub mod lower;
pub mod optimize;

pub use emit::{DEFAULT_COMPARATOR_BITS, EmitOptions, Manifest, PropertySlot};
pub use encode::{DEFAULT_TERM_WIDTH, EncodedTerm, decode_term, encode_term};
pub use error::{CompileError, EncodeError};

use lower::LoweredQuery;

/// Compilation options.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Encoded term width W; every signal vector in the circuit has this
    /// length.
    pub term_width: usize,
    /// Circom language version for the generated `pragma` line.
    pub circuit_version: String,
    /// Bit width of the circomlib comparison gates. Integer comparisons are
    /// only provable for witness values that fit this many bits.
    pub comparator_bits: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            term_width: encode::DEFAULT_TERM_WIDTH,
            circuit_version: "2.0.0".to_string(),
            comparator_bits: emit::DEFAULT_COMPARATOR_BITS,
        }
    }
}

/// The compiler's output pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitArtifacts {
    /// Circom source text.
    pub circuit: String,
    /// Witness manifest, serializable with serde.
    pub manifest: Manifest,
}

/// Compile a SPARQL SELECT query from its surface syntax.
pub fn compile_query(
    query: &str,
    options: &CompileOptions,
) -> Result<CircuitArtifacts, CompileError> {
    let parsed = SparqlParser::new()
        .parse_query(query)
        .map_err(|e| CompileError::Parse(e.to_string()))?;
    match parsed {
        Query::Select { pattern, .. } => compile_algebra(&pattern, options),
        _ => Err(CompileError::ParseShape(
            "only SELECT queries are supported".to_string(),
        )),
    }
}

/// Compile an already-parsed graph pattern.
pub fn compile_algebra(
    pattern: &GraphPattern,
    options: &CompileOptions,
) -> Result<CircuitArtifacts, CompileError> {
    let LoweredQuery {
        patterns,
        bindings,
        constraint,
        outputs,
        variables,
    } = lower::lower(pattern)?;
    log::debug!(
        "lowered {} triple patterns, {} variables, {} outputs",
        patterns.len(),
        variables.len(),
        outputs.len()
    );

    let constraint = optimize::optimize(constraint);
    log::debug!("optimized constraint: {constraint:?}");

    let lowered = LoweredQuery {
        patterns,
        bindings,
        constraint,
        outputs,
        variables,
    };
    let emit_options = EmitOptions {
        term_width: options.term_width,
        circuit_version: options.circuit_version.clone(),
        comparator_bits: options.comparator_bits,
    };
    let (circuit, manifest) = emit::emit(&lowered, &emit_options)?;
    log::debug!(
        "emitted {} bytes of circuit source, {} property slots",
        circuit.len(),
        manifest.property_slots.len()
    );
    Ok(CircuitArtifacts { circuit, manifest })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(query: &str) -> CircuitArtifacts {
        compile_query(query, &CompileOptions::default()).expect("compiles")
    }

    #[test]
    fn plain_select_compiles_to_a_pass_through_circuit() {
        let artifacts = compile("SELECT ?age WHERE { ?p <http://ex.org/age> ?age }");
        assert!(artifacts.circuit.contains("signal input triples[1][3][128];"));
        assert!(artifacts.circuit.contains("signal output pub[1][128];"));
        assert_eq!(artifacts.manifest.variables, vec!["age"]);
        assert!(artifacts.manifest.property_slots.is_empty());
    }

    #[test]
    fn integer_filter_adds_a_gate_and_a_manifest_entry() {
        let artifacts = compile(
            "SELECT ?age WHERE { ?p <http://ex.org/age> ?age FILTER(?age > 18) }",
        );
        assert!(artifacts.circuit.contains("GreaterThan(64);"));
        assert_eq!(
            artifacts.manifest.property_slots,
            vec![PropertySlot {
                pattern: 0,
                position: 2
            }]
        );
    }

    #[test]
    fn inequality_filter_emits_an_aggregate_false_check() {
        let artifacts = compile(
            "SELECT ?x ?y WHERE { ?x <http://ex.org/p> ?y FILTER(?x != ?y) }",
        );
        assert!(artifacts.circuit.contains("and[0] === 0;"));
    }

    #[test]
    fn optional_is_rejected_before_any_emission() {
        let result = compile_query(
            "SELECT ?s WHERE { ?s <http://ex.org/p> ?o \
             OPTIONAL { ?s <http://ex.org/q> ?r } }",
            &CompileOptions::default(),
        );
        assert!(matches!(result, Err(CompileError::ParseShape(_))));
    }

    #[test]
    fn non_select_queries_are_rejected() {
        let result = compile_query(
            "ASK { ?s <http://ex.org/p> ?o }",
            &CompileOptions::default(),
        );
        assert!(matches!(result, Err(CompileError::ParseShape(_))));
    }

    #[test]
    fn syntax_errors_surface_as_parse_errors() {
        let result = compile_query("SELECT WHERE {", &CompileOptions::default());
        assert!(matches!(result, Err(CompileError::Parse(_))));
    }

    #[test]
    fn term_width_option_flows_through() {
        let options = CompileOptions {
            term_width: 64,
            ..CompileOptions::default()
        };
        let artifacts = compile_query(
            "SELECT ?s WHERE { ?s <http://ex.org/p> ?o }",
            &options,
        )
        .expect("compiles");
        assert!(artifacts.circuit.contains("signal input triples[1][3][64];"));
    }

    #[test]
    fn compilation_is_deterministic() {
        let query = "SELECT ?x ?y WHERE { ?x <http://ex.org/p> ?y . \
                     ?y <http://ex.org/q> ?x FILTER(?x != ?y || isIRI(?x)) }";
        assert_eq!(compile(query), compile(query));
    }

    #[test]
    fn manifest_serializes_to_json() {
        let artifacts = compile(
            "SELECT ?age WHERE { ?p <http://ex.org/age> ?age FILTER(?age >= 21) }",
        );
        let json = serde_json::to_string_pretty(&artifacts.manifest).expect("serializes");
        assert!(json.contains("\"variables\""));
        assert!(json.contains("\"property_slots\""));
        assert!(json.contains("\"pattern\": 0"));
    }
}
