//! Algebra lowering.
//!
//! Accepts the `Project -> [Filter] -> Bgp` fragment of the SPARQL algebra
//! and lowers it to triple-pattern bindings plus a [`Constraint`] tree.
//! A variable binds at its first occurrence; every later occurrence becomes a
//! slot/slot equality, which is exactly the join semantics of a BGP.

use std::collections::BTreeMap;

use spargebra::algebra::{Expression, Function, GraphPattern};
use spargebra::term::{NamedNodePattern, Term, TermPattern, TriplePattern, Variable};

use crate::error::CompileError;
use crate::ir::{CompareOp, Constraint, Operand, TypeCheckKind, VarId};

/// Variable interner. Identifiers are dense and allocated in discovery order,
/// projection variables first.
#[derive(Debug, Default, Clone)]
pub struct VarTable {
    names: Vec<String>,
    ids: BTreeMap<String, VarId>,
}

impl VarTable {
    fn intern(&mut self, var: &Variable) -> VarId {
        let name = var.as_str();
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    fn get(&self, var: &Variable) -> Option<VarId> {
        self.ids.get(var.as_str()).copied()
    }

    pub fn name(&self, id: VarId) -> &str {
        &self.names[id]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in identifier order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// The slot where a variable receives its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub var: VarId,
    pub pattern: usize,
    pub position: usize,
}

/// Result of lowering: everything the emitter needs.
#[derive(Debug, Clone)]
pub struct LoweredQuery {
    /// The BGP's triple patterns, in query order. Their count is the `N` of
    /// the circuit's `triples[N][3][W]` input.
    pub patterns: Vec<TriplePattern>,
    /// One bind site per distinct variable, in variable-id order.
    pub bindings: Vec<Binding>,
    /// Top-level conjunction: join/constant equalities, then the filter.
    pub constraint: Constraint,
    /// Projected variables, in projection order.
    pub outputs: Vec<VarId>,
    pub variables: VarTable,
}

/// Lower a SELECT query's graph pattern.
pub fn lower(pattern: &GraphPattern) -> Result<LoweredQuery, CompileError> {
    let GraphPattern::Project { inner, variables } = pattern else {
        return Err(CompileError::ParseShape(format!(
            "expected a projection at the top of the algebra, found {}",
            pattern_kind(pattern)
        )));
    };

    let (bgp, filter) = match inner.as_ref() {
        GraphPattern::Bgp { patterns } => (patterns, None),
        GraphPattern::Filter { expr, inner } => match inner.as_ref() {
            GraphPattern::Bgp { patterns } => (patterns, Some(expr)),
            other => return Err(shape_error(other)),
        },
        other => return Err(shape_error(other)),
    };

    let mut state = Lowering::default();
    // Projection variables get the lowest ids, then BGP discovery order.
    let outputs: Vec<VarId> = variables.iter().map(|v| state.variables.intern(v)).collect();

    for (index, triple) in bgp.iter().enumerate() {
        state.lower_triple(index, triple)?;
    }

    for &out in &outputs {
        if !state.first_slot.contains_key(&out) {
            return Err(CompileError::ParseShape(format!(
                "projected variable ?{} is never bound by the pattern",
                state.variables.name(out)
            )));
        }
    }

    let mut children = state.equalities;
    if let Some(expr) = filter {
        children.push(lower_expression(expr, &state.variables, &state.first_slot)?);
    }

    let bindings = state
        .first_slot
        .iter()
        .map(|(&var, &(pattern, position))| Binding {
            var,
            pattern,
            position,
        })
        .collect();

    Ok(LoweredQuery {
        patterns: bgp.clone(),
        bindings,
        constraint: Constraint::All(children),
        outputs,
        variables: state.variables,
    })
}

fn shape_error(pattern: &GraphPattern) -> CompileError {
    match pattern {
        GraphPattern::Graph { .. } => CompileError::UnsupportedOperation(
            "GRAPH patterns outside the default graph".to_string(),
        ),
        other => CompileError::ParseShape(format!(
            "expected a basic graph pattern, found {}",
            pattern_kind(other)
        )),
    }
}

fn pattern_kind(pattern: &GraphPattern) -> &'static str {
    match pattern {
        GraphPattern::Bgp { .. } => "a basic graph pattern",
        GraphPattern::Path { .. } => "a property path",
        GraphPattern::Join { .. } => "a join",
        GraphPattern::LeftJoin { .. } => "OPTIONAL",
        GraphPattern::Filter { .. } => "FILTER",
        GraphPattern::Union { .. } => "UNION",
        GraphPattern::Graph { .. } => "GRAPH",
        GraphPattern::Extend { .. } => "BIND",
        GraphPattern::Minus { .. } => "MINUS",
        GraphPattern::Values { .. } => "VALUES",
        GraphPattern::OrderBy { .. } => "ORDER BY",
        GraphPattern::Project { .. } => "a nested projection",
        GraphPattern::Distinct { .. } => "DISTINCT",
        GraphPattern::Reduced { .. } => "REDUCED",
        GraphPattern::Slice { .. } => "LIMIT/OFFSET",
        GraphPattern::Group { .. } => "GROUP BY",
        GraphPattern::Service { .. } => "SERVICE",
        #[allow(unreachable_patterns)]
        _ => "an unsupported pattern",
    }
}

/// One term position of a triple pattern.
enum Site {
    Var(Variable),
    Const(Term),
    Blank(String),
}

#[derive(Default)]
struct Lowering {
    variables: VarTable,
    first_slot: BTreeMap<VarId, (usize, usize)>,
    equalities: Vec<Constraint>,
}

impl Lowering {
    fn lower_triple(&mut self, index: usize, triple: &TriplePattern) -> Result<(), CompileError> {
        let sites = [
            term_site(&triple.subject),
            predicate_site(&triple.predicate),
            term_site(&triple.object),
        ];
        for (position, site) in sites.into_iter().enumerate() {
            let slot = Operand::Slot {
                pattern: index,
                position,
            };
            match site {
                Site::Var(var) => {
                    let id = self.variables.intern(&var);
                    match self.first_slot.get(&id) {
                        None => {
                            self.first_slot.insert(id, (index, position));
                        }
                        Some(&(first_pattern, first_position)) => {
                            // Join: same variable, two slots.
                            self.equalities.push(Constraint::Equality(
                                Operand::Slot {
                                    pattern: first_pattern,
                                    position: first_position,
                                },
                                slot,
                            ));
                        }
                    }
                }
                Site::Const(term) => {
                    self.equalities
                        .push(Constraint::Equality(Operand::Static(term), slot));
                }
                Site::Blank(label) => {
                    return Err(CompileError::UnexpectedBlankNode(label));
                }
            }
        }
        Ok(())
    }
}

fn term_site(pattern: &TermPattern) -> Site {
    match pattern {
        TermPattern::Variable(v) => Site::Var(v.clone()),
        TermPattern::NamedNode(n) => Site::Const(n.clone().into()),
        TermPattern::Literal(l) => Site::Const(l.clone().into()),
        TermPattern::BlankNode(b) => Site::Blank(b.as_str().to_string()),
    }
}

fn predicate_site(pattern: &NamedNodePattern) -> Site {
    match pattern {
        NamedNodePattern::Variable(v) => Site::Var(v.clone()),
        NamedNodePattern::NamedNode(n) => Site::Const(n.clone().into()),
    }
}

// =============================================================================
// FILTER EXPRESSIONS
// =============================================================================

fn lower_expression(
    expr: &Expression,
    variables: &VarTable,
    bound: &BTreeMap<VarId, (usize, usize)>,
) -> Result<Constraint, CompileError> {
    match expr {
        Expression::And(a, b) => Ok(Constraint::All(vec![
            lower_expression(a, variables, bound)?,
            lower_expression(b, variables, bound)?,
        ])),
        Expression::Or(a, b) => Ok(Constraint::Any(vec![
            lower_expression(a, variables, bound)?,
            lower_expression(b, variables, bound)?,
        ])),
        Expression::Not(inner) => Ok(Constraint::Not(Box::new(lower_expression(
            inner, variables, bound,
        )?))),
        // Term-level equality; SPARQL value semantics (e.g. "1"^^xsd:int =
        // "1"^^xsd:integer) are out of reach of a bitwise circuit.
        Expression::Equal(a, b) | Expression::SameTerm(a, b) => Ok(Constraint::Equality(
            lower_operand(a, variables, bound)?,
            lower_operand(b, variables, bound)?,
        )),
        Expression::Greater(a, b) => lower_compare(CompareOp::Greater, a, b, variables, bound),
        Expression::GreaterOrEqual(a, b) => {
            lower_compare(CompareOp::GreaterOrEqual, a, b, variables, bound)
        }
        Expression::Less(a, b) => lower_compare(CompareOp::Less, a, b, variables, bound),
        Expression::LessOrEqual(a, b) => {
            lower_compare(CompareOp::LessOrEqual, a, b, variables, bound)
        }
        Expression::FunctionCall(function, args) => {
            lower_function(function, args, variables, bound)
        }
        other => Err(CompileError::UnsupportedOperator(format!("{other:?}"))),
    }
}

fn lower_function(
    function: &Function,
    args: &[Expression],
    variables: &VarTable,
    bound: &BTreeMap<VarId, (usize, usize)>,
) -> Result<Constraint, CompileError> {
    let single_operand = || -> Result<Operand, CompileError> {
        match args {
            [arg] => lower_operand(arg, variables, bound),
            _ => Err(CompileError::UnsupportedOperator(format!(
                "{function} expects exactly one argument"
            ))),
        }
    };
    match function {
        Function::IsIri => Ok(Constraint::TypeCheck {
            operand: single_operand()?,
            kind: TypeCheckKind::IsIri,
        }),
        Function::IsBlank => Ok(Constraint::TypeCheck {
            operand: single_operand()?,
            kind: TypeCheckKind::IsBlank,
        }),
        // A literal is whatever is neither an IRI nor a blank node.
        Function::IsLiteral => {
            let operand = single_operand()?;
            Ok(Constraint::Not(Box::new(Constraint::Any(vec![
                Constraint::TypeCheck {
                    operand: operand.clone(),
                    kind: TypeCheckKind::IsIri,
                },
                Constraint::TypeCheck {
                    operand,
                    kind: TypeCheckKind::IsBlank,
                },
            ]))))
        }
        other => Err(CompileError::UnsupportedOperator(other.to_string())),
    }
}

fn lower_compare(
    op: CompareOp,
    a: &Expression,
    b: &Expression,
    variables: &VarTable,
    bound: &BTreeMap<VarId, (usize, usize)>,
) -> Result<Constraint, CompileError> {
    let left = lower_operand(a, variables, bound)?;
    let right = lower_operand(b, variables, bound)?;
    for operand in [&left, &right] {
        if let Operand::Static(term) = operand {
            let ok = matches!(
                term,
                Term::Literal(lit) if crate::encode::is_integer_datatype(lit.datatype().as_str())
            );
            if !ok {
                return Err(CompileError::UnsupportedOperator(format!(
                    "comparison against non-integer term {term}"
                )));
            }
        }
    }
    Ok(Constraint::Compare { op, left, right })
}

fn lower_operand(
    expr: &Expression,
    variables: &VarTable,
    bound: &BTreeMap<VarId, (usize, usize)>,
) -> Result<Operand, CompileError> {
    match expr {
        Expression::Variable(var) => match variables.get(var).filter(|id| bound.contains_key(id)) {
            Some(id) => Ok(Operand::Variable(id)),
            None => Err(CompileError::UnsupportedOperator(format!(
                "filter variable ?{} is not bound by the pattern",
                var.as_str()
            ))),
        },
        Expression::NamedNode(n) => Ok(Operand::Static(n.clone().into())),
        Expression::Literal(l) => Ok(Operand::Static(l.clone().into())),
        other => Err(CompileError::UnsupportedOperator(format!(
            "expected a variable or constant, found {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spargebra::{Query, SparqlParser};

    fn algebra(query: &str) -> GraphPattern {
        match SparqlParser::new().parse_query(query).expect("parses") {
            Query::Select { pattern, .. } => pattern,
            _ => panic!("not a SELECT query"),
        }
    }

    fn lowered(query: &str) -> LoweredQuery {
        lower(&algebra(query)).expect("lowers")
    }

    #[test]
    fn chain_join_produces_one_equality_per_reoccurrence() {
        let q = lowered(
            "SELECT ?x ?z WHERE { ?x <http://ex.org/p> ?y . ?y <http://ex.org/q> ?z }",
        );
        assert_eq!(q.patterns.len(), 2);
        // ?x, ?z projected first, then ?y: three distinct variables.
        assert_eq!(q.variables.len(), 3);
        assert_eq!(q.bindings.len(), 3);

        let Constraint::All(children) = &q.constraint else {
            panic!("top level must be a conjunction");
        };
        // Two constant predicates + one ?y join.
        let joins: Vec<_> = children
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    Constraint::Equality(Operand::Slot { .. }, Operand::Slot { .. })
                )
            })
            .collect();
        assert_eq!(joins.len(), 1);
        assert_eq!(
            joins[0],
            &Constraint::Equality(
                Operand::Slot {
                    pattern: 0,
                    position: 2
                },
                Operand::Slot {
                    pattern: 1,
                    position: 0
                },
            )
        );
    }

    #[test]
    fn constants_become_static_equalities() {
        let q = lowered("SELECT ?s WHERE { ?s <http://ex.org/name> \"alice\" }");
        let Constraint::All(children) = &q.constraint else {
            panic!();
        };
        let statics = children
            .iter()
            .filter(|c| matches!(c, Constraint::Equality(Operand::Static(_), _)))
            .count();
        // Predicate IRI and object literal.
        assert_eq!(statics, 2);
    }

    #[test]
    fn projection_order_is_preserved() {
        let q = lowered("SELECT ?b ?a WHERE { ?a <http://ex.org/p> ?b }");
        assert_eq!(q.variables.name(q.outputs[0]), "b");
        assert_eq!(q.variables.name(q.outputs[1]), "a");
    }

    #[test]
    fn blank_nodes_are_rejected() {
        let result = lower(&algebra("SELECT ?p WHERE { _:b ?p <http://ex.org/o> }"));
        assert!(matches!(result, Err(CompileError::UnexpectedBlankNode(_))));
    }

    #[test]
    fn optional_is_a_shape_error() {
        let result = lower(&algebra(
            "SELECT ?s WHERE { ?s <http://ex.org/p> ?o OPTIONAL { ?s <http://ex.org/q> ?r } }",
        ));
        match result {
            Err(CompileError::ParseShape(msg)) => assert!(msg.contains("OPTIONAL")),
            other => panic!("expected a shape error, got {other:?}"),
        }
    }

    #[test]
    fn named_graph_is_unsupported() {
        let result = lower(&algebra(
            "SELECT ?s WHERE { GRAPH <http://ex.org/g> { ?s <http://ex.org/p> ?o } }",
        ));
        assert!(matches!(result, Err(CompileError::UnsupportedOperation(_))));
    }

    #[test]
    fn inequality_lowers_to_negated_equality() {
        let q = lowered(
            "SELECT ?x ?y WHERE { ?x <http://ex.org/p> ?y FILTER(?x != ?y) }",
        );
        let Constraint::All(children) = &q.constraint else {
            panic!();
        };
        let not = children
            .iter()
            .find(|c| matches!(c, Constraint::Not(_)))
            .expect("negation present");
        let Constraint::Not(inner) = not else {
            unreachable!();
        };
        assert!(matches!(**inner, Constraint::Equality(_, _)));
    }

    #[test]
    fn is_literal_expands_to_negated_disjunction() {
        let q = lowered(
            "SELECT ?o WHERE { <http://ex.org/s> <http://ex.org/p> ?o FILTER(isLiteral(?o)) }",
        );
        let Constraint::All(children) = &q.constraint else {
            panic!();
        };
        let not = children
            .iter()
            .find(|c| matches!(c, Constraint::Not(_)))
            .expect("negation present");
        let Constraint::Not(inner) = not else {
            unreachable!();
        };
        let Constraint::Any(cases) = &**inner else {
            panic!("expected a disjunction of type checks");
        };
        assert_eq!(cases.len(), 2);
    }

    #[test]
    fn comparison_lowers_to_compare() {
        let q = lowered(
            "SELECT ?age WHERE { ?p <http://ex.org/age> ?age FILTER(?age > 18) }",
        );
        let Constraint::All(children) = &q.constraint else {
            panic!();
        };
        assert!(children.iter().any(|c| matches!(
            c,
            Constraint::Compare {
                op: CompareOp::Greater,
                ..
            }
        )));
    }

    #[test]
    fn comparison_against_a_string_is_rejected() {
        let result = lower(&algebra(
            "SELECT ?v WHERE { ?s <http://ex.org/p> ?v FILTER(?v > \"abc\") }",
        ));
        assert!(matches!(result, Err(CompileError::UnsupportedOperator(_))));
    }

    #[test]
    fn unbound_filter_variable_is_rejected() {
        let result = lower(&algebra(
            "SELECT ?s WHERE { ?s <http://ex.org/p> ?o FILTER(?missing = ?o) }",
        ));
        assert!(matches!(result, Err(CompileError::UnsupportedOperator(_))));
    }

    #[test]
    fn unsupported_builtins_are_rejected() {
        let result = lower(&algebra(
            "SELECT ?s WHERE { ?s <http://ex.org/p> ?o FILTER(STRLEN(STR(?o)) > 3) }",
        ));
        assert!(matches!(result, Err(CompileError::UnsupportedOperator(_))));
    }
}
