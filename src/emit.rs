//! Circuit emission.
//!
//! Serializes a lowered and optimized query into Circom source plus a witness
//! manifest. Layout of the generated template:
//!
//! ```text
//! signal input triples[N][3][W];   // one encoded term per pattern slot
//! signal output pub[K][W];         // projected variables, projection order
//! signal hid[H][W];                // non-projected bind targets, lazy
//! signal and[A];                   // captured aggregate booleans
//! ```
//!
//! Top-level conjuncts become direct `===` assertions where possible; negated
//! and nested boolean subtrees are lowered to gate expressions whose result
//! is captured in an `and[]` slot and asserted against its expected value.
//! Output is deterministic: variables are ordered by discovery, includes by
//! first use.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::encode::{self, disc, encode_term};
use crate::error::CompileError;
use crate::ir::{CompareOp, Constraint, Operand, TypeCheckKind, VarId};
use crate::lower::LoweredQuery;

const COMPARATOR_INCLUDE: &str = "circomlib/circuits/comparators.circom";

/// Default bit width of the circomlib comparison window.
pub const DEFAULT_COMPARATOR_BITS: usize = 64;

/// Emission options.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Encoded term width W.
    pub term_width: usize,
    /// Version for the `pragma circom` line.
    pub circuit_version: String,
    /// Bit width of the circomlib comparators (`GreaterThan(n)` etc.).
    /// Comparison operands must fit `n` bits; circomlib caps `n` at 252.
    pub comparator_bits: usize,
}

impl Default for EmitOptions {
    fn default() -> Self {
        EmitOptions {
            term_width: encode::DEFAULT_TERM_WIDTH,
            circuit_version: "2.0.0".to_string(),
            comparator_bits: DEFAULT_COMPARATOR_BITS,
        }
    }
}

/// Companion artifact describing the witness the circuit expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    /// Projected variable names, in projection (= output) order.
    pub variables: Vec<String>,
    /// Slots whose encoded value must be supplied as auxiliary witness input
    /// for a property proof (e.g. an integer comparison).
    pub property_slots: Vec<PropertySlot>,
}

/// One `triples[pattern][position]` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PropertySlot {
    pub pattern: usize,
    pub position: usize,
}

/// Emit circuit source and manifest for a lowered query.
pub fn emit(
    query: &LoweredQuery,
    options: &EmitOptions,
) -> Result<(String, Manifest), CompileError> {
    Emitter::new(query, options).run()
}

/// A constraint operand resolved to something the circuit can talk about.
enum Resolved {
    /// A signal expression indexable with `[i]`.
    Signal(String),
    /// An encoded constant term.
    Constant(Vec<i128>),
}

struct Emitter<'a> {
    query: &'a LoweredQuery,
    width: usize,
    version: &'a str,
    comparator_bits: usize,
    body: String,
    includes: Vec<String>,
    binding_slot: BTreeMap<VarId, (usize, usize)>,
    hidden: BTreeMap<VarId, usize>,
    aggregates: usize,
    next_tmp: usize,
    property_slots: Vec<PropertySlot>,
}

impl<'a> Emitter<'a> {
    fn new(query: &'a LoweredQuery, options: &'a EmitOptions) -> Self {
        let binding_slot = query
            .bindings
            .iter()
            .map(|b| (b.var, (b.pattern, b.position)))
            .collect();
        Emitter {
            query,
            width: options.term_width,
            version: &options.circuit_version,
            comparator_bits: options.comparator_bits,
            body: String::new(),
            includes: Vec::new(),
            binding_slot,
            hidden: BTreeMap::new(),
            aggregates: 0,
            next_tmp: 0,
            property_slots: Vec::new(),
        }
    }

    fn run(mut self) -> Result<(String, Manifest), CompileError> {
        self.wire_outputs()?;

        let top: Vec<&Constraint> = match &self.query.constraint {
            Constraint::All(children) => children.iter().collect(),
            single => vec![single],
        };
        let (direct, deferred): (Vec<_>, Vec<_>) = top
            .into_iter()
            .partition(|c| {
                !matches!(**c, Constraint::Not(_) | Constraint::Any(_) | Constraint::All(_))
            });
        for child in direct {
            self.emit_direct(child)?;
        }
        // Aggregate checks are co-located at the end of the template.
        for child in deferred {
            match child {
                Constraint::Not(inner) => {
                    let expr = self.bool_expr(inner)?;
                    let slot = self.capture(&expr);
                    let _ = writeln!(self.body, "  {slot} === 0;");
                }
                other => {
                    let expr = self.bool_expr(other)?;
                    let slot = self.capture(&expr);
                    let _ = writeln!(self.body, "  {slot} === 1;");
                }
            }
        }

        let source = self.assemble();
        let manifest = Manifest {
            variables: self
                .query
                .outputs
                .iter()
                .map(|&v| self.query.variables.name(v).to_string())
                .collect(),
            property_slots: self.property_slots,
        };
        Ok((source, manifest))
    }

    fn wire_outputs(&mut self) -> Result<(), CompileError> {
        for (k, &var) in self.query.outputs.iter().enumerate() {
            let (p, q) = self.lookup_binding(var)?;
            let w = self.width;
            let _ = writeln!(
                self.body,
                "  for (var i = 0; i < {w}; i++) {{ pub[{k}][i] <== triples[{p}][{q}][i]; }}"
            );
        }
        Ok(())
    }

    fn lookup_binding(&self, var: VarId) -> Result<(usize, usize), CompileError> {
        self.binding_slot.get(&var).copied().ok_or_else(|| {
            CompileError::ParseShape(format!(
                "variable ?{} has no binding slot",
                self.query.variables.name(var)
            ))
        })
    }

    // -------------------------------------------------------------------------
    // Direct top-level assertions
    // -------------------------------------------------------------------------

    fn emit_direct(&mut self, constraint: &Constraint) -> Result<(), CompileError> {
        match constraint {
            Constraint::Equality(left, right) => {
                let left = self.resolve(left)?;
                let right = self.resolve(right)?;
                match (left, right) {
                    (Resolved::Signal(a), Resolved::Signal(b)) => self.assert_vectors(&a, &b),
                    (Resolved::Signal(sig), Resolved::Constant(c))
                    | (Resolved::Constant(c), Resolved::Signal(sig)) => {
                        let name = self.constant_var(&c);
                        self.assert_vectors(&sig, &name);
                    }
                    (Resolved::Constant(a), Resolved::Constant(b)) => {
                        if a.len() != b.len() {
                            return Err(CompileError::TermElementLengthMismatch {
                                left: a.len(),
                                right: b.len(),
                            });
                        }
                        if a != b {
                            // Unsatisfiable query; the circuit admits no witness.
                            self.body.push_str("  0 === 1;\n");
                        }
                    }
                }
                Ok(())
            }
            Constraint::TypeCheck { operand, kind } => {
                let expected = discriminant_of(*kind);
                match self.resolve(operand)? {
                    Resolved::Signal(sig) => {
                        let _ = writeln!(self.body, "  {sig}[0] === {expected};");
                    }
                    Resolved::Constant(c) => {
                        if c.first() != Some(&expected) {
                            self.body.push_str("  0 === 1;\n");
                        }
                    }
                }
                Ok(())
            }
            Constraint::Compare { op, left, right } => {
                let out = self.compare_gate(*op, left, right)?;
                let _ = writeln!(self.body, "  {out} === 1;");
                Ok(())
            }
            other => Err(CompileError::UnsupportedConstraintType(format!("{other:?}"))),
        }
    }

    fn assert_vectors(&mut self, a: &str, b: &str) {
        let w = self.width;
        let _ = writeln!(
            self.body,
            "  for (var i = 0; i < {w}; i++) {{ {a}[i] === {b}[i]; }}"
        );
    }

    // -------------------------------------------------------------------------
    // Boolean-gate lowering for nested subtrees
    // -------------------------------------------------------------------------

    /// Lower a constraint to a 0/1 expression that is at most linear in
    /// signals (safe as one factor of a quadratic constraint).
    fn bool_expr(&mut self, constraint: &Constraint) -> Result<String, CompileError> {
        match constraint {
            Constraint::Equality(left, right) => {
                let left = self.resolve(left)?;
                let right = self.resolve(right)?;
                match (left, right) {
                    (Resolved::Constant(a), Resolved::Constant(b)) => {
                        if a.len() != b.len() {
                            return Err(CompileError::TermElementLengthMismatch {
                                left: a.len(),
                                right: b.len(),
                            });
                        }
                        Ok(if a == b { "1" } else { "0" }.to_string())
                    }
                    (left, right) => {
                        let a = self.indexable(left);
                        let b = self.indexable(right);
                        Ok(self.vector_equality(&a, &b))
                    }
                }
            }
            Constraint::TypeCheck { operand, kind } => {
                let expected = discriminant_of(*kind);
                match self.resolve(operand)? {
                    Resolved::Signal(sig) => {
                        Ok(self.is_equal(&format!("{sig}[0]"), &expected.to_string()))
                    }
                    Resolved::Constant(c) => {
                        Ok(if c.first() == Some(&expected) { "1" } else { "0" }.to_string())
                    }
                }
            }
            Constraint::Compare { op, left, right } => self.compare_gate(*op, left, right),
            Constraint::Not(inner) => {
                let expr = self.bool_expr(inner)?;
                Ok(format!("(1 - {expr})"))
            }
            Constraint::All(children) => {
                let parts = children
                    .iter()
                    .map(|c| self.bool_expr(c))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.conjunction(parts))
            }
            Constraint::Any(children) => {
                let parts = children
                    .iter()
                    .map(|c| self.bool_expr(c))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.disjunction(parts))
            }
        }
    }

    /// AND-reduction of W per-element `IsEqual` gates.
    fn vector_equality(&mut self, a: &str, b: &str) -> String {
        self.include(COMPARATOR_INCLUDE);
        let eq = self.fresh("eq");
        let acc = self.fresh("acc");
        let w = self.width;
        let _ = writeln!(self.body, "  component {eq}[{w}];");
        let _ = writeln!(self.body, "  signal {acc}[{n}];", n = w + 1);
        let _ = writeln!(self.body, "  {acc}[0] <== 1;");
        let _ = writeln!(self.body, "  for (var i = 0; i < {w}; i++) {{");
        let _ = writeln!(self.body, "    {eq}[i] = IsEqual();");
        let _ = writeln!(self.body, "    {eq}[i].in[0] <== {a}[i];");
        let _ = writeln!(self.body, "    {eq}[i].in[1] <== {b}[i];");
        let _ = writeln!(self.body, "    {acc}[i + 1] <== {acc}[i] * {eq}[i].out;");
        let _ = writeln!(self.body, "  }}");
        format!("{acc}[{w}]")
    }

    fn is_equal(&mut self, a: &str, b: &str) -> String {
        self.include(COMPARATOR_INCLUDE);
        let name = self.fresh("eq");
        let _ = writeln!(self.body, "  component {name} = IsEqual();");
        let _ = writeln!(self.body, "  {name}.in[0] <== {a};");
        let _ = writeln!(self.body, "  {name}.in[1] <== {b};");
        format!("{name}.out")
    }

    fn conjunction(&mut self, parts: Vec<String>) -> String {
        parts
            .into_iter()
            .reduce(|acc, next| {
                let name = self.fresh("b");
                let _ = writeln!(self.body, "  signal {name};");
                let _ = writeln!(self.body, "  {name} <== {acc} * {next};");
                name
            })
            .unwrap_or_else(|| "1".to_string())
    }

    fn disjunction(&mut self, parts: Vec<String>) -> String {
        parts
            .into_iter()
            .reduce(|acc, next| {
                let prod = self.fresh("b");
                let _ = writeln!(self.body, "  signal {prod};");
                let _ = writeln!(self.body, "  {prod} <== {acc} * {next};");
                format!("({acc} + {next} - {prod})")
            })
            .unwrap_or_else(|| "0".to_string())
    }

    /// Comparison gate over the integer value slot. Returns the gate's 0/1
    /// output, combined with the discriminant checks for signal operands.
    /// The witness values must fit the configured comparator bit width;
    /// beyond it the circomlib bit decomposition has no solution and a true
    /// comparison becomes unprovable.
    fn compare_gate(
        &mut self,
        op: CompareOp,
        left: &Operand,
        right: &Operand,
    ) -> Result<String, CompileError> {
        self.record_property_slot(left)?;
        self.record_property_slot(right)?;
        let left = self.resolve(left)?;
        let right = self.resolve(right)?;

        let mut parts = Vec::new();
        for side in [&left, &right] {
            if let Resolved::Signal(sig) = side {
                let check = self.is_equal(&format!("{sig}[0]"), &disc::INTEGER.to_string());
                parts.push(check);
            }
        }

        let template = match op {
            CompareOp::Greater => "GreaterThan",
            CompareOp::GreaterOrEqual => "GreaterEqThan",
            CompareOp::Less => "LessThan",
            CompareOp::LessOrEqual => "LessEqThan",
        };
        self.include(COMPARATOR_INCLUDE);
        let name = self.fresh("cmp");
        let lv = value_expr(&left)?;
        let rv = value_expr(&right)?;
        let _ = writeln!(
            self.body,
            "  component {name} = {template}({n});",
            n = self.comparator_bits
        );
        let _ = writeln!(self.body, "  {name}.in[0] <== {lv};");
        let _ = writeln!(self.body, "  {name}.in[1] <== {rv};");
        parts.push(format!("{name}.out"));
        Ok(self.conjunction(parts))
    }

    fn record_property_slot(&mut self, operand: &Operand) -> Result<(), CompileError> {
        let (pattern, position) = match operand {
            Operand::Slot { pattern, position } => (*pattern, *position),
            Operand::Variable(var) => self.lookup_binding(*var)?,
            Operand::Static(_) => return Ok(()),
        };
        let slot = PropertySlot { pattern, position };
        if !self.property_slots.contains(&slot) {
            self.property_slots.push(slot);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Operands, constants, scaffolding
    // -------------------------------------------------------------------------

    fn resolve(&mut self, operand: &Operand) -> Result<Resolved, CompileError> {
        match operand {
            Operand::Slot { pattern, position } => {
                Ok(Resolved::Signal(format!("triples[{pattern}][{position}]")))
            }
            Operand::Variable(var) => {
                if let Some(k) = self.query.outputs.iter().position(|v| v == var) {
                    return Ok(Resolved::Signal(format!("pub[{k}]")));
                }
                let h = self.hidden_signal(*var)?;
                Ok(Resolved::Signal(format!("hid[{h}]")))
            }
            Operand::Static(term) => {
                let encoded = encode_term(term, self.width)?;
                Ok(Resolved::Constant(encoded.into_slots()))
            }
        }
    }

    /// Private signal for a non-projected bind target, memoized by variable
    /// id so repeated references share one signal.
    fn hidden_signal(&mut self, var: VarId) -> Result<usize, CompileError> {
        if let Some(&h) = self.hidden.get(&var) {
            return Ok(h);
        }
        let (p, q) = self.lookup_binding(var)?;
        let h = self.hidden.len();
        self.hidden.insert(var, h);
        let w = self.width;
        let _ = writeln!(
            self.body,
            "  for (var i = 0; i < {w}; i++) {{ hid[{h}][i] <== triples[{p}][{q}][i]; }}"
        );
        Ok(h)
    }

    fn indexable(&mut self, resolved: Resolved) -> String {
        match resolved {
            Resolved::Signal(sig) => sig,
            Resolved::Constant(slots) => self.constant_var(&slots),
        }
    }

    fn constant_var(&mut self, slots: &[i128]) -> String {
        let name = self.fresh("c");
        let values = slots
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(self.body, "  var {name}[{n}] = [{values}];", n = slots.len());
        name
    }

    fn capture(&mut self, expr: &str) -> String {
        let slot = format!("and[{}]", self.aggregates);
        self.aggregates += 1;
        let _ = writeln!(self.body, "  {slot} <== {expr};");
        slot
    }

    fn fresh(&mut self, prefix: &str) -> String {
        let id = self.next_tmp;
        self.next_tmp += 1;
        format!("{prefix}{id}")
    }

    fn include(&mut self, path: &str) {
        if !self.includes.iter().any(|p| p == path) {
            self.includes.push(path.to_string());
        }
    }

    fn assemble(&self) -> String {
        let mut out = format!("pragma circom {};\n\n", self.version);
        for include in &self.includes {
            let _ = writeln!(out, "include \"{include}\";");
        }
        if !self.includes.is_empty() {
            out.push('\n');
        }
        out.push_str("template QueryVerifier() {\n");
        let _ = writeln!(
            out,
            "  signal input triples[{n}][3][{w}];",
            n = self.query.patterns.len(),
            w = self.width
        );
        let _ = writeln!(
            out,
            "  signal output pub[{k}][{w}];",
            k = self.query.outputs.len(),
            w = self.width
        );
        if !self.hidden.is_empty() {
            let _ = writeln!(
                out,
                "  signal hid[{h}][{w}];",
                h = self.hidden.len(),
                w = self.width
            );
        }
        if self.aggregates > 0 {
            let _ = writeln!(out, "  signal and[{}];", self.aggregates);
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push_str("}\n");
        out
    }
}

fn discriminant_of(kind: TypeCheckKind) -> i128 {
    match kind {
        TypeCheckKind::IsIri => disc::IRI,
        TypeCheckKind::IsBlank => disc::BLANK,
    }
}

/// The integer value slot of a comparison operand.
fn value_expr(resolved: &Resolved) -> Result<String, CompileError> {
    match resolved {
        Resolved::Signal(sig) => Ok(format!("{sig}[1]")),
        Resolved::Constant(slots) => slots.get(1).map(|v| v.to_string()).ok_or_else(|| {
            CompileError::UnsupportedConstraintType(
                "comparison operand has no value slot".to_string(),
            )
        }),
    }
}
