//! Constraint intermediate representation.
//!
//! Lowering produces a tree of [`Constraint`] nodes over [`Operand`]s; the
//! optimizer rewrites the tree and the emitter turns it into circuit gates.
//! Structural hashing treats `All` and `Any` as unordered, so two
//! conjunctions with the same children in different orders hash identically.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use spargebra::term::Term;

/// Dense variable identifier allocated in discovery order.
pub type VarId = usize;

/// A value position a constraint can talk about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// A query variable, resolved to its circuit signal at emission.
    Variable(VarId),
    /// A constant RDF term, encoded at emission.
    Static(Term),
    /// One term position of one input triple: `triples[pattern][position]`.
    Slot { pattern: usize, position: usize },
}

/// Discriminant checks lowered from `isIRI` / `isBlank`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCheckKind {
    IsIri,
    IsBlank,
}

/// Integer comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

/// A boolean constraint over encoded terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Slot-wise equality of two encoded terms.
    Equality(Operand, Operand),
    /// Conjunction.
    All(Vec<Constraint>),
    /// Disjunction.
    Any(Vec<Constraint>),
    /// Negation.
    Not(Box<Constraint>),
    /// Discriminant check on slot 0.
    TypeCheck { operand: Operand, kind: TypeCheckKind },
    /// Integer comparison on the value slot.
    Compare {
        op: CompareOp,
        left: Operand,
        right: Operand,
    },
}

impl Constraint {
    /// Order-insensitive structural hash.
    ///
    /// Children of `All`/`Any` are hashed individually and the hashes sorted
    /// before being folded in, so child order never affects the result.
    /// `Equality` keeps its operand order: lowering already emits joins in a
    /// deterministic first-seen order, so ordered hashing stays stable.
    pub fn structural_hash(&self) -> u64 {
        let mut h = DefaultHasher::new();
        self.hash_into(&mut h);
        h.finish()
    }

    fn hash_into(&self, h: &mut DefaultHasher) {
        match self {
            Constraint::Equality(left, right) => {
                0u8.hash(h);
                left.hash(h);
                right.hash(h);
            }
            Constraint::All(children) => {
                1u8.hash(h);
                hash_unordered(children, h);
            }
            Constraint::Any(children) => {
                2u8.hash(h);
                hash_unordered(children, h);
            }
            Constraint::Not(inner) => {
                3u8.hash(h);
                inner.hash_into(h);
            }
            Constraint::TypeCheck { operand, kind } => {
                4u8.hash(h);
                operand.hash(h);
                kind.hash(h);
            }
            Constraint::Compare { op, left, right } => {
                5u8.hash(h);
                op.hash(h);
                left.hash(h);
                right.hash(h);
            }
        }
    }
}

fn hash_unordered(children: &[Constraint], h: &mut DefaultHasher) {
    let mut hashes: Vec<u64> = children.iter().map(Constraint::structural_hash).collect();
    hashes.sort_unstable();
    children.len().hash(h);
    for child in hashes {
        child.hash(h);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(a: VarId, b: VarId) -> Constraint {
        Constraint::Equality(Operand::Variable(a), Operand::Variable(b))
    }

    #[test]
    fn commutative_nodes_hash_order_insensitively() {
        let forward = Constraint::All(vec![eq(0, 1), eq(2, 3)]);
        let backward = Constraint::All(vec![eq(2, 3), eq(0, 1)]);
        assert_eq!(forward.structural_hash(), backward.structural_hash());

        let any_forward = Constraint::Any(vec![eq(0, 1), eq(2, 3)]);
        let any_backward = Constraint::Any(vec![eq(2, 3), eq(0, 1)]);
        assert_eq!(any_forward.structural_hash(), any_backward.structural_hash());
    }

    #[test]
    fn all_and_any_hash_differently() {
        let children = vec![eq(0, 1), eq(2, 3)];
        let all = Constraint::All(children.clone());
        let any = Constraint::Any(children);
        assert_ne!(all.structural_hash(), any.structural_hash());
    }

    #[test]
    fn distinct_operands_hash_differently() {
        assert_ne!(eq(0, 1).structural_hash(), eq(0, 2).structural_hash());
        let slot = Constraint::Equality(
            Operand::Slot {
                pattern: 0,
                position: 1,
            },
            Operand::Variable(1),
        );
        assert_ne!(slot.structural_hash(), eq(0, 1).structural_hash());
    }

    #[test]
    fn negation_changes_the_hash() {
        let plain = eq(0, 1);
        let negated = Constraint::Not(Box::new(plain.clone()));
        assert_ne!(plain.structural_hash(), negated.structural_hash());
    }
}
