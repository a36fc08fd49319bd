//! Constraint tree simplification.
//!
//! A semantics-preserving bottom-up rewrite: duplicate elimination,
//! disjunction subsumption inside conjunctions, singleton collapse, same-kind
//! flattening, and De Morgan push-down of negations. Trees are rebuilt
//! wholesale, never mutated in place. Node-local rules run to a per-node
//! fixed point so the whole rewrite is idempotent; deeper cross-node
//! simplification is out of scope.

use std::collections::BTreeSet;

use crate::ir::Constraint;

#[derive(Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    All,
    Any,
}

/// Simplify a constraint tree.
pub fn optimize(constraint: Constraint) -> Constraint {
    match constraint {
        Constraint::All(children) => rebuild(NodeKind::All, children),
        Constraint::Any(children) => rebuild(NodeKind::Any, children),
        Constraint::Not(inner) => match optimize(*inner) {
            // De Morgan: push the negation through, then simplify the result.
            Constraint::All(children) => rebuild(NodeKind::Any, negate_each(children)),
            Constraint::Any(children) => rebuild(NodeKind::All, negate_each(children)),
            // Double negation; the operand is already optimized.
            Constraint::Not(x) => *x,
            atom => Constraint::Not(Box::new(atom)),
        },
        atom => atom,
    }
}

fn negate_each(children: Vec<Constraint>) -> Vec<Constraint> {
    children
        .into_iter()
        .map(|c| Constraint::Not(Box::new(c)))
        .collect()
}

fn rebuild(kind: NodeKind, children: Vec<Constraint>) -> Constraint {
    let mut children: Vec<Constraint> = children.into_iter().map(optimize).collect();

    // Flattening can expose new duplicates and new subsumption witnesses, so
    // iterate the node-local rules until the child list stops changing.
    loop {
        let before: Vec<u64> = children.iter().map(Constraint::structural_hash).collect();
        children = dedup(children);
        if kind == NodeKind::All {
            children = drop_subsumed(children);
        }
        children = flatten(kind, children);
        let after: Vec<u64> = children.iter().map(Constraint::structural_hash).collect();
        if before == after {
            break;
        }
    }

    if children.len() == 1 {
        if let Some(only) = children.pop() {
            return only;
        }
    }
    match kind {
        NodeKind::All => Constraint::All(children),
        NodeKind::Any => Constraint::Any(children),
    }
}

/// Keep the first of each structurally equal child, preserving order.
fn dedup(children: Vec<Constraint>) -> Vec<Constraint> {
    let mut seen = BTreeSet::new();
    children
        .into_iter()
        .filter(|c| seen.insert(c.structural_hash()))
        .collect()
}

/// Inside a conjunction, a disjunction is redundant once every one of its
/// disjuncts is independently asserted by a sibling.
fn drop_subsumed(children: Vec<Constraint>) -> Vec<Constraint> {
    let hashes: Vec<u64> = children.iter().map(Constraint::structural_hash).collect();
    let mut keep = vec![true; children.len()];
    for (i, child) in children.iter().enumerate() {
        let Constraint::Any(disjuncts) = child else {
            continue;
        };
        if disjuncts.is_empty() {
            continue;
        }
        let implied = disjuncts.iter().all(|d| {
            let dh = d.structural_hash();
            hashes
                .iter()
                .enumerate()
                .any(|(j, &h)| j != i && keep[j] && h == dh)
        });
        if implied {
            keep[i] = false;
        }
    }
    let mut keep = keep.into_iter();
    children
        .into_iter()
        .filter(|_| keep.next().unwrap_or(false))
        .collect()
}

/// Splice same-kind children up one level.
fn flatten(kind: NodeKind, children: Vec<Constraint>) -> Vec<Constraint> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        match (kind, child) {
            (NodeKind::All, Constraint::All(inner)) => out.extend(inner),
            (NodeKind::Any, Constraint::Any(inner)) => out.extend(inner),
            (_, other) => out.push(other),
        }
    }
    out
}
