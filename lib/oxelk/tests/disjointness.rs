#![cfg(test)]
#![allow(clippy::panic_in_result_fn)]

use oxelk::{Axiom, ClassExpression, IndexError, OccurrenceOwner, Reasoner, ReasonerError};
use oxrdf::NamedNode;
use std::error::Error;

fn iri(name: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("http://example.com/{name}"))
}

fn class(name: &str) -> ClassExpression {
    ClassExpression::class(iri(name))
}

fn satisfiable(reasoner: &Reasoner, name: &str) -> bool {
    reasoner.is_satisfiable(iri(name).as_ref())
}

#[test]
fn test_two_disjoint_subsumers() -> Result<(), Box<dyn Error>> {
    let mut reasoner = Reasoner::new();
    reasoner.add_axiom(&Axiom::disjoint_classes([class("B"), class("C"), class("D")]))?;
    reasoner.add_axiom(&Axiom::subclass_of(class("A"), class("B")))?;
    reasoner.add_axiom(&Axiom::subclass_of(class("A"), class("C")))?;
    reasoner.add_axiom(&Axiom::subclass_of(class("E"), class("D")))?;
    reasoner.classify()?;
    assert!(!satisfiable(&reasoner, "A"));
    assert!(satisfiable(&reasoner, "B"));
    assert!(satisfiable(&reasoner, "E"));
    assert_eq!(reasoner.check_fixpoint(), 0);
    Ok(())
}

#[test]
fn test_one_member_reached_twice() -> Result<(), Box<dyn Error>> {
    let mut reasoner = Reasoner::new();
    reasoner.add_axiom(&Axiom::disjoint_classes([class("B"), class("C")]))?;
    reasoner.add_axiom(&Axiom::subclass_of(class("A"), class("B")))?;
    reasoner.add_axiom(&Axiom::subclass_of(class("A"), class("D")))?;
    reasoner.add_axiom(&Axiom::subclass_of(class("D"), class("B")))?;
    reasoner.classify()?;
    assert!(satisfiable(&reasoner, "A"));
    Ok(())
}

#[test]
fn test_repeated_member_is_unsatisfiable() -> Result<(), Box<dyn Error>> {
    let mut reasoner = Reasoner::new();
    reasoner.add_axiom(&Axiom::disjoint_classes([class("B"), class("C"), class("B")]))?;
    reasoner.add_axiom(&Axiom::subclass_of(class("A"), class("B")))?;
    reasoner.add_axiom(&Axiom::subclass_of(class("D"), class("C")))?;
    reasoner.classify()?;
    assert!(!satisfiable(&reasoner, "B"));
    assert!(!satisfiable(&reasoner, "A"));
    assert!(satisfiable(&reasoner, "C"));
    assert!(satisfiable(&reasoner, "D"));
    Ok(())
}

#[test]
fn test_disjoint_existential_fillers() -> Result<(), Box<dyn Error>> {
    let mut reasoner = Reasoner::new();
    reasoner.add_axiom(&Axiom::disjoint_classes([class("B"), class("C")]))?;
    reasoner.add_axiom(&Axiom::subclass_of(
        class("A"),
        ClassExpression::some_values_from(
            iri("r"),
            ClassExpression::intersection([class("B"), class("C")]),
        ),
    ))?;
    reasoner.classify()?;
    assert!(!satisfiable(&reasoner, "A"));
    assert!(satisfiable(&reasoner, "B"));
    Ok(())
}

#[test]
fn test_removal_restores_satisfiability() -> Result<(), Box<dyn Error>> {
    let disjointness = Axiom::disjoint_classes([class("B"), class("C")]);
    let mut reasoner = Reasoner::new();
    reasoner.add_axiom(&disjointness)?;
    reasoner.add_axiom(&disjointness)?;
    reasoner.add_axiom(&Axiom::subclass_of(class("A"), class("B")))?;
    reasoner.add_axiom(&Axiom::subclass_of(class("A"), class("C")))?;
    reasoner.classify()?;
    assert!(!satisfiable(&reasoner, "A"));

    // The axiom has been added twice
    reasoner.remove_axiom(&disjointness)?;
    reasoner.classify()?;
    assert!(!satisfiable(&reasoner, "A"));

    reasoner.remove_axiom(&disjointness)?;
    reasoner.classify()?;
    assert!(satisfiable(&reasoner, "A"));
    assert!(reasoner.is_subsumed_by(iri("A").as_ref(), iri("C").as_ref()));
    assert!(!reasoner.is_subsumed_by(iri("A").as_ref(), iri("D").as_ref()));
    assert_eq!(reasoner.check_fixpoint(), 0);
    Ok(())
}

#[test]
fn test_removing_too_much_fails() -> Result<(), Box<dyn Error>> {
    let disjointness = Axiom::disjoint_classes([class("B"), class("C")]);
    let mut reasoner = Reasoner::new();
    reasoner.add_axiom(&disjointness)?;
    reasoner.remove_axiom(&disjointness)?;
    let error = reasoner.remove_axiom(&disjointness).unwrap_err();
    assert!(matches!(
        error,
        ReasonerError::Index(IndexError::NegativeOccurrence(
            OccurrenceOwner::UnindexedAxiom(_)
        ))
    ));
    assert_eq!(reasoner.pending_changes(), 0);
    assert_eq!(reasoner.index().axioms().count(), 0);
    Ok(())
}
