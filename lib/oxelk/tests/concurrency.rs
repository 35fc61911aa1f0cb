#![cfg(test)]
#![allow(clippy::panic_in_result_fn)]

use oxelk::{Axiom, ClassExpression, Reasoner, ReasonerConfig, SaturationStatus};
use oxrdf::NamedNode;
use std::error::Error;
use std::thread;
use std::time::Duration;

fn iri(name: String) -> NamedNode {
    NamedNode::new_unchecked(format!("http://example.com/{name}"))
}

fn class(i: usize) -> ClassExpression {
    ClassExpression::class(iri(format!("C{i}")))
}

fn property(i: usize) -> NamedNode {
    iri(format!("p{}", i % 3))
}

/// A layered ontology where every class has told subsumers, existentials and conjunctions
/// pointing to the next layers.
fn ontology(size: usize) -> Vec<Axiom> {
    let mut axioms = Vec::new();
    for i in 0..size {
        axioms.push(Axiom::subclass_of(class(i), class((i * 7 + 1) % size)));
        axioms.push(Axiom::subclass_of(
            class(i),
            ClassExpression::some_values_from(property(i), class((i * 3 + 2) % size)),
        ));
        axioms.push(Axiom::subclass_of(
            ClassExpression::intersection([
                class(i),
                ClassExpression::some_values_from(property(i + 1), class((i + 5) % size)),
            ]),
            class((i + 11) % size),
        ));
        if i % 10 == 0 {
            axioms.push(Axiom::disjoint_classes([class(i), class((i + 4) % size)]));
        }
    }
    axioms
}

fn classify(axioms: &[Axiom], workers: usize) -> Result<Reasoner, Box<dyn Error>> {
    let mut reasoner = Reasoner::with_config(ReasonerConfig::default().with_workers(workers));
    for axiom in axioms {
        reasoner.add_axiom(axiom)?;
    }
    assert_eq!(reasoner.classify()?, SaturationStatus::Saturated);
    Ok(reasoner)
}

fn taxonomy(reasoner: &Reasoner, size: usize) -> Vec<(bool, Vec<NamedNode>)> {
    (0..size)
        .map(|i| {
            let class = iri(format!("C{i}"));
            (
                reasoner.is_satisfiable(class.as_ref()),
                reasoner.subsumers(class.as_ref()),
            )
        })
        .collect()
}

#[test]
fn test_worker_count_does_not_change_the_result() -> Result<(), Box<dyn Error>> {
    let axioms = ontology(60);
    let sequential = classify(&axioms, 1)?;
    assert_eq!(sequential.check_fixpoint(), 0);
    let expected = taxonomy(&sequential, 60);
    for workers in [2, 4] {
        let parallel = classify(&axioms, workers)?;
        assert_eq!(parallel.check_fixpoint(), 0, "{workers} workers");
        assert_eq!(taxonomy(&parallel, 60), expected, "{workers} workers");
        assert_eq!(
            parallel.statistics().conclusions_inserted,
            sequential.statistics().conclusions_inserted,
            "{workers} workers"
        );
    }
    Ok(())
}

#[test]
fn test_parallel_incremental_changes() -> Result<(), Box<dyn Error>> {
    let axioms = ontology(50);
    let (kept, changed) = axioms.split_at(axioms.len() / 2);
    let mut reasoner = classify(kept, 4)?;
    for axiom in changed {
        reasoner.add_axiom(axiom)?;
    }
    reasoner.classify()?;
    assert_eq!(reasoner.check_fixpoint(), 0);
    assert_eq!(taxonomy(&reasoner, 50), taxonomy(&classify(&axioms, 1)?, 50));

    for axiom in changed {
        reasoner.remove_axiom(axiom)?;
    }
    reasoner.classify()?;
    assert_eq!(reasoner.check_fixpoint(), 0);
    assert_eq!(taxonomy(&reasoner, 50), taxonomy(&classify(kept, 1)?, 50));
    Ok(())
}

#[test]
fn test_interruption_from_another_thread() -> Result<(), Box<dyn Error>> {
    let axioms = ontology(80);
    let mut reasoner = Reasoner::with_config(
        ReasonerConfig::default()
            .with_workers(4)
            .with_interrupt_check_interval(Duration::from_millis(1)),
    );
    for axiom in &axioms {
        reasoner.add_axiom(axiom)?;
    }
    let interrupter = reasoner.interrupter();
    let interrupting = thread::spawn(move || {
        thread::sleep(Duration::from_millis(1));
        interrupter.interrupt();
    });
    // The saturation may be over before the interruption
    let mut status = reasoner.classify()?;
    interrupting.join().map_err(|_| "the interrupting thread panicked")?;
    while status == SaturationStatus::Interrupted {
        status = reasoner.classify()?;
    }
    assert_eq!(reasoner.check_fixpoint(), 0);
    assert_eq!(taxonomy(&reasoner, 80), taxonomy(&classify(&axioms, 1)?, 80));
    Ok(())
}
