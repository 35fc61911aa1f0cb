//! What a conclusion inserted in a context entails.

use crate::indexing::{EntityRegistry, IndexedClassExpression};
use crate::rules::{ChainableRule, RuleKind};
use crate::saturation::conclusion::{Conclusion, SaturationWriter};
use crate::saturation::context::Context;
use crate::saturation::state::Generations;

/// Applies every rule triggered by `conclusion`, which has just been inserted into `context`.
pub(crate) fn propagate(
    conclusion: &Conclusion,
    context: &Context,
    entities: &EntityRegistry,
    generations: &Generations,
    writer: &mut impl SaturationWriter,
) {
    let root = context.root();
    match *conclusion {
        Conclusion::Subsumer(subsumer) => {
            if subsumer == entities.nothing() {
                writer.produce(root, Conclusion::Contradiction);
            }
            // The entity may have been removed while the conclusion was pending
            let Some(entity) = entities.get(subsumer) else {
                return;
            };
            match *entity.expression() {
                IndexedClassExpression::Class(_) => (),
                IndexedClassExpression::Intersection(first, second) => {
                    writer.produce(root, Conclusion::Subsumer(first));
                    writer.produce(root, Conclusion::Subsumer(second));
                }
                IndexedClassExpression::Existential { property, filler } => writer.produce(
                    filler,
                    Conclusion::BackwardLink {
                        source: root,
                        property,
                    },
                ),
            }
            for rule in entity.chain().iter() {
                rule.apply(subsumer, context, generations, writer);
            }
        }
        Conclusion::Contradiction => {
            for (_, source) in context.all_live_backward_links(generations) {
                writer.produce(source, Conclusion::Contradiction);
            }
        }
        Conclusion::DisjointSubsumer { axiom, .. } => {
            if context.disjoint_members(axiom).nth(1).is_some() {
                writer.produce(root, Conclusion::Contradiction);
            }
        }
        Conclusion::BackwardLink { source, property } => {
            if context.is_inconsistent() {
                writer.produce(source, Conclusion::Contradiction);
            }
            for subsumer in context.subsumers() {
                let Some(ChainableRule::ExistentialPropagation { existentials }) = entities
                    .get(subsumer)
                    .and_then(|entity| entity.chain().find(RuleKind::ExistentialPropagation))
                else {
                    continue;
                };
                for &(existential_property, existential) in existentials.keys() {
                    if existential_property == property {
                        writer.produce(source, Conclusion::Subsumer(existential));
                    }
                }
            }
        }
    }
}
