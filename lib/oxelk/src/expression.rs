//! Class expressions and axioms of the supported EL fragment.
//!
//! These types are the input of the [`Reasoner`](crate::Reasoner). They are plain values:
//! canonicalization happens when they are indexed.

use oxrdf::{NamedNode, NamedNodeRef};
use std::fmt;

/// `owl:Thing`
pub const OWL_THING: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#Thing");
/// `owl:Nothing`
pub const OWL_NOTHING: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#Nothing");

/// A class expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClassExpression {
    /// A named class.
    Class(NamedNode),
    /// `ObjectIntersectionOf(C1 ... Cn)`
    ObjectIntersectionOf(Vec<ClassExpression>),
    /// `ObjectSomeValuesFrom(P C)`
    ObjectSomeValuesFrom {
        property: NamedNode,
        filler: Box<ClassExpression>,
    },
}

impl ClassExpression {
    /// Builds a named class expression.
    #[inline]
    pub fn class(iri: impl Into<NamedNode>) -> Self {
        Self::Class(iri.into())
    }

    /// `owl:Thing`
    #[inline]
    pub fn thing() -> Self {
        Self::Class(OWL_THING.into_owned())
    }

    /// `owl:Nothing`
    #[inline]
    pub fn nothing() -> Self {
        Self::Class(OWL_NOTHING.into_owned())
    }

    /// Builds an `ObjectIntersectionOf` expression.
    #[inline]
    pub fn intersection(operands: impl IntoIterator<Item = Self>) -> Self {
        Self::ObjectIntersectionOf(operands.into_iter().collect())
    }

    /// Builds an `ObjectSomeValuesFrom` expression.
    #[inline]
    pub fn some_values_from(property: impl Into<NamedNode>, filler: Self) -> Self {
        Self::ObjectSomeValuesFrom {
            property: property.into(),
            filler: Box::new(filler),
        }
    }

    /// Returns the class IRI if this expression is a named class.
    #[inline]
    pub fn as_class(&self) -> Option<NamedNodeRef<'_>> {
        match self {
            Self::Class(iri) => Some(iri.as_ref()),
            _ => None,
        }
    }
}

impl From<NamedNode> for ClassExpression {
    #[inline]
    fn from(iri: NamedNode) -> Self {
        Self::Class(iri)
    }
}

impl From<NamedNodeRef<'_>> for ClassExpression {
    #[inline]
    fn from(iri: NamedNodeRef<'_>) -> Self {
        Self::Class(iri.into_owned())
    }
}

impl fmt::Display for ClassExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(iri) => write!(f, "{iri}"),
            Self::ObjectIntersectionOf(operands) => {
                f.write_str("ObjectIntersectionOf(")?;
                write_list(f, operands, " ")?;
                f.write_str(")")
            }
            Self::ObjectSomeValuesFrom { property, filler } => {
                write!(f, "ObjectSomeValuesFrom({property} {filler})")
            }
        }
    }
}

/// An axiom of the supported fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Axiom {
    /// `SubClassOf(sub super)`
    SubClassOf {
        sub_class: ClassExpression,
        super_class: ClassExpression,
    },
    /// `EquivalentClasses(C1 ... Cn)`
    EquivalentClasses(Vec<ClassExpression>),
    /// `DisjointClasses(C1 ... Cn)`
    ///
    /// Members are kept as given: a member listed twice makes it unsatisfiable.
    DisjointClasses(Vec<ClassExpression>),
}

impl Axiom {
    /// Creates a `SubClassOf` axiom.
    pub fn subclass_of(sub: impl Into<ClassExpression>, sup: impl Into<ClassExpression>) -> Self {
        Self::SubClassOf {
            sub_class: sub.into(),
            super_class: sup.into(),
        }
    }

    /// Creates an `EquivalentClasses` axiom.
    pub fn equivalent_classes(classes: impl IntoIterator<Item = ClassExpression>) -> Self {
        Self::EquivalentClasses(classes.into_iter().collect())
    }

    /// Creates a `DisjointClasses` axiom.
    pub fn disjoint_classes(classes: impl IntoIterator<Item = ClassExpression>) -> Self {
        Self::DisjointClasses(classes.into_iter().collect())
    }
}

impl fmt::Display for Axiom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubClassOf {
                sub_class,
                super_class,
            } => write!(f, "SubClassOf({sub_class} {super_class})"),
            Self::EquivalentClasses(classes) => {
                f.write_str("EquivalentClasses(")?;
                write_list(f, classes, " ")?;
                f.write_str(")")
            }
            Self::DisjointClasses(classes) => {
                f.write_str("DisjointClasses(")?;
                write_list(f, classes, " ")?;
                f.write_str(")")
            }
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
