use std::collections::BTreeMap;
use std::fmt;

use crate::error::PropertyError;

use super::element::Element;

/// Whether fractions are by mass or by number of atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FractionKind {
    #[default]
    Mass,
    Atomic,
}

/// Element → fraction mapping, e.g. the certified composition of a standard.
///
/// Fractions are finite and non-negative. They are not required to sum to
/// one; analytical totals of 0.98 or 1.02 are normal for measured materials.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Composition {
    kind: FractionKind,
    fractions: BTreeMap<Element, f64>,
}

impl Composition {
    pub fn new(kind: FractionKind) -> Self {
        Self {
            kind,
            fractions: BTreeMap::new(),
        }
    }

    /// Build a mass-fraction composition from `(element, fraction)` pairs.
    pub fn from_mass_fractions(
        pairs: impl IntoIterator<Item = (Element, f64)>,
    ) -> Result<Self, PropertyError> {
        let mut comp = Composition::new(FractionKind::Mass);
        for (el, f) in pairs {
            comp.insert(el, f)?;
        }
        Ok(comp)
    }

    #[inline]
    pub fn kind(&self) -> FractionKind {
        self.kind
    }

    /// Set the fraction for an element, replacing any previous value.
    pub fn insert(&mut self, element: Element, fraction: f64) -> Result<(), PropertyError> {
        if !fraction.is_finite() || fraction < 0.0 {
            return Err(PropertyError::InvalidFraction {
                element: element.symbol(),
                fraction,
            });
        }
        self.fractions.insert(element, fraction);
        Ok(())
    }

    pub fn fraction(&self, element: Element) -> Option<f64> {
        self.fractions.get(&element).copied()
    }

    pub fn elements(&self) -> impl Iterator<Item = Element> + '_ {
        self.fractions.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Element, f64)> + '_ {
        self.fractions.iter().map(|(e, f)| (*e, *f))
    }

    pub fn len(&self) -> usize {
        self.fractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.fractions.values().sum()
    }

    /// Copy scaled so the fractions sum to one. An all-zero composition is
    /// returned unchanged.
    pub fn normalized(&self) -> Composition {
        let total = self.sum();
        if total <= 0.0 {
            return self.clone();
        }
        Composition {
            kind: self.kind,
            fractions: self
                .fractions
                .iter()
                .map(|(e, f)| (*e, f / total))
                .collect(),
        }
    }
}

impl fmt::Display for Composition {
    /// `(Fe:0.7000,Ni:0.3000)`, the form used in text headers.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, (el, frac)) in self.fractions.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{}", el, frac)?;
        }
        f.write_str(")")
    }
}
