use std::fmt;
use std::str::FromStr;

use crate::error::PropertyError;

/// Highest atomic number the vendor formats can reference (einsteinium).
pub const MAX_ATOMIC_NUMBER: u8 = 99;

const SYMBOLS: [&str; MAX_ATOMIC_NUMBER as usize] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es",
];

/// A chemical element, identified by atomic number.
///
/// Ordering follows atomic number, which is what every vendor slot array
/// uses on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Element(u8);

impl Element {
    /// Create an element from its atomic number (1..=99).
    pub fn from_atomic_number(z: u32) -> Option<Self> {
        if (1..=MAX_ATOMIC_NUMBER as u32).contains(&z) {
            Some(Element(z as u8))
        } else {
            None
        }
    }

    /// Look up an element by symbol, ignoring case ("fe", "FE", "Fe").
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let symbol = symbol.trim();
        SYMBOLS
            .iter()
            .position(|s| s.eq_ignore_ascii_case(symbol))
            .map(|i| Element(i as u8 + 1))
    }

    #[inline]
    pub const fn atomic_number(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn symbol(self) -> &'static str {
        SYMBOLS[self.0 as usize - 1]
    }

    /// Iterate all known elements in atomic-number order.
    pub fn all() -> impl Iterator<Item = Element> {
        (1..=MAX_ATOMIC_NUMBER).map(Element)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Element {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Element::from_symbol(s).ok_or_else(|| PropertyError::UnknownElement(s.to_string()))
    }
}
