//! Source-level modifiers

use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Source-level modifier set of a class, field, method or constructor.
///
/// These are the language's modifiers, not class-file access flags; lowering
/// maps them onto access bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Modifiers(u32);

impl Modifiers {
    /// No modifiers (internal visibility)
    pub const NONE: Modifiers = Modifiers(0);
    /// `public`
    pub const PUBLIC: Modifiers = Modifiers(1 << 0);
    /// `private`
    pub const PRIVATE: Modifiers = Modifiers(1 << 1);
    /// `protected`
    pub const PROTECTED: Modifiers = Modifiers(1 << 2);
    /// `internal` (package visibility)
    pub const INTERNAL: Modifiers = Modifiers(1 << 3);
    /// `static`
    pub const STATIC: Modifiers = Modifiers(1 << 4);
    /// `final`
    pub const FINAL: Modifiers = Modifiers(1 << 5);
    /// `abstract`
    pub const ABSTRACT: Modifiers = Modifiers(1 << 6);
    /// `override`
    pub const OVERRIDE: Modifiers = Modifiers(1 << 7);

    /// Raw bits
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Whether every modifier in `other` is present
    pub fn contains(&self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    /// `public`
    pub fn is_public(&self) -> bool {
        self.contains(Self::PUBLIC)
    }

    /// `private`
    pub fn is_private(&self) -> bool {
        self.contains(Self::PRIVATE)
    }

    /// `protected`
    pub fn is_protected(&self) -> bool {
        self.contains(Self::PROTECTED)
    }

    /// `internal`
    pub fn is_internal(&self) -> bool {
        self.contains(Self::INTERNAL)
    }

    /// `static`
    pub fn is_static(&self) -> bool {
        self.contains(Self::STATIC)
    }

    /// `final`
    pub fn is_final(&self) -> bool {
        self.contains(Self::FINAL)
    }

    /// `abstract`
    pub fn is_abstract(&self) -> bool {
        self.contains(Self::ABSTRACT)
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_and_query() {
        let mods = Modifiers::PUBLIC | Modifiers::STATIC;
        assert!(mods.is_public());
        assert!(mods.is_static());
        assert!(!mods.is_final());
        assert!(mods.contains(Modifiers::PUBLIC | Modifiers::STATIC));
        assert!(!mods.contains(Modifiers::PUBLIC | Modifiers::FINAL));
    }

    #[test]
    fn test_default_is_empty() {
        assert_eq!(Modifiers::default(), Modifiers::NONE);
        assert_eq!(Modifiers::default().bits(), 0);
    }
}
