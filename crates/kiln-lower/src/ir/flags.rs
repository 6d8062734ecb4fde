//! Class-file access and property flags

pub const ACC_PUBLIC: u32 = 0x0001;
pub const ACC_PRIVATE: u32 = 0x0002;
pub const ACC_PROTECTED: u32 = 0x0004;
pub const ACC_STATIC: u32 = 0x0008;
pub const ACC_FINAL: u32 = 0x0010;
/// Shares its bit with `ACC_SYNCHRONIZED`; only meaningful on class headers
pub const ACC_SUPER: u32 = 0x0020;
pub const ACC_BRIDGE: u32 = 0x0040;
pub const ACC_INTERFACE: u32 = 0x0200;
pub const ACC_ABSTRACT: u32 = 0x0400;
pub const ACC_SYNTHETIC: u32 = 0x1000;
pub const ACC_ANNOTATION: u32 = 0x2000;
pub const ACC_ENUM: u32 = 0x4000;

const NAMES: &[(u32, &str)] = &[
    (ACC_PUBLIC, "public"),
    (ACC_PRIVATE, "private"),
    (ACC_PROTECTED, "protected"),
    (ACC_STATIC, "static"),
    (ACC_FINAL, "final"),
    (ACC_BRIDGE, "bridge"),
    (ACC_INTERFACE, "interface"),
    (ACC_ABSTRACT, "abstract"),
    (ACC_SYNTHETIC, "synthetic"),
    (ACC_ANNOTATION, "annotation"),
    (ACC_ENUM, "enum"),
];

/// Modifiers of a bridge: the bridged method's, plus bridge and synthetic, never abstract
pub fn bridge_modifiers(modifiers: u32) -> u32 {
    (modifiers | ACC_BRIDGE | ACC_SYNTHETIC) & !ACC_ABSTRACT
}

/// Space-separated flag names for member flags (`ACC_SUPER` is not rendered)
pub fn describe(modifiers: u32) -> String {
    NAMES
        .iter()
        .filter(|(bit, _)| modifiers & bit != 0)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_modifiers_clear_abstract() {
        let mods = bridge_modifiers(ACC_PUBLIC | ACC_ABSTRACT);
        assert_eq!(mods, ACC_PUBLIC | ACC_BRIDGE | ACC_SYNTHETIC);
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(ACC_PUBLIC | ACC_STATIC | ACC_SYNTHETIC), "public static synthetic");
        assert_eq!(describe(0), "");
    }
}
