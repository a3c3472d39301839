//! Switch family information and constants

use super::profile::{RegisterProfile, Rtl838x, Rtl839x, Rtl930x, Rtl931x};

/// Switch SoC family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchFamily {
    /// RTL838x (Maple)
    Rtl838x,
    /// RTL839x (Cypress)
    Rtl839x,
    /// RTL930x (Longan)
    Rtl930x,
    /// RTL931x (Mango)
    Rtl931x,
}

impl SwitchFamily {
    pub const fn id(self) -> u16 {
        match self {
            Self::Rtl838x => 0x8380,
            Self::Rtl839x => 0x8390,
            Self::Rtl930x => 0x9300,
            Self::Rtl931x => 0x9310,
        }
    }
}

/// Switch family information
#[derive(Clone, Copy)]
pub struct SwitchFamilyInfo {
    pub family_id: u16,
    pub name: &'static str,
    pub family: SwitchFamily,
    pub profile: &'static dyn RegisterProfile,
}

/// Supported switch families
pub static SWITCH_FAMILIES: &[SwitchFamilyInfo] = &[
    SwitchFamilyInfo {
        family_id: 0x8380,
        name: "RTL838x",
        family: SwitchFamily::Rtl838x,
        profile: &Rtl838x,
    },
    SwitchFamilyInfo {
        family_id: 0x8390,
        name: "RTL839x",
        family: SwitchFamily::Rtl839x,
        profile: &Rtl839x,
    },
    SwitchFamilyInfo {
        family_id: 0x9300,
        name: "RTL930x",
        family: SwitchFamily::Rtl930x,
        profile: &Rtl930x,
    },
    SwitchFamilyInfo {
        family_id: 0x9310,
        name: "RTL931x",
        family: SwitchFamily::Rtl931x,
        profile: &Rtl931x,
    },
];

/// Find family info by family id
#[inline]
pub fn find_family(family_id: u16) -> Option<&'static SwitchFamilyInfo> {
    SWITCH_FAMILIES.iter().find(|info| info.family_id == family_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_family() {
        let info = find_family(0x9310).unwrap();
        assert_eq!(info.family, SwitchFamily::Rtl931x);
        assert_eq!(info.profile.cpu_port(), 56);
        assert!(find_family(0x8125).is_none());
    }

    #[test]
    fn test_table_consistent() {
        for info in SWITCH_FAMILIES {
            assert_eq!(info.family.id(), info.family_id, "{}", info.name);
            assert_eq!(info.profile.family(), info.family, "{}", info.name);
        }
    }

    #[test]
    fn test_cpu_ports() {
        let ports: alloc::vec::Vec<u32> = SWITCH_FAMILIES
            .iter()
            .map(|info| info.profile.cpu_port())
            .collect();
        assert_eq!(ports, [28, 52, 28, 56]);
    }
}
