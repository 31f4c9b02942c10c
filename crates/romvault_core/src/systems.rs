use crate::error::AssetError;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Systems the emulator front-end can boot.
pub const DEFAULT_SYSTEMS: &[&str] = &[
    "nes",
    "snes",
    "n64",
    "gb",
    "gbc",
    "gba",
    "nds",
    "vb",
    "genesis",
    "segacd",
    "sega32x",
    "sms",
    "gamegear",
    "saturn",
    "psx",
    "psp",
    "atari2600",
    "atari5200",
    "atari7800",
    "lynx",
    "jaguar",
    "pce",
    "pcfx",
    "ngp",
    "ws",
    "coleco",
    "3do",
    "arcade",
];

/// Case-insensitive lookup of supported system ids.
#[derive(Debug, Clone)]
pub struct SystemRegistry {
    systems: Arc<BTreeSet<String>>,
}

impl Default for SystemRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEMS.iter().copied())
    }
}

impl SystemRegistry {
    pub fn new<I, S>(systems: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let systems = systems
            .into_iter()
            .map(|s| s.as_ref().trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            systems: Arc::new(systems),
        }
    }

    /// Returns the canonical id used in object keys.
    pub fn resolve(&self, system: &str) -> Result<String, AssetError> {
        let id = system.trim().to_ascii_lowercase();
        if self.systems.contains(&id) {
            Ok(id)
        } else {
            Err(AssetError::UnsupportedSystem(system.to_string()))
        }
    }

    pub fn contains(&self, system: &str) -> bool {
        self.resolve(system).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.systems.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_case_insensitively_to_canonical_id() {
        let registry = SystemRegistry::default();
        assert_eq!(registry.resolve("NES").unwrap(), "nes");
        assert_eq!(registry.resolve(" psx ").unwrap(), "psx");
    }

    #[test]
    fn rejects_unknown_systems() {
        let registry = SystemRegistry::new(["nes"]);
        let err = registry.resolve("dreamcast").unwrap_err();
        assert_eq!(err.kind(), "unsupported_system");
        assert!(!registry.contains("snes"));
    }
}
