//! Engine configuration.
//!
//! No environment or file loading lives here — that wiring is out of scope
//! for this crate (see spec §1) — this is a plain value type, constructed by
//! whatever binary embeds the engine.

/// Configuration for a [`crate::service::VertexService`] instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AigConfig {
    /// Whether to build and anchor the encrypted integrity payload
    /// (component D step 2) on every new changeset. When `false`, only the
    /// signature is anchored.
    pub enable_integrity_check: bool,
    /// The vault key id segment of `"<nodeIdentity>/<vaultKeyId>"`.
    pub vault_key_id: String,
    /// The assertion method id segment of `"<nodeIdentity>#<assertionMethodId>"`.
    pub assertion_method_id: String,
}

impl Default for AigConfig {
    fn default() -> Self {
        Self {
            enable_integrity_check: true,
            vault_key_id: "auditable-item-graph".to_string(),
            assertion_method_id: "auditable-item-graph".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = AigConfig::default();
        assert!(cfg.enable_integrity_check);
        assert_eq!(cfg.vault_key_id, "auditable-item-graph");
        assert_eq!(cfg.assertion_method_id, "auditable-item-graph");
    }
}
