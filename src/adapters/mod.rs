// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Built-in framework adapters.

pub mod entity_ruler;

pub use entity_ruler::{
    Doc, Entity, EntityPattern, EntityRuler, EntityRulerAdapter, ENTITY_RULER_ID,
    ENTITY_RULER_PACKAGE, ENTITY_RULER_VERSION,
};

use crate::error::StoreError;
use crate::models::AdapterRegistry;

/// Registry with every built-in adapter plus the given extra packages.
pub fn builtin_registry<I, N, V>(packages: I) -> Result<AdapterRegistry, StoreError>
where
    I: IntoIterator<Item = (N, V)>,
    N: AsRef<str>,
    V: AsRef<str>,
{
    Ok(AdapterRegistry::builder()
        .register(EntityRulerAdapter)?
        .packages(packages)?
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_contains_entity_ruler() {
        let registry = builtin_registry([("numpy", "1.26.0")]).unwrap();
        assert!(registry.contains(ENTITY_RULER_ID));
        assert!(registry.environment().version_of(ENTITY_RULER_PACKAGE).is_some());
        assert!(registry.environment().version_of("numpy").is_some());
    }
}
