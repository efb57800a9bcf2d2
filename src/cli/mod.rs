// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for the gg-store command line tool.
//!
//! Subcommands operate directly on the store directory; no server is needed.
//!
//! ## Usage
//!
//! ```bash
//! gg-store-cli list              # All committed artifacts
//! gg-store-cli get ner:latest    # Show one manifest
//! gg-store-cli verify ner        # Re-check the newest artifact's digest
//! gg-store-cli config show       # Effective configuration
//! ```

pub mod config_cmd;
pub mod models_cmd;

use crate::error::StoreError;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_NOT_FOUND: i32 = 4;

/// Map a store error to the process exit code.
pub fn exit_code_for(err: &StoreError) -> i32 {
    match err {
        StoreError::NotFound(_) => EXIT_NOT_FOUND,
        StoreError::InvalidTag { .. }
        | StoreError::InvalidRequirement { .. }
        | StoreError::InvalidSource { .. } => EXIT_USAGE,
        _ => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for(&StoreError::NotFound("ner".into())), EXIT_NOT_FOUND);
        assert_eq!(
            exit_code_for(&StoreError::InvalidTag { input: "A".into(), reason: "x".into() }),
            EXIT_USAGE
        );
        assert_eq!(exit_code_for(&StoreError::Conflict("ner:v1".into())), EXIT_FAILURE);
        assert_eq!(
            exit_code_for(&StoreError::InvalidSource { path: "/srv".into(), reason: "x".into() }),
            EXIT_USAGE
        );
    }
}
