// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Span utilities and extension traits for GG-STORE tracing.
//!
//! Provides standardized span creation and result recording.

use tracing::{info_span, Span};

/// Extension trait for adding context to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for creating standardized store operation spans.
pub struct StoreSpan;

impl StoreSpan {
    /// Create a new operation span with standard fields.
    ///
    /// Fields included:
    /// - `operation`: Store operation (`save`, `load`, ...)
    /// - `tag`: Tag or name the caller passed
    /// - `status`: To be filled in by `SpanExt::record_result`
    /// - `error.message`: To be filled in on error
    /// - `latency_ms`: To be filled in after completion
    pub fn new(operation: &'static str, tag: &str) -> Span {
        info_span!(
            "store_operation",
            operation = operation,
            tag = %tag,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    }
}
