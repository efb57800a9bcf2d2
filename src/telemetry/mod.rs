// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Telemetry module for GG-STORE.
//!
//! Provides structured logging, operation spans, and metrics for store calls.
//! All output is local (stderr or file); there are no network exporters.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{
    describe_metrics, record_bytes_written, record_operation_failure, record_operation_success,
};
pub use spans::{SpanExt, StoreSpan};
