// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Metrics facade calls for store operations.
//!
//! Recording is a no-op until the embedding application installs a
//! `metrics` recorder.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

pub const OPERATIONS_TOTAL: &str = "gg_store_operations_total";
pub const ERRORS_TOTAL: &str = "gg_store_errors_total";
pub const OPERATION_SECONDS: &str = "gg_store_operation_seconds";
pub const BYTES_WRITTEN_TOTAL: &str = "gg_store_bytes_written_total";

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(OPERATIONS_TOTAL, "Store operations by operation and status");
    describe_counter!(ERRORS_TOTAL, "Failed store operations by error kind");
    describe_histogram!(OPERATION_SECONDS, Unit::Seconds, "Store operation latency");
    describe_counter!(BYTES_WRITTEN_TOTAL, Unit::Bytes, "Artifact payload bytes committed");
}

pub fn record_operation_success(operation: &'static str, elapsed: Duration) {
    counter!(OPERATIONS_TOTAL, "operation" => operation, "status" => "ok").increment(1);
    histogram!(OPERATION_SECONDS, "operation" => operation).record(elapsed.as_secs_f64());
}

pub fn record_operation_failure(operation: &'static str, error_kind: &'static str, elapsed: Duration) {
    counter!(OPERATIONS_TOTAL, "operation" => operation, "status" => "error").increment(1);
    counter!(ERRORS_TOTAL, "operation" => operation, "error" => error_kind).increment(1);
    histogram!(OPERATION_SECONDS, "operation" => operation).record(elapsed.as_secs_f64());
}

pub fn record_bytes_written(bytes: u64) {
    counter!(BYTES_WRITTEN_TOTAL).increment(bytes);
}
