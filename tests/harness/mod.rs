// SPDX-FileCopyrightText: 2026 Charter Marketplace Contributors
// SPDX-License-Identifier: Apache-2.0

//! Test harness for trust-filter abuse simulation.
//!
//! Provides scripted abuse patterns (floods, scrapes, contact smuggling)
//! and outcome metrics used to validate that the enforcement layer
//! mitigates them.

pub mod abuse;
pub mod generators;
pub mod metrics;
