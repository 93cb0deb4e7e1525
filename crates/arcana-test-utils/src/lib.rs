// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared helpers for Arcana integration tests: a scriptable mock provider
//! and a scratch database factory.

pub mod db;
pub mod mock_provider;

pub use db::scratch_database;
pub use mock_provider::{MockOutcome, MockProvider};
