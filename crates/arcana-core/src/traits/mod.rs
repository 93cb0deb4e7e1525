// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions implemented by Arcana backend crates.

pub mod provider;

pub use provider::Provider;
