// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tarot deck catalogue and spread drawing.
//!
//! [`deck`] exposes the static 78-card catalogue; [`draw`] samples a spread
//! from it. Drawing takes the RNG as an argument so the engine stays
//! deterministic under test.

pub mod cards;
pub mod spread;

pub use cards::{deck, Arcana, Card, Rank, Suit};
pub use spread::{draw, DrawnCard};
