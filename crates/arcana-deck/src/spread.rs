// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drawing a spread: sample cards without replacement, assign positions
//! and orientation.

use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cards::deck;

/// One card as it landed in a spread. This is the shape embedded in the
/// persisted result payload, so the serialized field names are part of the
/// API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawnCard {
    pub name: String,
    pub position: String,
    pub is_reversed: bool,
    pub keywords: Vec<String>,
}

impl DrawnCard {
    /// One-line rendering used when the spread is written into a prompt.
    pub fn describe(&self) -> String {
        let orientation = if self.is_reversed { "reversed" } else { "upright" };
        format!(
            "{} ({}), {}: {}",
            self.name,
            orientation,
            self.position,
            self.keywords.join(", ")
        )
    }
}

/// Label for the card at `slot` in a spread of `total` cards.
///
/// A single card answers as "insight"; the classic three-card spread maps to
/// past/present/future; anything larger falls back to numbered positions.
fn position_label(slot: usize, total: usize) -> String {
    match total {
        1 => "insight".to_string(),
        3 => ["past", "present", "future"][slot].to_string(),
        _ => format!("position {}", slot + 1),
    }
}

/// Draw `card_count` distinct cards with a 50/50 reversed orientation each.
pub fn draw<R: Rng + ?Sized>(card_count: u32, rng: &mut R) -> Vec<DrawnCard> {
    let catalogue = deck();
    // index::sample panics when asked for more than the population.
    let count = (card_count as usize).min(catalogue.len());
    index::sample(rng, catalogue.len(), count)
        .iter()
        .enumerate()
        .map(|(slot, idx)| {
            let card = &catalogue[idx];
            let is_reversed = rng.gen_bool(0.5);
            DrawnCard {
                name: card.name.clone(),
                position: position_label(slot, count),
                is_reversed,
                keywords: card
                    .keywords(is_reversed)
                    .iter()
                    .map(|k| (*k).to_string())
                    .collect(),
            }
        })
        .collect()
}
