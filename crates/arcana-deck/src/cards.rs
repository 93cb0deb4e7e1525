// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The 78-card tarot catalogue.
//!
//! Major arcana carry individual keyword sets; the 56 minor arcana are
//! composed from a suit theme crossed with a rank theme so the catalogue
//! stays reviewable. The full deck is built once and shared.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// One of the four minor-arcana suits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Wands,
    Cups,
    Swords,
    Pentacles,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Wands, Suit::Cups, Suit::Swords, Suit::Pentacles];

    pub fn label(self) -> &'static str {
        match self {
            Suit::Wands => "Wands",
            Suit::Cups => "Cups",
            Suit::Swords => "Swords",
            Suit::Pentacles => "Pentacles",
        }
    }

    /// Themes the suit contributes to an upright card.
    fn domain(self) -> [&'static str; 2] {
        match self {
            Suit::Wands => ["passion", "drive"],
            Suit::Cups => ["emotion", "connection"],
            Suit::Swords => ["intellect", "truth"],
            Suit::Pentacles => ["resources", "craft"],
        }
    }

    /// Themes the suit contributes to a reversed card.
    fn shadow(self) -> [&'static str; 2] {
        match self {
            Suit::Wands => ["burnout", "impulsiveness"],
            Suit::Cups => ["moodiness", "emotional distance"],
            Suit::Swords => ["conflict", "harsh words"],
            Suit::Pentacles => ["insecurity", "materialism"],
        }
    }
}

/// Rank within a suit, ace through king.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Ace,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Page,
    Knight,
    Queen,
    King,
}

impl Rank {
    pub const ALL: [Rank; 14] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Page,
        Rank::Knight,
        Rank::Queen,
        Rank::King,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Rank::Ace => "Ace",
            Rank::Two => "Two",
            Rank::Three => "Three",
            Rank::Four => "Four",
            Rank::Five => "Five",
            Rank::Six => "Six",
            Rank::Seven => "Seven",
            Rank::Eight => "Eight",
            Rank::Nine => "Nine",
            Rank::Ten => "Ten",
            Rank::Page => "Page",
            Rank::Knight => "Knight",
            Rank::Queen => "Queen",
            Rank::King => "King",
        }
    }

    fn upright(self) -> [&'static str; 2] {
        match self {
            Rank::Ace => ["a new spark", "raw potential"],
            Rank::Two => ["a choice", "balance sought"],
            Rank::Three => ["early growth", "collaboration"],
            Rank::Four => ["stability", "consolidation"],
            Rank::Five => ["friction", "loss"],
            Rank::Six => ["harmony", "progress"],
            Rank::Seven => ["assessment", "perseverance"],
            Rank::Eight => ["movement", "growing mastery"],
            Rank::Nine => ["fruition", "resilience"],
            Rank::Ten => ["culmination", "legacy"],
            Rank::Page => ["curiosity", "a message"],
            Rank::Knight => ["pursuit", "momentum"],
            Rank::Queen => ["maturity", "quiet command"],
            Rank::King => ["mastery", "leadership"],
        }
    }

    fn reversed(self) -> [&'static str; 2] {
        match self {
            Rank::Ace => ["a missed opening", "a false start"],
            Rank::Two => ["indecision", "disconnection"],
            Rank::Three => ["a setback", "scattered effort"],
            Rank::Four => ["stagnation", "holding on too tightly"],
            Rank::Five => ["recovery", "reconciliation"],
            Rank::Six => ["nostalgia", "an uneven exchange"],
            Rank::Seven => ["doubt", "shortcuts"],
            Rank::Eight => ["restlessness", "feeling trapped"],
            Rank::Nine => ["strain", "guardedness"],
            Rank::Ten => ["a burden", "an ending resisted"],
            Rank::Page => ["inexperience", "delayed news"],
            Rank::Knight => ["haste", "a stalled quest"],
            Rank::Queen => ["insecurity", "smothering care"],
            Rank::King => ["rigidity", "misused authority"],
        }
    }
}

/// Where a card sits in the deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Arcana {
    /// Major arcana, numbered 0 (The Fool) through 21 (The World).
    Major { number: u8 },
    Minor { suit: Suit, rank: Rank },
}

/// A single catalogue entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub name: String,
    pub arcana: Arcana,
    pub upright: Vec<&'static str>,
    pub reversed: Vec<&'static str>,
}

impl Card {
    /// Keywords for the drawn orientation.
    pub fn keywords(&self, reversed: bool) -> &[&'static str] {
        if reversed { &self.reversed } else { &self.upright }
    }
}

/// Name plus upright and reversed keywords for each major arcanum, in trump
/// order.
const MAJORS: [(&str, [&str; 3], [&str; 3]); 22] = [
    (
        "The Fool",
        ["beginnings", "spontaneity", "a leap of faith"],
        ["recklessness", "hesitation", "naivety"],
    ),
    (
        "The Magician",
        ["willpower", "resourcefulness", "manifestation"],
        ["manipulation", "untapped talent", "illusion"],
    ),
    (
        "The High Priestess",
        ["intuition", "mystery", "inner knowledge"],
        ["secrets", "disconnection", "ignored instinct"],
    ),
    (
        "The Empress",
        ["abundance", "nurturing", "creativity"],
        ["dependence", "smothering", "a creative block"],
    ),
    (
        "The Emperor",
        ["authority", "structure", "stability"],
        ["rigidity", "domination", "loss of control"],
    ),
    (
        "The Hierophant",
        ["tradition", "guidance", "shared belief"],
        ["rebellion", "dogma", "breaking convention"],
    ),
    (
        "The Lovers",
        ["union", "choice", "alignment"],
        ["disharmony", "imbalance", "misalignment"],
    ),
    (
        "The Chariot",
        ["determination", "victory", "momentum"],
        ["scattered force", "opposition", "stalling"],
    ),
    (
        "Strength",
        ["courage", "patience", "inner strength"],
        ["self-doubt", "raw emotion", "depleted will"],
    ),
    (
        "The Hermit",
        ["introspection", "solitude", "searching"],
        ["isolation", "withdrawal", "lost direction"],
    ),
    (
        "Wheel of Fortune",
        ["cycles", "destiny", "a turning point"],
        ["resistance to change", "bad luck", "interruption"],
    ),
    (
        "Justice",
        ["fairness", "truth", "accountability"],
        ["bias", "dishonesty", "avoided consequences"],
    ),
    (
        "The Hanged Man",
        ["surrender", "a new perspective", "pause"],
        ["stagnation", "martyrdom", "indecision"],
    ),
    (
        "Death",
        ["endings", "transformation", "release"],
        ["clinging", "fear of change", "slow decay"],
    ),
    (
        "Temperance",
        ["balance", "moderation", "patience"],
        ["excess", "imbalance", "impatience"],
    ),
    (
        "The Devil",
        ["attachment", "temptation", "bondage"],
        ["release", "reclaimed power", "detachment"],
    ),
    (
        "The Tower",
        ["upheaval", "revelation", "sudden change"],
        ["averted disaster", "lingering fear", "delayed collapse"],
    ),
    (
        "The Star",
        ["hope", "renewal", "inspiration"],
        ["discouragement", "faithlessness", "disconnection"],
    ),
    (
        "The Moon",
        ["illusion", "intuition", "uncertainty"],
        ["clarity", "released fear", "lifting confusion"],
    ),
    (
        "The Sun",
        ["joy", "vitality", "success"],
        ["clouded optimism", "delay", "burnout"],
    ),
    (
        "Judgement",
        ["reckoning", "awakening", "absolution"],
        ["self-doubt", "harsh judgement", "stagnation"],
    ),
    (
        "The World",
        ["completion", "integration", "fulfilment"],
        ["incompletion", "loose ends", "a shortcut taken"],
    ),
];

static DECK: LazyLock<Vec<Card>> = LazyLock::new(|| {
    let mut cards = Vec::with_capacity(78);
    for (number, (name, upright, reversed)) in MAJORS.iter().enumerate() {
        cards.push(Card {
            name: (*name).to_string(),
            arcana: Arcana::Major {
                number: number as u8,
            },
            upright: upright.to_vec(),
            reversed: reversed.to_vec(),
        });
    }
    for suit in Suit::ALL {
        for rank in Rank::ALL {
            let mut upright = rank.upright().to_vec();
            upright.extend(suit.domain());
            let mut reversed = rank.reversed().to_vec();
            reversed.extend(suit.shadow());
            cards.push(Card {
                name: format!("{} of {}", rank.label(), suit.label()),
                arcana: Arcana::Minor { suit, rank },
                upright,
                reversed,
            });
        }
    }
    cards
});

/// The full deck in catalogue order: 22 majors, then each suit ace to king.
pub fn deck() -> &'static [Card] {
    &DECK
}
