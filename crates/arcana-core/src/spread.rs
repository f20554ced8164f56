//! Spread layouts and their position names.

use serde::{Deserialize, Serialize};

use crate::models::Language;

/// A card layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadType {
    Single,
    ThreeCard,
    CelticCross,
}

const SINGLE: &[(&str, &str)] = &[("The Card", "La Carta")];

const THREE_CARD: &[(&str, &str)] = &[
    ("Past", "Passato"),
    ("Present", "Presente"),
    ("Future", "Futuro"),
];

const CELTIC_CROSS: &[(&str, &str)] = &[
    ("Present", "Presente"),
    ("Challenge", "Sfida"),
    ("Foundation", "Fondamento"),
    ("Recent Past", "Passato Recente"),
    ("Crown", "Corona"),
    ("Near Future", "Futuro Prossimo"),
    ("Self", "Te Stesso"),
    ("Environment", "Ambiente"),
    ("Hopes & Fears", "Speranze e Paure"),
    ("Outcome", "Risultato"),
];

impl SpreadType {
    /// Parse the wire name (`single`, `three_card`, `celtic_cross`).
    pub fn parse(s: &str) -> Option<SpreadType> {
        match s.trim() {
            "single" => Some(SpreadType::Single),
            "three_card" => Some(SpreadType::ThreeCard),
            "celtic_cross" => Some(SpreadType::CelticCross),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpreadType::Single => "single",
            SpreadType::ThreeCard => "three_card",
            SpreadType::CelticCross => "celtic_cross",
        }
    }

    /// Human-readable spread name.
    pub fn label(&self, language: Language) -> &'static str {
        match (self, language) {
            (SpreadType::Single, Language::English) => "Single Card",
            (SpreadType::Single, Language::Italian) => "Carta Singola",
            (SpreadType::ThreeCard, Language::English) => "Three Card Spread",
            (SpreadType::ThreeCard, Language::Italian) => "Tre Carte",
            (SpreadType::CelticCross, Language::English) => "Celtic Cross",
            (SpreadType::CelticCross, Language::Italian) => "Croce Celtica",
        }
    }

    /// Position names in draw order.
    pub fn positions(&self, language: Language) -> Vec<&'static str> {
        let table = match self {
            SpreadType::Single => SINGLE,
            SpreadType::ThreeCard => THREE_CARD,
            SpreadType::CelticCross => CELTIC_CROSS,
        };
        table
            .iter()
            .map(|(en, it)| match language {
                Language::English => *en,
                Language::Italian => *it,
            })
            .collect()
    }

    pub fn card_count(&self) -> usize {
        self.positions(Language::English).len()
    }
}
