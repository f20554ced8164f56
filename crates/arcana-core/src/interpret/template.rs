//! Deterministic template interpretation used when no model reply is usable.
//!
//! The output depends only on the request: tone, language, question, and
//! each card's name, position, orientation, keywords, and meaning.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::models::{DrawnCard, Interpretation, Language, Tone};

use super::InterpretationRequest;

/// Keywords quoted per card.
const CARD_KEYWORDS: usize = 3;
/// Keywords each card contributes to the synthesis themes.
const THEME_KEYWORDS_PER_CARD: usize = 2;
/// Maximum number of distinct synthesis themes.
const MAX_THEMES: usize = 4;

fn tone_intro(tone: Tone, language: Language) -> &'static str {
    match (tone, language) {
        (Tone::Soft, Language::English) => "This reading gently invites you to explore",
        (Tone::Soft, Language::Italian) => "Questa lettura ti invita dolcemente a esplorare",
        (Tone::Pragmatic, Language::English) => "Looking at this practically, the cards suggest",
        (Tone::Pragmatic, Language::Italian) => "Guardando praticamente, le carte suggeriscono",
        (Tone::Spiritual, Language::English) => {
            "On a deeper spiritual level, this reading reveals"
        }
        (Tone::Spiritual, Language::Italian) => {
            "A un livello spirituale piu profondo, questa lettura rivela"
        }
        (Tone::Direct, Language::English) => "The cards clearly point to",
        (Tone::Direct, Language::Italian) => "Le carte indicano chiaramente",
    }
}

fn overall(req: &InterpretationRequest) -> String {
    let intro = tone_intro(req.tone, req.language);
    match req.language {
        Language::English => format!(
            "{} themes related to your question: \"{}\". The cards you've drawn offer powerful symbols for personal reflection.",
            intro, req.question
        ),
        Language::Italian => format!(
            "{} i temi legati alla tua domanda: \"{}\". Le carte che hai estratto offrono simboli potenti per la riflessione personale.",
            intro, req.question
        ),
    }
}

fn card_text(card: &DrawnCard, language: Language) -> String {
    let keywords = card
        .keywords
        .iter()
        .take(CARD_KEYWORDS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let reversed = match (card.is_reversed, language) {
        (false, _) => "",
        (true, Language::English) => {
            " In the reversed position, this may indicate blocks or challenges in this area."
        }
        (true, Language::Italian) => {
            " In posizione rovesciata, questo potrebbe indicare blocchi o sfide in quest'area."
        }
    };
    match language {
        Language::English => format!(
            "{} in the \"{}\" position brings energies of {}. {}{} Reflect on how these themes manifest in your life.",
            card.card_name, card.position_name, keywords, card.meaning, reversed
        ),
        Language::Italian => format!(
            "{} nella posizione \"{}\" porta energie legate a: {}. {}{} Rifletti su come questi temi si manifestano nella tua vita.",
            card.card_name, card.position_name, keywords, card.meaning, reversed
        ),
    }
}

/// Distinct leading keywords across the spread, in draw order.
pub fn themes(cards: &[DrawnCard]) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for keyword in cards
        .iter()
        .flat_map(|c| c.keywords.iter().take(THEME_KEYWORDS_PER_CARD))
    {
        if !out.contains(&keyword.as_str()) {
            out.push(keyword);
        }
    }
    out.truncate(MAX_THEMES);
    out
}

fn synthesis(cards: &[DrawnCard], language: Language) -> String {
    let themes = themes(cards).join(", ");
    match language {
        Language::English => format!(
            "Looking at this reading as a whole, interconnected themes of {} emerge. \
             The cards, considered together, suggest a moment where these aspects of your life interweave and influence each other. \
             Each card adds a unique nuance to the overall picture, creating a mosaic of meanings that only you can fully interpret. \
             Ask yourself: what connections do I see between these energies? How do they relate to my original question? \
             Remember that this reading is a mirror for your thoughts and feelings, not a prediction. \
             Use these symbols as prompts for self-reflection and let them guide your personal growth in the coming days.",
            themes
        ),
        Language::Italian => format!(
            "Guardando questa lettura nel suo complesso, emergono temi interconnessi di {}. \
             Le carte, considerate insieme, suggeriscono un momento in cui questi aspetti della tua vita si intrecciano e si influenzano reciprocamente. \
             Ogni carta aggiunge una sfumatura unica al quadro generale, creando un mosaico di significati che solo tu puoi interpretare pienamente. \
             Chiediti: quali connessioni vedo tra queste energie? Come si relazionano alla mia domanda originale? \
             Ricorda che questa lettura e uno specchio per i tuoi pensieri e sentimenti, non una previsione. \
             Usa questi simboli come spunti per l'auto-riflessione e lascia che guidino la tua crescita personale nei prossimi giorni.",
            themes
        ),
    }
}

/// Build the template interpretation for a request.
///
/// Never fails. Cards sharing a position name collapse to the last one.
pub fn fallback_interpretation(req: &InterpretationRequest) -> Interpretation {
    let cards: BTreeMap<String, String> = req
        .drawn_cards
        .iter()
        .map(|c| (c.position_name.clone(), card_text(c, req.language)))
        .collect();

    Interpretation {
        overall: overall(req),
        cards,
        synthesis: synthesis(&req.drawn_cards, req.language),
        tone: req.tone,
        generated_at: Utc::now(),
    }
}
