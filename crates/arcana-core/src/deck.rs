//! The 78-card tarot deck.
//!
//! Every card carries English and Italian names, keywords, and upright and
//! reversed meanings. [`standard_deck`] builds the catalog that the app
//! seeds into its database; [`Deck`] resolves client-supplied card names
//! against it so meanings and keywords always come from the catalog.
//!
//! | Ids | Cards |
//! |-----|-------|
//! | 0–21 | Major Arcana, The Fool to The World |
//! | 22–35 | Wands, Ace to King |
//! | 36–49 | Cups |
//! | 50–63 | Swords |
//! | 64–77 | Pentacles |

use serde::{Deserialize, Serialize};

use crate::models::{DrawnCard, Language};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arcana {
    Major,
    Minor,
}

impl Arcana {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arcana::Major => "major",
            Arcana::Minor => "minor",
        }
    }

    pub fn parse(s: &str) -> Option<Arcana> {
        match s {
            "major" => Some(Arcana::Major),
            "minor" => Some(Arcana::Minor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Wands,
    Cups,
    Swords,
    Pentacles,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Wands, Suit::Cups, Suit::Swords, Suit::Pentacles];

    pub fn as_str(&self) -> &'static str {
        match self {
            Suit::Wands => "wands",
            Suit::Cups => "cups",
            Suit::Swords => "swords",
            Suit::Pentacles => "pentacles",
        }
    }

    pub fn parse(s: &str) -> Option<Suit> {
        Suit::ALL.into_iter().find(|suit| suit.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Court {
    Page,
    Knight,
    Queen,
    King,
}

impl Court {
    pub fn as_str(&self) -> &'static str {
        match self {
            Court::Page => "page",
            Court::Knight => "knight",
            Court::Queen => "queen",
            Court::King => "king",
        }
    }

    pub fn parse(s: &str) -> Option<Court> {
        match s {
            "page" => Some(Court::Page),
            "knight" => Some(Court::Knight),
            "queen" => Some(Court::Queen),
            "king" => Some(Court::King),
            _ => None,
        }
    }
}

/// One catalog card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TarotCard {
    pub id: i64,
    pub name_en: String,
    pub name_it: String,
    pub arcana: Arcana,
    pub suit: Option<Suit>,
    /// 0–21 for major cards, 1–10 for pips, `None` for court cards.
    pub number: Option<i64>,
    pub court: Option<Court>,
    pub keywords_en: Vec<String>,
    pub keywords_it: Vec<String>,
    pub upright_meaning_en: String,
    pub upright_meaning_it: String,
    pub reversed_meaning_en: String,
    pub reversed_meaning_it: String,
    pub image_url: Option<String>,
}

impl TarotCard {
    pub fn name(&self, language: Language) -> &str {
        match language {
            Language::English => &self.name_en,
            Language::Italian => &self.name_it,
        }
    }

    pub fn keywords(&self, language: Language) -> &[String] {
        match language {
            Language::English => &self.keywords_en,
            Language::Italian => &self.keywords_it,
        }
    }

    pub fn meaning(&self, language: Language, reversed: bool) -> &str {
        match (language, reversed) {
            (Language::English, false) => &self.upright_meaning_en,
            (Language::English, true) => &self.reversed_meaning_en,
            (Language::Italian, false) => &self.upright_meaning_it,
            (Language::Italian, true) => &self.reversed_meaning_it,
        }
    }
}

/// A card catalog with name lookup.
#[derive(Debug, Clone, Default)]
pub struct Deck {
    cards: Vec<TarotCard>,
}

impl Deck {
    pub fn new(cards: Vec<TarotCard>) -> Self {
        Self { cards }
    }

    pub fn cards(&self) -> &[TarotCard] {
        &self.cards
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&TarotCard> {
        self.cards.iter().find(|c| c.id == id)
    }

    /// Find a card by its English or Italian name, ignoring case and
    /// surrounding whitespace.
    pub fn find(&self, name: &str) -> Option<&TarotCard> {
        let wanted = name.trim().to_lowercase();
        self.cards
            .iter()
            .find(|c| c.name_en.to_lowercase() == wanted || c.name_it.to_lowercase() == wanted)
    }

    /// Replace a drawn card's name, meaning and keywords with the catalog's
    /// text in `language`. Position and orientation are kept.
    ///
    /// Returns `None` when the name is not in the catalog.
    pub fn resolve(&self, drawn: &DrawnCard, language: Language) -> Option<DrawnCard> {
        let card = self.find(&drawn.card_name)?;
        Some(DrawnCard {
            card_name: card.name(language).to_string(),
            position_name: drawn.position_name.clone(),
            is_reversed: drawn.is_reversed,
            meaning: card.meaning(language, drawn.is_reversed).to_string(),
            keywords: card.keywords(language).to_vec(),
        })
    }
}

// ============ Catalog data ============

struct MajorEntry {
    en: &'static str,
    it: &'static str,
    keywords_en: [&'static str; 4],
    keywords_it: [&'static str; 4],
    upright_en: &'static str,
    upright_it: &'static str,
    reversed_en: &'static str,
    reversed_it: &'static str,
}

const MAJOR_ARCANA: [MajorEntry; 22] = [
    MajorEntry {
        en: "The Fool",
        it: "Il Matto",
        keywords_en: ["beginnings", "innocence", "spontaneity", "freedom"],
        keywords_it: ["inizi", "innocenza", "spontaneità", "libertà"],
        upright_en: "A leap into the unknown, trusting the journey ahead.",
        upright_it: "Un salto nell'ignoto, con fiducia nel cammino che si apre.",
        reversed_en: "Recklessness or hesitation holding back a new start.",
        reversed_it: "Imprudenza o esitazione che frenano un nuovo inizio.",
    },
    MajorEntry {
        en: "The Magician",
        it: "Il Mago",
        keywords_en: ["willpower", "skill", "manifestation", "resourcefulness"],
        keywords_it: ["volontà", "abilità", "manifestazione", "ingegno"],
        upright_en: "You have every tool you need to turn intention into action.",
        upright_it: "Hai tutti gli strumenti per trasformare l'intenzione in azione.",
        reversed_en: "Scattered energy or talents used without clear purpose.",
        reversed_it: "Energie disperse o talenti usati senza uno scopo chiaro.",
    },
    MajorEntry {
        en: "The High Priestess",
        it: "La Papessa",
        keywords_en: ["intuition", "mystery", "inner voice", "stillness"],
        keywords_it: ["intuizione", "mistero", "voce interiore", "quiete"],
        upright_en: "Quiet knowing; listen to what lies beneath the surface.",
        upright_it: "Un sapere silenzioso; ascolta ciò che si cela sotto la superficie.",
        reversed_en: "Ignoring your intuition or keeping secrets from yourself.",
        reversed_it: "Ignorare l'intuizione o nascondere segreti a te stesso.",
    },
    MajorEntry {
        en: "The Empress",
        it: "L'Imperatrice",
        keywords_en: ["abundance", "nurturing", "creativity", "fertility"],
        keywords_it: ["abbondanza", "cura", "creatività", "fertilità"],
        upright_en: "Growth flourishes when you nurture yourself and others.",
        upright_it: "La crescita fiorisce quando ti prendi cura di te e degli altri.",
        reversed_en: "Creative block or neglecting your own needs.",
        reversed_it: "Blocco creativo o trascuratezza dei propri bisogni.",
    },
    MajorEntry {
        en: "The Emperor",
        it: "L'Imperatore",
        keywords_en: ["structure", "authority", "stability", "leadership"],
        keywords_it: ["struttura", "autorità", "stabilità", "guida"],
        upright_en: "Order and firm foundations bring security.",
        upright_it: "Ordine e basi solide portano sicurezza.",
        reversed_en: "Rigidity or control that stifles rather than protects.",
        reversed_it: "Rigidità o controllo che soffocano invece di proteggere.",
    },
    MajorEntry {
        en: "The Hierophant",
        it: "Il Papa",
        keywords_en: ["tradition", "guidance", "belief", "community"],
        keywords_it: ["tradizione", "guida", "fede", "comunità"],
        upright_en: "Wisdom found in shared traditions and trusted mentors.",
        upright_it: "Saggezza che nasce dalle tradizioni condivise e da maestri fidati.",
        reversed_en: "Questioning convention to find your own path.",
        reversed_it: "Mettere in discussione le convenzioni per trovare la propria via.",
    },
    MajorEntry {
        en: "The Lovers",
        it: "Gli Amanti",
        keywords_en: ["love", "harmony", "choice", "values"],
        keywords_it: ["amore", "armonia", "scelta", "valori"],
        upright_en: "A meaningful union or a choice aligned with your values.",
        upright_it: "Un'unione significativa o una scelta in linea con i tuoi valori.",
        reversed_en: "Disharmony or a choice that pulls against your values.",
        reversed_it: "Disarmonia o una scelta in contrasto con i tuoi valori.",
    },
    MajorEntry {
        en: "The Chariot",
        it: "Il Carro",
        keywords_en: ["determination", "control", "victory", "direction"],
        keywords_it: ["determinazione", "controllo", "vittoria", "direzione"],
        upright_en: "Focused will carries you past obstacles.",
        upright_it: "Una volontà concentrata ti porta oltre gli ostacoli.",
        reversed_en: "Lost direction or forces pulling in different ways.",
        reversed_it: "Direzione smarrita o forze che tirano in direzioni diverse.",
    },
    MajorEntry {
        en: "Strength",
        it: "La Forza",
        keywords_en: ["courage", "patience", "compassion", "inner strength"],
        keywords_it: ["coraggio", "pazienza", "compassione", "forza interiore"],
        upright_en: "Gentle courage tames what force alone cannot.",
        upright_it: "Un coraggio gentile doma ciò che la sola forza non può.",
        reversed_en: "Self-doubt or fear eroding your confidence.",
        reversed_it: "Insicurezza o paura che erodono la fiducia in te.",
    },
    MajorEntry {
        en: "The Hermit",
        it: "L'Eremita",
        keywords_en: ["introspection", "solitude", "guidance", "wisdom"],
        keywords_it: ["introspezione", "solitudine", "guida", "saggezza"],
        upright_en: "Stepping back to seek answers within.",
        upright_it: "Fare un passo indietro per cercare risposte dentro di sé.",
        reversed_en: "Isolation that has become withdrawal.",
        reversed_it: "Un isolamento diventato chiusura.",
    },
    MajorEntry {
        en: "Wheel of Fortune",
        it: "La Ruota della Fortuna",
        keywords_en: ["cycles", "change", "destiny", "turning point"],
        keywords_it: ["cicli", "cambiamento", "destino", "svolta"],
        upright_en: "The wheel turns; a new cycle is beginning.",
        upright_it: "La ruota gira; un nuovo ciclo sta iniziando.",
        reversed_en: "Resisting change or feeling caught in a repeating pattern.",
        reversed_it: "Resistere al cambiamento o sentirsi bloccati in uno schema che si ripete.",
    },
    MajorEntry {
        en: "Justice",
        it: "La Giustizia",
        keywords_en: ["fairness", "truth", "balance", "accountability"],
        keywords_it: ["equità", "verità", "equilibrio", "responsabilità"],
        upright_en: "Clear judgment and consequences that match actions.",
        upright_it: "Giudizio limpido e conseguenze proporzionate alle azioni.",
        reversed_en: "Avoiding accountability or an outcome that feels unfair.",
        reversed_it: "Evitare le responsabilità o un esito che sembra ingiusto.",
    },
    MajorEntry {
        en: "The Hanged Man",
        it: "L'Appeso",
        keywords_en: ["surrender", "pause", "new perspective", "letting go"],
        keywords_it: ["resa", "pausa", "nuova prospettiva", "lasciar andare"],
        upright_en: "A pause that reveals things from a new angle.",
        upright_it: "Una pausa che mostra le cose da una nuova angolazione.",
        reversed_en: "Stalling, or sacrifice that no longer serves you.",
        reversed_it: "Stallo, o un sacrificio che non ti serve più.",
    },
    MajorEntry {
        en: "Death",
        it: "La Morte",
        keywords_en: ["endings", "transformation", "transition", "release"],
        keywords_it: ["fine", "trasformazione", "transizione", "liberazione"],
        upright_en: "One chapter closes so another can begin.",
        upright_it: "Un capitolo si chiude perché un altro possa iniziare.",
        reversed_en: "Clinging to what is already over.",
        reversed_it: "Aggrapparsi a ciò che è già finito.",
    },
    MajorEntry {
        en: "Temperance",
        it: "La Temperanza",
        keywords_en: ["balance", "moderation", "patience", "healing"],
        keywords_it: ["equilibrio", "moderazione", "pazienza", "guarigione"],
        upright_en: "Blending opposites with patience brings healing.",
        upright_it: "Unire gli opposti con pazienza porta guarigione.",
        reversed_en: "Excess or impatience upsetting your balance.",
        reversed_it: "Eccessi o impazienza che turbano il tuo equilibrio.",
    },
    MajorEntry {
        en: "The Devil",
        it: "Il Diavolo",
        keywords_en: ["attachment", "temptation", "shadow", "restriction"],
        keywords_it: ["attaccamento", "tentazione", "ombra", "costrizione"],
        upright_en: "Chains that may be looser than they seem.",
        upright_it: "Catene che forse sono più lente di quanto sembrino.",
        reversed_en: "Breaking free from an unhealthy attachment.",
        reversed_it: "Liberarsi da un attaccamento che non fa bene.",
    },
    MajorEntry {
        en: "The Tower",
        it: "La Torre",
        keywords_en: ["upheaval", "revelation", "sudden change", "awakening"],
        keywords_it: ["sconvolgimento", "rivelazione", "cambiamento improvviso", "risveglio"],
        upright_en: "Sudden change clears away what was built on shaky ground.",
        upright_it: "Un cambiamento improvviso spazza via ciò che poggiava su basi fragili.",
        reversed_en: "Avoiding a necessary collapse, or a crisis narrowly averted.",
        reversed_it: "Evitare un crollo necessario, o una crisi scampata per poco.",
    },
    MajorEntry {
        en: "The Star",
        it: "La Stella",
        keywords_en: ["hope", "renewal", "faith", "serenity"],
        keywords_it: ["speranza", "rinnovamento", "fiducia", "serenità"],
        upright_en: "Renewed hope after difficult times.",
        upright_it: "Speranza rinnovata dopo tempi difficili.",
        reversed_en: "Discouragement or a temporary loss of faith.",
        reversed_it: "Scoraggiamento o una temporanea perdita di fiducia.",
    },
    MajorEntry {
        en: "The Moon",
        it: "La Luna",
        keywords_en: ["illusion", "intuition", "uncertainty", "dreams"],
        keywords_it: ["illusione", "intuizione", "incertezza", "sogni"],
        upright_en: "Not everything is as it appears; trust your instincts.",
        upright_it: "Non tutto è come appare; fidati del tuo istinto.",
        reversed_en: "Confusion lifting and hidden fears coming to light.",
        reversed_it: "La confusione si dirada e le paure nascoste vengono alla luce.",
    },
    MajorEntry {
        en: "The Sun",
        it: "Il Sole",
        keywords_en: ["joy", "success", "vitality", "clarity"],
        keywords_it: ["gioia", "successo", "vitalità", "chiarezza"],
        upright_en: "Warmth, clarity and well-earned success.",
        upright_it: "Calore, chiarezza e un successo meritato.",
        reversed_en: "Joy dimmed by doubt, or success delayed.",
        reversed_it: "Una gioia offuscata dal dubbio, o un successo rimandato.",
    },
    MajorEntry {
        en: "Judgement",
        it: "Il Giudizio",
        keywords_en: ["reflection", "awakening", "renewal", "calling"],
        keywords_it: ["riflessione", "risveglio", "rinascita", "chiamata"],
        upright_en: "An inner call to rise and embrace who you are becoming.",
        upright_it: "Una chiamata interiore a rialzarsi e accogliere chi stai diventando.",
        reversed_en: "Harsh self-judgment drowning out the call.",
        reversed_it: "Un giudizio severo su te stesso che soffoca la chiamata.",
    },
    MajorEntry {
        en: "The World",
        it: "Il Mondo",
        keywords_en: ["completion", "integration", "fulfilment", "wholeness"],
        keywords_it: ["compimento", "integrazione", "realizzazione", "completezza"],
        upright_en: "A cycle completed and a sense of wholeness.",
        upright_it: "Un ciclo compiuto e un senso di completezza.",
        reversed_en: "Loose ends that keep a chapter from closing.",
        reversed_it: "Questioni in sospeso che impediscono di chiudere un capitolo.",
    },
];

struct SuitEntry {
    suit: Suit,
    en: &'static str,
    it: &'static str,
    domain_en: &'static str,
    domain_it: &'static str,
    keywords_en: [&'static str; 2],
    keywords_it: [&'static str; 2],
}

const SUITS: [SuitEntry; 4] = [
    SuitEntry {
        suit: Suit::Wands,
        en: "Wands",
        it: "Bastoni",
        domain_en: "passion and ambition",
        domain_it: "passione e ambizione",
        keywords_en: ["passion", "energy"],
        keywords_it: ["passione", "energia"],
    },
    SuitEntry {
        suit: Suit::Cups,
        en: "Cups",
        it: "Coppe",
        domain_en: "emotions and relationships",
        domain_it: "emozioni e relazioni",
        keywords_en: ["emotion", "connection"],
        keywords_it: ["emozione", "legami"],
    },
    SuitEntry {
        suit: Suit::Swords,
        en: "Swords",
        it: "Spade",
        domain_en: "thought and conflict",
        domain_it: "pensiero e conflitto",
        keywords_en: ["intellect", "truth"],
        keywords_it: ["intelletto", "verità"],
    },
    SuitEntry {
        suit: Suit::Pentacles,
        en: "Pentacles",
        it: "Denari",
        domain_en: "work and material security",
        domain_it: "lavoro e sicurezza materiale",
        keywords_en: ["work", "resources"],
        keywords_it: ["lavoro", "risorse"],
    },
];

struct RankEntry {
    number: Option<i64>,
    court: Option<Court>,
    en: &'static str,
    it: &'static str,
    keyword_en: &'static str,
    keyword_it: &'static str,
    upright_en: &'static str,
    upright_it: &'static str,
    reversed_en: &'static str,
    reversed_it: &'static str,
}

const fn pip(
    n: i64,
    en: &'static str,
    it: &'static str,
    keyword: (&'static str, &'static str),
    upright: (&'static str, &'static str),
    reversed: (&'static str, &'static str),
) -> RankEntry {
    RankEntry {
        number: Some(n),
        court: None,
        en,
        it,
        keyword_en: keyword.0,
        keyword_it: keyword.1,
        upright_en: upright.0,
        upright_it: upright.1,
        reversed_en: reversed.0,
        reversed_it: reversed.1,
    }
}

const fn court(
    c: Court,
    en: &'static str,
    it: &'static str,
    keyword: (&'static str, &'static str),
    upright: (&'static str, &'static str),
    reversed: (&'static str, &'static str),
) -> RankEntry {
    RankEntry {
        number: None,
        court: Some(c),
        en,
        it,
        keyword_en: keyword.0,
        keyword_it: keyword.1,
        upright_en: upright.0,
        upright_it: upright.1,
        reversed_en: reversed.0,
        reversed_it: reversed.1,
    }
}

const RANKS: [RankEntry; 14] = [
    pip(
        1,
        "Ace",
        "Asso",
        ("new beginning", "nuovo inizio"),
        ("A fresh start", "Un nuovo inizio"),
        ("A delayed or hesitant start", "Un inizio rimandato o esitante"),
    ),
    pip(
        2,
        "Two",
        "Due",
        ("choice", "scelta"),
        ("A choice between two paths", "Una scelta tra due strade"),
        ("Indecision and imbalance", "Indecisione e squilibrio"),
    ),
    pip(
        3,
        "Three",
        "Tre",
        ("growth", "crescita"),
        ("Early growth and collaboration", "Crescita iniziale e collaborazione"),
        ("Setbacks in shared plans", "Intoppi nei progetti condivisi"),
    ),
    pip(
        4,
        "Four",
        "Quattro",
        ("stability", "stabilità"),
        ("A moment of stability and rest", "Un momento di stabilità e riposo"),
        ("Stagnation or restlessness", "Stagnazione o irrequietezza"),
    ),
    pip(
        5,
        "Five",
        "Cinque",
        ("challenge", "sfida"),
        ("Conflict and challenge", "Conflitto e sfida"),
        ("Tension easing after a struggle", "La tensione si allenta dopo una lotta"),
    ),
    pip(
        6,
        "Six",
        "Sei",
        ("harmony", "armonia"),
        ("Harmony and generosity", "Armonia e generosità"),
        ("Imbalance in giving and receiving", "Squilibrio tra dare e ricevere"),
    ),
    pip(
        7,
        "Seven",
        "Sette",
        ("perseverance", "perseveranza"),
        ("Perseverance and assessment", "Perseveranza e valutazione"),
        ("Doubt and scattered effort", "Dubbi e sforzi dispersi"),
    ),
    pip(
        8,
        "Eight",
        "Otto",
        ("movement", "movimento"),
        ("Movement and focused effort", "Movimento e impegno concentrato"),
        ("Feeling stuck or rushing ahead", "Sentirsi bloccati o correre troppo"),
    ),
    pip(
        9,
        "Nine",
        "Nove",
        ("resilience", "resilienza"),
        ("Resilience near the finish line", "Resilienza vicino al traguardo"),
        ("Exhaustion and worry", "Stanchezza e preoccupazione"),
    ),
    pip(
        10,
        "Ten",
        "Dieci",
        ("completion", "compimento"),
        ("A cycle reaching its fullness", "Un ciclo che giunge a pienezza"),
        ("A burden or an ending resisted", "Un peso o una fine a cui si resiste"),
    ),
    court(
        Court::Page,
        "Page",
        "Fante",
        ("curiosity", "curiosità"),
        ("Curiosity and a message of news", "Curiosità e un messaggio di novità"),
        ("Immaturity or unwelcome news", "Immaturità o notizie sgradite"),
    ),
    court(
        Court::Knight,
        "Knight",
        "Cavaliere",
        ("pursuit", "ricerca"),
        ("Bold pursuit and action", "Ricerca audace e azione"),
        ("Impulsiveness or lack of direction", "Impulsività o mancanza di direzione"),
    ),
    court(
        Court::Queen,
        "Queen",
        "Regina",
        ("nurturing", "cura"),
        ("Mature, caring mastery", "Padronanza matura e premurosa"),
        ("Insecurity or emotional imbalance", "Insicurezza o squilibrio emotivo"),
    ),
    court(
        Court::King,
        "King",
        "Re",
        ("mastery", "maestria"),
        ("Confident leadership and mastery", "Guida sicura e maestria"),
        ("Control turned rigid or careless", "Un controllo divenuto rigido o negligente"),
    ),
];

fn strings<const N: usize>(words: [&str; N]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// The full 78-card catalog, ordered by id.
pub fn standard_deck() -> Vec<TarotCard> {
    let mut cards = Vec::with_capacity(78);

    for (i, m) in MAJOR_ARCANA.iter().enumerate() {
        cards.push(TarotCard {
            id: i as i64,
            name_en: m.en.to_string(),
            name_it: m.it.to_string(),
            arcana: Arcana::Major,
            suit: None,
            number: Some(i as i64),
            court: None,
            keywords_en: strings(m.keywords_en),
            keywords_it: strings(m.keywords_it),
            upright_meaning_en: m.upright_en.to_string(),
            upright_meaning_it: m.upright_it.to_string(),
            reversed_meaning_en: m.reversed_en.to_string(),
            reversed_meaning_it: m.reversed_it.to_string(),
            image_url: None,
        });
    }

    for s in &SUITS {
        for r in &RANKS {
            cards.push(TarotCard {
                id: cards.len() as i64,
                name_en: format!("{} of {}", r.en, s.en),
                name_it: format!("{} di {}", r.it, s.it),
                arcana: Arcana::Minor,
                suit: Some(s.suit),
                number: r.number,
                court: r.court,
                keywords_en: vec![
                    r.keyword_en.to_string(),
                    s.keywords_en[0].to_string(),
                    s.keywords_en[1].to_string(),
                ],
                keywords_it: vec![
                    r.keyword_it.to_string(),
                    s.keywords_it[0].to_string(),
                    s.keywords_it[1].to_string(),
                ],
                upright_meaning_en: format!("{} in matters of {}.", r.upright_en, s.domain_en),
                upright_meaning_it: format!("{} nell'ambito di {}.", r.upright_it, s.domain_it),
                reversed_meaning_en: format!("{} in matters of {}.", r.reversed_en, s.domain_en),
                reversed_meaning_it: format!("{} nell'ambito di {}.", r.reversed_it, s.domain_it),
                image_url: None,
            });
        }
    }

    cards
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_standard_deck_has_78_unique_cards() {
        let deck = standard_deck();
        assert_eq!(deck.len(), 78);
        for (i, card) in deck.iter().enumerate() {
            assert_eq!(card.id, i as i64);
        }
        let names: HashSet<_> = deck.iter().map(|c| c.name_en.to_lowercase()).collect();
        assert_eq!(names.len(), 78);
        let names_it: HashSet<_> = deck.iter().map(|c| c.name_it.to_lowercase()).collect();
        assert_eq!(names_it.len(), 78);
        assert_eq!(deck.iter().filter(|c| c.arcana == Arcana::Major).count(), 22);
    }

    #[test]
    fn test_minor_card_composition() {
        let deck = standard_deck();
        let queen = &deck[36 + 12];
        assert_eq!(queen.name_en, "Queen of Cups");
        assert_eq!(queen.name_it, "Regina di Coppe");
        assert_eq!(queen.suit, Some(Suit::Cups));
        assert_eq!(queen.court, Some(Court::Queen));
        assert_eq!(queen.number, None);
        assert_eq!(
            queen.upright_meaning_en,
            "Mature, caring mastery in matters of emotions and relationships."
        );
        assert_eq!(deck[22].name_en, "Ace of Wands");
        assert_eq!(deck[22].number, Some(1));
        assert_eq!(deck[77].name_it, "Re di Denari");
    }

    #[test]
    fn test_find_by_either_language() {
        let deck = Deck::new(standard_deck());
        assert_eq!(deck.find("the tower").unwrap().id, 16);
        assert_eq!(deck.find("  La Torre ").unwrap().id, 16);
        assert!(deck.find("The Towel").is_none());
    }

    #[test]
    fn test_resolve_uses_catalog_text() {
        let deck = Deck::new(standard_deck());
        let drawn = DrawnCard {
            card_name: "The Hermit".to_string(),
            position_name: "Presente".to_string(),
            is_reversed: true,
            meaning: "made up by the client".to_string(),
            keywords: vec!["whatever".to_string()],
        };
        let resolved = deck.resolve(&drawn, Language::Italian).unwrap();
        assert_eq!(resolved.card_name, "L'Eremita");
        assert_eq!(resolved.position_name, "Presente");
        assert!(resolved.is_reversed);
        assert_eq!(resolved.meaning, "Un isolamento diventato chiusura.");
        assert_eq!(resolved.keywords[0], "introspezione");
    }
}
