//! System and user prompt composition.

use crate::models::{DrawnCard, Language, RetrievedChunk, Tone};

use super::InterpretationRequest;

/// Short description of a tone, embedded in the system prompt.
pub fn tone_description(tone: Tone, language: Language) -> &'static str {
    match (tone, language) {
        (Tone::Soft, Language::English) => "gentle, nurturing, and encouraging",
        (Tone::Soft, Language::Italian) => "gentile, premuroso e incoraggiante",
        (Tone::Pragmatic, Language::English) => "practical, grounded, and action-oriented",
        (Tone::Pragmatic, Language::Italian) => "pratico, concreto e orientato all'azione",
        (Tone::Spiritual, Language::English) => "mystical, introspective, and spiritually deep",
        (Tone::Spiritual, Language::Italian) => "mistico, introspettivo e spiritualmente profondo",
        (Tone::Direct, Language::English) => "straightforward, honest, and clear",
        (Tone::Direct, Language::Italian) => "diretto, onesto e chiaro",
    }
}

/// The system instruction: persona, tone, guardrails, and focus areas.
pub fn system_prompt(tone: Tone, language: Language, focus_areas: &[String]) -> String {
    let focus = if focus_areas.is_empty() {
        String::new()
    } else {
        match language {
            Language::English => format!(
                "The user is particularly interested in: {}.",
                focus_areas.join(", ")
            ),
            Language::Italian => format!(
                "L'utente e particolarmente interessato a: {}.",
                focus_areas.join(", ")
            ),
        }
    };
    let tone = tone_description(tone, language);

    match language {
        Language::English => format!(
            "You are a wise tarot interpreter who helps people with personal reflection and inner growth.\n\
             Your tone is {tone}.\n\n\
             IMPORTANT RULES:\n\
             - Do NOT predict the future\n\
             - Do NOT give medical, legal, or financial advice\n\
             - Always use reflective language (\"may suggest\", \"invites you to consider\", \"could represent\")\n\
             - Focus on introspection and personal growth\n\
             - Tarot is a mirror for thoughts, not a divination tool\n\
             - Encourage the user to reflect on how the symbols resonate with their experience\n\n\
             {focus}"
        ),
        Language::Italian => format!(
            "Sei un saggio interprete di tarocchi che aiuta le persone nella riflessione personale e nella crescita interiore.\n\
             Il tuo tono e {tone}.\n\n\
             REGOLE IMPORTANTI:\n\
             - NON predire il futuro\n\
             - NON dare consigli medici, legali o finanziari\n\
             - Usa sempre un linguaggio riflessivo (\"potrebbe suggerire\", \"invita a considerare\", \"potrebbe rappresentare\")\n\
             - Concentrati sull'introspezione e la crescita personale\n\
             - I tarocchi sono uno specchio per i pensieri, non uno strumento di divinazione\n\
             - Incoraggia l'utente a riflettere su come i simboli risuonano con la sua esperienza\n\n\
             {focus}"
        ),
    }
}

/// One numbered card entry: name, orientation, position, keywords, meaning.
pub fn describe_card(index: usize, card: &DrawnCard, language: Language) -> String {
    let (orientation, position, keywords, meaning) = match (language, card.is_reversed) {
        (Language::English, true) => (" (reversed)", "Position", "Keywords", "Meaning"),
        (Language::English, false) => (" (upright)", "Position", "Keywords", "Meaning"),
        (Language::Italian, true) => (" (rovesciata)", "Posizione", "Parole chiave", "Significato"),
        (Language::Italian, false) => (" (dritta)", "Posizione", "Parole chiave", "Significato"),
    };
    format!(
        "{}. {}{} - {}: {}\n   {}: {}\n   {}: {}",
        index + 1,
        card.card_name,
        orientation,
        position,
        card.position_name,
        keywords,
        card.keywords.join(", "),
        meaning,
        card.meaning
    )
}

/// Knowledge-base excerpts block, or an empty string when there are none.
pub fn context_block(context: &[RetrievedChunk], language: Language) -> String {
    if context.is_empty() {
        return String::new();
    }
    let heading = match language {
        Language::English => {
            "Background excerpts from the knowledge base (draw on them, do not quote them verbatim):"
        }
        Language::Italian => {
            "Estratti dalla base di conoscenza (usali come contesto, senza citarli alla lettera):"
        }
    };
    let excerpts = context
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[{}] ({}) {}", i + 1, c.source_name, c.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n{}\n\n", heading, excerpts)
}

/// The user instruction: question, spread, cards, excerpts, output format.
pub fn user_prompt(req: &InterpretationRequest, context: &[RetrievedChunk]) -> String {
    let language = req.language;
    let cards = req
        .drawn_cards
        .iter()
        .enumerate()
        .map(|(i, c)| describe_card(i, c, language))
        .collect::<Vec<_>>()
        .join("\n\n");
    let spread = req.spread.label(language);
    let excerpts = context_block(context, language);
    let question = &req.question;

    match language {
        Language::English => format!(
            "The user asked this question for reflection: \"{question}\"\n\n\
             Spread used: {spread}\n\n\
             Drawn cards:\n{cards}\n\n\
             {excerpts}\
             Provide:\n\
             1. An introductory message connecting the question to the general themes of the cards (2-3 sentences)\n\
             2. For each card, a personalized interpretation connecting its meaning to the question and position (3-4 sentences per card)\n\
             3. A COMPREHENSIVE SYNTHESIS (5-7 sentences) that:\n   \
             - Integrates all symbols into a coherent, interconnected vision\n   \
             - Identifies recurring themes and tensions between cards\n   \
             - Offers practical prompts for reflection\n   \
             - Suggests questions the user can ask themselves\n   \
             - Concludes with an empowering message\n\n\
             Format the response as JSON with this structure:\n\
             {{\n  \"overall\": \"introductory message\",\n  \"cards\": {{\n    \"position_name\": \"interpretation for that position\"\n  }},\n  \"synthesis\": \"comprehensive synthesis with overall vision\"\n}}"
        ),
        Language::Italian => format!(
            "L'utente ha posto questa domanda per la riflessione: \"{question}\"\n\n\
             Schema utilizzato: {spread}\n\n\
             Carte estratte:\n{cards}\n\n\
             {excerpts}\
             Fornisci:\n\
             1. Un messaggio introduttivo che connette la domanda ai temi generali delle carte (2-3 frasi)\n\
             2. Per ogni carta, un'interpretazione personalizzata che colleghi il suo significato alla domanda e alla posizione (3-4 frasi per carta)\n\
             3. Una SINTESI APPROFONDITA (5-7 frasi) che:\n   \
             - Integri tutti i simboli in una visione coerente e interconnessa\n   \
             - Identifichi i temi ricorrenti e le tensioni tra le carte\n   \
             - Offra spunti pratici per la riflessione\n   \
             - Suggerisca domande che l'utente puo porsi\n   \
             - Concluda con un messaggio di empowerment\n\n\
             Formatta la risposta come JSON con questa struttura:\n\
             {{\n  \"overall\": \"messaggio introduttivo\",\n  \"cards\": {{\n    \"nome_posizione\": \"interpretazione per quella posizione\"\n  }},\n  \"synthesis\": \"sintesi approfondita con visione d'insieme\"\n}}"
        ),
    }
}
