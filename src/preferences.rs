//! Per-user reading preferences.
//!
//! Users without a stored row get [`Preferences::default`]; the first
//! update creates the row. Interpretation requests that omit tone, language
//! or focus areas take them from here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use arcana_core::models::{Language, Tone};

use crate::sqlite_store::from_ts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    #[default]
    Beginner,
    Intermediate,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Beginner => "beginner",
            ExperienceLevel::Intermediate => "intermediate",
        }
    }

    pub fn parse_lossy(s: &str) -> ExperienceLevel {
        match s {
            "intermediate" => ExperienceLevel::Intermediate,
            _ => ExperienceLevel::Beginner,
        }
    }
}

/// Life areas a user wants readings to emphasize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusArea {
    Relationships,
    Career,
    Personal,
    Health,
    Creativity,
    Spirituality,
}

impl FocusArea {
    pub const ALL: [FocusArea; 6] = [
        FocusArea::Relationships,
        FocusArea::Career,
        FocusArea::Personal,
        FocusArea::Health,
        FocusArea::Creativity,
        FocusArea::Spirituality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FocusArea::Relationships => "relationships",
            FocusArea::Career => "career",
            FocusArea::Personal => "personal",
            FocusArea::Health => "health",
            FocusArea::Creativity => "creativity",
            FocusArea::Spirituality => "spirituality",
        }
    }

    pub fn parse(s: &str) -> Option<FocusArea> {
        FocusArea::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub language: Language,
    pub reading_tone: Tone,
    pub focus_areas: Vec<FocusArea>,
    pub experience_level: ExperienceLevel,
    /// `None` until the user saves preferences for the first time.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: Language::English,
            reading_tone: Tone::Soft,
            focus_areas: Vec::new(),
            experience_level: ExperienceLevel::Beginner,
            updated_at: None,
        }
    }
}

impl Preferences {
    pub fn focus_area_names(&self) -> Vec<String> {
        self.focus_areas.iter().map(|f| f.as_str().to_string()).collect()
    }
}

/// A partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdate {
    pub language: Option<Language>,
    pub reading_tone: Option<Tone>,
    pub focus_areas: Option<Vec<FocusArea>>,
    pub experience_level: Option<ExperienceLevel>,
}

pub async fn get_preferences(pool: &SqlitePool, user_id: &str) -> Result<Preferences, sqlx::Error> {
    let row = sqlx::query(
        "SELECT language, reading_tone, focus_areas_json, experience_level, updated_at FROM user_preferences WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(Preferences::default());
    };

    let language: String = row.get("language");
    let tone: String = row.get("reading_tone");
    let focus_json: String = row.get("focus_areas_json");
    let level: String = row.get("experience_level");
    // Unknown stored names are dropped rather than failing the read.
    let focus_areas = serde_json::from_str::<Vec<String>>(&focus_json)
        .unwrap_or_default()
        .iter()
        .filter_map(|f| FocusArea::parse(f))
        .collect();

    Ok(Preferences {
        language: Language::parse_lossy(&language),
        reading_tone: Tone::parse_lossy(&tone),
        focus_areas,
        experience_level: ExperienceLevel::parse_lossy(&level),
        updated_at: Some(from_ts(row.get("updated_at"))),
    })
}

/// Apply `update` on top of the current preferences and store the result.
pub async fn update_preferences(
    pool: &SqlitePool,
    user_id: &str,
    update: &PreferencesUpdate,
) -> Result<Preferences, sqlx::Error> {
    let current = get_preferences(pool, user_id).await?;
    let mut focus_areas = Vec::new();
    for area in update.focus_areas.clone().unwrap_or(current.focus_areas) {
        if !focus_areas.contains(&area) {
            focus_areas.push(area);
        }
    }

    let now = Utc::now().timestamp();
    let prefs = Preferences {
        language: update.language.unwrap_or(current.language),
        reading_tone: update.reading_tone.unwrap_or(current.reading_tone),
        focus_areas,
        experience_level: update.experience_level.unwrap_or(current.experience_level),
        updated_at: Some(from_ts(now)),
    };
    let focus_json = serde_json::to_string(&prefs.focus_area_names())
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    sqlx::query(
        r#"
        INSERT INTO user_preferences
            (user_id, language, reading_tone, focus_areas_json, experience_level, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            language = excluded.language,
            reading_tone = excluded.reading_tone,
            focus_areas_json = excluded.focus_areas_json,
            experience_level = excluded.experience_level,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(prefs.language.as_str())
    .bind(prefs.reading_tone.as_str())
    .bind(&focus_json)
    .bind(prefs.experience_level.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    tracing::debug!(user_id, tone = prefs.reading_tone.as_str(), "preferences saved");
    Ok(prefs)
}
