//! Rating and summary models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Error;

/// A validated opinion score on the 5-point MOS scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Pre-selected value of the rating form ("3: Fair")
    pub const DEFAULT: Score = Score(3);

    /// Every score in ascending order
    pub const ALL: [Score; 5] = [Score(1), Score(2), Score(3), Score(4), Score(5)];

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Score(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Label shown next to the option in the rating form
    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "1: Bad",
            2 => "2: Poor",
            3 => "3: Fair",
            4 => "4: Good",
            _ => "5: Excellent",
        }
    }

    /// Reverse lookup of [`Score::label`]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.label() == label)
    }
}

impl TryFrom<i64> for Score {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Score::new)
            .ok_or_else(|| Error::InvalidInput(format!("rating must be 1-5, got {}", value)))
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> u8 {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rating value exactly as a backend returned it
///
/// Spreadsheets and loosely typed tables do not guarantee numeric cells, so
/// decoding into a [`Score`] is left to the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRating {
    Integer(i64),
    Float(f64),
    Text(String),
    Missing,
}

impl RawRating {
    /// Classify a textual cell (CSV field, spreadsheet value)
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            RawRating::Missing
        } else if let Ok(v) = trimmed.parse::<i64>() {
            RawRating::Integer(v)
        } else if let Ok(v) = trimmed.parse::<f64>() {
            RawRating::Float(v)
        } else {
            RawRating::Text(text.to_string())
        }
    }

    /// Classify an arbitrary JSON value (REST backends)
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RawRating::Missing,
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(RawRating::Integer)
                .or_else(|| n.as_f64().map(RawRating::Float))
                .unwrap_or_else(|| RawRating::Text(n.to_string())),
            serde_json::Value::String(s) => RawRating::from_text(s),
            other => RawRating::Text(other.to_string()),
        }
    }

    /// Numeric value, if the cell holds a finite number
    ///
    /// Numeric text such as `"4"` or `"4.0"` is accepted.
    pub fn numeric(&self) -> Option<f64> {
        let value = match self {
            RawRating::Integer(v) => *v as f64,
            RawRating::Float(v) => *v,
            RawRating::Text(s) => s.trim().parse::<f64>().ok()?,
            RawRating::Missing => return None,
        };
        value.is_finite().then_some(value)
    }
}

impl From<Score> for RawRating {
    fn from(score: Score) -> Self {
        RawRating::Integer(i64::from(score.value()))
    }
}

impl fmt::Display for RawRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawRating::Integer(v) => write!(f, "{}", v),
            RawRating::Float(v) => write!(f, "{}", v),
            RawRating::Text(s) => f.write_str(s),
            RawRating::Missing => Ok(()),
        }
    }
}

/// A rating about to be appended to a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRating {
    pub user_id: String,
    pub audio_file: String,
    pub score: Score,
    pub created_at: DateTime<Utc>,
    /// Idempotency key, see [`crate::ids::submission_id`]
    pub submission_id: String,
}

impl NewRating {
    pub fn new(user_id: impl Into<String>, audio_file: impl Into<String>, score: Score) -> Self {
        let user_id = user_id.into();
        let audio_file = audio_file.into();
        let submission_id = format!("{}:{}:{}", user_id, audio_file, uuid::Uuid::new_v4());
        Self {
            user_id,
            audio_file,
            score,
            created_at: Utc::now(),
            submission_id,
        }
    }

    pub fn with_submission_id(mut self, submission_id: impl Into<String>) -> Self {
        self.submission_id = submission_id.into();
        self
    }

    /// The record a store returns for this rating once persisted
    pub fn to_record(&self) -> RatingRecord {
        RatingRecord {
            user_id: self.user_id.clone(),
            audio_file: self.audio_file.clone(),
            rating: self.score.into(),
            created_at: Some(self.created_at),
        }
    }
}

/// A persisted rating as read back from a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub user_id: String,
    pub audio_file: String,
    pub rating: RawRating,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl RatingRecord {
    pub fn new(user_id: &str, audio_file: &str, rating: RawRating) -> Self {
        Self {
            user_id: user_id.to_string(),
            audio_file: audio_file.to_string(),
            rating,
            created_at: None,
        }
    }
}

/// Mean opinion score of one audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosSummary {
    pub audio_file: String,
    pub mean_score: f64,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bounds() {
        assert!(Score::new(0).is_none());
        assert!(Score::new(6).is_none());
        assert_eq!(Score::new(5).map(Score::value), Some(5));
        assert!(Score::try_from(-1i64).is_err());
        assert!(Score::try_from(300i64).is_err());
    }

    #[test]
    fn test_score_labels_round_trip() {
        for score in Score::ALL {
            assert_eq!(Score::from_label(score.label()), Some(score));
        }
        assert_eq!(Score::DEFAULT.label(), "3: Fair");
        assert_eq!(Score::from_label("6: Sublime"), None);
    }

    #[test]
    fn test_score_json_rejects_out_of_range() {
        assert_eq!(serde_json::from_str::<Score>("4").unwrap(), Score::new(4).unwrap());
        assert!(serde_json::from_str::<Score>("9").is_err());
        assert_eq!(serde_json::to_string(&Score::new(2).unwrap()).unwrap(), "2");
    }

    #[test]
    fn test_raw_rating_from_text() {
        assert_eq!(RawRating::from_text("4"), RawRating::Integer(4));
        assert_eq!(RawRating::from_text(" 4.5 "), RawRating::Float(4.5));
        assert_eq!(RawRating::from_text(""), RawRating::Missing);
        assert_eq!(RawRating::from_text("N/A"), RawRating::Text("N/A".to_string()));
    }

    #[test]
    fn test_raw_rating_numeric() {
        assert_eq!(RawRating::Integer(3).numeric(), Some(3.0));
        assert_eq!(RawRating::Text("4.0".to_string()).numeric(), Some(4.0));
        assert_eq!(RawRating::Text("N/A".to_string()).numeric(), None);
        assert_eq!(RawRating::Float(f64::NAN).numeric(), None);
        assert_eq!(RawRating::Missing.numeric(), None);
    }

    #[test]
    fn test_raw_rating_from_json() {
        assert_eq!(RawRating::from_json(&serde_json::json!(5)), RawRating::Integer(5));
        assert_eq!(RawRating::from_json(&serde_json::json!(2.5)), RawRating::Float(2.5));
        assert_eq!(RawRating::from_json(&serde_json::json!("3")), RawRating::Integer(3));
        assert_eq!(RawRating::from_json(&serde_json::Value::Null), RawRating::Missing);
    }

    #[test]
    fn test_new_rating_to_record() {
        let rating = NewRating::new("user_1", "a.wav", Score::new(4).unwrap())
            .with_submission_id("k1");
        let record = rating.to_record();
        assert_eq!(record.rating, RawRating::Integer(4));
        assert_eq!(record.created_at, Some(rating.created_at));
        assert_eq!(rating.submission_id, "k1");
    }
}
