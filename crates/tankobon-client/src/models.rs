//! Wire models for the collection service.
//!
//! Fields are passed through as received; the server owns validation.

use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a series or volume.
pub type EntityId = i64;

/// One series in the collection, with its volumes.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Server-assigned identifier.
    pub id: EntityId,
    /// Display title.
    pub title: String,
    /// Number of volumes published.
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_volumes: u32,
    /// Whether the user marked the series as complete.
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
    /// Optional score.
    #[serde(default)]
    pub score: Option<f64>,
    /// Free-form tags.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    /// Individual volumes and their ownership state.
    #[serde(default, deserialize_with = "null_as_default")]
    pub volumes: Vec<Volume>,
}

impl Series {
    /// Number of volumes the user owns.
    #[must_use]
    pub fn owned_volumes(&self) -> usize {
        self.volumes.iter().filter(|volume| volume.owned).count()
    }
}

/// A single volume of a series.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Server-assigned identifier, used by the ownership toggle.
    pub id: EntityId,
    /// Position within the series.
    #[serde(default, deserialize_with = "null_as_default")]
    pub volume_number: u32,
    /// Whether the user owns this volume.
    #[serde(default, deserialize_with = "null_as_default")]
    pub owned: bool,
}

/// Payload for creating a series.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewSeries {
    /// Display title.
    pub title: String,
    /// Number of volumes published.
    pub total_volumes: u32,
    /// Optional score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Optional tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// Partial update for a series; unset fields are left untouched by the server.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SeriesPatch {
    /// New title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New volume count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_volumes: Option<u32>,
    /// New score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Replacement tag list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl SeriesPatch {
    /// Whether the patch would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.total_volumes.is_none()
            && self.score.is_none()
            && self.tags.is_none()
    }
}

/// Metadata from the external catalogue lookup.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesMetadata {
    /// Community score, when known.
    #[serde(default)]
    pub score: Option<f64>,
    /// Genre names.
    #[serde(default, deserialize_with = "null_as_default")]
    pub genres: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn series_tolerates_nulls_and_missing_fields() {
        let series: Series = serde_json::from_value(json!({
            "id": 3,
            "title": "Berserk",
            "total_volumes": null,
            "tags": null,
            "volumes": [{"id": 30, "volume_number": 1, "owned": true}, {"id": 31}]
        }))
        .unwrap();
        assert_eq!(series.total_volumes, 0);
        assert!(!series.completed);
        assert!(series.tags.is_empty());
        assert_eq!(series.owned_volumes(), 1);
        assert_eq!(series.volumes[1].volume_number, 0);
    }

    #[test]
    fn new_series_omits_unset_optionals() {
        let payload = NewSeries {
            title: "Vagabond".into(),
            total_volumes: 37,
            score: None,
            tags: None,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"title": "Vagabond", "total_volumes": 37})
        );
    }

    #[test]
    fn patch_serialises_only_set_fields() {
        let patch = SeriesPatch {
            total_volumes: Some(12),
            ..SeriesPatch::default()
        };
        assert!(!patch.is_empty());
        assert!(SeriesPatch::default().is_empty());
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"total_volumes": 12})
        );
    }
}
