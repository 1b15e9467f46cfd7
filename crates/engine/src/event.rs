//! Mutation events pushed by the entity source.

use serde::{Deserialize, Serialize};
use toprank_core::{EntityId, ScoredEntity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MutationEvent {
    /// A new entity was created in `category`.
    Inserted {
        category: String,
        entity: ScoredEntity,
    },
    /// The rating changed to an absolute value.
    PrimaryChanged {
        category: String,
        id: EntityId,
        value: f64,
    },
    /// The popularity counter changed to an absolute value.
    SecondaryChanged {
        category: String,
        id: EntityId,
        value: u64,
    },
    /// One more visit.
    Visited { category: String, id: EntityId },
    Deleted { category: String, id: EntityId },
}

impl MutationEvent {
    pub fn category(&self) -> &str {
        match self {
            Self::Inserted { category, .. }
            | Self::PrimaryChanged { category, .. }
            | Self::SecondaryChanged { category, .. }
            | Self::Visited { category, .. }
            | Self::Deleted { category, .. } => category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_kind() {
        let json = serde_json::to_value(MutationEvent::Visited {
            category: "museum".into(),
            id: 4,
        })
        .unwrap();

        assert_eq!(
            json,
            serde_json::json!({"kind": "visited", "category": "museum", "id": 4})
        );
    }

    #[test]
    fn inserted_event_parses() {
        let event: MutationEvent = serde_json::from_str(
            r#"{"kind":"inserted","category":"park","entity":{"id":1,"primaryScore":4.5,"secondaryScore":10}}"#,
        )
        .unwrap();

        assert_eq!(event.category(), "park");
        assert_eq!(
            event,
            MutationEvent::Inserted {
                category: "park".into(),
                entity: ScoredEntity::new(1, 4.5, 10),
            }
        );
    }
}
