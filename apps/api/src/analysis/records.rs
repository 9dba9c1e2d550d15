//! Canonical analysis records and the output schemas enforced on the model.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::analysis::normalizer::{list_field, string_field, CanonicalRecord};

/// Canonical CV analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvAnalysis {
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
}

impl CanonicalRecord for CvAnalysis {
    fn from_mapping(map: &Map<String, Value>) -> Self {
        CvAnalysis {
            summary: string_field(map, "summary"),
            strengths: list_field(map, "strengths"),
            weaknesses: list_field(map, "weaknesses"),
            suggestions: list_field(map, "suggestions"),
        }
    }

    fn schema() -> Value {
        object_schema(
            "cv_analysis",
            &["summary"],
            &["strengths", "weaknesses", "suggestions"],
        )
    }

    fn has_content(&self) -> bool {
        !self.summary.trim().is_empty()
            || !self.strengths.is_empty()
            || !self.weaknesses.is_empty()
            || !self.suggestions.is_empty()
    }
}

/// Canonical job-offer analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferAnalysis {
    pub summary: String,
    pub tech_stack: Vec<String>,
    pub keywords: Vec<String>,
    pub seniority_level: String,
}

impl CanonicalRecord for OfferAnalysis {
    fn from_mapping(map: &Map<String, Value>) -> Self {
        OfferAnalysis {
            summary: string_field(map, "summary"),
            tech_stack: list_field(map, "tech_stack"),
            keywords: list_field(map, "keywords"),
            seniority_level: string_field(map, "seniority_level"),
        }
    }

    fn schema() -> Value {
        object_schema(
            "offer_analysis",
            &["summary", "seniority_level"],
            &["tech_stack", "keywords"],
        )
    }

    fn has_content(&self) -> bool {
        !self.summary.trim().is_empty()
    }
}

/// Strict object schema with string and string-array properties, in key order.
fn object_schema(title: &str, strings: &[&str], lists: &[&str]) -> Value {
    let mut properties = Map::new();
    for key in strings {
        properties.insert(key.to_string(), json!({"type": "string"}));
    }
    for key in lists {
        properties.insert(
            key.to_string(),
            json!({"type": "array", "items": {"type": "string"}}),
        );
    }
    let required: Vec<&str> = strings.iter().chain(lists.iter()).copied().collect();

    json!({
        "title": title,
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}
