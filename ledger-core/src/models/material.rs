use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked supply item (cement, rebar, ...) with its unit of measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub id: i64,
    pub name: String,
    pub unit: String,
    pub created_at: DateTime<Utc>,
}

/// For creating new materials (no id or timestamps)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMaterial {
    pub name: String,
    pub unit: String,
}
