use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{validate_tier, UnknownVariant, ValidationError, DEFAULT_TIER};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Addon {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub addon_type: String,
    pub tier: String,
    pub storage: String,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddonType {
    Mysql,
    Postgresql,
    Redis,
    Mongodb,
    Kafka,
    Rabbitmq,
}

impl AddonType {
    pub const ALL: [AddonType; 6] = [
        AddonType::Mysql,
        AddonType::Postgresql,
        AddonType::Redis,
        AddonType::Mongodb,
        AddonType::Kafka,
        AddonType::Rabbitmq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AddonType::Mysql => "mysql",
            AddonType::Postgresql => "postgresql",
            AddonType::Redis => "redis",
            AddonType::Mongodb => "mongodb",
            AddonType::Kafka => "kafka",
            AddonType::Rabbitmq => "rabbitmq",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AddonType::Mysql => "MySQL Database",
            AddonType::Postgresql => "PostgreSQL Database",
            AddonType::Redis => "Redis Cache",
            AddonType::Mongodb => "MongoDB",
            AddonType::Kafka => "Apache Kafka",
            AddonType::Rabbitmq => "RabbitMQ",
        }
    }

    /// Volume size the dashboard proposes for a new addon of this type
    pub fn default_storage(&self) -> &'static str {
        match self {
            AddonType::Mysql | AddonType::Rabbitmq => "20Gi",
            AddonType::Postgresql | AddonType::Mongodb => "50Gi",
            AddonType::Redis => "10Gi",
            AddonType::Kafka => "100Gi",
        }
    }
}

impl fmt::Display for AddonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddonType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        AddonType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| UnknownVariant::new("addon type", s))
    }
}

/// Body for creating or updating an addon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddonRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub addon_type: AddonType,
    pub tier: String,
    pub storage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

impl AddonRequest {
    pub fn new(name: impl Into<String>, addon_type: AddonType) -> Self {
        Self {
            name: name.into(),
            addon_type,
            tier: DEFAULT_TIER.to_string(),
            storage: addon_type.default_storage().to_string(),
            config: None,
        }
    }

    pub fn with_tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = tier.into();
        self
    }

    pub fn with_storage(mut self, storage: impl Into<String>) -> Self {
        self.storage = storage.into();
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName("Addon"));
        }
        validate_tier(&self.tier)?;
        if self.storage.trim().is_empty() {
            return Err(ValidationError::EmptyStorage);
        }
        Ok(())
    }
}
