use serde::{Deserialize, Serialize};
use std::fmt;

/// The three independent document collections of the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Services,
    Reviews,
    FoodList,
}

impl Collection {
    /// Default name of the backing table
    pub fn default_table_name(&self) -> &'static str {
        match self {
            Collection::Services => "services",
            Collection::Reviews => "review",
            Collection::FoodList => "foodList",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Services => write!(f, "services"),
            Collection::Reviews => write!(f, "reviews"),
            Collection::FoodList => write!(f, "food_list"),
        }
    }
}

/// Which document store implementation backs the repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    DynamoDb,
    Memory,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::DynamoDb => write!(f, "dynamodb"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}
