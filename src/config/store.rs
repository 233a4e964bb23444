use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the credential pair is kept. We differentiate backends via a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
pub enum StoreConfig {
    /// Credentials live only as long as the process.
    #[serde(rename = "memory")]
    Memory,
    /// Credentials are written to a JSON file and survive restarts.
    #[serde(rename = "file")]
    File(FileStoreConfig),
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct FileStoreConfig {
    pub path: String,
}
