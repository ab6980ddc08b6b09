pub mod directory;
pub mod health;
pub mod resource;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}
