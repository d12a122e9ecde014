use serde::{Deserialize, Serialize};

/// Access token obtained by `login`
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Session {
    pub email: String,
    pub token: String,
}
