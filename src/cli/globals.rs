use secrecy::SecretString;

use crate::firebase::{DEFAULT_AUTH_URL, DEFAULT_FIRESTORE_URL};

#[derive(Clone)]
pub struct GlobalArgs {
    pub api_key: SecretString,
    pub project_id: String,
    pub auth_url: String,
    pub firestore_url: String,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(project_id: String) -> Self {
        Self {
            api_key: SecretString::default(),
            project_id,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            firestore_url: DEFAULT_FIRESTORE_URL.to_string(),
        }
    }

    pub fn set_api_key(&mut self, api_key: SecretString) {
        self.api_key = api_key;
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("api_key", &"***")
            .field("project_id", &self.project_id)
            .field("auth_url", &self.auth_url)
            .field("firestore_url", &self.firestore_url)
            .finish()
    }
}
