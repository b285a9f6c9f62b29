pub mod gourmet_data_types;
pub mod ventopay_data_types;

use std::fmt;

/// Login data kept in memory only, so an api can silently log in again.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_password() {
        let creds = Credentials::new("hans", "geheim123");
        let out = format!("{:?}", creds);
        assert!(out.contains("hans"));
        assert!(!out.contains("geheim123"));
    }
}
