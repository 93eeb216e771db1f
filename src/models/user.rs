//! User-related models

use serde::{Deserialize, Serialize};

/// A registered user of the messenger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub phone_number: String,
}

/// Deterministic initials-identicon avatar URL for a display name.
///
/// The exact visual scheme is not load-bearing; only the derivation from
/// the name must be deterministic.
pub fn initials_avatar(name: &str) -> String {
    format!(
        "https://api.dicebear.com/8.x/initials/svg?seed={}",
        urlencoding::encode(name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initials_avatar_deterministic() {
        assert_eq!(initials_avatar("Team Rocket"), initials_avatar("Team Rocket"));
        assert!(initials_avatar("Team Rocket").ends_with("seed=Team%20Rocket"));
    }
}
