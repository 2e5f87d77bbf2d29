use serde::{Deserialize, Serialize};

/// Server-issued user identifier
pub type UserId = u64;

/// An entry from the assignee directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Initials shown in narrow assignee columns ("Ada Lovelace" → "AL")
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|w| w.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initials_from_names() {
        assert_eq!(initials("Ada Lovelace"), "AL");
        assert_eq!(initials("grace"), "G");
        assert_eq!(initials("  "), "");
        assert_eq!(initials("Jean Baptiste Joseph Fourier"), "JB");
    }
}
