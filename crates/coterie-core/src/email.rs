//! Email normalization and super-admin detection.
//!
//! Invitation emails are compared in normalized form everywhere: NFKC
//! unicode normalization, surrounding whitespace stripped, lowercased.
//! The same normalization is applied before storage so the database only
//! ever holds the canonical spelling.

use unicode_normalization::UnicodeNormalization;

/// Normalizes an email address by applying NFKC unicode normalization,
/// trimming surrounding whitespace and lowercasing.
#[must_use]
pub fn normalize_email_address(email: &str) -> String {
    email.nfkc().collect::<String>().trim().to_lowercase()
}

/// The set of protected super-admin email addresses.
///
/// Invitations whose controlling email resolves to one of these accounts
/// must never be modified or deleted through the invitation lifecycle.
#[derive(Debug, Clone, Default)]
pub struct SuperAdmins {
    emails: Vec<String>,
}

impl SuperAdmins {
    /// Builds the set, normalizing every entry.
    #[must_use]
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|e| normalize_email_address(e.as_ref()))
                .collect(),
        }
    }

    /// Whether the given email belongs to a protected super-admin account.
    /// The input is normalized before comparison.
    #[must_use]
    pub fn is_super_admin(&self, email: &str) -> bool {
        let normalized = normalize_email_address(email);
        self.emails.iter().any(|e| *e == normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases() {
        assert_eq!(normalize_email_address("Bob@Example.COM"), "bob@example.com");
    }

    #[test]
    fn test_normalize_trims_whitespace() {
        assert_eq!(
            normalize_email_address("  bob@example.com \n"),
            "bob@example.com"
        );
    }

    #[test]
    fn test_normalize_applies_nfkc() {
        // U+FF41 FULLWIDTH LATIN SMALL LETTER A normalizes to 'a'
        assert_eq!(normalize_email_address("\u{ff41}@example.com"), "a@example.com");
        // Ligature ﬁ (U+FB01) decomposes to "fi"
        assert_eq!(
            normalize_email_address("\u{fb01}ona@example.com"),
            "fiona@example.com"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_email_address(" Alice@Example.com ");
        let twice = normalize_email_address(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_super_admin_matches_normalized_forms() {
        let admins = SuperAdmins::new(["Root@Coterie.dev"]);
        assert!(admins.is_super_admin("root@coterie.dev"));
        assert!(admins.is_super_admin("  ROOT@coterie.DEV "));
        assert!(!admins.is_super_admin("other@coterie.dev"));
    }

    #[test]
    fn test_super_admin_empty_set() {
        let admins = SuperAdmins::default();
        assert!(!admins.is_super_admin("anyone@example.com"));
    }
}
