use std::fmt;

/// The principal under authentication, as resolved by the host.
///
/// Mechanisms only ever see it through a shared reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Account {
    name: String,
}

impl Account {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Unique account name, usually an email address.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Lower-cased part after the last `@`, if any.
    pub fn domain(&self) -> Option<String> {
        self.name
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_ascii_lowercase())
            .filter(|domain| !domain.is_empty())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain() {
        assert_eq!(
            Account::new("testuser@Example.COM").domain().as_deref(),
            Some("example.com")
        );
        assert_eq!(
            Account::new("weird@name@example.org").domain().as_deref(),
            Some("example.org")
        );
        assert_eq!(Account::new("alice").domain(), None);
        assert_eq!(Account::new("alice@").domain(), None);
    }
}
