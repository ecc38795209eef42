use std::env;

/// Default number of items requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Prefix prepended to every table name (default: "")
    pub table_prefix: String,
    /// Maximum items requested per query or scan page (default: 100)
    pub page_size: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TABLEKIT_TABLE_PREFIX` - Table name prefix (default: "")
    /// - `TABLEKIT_PAGE_SIZE` - Items per page (default: 100)
    pub fn from_env() -> Self {
        Self {
            table_prefix: env::var("TABLEKIT_TABLE_PREFIX").unwrap_or_default(),
            page_size: env::var("TABLEKIT_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.table_prefix, "");
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_builders() {
        let config = Config::default().with_prefix("test").with_page_size(0);
        assert_eq!(config.table_prefix, "test");
        assert_eq!(config.page_size, 1);
    }
}
