use std::time::Duration;

/// Tunables for list views and the live pending-report count.
#[derive(Debug, Clone, Copy)]
pub struct DashboardConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub category_cache_ttl: Duration,
    pub count_poll_interval: Duration,
    /// How often sessions with an expired token are released.
    pub session_sweep_interval: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
            category_cache_ttl: Duration::from_secs(60),
            count_poll_interval: Duration::from_millis(2000),
            session_sweep_interval: Duration::from_secs(60),
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_page_size = super::parse_env("MAX_PAGE_SIZE", defaults.max_page_size).max(1);
        let default_page_size = super::parse_env("DEFAULT_PAGE_SIZE", defaults.default_page_size)
            .clamp(1, max_page_size);

        Self {
            default_page_size,
            max_page_size,
            category_cache_ttl: Duration::from_secs(super::parse_env(
                "CATEGORY_CACHE_TTL_SECS",
                defaults.category_cache_ttl.as_secs(),
            )),
            count_poll_interval: Duration::from_millis(
                super::parse_env("COUNT_POLL_INTERVAL_MS", 2000u64).max(100),
            ),
            session_sweep_interval: Duration::from_secs(
                super::parse_env(
                    "SESSION_SWEEP_INTERVAL_SECS",
                    defaults.session_sweep_interval.as_secs(),
                )
                .max(1),
            ),
        }
    }

    /// Page size for a request; `None` when the override is out of range.
    pub fn page_size(&self, requested: Option<usize>) -> Option<usize> {
        match requested {
            None => Some(self.default_page_size),
            Some(n) if (1..=self.max_page_size).contains(&n) => Some(n),
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_defaults_and_bounds() {
        let cfg = DashboardConfig::default();
        assert_eq!(cfg.page_size(None), Some(10));
        assert_eq!(cfg.page_size(Some(25)), Some(25));
        assert_eq!(cfg.page_size(Some(0)), None);
        assert_eq!(cfg.page_size(Some(101)), None);
    }
}
