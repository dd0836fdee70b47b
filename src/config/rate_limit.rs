use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub per_second: u64,
    pub burst_size: u32,
}

impl RateLimitRule {
    const fn new(per_second: u64, burst_size: u32) -> Self {
        Self {
            per_second,
            burst_size,
        }
    }
}

/// Per route group limits: sign-in endpoints, dashboard reads and admin
/// mutations.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub auth: RateLimitRule,
    pub read: RateLimitRule,
    pub mutation: RateLimitRule,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth: RateLimitRule::new(5, 10),
            read: RateLimitRule::new(30, 60),
            mutation: RateLimitRule::new(10, 20),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.enabled = super::parse_bool_env("RATE_LIMIT_ENABLED", cfg.enabled);

        if let Ok(raw) = env::var("RATE_LIMIT_CONFIG") {
            match parse_rate_limit_config(&raw) {
                Ok(overrides) => cfg.apply(overrides),
                Err(err) => {
                    tracing::warn!("Invalid RATE_LIMIT_CONFIG '{}': {}", raw, err);
                }
            }
        }

        cfg
    }

    fn apply(&mut self, overrides: Vec<(Group, RateLimitRule)>) {
        for (group, rule) in overrides {
            match group {
                Group::All => {
                    self.auth = rule;
                    self.read = rule;
                    self.mutation = rule;
                }
                Group::Auth => self.auth = rule,
                Group::Read => self.read = rule,
                Group::Mutation => self.mutation = rule,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    All,
    Auth,
    Read,
    Mutation,
}

impl Group {
    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "auth" => Some(Group::Auth),
            "read" | "views" => Some(Group::Read),
            "mutation" | "mutations" | "write" => Some(Group::Mutation),
            _ => None,
        }
    }
}

/// Accepts either a single `per:burst` rule for every group, or a list like
/// `auth=5:10,read=30:60,mutation=10:20`.
fn parse_rate_limit_config(raw: &str) -> Result<Vec<(Group, RateLimitRule)>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty value".to_string());
    }

    if !trimmed.contains('=') {
        return Ok(vec![(Group::All, parse_rule(trimmed)?)]);
    }

    trimmed
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (name, raw_rule) = item
                .split_once('=')
                .ok_or_else(|| format!("invalid item '{}', expected name=per:burst", item))?;
            let group = Group::parse(name).ok_or_else(|| {
                format!(
                    "unknown group '{}', expected auth/read/mutation",
                    name.trim()
                )
            })?;
            Ok((group, parse_rule(raw_rule.trim())?))
        })
        .collect()
}

fn parse_rule(raw: &str) -> Result<RateLimitRule, String> {
    let (per_second_raw, burst_raw) = raw
        .split_once(':')
        .ok_or_else(|| format!("invalid rule '{}', expected per:burst", raw))?;

    let per_second: u64 = per_second_raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid per_second '{}'", per_second_raw.trim()))?;
    let burst_size: u32 = burst_raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid burst_size '{}'", burst_raw.trim()))?;

    if per_second == 0 || burst_size == 0 {
        return Err("per_second and burst_size must be > 0".to_string());
    }

    Ok(RateLimitRule::new(per_second, burst_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_rule_applies_to_every_group() {
        let mut cfg = RateLimitConfig::default();
        cfg.apply(parse_rate_limit_config("12:24").unwrap());
        assert_eq!(cfg.auth, RateLimitRule::new(12, 24));
        assert_eq!(cfg.read, RateLimitRule::new(12, 24));
        assert_eq!(cfg.mutation, RateLimitRule::new(12, 24));
    }

    #[test]
    fn grouped_rules_override_only_their_group() {
        let mut cfg = RateLimitConfig::default();
        cfg.apply(parse_rate_limit_config("auth=1:2, views=3:4").unwrap());
        assert_eq!(cfg.auth, RateLimitRule::new(1, 2));
        assert_eq!(cfg.read, RateLimitRule::new(3, 4));
        assert_eq!(cfg.mutation, RateLimitConfig::default().mutation);
    }

    #[test]
    fn unknown_group_is_rejected() {
        let err = parse_rate_limit_config("forums=1:2").unwrap_err();
        assert!(err.contains("unknown group"));
    }

    #[test]
    fn zero_rule_is_rejected() {
        assert!(parse_rate_limit_config("0:5").is_err());
        assert!(parse_rate_limit_config("auth=abc").is_err());
    }
}
