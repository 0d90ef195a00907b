//! Configuration access port trait.
//!
//! Adapters supply raw values; typed reads fall back to `default` when a key
//! is missing or does not parse. Validation reports bad values before any
//! builder reads them.

pub trait ConfigPort {
    /// Raw value with surrounding whitespace removed.
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.get_string(section, key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn get_count(&self, section: &str, key: &str, default: usize) -> usize {
        self.get_string(section, key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.get_string(section, key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Accepts `true`/`yes`/`1` and `false`/`no`/`0`, case insensitive.
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.get_string(section, key)
            .as_deref()
            .and_then(parse_bool)
            .unwrap_or(default)
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
