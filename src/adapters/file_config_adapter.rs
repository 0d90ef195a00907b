//! INI file configuration adapter.

use crate::domain::error::TrendfolioError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TrendfolioError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| TrendfolioError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, TrendfolioError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| TrendfolioError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    /// Drop a trailing `; comment` or `# comment` preceded by whitespace.
    fn strip_inline_comment(value: &str) -> &str {
        let cut = value
            .char_indices()
            .find(|&(i, c)| {
                (c == ';' || c == '#')
                    && value[..i].ends_with(char::is_whitespace)
            })
            .map_or(value.len(), |(i, _)| i);
        value[..cut].trim()
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| Self::strip_inline_comment(&v).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[backtest]
codes = QQQ,TSLA
data_dir = data/cache

[strategy]
rule = ma_regime
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("backtest", "codes"),
            Some("QQQ,TSLA".to_string())
        );
        assert_eq!(
            adapter.get_string("backtest", "data_dir"),
            Some("data/cache".to_string())
        );
        assert_eq!(
            adapter.get_string("strategy", "rule"),
            Some("ma_regime".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[backtest]\ninitial_capital = 100\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn inline_comments_are_stripped() {
        let adapter = FileConfigAdapter::from_string(
            "[backtest]\nstart_date = 2015-01-01   ; optional\nwarmup = 200 # bars\n",
        )
        .unwrap();
        assert_eq!(
            adapter.get_string("backtest", "start_date"),
            Some("2015-01-01".to_string())
        );
        assert_eq!(adapter.get_int("backtest", "warmup", 0), 200);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter = FileConfigAdapter::from_string("[backtest]\nwarmup = 150\nbad = abc\n").unwrap();
        assert_eq!(adapter.get_int("backtest", "warmup", 0), 150);
        assert_eq!(adapter.get_int("backtest", "bad", 42), 42);
        assert_eq!(adapter.get_int("backtest", "missing", 7), 7);
    }

    #[test]
    fn get_count_rejects_negative_values() {
        let adapter = FileConfigAdapter::from_string("[report]\nlog_limit = 25\nbad = -3\n").unwrap();
        assert_eq!(adapter.get_count("report", "log_limit", 80), 25);
        assert_eq!(adapter.get_count("report", "bad", 80), 80);
    }

    #[test]
    fn get_double_returns_value_or_default() {
        let adapter =
            FileConfigAdapter::from_string("[risk]\ntranche_fraction = 0.05\nbad = lots\n").unwrap();
        assert_eq!(adapter.get_double("risk", "tranche_fraction", 0.0), 0.05);
        assert_eq!(adapter.get_double("risk", "bad", 99.9), 99.9);
        assert_eq!(adapter.get_double("risk", "missing", 0.2), 0.2);
    }

    #[test]
    fn get_bool_values() {
        let adapter = FileConfigAdapter::from_string(
            "[report]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\n",
        )
        .unwrap();
        assert!(adapter.get_bool("report", "a", false));
        assert!(adapter.get_bool("report", "b", false));
        assert!(adapter.get_bool("report", "c", false));
        assert!(!adapter.get_bool("report", "d", true));
        assert!(!adapter.get_bool("report", "e", true));
        assert!(!adapter.get_bool("report", "f", true));
        assert!(adapter.get_bool("report", "missing", true));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[report]\nlog_path = out/portfolio.log\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("report", "log_path"),
            Some("out/portfolio.log".to_string())
        );
    }

    #[test]
    fn from_file_missing_file_is_config_parse_error() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(matches!(result, Err(TrendfolioError::ConfigParse { file, .. }) if file.contains("config.ini")));
    }
}
