//! Configuration loader with environment variable expansion

use super::{expand_env_vars, Config, ConfigError};
use serde::Deserialize;
use std::path::Path;

/// Top-level layout shared by both formats: every key lives under `config`.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    config: Config,
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `[config]` section, `key = value` pairs
    Ini,
    /// `config:` mapping
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from the file extension; anything that is not YAML is
    /// read as INI.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Ini,
        }
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::load_str(&content, ConfigFormat::from_path(path))
    }

    /// Parse and validate configuration text
    pub fn load_str(content: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
        let file: ConfigFile = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(&expand_env_vars(content))?,
            ConfigFormat::Ini => config::Config::builder()
                .add_source(config::File::from_str(
                    &expand_env_vars(&lowercase_ini_keys(content)),
                    config::FileFormat::Ini,
                ))
                .build()?
                .try_deserialize()?,
        };
        file.config.validate()?;
        Ok(file.config)
    }
}

/// Lowercase INI option names; section names and values are left alone.
fn lowercase_ini_keys(content: &str) -> String {
    content
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with(['[', ';', '#']) {
                return line.to_string();
            }
            match line.find(['=', ':']) {
                Some(split) => format!("{}{}", line[..split].to_lowercase(), &line[split..]),
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_expand_env_vars() {
        std::env::set_var("S3UPLOAD_TEST_VAR", "test_value");
        let content = "key: ${S3UPLOAD_TEST_VAR}";
        let expanded = expand_env_vars(content);
        assert_eq!(expanded, "key: test_value");
        std::env::remove_var("S3UPLOAD_TEST_VAR");
    }

    #[test]
    #[serial]
    fn test_expand_env_vars_default() {
        std::env::remove_var("S3UPLOAD_MISSING_VAR");
        assert_eq!(expand_env_vars("${S3UPLOAD_MISSING_VAR:-fallback}"), "fallback");
        assert_eq!(
            expand_env_vars("${S3UPLOAD_MISSING_VAR}"),
            "${S3UPLOAD_MISSING_VAR}"
        );
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.YML")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.ini")), ConfigFormat::Ini);
        assert_eq!(ConfigFormat::from_path(Path::new("upload.conf")), ConfigFormat::Ini);
        assert_eq!(ConfigFormat::from_path(Path::new("script")), ConfigFormat::Ini);
    }

    #[test]
    fn test_load_ini_with_defaults() {
        let content = "[config]\nsource_path = /data\ns3_bucket = mybucket\n";
        let config = ConfigLoader::load_str(content, ConfigFormat::Ini).unwrap();
        assert_eq!(config.source_path, Path::new("/data"));
        assert_eq!(config.s3_bucket, "mybucket");
        assert_eq!(config.s3_prefix, "");
        assert_eq!(config.num_threads, 10);
        assert_eq!(config.trigger_pattern(), None);
    }

    #[test]
    fn test_lowercase_ini_keys() {
        let content = "[config]\nSOURCE_PATH = /Data/Mixed\n; Comment = Kept\nS3_Bucket: MyBucket\n";
        assert_eq!(
            lowercase_ini_keys(content),
            "[config]\nsource_path = /Data/Mixed\n; Comment = Kept\ns3_bucket: MyBucket"
        );
    }

    #[test]
    fn test_load_ini_uppercase_keys() {
        let content = "[config]\nSOURCE_PATH = /Data\nS3_BUCKET = MyBucket\nNum_Threads = 3\n";
        let config = ConfigLoader::load_str(content, ConfigFormat::Ini).unwrap();
        assert_eq!(config.source_path, Path::new("/Data"));
        assert_eq!(config.s3_bucket, "MyBucket");
        assert_eq!(config.num_threads, 3);
    }
}
