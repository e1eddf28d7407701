//! 配置文件读写与带注释生成。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FILE_NAME: &str = "config.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid yaml at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("validation error: {0}")]
    Validation(String),
}

/// 运行配置。文件里缺失的字段用默认值补齐。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tlds: bool,
    pub offset: usize,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub output_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tlds: false,
            offset: 0,
            request_timeout_secs: 15,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36".to_string(),
            output_dir: "downloads".to_string(),
        }
    }
}

// 生成配置文件时每个字段前写一行注释
const FIELDS: &[(&str, &str)] = &[
    ("tlds", "接受任意 bunkr 顶级域名（默认仅匹配内置域名列表）"),
    ("offset", "解析相册时跳过开头的条目数"),
    ("request_timeout_secs", "单次 HTTP 请求超时（秒）"),
    ("user_agent", "请求使用的 User-Agent"),
    ("output_dir", "下载文件的保存目录"),
];

/// 从 base_dir（缺省为当前目录）读取配置；文件不存在时写出带注释的默认配置。
pub fn load_or_create(base_dir: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match base_dir {
        Some(dir) => dir.join(FILE_NAME),
        None => PathBuf::from(FILE_NAME),
    };
    ensure_parent(&path)?;

    if !path.exists() {
        let config = Config::default();
        let yaml = generate_yaml_with_comments(&config)?;
        fs::write(&path, yaml).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        return Ok(config);
    }

    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })
}

fn generate_yaml_with_comments(config: &Config) -> Result<String, ConfigError> {
    let value =
        serde_yaml::to_value(config).map_err(|err| ConfigError::Validation(err.to_string()))?;
    let serde_yaml::Value::Mapping(mapping) = value else {
        return Err(ConfigError::Validation(
            "config must serialize to a mapping".to_string(),
        ));
    };

    let mut lines = Vec::new();
    for (name, description) in FIELDS {
        lines.push(format!("# {description}"));
        let key = serde_yaml::Value::String((*name).to_string());
        let val = mapping.get(&key).cloned().unwrap_or(serde_yaml::Value::Null);
        let yaml_line = serde_yaml::to_string(&serde_yaml::Mapping::from_iter([(key, val)]))
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        lines.push(yaml_line.trim().to_string());
    }

    Ok(lines.join("\n") + "\n")
}

fn ensure_parent(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}
