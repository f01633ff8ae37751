//! 실행 설정 로드.
//!
//! 기본값 → 설정 파일 → `NCMON__` 환경변수 → 기존 배포용 환경변수 → CLI 순으로 겹친다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use directories::ProjectDirs;
use ncmon_core::config::AppConfig;
use ncmon_core::error::CoreError;
use tracing::{debug, info};

/// 환경변수 접두사 (`NCMON__FLEET__BASE_URL`)
const ENV_PREFIX: &str = "NCMON";

/// 기본 설정 디렉토리에서 찾는 파일 이름
const CONFIG_FILE_NAMES: [&str; 2] = ["ncmon.toml", "ncmon.json"];

/// 기존 배포 스크립트가 쓰던 환경변수 → 설정 키
const LEGACY_ENV: [(&str, &str); 7] = [
    ("NC_API_BASE_URL", "fleet.base_url"),
    ("NC_API_USERNAME", "fleet.username"),
    ("NC_API_PASSWORD", "fleet.password"),
    ("SHEETS_CREDENTIALS_FILE", "ledger.credentials_file"),
    ("SHEETS_SPREADSHEET_ID", "ledger.spreadsheet_id"),
    ("TESSERACT_CMD", "classifier.ocr.binary_path"),
    ("ANYDESK_AGENT", "reachability.anydesk_binary"),
];

/// CLI에서 넘어오는 덮어쓰기 값
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_file: Option<PathBuf>,
    /// `Some(true)` = `--reachability`, `Some(false)` = `--no-reachability`
    pub reachability: Option<bool>,
    pub probe_quota: Option<u32>,
    pub workers: Option<usize>,
}

/// 설정 로드 + 검증
///
/// `env`는 프로세스 환경변수 스냅샷이다 (테스트에서 주입).
pub fn load(cli: &CliOverrides, env: &HashMap<String, String>) -> Result<AppConfig, CoreError> {
    let defaults = Config::try_from(&AppConfig::default_config()).map_err(config_error)?;
    let mut builder = Config::builder().add_source(defaults);

    if let Some(path) = resolve_config_file(cli.config_file.as_deref())? {
        info!("설정 파일: {}", path.display());
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .source(Some(env.clone().into_iter().collect())),
    );

    for (var, key) in LEGACY_ENV {
        if let Some(value) = env.get(var).filter(|v| !v.is_empty()) {
            debug!("기존 환경변수 적용: {var} → {key}");
            builder = builder
                .set_override(key, value.as_str())
                .map_err(config_error)?;
        }
    }

    if let Some(enabled) = cli.reachability {
        builder = builder
            .set_override("reachability.enabled", enabled)
            .map_err(config_error)?;
    }
    if let Some(quota) = cli.probe_quota {
        builder = builder
            .set_override("reachability.probe_quota", u64::from(quota))
            .map_err(config_error)?;
    }
    if let Some(workers) = cli.workers {
        builder = builder
            .set_override("run.workers", workers as u64)
            .map_err(config_error)?;
    }

    let config: AppConfig = builder
        .build()
        .and_then(Config::try_deserialize)
        .map_err(config_error)?;
    config.validate()?;
    Ok(config)
}

/// 명시한 파일은 반드시 있어야 하고, 없으면 플랫폼 설정 디렉토리를 찾아본다
fn resolve_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>, CoreError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(CoreError::Config(format!(
                "설정 파일 없음: {}",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let Some(dirs) = ProjectDirs::from("com", "n-compass", "ncmon") else {
        return Ok(None);
    };
    Ok(CONFIG_FILE_NAMES
        .iter()
        .map(|name| dirs.config_dir().join(name))
        .find(|p| p.exists()))
}

fn config_error(err: config::ConfigError) -> CoreError {
    CoreError::Config(err.to_string())
}
