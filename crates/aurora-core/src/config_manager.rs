//! 설정 파일 관리.
//!
//! 플랫폼별 설정 디렉토리에 JSON 파일로 설정을 저장/로드한다.

use crate::config::AppConfig;
use crate::error::CoreError;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// 설정 파일 이름
const CONFIG_FILE_NAME: &str = "config.json";

/// 앱 디렉토리 이름
const APP_DIR_NAME: &str = "aurorasense";

/// 설정 관리자
///
/// 설정 파일의 로드/저장 및 런타임 설정 변경을 관리한다.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// 현재 설정 (스레드 안전)
    config: Arc<RwLock<AppConfig>>,
    /// 설정 파일 경로
    config_path: PathBuf,
}

impl ConfigManager {
    /// 새 설정 관리자 생성 및 설정 로드
    ///
    /// 설정 파일이 없으면 기본 설정을 생성하고 저장한다.
    pub fn new() -> Result<Self, CoreError> {
        let config_path = Self::default_config_path()?;
        Self::with_path(config_path)
    }

    /// 지정된 경로로 설정 관리자 생성
    pub fn with_path(config_path: PathBuf) -> Result<Self, CoreError> {
        // 설정 디렉토리 생성
        if let Some(parent) = config_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    CoreError::Config(format!(
                        "설정 디렉토리 생성 실패: {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
                info!("설정 디렉토리 생성: {}", parent.display());
            }
        }

        // 설정 파일 로드 또는 기본값 생성
        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = AppConfig::default_config();
            Self::save_to_file(&config_path, &default_config)?;
            info!("기본 설정 파일 생성: {}", config_path.display());
            default_config
        };

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// 현재 설정 반환 (복제본)
    pub fn get(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// 설정 업데이트 및 파일 저장
    pub fn update(&self, new_config: AppConfig) -> Result<(), CoreError> {
        // 메모리 업데이트
        {
            let mut config = self.config.write().unwrap();
            *config = new_config.clone();
        }

        // 파일 저장
        Self::save_to_file(&self.config_path, &new_config)?;
        debug!("설정 저장 완료: {}", self.config_path.display());

        Ok(())
    }

    /// 특정 필드만 업데이트
    pub fn update_with<F>(&self, updater: F) -> Result<AppConfig, CoreError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.get();
        updater(&mut config);
        self.update(config.clone())?;
        Ok(config)
    }

    /// 설정 파일 경로 반환
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// 설정 다시 로드
    pub fn reload(&self) -> Result<(), CoreError> {
        let config = Self::load_from_file(&self.config_path)?;
        let mut current = self.config.write().unwrap();
        *current = config;
        info!("설정 다시 로드 완료");
        Ok(())
    }

    /// 플랫폼별 기본 설정 파일 경로
    fn default_config_path() -> Result<PathBuf, CoreError> {
        let config_dir = Self::config_dir()?;
        Ok(config_dir.join(CONFIG_FILE_NAME))
    }

    /// 플랫폼별 설정 디렉토리 경로
    pub fn config_dir() -> Result<PathBuf, CoreError> {
        #[cfg(target_os = "macos")]
        {
            // macOS: ~/Library/Application Support/aurorasense/
            let home = std::env::var("HOME")
                .map_err(|_| CoreError::Config("HOME 환경 변수를 찾을 수 없습니다".to_string()))?;
            Ok(PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join(APP_DIR_NAME))
        }

        #[cfg(target_os = "windows")]
        {
            // Windows: %APPDATA%\aurorasense\
            let appdata = std::env::var("APPDATA").map_err(|_| {
                CoreError::Config("APPDATA 환경 변수를 찾을 수 없습니다".to_string())
            })?;
            Ok(PathBuf::from(appdata).join(APP_DIR_NAME))
        }

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            // Linux: $XDG_CONFIG_HOME/aurorasense/ 또는 ~/.config/aurorasense/
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                return Ok(PathBuf::from(xdg).join(APP_DIR_NAME));
            }
            let home = std::env::var("HOME")
                .map_err(|_| CoreError::Config("HOME 환경 변수를 찾을 수 없습니다".to_string()))?;
            Ok(PathBuf::from(home).join(".config").join(APP_DIR_NAME))
        }
    }

    /// 파일에서 설정 로드
    fn load_from_file(path: &PathBuf) -> Result<AppConfig, CoreError> {
        let content = fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("설정 파일 읽기 실패: {}: {}", path.display(), e)))?;
        let config: AppConfig = serde_json::from_str(&content)?;
        debug!("설정 로드 완료: {}", path.display());
        Ok(config)
    }

    /// 파일에 설정 저장
    fn save_to_file(path: &PathBuf, config: &AppConfig) -> Result<(), CoreError> {
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)
            .map_err(|e| CoreError::Config(format!("설정 파일 쓰기 실패: {}: {}", path.display(), e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_default_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let manager = ConfigManager::with_path(path.clone()).unwrap();
        assert!(path.exists());

        let config = manager.get();
        assert_eq!(config.stream.buffer_capacity, 60);
        assert_eq!(config.stream.poll_interval_secs, 5);
    }

    #[test]
    fn update_persists_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let manager = ConfigManager::with_path(path.clone()).unwrap();
        manager
            .update_with(|c| c.stream.poll_interval_secs = 10)
            .unwrap();

        // 새 관리자로 다시 로드하여 파일 반영 확인
        let reloaded = ConfigManager::with_path(path).unwrap();
        assert_eq!(reloaded.get().stream.poll_interval_secs, 10);
    }

    #[test]
    fn reload_picks_up_external_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let manager = ConfigManager::with_path(path.clone()).unwrap();

        let mut config = manager.get();
        config.server.base_url = "http://10.0.0.7:9000".to_string();
        fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        manager.reload().unwrap();
        assert_eq!(manager.get().server.base_url, "http://10.0.0.7:9000");
    }

    #[test]
    fn partial_config_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"server": {"base_url": "http://edge:8000"}}"#).unwrap();

        let manager = ConfigManager::with_path(path).unwrap();
        let config = manager.get();
        assert_eq!(config.server.base_url, "http://edge:8000");
        // 생략된 필드는 기본값
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.stream.buffer_capacity, 60);
    }
}
