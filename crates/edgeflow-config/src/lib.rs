pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// プロジェクトのデプロイ用ディレクトリ
pub const EDGE_DIR: &str = ".edge";
/// プロジェクト設定ファイル
pub const SETTINGS_FILE: &str = "edgeflow.yaml";

pub const PROJECT_ROOT_ENV: &str = "EDGEFLOW_PROJECT_ROOT";
pub const MANIFEST_PATH_ENV: &str = "EDGEFLOW_MANIFEST_PATH";

/// グローバル設定ディレクトリ (~/.config/edgeflow)
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("edgeflow"))
}

/// プロジェクトルートを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 EDGEFLOW_PROJECT_ROOT (直接パス指定)
/// 2. カレントディレクトリから親へ遡り、.edge/ または edgeflow.yaml を含む最初のディレクトリ
pub fn find_project_root() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(root) = std::env::var(PROJECT_ROOT_ENV) {
        let path = PathBuf::from(root);
        if path.is_dir() {
            return Ok(path);
        }
    }

    // 2. 親ディレクトリへ遡って検索
    let current_dir = std::env::current_dir()?;
    find_project_root_from(&current_dir).ok_or(ConfigError::ProjectRootNotFound)
}

fn find_project_root_from(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(EDGE_DIR).is_dir() || dir.join(SETTINGS_FILE).is_file())
        .map(Path::to_path_buf)
}

/// プロジェクト内のファイル配置
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub edge_dir: PathBuf,
    pub manifest: PathBuf,
    pub state: PathBuf,
    pub fingerprints: PathBuf,
}

impl ProjectPaths {
    /// マニフェストのパスは EDGEFLOW_MANIFEST_PATH で上書きできる
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let edge_dir = root.join(EDGE_DIR);
        let manifest = std::env::var(MANIFEST_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| edge_dir.join("manifest.json"));

        Self {
            manifest,
            state: edge_dir.join("state.json"),
            fingerprints: edge_dir.join("fingerprints.json"),
            edge_dir,
            root,
        }
    }

    /// 相対パスはプロジェクトルート基準で解決する
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// デプロイ設定 (edgeflow.yaml)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploySettings {
    /// アップロードする静的ファイルのディレクトリ
    pub static_dir: PathBuf,

    /// アップロードの並列数
    pub workers: usize,

    /// ファイルごとの最大試行回数
    pub max_attempts: u32,

    /// 不要になったリソースを削除しない
    pub skip_deletion: bool,

    /// 進捗表示を抑制する
    pub silent: bool,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            static_dir: PathBuf::from(EDGE_DIR).join("storage"),
            workers: 5,
            max_attempts: 3,
            skip_deletion: false,
            silent: false,
        }
    }
}

impl DeploySettings {
    /// 設定を読み込む
    ///
    /// 以下の優先順位:
    /// 1. <root>/edgeflow.yaml
    /// 2. ~/.config/edgeflow/edgeflow.yaml (グローバル設定)
    /// 3. デフォルト値
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let project = root.as_ref().join(SETTINGS_FILE);
        if project.is_file() {
            return Self::from_file(&project);
        }

        if let Some(config_dir) = get_config_dir() {
            let global = config_dir.join(SETTINGS_FILE);
            if global.is_file() {
                return Self::from_file(&global);
            }
        }

        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| match e {
            ConfigError::Yaml { source, .. } => ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        // 空ファイルはデフォルト扱い
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: DeploySettings =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
                path: PathBuf::from(SETTINGS_FILE),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers は 1 以上である必要があります".into()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts は 1 以上である必要があります".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    #[serial]
    fn test_find_project_root_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        // .edge/ を作成
        fs::create_dir(temp_dir.path().join(".edge")).unwrap();

        // テンポラリディレクトリに移動
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_project_root();
        assert!(result.is_ok());
        assert!(result.unwrap().join(".edge").is_dir());

        // 元のディレクトリに戻る
        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    fn test_find_project_root_from_subdirectory() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("edgeflow.yaml"), "workers: 2\n").unwrap();
        let nested = temp_dir.path().join("src/pages");
        fs::create_dir_all(&nested).unwrap();

        let root = find_project_root_from(&nested).unwrap();
        assert_eq!(root, temp_dir.path());
    }

    #[test]
    #[serial]
    fn test_find_project_root_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();

        // 環境変数を設定
        unsafe {
            std::env::set_var(PROJECT_ROOT_ENV, temp_dir.path());
        }

        let result = find_project_root().unwrap();
        assert_eq!(result, temp_dir.path());

        // クリーンアップ
        unsafe {
            std::env::remove_var(PROJECT_ROOT_ENV);
        }
    }

    #[test]
    #[serial]
    fn test_find_project_root_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        // 空のディレクトリに移動
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_project_root();
        std::env::set_current_dir(original_dir).unwrap();

        // tempdir の親にプロジェクトがある環境では見つかってしまう
        if let Err(e) = result {
            assert!(matches!(e, ConfigError::ProjectRootNotFound));
        }
    }

    #[test]
    #[serial]
    fn test_project_paths() {
        let paths = ProjectPaths::new("/work/site");
        assert_eq!(paths.manifest, PathBuf::from("/work/site/.edge/manifest.json"));
        assert_eq!(paths.state, PathBuf::from("/work/site/.edge/state.json"));
        assert_eq!(paths.fingerprints, PathBuf::from("/work/site/.edge/fingerprints.json"));
        assert_eq!(paths.resolve(".edge/storage"), PathBuf::from("/work/site/.edge/storage"));
        assert_eq!(paths.resolve("/abs/dir"), PathBuf::from("/abs/dir"));
    }

    #[test]
    #[serial]
    fn test_manifest_path_env_var() {
        unsafe {
            std::env::set_var(MANIFEST_PATH_ENV, "/tmp/custom-manifest.json");
        }

        let paths = ProjectPaths::new("/work/site");
        assert_eq!(paths.manifest, PathBuf::from("/tmp/custom-manifest.json"));

        unsafe {
            std::env::remove_var(MANIFEST_PATH_ENV);
        }
    }

    #[test]
    fn test_settings_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let settings = DeploySettings::parse("").unwrap();
        assert_eq!(settings, DeploySettings::default());
        assert_eq!(settings.static_dir, PathBuf::from(".edge/storage"));
        assert_eq!(settings.workers, 5);
        assert_eq!(settings.max_attempts, 3);

        // プロジェクト設定がなければグローバル設定かデフォルト
        assert!(DeploySettings::load(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_settings_from_project_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(
            temp_dir.path().join("edgeflow.yaml"),
            "static_dir: dist\nworkers: 8\nskip_deletion: true\n",
        )
        .unwrap();

        let settings = DeploySettings::load(temp_dir.path()).unwrap();
        assert_eq!(settings.static_dir, PathBuf::from("dist"));
        assert_eq!(settings.workers, 8);
        assert!(settings.skip_deletion);
        // 未指定の項目はデフォルト
        assert_eq!(settings.max_attempts, 3);
        assert!(!settings.silent);
    }

    #[test]
    fn test_settings_invalid() {
        assert!(matches!(
            DeploySettings::parse("workers: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DeploySettings::parse("workers: [1, 2]\n"),
            Err(ConfigError::Yaml { .. })
        ));
    }
}
