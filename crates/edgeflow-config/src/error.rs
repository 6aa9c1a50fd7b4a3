use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "プロジェクトルートが見つかりません。以下を確認してください:\n\
        - カレントディレクトリまたは親ディレクトリに .edge/ か edgeflow.yaml があること\n\
        または EDGEFLOW_PROJECT_ROOT 環境変数で直接指定できます"
    )]
    ProjectRootNotFound,

    #[error("設定ファイルの解析に失敗しました ({path}): {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("設定値が不正です: {0}")]
    Invalid(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
