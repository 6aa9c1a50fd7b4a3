pub mod changes;
pub mod plan;
pub mod status;

use colored::Colorize;
use edgeflow_config::ProjectPaths;

/// プロジェクトルートを検出し、見つからなければ終了する
pub(crate) fn project_paths() -> ProjectPaths {
    match edgeflow_config::find_project_root() {
        Ok(root) => {
            tracing::debug!("project root: {}", root.display());
            ProjectPaths::new(root)
        }
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ プロジェクトルートが見つかりません".red().bold());
            eprintln!("  {}", e);
            eprintln!();
            eprintln!(".edge/ または edgeflow.yaml が存在するディレクトリで実行してください");
            std::process::exit(1);
        }
    }
}
