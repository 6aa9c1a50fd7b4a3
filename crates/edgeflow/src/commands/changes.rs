use super::project_paths;
use colored::Colorize;
use edgeflow_cloud::upload::scan;
use edgeflow_cloud::{FingerprintDiff, FingerprintStore};
use edgeflow_config::DeploySettings;
use std::path::PathBuf;

pub async fn handle(static_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let paths = project_paths();
    let static_dir = match static_dir {
        Some(dir) => paths.resolve(dir),
        None => paths.resolve(DeploySettings::load(&paths.root)?.static_dir),
    };

    if !static_dir.is_dir() {
        anyhow::bail!(
            "静的ファイルのディレクトリが見つかりません: {}",
            static_dir.display()
        );
    }

    println!(
        "静的ファイル: {}",
        static_dir.display().to_string().cyan()
    );

    let dir = static_dir.clone();
    let scan = tokio::task::spawn_blocking(move || scan(&dir)).await??;

    let store = FingerprintStore::new(&paths.fingerprints);
    let Some(previous) = store.load().await? else {
        println!(
            "{}",
            format!(
                "前回のアップロード記録がありません。{}個のファイルすべてが対象です（全ドメインをパージ）",
                scan.fingerprints.len()
            )
            .yellow()
        );
        return Ok(());
    };

    let diff = FingerprintDiff::compute(&previous, &scan.fingerprints);
    if diff.is_empty() {
        println!("{}", "✓ 変更はありません".green());
        return Ok(());
    }

    for name in &diff.changed {
        println!("  {} {}", "~".yellow(), name);
    }
    for name in &diff.added {
        println!("  {} {}", "+".green(), name);
    }
    for name in &diff.removed {
        println!("  {} {}", "-".red(), name);
    }

    println!();
    println!(
        "変更 {}個, 追加 {}個, 削除 {}個（パージ対象は変更分のみ）",
        diff.changed.len(),
        diff.added.len(),
        diff.removed.len()
    );

    Ok(())
}
