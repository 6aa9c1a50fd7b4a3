use super::project_paths;
use colored::Colorize;
use edgeflow_cloud::{CloudError, StateManager};

pub async fn handle() -> anyhow::Result<()> {
    let paths = project_paths();
    let store = StateManager::with_state_dir(&paths.edge_dir);

    let state = match store.load().await {
        Ok(state) => state,
        Err(CloudError::StateNotFound(_)) => {
            println!("{}", "まだデプロイされていません".yellow());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", "デプロイ状態".bold());
    println!("  更新日時: {}", state.updated_at.to_rfc3339());
    if state.application.id != 0 {
        println!(
            "  アプリケーション: {} (id {})",
            state.application.name.cyan(),
            state.application.id
        );
    }
    if state.workload.id != 0 {
        println!(
            "  ワークロード: {} (id {})",
            state.workload.name.cyan(),
            state.workload.id
        );
        for domain in state.workload.all_domains() {
            println!("    - https://{}", domain);
        }
    }
    if !state.bucket.is_empty() {
        println!("  バケット: {}/{}", state.bucket.cyan(), state.prefix);
    }
    if state.function.id != 0 {
        println!(
            "  ファンクション: {} (id {}, instance {})",
            state.function.name.cyan(),
            state.function.id,
            state.function.instance_id
        );
    }

    println!("  オリジン: {}個", state.origins.len());
    println!("  キャッシュ設定: {}個", state.cache_settings.len());
    println!("  ルール: {}個", state.rules.len());
    println!("  コネクタ: {}個", state.connectors.len());

    if !state.not_first_run {
        println!();
        println!("{}", "⚠ 初回デプロイが完了していません".yellow());
    }
    if state.skip_deletion {
        println!("{}", "不要リソースの削除は無効です".dimmed());
    }

    Ok(())
}
