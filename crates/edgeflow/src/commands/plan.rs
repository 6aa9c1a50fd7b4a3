use super::project_paths;
use anyhow::Context;
use colored::Colorize;
use edgeflow_cloud::{Action, ActionType, Manifest, Plan, StateManager};
use std::path::PathBuf;

pub async fn handle(manifest: Option<PathBuf>, skip_deletion: bool) -> anyhow::Result<()> {
    let paths = project_paths();
    let manifest_path = manifest
        .map(|p| paths.resolve(p))
        .unwrap_or_else(|| paths.manifest.clone());

    println!("{}", "デプロイ計画を作成中...".blue());
    println!(
        "マニフェスト: {}",
        manifest_path.display().to_string().cyan()
    );

    let manifest = Manifest::load(&manifest_path)
        .await
        .with_context(|| format!("マニフェストを読み込めません: {}", manifest_path.display()))?;

    let store = StateManager::with_state_dir(&paths.edge_dir);
    let mut state = store.load_or_default().await?;
    let settings = edgeflow_config::DeploySettings::load(&paths.root)?;
    if skip_deletion || settings.skip_deletion {
        state.skip_deletion = true;
    }

    let plan = Plan::compute(&manifest, &state);
    println!();
    if plan.actions.is_empty() {
        println!("{}", "マニフェストにリソースがありません".yellow());
        return Ok(());
    }

    for action in &plan.actions {
        print_action(action);
    }

    println!();
    println!("計画: {}", plan.summary().to_string().bold());

    Ok(())
}

fn print_action(action: &Action) {
    let symbol = match action.action_type {
        ActionType::Create => "+".green(),
        ActionType::Update => "~".yellow(),
        ActionType::Delete => "-".red(),
        ActionType::Skip => "=".dimmed(),
    };
    let id = action
        .remote_id
        .map(|id| format!(" (id {})", id))
        .unwrap_or_default();
    println!(
        "  {} {} {}{}",
        symbol,
        action.kind,
        action.name.cyan(),
        id.dimmed()
    );
}
