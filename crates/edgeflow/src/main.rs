mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "edge")]
#[command(about = "マニフェストひとつで、エッジへ。", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// デプロイ計画を表示（リモートには触れない）
    Plan {
        /// マニフェストのパス（デフォルト: .edge/manifest.json）
        #[arg(short, long)]
        manifest: Option<PathBuf>,
        /// 不要になったリソースを削除しない前提で計画する
        #[arg(long)]
        skip_deletion: bool,
    },
    /// 前回のデプロイで記録された状態を表示
    Status,
    /// 前回のアップロードから変更された静的ファイルを表示
    Changes {
        /// 静的ファイルのディレクトリ（デフォルト: edgeflow.yaml の static_dir）
        #[arg(short = 'd', long)]
        static_dir: Option<PathBuf>,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt::init();

    match cli.command {
        Commands::Plan {
            manifest,
            skip_deletion,
        } => commands::plan::handle(manifest, skip_deletion).await,
        Commands::Status => commands::status::handle().await,
        Commands::Changes { static_dir } => commands::changes::handle(static_dir).await,
        Commands::Version => {
            println!("edgeflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
