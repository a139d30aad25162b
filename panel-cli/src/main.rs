use clap::Parser;
use panel_cli::{Cli, CliApp, Commands, run_init, setup_logging};
use panel_core::error::Result;
use tracing::error;

#[tokio::main]
async fn main() {
    // 解析命令行参数
    let cli = Cli::parse();

    // 设置日志记录，guard 需要保持到退出
    let guard = setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("❌ 操作失败: {}", e);
        drop(guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // `init` 命令不需要预先加载配置
    if let Commands::Init { force } = cli.command {
        return run_init(cli.config.as_deref(), force).await;
    }

    let app = CliApp::new(cli.config.as_deref()).await?;
    app.run(cli.command).await
}
