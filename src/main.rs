use anyhow::Result;
use clap::Parser;

use paper_builder::cli::Cli;
use paper_builder::utils::logging;
use paper_builder::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env(),
    };

    // 初始化日志
    logging::init(cli.verbose || config.verbose_logging);

    // 初始化并运行应用
    App::initialize(config).await?.run(cli).await?;

    Ok(())
}
