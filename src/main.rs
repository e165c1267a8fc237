use std::path::PathBuf;

use anyhow::Result;
use mcq_grader_client::utils::logging;
use mcq_grader_client::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置：命令行参数或 GRADER_CONFIG 指定配置文件，否则只用环境变量
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GRADER_CONFIG").ok())
        .map(PathBuf::from);
    let config = match config_path {
        Some(path) => Config::load(&path)?,
        None => Config::from_env()?,
    };

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
