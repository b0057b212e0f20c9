use file_locker::{
    config::{AppConfig, LogConfig, DEFAULT_CONFIG_PATH},
    logging, server, AppState,
};
use tracing::info;

/// 配置文件路径，可通过环境变量 FILE_LOCKER_CONFIG 覆盖
fn config_path() -> String {
    std::env::var("FILE_LOCKER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

/// 加载日志配置
///
/// 尝试从配置文件加载，失败时返回默认配置
async fn load_log_config(config_path: &str) -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(config_path).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }

    LogConfig::default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = config_path();

    // 日志先于其他组件初始化（必须保持 _log_guard 存活）
    let log_config = load_log_config(&config_path).await;
    let _log_guard = logging::init_logging(&log_config);

    info!("File Locker v{} 启动中...", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_or_default(&config_path).await?;
    let addr = config.bind_addr();
    info!(
        "存储目录: users={:?}, accounts={:?}, activity={:?}",
        config.storage.users_dir, config.storage.accounts_dir, config.storage.activity_dir
    );

    let app_state = AppState::from_config(config)?;
    info!("应用状态初始化完成");

    let app = server::build_router(app_state);

    info!("服务器启动在: http://{}", addr);
    info!("健康检查: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("服务器错误: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到 Ctrl+C，开始关闭...");
        }
    }

    info!("应用已安全退出");
    Ok(())
}
