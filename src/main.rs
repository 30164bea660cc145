use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use lesson_config::{AppConfig, OutputFormat};
use lesson_scheduler::{AppMode, Application, ShutdownManager};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("lesson-scheduler")
        .version(env!("CARGO_PKG_VERSION"))
        .about("课程任务延迟调度与投递系统")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，缺省时查找 config/lesson-scheduler.toml"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("运行模式")
                .value_parser(["sweeper", "api", "all"])
                .default_value("all"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"]),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("执行一次到期任务扫描后退出")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let config = AppConfig::load(config_path).context("加载配置失败")?;

    let log_level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| config.observability.log_level.to_string());
    let log_format = match matches.get_one::<String>("log-format") {
        Some(format) => format
            .parse::<OutputFormat>()
            .map_err(|e| anyhow::anyhow!(e))?,
        None => config.observability.log_format,
    };
    init_logging(&log_level, log_format)?;

    let mode_str = matches
        .get_one::<String>("mode")
        .map(String::as_str)
        .unwrap_or("all");
    let app_mode = AppMode::parse(mode_str)?;
    if app_mode == AppMode::Api && !config.api.enabled {
        return Err(anyhow::anyhow!("API模式被禁用，请检查配置"));
    }

    info!("启动课程任务调度系统");
    info!("配置文件: {}", config_path.unwrap_or("<默认>"));
    info!("运行模式: {mode_str}");

    let metrics_handle = if config.observability.metrics_enabled {
        Some(install_metrics_recorder()?)
    } else {
        None
    };

    let app = Application::new(config, app_mode, metrics_handle).await?;

    if matches.get_flag("once") {
        app.run_once().await?;
        app.database().close().await;
        return Ok(());
    }

    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let app = Arc::new(app);
        let shutdown_rx = shutdown_manager.subscribe().await;

        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown_rx).await {
                error!("应用运行失败: {e:#}");
            }
        })
    };

    wait_for_shutdown_signal().await;

    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    // 等待进行中的投递完成
    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("课程任务调度系统已退出");
    Ok(())
}

/// 初始化日志系统，`RUST_LOG` 优先于配置
fn init_logging(log_level: &str, log_format: OutputFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        OutputFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        OutputFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
    }

    Ok(())
}

fn install_metrics_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("安装Prometheus指标记录器失败")
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
