use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use lesson_api::create_app;
use lesson_config::{AppConfig, JobScheduleConfig};
use lesson_dispatcher::{
    BatchJob, CronScheduler, DeliveryContext, DueTaskSweeper, HandlerRegistry,
    LessonTopicBroadcastJob, LessonTopicClearingJob, ScheduledTaskController,
};
use lesson_domain::ports::{DocumentRenderer, MailDispatcher};
use lesson_domain::value_objects::SweepReport;
use lesson_infrastructure::{
    timeout_handler::TimeoutConfig, DatabaseManager, HttpDocumentRenderer, MetricsCollector,
    SmtpMailDispatcher, SqliteScheduledTaskRepository, SqliteStudentRepository,
    SqliteTestRepository, TimeoutHandler, TracingDeliveryObserver,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::{net::TcpListener, sync::broadcast, time::MissedTickBehavior};
use tracing::{error, info, warn};

/// 应用运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 到期任务扫描和每周批量任务
    Sweeper,
    /// 仅运行API服务器
    Api,
    /// 运行所有组件
    All,
}

impl AppMode {
    pub fn parse(mode: &str) -> Result<Self> {
        match mode {
            "sweeper" => Ok(AppMode::Sweeper),
            "api" => Ok(AppMode::Api),
            "all" => Ok(AppMode::All),
            _ => Err(anyhow::anyhow!("不支持的运行模式: {mode}")),
        }
    }
}

/// 外部投递依赖，测试中可替换为内存实现
pub struct DeliveryBackends {
    pub mailer: Arc<dyn MailDispatcher>,
    pub renderer: Option<Arc<dyn DocumentRenderer>>,
}

impl DeliveryBackends {
    /// 根据配置创建 SMTP 发送器和（可选的）文档渲染服务
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mailer = SmtpMailDispatcher::new(&config.mail).context("创建SMTP发送器失败")?;
        let renderer = if config.renderer.enabled {
            let renderer =
                HttpDocumentRenderer::new(&config.renderer).context("创建文档渲染客户端失败")?;
            Some(Arc::new(renderer) as Arc<dyn DocumentRenderer>)
        } else {
            info!("文档渲染服务未启用，邮件将不带附件");
            None
        };
        Ok(Self {
            mailer: Arc::new(mailer),
            renderer,
        })
    }
}

/// 主应用程序
#[derive(Clone)]
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    database: Arc<DatabaseManager>,
    controller: Arc<ScheduledTaskController>,
    sweeper: Arc<DueTaskSweeper>,
    broadcast_job: Arc<dyn BatchJob>,
    clearing_job: Arc<dyn BatchJob>,
    metrics_handle: Option<PrometheusHandle>,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(
        config: AppConfig,
        mode: AppMode,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Result<Self> {
        let backends = DeliveryBackends::from_config(&config)?;
        Self::with_backends(config, mode, backends, metrics_handle).await
    }

    pub async fn with_backends(
        config: AppConfig,
        mode: AppMode,
        backends: DeliveryBackends,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);

        let database = DatabaseManager::new(&config.database)
            .await
            .context("连接数据库失败")?;
        let pool = database.pool().clone();

        let metrics = MetricsCollector::new();
        let observer = Arc::new(TracingDeliveryObserver::new(metrics.clone()));

        let timeouts = TimeoutHandler::new(TimeoutConfig::from_configs(
            &config.renderer,
            &config.mail,
        ));
        let mut context =
            DeliveryContext::new(backends.mailer, observer.clone()).with_timeouts(timeouts);
        if let Some(renderer) = backends.renderer {
            context = context.with_renderer(renderer);
        }

        let tasks = Arc::new(SqliteScheduledTaskRepository::new(pool.clone()));
        let students = Arc::new(SqliteStudentRepository::new(pool.clone()));
        let tests = Arc::new(SqliteTestRepository::new(pool));

        let controller = Arc::new(ScheduledTaskController::new(
            tasks.clone(),
            Arc::new(metrics),
        ));
        let sweeper = Arc::new(
            DueTaskSweeper::new(
                tasks,
                tests,
                HandlerRegistry::standard(context.clone()),
                observer,
            )
            .with_max_concurrent(config.sweeper.max_concurrent_deliveries),
        );
        let broadcast_job: Arc<dyn BatchJob> =
            Arc::new(LessonTopicBroadcastJob::new(students.clone(), context.clone()));
        let clearing_job: Arc<dyn BatchJob> =
            Arc::new(LessonTopicClearingJob::new(students, context));

        Ok(Self {
            config,
            mode,
            database: Arc::new(database),
            controller,
            sweeper,
            broadcast_job,
            clearing_job,
            metrics_handle,
        })
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.database
    }

    pub fn controller(&self) -> &Arc<ScheduledTaskController> {
        &self.controller
    }

    /// 执行一次扫描后返回，用于 `--once`
    pub async fn run_once(&self) -> Result<SweepReport> {
        let report = self.sweeper.sweep().await.context("扫描到期任务失败")?;
        info!(
            due = report.due,
            completed = report.completed,
            failed = report.failed,
            skipped = report.skipped,
            "单次扫描完成"
        );
        Ok(report)
    }

    /// 运行应用程序直到收到关闭信号
    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动应用程序，模式: {:?}", self.mode);

        match self.mode {
            AppMode::Sweeper => self.run_sweeper(shutdown_rx).await?,
            AppMode::Api => self.run_api(shutdown_rx).await?,
            AppMode::All => self.run_all_components(shutdown_rx).await?,
        }

        self.database.close().await;
        Ok(())
    }

    /// 扫描循环和两个每周任务
    async fn run_sweeper(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let mut handles = Vec::new();

        if self.config.sweeper.enabled {
            let sweeper = Arc::clone(&self.sweeper);
            let interval = self.config.sweeper.interval_seconds;
            let shutdown_rx = shutdown_rx.resubscribe();
            info!(interval_seconds = interval, "启动到期任务扫描");
            handles.push(tokio::spawn(async move {
                run_sweeper_loop(sweeper, interval, shutdown_rx).await;
            }));
        } else {
            warn!("到期任务扫描已在配置中禁用");
        }

        let jobs = [
            (&self.config.jobs.lesson_topic_broadcast, &self.broadcast_job),
            (&self.config.jobs.lesson_topic_clearing, &self.clearing_job),
        ];
        for (schedule, job) in jobs {
            if let Some(scheduler) = job_scheduler(schedule, job.name())? {
                let job = Arc::clone(job);
                let shutdown_rx = shutdown_rx.resubscribe();
                handles.push(tokio::spawn(async move {
                    run_job_loop(job, scheduler, shutdown_rx).await;
                }));
            }
        }

        let _ = shutdown_rx.recv().await;
        info!("扫描服务收到关闭信号");

        // 进行中的投递在各自循环内完成后才退出
        for handle in handles {
            let _ = handle.await;
        }

        info!("扫描服务已停止");
        Ok(())
    }

    /// 运行API模式
    async fn run_api(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let api_config = &self.config.api;
        let app = create_app(
            Arc::clone(&self.controller),
            api_config,
            self.metrics_handle.clone(),
            &self.config.observability.metrics_endpoint,
        );

        let listener = TcpListener::bind(&api_config.bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {}", api_config.bind_address))?;

        info!("API服务器启动在 http://{}", api_config.bind_address);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务器收到关闭信号");
            })
            .await
            .context("API服务器运行失败")?;

        info!("API服务器已停止");
        Ok(())
    }

    /// 运行所有组件
    async fn run_all_components(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!("启动所有组件");

        let mut handles = Vec::new();

        {
            let app = self.clone();
            let shutdown_rx = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                if let Err(e) = app.run_sweeper(shutdown_rx).await {
                    error!("扫描服务运行失败: {e:#}");
                }
            }));
        }

        if self.config.api.enabled {
            let app = self.clone();
            let shutdown_rx = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                if let Err(e) = app.run_api(shutdown_rx).await {
                    error!("API服务器运行失败: {e:#}");
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        info!("所有组件已停止");
        Ok(())
    }
}

fn job_scheduler(schedule: &JobScheduleConfig, name: &str) -> Result<Option<CronScheduler>> {
    if !schedule.enabled {
        info!(job = name, "批量任务已禁用");
        return Ok(None);
    }
    let scheduler = CronScheduler::new(&schedule.schedule)
        .with_context(|| format!("无效的 {name} 调度表达式: {}", schedule.schedule))?;
    info!(
        job = name,
        schedule = %schedule.schedule,
        next = ?scheduler.next_execution_time(Utc::now()),
        "注册批量任务"
    );
    Ok(Some(scheduler))
}

/// 周期扫描到期任务，单次失败只记录日志
async fn run_sweeper_loop(
    sweeper: Arc<DueTaskSweeper>,
    interval_seconds: u64,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));
    // 慢扫描之后不补跑错过的周期
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = sweeper.sweep().await {
                    error!(error = %e, "扫描到期任务失败");
                }
            }
            _ = shutdown_rx.recv() => {
                info!("扫描循环收到关闭信号");
                break;
            }
        }
    }
}

async fn run_job_loop(
    job: Arc<dyn BatchJob>,
    scheduler: CronScheduler,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        let Some(wait) = scheduler.time_until_next_execution(Utc::now()) else {
            warn!(job = job.name(), "调度表达式没有后续执行时间");
            break;
        };

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                match job.run().await {
                    Ok(report) => info!(
                        job = job.name(),
                        succeeded = report.succeeded,
                        failed = report.failed,
                        "批量任务完成"
                    ),
                    Err(e) => error!(job = job.name(), error = %e, "批量任务失败"),
                }
            }
            _ = shutdown_rx.recv() => {
                info!(job = job.name(), "批量任务循环收到关闭信号");
                break;
            }
        }
    }
}
