use habit_client::{AppContext, config::Config, error::Result, stats::DashboardSummary};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env();
    tracing::info!("Using backend at {}", config.api_base_url);

    if let Err(e) = run(config).await {
        tracing::error!("habit client failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    let ctx = AppContext::new(config)?;

    // 恢复会话
    let session = ctx.session.restore().await;
    let Some(user) = session.user else {
        tracing::info!("No stored session, sign in to load your habits");
        return Ok(());
    };
    tracing::info!("Signed in as {} <{}>", user.name, user.email);

    // 预取仪表盘数据
    let habits = ctx.habits();
    let ongoing = ctx.ongoing_habits();
    let (habits, ongoing) = tokio::join!(habits.settled(), ongoing.settled());

    if let Some(err) = habits.error.or(ongoing.error) {
        return Err(err);
    }

    let habits = habits.data.unwrap_or_default();
    let ongoing = ongoing.data.unwrap_or_default();
    let summary = DashboardSummary::from_lists(&habits, &ongoing);
    tracing::info!(
        "Dashboard: {} habits, {} completed, {} in progress, {:.0}% overall",
        summary.total_habits,
        summary.completed,
        summary.in_progress,
        summary.overall_progress
    );

    Ok(())
}
