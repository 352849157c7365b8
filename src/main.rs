use btc_sentinel::application::alert_engine::AlertEngine;
use btc_sentinel::application::bootstrap::EngineContext;
use btc_sentinel::application::config_service::ConfigService;
use btc_sentinel::application::data_service::DataService;
use btc_sentinel::application::metrics_engine::build_market_state;
use btc_sentinel::application::scheduler::Scheduler;
use btc_sentinel::application::state_store::StateStore;
use btc_sentinel::domain::market::timeframe::Timeframe;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PRIMARY_TIMEFRAME: Timeframe = Timeframe::H1;

#[derive(Parser)]
#[command(name = "btc-sentinel", about = "Continuous BTC perpetual-futures market-intelligence engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the live scheduler: fetches from the vendor on a timer until interrupted.
    Run,
    /// Replay historical candles already in the Historical-Candle Store over a time range.
    Replay {
        /// Start of the replay window, unix millis.
        #[arg(long)]
        from: i64,
        /// End of the replay window, unix millis.
        #[arg(long)]
        to: i64,
        /// Step between replayed cycles, in milliseconds. Defaults to SCAN_CYCLE_MS.
        #[arg(long)]
        step_ms: Option<i64>,
    },
    /// Run one outcome-labeling sweep against the current price.
    LabelOutcomes,
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_millis() as i64
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let ctx = EngineContext::bootstrap().await?;

    match cli.command {
        Command::Run => run(ctx).await,
        Command::Replay { from, to, step_ms } => replay(ctx, from, to, step_ms).await,
        Command::LabelOutcomes => label_outcomes(ctx).await,
    }
}

async fn run(ctx: EngineContext) -> anyhow::Result<()> {
    info!(symbol = %ctx.config.symbol, scan_cycle_ms = ctx.config.scan_cycle_ms, "starting live scheduler");

    let data_service = DataService::new(
        Arc::new(ctx.coinglass),
        ctx.persistence.candle_repository.clone(),
        ctx.config.symbol.clone(),
        std::time::Duration::from_millis(ctx.config.coinglass.active_plan.request_delay_ms()),
    );

    let mut alert_engine = AlertEngine::new(ctx.persistence.alert_repository.clone());
    let hydrate_since = now_ms() - 7 * 86_400_000;
    alert_engine.hydrate(&ctx.config.symbol, hydrate_since).await?;

    let state_store = Arc::new(StateStore::new(ctx.persistence.state_store_repository.clone(), ctx.config.scan_cycle_ms));
    state_store.hydrate(&ctx.config.symbol, now_ms()).await?;

    let config_service = ConfigService::load(ctx.persistence.config_repository.clone()).await?;
    info!(version = config_service.current().meta.version, "active config loaded");

    let scheduler = Scheduler::new(
        data_service,
        alert_engine,
        state_store,
        ctx.config.symbol.clone(),
        PRIMARY_TIMEFRAME,
        ctx.config.scan_cycle_ms,
    );

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt signal, shutting down");
            ctrl_c_cancel.cancel();
        }
    });

    scheduler.run_forever(cancel, now_ms).await;
    Ok(())
}

async fn replay(ctx: EngineContext, from: i64, to: i64, step_ms: Option<i64>) -> anyhow::Result<()> {
    let step = step_ms.unwrap_or(ctx.config.scan_cycle_ms);
    anyhow::ensure!(step > 0, "step_ms must be positive");
    anyhow::ensure!(from < to, "from must be before to");

    info!(from, to, step, "starting replay");

    let data_service = DataService::new(
        Arc::new(ctx.coinglass),
        ctx.persistence.candle_repository.clone(),
        ctx.config.symbol.clone(),
        std::time::Duration::from_millis(0),
    );
    let mut alert_engine = AlertEngine::new(ctx.persistence.alert_repository.clone());
    let state_store = StateStore::new(ctx.persistence.state_store_repository.clone(), ctx.config.scan_cycle_ms);

    let mut as_of = from;
    let mut cycles = 0usize;
    let mut states_written = 0usize;

    while as_of <= to {
        match data_service.replay_inputs(as_of).await {
            Ok(inputs) => {
                let price = inputs
                    .iter()
                    .find(|(tf, _)| *tf == PRIMARY_TIMEFRAME)
                    .and_then(|(_, input)| input.binance.as_ref().or(input.bybit.as_ref()))
                    .map(|v| v.snapshot.price)
                    .unwrap_or(Decimal::ZERO);

                if let Some(state) = build_market_state(&ctx.config.symbol, as_of, PRIMARY_TIMEFRAME, price, inputs) {
                    let previous = state_store.latest(&ctx.config.symbol).await?;
                    if state_store.insert_if_absent(&state, as_of).await? {
                        states_written += 1;
                        alert_engine.evaluate_and_persist(&ctx.config.symbol, previous.as_ref(), &state, as_of).await?;
                    }
                }
            }
            Err(err) => warn!(as_of, error = %err, "replay cycle failed, skipping timestamp"),
        }
        cycles += 1;
        as_of += step;
    }

    info!(cycles, states_written, "replay finished");
    Ok(())
}

async fn label_outcomes(ctx: EngineContext) -> anyhow::Result<()> {
    let data_service = DataService::new(
        Arc::new(ctx.coinglass),
        ctx.persistence.candle_repository.clone(),
        ctx.config.symbol.clone(),
        std::time::Duration::from_millis(ctx.config.coinglass.active_plan.request_delay_ms()),
    );
    let state_store = StateStore::new(ctx.persistence.state_store_repository.clone(), ctx.config.scan_cycle_ms);

    let now = now_ms();
    let input = data_service.live_timeframe_input(PRIMARY_TIMEFRAME, now).await;
    let price = input
        .binance
        .as_ref()
        .or(input.bybit.as_ref())
        .map(|v| v.snapshot.price)
        .ok_or_else(|| anyhow::anyhow!("no live price available from either venue"))?;

    let labeled = state_store.label_outcomes(&ctx.config.symbol, now, price).await?;
    info!(labeled, "outcome labeling sweep complete");
    Ok(())
}
