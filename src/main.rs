use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use pricewatch::config::AppConfig;
use pricewatch::extract::Extractor;
use pricewatch::notify::{AlertDispatcher, EmailSink, NotificationSink, WebhookSink};
use pricewatch::render::ChromeRenderer;
use pricewatch::runner::{CheckRunner, TokioSleeper};
use pricewatch::scheduler::{self, CheckScheduler, OriginThrottle};
use pricewatch::store::Store;
use pricewatch::web::{self, AppState};

#[derive(Parser, Debug)]
#[command(name = "pricewatch", about = "Price and stock watcher for product pages")]
struct Args {
    /// Override the configured HTTP port
    #[arg(long)]
    port: Option<u16>,

    /// Run one due-check pass and exit instead of serving
    #[arg(long)]
    run_checks_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pricewatch=debug".parse()?),
        )
        .init();

    info!("Starting PriceWatch...");

    let mut config = AppConfig::from_env()?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let store = Store::connect(&config.database.url, config.database.max_connections).await?;
    store.migrate().await?;
    store.ensure_seed_data().await?;

    let renderer = Arc::new(ChromeRenderer::new(config.render.clone()));
    let extractor = Extractor::new(config.render.block_detection);

    let mut sinks: Vec<Arc<dyn NotificationSink>> = Vec::new();
    if let Some(email) = EmailSink::from_config(&config.notifications.smtp) {
        sinks.push(Arc::new(email));
    }
    if let Some(webhook) = WebhookSink::from_config(&config.notifications.webhook) {
        sinks.push(Arc::new(webhook));
    }
    info!("{} notification channel(s) configured", sinks.len());
    let dispatcher = AlertDispatcher::new(store.clone(), sinks);

    let throttle = Arc::new(OriginThrottle::new(&config.scheduler));
    let runner = Arc::new(CheckRunner::new(
        store.clone(),
        renderer.clone(),
        extractor,
        dispatcher,
        Arc::clone(&throttle),
        config.runner.clone(),
        Arc::new(TokioSleeper),
    ));
    let check_scheduler = Arc::new(CheckScheduler::new(
        store.clone(),
        runner,
        throttle,
        config.scheduler.clone(),
    ));

    if args.run_checks_once {
        let dispatched = check_scheduler.tick().await?;
        info!("Dispatched {} checks", dispatched);
        if dispatched > 0 {
            // Checks run on their own tasks; give them time to land.
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        }
        return Ok(());
    }

    let job_scheduler = scheduler::start(Arc::clone(&check_scheduler)).await?;

    let state = AppState {
        store,
        scheduler: check_scheduler,
        renderer,
        config: config.clone(),
    };

    tokio::select! {
        result = web::serve(config, state) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    drop(job_scheduler);
    Ok(())
}
