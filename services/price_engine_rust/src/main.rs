use anyhow::{Context, Result};
use dotenv::dotenv;
use futures_util::StreamExt;
use goldwatch_core::alerts::RedisAlertNotifier;
use goldwatch_core::redis::{RedisBus, RedisStore};
use goldwatch_core::store::PriceStore;
use goldwatch_core::TradingCalendar;
use price_engine_rust::requests::{decode, spawn_dispatcher, EngineResponse};
use price_engine_rust::scheduler::spawn_poll_loop;
use price_engine_rust::{AcquisitionEngine, EngineConfig, SourceChain};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const REQUEST_QUEUE: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting price engine...");

    let config = EngineConfig::from_env()?;
    info!(
        "Market timezone {}, polling every {:?}, fetch timeout {:?}",
        config.market_timezone, config.poll_interval, config.fetch_timeout
    );

    // Redis
    let bus = RedisBus::new(&config.redis_url).await?;
    let store = PriceStore::new(Arc::new(RedisStore::new(
        bus.clone(),
        config.store_key_prefix.clone(),
    )));
    let notifier = Arc::new(RedisAlertNotifier::new(bus.clone()));

    // Engine
    let sources = SourceChain::from_config(&config).context("Failed to build price sources")?;
    let engine = Arc::new(AcquisitionEngine::new(
        sources,
        TradingCalendar::new(config.market_timezone),
        store,
        notifier,
        config.fetch_timeout,
    ));

    // Tasks
    let mut tasks = Vec::new();

    // 1. Badge publisher
    let mut updates = engine.observers().subscribe();
    let badge_bus = bus.clone();
    let badge_channel = config.badge_channel.clone();
    tasks.push(tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => {
                    if let Err(e) = badge_bus.publish(&badge_channel, &update).await {
                        warn!("Failed to publish badge update: {}", e);
                    }
                }
                Err(RecvError::Lagged(n)) => debug!("Badge publisher skipped {} updates", n),
                Err(RecvError::Closed) => break,
            }
        }
    }));

    if let Err(e) = engine.restore().await {
        warn!("Failed to restore persisted price state: {:#}", e);
    }

    // 2. Request listener
    let handle = spawn_dispatcher(engine.clone(), REQUEST_QUEUE);
    let request_bus = bus.clone();
    let request_channel = config.request_channel.clone();
    let response_channel = config.response_channel.clone();
    tasks.push(tokio::spawn(async move {
        loop {
            let mut pubsub = match request_bus.subscribe(&request_channel).await {
                Ok(pubsub) => pubsub,
                Err(e) => {
                    error!("Failed to subscribe to {}: {}", request_channel, e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };
            info!("Listening for requests on {}", request_channel);

            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let Ok(payload) = msg.get_payload::<String>() else {
                    continue;
                };
                let response = match decode(&payload) {
                    Ok((request_id, request)) => match handle.call(request).await {
                        Ok(response) => response.with_request_id(request_id),
                        Err(e) => {
                            error!("Request dispatch failed: {}", e);
                            continue;
                        }
                    },
                    Err((request_id, e)) => {
                        warn!("Rejected request: {}", e);
                        EngineResponse::failed(&e).with_request_id(request_id)
                    }
                };
                if let Err(e) = request_bus.publish(&response_channel, &response).await {
                    warn!("Failed to publish response: {}", e);
                }
            }
            warn!("Request subscription ended, reconnecting");
        }
    }));

    // 3. First cycle, then the poll loop
    let outcome = engine.run_cycle().await;
    info!("Initial cycle: {:?}", outcome);
    tasks.push(spawn_poll_loop(engine.clone(), config.poll_interval));

    // Wait for signal
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
        }
    }
    for task in tasks {
        task.abort();
    }

    Ok(())
}
