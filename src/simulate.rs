//! The `simulate` command: several clients sharing one in-memory presence topic.

use std::collections::HashSet;
use std::sync::Arc;

use clap::Args;
use serde_json::json;
use tokio::time;

use lingua_core::config::AppConfig;
use lingua_core::error::AppError;
use lingua_presence::{Identity, MemoryPresenceHub, PresenceController, PresenceView};

/// Arguments for `simulate`.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// User ID to bring online (repeat for more users; repeat a user for extra tabs)
    #[arg(short, long = "user", required = true)]
    pub users: Vec<String>,

    /// Activity the first user switches to once everyone is online
    #[arg(short, long)]
    pub activity: Option<String>,
}

/// Runs the simulation and prints the reconciled online list as JSON.
pub async fn execute(args: &SimulateArgs, config: &AppConfig) -> Result<(), AppError> {
    if args.users.iter().any(|u| u.trim().is_empty()) {
        return Err(AppError::validation("User IDs must not be empty"));
    }

    let hub = Arc::new(MemoryPresenceHub::new());
    let controllers: Vec<PresenceController> = args
        .users
        .iter()
        .map(|user| {
            PresenceController::spawn(
                hub.clone(),
                config.presence.clone(),
                Some(identity_for(user)),
            )
        })
        .collect();

    let expected = if config.presence.dedup_by_user {
        args.users.iter().collect::<HashSet<_>>().len()
    } else {
        args.users.len()
    };
    for controller in &controllers {
        settle(controller, config, |v| {
            v.is_tracking && v.online_count() == expected
        })
        .await?;
    }
    tracing::info!(online = expected, "All simulated clients online");

    if let (Some(activity), Some(first)) = (&args.activity, controllers.first()) {
        first.update_activity(activity.clone()).await;
        let user_id = first.identity().map(|i| i.user_id).unwrap_or_default();
        for controller in &controllers {
            settle(controller, config, |v| {
                v.online_users
                    .iter()
                    .any(|r| r.user_id == user_id && r.activity == *activity)
            })
            .await?;
        }
    }

    let view = controllers
        .first()
        .map(PresenceController::view)
        .unwrap_or_default();
    let metrics: Vec<_> = controllers.iter().map(PresenceController::metrics).collect();
    let report = json!({
        "topic": config.presence.topic,
        "online_count": view.online_count(),
        "online_users": view.online_users,
        "metrics": metrics,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    for controller in &controllers {
        controller.shutdown().await;
    }
    tracing::info!(
        remaining = hub.subscriber_count(&config.presence.topic),
        "Simulation finished"
    );
    Ok(())
}

fn identity_for(user: &str) -> Identity {
    Identity::new(user, format!("{user}@lingua.local")).with_display_name(user)
}

/// Waits until `controller`'s view satisfies `predicate`.
async fn settle(
    controller: &PresenceController,
    config: &AppConfig,
    predicate: impl FnMut(&PresenceView) -> bool,
) -> Result<(), AppError> {
    let mut rx = controller.watch_view();
    match time::timeout(config.presence.settle_timeout(), rx.wait_for(predicate)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) => Err(AppError::internal("Presence controller stopped")),
        Err(_) => Err(AppError::internal(format!(
            "Presence did not settle within {} ms",
            config.presence.settle_timeout_ms
        ))),
    }
}
