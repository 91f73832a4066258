//! Soundwave demo binary
//!
//! Signs in with `SOUNDWAVE_EMAIL`/`SOUNDWAVE_PASSWORD` against the configured
//! API, loads the library and favorites, and prints the resulting state.

use anyhow::Context;
use soundwave::auth::{AuthAction, AuthStatus};
use soundwave::song::SongAction;
use soundwave::{ClientConfig, SoundwaveClient};
use std::time::Duration;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    soundwave::telemetry::init_tracing().context("installing tracing subscriber")?;

    let config = ClientConfig::from_env().context("reading configuration")?;
    println!("=== Soundwave client against {} ===\n", config.api_url);

    let client = SoundwaveClient::connect(&config).await?;
    let store = client.store();

    // Session restore runs first; wait for it before deciding to sign in
    settle(store, |s| s.auth.is_auth != AuthStatus::Unknown).await?;

    if client.state(|s| s.auth.is_auth).await != AuthStatus::Authenticated {
        let email = std::env::var("SOUNDWAVE_EMAIL").context("SOUNDWAVE_EMAIL is not set")?;
        let password = std::env::var("SOUNDWAVE_PASSWORD").context("SOUNDWAVE_PASSWORD is not set")?;

        println!(">>> Signing in as {email}");
        client
            .dispatch(AuthAction::SetUserData {
                email,
                password,
                name: String::new(),
            })
            .await?;
        client.dispatch(AuthAction::SignInRequest).await?;
        settle(store, |s| !s.auth.is_loading).await?;

        let (is_error, message) = client.state(|s| (s.auth.is_error, s.auth.error_msg.clone())).await;
        if is_error {
            anyhow::bail!("sign-in failed: {message}");
        }
    }

    println!(">>> Loading library and favorites");
    client.dispatch(SongAction::GetLibRequest).await?;
    settle(store, |s| !s.song.is_loading).await?;
    client.dispatch(SongAction::GetFavsRequest).await?;
    settle(store, |s| !s.song.is_loading).await?;

    let state = client.state(|s| s.clone()).await;
    println!("\n{}", serde_json::to_string_pretty(&state)?);

    let health = client.health();
    println!("\nHealth: {} ({} checks)", health.status, health.checks.len());

    client.shutdown().await?;
    Ok(())
}

async fn settle(store: &soundwave::AppStore, predicate: impl Fn(&soundwave::AppState) -> bool) -> anyhow::Result<()> {
    tokio::time::timeout(SETTLE_TIMEOUT, async {
        while !store.state(&predicate).await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .context("timed out waiting for the API")
}
