use clap::Parser;
use jwt_login::{
    events::BroadcastNotifier,
    exchange::{Credentials, HttpTokenExchange},
    expiry,
    stores::FileTokenStore,
    BoxError, LoginConfig, LoginManager,
};
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
    time,
};

#[derive(Debug, Parser)]
struct Opts {
    /// The authority's login URL
    #[clap(short, long, env)]
    login_url: reqwest::Url,

    /// The authority's refresh URL
    #[clap(short, long, env)]
    refresh_url: reqwest::Url,

    /// How often to refresh the token, in seconds
    #[clap(short, long, env, default_value_t = 250)]
    interval: u64,

    /// The local file used to persist the token
    #[clap(short = 'f', long, env, name = "FILE", default_value = ".session.json")]
    credentials_file: std::path::PathBuf,
}

async fn ask(prompt: &str) -> io::Result<String> {
    let mut stderr = io::stderr();
    stderr.write_all(prompt.as_bytes()).await?;
    stderr.flush().await?;

    let mut line = String::new();
    BufReader::new(io::stdin()).read_line(&mut line).await?;
    Ok(line.trim_end().to_owned())
}

async fn prompt_for_login(manager: Arc<OnceLock<LoginManager>>) -> Result<(), BoxError> {
    let manager = manager.get().ok_or("session not ready")?;

    let username = ask("username: ").await?;
    if username.is_empty() {
        return Err("login cancelled".into());
    }
    let password = ask("password: ").await?;

    manager
        .login(&Credentials::new(username, password))
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let manager_slot = Arc::new(OnceLock::new());
    let display = {
        let manager_slot = manager_slot.clone();
        move || prompt_for_login(manager_slot.clone())
    };

    let config = LoginConfig::new()
        .with_refresh_interval(Duration::from_secs(opts.interval))
        .with_login_url(opts.login_url)
        .with_refresh_url(opts.refresh_url)
        .with_display_login(display)
        .with_hide_login(|| async {
            tracing::info!("login prompt dismissed");
            Ok::<(), BoxError>(())
        });

    let client = reqwest::Client::builder().https_only(true).build()?;
    let exchange = HttpTokenExchange::from_config(client, &config)?;
    let store = FileTokenStore::new(opts.credentials_file);
    let notifier = BroadcastNotifier::default();
    let mut events = notifier.subscribe();

    let manager = LoginManager::new(config, store, exchange, notifier);
    let _ = manager_slot.set(manager.clone());

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::info!(%event, "session event");
        }
    });

    let mut interval = time::interval(Duration::from_secs(5));
    loop {
        interval.tick().await;

        match manager.get_token(None).await {
            Ok(Some(token)) => {
                let expiry = expiry::expiry(&token).ok().flatten().map(|exp| exp.0);
                tracing::debug!(
                    token = format_args!("{:#?}", token),
                    ?expiry,
                    state = ?manager.session_state(),
                    "pulled token"
                );
            }
            Ok(None) => tracing::debug!("request ignored"),
            Err(error) => {
                tracing::error!(
                    error = (&error as &dyn std::error::Error),
                    "unable to obtain token"
                );
                break;
            }
        }
    }

    manager.logout();
    Ok(())
}
