//! Command-line shell for the Onyx session core.
//!
//! Stands in for the host UI layer: stdin lines play the role of activity
//! lifecycle callbacks and touch events, and the expiration listener plays
//! the role of the navigator that returns to the login screen. Everything
//! session-related runs through the same library surface a real UI would use.

use clap::Parser;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use onyx_session::{
    load_config, DriverInfo, ExpirationMonitor, InputEvent, LanguagePreferences,
    LifecycleObserver, SessionStore,
};

mod orders;

use orders::{fetch_demo_orders, OrderTab, OrdersCache};

const STATE_DIR_NAME: &str = ".onyx-delivery";

#[derive(Parser)]
#[command(
    name = "onyx-app-shell",
    about = "Interactive shell around the Onyx delivery session core"
)]
struct Cli {
    /// Path to the session config TOML (defaults to ~/.onyx-delivery/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding session and preference state (defaults to ~/.onyx-delivery).
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Override the inactivity timeout, in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let state_dir = match cli.state_dir.or_else(default_state_dir) {
        Some(dir) => dir,
        None => {
            error!("Home directory not found and no --state-dir given");
            std::process::exit(1);
        }
    };

    let mut config = match load_config(cli.config) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Failed to load session config");
            std::process::exit(1);
        }
    };
    if let Some(secs) = cli.timeout_secs {
        config.inactivity_timeout = std::time::Duration::from_secs(secs);
    }

    let store = Arc::new(SessionStore::open(state_dir.join("session.json")));
    let prefs = LanguagePreferences::open(state_dir.join("prefs.json"));
    let monitor = Arc::new(ExpirationMonitor::start(config, Arc::clone(&store)));
    let observer = LifecycleObserver::new(Arc::clone(&monitor));

    let orders_cache = Arc::new(OrdersCache::new());
    monitor.register_clearable(orders_cache.clone());

    // The navigator: on expiration the session is already cleared and the
    // caches drained; all that is left is putting the login screen back up.
    monitor.set_expiration_listener(|| {
        println!("\n>> Session expired after inactivity; returning to login screen.");
        print_prompt();
    });

    info!(state_dir = %state_dir.display(), "Shell started");
    println!("onyx-app-shell - type 'help' for commands");

    // The launch itself is the first activity coming up.
    observer.on_activity_started();
    observer.on_activity_resumed();

    run_repl(&store, &prefs, &monitor, &observer, &orders_cache);

    observer.on_activity_stopped();
    monitor.shutdown();
}

fn run_repl(
    store: &SessionStore,
    prefs: &LanguagePreferences,
    monitor: &ExpirationMonitor,
    observer: &LifecycleObserver,
    orders_cache: &OrdersCache,
) {
    print_prompt();
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        // Typing is user activity, same as touching the screen.
        observer.on_input_event(InputEvent::TouchDown);

        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("login") => {
                let id = parts.next().unwrap_or("D-100").to_string();
                let name = parts.collect::<Vec<_>>().join(" ");
                let name = if name.is_empty() { "Driver".to_string() } else { name };
                match store.save_session(DriverInfo::new(id, name)) {
                    Ok(()) => println!("logged in"),
                    Err(err) => println!("login failed: {}", err),
                }
            }
            Some("logout") => match store.clear_session() {
                Ok(()) => println!("logged out"),
                Err(err) => println!("logout failed: {}", err),
            },
            Some("touch") => println!("interaction recorded"),
            Some("resume") => observer.on_activity_resumed(),
            Some("bg") => {
                observer.on_activity_stopped();
                println!("app backgrounded");
            }
            Some("fg") => {
                observer.on_activity_started();
                observer.on_activity_resumed();
                println!("app foregrounded");
            }
            Some("orders") => {
                let tab = match parts.next() {
                    Some("delivered") => OrderTab::Delivered,
                    _ => OrderTab::New,
                };
                show_orders(store, orders_cache, tab);
            }
            Some("lang") => match parts.next() {
                Some(code) => match prefs.set_language(code) {
                    Ok(()) => println!("language set to {}", prefs.language()),
                    Err(err) => println!("failed to set language: {}", err),
                },
                None => println!("language: {}", prefs.language()),
            },
            Some("status") => {
                let snapshot = monitor.snapshot();
                let driver = store
                    .current_driver()
                    .map(|d| format!("{} ({})", d.name, d.delivery_id))
                    .unwrap_or_else(|| "none".to_string());
                println!(
                    "driver: {} | phase: {:?} | foreground: {} | episode: {}",
                    driver, snapshot.phase, snapshot.in_foreground, snapshot.episode
                );
            }
            Some("help") => print_help(),
            Some("quit") | Some("exit") => break,
            Some(other) => println!("unknown command '{}'; try 'help'", other),
            None => {}
        }
        print_prompt();
    }
}

fn show_orders(store: &SessionStore, cache: &OrdersCache, tab: OrderTab) {
    let driver = match store.current_driver() {
        Some(driver) => driver,
        None => {
            println!("not logged in");
            return;
        }
    };

    let orders = match cache.get(&driver.delivery_id, tab) {
        Some(orders) => {
            println!("(cached)");
            orders
        }
        None => {
            let fetched = fetch_demo_orders(&driver.delivery_id, tab);
            cache.put(&driver.delivery_id, tab, fetched.clone());
            fetched
        }
    };
    for order in orders {
        println!(
            "  {} | {} | {} | {}",
            order.bill_number, order.customer_name, order.address, order.total
        );
    }
}

fn print_help() {
    println!("commands:");
    println!("  login <id> [name]   log a driver in");
    println!("  logout              explicit logout");
    println!("  touch               simulate a screen touch");
    println!("  resume              simulate activity resume");
    println!("  fg / bg             simulate app foreground / background");
    println!("  orders [delivered]  show the order tabs");
    println!("  lang [code]         show or set the language");
    println!("  status              monitor snapshot");
    println!("  quit                exit");
}

fn print_prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn default_state_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(STATE_DIR_NAME))
}

fn init_logging() {
    let debug_enabled = env::var("ONYX_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
