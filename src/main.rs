//! Command line entry point for wayfinder
//!
//! Resolves platform services, runs the locator as a long-lived service and
//! drives the auth, package and booking backends through the locator.

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use wayfinder::api::auth::require_admin;
use wayfinder::api::{
    AuthClient, Booking, BookingClient, BookingRequest, Credentials, PackageCatalog,
    PackageClient, PackageInput, PlatformClient, Session, SessionStore, SignupRequest,
    TravelPackage,
};
use wayfinder::config::{validate_config, AppConfig};
use wayfinder::discovery::{
    ConsulRegistry, RegistrationGuard, ServiceLocator, ServiceRegistrar, ServiceRegistration,
};
use wayfinder::error::ApiError;
use wayfinder::service::AppState;
use wayfinder::types::{ResolutionSource, ServiceName};
use wayfinder::utils::generate_instance_id;

/// Wayfinder - service locator for the travel booking platform
#[derive(Parser)]
#[command(
    name = "wayfinder",
    version,
    about = "Service locator and client for the travel booking platform",
    long_about = "Wayfinder resolves the platform's logical service names through a Consul \
                 registry, falling back to a static table when the registry cannot answer, \
                 and uses those answers to talk to the auth, package and booking backends."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        global = true,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    #[arg(long, global = true, value_name = "HOST", help = "Override registry host")]
    registry_host: Option<String>,

    #[arg(long, global = true, value_name = "PORT", help = "Override registry port")]
    registry_port: Option<u16>,

    #[arg(
        long,
        global = true,
        value_name = "POLICY",
        help = "Instance selection policy (first, random, round-robin)"
    )]
    policy: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "MODE",
        help = "Registry lookup mode (catalog, health-passing)"
    )]
    lookup: Option<String>,

    /// Enable debug mode
    #[arg(short, long, global = true, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        global = true,
        help = "Validate configuration and exit without running the command"
    )]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve service names to base URLs
    Resolve {
        /// Services to resolve (defaults to every known platform service)
        services: Vec<String>,
        /// Print the resolutions as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the locator with health, metrics and resolve endpoints
    Serve {
        /// Register the locator with the registry agent while running
        #[arg(long)]
        register: bool,
        /// Address the registry should use to reach this instance
        #[arg(long, value_name = "HOST", default_value = "localhost")]
        advertise_host: String,
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,
    },
    /// Check the registry and every known backend, then exit
    Health,
    /// Register an instance from SERVICE_NAME, SERVICE_ID, SERVICE_HOST and SERVICE_PORT
    Register {
        /// Generate a unique instance ID when SERVICE_ID is not set
        #[arg(long)]
        generate_id: bool,
    },
    /// Remove an instance registration
    Deregister { id: String },
    /// Create an account
    Signup {
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        admin: bool,
    },
    /// Log in and store the session
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Manage travel packages
    Packages {
        #[command(subcommand)]
        command: PackageCommand,
    },
    /// Manage bookings
    Bookings {
        #[command(subcommand)]
        command: BookingCommand,
    },
}

#[derive(Subcommand)]
enum PackageCommand {
    /// List all packages (requires login)
    List,
    /// List packages on sale
    Public,
    Show {
        id: String,
    },
    /// Create a package from `--field key=value` pairs (admin)
    Create {
        #[arg(short = 'f', long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Update a package from `--field key=value` pairs (admin)
    Update {
        id: String,
        #[arg(short = 'f', long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Delete a package (admin)
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
enum BookingCommand {
    /// List your bookings
    List,
    /// Book a package
    Create {
        package_id: String,
        #[arg(long, value_name = "YYYY-MM-DD")]
        travel_date: NaiveDate,
        #[arg(long, default_value_t = 1)]
        participants: u32,
    },
    /// Cancel one of your bookings
    Cancel {
        id: String,
    },
    /// Booking report for a date range (admin)
    Report {
        #[arg(long, value_name = "YYYY-MM-DD")]
        start: NaiveDate,
        #[arg(long, value_name = "YYYY-MM-DD")]
        end: NaiveDate,
    },
}

fn parse_field(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", value))
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load configuration and apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(host) = &args.registry_host {
        config.registry.host = host.clone();
    }

    if let Some(port) = args.registry_port {
        config.registry.port = port;
    }

    if let Some(policy) = &args.policy {
        config.registry.selection_policy = policy.parse()?;
    }

    if let Some(lookup) = &args.lookup {
        config.registry.lookup_mode = lookup.parse()?;
    }

    if let Command::Serve {
        port: Some(port), ..
    } = &args.command
    {
        config.service.health_port = *port;
    }

    validate_config(&config)?;
    Ok(config)
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🧭 Wayfinder Service Locator");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   Listening on: {}:{}",
        config.service.health_host, config.service.health_port
    );
    info!("   Registry: {}", config.registry.base_url());
    info!("   Lookup mode: {}", config.registry.lookup_mode);
    info!("   Selection policy: {}", config.registry.selection_policy);
    info!(
        "   Fallback entries: {}",
        config.fallback_table().map(|table| table.len()).unwrap_or(0)
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

fn consul_registry(config: &AppConfig) -> Result<ConsulRegistry> {
    ConsulRegistry::new(
        config.registry.base_url(),
        config.registry.lookup_mode,
        config.registry_timeout(),
    )
}

fn platform_client(config: &AppConfig, session: Option<&Session>) -> Result<PlatformClient> {
    let locator = Arc::new(ServiceLocator::from_config(config)?);
    let client = PlatformClient::new(locator, config.request_timeout())?;

    Ok(match session {
        Some(session) => client.with_token(session.token.clone()),
        None => client,
    })
}

/// Refuse admin commands early when the stored profile is not an admin
fn ensure_admin(session: Option<&Session>) -> Result<(), ApiError> {
    match session {
        None => Err(ApiError::MissingToken),
        Some(Session {
            user: Some(profile),
            ..
        }) => require_admin(profile),
        // No stored profile: let the backend decide
        Some(_) => Ok(()),
    }
}

async fn run_resolve(config: &AppConfig, services: Vec<String>, json: bool) -> Result<()> {
    let locator = ServiceLocator::from_config(config)?;

    let services: Vec<ServiceName> = if services.is_empty() {
        ServiceName::KNOWN.to_vec()
    } else {
        services.into_iter().map(ServiceName::from).collect()
    };

    let mut resolutions = Vec::new();
    let mut failures = 0;
    for service in &services {
        match locator.resolve_detailed(service).await {
            Ok(resolution) => resolutions.push(resolution),
            Err(e) => {
                failures += 1;
                eprintln!("{}", e);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&resolutions)?);
    } else {
        for resolution in &resolutions {
            let marker = match resolution.source {
                ResolutionSource::Registry => "",
                ResolutionSource::Fallback => " (fallback)",
            };
            println!("{:<18} {}{}", resolution.service, resolution.url, marker);
        }
    }

    if failures > 0 {
        bail!("{} of {} services could not be resolved", failures, services.len());
    }
    Ok(())
}

async fn run_serve(config: AppConfig, register: bool, advertise_host: String) -> Result<()> {
    display_startup_banner(&config);

    let app_state = Arc::new(AppState::new(config.clone())?);
    app_state.start().await?;

    let mut guard = if register {
        let name = config.service.name.clone();
        let registration = ServiceRegistration::new(
            name.clone(),
            generate_instance_id(&name),
            advertise_host,
            config.service.health_port,
        )
        .with_tags(vec!["locator".to_string(), "microservice".to_string()]);

        let mut guard = RegistrationGuard::new(consul_registry(&config)?, registration);
        if guard.register().await.is_err() {
            warn!("Continuing without registry registration");
        }
        Some(guard)
    } else {
        None
    };

    info!("✅ Wayfinder is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");

    if let Some(guard) = guard.as_mut() {
        // Already logged by the guard
        let _ = guard.deregister().await;
    }

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("✅ Graceful shutdown completed successfully"),
        Ok(Err(e)) => error!("Shutdown failed: {}", e),
        Err(_) => warn!("⚠️  Shutdown timeout exceeded, forcing exit"),
    }

    info!("🛑 Wayfinder stopped");
    Ok(())
}

async fn run_health(config: &AppConfig) -> Result<()> {
    let client = platform_client(config, None)?;
    let mut healthy = true;

    match client.locator().registry().ping().await {
        Ok(()) => println!("registry          {} ok", config.registry.base_url()),
        Err(e) => {
            healthy = false;
            println!("registry          {} {}", config.registry.base_url(), e);
        }
    }

    for service in ServiceName::KNOWN {
        match client.health(&service).await {
            Ok(health) => println!("{:<18}{}", service, health.status),
            Err(e) => {
                healthy = false;
                println!("{:<18}{}", service, e);
            }
        }
    }

    if !healthy {
        bail!("One or more components are unhealthy");
    }
    Ok(())
}

async fn run_register(config: &AppConfig, generate_id: bool) -> Result<()> {
    let registration = ServiceRegistration::from_env(generate_id)?;
    consul_registry(config)?.register(&registration).await?;

    println!(
        "Registered {} as {} ({}:{})",
        registration.name, registration.id, registration.address, registration.port
    );
    Ok(())
}

async fn run_deregister(config: &AppConfig, id: &str) -> Result<()> {
    consul_registry(config)?.deregister(id).await?;
    println!("Deregistered {}", id);
    Ok(())
}

fn print_package(package: &TravelPackage) {
    println!("{} {}", package.id, package.name);
    println!("  {}", package.description);
    println!(
        "  {} | {} days | up to {} people | ${:.2}",
        package.location, package.duration_days, package.max_participants, package.price
    );
    if !package.includes.is_empty() {
        println!("  Includes: {}", package.includes.join(", "));
    }
    if !package.available_from.is_empty() || !package.available_to.is_empty() {
        println!(
            "  Available: {} to {}",
            package.available_from, package.available_to
        );
    }
}

fn print_packages(packages: &[TravelPackage]) {
    if packages.is_empty() {
        println!("No packages available");
    }
    for package in packages {
        print_package(package);
    }
}

fn print_booking(booking: &Booking) {
    println!(
        "{} {} on {} | {} people | ${:.2} | {}",
        booking.id,
        booking.package_name.as_deref().unwrap_or(&booking.package_id),
        booking.travel_date,
        booking.participants,
        booking.total_amount,
        booking.status
    );
}

async fn run_packages(config: &AppConfig, command: PackageCommand) -> Result<()> {
    let session = SessionStore::new(config.session_path()).load()?;
    let client = PackageClient::new(platform_client(config, session.as_ref())?);
    let mut catalog = PackageCatalog::new(client.clone());

    match command {
        PackageCommand::List => print_packages(&catalog.load().await?),
        PackageCommand::Public => print_packages(&client.list_public().await?.packages),
        PackageCommand::Show { id } => print_package(&client.get(&id).await?),
        PackageCommand::Create { fields } => {
            ensure_admin(session.as_ref())?;
            let package = catalog.create(&PackageInput::from_form(&fields)?).await?;
            println!("Package created: {}", package.id);
        }
        PackageCommand::Update { id, fields } => {
            ensure_admin(session.as_ref())?;
            let package = catalog.update(&id, &PackageInput::from_form(&fields)?).await?;
            println!("Package updated: {}", package.id);
        }
        PackageCommand::Delete { id } => {
            ensure_admin(session.as_ref())?;
            println!("{}", catalog.delete(&id).await?);
        }
    }
    Ok(())
}

async fn run_bookings(config: &AppConfig, command: BookingCommand) -> Result<()> {
    let session = SessionStore::new(config.session_path()).load()?;
    let client = BookingClient::new(platform_client(config, session.as_ref())?);

    match command {
        BookingCommand::List => {
            let listing = client.list().await?;
            if listing.bookings.is_empty() {
                println!("No bookings yet");
            }
            for booking in &listing.bookings {
                print_booking(booking);
            }
        }
        BookingCommand::Create {
            package_id,
            travel_date,
            participants,
        } => {
            let request = BookingRequest::new(package_id, travel_date, participants);
            let booking = client.create(&request).await?;
            print_booking(&booking);
        }
        BookingCommand::Cancel { id } => println!("{}", client.cancel(&id).await?),
        BookingCommand::Report { start, end } => {
            ensure_admin(session.as_ref())?;
            let report = client.report(start, end).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

async fn run(args: Args, config: AppConfig) -> Result<()> {
    let store = SessionStore::new(config.session_path());

    match args.command {
        Command::Resolve { services, json } => run_resolve(&config, services, json).await,
        Command::Serve {
            register,
            advertise_host,
            ..
        } => run_serve(config, register, advertise_host).await,
        Command::Health => run_health(&config).await,
        Command::Register { generate_id } => run_register(&config, generate_id).await,
        Command::Deregister { id } => run_deregister(&config, &id).await,
        Command::Signup {
            email,
            password,
            admin,
        } => {
            let auth = AuthClient::new(platform_client(&config, None)?);
            let message = auth
                .signup(&SignupRequest {
                    email,
                    password,
                    is_admin: admin,
                })
                .await?;
            println!("{}", message);
            Ok(())
        }
        Command::Login { email, password } => {
            let auth = AuthClient::new(platform_client(&config, None)?);
            let session = auth
                .login_and_fetch_profile(&Credentials::new(email, password))
                .await?;
            store.save(&session)?;
            println!(
                "Logged in as {}",
                session
                    .user
                    .as_ref()
                    .map(|user| user.email.as_str())
                    .unwrap_or("unknown user")
            );
            Ok(())
        }
        Command::Logout => {
            if store.clear()? {
                println!("Logged out");
            } else {
                println!("Not logged in");
            }
            Ok(())
        }
        Command::Whoami => {
            let session = store.load()?.ok_or(ApiError::MissingToken)?;
            let auth = AuthClient::new(platform_client(&config, Some(&session))?);
            let profile = auth.me().await?;
            println!(
                "{} (id {}){}",
                profile.email,
                profile.id,
                if profile.is_admin { " [admin]" } else { "" }
            );
            Ok(())
        }
        Command::Packages { command } => run_packages(&config, command).await,
        Command::Bookings { command } => run_bookings(&config, command).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without running the command");
        return Ok(());
    }

    if let Err(e) = run(args, config).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("price=1200.50").unwrap(),
            ("price".to_string(), "1200.50".to_string())
        );
        assert_eq!(
            parse_field("description=a=b").unwrap(),
            ("description".to_string(), "a=b".to_string())
        );
        assert!(parse_field("price").is_err());
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let args = Args::try_parse_from([
            "wayfinder",
            "resolve",
            "auth-service",
            "--registry-host",
            "10.0.0.2",
            "--policy",
            "round-robin",
        ])
        .unwrap();

        assert_eq!(args.registry_host.as_deref(), Some("10.0.0.2"));
        assert_eq!(args.policy.as_deref(), Some("round-robin"));
        assert!(matches!(args.command, Command::Resolve { .. }));
    }

    #[test]
    fn test_ensure_admin() {
        use wayfinder::api::UserProfile;

        assert!(matches!(ensure_admin(None), Err(ApiError::MissingToken)));

        let regular = Session::new(
            "t",
            Some(UserProfile {
                id: "1".to_string(),
                email: "ana@example.com".to_string(),
                is_admin: false,
            }),
        );
        assert!(matches!(
            ensure_admin(Some(&regular)),
            Err(ApiError::Forbidden)
        ));
        assert!(ensure_admin(Some(&Session::new("t", None))).is_ok());
    }
}
