use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use homeboard::api;
use homeboard::config::HubConfig;
use homeboard::config::LoggingConfig;
use homeboard::dashboard::Dashboard;
use homeboard::dashboard::Scene;
use homeboard::discovery;
use homeboard::hub::DemoHub;
#[cfg(feature = "hub_rest")]
use homeboard::hub::FallbackHub;
use homeboard::hub::Hub;
#[cfg(feature = "hub_rest")]
use homeboard::hub::RestHub;
use homeboard::icons::room_icon;
use homeboard::icons::status_icon;
use homeboard::mapping::export_file_name;
use homeboard::mapping::EntityMapper;
use homeboard::setup::SetupRecord;
use homeboard::setup::SetupStep;
use homeboard::setup::SetupWizard;
use homeboard::storage::FileStorage;
use homeboard::storage::Storage;
use homeboard::theme::css_variables;
use homeboard::theme::ThemeStore;
use homeboard::theme::THEMES;
use homeboard::Config;
use homeboard::LogLevel;
use tokio::sync::Mutex;
use tracing::info;
use tracing::warn;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

/// homeboard - organize home-automation devices into rooms and control them
#[derive(Debug, Parser)]
#[command(name = "homeboard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file; repeat to merge several
    #[arg(short, long = "config", global = true, default_value = "homeboard.toml")]
    config: Vec<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    /// Ignore config files and use the built-in demo house
    #[arg(long, global = true)]
    demo: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List entities discovered on the hub
    Discover {
        /// Only lights and light-like helpers
        #[arg(long)]
        lights: bool,

        /// Group entities by the room their name suggests
        #[arg(long)]
        suggest: bool,
    },

    /// Room management
    Rooms(RoomsCommand),

    /// Assign an entity to a room
    Map { entity: String, room: String },

    /// Clear an entity's room
    Unmap { entity: String },

    /// List entities without a room
    Unmapped,

    /// Export rooms and mappings as JSON
    Export {
        /// Only room definitions
        #[arg(long)]
        rooms_only: bool,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace rooms and mappings from an exported file
    Import { file: PathBuf },

    /// Rooms, lights, energy estimate and systems
    Status,

    /// Control a single light or the whole house
    Light(LightCommand),

    /// Apply a scene to a room
    Scene { room: String, scene: Scene },

    /// Color themes
    Theme(ThemeCommand),

    /// Run the first-time setup without prompts
    Setup(SetupArgs),

    /// Sync periodically and log state changes
    Watch,

    /// Serve the HTTP API
    Serve,
}

#[derive(Debug, Args)]
struct RoomsCommand {
    #[command(subcommand)]
    subcommand: RoomsSubcommand,
}

#[derive(Debug, Subcommand)]
enum RoomsSubcommand {
    /// List rooms and their entities
    List,
    /// Create a room
    Add {
        name: String,
        /// Icon; picked from the name when omitted
        #[arg(long)]
        icon: Option<String>,
    },
    /// Rename a room or change its icon
    Edit {
        room_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
    /// Delete a room, unmapping its entities
    Delete { room_id: String },
    /// Delete every room and mapping
    Clear,
    /// Add the preset rooms that don't exist yet
    Presets,
}

#[derive(Debug, Args)]
struct LightCommand {
    #[command(subcommand)]
    subcommand: LightSubcommand,
}

#[derive(Debug, Subcommand)]
enum LightSubcommand {
    On {
        entity: String,
        /// Brightness percent
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
        brightness: Option<u8>,
    },
    Off {
        entity: String,
    },
    Toggle {
        entity: String,
    },
    Brightness {
        entity: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        pct: u8,
    },
    /// Every light in the house on
    AllOn,
    /// Every light in the house off
    AllOff,
}

#[derive(Debug, Args)]
struct ThemeCommand {
    #[command(subcommand)]
    subcommand: ThemeSubcommand,
}

#[derive(Debug, Subcommand)]
enum ThemeSubcommand {
    List,
    Set { id: String },
    /// Current theme and its CSS variables
    Show,
}

#[derive(Debug, Args)]
struct SetupArgs {
    /// Person entity id
    #[arg(long)]
    person: Option<String>,

    #[arg(long)]
    theme: Option<String>,

    /// Device to select; repeatable
    #[arg(long = "device")]
    devices: Vec<String>,

    /// Select every discovered device
    #[arg(long, conflicts_with = "devices")]
    all_devices: bool,

    /// Custom room; repeatable
    #[arg(long = "room")]
    rooms: Vec<String>,
}

/// What every command works with
struct App {
    config: Config,
    storage: Arc<dyn Storage>,
}

impl App {
    fn hub(&self) -> anyhow::Result<Arc<dyn Hub>> {
        build_hub(&self.config.hub)
    }

    fn mapper(&self) -> anyhow::Result<EntityMapper> {
        EntityMapper::load(self.storage.clone()).context("failed to load room mappings")
    }

    /// Dashboard with entities freshly discovered from the hub
    async fn dashboard(&self) -> anyhow::Result<Dashboard> {
        let mut dashboard = Dashboard::new(self.hub()?, self.mapper()?);
        dashboard
            .refresh()
            .await
            .context("failed to discover entities")?;
        Ok(dashboard)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if cli.demo {
        Config::demo()
    } else {
        match Config::from_files(&cli.config) {
            Ok((config, warnings)) => {
                if !warnings.is_empty() {
                    eprint!("{}", warnings);
                }
                config
            }
            Err(diagnostics) => {
                eprint!("{}", diagnostics);
                std::process::exit(1);
            }
        }
    };

    init_tracing(&config.logging, cli.log_level);

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(config.storage.path.clone()));
    let app = App { config, storage };

    match cli.command {
        Command::Discover { lights, suggest } => discover(&app, lights, suggest).await,
        Command::Rooms(cmd) => rooms(&app, cmd.subcommand),
        Command::Map { entity, room } => {
            let mut dashboard = app.dashboard().await?;
            dashboard.mapper_mut().map_entity_to_room(&entity, &room)?;
            println!("Mapped {} to {}", entity, room);
            Ok(())
        }
        Command::Unmap { entity } => {
            let mut dashboard = app.dashboard().await?;
            if dashboard.mapper_mut().unmap_entity(&entity)? {
                println!("Unmapped {}", entity);
            } else {
                println!("{} was not mapped", entity);
            }
            Ok(())
        }
        Command::Unmapped => {
            let dashboard = app.dashboard().await?;
            for entity in dashboard.mapper().unmapped_entities() {
                println!("{} | {}", entity.entity_id, entity.friendly_name);
            }
            Ok(())
        }
        Command::Export { rooms_only, output } => export(&app, rooms_only, output),
        Command::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let count = app.mapper()?.import_configuration(&json)?;
            println!("Imported {} rooms", count);
            Ok(())
        }
        Command::Status => status(&app).await,
        Command::Light(cmd) => light(&app, cmd.subcommand).await,
        Command::Scene { room, scene } => {
            let mut dashboard = app.dashboard().await?;
            dashboard.apply_scene(&room, scene).await?;
            println!("Applied {} to {}", scene, room);
            Ok(())
        }
        Command::Theme(cmd) => theme(&app, cmd.subcommand),
        Command::Setup(args) => setup(&app, args).await,
        Command::Watch => watch(&app).await,
        Command::Serve => serve(&app).await,
    }
}

fn init_tracing(logging: &LoggingConfig, cli_level: Option<LogLevel>) {
    let level = cli_level.unwrap_or(logging.level);
    let filter = Targets::new()
        .with_default(LevelFilter::from(level))
        .with_targets(
            logging
                .overrides
                .iter()
                .map(|(target, level)| (target.clone(), LevelFilter::from(*level))),
        );

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn build_hub(config: &HubConfig) -> anyhow::Result<Arc<dyn Hub>> {
    if config.demo {
        info!("Using built-in demo data");
        return Ok(Arc::new(DemoHub::new()));
    }
    rest_hub(config)
}

#[cfg(feature = "hub_rest")]
fn rest_hub(config: &HubConfig) -> anyhow::Result<Arc<dyn Hub>> {
    let url = config.url.as_deref().context("hub.url is not set")?;
    let token = config.resolve_token();
    if token.is_none() {
        warn!("No hub token configured; requests are sent without Authorization");
    }

    let rest = RestHub::new(url, token, config.timeout()).context("failed to create hub client")?;
    if config.demo_fallback {
        Ok(Arc::new(FallbackHub::new(Box::new(rest))))
    } else {
        Ok(Arc::new(rest))
    }
}

#[cfg(not(feature = "hub_rest"))]
fn rest_hub(_config: &HubConfig) -> anyhow::Result<Arc<dyn Hub>> {
    anyhow::bail!("built without the hub_rest feature; set hub.demo = true")
}

async fn discover(app: &App, lights: bool, suggest: bool) -> anyhow::Result<()> {
    let states = app.hub()?.states().await.context("failed to fetch states")?;
    let entities = if lights {
        discovery::discover_lights(&states)
    } else {
        discovery::discover_entities(&states)
    };

    if suggest {
        for (room, group) in discovery::suggest_room_groups(&entities) {
            println!("{} {} ({})", room_icon(room), room, group.len());
            for entity in group {
                println!("  {} | {}", entity.entity_id, entity.friendly_name);
            }
        }
    } else {
        print!(
            "{}",
            discovery::render_categories(&discovery::device_categories(&entities))
        );
    }
    Ok(())
}

fn rooms(app: &App, cmd: RoomsSubcommand) -> anyhow::Result<()> {
    let mut mapper = app.mapper()?;
    match cmd {
        RoomsSubcommand::List => {
            for room in mapper.rooms() {
                println!("{} {} [{}]", room.icon, room.name, room.id);
                for entity_id in &room.entities {
                    println!("  {}", entity_id);
                }
            }
        }
        RoomsSubcommand::Add { name, icon } => {
            let id = mapper.add_room(&name, icon.as_deref().unwrap_or(""))?;
            println!("Added room {}", id);
        }
        RoomsSubcommand::Edit {
            room_id,
            name,
            icon,
        } => {
            let room = mapper
                .room(&room_id)
                .with_context(|| format!("no room '{}'", room_id))?;
            let name = name.unwrap_or_else(|| room.name.clone());
            let icon = icon.unwrap_or_else(|| room.icon.clone());
            mapper.update_room(&room_id, &name, &icon)?;
            println!("Updated room {}", room_id);
        }
        RoomsSubcommand::Delete { room_id } => {
            mapper.delete_room(&room_id)?;
            println!("Deleted room {}", room_id);
        }
        RoomsSubcommand::Clear => {
            mapper.clear_all()?;
            println!("Cleared all rooms and mappings");
        }
        RoomsSubcommand::Presets => {
            let added = mapper.add_preset_rooms()?;
            println!("Added {} preset rooms", added);
        }
    }
    Ok(())
}

fn export(app: &App, rooms_only: bool, output: Option<PathBuf>) -> anyhow::Result<()> {
    let mapper = app.mapper()?;
    let json = if rooms_only {
        mapper.export_rooms()?
    } else {
        mapper.export_configuration()?
    };

    // Rooms-only exports default to a dated file name
    let output = output.or_else(|| {
        rooms_only.then(|| PathBuf::from(export_file_name(Utc::now().date_naive())))
    });
    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn status(app: &App) -> anyhow::Result<()> {
    let dashboard = app.dashboard().await?;

    for room in dashboard.rooms() {
        let active = if room.has_active_devices { "on" } else { "off" };
        println!(
            "{} {} {} ({:.0} W)",
            room.icon,
            room.name,
            status_icon(active),
            room.energy_watts()
        );
        for light in &room.lights {
            println!(
                "  {} {} {}%",
                if light.is_on { "●" } else { "○" },
                light.name,
                light.brightness
            );
        }
    }

    println!();
    println!("Active lights: {}", dashboard.active_lights_count());
    println!("Estimated load: {:.2} kW", dashboard.total_energy_kw());

    for system in dashboard.systems() {
        println!(
            "{} {} {} {}",
            system.icon,
            system.name,
            status_icon(&system.status),
            system.description
        );
        for sensor in &system.sensors {
            println!(
                "  {} {} ({}) {}",
                sensor.icon,
                sensor.name,
                sensor.location,
                status_icon(&sensor.status)
            );
        }
    }
    Ok(())
}

async fn light(app: &App, cmd: LightSubcommand) -> anyhow::Result<()> {
    let hub = app.hub()?;
    match cmd {
        LightSubcommand::On { entity, brightness } => hub.turn_on(&entity, brightness).await?,
        LightSubcommand::Off { entity } => hub.turn_off(&entity).await?,
        LightSubcommand::Toggle { entity } => hub.toggle(&entity).await?,
        LightSubcommand::Brightness { entity, pct } => hub.set_brightness(&entity, pct).await?,
        LightSubcommand::AllOn => hub.all_lights_on().await?,
        LightSubcommand::AllOff => hub.all_lights_off().await?,
    }
    Ok(())
}

fn theme(app: &App, cmd: ThemeSubcommand) -> anyhow::Result<()> {
    let mut store = ThemeStore::load(app.storage.clone())?;
    match cmd {
        ThemeSubcommand::List => {
            let current = store.current().id;
            for theme in &THEMES {
                let marker = if theme.id == current { "*" } else { " " };
                println!("{} {:<8} {}", marker, theme.id, theme.name);
            }
        }
        ThemeSubcommand::Set { id } => {
            let theme = store.set_theme(&id)?;
            println!("Theme set to {}", theme.name);
        }
        ThemeSubcommand::Show => {
            let theme = store.current();
            println!("{} ({})", theme.name, theme.id);
            print!("{}", css_variables(theme));
        }
    }
    Ok(())
}

async fn setup(app: &App, args: SetupArgs) -> anyhow::Result<()> {
    if let Some(previous) = SetupRecord::load(app.storage.as_ref())? {
        info!("Setup was already completed at {}; running again", previous.setup_completed);
    }

    let states = app.hub()?.states().await.context("failed to fetch states")?;
    let mut themes = ThemeStore::load(app.storage.clone())?;
    let mut wizard = SetupWizard::new(
        discovery::persons(&states),
        discovery::discover_entities(&states),
        themes.current().id,
    );

    if let Some(person) = &args.person {
        wizard.select_person(person)?;
    }
    if let Some(theme) = &args.theme {
        wizard.select_theme(theme)?;
    }
    if args.all_devices {
        for category in wizard.categories() {
            wizard.select_all_in_category(category.domain);
        }
    }
    for device in &args.devices {
        wizard.toggle_device(device)?;
    }
    for room in &args.rooms {
        if !wizard.add_custom_room(room) {
            warn!("Skipping room '{}': empty or already present", room);
        }
    }

    while wizard.step() != SetupStep::Complete {
        let step = wizard.next_step(&mut themes)?;
        info!("{} {}", step.icon(), step.title());
    }

    let mut mapper = app.mapper()?;
    let record = wizard.finish(&mut themes, &mut mapper, app.storage.as_ref())?;
    println!(
        "Setup complete: {} devices, {} rooms, theme {}",
        record.selected_device_count,
        record.rooms.len(),
        record.selected_theme
    );
    Ok(())
}

async fn sync_once(dashboard: &Mutex<Dashboard>) {
    let hub = dashboard.lock().await.hub().clone();
    let states = match hub.states().await {
        Ok(states) => states,
        Err(e) => {
            warn!("Sync failed: {}", e);
            return;
        }
    };

    let mut dashboard = dashboard.lock().await;
    let changed = dashboard.apply_states(&states);
    for entity_id in changed {
        let light = dashboard
            .rooms()
            .iter()
            .flat_map(|r| &r.lights)
            .find(|l| l.id == entity_id);
        if let Some(light) = light {
            info!(
                "{} is now {} at {}%",
                light.id,
                if light.is_on { "on" } else { "off" },
                light.brightness
            );
        }
    }
}

async fn sync_loop(dashboard: Arc<Mutex<Dashboard>>, interval: std::time::Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        sync_once(&dashboard).await;
    }
}

async fn watch(app: &App) -> anyhow::Result<()> {
    let dashboard = Arc::new(Mutex::new(app.dashboard().await?));
    info!(
        "Watching every {}s, press Ctrl+C to exit",
        app.config.sync.interval_secs
    );

    tokio::select! {
        _ = sync_loop(dashboard, app.config.sync.interval()) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for shutdown signal")?;
            info!("Received shutdown signal");
        }
    }
    Ok(())
}

async fn serve(app: &App) -> anyhow::Result<()> {
    let dashboard = Arc::new(Mutex::new(app.dashboard().await?));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let mut server = tokio::spawn(api::serve(
        app.config.api.listen.clone(),
        app.config.api.port,
        dashboard.clone(),
        shutdown_rx,
    ));
    let sync = tokio::spawn(sync_loop(dashboard, app.config.sync.interval()));

    info!("Press Ctrl+C to exit");
    tokio::select! {
        // Only returns early if the server failed to start
        result = &mut server => {
            sync.abort();
            return result.context("HTTP API task panicked")?;
        }
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Received shutdown signal"),
                Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
            }
            shutdown_tx.send(()).ok();
        }
    }

    sync.abort();
    server.await.context("HTTP API task panicked")??;
    info!("homeboard shutdown complete");
    Ok(())
}
