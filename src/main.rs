use std::path::PathBuf;

use clap::{Parser, Subcommand};
use menubar_lens::common::config::Config;
use menubar_lens::common::log;

#[derive(Parser)]
#[command(version, about = "Inspect menu bar items and keep their images cached")]
struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List menu bar items from left to right.
    Items {
        /// Include items of inactive spaces.
        #[arg(long)]
        all_spaces: bool,
        /// Include items parked off screen.
        #[arg(long)]
        offscreen: bool,
        #[arg(long)]
        json: bool,
    },
    /// Check or request screen capture access.
    Permission {
        /// Probe again instead of trusting an earlier result.
        #[arg(long)]
        reset: bool,
        /// Ask the system for access.
        #[arg(long)]
        request: bool,
    },
    /// Keep the image cache fresh and log every update until interrupted.
    Watch,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    log::init(cli.verbose);
    let config = Config::load(cli.config.as_deref())?;
    platform::run(cli.command, config)
}

#[cfg(not(target_os = "macos"))]
mod platform {
    use super::{Command, Config};

    pub fn run(_command: Command, _config: Config) -> anyhow::Result<()> {
        anyhow::bail!("no platform backend for this operating system")
    }
}

#[cfg(target_os = "macos")]
mod platform {
    use std::sync::Arc;

    use anyhow::Context;
    use menubar_lens::actor::image_cache::{self, ImageCacheActor};
    use menubar_lens::actor::notification_center::NotificationCenter;
    use menubar_lens::menu_bar::permission::Probes;
    use menubar_lens::menu_bar::{
        CaptureEngine, CaptureScope, ImageCache, ItemEnumerator, PermissionOracle,
    };
    use menubar_lens::model::item_manager::partition_into_sections;
    use menubar_lens::model::{Item, ItemIdentity, ItemManager, NavigationState, SettingsPane};
    use menubar_lens::sys::geometry::{Rect, Size};
    use menubar_lens::sys::macos::{MacScreenCapture, MacWindowServer};
    use menubar_lens::sys::window_server::ScreenCapture;
    use objc2_app_kit::NSApplication;
    use objc2_foundation::MainThreadMarker;
    use parking_lot::RwLock;
    use serde::Serialize;
    use tracing::{info, warn};

    use super::{Command, Config};

    pub fn run(command: Command, config: Config) -> anyhow::Result<()> {
        let mtm = MainThreadMarker::new().context("must be started on the main thread")?;
        let server = Arc::new(MacWindowServer::new(mtm));
        let capture: Arc<dyn ScreenCapture> =
            Arc::new(MacScreenCapture::new(config.permission.request_timeout()));
        let oracle = Arc::new(PermissionOracle::new(Probes::for_system(
            server.clone(),
            capture.clone(),
            Size::new(config.permission.probe_width, config.permission.probe_height),
        )));

        match command {
            Command::Items { all_spaces, offscreen, json } => {
                let scope = CaptureScope {
                    on_screen_only: !offscreen,
                    active_space_only: !all_spaces,
                    display: None,
                };
                list_items(&config, server, scope, json)
            }
            Command::Permission { reset, request } => {
                let granted =
                    if request { oracle.request(&*capture) } else { oracle.cached_check(reset) };
                println!("{}", if granted { "granted" } else { "denied" });
                Ok(())
            }
            Command::Watch => watch(config, server, capture, oracle, mtm),
        }
    }

    #[derive(Serialize)]
    struct ItemRow<'a> {
        identity: &'a ItemIdentity,
        display_name: String,
        window_id: u32,
        frame: Rect,
        on_screen: bool,
        movable: bool,
        hideable: bool,
    }

    fn list_items(
        config: &Config,
        server: Arc<MacWindowServer>,
        scope: CaptureScope,
        json: bool,
    ) -> anyhow::Result<()> {
        let known = config.known_items();
        let items = ItemEnumerator::new(server).menu_bar_items(scope);
        let rows: Vec<ItemRow> = items
            .iter()
            .map(|item: &Item| ItemRow {
                identity: &item.identity,
                display_name: item.display_name(&known),
                window_id: item.window_id().as_u32(),
                frame: item.frame(),
                on_screen: item.is_on_screen(),
                movable: item.is_movable(&known),
                hideable: item.can_be_hidden(&known),
            })
            .collect();
        if json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
            return Ok(());
        }
        for row in rows {
            println!(
                "{:>8.1} {:>6.1}  {:<40} {}",
                row.frame.min_x(),
                row.frame.width(),
                row.identity.to_string(),
                row.display_name
            );
        }
        Ok(())
    }

    fn watch(
        config: Config,
        server: Arc<MacWindowServer>,
        capture: Arc<dyn ScreenCapture>,
        oracle: Arc<PermissionOracle>,
        mtm: MainThreadMarker,
    ) -> anyhow::Result<()> {
        let (tx, rx) = menubar_lens::actor::channel();
        let items = Arc::new(
            ItemManager::new(config.cache.recent_move_window())
                .with_change_hook(image_cache::items_changed_hook(tx.clone())),
        );
        // Stand in for a settings window showing the layout pane, so every
        // section is refreshed.
        let navigation = Arc::new(RwLock::new(NavigationState {
            is_app_frontmost: true,
            is_settings_presented: true,
            settings_pane: SettingsPane::MenuBarLayout,
            ..Default::default()
        }));
        let cache = Arc::new(ImageCache::new(
            server.clone(),
            CaptureEngine::new(capture, config.cache.capture_timeout()),
            oracle,
            items.clone(),
            navigation,
        ));
        let actor = ImageCacheActor::new(
            cache.clone(),
            rx,
            config.cache.refresh_interval(),
            config.cache.throttle(),
        );

        if !cache.permission().cached_check(false) {
            warn!("screen capture access is not granted, run `permission --request`");
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("building runtime")?;
        let enumerator = ItemEnumerator::new(server.clone());
        let sections = config.sections.clone();
        let interval = config.cache.refresh_interval();
        std::thread::Builder::new().name("watch".into()).spawn(move || {
            runtime.block_on(async move {
                tokio::spawn(actor.run());
                tokio::spawn(async move {
                    let mut tick = tokio::time::interval(interval);
                    loop {
                        tick.tick().await;
                        let all = enumerator.menu_bar_items(CaptureScope::default());
                        items.set_all(partition_into_sections(
                            &all,
                            sections.hidden_divider.as_ref(),
                            sections.always_hidden_divider.as_ref(),
                        ));
                    }
                });
                let mut generation = cache.subscribe();
                loop {
                    tokio::select! {
                        changed = generation.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            info!(images = cache.images().len(), "image cache updated");
                        }
                        _ = tokio::signal::ctrl_c() => break,
                    }
                }
                std::process::exit(0);
            })
        })?;

        let _notifications = NotificationCenter::new(tx, server, mtm);
        NSApplication::sharedApplication(mtm).run();
        Ok(())
    }
}
