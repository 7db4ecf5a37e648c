use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use frontend::execution_output::{DEFAULT_OUTPUT_POLL, follow_output};
use frontend::{
    CollectionSpec, CollectionView, EventBus, FollowEnd, OutputCancel, SortKey, ViewOptions,
};
use log::{debug, info};
use shared::{AppConfig, LauncherAction};
use tokio::task::LocalSet;

mod config;
mod http_transport;
mod terminal;

use http_transport::HttpTransport;
use terminal::{RowLayout, TerminalSink};

type TerminalView = CollectionView<HttpTransport, TerminalSink>;

#[derive(Parser)]
#[command(name = "fleetdeck")]
#[command(about = "Live dashboard for launcher machines and their Rundeck executions")]
struct Cli {
    /// Config file (defaults to <config dir>/fleetdeck/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `server.base_url` from the config
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Print frames and notifications as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Name,
    Status,
}

impl From<SortArg> for SortKey {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Name => SortKey::Name,
            SortArg::Status => SortKey::Status,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the launcher table, following live updates
    Launchers {
        #[arg(long, short)]
        filter: Option<String>,

        #[arg(long, value_enum, default_value = "name")]
        sort: SortArg,

        #[arg(long)]
        desc: bool,

        /// 1-based page number
        #[arg(long, default_value = "1")]
        page: usize,

        #[arg(long)]
        page_size: Option<usize>,

        /// Only show members of this group
        #[arg(long)]
        group: Option<String>,

        /// Print one page and exit
        #[arg(long)]
        once: bool,
    },
    /// Show recent Rundeck executions, newest first
    Executions {
        #[arg(long, short)]
        filter: Option<String>,

        #[arg(long, default_value = "1")]
        page: usize,

        #[arg(long)]
        page_size: Option<usize>,

        #[arg(long)]
        once: bool,
    },
    /// List launcher groups
    Groups,
    /// Run an action on one or more launchers, or on a whole group
    Action {
        #[arg(value_parser = parse_action)]
        action: LauncherAction,

        machines: Vec<String>,

        #[arg(long, conflicts_with = "machines")]
        group: Option<String>,
    },
    /// Delete a launcher
    Delete { machine: String },
    /// Follow the log output of one execution
    Output { execution_id: String },
    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        write: bool,
    },
}

fn parse_action(value: &str) -> Result<LauncherAction, String> {
    value.parse()
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    if let Err(e) = LocalSet::new().run_until(run(cli)).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.server.base_url = base_url;
    }
    let json = cli.json;

    match cli.command {
        Commands::Config { write } => {
            print!("{}", toml::to_string_pretty(&config).context("Failed to serialize config")?);
            if write {
                let path = match cli.config {
                    Some(path) => path,
                    None => config::default_config_path().context("Could not find config directory")?,
                };
                config::save_config(&path, &config)?;
                info!("Config written to {}", path.display());
            }
            Ok(())
        }
        Commands::Launchers {
            filter,
            sort,
            desc,
            page,
            page_size,
            group,
            once,
        } => {
            let view = open_view(&config, CollectionSpec::launchers(), RowLayout::Launchers, json)?;
            let bus = EventBus::new();
            mount_quietly(&view, &bus).await;

            if let Some(group) = group {
                view.load_groups().await?;
                view.select_group(&group).await?;
            }
            if let Some(query) = filter {
                view.set_filter(&query);
            }
            let sort = SortKey::from(sort);
            if view.state().view.sort_key != sort {
                view.set_sort(sort);
            }
            if desc {
                view.set_sort(sort);
            }
            show(&view, page, page_size);
            follow(&view, &bus, once).await
        }
        Commands::Executions {
            filter,
            page,
            page_size,
            once,
        } => {
            let spec = CollectionSpec::executions(config.executions.limit, config.executions.cap);
            let view = open_view(&config, spec, RowLayout::Executions, json)?;
            let bus = EventBus::new();
            mount_quietly(&view, &bus).await;

            if let Some(query) = filter {
                view.set_filter(&query);
            }
            show(&view, page, page_size);
            follow(&view, &bus, once).await
        }
        Commands::Groups => {
            let transport = Rc::new(HttpTransport::new(&config.server)?);
            let view = CollectionView::new(
                CollectionSpec::launchers(),
                transport,
                TerminalSink::new(RowLayout::Launchers, json),
                ViewOptions::from_config(&config),
            );
            view.load_groups().await?;
            for group in &view.state().groups {
                let members = group
                    .member_count
                    .map(|count| format!(" ({} members)", count))
                    .unwrap_or_default();
                println!("{}  {}{}", group.key().unwrap_or_default(), group.name, members);
            }
            Ok(())
        }
        Commands::Action {
            action,
            machines,
            group,
        } => {
            let view = open_view(&config, CollectionSpec::launchers(), RowLayout::Launchers, json)?;
            let bus = EventBus::new();
            mount_quietly(&view, &bus).await;

            let outcome = match (group, machines.as_slice()) {
                (Some(group), _) => {
                    view.select_group(&group).await?;
                    view.run_group_action(action).await
                }
                (None, []) => bail!("Name at least one machine or pass --group"),
                (None, [machine]) => view.submit_action(machine, action).await,
                (None, many) => {
                    for machine in many {
                        view.toggle_selected(machine);
                    }
                    view.submit_bulk(action).await
                }
            };
            view.teardown();
            let outcome = outcome?;
            debug!("Queued {:?}, skipped {:?}", outcome.queued_keys(), outcome.skipped_keys());
            Ok(())
        }
        Commands::Delete { machine } => {
            let view = open_view(&config, CollectionSpec::launchers(), RowLayout::Launchers, json)?;
            let bus = EventBus::new();
            mount_quietly(&view, &bus).await;
            let deleted = view.delete(&machine).await;
            view.teardown();
            Ok(deleted?)
        }
        Commands::Output { execution_id } => {
            let transport = HttpTransport::new(&config.server)?;
            let sink = TerminalSink::new(RowLayout::Executions, json);
            let every = match config.executions.output_poll_ms {
                0 => DEFAULT_OUTPUT_POLL,
                ms => Duration::from_millis(ms),
            };

            let cancel = OutputCancel::new();
            let on_interrupt = cancel.clone();
            tokio::task::spawn_local(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            match follow_output(&transport, &sink, &execution_id, every, &cancel).await {
                FollowEnd::Completed | FollowEnd::Cancelled => Ok(()),
                FollowEnd::Unavailable(message) => bail!(message),
            }
        }
    }
}

fn open_view(
    config: &AppConfig,
    spec: CollectionSpec,
    layout: RowLayout,
    json: bool,
) -> Result<TerminalView> {
    let transport = Rc::new(HttpTransport::new(&config.server)?);
    let sink = TerminalSink::new(layout, json);
    sink.set_muted(true);
    Ok(CollectionView::new(spec, transport, sink, ViewOptions::from_config(config)))
}

/// Mount without printing the intermediate frames. A failed initial load was
/// already reported to the sink; polling retries it.
async fn mount_quietly(view: &TerminalView, bus: &EventBus) {
    if let Err(e) = view.mount(bus).await {
        debug!("Initial load failed: {}", e);
    }
}

fn show(view: &TerminalView, page: usize, page_size: Option<usize>) {
    if let Some(page_size) = page_size {
        view.set_page_size(page_size);
    }
    view.sink().set_muted(false);
    view.set_page(page.saturating_sub(1));
}

/// Keep the view live until interrupted, or tear it down right away.
async fn follow(view: &TerminalView, bus: &EventBus, once: bool) -> Result<()> {
    if !once {
        info!("Following live updates, press Ctrl-C to stop");
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
    }
    view.teardown();
    bus.disconnect();
    Ok(())
}
