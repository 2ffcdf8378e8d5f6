use anyhow::Result;
use hitbloq_api::endpoints::LevelKey;
use hitbloq_config::{Settings, ViewedEventsStore};
use itertools::Itertools;
use std::sync::Arc;
use std::time::Duration;

use crate::background::{data_loader::DataLoader, source::ApiSource};
use crate::cache::Cache;
use crate::commands::executor;
use crate::events::PanelCommand;
use crate::logging::init_logging;
use crate::panel::Panel;
use crate::state::{LeaderboardSource, PanelSelection, Slot};

/// What the binary was asked to show
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub level: LevelKey,
    pub pool: Option<String>,
    pub source: LeaderboardSource,
    pub page: u32,
    /// Keep running and refresh periodically instead of exiting once loaded
    pub watch: bool,
    pub interval: Duration,
}

pub struct App {
    settings: Settings,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub async fn run(&self, options: RunOptions) -> Result<()> {
        let (log_path, _guard) = init_logging()?;
        tracing::info!("hitbloq-sync starting, logging to {}", log_path.display());

        let mut panel = self.init_panel().await;

        let selection = PanelSelection {
            level: Some(options.level.clone()),
            pool: options.pool.clone(),
            source: options.source,
            page: options.page,
        };
        if let Err(e) = panel.apply_selection(selection) {
            tracing::warn!("Initial selection incomplete: {}", e);
        }

        if panel.is_settled() {
            self.show(&mut panel);
            if !options.watch {
                panel.teardown();
                return Ok(());
            }
        }

        tracing::info!("Entering main event loop");

        let mut refresh = tokio::time::interval(options.interval);
        // First tick completes immediately; the initial selection already loads everything
        refresh.tick().await;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, exiting event loop");
                    break;
                }
                _ = refresh.tick(), if options.watch => {
                    for slot in [Slot::RankInfo, Slot::Leaderboard, Slot::Event] {
                        if let Err(e) = executor::execute_command(PanelCommand::Refresh { slot }, &mut panel) {
                            tracing::warn!("Refresh of {} not started: {}", slot, e);
                        }
                    }
                }
                outcome = panel.process_next(), if !panel.is_settled() => {
                    tracing::debug!("Reconciled: {:?}", outcome);
                    if panel.is_settled() {
                        self.show(&mut panel);
                        if !options.watch {
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Cleaning up");
        if let Err(e) = executor::execute_command(PanelCommand::Teardown, &mut panel) {
            tracing::warn!("Teardown failed: {}", e);
        }

        Ok(())
    }

    async fn init_panel(&self) -> Panel {
        let source = Arc::new(ApiSource::with_base_url(&self.settings.api_url));
        let mut loader = DataLoader::new(source, &self.settings);
        match Cache::new().await {
            Ok(cache) => loader = loader.with_cache(Arc::new(cache)),
            Err(e) => tracing::warn!("Pool cache disabled: {}", e),
        }

        let panel = Panel::new(&loader);
        match ViewedEventsStore::new() {
            Ok(store) => panel.with_viewed_events(store),
            Err(e) => {
                tracing::warn!("Viewed events will not be remembered: {}", e);
                panel
            }
        }
    }

    fn show(&self, panel: &mut Panel) {
        println!("{}\n", render_panel(panel));
        if panel.view().show_event_modal {
            let _ = executor::execute_command(PanelCommand::DismissEventModal, panel);
        }
    }
}

/// Plain-text rendering of the panel
pub fn render_panel(panel: &Panel) -> String {
    let view = panel.view();
    let selection = panel.selection();
    let mut lines = Vec::new();

    if let Some(level) = &selection.level {
        lines.push(format!("Level: {}", level));
    }
    lines.push(format!("Pools: {}", view.pool_labels().iter().join(", ")));
    if let Some(pool) = &selection.pool {
        lines.push(format!("Pool: {}", pool));
    }
    if let Some(ranking) = view.pool_ranking_text() {
        lines.push(format!("Rank: {}", ranking));
    } else if !view.prompt_text.is_empty() {
        lines.push(view.prompt_text.clone());
    }

    let logo = if view.cute_mode { " (=^・ω・^=)" } else { "" };
    lines.push(format!(
        "{} leaderboard, page {}{}",
        selection.source.display_name(),
        selection.page + 1,
        logo
    ));
    let rows = view.rows();
    if rows.is_empty() {
        lines.push("  No scores".to_string());
    }
    for row in rows {
        let cr = row.cr.map(|cr| format!("{:.2}cr", cr)).unwrap_or_default();
        lines.push(format!(
            "{:>6}  {:<24} {:>9} {:>6.2}% {}",
            row.rank, row.username, row.score, row.accuracy, cr
        ));
    }

    if let Some(event) = &view.event {
        lines.push(format!("Event: {}", event.title));
        if view.show_event_modal && !event.description.is_empty() {
            lines.push(event.description.clone());
        }
    }
    if let Some(summary) = view.failure_summary() {
        lines.push(format!("Errors: {}", summary));
    }

    lines.join("\n")
}
