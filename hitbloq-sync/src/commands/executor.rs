use crate::error::DispatchError;
use crate::events::PanelCommand;
use crate::panel::Panel;
use crate::state::PanelSelection;

/// Execute a panel command, starting whatever fetches the new selection needs
pub fn execute_command(command: PanelCommand, panel: &mut Panel) -> Result<(), DispatchError> {
    let selection = panel.selection();

    match command {
        // A new level has its own pools; the pool follows once they load
        PanelCommand::SelectLevel { level } => panel.apply_selection(PanelSelection {
            level,
            pool: None,
            page: 0,
            ..selection
        }),

        PanelCommand::SelectPool { pool } => panel.apply_selection(PanelSelection {
            pool: Some(pool),
            ..selection
        }),

        PanelCommand::SelectSource { source } => panel.apply_selection(PanelSelection {
            source,
            page: 0,
            ..selection
        }),

        PanelCommand::NextPage => {
            if !panel.view().down_enabled(&selection) {
                tracing::debug!("Already on the last page");
                return Ok(());
            }
            let page = selection.page + 1;
            panel.apply_selection(PanelSelection { page, ..selection })
        }

        PanelCommand::PreviousPage => {
            if !panel.view().up_enabled(&selection) {
                tracing::debug!("Already on the first page");
                return Ok(());
            }
            let page = selection.page - 1;
            panel.apply_selection(PanelSelection { page, ..selection })
        }

        PanelCommand::SelectPage { page } => {
            if !selection.source.is_scrollable() {
                return Err(DispatchError::InvalidSelection(format!(
                    "{} leaderboard has no pages",
                    selection.source.display_name()
                )));
            }
            panel.apply_selection(PanelSelection { page, ..selection })
        }

        PanelCommand::Refresh { slot } => panel.refresh(slot),

        PanelCommand::DismissEventModal => {
            panel.dismiss_event_modal();
            Ok(())
        }

        PanelCommand::Teardown => {
            panel.teardown();
            Ok(())
        }
    }
}
