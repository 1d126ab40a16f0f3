//! `/profile`: shows the caller's stored profile, with a refresh button.

pub mod run;
pub mod ui;

use crate::dispatch::CommandModule;

pub fn module() -> CommandModule {
    CommandModule::new("profile")
        .command(run::ProfileCommand)
        .component(ui::FAMILY, run::RefreshProfile)
}
