//! Stock `umbra` binary: control-plane commands against a database.
//!
//! `migrate` subcommands need projector declarations and therefore an
//! embedding application; see the crate docs.

use umbra::MigrationSet;
use umbra_cli::CliApp;

fn main() -> anyhow::Result<()> {
    CliApp::new(MigrationSet::new()).run()
}
