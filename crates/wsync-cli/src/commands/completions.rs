//! `wsync completions <shell>`
//!
//! Usage: `wsync completions zsh > ~/.zfunc/_wsync`

use std::io::{self, Write};

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::Shell;

use crate::output::OutputFormat;

const BIN_NAME: &str = "wsync";

/// Arguments for the completions subcommand
#[derive(Debug, clap::Args)]
pub struct CompletionsCommand {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsCommand {
    /// Prints the completion script to stdout; `--json` has no effect here
    pub async fn execute(&self, _format: OutputFormat) -> Result<()> {
        let stdout = io::stdout();
        render(self.shell, &mut stdout.lock());
        Ok(())
    }
}

fn render(shell: Shell, out: &mut dyn Write) {
    let mut cmd = crate::Cli::command();
    clap_complete::generate(shell, &mut cmd, BIN_NAME, out);
}
