use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a transfer. Resumes it when the resume state file holds a saved
    /// state.
    Run {
        #[arg(help = "Transfer config file (.yml, .yaml or .json)")]
        config: PathBuf,

        #[arg(
            short = 'r',
            long = "resume-state",
            help = "Keep a failed transfer resumable by saving its state to this file"
        )]
        resume_state: Option<PathBuf>,

        #[arg(
            short = 'o',
            long = "output",
            help = "Write the next config to this file after a commit"
        )]
        output: Option<PathBuf>,
    },
    /// Delete what the committed tasks of a failed transfer left behind.
    Cleanup {
        #[arg(help = "Transfer config file (.yml, .yaml or .json)")]
        config: PathBuf,

        #[arg(short = 'r', long = "resume-state", help = "Resume state file of the failed transfer")]
        resume_state: PathBuf,
    },
}
