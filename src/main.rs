use std::process::ExitCode;

use clap::{Parser, Subcommand};

use splice::commands::{add, merge, pull, push, split};
use splice::git::GitError;
use splice::trace;

/// Subtree history splicer
///
/// splice projects a subdirectory of a git repository into its own
/// independent commit history, and conversely injects a subtree's
/// history into a subdirectory of a mainline.
///
/// QUICK START:
///
///   # vendor a library, squashing its history
///   splice add --prefix=vendor/lib --squash https://example.com/lib.git main
///
///   # later, pick up upstream changes
///   splice pull --prefix=vendor/lib --squash https://example.com/lib.git main
///
///   # extract local changes as a standalone history and publish them
///   splice push --prefix=vendor/lib https://example.com/lib.git feature
///
/// The split engine is idempotent: running `splice split` twice with the
/// same flags produces the same commit ids, and `--rejoin` records the
/// result so future splits stop at the recorded point instead of
/// re-walking all of history.
#[derive(Parser)]
#[command(name = "splice")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'splice <command> --help' for more information on a specific command.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Suppress progress and confirmations
    #[arg(long, global = true)]
    quiet: bool,

    /// Log every classification and rewrite decision
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a commit or remote history as a new subtree
    Add(add::AddArgs),

    /// Merge recent subtree changes into the prefix directory
    Merge(merge::MergeArgs),

    /// Fetch and merge remote subtree history
    Pull(pull::PullArgs),

    /// Split the prefix history and push it to a remote
    Push(push::PushArgs),

    /// Extract the prefix directory's history as a standalone branch
    Split(split::SplitArgs),
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version are not failures; everything else is a
            // user-input error (exit 1, not clap's default 2).
            let is_help = matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            );
            let _ = err.print();
            return if is_help {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            };
        }
    };

    trace::init(cli.quiet, cli.debug);

    let result = match &cli.command {
        Commands::Add(args) => add::run(args, cli.quiet),
        Commands::Merge(args) => merge::run(args, cli.quiet),
        Commands::Pull(args) => pull::run(args, cli.quiet),
        Commands::Push(args) => push::run(args, cli.quiet),
        Commands::Split(args) => split::run(args, cli.quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

/// Map failures to the documented exit codes: 126 when git itself is not
/// available, 1 for everything else.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    let unreachable_git = err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<GitError>(),
            Some(GitError::NotDiscoverable(_))
        )
    });
    if unreachable_git { 126 } else { 1 }
}
