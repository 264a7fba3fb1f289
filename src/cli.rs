use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mkvpriority")]
#[command(author, version, about = "Audio/subtitle track prioritization for mkv files")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process files or directories in batch mode
    Run {
        /// Files or directories to process; append ::TAG to select a
        /// tagged profile (e.g. /media/anime::anime)
        #[arg(required = true)]
        paths: Vec<String>,

        /// Show what would be done without executing
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Write archived original flags back instead of applying profiles
        #[arg(long, conflicts_with = "dry_run")]
        restore: bool,

        /// Drop archive entries whose files no longer exist
        #[arg(long)]
        prune: bool,

        /// Rewrite containers so tracks are stored in score order
        #[arg(long)]
        reorder: bool,

        /// Drop tracks whose language is absent from the profile tables
        #[arg(long)]
        strip: bool,
    },

    /// Start the webhook receiver and re-scan scheduler
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration and profile files
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

/// Split the `PATH::TAG` argument syntax.
pub fn split_path_tag(arg: &str) -> (PathBuf, Option<String>) {
    match arg.rsplit_once("::") {
        Some((path, tag)) if !path.is_empty() && !tag.is_empty() => {
            (PathBuf::from(path), Some(tag.to_string()))
        }
        _ => (PathBuf::from(arg), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path_has_no_tag() {
        let (path, tag) = split_path_tag("/media/movie.mkv");
        assert_eq!(path, PathBuf::from("/media/movie.mkv"));
        assert_eq!(tag, None);
    }

    #[test]
    fn tagged_path_splits() {
        let (path, tag) = split_path_tag("/media/anime/ep1.mkv::anime");
        assert_eq!(path, PathBuf::from("/media/anime/ep1.mkv"));
        assert_eq!(tag.as_deref(), Some("anime"));
    }

    #[test]
    fn trailing_separator_is_not_a_tag() {
        let (path, tag) = split_path_tag("/media/movie.mkv::");
        assert_eq!(path, PathBuf::from("/media/movie.mkv::"));
        assert_eq!(tag, None);
    }
}
