//! Process configuration: environment variables with `clap` flags layered
//! on top as overrides, rather than introducing a separate config-file
//! format.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "graphqueue", about = "Persistent job queue for the graph runner")]
pub struct Args {
    /// Data root; overrides $VIDEO_QUEUE_ROOT.
    #[arg(long, env = "VIDEO_QUEUE_ROOT")]
    pub root: Option<PathBuf>,

    /// Workflow definition directory; overrides $WORKFLOW_DEFS_DIR.
    #[arg(long, env = "WORKFLOW_DEFS_DIR")]
    pub workflow_defs_dir: Option<PathBuf>,

    /// Base URL of the upstream graph runner HTTP service.
    #[arg(long, env = "GRAPHQUEUE_UPSTREAM_URL", default_value = "http://127.0.0.1:8188")]
    pub upstream_url: String,

    /// The graph runner's own input directory, if different from ours.
    /// Staged files are written under `{upstream_input_root}/staging/...`.
    #[arg(long, env = "GRAPHQUEUE_UPSTREAM_INPUT_ROOT")]
    pub upstream_input_root: Option<PathBuf>,

    /// HTTP listen address.
    #[arg(long, env = "GRAPHQUEUE_LISTEN", default_value = "127.0.0.1:8787")]
    pub listen: String,

    /// Enable verbose (debug) logging regardless of $RUST_LOG.
    #[arg(long)]
    pub verbose: bool,
}

/// Resolved configuration: env/flags merged with documented defaults.
pub struct Config {
    pub root: PathBuf,
    pub workflow_defs_dir: PathBuf,
    pub upstream_url: String,
    pub upstream_input_root: Option<PathBuf>,
    pub listen: String,
    pub verbose: bool,
}

impl Config {
    pub fn from_args(args: Args) -> Self {
        let root = args.root.unwrap_or_else(graphqueue_logging::data_root);
        let workflow_defs_dir = args
            .workflow_defs_dir
            .unwrap_or_else(|| root.join("workflow_defs_v2"));

        Self {
            root,
            workflow_defs_dir,
            upstream_url: args.upstream_url,
            upstream_input_root: args.upstream_input_root,
            listen: args.listen,
            verbose: args.verbose,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join("data").join("queue.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(root: PathBuf) -> Args {
        Args {
            root: Some(root),
            workflow_defs_dir: None,
            upstream_url: "http://127.0.0.1:8188".into(),
            upstream_input_root: None,
            listen: "127.0.0.1:8787".into(),
            verbose: false,
        }
    }

    #[test]
    fn workflow_defs_dir_defaults_under_root() {
        let config = Config::from_args(args(PathBuf::from("/tmp/gq-root")));
        assert_eq!(config.workflow_defs_dir, PathBuf::from("/tmp/gq-root/workflow_defs_v2"));
    }

    #[test]
    fn explicit_workflow_defs_dir_overrides_default() {
        let mut a = args(PathBuf::from("/tmp/gq-root"));
        a.workflow_defs_dir = Some(PathBuf::from("/elsewhere/defs"));
        let config = Config::from_args(a);
        assert_eq!(config.workflow_defs_dir, PathBuf::from("/elsewhere/defs"));
    }

    #[test]
    fn db_path_lives_under_root_data() {
        let config = Config::from_args(args(PathBuf::from("/tmp/gq-root")));
        assert_eq!(config.db_path(), PathBuf::from("/tmp/gq-root/data/queue.db"));
    }
}
