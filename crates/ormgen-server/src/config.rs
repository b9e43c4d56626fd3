//! Server configuration.

use std::path::PathBuf;

use clap::Parser;
use ormgen_core::{ActionMask, StorageConfig};

/// ormgen HTTP/JSON server command line arguments.
#[derive(Debug, Parser)]
#[command(name = "ormgen-server")]
#[command(about = "HTTP/JSON CRUD views generated from an ormgen schema")]
pub struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Schema bundle (JSON) describing entities and relations.
    #[arg(short, long, default_value = "schema.json")]
    pub schema: PathBuf,

    /// Directory holding the sled database.
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Use a temporary database that is removed on exit.
    #[arg(long, conflicts_with = "data_dir")]
    pub temporary: bool,

    /// Scaffold configuration file (JSON).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Actions to route for every model, as a 5-bit mask (decimal or 0b...):
    /// create, delete, update, detail, list from the high bit down.
    #[arg(long, default_value = "0b11111")]
    pub actions: ActionMask,

    /// Page cache capacity in bytes.
    #[arg(long, default_value_t = 256 * 1024 * 1024)]
    pub cache_capacity: u64,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on for HTTP requests.
    pub listen_addr: String,
    /// Schema bundle path.
    pub schema_path: PathBuf,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Scaffold configuration path.
    pub config_path: Option<PathBuf>,
    /// Actions routed for every model.
    pub action_mask: ActionMask,
}

impl From<&Args> for ServerConfig {
    fn from(args: &Args) -> Self {
        let storage = match (&args.data_dir, args.temporary) {
            (Some(dir), false) => StorageConfig::new(dir),
            (None, false) => StorageConfig::default(),
            (_, true) => StorageConfig::temporary(),
        };

        Self {
            listen_addr: args.listen.clone(),
            schema_path: args.schema.clone(),
            storage: storage.with_cache_capacity(args.cache_capacity),
            config_path: args.config.clone(),
            action_mask: args.actions,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            schema_path: PathBuf::from("schema.json"),
            storage: StorageConfig::default(),
            config_path: None,
            action_mask: ActionMask::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_to_config() {
        let args = Args::parse_from(["ormgen-server", "--temporary", "--actions", "0b00011"]);
        let config = ServerConfig::from(&args);
        assert!(config.storage.temporary);
        assert_eq!(config.action_mask, ActionMask(0b00011));
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_decimal_mask_and_data_dir() {
        let args = Args::parse_from(["ormgen-server", "-d", "/tmp/blog", "--actions", "3"]);
        let config = ServerConfig::from(&args);
        assert_eq!(config.storage.path, PathBuf::from("/tmp/blog"));
        assert_eq!(config.action_mask, ActionMask(3));
    }

    #[test]
    fn test_bad_mask_rejected() {
        assert!(Args::try_parse_from(["ormgen-server", "--actions", "0b2"]).is_err());
    }
}
