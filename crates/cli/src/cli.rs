use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::{Path, PathBuf};

/// capture-agent: per-node packet capture controller
///
/// capture-agent watches the pods scheduled on one node and runs a rotating
/// tcpdump inside the network namespace of every pod annotated with
/// `tcpdump.antrea.io=<N>`, keeping at most N capture files per pod.
#[derive(Debug, Parser, Clone)]
#[command(about, long_about, version)]
pub struct Cli {
    /// Path to configuration file.
    ///
    /// If not provided, the default locations are checked. They are
    /// `/etc/capture-agent/config.toml` and
    /// `/etc/capture-agent/config.d/*.toml`, where the latter being a glob
    /// pattern. If they don't exist, the default configuration is used.
    #[arg(short, long, value_parser = validate_file)]
    pub config: Option<PathBuf>,

    /// Name of the node whose pods are watched.
    #[arg(short, long, env = "NODE_NAME", value_parser = validate_node_name)]
    pub node_name: String,

    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

/// Check if the file exists.
#[inline(always)]
fn validate_file(file: &str) -> Result<PathBuf, String> {
    let path = Path::new(file);
    if path.exists() {
        Ok(path.to_owned())
    } else {
        Err(format!("File not found: {:?}", path))
    }
}

/// Node names are DNS subdomains: lowercase alphanumerics, `-` and `.`,
/// starting and ending with an alphanumeric, at most 253 characters.
#[inline(always)]
fn validate_node_name(name: &str) -> Result<String, String> {
    if name.is_empty() {
        return Err("node name must not be empty".to_string());
    }
    if name.len() > 253 {
        return Err("node name must be at most 253 characters".to_string());
    }
    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.';
    let edge = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !name.chars().all(allowed) || !edge(name.chars().next()) || !edge(name.chars().last()) {
        return Err(format!("`{name}` is not a valid node name"));
    }
    Ok(name.to_owned())
}
