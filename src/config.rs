use clap::Parser;

/// The canonical port from client.c/server.c's `#define PORT 3822`
/// (the second, CMD/CTL-prefixed variant — spec.md §9's resolution of
/// which of the two source variants is canonical).
pub const DEFAULT_PORT: u16 = 3822;

pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

pub const DEFAULT_LOG_PATH: &str = "/tmp/yashd.log";

/// Command-line arguments for the `yashd` daemon.
#[derive(Parser, Debug)]
#[command(name = "yashd", about = "Networked remote-shell daemon")]
pub struct DaemonArgs {
    /// TCP port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum number of simultaneous client sessions.
    #[arg(short = 'n', long = "max-connections", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: usize,

    /// Stay attached to the controlling terminal instead of daemonizing.
    /// Useful under a supervisor that already daemonizes, or for local
    /// testing.
    #[arg(long)]
    pub foreground: bool,

    /// Path to the per-command append log.
    #[arg(long, default_value = DEFAULT_LOG_PATH)]
    pub log_path: String,

    /// Enable verbose debug logging to stderr.
    #[arg(long)]
    pub debug: bool,
}

/// Command-line arguments for the `yash-client` terminal client.
#[derive(Parser, Debug)]
#[command(name = "yash-client", about = "Terminal client for yashd")]
pub struct ClientArgs {
    /// IPv4 address of the yashd server.
    pub server_addr: String,

    /// TCP port the server is listening on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}
