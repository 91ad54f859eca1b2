use clap::{Parser, Subcommand};

/// speechgate — token-authenticated text-to-speech gateway
#[derive(Parser)]
#[command(name = "speechgate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to bind (overrides the PORT env var)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage API tokens against the local store
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a credential for a new identifier
    Add {
        id: String,
        /// Requests-per-minute budget (defaults to DEFAULT_RATE_LIMIT)
        #[arg(long)]
        rate_limit: Option<u32>,
    },
    /// List stored records (hashes only)
    List,
    /// Delete a record by identifier or raw secret
    Revoke { value: String },
}
