use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vantage")]
#[command(version = "0.1.0")]
#[command(about = "Asset reachability prober and service fingerprinter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe and fingerprint a single asset described on the command line
    Scan {
        /// IP address of the asset
        #[arg(long)]
        ip: Option<String>,

        /// Domain name of the asset
        #[arg(long)]
        domain: Option<String>,

        /// Asset name, used as the target when no ip or domain is given
        #[arg(short, long, default_value = "asset")]
        name: String,

        /// Asset id recorded on detections and fingerprints
        #[arg(long, default_value = "1")]
        id: u64,

        /// Asset category: host, workstation, web, database, device, generic
        #[arg(short = 'k', long, default_value = "generic")]
        category: String,

        /// Declared service port
        #[arg(short, long)]
        port: Option<u16>,

        /// Protocol hint, e.g. "https"
        #[arg(long)]
        protocol: Option<String>,

        #[command(flatten)]
        probe: ProbeArgs,
    },

    /// Scan every asset in a JSON file (an array of assets)
    Batch {
        /// Path to the asset list
        #[arg(short, long)]
        file: String,

        /// Assets scanned at once
        #[arg(short, long, default_value = "4")]
        workers: usize,

        #[command(flatten)]
        probe: ProbeArgs,
    },
}

#[derive(Args, Clone)]
pub struct ProbeArgs {
    /// Probes of one asset in flight at once
    #[arg(short, long, default_value = "16")]
    pub concurrency: usize,

    /// Output format: text, json
    #[arg(short, long, default_value = "text")]
    pub output_format: String,

    /// Preset: default, fast
    #[arg(long, default_value = "default", value_parser = ["default", "fast"])]
    pub preset: String,

    /// Accept any TLS certificate (lab networks only)
    #[arg(long)]
    pub insecure: bool,
}
