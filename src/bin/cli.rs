//! fcpstore CLI
//!
//! Command-line interface for inserting and fetching data through an FCP peer.

use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fcpstore::ops::{DirectoryInsert, InsertTarget, LogObserver, Persistence};
use fcpstore::{Config, Node, Priority, RemoteStore};
use tracing_subscriber::{fmt, EnvFilter};

/// fcpstore CLI
#[derive(Parser, Debug)]
#[command(name = "fcpstore")]
#[command(about = "Insert and fetch data through a Freenet FCP peer")]
#[command(version)]
struct Args {
    /// FCP host
    #[arg(long, default_value = fcpstore::config::DEFAULT_HOST)]
    host: String,

    /// FCP port
    #[arg(long, default_value_t = fcpstore::config::DEFAULT_PORT)]
    port: u16,

    /// Socket timeout in seconds
    #[arg(long, default_value = "300")]
    timeout: u64,

    /// Skip the peer version check
    #[arg(long)]
    no_version_check: bool,

    /// PriorityClass (0 = maximum, 6 = minimum)
    #[arg(long, default_value = "1")]
    priority: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Handshake and print peer information
    Hello,

    /// Insert a file as a single blob
    Put {
        /// File to insert
        file: PathBuf,

        /// Insert URI (default: CHK@)
        #[arg(long)]
        uri: Option<String>,

        /// MIME type
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
    },

    /// Fetch a URI
    Get {
        /// URI to fetch
        uri: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Insert a directory tree as a site
    PutDir {
        /// Directory to insert
        dir: PathBuf,

        /// Insert URI (default: CHK@)
        #[arg(long)]
        uri: Option<String>,

        /// Name prefix for every file
        #[arg(long, default_value = "")]
        prefix: String,

        /// File inserted as index.html and used as DefaultName
        #[arg(long)]
        index: Option<PathBuf>,

        /// Queue the insert globally and persistently on the peer
        #[arg(long)]
        global: bool,
    },

    /// Read a file below a base address through the caching reader
    Cat {
        /// Base address, e.g. USK@.../repo/1/
        base: String,

        /// Path relative to the base
        path: String,

        /// Start offset
        #[arg(long, default_value = "0")]
        offset: u64,

        /// Number of bytes (default: to the end)
        #[arg(long)]
        length: Option<u64>,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fcpstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> fcpstore::Result<()> {
    let config = Config::builder()
        .host(&args.host)
        .port(args.port)
        .timeout_ms(args.timeout * 1000)
        .check_version(!args.no_version_check)
        .priority(Priority::from_class(args.priority)?)
        .build();

    tracing::info!("fcpstore v{} -> {}", fcpstore::VERSION, config.endpoint);

    match args.command {
        Commands::Hello => {
            let node = Node::connect(config)?;
            let hello = node.session().node();
            println!("client:   {}", node.session().client_name());
            println!("version:  {}", hello.version.as_deref().unwrap_or("?"));
            println!("build:    {}", hello.build.map_or("?".to_string(), |b| b.to_string()));
            println!("extbuild: {}", hello.ext_build.map_or("?".to_string(), |b| b.to_string()));
            node.shutdown();
        }

        Commands::Put { file, uri, mime } => {
            let data = fs::read(&file)?;
            let mut node = Node::connect(config)?;
            let mut options = node.put_options();
            options.content_type = mime;
            if let Some(uri) = uri {
                options.target = InsertTarget::Uri(uri);
            }
            let result = node.put(data, &options, &mut LogObserver)?;
            node.shutdown();
            println!("{}", result);
        }

        Commands::Get { uri, output } => {
            let mut node = Node::connect(config)?;
            let data = node.get(&uri)?;
            node.shutdown();
            match output {
                Some(path) => fs::write(path, &data)?,
                None => io::stdout().write_all(&data)?,
            }
        }

        Commands::PutDir {
            dir,
            uri,
            prefix,
            index,
            global,
        } => {
            let mut insert = DirectoryInsert::from_dir(&dir, &prefix)?;
            if let Some(index) = index {
                insert.with_default("index.html", fs::read(index)?, "text/html");
            }

            let mut node = Node::connect(config)?;
            let mut options = node.dir_put_options();
            if let Some(uri) = uri {
                options.target = InsertTarget::Uri(uri);
            }
            if global {
                options.global = true;
                options.persistence = Persistence::Forever;
            }
            let result = node.put_dir(&insert, &options, &mut LogObserver)?;
            node.shutdown();
            println!("{}", result);
        }

        Commands::Cat {
            base,
            path,
            offset,
            length,
        } => {
            let store = RemoteStore::connect(config, base)?;
            let mut reader = store.open(&path);
            reader.seek(SeekFrom::Start(offset))?;

            let mut data = Vec::new();
            match length {
                Some(n) => reader.take(n).read_to_end(&mut data)?,
                None => reader.read_to_end(&mut data)?,
            };
            io::stdout().write_all(&data)?;
        }
    }

    Ok(())
}
