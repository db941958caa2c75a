use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use mixfs::crypto::{derive_key, KEY_BLOCK_LEN, KEY_LEN};
use mixfs::hash::HashKind;
use mixfs::mix::header::SIGNATURE_LEN;
use mixfs::mix::{Dialect, MixArchive};
use mixfs::{SpriteFrameDecoder, VirtualFileSystem};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mixfs", about = "Inspect MIX archives and mounted game content")]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace).  MIXFS_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the content hash of a filename
    Hash {
        name: String,
        /// Use the CRC32 hash instead of the classic one
        #[arg(long)]
        crc32: bool,
    },
    /// List the index of a MIX archive
    List {
        input: PathBuf,
        #[arg(long)]
        crc32: bool,
        /// Print the index as JSON
        #[arg(long)]
        json: bool,
    },
    /// Extract one file from a set of mounts
    Extract {
        /// Mount, highest priority first.  Prefix with ~ to make it optional.
        #[arg(short, long = "mount")]
        mounts: Vec<String>,
        /// JSON manifest mounted before any --mount
        #[arg(long)]
        manifest: Option<PathBuf>,
        name: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show MIX header details
    Info {
        input: PathBuf,
        #[arg(long)]
        crc32: bool,
    },
    /// Decode sprite frames to raw indexed pixels
    Sprite {
        input: PathBuf,
        /// Frame to decode; all frames are concatenated when omitted
        #[arg(short, long)]
        frame: Option<usize>,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {

        // ── Hash ─────────────────────────────────────────────────────────────
        Commands::Hash { name, crc32 } => {
            let kind = hash_kind(crc32);
            println!("{:08X}  {}  ({})", kind.hash(&name), name, kind.name());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input, crc32, json } => {
            let mix = open_mix(&input, crc32)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&mix.entries())?);
                return Ok(());
            }
            println!("Archive: {}", input.display());
            println!("{:<10} {:>12} {:>12}", "Hash", "Offset", "Length");
            for e in mix.entries() {
                println!("{:08X}   {:>12} {:>12}", e.hash, e.offset, e.length);
            }
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { mounts, manifest, name, output } => {
            let mut vfs = VirtualFileSystem::new();
            if let Some(path) = manifest {
                let m = mixfs::Manifest::from_path(&path)
                    .with_context(|| format!("loading manifest {}", path.display()))?;
                vfs.load_manifest(&m)?;
            }
            for m in &mounts {
                vfs.mount(m).with_context(|| format!("mounting {m}"))?;
            }
            let bytes = match vfs.read(&name) {
                Ok(b) => b,
                Err(e) if e.is_not_found() => bail!("{name} not found in any mount"),
                Err(e) => return Err(e.into()),
            };
            std::fs::write(&output, &bytes)?;
            println!("{} → {} ({} B, from {})", name, output.display(), bytes.len(),
                     vfs.owner(&name).unwrap_or("?"));
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, crc32 } => {
            let mix = open_mix(&input, crc32)?;
            let dialect = match mix.header().dialect {
                Dialect::Legacy             => "legacy".to_string(),
                Dialect::Extended { flags } => format!("extended (flags {flags:08X})"),
            };
            let payload: u64 = mix.entries().iter().map(|e| e.length as u64).sum();

            println!("── MIX Archive ──────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Dialect        {dialect}");
            println!("  Encrypted      {}", mix.is_encrypted());
            println!("  Checksum       {}", mix.has_checksum());
            println!("  Hash           {}", mix.hash_kind().name());
            println!("  Data start     {} B", mix.data_start());
            println!("  Files          {}", mix.len());
            println!("  Payload        {payload} B");
            if mix.is_encrypted() {
                println!("  Blowfish key   {}", hex::encode(read_key(&input)?));
            }
        }

        // ── Sprite ───────────────────────────────────────────────────────────
        Commands::Sprite { input, frame, output } => {
            let data = std::fs::read(&input)?;
            let mut spr = SpriteFrameDecoder::new(input.display().to_string(), data)?;
            let pixels = match frame {
                Some(i) => spr.frame(i)?.to_vec(),
                None    => spr.decode_all()?.concat(),
            };
            std::fs::write(&output, &pixels)?;
            println!("{} frame(s) of {}x{} → {}", frame.map_or(spr.frame_count(), |_| 1),
                     spr.width(), spr.height(), output.display());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("MIXFS_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn hash_kind(crc32: bool) -> HashKind {
    if crc32 { HashKind::Crc32 } else { HashKind::Classic }
}

/// Re-derive the Blowfish key from an encrypted archive's key block.
fn read_key(path: &Path) -> anyhow::Result<[u8; KEY_LEN]> {
    let mut f = std::fs::File::open(path)?;
    f.seek(SeekFrom::Start(SIGNATURE_LEN))?;
    let mut block = [0u8; KEY_BLOCK_LEN];
    f.read_exact(&mut block)?;
    Ok(derive_key(&block)?)
}

fn open_mix(path: &Path, crc32: bool) -> anyhow::Result<MixArchive> {
    MixArchive::load(path, hash_kind(crc32))
        .with_context(|| format!("opening {}", path.display()))
}
