//! Point d'entrée CLI pour sara-report

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::{Commands, RunArgs};

/// Rapport SARA d'une installation à risque
#[derive(Parser)]
#[command(name = "sara-report")]
#[command(author, version)]
#[command(about = "SARA facility report: risk radii, census population and vulnerable facilities")]
#[command(long_about = "Builds the risk radii around a SARA facility, estimates the census population inside each radius by areal apportionment, lists the vulnerable facilities within reach and checks the floodplain.\n\nBy default, runs the full report. Use 'rings' to only write the risk radii as GeoJSON.")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Sous-commande (défaut: rapport complet)
    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments du rapport complet (commande par défaut)
    #[command(flatten)]
    run: Option<RunArgs>,
}

fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Some(Commands::Rings {
            facility,
            rings,
            output,
            srid,
            config,
            segments,
        }) => {
            info!(
                patts = %facility.patts,
                output = %output.display(),
                srid = ?srid,
                "Risk radii only"
            );
            cli::cmd_rings(
                &facility,
                &rings,
                &output,
                srid,
                config.as_deref(),
                segments,
            )?;
        }
        None => {
            // Commande par défaut : rapport complet
            let args = cli.run.ok_or_else(|| {
                anyhow::anyhow!(
                    "Run arguments required (--patts, --name, --lat, --lon, --output and ring distances)"
                )
            })?;
            info!(patts = %args.facility.patts, output = %args.output.display(), "SARA report");
            let report = cli::cmd_run(&args)?;
            report.display();
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
