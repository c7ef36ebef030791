use anyhow::Result;
use clap::{Parser, Subcommand};
use proxy_warden::{
    analyzer::Analyzer,
    config::Config,
    proxy::SourceList,
    runner::Runner,
};
use std::path::PathBuf;

/// A proxy pool validator for HTTP and SOCKS5 proxies
#[derive(Parser)]
#[command(name = "proxy-warden")]
#[command(about = "Validates proxies from public sources and maintains capped pools of alive ones")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (TOML); defaults apply when absent
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full validation pass: re-check pools, then fetch and validate
    /// new candidates from the source list
    Run {
        /// Override the number of concurrent probe workers
        #[arg(short = 'n', long)]
        workers: Option<usize>,
        /// Override the per-probe timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Override the sources CSV file
        #[arg(short, long)]
        sources: Option<PathBuf>,
        /// Override the URL probed through each proxy
        #[arg(long)]
        test_url: Option<String>,
    },
    /// Analyze the validation log and rank sources by quality
    Analyze {
        /// Number of days to analyze
        #[arg(long, default_value = "7")]
        days: i64,
        /// Show the worst sources per proxy type
        #[arg(long)]
        worst_sources: bool,
        /// Save the report to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,
        /// Override the validation log file
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    proxy_warden::init_logger();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Run {
            workers,
            timeout,
            sources,
            test_url,
        } => {
            if let Some(workers) = workers {
                config.workers = workers;
            }
            if let Some(timeout) = timeout {
                config.probe_timeout_secs = timeout;
            }
            if let Some(sources) = sources {
                config.sources_file = sources;
            }
            if let Some(test_url) = test_url {
                config.test_url = test_url;
            }
            config.validate()?;

            let source_list = SourceList::load(&config.sources_file)?;
            println!(
                "Validating with {} workers, timeout: {}s, {} sources",
                config.workers,
                config.probe_timeout_secs,
                source_list.len()
            );

            let runner = Runner::new(config)?;
            let summary = runner.run(&source_list).await?;

            for scheme in &summary.schemes {
                println!(
                    "{}: pool {} | evicted {} | admitted {} | discarded {} | skipped {}",
                    scheme.scheme,
                    scheme.pool_size,
                    scheme.evicted,
                    scheme.admitted,
                    scheme.discarded,
                    scheme.skipped
                );
            }
            println!("Dead proxies tracked: {}", summary.dead_tracked);
        }
        Commands::Analyze {
            days,
            worst_sources,
            export,
            log_file,
        } => {
            let log_path = log_file.unwrap_or_else(|| config.ledger_file());
            let analyzer = Analyzer::new(&log_path);

            let stats = analyzer.analyze(days)?;
            if stats.is_empty() {
                println!("No source data within the last {days} days.");
                return Ok(());
            }

            println!("Source quality report (last {days} days)\n");
            for (i, s) in stats.iter().enumerate() {
                let types = s
                    .schemes
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("#{} {}", i + 1, s.source_url);
                println!(
                    "   tested: {} | alive: {} ({:.1}%) | dead: {} | avg: {:.0}ms | types: {}",
                    s.total_tested,
                    s.alive_count,
                    s.alive_percent,
                    s.dead_count,
                    s.avg_response_time_ms,
                    types
                );
            }

            let total_tested: usize = stats.iter().map(|s| s.total_tested).sum();
            let total_alive: usize = stats.iter().map(|s| s.alive_count).sum();
            println!(
                "\nOverall: {total_alive}/{total_tested} alive across {} sources",
                stats.len()
            );

            if worst_sources {
                println!("\nWorst sources by proxy type (min 10 tested)");
                let worst = analyzer.worst_by_scheme(days)?;
                for (scheme, sources) in &worst {
                    println!("\n{scheme}:");
                    if sources.is_empty() {
                        println!("   no sources with sufficient data");
                        continue;
                    }
                    for (i, s) in sources.iter().enumerate() {
                        let flag = match s.severity() {
                            Some(proxy_warden::Severity::Critical) => {
                                " [CRITICAL: consider removing this source]"
                            }
                            Some(proxy_warden::Severity::Warning) => {
                                " [WARNING: poor performance]"
                            }
                            None => "",
                        };
                        println!(
                            "   #{} {} - {:.1}% alive of {}{}",
                            i + 1,
                            s.source_url,
                            s.alive_percent,
                            s.total_tested,
                            flag
                        );
                    }
                }
            }

            if let Some(output) = export {
                analyzer.export(&output, days)?;
                println!("\nReport saved to {}", output.display());
            }
        }
    }

    Ok(())
}
