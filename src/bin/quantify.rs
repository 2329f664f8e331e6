use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use blotquant::batch::{process_dir, write_hit_counts_csv, write_results_csv};
use blotquant::viz::save_strip_plot;
use blotquant::{AssayLayout, GridSpec, hit_counts};

#[derive(Parser, Debug)]
#[command(
    name = "blotquant",
    about = "Quantify dot-blot assay strips: detect dots, score hits, count hits per assay",
    version
)]
struct Cli {
    /// Directory containing the strip images
    #[arg(short = 'd', long = "dir")]
    dir: PathBuf,

    /// Grid layout config (JSON)
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Assay layout table (CSV)
    #[arg(short = 'a', long = "assay")]
    assay: PathBuf,

    /// Output directory for result tables
    #[arg(short = 'o', long = "out", default_value = "output")]
    out: PathBuf,

    /// Image file extension to process
    #[arg(long = "ext", default_value = "tif")]
    extension: String,

    /// Also write a per-strip QC plot of the scored dots
    #[arg(long = "plot")]
    plot: bool,

    /// Plot size as WIDTHxHEIGHT
    #[arg(long = "plot-size", default_value = "1500x1000")]
    plot_size: String,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("invalid size '{s}', expected WIDTHxHEIGHT"))?;
    let w = w.parse().map_err(|_| format!("invalid width '{w}'"))?;
    let h = h.parse().map_err(|_| format!("invalid height '{h}'"))?;
    Ok((w, h))
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if !cli.dir.is_dir() {
        return Err(format!("Not a directory: {}", cli.dir.display()).into());
    }
    let plot_size = parse_size(&cli.plot_size)?;

    let spec = GridSpec::from_json_file(&cli.config)?;
    let layout = AssayLayout::from_csv_file(&cli.assay)?;
    info!(
        assay_id = %layout.assay_id,
        rows = spec.n_rows(),
        cols = spec.n_cols(),
        dots = layout.len(),
        "loaded configuration"
    );

    let result = process_dir(&cli.dir, &spec, &layout, &cli.extension)?;
    for failure in &result.failures {
        eprintln!("strip {} failed: {}", failure.strip_id, failure.error);
    }
    if result.records.is_empty() {
        return Err("no strip produced results".into());
    }

    fs::create_dir_all(&cli.out)?;
    let results_path = cli.out.join("assay_results.csv");
    write_results_csv(&results_path, &result.records)?;
    println!("wrote {}", results_path.display());

    let counts = hit_counts(&result.records);
    let counts_path = cli.out.join("hit_counts.csv");
    write_hit_counts_csv(&counts_path, &counts)?;
    println!("wrote {}", counts_path.display());

    if cli.plot {
        let mut strip_ids: Vec<&str> =
            result.records.iter().map(|r| r.strip_id.as_str()).collect();
        strip_ids.sort_unstable();
        strip_ids.dedup();
        for strip_id in strip_ids {
            let rows: Vec<_> = result
                .records
                .iter()
                .filter(|r| r.strip_id == strip_id)
                .cloned()
                .collect();
            let plot_path = cli.out.join(format!("{strip_id}_qc.png"));
            save_strip_plot(plot_size.0, plot_size.1, &rows, &plot_path)?;
            println!("wrote {}", plot_path.display());
        }
    }

    Ok(())
}
