use clap::Parser;
use rdn_core::scenario::{dump_report, load_scenario_file, report};

#[derive(Parser)]
#[clap(
    name = "rdn",
    version = "0.1.0",
    about = "Runs a resource-demand network scenario to a scheduling fixed point."
)]
struct ArgParser {
    /// Path to a YAML scenario file describing resources, edges, and tasks.
    #[clap(short = 's', long = "scenario", required = true)]
    scenario_path: String,
    /// Path to write the resulting schedule report as YAML; prints to stdout if omitted.
    #[clap(short = 'o', long = "output_path")]
    output_path: Option<String>,
}

fn main() {
    env_logger::init();
    let arg = ArgParser::parse();

    let scenario = match load_scenario_file(&arg.scenario_path) {
        Ok(s) => s,
        Err(e) => {
            log::error!("failed to load {}: {e}", arg.scenario_path);
            std::process::exit(1);
        }
    };

    if let Err(e) = scenario.network.schedule() {
        log::error!("scheduling failed: {e}");
        std::process::exit(1);
    }

    let report = report(&scenario);
    let yaml = dump_report(&report).expect("report always serializes");

    match arg.output_path {
        Some(path) => {
            std::fs::write(&path, &yaml).unwrap_or_else(|e| {
                log::error!("failed to write {path}: {e}");
                std::process::exit(1);
            });
            log::info!("wrote schedule report to {path}");
        }
        None => println!("{yaml}"),
    }
}
