use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use memmap2::Mmap;

use binbloom::prelude::*;
use binbloom::symbols;

/// Quarkslab-style raw firmware analysis: infers endianness, base
/// address, and UDS database location from a firmware image with no
/// symbols.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Target architecture, 32 or 64.
    #[arg(short = 'a', long = "arch", default_value_t = 32)]
    arch: u32,

    /// Force endianness ('le' or 'be'); detected if omitted.
    #[arg(short = 'e', long = "endian")]
    endian: Option<String>,

    /// Skip base-address search; run the UDS locator under this base.
    #[arg(short = 'b', long = "base", value_parser = parse_u64)]
    base: Option<u64>,

    /// Candidate memory alignment, decimal or 0x-prefixed hex.
    #[arg(short = 'm', long = "align", value_parser = parse_u64, default_value = "0x1000")]
    align: u64,

    /// Enable deep search (keeps every surviving candidate).
    #[arg(short = 'd', long = "deep", default_value_t = false)]
    deep: bool,

    /// Worker thread count for the refinement phase.
    #[arg(short = 't', long = "threads", default_value_t = 0)]
    threads: usize,

    /// Symbols file: one known function address per line.
    #[arg(short = 'f', long = "functions")]
    functions: Option<PathBuf>,

    /// Increase log verbosity, up to -vvvv.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Firmware image to analyze.
    firmware: PathBuf,
}

fn parse_u64(s: &str) -> Result<u64, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| e.to_string())
    } else {
        s.parse::<u64>().map_err(|e| e.to_string())
    }
}

impl Cli {
    fn architecture(&self) -> Result<Architecture, String> {
        match self.arch {
            32 => Ok(Architecture::Arch32),
            64 => Ok(Architecture::Arch64),
            other => Err(format!("unsupported architecture '-a {other}', expected 32 or 64")),
        }
    }

    fn endianness(&self) -> Result<Endianness, String> {
        match self.endian.as_deref() {
            None => Ok(Endianness::Unknown),
            Some("le") => Ok(Endianness::Le),
            Some("be") => Ok(Endianness::Be),
            Some(other) => Err(format!("unsupported endianness '-e {other}', expected 'le' or 'be'")),
        }
    }

    fn into_config(&self, known_functions: Vec<u64>) -> Result<AnalysisConfig, String> {
        Ok(AnalysisConfig {
            architecture: self.architecture()?,
            endian: self.endianness()?,
            mem_align: self.align,
            threads: self.threads,
            deep_mode: self.deep,
            base_address: self.base,
            known_functions,
        })
    }

    fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Off,
            1 => log::LevelFilter::Error,
            2 => log::LevelFilter::Warn,
            3 => log::LevelFilter::Info,
            4 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn update(&self, label: &str, current: u64, total: u64) {
        if total == 0 {
            return;
        }
        eprint!("\r{label}: {current}/{total}");
    }

    fn finish(&self, label: &str) {
        eprintln!("\r{label}: done");
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .init();

    let known_functions = match &cli.functions {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(contents) => {
                let mut poi_list = binbloom::poi::PoiList::new();
                symbols::parse(&contents, &mut poi_list);
                poi_list.iter().map(|poi| poi.offset).collect()
            }
            Err(err) => {
                eprintln!("Error: could not read symbols file {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => Vec::new(),
    };

    let config = match cli.into_config(known_functions) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("Error: {message}");
            return ExitCode::FAILURE;
        }
    };

    let file = match File::open(&cli.firmware) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Error: could not open {}: {err}", cli.firmware.display());
            return ExitCode::FAILURE;
        }
    };

    let mmap = match unsafe { Mmap::map(&file) } {
        Ok(mmap) => mmap,
        Err(err) => {
            eprintln!("Error: could not map {}: {err}", cli.firmware.display());
            return ExitCode::FAILURE;
        }
    };

    let analysis = match Analysis::new(&mmap[..], config) {
        Ok(analysis) => analysis,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let progress = StderrProgress;
    let verdict = match analysis.run(&progress) {
        Ok(verdict) => verdict,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    print_verdict(&verdict);
    ExitCode::SUCCESS
}

fn print_verdict(verdict: &Verdict) {
    if verdict.endian_tied {
        println!("[i] Endianness is tied, defaulting to {}", verdict.endian);
    } else {
        println!("[i] Endianness is {}", verdict.endian);
    }

    match verdict.base_address {
        Some(address) if verdict.uds.is_none() && !verdict.confident => {
            println!("[i] Base address guess: 0x{address:08x} (low confidence).");
        }
        Some(address) if verdict.uds.is_none() => {
            println!("[i] Base address found: 0x{address:08x}.");
        }
        Some(address) => {
            println!("[i] Using base address 0x{address:08x}.");
        }
        None => {
            println!("[i] No base address candidate could be determined.");
        }
    }

    if let Some(uds) = &verdict.uds {
        println!(
            "Most probable UDS DB is located at @{:016x}, found {} different UDS RID",
            uds.address, uds.rid_count
        );
        println!("Identified structure:");
        print!("{}", uds.declaration);
    }
}
