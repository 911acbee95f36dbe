//! sigtap-sim - run a simulated call through the gain module.

use clap::{Parser, ValueEnum};
use sigtap_config::{ModuleConfig, load_module_config};
use sigtap_core::{AlgoMode, AlgorithmPluginBuilder, LinkDirection, Module, WorkingFlags};
use sigtap_sim::{CallReport, CallScript, Gain, LoopbackHost};

/// Mode the processor runs in during the call
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum CliMode {
    #[default]
    On,
    Off,
    Mute,
}

impl From<CliMode> for AlgoMode {
    fn from(m: CliMode) -> Self {
        match m {
            CliMode::On => AlgoMode::On,
            CliMode::Off => AlgoMode::Off,
            CliMode::Mute => AlgoMode::Mute,
        }
    }
}

/// Direction to intercept when no config file is given
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum CliLink {
    #[default]
    Uplink,
    Downlink,
    Both,
}

#[derive(Parser)]
#[command(name = "sigtap-sim")]
#[command(author, version, about = "Simulated call through a sigtap gain module", long_about = None)]
struct Cli {
    /// Module config file, or a module name to look up in the config directories
    #[arg(long, value_name = "TOML")]
    config: Option<String>,

    /// Frames per direction
    #[arg(long, default_value = "50")]
    frames: usize,

    /// Processor mode
    #[arg(long, value_enum, default_value_t = CliMode::On)]
    mode: CliMode,

    /// Gain factor
    #[arg(long, default_value = "1.0")]
    gain: f32,

    /// Intercepted direction (ignored with --config)
    #[arg(long, value_enum, default_value_t = CliLink::Uplink)]
    link: CliLink,

    /// Stream sample rate in Hz
    #[arg(long, default_value = "8000")]
    sample_rate: u32,

    /// Samples per frame
    #[arg(long, default_value = "160")]
    frame_size: usize,

    /// Tone frequency in Hz
    #[arg(long, default_value = "440.0")]
    tone: f32,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn default_config(link: CliLink) -> ModuleConfig {
    let (channel, flags) = match link {
        CliLink::Uplink => (LinkDirection::Uplink, WorkingFlags::Default),
        CliLink::Downlink => (LinkDirection::Downlink, WorkingFlags::Default),
        CliLink::Both => (LinkDirection::Uplink, WorkingFlags::CatchBothLinks),
    };
    ModuleConfig::new("mod_gain")
        .with_description("Fixed gain")
        .with_working_channel(channel, flags)
}

fn init_tracing(filter: &str) {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(report: &CallReport) {
    println!("Call {} through {}", report.session, report.app);
    println!("  links:      {}", report.buffer_mode);
    println!("  mode:       {}", report.mode);
    println!("  state:      {} -> {}", report.attached_state, report.final_state);
    println!(
        "  frames:     {} delivered, {} altered",
        report.frames_delivered, report.frames_altered
    );
    println!("  peak:       {} -> {}", report.input_peak, report.output_peak);
    println!("  rms:        {:.1} -> {:.1}", report.input_rms, report.output_rms);
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(name) => load_module_config(name)?,
        None => default_config(cli.link),
    };
    init_tracing(&config.logging.filter);
    tracing::info!(module = %config.name, "starting simulation");

    let host = LoopbackHost::new();
    let mut module = Module::new(config.name.clone());
    let app = module.create_sigproc_app(host.clone(), AlgorithmPluginBuilder::<Gain>::from_algorithm())?;
    config.apply_to_app(&app)?;
    module.init_check()?;

    let script = CallScript {
        args: format!("gain={}", cli.gain),
        mode: cli.mode.into(),
        sample_rate: cli.sample_rate,
        frame_size: cli.frame_size,
        frames: cli.frames,
        tone_hz: cli.tone,
        ..CallScript::default()
    };
    let report = script.run(&app, &host)?;

    module.prepare_end();
    module.terminate();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}
