use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tunnel_engine::devices::{list_devices, list_input_devices, list_output_devices};
use tunnel_engine::{
    DeviceSelector, EffectKind, Engine, EngineConfig, InputConfig, LiveInput, LiveOutput,
    OutputConfig, StartOptions,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tunnel", version, about = "Stream audio through an effect chain")]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List capture and playback devices
    Devices,
    /// List built-in effects and their defaults
    Effects,
    /// Run the pipeline until the input ends, the duration passes, or Ctrl-C
    Run(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// WAV file, or `live` for the capture device
    #[arg(short, long)]
    input: String,
    /// WAV file, or `live` for the playback device (default)
    #[arg(short, long, default_value = "live")]
    output: String,
    /// Effect as `name[:key=value,...]`; repeat to chain in order
    #[arg(short, long = "effect")]
    effects: Vec<String>,
    #[arg(long, default_value_t = 44100)]
    sample_rate: u32,
    #[arg(long, default_value_t = 1)]
    channels: u16,
    #[arg(long, default_value_t = 1024)]
    block_size: usize,
    /// Capture device index or name substring
    #[arg(long)]
    input_device: Option<String>,
    /// Playback device index or name substring
    #[arg(long)]
    output_device: Option<String>,
    /// Capture buffer length in seconds
    #[arg(long, default_value_t = 0.1)]
    buffer_seconds: f32,
    /// Stop after this many seconds
    #[arg(short, long)]
    duration: Option<f64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Devices => print_devices(),
        Command::Effects => {
            print_effects();
            Ok(())
        }
        Command::Run(args) => run(args),
    }
}

fn print_devices() -> Result<()> {
    let all = list_devices().context("querying audio host")?;
    let is_default = |name: &str, input: bool| {
        all.iter().any(|d| d.name == name && if input { d.is_default_input } else { d.is_default_output })
    };

    for (title, input, list) in [
        ("input", true, list_input_devices()?),
        ("output", false, list_output_devices()?),
    ] {
        println!("{title}:");
        if list.is_empty() {
            println!("  (no devices found)");
        }
        for (i, name) in list {
            let mark = if is_default(&name, input) { "*" } else { " " };
            println!(" {mark}{i:>2}  {name}");
        }
    }
    Ok(())
}

fn print_effects() {
    for kind in EffectKind::ALL {
        let params: Vec<String> =
            kind.default_params().iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!("{:<12} {}", kind.name(), params.join(","));
    }
}

fn run(args: RunArgs) -> Result<()> {
    let cfg = EngineConfig {
        sample_rate: args.sample_rate,
        channels: args.channels,
        block_size: args.block_size,
    };

    let input = if args.input == "live" {
        InputConfig::Live(LiveInput {
            device: args.input_device.as_deref().map(DeviceSelector::from),
            buffer_seconds: args.buffer_seconds,
            ..LiveInput::from_defaults(&cfg)
        })
    } else {
        InputConfig::file(&args.input)
    };
    let output = if args.output == "live" {
        OutputConfig::Live(LiveOutput {
            device: args.output_device.as_deref().map(DeviceSelector::from),
            ..LiveOutput::following_source(&cfg)
        })
    } else {
        OutputConfig::file(PathBuf::from(&args.output))
    };

    let mut engine = Engine::new(cfg);
    engine.configure_input(input).context("input")?;
    engine.configure_output(output).context("output")?;
    for spec in &args.effects {
        let (name, params) = parse_effect(spec)?;
        let params: Vec<(&str, f32)> = params.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        engine
            .add_effect(&name, &params)
            .with_context(|| format!("adding effect `{spec}`"))?;
    }

    let handle = engine.stop_handle();
    ctrlc::set_handler(move || handle.stop()).context("installing Ctrl-C handler")?;

    let mut opts = StartOptions::default();
    if let Some(secs) = args.duration {
        if !(secs.is_finite() && secs >= 0.0) {
            bail!("--duration must be a non-negative number of seconds");
        }
        opts = opts.duration(Duration::from_secs_f64(secs));
    }

    tracing::info!(effects = ?engine.effects().iter().map(|e| e.name).collect::<Vec<_>>(), "starting");
    engine.start(opts).context("pipeline failed")?;
    Ok(())
}

/// `echo:delay_ms=250,feedback=0.5` -> ("echo", [("delay_ms", 250), ("feedback", 0.5)])
fn parse_effect(spec: &str) -> Result<(String, Vec<(String, f32)>)> {
    let (name, rest) = spec.split_once(':').unwrap_or((spec, ""));
    let name = name.trim();
    if name.is_empty() {
        bail!("empty effect name in `{spec}`");
    }
    let mut params = Vec::new();
    for pair in rest.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((k, v)) = pair.split_once('=') else {
            bail!("expected key=value, got `{pair}`");
        };
        let v: f32 = v.trim().parse().with_context(|| format!("bad value for `{}`", k.trim()))?;
        params.push((k.trim().to_string(), v));
    }
    Ok((name.to_string(), params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_effect_name() {
        let (name, params) = parse_effect("reverb").unwrap();
        assert_eq!(name, "reverb");
        assert!(params.is_empty());
    }

    #[test]
    fn effect_with_params() {
        let (name, params) = parse_effect("echo:delay_ms=250, feedback=0.5").unwrap();
        assert_eq!(name, "echo");
        assert_eq!(params, vec![("delay_ms".to_string(), 250.0), ("feedback".to_string(), 0.5)]);
    }

    #[test]
    fn malformed_effects_rejected() {
        assert!(parse_effect(":gain_db=1").is_err());
        assert!(parse_effect("gain:gain_db").is_err());
        assert!(parse_effect("gain:gain_db=loud").is_err());
    }

    #[test]
    fn cli_parses_run() {
        let cli = Cli::try_parse_from([
            "tunnel", "run", "-i", "in.wav", "-o", "out.wav", "-e", "gain:gain_db=-3", "-e", "echo",
        ])
        .unwrap();
        match cli.cmd {
            Command::Run(args) => {
                assert_eq!(args.effects, ["gain:gain_db=-3", "echo"]);
                assert_eq!(args.block_size, 1024);
            }
            _ => panic!("expected run"),
        }
    }
}
