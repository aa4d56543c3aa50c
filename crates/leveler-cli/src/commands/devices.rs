//! Audio device listing.

use crate::settings::Settings;
use clap::{Args, Subcommand};
use leveler_io::{AudioDevice, default_device, find_device_fuzzy, list_devices};

#[derive(Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    command: Option<DevicesCommand>,
}

#[derive(Subcommand)]
enum DevicesCommand {
    /// List all available audio devices
    List,

    /// Show the devices the leveler will record from and play to
    Info,
}

fn print_group(title: &str, devices: &[&AudioDevice], other: fn(&AudioDevice) -> bool, note: &str) {
    if devices.is_empty() {
        return;
    }
    println!("{title}:");
    for (idx, device) in devices.iter().enumerate() {
        let also = if other(device) { note } else { "" };
        println!(
            "  [{}] {} ({} Hz){}",
            idx, device.name, device.default_sample_rate, also
        );
    }
    println!();
}

/// Which device a role resolves to: the configured filter's first match,
/// else the system default.
fn print_role(
    role: &str,
    filter: Option<&str>,
    devices: &[AudioDevice],
    fallback: Option<&AudioDevice>,
    is_input: bool,
) {
    let chosen = match filter {
        Some(search) => match find_device_fuzzy(devices, search, is_input) {
            Ok(device) => Some(device),
            Err(err) => {
                println!("{role}: {err}");
                return;
            }
        },
        None => fallback,
    };
    let source = if filter.is_some() { "configured" } else { "default" };
    match chosen {
        Some(device) => {
            println!("{role} ({source}):");
            println!("  Name: {}", device.name);
            println!("  Sample Rate: {} Hz", device.default_sample_rate);
        }
        None => println!("{role}: none"),
    }
}

pub fn run(args: DevicesArgs, settings: &Settings) -> anyhow::Result<()> {
    match args.command.unwrap_or(DevicesCommand::List) {
        DevicesCommand::List => {
            let devices = list_devices()?;
            if devices.is_empty() {
                println!("No audio devices found.");
                return Ok(());
            }

            println!("Available Audio Devices");
            println!("=======================\n");

            let inputs: Vec<_> = devices.iter().filter(|d| d.is_input).collect();
            let outputs: Vec<_> = devices.iter().filter(|d| d.is_output).collect();
            print_group("Input Devices", &inputs, |d| d.is_output, " (also output)");
            print_group("Output Devices", &outputs, |d| d.is_input, " (also input)");

            println!(
                "Total: {} input(s), {} output(s)",
                inputs.len(),
                outputs.len()
            );
            println!();
            println!("Tip: put a partial device name in the config file:");
            println!("  [audio]");
            println!("  input_device = \"USB\"");
        }

        DevicesCommand::Info => {
            let audio = &settings.engine.audio;
            let devices = list_devices()?;
            let (input, output) = default_device()?;
            println!("Leveler Audio Devices");
            println!("=====================\n");
            print_role(
                "Capture",
                audio.input_device.as_deref(),
                &devices,
                input.as_ref(),
                true,
            );
            println!();
            print_role(
                "Playback",
                audio.output_device.as_deref(),
                &devices,
                output.as_ref(),
                false,
            );
            println!();
            println!("Processing at {} Hz", audio.sample_rate);
        }
    }

    Ok(())
}
