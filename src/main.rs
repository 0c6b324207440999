// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::{error, info, warn, Level};

use surface_bridge::config::{validate_config, ConfigEvent, ConfigWatcher, SurfaceProfile};
use surface_bridge::control::{format_key, BindingRegistry, NamedControl, SharedRegistry};
use surface_bridge::midi::{print_sources, MidiInputPort, MidiMessage};
use surface_bridge::notes::{NoteInputs, NoteRouter, PortId, TracingNoteRouter};

fn print_usage() {
    println!("surface-bridge - MIDI control surface bridge");
    println!();
    println!("Usage: surface-bridge [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --list-sources              List available MIDI sources (inputs)");
    println!("  --monitor <N|NAME> [FILE]   Monitor source N (or first name match) with a profile");
    println!("  --check <FILE>              Validate a profile and print its bindings");
    println!("  -v, --verbose               Debug logging");
    println!("  --help                      Show this help message");
}

fn check_profile(path: &str) -> Result<()> {
    let profile = validate_config(path)?;

    println!("{}: OK", path);
    if let Some(input) = &profile.device.input {
        println!("Input: {}", input);
    }
    for (i, input) in profile.note_inputs.iter().enumerate() {
        let filters = if input.filters.is_empty() {
            "default".to_string()
        } else {
            input.filters.join(" ")
        };
        println!(
            "Note input {} '{}': {}{}",
            i,
            input.name,
            filters,
            if input.mpe.enabled { " (MPE)" } else { "" }
        );
    }
    for binding in &profile.bindings {
        println!(
            "  {:<16} {:?} {}",
            binding.name,
            binding.kind,
            format_key(&binding.key())
        );
    }
    Ok(())
}

/// Profile state that is replaced on reload
struct Session {
    controls: Vec<Arc<NamedControl>>,
    note_inputs: NoteInputs,
}

impl Session {
    fn start(profile: &SurfaceProfile, registry: &SharedRegistry, port: PortId) -> Result<Self> {
        let router: Arc<dyn NoteRouter> = Arc::new(TracingNoteRouter);
        let note_inputs = profile.note_inputs(port, router)?;
        let controls = profile.bind_into(&mut registry.write());
        Ok(Self { controls, note_inputs })
    }

    fn replace(&mut self, profile: &SurfaceProfile, registry: &SharedRegistry) -> Result<()> {
        let router: Arc<dyn NoteRouter> = Arc::new(TracingNoteRouter);
        let note_inputs = profile.note_inputs(self.note_inputs.port(), router)?;

        let mut registry = registry.write();
        for control in self.controls.drain(..) {
            registry.unbind(&control);
        }
        self.controls = profile.bind_into(&mut registry);
        self.note_inputs = note_inputs;
        Ok(())
    }
}

fn open_input(source: &str, registry: SharedRegistry) -> Result<MidiInputPort> {
    let input = match source.parse::<usize>() {
        Ok(index) => MidiInputPort::open(index, registry),
        Err(_) => MidiInputPort::open_named(source, registry),
    };
    input.with_context(|| format!("Failed to open MIDI source '{}'", source))
}

fn monitor_input(source: &str, profile_path: Option<&str>) -> Result<()> {
    let registry = BindingRegistry::shared();
    let profile = match profile_path {
        Some(path) => validate_config(path)?,
        None => SurfaceProfile::default(),
    };

    let port = PortId(0);
    let mut session = Session::start(&profile, &registry, port)?;

    let watcher = match profile_path {
        Some(path) => Some(ConfigWatcher::new(Path::new(path), None)?),
        None => None,
    };

    println!("Connecting to MIDI source {}...", source);
    let input = open_input(source, registry.clone())?;
    println!("Monitoring {} (press Ctrl+C to stop)...", input.name());
    println!();

    loop {
        for [status, data1, data2] in input.recv_all() {
            let text = MidiMessage::parse(&[status, data1, data2])
                .map(|msg| msg.to_string())
                .unwrap_or_default();
            for (index, routed) in session.note_inputs.route(status, data1, data2) {
                info!("note input {}: {} -> {:02X?}", index, text, routed);
            }
            println!("{}", text);
        }

        if let Some(watcher) = &watcher {
            for event in watcher.recv_all() {
                match event {
                    ConfigEvent::Reloaded(profile) => {
                        match session.replace(&profile, &registry) {
                            Ok(()) => info!("Profile reloaded"),
                            Err(e) => error!("Reload failed: {:#}", e),
                        }
                    }
                    ConfigEvent::Error(e) => warn!("{}", e),
                    ConfigEvent::FileDeleted(path) => warn!("Profile removed: {:?}", path),
                    ConfigEvent::FileCreated(_) => {}
                }
            }
        }

        // Small sleep to prevent busy-waiting
        thread::sleep(Duration::from_millis(1));
    }
}

fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().collect();

    let verbose = args.iter().any(|a| a == "-v" || a == "--verbose");
    args.retain(|a| a != "-v" && a != "--verbose");
    tracing_subscriber::fmt()
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .init();

    if args.len() < 2 {
        println!("surface-bridge - MIDI control surface bridge");
        println!("Run with --help for usage information");
        return Ok(());
    }

    match args[1].as_str() {
        "--list-sources" => {
            print_sources();
        }
        "--monitor" => {
            let source = args.get(2).ok_or_else(|| {
                anyhow!("--monitor requires a source number (see --list-sources)")
            })?;
            monitor_input(source, args.get(3).map(String::as_str))?;
        }
        "--check" => {
            let path = args
                .get(2)
                .ok_or_else(|| anyhow!("--check requires a profile path"))?;
            check_profile(path)?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
