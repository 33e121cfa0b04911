use gmlrun::config::RuntimeConfig;
use gmlrun::error::FormatError;
use gmlrun::game_data::GameData;
use gmlrun::renderer::HeadlessRenderer;
use gmlrun::runtime::Runtime;
use log::{debug, info, warn};
use std::env;

fn usage(program: &str) {
    println!("gmlrun - headless runner for GameMaker data.win archives");
    println!();
    println!(
        "Usage: {} <data.win> [--config file.toml] [--room name|index] [--frames n] [--seed n] [--list-rooms]",
        program
    );
    println!("Examples:");
    println!("  {} game/data.win --list-rooms", program);
    println!("  {} game/data.win --room room_title --frames 300", program);
    println!();
    println!("Settings given on the command line override the config file.");
}

/// Value following a flag, or a message naming the flag.
fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i + 1)
        .map(|s| s.as_str())
        .ok_or_else(|| format!("{} needs a value", flag))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    // Asking for help is not an error.
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        usage(&args[0]);
        return Ok(());
    }

    let game_path = &args[1];
    let mut config_path = None;
    let mut room = None;
    let mut frames = None;
    let mut seed = None;
    let mut list_rooms = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                config_path = Some(flag_value(&args, i, "--config")?.to_string());
                i += 1;
            }
            "--room" => {
                room = Some(flag_value(&args, i, "--room")?.to_string());
                i += 1;
            }
            "--frames" => {
                let v = flag_value(&args, i, "--frames")?;
                frames = Some(
                    v.parse::<u32>()
                        .map_err(|_| format!("Invalid frame count: {}", v))?,
                );
                i += 1;
            }
            "--seed" => {
                let v = flag_value(&args, i, "--seed")?;
                seed = Some(v.parse::<u64>().map_err(|_| format!("Invalid seed: {}", v))?);
                i += 1;
            }
            "--list-rooms" => list_rooms = true,
            other => warn!("ignoring unknown argument {}", other),
        }
        i += 1;
    }

    let mut config = match &config_path {
        Some(path) => match RuntimeConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => RuntimeConfig::default(),
    };
    if room.is_some() {
        config.start_room = room;
    }
    if let Some(n) = frames {
        config.frames = n;
    }
    if seed.is_some() {
        config.rng_seed = seed;
    }

    // Explicit match so common mistakes get a readable message instead of a debug dump.
    debug!("Loading archive: {}", game_path);
    let game = match GameData::load(game_path) {
        Ok(game) => game,
        Err(FormatError::Io(e)) => {
            match e.kind() {
                std::io::ErrorKind::NotFound => {
                    eprintln!("Error: Archive not found: {}", game_path);
                    eprintln!();
                    eprintln!("Please check the path, usually <game dir>/data.win.");
                }
                std::io::ErrorKind::PermissionDenied => {
                    eprintln!("Error: Permission denied reading archive: {}", game_path);
                }
                _ => eprintln!("Error: Cannot read archive '{}': {}", game_path, e),
            }
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: '{}' is not a readable data.win archive: {}", game_path, e);
            std::process::exit(1);
        }
    };

    if list_rooms {
        for (index, r) in game.rooms.iter().enumerate() {
            println!("{}: {} ({}x{})", index, r.name, r.width, r.height);
        }
        return Ok(());
    }

    info!(
        "{} ({}x{}): {} rooms, {} objects, {} code entries",
        game.gen8.display_name,
        game.gen8.window_width,
        game.gen8.window_height,
        game.rooms.len(),
        game.objects.len(),
        game.code.len()
    );

    let frames = config.frames;
    let mut runtime = Runtime::new(game, config, Box::new(HeadlessRenderer::new()));
    runtime.initialize()?;

    for _ in 0..frames {
        runtime.step();
        runtime.draw();
        runtime.clear_per_frame_input();
        if runtime.should_quit {
            info!("game_end requested at frame {}", runtime.frame_count);
            break;
        }
    }
    info!(
        "Stopped after {} frames in room {} with {} instances",
        runtime.frame_count,
        runtime.room_index,
        runtime.live_ids().len()
    );

    runtime.save_recording()?;
    Ok(())
}
