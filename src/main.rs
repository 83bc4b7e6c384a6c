use std::env;
use std::fs;
use std::process;

use wavescore::document::TimeSignature;
use wavescore::playback::build_events;
use wavescore::{RhythmCatalog, ScoreParams};

const USAGE: &str = "\
Usage: wavescore render <base.musicxml> <params.yaml> [output.musicxml]
       wavescore patterns [time-signature]
       wavescore events <base.musicxml> [params.yaml]";

fn read_file(path: &str) -> String {
    match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path, e);
            process::exit(1);
        }
    }
}

fn read_params(path: Option<&String>) -> ScoreParams {
    let Some(path) = path else {
        return ScoreParams::default();
    };
    match ScoreParams::from_yaml(&read_file(path)) {
        Ok(params) => params,
        Err(e) => {
            eprintln!("Parameter error: {}", e);
            process::exit(1);
        }
    }
}

fn usage() -> ! {
    eprintln!("{}", USAGE);
    process::exit(1);
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage();
    }

    let catalog = RhythmCatalog::builtin();
    match args[1].as_str() {
        "render" => {
            if args.len() < 4 {
                usage();
            }
            let base = read_file(&args[2]);
            let params = read_params(args.get(3));

            let xml = match wavescore::render(&base, &params, &catalog) {
                Ok(xml) => xml,
                Err(e) => {
                    eprintln!("Render error: {}", e);
                    process::exit(1);
                }
            };

            match args.get(4) {
                Some(path) => {
                    if let Err(e) = fs::write(path, &xml) {
                        eprintln!("Error writing to '{}': {}", path, e);
                        process::exit(1);
                    }
                    eprintln!("Wrote MusicXML to {}", path);
                }
                None => {
                    println!("{}", xml);
                }
            }
        }
        "patterns" => {
            let filter = match args.get(2) {
                Some(raw) => match TimeSignature::from_str(raw) {
                    Some(ts) => Some(ts),
                    None => {
                        eprintln!("Error: '{}' is not a time signature", raw);
                        process::exit(1);
                    }
                },
                None => None,
            };
            for pattern in catalog.patterns() {
                if filter.map_or(true, |ts| ts == pattern.time_signature) {
                    println!("{:<12} {:<5} {}", pattern.id, pattern.time_signature.to_string(), pattern.name);
                }
            }
        }
        "events" => {
            if args.len() < 3 {
                usage();
            }
            let base = read_file(&args[2]);
            let params = read_params(args.get(3));

            let doc = match wavescore::prepare(&base, &params, &catalog) {
                Ok(doc) => doc,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }
            };
            match serde_json::to_string_pretty(&build_events(&doc)) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error serializing events: {}", e);
                    process::exit(1);
                }
            }
        }
        _ => usage(),
    }
}
