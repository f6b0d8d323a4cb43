use badlands::export;
use badlands::map::MapBlock;
use log::{debug, info};
use std::env;
use std::fs;
use std::process;

fn usage(prog: &str) {
    println!("badlands - map block codec for the legacy wasteland RPG format");
    println!();
    println!("Usage: {prog} decode <map.bin> <out.toml> [--specials table.txt]");
    println!("       {prog} encode <in.toml> <map.bin> [--specials table.txt]");
    println!("       {prog} dump <map.bin> [--specials table.txt]");
    println!();
    println!("dump prints a disassembly-style listing of every action stream.");
    println!("decode turns a binary map block into an editable TOML document;");
    println!("encode is the exact inverse. The optional specials file holds the");
    println!("shared special action table as whitespace-separated hex words,");
    println!("e.g. \"0x0001 0x0011 0x0020\".");
}

fn read_file(path: &str) -> Vec<u8> {
    match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            match e.kind() {
                std::io::ErrorKind::NotFound => {
                    eprintln!("Error: file not found: {path}");
                    eprintln!("Check the path and the directory you are running from.");
                }
                _ => eprintln!("Error reading {path}: {e}"),
            }
            process::exit(1);
        }
    }
}

fn parse_specials(path: &str) -> Vec<u16> {
    let text = String::from_utf8_lossy(&read_file(path)).to_string();
    let mut table = Vec::new();
    for tok in text.split_whitespace() {
        let tok = tok.trim_start_matches("0x");
        match u16::from_str_radix(tok, 16) {
            Ok(w) => table.push(w),
            Err(_) => {
                eprintln!("Error: bad special action word {tok:?} in {path}");
                process::exit(1);
            }
        }
    }
    debug!("special action table: {} entrie(s)", table.len());
    table
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage(&args[0]);
        process::exit(if args.len() < 2 { 0 } else { 1 });
    }

    let mode = args[1].as_str();
    let input = &args[2];
    let specials = match args.iter().position(|a| a == "--specials") {
        Some(i) if i + 1 < args.len() => parse_specials(&args[i + 1]),
        Some(_) => {
            eprintln!("Error: --specials needs a file argument");
            process::exit(1);
        }
        None => Vec::new(),
    };
    if (mode == "decode" || mode == "encode") && args.len() < 4 {
        usage(&args[0]);
        process::exit(1);
    }
    let output = if args.len() > 3 { &args[3] } else { input };

    match mode {
        "decode" => {
            let bytes = read_file(input);
            info!("decoding {} ({} bytes)", input, bytes.len());
            let block = match MapBlock::decode(&bytes, &specials) {
                Ok(block) => block,
                Err(e) => {
                    eprintln!("Error decoding {input}: {e}");
                    process::exit(1);
                }
            };
            let text = match export::to_toml(&block) {
                Ok(text) => text,
                Err(e) => {
                    eprintln!("Error exporting {input}: {e}");
                    process::exit(1);
                }
            };
            if let Err(e) = fs::write(output, text) {
                eprintln!("Error writing {output}: {e}");
                process::exit(1);
            }
            info!("wrote {output}");
        }
        "encode" => {
            let text = String::from_utf8_lossy(&read_file(input)).to_string();
            let block = match export::from_toml(&text) {
                Ok(block) => block,
                Err(e) => {
                    eprintln!("Error parsing {input}: {e}");
                    process::exit(1);
                }
            };
            let bytes = match block.encode(&specials) {
                Ok(bytes) => bytes,
                Err(e) => {
                    eprintln!("Error encoding {input}: {e}");
                    process::exit(1);
                }
            };
            if let Err(e) = fs::write(output, &bytes) {
                eprintln!("Error writing {output}: {e}");
                process::exit(1);
            }
            info!("wrote {} ({} bytes)", output, bytes.len());
        }
        "dump" => {
            let bytes = read_file(input);
            let block = match MapBlock::decode(&bytes, &specials) {
                Ok(block) => block,
                Err(e) => {
                    eprintln!("Error decoding {input}: {e}");
                    process::exit(1);
                }
            };
            println!(
                "{} {}x{}, {} stream(s), {} string(s)",
                input,
                block.width,
                block.height,
                block.streams.len(),
                block.strings.strings.len()
            );
            for stream in &block.streams {
                print!("{stream}");
            }
        }
        other => {
            eprintln!("Error: unknown mode {other:?}");
            usage(&args[0]);
            process::exit(1);
        }
    }
}
