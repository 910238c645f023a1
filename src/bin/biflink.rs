//! biflink command line driver
//!
//! Packs library modules into archives and runs the builtin import pass
//! over a program module.

use biflink::pass::{self, PassConfigBuilder};
use biflink::{load_archive, save_archive, Module};
use log::info;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

struct ImportArgs {
    program: PathBuf,
    library: PathBuf,
    output: Option<PathBuf>,
    text: bool,
    internalize: bool,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let result = match args.get(1).map(String::as_str) {
        Some("pack") if args.len() == 4 => pack(Path::new(&args[2]), Path::new(&args[3])),
        Some("import") => match parse_import_args(&args[2..]) {
            Some(import_args) => import(&import_args),
            None => usage(),
        },
        _ => usage(),
    };

    if let Err(e) = result {
        eprintln!("biflink: {}", e);
        process::exit(1);
    }
}

fn usage() -> ! {
    eprintln!("USAGE:");
    eprintln!("    biflink pack <library.json> <out.bifa>");
    eprintln!("    biflink import <program.json> <library.bifa> [-o out.json] [--text] [--no-internalize]");
    process::exit(1);
}

fn parse_import_args(args: &[String]) -> Option<ImportArgs> {
    let mut positional = Vec::new();
    let mut output = None;
    let mut text = false;
    let mut internalize = true;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-o" | "--output" => output = Some(PathBuf::from(iter.next()?)),
            "--text" => text = true,
            "--no-internalize" => internalize = false,
            flag if flag.starts_with('-') => return None,
            path => positional.push(PathBuf::from(path)),
        }
    }

    if positional.len() != 2 {
        return None;
    }
    let library = positional.pop()?;
    let program = positional.pop()?;
    Some(ImportArgs {
        program,
        library,
        output,
        text,
        internalize,
    })
}

fn read_module(path: &Path) -> CliResult<Module> {
    let source = fs::read_to_string(path)
        .map_err(|e| format!("failed to read '{}': {}", path.display(), e))?;
    let module = serde_json::from_str(&source)
        .map_err(|e| format!("failed to parse '{}': {}", path.display(), e))?;
    Ok(module)
}

fn pack(input: &Path, output: &Path) -> CliResult<()> {
    let module = read_module(input)?;
    save_archive(output, &module).map_err(|e| format!("failed to write '{}': {}", output.display(), e))?;
    info!("packed {} functions into {}", module.functions.len(), output.display());
    Ok(())
}

fn import(args: &ImportArgs) -> CliResult<()> {
    let mut program = read_module(&args.program)?;
    let library = load_archive(&args.library)
        .map_err(|e| format!("failed to load '{}': {}", args.library.display(), e))?;

    let config = PassConfigBuilder::new().internalize(args.internalize).build();
    let stats = pass::run(&mut program, library, &config)
        .map_err(|e| format!("builtin import failed: {}", e))?;
    info!("{:?}", stats);

    let rendered = if args.text {
        program.to_string()
    } else {
        serde_json::to_string_pretty(&program)?
    };
    match &args.output {
        Some(path) => fs::write(path, rendered)
            .map_err(|e| format!("failed to write '{}': {}", path.display(), e))?,
        None => println!("{}", rendered),
    }
    Ok(())
}
