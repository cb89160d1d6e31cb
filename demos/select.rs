//! Renders JSON selection script into a grayscale mask
use selmask::*;
use std::{
    env,
    fs::File,
    io::{BufWriter, Read, Write},
};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

type Error = Box<dyn std::error::Error>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum OutputFormat {
    Pgm,
    #[cfg(feature = "png")]
    Png,
}

#[derive(Debug)]
struct Args {
    input_file: String,
    output_file: String,
    antialias: Option<usize>,
    format: OutputFormat,
}

impl Args {
    fn parse() -> Result<Args, Error> {
        let mut result = Args {
            input_file: String::new(),
            output_file: String::new(),
            antialias: None,
            format: OutputFormat::Pgm,
        };
        let mut positional = 0;
        let mut args = env::args();
        let cmd = args.next().unwrap_or_else(|| "select".to_string());
        while let Some(arg) = args.next() {
            match arg.as_ref() {
                "-a" => {
                    let antialias: usize = args.next().ok_or("-a requires argument")?.parse()?;
                    if antialias == 0 {
                        return Err("antialias must be positive".into());
                    }
                    result.antialias = Some(antialias);
                }
                "-f" => {
                    result.format = match args.next().ok_or("-f requires argument")?.as_ref() {
                        "pgm" => OutputFormat::Pgm,
                        #[cfg(feature = "png")]
                        "png" => OutputFormat::Png,
                        format => return Err(format!("unsupported format: {}", format).into()),
                    };
                }
                _ => {
                    positional += 1;
                    match positional {
                        1 => result.input_file = arg,
                        2 => result.output_file = arg,
                        _ => return Err("unexpected positional argment".into()),
                    }
                }
            }
        }
        if positional < 2 {
            eprintln!("Renders JSON selection script into a grayscale mask");
            eprintln!("\nUSAGE:");
            eprintln!(
                "    {} [-a <antialias>] [-f <format>] <script.json> <out.pgm>",
                cmd
            );
            eprintln!("\nARGS:");
            eprintln!("    -a <antialias>     polygon oversampling factor (default: script value)");
            eprintln!("    -f <format>        output format pgm or png (default: pgm)");
            eprintln!("    <script.json>      file containing selection script ('-' means stdin)");
            eprintln!("    <out.pgm>          rendered mask ('-' means stdout)");
            std::process::exit(1);
        }
        Ok(result)
    }
}

/// Load script from the file
fn script_load(path: &str) -> Result<Script, Error> {
    let mut contents = String::new();
    if path != "-" {
        File::open(path)?.read_to_string(&mut contents)?;
    } else {
        std::io::stdin().read_to_string(&mut contents)?;
    }
    Ok(tracing::debug_span!("[parse]").in_scope(|| contents.parse::<Script>())?)
}

fn save(selection: &Selection, format: OutputFormat, out: impl Write) -> Result<(), MaskError> {
    match format {
        OutputFormat::Pgm => selection.mask().write_pgm(out),
        #[cfg(feature = "png")]
        OutputFormat::Png => selection.mask().write_png(out),
    }
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse()?;
    let mut script = script_load(&args.input_file)?;
    if let Some(antialias) = args.antialias {
        script.antialias = antialias;
    }

    let selection = tracing::debug_span!("[render]", operations = script.operations.len())
        .in_scope(|| script.run())?;
    match selection.bounds() {
        Some(bounds) => tracing::info!(?bounds, "selection bounds"),
        None => tracing::info!("selection is empty"),
    }

    let _save = tracing::debug_span!("[save]").entered();
    if args.output_file != "-" {
        let mut file = BufWriter::new(File::create(&args.output_file)?);
        save(&selection, args.format, &mut file)?;
        file.flush()?;
    } else {
        save(&selection, args.format, std::io::stdout().lock())?;
    }
    Ok(())
}
