//! Draws every shape with every combine operation into a single grayscale image
use selmask::*;
use std::{
    env,
    fs::File,
    io::{BufWriter, Write},
};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

type Error = Box<dyn std::error::Error>;

#[derive(Debug)]
struct Args {
    output_file: String,
    cell: i32,
    antialias: bool,
}

impl Args {
    fn parse() -> Result<Args, Error> {
        let mut result = Args {
            output_file: String::new(),
            cell: 64,
            antialias: true,
        };
        let mut positional = 0;
        let mut args = env::args();
        let cmd = args.next().unwrap_or_else(|| "shapes".to_string());
        while let Some(arg) = args.next() {
            match arg.as_ref() {
                "-s" => {
                    result.cell = args.next().ok_or("-s requires argument")?.parse()?;
                    if result.cell < 8 {
                        return Err("cell size is too small".into());
                    }
                }
                "-n" => result.antialias = false,
                _ => {
                    positional += 1;
                    match positional {
                        1 => result.output_file = arg,
                        _ => return Err("unexpected positional argment".into()),
                    }
                }
            }
        }
        if positional < 1 {
            eprintln!("Draws every shape with every combine operation into a single image");
            eprintln!("\nUSAGE:");
            eprintln!("    {} [-s <size>] [-n] <out.pgm>", cmd);
            eprintln!("\nARGS:");
            eprintln!("    -s <size>          size of a single cell in pixels (default: 64)");
            eprintln!("    -n                 disable anti-aliasing");
            eprintln!("    <out.pgm>          rendered image ('-' means stdout)");
            std::process::exit(1);
        }
        Ok(result)
    }
}

/// Base coverage every operation is applied to: half of the cell at full
/// coverage and the other half at half coverage
fn base(buffer: &mut CoverageBuffer<f32>, x: i32, y: i32, size: i32) {
    combine_value(buffer, CombineOp::Replace, Rect::new(x, y, size / 2, size), 1.0);
    combine_value(
        buffer,
        CombineOp::Replace,
        Rect::new(x + size / 2, y, size - size / 2, size),
        0.5,
    );
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse()?;
    let size = args.cell;
    let rows = 4;
    let cols = CombineOp::ALL.len() as i32;
    let mut buffer = CoverageBuffer::<f32>::try_new((size * cols) as usize, (size * rows) as usize)?;

    let margin = size / 8;
    let inner = size - 2 * margin;
    for (col, op) in CombineOp::ALL.into_iter().enumerate() {
        let x = col as i32 * size;
        for row in 0..rows {
            let y = row * size;
            base(&mut buffer, x, y, size);
            let (x, y) = (x + margin, y + margin);
            let _span = tracing::debug_span!("[cell]", ?op, row).entered();
            match row {
                0 => {
                    rect(&mut buffer, op, x, y, inner, inner);
                }
                1 => {
                    let shape = ShapeSpec::rect(x, y, inner, inner)
                        .with_radius(inner as Scalar / 4.0, inner as Scalar / 6.0)
                        .with_antialias(args.antialias);
                    rounded_rect(&mut buffer, op, shape);
                }
                2 => {
                    ellipse(&mut buffer, op, x, y, inner, inner / 2, args.antialias);
                }
                _ => {
                    let n = if args.antialias { DEFAULT_ANTIALIAS } else { 1 };
                    let mut star = PolygonScanConverter::new(inner as usize, inner as usize, n)?;
                    let radius = inner as Scalar / 2.0;
                    star.add_polyline((0..10).map(|index| {
                        let angle = std::f64::consts::PI * index as Scalar / 5.0;
                        let r = if index % 2 == 0 { radius } else { radius * 0.4 };
                        (radius + r * angle.sin(), radius - r * angle.cos())
                    }));
                    let star = star.bake::<f32>()?;
                    combine_mask(&mut buffer, op, &star, x, y);
                }
            }
        }
    }

    let _save = tracing::debug_span!("[save]").entered();
    if args.output_file != "-" {
        let mut file = BufWriter::new(File::create(&args.output_file)?);
        buffer.write_pgm(&mut file)?;
        file.flush()?;
    } else {
        buffer.write_pgm(std::io::stdout().lock())?;
    }
    Ok(())
}
