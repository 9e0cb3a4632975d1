use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use bofrt_core::output::decode_records;
use bofrt_core::{FieldKind, PackValue, Schema};

mod report;

use report::{print_json, FieldReport, OutputReport, PackReport, RecordReport, UnpackReport};

#[derive(Parser)]
#[command(name = "bofrt-pack")]
#[command(about = "Pack and inspect module argument buffers.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pack VALUES in SCHEMA order (i=int, s=short, b=blob, z=string, Z=wide string).
    Pack {
        #[arg(long)]
        schema: String,
        /// Write the packed bytes here instead of reporting them as hex.
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
        /// Ints and shorts in decimal or 0x hex; blobs as hex or @PATH.
        #[arg(allow_hyphen_values = true)]
        values: Vec<String>,
    },
    /// Decode a packed buffer against SCHEMA.
    Unpack {
        #[arg(long)]
        schema: String,
        #[arg(long, conflicts_with = "input", required_unless_present = "input")]
        hex: Option<String>,
        #[arg(long = "in", value_name = "PATH")]
        input: Option<PathBuf>,
    },
    /// Decode an output stream drained from the runtime.
    OutputDecode {
        #[arg(long = "in", value_name = "PATH")]
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    match try_main() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("bofrt-pack: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Returns whether the command succeeded; reports are printed either way.
fn try_main() -> Result<bool> {
    let cli = Cli::parse();
    match cli.command {
        Command::Pack {
            schema,
            out,
            values,
        } => cmd_pack(&schema, out, &values),
        Command::Unpack { schema, hex, input } => cmd_unpack(&schema, hex, input),
        Command::OutputDecode { input } => cmd_output_decode(input),
    }
}

fn cmd_pack(schema_src: &str, out: Option<PathBuf>, values: &[String]) -> Result<bool> {
    let mut report = PackReport::new(schema_src);
    match pack(schema_src, values) {
        Ok(bytes) => {
            report.len = bytes.len();
            match out {
                Some(path) => {
                    std::fs::write(&path, &bytes)
                        .with_context(|| format!("write packed buffer: {}", path.display()))?;
                    report.out = Some(path.display().to_string());
                }
                None => report.hex = Some(hex::encode(&bytes)),
            }
            report.ok = true;
        }
        Err(e) => report.error = Some(format!("{e:#}")),
    }
    print_json(&report)?;
    Ok(report.ok)
}

fn pack(schema_src: &str, values: &[String]) -> Result<Vec<u8>> {
    let schema = Schema::parse(schema_src).context("parse schema")?;
    if values.len() != schema.len() {
        anyhow::bail!(
            "schema {schema} has {} fields, got {} values",
            schema.len(),
            values.len()
        );
    }
    let values = schema
        .kinds()
        .iter()
        .zip(values)
        .enumerate()
        .map(|(i, (&kind, raw))| {
            parse_value(kind, raw).with_context(|| format!("value {i} ({kind}): {raw:?}"))
        })
        .collect::<Result<Vec<_>>>()?;
    let packed = schema.pack(&values)?;
    log::debug!("packed {} fields into {} bytes", values.len(), packed.len());
    Ok(packed)
}

fn parse_value(kind: FieldKind, raw: &str) -> Result<PackValue> {
    Ok(match kind {
        FieldKind::Int => {
            let v = parse_integer(raw, i64::from(i32::MIN), i64::from(u32::MAX))?;
            // Hex spellings above i32::MAX are bit patterns.
            PackValue::Int(v as u32 as i32)
        }
        FieldKind::Short => {
            let v = parse_integer(raw, i64::from(i16::MIN), i64::from(u16::MAX))?;
            PackValue::Short(v as u16 as i16)
        }
        FieldKind::Blob => match raw.strip_prefix('@') {
            Some(path) => PackValue::Blob(
                std::fs::read(path).with_context(|| format!("read blob file: {path}"))?,
            ),
            None => PackValue::Blob(hex::decode(raw).context("decode blob hex")?),
        },
        FieldKind::Str => PackValue::Str(raw.to_string()),
        FieldKind::WideStr => PackValue::WideStr(raw.to_string()),
    })
}

fn parse_integer(raw: &str, min: i64, max: i64) -> Result<i64> {
    let s = raw.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(h) => i64::from_str_radix(h, 16),
        None => digits.parse::<i64>(),
    }
    .with_context(|| format!("not an integer: {raw:?}"))?;
    let v = if negative { -magnitude } else { magnitude };
    if v < min || v > max {
        anyhow::bail!("{raw:?} is out of range {min}..={max}");
    }
    Ok(v)
}

fn cmd_unpack(schema_src: &str, hex_src: Option<String>, input: Option<PathBuf>) -> Result<bool> {
    let bytes = match (hex_src, input) {
        (Some(h), _) => hex::decode(h.trim()).context("decode --hex")?,
        (None, Some(path)) => std::fs::read(&path)
            .with_context(|| format!("read packed buffer: {}", path.display()))?,
        (None, None) => anyhow::bail!("one of --hex or --in is required"),
    };

    let mut report = UnpackReport::new(schema_src);
    match Schema::parse(schema_src) {
        Ok(schema) => {
            let mut cursor = schema.cursor(&bytes);
            let mut failed = None;
            for &kind in schema.kinds() {
                match cursor.read(kind) {
                    Ok(field) => report.fields.push(FieldReport::from_field(&field)),
                    Err(e) => {
                        failed = Some(e);
                        break;
                    }
                }
            }
            let outcome = match failed {
                Some(e) => Err(e),
                None => cursor.finish(),
            };
            match outcome {
                Ok(()) => report.ok = true,
                Err(e) => report.error = Some(e.to_string()),
            }
        }
        Err(e) => report.error = Some(e.to_string()),
    }
    print_json(&report)?;
    Ok(report.ok)
}

fn cmd_output_decode(input: PathBuf) -> Result<bool> {
    let stream = std::fs::read(&input)
        .with_context(|| format!("read output stream: {}", input.display()))?;
    let mut report = OutputReport::new();
    match decode_records(&stream) {
        Ok(records) => {
            report.records = records
                .into_iter()
                .map(|(tag, data)| RecordReport::new(tag, data))
                .collect();
            report.ok = true;
        }
        Err(e) => report.error = Some(e.to_string()),
    }
    print_json(&report)?;
    Ok(report.ok)
}
