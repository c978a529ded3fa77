//! Writes TypeScript bindings for the cockpit wire types.
//!
//! The web client imports the generated `.ts` files instead of keeping a
//! hand-written copy of the schema.

use ck_protocol::{
    Command, CommandEvent, CommandEventKind, CommandStatus, ErrorBody, LogRecord, NewCommand,
    PageQuery, StopResponse,
};
use clap::Parser;
use std::path::PathBuf;
use ts_rs::TS;

#[derive(Parser, Debug)]
#[command(name = "ck-protocol-ts", about = "Generate TypeScript bindings for ck-protocol")]
struct Args {
    /// Directory the bindings are written to.
    #[arg(short, long, default_value = "bindings")]
    out_dir: PathBuf,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    std::fs::create_dir_all(&args.out_dir)?;

    // `export_all_to` also writes every type these depend on.
    Command::export_all_to(&args.out_dir)?;
    CommandStatus::export_all_to(&args.out_dir)?;
    CommandEvent::export_all_to(&args.out_dir)?;
    CommandEventKind::export_all_to(&args.out_dir)?;
    LogRecord::export_all_to(&args.out_dir)?;
    NewCommand::export_all_to(&args.out_dir)?;
    PageQuery::export_all_to(&args.out_dir)?;
    StopResponse::export_all_to(&args.out_dir)?;
    ErrorBody::export_all_to(&args.out_dir)?;

    println!("TypeScript bindings written to {}", args.out_dir.display());
    Ok(())
}
