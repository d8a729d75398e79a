use std::fs;
use std::process::ExitCode;

use clap::Parser;

use bootelf_dump::cli::{Cli, Command};
use bootelf_dump::commands;
use bootelf_dump::diag::StderrLog;
use bootelf_dump::error::DumpError;
use bootelf_dump::output;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::emit_error(cli.output, e.code(), &e.to_string());
            e.exit_code()
        }
    }
}

fn run(cli: &Cli) -> Result<(), DumpError> {
    let log = StderrLog;

    match &cli.command {
        Command::Info(args) => {
            let image = commands::read_image(&args.image)?;
            let mut elf = commands::open(&image, &log, cli.verbose)?;
            output::emit(cli.output, &commands::info(&mut elf))?;
        }
        Command::Lookup(args) => {
            let image = commands::read_image(&args.image)?;
            let elf = commands::open(&image, &log, cli.verbose)?;
            output::emit(cli.output, &commands::lookup(&elf, &args.symbols)?)?;
        }
        Command::Load(args) => {
            let image = commands::read_image(&args.image)?;
            let mut elf = commands::open(&image, &log, cli.verbose)?;
            let (mut report, memory) = commands::load(&mut elf, args.dest_base, args.bsd_syms)?;
            if let Some(path) = &args.out {
                fs::write(path, &memory)?;
                report.written_to = Some(path.display().to_string());
            }
            output::emit(cli.output, &report)?;
        }
    }
    Ok(())
}
