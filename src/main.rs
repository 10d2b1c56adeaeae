use std::{
    io::{self, IsTerminal},
    process::ExitCode,
};

use audioprobe::{
    app::{self, AppError},
    backend::dummy::DummyAudioBackend,
    cli::Args,
};
use clap::Parser;

fn main() -> ExitCode {
    let args = Args::parse();

    // Log lines would corrupt the JSON listing.
    if args.verbose {
        simple_log::quick!("debug");
    } else if args.json {
        simple_log::quick!("error");
    } else {
        simple_log::quick!("info");
    }

    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    let mut input = stdin.lock();
    let mut out = io::stdout().lock();

    let result = if args.dummy {
        app::run(&mut DummyAudioBackend::default(), &args, interactive, &mut input, &mut out)
    } else {
        run_platform(&args, interactive, &mut input, &mut out)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe => ExitCode::SUCCESS,
        Err(e) => {
            println!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "cpal")]
fn run_platform(
    args: &Args,
    interactive: bool,
    input: &mut impl io::BufRead,
    out: &mut impl io::Write,
) -> Result<(), AppError> {
    let mut backend = audioprobe::CpalBackend::new(args.backend_config());
    app::run(&mut backend, args, interactive, input, out)
}

#[cfg(not(feature = "cpal"))]
fn run_platform(
    args: &Args,
    interactive: bool,
    input: &mut impl io::BufRead,
    out: &mut impl io::Write,
) -> Result<(), AppError> {
    log::warn!("Built without the cpal backend. Using dummy devices...");
    app::run(&mut DummyAudioBackend::default(), args, interactive, input, out)
}
