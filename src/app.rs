use std::io::{self, BufRead, Write};

use audioprobe_core::{device, probe, AudioBackend};

use crate::{cli::Args, menu};

/// An error that ends the program.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to query audio devices: {0}")]
    QueryDevices(Box<dyn std::error::Error>),
    #[error("Failed to serialize device list: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Print the device listing in the format selected by `args`.
pub fn list_devices<B: AudioBackend, W: Write>(
    backend: &mut B,
    args: &Args,
    out: &mut W,
) -> Result<(), AppError> {
    let list = backend
        .enumerate()
        .map_err(|e| AppError::QueryDevices(Box::new(e)))?;

    log::debug!("Enumerated {} audio devices", list.len());

    if args.json {
        writeln!(out, "{}", device::render_json(&list, args.sort)?)?;
    } else {
        write!(out, "{}", device::render_text(&list, args.sort, args.show_sr))?;
    }

    Ok(())
}

/// Run the explicit test flags in order.
///
/// Returns `true` if any test was requested.
pub fn run_requested_tests<B: AudioBackend, W: Write>(
    backend: &mut B,
    args: &Args,
    out: &mut W,
) -> io::Result<bool> {
    let tone = args.tone_config();

    if let Some(i) = args.test_output_index {
        probe::test_output_device(backend, i, &tone, out)?;
    }

    if let Some(i) = args.test_input_index {
        probe::test_input_device(backend, i, args.duration, out)?;
    }

    if args.test_all_outputs {
        probe::test_all_outputs(backend, &tone, out)?;
    }

    if args.test_all_inputs {
        probe::test_all_inputs(backend, args.duration, out)?;
    }

    Ok(args.has_test_flags())
}

/// List the devices, run the requested tests, and offer the interactive
/// menu if no test was requested and `interactive` is set.
pub fn run<B, R, W>(
    backend: &mut B,
    args: &Args,
    interactive: bool,
    input: &mut R,
    out: &mut W,
) -> Result<(), AppError>
where
    B: AudioBackend,
    R: BufRead,
    W: Write,
{
    list_devices(backend, args, out)?;

    let ran_tests = run_requested_tests(backend, args, out)?;

    if !ran_tests && interactive {
        write!(out, "\nRun tests now? [Y/N]: ")?;
        out.flush()?;

        let mut resp = String::new();
        input.read_line(&mut resp)?;

        if resp.trim().eq_ignore_ascii_case("y") {
            menu::interactive_test(backend, &args.tone_config(), input, out)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use audioprobe_core::backend::dummy::DummyAudioBackend;
    use clap::Parser;

    use super::*;

    fn args(flags: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("audioprobe").chain(flags.iter().copied())).unwrap()
    }

    fn run_with(
        backend: &mut DummyAudioBackend,
        flags: &[&str],
        interactive: bool,
        input: &str,
    ) -> String {
        let mut input = Cursor::new(input.as_bytes().to_vec());
        let mut out = Vec::new();
        run(backend, &args(flags), interactive, &mut input, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn lists_then_exits_without_tests() {
        let mut backend = DummyAudioBackend::default();
        let text = run_with(&mut backend, &["--show-sr"], false, "");

        assert_eq!(
            text,
            "Audio input devices:\n\
             \x20 [0] Dummy Microphone - Dummy | in:1 out:0 | sr: 16000 (default input)\n\
             \x20 [2] Dummy Interface - Dummy | in:4 out:4 | sr: 44100\n\
             \n\
             Audio output devices:\n\
             \x20 [1] Dummy Speakers - Dummy | in:0 out:2 | sr: 48000 (default output)\n\
             \x20 [2] Dummy Interface - Dummy | in:4 out:4 | sr: 44100\n"
        );
    }

    #[test]
    fn json_listing() {
        let mut backend = DummyAudioBackend::default();
        let text = run_with(&mut backend, &["--json", "--sort", "name"], false, "");

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let names: Vec<&str> = value
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Dummy Interface", "Dummy Microphone", "Dummy Speakers"]);
    }

    #[test]
    fn explicit_tests_run_in_order() {
        let mut backend = DummyAudioBackend::default();
        let text = run_with(
            &mut backend,
            &["--test-input-index", "0", "--test-output-index", "1", "--duration", "0.1"],
            true,
            "y\n",
        );

        let out_pos = text.find("[out 1] playing").unwrap();
        let in_pos = text.find("[in  0] recording").unwrap();
        assert!(out_pos < in_pos);
        // Tests were requested, so the menu is not offered.
        assert!(!text.contains("Run tests now?"));
    }

    #[test]
    fn offers_menu_when_interactive() {
        let mut backend = DummyAudioBackend::default();

        let text = run_with(&mut backend, &[], true, "n\n");
        assert!(text.ends_with("\nRun tests now? [Y/N]: "));

        let text = run_with(&mut backend, &[], true, "Y\nq\n");
        assert!(text.contains("Interactive test mode."));
        assert!(text.ends_with("Exiting interactive test mode.\n"));

        let text = run_with(&mut backend, &[], false, "y\n");
        assert!(!text.contains("Run tests now?"));
    }

    #[test]
    fn enumeration_failure_is_an_error() {
        let mut backend = DummyAudioBackend::default();
        backend.fail_enumerate = true;

        let mut out = Vec::new();
        let err = run(&mut backend, &args(&[]), false, &mut Cursor::new(Vec::new()), &mut out)
            .unwrap_err();

        assert_eq!(err.to_string(), "Failed to query audio devices: Device unavailable");
        assert!(out.is_empty());
    }
}
