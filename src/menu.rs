//! The interactive test menu.

use std::{
    io::{self, BufRead, Write},
    str::FromStr,
};

use audioprobe_core::{probe, tone, AudioBackend, ToneConfig};

/// Print `prompt` and read one trimmed line.
///
/// Returns `None` at the end of input.
fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    prompt: &str,
) -> io::Result<Option<String>> {
    write!(out, "{}", prompt)?;
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }

    Ok(Some(line.trim().to_string()))
}

/// Parse `s`, or return `default` if `s` is empty.
fn parse_or<T: FromStr>(s: &str, default: T) -> Result<T, T::Err> {
    if s.is_empty() {
        Ok(default)
    } else {
        s.parse()
    }
}

enum Answer<T> {
    Value(T),
    Invalid(String),
    Eof,
}

/// Parse a duration in seconds, or return `default` if `s` is empty.
fn parse_duration_or(s: &str, default: f64) -> Result<f64, String> {
    let secs = parse_or(s, default).map_err(|e| e.to_string())?;
    tone::check_duration(secs).map_err(|e| e.to_string())
}

fn ask_duration<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    default: f64,
) -> io::Result<Answer<f64>> {
    let Some(s) = prompt(input, out, &format!("Duration seconds [{:?}]: ", default))? else {
        return Ok(Answer::Eof);
    };

    Ok(match parse_duration_or(&s, default) {
        Ok(v) => Answer::Value(v),
        Err(e) => Answer::Invalid(e),
    })
}

fn ask_tone<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    defaults: &ToneConfig,
) -> io::Result<Answer<ToneConfig>> {
    let dur_prompt = format!("Duration seconds [{:?}]: ", defaults.duration_secs);
    let Some(dur) = prompt(input, out, &dur_prompt)? else {
        return Ok(Answer::Eof);
    };
    let Some(freq) = prompt(input, out, &format!("Tone freq Hz [{:?}]: ", defaults.freq_hz))? else {
        return Ok(Answer::Eof);
    };
    let Some(amp) = prompt(input, out, &format!("Amp 0..1 [{:?}]: ", defaults.amp))? else {
        return Ok(Answer::Eof);
    };

    let parsed = (|| {
        Ok::<_, String>(ToneConfig {
            duration_secs: parse_duration_or(&dur, defaults.duration_secs)?,
            freq_hz: parse_or(&freq, defaults.freq_hz).map_err(|e| e.to_string())?,
            amp: parse_or(&amp, defaults.amp).map_err(|e| e.to_string())?,
        })
    })();

    Ok(match parsed {
        Ok(tone) => Answer::Value(tone),
        Err(e) => Answer::Invalid(e),
    })
}

fn ask_index<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    text: &str,
) -> io::Result<Answer<usize>> {
    let Some(s) = prompt(input, out, text)? else {
        return Ok(Answer::Eof);
    };

    Ok(match s.parse::<usize>() {
        Ok(i) => Answer::Value(i),
        Err(e) => Answer::Invalid(e.to_string()),
    })
}

/// Run the interactive menu until the user quits or the input ends.
///
/// `defaults` provides the values offered at each prompt.
pub fn interactive_test<B, R, W>(
    backend: &mut B,
    defaults: &ToneConfig,
    input: &mut R,
    out: &mut W,
) -> io::Result<()>
where
    B: AudioBackend,
    R: BufRead,
    W: Write,
{
    writeln!(
        out,
        "\nInteractive test mode. Press Enter to accept defaults or 'q' to quit."
    )?;

    loop {
        writeln!(out, "\nOptions:")?;
        writeln!(out, "  1) Test single output by index")?;
        writeln!(out, "  2) Test single input by index")?;
        writeln!(out, "  3) Test all outputs")?;
        writeln!(out, "  4) Test all inputs")?;
        writeln!(out, "  q) Quit")?;

        let Some(choice) = prompt(input, out, "Select option [q]: ")? else {
            break;
        };

        match choice.to_lowercase().as_str() {
            "" | "q" => break,
            "1" => {
                let index = match ask_index(input, out, "Output device index: ")? {
                    Answer::Value(i) => i,
                    Answer::Invalid(_) => {
                        writeln!(out, "Invalid index")?;
                        continue;
                    }
                    Answer::Eof => break,
                };
                match ask_tone(input, out, defaults)? {
                    Answer::Value(tone) => {
                        probe::test_output_device(backend, index, &tone, out)?;
                    }
                    Answer::Invalid(e) => writeln!(out, "Error: {}", e)?,
                    Answer::Eof => break,
                }
            }
            "2" => {
                let index = match ask_index(input, out, "Input device index: ")? {
                    Answer::Value(i) => i,
                    Answer::Invalid(_) => {
                        writeln!(out, "Invalid index")?;
                        continue;
                    }
                    Answer::Eof => break,
                };
                match ask_duration(input, out, defaults.duration_secs)? {
                    Answer::Value(duration) => {
                        probe::test_input_device(backend, index, duration, out)?;
                    }
                    Answer::Invalid(e) => writeln!(out, "Error: {}", e)?,
                    Answer::Eof => break,
                }
            }
            "3" => match ask_tone(input, out, defaults)? {
                Answer::Value(tone) => {
                    probe::test_all_outputs(backend, &tone, out)?;
                }
                Answer::Invalid(e) => writeln!(out, "Error: {}", e)?,
                Answer::Eof => break,
            },
            "4" => match ask_duration(input, out, defaults.duration_secs)? {
                Answer::Value(duration) => {
                    probe::test_all_inputs(backend, duration, out)?;
                }
                Answer::Invalid(e) => writeln!(out, "Error: {}", e)?,
                Answer::Eof => break,
            },
            _ => writeln!(out, "Unknown option")?,
        }
    }

    writeln!(out, "Exiting interactive test mode.")?;

    Ok(())
}
