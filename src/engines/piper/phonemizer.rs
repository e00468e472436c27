use std::borrow::Cow;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::config::{BOS, EOS, PAD};
use super::model::PiperError;

/// Where to find espeak-ng.
///
/// Either path can be `None` to use the system `espeak-ng` from PATH and its
/// built-in data directory.
#[derive(Debug, Clone, Default)]
pub struct EspeakConfig {
    pub bin_path: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
}

/// Convert text to one IPA phoneme string per sentence via espeak-ng.
///
/// Each returned string is synthesized as its own chunk. Punctuation is kept
/// in the phoneme stream so the voice can pause and inflect on it.
pub fn phonemize(
    text: &str,
    espeak_voice: &str,
    espeak: &EspeakConfig,
) -> Result<Vec<String>, PiperError> {
    let parts = split_text_parts(text);
    if parts.is_empty() {
        return Ok(Vec::new());
    }

    let text_segments: Vec<&str> = parts
        .iter()
        .filter_map(|part| match part {
            TextPart::Text(segment) => Some(segment.as_str()),
            TextPart::Punct(_) => None,
        })
        .collect();

    let segment_ipa = if text_segments.is_empty() {
        Vec::new()
    } else {
        phonemize_segments_batch(&text_segments, espeak_voice, espeak)?
    };

    Ok(assemble_sentences(&parts, &segment_ipa))
}

/// Map a phoneme string to Piper model input ids.
///
/// Layout: `^ _ p1 _ p2 _ … pn _ $`. Phonemes missing from the map are
/// dropped.
pub fn phonemes_to_ids(phonemes: &str, id_map: &HashMap<char, Vec<i64>>) -> Vec<i64> {
    let pad = id_map.get(&PAD).map(Vec::as_slice).unwrap_or(&[]);
    let mut ids = Vec::with_capacity(phonemes.chars().count() * 2 + 3);

    if let Some(bos) = id_map.get(&BOS) {
        ids.extend_from_slice(bos);
    }
    ids.extend_from_slice(pad);

    for ch in phonemes.chars() {
        match id_map.get(&ch) {
            Some(phoneme_ids) => {
                ids.extend_from_slice(phoneme_ids);
                ids.extend_from_slice(pad);
            }
            None => log::debug!("Dropping phoneme {ch:?} missing from the voice's id map"),
        }
    }

    if let Some(eos) = id_map.get(&EOS) {
        ids.extend_from_slice(eos);
    }
    ids
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TextPart {
    Text(String),
    Punct(char),
}

fn split_text_parts(text: &str) -> Vec<TextPart> {
    let mut parts = Vec::new();
    let mut current = String::new();

    for (idx, ch) in text.char_indices() {
        let ch_len = ch.len_utf8();
        if let Some(punct) = map_boundary_punctuation(ch) {
            if !is_numeric_connector_between_digits(text, idx, ch_len, ch) {
                flush_text_part(&mut parts, &mut current);
                parts.push(TextPart::Punct(punct));
                continue;
            }
        }

        if ch.is_whitespace() {
            if !current.is_empty() && !current.ends_with(' ') {
                current.push(' ');
            }
            continue;
        }

        current.push(ch);
    }

    flush_text_part(&mut parts, &mut current);
    parts
}

fn flush_text_part(parts: &mut Vec<TextPart>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(TextPart::Text(trimmed.to_string()));
    }
    current.clear();
}

fn map_boundary_punctuation(ch: char) -> Option<char> {
    match ch {
        '.' | '!' | '?' | ',' | ';' | ':' => Some(ch),
        '\n' | '\r' => Some('.'),
        _ => None,
    }
}

fn ends_sentence(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}

fn is_numeric_connector_between_digits(text: &str, idx: usize, ch_len: usize, ch: char) -> bool {
    if !matches!(ch, '.' | ',') {
        return false;
    }

    let prev = text[..idx].chars().next_back();
    let next = text[idx + ch_len..].chars().next();

    matches!(
        (prev, next),
        (Some(left), Some(right)) if left.is_ascii_digit() && right.is_ascii_digit()
    )
}

/// Interleave phonemized text segments with punctuation, cutting a new
/// sentence after each terminator. Repeated terminators (blank lines, "?!")
/// collapse into the sentence they close.
fn assemble_sentences(parts: &[TextPart], segment_ipa: &[String]) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut segment_index = 0usize;

    for part in parts {
        match part {
            TextPart::Text(_) => {
                if let Some(ipa) = segment_ipa.get(segment_index) {
                    if !current.is_empty() && !current.ends_with(' ') {
                        current.push(' ');
                    }
                    current.push_str(ipa);
                }
                segment_index += 1;
            }
            TextPart::Punct(ch) => {
                if current.is_empty() {
                    continue;
                }
                current.push(*ch);
                if ends_sentence(*ch) {
                    sentences.push(std::mem::take(&mut current));
                }
            }
        }
    }

    if !current.trim().is_empty() {
        sentences.push(current);
    }
    sentences
}

fn phonemize_segments_batch(
    segments: &[&str],
    lang: &str,
    espeak: &EspeakConfig,
) -> Result<Vec<String>, PiperError> {
    let batched_input = segments.join("\n");
    let output = run_espeak(&batched_input, lang, espeak)?;
    let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();

    // espeak-ng should emit one line per input line for stdin mode.
    // If this assumption breaks, fall back to per-segment invocation.
    if lines.len() != segments.len() {
        log::debug!(
            "espeak-ng returned {} lines for {} segments, phonemizing one at a time",
            lines.len(),
            segments.len()
        );
        return segments
            .iter()
            .map(|segment| {
                let output = run_espeak(segment, lang, espeak)?;
                Ok(clean_ipa(&output))
            })
            .collect();
    }

    Ok(lines.iter().map(|line| clean_ipa(line)).collect())
}

fn run_espeak(input: &str, lang: &str, espeak: &EspeakConfig) -> Result<String, PiperError> {
    let program = espeak
        .bin_path
        .as_deref()
        .map(|p| p.as_os_str())
        .unwrap_or_else(|| OsStr::new("espeak-ng"));
    let mut command = Command::new(program);
    command
        .args(["--ipa", "--stdin", "-q", "-v", lang])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(data_path) = &espeak.data_path {
        command.env("ESPEAK_DATA_PATH", data_path);
    }

    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PiperError::EspeakNotFound
        } else {
            PiperError::Io(e)
        }
    })?;

    if let Some(mut stdin) = child.stdin.take() {
        // espeak-ng treats stdin as line-oriented; the last line needs a terminator.
        let stdin_payload = canonicalize_espeak_stdin_payload(input);
        stdin
            .write_all(stdin_payload.as_bytes())
            .map_err(PiperError::Io)?;
    }

    let output = child.wait_with_output().map_err(PiperError::Io)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PiperError::PhonemizerFailed(format!(
            "espeak-ng exited with code {:?}: {stderr}",
            output.status.code()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn canonicalize_espeak_stdin_payload(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}

/// Join espeak output lines and drop its pause markers.
fn clean_ipa(ipa: &str) -> String {
    ipa.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.chars().filter(|&ch| ch != '_').collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_map() -> HashMap<char, Vec<i64>> {
        [
            ('_', vec![0]),
            ('^', vec![1]),
            ('$', vec![2]),
            (' ', vec![3]),
            ('.', vec![10]),
            ('h', vec![20]),
            ('i', vec![21]),
        ]
        .into_iter()
        .collect()
    }

    fn espeak_available() -> bool {
        Command::new("espeak-ng").arg("--version").output().is_ok()
    }

    #[test]
    fn splits_text_and_punctuation_parts() {
        let parts = split_text_parts("Hello, world. Testing!");
        assert_eq!(
            parts,
            vec![
                TextPart::Text("Hello".to_string()),
                TextPart::Punct(','),
                TextPart::Text("world".to_string()),
                TextPart::Punct('.'),
                TextPart::Text("Testing".to_string()),
                TextPart::Punct('!'),
            ]
        );
    }

    #[test]
    fn keeps_decimal_and_thousands_separators_inside_text() {
        let parts = split_text_parts("Version 2.0 reached 1,000 users.");
        assert_eq!(
            parts,
            vec![
                TextPart::Text("Version 2.0 reached 1,000 users".to_string()),
                TextPart::Punct('.'),
            ]
        );
    }

    #[test]
    fn newlines_end_sentences() {
        let parts = split_text_parts("EXIT\nFloor 2");
        assert_eq!(
            parts,
            vec![
                TextPart::Text("EXIT".to_string()),
                TextPart::Punct('.'),
                TextPart::Text("Floor 2".to_string()),
            ]
        );
    }

    #[test]
    fn assembles_one_phoneme_string_per_sentence() {
        let parts = split_text_parts("Hello, world. Testing!\n\nDone");
        let ipa = vec![
            "həlˈoʊ".to_string(),
            "wˈɜːld".to_string(),
            "tˈɛstɪŋ".to_string(),
            "dˈʌn".to_string(),
        ];
        assert_eq!(
            assemble_sentences(&parts, &ipa),
            vec![
                "həlˈoʊ, wˈɜːld.".to_string(),
                "tˈɛstɪŋ!".to_string(),
                "dˈʌn".to_string(),
            ]
        );
    }

    #[test]
    fn punctuation_only_text_yields_no_sentences() {
        let parts = split_text_parts("...!?");
        assert!(assemble_sentences(&parts, &[]).is_empty());
    }

    #[test]
    fn ids_are_framed_and_padded() {
        assert_eq!(
            phonemes_to_ids("hi.", &id_map()),
            vec![1, 0, 20, 0, 21, 0, 10, 0, 2]
        );
    }

    #[test]
    fn unknown_phonemes_are_dropped() {
        assert_eq!(phonemes_to_ids("hx", &id_map()), vec![1, 0, 20, 0, 2]);
    }

    #[test]
    fn clean_ipa_joins_lines_and_strips_pauses() {
        assert_eq!(clean_ipa(" həlˈoʊ_\n\nwˈɜːld \n"), "həlˈoʊ wˈɜːld");
    }

    #[test]
    fn appends_trailing_newline_for_espeak_stdin() {
        assert_eq!(canonicalize_espeak_stdin_payload("America"), "America\n");
        assert_eq!(canonicalize_espeak_stdin_payload("America\n"), "America\n");
    }

    #[test]
    fn missing_espeak_binary_is_reported() {
        let espeak = EspeakConfig {
            bin_path: Some(PathBuf::from("/nonexistent/espeak-ng")),
            data_path: None,
        };
        let err = phonemize("hello", "en-us", &espeak).unwrap_err();
        assert!(matches!(err, PiperError::EspeakNotFound));
    }

    #[test]
    fn phonemize_produces_sentences_with_system_espeak() {
        // Skip when espeak-ng is unavailable in the execution environment.
        if !espeak_available() {
            return;
        }

        let sentences =
            phonemize("Hello world. How are you?", "en-us", &EspeakConfig::default()).unwrap();
        assert_eq!(sentences.len(), 2);
        assert!(sentences[0].ends_with('.'));
        assert!(sentences[1].ends_with('?'));
    }
}
