//! Transcript consolidation.
//!
//! Turns the bot service's raw per-word transcript payload into ordered,
//! speaker-attributed statements and merges them into one line per
//! (timestamp, speaker) for summarization. Decoding is lenient: missing
//! fields default rather than fail, and malformed intermediate lines are
//! dropped rather than fatal.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

/// Raw meeting data as returned by the bot service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingData {
    #[serde(default)]
    pub editors: Vec<Editor>,
    #[serde(default)]
    pub assets: Vec<MeetingAsset>,
    #[serde(default)]
    pub attendees: serde_json::Value,
}

impl MeetingData {
    /// URL of the meeting recording, taken from the first asset.
    pub fn mp4_url(&self) -> Option<&str> {
        self.assets.first().and_then(|asset| asset.mp4_s3_path.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Editor {
    #[serde(default)]
    pub video: Option<VideoTrack>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoTrack {
    #[serde(default)]
    pub transcripts: Vec<TranscriptTurn>,
}

/// One speaker turn: a label and the words spoken in it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptTurn {
    #[serde(default)]
    pub speaker: SpeakerLabel,
    #[serde(default)]
    pub words: Vec<Word>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Word {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub start_time: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingAsset {
    #[serde(default)]
    pub mp4_s3_path: Option<String>,
}

/// Speaker labels arrive as names or numeric ids depending on the
/// transcription provider behind the bot service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SpeakerLabel {
    Name(String),
    Id(i64),
}

impl Default for SpeakerLabel {
    fn default() -> Self {
        SpeakerLabel::Name("unknown".to_string())
    }
}

impl fmt::Display for SpeakerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeakerLabel::Name(name) => write!(f, "{}", name),
            SpeakerLabel::Id(id) => write!(f, "{}", id),
        }
    }
}

/// One reconciled utterance. Transient: only merged lines are persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerStatement {
    pub speaker: String,
    pub start_time: f64,
    pub text: String,
}

/// Groups every turn with at least one word by (speaker, start time of
/// its first word). Turns sharing a key accumulate in encounter order;
/// speakers keep their first-encounter order, times sort ascending within
/// a speaker.
pub fn extract_statements(meeting: &MeetingData) -> Vec<SpeakerStatement> {
    let mut speakers: Vec<(String, Vec<(f64, Vec<String>)>)> = Vec::new();

    for editor in &meeting.editors {
        let Some(video) = &editor.video else { continue };
        for turn in &video.transcripts {
            let Some(first) = turn.words.first() else { continue };
            let start_time = first.start_time;
            let text = turn
                .words
                .iter()
                .filter_map(|word| word.text.as_deref())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string();
            let speaker = turn.speaker.to_string();

            let index = match speakers.iter().position(|(name, _)| *name == speaker) {
                Some(index) => index,
                None => {
                    speakers.push((speaker, Vec::new()));
                    speakers.len() - 1
                }
            };
            let group = &mut speakers[index].1;
            match group.iter_mut().find(|(time, _)| *time == start_time) {
                Some((_, texts)) => texts.push(text),
                None => group.push((start_time, vec![text])),
            }
        }
    }

    let mut statements = Vec::new();
    for (speaker, mut group) in speakers {
        group.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        for (start_time, texts) in group {
            statements.push(SpeakerStatement {
                speaker: speaker.clone(),
                start_time,
                text: texts.join(" ").trim().to_string(),
            });
        }
    }
    statements
}

/// Renders statements in the intermediate line format,
/// `from {start}s {speaker} : {text}` with a 2-decimal timestamp.
pub fn statement_lines(statements: &[SpeakerStatement]) -> Vec<String> {
    statements
        .iter()
        .map(|statement| {
            format!(
                "from {:.2}s {} : {}",
                statement.start_time, statement.speaker, statement.text
            )
        })
        .collect()
}

/// Merges intermediate-format lines into one line per (timestamp,
/// speaker), `{speaker} at {timestamp}s :- {text}`.
///
/// Lines missing the `" : "` separator or with fewer than three
/// space-delimited head tokens are dropped. Output order is ascending on
/// the (timestamp-string, speaker) tuple; the timestamp comparison is
/// deliberately lexicographic, so "10.00" orders before "2.00".
pub fn merge_statement_lines(lines: &[String]) -> Vec<String> {
    let mut grouped: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();

    for line in lines {
        let Some((head, text)) = line.split_once(" : ") else {
            continue;
        };
        let mut head_tokens = head.splitn(3, ' ');
        let (Some(_), Some(time_token), Some(speaker)) =
            (head_tokens.next(), head_tokens.next(), head_tokens.next())
        else {
            continue;
        };
        let timestamp = time_token.strip_suffix('s').unwrap_or(time_token);
        grouped
            .entry((timestamp.to_string(), speaker.to_string()))
            .or_default()
            .push(text.trim().to_string());
    }

    grouped
        .into_iter()
        .map(|((timestamp, speaker), texts)| merged_line(&speaker, &timestamp, &texts))
        .collect()
}

/// Consolidates raw meeting data straight into the final merged lines,
/// skipping the intermediate string round-trip while producing the same
/// output (including the lexicographic ordering) as rendering statement
/// lines and re-merging them.
pub fn consolidate(meeting: &MeetingData) -> Vec<String> {
    let mut grouped: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();

    for statement in extract_statements(meeting) {
        grouped
            .entry((format!("{:.2}", statement.start_time), statement.speaker))
            .or_default()
            .push(statement.text);
    }

    grouped
        .into_iter()
        .map(|((timestamp, speaker), texts)| merged_line(&speaker, &timestamp, &texts))
        .collect()
}

fn merged_line(speaker: &str, timestamp: &str, texts: &[String]) -> String {
    format!("{} at {}s :- {}", speaker, timestamp, texts.join(" ").trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn word(text: &str, start_time: f64) -> Word {
        Word {
            text: Some(text.to_string()),
            start_time,
        }
    }

    fn turn(speaker: &str, words: Vec<Word>) -> TranscriptTurn {
        TranscriptTurn {
            speaker: SpeakerLabel::Name(speaker.to_string()),
            words,
        }
    }

    fn meeting(turns: Vec<TranscriptTurn>) -> MeetingData {
        MeetingData {
            editors: vec![Editor {
                video: Some(VideoTrack { transcripts: turns }),
            }],
            ..MeetingData::default()
        }
    }

    #[test]
    fn test_extract_merges_turns_sharing_a_key() {
        let data = meeting(vec![
            turn("A", vec![word("Hi", 0.0), word("there", 0.1)]),
            turn("A", vec![word("!", 0.0)]),
        ]);

        let statements = extract_statements(&data);
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].speaker, "A");
        assert_eq!(statements[0].start_time, 0.0);
        assert_eq!(statements[0].text, "Hi there !");
    }

    #[test]
    fn test_extract_keys_by_first_word_time() {
        // The second turn starts at 0.05, not 0.0, so it stays separate.
        let data = meeting(vec![
            turn("A", vec![word("Hi", 0.0)]),
            turn("A", vec![word("!", 0.05)]),
        ]);

        let statements = extract_statements(&data);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].text, "Hi");
        assert_eq!(statements[1].text, "!");
    }

    #[test]
    fn test_extract_skips_wordless_turns() {
        let data = meeting(vec![turn("A", vec![]), turn("B", vec![word("ok", 1.0)])]);

        let statements = extract_statements(&data);
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].speaker, "B");
    }

    #[test]
    fn test_extract_orders_times_within_speaker() {
        let data = meeting(vec![
            turn("A", vec![word("later", 5.0)]),
            turn("A", vec![word("earlier", 1.0)]),
        ]);

        let statements = extract_statements(&data);
        assert_eq!(statements[0].text, "earlier");
        assert_eq!(statements[1].text, "later");
    }

    #[test]
    fn test_extract_keeps_speaker_encounter_order() {
        let data = meeting(vec![
            turn("B", vec![word("first", 9.0)]),
            turn("A", vec![word("second", 1.0)]),
        ]);

        let statements = extract_statements(&data);
        assert_eq!(statements[0].speaker, "B");
        assert_eq!(statements[1].speaker, "A");
    }

    #[test]
    fn test_extract_numeric_and_missing_speakers() {
        let data = meeting(vec![
            TranscriptTurn {
                speaker: SpeakerLabel::Id(7),
                words: vec![word("hi", 0.0)],
            },
            TranscriptTurn {
                speaker: SpeakerLabel::default(),
                words: vec![word("yo", 1.0)],
            },
        ]);

        let statements = extract_statements(&data);
        assert_eq!(statements[0].speaker, "7");
        assert_eq!(statements[1].speaker, "unknown");
    }

    #[test]
    fn test_extract_ignores_empty_word_text() {
        let mut words = vec![word("Hello", 2.0)];
        words.push(Word {
            text: None,
            start_time: 2.1,
        });
        words.push(word("", 2.2));
        words.push(word("world", 2.3));
        let data = meeting(vec![turn("A", words)]);

        let statements = extract_statements(&data);
        assert_eq!(statements[0].text, "Hello world");
    }

    #[test]
    fn test_statement_line_format() {
        let statements = vec![SpeakerStatement {
            speaker: "A".to_string(),
            start_time: 1.5,
            text: "Hello".to_string(),
        }];
        assert_eq!(statement_lines(&statements), vec!["from 1.50s A : Hello"]);
    }

    #[test]
    fn test_merge_concatenates_same_key() {
        let lines = vec![
            "from 1.00s A : Hello".to_string(),
            "from 1.00s A : World".to_string(),
        ];
        assert_eq!(merge_statement_lines(&lines), vec!["A at 1.00s :- Hello World"]);
    }

    #[test]
    fn test_merge_drops_malformed_lines() {
        let lines = vec![
            "complete garbage".to_string(),
            "from : missing tokens".to_string(),
            "from 1.00s A : Hello".to_string(),
        ];
        assert_eq!(merge_statement_lines(&lines), vec!["A at 1.00s :- Hello"]);
    }

    #[test]
    fn test_merge_orders_lexicographically_by_timestamp() {
        let lines = vec![
            "from 2.00s B : second".to_string(),
            "from 10.00s A : tenth".to_string(),
        ];
        // "10.00" < "2.00" as strings; the ordering is intentionally
        // lexicographic.
        assert_eq!(
            merge_statement_lines(&lines),
            vec!["A at 10.00s :- tenth", "B at 2.00s :- second"]
        );
    }

    #[test]
    fn test_merge_ties_break_on_speaker() {
        let lines = vec![
            "from 1.00s B : beta".to_string(),
            "from 1.00s A : alpha".to_string(),
        ];
        assert_eq!(
            merge_statement_lines(&lines),
            vec!["A at 1.00s :- alpha", "B at 1.00s :- beta"]
        );
    }

    #[test]
    fn test_consolidate_matches_two_pass_output() {
        let data = meeting(vec![
            turn("B", vec![word("hello", 2.0), word("there", 2.4)]),
            turn("A", vec![word("hi", 10.0)]),
            turn("B", vec![word("again", 2.0)]),
            turn("A", vec![word("bye", 1.0)]),
        ]);

        let two_pass = merge_statement_lines(&statement_lines(&extract_statements(&data)));
        assert_eq!(consolidate(&data), two_pass);
        assert_eq!(
            two_pass,
            vec![
                "A at 1.00s :- bye",
                "A at 10.00s :- hi",
                "B at 2.00s :- hello there again",
            ]
        );
    }

    #[test]
    fn test_consolidate_empty_meeting() {
        assert!(consolidate(&MeetingData::default()).is_empty());
    }

    #[test]
    fn test_meeting_data_decodes_leniently() {
        let data: MeetingData = serde_json::from_value(json!({
            "editors": [
                {},
                { "video": null },
                { "video": { "transcripts": [
                    { "speaker": 3, "words": [{ "text": "ok", "start_time": 1.0 }] },
                    { "words": [{ "start_time": 2.0 }] }
                ] } }
            ],
            "assets": [{ "mp4_s3_path": "https://cdn/rec.mp4" }]
        }))
        .unwrap();

        assert_eq!(data.mp4_url(), Some("https://cdn/rec.mp4"));
        let statements = extract_statements(&data);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].speaker, "3");
        // A turn whose only word has no text still claims its key.
        assert_eq!(statements[1].speaker, "unknown");
        assert_eq!(statements[1].text, "");
    }

    #[test]
    fn test_consolidate_single_statement_roundtrip() {
        let data = meeting(vec![turn("Ana", vec![word("Hello", 0.0), word("World", 0.3)])]);
        assert_eq!(consolidate(&data), vec!["Ana at 0.00s :- Hello World"]);
    }
}
