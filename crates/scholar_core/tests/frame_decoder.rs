use std::sync::Once;

use pretty_assertions::assert_eq;
use scholar_core::{
    decode_all, FrameDecoder, StreamFrame, TokenMarker, GENERATION_BEGIN, GENERATION_END,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn sample_stream() -> String {
    [
        r#"data: {"status": "Uploading paper.pdf"}"#.to_string(),
        r#"data: {"status": "Converting", "base_file_name": "paper"}"#.to_string(),
        format!(r#"data: {{"llm_output": "{GENERATION_BEGIN}"}}"#),
        r##"data: {"llm_output": "# Über die Übersetzung "}"##.to_string(),
        r#"data: {"llm_output": "日本語とemoji 🦀"}"#.to_string(),
        format!(r#"data: {{"llm_output": "{GENERATION_END}", "translation_exists": false}}"#),
        r#"data: {"dir_name": "alice/20240101_paper"}"#.to_string(),
    ]
    .join("\n\n")
        + "\n\n"
}

fn decode_in_parts(bytes: &[u8], cuts: &[usize]) -> Vec<StreamFrame> {
    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        frames.extend(decoder.push(&bytes[start..cut]));
        start = cut;
    }
    frames.extend(decoder.push(&bytes[start..]));
    frames.extend(decoder.finish());
    frames
}

#[test]
fn every_single_split_point_yields_the_same_frames() {
    init_logging();
    let stream = sample_stream();
    let bytes = stream.as_bytes();
    let whole = decode_all(&stream);
    assert_eq!(whole.len(), 7);

    for cut in 0..=bytes.len() {
        assert_eq!(decode_in_parts(bytes, &[cut]), whole, "split at byte {cut}");
    }
}

#[test]
fn pseudo_random_partitions_yield_the_same_frames() {
    init_logging();
    let stream = sample_stream();
    let bytes = stream.as_bytes();
    let whole = decode_all(&stream);

    let mut seed: u64 = 0x5eed_cafe;
    for _ in 0..200 {
        let mut cuts = Vec::new();
        let mut position = 0;
        loop {
            seed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            position += 1 + (seed >> 33) as usize % 17;
            if position >= bytes.len() {
                break;
            }
            cuts.push(position);
        }
        assert_eq!(decode_in_parts(bytes, &cuts), whole, "cuts {cuts:?}");
    }
}

#[test]
fn multibyte_character_split_across_fragments_survives() {
    init_logging();
    let stream = "data: {\"llm_output\": \"🦀\"}\n\n";
    let bytes = stream.as_bytes();
    let crab_start = stream.find('🦀').unwrap();
    let frames = decode_in_parts(bytes, &[crab_start + 1, crab_start + 2]);
    assert_eq!(
        frames,
        vec![StreamFrame::token(TokenMarker::Content("🦀".into()))]
    );
}

#[test]
fn malformed_frames_are_dropped_and_decoding_continues() {
    init_logging();
    let mut decoder = FrameDecoder::new();
    let mut frames = decoder.push_str("data: {\"status\": \"one\"}\n\ndata: {not json\n\n");
    frames.extend(decoder.push_str(": keep-alive\n\ndata: {\"status\": \"two\"}\n\n"));
    frames.extend(decoder.finish());

    assert_eq!(
        frames,
        vec![StreamFrame::status("one"), StreamFrame::status("two")]
    );
    assert_eq!(decoder.dropped(), 1);
}

#[test]
fn trailing_frame_without_delimiter_is_flushed_on_finish() {
    init_logging();
    let mut decoder = FrameDecoder::new();
    assert!(decoder.push_str("data: {\"error\": \"quota exceeded\"}").is_empty());
    assert_eq!(decoder.finish(), vec![StreamFrame::error("quota exceeded")]);
    assert_eq!(decoder.pending_len(), 0);
}

#[test]
fn metadata_fields_are_captured() {
    init_logging();
    let frames = decode_all(&sample_stream());
    assert_eq!(frames[1].metadata.base_name.as_deref(), Some("paper"));
    assert_eq!(frames[5].metadata.translation_exists, Some(false));
    assert_eq!(
        frames[6].metadata.workspace.as_deref(),
        Some("alice/20240101_paper")
    );
}

#[test]
fn crlf_separated_frames_decode_like_lf_ones() {
    init_logging();
    let lf = sample_stream();
    let crlf = lf.replace('\n', "\r\n");
    let expected = decode_all(&lf);

    let mut decoder = FrameDecoder::new();
    let frames = decoder.push_str(&crlf);
    assert_eq!(frames, expected);
    assert_eq!(decoder.pending_len(), 0);
    assert!(decoder.finish().is_empty());
    assert_eq!(decoder.dropped(), 0);
}

#[test]
fn crlf_separator_split_anywhere_yields_the_same_frames() {
    init_logging();
    let crlf = sample_stream().replace('\n', "\r\n");
    let bytes = crlf.as_bytes();
    let whole = decode_all(&crlf);
    assert_eq!(whole.len(), 7);

    for cut in 0..=bytes.len() {
        assert_eq!(decode_in_parts(bytes, &[cut]), whole, "split at byte {cut}");
    }
}

#[test]
fn frame_waits_for_the_rest_of_a_crlf_separator() {
    init_logging();
    let mut decoder = FrameDecoder::new();
    assert!(decoder.push_str("data: {\"status\": \"a\"}\r\n\r").is_empty());
    assert_eq!(decoder.push_str("\n"), vec![StreamFrame::status("a")]);
    assert_eq!(
        decoder.push_str("data: {\"status\": \"b\"}\r\n\r\ndata: {\"status\": \"c\"}\n\n"),
        vec![StreamFrame::status("b"), StreamFrame::status("c")]
    );
    assert_eq!(decoder.dropped(), 0);
}
