use super::framing::*;

#[test]
fn test_sse_simple_event() {
    let mut parser = SseParser::new();
    let frames = parser.feed(b"data: {\"type\":\"CREATED\"}\n\n");

    assert_eq!(frames, vec![RawFrame::new("{\"type\":\"CREATED\"}")]);
}

#[test]
fn test_sse_event_split_across_chunks() {
    let mut parser = SseParser::new();

    assert!(parser.feed(b"data: {\"type\":").is_empty());
    assert!(parser.feed(b"\"UPDATED\"}\n").is_empty());
    let frames = parser.feed(b"\n");

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, "{\"type\":\"UPDATED\"}");
}

#[test]
fn test_sse_multiple_events_in_one_chunk() {
    let mut parser = SseParser::new();
    let frames = parser.feed(b"data: one\n\ndata: two\n\ndata: three\n\n");

    let data: Vec<_> = frames.iter().map(|f| f.data.as_str()).collect();
    assert_eq!(data, vec!["one", "two", "three"]);
}

#[test]
fn test_sse_multiline_data_is_joined() {
    let mut parser = SseParser::new();
    let frames = parser.feed(b"data: first\ndata: second\n\n");

    assert_eq!(frames[0].data, "first\nsecond");
}

#[test]
fn test_sse_crlf_and_compact_prefix() {
    let mut parser = SseParser::new();
    let frames = parser.feed(b"data:compact\r\n\r\n");

    assert_eq!(frames, vec![RawFrame::new("compact")]);
}

#[test]
fn test_sse_id_is_kept() {
    let mut parser = SseParser::new();
    let frames = parser.feed(b"id: 42\nevent: change\ndata: payload\n\n");

    assert_eq!(frames, vec![RawFrame::with_id("payload", "42")]);
}

#[test]
fn test_sse_comments_are_ignored() {
    let mut parser = SseParser::new();
    let frames = parser.feed(b": keep-alive\n\n: ping\ndata: real\n\n");

    assert_eq!(frames, vec![RawFrame::new("real")]);
}

#[test]
fn test_sse_multibyte_character_split_across_chunks() {
    let mut parser = SseParser::new();
    let payload = "data: café\n\n".as_bytes();
    // split inside the two-byte 'é'
    let split = payload.iter().position(|b| *b == 0xC3).unwrap() + 1;

    assert!(parser.feed(&payload[..split]).is_empty());
    let frames = parser.feed(&payload[split..]);

    assert_eq!(frames, vec![RawFrame::new("café")]);
}

#[test]
fn test_sse_named_event_without_data_is_not_dispatched() {
    let mut parser = SseParser::new();
    assert!(parser.feed(b"event: ping\n\n").is_empty());
    assert!(parser.feed(b"id: 7\nevent: ping\n\n").is_empty());

    let frames = parser.feed(b"event: change\ndata: real\n\n");
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, "real");
}

#[test]
fn test_lines_one_frame_per_line() {
    let mut parser = LineParser::new();
    let frames = parser.feed(b"{\"a\":1}\n\n{\"b\":2}\n{\"c\"");

    let data: Vec<_> = frames.iter().map(|f| f.data.as_str()).collect();
    assert_eq!(data, vec!["{\"a\":1}", "{\"b\":2}"]);

    let frames = parser.feed(b":3}\r\n");
    assert_eq!(frames, vec![RawFrame::new("{\"c\":3}")]);
}

#[test]
fn test_lines_strip_data_prefix() {
    let mut parser = LineParser::new();
    let frames = parser.feed(b"data: [DONE]\n");

    assert_eq!(frames, vec![RawFrame::new("[DONE]")]);
}

#[test]
fn test_parser_selection_by_content_type() {
    assert!(matches!(
        FrameParser::for_content_type(Some("text/event-stream; charset=utf-8")),
        FrameParser::EventStream(_)
    ));
    assert!(matches!(
        FrameParser::for_content_type(Some("application/x-ndjson")),
        FrameParser::Lines(_)
    ));
    assert!(matches!(
        FrameParser::for_content_type(Some("Application/JSON")),
        FrameParser::Lines(_)
    ));
    assert!(matches!(FrameParser::for_content_type(None), FrameParser::EventStream(_)));
}
