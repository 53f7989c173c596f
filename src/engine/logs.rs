//! Container log decoding.
//!
//! Containers without a TTY get their output multiplexed by the engine:
//! each frame is `[stream, 0, 0, 0, size (u32 BE)]` followed by `size`
//! payload bytes. TTY containers send plain text.

/// Which stream a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdin,
    Stdout,
    Stderr,
}

impl LogStream {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(LogStream::Stdin),
            1 => Some(LogStream::Stdout),
            2 => Some(LogStream::Stderr),
            _ => None,
        }
    }
}

/// One line of container output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub stream: LogStream,
    pub text: String,
}

const HEADER_LEN: usize = 8;

/// Split the next complete frame off the front of `buffer`.
fn extract_frame(buffer: &[u8]) -> Option<(LogStream, &[u8], usize)> {
    if buffer.len() < HEADER_LEN || buffer[1..4] != [0, 0, 0] {
        return None;
    }
    let stream = LogStream::from_byte(buffer[0])?;
    let size = u32::from_be_bytes([buffer[4], buffer[5], buffer[6], buffer[7]]) as usize;
    let frame_end = HEADER_LEN + size;
    if buffer.len() < frame_end {
        return None;
    }
    Some((stream, &buffer[HEADER_LEN..frame_end], frame_end))
}

/// Decode a complete logs body into lines.
///
/// Bodies that do not start with a frame header are treated as raw stdout.
pub fn demux(body: &[u8]) -> Vec<LogLine> {
    if extract_frame(body).is_none() {
        return split_lines(LogStream::Stdout, &String::from_utf8_lossy(body));
    }

    let mut lines = Vec::new();
    let mut stdout: Vec<u8> = Vec::new();
    let mut stderr: Vec<u8> = Vec::new();
    let mut rest = body;

    while let Some((stream, payload, consumed)) = extract_frame(rest) {
        let pending = match stream {
            LogStream::Stderr => &mut stderr,
            _ => &mut stdout,
        };
        pending.extend_from_slice(payload);

        // Frames may split a line, or a character; decode only complete lines.
        while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = pending.drain(..=pos).collect();
            lines.push(LogLine {
                stream,
                text: decode_line(&line),
            });
        }
        rest = &rest[consumed..];
    }

    for (stream, pending) in [(LogStream::Stdout, stdout), (LogStream::Stderr, stderr)] {
        if !pending.is_empty() {
            lines.push(LogLine {
                stream,
                text: decode_line(&pending),
            });
        }
    }

    lines
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

fn split_lines(stream: LogStream, text: &str) -> Vec<LogLine> {
    text.lines()
        .map(|line| LogLine {
            stream,
            text: line.trim_end_matches('\r').to_string(),
        })
        .collect()
}
