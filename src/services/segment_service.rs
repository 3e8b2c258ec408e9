use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::search::Block;

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s").expect("heading pattern"));
static LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+•]\s|\d+\.\s|[A-Za-z]\.\s)").expect("list pattern"));

pub fn is_heading(line: &str) -> bool {
    HEADING_RE.is_match(line)
}

pub fn is_list_item(line: &str) -> bool {
    LIST_ITEM_RE.is_match(line)
}

/// Splits a document into typed blocks: each heading and each list line is
/// its own block, blank lines end the running paragraph, everything else
/// accumulates into it. Line numbers are 1-based and inclusive.
pub fn segment(document: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_start = 0usize;

    let flush = |buffer: &mut String, buffer_start: usize, end_line: usize, blocks: &mut Vec<Block>| {
        if !buffer.is_empty() {
            blocks.push(Block {
                content: std::mem::take(buffer),
                start_line: buffer_start,
                end_line,
                is_title: false,
            });
        }
    };

    let mut last_buffered_line = 0usize;
    for (idx, line) in document.lines().enumerate() {
        let line_no = idx + 1;
        if is_heading(line) {
            flush(&mut buffer, buffer_start, last_buffered_line, &mut blocks);
            blocks.push(Block {
                content: line.to_string(),
                start_line: line_no,
                end_line: line_no,
                is_title: true,
            });
        } else if is_list_item(line) {
            flush(&mut buffer, buffer_start, last_buffered_line, &mut blocks);
            blocks.push(Block {
                content: line.to_string(),
                start_line: line_no,
                end_line: line_no,
                is_title: false,
            });
        } else if line.trim().is_empty() {
            flush(&mut buffer, buffer_start, last_buffered_line, &mut blocks);
        } else {
            if buffer.is_empty() {
                buffer_start = line_no;
            } else {
                buffer.push('\n');
            }
            buffer.push_str(line);
            last_buffered_line = line_no;
        }
    }
    flush(&mut buffer, buffer_start, last_buffered_line, &mut blocks);

    blocks
}
