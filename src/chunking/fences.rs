//! Locates fenced code blocks so the splitter can treat them as units.

const FENCE_OPEN: &str = "```\n";
const FENCE_CLOSE: &str = "\n```";

/// A contiguous slice of the input: either prose or one whole fenced block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub fenced: bool,
}

/// Cut `text` into prose and fenced segments. Concatenating the segments
/// gives back the input. An unterminated fence is left as prose.
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut pos = 0;

    while let Some(rel_start) = text[pos..].find(FENCE_OPEN) {
        let start = pos + rel_start;
        let body_start = start + FENCE_OPEN.len();
        let Some(rel_close) = text[body_start..].find(FENCE_CLOSE) else {
            break;
        };
        let end = body_start + rel_close + FENCE_CLOSE.len();

        if start > pos {
            out.push(Segment {
                text: &text[pos..start],
                fenced: false,
            });
        }
        out.push(Segment {
            text: &text[start..end],
            fenced: true,
        });
        pos = end;
    }

    if pos < text.len() {
        out.push(Segment {
            text: &text[pos..],
            fenced: false,
        });
    }
    out
}
