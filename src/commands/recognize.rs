use std::io::{self, Write};

use anyhow::Result;
use tracing::info;

use crate::cli::RecognizeArgs;
use crate::grading::build_index;
use crate::model::NormalizedLine;
use crate::recognizer::recognizer_for;

/// Prints the normalized line index exactly as the match engine will see it.
pub fn run(args: RecognizeArgs) -> Result<()> {
    let recognizer = recognizer_for(
        args.recognizer.recognizer,
        &args.document,
        &args.recognizer.ocr_settings(),
    );
    let document = recognizer.recognize(&args.document)?;
    let lines = build_index(&document);

    info!(
        path = %args.document.display(),
        recognizer = recognizer.name(),
        pages = document.pages.len().max(1),
        lines = lines.len(),
        "recognized document"
    );

    let mut output = io::BufWriter::new(io::stdout().lock());
    render_lines(&mut output, &lines)?;
    output.flush()?;
    Ok(())
}

fn render_lines<W: Write>(output: &mut W, lines: &[NormalizedLine]) -> Result<()> {
    for line in lines {
        writeln!(output, "{:>3}:{:<4} {}", line.page, line.index, line.text)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecognizedDocument;

    #[test]
    fn render_lines_prefixes_page_and_index() {
        let lines = build_index(&RecognizedDocument::from_text("Apple 사과\n\nDog 개"));

        let mut buffer = Vec::new();
        render_lines(&mut buffer, &lines).expect("render");
        let text = String::from_utf8(buffer).expect("utf-8 output");

        assert_eq!(text, "  1:0    apple 사과\n  1:2    dog 개\n");
    }
}
