//! Text extraction: turn a PDF into page-ordered plain text.
//!
//! Two passes share one output shape:
//!
//! 1. **Font-aware** (`pdf-extract`): every glyph is mapped through its
//!    font's `/ToUnicode` CMap or `/Encoding`, so Identity-H composite fonts
//!    and WinAnsi simple fonts come out as real characters. Each non-blank
//!    output line counts as one run.
//! 2. **Run walk** (`lopdf`): used when the font-aware pass errors, panics or
//!    finds no text. Each text-showing operation (`Tj`, `TJ`, `'` or `"`) is
//!    one run, decoded strictly and passed through byte-for-byte when that
//!    fails, so one odd run never costs the whole document.
//!
//! Layout reconstruction is out of scope: runs are joined with a single space
//! and pages with a newline, which is what the analysis prompt needs.

use crate::error::AnalysisError;
use lopdf::content::Content;
use lopdf::{Document, Object};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Kerning adjustment (thousandths of an em) treated as a word gap inside `TJ`.
const TJ_SPACE_THRESHOLD: i64 = -100;

/// Which pass produced a [`PdfText`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtractionMethod {
    #[default]
    FontAware,
    RunWalk,
}

/// Raw extraction output. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfText {
    /// Page texts joined by `\n`, trimmed.
    pub text: String,
    pub page_count: usize,
    pub run_count: usize,
    /// Runs that failed strict decoding and were passed through raw.
    pub fallback_runs: usize,
    pub method: ExtractionMethod,
}

/// Non-empty, trimmed document text ready for the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    text: String,
    page_count: usize,
    run_count: usize,
    fallback_runs: usize,
}

impl ExtractedText {
    /// Wrap `text`, or `None` if nothing but whitespace is left after trimming.
    pub fn new(text: String, page_count: usize) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let text = if trimmed.len() == text.len() {
            text
        } else {
            trimmed.to_string()
        };
        Some(Self {
            text,
            page_count,
            run_count: 0,
            fallback_runs: 0,
        })
    }

    /// Wrap a [`PdfText`], keeping its statistics.
    pub fn from_pdf_text(pdf: PdfText) -> Option<Self> {
        let (run_count, fallback_runs) = (pdf.run_count, pdf.fallback_runs);
        Self::new(pdf.text, pdf.page_count).map(|mut t| {
            t.run_count = run_count;
            t.fallback_runs = fallback_runs;
            t
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn run_count(&self) -> usize {
        self.run_count
    }

    pub fn fallback_runs(&self) -> usize {
        self.fallback_runs
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Why a run's bytes could not be decoded strictly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunDecodeError {
    OddUtf16Length,
    InvalidUtf16,
    InvalidUtf8,
}

/// Extract the text of every page of an in-memory PDF, in page order.
///
/// # Errors
/// [`AnalysisError::CorruptPdf`] when lopdf cannot parse the payload. An
/// empty result is *not* an error here; the caller decides what no text means.
pub fn extract_text(data: &[u8]) -> Result<PdfText, AnalysisError> {
    let doc = Document::load_mem(data).map_err(|e| AnalysisError::CorruptPdf {
        detail: e.to_string(),
    })?;

    if let Some(pages) = font_aware_pages(data) {
        let text = from_page_texts(pages);
        if !text.text.is_empty() {
            return Ok(text);
        }
    }
    debug!("Font-aware pass found no text; walking content streams");
    Ok(extract_runs(&doc))
}

/// Run `pdf-extract` over the payload. `None` when it errors or panics.
fn font_aware_pages(data: &[u8]) -> Option<Vec<String>> {
    match catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(data)
    })) {
        Ok(Ok(pages)) => Some(pages),
        Ok(Err(e)) => {
            warn!("Font-aware extraction failed: {}", e);
            None
        }
        Err(_) => {
            warn!("Font-aware extraction panicked");
            None
        }
    }
}

/// Fold `pdf-extract` page output into a [`PdfText`], one run per line.
fn from_page_texts(pages: Vec<String>) -> PdfText {
    let page_count = pages.len();
    let mut run_count = 0;
    let page_texts: Vec<String> = pages
        .iter()
        .map(|page| {
            let runs: Vec<&str> = page
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect();
            run_count += runs.len();
            runs.join(" ")
        })
        .collect();

    debug!(
        "Extracted {} lines from {} pages (font-aware)",
        run_count, page_count
    );

    PdfText {
        text: page_texts.join("\n").trim().to_string(),
        page_count,
        run_count,
        fallback_runs: 0,
        method: ExtractionMethod::FontAware,
    }
}

/// Walk every page's content stream of an already-parsed document.
pub fn extract_runs(doc: &Document) -> PdfText {
    let pages = doc.get_pages();
    let mut page_texts = Vec::with_capacity(pages.len());
    let mut run_count = 0;
    let mut fallback_runs = 0;

    // BTreeMap iteration is ascending page number.
    for (&page_num, &page_id) in pages.iter() {
        let mut page_text = String::new();

        let content = match doc.get_page_content(page_id) {
            Ok(c) => c,
            Err(e) => {
                warn!("Page {}: content stream unreadable: {}", page_num, e);
                page_texts.push(page_text);
                continue;
            }
        };
        let operations = match Content::decode(&content) {
            Ok(c) => c.operations,
            Err(e) => {
                warn!("Page {}: content stream undecodable: {}", page_num, e);
                page_texts.push(page_text);
                continue;
            }
        };

        for op in &operations {
            let Some(run) = run_operand(&op.operator, &op.operands) else {
                continue;
            };
            run_count += 1;
            let (text, fell_back) = decode_run(run);
            if fell_back {
                fallback_runs += 1;
                debug!("Page {}: run {} passed through undecoded", page_num, run_count);
            }
            page_text.push_str(&text);
            page_text.push(' ');
        }

        page_texts.push(page_text);
    }

    debug!(
        "Extracted {} runs from {} pages ({} fallbacks)",
        run_count,
        page_texts.len(),
        fallback_runs
    );

    PdfText {
        text: page_texts.join("\n").trim().to_string(),
        page_count: pages.len(),
        run_count,
        fallback_runs,
        method: ExtractionMethod::RunWalk,
    }
}

/// The operand carrying the text of a text-showing operator, if any.
fn run_operand<'a>(operator: &str, operands: &'a [Object]) -> Option<&'a Object> {
    match operator {
        "Tj" | "'" | "TJ" => operands.first(),
        // `aw ac string "`
        "\"" => operands.last(),
        _ => None,
    }
}

/// Decode one run. Returns the text and whether any part fell back to raw bytes.
fn decode_run(operand: &Object) -> (String, bool) {
    match operand {
        Object::String(bytes, _) => decode_or_raw(bytes),
        Object::Array(items) => {
            let mut text = String::new();
            let mut fell_back = false;
            for item in items {
                match item {
                    Object::String(bytes, _) => {
                        let (s, fb) = decode_or_raw(bytes);
                        text.push_str(&s);
                        fell_back |= fb;
                    }
                    Object::Integer(n) if *n < TJ_SPACE_THRESHOLD => text.push(' '),
                    Object::Real(n) if (*n as f64) < TJ_SPACE_THRESHOLD as f64 => text.push(' '),
                    _ => {}
                }
            }
            (text, fell_back)
        }
        _ => (String::new(), false),
    }
}

fn decode_or_raw(bytes: &[u8]) -> (String, bool) {
    match decode_bytes(bytes) {
        Ok(s) => (s, false),
        Err(_) => (raw_text(bytes), true),
    }
}

/// Strict decoding: UTF-16BE behind a BOM, otherwise UTF-8.
fn decode_bytes(bytes: &[u8]) -> Result<String, RunDecodeError> {
    if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        if body.len() % 2 != 0 {
            return Err(RunDecodeError::OddUtf16Length);
        }
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16(&units).map_err(|_| RunDecodeError::InvalidUtf16);
    }
    let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    std::str::from_utf8(body)
        .map(str::to_string)
        .map_err(|_| RunDecodeError::InvalidUtf8)
}

/// One character per byte, i.e. the run text as it sits in the stream.
fn raw_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Dictionary, ObjectId, Stream, StringFormat};

    fn literal(s: &[u8]) -> Object {
        Object::String(s.to_vec(), StringFormat::Literal)
    }

    fn hex(s: &[u8]) -> Object {
        Object::String(s.to_vec(), StringFormat::Hexadecimal)
    }

    /// Build a PDF; `font` adds the font objects and returns the id bound to `/F1`.
    fn build_pdf(
        font: impl FnOnce(&mut Document) -> Option<ObjectId>,
        pages: Vec<Vec<Operation>>,
    ) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = font(&mut doc);
        let mut kids = Vec::new();
        for ops in pages {
            let content = Content { operations: ops };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            };
            if let Some(font_id) = font_id {
                page.set(
                    "Resources",
                    dictionary! { "Font" => dictionary! { "F1" => font_id } },
                );
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => Object::Array(kids),
                "Count" => count,
                "MediaBox" => Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn helvetica(doc: &mut Document) -> Option<ObjectId> {
        Some(doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        }))
    }

    /// Identity-H composite font whose ToUnicode maps glyph 0x35 to `R` and 0x48 to `e`.
    fn identity_h(doc: &mut Document) -> Option<ObjectId> {
        let cmap = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0035> <0052>
<0048> <0065>
endbfchar
endcmap
CMapName currentdict /CMap defineresource pop
end
end
";
        let to_unicode = doc.add_object(Stream::new(Dictionary::new(), cmap.to_vec()));
        let descriptor = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => "AAAAAA+Calibri",
            "Flags" => 32,
            "FontBBox" => Object::Array(vec![0.into(), (-250).into(), 1000.into(), 750.into()]),
            "ItalicAngle" => 0,
            "Ascent" => 750,
            "Descent" => -250,
            "CapHeight" => 650,
            "StemV" => 80,
        });
        let descendant = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => "AAAAAA+Calibri",
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => descriptor,
            "DW" => 1000,
            "W" => Object::Array(vec![
                0x35.into(),
                Object::Array(vec![500.into()]),
                0x48.into(),
                Object::Array(vec![500.into()]),
            ]),
        });
        Some(doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "AAAAAA+Calibri",
            "Encoding" => "Identity-H",
            "DescendantFonts" => Object::Array(vec![descendant.into()]),
            "ToUnicode" => to_unicode,
        }))
    }

    fn no_font(_: &mut Document) -> Option<ObjectId> {
        None
    }

    /// `BT /F1 12 Tf`, each run on its own line, `ET`.
    fn lines(runs: Vec<Object>) -> Vec<Operation> {
        let mut ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for (i, run) in runs.into_iter().enumerate() {
            if i > 0 {
                ops.push(Operation::new("Td", vec![0.into(), (-14).into()]));
            }
            ops.push(Operation::new("Tj", vec![run]));
        }
        ops.push(Operation::new("ET", vec![]));
        ops
    }

    fn walk(pdf: &[u8]) -> PdfText {
        extract_runs(&Document::load_mem(pdf).unwrap())
    }

    // ── Font-aware pass ──────────────────────────────────────────────────────

    #[test]
    fn winansi_bytes_map_through_the_font_encoding() {
        let pdf = build_pdf(helvetica, vec![lines(vec![literal(b"CEO\x92s outlook")])]);
        let out = extract_text(&pdf).unwrap();
        assert_eq!(out.method, ExtractionMethod::FontAware);
        assert!(out.text.contains("CEO\u{2019}s outlook"), "got {:?}", out.text);
        assert_eq!(out.fallback_runs, 0);
    }

    #[test]
    fn identity_h_glyphs_map_through_to_unicode() {
        let pdf = build_pdf(identity_h, vec![lines(vec![hex(&[0x00, 0x35, 0x00, 0x48])])]);
        let out = extract_text(&pdf).unwrap();
        assert_eq!(out.method, ExtractionMethod::FontAware);
        assert!(!out.text.contains('\0'), "got {:?}", out.text);
        assert_eq!(out.text.split_whitespace().collect::<String>(), "Re");
    }

    #[test]
    fn preserves_page_and_line_order() {
        let pdf = build_pdf(
            helvetica,
            vec![
                lines(vec![literal(b"First"), literal(b"second")]),
                lines(vec![literal(b"Third")]),
            ],
        );
        let out = extract_text(&pdf).unwrap();
        assert_eq!(out.page_count, 2);
        let first = out.text.find("First").unwrap();
        let second = out.text.find("second").unwrap();
        let third = out.text.find("Third").unwrap();
        assert!(first < second && second < third);
        assert!(out.text[second..third].contains('\n'));
    }

    #[test]
    fn page_texts_fold_into_runs() {
        let out = from_page_texts(vec![
            "\n  Good morning\n\neveryone.\n".into(),
            "   ".into(),
            "Revenue rose.".into(),
        ]);
        assert_eq!(out.text, "Good morning everyone.\n\nRevenue rose.");
        assert_eq!(out.page_count, 3);
        assert_eq!(out.run_count, 3);
        assert_eq!(out.method, ExtractionMethod::FontAware);
    }

    // ── Run walk ─────────────────────────────────────────────────────────────

    #[test]
    fn fontless_runs_still_yield_text() {
        let pdf = build_pdf(no_font, vec![vec![
            Operation::new("BT", vec![]),
            Operation::new("Tj", vec![literal(b"Bare run")]),
            Operation::new("ET", vec![]),
        ]]);
        let out = extract_text(&pdf).unwrap();
        assert!(out.text.contains("Bare run"));
    }

    #[test]
    fn decodes_utf8_and_utf16() {
        assert_eq!(decode_bytes(b"Margin 42%").unwrap(), "Margin 42%");
        assert_eq!(decode_bytes(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE9]).unwrap(), "A\u{e9}");
        assert_eq!(decode_bytes(&[0xEF, 0xBB, 0xBF, b'o', b'k']).unwrap(), "ok");
    }

    #[test]
    fn strict_decoding_reports_failures() {
        assert_eq!(decode_bytes(&[0xFE, 0xFF, 0x00]), Err(RunDecodeError::OddUtf16Length));
        assert_eq!(
            decode_bytes(&[0xFE, 0xFF, 0xD8, 0x00]),
            Err(RunDecodeError::InvalidUtf16)
        );
        assert_eq!(decode_bytes(&[b'a', 0x92, b'b']), Err(RunDecodeError::InvalidUtf8));
    }

    #[test]
    fn undecodable_run_falls_back_to_raw_bytes() {
        let (text, fell_back) = decode_run(&literal(&[b'Q', 0x92, b's']));
        assert!(fell_back);
        assert_eq!(text, "Q\u{92}s");
    }

    #[test]
    fn tj_array_joins_strings_and_kerning_gaps() {
        let arr = Object::Array(vec![
            literal(b"Gross"),
            Object::Integer(-250),
            literal(b"margin"),
            Object::Integer(-20),
            literal(b"s"),
        ]);
        assert_eq!(decode_run(&arr), ("Gross margins".to_string(), false));
    }

    #[test]
    fn quote_operators_use_string_operand() {
        let ops = [literal(b"x")];
        assert!(run_operand("'", &ops).is_some());
        let dq = [Object::Integer(1), Object::Integer(2), literal(b"y")];
        assert!(matches!(run_operand("\"", &dq), Some(Object::String(s, _)) if s == b"y"));
        assert!(run_operand("Td", &dq).is_none());
    }

    #[test]
    fn run_walk_preserves_page_and_run_order() {
        let page1 = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tj", vec![literal(b"First")]),
            Operation::new("Tj", vec![literal(b"second")]),
            Operation::new("ET", vec![]),
        ];
        let page2 = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tj", vec![literal(b"Third")]),
            Operation::new("ET", vec![]),
        ];
        let out = walk(&build_pdf(no_font, vec![page1, page2]));
        assert_eq!(out.text, "First second \nThird");
        assert_eq!(out.page_count, 2);
        assert_eq!(out.run_count, 3);
        assert_eq!(out.fallback_runs, 0);
        assert_eq!(out.method, ExtractionMethod::RunWalk);
    }

    #[test]
    fn one_bad_run_does_not_abort_document() {
        let page = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tj", vec![literal(&[b'C', b'E', b'O', 0x92, b's'])]),
            Operation::new("Tj", vec![literal(b"outlook")]),
            Operation::new("ET", vec![]),
        ];
        let out = walk(&build_pdf(no_font, vec![page]));
        assert_eq!(out.fallback_runs, 1);
        assert!(out.text.ends_with("outlook"));
        assert!(out.text.starts_with("CEO"));
    }

    // ── Whole document ───────────────────────────────────────────────────────

    #[test]
    fn image_only_pages_yield_empty_text() {
        let page = vec![
            Operation::new(
                "re",
                vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(100),
                    Object::Integer(100),
                ],
            ),
            Operation::new("f", vec![]),
        ];
        let out = extract_text(&build_pdf(helvetica, vec![page.clone(), page])).unwrap();
        assert_eq!(out.text, "");
        assert_eq!(out.page_count, 2);
        assert!(ExtractedText::from_pdf_text(out).is_none());
    }

    #[test]
    fn garbage_is_corrupt_pdf() {
        let err = extract_text(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, AnalysisError::CorruptPdf { .. }));
    }

    #[test]
    fn extracted_text_trims_and_rejects_blank() {
        assert!(ExtractedText::new("  \n\t ".into(), 1).is_none());
        let t = ExtractedText::new("  body \n".into(), 3).unwrap();
        assert_eq!(t.as_str(), "body");
        assert_eq!(t.page_count(), 3);
        assert_eq!(t.char_count(), 4);
    }
}
