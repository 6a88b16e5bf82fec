//! Shared helpers for integration tests: synthetic PDFs and a fake model.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_earnings::{AnalysisError, AnalysisPrompt, ModelInvoker, RawModelResponse};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const ACME_JSON: &str = r#"```json
{"companyName":"Acme Corp","reportPeriod":"Q3 FY2024","managementTone":{"overall":"cautious","confidenceLevel":"medium","reasoning":"x"},"keyPositives":[],"keyConcerns":[],"forwardGuidance":{"revenue":null,"margin":null,"capex":null,"otherGuidance":null},"capacityUtilization":null,"growthInitiatives":[],"notableQuotes":[]}
```"#;

/// Build a PDF whose pages each show the given text runs, one per line, in order.
pub fn pdf_with_runs(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let mut kids = Vec::new();

    for runs in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 11.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for (i, run) in runs.iter().enumerate() {
            if i > 0 {
                operations.push(Operation::new("Td", vec![0.into(), (-14).into()]));
            }
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(run.as_bytes().to_vec(), StringFormat::Literal)],
            ));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });
        kids.push(Object::Reference(page_id));
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
    doc.save_to(&mut buf).expect("save pdf");
    buf
}

/// A PDF with `pages` pages and no text runs at all.
pub fn pdf_without_text(pages: usize) -> Vec<u8> {
    let no_runs: &[&str] = &[];
    pdf_with_runs(&vec![no_runs; pages])
}

type Responder = Box<dyn Fn() -> Result<RawModelResponse, AnalysisError> + Send + Sync>;

/// Model stand-in that counts calls and remembers the last prompt.
pub struct FakeInvoker {
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
    respond: Responder,
}

impl FakeInvoker {
    /// Always answer with `text`.
    pub fn answering(text: &'static str) -> Self {
        Self::with(move || Ok(RawModelResponse::new(text)))
    }

    /// Always fail with the error built by `make`.
    pub fn failing(make: fn() -> AnalysisError) -> Self {
        Self::with(move || Err(make()))
    }

    pub fn with(
        respond: impl Fn() -> Result<RawModelResponse, AnalysisError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
            respond: Box::new(respond),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().expect("prompt lock").clone()
    }
}

#[async_trait]
impl ModelInvoker for FakeInvoker {
    fn model(&self) -> &str {
        "fake-model"
    }

    async fn invoke(&self, prompt: &AnalysisPrompt) -> Result<RawModelResponse, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().expect("prompt lock") = Some(prompt.as_str().to_string());
        (self.respond)()
    }
}
