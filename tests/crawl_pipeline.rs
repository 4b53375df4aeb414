//! End-to-end crawl runs against in-memory renderer and fetcher fakes.

mod common;

use common::{docx_bytes, page_with_links, FakeFetcher, FakeRenderer, Workspace};
use docharvest::pipeline::links::canonical_url;
use docharvest::{run_crawl_with, HarvestError, HarvestProgressCallback, ProgressCallback, RunReport};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const DOCX_LINK: &str = "https://example.org/files/file.docx?filename=Spec%20v2.docx";

fn rows(ws: &Workspace) -> BTreeSet<(String, String)> {
    ws.ledger_rows().into_iter().collect()
}

#[tokio::test]
async fn page_is_saved_under_its_sequence_number() {
    let ws = Workspace::new();
    ws.write_references(&[
        ("https://a.example/1", "One"),
        ("https://a.example/2", "Two"),
        ("https://a.example/3", "Three"),
        ("https://a.example/4", "Four"),
        ("https://example.org/doc", "Annual Report (2023)"),
    ]);
    let renderer = FakeRenderer::new().page("https://example.org/doc", &page_with_links("Annual", &[]));
    let fetcher = FakeFetcher::new();
    let config = ws.config().only_url("https://example.org/doc").build().unwrap();

    let report = run_crawl_with(&config, &renderer, &fetcher).await.unwrap();

    assert_eq!(report.total_references, 5);
    assert_eq!(report.skipped, 4);
    assert_eq!(report.saved, 1);
    assert_eq!(*renderer.rendered.lock().unwrap(), vec!["https://example.org/doc"]);

    let key = ws.output_key("005_Annual_Report.html");
    assert_eq!(ws.ledger_rows(), vec![(key, "https://example.org/doc".to_string())]);

    let html = std::fs::read_to_string(ws.output_dir().join("005_Annual_Report.html")).unwrap();
    assert!(html.starts_with("<div>"), "main content expected, got {html}");
    assert!(html.contains("<h1>Annual</h1>"));
    assert!(!html.contains("<script"));
    assert!(!html.contains("menu"));
}

#[tokio::test]
async fn empty_ledger_and_one_page_gives_one_row() {
    let ws = Workspace::new();
    ws.write_references(&[("https://example.org/only", "Only page")]);
    let renderer = FakeRenderer::new().page("https://example.org/only", "<html><body><p>x</p></body></html>");
    let fetcher = FakeFetcher::new();
    let config = ws.config().build().unwrap();

    let report = run_crawl_with(&config, &renderer, &fetcher).await.unwrap();

    assert_eq!(report.ledger_entries, 1);
    assert_eq!(ws.ledger_rows().len(), 1);
    assert!(renderer.was_shut_down());
    // no main container: the whole cleaned document is kept
    let html = std::fs::read_to_string(ws.output_dir().join("001_Only_page.html")).unwrap();
    assert!(html.contains("<body><p>x</p></body>"), "got {html}");
}

#[tokio::test]
async fn linked_docx_is_converted_and_only_html_recorded() {
    let ws = Workspace::new();
    ws.write_references(&[("https://example.org/spec", "Spec page")]);
    let renderer = FakeRenderer::new().page(
        "https://example.org/spec",
        &page_with_links("Spec", &["/files/file.docx?filename=Spec%20v2.docx"]),
    );
    let fetcher = FakeFetcher::new().file(DOCX_LINK, docx_bytes("Hello"));
    let config = ws.config().build().unwrap();

    let report = run_crawl_with(&config, &renderer, &fetcher).await.unwrap();

    assert_eq!(report.subdocuments_fetched, 1);
    assert_eq!(report.subdocuments_failed, 0);
    assert_eq!(fetcher.fetched(), vec![DOCX_LINK]);

    let converted = ws.output_dir().join("001_Spec_v2.html");
    assert_eq!(std::fs::read_to_string(&converted).unwrap(), "<p>Hello</p>");
    assert!(!ws.output_dir().join("001_Spec_v2.docx").exists());

    let expected: BTreeSet<_> = [
        (ws.output_key("001_Spec_page.html"), "https://example.org/spec".to_string()),
        (ws.output_key("001_Spec_v2.html"), canonical_url(DOCX_LINK)),
    ]
    .into_iter()
    .collect();
    assert_eq!(rows(&ws), expected);

    // the cleaned page keeps the absolute link
    let page = std::fs::read_to_string(ws.output_dir().join("001_Spec_page.html")).unwrap();
    assert!(page.contains(&format!("href=\"{}\"", DOCX_LINK.replace('&', "&amp;"))));
}

#[tokio::test]
async fn rerun_does_not_refetch_ledger_known_documents() {
    let ws = Workspace::new();
    ws.write_references(&[("https://example.org/spec", "Spec page")]);
    let page = page_with_links("Spec", &["/files/file.docx?filename=Spec%20v2.docx"]);
    let config = ws.config().build().unwrap();

    let first = FakeFetcher::new().file(DOCX_LINK, docx_bytes("Hello"));
    run_crawl_with(&config, &FakeRenderer::new().page("https://example.org/spec", &page), &first)
        .await
        .unwrap();
    let after_first = rows(&ws);

    let second = FakeFetcher::new().file(DOCX_LINK, docx_bytes("Changed"));
    let report = run_crawl_with(&config, &FakeRenderer::new().page("https://example.org/spec", &page), &second)
        .await
        .unwrap();

    assert!(second.fetched().is_empty());
    assert_eq!(report.subdocuments_fetched, 0);
    assert_eq!(rows(&ws), after_first);
    let converted = ws.output_dir().join("001_Spec_v2.html");
    assert_eq!(std::fs::read_to_string(converted).unwrap(), "<p>Hello</p>");
}

#[tokio::test]
async fn failed_fetch_creates_no_entry_and_continues() {
    let ws = Workspace::new();
    ws.write_references(&[("https://example.org/list", "List")]);
    let renderer = FakeRenderer::new().page(
        "https://example.org/list",
        &page_with_links("List", &["/files/missing.pdf", "/files/missing.pdf", "/files/present.pdf"]),
    );
    let fetcher = FakeFetcher::new().file("https://example.org/files/present.pdf", b"%PDF-1.7".to_vec());
    let config = ws.config().build().unwrap();

    let report = run_crawl_with(&config, &renderer, &fetcher).await.unwrap();

    // the duplicate failing link is attempted once per run
    assert_eq!(
        fetcher.fetched(),
        vec![
            "https://example.org/files/missing.pdf",
            "https://example.org/files/present.pdf"
        ]
    );
    assert_eq!(report.saved, 1);
    assert_eq!(report.subdocuments_fetched, 1);
    assert_eq!(report.subdocuments_failed, 1);

    let recorded: Vec<String> = ws.ledger_rows().into_iter().map(|(_, url)| url).collect();
    assert!(recorded.contains(&"https://example.org/files/present.pdf".to_string()));
    assert!(!recorded.iter().any(|u| u.contains("missing")));
    assert_eq!(recorded.len(), 2);
}

#[tokio::test]
async fn render_failure_skips_reference_only() {
    let ws = Workspace::new();
    ws.write_references(&[
        ("https://example.org/broken", "Broken"),
        ("https://example.org/fine", "Fine"),
    ]);
    let renderer = FakeRenderer::new().page("https://example.org/fine", &page_with_links("Fine", &[]));
    let fetcher = FakeFetcher::new();
    let config = ws.config().build().unwrap();

    let report = run_crawl_with(&config, &renderer, &fetcher).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.saved, 1);
    assert!(report.outcomes[0].error.is_some());
    assert!(renderer.was_shut_down());
    assert_eq!(
        ws.ledger_rows(),
        vec![(ws.output_key("002_Fine.html"), "https://example.org/fine".to_string())]
    );
}

#[tokio::test]
async fn direct_downloads_are_fetched_and_normalized() {
    let ws = Workspace::new();
    ws.write_references(&[
        ("https://example.org/files/report.pdf", "Report"),
        ("https://example.org/files/Spec.docx", "Spec doc"),
        ("https://example.org/files/gone.pdf", "Gone"),
    ]);
    let renderer = FakeRenderer::new();
    let fetcher = FakeFetcher::new()
        .file("https://example.org/files/report.pdf", b"%PDF-1.7".to_vec())
        .file("https://example.org/files/Spec.docx", docx_bytes("Direct"));
    let config = ws.config().build().unwrap();

    let report = run_crawl_with(&config, &renderer, &fetcher).await.unwrap();

    assert!(renderer.rendered.lock().unwrap().is_empty());
    assert_eq!(report.saved, 2);
    assert_eq!(report.failed, 1);

    let expected: BTreeSet<_> = [
        (ws.output_key("001_Report.pdf"), "https://example.org/files/report.pdf".to_string()),
        (ws.output_key("002_Spec_doc.html"), "https://example.org/files/Spec.docx".to_string()),
    ]
    .into_iter()
    .collect();
    assert_eq!(rows(&ws), expected);
}

#[tokio::test]
async fn broken_office_file_is_kept_and_recorded() {
    let ws = Workspace::new();
    ws.write_references(&[("https://example.org/files/sheet.xlsx", "Codes")]);
    let fetcher = FakeFetcher::new().file("https://example.org/files/sheet.xlsx", b"not a workbook".to_vec());
    let config = ws.config().build().unwrap();

    let report = run_crawl_with(&config, &FakeRenderer::new(), &fetcher).await.unwrap();

    assert_eq!(report.saved, 1);
    assert_eq!(report.conversions_failed, 1);
    assert!(ws.output_dir().join("001_Codes.xlsx").exists());
    assert_eq!(
        ws.ledger_rows(),
        vec![(ws.output_key("001_Codes.xlsx"), "https://example.org/files/sheet.xlsx".to_string())]
    );
}

#[tokio::test]
async fn existing_ledger_rows_survive() {
    let ws = Workspace::new();
    std::fs::write(
        ws.ledger(),
        "Filename,URL\nnedlastede_filer/000_Old.pdf,https://old.example/a.pdf\n",
    )
    .unwrap();
    ws.write_references(&[("https://example.org/doc", "Doc")]);
    let renderer = FakeRenderer::new().page(
        "https://example.org/doc",
        &page_with_links("Doc", &["https://old.example/a.pdf"]),
    );
    let fetcher = FakeFetcher::new();
    let config = ws.config().build().unwrap();

    run_crawl_with(&config, &renderer, &fetcher).await.unwrap();

    assert!(fetcher.fetched().is_empty());
    let ledger = rows(&ws);
    assert_eq!(ledger.len(), 2);
    assert!(ledger.contains(&(
        "nedlastede_filer/000_Old.pdf".to_string(),
        "https://old.example/a.pdf".to_string()
    )));
}

#[tokio::test]
async fn progress_callback_sees_every_attempted_reference() {
    #[derive(Default)]
    struct Counter {
        total: AtomicUsize,
        complete: AtomicUsize,
        errors: AtomicUsize,
        finished: AtomicUsize,
    }
    impl HarvestProgressCallback for Counter {
        fn on_run_start(&self, total_references: usize) {
            self.total.store(total_references, Ordering::SeqCst);
        }
        fn on_reference_complete(&self, _sequence: usize, _saved: &str) {
            self.complete.fetch_add(1, Ordering::SeqCst);
        }
        fn on_reference_error(&self, _sequence: usize, _url: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_run_complete(&self, _report: &RunReport) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    let ws = Workspace::new();
    ws.write_references(&[
        ("https://example.org/a", "A"),
        ("https://example.org/b", "B"),
    ]);
    let counter = Arc::new(Counter::default());
    let config = ws
        .config()
        .progress_callback(counter.clone() as ProgressCallback)
        .build()
        .unwrap();
    let renderer = FakeRenderer::new().page("https://example.org/a", "<p>a</p>");

    run_crawl_with(&config, &renderer, &FakeFetcher::new()).await.unwrap();

    assert_eq!(counter.total.load(Ordering::SeqCst), 2);
    assert_eq!(counter.complete.load(Ordering::SeqCst), 1);
    assert_eq!(counter.errors.load(Ordering::SeqCst), 1);
    assert_eq!(counter.finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_reference_list_is_fatal() {
    let ws = Workspace::new();
    let config = ws.config().build().unwrap();
    let err = run_crawl_with(&config, &FakeRenderer::new(), &FakeFetcher::new())
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::ReferencesNotFound { .. }));
    assert!(!ws.ledger().exists());
}

#[tokio::test]
async fn unreadable_ledger_is_fatal_and_shuts_down_renderer() {
    let ws = Workspace::new();
    ws.write_references(&[("https://example.org/only", "Only page")]);
    std::fs::write(ws.ledger(), "Filename,URL\nnedlastede_filer/001_A.html\n").unwrap();
    let renderer = FakeRenderer::new().page("https://example.org/only", "<p>x</p>");
    let fetcher = FakeFetcher::new();
    let config = ws.config().build().unwrap();

    let err = run_crawl_with(&config, &renderer, &fetcher).await.unwrap_err();

    assert!(matches!(err, HarvestError::LedgerUnreadable { .. }), "got {err:?}");
    assert!(renderer.was_shut_down());
    assert!(renderer.rendered.lock().unwrap().is_empty());
}
