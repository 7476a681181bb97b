use pdf_redact::{Rect, RedactionRequest, VerificationResult, redact_page};
use serde::Serialize;
use std::env;
use std::fs;
use std::path::Path;
use std::process;

/// Stderr logger for the `log` facade; enabled with --verbose.
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Debug
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

#[derive(Serialize)]
struct Report {
    input: String,
    rects: Vec<[f64; 4]>,
    terms: Vec<String>,
    verification: String,
    actions: Vec<ReportAction>,
    replaced_images: Vec<String>,
}

#[derive(Serialize)]
struct ReportAction {
    kind: String,
    bbox: [f64; 4],
    detail: String,
}

fn usage(program: &str) -> ! {
    eprintln!("Content-stream redactor");
    eprintln!(
        "Usage: {} <content-stream-file> --rect l,b,r,t [options]",
        program
    );
    eprintln!("\nOptions:");
    eprintln!("  --rect l,b,r,t     Redaction rectangle in page points (repeatable)");
    eprintln!("  --term TEXT        Verify TEXT is no longer extractable (repeatable)");
    eprintln!("  --page-height H    Page height in points (default 792)");
    eprintln!("  --out FILE         Write the redacted stream to FILE (default stdout)");
    eprintln!("  --report FILE      Write a JSON report to FILE");
    eprintln!("  --verbose          Log warnings and debug output to stderr");
    eprintln!("\nExit codes: 0 success, 1 usage error, 2 verification failure");
    process::exit(1);
}

fn parse_rect(spec: &str) -> Option<Rect> {
    let parts: Vec<f64> = spec
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    if parts.len() != 4 {
        return None;
    }
    Some(Rect::new(parts[0], parts[1], parts[2], parts[3]))
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
    }

    let input_path = &args[1];
    if !Path::new(input_path).exists() {
        eprintln!("Error: file not found: {}", input_path);
        process::exit(1);
    }

    let mut rects = Vec::new();
    let mut terms = Vec::new();
    let mut page_height = 792.0;
    let mut out_path: Option<String> = None;
    let mut report_path: Option<String> = None;
    let mut verbose = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--rect" => {
                i += 1;
                let spec = args.get(i).unwrap_or_else(|| {
                    eprintln!("Error: --rect requires l,b,r,t");
                    process::exit(1);
                });
                match parse_rect(spec) {
                    Some(rect) => rects.push(rect),
                    None => {
                        eprintln!("Error: invalid rectangle '{}'", spec);
                        process::exit(1);
                    }
                }
            }
            "--term" => {
                i += 1;
                match args.get(i) {
                    Some(term) => terms.push(term.clone()),
                    None => {
                        eprintln!("Error: --term requires a value");
                        process::exit(1);
                    }
                }
            }
            "--page-height" => {
                i += 1;
                page_height = match args.get(i).and_then(|v| v.parse::<f64>().ok()) {
                    Some(h) => h,
                    None => {
                        eprintln!("Error: --page-height requires a number");
                        process::exit(1);
                    }
                };
            }
            "--out" => {
                i += 1;
                out_path = args.get(i).cloned();
                if out_path.is_none() {
                    eprintln!("Error: --out requires a path");
                    process::exit(1);
                }
            }
            "--report" => {
                i += 1;
                report_path = args.get(i).cloned();
                if report_path.is_none() {
                    eprintln!("Error: --report requires a path");
                    process::exit(1);
                }
            }
            "--verbose" => verbose = true,
            other => {
                eprintln!("Error: unknown option '{}'", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    if rects.is_empty() {
        eprintln!("Error: at least one --rect is required");
        process::exit(1);
    }

    if verbose && log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Debug);
    }

    let content = match fs::read(input_path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading {}: {}", input_path, e);
            process::exit(1);
        }
    };

    let request = RedactionRequest {
        content,
        page_height,
        rects: rects.clone(),
        terms: terms.clone(),
        ..Default::default()
    };

    let outcome = match redact_page(&request) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error redacting stream: {}", e);
            process::exit(1);
        }
    };

    match &out_path {
        Some(path) => {
            if let Err(e) = fs::write(path, &outcome.content) {
                eprintln!("Error writing {}: {}", path, e);
                process::exit(1);
            }
        }
        None => {
            use std::io::Write;
            if std::io::stdout().write_all(&outcome.content).is_err() {
                process::exit(1);
            }
        }
    }

    let verification_label = match &outcome.verification {
        VerificationResult::Verified => "verified".to_string(),
        VerificationResult::NoRedactionsRequested => "no-redactions-requested".to_string(),
        VerificationResult::TermStillExtractable { term, bbox } => format!(
            "term-still-extractable: '{}' at ({:.2}, {:.2})-({:.2}, {:.2})",
            term, bbox.left, bbox.bottom, bbox.right, bbox.top
        ),
    };

    if let Some(path) = &report_path {
        let report = Report {
            input: input_path.clone(),
            rects: rects
                .iter()
                .map(|r| [r.left, r.bottom, r.right, r.top])
                .collect(),
            terms,
            verification: verification_label.clone(),
            actions: outcome
                .actions
                .iter()
                .map(|a| ReportAction {
                    kind: format!("{:?}", a.kind).to_lowercase(),
                    bbox: [a.bbox.left, a.bbox.bottom, a.bbox.right, a.bbox.top],
                    detail: a.detail.clone(),
                })
                .collect(),
            replaced_images: outcome.replacement_images.keys().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&report)
            .unwrap_or_else(|_| "{}".to_string());
        if let Err(e) = fs::write(path, json) {
            eprintln!("Error writing {}: {}", path, e);
            process::exit(1);
        }
    }

    if !outcome.verification.is_ok() {
        eprintln!("Verification failed: {}", verification_label);
        process::exit(2);
    }
}
