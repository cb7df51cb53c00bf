//! Shared fixtures for the integration tests.

#![allow(dead_code)]

/// One-page PDF with each entry of `lines` drawn as its own text line in
/// Helvetica. Offsets and the stream length are computed so `pdf-extract`
/// parses it without recovery.
pub fn minimal_pdf(lines: &[&str]) -> Vec<u8> {
    let mut content = String::from("BT /F1 12 Tf 72 720 Td");
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            content.push_str(" 0 -18 Td");
        }
        content.push_str(&format!(" ({}) Tj", line));
    }
    content.push_str(" ET");

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// A short TransUnion-style disclosure page for John Smith.
pub fn john_smith_pdf() -> Vec<u8> {
    minimal_pdf(&[
        "TransUnion Consumer Disclosure",
        "Name: John Smith",
        "Current Address: 123 Main St",
        "Toronto ON M5V 2T6",
    ])
}

/// John Smith's disclosure followed by an inquiries section with two entries.
pub fn inquiry_report_pdf() -> Vec<u8> {
    minimal_pdf(&[
        "TransUnion Consumer Disclosure",
        "Name: John Smith",
        "Current Address: 123 Main St",
        "Toronto ON M5V 2T6",
        "Inquiries",
        "2024-01-15 Subscriber: ROYAL BANK",
        "2023-11-30 Subscriber: ROGERS BANK",
    ])
}

/// Config TOML rooted at `root` with the given low-text threshold.
pub fn config_toml(root: &std::path::Path, low_text_threshold: i64) -> String {
    format!(
        r#"[storage]
upload_dir = "{root}/data/uploads"
observation_dir = "{root}/data/observations"

[quality]
low_text_threshold = {low_text_threshold}

[server]
bind = "127.0.0.1:7340"
"#,
        root = root.display(),
        low_text_threshold = low_text_threshold,
    )
}
