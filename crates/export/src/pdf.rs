//! Single-invoice PDF rendering.
//!
//! Writes a PDF 1.4 file by hand using the built-in Helvetica faces with
//! WinAnsi encoding, so nothing has to be embedded. Only Latin-1 text can be
//! shown; other characters come out as `?`.

use std::fmt::Write;

use invoicely_infra::projections::InvoiceReadModel;

use crate::csv::money;
use crate::error::ExportError;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
/// Lowest baseline for body text; the footer sits below it.
const BODY_BOTTOM: f32 = 70.0;
const FOOTER_Y: f32 = 30.0;
const LINE: f32 = 14.0;
const BODY_SIZE: f32 = 10.0;

const QTY_RIGHT: f32 = 360.0;
const UNIT_RIGHT: f32 = 460.0;
const AMOUNT_RIGHT: f32 = PAGE_WIDTH - MARGIN;
const DESCRIPTION_CHARS: usize = 48;
const TEXT_CHARS: usize = 90;

#[derive(Debug, Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// PDF string literal body: escapes delimiters, octal-escapes the Latin-1
/// upper half and replaces everything else with `?`.
fn encode_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            '\t' | '\n' | '\r' => out.push(' '),
            '\u{a0}'..='\u{ff}' => {
                let _ = write!(out, "\\{:03o}", c as u32);
            }
            _ if c.is_control() => out.push(' '),
            _ => out.push('?'),
        }
    }
    out
}

/// Approximate Helvetica advance width in points, good enough for right
/// alignment of numbers and short labels.
fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c {
            '0'..='9' => 556,
            '.' | ',' | ' ' | ':' | 'i' | 'j' | 'l' | 'I' => 278,
            '-' | '(' | ')' | 'r' | 't' | 'f' => 333,
            '%' => 889,
            'm' | 'M' | 'W' => 833,
            'w' => 722,
            'A'..='Z' => 667,
            _ => 556,
        })
        .sum();
    units as f32 * size / 1000.0
}

/// Greedy word wrap at `width` characters; words longer than a line are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                lines.push(word.drain(..width).collect());
            }
            let word: String = word.into_iter().collect();
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Accumulates content-stream operators page by page.
struct PageWriter {
    pages: Vec<String>,
    ops: String,
    y: f32,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            ops: String::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn text(&mut self, x: f32, font: Font, size: f32, text: &str) {
        let _ = writeln!(
            self.ops,
            "BT /{} {size:.1} Tf {x:.2} {:.2} Td ({}) Tj ET",
            font.resource(),
            self.y,
            encode_text(text)
        );
    }

    fn text_right(&mut self, right: f32, font: Font, size: f32, text: &str) {
        self.text(right - text_width(text, size), font, size, text);
    }

    fn rule(&mut self) {
        let y = self.y;
        let _ = writeln!(
            self.ops,
            "0.5 w {MARGIN:.2} {y:.2} m {:.2} {y:.2} l S",
            PAGE_WIDTH - MARGIN
        );
    }

    fn advance(&mut self, dy: f32) {
        self.y -= dy;
    }

    fn fits(&self, height: f32) -> bool {
        self.y - height >= BODY_BOTTOM
    }

    fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.ops));
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn finish(mut self) -> Vec<String> {
        self.pages.push(self.ops);
        self.pages
    }
}

fn table_header(w: &mut PageWriter) {
    w.text(MARGIN, Font::Bold, BODY_SIZE, "Description");
    w.text_right(QTY_RIGHT, Font::Bold, BODY_SIZE, "Qty");
    w.text_right(UNIT_RIGHT, Font::Bold, BODY_SIZE, "Unit Price");
    w.text_right(AMOUNT_RIGHT, Font::Bold, BODY_SIZE, "Amount");
    w.advance(5.0);
    w.rule();
    w.advance(LINE);
}

fn layout(inv: &InvoiceReadModel) -> Vec<String> {
    let mut w = PageWriter::new();

    w.text(MARGIN, Font::Bold, 22.0, "INVOICE");
    w.text_right(AMOUNT_RIGHT, Font::Bold, 12.0, &inv.invoice_number);
    w.advance(32.0);

    let due = inv
        .due_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string());
    for line in [
        format!("Invoice date: {}", inv.date.format("%Y-%m-%d")),
        format!("Due date: {due}"),
        format!("Status: {}", inv.status.as_str().to_ascii_uppercase()),
    ] {
        w.text(MARGIN, Font::Regular, BODY_SIZE, &line);
        w.advance(LINE);
    }
    w.advance(LINE);

    w.text(MARGIN, Font::Bold, 11.0, "Bill to");
    w.advance(LINE);
    let mut client_lines = wrap(&inv.client.name, TEXT_CHARS);
    client_lines.extend(wrap(&inv.client.address, TEXT_CHARS));
    client_lines.push(inv.client.email.clone());
    if let Some(phone) = &inv.client.phone {
        client_lines.push(phone.clone());
    }
    for line in &client_lines {
        if !w.fits(LINE) {
            w.new_page();
        }
        w.text(MARGIN, Font::Regular, BODY_SIZE, line);
        w.advance(LINE);
    }
    w.advance(LINE);

    if !w.fits(LINE * 3.0) {
        w.new_page();
    }
    table_header(&mut w);

    for item in &inv.line_items {
        let desc = wrap(&item.description, DESCRIPTION_CHARS);
        if !w.fits(LINE * desc.len() as f32) {
            w.new_page();
            w.text(MARGIN, Font::Regular, 9.0, "(continued)");
            w.advance(LINE);
            table_header(&mut w);
        }
        for (i, line) in desc.iter().enumerate() {
            w.text(MARGIN, Font::Regular, BODY_SIZE, line);
            if i == 0 {
                w.text_right(QTY_RIGHT, Font::Regular, BODY_SIZE, &item.quantity.normalize().to_string());
                w.text_right(UNIT_RIGHT, Font::Regular, BODY_SIZE, &money(item.unit_price));
                w.text_right(AMOUNT_RIGHT, Font::Regular, BODY_SIZE, &money(item.line_total));
            }
            w.advance(LINE);
        }
    }

    if !w.fits(LINE * 4.0) {
        w.new_page();
    }
    w.advance(4.0);
    w.rule();
    w.advance(LINE);
    let tax_label = format!("Tax ({}%)", inv.tax_rate.normalize());
    for (label, amount, font) in [
        ("Subtotal", inv.subtotal, Font::Regular),
        (tax_label.as_str(), inv.tax_amount, Font::Regular),
        ("Total", inv.total, Font::Bold),
    ] {
        w.text_right(UNIT_RIGHT, font, BODY_SIZE, label);
        w.text_right(AMOUNT_RIGHT, font, BODY_SIZE, &money(amount));
        w.advance(LINE);
    }

    if let Some(notes) = inv.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        w.advance(LINE);
        if !w.fits(LINE * 2.0) {
            w.new_page();
        }
        w.text(MARGIN, Font::Bold, 11.0, "Notes");
        w.advance(LINE);
        for line in wrap(notes, TEXT_CHARS) {
            if !w.fits(LINE) {
                w.new_page();
            }
            w.text(MARGIN, Font::Regular, BODY_SIZE, &line);
            w.advance(LINE);
        }
    }

    w.finish()
}

fn footer(number: &str, page: usize, pages: usize) -> String {
    let mut ops = String::new();
    let left = encode_text(number);
    let right = format!("Page {page} of {pages}");
    let _ = writeln!(
        ops,
        "BT /F1 8.0 Tf {MARGIN:.2} {FOOTER_Y:.2} Td ({left}) Tj ET"
    );
    let _ = writeln!(
        ops,
        "BT /F1 8.0 Tf {:.2} {FOOTER_Y:.2} Td ({right}) Tj ET",
        AMOUNT_RIGHT - text_width(&right, 8.0)
    );
    ops
}

struct ObjectWriter {
    out: Vec<u8>,
    offsets: Vec<usize>,
}

impl ObjectWriter {
    fn new(object_count: usize) -> Self {
        let mut out = Vec::with_capacity(4096);
        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            out,
            offsets: vec![0; object_count + 1],
        }
    }

    fn object(&mut self, number: usize, body: &str) {
        self.offsets[number] = self.out.len();
        self.out
            .extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    fn stream(&mut self, number: usize, data: &str) {
        let body = format!("<< /Length {} >>\nstream\n{data}\nendstream", data.len());
        self.object(number, &body);
    }

    fn finish(mut self, info: usize) -> Vec<u8> {
        let xref_at = self.out.len();
        let size = self.offsets.len();
        let mut xref = format!("xref\n0 {size}\n0000000000 65535 f \n");
        for offset in &self.offsets[1..] {
            let _ = write!(xref, "{offset:010} 00000 n \n");
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {size} /Root 1 0 R /Info {info} 0 R >>\nstartxref\n{xref_at}\n%%EOF\n"
        );
        self.out.extend_from_slice(xref.as_bytes());
        self.out
    }
}

/// Render one invoice as a standalone PDF document.
pub fn render_invoice_pdf(inv: &InvoiceReadModel) -> Result<Vec<u8>, ExportError> {
    if inv.line_items.is_empty() {
        return Err(ExportError::Render {
            invoice_number: inv.invoice_number.clone(),
            reason: "invoice has no line items".to_string(),
        });
    }

    let pages = layout(inv);
    let page_count = pages.len();

    // 1 catalog, 2 page tree, 3-4 fonts, 5 info, then (page, content) pairs.
    const FIRST_PAGE_OBJECT: usize = 6;
    let object_count = FIRST_PAGE_OBJECT - 1 + page_count * 2;
    let mut w = ObjectWriter::new(object_count);

    let kids = (0..page_count)
        .map(|i| format!("{} 0 R", FIRST_PAGE_OBJECT + i * 2))
        .collect::<Vec<_>>()
        .join(" ");

    w.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    w.object(2, &format!("<< /Type /Pages /Kids [{kids}] /Count {page_count} >>"));
    w.object(
        3,
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
    );
    w.object(
        4,
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>",
    );
    w.object(
        5,
        &format!(
            "<< /Title (Invoice {}) /Producer (invoicely) >>",
            encode_text(&inv.invoice_number)
        ),
    );

    for (i, ops) in pages.into_iter().enumerate() {
        let page_obj = FIRST_PAGE_OBJECT + i * 2;
        let content_obj = page_obj + 1;
        w.object(
            page_obj,
            &format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH:.0} {PAGE_HEIGHT:.0}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {content_obj} 0 R >>"
            ),
        );
        let mut data = ops;
        data.push_str(&footer(&inv.invoice_number, i + 1, page_count));
        w.stream(content_obj, &data);
    }

    let bytes = w.finish(5);
    tracing::debug!(
        invoice_number = %inv.invoice_number,
        pages = page_count,
        bytes = bytes.len(),
        "invoice pdf rendered"
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::invoice;

    fn as_text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    fn page_count(text: &str) -> usize {
        let at = text.find("/Count ").unwrap() + "/Count ".len();
        text[at..]
            .split(|c: char| !c.is_ascii_digit())
            .next()
            .unwrap()
            .parse()
            .unwrap()
    }

    #[test]
    fn renders_a_well_formed_document() {
        let pdf = render_invoice_pdf(&invoice("INV-0001", 3)).unwrap();
        assert!(pdf.starts_with(b"%PDF-1.4\n"));
        assert!(pdf.ends_with(b"%%EOF\n"));

        let text = as_text(&pdf);
        assert!(text.contains("(INVOICE) Tj"));
        assert!(text.contains("(INV-0001) Tj"));
        assert!(text.contains("(Acme Corp) Tj"));
        assert!(text.contains("(815.12) Tj"));
        assert!(text.contains("(Tax \\(8.25%\\)) Tj"));
        assert!(text.contains("(Thank you for your business) Tj"));
        assert_eq!(page_count(&text), 1);
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let pdf = render_invoice_pdf(&invoice("INV-0002", 2)).unwrap();
        let text = as_text(&pdf);

        let start = text.rfind("startxref\n").unwrap() + "startxref\n".len();
        let xref_at: usize = text[start..].lines().next().unwrap().parse().unwrap();
        assert!(pdf[xref_at..].starts_with(b"xref\n"));

        // The binary marker in the header is not UTF-8, so read the table
        // from the raw bytes.
        let table = std::str::from_utf8(&pdf[xref_at..]).unwrap();
        let entries: Vec<&str> = table.lines().skip(3).take(7).collect();
        assert_eq!(entries.len(), 7);
        for (i, entry) in entries.iter().enumerate() {
            let offset: usize = entry[..10].parse().unwrap();
            let header = format!("{} 0 obj", i + 1);
            assert!(pdf[offset..].starts_with(header.as_bytes()), "object {}", i + 1);
        }
    }

    #[test]
    fn long_invoices_paginate() {
        let pdf = render_invoice_pdf(&invoice("INV-0003", 120)).unwrap();
        let text = as_text(&pdf);
        let pages = page_count(&text);
        assert!(pages > 1);
        assert!(text.contains(&format!("(Page {pages} of {pages}) Tj")));
        assert!(text.contains("(\\(continued\\)) Tj"));
    }

    #[test]
    fn non_latin1_text_is_replaced() {
        let mut inv = invoice("INV-0004", 1);
        inv.client.name = "Zoë 日本".into();
        let text = as_text(&render_invoice_pdf(&inv).unwrap());
        assert!(text.contains("(Zo\\353 ??) Tj"));
    }

    #[test]
    fn invoice_without_items_is_an_error() {
        let mut inv = invoice("INV-0005", 1);
        inv.line_items.clear();
        assert!(matches!(
            render_invoice_pdf(&inv),
            Err(ExportError::Render { .. })
        ));
    }

    #[test]
    fn wrap_respects_width() {
        assert_eq!(wrap("aa bb cc", 5), vec!["aa bb", "cc"]);
        assert_eq!(wrap("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap("one\ntwo", 20), vec!["one", "two"]);
        assert_eq!(wrap("", 10), vec![String::new()]);
    }
}
