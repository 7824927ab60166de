//! Loader for the tabular API documentation dataset.
//!
//! Expected header: `name,description,endpoint,method,example`. Fields may be
//! double-quoted to carry commas; a doubled quote inside a quoted field is an
//! escaped quote. Records are one per line.

use std::path::Path;

/// One documented API operation. Immutable once loaded; `seq` records the
/// original dataset position and is used for stable ranking tie-breaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEntry {
    pub seq: usize,
    pub name: String,
    pub description: String,
    pub endpoint: String,
    pub method: String,
    pub example: String,
}

#[derive(Debug)]
pub struct LoadReport {
    pub entries: Vec<ApiEntry>,
    pub skipped: usize,
}

/// Load entries from `path`, falling back to the built-in placeholder set when
/// the file is missing, unreadable, or yields no valid rows. Downstream stages
/// never see an empty collection.
#[must_use]
pub fn load_or_placeholder(path: &Path) -> LoadReport {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let report = parse_dataset(&content);
            if report.entries.is_empty() {
                tracing::warn!(
                    "dataset {} has no valid rows, using placeholder entries",
                    path.display()
                );
                LoadReport {
                    entries: placeholder_entries(),
                    skipped: report.skipped,
                }
            } else {
                report
            }
        }
        Err(e) => {
            tracing::warn!(
                "failed to read dataset {}: {e}, using placeholder entries",
                path.display()
            );
            LoadReport {
                entries: placeholder_entries(),
                skipped: 0,
            }
        }
    }
}

/// Parse dataset text. Malformed rows (too few fields, or empty
/// name/description/endpoint) are skipped with a warning and counted.
#[must_use]
pub fn parse_dataset(content: &str) -> LoadReport {
    let mut entries = Vec::new();
    let mut skipped = 0;

    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        // Header row
        if line_no == 0 && line.to_lowercase().starts_with("name,") {
            continue;
        }

        let fields = split_record(line);
        if fields.len() < 4 {
            tracing::warn!("skipping dataset row {}: expected at least 4 fields, got {}", line_no + 1, fields.len());
            skipped += 1;
            continue;
        }

        let name = fields[0].trim();
        let description = fields[1].trim();
        let endpoint = fields[2].trim();
        let method = fields[3].trim();
        if name.is_empty() || description.is_empty() || endpoint.is_empty() {
            tracing::warn!("skipping dataset row {}: missing required field", line_no + 1);
            skipped += 1;
            continue;
        }

        entries.push(ApiEntry {
            seq: entries.len(),
            name: name.to_owned(),
            description: description.to_owned(),
            endpoint: endpoint.to_owned(),
            method: if method.is_empty() {
                "GET".to_owned()
            } else {
                method.to_uppercase()
            },
            example: fields.get(4).map(|s| s.trim().to_owned()).unwrap_or_default(),
        });
    }

    LoadReport { entries, skipped }
}

/// Split one record into fields, honoring double-quoted fields with `""`
/// escapes.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Minimal built-in payment API set used when no dataset is available.
#[must_use]
pub fn placeholder_entries() -> Vec<ApiEntry> {
    let rows = [
        (
            "Create Payment",
            "Charges a payment source for a given amount and currency.",
            "/v2/payments",
            "POST",
            "client.payments.create(amount=100, currency=\"USD\", source_id=\"cnon:card-nonce\")",
        ),
        (
            "List Payments",
            "Retrieves a list of payments taken by the account.",
            "/v2/payments",
            "GET",
            "client.payments.list(begin_time=\"2026-01-01T00:00:00Z\")",
        ),
        (
            "Create Refund",
            "Refunds a previously completed payment, in full or partially.",
            "/v2/refunds",
            "POST",
            "client.refunds.create(payment_id=\"pmt_123\", amount=50)",
        ),
        (
            "Create Customer",
            "Creates a customer profile that can be attached to payments.",
            "/v2/customers",
            "POST",
            "client.customers.create(given_name=\"Amelia\", email=\"a@example.com\")",
        ),
    ];

    rows.iter()
        .enumerate()
        .map(|(seq, (name, description, endpoint, method, example))| ApiEntry {
            seq,
            name: (*name).to_owned(),
            description: (*description).to_owned(),
            endpoint: (*endpoint).to_owned(),
            method: (*method).to_owned(),
            example: (*example).to_owned(),
        })
        .collect()
}
