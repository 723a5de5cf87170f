//! Maps scanner findings onto wire diagnostics.

use warden_core::{Document, Finding, Range, Settings, scan};

use crate::protocol::{Diagnostic, Location, RelatedInformation};

/// Runs the scanner over `doc` and converts the byte-offset findings into
/// UTF-16 wire positions.
pub fn scan_document(
    doc: &Document,
    uri: &str,
    settings: Settings,
    attach_related: bool,
) -> Vec<Diagnostic> {
    let findings = scan(doc.text(), settings, attach_related);
    findings
        .iter()
        .map(|finding| to_wire(doc, uri, finding))
        .collect()
}

fn to_wire(doc: &Document, uri: &str, finding: &Finding) -> Diagnostic {
    let related = finding.related();
    let related_information = if related.is_empty() {
        None
    } else {
        Some(
            related
                .iter()
                .map(|hint| RelatedInformation {
                    location: Location {
                        uri: uri.to_owned(),
                        range: Range::new(
                            doc.position_at(hint.start()),
                            doc.position_at(hint.end()),
                        ),
                    },
                    message: hint.message(),
                })
                .collect(),
        )
    };
    Diagnostic {
        range: Range::new(
            doc.position_at(finding.start()),
            doc.position_at(finding.end()),
        ),
        severity: finding.severity().to_lsp(),
        message: finding.message().to_owned(),
        source: finding.source(),
        related_information,
    }
}
