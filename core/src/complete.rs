//! Completion catalogs and line-prefix classification.
//!
//! Warden's standard library is organized into dot-accessed namespaces
//! (`strings.`, `json.`, `http.`, ...). A cursor right after one of those
//! triggers that namespace's catalog; everywhere else the default catalog
//! of keywords and builtins applies. Catalogs are static data returned
//! whole — the editor does any prefix filtering.

/// Completion item kind, using the protocol's numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionKind {
    Method = 2,
    Function = 3,
    Field = 5,
    Keyword = 14,
}

impl SuggestionKind {
    /// Protocol numeric code.
    #[must_use]
    pub fn to_lsp(self) -> u8 {
        self as u8
    }
}

/// A single entry of a completion catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suggestion {
    label: &'static str,
    kind: SuggestionKind,
    id: u32,
}

impl Suggestion {
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[must_use]
    pub fn kind(&self) -> SuggestionKind {
        self.kind
    }

    /// Catalog-local identifier; every catalog numbers from 1.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }
}

const fn method(id: u32, label: &'static str) -> Suggestion {
    Suggestion {
        label,
        kind: SuggestionKind::Method,
        id,
    }
}

const fn field(id: u32, label: &'static str) -> Suggestion {
    Suggestion {
        label,
        kind: SuggestionKind::Field,
        id,
    }
}

const fn function(id: u32, label: &'static str) -> Suggestion {
    Suggestion {
        label,
        kind: SuggestionKind::Function,
        id,
    }
}

const fn keyword(id: u32, label: &'static str) -> Suggestion {
    Suggestion {
        label,
        kind: SuggestionKind::Keyword,
        id,
    }
}

const STRINGS: &[Suggestion] = &[
    method(1, "has_prefix"),
    method(2, "has_suffix"),
    method(3, "join"),
    method(4, "split"),
    method(5, "to_lower"),
    method(6, "to_upper"),
    method(7, "trim_prefix"),
];

const JSON: &[Suggestion] = &[method(1, "marshal"), method(2, "unmarshal")];

const HTTP: &[Suggestion] = &[
    method(1, "get"),
    method(2, "post"),
    method(3, "request"),
    method(4, "accept_status_codes"),
];

const TYPES: &[Suggestion] = &[method(1, "type_of")];

const BASE64: &[Suggestion] = &[
    method(1, "encode"),
    method(2, "decode"),
    method(3, "urlsafe_encode"),
    method(4, "urlsafe_decode"),
];

const DECIMAL: &[Suggestion] = &[
    method(1, "new"),
    method(2, "is_nan"),
    method(3, "is_infinite"),
    field(4, "infinity"),
    field(5, "nan"),
];

const TIME: &[Suggestion] = &[
    field(1, "now"),
    method(2, "load"),
    field(3, "second"),
    field(4, "minute"),
    field(5, "hour"),
    field(6, "day"),
];

const SOCKADDR: &[Suggestion] = &[method(1, "new"), method(2, "is_equal")];

const UNITS: &[Suggestion] = &[
    field(1, "byte"),
    field(2, "kilobyte"),
    field(3, "megabyte"),
    field(4, "gigabyte"),
    field(5, "terabyte"),
    field(6, "petabyte"),
];

const VERSION: &[Suggestion] = &[method(1, "new")];

/// Namespace triggers in priority order; the first suffix match wins.
const NAMESPACES: &[(&str, &[Suggestion])] = &[
    ("strings", STRINGS),
    ("json", JSON),
    ("http", HTTP),
    ("types", TYPES),
    ("base64", BASE64),
    ("decimal", DECIMAL),
    ("time", TIME),
    ("sockaddr", SOCKADDR),
    ("units", UNITS),
    ("version", VERSION),
];

/// Catalog offered when no namespace trigger matches: language keywords,
/// builtin functions, then the namespace names themselves.
const DEFAULT: &[Suggestion] = &[
    keyword(1, "import"),
    keyword(2, "for"),
    keyword(3, "as"),
    keyword(4, "filter"),
    keyword(5, "if"),
    keyword(6, "break"),
    keyword(7, "continue"),
    keyword(8, "in"),
    keyword(9, "null"),
    keyword(10, "rule"),
    keyword(11, "param"),
    keyword(12, "default"),
    keyword(13, "map"),
    keyword(14, "return"),
    keyword(15, "undefined"),
    keyword(16, "any"),
    keyword(17, "all"),
    keyword(18, "else"),
    keyword(19, "when"),
    keyword(20, "is"),
    keyword(21, "not"),
    keyword(22, "matches"),
    keyword(23, "func"),
    keyword(24, "case"),
    keyword(25, "empty"),
    keyword(26, "true"),
    keyword(27, "false"),
    function(28, "length"),
    function(29, "append"),
    function(30, "delete"),
    function(31, "keys"),
    function(32, "values"),
    function(33, "range"),
    function(34, "print"),
    function(35, "error"),
    function(36, "int"),
    function(37, "float"),
    function(38, "string"),
    function(39, "bool"),
    function(40, "strings"),
    function(41, "json"),
    function(42, "http"),
    function(43, "types"),
    function(44, "base64"),
    function(45, "decimal"),
    function(46, "time"),
    function(47, "sockaddr"),
    function(48, "units"),
    function(49, "version"),
];

/// Pick the catalog for a cursor position, given the text of its line up
/// to the cursor. A prefix ending in `<namespace>.` selects that
/// namespace's catalog; whitespace after the dot is tolerated. Anything
/// else gets the default catalog.
#[must_use]
pub fn classify(line_prefix: &str) -> &'static [Suggestion] {
    if let Some(rest) = line_prefix.trim_end().strip_suffix('.') {
        for (namespace, catalog) in NAMESPACES {
            if rest.ends_with(namespace) {
                return catalog;
            }
        }
    }
    DEFAULT
}

/// Extra text attached when the editor resolves an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedHint {
    pub detail: &'static str,
    pub documentation: &'static str,
}

/// Detail text for the items that carry any. Catalogs number their ids
/// independently from 1 and resolution keys on the id alone, so id 1 of
/// any catalog picks up the `import` blurb if the editor round-trips it.
#[must_use]
pub fn resolve_hint(id: u32) -> Option<ResolvedHint> {
    match id {
        1 => Some(ResolvedHint {
            detail: "Warden import",
            documentation: "Brings a namespace into scope for the current policy.",
        }),
        _ => None,
    }
}
