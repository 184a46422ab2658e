//! Bulk import column mapping
//!
//! Spreadsheet rows arrive already tokenized as header → cell maps. Headers
//! are resolved once, against an explicit alias table, before any row is
//! read. A file without an address, city or postal code column is rejected
//! as a whole instead of yielding empty fields.

use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

use crate::grouping::AddressSource;

/// A raw tokenized row: header → cell text
pub type RawRow = HashMap<String, String>;

/// Import field a column can feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImportField {
    Address,
    City,
    PostalCode,
    RecipientName,
    Phone,
    Barcode,
    Weight,
    Description,
    Instructions,
    AccessCode,
}

impl ImportField {
    pub fn name(&self) -> &'static str {
        match self {
            ImportField::Address => "address",
            ImportField::City => "city",
            ImportField::PostalCode => "postal_code",
            ImportField::RecipientName => "recipient_name",
            ImportField::Phone => "phone",
            ImportField::Barcode => "barcode",
            ImportField::Weight => "weight",
            ImportField::Description => "description",
            ImportField::Instructions => "instructions",
            ImportField::AccessCode => "access_code",
        }
    }
}

/// Fields an import cannot do without
pub const REQUIRED_FIELDS: [ImportField; 3] =
    [ImportField::Address, ImportField::City, ImportField::PostalCode];

/// Accepted header spellings per field, already normalized
const COLUMN_ALIASES: &[(ImportField, &[&str])] = &[
    (
        ImportField::Address,
        &["address", "adresse", "street", "rue", "adresse de livraison", "delivery address", "address line 1"],
    ),
    (ImportField::City, &["city", "ville", "town", "commune", "localite"]),
    (
        ImportField::PostalCode,
        &["postal code", "postalcode", "postcode", "zip", "zip code", "code postal", "cp"],
    ),
    (
        ImportField::RecipientName,
        &["recipient", "recipient name", "destinataire", "name", "nom", "client", "customer"],
    ),
    (ImportField::Phone, &["phone", "telephone", "téléphone", "tel", "tél", "mobile", "portable"]),
    (
        ImportField::Barcode,
        &["barcode", "code barre", "code-barre", "tracking", "tracking number", "reference", "référence", "ref"],
    ),
    (ImportField::Weight, &["weight", "poids", "weight kg", "poids kg"]),
    (ImportField::Description, &["description", "contenu", "content", "designation", "désignation"]),
    (
        ImportField::Instructions,
        &["instructions", "notes", "note", "commentaire", "comment", "comments"],
    ),
    (ImportField::AccessCode, &["access code", "code acces", "code d'accès", "code accès", "digicode"]),
];

/// Import mapping errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    /// Required columns absent from every row
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),

    /// Nothing to import
    #[error("Import contains no rows")]
    NoRows,
}

impl From<ImportError> for crate::Error {
    fn from(err: ImportError) -> Self {
        crate::Error::InvalidInput(err.to_string())
    }
}

/// Normalize a header for alias lookup: trim, lowercase, `_`/`-` → space,
/// collapse repeated whitespace
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn field_for_header(header: &str) -> Option<ImportField> {
    let normalized = normalize_header(header);
    COLUMN_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.iter().any(|alias| normalize_header(alias) == normalized))
        .map(|(field, _)| *field)
}

/// Resolved header → field mapping
#[derive(Debug, Clone, Default)]
pub struct ColumnMapping {
    columns: HashMap<ImportField, String>,
}

impl ColumnMapping {
    /// Resolve headers against the alias table
    ///
    /// The first header matching a field wins; unknown headers are ignored.
    pub fn resolve<'a, I>(headers: I) -> Result<Self, ImportError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut columns = HashMap::new();
        for header in headers {
            if let Some(field) = field_for_header(header) {
                columns.entry(field).or_insert_with(|| header.to_string());
            }
        }

        let missing: Vec<&'static str> = REQUIRED_FIELDS
            .iter()
            .filter(|f| !columns.contains_key(*f))
            .map(|f| f.name())
            .collect();

        if !missing.is_empty() {
            return Err(ImportError::MissingColumns(missing));
        }

        Ok(Self { columns })
    }

    /// Source header for a field, if mapped
    pub fn header(&self, field: ImportField) -> Option<&str> {
        self.columns.get(&field).map(String::as_str)
    }

    fn cell(&self, row: &RawRow, field: ImportField) -> Option<String> {
        self.header(field)
            .and_then(|h| row.get(h))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Extract a typed row
    pub fn extract(&self, row: &RawRow) -> ImportRow {
        ImportRow {
            address: self.cell(row, ImportField::Address),
            city: self.cell(row, ImportField::City),
            postal_code: self.cell(row, ImportField::PostalCode),
            recipient_name: self.cell(row, ImportField::RecipientName),
            phone: self.cell(row, ImportField::Phone),
            barcode: self.cell(row, ImportField::Barcode),
            weight_kg: self.cell(row, ImportField::Weight).and_then(|w| parse_weight(&w)),
            description: self.cell(row, ImportField::Description),
            instructions: self.cell(row, ImportField::Instructions),
            access_code: self.cell(row, ImportField::AccessCode),
        }
    }
}

/// Parse a weight cell, accepting a decimal comma and a trailing unit
pub fn parse_weight(cell: &str) -> Option<f64> {
    let cleaned = cell
        .trim()
        .trim_end_matches(|c: char| c.is_alphabetic() || c.is_whitespace())
        .replace(',', ".");
    cleaned.parse::<f64>().ok().filter(|w| w.is_finite() && *w >= 0.0)
}

/// Typed import row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportRow {
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub recipient_name: Option<String>,
    pub phone: Option<String>,
    pub barcode: Option<String>,
    pub weight_kg: Option<f64>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub access_code: Option<String>,
}

impl AddressSource for ImportRow {
    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }
    fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }
    fn postal_code(&self) -> Option<&str> {
        self.postal_code.as_deref()
    }
    fn recipient_name(&self) -> Option<&str> {
        self.recipient_name.as_deref()
    }
    fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }
    fn access_code(&self) -> Option<&str> {
        self.access_code.as_deref()
    }
    fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }
}

/// Resolve the mapping from the union of all row headers and extract rows
pub fn parse_rows(rows: &[RawRow]) -> Result<Vec<ImportRow>, ImportError> {
    if rows.is_empty() {
        return Err(ImportError::NoRows);
    }

    let headers: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    let mapping = ColumnMapping::resolve(headers)?;
    Ok(rows.iter().map(|row| mapping.extract(row)).collect())
}
