//! Bulk-export workbook loading and bulk-upload sheet writing
//!
//! A workbook is the platform's `.xlsx` bulk report, read sheet by sheet, or
//! a directory holding one CSV file per sheet, named after the sheet
//! (`Portfolios.csv`, `Sponsored Products Campaigns.csv`,
//! `SP Search Term Report.csv`). This module:
//! - Normalizes headers (trim, drop the `(Informational only)` qualifier)
//! - Fails fast on missing sheets or required columns
//! - Coerces numeric cells, treating anything unparseable as missing
//! - Fills absent portfolio names with the "No portfolio" sentinel

use calamine::{open_workbook_auto, Data, Range, Reader};
use csv::StringRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::Workbook as XlsxBook;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::bulk::{BulkOutputRow, BULK_COLUMNS};
use crate::error::{PromoteError, Result};

pub const PORTFOLIOS_SHEET: &str = "Portfolios";
pub const CAMPAIGNS_SHEET: &str = "Sponsored Products Campaigns";
pub const SEARCH_TERMS_SHEET: &str = "SP Search Term Report";

/// Name of the single sheet in an `.xlsx` upload file.
pub const OUTPUT_SHEET: &str = "Final Output";

/// Sentinel used by the platform export for campaigns outside any portfolio.
pub const NO_PORTFOLIO: &str = "No portfolio";

const INFORMATIONAL_SUFFIX: &str = "(Informational only)";

// Thousands separators, currency signs and stray whitespace inside numbers
static NUMBER_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,$\s]").expect("static regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioRecord {
    pub portfolio_id: String,
    pub portfolio_name: String,
}

/// Entity tag of a campaign-structure row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityType {
    Campaign,
    AdGroup,
    Keyword,
    ProductTargeting,
    ProductAd,
    Other(String),
}

impl EntityType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Campaign" => EntityType::Campaign,
            "Ad Group" => EntityType::AdGroup,
            "Keyword" => EntityType::Keyword,
            "Product Targeting" => EntityType::ProductTargeting,
            "Product Ad" => EntityType::ProductAd,
            other => EntityType::Other(other.to_string()),
        }
    }
}

/// One row of the existing campaign structure export.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignRecord {
    pub entity: EntityType,
    pub portfolio_name: String,
    /// Empty until the portfolio resolver backfills it.
    pub portfolio_id: String,
    pub campaign_name: String,
    pub ad_group_name: String,
    pub keyword_text: Option<String>,
    pub daily_budget: Option<f64>,
    pub sku: Option<String>,
    pub sales: Option<f64>,
}

/// Aggregated performance of one customer query against a targeting unit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchTermRecord {
    pub search_term: String,
    pub campaign_name: String,
    pub ad_group_name: String,
    pub portfolio_name: String,
    /// Empty until the portfolio resolver backfills it.
    pub portfolio_id: String,
    pub units: Option<f64>,
    pub acos: Option<f64>,
    pub cpc: Option<f64>,
    pub product_targeting_expression: Option<String>,
}

/// The three input sheets of a bulk export.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub portfolios: Vec<PortfolioRecord>,
    pub campaigns: Vec<CampaignRecord>,
    pub search_terms: Vec<SearchTermRecord>,
}

impl Workbook {
    /// Open a bulk export: either the platform's `.xlsx` report or a directory
    /// holding one CSV per sheet. Any missing sheet aborts the load.
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            Self::open_csv_dir(path)
        } else {
            Self::open_xlsx(path)
        }
    }

    pub fn open_xlsx(path: &Path) -> Result<Self> {
        let display = path.display().to_string();
        let mut book = open_workbook_auto(path).map_err(|e| PromoteError::xlsx(&display, e))?;
        let mut read = |sheet: &str| -> Result<Sheet> {
            if !book.sheet_names().iter().any(|s| s == sheet) {
                return Err(PromoteError::MissingSheet { sheet: sheet.to_string(), path: display.clone() });
            }
            let range = book.worksheet_range(sheet).map_err(|e| PromoteError::xlsx(&display, e))?;
            Ok(Sheet::from_range(sheet, &range))
        };
        let portfolios = read(PORTFOLIOS_SHEET)?;
        let campaigns = read(CAMPAIGNS_SHEET)?;
        let search_terms = read(SEARCH_TERMS_SHEET)?;
        Self::from_sheets(&portfolios, &campaigns, &search_terms)
    }

    pub fn open_csv_dir(dir: &Path) -> Result<Self> {
        let portfolios = open_sheet(dir, PORTFOLIOS_SHEET)?;
        let campaigns = open_sheet(dir, CAMPAIGNS_SHEET)?;
        let search_terms = open_sheet(dir, SEARCH_TERMS_SHEET)?;
        Self::from_readers(portfolios, campaigns, search_terms)
    }

    pub fn from_readers<P: Read, C: Read, S: Read>(portfolios: P, campaigns: C, search_terms: S) -> Result<Self> {
        Self::from_sheets(
            &Sheet::from_reader(PORTFOLIOS_SHEET, portfolios)?,
            &Sheet::from_reader(CAMPAIGNS_SHEET, campaigns)?,
            &Sheet::from_reader(SEARCH_TERMS_SHEET, search_terms)?,
        )
    }

    fn from_sheets(portfolios: &Sheet, campaigns: &Sheet, search_terms: &Sheet) -> Result<Self> {
        let workbook = Workbook {
            portfolios: load_portfolios(portfolios)?,
            campaigns: load_campaigns(campaigns)?,
            search_terms: load_search_terms(search_terms)?,
        };
        tracing::info!(
            portfolios = workbook.portfolios.len(),
            campaign_rows = workbook.campaigns.len(),
            search_term_rows = workbook.search_terms.len(),
            "workbook loaded"
        );
        Ok(workbook)
    }
}

/// Raw sheet contents with a normalized header index.
struct Sheet {
    name: String,
    columns: HashMap<String, usize>,
    rows: Vec<StringRecord>,
}

impl Sheet {
    fn new(name: &str, headers: &StringRecord, rows: Vec<StringRecord>) -> Self {
        let mut columns = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            // `X (Informational only)` beats a plain `X`, which is blank on child rows
            if is_informational(header) {
                columns.insert(normalize_header(header), idx);
            } else {
                columns.entry(normalize_header(header)).or_insert(idx);
            }
        }
        Sheet { name: name.to_string(), columns, rows }
    }

    fn from_reader<R: Read>(name: &str, reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers().map_err(|e| PromoteError::csv(name, e))?.clone();
        let rows = csv_reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| PromoteError::csv(name, e))?;

        Ok(Sheet::new(name, &headers, rows))
    }

    /// First row of the range is the header row.
    fn from_range(name: &str, range: &Range<Data>) -> Self {
        let mut rows = range
            .rows()
            .map(|row| StringRecord::from(row.iter().map(|c| c.to_string()).collect::<Vec<String>>()));
        let headers = rows.next().unwrap_or_else(StringRecord::new);
        Sheet::new(name, &headers, rows.collect())
    }

    fn column(&self, column: &str) -> Result<usize> {
        self.columns.get(column).copied().ok_or_else(|| PromoteError::MissingColumn {
            sheet: self.name.clone(),
            column: column.to_string(),
        })
    }
}

fn is_informational(raw: &str) -> bool {
    raw.trim().ends_with(INFORMATIONAL_SUFFIX)
}

fn normalize_header(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_suffix(INFORMATIONAL_SUFFIX)
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// Trimmed cell text; blank cells and short rows are `None`.
fn cell(row: &StringRecord, idx: usize) -> Option<&str> {
    row.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn text(row: &StringRecord, idx: usize) -> String {
    cell(row, idx).unwrap_or_default().to_string()
}

/// Parse a numeric cell. Thousands separators and currency signs are ignored,
/// a trailing `%` turns the value into a fraction. Anything else is missing.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = NUMBER_NOISE.replace_all(raw, "");
    let (digits, scale) = match cleaned.strip_suffix('%') {
        Some(pct) => (pct, 100.0),
        None => (cleaned.as_ref(), 1.0),
    };
    digits
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v / scale)
}

fn number(row: &StringRecord, idx: usize) -> Option<f64> {
    cell(row, idx).and_then(parse_number)
}

fn load_portfolios(sheet: &Sheet) -> Result<Vec<PortfolioRecord>> {
    let id_col = sheet.column("Portfolio ID")?;
    let name_col = sheet.column("Portfolio Name")?;

    Ok(sheet
        .rows
        .iter()
        .filter_map(|row| {
            Some(PortfolioRecord {
                portfolio_id: cell(row, id_col)?.to_string(),
                portfolio_name: cell(row, name_col)?.to_string(),
            })
        })
        .collect())
}

fn load_campaigns(sheet: &Sheet) -> Result<Vec<CampaignRecord>> {
    let entity = sheet.column("Entity")?;
    let portfolio = sheet.column("Portfolio Name")?;
    let campaign = sheet.column("Campaign Name")?;
    let ad_group = sheet.column("Ad Group Name")?;
    let keyword = sheet.column("Keyword Text")?;
    let budget = sheet.column("Daily Budget")?;
    let sku = sheet.column("SKU")?;
    let sales = sheet.column("Sales")?;

    Ok(sheet
        .rows
        .iter()
        .map(|row| CampaignRecord {
            entity: EntityType::parse(cell(row, entity).unwrap_or_default()),
            portfolio_name: cell(row, portfolio).unwrap_or(NO_PORTFOLIO).to_string(),
            portfolio_id: String::new(),
            campaign_name: text(row, campaign),
            ad_group_name: text(row, ad_group),
            keyword_text: cell(row, keyword).map(str::to_string),
            daily_budget: number(row, budget),
            sku: cell(row, sku).map(str::to_string),
            sales: number(row, sales),
        })
        .collect())
}

fn load_search_terms(sheet: &Sheet) -> Result<Vec<SearchTermRecord>> {
    let term = sheet.column("Customer Search Term")?;
    let campaign = sheet.column("Campaign Name")?;
    let ad_group = sheet.column("Ad Group Name")?;
    let portfolio = sheet.column("Portfolio Name")?;
    let units = sheet.column("Units")?;
    let acos = sheet.column("ACOS")?;
    let cpc = sheet.column("CPC")?;
    let targeting = sheet.column("Product Targeting Expression")?;

    let mut skipped = 0usize;
    let records: Vec<SearchTermRecord> = sheet
        .rows
        .iter()
        .filter_map(|row| {
            // The search term is a grouping key, rows without one carry no signal
            let Some(search_term) = cell(row, term) else {
                skipped += 1;
                return None;
            };
            Some(SearchTermRecord {
                search_term: search_term.to_string(),
                campaign_name: text(row, campaign),
                ad_group_name: text(row, ad_group),
                portfolio_name: cell(row, portfolio).unwrap_or(NO_PORTFOLIO).to_string(),
                portfolio_id: String::new(),
                units: number(row, units),
                acos: number(row, acos),
                cpc: number(row, cpc),
                product_targeting_expression: cell(row, targeting).map(str::to_string),
            })
        })
        .collect();

    if skipped > 0 {
        tracing::warn!(skipped, sheet = %sheet.name, "dropped rows without a customer search term");
    }
    Ok(records)
}

/// Write bulk rows as a single CSV sheet in the fixed upload column order.
pub fn write_bulk_sheet<W: Write>(writer: W, rows: &[BulkOutputRow]) -> Result<()> {
    let sheet = "bulk output";
    let mut csv_writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    csv_writer.write_record(BULK_COLUMNS).map_err(|e| PromoteError::csv(sheet, e))?;
    for row in rows {
        csv_writer.write_record(row.fields()).map_err(|e| PromoteError::csv(sheet, e))?;
    }
    csv_writer.flush().map_err(|e| PromoteError::io(sheet, e))?;
    Ok(())
}

/// Write bulk rows as a single `.xlsx` sheet. Money columns stay numeric.
pub fn write_bulk_workbook(path: &Path, rows: &[BulkOutputRow]) -> Result<()> {
    let mut book = build_bulk_workbook(rows)?;
    book.save(path).map_err(|e| PromoteError::XlsxWrite { path: path.display().to_string(), source: e })
}

fn build_bulk_workbook(rows: &[BulkOutputRow]) -> Result<XlsxBook> {
    let wrap = |e| PromoteError::XlsxWrite { path: OUTPUT_SHEET.to_string(), source: e };
    let mut book = XlsxBook::new();
    let sheet = book.add_worksheet();
    sheet.set_name(OUTPUT_SHEET).map_err(wrap)?;

    for (col, header) in (0u16..).zip(BULK_COLUMNS) {
        sheet.write_string(0, col, header).map_err(wrap)?;
    }
    for (row_idx, row) in (1u32..).zip(rows) {
        for (idx, (col, value)) in (0u16..).zip(row.fields()).enumerate() {
            if let Some(amount) = row.amount(idx) {
                sheet.write_number(row_idx, col, amount).map_err(wrap)?;
            } else if !value.is_empty() {
                sheet.write_string(row_idx, col, &value).map_err(wrap)?;
            }
        }
    }
    Ok(book)
}
