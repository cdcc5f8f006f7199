use crate::error::SheetLoaderError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::criteria::Criteria;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::io::Read;
use std::io::Seek;
use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;

/// ODS file MIME type identifier
const MIME_TYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";
const CONTENT: &str = "content.xml";
const MANIFEST: &str = "META-INF/manifest.xml";

const SPREADSHEET: QName = QName(b"office:spreadsheet");
const TABLE: QName = QName(b"table:table");
const TABLE_ROW: QName = QName(b"table:table-row");
const TABLE_CELL: QName = QName(b"table:table-cell");
/// Cells hidden under a merged cell
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
/// Comments attached to a cell
const ANNOTATION: QName = QName(b"office:annotation");
const PARAGRAPH: QName = QName(b"text:p");
/// Run of spaces, `text:c` holds the count
const STRING: QName = QName(b"text:s");
const MANIFEST_FILE_ENTRY: QName = QName(b"manifest:file-entry");
const MANIFEST_ENCRYPTION_DATA: QName = QName(b"manifest:encryption-data");

#[derive(Error, Debug)]
pub enum OdsError {
    #[error("Invalid ODS MIME type")]
    MimeTypeError,
}

/// Reader for OpenDocument spreadsheets.
pub(crate) struct OdsSpreadsheet {
    pub(crate) name: String,
    zip: ZipArchive<UnifiedReader>,
}

impl OdsSpreadsheet {
    pub(crate) fn open(file_name: &str) -> Result<Self, SheetLoaderError> {
        let mut zip = ZipArchive::new(UnifiedReader::new(file_name)?)?;
        check_mime(&mut zip)?;
        if is_password_protected(&mut zip)? {
            Err(SpreadsheetError::SpreadsheetPasswordProtectedError(file_name.to_owned()))?;
        }
        Ok(OdsSpreadsheet {
            name: file_name.to_owned(),
            zip,
        })
    }
}

impl Spreadsheet for OdsSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&mut self) -> Result<Vec<String>, SheetLoaderError> {
        let mut names = Vec::<String>::new();
        let mut reader = self.zip
            .xml_reader(CONTENT)?
            .ok_or_else(|| SpreadsheetError::FileError(CONTENT.to_owned()))?;
        match_xml_events!(reader => {
            Event::End(event) if event.name() == SPREADSHEET => break,
            Event::Start(event) if event.name() == TABLE => {
                if let Some(name) = event.get_attribute_value("table:name")? {
                    names.push(name.to_string());
                }
            }
        });
        Ok(names)
    }

    /// Walks `content.xml` once. Tables rejected by the criteria are still
    /// traversed but none of their cells are kept.
    fn read_sheets(&mut self, criteria: &Criteria) -> Result<Vec<Sheet>, SheetLoaderError> {
        let mut sheets = Vec::<Sheet>::new();
        let mut current = None::<Sheet>;
        let mut reader = self.zip
            .xml_reader(CONTENT)?
            .ok_or_else(|| SpreadsheetError::FileError(CONTENT.to_owned()))?;

        let mut row = 0usize;
        let mut col = 0usize;
        let mut row_count = 1usize;
        let mut col_count = 1usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        // Reading the paragraphs of a string cell
        let mut element_context = false;
        let mut comment_context = false;
        match_xml_events!(reader => {
            Event::End(event) if event.name() == SPREADSHEET => break,
            Event::Start(event) if event.name() == TABLE => {
                let sheet_name = event.get_attribute_value("table:name")?.unwrap_or_default();
                row = 0;
                current = if criteria.accept(&sheet_name) {
                    Some(Sheet::new(&self.name, &sheet_name))
                } else {
                    debug!("Sheet '{sheet_name}' filtered out");
                    None
                };
            }
            Event::End(event) if event.name() == TABLE => {
                if let Some(sheet) = current.take() {
                    debug!("Read {} cell(s) from sheet '{}'", sheet.cells.len(), sheet.name);
                    sheets.push(sheet);
                }
            }
            Event::Start(event) if event.name() == TABLE_ROW => {
                row_count = event.parse_attribute_value("table:number-rows-repeated")?.unwrap_or(1);
                col = 0;
            }
            Event::End(event) if event.name() == TABLE_ROW => {
                row += row_count;
            }
            Event::Start(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                value.clear();
                element_context = false;
                col_count = event.parse_attribute_value("table:number-columns-repeated")?.unwrap_or(1);
                let is_error = event.get_attribute_value("calcext:value-type")?
                    .map(|value_type| value_type == "error")
                    .unwrap_or(false);
                kind = match event.get_attribute_value("office:value-type")? {
                    None => CellType::Empty,
                    Some(_) if is_error => CellType::Error,
                    Some(value_type) => match value_type.as_ref() {
                        "boolean" => CellType::Boolean,
                        "date" => CellType::IsoDateTime,
                        "time" => CellType::IsoDuration,
                        "string" => CellType::Text,
                        _ => CellType::Number,
                    },
                };

                match kind {
                    CellType::Boolean => {
                        let is_true = event.get_attribute_value("office:boolean-value")?
                            .map(|data| data != "false" && data != "0")
                            .unwrap_or(false);
                        value.push_str(if is_true { "1" } else { "0" });
                    }
                    CellType::IsoDateTime => if let Some(data) = event.get_attribute_value("office:date-value")? {
                        value.push_str(&data);
                    },
                    CellType::IsoDuration => if let Some(data) = event.get_attribute_value("office:time-value")? {
                        value.push_str(&data);
                    },
                    CellType::Number => if let Some(data) = event.get_attribute_value("office:value")? {
                        value.push_str(&data);
                    },
                    CellType::Text | CellType::Error => {
                        if let Some(data) = event.get_attribute_value("office:string-value")? {
                            value.push_str(&data);
                        } else {
                            element_context = true;
                        }
                    }
                    _ => (),
                }
            }
            Event::End(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                if let Some(sheet) = current.as_mut() {
                    let keep = match kind {
                        CellType::Empty => false,
                        CellType::Error => !criteria.error_as_null,
                        _ => !value.is_empty(),
                    };
                    if keep {
                        for row_offset in 0..row_count {
                            for col_offset in 0..col_count {
                                sheet.push(Cell {
                                    row: row + row_offset,
                                    col: col + col_offset,
                                    kind,
                                    value: value.to_owned(),
                                });
                            }
                        }
                    }
                }
                col += col_count;
                kind = CellType::Empty;
                element_context = false;
                comment_context = false;
            }
            Event::Start(event) if element_context && event.name() == ANNOTATION => comment_context = true,
            Event::End(event) if element_context && comment_context && event.name() == ANNOTATION => comment_context = false,
            Event::Start(event) if element_context && !comment_context && event.name() == PARAGRAPH => {
                if !value.is_empty() {
                    value.push('\n');
                }
            }
            Event::Start(event) if element_context && !comment_context && event.name() == STRING => {
                let count = event.parse_attribute_value("text:c")?.unwrap_or(1usize);
                for _ in 0..count {
                    value.push(' ');
                }
            }
            Event::Text(event) if element_context && !comment_context => value.push_bytes_text(&event)?,
            Event::GeneralRef(event) if element_context && !comment_context => value.push_bytes_ref(&event)?,
        });

        Ok(sheets)
    }
}

fn check_mime<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<(), SheetLoaderError> {
    if let Some(file) = &mut zip.file("mimetype")? {
        let mut buffer = Vec::with_capacity(MIME_TYPE.len());
        file.read_to_end(&mut buffer)?;
        if buffer.as_slice() != MIME_TYPE {
            Err(OdsError::MimeTypeError)?;
        }
    }
    Ok(())
}

/// An encrypted document lists `encryption-data` in its manifest.
/// A document without a manifest is treated as unencrypted.
fn is_password_protected<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<bool, SheetLoaderError> {
    let mut reader = match zip.xml_reader(MANIFEST)? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == MANIFEST_FILE_ENTRY => in_file_entry = true,
        Event::End(event) if event.name() == MANIFEST_FILE_ENTRY => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == MANIFEST_ENCRYPTION_DATA => {
            return Ok(true);
        }
    });
    Ok(false)
}
