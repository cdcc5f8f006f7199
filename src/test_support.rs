//! Workbook fixtures written on the fly for tests.
use quick_xml::escape::escape;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

use crate::spreadsheet::reference::index_to_reference;

fn write_entry(writer: &mut ZipWriter<File>, name: &str, content: &str) {
    writer.start_file(name, SimpleFileOptions::default()).unwrap();
    writer.write_all(content.as_bytes()).unwrap();
}

/// Builds minimal `.xlsx` files.
///
/// Cell literals: numbers are plain number cells, `#45292` a serial number
/// styled as a date, `?1` a boolean, `!#N/A` an error cell, an empty
/// literal no cell at all. Anything else, or text forced with a leading
/// `'`, is a shared string.
#[derive(Default)]
pub(crate) struct XlsxBuilder {
    sheets: Vec<(String, Vec<Vec<String>>)>,
}

impl XlsxBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn sheet(mut self, name: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();
        self.sheets.push((name.to_owned(), rows));
        self
    }

    pub(crate) fn write(&self, directory: &Path, file_name: &str) -> String {
        let path = directory.join(file_name);
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        let mut shared_strings = Vec::<String>::new();

        let mut workbook = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><workbookPr/><sheets>"#,
        );
        let mut relationships = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (index, (name, rows)) in self.sheets.iter().enumerate() {
            let number = index + 1;
            workbook.push_str(&format!(r#"<sheet name="{}" sheetId="{number}" r:id="rId{number}"/>"#, escape(name.as_str())));
            relationships.push_str(&format!(
                r#"<Relationship Id="rId{number}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{number}.xml"/>"#
            ));

            let mut worksheet = String::from(
                r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
            );
            for (row, cells) in rows.iter().enumerate() {
                worksheet.push_str(&format!(r#"<row r="{}">"#, row + 1));
                for (col, literal) in cells.iter().enumerate() {
                    let reference = index_to_reference(row, col);
                    if let Some(text) = literal.strip_prefix('\'') {
                        worksheet.push_str(&format!(r#"<c r="{reference}" t="s"><v>{}</v></c>"#, shared_strings.len()));
                        shared_strings.push(text.to_owned());
                    } else if let Some(serial) = literal.strip_prefix('#') {
                        worksheet.push_str(&format!(r#"<c r="{reference}" s="1"><v>{serial}</v></c>"#));
                    } else if let Some(flag) = literal.strip_prefix('?') {
                        worksheet.push_str(&format!(r#"<c r="{reference}" t="b"><v>{flag}</v></c>"#));
                    } else if let Some(error) = literal.strip_prefix('!') {
                        worksheet.push_str(&format!(r#"<c r="{reference}" t="e"><v>{}</v></c>"#, escape(error)));
                    } else if literal.parse::<f64>().is_ok() {
                        worksheet.push_str(&format!(r#"<c r="{reference}"><v>{literal}</v></c>"#));
                    } else if !literal.is_empty() {
                        worksheet.push_str(&format!(r#"<c r="{reference}" t="s"><v>{}</v></c>"#, shared_strings.len()));
                        shared_strings.push(literal.to_owned());
                    }
                }
                worksheet.push_str("</row>");
            }
            worksheet.push_str("</sheetData></worksheet>");
            write_entry(&mut writer, &format!("xl/worksheets/sheet{number}.xml"), &worksheet);
        }
        workbook.push_str("</sheets></workbook>");
        relationships.push_str("</Relationships>");

        let mut strings = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
            shared_strings.len()
        );
        for string in &shared_strings {
            strings.push_str(&format!("<si><t>{}</t></si>", escape(string.as_str())));
        }
        strings.push_str("</sst>");

        let styles = r#"<?xml version="1.0" encoding="UTF-8"?><styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14" applyNumberFormat="1"/></cellXfs></styleSheet>"#;

        write_entry(&mut writer, "xl/workbook.xml", &workbook);
        write_entry(&mut writer, "xl/_rels/workbook.xml.rels", &relationships);
        write_entry(&mut writer, "xl/sharedStrings.xml", &strings);
        write_entry(&mut writer, "xl/styles.xml", styles);
        writer.finish().unwrap();

        path.to_string_lossy().into_owned()
    }
}

/// Builds minimal `.ods` files from raw `<table:table>` fragments.
pub(crate) struct OdsBuilder {
    mime_type: String,
    encrypted: bool,
    tables: Vec<String>,
}

impl OdsBuilder {
    pub(crate) fn new() -> Self {
        Self {
            mime_type: "application/vnd.oasis.opendocument.spreadsheet".to_owned(),
            encrypted: false,
            tables: Vec::new(),
        }
    }

    pub(crate) fn mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = mime_type.to_owned();
        self
    }

    pub(crate) fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    pub(crate) fn table(mut self, table: &str) -> Self {
        self.tables.push(table.to_owned());
        self
    }

    pub(crate) fn write(&self, directory: &Path, file_name: &str) -> String {
        let path = directory.join(file_name);
        let mut writer = ZipWriter::new(File::create(&path).unwrap());

        writer
            .start_file("mimetype", SimpleFileOptions::default().compression_method(CompressionMethod::Stored))
            .unwrap();
        writer.write_all(self.mime_type.as_bytes()).unwrap();

        let encryption = if self.encrypted { "<manifest:encryption-data/>" } else { "" };
        write_entry(&mut writer, "META-INF/manifest.xml", &format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0"><manifest:file-entry manifest:full-path="/" manifest:media-type="{}"/><manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml">{encryption}</manifest:file-entry></manifest:manifest>"#,
            self.mime_type
        ));
        write_entry(&mut writer, "content.xml", &format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" xmlns:calcext="urn:org:documentfoundation:names:experimental:calc:xmlns:calcext:1.0"><office:body><office:spreadsheet>{}</office:spreadsheet></office:body></office:document-content>"#,
            self.tables.concat()
        ));
        writer.finish().unwrap();

        path.to_string_lossy().into_owned()
    }
}
