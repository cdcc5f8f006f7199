//! Office Open XML helpers shared by the xlsx family (.xlsx, .xlsm, .xlam).
use crate::error::SheetLoaderError;
use crate::helpers::reader::UnifiedReader;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use zip::ZipArchive;

/// XML tag name for relationship elements
const TAG_RELATIONSHIP: &[u8] = b"Relationship";

/// Compound File Binary signature. Encrypted OOXML workbooks are stored
/// as an `EncryptedPackage` stream inside such a container instead of a zip.
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Opens the workbook archive, rejecting password-protected files.
pub(super) fn open_archive(file_name: &str) -> Result<ZipArchive<UnifiedReader>, SheetLoaderError> {
    let mut reader = UnifiedReader::new(file_name)?;
    if is_password_protected(&mut reader)? {
        Err(SpreadsheetError::SpreadsheetPasswordProtectedError(file_name.to_owned()))?;
    }
    Ok(ZipArchive::new(reader)?)
}

/// Maps relationship IDs to worksheet paths inside the archive.
pub(super) fn load_relationships<RS: Read + Seek>(zip: &mut ZipArchive<RS>, path: &str) -> Result<HashMap<String, String>, SheetLoaderError> {
    let mut reader = zip.xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(path.to_string()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Resolves each cell style to the cell type implied by its number format.
/// Custom formats win over built-in IDs; anything else is a plain number.
pub(super) fn load_number_formats(format_indexes: Vec<String>, custom_formats: HashMap<String, CellType>, is_1904: bool) -> Vec<CellType> {
    format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| CellType::parse_builtin_number_format_id(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect()
}

/// Relationship targets are relative to `xl/` unless absolute.
pub(crate) fn to_zip_path(path: Cow<'_, str>) -> String {
    if let Some(stripped) = path.strip_prefix('/') {
        stripped.to_string()
    } else if path.starts_with("xl/") {
        path.to_string()
    } else {
        format!("xl/{path}")
    }
}

/// Checks the file signature and rewinds the reader.
fn is_password_protected<R: Read + Seek>(reader: &mut R) -> Result<bool, SheetLoaderError> {
    let mut signature = [0u8; 8];
    let is_cfb = match reader.read_exact(&mut signature) {
        Ok(()) => signature == CFB_SIGNATURE,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => false,
        Err(e) => Err(e)?,
    };
    reader.seek(SeekFrom::Start(0))?;
    Ok(is_cfb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    #[test]
    fn zip_paths() {
        assert_eq!(to_zip_path(Cow::Borrowed("worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path(Cow::Borrowed("/xl/worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path(Cow::Borrowed("xl/worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
    }

    #[test]
    fn number_formats_prefer_custom_definitions() {
        let custom = HashMap::from([("164".to_string(), CellType::NumberTime)]);
        let formats = load_number_formats(vec!["0".into(), "14".into(), "164".into()], custom, false);
        assert_eq!(formats, vec![CellType::Number, CellType::NumberDate { is_1904: false }, CellType::NumberTime]);
    }

    #[test]
    fn detects_cfb_container_and_rewinds() {
        let mut bytes = CFB_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0u8; 32]);
        let mut reader = Cursor::new(bytes);
        assert!(is_password_protected(&mut reader).unwrap());
        assert_eq!(reader.position(), 0);

        let mut reader = Cursor::new(b"PK\x03\x04".to_vec());
        assert!(!is_password_protected(&mut reader).unwrap());
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn only_worksheet_relationships_are_kept() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("xl/_rels/workbook.xml.rels", SimpleFileOptions::default()).unwrap();
        writer.write_all(br#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#).unwrap();
        let mut zip = ZipArchive::new(writer.finish().unwrap()).unwrap();

        let relationships = load_relationships(&mut zip, "xl/_rels/workbook.xml.rels").unwrap();
        assert_eq!(relationships.len(), 1);
        assert_eq!(relationships["rId1"], "xl/worksheets/sheet1.xml");
    }
}
