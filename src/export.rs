use crate::error::Result;
use crate::record::RecordSet;
use polars::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Write the cleaned table as CSV. A byte-order marker goes first so spreadsheet tools
/// open the Korean headers as UTF-8.
pub fn write_clean_csv<W: Write>(records: &RecordSet, writer: &mut W) -> Result<()> {
    let mut df = records.to_dataframe()?;
    writer.write_all(UTF8_BOM)?;
    CsvWriter::new(&mut *writer)
        .include_header(true)
        .finish(&mut df)?;
    Ok(())
}

pub fn export_clean_csv(records: &RecordSet, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_clean_csv(records, &mut writer)?;
    writer.flush()?;
    info!("Exported {} cleaned records to {}", records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RawCells, Record};

    #[test]
    fn test_export_has_bom_and_normalized_columns() {
        let records = RecordSet::new(vec![
            Record::from_cells(&RawCells {
                date: "2025/01/01",
                units: "3",
                status: "교차오배분건",
                blame: "of",
                ..RawCells::default()
            }),
            Record::from_cells(&RawCells {
                date: "?",
                units: "abc",
                ..RawCells::default()
            }),
        ]);

        let mut buffer = Vec::new();
        write_clean_csv(&records, &mut buffer).unwrap();
        assert!(buffer.starts_with(UTF8_BOM));

        let text = String::from_utf8(buffer[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("날짜,주문번호,유닛"));
        assert!(header.ends_with("상태_std,귀책_std"));

        let first = lines.next().unwrap();
        assert!(first.starts_with("2025-01-01,,3,"));
        assert!(first.ends_with("교차 오배분,OF귀책"));

        let second = lines.next().unwrap();
        assert!(second.starts_with(",,0,"));
        assert!(second.ends_with(",미분류"));
    }
}
