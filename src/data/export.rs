use std::io::Write;
use std::path::Path;

use log::info;

use super::filter::FilteredView;
use crate::error::ExportError;

/// Write the header and the filtered rows' source cells, unchanged, as CSV.
pub fn write_csv<W: Write>(view: &FilteredView<'_>, writer: W) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(&view.dataset().headers)?;
    for record in view.records() {
        out.write_record(&record.raw)?;
    }
    out.flush()?;
    Ok(())
}

/// Export the filtered rows to `path`.
pub fn export_csv(view: &FilteredView<'_>, path: &Path) -> Result<(), ExportError> {
    let file = std::fs::File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_csv(view, file)?;
    info!("exported {} rows to {}", view.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::data::filter::Selection;
    use crate::data::testing::{sample_dataset, SAMPLE_CSV};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_export_is_verbatim() {
        let ds = sample_dataset();
        let view = FilteredView::new(&ds, &Selection::all(&ds)).unwrap();
        let mut buf = Vec::new();
        write_csv(&view, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), SAMPLE_CSV);
    }

    #[test]
    fn test_export_subset() {
        let ds = sample_dataset();
        let selection = Selection {
            regions: BTreeSet::from(["Kab. Jember".to_string()]),
            ..Selection::all(&ds)
        };
        let view = FilteredView::new(&ds, &selection).unwrap();
        let mut buf = Vec::new();
        write_csv(&view, &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "Kab. Jember,2022,2.000,1,-,3,50,40,94");
        assert_eq!(lines[2], "Kab. Jember,2023,-,-,-,-,-,-,-");
    }

    #[test]
    fn test_export_to_file() {
        let ds = sample_dataset();
        let view = FilteredView::new(&ds, &Selection::all(&ds)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        export_csv(&view, &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), SAMPLE_CSV);
    }

    #[test]
    fn test_unwritable_target_is_export_error() {
        let ds = sample_dataset();
        let view = FilteredView::new(&ds, &Selection::all(&ds)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");

        let err = export_csv(&view, &path).unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }), "got {err:?}");
        assert!(err.to_string().starts_with("cannot write '"), "{err}");
    }
}
