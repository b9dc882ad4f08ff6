//! Shared fixtures for unit tests.

use super::loader::{build_dataset, parse_csv_text};
use super::model::DivorceDataset;
use super::schema::SchemaConfig;

/// Five factors, three regions, two years. Kota Blitar's total does not
/// match its factor sum; Kab. Jember 2023 is all zeros.
pub(crate) const SAMPLE_CSV: &str = "\
Kabupaten/Kota,Tahun,Nikah,Fakor Perceraian - Zina,Fakor Perceraian - Judi,Fakor Perceraian - Kekerasan Dalam Rumah Tangga,Fakor Perceraian - Perselisihan dan Pertengkaran Terus Menerus,Fakor Perceraian - Ekonomi,Fakor Perceraian - Jumlah
Kota Malang,2022,1.000,2,1,5,30,20,58
Kab. Jember,2022,2.000,1,-,3,50,40,94
Kota Malang,2023,1.100,3,2,4,35,25,69
Kab. Jember,2023,-,-,-,-,-,-,-
Kota Blitar,2023,500,1,1,1,10,10,30
";

pub(crate) fn dataset_from_csv(text: &str) -> DivorceDataset {
    build_dataset(
        parse_csv_text(text).expect("fixture parses"),
        &SchemaConfig::default(),
    )
    .expect("fixture builds")
}

pub(crate) fn sample_dataset() -> DivorceDataset {
    dataset_from_csv(SAMPLE_CSV)
}
